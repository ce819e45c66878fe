//! Read-only view of consent usage allowances
//!
//! Counters are decremented by the consent store, never here, so two callers
//! evaluating the same snapshot agree on the outcome.
use super::types::ConsentRecord;

/// First consent that still has a positive daily allowance.
pub fn find_usable<'a, I>(consents: I) -> Option<&'a ConsentRecord>
where
    I: IntoIterator<Item = &'a ConsentRecord>,
{
    consents
        .into_iter()
        .find(|consent| consent.allowed_frequency_per_day > 0)
}

/// Remaining accesses to `resource` today. `None` when the resource is not metered.
pub fn remaining_usage(consent: &ConsentRecord, resource: &str) -> Option<u32> {
    consent.usage_counters.get(resource).copied()
}

/// PSU-initiated calls are never metered.
pub fn is_exhausted(consent: &ConsentRecord, resource: &str, request_from_psu: bool) -> bool {
    !request_from_psu && remaining_usage(consent, resource) == Some(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConsentType;

    fn consent(id: &str, frequency: i32) -> ConsentRecord {
        ConsentRecord::new(id.into(), ConsentType::Piis).set_frequency_per_day(frequency)
    }

    #[test]
    fn skips_consents_without_allowance() {
        let consents = vec![consent("a", 0), consent("b", -1), consent("c", 4)];

        assert_eq!(find_usable(&consents).map(|c| c.id.as_str()), Some("c"));
        assert!(find_usable(&consents[..2]).is_none());
    }

    #[test]
    fn unmetered_resource_is_never_exhausted() {
        let consent = consent("a", 4).set_usage_counter("/accounts", 0);

        assert!(is_exhausted(&consent, "/accounts", false));
        assert!(!is_exhausted(&consent, "/accounts", true));
        assert!(!is_exhausted(&consent, "/balances", false));
    }
}
