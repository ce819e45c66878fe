//! Validation of a new AIS consent request against the ASPSP profile
use super::context::RequestContext;
use super::decision::{MessageError, TppMessage, ValidationResult};
use super::error::{MessageErrorCode, ServiceType};
use super::profile::AspspProfile;
use super::types::ScaApproach;
use chrono::{Days, NaiveDate};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAccessType {
    AllAccounts,
    AllAccountsWithOwnerName,
}

/// Requested access. All lists empty and no flags set means a bank-offered consent,
/// where the PSU picks the accounts at the ASPSP.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountAccess {
    pub accounts: Vec<String>,
    pub balances: Vec<String>,
    pub transactions: Vec<String>,
    pub available_accounts: Option<AccountAccessType>,
    pub available_accounts_with_balance: Option<AccountAccessType>,
    pub all_psd2: Option<AccountAccessType>,
}

impl AccountAccess {
    pub fn is_bank_offered(&self) -> bool {
        self.accounts.is_empty()
            && self.balances.is_empty()
            && self.transactions.is_empty()
            && self.available_accounts.is_none()
            && self.available_accounts_with_balance.is_none()
            && self.all_psd2.is_none()
    }
    pub fn requests_available_accounts(&self) -> bool {
        self.available_accounts.is_some() || self.available_accounts_with_balance.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateConsentRequest {
    pub access: AccountAccess,
    pub recurring_indicator: bool,
    pub valid_until: NaiveDate,
    pub frequency_per_day: i32,
    pub combined_service_indicator: bool,
}

impl CreateConsentRequest {
    pub fn new(access: AccountAccess, valid_until: NaiveDate) -> Self {
        Self {
            access,
            recurring_indicator: true,
            valid_until,
            frequency_per_day: 4,
            combined_service_indicator: false,
        }
    }
    pub fn set_recurring_indicator(mut self, recurring: bool) -> Self {
        self.recurring_indicator = recurring;
        self
    }
    pub fn set_frequency_per_day(mut self, frequency: i32) -> Self {
        self.frequency_per_day = frequency;
        self
    }
    pub fn set_combined_service_indicator(mut self, combined: bool) -> Self {
        self.combined_service_indicator = combined;
        self
    }
}

fn reject(code: MessageErrorCode, text: Option<&str>) -> Result<(), MessageError> {
    let message = match text {
        Some(text) => TppMessage::with_text(code, text),
        None => TppMessage::of(code),
    };
    Err(MessageError::new(ServiceType::Ais, message))
}

pub struct ConsentCreationPolicy<'a> {
    profile: &'a AspspProfile,
}

impl<'a> ConsentCreationPolicy<'a> {
    pub fn new(profile: &'a AspspProfile) -> Self {
        Self { profile }
    }

    /// Runs the rules in a fixed order; the first one that fails decides.
    pub fn validate(
        &self,
        request: &CreateConsentRequest,
        sca_approach: ScaApproach,
        ctx: &RequestContext,
        today: NaiveDate,
    ) -> ValidationResult {
        let result = self.check(request, sca_approach, today);

        if let Err(error) = &result {
            info!(
                request_id = %ctx.request_id,
                tpp_id = %ctx.tpp_id,
                code = ?error.code(),
                "Consent request was rejected"
            );
        }
        result.into()
    }

    fn check(
        &self,
        request: &CreateConsentRequest,
        sca_approach: ScaApproach,
        today: NaiveDate,
    ) -> Result<(), MessageError> {
        let profile = self.profile;
        let access = &request.access;

        if access.all_psd2.is_some() && !profile.all_psd2_supported {
            return reject(MessageErrorCode::ParameterNotSupported, None);
        }

        if access.is_bank_offered()
            && (!profile.bank_offered_consent_supported || sca_approach == ScaApproach::Embedded)
        {
            return reject(MessageErrorCode::ServiceInvalid405, None);
        }

        if !self.is_valid_until_in_range(request.valid_until, today) {
            return reject(MessageErrorCode::PeriodInvalid, None);
        }

        if !is_valid_frequency(request.recurring_indicator, request.frequency_per_day) {
            return reject(
                MessageErrorCode::FormatError,
                Some("frequencyPerDay is not correct"),
            );
        }

        if access.requests_available_accounts() && !profile.available_accounts_consent_supported {
            return reject(MessageErrorCode::ServiceInvalid405, None);
        }

        if request.combined_service_indicator && !profile.combined_service_indicator {
            return reject(MessageErrorCode::SessionsNotSupported, None);
        }

        Ok(())
    }

    fn is_valid_until_in_range(&self, valid_until: NaiveDate, today: NaiveDate) -> bool {
        if valid_until <= today {
            return false;
        }

        let lifetime = self.profile.consent_lifetime_days;
        if lifetime == 0 {
            return true;
        }

        match today.checked_add_days(Days::new(u64::from(lifetime))) {
            Some(latest) => valid_until <= latest,
            None => true,
        }
    }
}

/// A one-off consent grants exactly one access; a recurring one at least one a day.
fn is_valid_frequency(recurring_indicator: bool, frequency_per_day: i32) -> bool {
    if recurring_indicator {
        frequency_per_day > 0
    } else {
        frequency_per_day == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn dedicated_access() -> AccountAccess {
        AccountAccess {
            accounts: vec!["DE89370400440532013000".into()],
            ..AccountAccess::default()
        }
    }

    #[test]
    fn lifetime_bound_is_inclusive() {
        let profile = AspspProfile {
            consent_lifetime_days: 10,
            ..AspspProfile::default()
        };
        let policy = ConsentCreationPolicy::new(&profile);

        assert!(policy.is_valid_until_in_range(NaiveDate::from_ymd_opt(2025, 6, 25).unwrap(), today()));
        assert!(!policy.is_valid_until_in_range(NaiveDate::from_ymd_opt(2025, 6, 26).unwrap(), today()));
        assert!(!policy.is_valid_until_in_range(today(), today()));
    }

    #[test]
    fn one_off_consent_needs_exactly_one_access() {
        assert!(is_valid_frequency(false, 1));
        assert!(!is_valid_frequency(false, 2));
        assert!(!is_valid_frequency(true, 0));
        assert!(is_valid_frequency(true, 7));
    }

    #[test]
    fn combined_service_rejected_last() {
        let profile = AspspProfile::default();
        let ctx = RequestContext::new("tpp_1");
        let request = CreateConsentRequest::new(dedicated_access(), today().succ_opt().unwrap())
            .set_combined_service_indicator(true);

        let result = ConsentCreationPolicy::new(&profile).validate(
            &request,
            ScaApproach::Redirect,
            &ctx,
            today(),
        );

        assert_eq!(
            result.message_error().unwrap().code(),
            Some(MessageErrorCode::SessionsNotSupported)
        );
    }
}
