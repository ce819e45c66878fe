//! Whether a stored consent may be used for the current call
use super::context::RequestContext;
use super::decision::{MessageError, TppMessage, ValidationResult};
use super::error::{MessageErrorCode, ServiceType};
use super::quota;
use super::types::{ConsentRecord, ConsentStatus, TppAccessType};
use chrono::NaiveDate;
use tracing::info;

/// A consent without an expiry date never expires. The expiry day itself is still usable.
pub fn is_expired(consent: &ConsentRecord, today: NaiveDate) -> bool {
    consent
        .expire_date
        .is_some_and(|date| date.to_naive_date() < today)
}

/// # Panics
///
/// On an access type that is neither `ALL_TPP` nor `SINGLE_TPP`. Such a value
/// means the store holds corrupted data, which no request can recover from.
pub fn is_tpp_authorised(consent: &ConsentRecord, tpp_id: &str) -> bool {
    match &consent.tpp_access_type {
        TppAccessType::AllTpp => true,
        TppAccessType::SingleTpp => consent.owner_tpp_id.as_deref() == Some(tpp_id),
        TppAccessType::Unrecognised(raw) => {
            panic!("consent {} has unknown TPP access type {raw}", consent.id)
        }
    }
}

/// Outcome of picking one funds-confirmation consent among the candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PiisSelection<'a> {
    Usable(&'a ConsentRecord),
    Rejected(MessageError),
}

impl PiisSelection<'_> {
    pub fn decision(&self) -> ValidationResult {
        match self {
            PiisSelection::Usable(_) => ValidationResult::valid(),
            PiisSelection::Rejected(error) => ValidationResult::invalid(error.clone()),
        }
    }
}

/// Filters the candidates down to usable, unexpired consents the caller may use,
/// then takes the first with a positive daily allowance.
pub fn select_piis_consent<'a>(
    candidates: &'a [ConsentRecord],
    ctx: &RequestContext,
    today: NaiveDate,
) -> PiisSelection<'a> {
    if candidates.is_empty() {
        info!(request_id = %ctx.request_id, "No PIIS consent was activated for the account");
        return PiisSelection::Rejected(MessageError::of(
            ServiceType::Piis,
            MessageErrorCode::NoPiisActivation,
        ));
    }

    let filtered: Vec<&ConsentRecord> = candidates
        .iter()
        .filter(|consent| consent.status.is_usable())
        .filter(|consent| !is_expired(consent, today))
        .filter(|consent| is_tpp_authorised(consent, &ctx.tpp_id))
        .collect();

    if filtered.is_empty() {
        info!(
            request_id = %ctx.request_id,
            candidates = candidates.len(),
            "None of the PIIS consents is valid for the TPP"
        );
        return PiisSelection::Rejected(MessageError::of(
            ServiceType::Piis,
            MessageErrorCode::ConsentInvalid,
        ));
    }

    match quota::find_usable(filtered) {
        Some(consent) => PiisSelection::Usable(consent),
        None => {
            info!(request_id = %ctx.request_id, "PIIS consent access was exceeded");
            PiisSelection::Rejected(MessageError::of(
                ServiceType::Piis,
                MessageErrorCode::AccessExceeded,
            ))
        }
    }
}

fn ais_error(message: TppMessage) -> ValidationResult {
    ValidationResult::invalid(MessageError::new(ServiceType::Ais, message))
}

/// Checks one resolved AIS consent before account data is read through it.
/// Only a VALID consent passes; a RECEIVED one has not been through SCA yet.
pub fn validate_account_consent(
    consent: &ConsentRecord,
    resource: &str,
    ctx: &RequestContext,
    today: NaiveDate,
) -> ValidationResult {
    if !is_tpp_authorised(consent, &ctx.tpp_id) {
        info!(
            request_id = %ctx.request_id,
            consent_id = %consent.id,
            tpp_id = %ctx.tpp_id,
            "TPP is not authorised to use the consent"
        );
        return ais_error(TppMessage::of(MessageErrorCode::Unauthorized));
    }

    if is_expired(consent, today) {
        info!(request_id = %ctx.request_id, consent_id = %consent.id, "Consent has expired");
        return ais_error(TppMessage::of(MessageErrorCode::ConsentExpired));
    }

    // reading accounts needs a consent the PSU has authorised
    if consent.status != ConsentStatus::Valid {
        info!(
            request_id = %ctx.request_id,
            consent_id = %consent.id,
            status = ?consent.status,
            "Consent is not valid for reading account data"
        );
        let code = match consent.status {
            ConsentStatus::RevokedByPsu => MessageErrorCode::ConsentInvalidRevoked,
            ConsentStatus::Expired => MessageErrorCode::ConsentExpired,
            _ => MessageErrorCode::ConsentInvalid,
        };
        return ais_error(TppMessage::of(code));
    }

    if quota::is_exhausted(consent, resource, ctx.request_from_psu) {
        info!(
            request_id = %ctx.request_id,
            consent_id = %consent.id,
            resource,
            "Consent access was exceeded"
        );
        return ais_error(TppMessage::of(MessageErrorCode::AccessExceeded));
    }

    ValidationResult::valid()
}
