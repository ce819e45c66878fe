//! Whether a presented PSU may act on an existing authorisation
use super::context::RequestContext;
use super::decision::{MessageError, ValidationResult};
use super::error::{MessageErrorCode, ServiceType};
use super::types::PsuIdData;
use tracing::info;

/// Neither the request nor the authorisation names a PSU.
pub fn both_psus_absent(request_psu: &PsuIdData, on_record_psu: &PsuIdData) -> bool {
    request_psu.is_empty() && on_record_psu.is_empty()
}

/// With a PSU on record the request must either omit its identity or repeat it
/// exactly. Without one, the request must supply the identity to record.
pub fn can_psu_update_authorisation(request_psu: &PsuIdData, on_record_psu: &PsuIdData) -> bool {
    if on_record_psu.is_not_empty() {
        request_psu.is_empty() || request_psu.content_equals(on_record_psu)
    } else {
        request_psu.is_not_empty()
    }
}

/// Identity check for the update-PSU-data endpoints of one service.
pub struct AuthorisationIdentityValidator {
    service: ServiceType,
}

impl AuthorisationIdentityValidator {
    pub fn new(service: ServiceType) -> Self {
        Self { service }
    }

    pub fn validate(
        &self,
        ctx: &RequestContext,
        authorisation_id: &str,
        request_psu: &PsuIdData,
        on_record_psu: &PsuIdData,
    ) -> ValidationResult {
        if both_psus_absent(request_psu, on_record_psu) {
            info!(
                request_id = %ctx.request_id,
                authorisation_id,
                "PSU data is absent in both the request and the authorisation"
            );
            return ValidationResult::invalid(MessageError::of(
                self.service,
                MessageErrorCode::FormatErrorNoPsu,
            ));
        }

        if !can_psu_update_authorisation(request_psu, on_record_psu) {
            info!(
                request_id = %ctx.request_id,
                authorisation_id,
                ?request_psu,
                ?on_record_psu,
                "PSU in the request does not match the PSU of the authorisation"
            );
            return ValidationResult::invalid(MessageError::of(
                self.service,
                MessageErrorCode::PsuCredentialsInvalid,
            ));
        }

        ValidationResult::valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psu(id: &str) -> PsuIdData {
        PsuIdData::with_psu_id(id)
    }

    #[test]
    fn first_writer_establishes_identity() {
        assert!(can_psu_update_authorisation(&psu("PSU-1"), &PsuIdData::new()));
        assert!(!can_psu_update_authorisation(
            &PsuIdData::new(),
            &PsuIdData::new()
        ));
    }

    #[test]
    fn recorded_identity_accepts_silence_or_repetition() {
        let on_record = psu("PSU-1").set_psu_corporate_id("CORP-1");

        assert!(can_psu_update_authorisation(&PsuIdData::new(), &on_record));
        assert!(can_psu_update_authorisation(&on_record.clone(), &on_record));
        assert!(!can_psu_update_authorisation(&psu("PSU-1"), &on_record));
        assert!(!can_psu_update_authorisation(&psu("psu-1"), &psu("PSU-1")));
    }

    #[test]
    fn absence_is_reported_before_mismatch() {
        let ctx = RequestContext::new("tpp_1");
        let validator = AuthorisationIdentityValidator::new(ServiceType::Pis);

        let result = validator.validate(&ctx, "auth_1", &PsuIdData::new(), &PsuIdData::new());
        let error = result.message_error().unwrap();

        assert_eq!(error.error_type.to_string(), "PIS_400");
        assert_eq!(error.code(), Some(MessageErrorCode::FormatErrorNoPsu));
    }
}
