//! Data an update-PSU-data call must carry for the stage it advances
use super::context::{RequestContext, UpdatePsuDataRequest};
use super::decision::{MessageError, ValidationResult};
use super::error::{MessageErrorCode, ServiceType};
use super::types::{Authorisation, ScaStatus};
use tracing::info;

/// What is missing from `request` to advance an authorisation out of `status`.
pub fn missing_stage_data(status: ScaStatus, request: &UpdatePsuDataRequest) -> Option<&'static str> {
    match status {
        ScaStatus::Received if request.psu_id_data.is_empty() => Some("PSU identification"),
        ScaStatus::PsuIdentified if !request.has_password() => Some("password"),
        ScaStatus::PsuAuthenticated if !request.has_authentication_method_id() => {
            Some("authentication method id")
        }
        ScaStatus::ScaMethodSelected if !request.has_sca_authentication_data() => {
            Some("SCA authentication data")
        }
        _ => None,
    }
}

pub struct AuthorisationStageCheck {
    service: ServiceType,
}

impl AuthorisationStageCheck {
    pub fn new(service: ServiceType) -> Self {
        Self { service }
    }

    /// A confirmation-code call carries none of the stage data and is not checked.
    pub fn validate(
        &self,
        ctx: &RequestContext,
        authorisation: &Authorisation,
        request: &UpdatePsuDataRequest,
        confirmation_code_case: bool,
    ) -> ValidationResult {
        if confirmation_code_case {
            return ValidationResult::valid();
        }

        match missing_stage_data(authorisation.sca_status, request) {
            None => ValidationResult::valid(),
            Some(missing) => {
                info!(
                    request_id = %ctx.request_id,
                    authorisation_id = %authorisation.id,
                    sca_status = ?authorisation.sca_status,
                    missing,
                    "Update request lacks the data its stage needs"
                );
                ValidationResult::invalid(MessageError::of(
                    self.service,
                    MessageErrorCode::ServiceInvalid400,
                ))
            }
        }
    }
}
