//! Endpoint access for stage-progression calls on an authorisation
use super::context::RequestContext;
use super::decision::{MessageError, ValidationResult};
use super::error::{MessageErrorCode, ServiceType};
use super::profile::AspspProfile;
use super::types::{Authorisation, ScaApproach, ScaStatus};
use tracing::info;

/// Admissibility of a stage-progression call for every approach and stage.
///
/// A confirmation-code call only reaches an authorisation awaiting confirmation.
/// Otherwise embedded SCA runs every intermediate stage through the API, decoupled
/// SCA only identification and method selection, and redirect SCA only the initial
/// PSU identification.
///
/// Redirect opening RECEIVED without a confirmation code is intentionally
/// permissive and needs confirmation from the system of record, like the rule
/// that an authorisation which was not found grants access.
pub fn is_accessible(
    sca_approach: ScaApproach,
    sca_status: ScaStatus,
    confirmation_code_case: bool,
) -> bool {
    use ScaStatus::*;

    if confirmation_code_case {
        return sca_status == Unconfirmed;
    }

    match sca_approach {
        ScaApproach::Embedded => matches!(
            sca_status,
            Received | PsuIdentified | PsuAuthenticated | ScaMethodSelected | Started
        ),
        ScaApproach::Decoupled => matches!(sca_status, Received | PsuIdentified | PsuAuthenticated),
        ScaApproach::Redirect => sca_status == Received,
    }
}

pub struct EndpointAccessChecker<'a> {
    profile: &'a AspspProfile,
}

impl<'a> EndpointAccessChecker<'a> {
    pub fn new(profile: &'a AspspProfile) -> Self {
        Self { profile }
    }

    /// An authorisation that was not found is not this check's concern; the
    /// caller decides how to report it.
    pub fn is_endpoint_accessible(
        &self,
        authorisation: Option<&Authorisation>,
        confirmation_code_received: bool,
    ) -> bool {
        if self.profile.is_oauth_confirmation_flow() {
            return true;
        }

        let Some(authorisation) = authorisation else {
            return true;
        };

        let confirmation_code_case =
            confirmation_code_received && self.profile.authorisation_confirmation_request_mandated;

        is_accessible(
            authorisation.sca_approach,
            authorisation.sca_status,
            confirmation_code_case,
        )
    }

    pub fn validate(
        &self,
        service: ServiceType,
        ctx: &RequestContext,
        authorisation: Option<&Authorisation>,
        confirmation_code_received: bool,
    ) -> ValidationResult {
        if self.is_endpoint_accessible(authorisation, confirmation_code_received) {
            return ValidationResult::valid();
        }

        info!(
            request_id = %ctx.request_id,
            authorisation_id = authorisation.map(|a| a.id.as_str()),
            sca_status = ?authorisation.map(|a| a.sca_status),
            "Endpoint is blocked for the current authorisation"
        );
        ValidationResult::invalid(MessageError::of(service, MessageErrorCode::ServiceBlocked))
    }
}
