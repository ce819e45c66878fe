//! Ordered checks for an update-PSU-data call on a consent or payment authorisation
use super::access::EndpointAccessChecker;
use super::context::{RequestContext, UpdatePsuDataRequest};
use super::decision::{MessageError, ValidationResult};
use super::error::{MessageErrorCode, ServiceType};
use super::identity::AuthorisationIdentityValidator;
use super::profile::AspspProfile;
use super::stage::AuthorisationStageCheck;
use super::types::{Authorisation, AuthorisationParent, ScaStatus};
use tracing::info;

pub struct UpdatePsuDataValidator<'a> {
    service: ServiceType,
    profile: &'a AspspProfile,
}

impl<'a> UpdatePsuDataValidator<'a> {
    pub fn new(service: ServiceType, profile: &'a AspspProfile) -> Self {
        Self { service, profile }
    }

    fn error(&self, code: MessageErrorCode) -> ValidationResult {
        ValidationResult::invalid(MessageError::of(self.service, code))
    }

    /// First failing check decides; later checks never run.
    pub fn validate<P: AuthorisationParent>(
        &self,
        ctx: &RequestContext,
        parent: &P,
        authorisation: Option<&Authorisation>,
        request: &UpdatePsuDataRequest,
    ) -> ValidationResult {
        let code_received = request.confirmation_code_received();

        EndpointAccessChecker::new(self.profile)
            .validate(self.service, ctx, authorisation, code_received)
            .and_then(|| {
                let Some(authorisation) = authorisation else {
                    info!(
                        request_id = %ctx.request_id,
                        authorisation_id = %request.authorisation_id,
                        "Authorisation was not found"
                    );
                    return self.error(MessageErrorCode::ResourceUnknown404);
                };
                self.validate_found(ctx, parent, authorisation, request)
            })
    }

    fn validate_found<P: AuthorisationParent>(
        &self,
        ctx: &RequestContext,
        parent: &P,
        authorisation: &Authorisation,
        request: &UpdatePsuDataRequest,
    ) -> ValidationResult {
        if authorisation.parent_id != parent.resource_id() {
            info!(
                request_id = %ctx.request_id,
                authorisation_id = %authorisation.id,
                parent_id = parent.resource_id(),
                "Authorisation belongs to another resource"
            );
            return self.error(MessageErrorCode::ResourceUnknown403);
        }

        // an owner that was never recorded does not restrict callers
        if parent
            .owner_tpp_id()
            .is_some_and(|owner| owner != ctx.tpp_id)
        {
            info!(
                request_id = %ctx.request_id,
                parent_id = parent.resource_id(),
                tpp_id = %ctx.tpp_id,
                "TPP does not own the authorised resource"
            );
            return self.error(MessageErrorCode::Unauthorized);
        }

        let confirmation_code_case = request.confirmation_code_received()
            && self.profile.authorisation_confirmation_request_mandated;

        AuthorisationIdentityValidator::new(self.service)
            .validate(
                ctx,
                &authorisation.id,
                &request.psu_id_data,
                &authorisation.psu_id_data,
            )
            .and_then(|| {
                if authorisation.sca_status == ScaStatus::Failed {
                    info!(
                        request_id = %ctx.request_id,
                        authorisation_id = %authorisation.id,
                        "Authorisation has already failed"
                    );
                    return self.error(MessageErrorCode::StatusInvalid);
                }
                ValidationResult::valid()
            })
            .and_then(|| {
                AuthorisationStageCheck::new(self.service).validate(
                    ctx,
                    authorisation,
                    request,
                    confirmation_code_case,
                )
            })
    }
}
