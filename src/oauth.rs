//! OAuth-integrated redirect SCA
//!
//! When the PSU authenticates at an external OAuth server, the bearer token is the
//! only proof that SCA happened. Objects that should already have been authorised
//! therefore require a token on every call; in any other flow local SCA has
//! covered authentication and this check is a no-op.
use super::context::RequestContext;
use super::decision::{MessageError, ValidationResult};
use super::error::{MessageErrorCode, ServiceType};
use super::profile::{AspspProfile, ScaRedirectFlow};
use super::types::{ConsentRecord, ConsentStatus, PaymentSnapshot, ScaApproach, TransactionStatus};
use tracing::info;

/// One row of the token table: when an object needs a token and which namespace
/// the refusal is reported in.
pub struct OauthRule<T> {
    pub service: ServiceType,
    pub token_required: fn(&T) -> bool,
}

impl<T> OauthRule<T> {
    pub fn error(&self) -> MessageError {
        MessageError::of(self.service, MessageErrorCode::Forbidden)
    }
}

fn consent_token_required(consent: &ConsentRecord) -> bool {
    consent.status == ConsentStatus::Valid
}

fn payment_token_required(payment: &PaymentSnapshot) -> bool {
    !matches!(
        payment.transaction_status,
        TransactionStatus::Rcvd | TransactionStatus::Pdng | TransactionStatus::Patc
    )
}

pub const AIS_CONSENT: OauthRule<ConsentRecord> = OauthRule {
    service: ServiceType::Ais,
    token_required: consent_token_required,
};

pub const PIIS_CONSENT: OauthRule<ConsentRecord> = OauthRule {
    service: ServiceType::Piis,
    token_required: consent_token_required,
};

pub const PIS_PAYMENT: OauthRule<PaymentSnapshot> = OauthRule {
    service: ServiceType::Pis,
    token_required: payment_token_required,
};

pub fn validate<T>(
    rule: &OauthRule<T>,
    object: &T,
    sca_approach: ScaApproach,
    profile: &AspspProfile,
    ctx: &RequestContext,
) -> ValidationResult {
    if sca_approach != ScaApproach::Redirect || profile.sca_redirect_flow != ScaRedirectFlow::Oauth
    {
        return ValidationResult::valid();
    }

    if (rule.token_required)(object) && !ctx.has_bearer_token() {
        info!(
            request_id = %ctx.request_id,
            tpp_id = %ctx.tpp_id,
            "OAuth token is missing for an already authorised object"
        );
        return ValidationResult::invalid(rule.error());
    }

    ValidationResult::valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_profile() -> AspspProfile {
        AspspProfile {
            sca_redirect_flow: ScaRedirectFlow::Oauth,
            ..AspspProfile::default()
        }
    }

    #[test]
    fn valid_consent_without_token_is_forbidden() {
        let consent = ConsentRecord::new("consent_1".into(), crate::types::ConsentType::Ais)
            .set_status(ConsentStatus::Valid);
        let ctx = RequestContext::new("tpp_1");

        let result = validate(&AIS_CONSENT, &consent, ScaApproach::Redirect, &oauth_profile(), &ctx);
        assert_eq!(
            result.message_error().unwrap().error_type.to_string(),
            "AIS_403"
        );

        let ctx = ctx.set_oauth_token("token");
        assert!(validate(&AIS_CONSENT, &consent, ScaApproach::Redirect, &oauth_profile(), &ctx).is_valid());
    }

    #[test]
    fn pending_payment_needs_no_token() {
        let payment = PaymentSnapshot::new("payment_1".into(), TransactionStatus::Pdng);
        let ctx = RequestContext::new("tpp_1");

        assert!(validate(&PIS_PAYMENT, &payment, ScaApproach::Redirect, &oauth_profile(), &ctx).is_valid());
    }

    #[test]
    fn other_flows_skip_the_check() {
        let payment = PaymentSnapshot::new("payment_1".into(), TransactionStatus::Acsc);
        let ctx = RequestContext::new("tpp_1");

        assert!(validate(&PIS_PAYMENT, &payment, ScaApproach::Embedded, &oauth_profile(), &ctx).is_valid());
        assert!(
            validate(&PIS_PAYMENT, &payment, ScaApproach::Redirect, &AspspProfile::default(), &ctx)
                .is_valid()
        );
    }
}
