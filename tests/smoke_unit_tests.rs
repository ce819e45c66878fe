//! Smoke screen unit tests for the gating components
//!
//! These tests span the codebase and exercise each module in isolation from the
//! store backed scenarios. They mostly cover the happy path.
use sca_gate::{
    access::EndpointAccessChecker,
    context::{RequestContext, UpdatePsuDataRequest},
    decision::{MessageError, TppMessage, ValidationResult},
    error::{MessageErrorCode, ServiceType},
    identity::AuthorisationIdentityValidator,
    profile::{AspspProfile, AspspProfileProvider, ScaRedirectFlow},
    stage::AuthorisationStageCheck,
    types::{
        Authorisation, ConsentDate, ConsentRecord, ConsentStatus, ConsentType, PsuIdData,
        ScaApproach, ScaStatus, TppAccessType,
    },
    utils::new_resource_id,
};
use std::str::FromStr;

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// Test that resource ids are bech32 strings under the requested prefix
    #[test]
    fn generates_prefixed_ids() {
        let consent_id = new_resource_id("consent").unwrap();
        let authorisation_id = new_resource_id("authorisation").unwrap();

        assert!(consent_id.starts_with("consent1"));
        assert!(authorisation_id.starts_with("authorisation1"));
    }

    /// Test that an empty prefix is refused
    #[test]
    fn rejects_empty_prefix() {
        assert!(new_resource_id("").is_err());
    }
}

// PROFILE MODULE TESTS
mod profile_tests {
    use super::*;

    /// Test that an empty profile falls back to redirect SCA without OAuth
    #[test]
    fn empty_profile_uses_defaults() {
        let profile = AspspProfile::from_str("").unwrap();

        assert_eq!(profile, AspspProfile::default());
        assert_eq!(profile.default_sca_approach(), ScaApproach::Redirect);
        assert!(!profile.is_oauth_confirmation_flow());
    }

    /// Test that a static profile serves itself as the provider snapshot
    #[test]
    fn static_profile_is_a_provider() {
        let profile = AspspProfile {
            sca_redirect_flow: ScaRedirectFlow::Oauth,
            ..AspspProfile::default()
        };
        assert_eq!(profile.aspsp_profile(), profile);
    }
}

// DECISION MODULE TESTS
mod decision_tests {
    use super::*;

    /// Test that custom message text overrides the code's default text
    #[test]
    fn custom_text_is_rendered() {
        let error = MessageError::new(
            ServiceType::Ais,
            TppMessage::with_text(MessageErrorCode::FormatError, "frequencyPerDay is not correct"),
        );
        let payload = error.to_payload();

        assert_eq!(payload.error_type.to_string(), "AIS_400");
        assert_eq!(payload.tpp_messages[0].text, "frequencyPerDay is not correct");
    }

    /// Test that a valid result converts into an empty Ok
    #[test]
    fn valid_result_is_ok() {
        assert!(ValidationResult::valid().into_result().is_ok());
        assert!(ValidationResult::valid().is_valid());
    }

    /// Test that the error message names the namespace and the code
    #[test]
    fn message_error_displays_type_and_code() {
        let error = MessageError::of(ServiceType::Piis, MessageErrorCode::AccessExceeded);
        assert_eq!(error.to_string(), "PIIS_429 ACCESS_EXCEEDED");
    }
}

// TYPES MODULE TESTS
mod types_tests {
    use super::*;

    /// Test that only received and valid consents are usable for funds confirmation
    #[test]
    fn usable_statuses() {
        assert!(ConsentStatus::Received.is_usable());
        assert!(ConsentStatus::Valid.is_usable());
        assert!(!ConsentStatus::Rejected.is_usable());
        assert!(!ConsentStatus::TerminatedByTpp.is_usable());
    }

    /// Test that access types keep their wire names
    #[test]
    fn access_type_wire_names() {
        assert_eq!(TppAccessType::from("ALL_TPP"), TppAccessType::AllTpp);
        assert_eq!(TppAccessType::SingleTpp.as_str(), "SINGLE_TPP");
    }

    /// Test that a consent record survives CBOR encoding with its counters
    #[test]
    fn consent_record_encoding() {
        let consent = ConsentRecord::new("consent1".into(), ConsentType::Ais)
            .set_expire_date(ConsentDate::new_with(2025, 12, 31).unwrap())
            .set_single_tpp("tpp_1")
            .set_usage_counter("/accounts", 4);

        let encoding = minicbor::to_vec(&consent).unwrap();
        let decode: ConsentRecord = minicbor::decode(&encoding).unwrap();

        assert_eq!(consent, decode);
    }
}

// VALIDATOR TESTS
mod validator_tests {
    use super::*;

    /// Test that a matching PSU passes the identity check
    #[test]
    fn matching_psu_passes() {
        let ctx = RequestContext::new("tpp_1");
        let psu = PsuIdData::with_psu_id("PSU-1").set_psu_id_type("NATIONAL");

        let result = AuthorisationIdentityValidator::new(ServiceType::Piis)
            .validate(&ctx, "auth_1", &psu, &psu);
        assert!(result.is_valid());
    }

    /// Test that embedded SCA reaches method selection while redirect does not
    #[test]
    fn embedded_reaches_further_than_redirect() {
        let profile = AspspProfile::default();
        let checker = EndpointAccessChecker::new(&profile);

        let embedded = Authorisation::new("a".into(), "c".into(), ScaApproach::Embedded)
            .set_status(ScaStatus::ScaMethodSelected);
        let redirect = Authorisation::new("a".into(), "c".into(), ScaApproach::Redirect)
            .set_status(ScaStatus::ScaMethodSelected);

        assert!(checker.is_endpoint_accessible(Some(&embedded), false));
        assert!(!checker.is_endpoint_accessible(Some(&redirect), false));
    }

    /// Test that a request with the stage data passes the stage check
    #[test]
    fn stage_data_present() {
        let ctx = RequestContext::new("tpp_1");
        let auth = Authorisation::new("a".into(), "c".into(), ScaApproach::Embedded)
            .set_status(ScaStatus::PsuAuthenticated);
        let request = UpdatePsuDataRequest::new("c", "a").set_authentication_method_id("sms");

        let result = AuthorisationStageCheck::new(ServiceType::Ais).validate(&ctx, &auth, &request, false);
        assert!(result.is_valid());
    }
}
