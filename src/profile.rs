//! ASPSP capability profile
//!
//! The profile is read-only for the lifetime of a request. It is usually loaded
//! from a TOML file at start-up:
//!
//! ```toml
//! all_psd2_supported = false
//! bank_offered_consent_supported = true
//! consent_lifetime_days = 90
//! sca_redirect_flow = "oauth"
//! sca_approaches = ["redirect", "embedded"]
//! ```
use super::error::ConfigError;
use super::types::ScaApproach;
use serde::Deserialize;
use std::{path::Path, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaRedirectFlow {
    #[default]
    Redirect,
    Oauth,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case", default)]
pub struct AspspProfile {
    pub all_psd2_supported: bool,
    pub bank_offered_consent_supported: bool,
    pub available_accounts_consent_supported: bool,
    /// Upper bound on a consent's validity in days. Zero means unbounded.
    pub consent_lifetime_days: u32,
    pub sca_redirect_flow: ScaRedirectFlow,
    pub authorisation_confirmation_request_mandated: bool,
    pub combined_service_indicator: bool,
    /// Supported approaches, most preferred first.
    pub sca_approaches: Vec<ScaApproach>,
}

impl Default for AspspProfile {
    fn default() -> Self {
        Self {
            all_psd2_supported: false,
            bank_offered_consent_supported: false,
            available_accounts_consent_supported: false,
            consent_lifetime_days: 0,
            sca_redirect_flow: ScaRedirectFlow::Redirect,
            authorisation_confirmation_request_mandated: false,
            combined_service_indicator: false,
            sca_approaches: vec![ScaApproach::Redirect],
        }
    }
}

impl AspspProfile {
    pub fn load(path: impl AsRef<Path>) -> Result<AspspProfile, ConfigError> {
        let profile_string = std::fs::read_to_string(path)?;
        Self::from_str(&profile_string)
    }

    /// The approach a new authorisation is started with.
    pub fn default_sca_approach(&self) -> ScaApproach {
        self.sca_approaches
            .first()
            .copied()
            .unwrap_or(ScaApproach::Redirect)
    }

    /// OAuth-integrated redirect that also demands a confirmation step.
    pub fn is_oauth_confirmation_flow(&self) -> bool {
        self.sca_redirect_flow == ScaRedirectFlow::Oauth
            && self.authorisation_confirmation_request_mandated
    }
}

impl FromStr for AspspProfile {
    type Err = ConfigError;

    fn from_str(profile_string: &str) -> Result<Self, Self::Err> {
        let profile: AspspProfile = toml::from_str(profile_string)?;
        Ok(profile)
    }
}

/// Source of the capability snapshot consulted by each request.
pub trait AspspProfileProvider {
    fn aspsp_profile(&self) -> AspspProfile;
}

impl AspspProfileProvider for AspspProfile {
    fn aspsp_profile(&self) -> AspspProfile {
        self.clone()
    }
}
