//! Per-request inputs supplied by the HTTP layer
use super::types::PsuIdData;
use uuid7::uuid7;

/// What the current caller presented. Built once per inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String, // X-Request-ID, used to correlate audit entries
    pub tpp_id: String,
    pub psu_id_data: PsuIdData,
    pub oauth_token: Option<String>,
    pub request_from_psu: bool, // PSU in session rather than a TPP background call
}

impl RequestContext {
    pub fn new(tpp_id: &str) -> Self {
        Self {
            request_id: uuid7().to_string(),
            tpp_id: tpp_id.to_string(),
            psu_id_data: PsuIdData::default(),
            oauth_token: None,
            request_from_psu: false,
        }
    }
    pub fn set_request_id(mut self, request_id: &str) -> Self {
        self.request_id = request_id.to_string();
        self
    }
    pub fn set_psu_id_data(mut self, psu_id_data: PsuIdData) -> Self {
        self.psu_id_data = psu_id_data;
        self
    }
    pub fn set_oauth_token(mut self, token: &str) -> Self {
        self.oauth_token = Some(token.to_string());
        self
    }
    pub fn set_request_from_psu(mut self, from_psu: bool) -> Self {
        self.request_from_psu = from_psu;
        self
    }
    pub fn has_bearer_token(&self) -> bool {
        self.oauth_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

/// Body and path of an "update PSU data" call on an authorisation.
#[derive(Debug, Clone, Default)]
pub struct UpdatePsuDataRequest {
    pub parent_id: String,
    pub authorisation_id: String,
    pub psu_id_data: PsuIdData,
    pub password: Option<String>,
    pub authentication_method_id: Option<String>,
    pub sca_authentication_data: Option<String>,
    pub confirmation_code: Option<String>,
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl UpdatePsuDataRequest {
    pub fn new(parent_id: &str, authorisation_id: &str) -> Self {
        Self {
            parent_id: parent_id.to_string(),
            authorisation_id: authorisation_id.to_string(),
            ..Self::default()
        }
    }
    pub fn set_psu_id_data(mut self, psu_id_data: PsuIdData) -> Self {
        self.psu_id_data = psu_id_data;
        self
    }
    pub fn set_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
    pub fn set_authentication_method_id(mut self, method_id: &str) -> Self {
        self.authentication_method_id = Some(method_id.to_string());
        self
    }
    pub fn set_sca_authentication_data(mut self, data: &str) -> Self {
        self.sca_authentication_data = Some(data.to_string());
        self
    }
    pub fn set_confirmation_code(mut self, code: &str) -> Self {
        self.confirmation_code = Some(code.to_string());
        self
    }
    pub fn has_password(&self) -> bool {
        is_present(&self.password)
    }
    pub fn has_authentication_method_id(&self) -> bool {
        is_present(&self.authentication_method_id)
    }
    pub fn has_sca_authentication_data(&self) -> bool {
        is_present(&self.sca_authentication_data)
    }
    pub fn confirmation_code_received(&self) -> bool {
        is_present(&self.confirmation_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_not_a_token() {
        let ctx = RequestContext::new("tpp_1").set_oauth_token("  ");
        assert!(!ctx.has_bearer_token());

        let ctx = ctx.set_oauth_token("eyJhbGciOi");
        assert!(ctx.has_bearer_token());
    }

    #[test]
    fn blank_confirmation_code_is_not_received() {
        let request = UpdatePsuDataRequest::new("consent_1", "auth_1").set_confirmation_code("");
        assert!(!request.confirmation_code_received());
    }
}
