//! The outcome every gating rule returns
use super::error::{ErrorType, MessageErrorCode, ServiceType};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCategory {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TppMessage {
    pub category: MessageCategory,
    pub code: MessageErrorCode,
    pub text: Option<String>,
}

impl TppMessage {
    pub fn of(code: MessageErrorCode) -> Self {
        Self {
            category: MessageCategory::Error,
            code,
            text: None,
        }
    }
    pub fn with_text(code: MessageErrorCode, text: impl Into<String>) -> Self {
        Self {
            category: MessageCategory::Error,
            code,
            text: Some(text.into()),
        }
    }
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or(self.code.default_text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageError {
    pub error_type: ErrorType,
    pub tpp_messages: Vec<TppMessage>,
}

impl MessageError {
    /// Builds an error in the namespace of `service` with the status the code mandates.
    pub fn new(service: ServiceType, message: TppMessage) -> Self {
        Self {
            error_type: ErrorType::new(service, message.code.http_status()),
            tpp_messages: vec![message],
        }
    }
    pub fn of(service: ServiceType, code: MessageErrorCode) -> Self {
        Self::new(service, TppMessage::of(code))
    }
    /// The first message code, which is what decides the response.
    pub fn code(&self) -> Option<MessageErrorCode> {
        self.tpp_messages.first().map(|m| m.code)
    }
    pub fn http_status(&self) -> u16 {
        self.error_type.status
    }
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error_type: self.error_type,
            tpp_messages: self
                .tpp_messages
                .iter()
                .map(|m| TppMessagePayload {
                    category: m.category,
                    code: m.code.name(),
                    text: m.text().to_string(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{} {code}", self.error_type),
            None => write!(f, "{}", self.error_type),
        }
    }
}

impl std::error::Error for MessageError {}

/// Decision of a single rule. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum ValidationResult {
    Valid,
    Invalid(MessageError),
}

impl ValidationResult {
    pub fn valid() -> Self {
        ValidationResult::Valid
    }
    pub fn invalid(error: MessageError) -> Self {
        ValidationResult::Invalid(error)
    }
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
    pub fn is_not_valid(&self) -> bool {
        !self.is_valid()
    }
    pub fn message_error(&self) -> Option<&MessageError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(error) => Some(error),
        }
    }
    /// Continues with `next` only while valid, so the first failing rule wins.
    pub fn and_then(self, next: impl FnOnce() -> ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Valid => next(),
            invalid => invalid,
        }
    }
    pub fn into_result(self) -> Result<(), MessageError> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(error) => Err(error),
        }
    }
}

impl From<Result<(), MessageError>> for ValidationResult {
    fn from(value: Result<(), MessageError>) -> Self {
        match value {
            Ok(()) => ValidationResult::Valid,
            Err(error) => ValidationResult::Invalid(error),
        }
    }
}

/// PSD2 error body: `{errorType, tppMessages: [{category, code, text}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_type: ErrorType,
    pub tpp_messages: Vec<TppMessagePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TppMessagePayload {
    pub category: MessageCategory,
    pub code: &'static str,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_short_circuits() {
        let mut later_ran = false;
        let result = ValidationResult::invalid(MessageError::of(
            ServiceType::Pis,
            MessageErrorCode::Forbidden,
        ))
        .and_then(|| {
            later_ran = true;
            ValidationResult::valid()
        });

        assert!(!later_ran);
        assert_eq!(
            result.message_error().unwrap().error_type.to_string(),
            "PIS_403"
        );
    }

    #[test]
    fn payload_falls_back_to_default_text() {
        let error = MessageError::of(ServiceType::Ais, MessageErrorCode::FormatErrorNoPsu);
        let payload = error.to_payload();

        assert_eq!(payload.tpp_messages[0].code, "FORMAT_ERROR");
        assert_eq!(
            payload.tpp_messages[0].text,
            "Please provide the PSU identification data"
        );
    }
}
