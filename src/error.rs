//! PSD2 error vocabulary and infrastructure errors
use serde::Serialize;
use std::fmt;

/// Resource namespace an error is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Ais,
    Pis,
    Piis,
}

impl ServiceType {
    pub fn prefix(&self) -> &'static str {
        match self {
            ServiceType::Ais => "AIS",
            ServiceType::Pis => "PIS",
            ServiceType::Piis => "PIIS",
        }
    }
}

/// `AIS_401`, `PIS_403`, ... The status is always the one mandated by the message code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorType {
    pub service: ServiceType,
    pub status: u16,
}

impl ErrorType {
    pub fn new(service: ServiceType, status: u16) -> Self {
        Self { service, status }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.service.prefix(), self.status)
    }
}

impl Serialize for ErrorType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageErrorCode {
    FormatError,
    FormatErrorNoPsu,
    ParameterNotSupported,
    PeriodInvalid,
    ServiceInvalid400,
    ServiceInvalid405,
    ServiceBlocked,
    SessionsNotSupported,
    PsuCredentialsInvalid,
    Unauthorized,
    Forbidden,
    ConsentInvalid,
    ConsentInvalidRevoked,
    ConsentExpired,
    ConsentUnknown403,
    NoPiisActivation,
    AccessExceeded,
    ResourceUnknown403,
    ResourceUnknown404,
    StatusInvalid,
}

impl MessageErrorCode {
    pub fn http_status(&self) -> u16 {
        use MessageErrorCode::*;
        match self {
            FormatError | FormatErrorNoPsu | ParameterNotSupported | PeriodInvalid
            | ServiceInvalid400 | SessionsNotSupported | NoPiisActivation => 400,
            PsuCredentialsInvalid | Unauthorized | ConsentInvalid | ConsentInvalidRevoked
            | ConsentExpired => 401,
            Forbidden | ServiceBlocked | ConsentUnknown403 | ResourceUnknown403 => 403,
            ResourceUnknown404 => 404,
            ServiceInvalid405 => 405,
            StatusInvalid => 409,
            AccessExceeded => 429,
        }
    }

    /// The code as it appears on the wire. Variants sharing a wire name differ only in text.
    pub fn name(&self) -> &'static str {
        use MessageErrorCode::*;
        match self {
            FormatError | FormatErrorNoPsu => "FORMAT_ERROR",
            ParameterNotSupported => "PARAMETER_NOT_SUPPORTED",
            PeriodInvalid => "PERIOD_INVALID",
            ServiceInvalid400 | ServiceInvalid405 => "SERVICE_INVALID",
            ServiceBlocked => "SERVICE_BLOCKED",
            SessionsNotSupported => "SESSIONS_NOT_SUPPORTED",
            PsuCredentialsInvalid => "PSU_CREDENTIALS_INVALID",
            Unauthorized => "UNAUTHORIZED",
            Forbidden => "FORBIDDEN",
            ConsentInvalid | ConsentInvalidRevoked => "CONSENT_INVALID",
            ConsentExpired => "CONSENT_EXPIRED",
            ConsentUnknown403 => "CONSENT_UNKNOWN",
            NoPiisActivation => "NO_PIIS_ACTIVATION",
            AccessExceeded => "ACCESS_EXCEEDED",
            ResourceUnknown403 | ResourceUnknown404 => "RESOURCE_UNKNOWN",
            StatusInvalid => "STATUS_INVALID",
        }
    }

    pub fn default_text(&self) -> &'static str {
        use MessageErrorCode::*;
        match self {
            FormatError => "Format of certain request fields are not matching the requirements",
            FormatErrorNoPsu => "Please provide the PSU identification data",
            ParameterNotSupported => "The parameter is not supported by the ASPSP",
            PeriodInvalid => "Requested time period out of bound",
            ServiceInvalid400 => {
                "The addressed service is not valid for the addressed resources or the submitted data"
            }
            ServiceInvalid405 => "The addressed service is not valid for the addressed resources",
            ServiceBlocked => "This service is not reachable for the addressed PSU due to a channel independent blocking",
            SessionsNotSupported => "Sessions are not supported by ASPSP",
            PsuCredentialsInvalid => "The PSU-ID cannot be matched by the addressed ASPSP",
            Unauthorized => "The TPP or the PSU is not correctly authorized to perform the request",
            Forbidden => "Token is not valid for the addressed service/resource",
            ConsentInvalid => "The consent is not valid for the addressed service/resource",
            ConsentInvalidRevoked => "Consent was revoked by PSU",
            ConsentExpired => "The consent has expired and needs to be renewed",
            ConsentUnknown403 => "The consent cannot be matched by the ASPSP relative to the TPP",
            NoPiisActivation => {
                "The PSU has not activated the addressed account for the usage of the PIIS associated with the TPP"
            }
            AccessExceeded => "The access on the account has been exceeding the consented multiplicity per day",
            ResourceUnknown403 | ResourceUnknown404 => "The addressed resource is unknown",
            StatusInvalid => "The addressed resource does not allow additional authorisation",
        }
    }
}

impl fmt::Display for MessageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Sled operation failed: {0}")]
    Sled(#[from] sled::Error),
    #[error("Failed to encode record: {0}")]
    Encode(String),
    #[error("Failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Record {0} was not found")]
    NotFound(String),
    #[error("Record {id} was modified concurrently. Expected version {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },
    #[error("Usage counter for {resource} on consent {consent_id} is exhausted")]
    UsageExhausted { consent_id: String, resource: String },
    #[error("Terms of valid consent {0} cannot be changed")]
    ChecksumMismatch(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read ASPSP profile: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse ASPSP profile: {0}")]
    Toml(#[from] toml::de::Error),
}
