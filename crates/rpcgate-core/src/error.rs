//! Shared error type across rpcgate crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request or configuration.
    BadRequest,
    /// Caller identity missing or unknown to the access policy.
    Unauthenticated,
    /// Caller is known but the method is not in its allowlist.
    PermissionDenied,
    /// No handler registered for the method.
    NotFound,
    /// Server is draining or the stream peer went away.
    Unavailable,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unauthenticated => "UNAUTHENTICATED",
            ClientCode::PermissionDenied => "PERMISSION_DENIED",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status the transport answers with.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::BadRequest | ClientCode::UnsupportedVersion => 400,
            ClientCode::Unauthenticated => 401,
            ClientCode::PermissionDenied => 403,
            ClientCode::NotFound => 404,
            ClientCode::Unavailable => 503,
            ClientCode::Internal => 500,
        }
    }

    /// True for the two authorization-denial categories.
    pub fn is_denial(self) -> bool {
        matches!(self, ClientCode::Unauthenticated | ClientCode::PermissionDenied)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GateError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl GateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            GateError::BadRequest(_) => ClientCode::BadRequest,
            GateError::Unauthenticated(_) => ClientCode::Unauthenticated,
            GateError::PermissionDenied(_) => ClientCode::PermissionDenied,
            GateError::NotFound(_) => ClientCode::NotFound,
            GateError::Unavailable(_) => ClientCode::Unavailable,
            GateError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            GateError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Message safe to hand to a remote caller. Internal details stay in logs.
    pub fn client_message(&self) -> String {
        match self {
            GateError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
