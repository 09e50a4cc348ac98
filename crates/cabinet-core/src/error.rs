use thiserror::Error;

/// Failure reported by the remote content service for one call.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ServiceError {
    #[error("connection has not been opened")]
    NotConnected,

    /// The service accepted the call and rejected it, usually with a
    /// machine-readable code alongside the message.
    #[error("{message}")]
    Remote { code: Option<String>, message: String },

    /// The call never completed (socket, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response from service: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote { code: None, message: message.into() }
    }

    pub fn remote_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote { code: Some(code.into()), message: message.into() }
    }
}

/// Rejection of an operation payload before any remote call is made.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("validation error: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
