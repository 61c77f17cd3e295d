//! Error types for SSO operations.

use thiserror::Error;

/// Result type for SSO operations.
pub type SsoResult<T> = Result<T, SsoError>;

/// Errors raised by the SSO layer.
///
/// An invalid session is not an error: validity checks return `bool`.
#[derive(Debug, Error)]
pub enum SsoError {
    /// Required preset settings are missing or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No configuration was registered under this preset name.
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// The persisted session blob could not be decoded.
    #[error("Malformed persisted session: {0}")]
    MalformedSession(String),

    /// The session-check endpoint could not give an answer.
    #[error("Remote session validation failed: {0}")]
    RemoteValidation(#[from] RemoteValidationError),

    /// A posted SAML response was rejected.
    #[error("Invalid SAML response: {0}")]
    InvalidResponse(String),

    /// Compressing or encoding a message failed.
    #[error("Encoding error: {0}")]
    Encoding(#[from] std::io::Error),

    /// The host session store failed.
    #[error("Session store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Why the session-check endpoint gave no usable answer.
#[derive(Debug, Error)]
pub enum RemoteValidationError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("unparsable body: {0}")]
    Body(String),
}

impl SsoError {
    /// True when the remote authority could not be reached or understood,
    /// as opposed to answering that the session is invalid.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, SsoError::RemoteValidation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_unavailable_classification() {
        let err: SsoError = RemoteValidationError::Status(503).into();
        assert!(err.is_remote_unavailable());
        assert!(err.to_string().contains("503"));

        let err = SsoError::Configuration("acs_url is required".to_string());
        assert!(!err.is_remote_unavailable());
    }
}
