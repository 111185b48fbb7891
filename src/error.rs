//! Error types for the Conduit client

use thiserror::Error;

/// Errors surfaced by Conduit operations.
///
/// The remote reports its own failures inside the response envelope; those
/// become [`ConduitError::Remote`]. Everything else is a local failure on
/// the way to or from the wire.
#[derive(Debug, Error)]
pub enum ConduitError {
    /// Network or HTTP-level failure before an envelope could be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not a well-formed Conduit envelope
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The remote API reported a failure through the envelope
    #[error("Conduit API returned {code}: {info}")]
    Remote { code: String, info: String },

    /// Session negotiation was rejected or answered with an unusable result
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Install-token exchange was rejected or answered with an unusable result
    #[error("Certificate exchange failed: {0}")]
    CertificateExchange(String),

    /// The operation was started without the settings it needs
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local filesystem failure while persisting a download
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConduitError {
    /// Stable machine-readable slug for this error kind.
    ///
    /// The async scheduler uses it as the `error_code` of envelopes it
    /// synthesizes for calls that failed before the remote could answer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::MalformedResponse(_) => "malformed-response",
            Self::Remote { .. } => "remote",
            Self::Handshake(_) => "handshake",
            Self::CertificateExchange(_) => "certificate-exchange",
            Self::Config(_) => "configuration",
            Self::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for ConduitError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ConduitError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Result type for Conduit operations
pub type Result<T> = std::result::Result<T, ConduitError>;
