//! Core data types for the Conduit protocol

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{ConduitError, Result};

/// Default delay between completion checks of an async call
pub const CALL_COMPLETION_DELAY: Duration = Duration::from_millis(500);

/// Default number of completion checks before an async call times out
pub const MAX_RETRIES: u32 = 10;

/// Argument map for a Conduit method: string keys to arbitrary JSON values
pub type CallArguments = Map<String, Value>;

/// A username/certificate pair used to establish authenticated sessions.
///
/// Obtained from the user's Phabricator settings page, or programmatically
/// through [`ConduitClient::exchange_certificate`](crate::ConduitClient::exchange_certificate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub certificate: String,
}

/// Connection settings the async scheduler uses to establish its own session
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub username: String,
    pub certificate: String,
    pub api_url: String,
}

/// Polling discipline for async calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between completion checks
    pub interval: Duration,
    /// Number of completion checks before the call is declared timed out
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: CALL_COMPLETION_DELAY,
            max_attempts: MAX_RETRIES,
        }
    }
}

/// The `{result, error_code, error_info}` wrapper every Conduit response
/// arrives in.
///
/// `result` distinguishes an absent key (`None`) from a present JSON null
/// (`Some(Value::Null)`); some methods legitimately answer null.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// Decoded `result` value, `None` when the key was missing from the body
    pub result: Option<Value>,
    /// Remote error code, when the call failed on the server
    pub error_code: Option<String>,
    /// Human-readable description accompanying `error_code`
    pub error_info: Option<String>,
}

impl ResponseEnvelope {
    /// Parse a raw response body into an envelope.
    ///
    /// Fails with [`ConduitError::MalformedResponse`] when the body is not
    /// a JSON object.
    pub fn from_json(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        let object = match value {
            Value::Object(object) => object,
            _ => {
                return Err(ConduitError::MalformedResponse(
                    "response body is not a JSON object".to_string(),
                ))
            }
        };

        Ok(Self {
            result: object.get("result").cloned(),
            error_code: optional_string(&object, "error_code"),
            error_info: optional_string(&object, "error_info"),
        })
    }

    /// True when the remote reported a failure for this call.
    pub fn is_error(&self) -> bool {
        self.error_code.is_some()
    }

    /// Interpret the envelope as the outcome of a call.
    ///
    /// An error code wins over any result payload. An envelope carrying
    /// neither a result key nor an error code is malformed.
    pub fn into_result(self) -> Result<Value> {
        if let Some(code) = self.error_code {
            return Err(ConduitError::Remote {
                code,
                info: self.error_info.unwrap_or_default(),
            });
        }

        match self.result {
            Some(value) => Ok(value),
            None => Err(ConduitError::MalformedResponse(
                "envelope carries neither a result nor an error code".to_string(),
            )),
        }
    }

    /// Envelope standing in for a call that failed before the remote could
    /// answer. The error kind becomes the code, the display text the info.
    pub fn from_error(err: &ConduitError) -> Self {
        let (code, info) = match err {
            ConduitError::Remote { code, info } => (code.clone(), info.clone()),
            other => (other.kind().to_string(), other.to_string()),
        };

        Self {
            result: None,
            error_code: Some(code),
            error_info: Some(info),
        }
    }
}

/// Read an optional string field, treating JSON null the same as absence.
fn optional_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}
