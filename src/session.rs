//! Session state and handshake authentication
//!
//! A Conduit session is negotiated once through the signed
//! `conduit.connect` handshake and then attached verbatim to every
//! authenticated call as the reserved `__conduit__` argument.

use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use std::time::{SystemTime, UNIX_EPOCH};

/// Authentication state for one Conduit endpoint.
///
/// Constructed once, anonymous or out of a successful handshake, and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct Session {
    api_url: String,
    session_key: Option<String>,
    connection_id: Option<i64>,
}

impl Session {
    /// Session for unauthenticated calls: the handshake itself, certificate
    /// exchange, and the handful of methods Conduit serves without auth.
    pub fn anonymous(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            session_key: None,
            connection_id: None,
        }
    }

    /// Session carrying the credentials of a completed handshake.
    pub fn authenticated(
        api_url: impl Into<String>,
        session_key: impl Into<String>,
        connection_id: i64,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            session_key: Some(session_key.into()),
            connection_id: Some(connection_id),
        }
    }

    /// The API base URL this session talks to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Session key negotiated by the handshake, if any.
    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    /// Connection ID negotiated by the handshake, if any.
    pub fn connection_id(&self) -> Option<i64> {
        self.connection_id
    }

    /// True when this session carries usable credentials.
    ///
    /// A connection ID of -1 is the remote's marker for an unauthenticated
    /// connection and does not count.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            (self.session_key.as_ref(), self.connection_id),
            (Some(_), Some(id)) if id != -1
        )
    }

    /// The `__conduit__` metadata attached to authenticated calls, or
    /// `None` for sessions with no usable credentials.
    pub fn conduit_meta(&self) -> Option<Value> {
        if !self.is_authenticated() {
            return None;
        }

        Some(json!({
            "sessionKey": self.session_key,
            "connectionID": self.connection_id,
        }))
    }
}

/// Compute the handshake signature: hex-encoded SHA-1 of the decimal auth
/// token concatenated with the certificate.
pub fn auth_signature(auth_token: u64, certificate: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(auth_token.to_string().as_bytes());
    hasher.update(certificate.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current unix time in seconds, used as the handshake auth token.
pub fn unix_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_session_is_not_authenticated() {
        let session = Session::anonymous("https://phabricator.example.com/api/");
        assert!(!session.is_authenticated());
        assert!(session.conduit_meta().is_none());
        assert_eq!(session.session_key(), None);
        assert_eq!(session.connection_id(), None);
    }

    #[test]
    fn test_authenticated_session() {
        let session =
            Session::authenticated("https://phabricator.example.com/api/", "key-123", 42);
        assert!(session.is_authenticated());
        assert_eq!(session.session_key(), Some("key-123"));
        assert_eq!(session.connection_id(), Some(42));
    }

    #[test]
    fn test_connection_id_minus_one_is_not_authenticated() {
        let session =
            Session::authenticated("https://phabricator.example.com/api/", "key-123", -1);
        assert!(!session.is_authenticated());
        assert!(session.conduit_meta().is_none());
    }

    #[test]
    fn test_conduit_meta_shape() {
        let session =
            Session::authenticated("https://phabricator.example.com/api/", "key-123", 42);
        let meta = session.conduit_meta().unwrap();
        assert_eq!(meta["sessionKey"], "key-123");
        assert_eq!(meta["connectionID"], 42);
    }

    #[test]
    fn test_auth_signature_known_vector() {
        // SHA-1 of "1" + "23" == SHA-1 of "123"
        assert_eq!(
            auth_signature(1, "23"),
            "40bd001563085fc35165329ea1ff5c5ecbdbbeef"
        );
    }

    #[test]
    fn test_auth_signature_is_deterministic() {
        let a = auth_signature(1_700_000_000, "secret-certificate");
        let b = auth_signature(1_700_000_000, "secret-certificate");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);

        let other = auth_signature(1_700_000_000, "different-certificate");
        assert_ne!(a, other);
    }

    #[test]
    fn test_unix_time_is_plausible() {
        // 2023-01-01 onwards
        assert!(unix_time_secs() > 1_672_531_200);
    }
}
