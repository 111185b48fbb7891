//! Conduit call protocol client
//!
//! Implements the signed `conduit.connect` handshake, the install-token
//! certificate exchange, and the synchronous call protocol: POST the
//! URL-encoded argument map to `<api_url><method>`, decode the response
//! envelope, and interpret it as success or failure.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ConduitError, Result};
use crate::session::{auth_signature, unix_time_secs, Session};
use crate::transport::{HttpTransport, Transport};
use crate::types::{CallArguments, Credential, ResponseEnvelope};

/// Client name reported during the handshake
const CLIENT_NAME: &str = "conduit-client";

/// Conduit client protocol version reported during the handshake
const CLIENT_VERSION: u64 = 6;

/// Reserved argument key carrying session credentials
const CONDUIT_META_KEY: &str = "__conduit__";

/// Fields of a successful `conduit.connect` result
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectResult {
    session_key: String,
    #[serde(rename = "connectionID")]
    connection_id: i64,
}

/// Client for one Conduit endpoint.
///
/// Holds the session negotiated at construction time and a shared transport.
/// All calls go through [`call`](Self::call); the raw envelope of the most
/// recent response stays readable through
/// [`previous_response`](Self::previous_response).
pub struct ConduitClient {
    session: Session,
    transport: Arc<dyn Transport>,
    previous_response: RwLock<Option<ResponseEnvelope>>,
}

impl std::fmt::Debug for ConduitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConduitClient")
            .field("session", &self.session)
            .field("previous_response", &self.previous_response)
            .finish_non_exhaustive()
    }
}

impl ConduitClient {
    /// Client with no session, for the handshake itself and for the methods
    /// Conduit serves unauthenticated (`conduit.ping`, `conduit.connect`,
    /// `conduit.getcertificate`).
    pub fn anonymous(api_url: impl Into<String>) -> Self {
        Self::with_session(Session::anonymous(api_url), Arc::new(HttpTransport::new()))
    }

    /// Anonymous client over a caller-supplied transport.
    pub fn anonymous_with_transport(
        api_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_session(Session::anonymous(api_url), transport)
    }

    fn with_session(session: Session, transport: Arc<dyn Transport>) -> Self {
        Self {
            session,
            transport,
            previous_response: RwLock::new(None),
        }
    }

    /// Establish an authenticated client from a username and certificate.
    ///
    /// Runs the signed `conduit.connect` handshake once; there is no retry.
    /// Fails with [`ConduitError::Handshake`] when the remote rejects the
    /// signature or answers without the expected session fields.
    pub async fn connect(username: &str, certificate: &str, api_url: &str) -> Result<Self> {
        Self::connect_with_transport(
            username,
            certificate,
            api_url,
            Arc::new(HttpTransport::new()),
        )
        .await
    }

    /// Establish an authenticated client from an exchanged credential.
    pub async fn connect_with_credential(credential: &Credential, api_url: &str) -> Result<Self> {
        Self::connect(&credential.username, &credential.certificate, api_url).await
    }

    /// [`connect`](Self::connect) over a caller-supplied transport.
    pub async fn connect_with_transport(
        username: &str,
        certificate: &str,
        api_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let bootstrap = Self::anonymous_with_transport(api_url, Arc::clone(&transport));

        // Token and signature must come from the same instant.
        let auth_token = unix_time_secs();
        let signature = auth_signature(auth_token, certificate);

        let mut args = CallArguments::new();
        args.insert("client".to_string(), Value::from(CLIENT_NAME));
        args.insert("clientVersion".to_string(), Value::from(CLIENT_VERSION));
        args.insert("user".to_string(), Value::from(username));
        args.insert("authToken".to_string(), Value::from(auth_token));
        args.insert("authSignature".to_string(), Value::from(signature));
        args.insert("host".to_string(), Value::from(api_url));

        let result = bootstrap
            .call("conduit.connect", &args)
            .await
            .map_err(|e| ConduitError::Handshake(e.to_string()))?;

        let connect: ConnectResult = serde_json::from_value(result).map_err(|e| {
            ConduitError::Handshake(format!("unexpected conduit.connect result: {e}"))
        })?;

        debug!(
            user = %username,
            connection_id = connect.connection_id,
            "Conduit session established"
        );

        Ok(Self::with_session(
            Session::authenticated(api_url, connect.session_key, connect.connection_id),
            transport,
        ))
    }

    /// Trade a one-time install token for a username/certificate pair via
    /// `conduit.getcertificate`.
    pub async fn exchange_certificate(token: &str, api_url: &str) -> Result<Credential> {
        Self::exchange_certificate_with_transport(token, api_url, Arc::new(HttpTransport::new()))
            .await
    }

    /// [`exchange_certificate`](Self::exchange_certificate) over a
    /// caller-supplied transport.
    pub async fn exchange_certificate_with_transport(
        token: &str,
        api_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Credential> {
        let client = Self::anonymous_with_transport(api_url, transport);

        let mut args = CallArguments::new();
        args.insert("host".to_string(), Value::from(api_url));
        args.insert("token".to_string(), Value::from(token));

        let result = client
            .call("conduit.getcertificate", &args)
            .await
            .map_err(|e| ConduitError::CertificateExchange(e.to_string()))?;

        serde_json::from_value(result).map_err(|e| {
            ConduitError::CertificateExchange(format!(
                "unexpected conduit.getcertificate result: {e}"
            ))
        })
    }

    /// Run a Conduit method and interpret the envelope: a remote error code
    /// fails the call, otherwise the `result` value is handed back in
    /// whatever JSON shape the method produced.
    ///
    /// Session credentials are attached to a copy of the argument map when
    /// the client is authenticated; the caller's map is never touched.
    pub async fn call(&self, method: &str, args: &CallArguments) -> Result<Value> {
        self.call_raw(method, args).await?.into_result()
    }

    /// Run a Conduit method and hand back the full response envelope.
    ///
    /// Remote failures stay inside the envelope; only transport and decode
    /// failures surface as `Err`. Most callers want [`call`](Self::call).
    pub async fn call_raw(&self, method: &str, args: &CallArguments) -> Result<ResponseEnvelope> {
        let mut outgoing = args.clone();
        if let Some(meta) = self.session.conduit_meta() {
            outgoing.insert(CONDUIT_META_KEY.to_string(), meta);
        }

        let params = serde_json::to_string(&Value::Object(outgoing))?;
        let url = format!("{}{}", self.session.api_url(), method);
        let body = format!("params={}", urlencoding::encode(&params));

        debug!(method = %method, bytes = body.len(), "Sending Conduit call");

        let text = self.transport.post(&url, body).await?;
        let envelope = ResponseEnvelope::from_json(&text)?;

        if let Some(code) = envelope.error_code.as_deref() {
            warn!(method = %method, code = %code, "Conduit call failed");
        }

        let mut previous = self.previous_response.write().await;
        *previous = Some(envelope.clone());

        Ok(envelope)
    }

    /// The envelope of the most recent response seen by this client, if any.
    ///
    /// Lets callers read envelope-level fields directly, e.g. the raw string
    /// result of `conduit.ping`.
    pub async fn previous_response(&self) -> Option<ResponseEnvelope> {
        self.previous_response.read().await.clone()
    }

    /// The session this client runs calls under.
    pub fn session(&self) -> &Session {
        &self.session
    }
}
