//! Background execution and polling for Conduit calls
//!
//! Runs one call off the caller's task and reports the outcome through
//! injected callbacks:
//!
//! - a worker task performs the handshake and the call, then publishes the
//!   response envelope into a shared completion slot
//! - a poller task checks the slot on a fixed interval and fires
//!   `on_completed` with the envelope, or `on_timeout` once the configured
//!   number of checks is exhausted
//!
//! Failures on the worker side (handshake, transport, decoding) are
//! repackaged as error-shaped envelopes, so callers observe every outcome
//! except a genuine timeout through `on_completed`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::ConduitClient;
use crate::error::{ConduitError, Result};
use crate::transport::{HttpTransport, Transport};
use crate::types::{CallArguments, ConnectionInfo, PollConfig, ResponseEnvelope};

type CompletionSlot = Arc<Mutex<Option<ResponseEnvelope>>>;

/// One Conduit call prepared to run in the background.
///
/// Build with [`new`](Self::new), supply connection settings with
/// [`with_connection_info`](Self::with_connection_info), then hand the
/// outcome callbacks to [`start`](Self::start).
pub struct AsyncConduitCall {
    method: String,
    args: CallArguments,
    connection: Option<ConnectionInfo>,
    poll: PollConfig,
    transport: Arc<dyn Transport>,
}

impl AsyncConduitCall {
    /// Prepare `method` with `args` for background execution.
    pub fn new(method: impl Into<String>, args: CallArguments) -> Self {
        Self {
            method: method.into(),
            args,
            connection: None,
            poll: PollConfig::default(),
            transport: Arc::new(HttpTransport::new()),
        }
    }

    /// Connection settings used for the worker's own handshake. Required
    /// before [`start`](Self::start).
    pub fn with_connection_info(
        mut self,
        username: impl Into<String>,
        certificate: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        self.connection = Some(ConnectionInfo {
            username: username.into(),
            certificate: certificate.into(),
            api_url: api_url.into(),
        });
        self
    }

    /// Override the polling discipline.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Run the call over a caller-supplied transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Spawn the worker and poller tasks.
    ///
    /// Exactly one of the callbacks fires, from the poller task: if the
    /// worker has published an envelope by one of the completion checks,
    /// `on_completed` receives it; after `max_attempts` checks with nothing
    /// published, `on_timeout` fires and the in-flight call is left to
    /// finish in the background.
    ///
    /// Fails with [`ConduitError::Config`] when no connection settings were
    /// supplied; nothing is spawned in that case.
    pub fn start<C, T>(self, on_completed: C, on_timeout: T) -> Result<AsyncCallHandle>
    where
        C: FnOnce(ResponseEnvelope) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let connection = self.connection.ok_or_else(|| {
            ConduitError::Config(
                "a username, certificate, and API URL are required before starting".to_string(),
            )
        })?;

        let slot: CompletionSlot = Arc::new(Mutex::new(None));
        let attempts = Arc::new(AtomicU32::new(0));

        let worker = tokio::spawn(run_call(
            connection,
            self.method,
            self.args,
            self.transport,
            Arc::clone(&slot),
        ));

        let poller = tokio::spawn(poll_until_settled(
            Arc::clone(&slot),
            self.poll,
            Arc::clone(&attempts),
            on_completed,
            on_timeout,
        ));

        Ok(AsyncCallHandle {
            worker,
            poller,
            slot,
            attempts,
        })
    }
}

/// Worker body: one handshake plus one call. Every failure is repackaged as
/// a completed error envelope so the poller always has a verdict to report.
async fn run_call(
    connection: ConnectionInfo,
    method: String,
    args: CallArguments,
    transport: Arc<dyn Transport>,
    slot: CompletionSlot,
) {
    let envelope = match execute(&connection, &method, &args, transport).await {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(method = %method, error = %err, "Async Conduit call failed");
            ResponseEnvelope::from_error(&err)
        }
    };

    *slot.lock().await = Some(envelope);
}

async fn execute(
    connection: &ConnectionInfo,
    method: &str,
    args: &CallArguments,
    transport: Arc<dyn Transport>,
) -> Result<ResponseEnvelope> {
    let client = ConduitClient::connect_with_transport(
        &connection.username,
        &connection.certificate,
        &connection.api_url,
        transport,
    )
    .await?;

    client.call_raw(method, args).await
}

/// Poller body: checks the completion slot once per interval, up to
/// `max_attempts` times, then declares a timeout. Invokes exactly one of
/// the two callbacks.
async fn poll_until_settled<C, T>(
    slot: CompletionSlot,
    poll: PollConfig,
    attempts: Arc<AtomicU32>,
    on_completed: C,
    on_timeout: T,
) where
    C: FnOnce(ResponseEnvelope) + Send + 'static,
    T: FnOnce() + Send + 'static,
{
    for _ in 0..poll.max_attempts {
        tokio::time::sleep(poll.interval).await;
        attempts.fetch_add(1, Ordering::SeqCst);

        let settled = slot.lock().await.clone();
        if let Some(envelope) = settled {
            debug!(
                attempts = attempts.load(Ordering::SeqCst),
                "Async Conduit call completed"
            );
            on_completed(envelope);
            return;
        }
    }

    debug!(attempts = poll.max_attempts, "Async Conduit call timed out");
    on_timeout();
}

/// Handle to a started async call.
#[derive(Debug)]
pub struct AsyncCallHandle {
    worker: JoinHandle<()>,
    poller: JoinHandle<()>,
    slot: CompletionSlot,
    attempts: Arc<AtomicU32>,
}

impl AsyncCallHandle {
    /// Wait until the poller has delivered its verdict, completion or
    /// timeout. Call at most once; after a timeout verdict the worker may
    /// still be running and is left alone.
    pub async fn join(&mut self) {
        let _ = (&mut self.poller).await;
    }

    /// Number of completion checks performed so far.
    pub fn attempts_made(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// True once the worker has published a response envelope.
    pub async fn is_completed(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Abandon the call: stops the worker and the poller. Neither callback
    /// fires after an abort.
    pub fn abort(&self) {
        self.worker.abort();
        self.poller.abort();
    }
}
