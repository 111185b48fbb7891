//! End-to-end flow over a scripted transport: certificate exchange, signed
//! handshake, authenticated calls, and the background call scheduler.

use async_trait::async_trait;
use conduit_client::{
    AsyncConduitCall, CallArguments, ConduitClient, ConduitError, PollConfig, ResponseEnvelope,
    Result, Transport,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

const API_URL: &str = "https://phabricator.example.com/api/";

/// Replays scripted response bodies and records every request.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    fn new(replies: &[&str]) -> Arc<Self> {
        let transport = Self::default();
        transport
            .replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| r.to_string()));
        Arc::new(transport)
    }

    fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, url: &str, body: String) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ConduitError::Transport("no reply scripted".to_string()))
    }
}

fn decode_params(body: &str) -> Value {
    let encoded = body.strip_prefix("params=").expect("params field");
    let json = urlencoding::decode(encoded).expect("params should be percent-encoded");
    serde_json::from_str(&json).expect("params should be valid JSON")
}

#[tokio::test]
async fn test_certificate_exchange_then_authenticated_calls() {
    let transport = ScriptedTransport::new(&[
        // conduit.getcertificate
        r#"{"result":{"username":"alice","certificate":"cert-payload"},"error_code":null,"error_info":null}"#,
        // conduit.connect
        r#"{"result":{"sessionKey":"session-key-9","connectionID":31},"error_code":null,"error_info":null}"#,
        // user.whoami
        r#"{"result":{"userName":"alice","phid":"PHID-USER-1"},"error_code":null,"error_info":null}"#,
        // conduit.ping
        r#"{"result":"phab01.example.com","error_code":null,"error_info":null}"#,
    ]);

    let credential = ConduitClient::exchange_certificate_with_transport(
        "install-token",
        API_URL,
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .await
    .unwrap();
    assert_eq!(credential.username, "alice");

    let client = ConduitClient::connect_with_transport(
        &credential.username,
        &credential.certificate,
        API_URL,
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .await
    .unwrap();
    assert!(client.session().is_authenticated());

    let me = client
        .call("user.whoami", &CallArguments::new())
        .await
        .unwrap();
    assert_eq!(me["userName"], "alice");

    let pong = client
        .call("conduit.ping", &CallArguments::new())
        .await
        .unwrap();
    assert_eq!(pong, Value::from("phab01.example.com"));

    let envelope = client.previous_response().await.unwrap();
    assert_eq!(envelope.result, Some(Value::from("phab01.example.com")));

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].0, format!("{API_URL}conduit.getcertificate"));
    assert_eq!(requests[1].0, format!("{API_URL}conduit.connect"));
    assert_eq!(requests[2].0, format!("{API_URL}user.whoami"));

    // The handshake itself is anonymous, later calls carry the session.
    let connect_params = decode_params(&requests[1].1);
    assert!(connect_params.get("__conduit__").is_none());
    assert_eq!(connect_params["user"], "alice");

    let whoami_params = decode_params(&requests[2].1);
    assert_eq!(whoami_params["__conduit__"]["sessionKey"], "session-key-9");
    assert_eq!(whoami_params["__conduit__"]["connectionID"], 31);
}

#[tokio::test]
async fn test_background_call_completes() {
    let transport = ScriptedTransport::new(&[
        r#"{"result":{"sessionKey":"session-key-9","connectionID":31},"error_code":null,"error_info":null}"#,
        r#"{"result":{"userName":"alice"},"error_code":null,"error_info":null}"#,
    ]);

    let (completed_tx, mut completed_rx) = oneshot::channel::<ResponseEnvelope>();
    let (timeout_tx, mut timeout_rx) = oneshot::channel::<()>();

    let mut handle = AsyncConduitCall::new("user.whoami", CallArguments::new())
        .with_connection_info("alice", "cert-payload", API_URL)
        .with_poll_config(PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: 10,
        })
        .with_transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .start(
            move |envelope| {
                let _ = completed_tx.send(envelope);
            },
            move || {
                let _ = timeout_tx.send(());
            },
        )
        .unwrap();

    handle.join().await;

    let envelope = completed_rx.try_recv().expect("call should complete");
    assert_eq!(envelope.result.unwrap()["userName"], "alice");
    assert!(timeout_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_background_call_times_out_when_nothing_answers() {
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        async fn post(&self, _url: &str, _body: String) -> Result<String> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    let (completed_tx, mut completed_rx) = oneshot::channel::<ResponseEnvelope>();
    let (timeout_tx, mut timeout_rx) = oneshot::channel::<()>();

    let mut handle = AsyncConduitCall::new("user.whoami", CallArguments::new())
        .with_connection_info("alice", "cert-payload", API_URL)
        .with_poll_config(PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: 4,
        })
        .with_transport(Arc::new(SilentTransport))
        .start(
            move |envelope| {
                let _ = completed_tx.send(envelope);
            },
            move || {
                let _ = timeout_tx.send(());
            },
        )
        .unwrap();

    handle.join().await;

    timeout_rx.try_recv().expect("call should time out");
    assert!(completed_rx.try_recv().is_err());
    assert_eq!(handle.attempts_made(), 4);
}
