//! Rust client for Phabricator's Conduit RPC API
//!
//! Conduit is Phabricator's JSON-over-HTTP RPC protocol: every call POSTs a
//! URL-encoded JSON argument map to `<api_url><method>` and answers with a
//! `{result, error_code, error_info}` envelope. This crate negotiates a
//! signed session from a username/certificate pair, runs named methods
//! against it, and interprets the envelope. A background variant runs one
//! call off the caller's task and polls it to completion or timeout.
//!
//! # Synchronous calls
//!
//! ```rust,no_run
//! use conduit_client::{CallArguments, ConduitClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ConduitClient::connect(
//!     "alice",
//!     "certificate-from-settings-page",
//!     "https://phabricator.example.com/api/",
//! )
//! .await?;
//!
//! let me = client.call("user.whoami", &CallArguments::new()).await?;
//! println!("logged in as {}", me["userName"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Background calls
//!
//! ```rust,no_run
//! use conduit_client::{AsyncConduitCall, CallArguments};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut handle = AsyncConduitCall::new("user.whoami", CallArguments::new())
//!     .with_connection_info(
//!         "alice",
//!         "certificate-from-settings-page",
//!         "https://phabricator.example.com/api/",
//!     )
//!     .start(
//!         |envelope| println!("completed: {:?}", envelope.result),
//!         || eprintln!("timed out"),
//!     )?;
//!
//! handle.join().await;
//! # Ok(())
//! # }
//! ```

pub mod async_call;
pub mod client;
pub mod error;
pub mod files;
pub mod phid;
pub mod session;
pub mod transport;
pub mod types;

pub use async_call::{AsyncCallHandle, AsyncConduitCall};
pub use client::ConduitClient;
pub use error::{ConduitError, Result};
pub use files::{download_file, fetch_file};
pub use phid::{phid_tag, resolve_user_phid, resolve_user_phids};
pub use session::{auth_signature, Session};
pub use transport::{HttpTransport, Transport};
pub use types::*;
