//! File transfer helpers over Conduit

use base64::Engine;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::client::ConduitClient;
use crate::error::{ConduitError, Result};
use crate::types::CallArguments;

/// Fetch a file's contents via `file.download`.
///
/// The remote answers with the payload as a base64 string.
pub async fn fetch_file(client: &ConduitClient, file_phid: &str) -> Result<Vec<u8>> {
    let mut args = CallArguments::new();
    args.insert("phid".to_string(), Value::from(file_phid));

    let result = client.call("file.download", &args).await?;

    let encoded = result.as_str().ok_or_else(|| {
        ConduitError::MalformedResponse("file.download result is not a string".to_string())
    })?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| {
            ConduitError::MalformedResponse(format!("file.download payload is not base64: {e}"))
        })
}

/// Download a file to `path`, returning the number of bytes written.
pub async fn download_file(
    client: &ConduitClient,
    file_phid: &str,
    path: impl AsRef<Path>,
) -> Result<u64> {
    let bytes = fetch_file(client, file_phid).await?;
    let path = path.as_ref();

    tokio::fs::write(path, &bytes).await?;

    debug!(
        phid = %file_phid,
        path = %path.display(),
        bytes = bytes.len(),
        "Downloaded file"
    );

    Ok(bytes.len() as u64)
}
