//! PHID helpers
//!
//! PHIDs are Phabricator's permanent object identifiers, shaped
//! `PHID-<TAG>-<payload>`; the tag names the owning application
//! (`USER`, `TASK`, `FILE`, ...).

use serde_json::{json, Value};

use crate::client::ConduitClient;
use crate::error::{ConduitError, Result};
use crate::types::CallArguments;

/// Extract the application tag of a PHID.
///
/// Returns `None` unless the string has the full `PHID-<TAG>-<payload>`
/// shape with a non-empty tag and payload.
pub fn phid_tag(phid: &str) -> Option<&str> {
    let mut parts = phid.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("PHID"), Some(tag), Some(payload)) if !tag.is_empty() && !payload.is_empty() => {
            Some(tag)
        }
        _ => None,
    }
}

/// Resolve a user PHID to a username via `user.query`.
///
/// `Ok(None)` when the query matches no user.
pub async fn resolve_user_phid(client: &ConduitClient, phid: &str) -> Result<Option<String>> {
    let mut args = CallArguments::new();
    args.insert("phids".to_string(), json!([phid]));

    let result = client.call("user.query", &args).await?;

    let users = result.as_array().ok_or_else(|| {
        ConduitError::MalformedResponse("user.query result is not an array".to_string())
    })?;

    match users.first() {
        None => Ok(None),
        Some(user) => match user.get("userName").and_then(Value::as_str) {
            Some(name) => Ok(Some(name.to_string())),
            None => Err(ConduitError::MalformedResponse(
                "user.query entry has no userName".to_string(),
            )),
        },
    }
}

/// Resolve several user PHIDs to usernames, preserving input order.
pub async fn resolve_user_phids(
    client: &ConduitClient,
    phids: &[String],
) -> Result<Vec<Option<String>>> {
    let mut names = Vec::with_capacity(phids.len());
    for phid in phids {
        names.push(resolve_user_phid(client, phid).await?);
    }
    Ok(names)
}
