//! Shared HTTP plumbing for the REST providers.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use zinc_core::error::ProviderError;
use zinc_core::types::Hash256;

const USER_AGENT: &str = concat!("zinc/", env!("CARGO_PKG_VERSION"));

/// Build a client whose own timeout matches the outer per-call bound.
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub fn network_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Network(e.to_string())
}

/// Read a successful response body as JSON.
///
/// Non-success statuses become [`ProviderError::Network`] carrying the status
/// and body text.
pub async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ProviderError> {
    let status = resp.status();
    let body = resp.text().await.map_err(network_error)?;
    if !status.is_success() {
        return Err(ProviderError::Network(format!("HTTP {status}: {}", truncate(&body))));
    }
    serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Interpret a broadcast response.
///
/// A 2xx body carrying `txid` or `hash` is a success. A 4xx, or a 2xx body
/// with an `error`/`message` field and no txid, is an explicit rejection.
/// Anything else is a transport-level failure.
pub fn parse_broadcast_response(status: StatusCode, body: &str) -> Result<Hash256, ProviderError> {
    let json: Option<Value> = serde_json::from_str(body).ok();

    if status.is_success() {
        let json = json.ok_or_else(|| ProviderError::Malformed(truncate(body)))?;
        if let Some(txid) = txid_field(&json) {
            return Hash256::from_hex(txid).map_err(|e| ProviderError::Malformed(e.to_string()));
        }
        if let Some(message) = error_message(&json) {
            return Err(ProviderError::Rejected(message));
        }
        return Err(ProviderError::Malformed("broadcast response has no txid".into()));
    }

    let message = json
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| truncate(body));
    if status.is_client_error() {
        Err(ProviderError::Rejected(message))
    } else {
        Err(ProviderError::Network(format!("HTTP {status}: {message}")))
    }
}

fn txid_field(json: &Value) -> Option<&str> {
    json.get("txid")
        .or_else(|| json.get("hash"))
        .and_then(Value::as_str)
}

fn error_message(json: &Value) -> Option<String> {
    let field = json.get("error").or_else(|| json.get("message"))?;
    match field {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        // {"error": {"message": ...}}
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| Some(field.to_string())),
        other => Some(other.to_string()),
    }
}

/// Keep error messages bounded when a provider answers with an HTML page.
pub fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Read a satoshi amount from the first field present.
pub fn u64_field(json: &Value, fields: &[&str]) -> Option<u64> {
    fields.iter().find_map(|f| json.get(*f).and_then(Value::as_u64))
}
