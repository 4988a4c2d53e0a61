//! API Gateway proxy envelopes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};

/// Proxy integration response. `body` is a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: &Value) -> Self {
        let headers = [
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "*"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    pub fn ok(body: &Value) -> Self {
        Self::new(200, body)
    }

    pub fn from_error(err: &AppError) -> Self {
        Self::new(err.status_code(), &json!({ "error": err.to_string() }))
    }

    /// Parse the body back into JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Extract the request from a proxy event.
///
/// The request is the `body` string when present, an already-decoded `body`
/// object, or the event itself for direct invocations.
pub fn request_body(event: &Value) -> Result<Value> {
    match event.get("body") {
        Some(Value::String(body)) if body.trim().is_empty() => Ok(json!({})),
        Some(Value::String(body)) => serde_json::from_str(body)
            .map_err(|e| AppError::validation(format!("Invalid JSON body: {e}"))),
        Some(body @ Value::Object(_)) => Ok(body.clone()),
        Some(Value::Null) | None => Ok(event.clone()),
        Some(other) => Err(AppError::validation(format!(
            "Unsupported request body: {other}"
        ))),
    }
}
