//! Response decoding and failure classification.
//!
//! Status codes of 400 and above always become [`Error::Status`], whatever the
//! body looks like. Anything below 400 is decoded into the expected type or
//! rejected as [`Error::Decode`]; a value is never partially populated.

use crate::rate_limit::RateLimitInfo;
use crate::transport::TransportResponse;
use crate::{Error, Result};
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes a response into `T`.
///
/// An empty body is accepted for `204 No Content` and for `DELETE` calls, in
/// which case `T` is built from `null` (for `()`, `Option<_>`, `Value`) or from
/// `{}` (for structs whose fields are all optional). Any other empty body is a
/// [`Error::Decode`].
pub fn decode<T: DeserializeOwned>(method: &Method, response: TransportResponse) -> Result<T> {
    let response = classify(response)?;
    let status = response.status;

    if response.body.trim().is_empty() {
        if status == StatusCode::NO_CONTENT || *method == Method::DELETE {
            return zero_value(status);
        }
        return Err(Error::decode(status, "empty response body", String::new()));
    }

    let parsed = if is_yaml(&response) {
        serde_yaml::from_str::<T>(&response.body).map_err(|e| e.to_string())
    } else {
        serde_json::from_str::<T>(&response.body).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| {
        tracing::error!(
            status = status.as_u16(),
            error = %message,
            raw_response = %response.body,
            "Failed to decode response"
        );
        Error::decode(status, message, response.body)
    })
}

/// Classifies a response that is expected to carry no useful body.
pub fn discard(response: TransportResponse) -> Result<()> {
    classify(response).map(|_| ())
}

/// Turns a status of 400 or above into [`Error::Status`]; passes others through.
pub fn classify(response: TransportResponse) -> Result<TransportResponse> {
    let status = response.status;
    if status.as_u16() < 400 {
        return Ok(response);
    }

    let message = error_message(status, &response.body);
    if status.is_client_error() {
        tracing::error!(
            status = status.as_u16(),
            message = %message,
            "Client error (4xx)"
        );
    } else {
        tracing::warn!(
            status = status.as_u16(),
            message = %message,
            "Server error (5xx)"
        );
    }

    Err(Error::Status {
        status,
        message,
        rate_limit_info: RateLimitInfo::active(&response.headers),
        raw_response: response.body,
        headers: response.headers,
    })
}

/// Extracts the best available message from an error body.
///
/// Prefers the JSON `"error"` string, then a JSON `"message"` string, then the
/// trimmed raw body, then the canonical reason phrase. Never fails.
pub fn error_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["error", "message"] {
            if let Some(Value::String(text)) = fields.get(key) {
                if !text.trim().is_empty() {
                    return text.clone();
                }
            }
        }
    }

    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn zero_value<T: DeserializeOwned>(status: StatusCode) -> Result<T> {
    serde_json::from_value::<T>(Value::Null)
        .or_else(|_| serde_json::from_value::<T>(Value::Object(Default::default())))
        .map_err(|e| {
            Error::decode(
                status,
                format!("empty body cannot produce the expected type: {e}"),
                String::new(),
            )
        })
}

fn is_yaml(response: &TransportResponse) -> bool {
    response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.contains("application/x-yaml") || ct.contains("application/yaml"))
}
