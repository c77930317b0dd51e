//! Response envelope handling.
//!
//! Successful responses look like `{"data": ..., "message": ..., "code": ...}`.
//! Callers only ever see `data`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::error::ApiError;

/// Extract the `data` member of a success envelope.
///
/// An empty body, a non-object body or a missing `data` member yield `null`.
pub fn unwrap_envelope(status: u16, body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    let envelope: Value = serde_json::from_slice(body).map_err(|e| ApiError::decode(status, e))?;
    Ok(match envelope {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

/// Deserialize an unwrapped payload into the caller's type.
pub fn decode_payload<T: DeserializeOwned>(status: u16, data: Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::decode(status, e))
}
