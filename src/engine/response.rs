use crate::error::SubmitError;
use crate::model::{ClassificationResult, UploadResponse};
use serde_json::Value;

/// Parse a 2xx body into a result. Anything short of the full shape is malformed.
pub(crate) fn decode_response(body: &[u8]) -> Result<ClassificationResult, SubmitError> {
    let response: UploadResponse = serde_json::from_slice(body)
        .map_err(|e| SubmitError::MalformedResponse(e.to_string()))?;
    let mut result = response.result;
    result.check().map_err(SubmitError::MalformedResponse)?;
    if result.job_id.is_none() {
        result.job_id = response.job_id;
    }
    Ok(result)
}

/// Pull a human-readable message out of an error body.
///
/// Handles `{"error": "..."}` as well as `{"detail": "..."}` and
/// `{"detail": [{"msg": "..."}]}` validation payloads.
pub(crate) fn server_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    if let Some(msg) = value.get("error").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    match value.get("detail")? {
        Value::String(msg) => Some(msg.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => None,
    }
}
