//! Forwarding of computation requests to the processing service.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
use serde_json::{Map, Number, Value, json};

/// Value stamped into `processed_by` on every augmented result.
pub const PROCESSED_BY: &str = "gateway";

const METRIC_TARGET: &str = "processing";

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// Request rejected before any downstream call.
    #[error("{0}")]
    Validation(String),

    /// Downstream answered with a non-success status.
    #[error("processing service responded with {status}")]
    Downstream {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// Connect failure or timeout.
    #[error("processing service unreachable: {0}")]
    Unreachable(String),

    /// Success status but the body is not a JSON object.
    #[error("invalid processing service response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct ProcessingForwarder {
    client: reqwest::Client,
    process_url: String,
    timeout: Duration,
}

impl ProcessingForwarder {
    pub fn new(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            process_url: format!("{}/api/process", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn process_url(&self) -> &str {
        &self.process_url
    }

    /// Validate `payload`, forward its `values` and augment the downstream result.
    ///
    /// No retry is attempted on any failure.
    #[tracing::instrument(skip_all, fields(url = %self.process_url))]
    pub async fn forward(&self, payload: &Value) -> Result<Value, ForwardError> {
        let values = extract_values(payload)?;

        let response = self
            .client
            .post(&self.process_url)
            .timeout(self.timeout)
            .json(&json!({ "values": values }))
            .send()
            .await
            .map_err(|e| {
                crate::metrics::record_downstream(METRIC_TARGET, "unreachable");
                tracing::warn!(error = %e, timeout = e.is_timeout(), "processing service call failed");
                ForwardError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            crate::metrics::record_downstream(METRIC_TARGET, "error_status");
            let content_type = response.headers().get(CONTENT_TYPE).cloned();
            let body = response.bytes().await.map_err(|e| {
                ForwardError::Unreachable(format!("failed to read error body: {e}"))
            })?;
            tracing::info!(status = %status, "processing service returned error status");
            return Err(ForwardError::Downstream {
                status,
                content_type,
                body,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            crate::metrics::record_downstream(METRIC_TARGET, "unreachable");
            ForwardError::Unreachable(format!("failed to read response body: {e}"))
        })?;

        let mut result = match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                crate::metrics::record_downstream(METRIC_TARGET, "invalid_response");
                return Err(ForwardError::InvalidResponse(format!(
                    "expected a JSON object, got {}",
                    json_type(&other)
                )));
            }
            Err(e) => {
                crate::metrics::record_downstream(METRIC_TARGET, "invalid_response");
                return Err(ForwardError::InvalidResponse(e.to_string()));
            }
        };

        crate::metrics::record_downstream(METRIC_TARGET, "ok");
        augment(&mut result, values);
        Ok(Value::Object(result))
    }
}

fn extract_values(payload: &Value) -> Result<&[Value], ForwardError> {
    let values = payload
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| ForwardError::Validation("values must be an array of numbers".to_string()))?;

    if values.iter().any(|v| !v.is_number()) {
        return Err(ForwardError::Validation(
            "values must contain only numbers".to_string(),
        ));
    }
    Ok(values)
}

fn augment(result: &mut Map<String, Value>, values: &[Value]) {
    let (even, odd): (Vec<Value>, Vec<Value>) = values
        .iter()
        .cloned()
        .partition(|v| v.as_number().is_some_and(is_even));

    result.insert("processed_by".to_string(), Value::from(PROCESSED_BY));
    result.insert("even_values".to_string(), Value::Array(even));
    result.insert("odd_values".to_string(), Value::Array(odd));
}

/// Integral and divisible by two.
fn is_even(n: &Number) -> bool {
    if let Some(i) = n.as_i64() {
        i % 2 == 0
    } else if let Some(u) = n.as_u64() {
        u % 2 == 0
    } else if let Some(f) = n.as_f64() {
        f.fract() == 0.0 && f % 2.0 == 0.0
    } else {
        false
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
