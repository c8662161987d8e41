use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Every failure in the crate. Variants are chosen where the failure happens, so the
/// kind is known before the error propagates.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("Request timed out after {0}ms")]
    Timeout(u64),
    #[error("{0}")]
    Validation(String),
    #[error("Image processing error: {message}")]
    ImageProcessing {
        message: String,
        #[source]
        source: Option<image::ImageError>,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ApiError,
    NetworkError,
    ValidationError,
    ImageProcessingError,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ApiError => "API_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::ImageProcessingError => "IMAGE_PROCESSING_ERROR",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl RelayError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        RelayError::Api {
            status,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        RelayError::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn image_processing(message: impl Into<String>) -> Self {
        RelayError::ImageProcessing {
            message: message.into(),
            source: None,
        }
    }

    pub fn image(message: impl Into<String>, source: image::ImageError) -> Self {
        RelayError::ImageProcessing {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Api { .. } => ErrorKind::ApiError,
            RelayError::Network { .. } | RelayError::Timeout(_) => ErrorKind::NetworkError,
            RelayError::Validation(_) => ErrorKind::ValidationError,
            RelayError::ImageProcessing { .. } => ErrorKind::ImageProcessingError,
            RelayError::Config(_) | RelayError::Internal(_) => ErrorKind::UnknownError,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            RelayError::Api { status, .. } => *status,
            RelayError::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Only transport failures may be retried. A non-2xx answer from a billable
    /// generation endpoint is final, and so is a timeout.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Network { .. })
    }

    /// Classifies a reqwest failure that happened before a complete response arrived.
    /// The reqwest error stays attached as the source.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            RelayError::Timeout(timeout.as_millis() as u64)
        } else if let Some(status) = err.status() {
            RelayError::api(status.as_u16(), err.to_string())
        } else {
            let message = match err.url() {
                Some(url) => format!("Request to {} failed", url),
                None => "Request failed".to_string(),
            };
            RelayError::Network {
                message,
                source: Some(err),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// The uniform failure shape handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedError {
    pub message: String,
    pub http_status: u16,
    pub kind: ErrorKind,
}

impl From<&RelayError> for NormalizedError {
    fn from(err: &RelayError) -> Self {
        NormalizedError {
            message: err.to_string(),
            http_status: err.http_status(),
            kind: err.kind(),
        }
    }
}

/// Logs the failure and returns its normalized form.
pub fn normalize(err: &RelayError, context: Option<&str>) -> NormalizedError {
    let normalized = NormalizedError::from(err);
    let label = context.map(|c| format!("[{}] ", c)).unwrap_or_default();
    let trace = error_trace(err);

    if trace.is_empty() {
        log::error!(
            "{}Error: {} (kind={}, status={})",
            label,
            normalized.message,
            normalized.kind.as_str(),
            normalized.http_status
        );
    } else {
        log::error!(
            "{}Error: {} (kind={}, status={}) trace: {}",
            label,
            normalized.message,
            normalized.kind.as_str(),
            normalized.http_status,
            trace.join(" <- ")
        );
    }

    normalized
}

/// The `source()` chain of `err`, outermost cause first.
pub fn error_trace(err: &dyn std::error::Error) -> Vec<String> {
    let mut trace = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push(cause.to_string());
        source = cause.source();
    }
    trace
}

/// Turns an upstream HTTP response into parsed JSON, or into an `Api` error carrying
/// the upstream status. A body that breaks off mid-read is a transport failure.
pub async fn check_response(response: reqwest::Response, timeout: Duration) -> Result<Value> {
    let status = response.status();

    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        return Err(RelayError::api(
            status.as_u16(),
            upstream_error_message(&body, status.as_u16()),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RelayError::from_transport(e, timeout))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| RelayError::api(500, format!("Malformed upstream response: {}", e)))
}

/// Picks the most specific message an error body offers: a plain `error` string,
/// Gemini's `error.message`, or the bare status.
pub fn upstream_error_message(body: &Value, status: u16) -> String {
    match body.get("error") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        Some(Value::Object(obj)) => obj
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP Error {}", status)),
        _ => format!("HTTP Error {}", status),
    }
}
