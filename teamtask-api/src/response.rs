//! Response normalization
//!
//! Turns whatever came back from the wire (or failed to) into a `RequestResult`.

use reqwest::{Method, StatusCode};
use serde_json::Value;
use teamtask_core::{ErrorContext, TeamtaskError};

use crate::RequestResult;

/// Body fields checked, in order, for a backend-provided error message
const ERROR_MESSAGE_FIELDS: [&str; 2] = ["message", "error"];

/// Normalize a completed HTTP exchange.
///
/// A 2xx status with a parseable body (an empty body reads as `null`) yields the data.
/// Any other status yields the body's own error message when it has one, or a generic
/// message carrying the status code.
pub fn normalize(status: StatusCode, url: &str, body: &str) -> RequestResult<Value> {
    let parsed = if body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(body)
    };

    if status.is_success() {
        return parsed.map_err(|e| TeamtaskError::MalformedResponse {
            message: format!("Malformed response from {}: {}", url, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("api_gateway")
                .with_operation("normalize_response")
                .with_metadata("status", status.as_str())
                .with_suggestion("Check that the base URL points at the REST API root"),
        });
    }

    let message = parsed
        .ok()
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

    Err(status_error(status, url, message))
}

/// Extract the backend's own error message from a parsed body
pub fn error_message(body: &Value) -> Option<String> {
    ERROR_MESSAGE_FIELDS.iter().find_map(|field| {
        body.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    })
}

fn status_error(status: StatusCode, url: &str, message: String) -> TeamtaskError {
    let context = ErrorContext::new("api_gateway")
        .with_operation("normalize_response")
        .with_metadata("url", url);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TeamtaskError::Authentication {
            status: status.as_u16(),
            message,
            context: context.with_suggestion("Sign in again; the session may have expired"),
        },
        _ => TeamtaskError::Api {
            status: status.as_u16(),
            message,
            context: context.with_suggestion(match status.as_u16() {
                404 => "The resource does not exist or was already deleted",
                400..=499 => "Check the request fields",
                _ => "Check the backend logs",
            }),
        },
    }
}

/// Classify a failure that happened before a response could be read
pub(crate) fn transport_error(
    error: reqwest::Error,
    base_url: &str,
    method: &Method,
    url: &str,
    timeout_seconds: u64,
) -> TeamtaskError {
    if error.is_timeout() {
        return TeamtaskError::Timeout {
            operation: format!("{} {}", method, url),
            duration_ms: timeout_seconds * 1000,
            context: ErrorContext::new("api_gateway")
                .with_operation("send_request")
                .with_suggestion("Increase api.timeout_seconds")
                .with_suggestion("Check network connectivity"),
        };
    }

    if error.is_connect() {
        return TeamtaskError::Network {
            message: format!(
                "Cannot reach the API at {}. Check that the base URL is correct, \
                 the server is running, and network access is allowed.",
                base_url
            ),
            source: Some(Box::new(error)),
            context: ErrorContext::new("api_gateway")
                .with_operation("send_request")
                .with_metadata("url", url)
                .with_suggestion("Set api.base_url or TEAMTASK_API_BASE"),
        };
    }

    if error.is_decode() {
        return TeamtaskError::MalformedResponse {
            message: format!("Malformed response from {}: {}", url, error),
            source: Some(Box::new(error)),
            context: ErrorContext::new("api_gateway").with_operation("read_body"),
        };
    }

    if error.is_builder() {
        return TeamtaskError::Validation {
            message: format!("Invalid request for {}: {}", url, error),
            field: None,
            context: ErrorContext::new("api_gateway").with_operation("build_request"),
        };
    }

    TeamtaskError::Network {
        message: format!("Request to {} failed: {}", url, error),
        source: Some(Box::new(error)),
        context: ErrorContext::new("api_gateway")
            .with_operation("send_request")
            .with_suggestion("Check network connectivity and API status"),
    }
}
