use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use thiserror::Error;

/// Error returned by every call against the Reddit API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rate limited by the API (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API returned {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        fields: Vec<String>,
        retry_after: Option<Duration>,
    },

    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

// Reddit error bodies come in a few shapes: {"explanation", "fields"},
// {"message", "error"} and {"reason", "field"}.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    explanation: Option<String>,
    message: Option<String>,
    reason: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
    field: Option<String>,
}

impl ApiError {
    /// Builds an error from a non-success response.
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let retry_after = parse_retry_after(headers);
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ApiError::RateLimited { retry_after };
        }

        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let mut fields = parsed.fields;
        if let Some(field) = parsed.field {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        let message = parsed
            .explanation
            .or(parsed.reason)
            .or(parsed.message)
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    trimmed.chars().take(200).collect()
                }
            });

        ApiError::Status {
            status,
            message,
            fields,
            retry_after,
        }
    }

    /// Rate limits, server errors and connection trouble are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } => true,
            ApiError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::REQUEST_TIMEOUT
            }
            ApiError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Decode(_) | ApiError::InvalidUrl(_) | ApiError::Auth(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } | ApiError::Status { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }

    /// Request fields the API named as invalid, if any.
    pub fn rejected_fields(&self) -> &[String] {
        match self {
            ApiError::Status { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        ) || matches!(self, ApiError::Auth(_))
    }
}

/// Parses a `Retry-After` header given in seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_response_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        let err = ApiError::from_response(StatusCode::TOO_MANY_REQUESTS, &headers, "");

        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_bad_request_names_rejected_fields() {
        let body = r#"{"fields": ["over_18"], "explanation": "you must be over 18", "reason": "BAD_VALUE"}"#;
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, &HeaderMap::new(), body);

        assert!(!err.is_transient());
        assert_eq!(err.rejected_fields(), ["over_18".to_string()]);
        assert!(err.to_string().contains("you must be over 18"));
    }

    #[test]
    fn test_single_field_shape_is_understood() {
        let body = r#"{"reason": "BAD_NUMBER", "field": "min_link_score"}"#;
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, &HeaderMap::new(), body);

        assert_eq!(err.rejected_fields(), ["min_link_score".to_string()]);
    }

    #[test]
    fn test_server_error_is_transient_and_keeps_plain_body() {
        let err = ApiError::from_response(
            StatusCode::BAD_GATEWAY,
            &HeaderMap::new(),
            "<html>upstream hiccup</html>",
        );

        assert!(err.is_transient());
        assert!(err.rejected_fields().is_empty());
        assert!(err.to_string().contains("upstream hiccup"));
    }

    #[test]
    fn test_not_found_is_not_transient() {
        let err = ApiError::from_response(StatusCode::NOT_FOUND, &HeaderMap::new(), "");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Not Found"));
    }
}
