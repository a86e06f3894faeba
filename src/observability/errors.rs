//! HTTP error classification for the `http_errors_total` metric.

use axum::http::{HeaderMap, StatusCode};

/// Response header set when no upstream slot was available.
pub const NO_WORKERS_HEADER: &str = "no-workers";

/// Coarse error category used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// 4xx responses.
    ClientError,
    /// 5xx responses.
    ServerError,
    /// 408 and 504.
    Timeout,
    /// Upstream slots exhausted.
    NoWorkers,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::ClientError => "client_error",
            ErrorType::ServerError => "server_error",
            ErrorType::Timeout => "timeout",
            ErrorType::NoWorkers => "no_workers",
        }
    }
}

/// Returns true if the `No-Workers: true` header is present.
pub fn has_no_workers(headers: &HeaderMap) -> bool {
    headers
        .get(NO_WORKERS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// Classify an error response. Only meaningful when [`is_error_status`] holds.
pub fn classify_error(status: StatusCode, headers: &HeaderMap) -> ErrorType {
    if has_no_workers(headers) {
        return ErrorType::NoWorkers;
    }

    match status.as_u16() {
        408 | 504 => ErrorType::Timeout,
        400..=499 => ErrorType::ClientError,
        _ => ErrorType::ServerError,
    }
}

pub fn is_error_status(status: StatusCode) -> bool {
    status.as_u16() >= 400
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_classification_table() {
        let headers = HeaderMap::new();
        let cases = [
            (400, ErrorType::ClientError),
            (404, ErrorType::ClientError),
            (408, ErrorType::Timeout),
            (429, ErrorType::ClientError),
            (500, ErrorType::ServerError),
            (503, ErrorType::ServerError),
            (504, ErrorType::Timeout),
        ];
        for (code, expected) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify_error(status, &headers), expected, "status {code}");
        }
    }

    #[test]
    fn test_no_workers_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(NO_WORKERS_HEADER, HeaderValue::from_static("true"));
        assert_eq!(
            classify_error(StatusCode::SERVICE_UNAVAILABLE, &headers),
            ErrorType::NoWorkers
        );
        assert_eq!(classify_error(StatusCode::NOT_FOUND, &headers), ErrorType::NoWorkers);

        headers.insert(NO_WORKERS_HEADER, HeaderValue::from_static("false"));
        assert_eq!(
            classify_error(StatusCode::SERVICE_UNAVAILABLE, &headers),
            ErrorType::ServerError
        );
    }

    #[test]
    fn test_non_error_status_defaults_to_server_error() {
        assert_eq!(classify_error(StatusCode::OK, &HeaderMap::new()), ErrorType::ServerError);
    }

    #[test]
    fn test_is_error_status() {
        assert!(!is_error_status(StatusCode::OK));
        assert!(!is_error_status(StatusCode::PERMANENT_REDIRECT));
        assert!(is_error_status(StatusCode::BAD_REQUEST));
        assert!(is_error_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_labels() {
        assert_eq!(ErrorType::NoWorkers.as_str(), "no_workers");
        assert_eq!(ErrorType::ClientError.as_str(), "client_error");
    }
}
