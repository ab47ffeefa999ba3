//! Gateway error type and backend error-body decoding.

use mediplus_core::LowStockReport;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when calling the Mediplus API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A protected endpoint was called with no access token.
    #[error("Not signed in")]
    NotSignedIn,

    /// 401: missing, invalid or expired token, or bad credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 403: the signed-in role may not call this endpoint.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// 422 carrying a low-stock report on prescription upload.
    #[error("Low stock: {0}")]
    LowStock(LowStockReport),

    /// Any other non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// An id that cannot stand as a path segment (empty, `.` or `..`).
    #[error("Invalid id: {0:?}")]
    InvalidId(String),
}

impl ApiError {
    /// HTTP status of a backend rejection, if this error came from one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::LowStock(_) => Some(422),
            Self::Api { status, .. } => Some(*status),
            Self::Http(_)
            | Self::NotSignedIn
            | Self::Parse(_)
            | Self::Url(_)
            | Self::InvalidId(_) => None,
        }
    }

    /// Whether the session should be treated as no longer valid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::NotSignedIn)
    }

    /// Map a non-success status and its body to an error.
    ///
    /// FastAPI puts the reason in `detail`, as a string, as an object with a
    /// `message` (and on upload, a `low_stock` list), or as a list of
    /// validation errors.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let detail = parsed.as_ref().and_then(|v| v.get("detail"));

        if status == 422
            && let Some(detail) = detail
            && detail.get("low_stock").is_some()
            && let Ok(report) = serde_json::from_value::<LowStockReport>(detail.clone())
        {
            return Self::LowStock(report);
        }

        let message = detail
            .and_then(detail_message)
            .or_else(|| {
                let text = body.trim();
                (!text.is_empty() && parsed.is_none()).then(|| text.to_string())
            })
            .unwrap_or_else(|| default_message(status).to_string());

        match status {
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::Api { status, message },
        }
    }
}

fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string),
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

const fn default_message(status: u16) -> &'static str {
    match status {
        401 => "Invalid or expired token",
        403 => "Not allowed for this role",
        404 => "Resource not found",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_detail() {
        let err = ApiError::from_status(401, r#"{"detail": "Invalid credentials"}"#);
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid credentials"));
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_object_detail_message() {
        let err = ApiError::from_status(400, r#"{"detail": {"message": "Only PDF files are allowed"}}"#);
        assert!(matches!(
            err,
            ApiError::Api { status: 400, ref message } if message == "Only PDF files are allowed"
        ));
    }

    #[test]
    fn test_low_stock_detail() {
        let body = r#"{"detail": {
            "message": "Low stock for some medicines",
            "low_stock": [{"medicine_name": "Insulin", "requested": 4, "available": 1}]
        }}"#;
        let ApiError::LowStock(report) = ApiError::from_status(422, body) else {
            panic!("expected low stock");
        };
        assert_eq!(report.low_stock.len(), 1);
    }

    #[test]
    fn test_plain_422_is_validation_error() {
        let body = r#"{"detail": [{"loc": ["body", "prompt"], "msg": "field required"}]}"#;
        let err = ApiError::from_status(422, body);
        assert!(matches!(err, ApiError::Api { status: 422, ref message } if message == "field required"));
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn test_non_json_body_and_empty_body() {
        let err = ApiError::from_status(502, "Bad Gateway");
        assert!(matches!(err, ApiError::Api { ref message, .. } if message == "Bad Gateway"));
        let err = ApiError::from_status(404, "");
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Resource not found"));
    }
}
