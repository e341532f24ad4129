use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;

/// The main error type for webhook receivers
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Misconfiguration detected at startup or while resolving a secret.
    /// Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// One or more handlers failed; the remaining handlers still ran.
    #[error("Handler error: {failed} of {total} handlers failed")]
    Handler { failed: usize, total: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Processing did not finish within the configured limit. Handlers still
    /// running were cancelled.
    #[error("Webhook request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Structural problems with an inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    MethodNotAllowed,
    MissingEventHeader,
    MissingSignatureHeader,
    MalformedPayload,
    BodyRead,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    pub kind: RequestErrorKind,
    message: String,
}

impl RequestError {
    pub fn method_not_allowed(method: &Method) -> Self {
        Self {
            kind: RequestErrorKind::MethodNotAllowed,
            message: format!(
                "The HTTP '{}' method is not supported by the webhook receiver. Use 'POST' instead.",
                method
            ),
        }
    }

    pub fn missing_event_header(header: &str) -> Self {
        Self {
            kind: RequestErrorKind::MissingEventHeader,
            message: format!(
                "The webhook request must contain a '{}' HTTP header indicating the type of event.",
                header
            ),
        }
    }

    pub fn missing_signature_header(header: &str) -> Self {
        Self {
            kind: RequestErrorKind::MissingSignatureHeader,
            message: format!(
                "Expecting exactly one '{}' header field in the webhook request.",
                header
            ),
        }
    }

    pub fn malformed_payload() -> Self {
        Self {
            kind: RequestErrorKind::MalformedPayload,
            message: "The webhook request must contain an entity body formatted as JSON.".to_string(),
        }
    }

    pub fn body_read() -> Self {
        Self {
            kind: RequestErrorKind::BodyRead,
            message: "The webhook request body could not be read.".to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Authenticity failures. Messages name the header, never its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureErrorKind {
    BadHeaderFormat,
    SignatureMismatch,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SignatureError {
    pub kind: SignatureErrorKind,
    pub header: String,
    message: String,
}

impl SignatureError {
    /// The header is not of the form `<tag>=<value>` with the expected tag.
    pub fn bad_header_format(header: impl Into<String>, tag: &str) -> Self {
        let header = header.into();
        let message = format!(
            "Invalid '{}' header value. Expecting a value of '{}=<value>'.",
            header, tag
        );
        Self {
            kind: SignatureErrorKind::BadHeaderFormat,
            header,
            message,
        }
    }

    /// The digest part of the header is not valid hex.
    pub fn bad_header_encoding(header: impl Into<String>) -> Self {
        let header = header.into();
        let message = format!(
            "The '{}' header value is invalid. It must be a valid hex-encoded string.",
            header
        );
        Self {
            kind: SignatureErrorKind::BadHeaderFormat,
            header,
            message,
        }
    }

    pub fn mismatch(header: impl Into<String>) -> Self {
        let header = header.into();
        let message = format!(
            "The webhook signature provided by the '{}' header field does not match the value expected by the receiver.",
            header
        );
        Self {
            kind: SignatureErrorKind::SignatureMismatch,
            header,
            message,
        }
    }
}

/// Error body returned to webhook senders.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl WebhookError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Request(err) => match err.kind {
                RequestErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Signature(err) => match err.kind {
                SignatureErrorKind::BadHeaderFormat => StatusCode::BAD_REQUEST,
                SignatureErrorKind::SignatureMismatch => StatusCode::UNAUTHORIZED,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Configuration(_) | Self::Handler { .. } | Self::Internal(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True for errors caused by the sender (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message suitable for the response body.
    ///
    /// Client errors carry their message since the sender needs it to fix the
    /// request. Server errors are reduced to a generic message; the detail is
    /// only logged.
    fn safe_message(&self) -> String {
        match self {
            Self::Request(err) => err.to_string(),
            Self::Signature(err) => err.to_string(),
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::Timeout(limit) => format!(
                "The webhook request was not processed within {}s.",
                limit.as_secs()
            ),
            Self::Handler { .. } => "One or more webhook handlers failed".to_string(),
            Self::Configuration(_) => "Webhook receiver is not configured correctly".to_string(),
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            target: "tidehook::error",
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Webhook request rejected"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

/// Result type alias for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_allowed_status() {
        let err: WebhookError = RequestError::method_not_allowed(&Method::GET).into();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(err.to_string().contains("'GET'"));
    }

    #[test]
    fn test_request_errors_are_bad_request() {
        let errors = [
            RequestError::missing_event_header("X-Github-Event"),
            RequestError::missing_signature_header("X-Hub-Signature"),
            RequestError::malformed_payload(),
            RequestError::body_read(),
        ];

        for err in errors {
            let err: WebhookError = err.into();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_signature_error_status() {
        let format: WebhookError = SignatureError::bad_header_format("X-Hub-Signature", "sha1").into();
        assert_eq!(format.status_code(), StatusCode::BAD_REQUEST);

        let encoding: WebhookError = SignatureError::bad_header_encoding("X-Hub-Signature").into();
        assert_eq!(encoding.status_code(), StatusCode::BAD_REQUEST);

        let mismatch: WebhookError = SignatureError::mismatch("X-Hub-Signature").into();
        assert_eq!(mismatch.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_server_errors() {
        assert_eq!(
            WebhookError::configuration("bad secret").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::Handler { failed: 1, total: 2 }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::from(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!WebhookError::internal("x").is_client_error());
    }

    #[test]
    fn test_safe_message_hides_server_detail() {
        let err = WebhookError::configuration("secret for 'github' is 3 bytes");
        assert!(!err.safe_message().contains("3 bytes"));

        let err = WebhookError::internal("connection pool exhausted");
        assert_eq!(err.safe_message(), "Internal server error");
    }

    #[test]
    fn test_signature_message_names_header_only() {
        let err = SignatureError::mismatch("X-Hub-Signature");
        assert_eq!(err.header, "X-Hub-Signature");
        assert!(err.to_string().contains("'X-Hub-Signature'"));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "Test error".to_string(),
            error_id: "id-123".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\":\"Test error\""));
        assert!(json.contains("\"error_id\":\"id-123\""));
    }

    #[tokio::test]
    async fn test_into_response_method_not_allowed_sets_allow() {
        let err: WebhookError = RequestError::method_not_allowed(&Method::PUT).into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }

    #[tokio::test]
    async fn test_into_response_handler_failure() {
        let response = WebhookError::Handler { failed: 1, total: 3 }.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "One or more webhook handlers failed");
        assert!(body["error_id"].is_string());
    }

    #[tokio::test]
    async fn test_into_response_timeout() {
        let response = WebhookError::Timeout(Duration::from_secs(30)).into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "The webhook request was not processed within 30s.");
        assert!(body["error_id"].is_string());
    }

    #[tokio::test]
    async fn test_into_response_unauthorized() {
        let response = WebhookError::from(SignatureError::mismatch("X-Hub-Signature")).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
