use crate::error::RequestError;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request},
};
use serde_json::Value;

const TRACING_TARGET: &str = "tidehook::webhooks::request";

/// Names of the headers a receiver reads its event kind and signature from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderConvention {
    pub event_header: String,
    pub signature_header: String,
}

impl HeaderConvention {
    pub fn new(event_header: impl Into<String>, signature_header: impl Into<String>) -> Self {
        Self {
            event_header: event_header.into(),
            signature_header: signature_header.into(),
        }
    }
}

/// An inbound webhook request that passed the structural checks.
///
/// The body is kept as the exact bytes received so the signature can be
/// checked against them. It is only decoded after verification.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    headers: HeaderMap,
    body: Bytes,
    event: String,
    signature: String,
}

impl IncomingRequest {
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Give up the request headers, e.g. to hand them to a [`VerifiedEvent`]
    ///
    /// [`VerifiedEvent`]: super::VerifiedEvent
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    /// Raw body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Event kind header value, as sent
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Signature header value, as sent
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Decode the body as a JSON object.
    ///
    /// Only call this once the signature has been verified.
    pub fn decode_json(&self) -> Result<Value, RequestError> {
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(_) => {
                tracing::warn!(target: TRACING_TARGET, "Webhook payload is not a JSON object");
                Err(RequestError::malformed_payload())
            }
            Err(e) => {
                // detail stays in the log, the sender gets the generic message
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %e,
                    "Failed to parse webhook payload"
                );
                Err(RequestError::malformed_payload())
            }
        }
    }
}

/// Structural validation of inbound requests for one header convention
#[derive(Debug, Clone)]
pub struct RequestParser {
    convention: HeaderConvention,
    max_body_size: usize,
}

impl RequestParser {
    pub fn new(convention: HeaderConvention, max_body_size: usize) -> Self {
        Self {
            convention,
            max_body_size,
        }
    }

    /// Validate method and headers, then buffer the whole body.
    ///
    /// The method is checked first, so a non-POST request is rejected
    /// regardless of its headers or body.
    pub async fn parse(&self, request: Request<Body>) -> Result<IncomingRequest, RequestError> {
        let (parts, body) = request.into_parts();
        let (event, signature) = self.check_head(&parts.method, &parts.headers)?;

        let body = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| {
                tracing::warn!(target: TRACING_TARGET, error = %e, "Failed to read webhook body");
                RequestError::body_read()
            })?;

        Ok(IncomingRequest {
            headers: parts.headers,
            body,
            event,
            signature,
        })
    }

    /// Same checks as [`RequestParser::parse`] for a body that is already buffered
    pub fn parse_parts(
        &self,
        method: &Method,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Result<IncomingRequest, RequestError> {
        let (event, signature) = self.check_head(method, &headers)?;
        let body = body.into();
        if body.len() > self.max_body_size {
            return Err(RequestError::body_read());
        }

        Ok(IncomingRequest {
            headers,
            body,
            event,
            signature,
        })
    }

    fn check_head(&self, method: &Method, headers: &HeaderMap) -> Result<(String, String), RequestError> {
        if method != Method::POST {
            return Err(RequestError::method_not_allowed(method));
        }

        let event = first_value(headers, &self.convention.event_header)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RequestError::missing_event_header(&self.convention.event_header))?;

        let signature = single_value(headers, &self.convention.signature_header)
            .ok_or_else(|| RequestError::missing_signature_header(&self.convention.signature_header))?;

        Ok((event, signature))
    }
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn single_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let mut values = headers.get_all(name).iter();
    match (values.next(), values.next()) {
        (Some(value), None) => value.to_str().ok().map(|v| v.trim().to_string()),
        _ => None,
    }
}
