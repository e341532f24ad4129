use crate::error::RequestError;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Event kind taken from the receiver's event header.
///
/// Kinds compare case-insensitively, so they are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKind(String);

impl EventKind {
    pub fn new(kind: impl AsRef<str>) -> Self {
        Self(kind.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// Result of classifying a verified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Reachability check from the provider; never dispatched
    Ping,
    Event(EventKind),
}

/// A webhook whose signature has been verified and whose body decoded.
///
/// The request headers travel with it, so handlers can read provider
/// metadata such as a delivery id.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    receiver: String,
    tenant_id: String,
    kind: EventKind,
    payload: Value,
    headers: HeaderMap,
}

impl VerifiedEvent {
    pub(crate) fn new(
        receiver: impl Into<String>,
        tenant_id: impl Into<String>,
        kind: EventKind,
        payload: Value,
    ) -> Self {
        Self {
            receiver: receiver.into(),
            tenant_id: tenant_id.into(),
            kind,
            payload,
            headers: HeaderMap::new(),
        }
    }

    pub(crate) fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Name of the receiver that accepted the request
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Tenant id from the request URI, empty for the default secret
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Headers of the request as received
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of a single header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decode the payload into a typed event body
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        T::deserialize(&self.payload).map_err(|e| {
            tracing::warn!(
                target: "tidehook::webhooks::event",
                receiver = %self.receiver,
                kind = %self.kind,
                error = %e,
                "Webhook payload does not match the expected shape"
            );
            RequestError::malformed_payload()
        })
    }
}
