//! Receivers and the request pipeline they share.
//!
//! A request moves through `received → parsed → verified → classified →
//! dispatched`. Any failure before dispatch rejects it with the matching
//! status code. A ping is acknowledged right after classification and never
//! reaches a handler.

use super::event::{Classification, EventKind, VerifiedEvent};
use super::handler::{EventFilter, WebhookHandler, WebhookRouter};
use super::request::{HeaderConvention, IncomingRequest, RequestParser};
use super::secrets::{SecretBounds, SecretStore, parse_snapshot};
use super::verification::{SignatureAlgorithm, SignatureVerifier};
use crate::error::{Result, SignatureError, WebhookError};
use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const TRACING_TARGET: &str = "tidehook::webhooks::receiver";

/// Capability interface implemented once per webhook provider.
///
/// Implementations describe the provider's conventions; verification and
/// classification are shared default methods.
pub trait WebhookReceiver: Send + Sync {
    /// Unique lowercase name, used as the URI segment
    fn name(&self) -> &str;

    fn headers(&self) -> &HeaderConvention;

    fn algorithm(&self) -> SignatureAlgorithm;

    fn secret_bounds(&self) -> SecretBounds;

    /// Event kind the provider sends to check reachability
    fn ping_event(&self) -> Option<&str> {
        Some("ping")
    }

    fn verify(&self, secret: &SecretString, request: &IncomingRequest) -> std::result::Result<(), SignatureError> {
        SignatureVerifier::new(self.algorithm(), &self.headers().signature_header).verify(
            secret,
            request.body(),
            request.signature(),
        )
    }

    fn classify(&self, request: &IncomingRequest) -> Classification {
        let kind = EventKind::new(request.event());
        match self.ping_event() {
            Some(ping) if kind == EventKind::new(ping) => Classification::Ping,
            _ => Classification::Event(kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiveStatus {
    /// Ping answered without running handlers
    Acknowledged,
    /// All matching handlers ran and succeeded
    Dispatched,
}

/// Successful outcome of [`WebhookReceivers::receive`]
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveOutcome {
    pub receiver: String,
    pub event: String,
    pub status: ReceiveStatus,
    pub handlers: usize,
}

impl IntoResponse for ReceiveOutcome {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

struct ReceiverEntry {
    receiver: Arc<dyn WebhookReceiver>,
    parser: RequestParser,
}

/// All receivers of an application with their secrets and handlers.
///
/// Built once at startup; shared read-only between requests afterwards.
pub struct WebhookReceivers {
    receivers: HashMap<String, ReceiverEntry>,
    secrets: SecretStore,
    router: WebhookRouter,
    timeout: Option<Duration>,
}

impl WebhookReceivers {
    pub fn builder() -> WebhookReceiversBuilder {
        WebhookReceiversBuilder::new()
    }

    /// Names of the registered receivers
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.receivers.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn WebhookReceiver>> {
        self.receivers.get(name).map(|entry| &entry.receiver)
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Replace all secrets with a new configuration generation.
    ///
    /// The new configuration is validated against every receiver's bounds
    /// first; on error the current secrets stay active.
    pub async fn reload_secrets(&self, config: &HashMap<String, String>) -> Result<()> {
        let snapshot = parse_snapshot(config)?;
        for (name, entry) in &self.receivers {
            let secrets = snapshot.get(name).filter(|s| !s.is_empty()).ok_or_else(|| {
                WebhookError::configuration(format!("No secrets configured for receiver '{}'", name))
            })?;
            secrets.validate(name, entry.receiver.secret_bounds())?;
        }
        self.secrets.reload(snapshot).await;
        Ok(())
    }

    /// Authenticate, classify and dispatch one inbound request.
    ///
    /// `tenant_id` is empty when the URI carries none, which selects the
    /// receiver's default secret. With a timeout set, a request still in
    /// progress when it expires is dropped, handlers included, and fails with
    /// [`WebhookError::Timeout`].
    pub async fn receive(
        &self,
        name: &str,
        tenant_id: &str,
        request: Request<Body>,
    ) -> Result<ReceiveOutcome> {
        let Some(limit) = self.timeout else {
            return self.process(name, tenant_id, request).await;
        };

        match tokio::time::timeout(limit, self.process(name, tenant_id, request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    receiver = %name,
                    timeout_secs = limit.as_secs(),
                    "Webhook request timed out"
                );
                Err(WebhookError::Timeout(limit))
            }
        }
    }

    async fn process(
        &self,
        name: &str,
        tenant_id: &str,
        request: Request<Body>,
    ) -> Result<ReceiveOutcome> {
        let name = name.to_ascii_lowercase();
        let entry = self
            .receivers
            .get(&name)
            .ok_or_else(|| WebhookError::not_found(format!("No webhook receiver named '{}'", name)))?;
        let receiver = &entry.receiver;

        let incoming = entry.parser.parse(request).await?;

        let secret = self
            .secrets
            .resolve(&name, tenant_id, receiver.secret_bounds())
            .await?;
        receiver.verify(&secret, &incoming)?;
        drop(secret);

        let payload = incoming.decode_json()?;

        let kind = match receiver.classify(&incoming) {
            Classification::Ping => {
                tracing::info!(
                    target: TRACING_TARGET,
                    receiver = %name,
                    "Received ping event, no handlers invoked"
                );
                return Ok(ReceiveOutcome {
                    receiver: name,
                    event: EventKind::new(incoming.event()).to_string(),
                    status: ReceiveStatus::Acknowledged,
                    handlers: 0,
                });
            }
            Classification::Event(kind) => kind,
        };

        let event = VerifiedEvent::new(name.clone(), tenant_id, kind.clone(), payload)
            .with_headers(incoming.into_headers());
        let handlers = self.router.dispatch(&event).await.into_result()?;

        Ok(ReceiveOutcome {
            receiver: name,
            event: kind.to_string(),
            status: ReceiveStatus::Dispatched,
            handlers,
        })
    }
}

/// Builder for [`WebhookReceivers`], the single place receivers, secrets and
/// handlers are wired together.
#[must_use = "builder does nothing until you call build()"]
pub struct WebhookReceiversBuilder {
    receivers: Vec<Arc<dyn WebhookReceiver>>,
    secrets: HashMap<String, String>,
    router: WebhookRouter,
    max_body_size: usize,
    timeout: Option<Duration>,
}

impl WebhookReceiversBuilder {
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
            secrets: HashMap::new(),
            router: WebhookRouter::new(),
            max_body_size: crate::config::DEFAULT_MAX_BODY_SIZE,
            timeout: None,
        }
    }

    pub fn receiver(mut self, receiver: impl WebhookReceiver + 'static) -> Self {
        self.receivers.push(Arc::new(receiver));
        self
    }

    /// Set the secret configuration string for a receiver
    pub fn secrets(mut self, receiver: impl AsRef<str>, config: impl Into<String>) -> Self {
        self.secrets
            .insert(receiver.as_ref().to_ascii_lowercase(), config.into());
        self
    }

    /// Merge secret configuration strings keyed by receiver name
    pub fn with_secrets(mut self, secrets: &HashMap<String, String>) -> Self {
        for (name, config) in secrets {
            self.secrets.insert(name.to_ascii_lowercase(), config.clone());
        }
        self
    }

    /// Merge secret configuration strings, keeping any already set
    pub(crate) fn fallback_secrets(mut self, secrets: &HashMap<String, String>) -> Self {
        for (name, config) in secrets {
            self.secrets
                .entry(name.to_ascii_lowercase())
                .or_insert_with(|| config.clone());
        }
        self
    }

    /// Run `handler` for every event from `receiver`
    pub fn handler(self, receiver: impl AsRef<str>, handler: impl WebhookHandler + 'static) -> Self {
        self.register(receiver, EventFilter::All, Arc::new(handler))
    }

    /// Run `handler` only for events of `kind` from `receiver`
    pub fn handler_for(
        self,
        receiver: impl AsRef<str>,
        kind: impl AsRef<str>,
        handler: impl WebhookHandler + 'static,
    ) -> Self {
        self.register(receiver, EventFilter::kind(kind), Arc::new(handler))
    }

    pub fn register(
        mut self,
        receiver: impl AsRef<str>,
        filter: EventFilter,
        handler: Arc<dyn WebhookHandler>,
    ) -> Self {
        self.router = self.router.register(receiver, filter, handler);
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Upper bound on processing one request, handlers included. `None`
    /// waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate names and secrets and assemble the receivers
    ///
    /// # Errors
    ///
    /// Any error is a configuration error and should stop the process:
    /// - invalid or duplicate receiver name
    /// - receiver without configured secrets
    /// - secret entry that does not parse or is outside the receiver's bounds
    pub fn build(self) -> Result<WebhookReceivers> {
        let snapshot = parse_snapshot(&self.secrets)?;
        let mut receivers = HashMap::new();

        for receiver in self.receivers {
            let name = receiver.name().to_string();
            validate_name(&name)?;
            if receivers.contains_key(&name) {
                return Err(WebhookError::configuration(format!(
                    "Webhook receiver '{}' is registered more than once",
                    name
                )));
            }

            let secrets = snapshot.get(&name).filter(|s| !s.is_empty()).ok_or_else(|| {
                WebhookError::configuration(format!("No secrets configured for receiver '{}'", name))
            })?;
            secrets.validate(&name, receiver.secret_bounds())?;

            let parser = RequestParser::new(receiver.headers().clone(), self.max_body_size);
            tracing::debug!(
                target: TRACING_TARGET,
                receiver = %name,
                tenants = secrets.len(),
                "Webhook receiver registered"
            );
            receivers.insert(name, ReceiverEntry { receiver, parser });
        }

        for name in snapshot.keys().filter(|n| !receivers.contains_key(*n)) {
            tracing::warn!(target: TRACING_TARGET, receiver = %name, "Secrets configured for unknown receiver");
        }
        for name in self.router.receivers().filter(|n| !receivers.contains_key(*n)) {
            tracing::warn!(target: TRACING_TARGET, receiver = %name, "Handler registered for unknown receiver");
        }

        Ok(WebhookReceivers {
            receivers,
            secrets: SecretStore::new(snapshot),
            router: self.router,
            timeout: self.timeout,
        })
    }
}

impl Default for WebhookReceiversBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(WebhookError::configuration(format!(
            "Webhook receiver name '{}' must be lowercase ASCII letters, digits, '-' or '_'",
            name
        )))
    }
}
