//! Configurable receiver for providers that sign with `<tag>=<hex HMAC>`.

use super::receiver::WebhookReceiver;
use super::request::HeaderConvention;
use super::secrets::SecretBounds;
use super::verification::SignatureAlgorithm;

/// A receiver assembled from its conventions instead of a dedicated type.
///
/// ```rust
/// use tidehook::webhooks::{HmacReceiver, SignatureAlgorithm};
///
/// // GitHub's newer SHA-256 signature header
/// let receiver = HmacReceiver::builder("github256")
///     .event_header("X-GitHub-Event")
///     .signature_header("X-Hub-Signature-256")
///     .algorithm(SignatureAlgorithm::Sha256)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HmacReceiver {
    name: String,
    headers: HeaderConvention,
    algorithm: SignatureAlgorithm,
    ping_event: Option<String>,
    bounds: SecretBounds,
}

impl HmacReceiver {
    pub fn builder(name: impl Into<String>) -> HmacReceiverBuilder {
        HmacReceiverBuilder::new(name)
    }
}

impl WebhookReceiver for HmacReceiver {
    fn name(&self) -> &str {
        &self.name
    }

    fn headers(&self) -> &HeaderConvention {
        &self.headers
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn secret_bounds(&self) -> SecretBounds {
        self.bounds
    }

    fn ping_event(&self) -> Option<&str> {
        self.ping_event.as_deref()
    }
}

/// Builder for [`HmacReceiver`]
///
/// Defaults: `X-Webhook-Event` / `X-Webhook-Signature` headers, SHA-256,
/// ping kind `ping`, secrets of 16 to 128 bytes.
#[must_use = "builder does nothing until you call build()"]
pub struct HmacReceiverBuilder {
    receiver: HmacReceiver,
}

impl HmacReceiverBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            receiver: HmacReceiver {
                name: name.into(),
                headers: HeaderConvention::new("X-Webhook-Event", "X-Webhook-Signature"),
                algorithm: SignatureAlgorithm::Sha256,
                ping_event: Some("ping".to_string()),
                bounds: SecretBounds::new(16, 128),
            },
        }
    }

    pub fn event_header(mut self, header: impl Into<String>) -> Self {
        self.receiver.headers.event_header = header.into();
        self
    }

    pub fn signature_header(mut self, header: impl Into<String>) -> Self {
        self.receiver.headers.signature_header = header.into();
        self
    }

    pub fn algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.receiver.algorithm = algorithm;
        self
    }

    pub fn ping_event(mut self, kind: impl Into<String>) -> Self {
        self.receiver.ping_event = Some(kind.into());
        self
    }

    /// Provider has no reachability event; every kind is dispatched
    pub fn without_ping(mut self) -> Self {
        self.receiver.ping_event = None;
        self
    }

    pub fn secret_bounds(mut self, min: usize, max: usize) -> Self {
        self.receiver.bounds = SecretBounds::new(min, max);
        self
    }

    pub fn build(self) -> HmacReceiver {
        self.receiver
    }
}
