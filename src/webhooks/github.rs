//! GitHub webhook receiver.
//!
//! Configure the secret under the receiver name `github`, optionally with
//! tenant ids to tell several hooks apart: `secret0, id1=secret1`. Hooks
//! then post to `/webhooks/incoming/github` or
//! `/webhooks/incoming/github/{id}`.

use super::receiver::WebhookReceiver;
use super::request::HeaderConvention;
use super::secrets::SecretBounds;
use super::verification::SignatureAlgorithm;

/// Receiver for GitHub's `X-Hub-Signature: sha1=<hex>` deliveries
#[derive(Debug, Clone)]
pub struct GitHubReceiver {
    headers: HeaderConvention,
}

impl GitHubReceiver {
    pub const NAME: &'static str = "github";
    pub const EVENT_HEADER: &'static str = "X-Github-Event";
    pub const SIGNATURE_HEADER: &'static str = "X-Hub-Signature";
    pub const PING_EVENT: &'static str = "ping";
    pub const SECRET_BOUNDS: SecretBounds = SecretBounds::new(16, 128);

    pub fn new() -> Self {
        Self {
            headers: HeaderConvention::new(Self::EVENT_HEADER, Self::SIGNATURE_HEADER),
        }
    }
}

impl Default for GitHubReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookReceiver for GitHubReceiver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn headers(&self) -> &HeaderConvention {
        &self.headers
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Sha1
    }

    fn secret_bounds(&self) -> SecretBounds {
        Self::SECRET_BOUNDS
    }

    fn ping_event(&self) -> Option<&str> {
        Some(Self::PING_EVENT)
    }
}
