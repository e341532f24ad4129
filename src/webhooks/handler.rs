use super::event::{EventKind, VerifiedEvent};
use crate::error::{Result, WebhookError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

const TRACING_TARGET: &str = "tidehook::webhooks::handler";

/// Trait for handling verified webhook events
///
/// Implement this for each piece of business logic that should run when a
/// receiver accepts an event.
///
/// # Example
///
/// ```rust,ignore
/// use tidehook::webhooks::{VerifiedEvent, WebhookHandler};
///
/// #[derive(Deserialize)]
/// struct PackageAdded {
///     package: String,
/// }
///
/// struct IndexPackage {
///     index: SearchIndex,
/// }
///
/// #[async_trait]
/// impl WebhookHandler for IndexPackage {
///     async fn handle(&self, event: &VerifiedEvent) -> Result<()> {
///         let payload: PackageAdded = event.payload_as()?;
///         self.index.add(&payload.package).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Handle the webhook event
    async fn handle(&self, event: &VerifiedEvent) -> Result<()>;

    /// Optional: react to a failure of [`WebhookHandler::handle`]
    async fn on_error(&self, event: &VerifiedEvent, error: &WebhookError) {
        tracing::error!(
            target: TRACING_TARGET,
            receiver = event.receiver(),
            kind = %event.kind(),
            error = %error,
            "Webhook handler failed"
        );
    }
}

/// Handler built from an async closure, see [`handler_fn`]
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`WebhookHandler`]
///
/// The closure receives its own copy of the event.
///
/// ```rust
/// use tidehook::webhooks::handler_fn;
///
/// let handler = handler_fn(|event| async move {
///     tracing::info!(kind = %event.kind(), "received");
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(VerifiedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> WebhookHandler for FnHandler<F>
where
    F: Fn(VerifiedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &VerifiedEvent) -> Result<()> {
        (self.0)(event.clone()).await
    }
}

/// Which event kinds a registration receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Kind(EventKind),
}

impl EventFilter {
    pub fn kind(kind: impl AsRef<str>) -> Self {
        Self::Kind(EventKind::new(kind))
    }

    pub fn matches(&self, kind: &EventKind) -> bool {
        match self {
            Self::All => true,
            Self::Kind(expected) => expected == kind,
        }
    }
}

struct Registration {
    receiver: String,
    filter: EventFilter,
    handler: Arc<dyn WebhookHandler>,
}

/// A handler that returned an error during dispatch
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Position among the handlers that matched the event
    pub index: usize,
    pub error: String,
}

/// Aggregated outcome of running every matching handler
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of handlers run, or a handler error if any of them failed
    pub fn into_result(self) -> Result<usize> {
        if self.failures.is_empty() {
            Ok(self.invoked)
        } else {
            Err(WebhookError::Handler {
                failed: self.failures.len(),
                total: self.invoked,
            })
        }
    }
}

/// Registry of handlers keyed by receiver name and event kind.
///
/// Registrations are added while the application is assembled. Once the
/// router is shared it is read-only.
#[derive(Default)]
pub struct WebhookRouter {
    registrations: Vec<Registration>,
}

impl WebhookRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events from `receiver` that match `filter`
    pub fn register(
        mut self,
        receiver: impl AsRef<str>,
        filter: EventFilter,
        handler: Arc<dyn WebhookHandler>,
    ) -> Self {
        self.registrations.push(Registration {
            receiver: receiver.as_ref().to_ascii_lowercase(),
            filter,
            handler,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Receiver names that have at least one handler
    pub fn receivers(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.receiver.as_str())
    }

    /// Run every matching handler in registration order.
    ///
    /// A failing handler does not stop the rest; its error is recorded in the
    /// report.
    pub async fn dispatch(&self, event: &VerifiedEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        let matching = self
            .registrations
            .iter()
            .filter(|r| r.receiver == event.receiver() && r.filter.matches(event.kind()));

        for (index, registration) in matching.enumerate() {
            report.invoked += 1;
            if let Err(e) = registration.handler.handle(event).await {
                registration.handler.on_error(event, &e).await;
                report.failures.push(HandlerFailure {
                    index,
                    error: e.to_string(),
                });
            }
        }

        if report.invoked == 0 {
            tracing::debug!(
                target: TRACING_TARGET,
                receiver = event.receiver(),
                kind = %event.kind(),
                "No handlers registered for webhook event"
            );
        } else {
            tracing::info!(
                target: TRACING_TARGET,
                receiver = event.receiver(),
                kind = %event.kind(),
                invoked = report.invoked,
                failed = report.failures.len(),
                "Webhook event dispatched"
            );
        }

        report
    }
}
