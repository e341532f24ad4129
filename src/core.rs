use crate::{
    config::Config,
    error::{Result, WebhookError},
    webhooks::{
        EventFilter, WebhookHandler, WebhookReceiver, WebhookReceivers, WebhookReceiversBuilder,
        webhook_routes,
    },
};
use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// A webhook receiver application: the receivers, their handlers and the
/// HTTP stack that serves them.
pub struct App {
    router: Router,
    config: Config,
    receivers: Arc<WebhookReceivers>,
}

impl App {
    /// Builder pattern for constructing an App
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared receivers, e.g. to reload secrets while serving
    pub fn receivers(&self) -> Arc<WebhookReceivers> {
        self.receivers.clone()
    }

    /// Get the router with the full middleware stack for in-process tests
    pub fn into_test_router(self) -> Router {
        self.with_middleware().router
    }

    /// Apply middleware stack and prepare for serving
    fn with_middleware(mut self) -> Self {
        let mut router = self.router;

        // Order, from inner to outer: body limit, request id, trace.
        // Timeouts are enforced in `WebhookReceivers::receive`.
        router = router.layer(DefaultBodyLimit::max(self.config.server.max_body_size));

        router = router
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id());

        router = router.layer(TraceLayer::new_for_http());

        self.router = router;
        self
    }

    /// Start the application server
    ///
    /// Runs until Ctrl+C or SIGTERM, then lets in-flight deliveries finish.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.addr().map_err(|e| {
            WebhookError::configuration(format!("Invalid server address in config: {}", e))
        })?;

        let app = self.with_middleware();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| WebhookError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Server starting on http://{}", addr);
        for name in app.receivers.names() {
            tracing::info!(
                receiver = %name,
                "Receiving webhooks at http://{}{}/{}",
                addr,
                app.config.webhooks.path_prefix,
                name
            );
        }

        axum::serve(listener, app.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| WebhookError::internal(format!("Server error: {}", e)))
    }
}

/// Builder for App with fluent API
///
/// ```rust,no_run
/// use tidehook::{App, ConfigBuilder};
/// use tidehook::webhooks::{GitHubReceiver, handler_fn};
///
/// # async fn run() -> tidehook::Result<()> {
/// let config = ConfigBuilder::new().from_env().build()?;
///
/// App::builder()
///     .with_config(config)
///     .receiver(GitHubReceiver::new())
///     .handler_for("github", "push", handler_fn(|event| async move {
///         tracing::info!(tenant = %event.tenant_id(), "push received");
///         Ok(())
///     }))
///     .build()?
///     .serve()
///     .await
/// # }
/// ```
#[must_use = "builder does nothing until you call build()"]
pub struct AppBuilder {
    config: Config,
    receivers: WebhookReceiversBuilder,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            receivers: WebhookReceivers::builder(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn receiver(mut self, receiver: impl WebhookReceiver + 'static) -> Self {
        self.receivers = self.receivers.receiver(receiver);
        self
    }

    /// Set a receiver's secret configuration in code, overriding `Config`
    pub fn secrets(mut self, receiver: impl AsRef<str>, config: impl Into<String>) -> Self {
        self.receivers = self.receivers.secrets(receiver, config);
        self
    }

    pub fn handler(mut self, receiver: impl AsRef<str>, handler: impl WebhookHandler + 'static) -> Self {
        self.receivers = self.receivers.handler(receiver, handler);
        self
    }

    pub fn handler_for(
        mut self,
        receiver: impl AsRef<str>,
        kind: impl AsRef<str>,
        handler: impl WebhookHandler + 'static,
    ) -> Self {
        self.receivers = self.receivers.handler_for(receiver, kind, handler);
        self
    }

    pub fn register(
        mut self,
        receiver: impl AsRef<str>,
        filter: EventFilter,
        handler: Arc<dyn WebhookHandler>,
    ) -> Self {
        self.receivers = self.receivers.register(receiver, filter, handler);
        self
    }

    /// Assemble the application
    ///
    /// # Errors
    ///
    /// Returns a configuration error when any receiver is misconfigured.
    /// Nothing is served in that case.
    pub fn build(self) -> Result<App> {
        let receivers = self
            .receivers
            .max_body_size(self.config.server.max_body_size)
            .timeout(self.config.webhooks.timeout())
            .fallback_secrets(&self.config.webhooks.receivers)
            .build()?;
        let receivers = Arc::new(receivers);

        let router = Router::new().nest(
            &self.config.webhooks.path_prefix,
            webhook_routes(receivers.clone()),
        );

        Ok(App {
            router,
            config: self.config,
            receivers,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Request id generator for the `x-request-id` header
#[derive(Clone, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Shutdown complete");
}
