//! Tidehook - authenticated inbound webhooks for Axum
//!
//! Tidehook receives webhook deliveries from external providers, checks the
//! HMAC signature against a per-tenant shared secret and hands the decoded
//! event to the handlers registered for it.
//!
//! # Features
//!
//! - **Receivers**: GitHub out of the box, any `<tag>=<hex HMAC>` provider
//!   through [`webhooks::HmacReceiver`]
//! - **Tenants**: several secrets per receiver, selected by URI id
//! - **Handlers**: async trait or closure, filtered by event kind, every
//!   handler runs even when one fails
//! - **Testing**: in-process request scenarios with signed bodies
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tidehook::{App, ConfigBuilder};
//! use tidehook::webhooks::{GitHubReceiver, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> tidehook::Result<()> {
//!     tidehook::init_tracing();
//!
//!     // TIDEHOOK_WEBHOOK_RECEIVER_SECRET_GITHUB="secret0, id1=secret1"
//!     let config = ConfigBuilder::new().from_env().build()?;
//!
//!     App::builder()
//!         .with_config(config)
//!         .receiver(GitHubReceiver::new())
//!         .handler("github", handler_fn(|event| async move {
//!             tracing::info!(kind = %event.kind(), "delivery");
//!             Ok(())
//!         }))
//!         .build()?
//!         .serve()
//!         .await
//! }
//! ```

mod config;
mod core;
mod error;
pub mod testing;
pub mod utils;
pub mod webhooks;

// Re-exports for public API
pub use config::{
    Config, ConfigBuilder, DEFAULT_MAX_BODY_SIZE, LoggingConfig, RECEIVER_SECRET_ENV_PREFIX,
    ServerConfig, WebhookConfig,
};
pub use crate::core::{App, AppBuilder};
pub use error::{
    ErrorResponse, RequestError, RequestErrorKind, Result, SignatureError, SignatureErrorKind,
    WebhookError,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main()
/// before creating the App.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "tidehook=debug")
/// - `TIDEHOOK_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("TIDEHOOK_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    init_subscriber(env_filter, json_logs);
}

/// Initialize tracing from the `logging` section of a [`Config`]
pub fn init_tracing_with_config(config: &Config) {
    init_subscriber(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn init_subscriber(env_filter: EnvFilter, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
