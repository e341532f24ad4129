//! Inbound webhook receivers.
//!
//! Authenticates webhook deliveries with a per-tenant shared secret, then
//! hands the decoded event to the handlers registered for it.

pub mod custom;
pub mod event;
pub mod github;
pub mod handler;
pub mod receiver;
pub mod request;
pub mod routes;
pub mod secrets;
pub mod verification;

pub use custom::{HmacReceiver, HmacReceiverBuilder};
pub use event::{Classification, EventKind, VerifiedEvent};
pub use github::GitHubReceiver;
pub use handler::{DispatchReport, EventFilter, HandlerFailure, WebhookHandler, WebhookRouter, handler_fn};
pub use receiver::{ReceiveOutcome, ReceiveStatus, WebhookReceiver, WebhookReceivers, WebhookReceiversBuilder};
pub use request::{HeaderConvention, IncomingRequest, RequestParser};
pub use routes::webhook_routes;
pub use secrets::{ReceiverSecrets, SecretBounds, SecretStore};
pub use verification::{SignatureAlgorithm, SignatureVerifier};
