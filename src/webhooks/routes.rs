use super::receiver::{ReceiveOutcome, WebhookReceivers};
use crate::error::Result;
use axum::{
    Router,
    extract::{Path, Request, State},
    routing::any,
};
use std::sync::Arc;

/// Routes for inbound webhooks, meant to be nested under a prefix such as
/// `/webhooks/incoming`:
///
/// - `/{receiver}` verifies with the receiver's default secret
/// - `/{receiver}/{id}` verifies with the secret of tenant `id`
///
/// Every method is routed to the receiver so that non-POST requests get the
/// receiver's 405 response rather than the router's.
pub fn webhook_routes(receivers: Arc<WebhookReceivers>) -> Router {
    Router::new()
        .route("/{receiver}", any(receive))
        .route("/{receiver}/{id}", any(receive_for_tenant))
        .with_state(receivers)
}

async fn receive(
    State(receivers): State<Arc<WebhookReceivers>>,
    Path(receiver): Path<String>,
    request: Request,
) -> Result<ReceiveOutcome> {
    receivers.receive(&receiver, "", request).await
}

async fn receive_for_tenant(
    State(receivers): State<Arc<WebhookReceivers>>,
    Path((receiver, id)): Path<(String, String)>,
    request: Request,
) -> Result<ReceiveOutcome> {
    receivers.receive(&receiver, &id, request).await
}
