//! # Reward-Relay HTTP Service
//!
//! HTTP surface for the reward-relay pipeline.
//!
//! This crate provides:
//! - The webhook intake endpoint that queues raw GitHub deliveries
//! - The management API for watching organizations, rotating tokens, and
//!   gating repositories and events
//!
//! The intake handler never inspects a delivery beyond its headers: it hands
//! the raw bytes to the dispatch pool and answers immediately, so GitHub
//! gets its response long before verification or classification run.

pub mod errors;
pub mod management;


use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::Router;
use bytes::Bytes;
use reward_relay_core::dispatch::{DispatchPool, WebhookDelivery};
use reward_relay_core::hooks::HookService;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::errors::ApiError;
use crate::management::{
    create_hook, delete_hook, force_update, get_hook, list_hooks, list_repositories,
    set_event_status, set_repository_status, set_watch_scope_status, update_token,
};

/// Header naming the GitHub event type of a delivery.
pub const EVENT_TYPE_HEADER: &str = "x-github-event";

/// Header carrying the HMAC signature of the delivery body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Management operations on webhook registrations
    pub hooks: Arc<HookService>,

    /// Bounded intake queue for raw deliveries
    pub dispatcher: Arc<DispatchPool>,
}

impl AppState {
    pub fn new(hooks: Arc<HookService>, dispatcher: Arc<DispatchPool>) -> Self {
        Self { hooks, dispatcher }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route("/webhooks", post(handle_webhook));

    let management_routes = Router::new()
        .route(
            "/hooks",
            get(list_hooks).post(create_hook).patch(update_token),
        )
        .route("/hooks/forceUpdate", patch(force_update))
        .route("/hooks/repo/status", post(set_repository_status))
        .route("/hooks/watchScope/status", post(set_watch_scope_status))
        .route("/hooks/events/status", post(set_event_status))
        .route("/hooks/{id}", get(get_hook).delete(delete_hook))
        .route("/hooks/{id}/repos", get(list_repositories));

    Router::new()
        .merge(webhook_routes)
        .merge(management_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Webhook intake
// ============================================================================

/// Queue one raw delivery.
///
/// Only the two delivery headers are read here; the body stays untouched so
/// the workers can verify the signature over exactly the bytes GitHub sent.
/// A missing header is the only client error this endpoint reports, and a
/// full queue answers 500 so GitHub redelivers later.
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let event_type = required_header(&headers, EVENT_TYPE_HEADER)?;
    let signature = required_header(&headers, SIGNATURE_HEADER)?;

    debug!(event_type = %event_type, body_bytes = body.len(), "webhook delivery received");
    state.dispatcher.submit(WebhookDelivery {
        event_type,
        signature,
        body,
    })?;
    Ok(StatusCode::OK)
}

fn required_header(headers: &HeaderMap, header: &'static str) -> Result<String, ApiError> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingHeader { header })
}
