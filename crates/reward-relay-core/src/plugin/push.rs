//! Push events.

use super::event;
use crate::model::{DomainEvent, EventName};
use crate::payload::WebhookPayload;

/// Classify a `push` payload. Every push scores the pusher once, keyed on the
/// head commit URL. Pushes carry no object type; the scored object is the
/// commit itself.
pub fn classify(payload: &WebhookPayload) -> Vec<DomainEvent> {
    let Some(pusher) = payload.str_at(&["pusher", "name"]) else {
        return Vec::new();
    };
    let Some(url) = payload.str_at(&["head_commit", "url"]) else {
        return Vec::new();
    };
    vec![event(payload, EventName::PushCode, None, pusher, url.to_string(), None)]
}

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;
