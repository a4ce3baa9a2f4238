//! Payload-to-event classification plugins.
//!
//! One plugin per provider trigger, each a pure function from a parsed
//! payload to zero or more domain events. The registry is a fixed table built
//! once at startup; there is no runtime registration. A provider event type
//! without a plugin classifies to no events, and a payload missing a field a
//! plugin needs classifies to no events. Classification never fails a
//! request.

pub mod comment;
pub mod issue;
pub mod pull_request;
pub mod push;
pub mod review;
pub mod review_comment;

use crate::model::{DomainEvent, EventName, ObjectType, Trigger};
use crate::payload::WebhookPayload;

/// A classification function: parsed payload in, domain events out.
pub type ClassifyFn = fn(&WebhookPayload) -> Vec<DomainEvent>;

/// Static trigger-to-plugin table.
#[derive(Debug, Clone)]
pub struct TriggerRegistry {
    table: [(Trigger, ClassifyFn); 6],
}

impl TriggerRegistry {
    /// Build the registry with every known plugin. The table is fixed: the
    /// set of watched triggers is also what newly created remote webhooks
    /// subscribe to.
    pub fn new() -> Self {
        Self {
            table: [
                (Trigger::PullRequest, pull_request::classify as ClassifyFn),
                (Trigger::Issues, issue::classify as ClassifyFn),
                (Trigger::IssueComment, comment::classify as ClassifyFn),
                (Trigger::PullRequestReview, review::classify as ClassifyFn),
                (
                    Trigger::PullRequestReviewComment,
                    review_comment::classify as ClassifyFn,
                ),
                (Trigger::Push, push::classify as ClassifyFn),
            ],
        }
    }

    /// Classify a payload for the given provider event-type header value.
    /// Unknown event types yield no events.
    pub fn classify(&self, event_type: &str, payload: &WebhookPayload) -> Vec<DomainEvent> {
        match Trigger::from_header(event_type) {
            Some(trigger) => self.classify_trigger(trigger, payload),
            None => Vec::new(),
        }
    }

    /// Classify a payload for an already-parsed trigger.
    pub fn classify_trigger(&self, trigger: Trigger, payload: &WebhookPayload) -> Vec<DomainEvent> {
        self.table
            .iter()
            .find(|(t, _)| *t == trigger)
            .map(|(_, classify)| classify(payload))
            .unwrap_or_default()
    }

    /// The provider event-type names this registry watches, in table order.
    pub fn triggers(&self) -> Vec<Trigger> {
        self.table.iter().map(|(t, _)| *t).collect()
    }

    /// Trigger names as wire strings, the form remote hook subscriptions use.
    pub fn trigger_names(&self) -> Vec<String> {
        self.table
            .iter()
            .map(|(t, _)| t.as_str().to_string())
            .collect()
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build one event with the organization/repository ids every payload carries
/// at its top level. Plugins call this once their required fields are known
/// to be present.
fn event(
    payload: &WebhookPayload,
    name: EventName,
    sender: Option<&str>,
    receiver: &str,
    object_id: String,
    object_type: Option<ObjectType>,
) -> DomainEvent {
    DomainEvent {
        name,
        sender: sender.map(str::to_string),
        receiver: receiver.to_string(),
        object_id,
        object_type,
        organization_id: payload.organization_id(),
        repository_id: payload.repository_id(),
    }
}
