//! Issue lifecycle and labelling events.

use super::event;
use crate::model::{DomainEvent, EventName, ObjectType};
use crate::payload::WebhookPayload;

/// Classify an `issues` payload.
///
/// A close only scores when the issue was discarded (`state_reason` of
/// `not_planned`); closing an issue as completed is rewarded through the work
/// that completed it, not the close itself. Label events key on the issue URL
/// augmented with the label name so that adding and removing the same label
/// cancel each other out.
pub fn classify(payload: &WebhookPayload) -> Vec<DomainEvent> {
    let Some(actor) = payload.str_at(&["sender", "login"]) else {
        return Vec::new();
    };
    let Some(url) = payload.str_at(&["issue", "html_url"]) else {
        return Vec::new();
    };

    match payload.action() {
        Some("opened") => vec![event(
            payload,
            EventName::CreateIssue,
            Some(actor),
            actor,
            url.to_string(),
            Some(ObjectType::Issue),
        )],
        Some("closed") => {
            if payload.str_at(&["issue", "state_reason"]) == Some("not_planned") {
                vec![event(
                    payload,
                    EventName::CloseIssue,
                    Some(actor),
                    actor,
                    url.to_string(),
                    Some(ObjectType::Issue),
                )]
            } else {
                Vec::new()
            }
        }
        Some("labeled") => label_event(payload, EventName::AddIssueLabel, actor, url),
        Some("unlabeled") => label_event(payload, EventName::DeleteIssueLabel, actor, url),
        _ => Vec::new(),
    }
}

fn label_event(
    payload: &WebhookPayload,
    name: EventName,
    actor: &str,
    url: &str,
) -> Vec<DomainEvent> {
    let Some(label) = payload.str_at(&["label", "name"]) else {
        return Vec::new();
    };
    vec![event(
        payload,
        name,
        Some(actor),
        actor,
        format!("{url}?label={label}"),
        Some(ObjectType::Issue),
    )]
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
