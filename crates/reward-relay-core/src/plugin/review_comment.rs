//! Pull request review comment events.

use super::event;
use crate::model::{DomainEvent, EventName, ObjectType};
use crate::payload::WebhookPayload;

/// Classify a `pull_request_review_comment` payload. Every delivery scores
/// the comment author; the object is the comment's browser URL, which on this
/// trigger lives under `comment._links.html.href` rather than `html_url`.
pub fn classify(payload: &WebhookPayload) -> Vec<DomainEvent> {
    let Some(author) = payload.str_at(&["comment", "user", "login"]) else {
        return Vec::new();
    };
    let Some(url) = payload.str_at(&["comment", "_links", "html", "href"]) else {
        return Vec::new();
    };
    vec![event(
        payload,
        EventName::PullRequestReviewComment,
        None,
        author,
        url.to_string(),
        Some(ObjectType::ReviewComment),
    )]
}

#[cfg(test)]
#[path = "review_comment_tests.rs"]
mod tests;
