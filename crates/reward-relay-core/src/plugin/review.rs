//! Pull request review events.

use super::event;
use crate::model::{DomainEvent, EventName, ObjectType};
use crate::payload::WebhookPayload;

/// Classify a `pull_request_review` payload.
///
/// A plain comment review scores the reviewer once. An approval scores both
/// sides: the pull request author for having the work validated and the
/// reviewer for validating it. Dismissed and changes-requested reviews score
/// nothing.
pub fn classify(payload: &WebhookPayload) -> Vec<DomainEvent> {
    let Some(url) = payload.str_at(&["review", "html_url"]) else {
        return Vec::new();
    };

    match payload.str_at(&["review", "state"]) {
        Some("commented") => {
            let Some(reviewer) = payload.str_at(&["review", "user", "login"]) else {
                return Vec::new();
            };
            vec![event(
                payload,
                EventName::ReviewPullRequest,
                Some(reviewer),
                reviewer,
                url.to_string(),
                Some(ObjectType::PullRequest),
            )]
        }
        Some("approved") => {
            let mut events = Vec::with_capacity(2);
            if let Some(author) = payload.str_at(&["pull_request", "user", "login"]) {
                events.push(event(
                    payload,
                    EventName::PullRequestValidated,
                    Some(author),
                    author,
                    url.to_string(),
                    Some(ObjectType::PullRequest),
                ));
            }
            if let Some(reviewer) = payload.str_at(&["review", "user", "login"]) {
                events.push(event(
                    payload,
                    EventName::ValidatePullRequest,
                    Some(reviewer),
                    reviewer,
                    url.to_string(),
                    Some(ObjectType::PullRequest),
                ));
            }
            events
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
