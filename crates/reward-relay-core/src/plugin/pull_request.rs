//! Pull request lifecycle events.

use super::event;
use crate::model::{DomainEvent, EventName, ObjectType};
use crate::payload::WebhookPayload;

/// Classify a `pull_request` payload.
///
/// `opened` scores the author, `closed` scores the author only when the pull
/// request was not merged (a merge is handled by the review flow, not as an
/// abandonment). Review request changes key the event on the pull request URL
/// augmented with the requested reviewer so that adding and removing the same
/// reviewer cancel each other out.
pub fn classify(payload: &WebhookPayload) -> Vec<DomainEvent> {
    let Some(author) = payload.str_at(&["sender", "login"]) else {
        return Vec::new();
    };
    let Some(url) = payload.str_at(&["pull_request", "html_url"]) else {
        return Vec::new();
    };

    match payload.action() {
        Some("opened") => vec![event(
            payload,
            EventName::CreatePullRequest,
            None,
            author,
            url.to_string(),
            Some(ObjectType::PullRequest),
        )],
        Some("closed") if payload.bool_at(&["pull_request", "merged"]) == Some(false) => {
            vec![event(
                payload,
                EventName::ClosePullRequest,
                None,
                author,
                url.to_string(),
                Some(ObjectType::PullRequest),
            )]
        }
        Some("review_requested") => reviewer_event(payload, EventName::RequestReviewForPullRequest, author, url),
        Some("review_request_removed") => {
            reviewer_event(payload, EventName::ReviewRequestRemoved, author, url)
        }
        _ => Vec::new(),
    }
}

fn reviewer_event(
    payload: &WebhookPayload,
    name: EventName,
    author: &str,
    url: &str,
) -> Vec<DomainEvent> {
    let Some(reviewer) = payload.str_at(&["requested_reviewer", "login"]) else {
        return Vec::new();
    };
    vec![event(
        payload,
        name,
        None,
        author,
        format!("{url}?requestedReviewer={reviewer}"),
        Some(ObjectType::PullRequest),
    )]
}

#[cfg(test)]
#[path = "pull_request_tests.rs"]
mod tests;
