//! Issue and pull request comment events.

use super::event;
use crate::model::{DomainEvent, EventName, ObjectType};
use crate::payload::WebhookPayload;

/// Classify an `issue_comment` payload.
///
/// The provider delivers comments on pull requests through the same trigger
/// as issue comments; the `issue.pull_request` stub tells the two apart.
/// Creation and deletion map to symmetric events keyed on the same comment
/// URL so a delete can cancel the points the creation earned.
pub fn classify(payload: &WebhookPayload) -> Vec<DomainEvent> {
    let Some(actor) = payload.str_at(&["sender", "login"]) else {
        return Vec::new();
    };
    let Some(url) = payload.str_at(&["comment", "html_url"]) else {
        return Vec::new();
    };

    let on_pull_request = payload.has(&["issue", "pull_request"]);
    let name = match payload.action() {
        Some("created") if on_pull_request => EventName::CommentPullRequest,
        Some("created") => EventName::CommentIssue,
        Some("deleted") if on_pull_request => EventName::DeletePullRequestComment,
        Some("deleted") => EventName::DeleteIssueComment,
        _ => return Vec::new(),
    };
    let object_type = if on_pull_request {
        ObjectType::PullRequestComment
    } else {
        ObjectType::IssueComment
    };

    vec![event(payload, name, None, actor, url.to_string(), Some(object_type))]
}

#[cfg(test)]
#[path = "comment_tests.rs"]
mod tests;
