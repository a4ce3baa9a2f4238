//! Tests for the dispatch pipeline.

use super::*;
use crate::engine::MemoryRewardEngine;
use crate::engine::CatalogEntry;
use crate::error::RelayError;
use crate::gate::MemorySettingsStore;
use crate::identity::StaticIdentityResolver;
use crate::model::{HookId, OrganizationId, RemoteHookId, RepositoryId, WebhookRegistration};
use crate::store::MemoryWebhookStore;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;

const SECRET: &str = "hookSecret";

struct Harness {
    dispatcher: Arc<EventDispatcher>,
    engine: Arc<MemoryRewardEngine>,
    gate: Arc<RepositoryGate>,
    resolver: Arc<StaticIdentityResolver>,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryWebhookStore::default());
    store
        .save(WebhookRegistration {
            id: HookId::new(0),
            webhook_id: RemoteHookId::new(900),
            organization_id: OrganizationId::new(77),
            organization_name: "acme".to_string(),
            triggers: TriggerRegistry::new().trigger_names(),
            enabled: true,
            watched_date: Utc::now(),
            watched_by: "operator".to_string(),
            updated_date: Utc::now(),
            refresh_date: Utc::now(),
            secret: SECRET.to_string(),
            token: "ghp_testtoken".to_string(),
        })
        .await
        .expect("seeding the registration should succeed");

    let engine = Arc::new(MemoryRewardEngine::new());
    let gate = Arc::new(RepositoryGate::new(Arc::new(MemorySettingsStore::new())));
    let resolver = Arc::new(StaticIdentityResolver::new());
    let dispatcher = Arc::new(EventDispatcher::new(
        SignatureVerifier::default(),
        TriggerRegistry::new(),
        store,
        Arc::clone(&gate),
        Arc::clone(&engine) as Arc<dyn RewardEngine>,
        Arc::clone(&resolver) as Arc<dyn IdentityResolver>,
    ));

    Harness {
        dispatcher,
        engine,
        gate,
        resolver,
    }
}

fn signed_delivery(event_type: &str, payload: serde_json::Value) -> WebhookDelivery {
    let body = serde_json::to_vec(&payload).expect("fixture payload serializes");
    let signature = SignatureVerifier::default().sign(SECRET, &body);
    WebhookDelivery {
        event_type: event_type.to_string(),
        signature,
        body: Bytes::from(body),
    }
}

fn opened_pr_payload() -> serde_json::Value {
    json!({
        "action": "opened",
        "pull_request": { "html_url": "https://github.com/acme/widgets/pull/42" },
        "sender": { "login": "bob-gh" },
        "organization": { "id": 77 },
        "repository": { "id": 4242 }
    })
}

// ============================================================================
// Verification gates
// ============================================================================

#[tokio::test]
async fn test_verified_pull_request_scores() {
    // Arrange
    let h = harness().await;
    h.engine.add_rule("createPullRequest").await;
    h.resolver.link("bob-gh", "bob").await;

    // Act
    let outcome = h
        .dispatcher
        .process(&signed_delivery("pull_request", opened_pr_payload()))
        .await
        .expect("processing should not fail");

    // Assert
    assert_eq!(outcome, DispatchOutcome::Processed { submitted: 1 });
    let submitted = h.engine.submitted().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].rule_title, "createPullRequest");
    assert_eq!(submitted[0].sender_id, "bob");
    assert_eq!(submitted[0].receiver_id.as_deref(), Some("bob"));
    assert_eq!(
        submitted[0].object_id,
        "https://github.com/acme/widgets/pull/42"
    );
}

#[tokio::test]
async fn test_bad_signature_is_discarded() {
    let h = harness().await;
    h.engine.add_rule("createPullRequest").await;
    h.resolver.link("bob-gh", "bob").await;

    let mut delivery = signed_delivery("pull_request", opened_pr_payload());
    delivery.signature = "sha1=0000000000000000000000000000000000000000".to_string();

    let outcome = h.dispatcher.process(&delivery).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Unverified);
    assert!(h.engine.submitted().await.is_empty(), "nothing may reach the engine");
}

#[tokio::test]
async fn test_tampered_body_is_discarded() {
    let h = harness().await;
    h.engine.add_rule("createPullRequest").await;
    h.resolver.link("bob-gh", "bob").await;

    // Signature from the real payload, body swapped for a doctored one
    let mut delivery = signed_delivery("pull_request", opened_pr_payload());
    let mut doctored = opened_pr_payload();
    doctored["sender"]["login"] = json!("mallory-gh");
    delivery.body = Bytes::from(serde_json::to_vec(&doctored).unwrap());

    let outcome = h.dispatcher.process(&delivery).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Unverified);
    assert!(h.engine.submitted().await.is_empty());
}

#[tokio::test]
async fn test_unwatched_organization_is_discarded() {
    let h = harness().await;
    let mut payload = opened_pr_payload();
    payload["organization"]["id"] = json!(999);

    let outcome = h
        .dispatcher
        .process(&signed_delivery("pull_request", payload))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Unverified);
}

#[tokio::test]
async fn test_payload_without_organization_is_discarded() {
    let h = harness().await;

    let outcome = h
        .dispatcher
        .process(&signed_delivery(
            "pull_request",
            json!({ "action": "opened" }),
        ))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Unverified);
}

#[tokio::test]
async fn test_unparseable_body_is_discarded() {
    let h = harness().await;
    let delivery = WebhookDelivery {
        event_type: "pull_request".to_string(),
        signature: "sha1=00".to_string(),
        body: Bytes::from_static(b"not json"),
    };

    let outcome = h.dispatcher.process(&delivery).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Unverified);
}

// ============================================================================
// Gating and filtering
// ============================================================================

#[tokio::test]
async fn test_disabled_repository_is_gated() {
    let h = harness().await;
    h.engine.add_rule("createPullRequest").await;
    h.resolver.link("bob-gh", "bob").await;
    h.gate
        .set_repository_enabled(OrganizationId::new(77), RepositoryId::new(4242), false)
        .await
        .unwrap();

    let outcome = h
        .dispatcher
        .process(&signed_delivery("pull_request", opened_pr_payload()))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::RepositoryDisabled);
    assert!(h.engine.submitted().await.is_empty());
}

#[tokio::test]
async fn test_event_disabled_for_the_organization_is_filtered() {
    let h = harness().await;
    h.engine.add_rule("createPullRequest").await;
    h.resolver.link("bob-gh", "bob").await;
    h.engine
        .add_catalog_entry(CatalogEntry {
            id: 1,
            title: "createPullRequest".to_string(),
            properties: HashMap::from([("77.enabled".to_string(), "false".to_string())]),
            cancellers: Vec::new(),
        })
        .await;

    let outcome = h
        .dispatcher
        .process(&signed_delivery("pull_request", opened_pr_payload()))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Processed { submitted: 0 });
    assert!(h.engine.submitted().await.is_empty());
}

#[tokio::test]
async fn test_unlinked_login_produces_no_submission() {
    let h = harness().await;
    h.engine.add_rule("createPullRequest").await;

    let outcome = h
        .dispatcher
        .process(&signed_delivery("pull_request", opened_pr_payload()))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Processed { submitted: 0 });
    assert!(h.engine.submitted().await.is_empty());
}

// ============================================================================
// Engine routing
// ============================================================================

#[tokio::test]
async fn test_event_without_a_rule_falls_back_to_cancellations() {
    // Arrange: no rule titled deleteIssueComment, but commentIssue names it
    // as a canceller
    let h = harness().await;
    h.resolver.link("bob-gh", "bob").await;
    h.engine
        .add_catalog_entry(CatalogEntry {
            id: 1,
            title: "commentIssue".to_string(),
            properties: HashMap::new(),
            cancellers: vec!["deleteIssueComment".to_string()],
        })
        .await;

    let payload = json!({
        "action": "deleted",
        "issue": { "html_url": "https://github.com/acme/widgets/issues/7" },
        "comment": { "html_url": "https://github.com/acme/widgets/issues/7#issuecomment-3" },
        "sender": { "login": "bob-gh" },
        "organization": { "id": 77 },
        "repository": { "id": 4242 }
    });

    // Act
    let outcome = h
        .dispatcher
        .process(&signed_delivery("issue_comment", payload))
        .await
        .unwrap();

    // Assert: the submission lands on the cancellation side under the
    // cancelled rule's title
    assert_eq!(outcome, DispatchOutcome::Processed { submitted: 1 });
    assert!(h.engine.submitted().await.is_empty());
    let cancelled = h.engine.cancelled().await;
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].rule_title, "commentIssue");
}

#[tokio::test]
async fn test_approval_scores_both_participants() {
    let h = harness().await;
    h.engine.add_rule("pullRequestValidated").await;
    h.engine.add_rule("validatePullRequest").await;
    h.resolver.link("alice-gh", "alice").await;
    h.resolver.link("carol-gh", "carol").await;

    let payload = json!({
        "action": "submitted",
        "review": {
            "state": "approved",
            "html_url": "https://github.com/acme/widgets/pull/42#pullrequestreview-9",
            "user": { "login": "carol-gh" }
        },
        "pull_request": {
            "html_url": "https://github.com/acme/widgets/pull/42",
            "user": { "login": "alice-gh" }
        },
        "organization": { "id": 77 },
        "repository": { "id": 4242 }
    });

    let outcome = h
        .dispatcher
        .process(&signed_delivery("pull_request_review", payload))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Processed { submitted: 2 });
    let submitted = h.engine.submitted().await;
    let recipients: Vec<_> = submitted
        .iter()
        .map(|s| (s.rule_title.as_str(), s.sender_id.as_str()))
        .collect();
    assert!(recipients.contains(&("pullRequestValidated", "alice")));
    assert!(recipients.contains(&("validatePullRequest", "carol")));
}

// ============================================================================
// Worker pool
// ============================================================================

#[tokio::test]
async fn test_shutdown_drains_the_queue() {
    let h = harness().await;
    h.engine.add_rule("createPullRequest").await;
    h.resolver.link("bob-gh", "bob").await;

    let pool = DispatchPool::start(Arc::clone(&h.dispatcher), 16, 2);
    for _ in 0..3 {
        pool.submit(signed_delivery("pull_request", opened_pr_payload()))
            .expect("queue should accept the delivery");
    }

    pool.shutdown().await;

    assert_eq!(
        h.engine.submitted().await.len(),
        3,
        "every queued delivery must be processed before shutdown returns"
    );
}

/// Engine that parks inside `submit` until released, to hold a worker busy.
struct StallingEngine {
    entered: tokio::sync::Semaphore,
    release: tokio::sync::Semaphore,
}

impl StallingEngine {
    fn new() -> Self {
        Self {
            entered: tokio::sync::Semaphore::new(0),
            release: tokio::sync::Semaphore::new(0),
        }
    }
}

#[async_trait::async_trait]
impl RewardEngine for StallingEngine {
    async fn event_enabled(
        &self,
        _name: crate::model::EventName,
        _organization_id: OrganizationId,
    ) -> Result<bool, RelayError> {
        Ok(true)
    }

    async fn set_event_enabled(
        &self,
        _event_id: i64,
        _organization_id: OrganizationId,
        _enabled: bool,
    ) -> Result<(), RelayError> {
        Ok(())
    }

    async fn rule_exists(&self, _name: crate::model::EventName) -> Result<bool, RelayError> {
        Ok(true)
    }

    async fn disable_rules_for_organization(
        &self,
        _organization_id: OrganizationId,
    ) -> Result<usize, RelayError> {
        Ok(0)
    }

    async fn cancellation_rules(
        &self,
        _name: crate::model::EventName,
    ) -> Result<Vec<String>, RelayError> {
        Ok(Vec::new())
    }

    async fn submit(&self, _event: ScoredEvent) -> Result<(), RelayError> {
        self.entered.add_permits(1);
        let _released = self.release.acquire().await;
        Ok(())
    }

    async fn submit_cancellation(&self, _event: ScoredEvent) -> Result<(), RelayError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_full_queue_rejects_the_delivery() {
    // Arrange: one worker held inside the engine, queue depth of one
    let store = Arc::new(MemoryWebhookStore::default());
    store
        .save(WebhookRegistration {
            id: HookId::new(0),
            webhook_id: RemoteHookId::new(900),
            organization_id: OrganizationId::new(77),
            organization_name: "acme".to_string(),
            triggers: Vec::new(),
            enabled: true,
            watched_date: Utc::now(),
            watched_by: "operator".to_string(),
            updated_date: Utc::now(),
            refresh_date: Utc::now(),
            secret: SECRET.to_string(),
            token: "ghp_testtoken".to_string(),
        })
        .await
        .unwrap();
    let engine = Arc::new(StallingEngine::new());
    let resolver = Arc::new(StaticIdentityResolver::new());
    resolver.link("bob-gh", "bob").await;
    let dispatcher = Arc::new(EventDispatcher::new(
        SignatureVerifier::default(),
        TriggerRegistry::new(),
        store,
        Arc::new(RepositoryGate::new(Arc::new(MemorySettingsStore::new()))),
        Arc::clone(&engine) as Arc<dyn RewardEngine>,
        resolver,
    ));
    let pool = DispatchPool::start(dispatcher, 1, 1);

    // Act: first delivery occupies the worker, second fills the queue
    pool.submit(signed_delivery("pull_request", opened_pr_payload()))
        .unwrap();
    engine
        .entered
        .acquire()
        .await
        .expect("the worker should reach the engine")
        .forget();
    pool.submit(signed_delivery("pull_request", opened_pr_payload()))
        .unwrap();

    let rejected = pool.submit(signed_delivery("pull_request", opened_pr_payload()));

    // Assert
    assert!(matches!(rejected, Err(RelayError::QueueFull)));
    engine.release.add_permits(8);
    pool.shutdown().await;
}
