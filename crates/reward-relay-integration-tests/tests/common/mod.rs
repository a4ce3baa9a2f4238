//! Shared harness for the reward-relay integration tests.
//!
//! Every test here drives the production wiring end to end: the axum router,
//! the hook service, the caching provider, and the real GitHub client, with a
//! wiremock server standing in for api.github.com. Single-component behavior
//! lives in the unit tests of the individual crates; these tests cover the
//! flows that cross crate boundaries.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reward_relay_api::management::FORWARDED_USER_HEADER;
use reward_relay_api::{create_router, AppState, EVENT_TYPE_HEADER, SIGNATURE_HEADER};
use reward_relay_core::{
    DispatchPool, EventDispatcher, HookId, HookService, HooksProvider, IdentityResolver,
    ManagerDirectory, MemoryRewardEngine, MemorySettingsStore, MemoryWebhookStore, OrganizationId,
    Reconciler, RemoteHookId, RepositoryGate, RewardEngine, ScoredEvent, SignatureVerifier,
    StaticIdentityResolver, StaticManagerDirectory, TriggerRegistry, WebhookRegistration,
    WebhookStore,
};
use reward_relay_github::{CachedHooksProvider, GithubConfig, GithubHooksClient};

/// Username every management request acts as.
pub const MANAGER: &str = "rewards-admin";

/// Access token used for seeded registrations and watch requests.
pub const TOKEN: &str = "ghp_integration";

/// Signing secret of the seeded registration.
pub const SECRET: &str = "wireSecret";

/// Organization the tests operate on.
pub const ORG_ID: i64 = 4242;
pub const ORG_NAME: &str = "initech";

/// Remote hook id the mocked GitHub hands out.
pub const HOOK_ID: i64 = 7001;

/// The full pipeline plus handles on the pieces the tests observe.
pub struct RelayHarness {
    pub app: Router,
    pub github: MockServer,
    pub store: Arc<MemoryWebhookStore>,
    pub engine: Arc<MemoryRewardEngine>,
    pub resolver: Arc<StaticIdentityResolver>,
    pub reconciler: Arc<Reconciler>,
}

/// Build the service exactly as the binary wires it, pointed at a fresh
/// wiremock server.
pub async fn harness() -> RelayHarness {
    let github = MockServer::start().await;
    let client = GithubHooksClient::new(
        GithubConfig::default()
            .with_api_base_url(github.uri())
            .with_webhook_callback_url("https://relay.example.com/webhooks")
            .with_request_timeout(Duration::from_secs(2)),
    )
    .expect("the GitHub client should build against the mock server");
    let provider: Arc<dyn HooksProvider> = Arc::new(CachedHooksProvider::new(Arc::new(client)));

    let store = Arc::new(MemoryWebhookStore::default());
    let gate = Arc::new(RepositoryGate::new(Arc::new(MemorySettingsStore::new())));
    let engine = Arc::new(MemoryRewardEngine::new());
    let resolver = Arc::new(StaticIdentityResolver::new());
    let managers = Arc::new(StaticManagerDirectory::new());
    managers.grant(MANAGER).await;

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store) as Arc<dyn WebhookStore>,
        Arc::clone(&provider),
    ));
    let hooks = Arc::new(HookService::new(
        Arc::clone(&store) as Arc<dyn WebhookStore>,
        Arc::clone(&provider),
        Arc::clone(&gate),
        Arc::clone(&engine) as Arc<dyn RewardEngine>,
        managers as Arc<dyn ManagerDirectory>,
        Arc::clone(&reconciler),
        TriggerRegistry::new(),
    ));
    let dispatcher = Arc::new(EventDispatcher::new(
        SignatureVerifier::default(),
        TriggerRegistry::new(),
        Arc::clone(&store) as Arc<dyn WebhookStore>,
        gate,
        Arc::clone(&engine) as Arc<dyn RewardEngine>,
        Arc::clone(&resolver) as Arc<dyn IdentityResolver>,
    ));
    let pool = Arc::new(DispatchPool::start(dispatcher, 16, 2));

    let app = create_router(AppState::new(hooks, pool));
    RelayHarness {
        app,
        github,
        store,
        engine,
        resolver,
        reconciler,
    }
}

/// Insert a registration directly, as if the organization had been watched in
/// an earlier session. Returns the stored record with its assigned id.
pub async fn seed_registration(store: &MemoryWebhookStore) -> WebhookRegistration {
    let now = Utc::now();
    store
        .save(WebhookRegistration {
            id: HookId::new(0),
            webhook_id: RemoteHookId::new(HOOK_ID),
            organization_id: OrganizationId::new(ORG_ID),
            organization_name: ORG_NAME.to_string(),
            triggers: TriggerRegistry::new().trigger_names(),
            enabled: true,
            watched_date: now,
            watched_by: MANAGER.to_string(),
            updated_date: now,
            refresh_date: now,
            secret: SECRET.to_string(),
            token: TOKEN.to_string(),
        })
        .await
        .expect("seeding the registration should succeed")
}

// ============================================================================
// GitHub response mounts
// ============================================================================

/// Token check: a usable token with plenty of rate limit left.
pub async fn mount_rate_limit(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": { "core": { "remaining": 4999, "reset": 1_700_000_000_u64 } }
        })))
        .mount(server)
        .await;
}

/// Token check: GitHub rejects the token outright.
pub async fn mount_rejected_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

/// Organization profile, reachable both by name and by id.
pub async fn mount_organization(server: &MockServer) {
    let profile = json!({
        "id": ORG_ID,
        "login": ORG_NAME,
        "name": "Initech",
        "description": "TPS reports, now with webhooks",
        "avatar_url": "https://avatars.example.com/initech.png"
    });
    for reference in [ORG_NAME.to_string(), ORG_ID.to_string()] {
        Mock::given(method("GET"))
            .and(path(format!("/orgs/{reference}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile.clone()))
            .mount(server)
            .await;
    }
}

/// Lookup of an organization GitHub has never heard of.
pub async fn mount_unknown_organization(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{ORG_NAME}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

/// Hook creation answered with `HOOK_ID` and the requested event set.
pub async fn mount_hook_creation(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/orgs/{ORG_NAME}/hooks")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": HOOK_ID,
            "events": TriggerRegistry::new().trigger_names(),
        })))
        .mount(server)
        .await;
}

/// The remote hook as reconciliation reads it back.
pub async fn mount_remote_hook(server: &MockServer, events: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{ORG_ID}/hooks/{HOOK_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": HOOK_ID,
            "events": events,
        })))
        .mount(server)
        .await;
}

/// Reconciliation finds the remote hook gone.
pub async fn mount_vanished_remote_hook(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{ORG_ID}/hooks/{HOOK_ID}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

pub async fn mount_hook_deletion(server: &MockServer) {
    Mock::given(method("DELETE"))
        .and(path(format!("/orgs/{ORG_ID}/hooks/{HOOK_ID}")))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

/// Two repositories under the organization, whatever page is asked for.
pub async fn mount_repositories(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{ORG_ID}/repos")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 9001, "name": "tps-reports", "description": "cover sheets" },
            { "id": 9002, "name": "printers", "description": null }
        ])))
        .mount(server)
        .await;
}

// ============================================================================
// Request builders
// ============================================================================

/// A bodyless management request acting as `MANAGER`.
pub fn authed(verb: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(verb)
        .uri(uri)
        .header(FORWARDED_USER_HEADER, MANAGER)
        .body(Body::empty())
        .unwrap()
}

/// A form-encoded management request acting as `MANAGER`.
pub fn form(verb: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(verb)
        .uri(uri)
        .header(FORWARDED_USER_HEADER, MANAGER)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A delivery signed with `secret` the way GitHub signs payload bodies.
pub fn signed_delivery(
    event_type: &str,
    secret: &str,
    payload: &serde_json::Value,
) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = SignatureVerifier::default().sign(secret, &body);
    Request::builder()
        .method("POST")
        .uri("/webhooks")
        .header(EVENT_TYPE_HEADER, event_type)
        .header(SIGNATURE_HEADER, signature)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// A pull request opened by `peter-gh` in the seeded organization.
pub fn opened_pr_payload() -> serde_json::Value {
    json!({
        "action": "opened",
        "pull_request": { "html_url": "https://github.com/initech/tps-reports/pull/7" },
        "sender": { "login": "peter-gh" },
        "organization": { "id": ORG_ID },
        "repository": { "id": 9001 }
    })
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The intake handler answers before the workers run; poll until the expected
/// number of submissions lands.
pub async fn wait_for_submissions(engine: &MemoryRewardEngine, count: usize) -> Vec<ScoredEvent> {
    for _ in 0..200 {
        let submitted = engine.submitted().await;
        if submitted.len() >= count {
            return submitted;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.submitted().await
}

/// Same polling for cancellations.
pub async fn wait_for_cancellations(engine: &MemoryRewardEngine, count: usize) -> Vec<ScoredEvent> {
    for _ in 0..200 {
        let cancelled = engine.cancelled().await;
        if cancelled.len() >= count {
            return cancelled;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.cancelled().await
}
