//! Management endpoints for webhook registrations.
//!
//! Every handler resolves the acting user from the forwarded-identity header
//! and passes it to the hook service, which owns the authorization decision.
//! The HTTP layer never inspects manager status itself.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};
use reward_relay_core::hooks::HookSummary;
use reward_relay_core::model::{HookId, OrganizationId, RemoteRepository, RepositoryId};
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::AppState;

/// Header the fronting auth proxy fills with the authenticated user name.
///
/// Requests without it act as the empty user, which no authorization check
/// accepts, so an unfronted deployment simply rejects all management calls.
pub const FORWARDED_USER_HEADER: &str = "x-forwarded-user";

pub(crate) fn acting_user(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Request and response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHooksQuery {
    #[serde(default)]
    pub offset: usize,
    /// Zero means no limit.
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub return_size: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookListResponse {
    pub webhooks: Vec<HookSummary>,
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRepositoriesQuery {
    pub page: usize,
    pub per_page: usize,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub return_size: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryListResponse {
    pub repositories: Vec<RemoteRepository>,
    pub page: usize,
    pub per_page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

// Token-bearing forms deliberately have no Debug impl.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHookForm {
    pub organization_name: String,
    pub access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTokenForm {
    pub web_hook_id: i64,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatusForm {
    pub organization_id: i64,
    pub repository_id: i64,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusForm {
    pub event_id: i64,
    pub organization_id: i64,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchScopeStatusForm {
    pub organization_id: i64,
    pub enabled: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) async fn list_hooks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListHooksQuery>,
) -> Result<Json<HookListResponse>, ApiError> {
    let user = acting_user(&headers);
    let webhooks = state
        .hooks
        .list_hooks(&user, query.offset, query.limit)
        .await?;
    let size = if query.return_size {
        Some(state.hooks.count_hooks(&user).await?)
    } else {
        None
    };
    Ok(Json(HookListResponse {
        webhooks,
        offset: query.offset,
        limit: query.limit,
        size,
    }))
}

pub(crate) async fn get_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<HookSummary>, ApiError> {
    let user = acting_user(&headers);
    let hook = state.hooks.get_hook(&user, HookId::new(id)).await?;
    Ok(Json(hook))
}

pub(crate) async fn create_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CreateHookForm>,
) -> Result<(StatusCode, Json<HookSummary>), ApiError> {
    let user = acting_user(&headers);
    let hook = state
        .hooks
        .create_hook(&user, &form.organization_name, &form.access_token)
        .await?;
    Ok((StatusCode::CREATED, Json(hook)))
}

pub(crate) async fn update_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<UpdateTokenForm>,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&headers);
    state
        .hooks
        .update_token(&user, HookId::new(form.web_hook_id), &form.access_token)
        .await?;
    Ok(StatusCode::CREATED)
}

pub(crate) async fn delete_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&headers);
    state
        .hooks
        .delete_hook(&user, OrganizationId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_repositories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<ListRepositoriesQuery>,
) -> Result<Json<RepositoryListResponse>, ApiError> {
    let user = acting_user(&headers);
    let organization_id = OrganizationId::new(id);
    let repositories = state
        .hooks
        .repositories(
            &user,
            organization_id,
            query.page,
            query.per_page,
            query.keyword.as_deref(),
        )
        .await?;
    let size = if query.return_size {
        Some(
            state
                .hooks
                .count_repositories(&user, organization_id)
                .await?,
        )
    } else {
        None
    };
    Ok(Json(RepositoryListResponse {
        repositories,
        page: query.page,
        per_page: query.per_page,
        size,
    }))
}

pub(crate) async fn set_repository_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RepositoryStatusForm>,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&headers);
    state
        .hooks
        .set_repository_enabled(
            &user,
            OrganizationId::new(form.organization_id),
            RepositoryId::new(form.repository_id),
            form.enabled,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn set_event_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<EventStatusForm>,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&headers);
    state
        .hooks
        .set_event_enabled(
            &user,
            form.event_id,
            OrganizationId::new(form.organization_id),
            form.enabled,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn set_watch_scope_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<WatchScopeStatusForm>,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&headers);
    state
        .hooks
        .set_watch_limited(&user, OrganizationId::new(form.organization_id), form.enabled)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn force_update(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = acting_user(&headers);
    state.hooks.force_refresh(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}
