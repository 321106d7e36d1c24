//! Publish-side handlers.
//!
//! POST /preflight   page safety + overlay diagnostics
//! POST /publish     gate, clone draft, build artifact, attach runtime
//! POST /rollback    rebuild an older published revision and make it live
//! GET  /diff        style-rule diff between two revisions
//! GET  /audit       newest-first audit entries
//! GET  /page/load   page HTML plus the overlay of one environment

use crate::error::{ApiError, ApiResult};
use crate::state::{actor, AppState};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use dve_model::{Environment, ProjectId, RevisionId};
use dve_publish::{PreflightRequest, PublishRequest, RollbackRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_AUDIT_LIMIT: usize = 50;

/// `{"success": true}` merged into a serialized response body
fn success<T: Serialize>(body: &T) -> ApiResult<Json<Value>> {
    let mut value = serde_json::to_value(body).map_err(|err| ApiError::internal(err.to_string()))?;
    if let Some(fields) = value.as_object_mut() {
        fields.insert("success".to_string(), Value::Bool(true));
    }
    Ok(Json(value))
}

pub async fn preflight(
    State(state): State<AppState>,
    Json(req): Json<PreflightRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state.publisher().preflight(&*state.store()?, &req)?;
    success(&outcome)
}

pub async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PublishRequest>,
) -> ApiResult<Json<Value>> {
    let receipt = state
        .publisher()
        .publish(&mut *state.store()?, &req, actor(&headers).as_deref())?;
    success(&receipt)
}

pub async fn rollback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RollbackRequest>,
) -> ApiResult<Json<Value>> {
    let receipt = state
        .publisher()
        .rollback(&mut *state.store()?, &req, actor(&headers).as_deref())?;
    success(&receipt)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffQuery {
    pub from_revision_id: RevisionId,
    pub to_revision_id: RevisionId,
}

pub async fn diff(State(state): State<AppState>, Query(query): Query<DiffQuery>) -> ApiResult<Json<Value>> {
    let diff = state
        .publisher()
        .diff(&*state.store()?, query.from_revision_id, query.to_revision_id)?;
    success(&diff)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub project_id: ProjectId,
    pub limit: Option<usize>,
}

pub async fn audit(State(state): State<AppState>, Query(query): Query<AuditQuery>) -> ApiResult<Json<Value>> {
    state.require_project(query.project_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let store = state.store()?;
    let entries = store.tables().audit_entries(query.project_id, limit);
    Ok(Json(json!({ "success": true, "entries": entries })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoadQuery {
    pub project_id: ProjectId,
    pub path: Option<String>,
    pub env: Option<String>,
}

pub async fn load_page(
    State(state): State<AppState>,
    Query(query): Query<PageLoadQuery>,
) -> ApiResult<Json<Value>> {
    let environment = Environment::parse_or_default(query.env.as_deref())?;
    let page = state
        .publisher()
        .load_page(&*state.store()?, query.project_id, query.path.as_deref(), environment)?;
    success(&page)
}
