//! Editor handlers. Every edit lands on the draft revision of its page.
//!
//! POST /session/start      open or create the draft, list pages
//! POST /element/resolve    upsert an element identity
//! POST /edit/text          set a text patch
//! POST /edit/style         set a style rule
//! POST /section/insert     add or replace a section instance
//! POST /bind/action        bind an action to an element
//! POST /bind/test          dry-run a binding
//! POST /save-draft         legacy bulk text + style edit
//! POST /ops/append         audit an arbitrary client operation
//! POST /style/remove, /text/remove, /section/remove, /bind/remove
//! GET  /actions            action registry

use crate::error::{ApiError, ApiResult};
use crate::state::{actor, AppState};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use dve_store::{
    BindActionRequest, ResolveElementRequest, SaveDraftRequest, SectionInsertRequest,
    SectionRemoveRequest, SessionStartRequest, StyleEditRequest, StyleRemoveRequest,
    TextEditRequest, TextRemoveRequest, UnbindActionRequest, ACTION_REGISTRY,
};
use serde_json::{json, Value};

pub async fn session_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SessionStartRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let pages = state.files().list_pages(req.project_id);
    let started = state.store()?.session_start(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "projectId": req.project_id,
        "pagePath": started.page_path,
        "revisionId": started.revision.id,
        "config": started.config,
        "pages": pages,
    })))
}

pub async fn resolve_element(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ResolveElementRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.resolve_element(&req, actor(&headers).as_deref())?;
    let map = edit.row;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "elementKey": map.element_key,
        "selector": map.primary_selector,
        "confidence": map.confidence,
        "lastResolvedSelector": map.last_resolved_selector.as_ref().unwrap_or(&map.primary_selector),
    })))
}

pub async fn edit_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TextEditRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.set_text(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "elementKey": edit.element_key,
    })))
}

pub async fn edit_style(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StyleEditRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.set_style(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "elementKey": edit.element_key,
        "rule": edit.row,
    })))
}

pub async fn insert_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SectionInsertRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.insert_section(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "instanceId": edit.row.id,
    })))
}

pub async fn bind_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BindActionRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.bind_action(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "binding": edit.row,
    })))
}

pub async fn test_binding(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UnbindActionRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let simulation = state.store()?.simulate_binding(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "ok": simulation.ok,
        "traceId": simulation.trace_id,
        "executionPath": simulation.execution_path,
        "errors": simulation.errors,
        "warnings": simulation.warnings,
    })))
}

pub async fn save_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SaveDraftRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.save_draft(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
    })))
}

pub async fn append_ops(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Value>> {
    let project_id = payload.get("projectId").and_then(Value::as_i64).unwrap_or(0);
    state.require_project(project_id)?;
    let entry = state.store()?.append_ops(payload, actor(&headers).as_deref())?;
    Ok(Json(json!({ "success": true, "auditId": entry.id })))
}

pub async fn remove_style(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StyleRemoveRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.remove_style(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "elementKey": edit.element_key,
    })))
}

pub async fn remove_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TextRemoveRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.remove_text(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "elementKey": edit.element_key,
    })))
}

pub async fn remove_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SectionRemoveRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.remove_section(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "instanceId": edit.row.id,
    })))
}

pub async fn unbind_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UnbindActionRequest>,
) -> ApiResult<Json<Value>> {
    state.require_project(req.project_id)?;
    let edit = state.store()?.unbind_action(&req, actor(&headers).as_deref())?;
    Ok(Json(json!({
        "success": true,
        "revisionId": edit.revision_id,
        "elementKey": edit.element_key,
    })))
}

pub async fn list_actions() -> ApiResult<Json<Value>> {
    let actions = serde_json::to_value(ACTION_REGISTRY).map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(json!({ "success": true, "actions": actions })))
}
