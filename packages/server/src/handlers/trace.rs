//! POST /trace: runtime trace events. Every event is logged; a sample of
//! them is also written to the audit log as `runtime-trace`.

use crate::error::ApiResult;
use crate::state::{actor, AppState};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let project_id = payload.get("projectId").and_then(Value::as_i64).unwrap_or(0);
    state.require_project(project_id)?;

    let revision_id = payload.get("revisionId").and_then(Value::as_i64);
    let trace = payload.get("trace").unwrap_or(&Value::Null);
    let kind = trace.get("type").and_then(Value::as_str).unwrap_or("unknown");
    let trace_payload = trace.get("payload").unwrap_or(&Value::Null);
    tracing::info!(
        target: "dve_server::trace",
        project_id,
        ?revision_id,
        kind,
        payload = %trace_payload,
        "runtime trace"
    );

    if state.trace_sampler().sample() {
        state
            .store()?
            .audit(project_id, revision_id, actor(&headers).as_deref(), "runtime-trace", payload);
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "success": true }))))
}
