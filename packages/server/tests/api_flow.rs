//! HTTP-level tests of the `/api/dve` routes against a temporary uploads tree.

use std::fs;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use dve_publish::{BasicPreflight, NoopSnapshots, ProjectFiles, Publisher};
use dve_server::{build_router, AppState, ACTOR_HEADER};
use dve_store::OverlayStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const PROJECT: i64 = 7;
const PAGE: &str = r#"<html><head><title>Home</title></head><body><h1 id="hero">Hi</h1><a id="cta" href="/">Go</a></body></html>"#;

// ── Test app builder ───────────────────────────────────────────

struct TestApp {
    dir: TempDir,
    router: Router,
}

fn app_with_pages(pages: &[(&str, &str)]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let files = ProjectFiles::new(dir.path(), "Uploads");
    let root = files.project_root(PROJECT);
    for (page, html) in pages {
        let path = root.join(page);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, html).unwrap();
    }
    let publisher = Publisher::new(files, Arc::new(BasicPreflight::new()), Arc::new(NoopSnapshots));
    let state = AppState::new(OverlayStore::memory(), publisher);
    TestApp {
        dir,
        router: build_router(state),
    }
}

fn app() -> TestApp {
    app_with_pages(&[("index.html", PAGE), ("about/team.htm", PAGE)])
}

// ── Request helpers ────────────────────────────────────────────

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }))
}

impl TestApp {
    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/dve{}", uri))
                    .header("content-type", "application/json")
                    .header(ACTOR_HEADER, "editor-1")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        (resp.status(), body_json(resp).await)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let resp = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/dve{}", uri))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        (resp.status(), body_json(resp).await)
    }

    async fn style(&self, value: &str) {
        let (status, body) = self
            .post(
                "/edit/style",
                json!({ "projectId": PROJECT, "selector": "#hero", "property": "color", "value": value }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    async fn publish(&self) -> i64 {
        let (status, body) = self.post("/publish", json!({ "projectId": PROJECT })).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["revisionId"].as_i64().unwrap()
    }

    fn page(&self, page: &str) -> String {
        let path = self
            .dir
            .path()
            .join("Uploads")
            .join(PROJECT.to_string())
            .join(page);
        fs::read_to_string(path).unwrap()
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_start_lists_pages() {
    let app = app();
    let (status, body) = app
        .post("/session/start", json!({ "projectId": PROJECT, "pagePath": "/index.html" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["pagePath"], "index.html");
    assert_eq!(body["pages"], json!(["about/team.htm", "index.html"]));
    assert_eq!(body["config"]["mode"], "overlay");
    assert_eq!(body["config"]["draftRevisionId"], body["revisionId"]);
}

#[tokio::test]
async fn test_unknown_project_and_missing_id() {
    let app = app();
    let (status, body) = app.post("/session/start", json!({ "projectId": 99 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "message": "Project not found.", "code": "NOT_FOUND" }));

    let (status, body) = app.post("/edit/text", json!({ "content": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_validation_errors_are_bad_requests() {
    let app = app();
    let (status, body) = app.post("/element/resolve", json!({ "projectId": PROJECT })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Selector is required.");

    let (status, body) = app
        .post("/section/insert", json!({ "projectId": PROJECT, "markup": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Markup is required.");

    let (status, _) = app
        .post(
            "/edit/style",
            json!({ "projectId": PROJECT, "selector": "#hero", "property": "color", "value": "red", "breakpoint": "watch" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resolve_reports_confidence() {
    let app = app();
    let (status, body) = app
        .post(
            "/element/resolve",
            json!({
                "projectId": PROJECT,
                "selector": "#hero",
                "elementKey": "hero",
                "fallbackSelectors": ["h1"],
                "fingerprintHash": "abc",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["elementKey"], "hero");
    assert_eq!(body["selector"], "#hero");
    assert_eq!(body["lastResolvedSelector"], "#hero");
    assert!(body["confidence"].as_f64().unwrap() > 0.5);
}

#[tokio::test]
async fn test_edit_publish_and_load_live_overlay() {
    let app = app();
    app.style("red").await;
    let (status, _) = app
        .post("/edit/text", json!({ "projectId": PROJECT, "selector": "#hero", "content": "Hello" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post("/publish", json!({ "projectId": PROJECT })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["preflight"]["safe"], true);
    let revision_id = body["revisionId"].as_i64().unwrap();
    let artifact_path = body["artifactPath"].as_str().unwrap().to_string();
    assert!(artifact_path.ends_with(&format!("overlay-{}.json", revision_id)));
    assert_eq!(body["checksum"].as_str().unwrap().len(), 64);

    let html = app.page("index.html");
    assert!(html.contains(r#"<script id="bugence-dve-config" type="application/json">"#));
    assert!(html.contains(&artifact_path));

    let (status, body) = app.get(&format!("/page/load?projectId={}&env=live", PROJECT)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revisionId"], revision_id);
    assert_eq!(body["overlay"]["rules"][0]["value"], "red");
    assert_eq!(body["overlay"]["textPatches"][0]["content"], "Hello");

    let (status, body) = app.get(&format!("/page/load?projectId={}&path=missing.html", PROJECT)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Page not found.");
}

#[tokio::test]
async fn test_preflight_blocked_publish_is_a_conflict() {
    let app = app_with_pages(&[("index.html", "<p>no body here</p>")]);

    let (status, body) = app.post("/preflight", json!({ "projectId": PROJECT })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["safe"], false);

    let (status, body) = app.post("/publish", json!({ "projectId": PROJECT })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "PREFLIGHT_BLOCKED");
    assert_eq!(body["message"], "Preflight blocked publish.");
    assert!(!body["blockers"].as_array().unwrap().is_empty());
    assert!(body["dveDiagnostics"].is_object());
    assert_eq!(app.page("index.html"), "<p>no body here</p>");

    let (status, body) = app
        .post("/publish", json!({ "projectId": PROJECT, "overrideRisk": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preflight"]["safe"], false);
}

#[tokio::test]
async fn test_diff_and_rollback() {
    let app = app();
    app.style("red").await;
    let first = app.publish().await;
    app.style("blue").await;
    let second = app.publish().await;

    let (status, body) = app
        .get(&format!("/diff?fromRevisionId={}&toRevisionId={}", first, second))
        .await;
    assert_eq!(status, StatusCode::OK);
    let added = body["added"].as_array().unwrap();
    let removed = body["removed"].as_array().unwrap();
    assert_eq!(added.len(), 1);
    assert!(added[0].as_str().unwrap().ends_with("|color|blue|desktop|base"));
    assert!(removed[0].as_str().unwrap().ends_with("|color|red|desktop|base"));
    assert_eq!(body["changed"], json!([]));

    let (status, body) = app.post("/rollback", json!({ "projectId": PROJECT })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["revisionId"], first);

    let (status, body) = app.post("/rollback", json!({ "projectId": PROJECT })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No rollback target available.");

    let (status, _) = app.get("/diff?fromRevisionId=1000&toRevisionId=1001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bind_test_and_unbind() {
    let app = app();
    let (status, body) = app.get("/actions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["actions"].as_array().unwrap().len(), 3);

    let (status, body) = app
        .post(
            "/bind/action",
            json!({ "projectId": PROJECT, "elementKey": "cta", "actionType": "navigate" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Navigate URL required for navigate/hybrid actions.");

    let (status, body) = app
        .post(
            "/bind/action",
            json!({ "projectId": PROJECT, "elementKey": "cta", "actionType": "navigate", "navigateUrl": "/next" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["binding"]["navigateUrl"], "/next");

    let (status, body) = app
        .post("/bind/test", json!({ "projectId": PROJECT, "elementKey": "cta" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["executionPath"], json!(["navigate"]));
    assert_eq!(body["traceId"].as_str().unwrap().len(), 32);

    let (status, _) = app
        .post("/bind/remove", json!({ "projectId": PROJECT, "elementKey": "cta" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .post("/bind/test", json!({ "projectId": PROJECT, "elementKey": "cta" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No binding found for selected element.");
}

#[tokio::test]
async fn test_remove_routes() {
    let app = app();
    app.style("red").await;
    let (status, body) = app
        .post(
            "/section/insert",
            json!({ "projectId": PROJECT, "markup": "<p>promo</p>", "insertMode": "after", "targetElementKey": "hero" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let instance_id = body["instanceId"].as_i64().unwrap();

    let (status, _) = app
        .post("/section/remove", json!({ "projectId": PROJECT, "instanceId": instance_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post("/section/remove", json!({ "projectId": PROJECT, "instanceId": instance_id }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post("/session/start", json!({ "projectId": PROJECT })).await;
    assert_eq!(status, StatusCode::OK);
    let draft = body["revisionId"].as_i64().unwrap();
    let (_, body) = app.get(&format!("/page/load?projectId={}&env=draft", PROJECT)).await;
    assert_eq!(body["revisionId"], draft);
    let element_key = body["overlay"]["rules"][0]["elementKey"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            "/style/remove",
            json!({ "projectId": PROJECT, "elementKey": element_key, "property": "color" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&format!("/page/load?projectId={}&env=draft", PROJECT)).await;
    assert_eq!(body["overlay"]["rules"], json!([]));
}

#[tokio::test]
async fn test_trace_ops_and_audit() {
    let app = app();
    let (status, body) = app
        .post(
            "/trace",
            json!({ "projectId": PROJECT, "revisionId": 3, "trace": { "type": "runtime-boot", "payload": {} } }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);

    let (status, _) = app.post("/trace", json!({ "trace": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/ops/append", json!({ "projectId": PROJECT, "op": "select", "elementKey": "hero" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    app.style("red").await;
    app.publish().await;

    let (status, body) = app.get(&format!("/audit?projectId={}&limit=2", PROJECT)).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "publish");
    assert_eq!(entries[0]["actorId"], "editor-1");
    assert_eq!(entries[1]["action"], "style-set");
}

#[tokio::test]
async fn test_trace_audit_is_sampled() {
    let app = app();
    for pass in 0..5 {
        let (status, _) = app
            .post(
                "/trace",
                json!({ "projectId": PROJECT, "revisionId": 3, "trace": { "type": "reconcile", "payload": { "pass": pass } } }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let (_, body) = app.get(&format!("/audit?projectId={}", PROJECT)).await;
    let sampled: Vec<&Value> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["action"] == "runtime-trace")
        .collect();
    assert_eq!(sampled.len(), 2);
    assert_eq!(sampled[0]["payload"]["trace"]["payload"]["pass"], 4);
    assert_eq!(sampled[1]["payload"]["trace"]["payload"]["pass"], 0);
    assert_eq!(sampled[0]["revisionId"], 3);
    assert_eq!(sampled[0]["actorId"], "editor-1");
}
