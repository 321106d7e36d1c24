use dve_model::{sha256_hex, Environment, OverlayArtifact, CONFIG_SCRIPT_ID, RUNTIME_SCRIPT_ID};
use dve_publish::{
    BasicPreflight, FsSnapshotService, NoopSnapshots, PreflightRequest, ProjectFiles, PublishError,
    PublishRequest, Publisher, RollbackRequest,
};
use dve_store::{OverlayStore, SessionStartRequest, StyleEditRequest};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const PAGE: &str = r#"<html><head><title>Home</title></head><body><h1 id="hero">Hi</h1></body></html>"#;

struct Site {
    _dir: TempDir,
    files: ProjectFiles,
}

fn site(pages: &[(i64, &str, &str)]) -> Site {
    let dir = tempfile::tempdir().unwrap();
    let files = ProjectFiles::new(dir.path(), "Uploads");
    for (project_id, page, html) in pages {
        let root = files.project_root(*project_id);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(page), html).unwrap();
    }
    Site { _dir: dir, files }
}

fn publisher(site: &Site) -> Publisher {
    Publisher::new(site.files.clone(), Arc::new(BasicPreflight::new()), Arc::new(NoopSnapshots))
}

fn style(store: &mut OverlayStore, project_id: i64, value: &str) {
    store
        .set_style(
            &StyleEditRequest {
                project_id,
                selector: Some("#hero".into()),
                property: "color".into(),
                value: value.into(),
                ..Default::default()
            },
            Some("editor"),
        )
        .unwrap();
}

fn publish(publisher: &Publisher, store: &mut OverlayStore, project_id: i64) -> i64 {
    publisher
        .publish(
            store,
            &PublishRequest {
                project_id,
                ..Default::default()
            },
            Some("editor"),
        )
        .unwrap()
        .revision_id
}

#[test]
fn test_publish_builds_attaches_and_goes_live() {
    let site = site(&[(1, "index.html", PAGE)]);
    let publisher = Publisher::new(
        site.files.clone(),
        Arc::new(BasicPreflight::new()),
        Arc::new(FsSnapshotService::new(site.files.clone())),
    );
    let mut store = OverlayStore::memory();
    let session = store
        .session_start(&SessionStartRequest { project_id: 1, page_path: None }, None)
        .unwrap();
    style(&mut store, 1, "red");

    let receipt = publisher
        .publish(&mut store, &PublishRequest { project_id: 1, ..Default::default() }, Some("editor"))
        .unwrap();
    assert!(receipt.preflight.safe);
    assert_eq!(receipt.draft_revision_id, session.revision.id);
    assert_ne!(receipt.revision_id, session.revision.id);

    let file = site.files.artifact_file(1, receipt.revision_id);
    let bytes = fs::read(&file).unwrap();
    assert_eq!(receipt.checksum, sha256_hex(&bytes));
    let artifact: OverlayArtifact = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(artifact.revision_id, receipt.revision_id);
    assert_eq!(artifact.rules.len(), 1);
    assert_eq!(artifact.rules[0].selector, "#hero");
    assert_eq!(artifact.rules[0].value, "red");

    let html = site.files.read_page(1, "index.html").unwrap().unwrap();
    assert!(html.contains(RUNTIME_SCRIPT_ID));
    assert!(html.contains(CONFIG_SCRIPT_ID));
    assert!(html.contains(&receipt.artifact_path));

    let tables = store.tables();
    assert_eq!(tables.config(1).unwrap().live_revision_id, Some(receipt.revision_id));
    assert_eq!(tables.latest_draft(1, "index.html").map(|r| r.id), Some(session.revision.id));
    let live = tables.revision(receipt.revision_id).unwrap();
    assert!(live.is_published());
    assert_eq!(live.base_snapshot_id, receipt.snapshot_id);
    assert!(receipt.snapshot_id.is_some());
    assert_eq!(tables.artifacts_for(receipt.revision_id).len(), 1);
    assert!(tables.audit_entries(1, 50).iter().any(|e| e.action == "publish"));
}

#[test]
fn test_draft_edits_after_publish_leave_live_untouched() {
    let site = site(&[(1, "index.html", PAGE)]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();
    style(&mut store, 1, "red");
    let live = publish(&publisher, &mut store, 1);

    style(&mut store, 1, "blue");
    let live_rules = store.tables().rules_for(live);
    assert_eq!(live_rules.len(), 1);
    assert_eq!(live_rules[0].value, "red");
}

#[test]
fn test_unsafe_page_blocks_publish_without_writes() {
    let site = site(&[(1, "index.html", "<p>no body here</p>")]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();

    let err = publisher
        .publish(&mut store, &PublishRequest { project_id: 1, ..Default::default() }, None)
        .unwrap_err();
    let outcome = match err {
        PublishError::PreflightBlocked(outcome) => outcome,
        other => panic!("expected preflight block, got {other:?}"),
    };
    assert!(!outcome.safe);
    assert!(!outcome.blockers.is_empty());
    assert!(store.tables().published_revisions(1).is_empty());
    assert!(store.tables().revisions.is_empty());

    let receipt = publisher
        .publish(
            &mut store,
            &PublishRequest { project_id: 1, override_risk: true, ..Default::default() },
            None,
        )
        .unwrap();
    assert!(!receipt.preflight.safe);
    let html = site.files.read_page(1, "index.html").unwrap().unwrap();
    assert!(html.starts_with("<p>no body here</p><script"));
}

#[test]
fn test_unknown_project_is_not_found() {
    let site = site(&[]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();
    let err = publisher
        .publish(&mut store, &PublishRequest { project_id: 7, ..Default::default() }, None)
        .unwrap_err();
    assert_eq!(err.to_string(), "Project not found.");
    assert!(publisher
        .preflight(&store, &PreflightRequest { project_id: 7, page_path: None })
        .is_err());
}

#[test]
fn test_preflight_reports_overlay_diagnostics() {
    let site = site(&[(1, "index.html", PAGE)]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();
    store
        .set_style(
            &StyleEditRequest {
                project_id: 1,
                element_key: Some("orphan".into()),
                property: "margin".into(),
                value: "0".into(),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    let outcome = publisher
        .preflight(&store, &PreflightRequest { project_id: 1, page_path: None })
        .unwrap();
    assert!(outcome.safe);
    assert_eq!(outcome.dve_diagnostics.unresolved_elements, 1);
    assert!(outcome
        .warnings
        .contains(&"Overlay unresolved mapped elements: 1.".to_string()));
}

#[test]
fn test_republish_keeps_one_runtime_tag() {
    let site = site(&[(1, "index.html", PAGE)]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();
    style(&mut store, 1, "red");
    publish(&publisher, &mut store, 1);
    let second = publish(&publisher, &mut store, 1);

    let html = site.files.read_page(1, "index.html").unwrap().unwrap();
    assert_eq!(html.matches(&format!("id=\"{}\"", RUNTIME_SCRIPT_ID)).count(), 1);
    assert_eq!(html.matches(&format!("id=\"{}\"", CONFIG_SCRIPT_ID)).count(), 1);
    assert!(html.contains(&site.files.artifact_web_path(1, second)));
}

#[test]
fn test_rollback_walks_back_through_published_revisions() {
    let site = site(&[(1, "index.html", PAGE)]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();
    style(&mut store, 1, "red");
    let r1 = publish(&publisher, &mut store, 1);
    let r2 = publish(&publisher, &mut store, 1);
    let _r3 = publish(&publisher, &mut store, 1);

    let auto = RollbackRequest { project_id: 1, ..Default::default() };
    let first = publisher.rollback(&mut store, &auto, Some("editor")).unwrap();
    assert_eq!(first.revision_id, r2);
    assert_eq!(store.tables().config(1).unwrap().live_revision_id, Some(r2));
    let html = site.files.read_page(1, "index.html").unwrap().unwrap();
    assert!(html.contains(&first.artifact_path));

    let second = publisher.rollback(&mut store, &auto, None).unwrap();
    assert_eq!(second.revision_id, r1);

    let err = publisher.rollback(&mut store, &auto, None).unwrap_err();
    assert!(matches!(err, PublishError::NoRollbackTarget));
    assert!(store.tables().audit_entries(1, 50).iter().any(|e| e.action == "rollback"));
}

#[test]
fn test_rollback_rejects_revision_from_other_project() {
    let site = site(&[(1, "index.html", PAGE), (2, "index.html", PAGE)]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();
    style(&mut store, 2, "red");
    let other = publish(&publisher, &mut store, 2);

    let err = publisher
        .rollback(
            &mut store,
            &RollbackRequest { project_id: 1, revision_id: Some(other), ..Default::default() },
            None,
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Revision not found.");
}

#[test]
fn test_load_page_per_environment() {
    let site = site(&[(1, "index.html", PAGE)]);
    let publisher = publisher(&site);
    let mut store = OverlayStore::memory();
    style(&mut store, 1, "red");
    let live = publish(&publisher, &mut store, 1);
    style(&mut store, 1, "blue");

    let page = publisher.load_page(&store, 1, None, Environment::Live).unwrap();
    assert_eq!(page.revision_id, Some(live));
    assert_eq!(page.preview_url, "/Uploads/1/index.html");
    assert_eq!(page.overlay.unwrap().rules[0].value, "red");

    let draft = publisher.load_page(&store, 1, Some("/index.html"), Environment::Draft).unwrap();
    assert_eq!(draft.overlay.unwrap().rules[0].value, "blue");

    let missing = publisher.load_page(&store, 1, Some("nope.html"), Environment::Draft);
    assert_eq!(missing.unwrap_err().to_string(), "Page not found.");
}
