//! # Publish Pipeline
//!
//! ```text
//! page HTML ─→ preflight ─→ gate ─→ clone draft ─→ mark live ─→ build artifact
//!                            │                                      ↓
//!                       409 blocked                  attach runtime ─→ snapshot ─→ audit
//! ```
//!
//! Publish and rollback are several store transactions plus file writes.
//! A failure halfway leaves the config pointing at a revision whose HTML may
//! not have been rewritten; running publish or rollback again repairs it.

use crate::attach::attach_runtime;
use crate::diagnostics::{OverlayDiagnostics, PreflightOutcome};
use crate::diff::{diff_revisions, RevisionDiff};
use crate::error::{PublishError, PublishResult};
use crate::files::ProjectFiles;
use crate::preflight::{PreflightEvaluator, PreflightReport};
use crate::snapshot::SnapshotService;
use chrono::{DateTime, Utc};
use dve_model::{
    normalize_page_path, sha256_hex, Environment, OverlayArtifact, PageRevision, ProjectId,
    RevisionId, RuntimeConfig,
};
use dve_store::{OverlayStore, RevisionSnapshot, Tables};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub const ARTIFACT_TYPE: &str = "overlay-package";
pub const DEFAULT_RUNTIME_SRC: &str = "/js/dynamic-ve-runtime.js";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreflightRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub override_risk: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollbackRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub revision_id: Option<RevisionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub revision_id: RevisionId,
    pub draft_revision_id: RevisionId,
    pub artifact_path: String,
    pub checksum: String,
    pub preflight: PreflightReport,
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReceipt {
    pub revision_id: RevisionId,
    pub artifact_path: String,
    pub checksum: String,
}

/// Overlay written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltArtifact {
    pub artifact: OverlayArtifact,
    pub artifact_path: String,
    pub checksum: String,
}

/// Page as the editor loads it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoad {
    pub page_path: String,
    pub preview_url: String,
    pub html: String,
    pub revision_id: Option<RevisionId>,
    pub overlay: Option<OverlayArtifact>,
    pub resolution_summary: OverlayDiagnostics,
}

pub struct Publisher {
    files: ProjectFiles,
    evaluator: Arc<dyn PreflightEvaluator>,
    snapshots: Arc<dyn SnapshotService>,
    runtime_src: String,
    debug: bool,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("files", &self.files)
            .field("runtime_src", &self.runtime_src)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Publisher {
    pub fn new(
        files: ProjectFiles,
        evaluator: Arc<dyn PreflightEvaluator>,
        snapshots: Arc<dyn SnapshotService>,
    ) -> Self {
        Self {
            files,
            evaluator,
            snapshots,
            runtime_src: DEFAULT_RUNTIME_SRC.to_string(),
            debug: false,
        }
    }

    pub fn with_runtime_src(mut self, runtime_src: impl Into<String>) -> Self {
        self.runtime_src = runtime_src.into();
        self
    }

    /// Emit `debug: true` in config blocks so the runtime traces
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn files(&self) -> &ProjectFiles {
        &self.files
    }

    fn require_project(&self, project_id: ProjectId) -> PublishResult<()> {
        if self.files.project_exists(project_id) {
            Ok(())
        } else {
            Err(PublishError::not_found("Project not found."))
        }
    }

    fn evaluate(&self, tables: &Tables, project_id: ProjectId, page_path: &str, html: Option<&str>) -> PreflightOutcome {
        let report = self.evaluator.evaluate(page_path, html);
        let draft = tables.latest_draft(project_id, page_path).map(|r| r.id);
        PreflightOutcome::new(report, OverlayDiagnostics::compute(tables, draft))
    }

    /// Read-only safety check of a page and its draft overlay
    pub fn preflight(&self, store: &OverlayStore, req: &PreflightRequest) -> PublishResult<PreflightOutcome> {
        self.require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let html = self.files.read_page(req.project_id, &page_path)?;
        Ok(self.evaluate(store.tables(), req.project_id, &page_path, html.as_deref()))
    }

    /// Serialize the overlay of `snapshot`, write it and return its checksum.
    pub fn build_artifact(&self, snapshot: &RevisionSnapshot, now: DateTime<Utc>) -> PublishResult<BuiltArtifact> {
        let revision = &snapshot.revision;
        let artifact = OverlayArtifact::assemble(snapshot.rows(), now);
        let bytes = serde_json::to_vec(&artifact)?;

        let file = self.files.artifact_file(revision.project_id, revision.id);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file, &bytes)?;

        Ok(BuiltArtifact {
            artifact,
            artifact_path: self.files.artifact_web_path(revision.project_id, revision.id),
            checksum: sha256_hex(&bytes),
        })
    }

    /// Point `page_path` at `artifact_path`. Pages missing on disk are skipped.
    fn attach(&self, revision: &PageRevision, page_path: &str, artifact_path: &str, now: DateTime<Utc>) -> PublishResult<bool> {
        let Some(html) = self.files.read_page(revision.project_id, page_path)? else {
            warn!(project_id = revision.project_id, page_path, "page missing on disk, runtime not attached");
            return Ok(false);
        };
        let config = RuntimeConfig {
            overlay_path: artifact_path.to_string(),
            debug: self.debug,
            project_id: Some(revision.project_id),
            revision_id: Some(revision.id),
            emitted_at_utc: Some(now),
        };
        let updated = attach_runtime(&html, &self.runtime_src, &config)?;
        self.files.write_page(revision.project_id, page_path, &updated)?;
        Ok(true)
    }

    /// Build, record and attach the artifact of a live revision.
    fn go_live(
        &self,
        store: &mut OverlayStore,
        revision_id: RevisionId,
        page_path: &str,
        now: DateTime<Utc>,
    ) -> PublishResult<(PageRevision, BuiltArtifact)> {
        let snapshot = store.transaction(|tables| {
            tables.mark_live(revision_id, now)?;
            tables.snapshot(revision_id)
        })?;
        let built = self.build_artifact(&snapshot, now)?;
        self.attach(&snapshot.revision, page_path, &built.artifact_path, now)?;
        store.transaction(|tables| {
            Ok(tables.record_artifact(revision_id, ARTIFACT_TYPE, &built.artifact_path, &built.checksum, now))
        })?;
        Ok((snapshot.revision, built))
    }

    pub fn publish(&self, store: &mut OverlayStore, req: &PublishRequest, actor: Option<&str>) -> PublishResult<PublishReceipt> {
        self.require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let html = self.files.read_page(req.project_id, &page_path)?;

        let outcome = self.evaluate(store.tables(), req.project_id, &page_path, html.as_deref());
        if !outcome.safe && !req.override_risk {
            info!(project_id = req.project_id, page_path = %page_path, score = outcome.score, "publish blocked by preflight");
            return Err(PublishError::PreflightBlocked(Box::new(outcome)));
        }

        let now = Utc::now();
        let (draft, published) = store.transaction(|tables| {
            let draft = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            let published = tables.publish_from_draft(draft.id, actor, now)?;
            Ok((draft, published))
        })?;
        let (live, built) = self.go_live(store, published.id, &page_path, now)?;

        let snapshot_id = match self.snapshots.create_snapshot(req.project_id, Environment::Live.as_str(), "dve-publish") {
            Ok(id) => id,
            Err(err) => {
                warn!(project_id = req.project_id, error = %err, "snapshot failed, publish continues");
                None
            }
        };
        if let Some(id) = &snapshot_id {
            store.transaction(|tables| Ok(tables.set_base_snapshot(live.id, id)?))?;
        }

        store.audit(
            req.project_id,
            Some(live.id),
            actor,
            "publish",
            json!({ "pagePath": page_path, "artifactPath": built.artifact_path }),
        );
        info!(
            project_id = req.project_id,
            page_path = %page_path,
            revision_id = live.id,
            draft_revision_id = draft.id,
            checksum = %built.checksum,
            "published overlay"
        );

        Ok(PublishReceipt {
            revision_id: live.id,
            draft_revision_id: draft.id,
            artifact_path: built.artifact_path,
            checksum: built.checksum,
            preflight: outcome.report(),
            snapshot_id,
        })
    }

    /// Previously published revision to fall back to.
    ///
    /// Published revisions newest first; the one after the live revision,
    /// or the second entry when the live revision is not among them.
    pub fn rollback_target(tables: &Tables, project_id: ProjectId) -> Option<RevisionId> {
        let published = tables.published_revisions(project_id);
        let live = tables.config(project_id).and_then(|c| c.live_revision_id);
        let index = live
            .and_then(|live| published.iter().position(|r| r.id == live))
            .map_or(1, |at| at + 1);
        published.get(index).map(|r| r.id)
    }

    pub fn rollback(&self, store: &mut OverlayStore, req: &RollbackRequest, actor: Option<&str>) -> PublishResult<RollbackReceipt> {
        self.require_project(req.project_id)?;

        let target_id = match req.revision_id {
            Some(id) => id,
            None => Self::rollback_target(store.tables(), req.project_id).ok_or(PublishError::NoRollbackTarget)?,
        };
        let target = store
            .tables()
            .revision(target_id)
            .filter(|r| r.project_id == req.project_id)
            .cloned()
            .ok_or_else(|| PublishError::not_found("Revision not found."))?;
        let page_path = match req.page_path.as_deref() {
            Some(path) if !path.trim().is_empty() => normalize_page_path(Some(path)),
            _ => target.page_path.clone(),
        };

        let now = Utc::now();
        let (live, built) = self.go_live(store, target.id, &page_path, now)?;

        store.audit(
            req.project_id,
            Some(live.id),
            actor,
            "rollback",
            json!({ "targetRevisionId": live.id, "pagePath": page_path }),
        );
        info!(project_id = req.project_id, revision_id = live.id, page_path = %page_path, "rolled back overlay");

        Ok(RollbackReceipt {
            revision_id: live.id,
            artifact_path: built.artifact_path,
            checksum: built.checksum,
        })
    }

    pub fn diff(&self, store: &OverlayStore, from: RevisionId, to: RevisionId) -> PublishResult<RevisionDiff> {
        diff_revisions(store.tables(), from, to)
    }

    /// Page HTML plus the overlay of its revision in `environment`.
    pub fn load_page(
        &self,
        store: &OverlayStore,
        project_id: ProjectId,
        page_path: Option<&str>,
        environment: Environment,
    ) -> PublishResult<PageLoad> {
        self.require_project(project_id)?;
        let page_path = normalize_page_path(page_path);
        let html = self
            .files
            .read_page(project_id, &page_path)?
            .ok_or_else(|| PublishError::not_found("Page not found."))?;

        let tables = store.tables();
        let revision = tables.revision_for_environment(project_id, &page_path, environment);
        let overlay = match revision {
            Some(revision) => Some(OverlayArtifact::assemble(tables.snapshot(revision.id)?.rows(), Utc::now())),
            None => None,
        };

        Ok(PageLoad {
            preview_url: self.files.web_path(project_id, &page_path),
            page_path,
            html,
            revision_id: revision.map(|r| r.id),
            overlay,
            resolution_summary: OverlayDiagnostics::compute(tables, revision.map(|r| r.id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_target_walks_back() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let draft = tables.ensure_draft_revision(1, "index.html", None, now);
        let ids: Vec<RevisionId> = (0..3)
            .map(|i| {
                let at = now + chrono::Duration::seconds(i);
                let published = tables.publish_from_draft(draft.id, None, at).unwrap();
                tables.mark_live(published.id, at).unwrap();
                published.id
            })
            .collect();

        assert_eq!(Publisher::rollback_target(&tables, 1), Some(ids[1]));
        tables.mark_live(ids[1], now).unwrap();
        assert_eq!(Publisher::rollback_target(&tables, 1), Some(ids[0]));
        tables.mark_live(ids[0], now).unwrap();
        assert_eq!(Publisher::rollback_target(&tables, 1), None);
    }

    #[test]
    fn test_rollback_target_without_live_pointer() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let draft = tables.ensure_draft_revision(1, "index.html", None, now);
        assert_eq!(Publisher::rollback_target(&tables, 1), None);
        let first = tables.publish_from_draft(draft.id, None, now).unwrap();
        tables
            .publish_from_draft(draft.id, None, now + chrono::Duration::seconds(1))
            .unwrap();
        assert_eq!(Publisher::rollback_target(&tables, 1), Some(first.id));
    }
}
