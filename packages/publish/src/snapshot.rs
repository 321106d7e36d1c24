//! Project snapshots taken on publish.
//!
//! Snapshots are best-effort: the pipeline logs a failure and carries on.

use crate::error::{PublishError, PublishResult};
use crate::files::{ProjectFiles, INTERNAL_DIR};
use chrono::{DateTime, Utc};
use dve_model::{sha256_hex, ProjectId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub const DEFAULT_SNAPSHOT_RETENTION: usize = 50;
pub const MANIFEST_FILE: &str = "manifest.json";

pub trait SnapshotService: Send + Sync {
    /// Snapshot the project; `Ok(None)` when the service keeps no snapshots.
    fn create_snapshot(&self, project_id: ProjectId, environment: &str, source: &str) -> PublishResult<Option<String>>;
}

/// Keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSnapshots;

impl SnapshotService for NoopSnapshots {
    fn create_snapshot(&self, _project_id: ProjectId, _environment: &str, _source: &str) -> PublishResult<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
    pub id: String,
    pub project_id: ProjectId,
    pub environment: String,
    pub source: String,
    pub created_at_utc: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
}

/// Copies the project tree into `.bugence/snapshots/<id>/`
#[derive(Debug, Clone)]
pub struct FsSnapshotService {
    files: ProjectFiles,
    retention: usize,
}

impl FsSnapshotService {
    pub fn new(files: ProjectFiles) -> Self {
        Self {
            files,
            retention: DEFAULT_SNAPSHOT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    fn snapshot_id(project_id: ProjectId, now: DateTime<Utc>) -> String {
        let seed = format!("{}|{}", project_id, now.timestamp_nanos_opt().unwrap_or_default());
        let suffix = sha256_hex(seed.as_bytes()).to_ascii_lowercase();
        format!("{}-{}", now.format("%Y%m%d%H%M%S%3f"), &suffix[..8])
    }

    fn prune(&self, snapshots_root: &Path) -> PublishResult<()> {
        let mut ids: Vec<String> = fs::read_dir(snapshots_root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        // Ids start with a timestamp, so name order is age order.
        ids.sort_unstable_by(|a, b| b.cmp(a));
        for stale in ids.iter().skip(self.retention) {
            fs::remove_dir_all(snapshots_root.join(stale))?;
            debug!(snapshot = %stale, "pruned snapshot");
        }
        Ok(())
    }
}

impl SnapshotService for FsSnapshotService {
    fn create_snapshot(&self, project_id: ProjectId, environment: &str, source: &str) -> PublishResult<Option<String>> {
        let root = self.files.project_root(project_id);
        if !root.is_dir() {
            return Err(PublishError::not_found("Project root does not exist."));
        }

        let now = Utc::now();
        let id = Self::snapshot_id(project_id, now);
        let snapshots_root = self.files.internal_dir(project_id).join("snapshots");
        let target = snapshots_root.join(&id);
        fs::create_dir_all(&target)?;

        let mut manifest = Vec::new();
        let walker = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|entry| entry.depth() != 1 || entry.file_name() != INTERNAL_DIR);
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            if relative.as_os_str().is_empty() {
                continue;
            }
            let destination = target.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)?;
                continue;
            }
            let bytes = fs::read(entry.path())?;
            fs::write(&destination, &bytes)?;
            manifest.push(ManifestEntry {
                path: relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/"),
                size_bytes: bytes.len() as u64,
                sha256: sha256_hex(&bytes),
            });
        }
        manifest.sort_by_key(|entry| entry.path.to_ascii_lowercase());

        let manifest = SnapshotManifest {
            id: id.clone(),
            project_id,
            environment: environment.trim().to_ascii_lowercase(),
            source: source.trim().to_string(),
            created_at_utc: now,
            files: manifest,
        };
        fs::write(target.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;
        self.prune(&snapshots_root)?;

        debug!(project_id, snapshot = %id, files = manifest.files.len(), "created snapshot");
        Ok(Some(id))
    }
}
