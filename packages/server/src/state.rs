use crate::config::DveConfig;
use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use dve_model::ProjectId;
use dve_publish::{BasicPreflight, FsSnapshotService, NoopSnapshots, ProjectFiles, Publisher, SnapshotService};
use dve_store::{OverlayStore, StoreResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Header naming the editor on whose behalf a request runs
pub const ACTOR_HEADER: &str = "x-dve-actor";

pub const DEFAULT_TRACE_AUDIT_EVERY: u64 = 4;

/// Picks one ingested runtime trace in every `every` for the audit log,
/// starting with the first.
#[derive(Debug)]
pub struct TraceSampler {
    every: u64,
    seen: AtomicU64,
}

impl TraceSampler {
    pub fn new(every: u64) -> Self {
        Self {
            every,
            seen: AtomicU64::new(0),
        }
    }

    pub fn sample(&self) -> bool {
        if self.every == 0 {
            return false;
        }
        self.seen.fetch_add(1, Ordering::Relaxed) % self.every == 0
    }
}

/// Shared by every handler. The store lock is held for one operation.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<OverlayStore>>,
    publisher: Arc<Publisher>,
    trace_sampler: Arc<TraceSampler>,
}

impl AppState {
    pub fn new(store: OverlayStore, publisher: Publisher) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            publisher: Arc::new(publisher),
            trace_sampler: Arc::new(TraceSampler::new(DEFAULT_TRACE_AUDIT_EVERY)),
        }
    }

    pub fn with_trace_audit_every(mut self, every: u64) -> Self {
        self.trace_sampler = Arc::new(TraceSampler::new(every));
        self
    }

    pub fn from_config(config: &DveConfig) -> StoreResult<Self> {
        let store = match &config.store_path {
            Some(path) => OverlayStore::open(path)?,
            None => OverlayStore::memory(),
        };
        let files = ProjectFiles::new(&config.web_root, config.uploads_dir.as_str());
        let snapshots: Arc<dyn SnapshotService> = if config.snapshots {
            Arc::new(FsSnapshotService::new(files.clone()).with_retention(config.snapshot_retention))
        } else {
            Arc::new(NoopSnapshots)
        };
        let publisher = Publisher::new(files, Arc::new(BasicPreflight::new()), snapshots)
            .with_runtime_src(config.runtime_script_src.as_str())
            .with_debug(config.runtime_debug);
        Ok(Self::new(store, publisher).with_trace_audit_every(config.trace_audit_every))
    }

    pub fn store(&self) -> ApiResult<MutexGuard<'_, OverlayStore>> {
        self.store
            .lock()
            .map_err(|_| ApiError::internal("Overlay store is unavailable."))
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn files(&self) -> &ProjectFiles {
        self.publisher.files()
    }

    pub fn trace_sampler(&self) -> &TraceSampler {
        &self.trace_sampler
    }

    /// Positive id of a project whose directory exists
    pub fn require_project(&self, project_id: ProjectId) -> ApiResult<()> {
        if project_id <= 0 {
            return Err(ApiError::bad_request("projectId is required."));
        }
        if !self.files().project_exists(project_id) {
            return Err(ApiError::not_found("Project not found."));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("publisher", &self.publisher)
            .finish()
    }
}

/// Actor named by the request, if any
pub fn actor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
