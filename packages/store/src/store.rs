//! # Overlay Store
//!
//! Transactional holder of the overlay [`Tables`].
//!
//! The store can be:
//! - **Memory-backed**: for tests and throwaway sessions
//! - **File-backed**: tables are flushed to one JSON file after every commit
//!
//! ## Transactions
//!
//! ```text
//! clone tables → run closure → Ok?  → persist clone → Ok? → swap in
//!                            → Err? → discard clone       → Err? → discard clone
//! ```

use crate::error::StoreResult;
use crate::tables::Tables;
use dve_model::{ProjectId, RevisionId};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Memory,
    File { path: PathBuf },
}

#[derive(Debug)]
pub struct OverlayStore {
    tables: Tables,
    backend: StoreBackend,
}

impl OverlayStore {
    pub fn memory() -> Self {
        Self {
            tables: Tables::default(),
            backend: StoreBackend::Memory,
        }
    }

    /// Open a file-backed store; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            Tables::default()
        };
        debug!(path = %path.display(), revisions = tables.revisions.len(), "opened overlay store");
        Ok(Self {
            tables,
            backend: StoreBackend::File { path },
        })
    }

    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Run `f` against a copy of the tables and commit the copy on `Ok`.
    pub fn transaction<T, F>(&mut self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Tables) -> StoreResult<T>,
    {
        let mut working = self.tables.clone();
        let value = f(&mut working)?;
        self.persist(&working)?;
        self.tables = working;
        Ok(value)
    }

    /// Write `tables` to the backing file (no-op for memory stores)
    fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let StoreBackend::File { path } = &self.backend else {
            return Ok(());
        };
        write_atomically(path, &serde_json::to_vec_pretty(tables)?)
    }

    /// Append an audit entry without failing the caller.
    pub fn audit(
        &mut self,
        project_id: ProjectId,
        revision_id: Option<RevisionId>,
        actor_id: Option<&str>,
        action: &str,
        payload: Value,
    ) {
        let now = chrono::Utc::now();
        let result = self.transaction(|tables| {
            Ok(tables.append_audit(project_id, revision_id, actor_id, action, payload, now))
        });
        if let Err(err) = result {
            warn!(project_id, action, error = %err, "failed to append audit entry");
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
