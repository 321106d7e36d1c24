//! Row tables and read queries.
//!
//! `Tables` is plain data: every mutation happens on a clone inside
//! [`OverlayStore::transaction`](crate::OverlayStore::transaction), so the
//! methods here can fail halfway without leaving partial state behind.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use dve_model::{
    ActionBinding, AuditLogEntry, DraftPointer, ElementMap, PageRevision, PatchRule,
    ProjectConfig, ProjectId, PublishArtifact, RevisionId, RevisionRows, SectionInstance,
    TextPatch,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-table id counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sequences {
    pub revision: i64,
    pub element_map: i64,
    pub rule: i64,
    pub text_patch: i64,
    pub section: i64,
    pub binding: i64,
    pub artifact: i64,
    pub audit: i64,
}

pub(crate) fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tables {
    pub sequences: Sequences,
    pub configs: Vec<ProjectConfig>,
    pub draft_pointers: Vec<DraftPointer>,
    pub revisions: Vec<PageRevision>,
    pub element_maps: Vec<ElementMap>,
    pub rules: Vec<PatchRule>,
    pub text_patches: Vec<TextPatch>,
    pub section_instances: Vec<SectionInstance>,
    pub action_bindings: Vec<ActionBinding>,
    pub artifacts: Vec<PublishArtifact>,
    pub audit: Vec<AuditLogEntry>,
}

/// Owned copy of one revision and every row it owns
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionSnapshot {
    pub revision: PageRevision,
    pub element_maps: Vec<ElementMap>,
    pub rules: Vec<PatchRule>,
    pub text_patches: Vec<TextPatch>,
    pub section_instances: Vec<SectionInstance>,
    pub action_bindings: Vec<ActionBinding>,
}

impl RevisionSnapshot {
    pub fn rows(&self) -> RevisionRows<'_> {
        RevisionRows {
            revision: &self.revision,
            element_maps: &self.element_maps,
            rules: &self.rules,
            text_patches: &self.text_patches,
            section_instances: &self.section_instances,
            action_bindings: &self.action_bindings,
        }
    }
}

impl Tables {
    pub fn config(&self, project_id: ProjectId) -> Option<&ProjectConfig> {
        self.configs.iter().find(|c| c.project_id == project_id)
    }

    pub fn revision(&self, revision_id: RevisionId) -> Option<&PageRevision> {
        self.revisions.iter().find(|r| r.id == revision_id)
    }

    pub fn require_revision(&self, revision_id: RevisionId) -> StoreResult<&PageRevision> {
        self.revision(revision_id)
            .ok_or_else(|| StoreError::not_found(format!("Revision {} not found.", revision_id)))
    }

    pub(crate) fn revision_mut(&mut self, revision_id: RevisionId) -> StoreResult<&mut PageRevision> {
        self.revisions
            .iter_mut()
            .find(|r| r.id == revision_id)
            .ok_or_else(|| StoreError::not_found(format!("Revision {} not found.", revision_id)))
    }

    /// Published revisions of a project, newest first by (createdAtUtc, id)
    pub fn published_revisions(&self, project_id: ProjectId) -> Vec<&PageRevision> {
        let mut list: Vec<&PageRevision> = self
            .revisions
            .iter()
            .filter(|r| r.project_id == project_id && r.is_published())
            .collect();
        list.sort_by(|a, b| (b.created_at_utc, b.id).cmp(&(a.created_at_utc, a.id)));
        list
    }

    pub fn element_map(&self, revision_id: RevisionId, element_key: &str) -> Option<&ElementMap> {
        self.element_maps
            .iter()
            .find(|m| m.revision_id == revision_id && m.element_key == element_key)
    }

    pub fn element_maps_for(&self, revision_id: RevisionId) -> Vec<&ElementMap> {
        self.element_maps
            .iter()
            .filter(|m| m.revision_id == revision_id)
            .collect()
    }

    pub fn rules_for(&self, revision_id: RevisionId) -> Vec<&PatchRule> {
        self.rules
            .iter()
            .filter(|r| r.revision_id == revision_id)
            .collect()
    }

    pub fn snapshot(&self, revision_id: RevisionId) -> StoreResult<RevisionSnapshot> {
        let revision = self.require_revision(revision_id)?.clone();
        fn owned<T: Clone>(rows: &[T], owner: impl Fn(&T) -> bool) -> Vec<T> {
            rows.iter().filter(|row| owner(*row)).cloned().collect()
        }
        Ok(RevisionSnapshot {
            element_maps: owned(&self.element_maps, |r| r.revision_id == revision_id),
            rules: owned(&self.rules, |r| r.revision_id == revision_id),
            text_patches: owned(&self.text_patches, |r| r.revision_id == revision_id),
            section_instances: owned(&self.section_instances, |r| r.revision_id == revision_id),
            action_bindings: owned(&self.action_bindings, |r| r.revision_id == revision_id),
            revision,
        })
    }

    // -- artifacts -------------------------------------------------------------

    pub fn record_artifact(
        &mut self,
        revision_id: RevisionId,
        artifact_type: &str,
        artifact_path: &str,
        checksum: &str,
        now: DateTime<Utc>,
    ) -> PublishArtifact {
        let artifact = PublishArtifact {
            id: next_id(&mut self.sequences.artifact),
            revision_id,
            artifact_type: artifact_type.to_string(),
            artifact_path: artifact_path.to_string(),
            checksum: checksum.to_string(),
            published_at_utc: now,
        };
        self.artifacts.push(artifact.clone());
        artifact
    }

    pub fn artifacts_for(&self, revision_id: RevisionId) -> Vec<&PublishArtifact> {
        self.artifacts
            .iter()
            .filter(|a| a.revision_id == revision_id)
            .collect()
    }

    // -- audit -------------------------------------------------------------------

    pub fn append_audit(
        &mut self,
        project_id: ProjectId,
        revision_id: Option<RevisionId>,
        actor_id: Option<&str>,
        action: &str,
        payload: Value,
        now: DateTime<Utc>,
    ) -> AuditLogEntry {
        let entry = AuditLogEntry {
            id: next_id(&mut self.sequences.audit),
            project_id,
            revision_id,
            actor_id: actor_id.map(str::to_string),
            action: action.to_string(),
            payload,
            at_utc: now,
        };
        self.audit.push(entry.clone());
        entry
    }

    /// Audit entries of a project, newest first
    pub fn audit_entries(&self, project_id: ProjectId, limit: usize) -> Vec<&AuditLogEntry> {
        let mut entries: Vec<&AuditLogEntry> = self
            .audit
            .iter()
            .filter(|e| e.project_id == project_id)
            .collect();
        entries.sort_by(|a, b| (b.at_utc, b.id).cmp(&(a.at_utc, a.id)));
        entries.truncate(limit);
        entries
    }
}
