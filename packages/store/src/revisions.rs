//! Revision and environment manager.
//!
//! ```text
//! (project, page): no draft ──ensure──→ draft ──publish──→ clone (live/published)
//!                                        ↑ stays editable
//! ```

use crate::error::{StoreError, StoreResult};
use crate::tables::{next_id, Tables};
use chrono::{DateTime, Utc};
use dve_model::{
    DraftPointer, Environment, PageRevision, ProjectConfig, ProjectId, RevisionId,
    RevisionStatus,
};
use tracing::{debug, info};

impl Tables {
    /// Config for `project_id`, created with defaults on first use
    pub fn ensure_config(&mut self, project_id: ProjectId, now: DateTime<Utc>) -> &mut ProjectConfig {
        let index = match self.configs.iter().position(|c| c.project_id == project_id) {
            Some(index) => index,
            None => {
                self.configs.push(ProjectConfig::new(project_id, now));
                self.configs.len() - 1
            }
        };
        &mut self.configs[index]
    }

    /// Editable draft of one page, if any. Never creates rows.
    pub fn latest_draft(&self, project_id: ProjectId, page_path: &str) -> Option<&PageRevision> {
        let pointed = self
            .draft_pointers
            .iter()
            .find(|p| p.project_id == project_id && p.page_path == page_path)
            .and_then(|p| self.revision(p.revision_id))
            .filter(|r| r.is_editable_draft() && r.page_path == page_path);
        if pointed.is_some() {
            return pointed;
        }

        self.revisions
            .iter()
            .filter(|r| r.project_id == project_id && r.page_path == page_path)
            .filter(|r| r.is_editable_draft())
            .max_by_key(|r| (r.created_at_utc, r.id))
    }

    /// Revision the editor loads for a page in `environment`: the draft
    /// lookup for drafts, otherwise the newest revision in that environment.
    pub fn revision_for_environment(
        &self,
        project_id: ProjectId,
        page_path: &str,
        environment: Environment,
    ) -> Option<&PageRevision> {
        if environment == Environment::Draft {
            return self.latest_draft(project_id, page_path);
        }
        self.revisions
            .iter()
            .filter(|r| r.project_id == project_id && r.page_path == page_path)
            .filter(|r| r.environment == environment)
            .max_by_key(|r| (r.created_at_utc, r.id))
    }

    /// Find or create the draft revision of `(project_id, page_path)`.
    pub fn ensure_draft_revision(
        &mut self,
        project_id: ProjectId,
        page_path: &str,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> PageRevision {
        let draft = match self.latest_draft(project_id, page_path).cloned() {
            Some(existing) => existing,
            None => {
                let revision = PageRevision {
                    id: next_id(&mut self.sequences.revision),
                    project_id,
                    page_path: page_path.to_string(),
                    environment: Environment::Draft,
                    status: RevisionStatus::Draft,
                    base_snapshot_id: None,
                    source_revision_id: None,
                    created_by: actor.map(str::to_string),
                    created_at_utc: now,
                };
                info!(project_id, page_path, revision_id = revision.id, "created draft revision");
                self.revisions.push(revision.clone());
                revision
            }
        };

        self.point_draft(project_id, page_path, draft.id, now);
        let config = self.ensure_config(project_id, now);
        config.draft_revision_id = Some(draft.id);
        config.updated_at_utc = now;
        draft
    }

    fn point_draft(&mut self, project_id: ProjectId, page_path: &str, revision_id: RevisionId, now: DateTime<Utc>) {
        match self
            .draft_pointers
            .iter_mut()
            .find(|p| p.project_id == project_id && p.page_path == page_path)
        {
            Some(pointer) => {
                pointer.revision_id = revision_id;
                pointer.updated_at_utc = now;
            }
            None => self.draft_pointers.push(DraftPointer {
                project_id,
                page_path: page_path.to_string(),
                revision_id,
                updated_at_utc: now,
            }),
        }
    }

    /// Clone a draft and all of its rows into a new live/published revision.
    pub fn publish_from_draft(
        &mut self,
        draft_id: RevisionId,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<PageRevision> {
        let snapshot = self.snapshot(draft_id)?;
        let published_id = next_id(&mut self.sequences.revision);
        let published = PageRevision {
            id: published_id,
            environment: Environment::Live,
            status: RevisionStatus::Published,
            source_revision_id: Some(draft_id),
            created_by: actor.map(str::to_string).or(snapshot.revision.created_by.clone()),
            created_at_utc: now,
            ..snapshot.revision.clone()
        };
        self.revisions.push(published.clone());

        for mut row in snapshot.element_maps {
            row.id = next_id(&mut self.sequences.element_map);
            row.revision_id = published_id;
            self.element_maps.push(row);
        }
        for mut row in snapshot.rules {
            row.id = next_id(&mut self.sequences.rule);
            row.revision_id = published_id;
            self.rules.push(row);
        }
        for mut row in snapshot.text_patches {
            row.id = next_id(&mut self.sequences.text_patch);
            row.revision_id = published_id;
            self.text_patches.push(row);
        }
        for mut row in snapshot.section_instances {
            row.id = next_id(&mut self.sequences.section);
            row.revision_id = published_id;
            self.section_instances.push(row);
        }
        for mut row in snapshot.action_bindings {
            row.id = next_id(&mut self.sequences.binding);
            row.revision_id = published_id;
            self.action_bindings.push(row);
        }

        debug!(draft_id, published_id, "cloned draft into published revision");
        Ok(published)
    }

    /// Make `revision_id` the live revision of its project.
    pub fn mark_live(&mut self, revision_id: RevisionId, now: DateTime<Utc>) -> StoreResult<PageRevision> {
        let revision = self.revision_mut(revision_id)?;
        revision.environment = Environment::Live;
        revision.status = RevisionStatus::Published;
        let revision = revision.clone();

        let config = self.ensure_config(revision.project_id, now);
        config.live_revision_id = Some(revision.id);
        config.updated_at_utc = now;
        Ok(revision)
    }

    pub fn set_base_snapshot(&mut self, revision_id: RevisionId, snapshot_id: &str) -> StoreResult<()> {
        self.revision_mut(revision_id)?.base_snapshot_id = Some(snapshot_id.to_string());
        Ok(())
    }

    /// Remove a revision and every row it owns. Publish artifacts are kept.
    pub fn delete_revision(&mut self, revision_id: RevisionId) -> StoreResult<PageRevision> {
        let index = self
            .revisions
            .iter()
            .position(|r| r.id == revision_id)
            .ok_or_else(|| StoreError::not_found(format!("Revision {} not found.", revision_id)))?;
        let removed = self.revisions.remove(index);

        self.element_maps.retain(|r| r.revision_id != revision_id);
        self.rules.retain(|r| r.revision_id != revision_id);
        self.text_patches.retain(|r| r.revision_id != revision_id);
        self.section_instances.retain(|r| r.revision_id != revision_id);
        self.action_bindings.retain(|r| r.revision_id != revision_id);
        self.draft_pointers.retain(|p| p.revision_id != revision_id);

        if let Some(config) = self.configs.iter_mut().find(|c| c.project_id == removed.project_id) {
            for pointer in [
                &mut config.draft_revision_id,
                &mut config.staging_revision_id,
                &mut config.live_revision_id,
            ] {
                if *pointer == Some(revision_id) {
                    *pointer = None;
                }
            }
        }

        info!(revision_id, project_id = removed.project_id, "deleted revision");
        Ok(removed)
    }
}
