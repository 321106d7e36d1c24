//! Persisted overlay rows.
//!
//! A revision owns its patch rows. A project owns its config, draft pointers
//! and revisions. Publish artifacts reference the revision that produced them
//! and outlive it.

use crate::payload::{ActionBehavior, SectionMarkup};
use crate::types::{
    ActionType, Breakpoint, Environment, InsertMode, InteractionState, ProjectId, RevisionId,
    RevisionStatus, TextMode, TriggerEvent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_FALLBACK_SELECTORS: usize = 12;

/// Stable identity of one editable element within a revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMap {
    pub id: i64,
    pub revision_id: RevisionId,
    pub element_key: String,
    pub primary_selector: String,
    /// Ordered, de-duplicated, at most [`MAX_FALLBACK_SELECTORS`]
    pub fallback_selectors: Vec<String>,
    pub fingerprint_hash: String,
    pub anchor_hash: String,
    pub confidence: f64,
    pub last_resolved_selector: Option<String>,
    pub last_resolved_at_utc: Option<DateTime<Utc>>,
    pub created_at_utc: DateTime<Utc>,
}

impl ElementMap {
    pub fn is_resolved(&self) -> bool {
        self.last_resolved_selector
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    /// Record that `selector` located this element at `at`
    pub fn mark_resolved(&mut self, selector: &str, at: DateTime<Utc>) {
        self.last_resolved_selector = Some(selector.to_string());
        self.last_resolved_at_utc = Some(at);
    }

    /// Primary selector followed by fallbacks, blanks removed
    pub fn candidates(&self) -> Vec<String> {
        std::iter::once(&self.primary_selector)
            .chain(self.fallback_selectors.iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRevision {
    pub id: RevisionId,
    pub project_id: ProjectId,
    pub page_path: String,
    pub environment: Environment,
    pub status: RevisionStatus,
    pub base_snapshot_id: Option<String>,
    /// Draft this revision was published from
    pub source_revision_id: Option<RevisionId>,
    pub created_by: Option<String>,
    pub created_at_utc: DateTime<Utc>,
}

impl PageRevision {
    pub fn is_editable_draft(&self) -> bool {
        self.environment == Environment::Draft && self.status == RevisionStatus::Draft
    }

    pub fn is_published(&self) -> bool {
        self.status == RevisionStatus::Published
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRule {
    pub id: i64,
    pub revision_id: RevisionId,
    pub element_key: String,
    pub rule_type: String,
    pub breakpoint: Breakpoint,
    pub state: InteractionState,
    pub property: String,
    pub value: String,
    pub priority: i32,
    pub created_at_utc: DateTime<Utc>,
}

impl PatchRule {
    /// `elementKey|property|value|breakpoint|state`, the revision diff unit
    pub fn diff_tuple(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.element_key, self.property, self.value, self.breakpoint, self.state
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPatch {
    pub id: i64,
    pub revision_id: RevisionId,
    pub element_key: String,
    pub text_mode: TextMode,
    pub content: String,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInstance {
    pub id: i64,
    pub revision_id: RevisionId,
    pub template_id: String,
    pub insert_mode: InsertMode,
    pub target_element_key: Option<String>,
    pub markup: SectionMarkup,
    pub created_at_utc: DateTime<Utc>,
}

impl SectionInstance {
    pub fn target_key(&self) -> Option<&str> {
        self.target_element_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBinding {
    pub id: i64,
    pub revision_id: RevisionId,
    pub element_key: String,
    pub action_type: ActionType,
    pub workflow_id: Option<String>,
    pub navigate_url: Option<String>,
    pub trigger_event: TriggerEvent,
    pub behavior: ActionBehavior,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_id: ProjectId,
    pub mode: String,
    pub runtime_policy: String,
    pub feature_enabled: bool,
    /// Most recently touched draft, any page. Page-exact lookups go through
    /// [`DraftPointer`].
    pub draft_revision_id: Option<RevisionId>,
    pub staging_revision_id: Option<RevisionId>,
    pub live_revision_id: Option<RevisionId>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl ProjectConfig {
    pub fn new(project_id: ProjectId, now: DateTime<Utc>) -> Self {
        Self {
            project_id,
            mode: "overlay".to_string(),
            runtime_policy: "proxy".to_string(),
            feature_enabled: true,
            draft_revision_id: None,
            staging_revision_id: None,
            live_revision_id: None,
            created_at_utc: now,
            updated_at_utc: now,
        }
    }
}

/// Editable draft of one (project, page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPointer {
    pub project_id: ProjectId,
    pub page_path: String,
    pub revision_id: RevisionId,
    pub updated_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishArtifact {
    pub id: i64,
    pub revision_id: RevisionId,
    pub artifact_type: String,
    pub artifact_path: String,
    pub checksum: String,
    pub published_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub project_id: ProjectId,
    pub revision_id: Option<RevisionId>,
    pub actor_id: Option<String>,
    pub action: String,
    pub payload: Value,
    pub at_utc: DateTime<Utc>,
}
