//! # DVE Model
//!
//! Data model shared by every overlay crate.
//!
//! ```text
//! ┌──────────────┐   edits    ┌──────────────┐  publish   ┌──────────────┐
//! │ ElementMap   │ ─────────→ │ PageRevision │ ─────────→ │ Overlay      │
//! │ (identity)   │            │ + patch rows │            │ Artifact     │
//! └──────────────┘            └──────────────┘            └──────────────┘
//!                                                                ↓
//!                                                   runtime config block
//! ```
//!
//! Rows (`records`) are what the store persists. The artifact and runtime
//! config (`artifact`) are the wire formats read by the client runtime.

pub mod artifact;
pub mod confidence;
pub mod error;
pub mod keys;
pub mod payload;
pub mod records;
pub mod types;

pub use artifact::{
    ArtifactActionBinding, ArtifactElementMap, ArtifactRule, ArtifactSectionInstance,
    ArtifactTextPatch, OverlayArtifact, RevisionRows, RuntimeConfig, CONFIG_SCRIPT_ID, NODE_MARKER_ATTR,
    RUNTIME_SCRIPT_ID, SECTION_MARKER_ATTR, STYLE_ELEMENT_ID,
};
pub use confidence::{compute_confidence, ConfidenceBucket, ConfidenceInputs, LOW_CONFIDENCE};
pub use error::{ModelError, ModelResult};
pub use keys::{build_element_key, normalize_page_path, sha256_hex};
pub use payload::{ActionBehavior, HybridBehavior, NavigateBehavior, SectionMarkup, WorkflowBehavior};
pub use records::{
    ActionBinding, AuditLogEntry, DraftPointer, ElementMap, PageRevision, PatchRule,
    ProjectConfig, PublishArtifact, SectionInstance, TextPatch, MAX_FALLBACK_SELECTORS,
};
pub use types::{
    ActionType, Breakpoint, Environment, InsertMode, InteractionState, ProjectId, RevisionId,
    RevisionStatus, TextMode, TriggerEvent,
};
