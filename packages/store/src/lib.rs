//! # DVE Store
//!
//! Persistence for overlay editing: element identity maps, patch rows,
//! revisions with their draft pointers, project configs and the audit log.
//!
//! ```text
//! OverlayStore ── transaction(|&mut Tables| ...) ──→ Tables (rows)
//!      │                                               │
//!      └── Memory | File(JSON)                         ├── element_map: identity upsert
//!                                                      ├── patches: natural-key upserts
//!                                                      └── revisions: drafts, publish clones
//! ```
//!
//! Editor operations (`edits`) sit on top and are what the HTTP layer calls.

pub mod actions;
pub mod edits;
pub mod element_map;
pub mod error;
pub mod patches;
pub mod revisions;
pub mod store;
pub mod tables;

pub use actions::{action_definition, ActionDefinition, ACTION_REGISTRY};
pub use edits::{
    BindActionRequest, BindingSimulation, DraftPatch, Edit, ResolveElementRequest, SaveDraftRequest,
    SavedDraft, SectionInsertRequest, SectionRemoveRequest, SessionStart, SessionStartRequest,
    StyleEditRequest, StyleRemoveRequest, TextEditRequest, TextRemoveRequest, UnbindActionRequest,
};
pub use element_map::ElementMapUpsert;
pub use error::{StoreError, StoreResult};
pub use patches::{BindingPatch, SectionPatch, StylePatch, STYLE_RULE_TYPE};
pub use store::{OverlayStore, StoreBackend};
pub use tables::{RevisionSnapshot, Sequences, Tables};
