//! # DVE Publish
//!
//! Turns a draft overlay into a live one.
//!
//! ```text
//! ProjectFiles ──→ Publisher ──→ overlay-<rev>.json
//!                    │    │
//!   PreflightEvaluator    SnapshotService
//! ```
//!
//! The publisher never edits the uploaded page beyond the two runtime
//! `<script>` tags; every visual change lives in the overlay artifact.

pub mod attach;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod files;
pub mod pipeline;
pub mod preflight;
pub mod snapshot;

pub use attach::attach_runtime;
pub use diagnostics::{ConfidenceBuckets, OverlayDiagnostics, PreflightOutcome};
pub use diff::{diff_revisions, RevisionDiff};
pub use error::{PublishError, PublishResult};
pub use files::{ProjectFiles, INTERNAL_DIR};
pub use pipeline::{
    BuiltArtifact, PageLoad, PreflightRequest, PublishReceipt, PublishRequest, Publisher,
    RollbackReceipt, RollbackRequest, ARTIFACT_TYPE, DEFAULT_RUNTIME_SRC,
};
pub use preflight::{
    BasicPreflight, Finding, FindingLevel, PreflightCheck, PreflightEvaluator, PreflightReport,
};
pub use snapshot::{
    FsSnapshotService, ManifestEntry, NoopSnapshots, SnapshotManifest, SnapshotService,
    DEFAULT_SNAPSHOT_RETENTION,
};
