//! # DVE Server
//!
//! HTTP surface of the overlay editor.
//!
//! ```text
//! editor ──POST /api/dve/*──→ handlers ──→ OverlayStore (draft edits)
//!                                 │
//!                                 └──────→ Publisher (preflight, publish, rollback)
//! runtime ──POST /api/dve/trace──→ tracing (+ sampled audit)
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::{Cli, DveConfig, DEFAULT_CONFIG_NAME};
pub use error::{ApiError, ApiResult};
pub use router::{build_router, API_PREFIX};
pub use state::{actor, AppState, TraceSampler, ACTOR_HEADER, DEFAULT_TRACE_AUDIT_EVERY};
