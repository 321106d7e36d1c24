//! # DVE Runtime
//!
//! Applies a published overlay to a page and keeps it applied.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ boot: config block → ArtifactLoader → Overlay │
//! └──────────────────────────────────────────────┘
//!                      ↓
//! ┌──────────────────────────────────────────────┐
//! │ apply: styles → text → sections → bindings   │
//! └──────────────────────────────────────────────┘
//!                      ↓
//! ┌──────────────────────────────────────────────┐
//! │ reconcile: DomObserver → one pass per frame  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The runtime is single-threaded. Shared state lives in `Rc<RefCell<_>>`
//! and host services (`ArtifactLoader`, `FrameScheduler`, `Navigator`,
//! `TraceTransport`) are traits so the whole loop runs without a browser.

pub mod apply;
pub mod bindings;
pub mod error;
pub mod host;
pub mod overlay;
pub mod runtime;
pub mod sections;
pub mod styles;
pub mod text;
pub mod trace;

pub use apply::{ApplyReport, Applier};
pub use bindings::{BoundAction, DispatchOutcome, HandlerRegistry, ACTION_ATTR, WORKFLOW_ID_ATTR, WORKFLOW_RUNNER_ATTR};
pub use error::{RuntimeError, RuntimeResult};
pub use host::{
    ArtifactLoader, FrameQueue, FrameScheduler, FsLoader, MemoryLoader, Navigation, Navigator,
    NullTransport, RecordingNavigator, RecordingTransport, TraceTransport,
};
pub use overlay::{ElementIndex, Overlay, Target};
pub use runtime::{
    read_config, BootOutcome, Runtime, RuntimeHost, RuntimeOptions, DEFAULT_TRACE_ENDPOINT,
    DEFAULT_WORKFLOW_RUNNER_SRC,
};
pub use sections::SECTION_STYLE_ATTR;
pub use styles::build_css;
pub use trace::{TraceEvent, TraceKind, Tracer, TRACE_LOG_CAPACITY};
