//! Boot, reconciliation and event dispatch.
//!
//! ```text
//! config block ──→ ArtifactLoader ──→ Applier::apply ──→ observe document
//!                                          ↑                    │ mutation
//!                                          │                    ↓
//!                                   FrameScheduler ←── pending keys (one frame)
//! ```
//!
//! Every reconciliation re-applies the whole overlay. The pending keys are
//! kept for diagnostics only. Mutations made by the apply pass itself are
//! not fed back into reconciliation.

use crate::apply::{ApplyReport, Applier};
use crate::bindings::DispatchOutcome;
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::{ArtifactLoader, FrameScheduler, Navigation, Navigator, TraceTransport};
use crate::overlay::Overlay;
use crate::trace::{TraceEvent, TraceKind, Tracer};
use dve_dom::{Document, DomObserver, MutationRecord, NodeId, SharedDocument};
use dve_model::{ArtifactElementMap, OverlayArtifact, RuntimeConfig, CONFIG_SCRIPT_ID};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

pub const DEFAULT_WORKFLOW_RUNNER_SRC: &str = "/js/workflow-trigger-runner.js";
pub const DEFAULT_TRACE_ENDPOINT: &str = "/api/dve/trace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub workflow_runner_src: String,
    pub trace_endpoint: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            workflow_runner_src: DEFAULT_WORKFLOW_RUNNER_SRC.to_string(),
            trace_endpoint: DEFAULT_TRACE_ENDPOINT.to_string(),
        }
    }
}

/// Services the runtime borrows from its host page
pub struct RuntimeHost {
    pub loader: Box<dyn ArtifactLoader>,
    pub frames: Rc<dyn FrameScheduler>,
    pub navigator: Rc<dyn Navigator>,
    pub transport: Rc<dyn TraceTransport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// No config block or no overlay path
    Skipped,
    Applied(ApplyReport),
}

/// Parse the embedded config block
pub fn read_config(doc: &Document) -> RuntimeResult<RuntimeConfig> {
    let node = doc
        .get_element_by_id(CONFIG_SCRIPT_ID)
        .ok_or(RuntimeError::MissingConfig)?;
    let text = doc.text_content(node);
    if text.trim().is_empty() {
        return Ok(RuntimeConfig::default());
    }
    serde_json::from_str(&text).map_err(RuntimeError::InvalidConfig)
}

struct Shared {
    doc: SharedDocument,
    frames: Rc<dyn FrameScheduler>,
    applier: RefCell<Option<Applier>>,
    applying: Cell<bool>,
    queued: Cell<bool>,
    observing: Cell<bool>,
    pending: RefCell<BTreeSet<String>>,
    last_affected: RefCell<BTreeSet<String>>,
    reconciles: Cell<usize>,
}

impl Shared {
    fn apply_all(&self) -> ApplyReport {
        let mut applier = self.applier.borrow_mut();
        let Some(applier) = applier.as_mut() else {
            return ApplyReport::default();
        };
        let mut doc = self.doc.borrow_mut();
        self.applying.set(true);
        let report = applier.apply(&mut doc);
        self.applying.set(false);
        report
    }

    fn record_mutation(self: &Rc<Self>, record: &MutationRecord) {
        if self.applying.get() {
            return;
        }
        if let Some(key) = &record.marker_key {
            self.pending.borrow_mut().insert(key.clone());
        }
        self.queue_reconcile();
    }

    fn queue_reconcile(self: &Rc<Self>) {
        if self.queued.get() || !self.observing.get() {
            return;
        }
        self.queued.set(true);
        let weak: Weak<Self> = Rc::downgrade(self);
        self.frames.request_frame(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.reconcile();
            }
        }));
    }

    fn reconcile(&self) {
        self.queued.set(false);
        let keys = std::mem::take(&mut *self.pending.borrow_mut());
        self.apply_all();
        self.reconciles.set(self.reconciles.get() + 1);

        if let Some(applier) = self.applier.borrow_mut().as_mut() {
            applier
                .tracer
                .emit(TraceKind::Reconcile, json!({ "affected": keys.len() }));
        }
        debug!(affected = keys.len(), "reconciled overlay");
        *self.last_affected.borrow_mut() = keys;
    }
}

/// Overlay runtime bound to one document
pub struct Runtime {
    shared: Rc<Shared>,
    loader: Box<dyn ArtifactLoader>,
    navigator: Rc<dyn Navigator>,
    transport: Rc<dyn TraceTransport>,
    options: RuntimeOptions,
}

impl Runtime {
    pub fn new(doc: SharedDocument, host: RuntimeHost, options: RuntimeOptions) -> Self {
        Self {
            shared: Rc::new(Shared {
                doc,
                frames: host.frames,
                applier: RefCell::new(None),
                applying: Cell::new(false),
                queued: Cell::new(false),
                observing: Cell::new(false),
                pending: RefCell::new(BTreeSet::new()),
                last_affected: RefCell::new(BTreeSet::new()),
                reconciles: Cell::new(0),
            }),
            loader: host.loader,
            navigator: host.navigator,
            transport: host.transport,
            options,
        }
    }

    pub fn document(&self) -> SharedDocument {
        self.shared.doc.clone()
    }

    /// Load the overlay named by the config block, apply it and start
    /// observing. A load or parse failure applies nothing.
    pub fn boot(&self) -> RuntimeResult<BootOutcome> {
        let config = match read_config(&self.shared.doc.borrow()) {
            Ok(config) => config,
            Err(RuntimeError::MissingConfig) => return Ok(BootOutcome::Skipped),
            Err(err) => return Err(err),
        };
        let overlay_path = config.overlay_path.trim();
        if overlay_path.is_empty() {
            return Ok(BootOutcome::Skipped);
        }

        let raw = self.loader.load(overlay_path)?;
        let artifact: OverlayArtifact = serde_json::from_str(&raw).map_err(RuntimeError::ArtifactParse)?;
        let tracer = Tracer::new(&config, &self.options.trace_endpoint, self.transport.clone());
        *self.shared.applier.borrow_mut() = Some(Applier::new(
            Overlay::new(artifact),
            tracer,
            &self.options.workflow_runner_src,
        ));

        let report = self.shared.apply_all();
        self.start_observer();
        if let Some(applier) = self.shared.applier.borrow_mut().as_mut() {
            applier
                .tracer
                .emit(TraceKind::RuntimeBoot, json!({ "overlayPath": overlay_path }));
        }
        info!(
            overlay_path,
            unresolved = report.unresolved.len(),
            "overlay runtime booted"
        );
        Ok(BootOutcome::Applied(report))
    }

    fn start_observer(&self) {
        if self.shared.observing.replace(true) {
            return;
        }
        let weak = Rc::downgrade(&self.shared);
        self.shared.doc.on_mutation(Box::new(move |record| {
            if let Some(shared) = weak.upgrade() {
                shared.record_mutation(record);
            }
        }));
    }

    /// Ask for a reconciliation on the next frame
    pub fn request_reconcile(&self) {
        self.shared.queue_reconcile();
    }

    pub fn reconcile_count(&self) -> usize {
        self.shared.reconciles.get()
    }

    /// Marker keys touched since the last reconciliation
    pub fn pending_keys(&self) -> Vec<String> {
        self.shared.pending.borrow().iter().cloned().collect()
    }

    /// Marker keys the last reconciliation was triggered by
    pub fn last_affected_keys(&self) -> Vec<String> {
        self.shared.last_affected.borrow().iter().cloned().collect()
    }

    pub fn handler_count(&self) -> usize {
        self.shared
            .applier
            .borrow()
            .as_ref()
            .map_or(0, |a| a.handlers.len())
    }

    /// Element map state as last resolved by the runtime
    pub fn element_map(&self, element_key: &str) -> Option<ArtifactElementMap> {
        self.shared
            .applier
            .borrow()
            .as_ref()
            .and_then(|a| a.overlay.index.get(element_key).cloned())
    }

    pub fn traces(&self) -> Vec<TraceEvent> {
        self.shared
            .applier
            .borrow()
            .as_ref()
            .map(|a| a.tracer.events().cloned().collect())
            .unwrap_or_default()
    }

    /// Fire `event_type` on `node`. `None` when no handler is bound or the
    /// node has left the document.
    pub fn dispatch(&self, node: NodeId, event_type: &str) -> Option<DispatchOutcome> {
        if !self.shared.doc.borrow().is_connected(node) {
            return None;
        }
        let mut applier = self.shared.applier.borrow_mut();
        let applier = applier.as_mut()?;
        let action = applier.handlers.get(node, event_type)?.clone();

        if let Some(workflow_id) = &action.workflow_id {
            applier.tracer.emit(
                TraceKind::WorkflowTriggered,
                json!({
                    "workflowId": workflow_id,
                    "actionType": action.action_type.as_str(),
                    "elementKey": action.element_key,
                }),
            );
        }
        if let Some(navigation) = &action.navigation {
            applier.tracer.emit(
                TraceKind::NavigateFired,
                json!({
                    "actionType": action.action_type.as_str(),
                    "elementKey": action.element_key,
                    "newTab": matches!(navigation, Navigation::NewTab(_)),
                }),
            );
            self.navigator.navigate(navigation);
        }

        Some(DispatchOutcome {
            event_type: event_type.to_string(),
            navigation: action.navigation,
            workflow_id: action.workflow_id,
            default_prevented: action.prevent_default,
        })
    }
}
