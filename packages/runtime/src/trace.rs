//! Debug tracing of runtime activity.
//!
//! Only active when the config block sets `debug`. Each event is posted to the
//! trace endpoint when a project id is known and kept in a local log holding
//! the newest [`TRACE_LOG_CAPACITY`] events.

use crate::host::TraceTransport;
use chrono::{DateTime, Utc};
use dve_model::{ProjectId, RevisionId, RuntimeConfig};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::debug;

pub const TRACE_LOG_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceKind {
    RuntimeBoot,
    ElementResolved,
    ElementUnresolved,
    StyleApplied,
    TextApplied,
    SectionApplied,
    BindingAttached,
    NavigateFired,
    WorkflowTriggered,
    Reconcile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    pub at: DateTime<Utc>,
    pub payload: Value,
}

pub struct Tracer {
    enabled: bool,
    project_id: Option<ProjectId>,
    revision_id: Option<RevisionId>,
    endpoint: String,
    transport: Rc<dyn TraceTransport>,
    events: VecDeque<TraceEvent>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("events", &self.events.len())
            .finish()
    }
}

impl Tracer {
    pub fn new(config: &RuntimeConfig, endpoint: impl Into<String>, transport: Rc<dyn TraceTransport>) -> Self {
        Self {
            enabled: config.debug,
            project_id: config.project_id.filter(|id| *id > 0),
            revision_id: config.revision_id,
            endpoint: endpoint.into(),
            transport,
            events: VecDeque::with_capacity(TRACE_LOG_CAPACITY),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn emit(&mut self, kind: TraceKind, payload: Value) {
        if !self.enabled {
            return;
        }
        let event = TraceEvent {
            kind,
            at: Utc::now(),
            payload,
        };

        if let Some(project_id) = self.project_id {
            let body = json!({
                "projectId": project_id,
                "revisionId": self.revision_id,
                "trace": event,
            });
            if let Err(err) = self.transport.post(&self.endpoint, &body) {
                debug!(endpoint = %self.endpoint, error = %err, "trace post failed");
            }
        }
        if self.events.len() == TRACE_LOG_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Retained events, oldest first
    pub fn events(&self) -> impl ExactSizeIterator<Item = &TraceEvent> {
        self.events.iter()
    }
}
