//! Editor operations against the draft revision of a page.
//!
//! Every operation validates its request before touching the tables, runs
//! its writes in one transaction and then appends an audit entry. A failed
//! audit append is logged and never fails the edit.

use crate::actions::action_definition;
use crate::element_map::ElementMapUpsert;
use crate::error::{StoreError, StoreResult};
use crate::patches::{BindingPatch, SectionPatch, StylePatch};
use crate::store::OverlayStore;
use chrono::Utc;
use dve_model::{
    build_element_key, normalize_page_path, sha256_hex, ActionBehavior, ActionBinding,
    AuditLogEntry, Breakpoint, ElementMap, InsertMode, InteractionState, PageRevision, PatchRule,
    ProjectConfig, ProjectId, RevisionId, SectionInstance, SectionMarkup, TextMode, TextPatch,
    TriggerEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_TEMPLATE_ID: &str = "custom";
pub const DEFAULT_DRAFT_SELECTOR: &str = "body";

// -- requests -----------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionStartRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolveElementRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub selector: Option<String>,
    pub element_key: Option<String>,
    pub fallback_selectors: Vec<String>,
    pub fingerprint_hash: Option<String>,
    pub anchor_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextEditRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub element_key: Option<String>,
    pub selector: Option<String>,
    pub content: String,
    pub text_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleEditRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub element_key: Option<String>,
    pub selector: Option<String>,
    pub property: String,
    pub value: String,
    pub breakpoint: Option<String>,
    pub state: Option<String>,
    pub priority: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionInsertRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub template_id: Option<String>,
    pub insert_mode: Option<String>,
    pub target_element_key: Option<String>,
    pub markup: String,
    pub css: Option<String>,
    pub js: Option<String>,
    pub instance_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindActionRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub element_key: Option<String>,
    pub action_type: Option<String>,
    pub workflow_id: Option<String>,
    pub navigate_url: Option<String>,
    pub trigger_event: Option<String>,
    pub behavior: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftPatch {
    pub selector: Option<String>,
    pub text: Option<String>,
    pub styles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveDraftRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub patch: Option<DraftPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleRemoveRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub element_key: Option<String>,
    pub property: String,
    pub breakpoint: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextRemoveRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub element_key: Option<String>,
    pub text_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionRemoveRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub instance_id: i64,
}

/// Also used by `bind/test`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnbindActionRequest {
    pub project_id: ProjectId,
    pub page_path: Option<String>,
    pub element_key: Option<String>,
}

// -- outcomes -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub page_path: String,
    pub revision: PageRevision,
    pub config: ProjectConfig,
}

/// Row written by an edit, with the draft and element it landed on
#[derive(Debug, Clone, PartialEq)]
pub struct Edit<T> {
    pub page_path: String,
    pub revision_id: RevisionId,
    pub element_key: Option<String>,
    pub row: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedDraft {
    pub text: Option<TextPatch>,
    pub rules: Vec<PatchRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingSimulation {
    pub ok: bool,
    pub trace_id: String,
    pub execution_path: Vec<&'static str>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// -- helpers ------------------------------------------------------------------

fn require_project(project_id: ProjectId) -> StoreResult<()> {
    if project_id <= 0 {
        return Err(StoreError::validation("Project id is required."));
    }
    Ok(())
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Given key, else a key derived from page + selector
fn element_key_for(page_path: &str, element_key: Option<&str>, selector: Option<&str>) -> Option<String> {
    trimmed(element_key)
        .map(str::to_string)
        .or_else(|| trimmed(selector).map(|s| build_element_key(page_path, s)))
}

fn require_key(element_key: Option<&str>) -> StoreResult<String> {
    trimmed(element_key)
        .map(str::to_string)
        .ok_or_else(|| StoreError::validation("Element key is required."))
}

impl OverlayStore {
    fn draft_for(&self, project_id: ProjectId, page_path: &str) -> StoreResult<RevisionId> {
        self.tables()
            .latest_draft(project_id, page_path)
            .map(|r| r.id)
            .ok_or_else(|| StoreError::not_found(format!("No draft revision for '{}'.", page_path)))
    }

    pub fn session_start(&mut self, req: &SessionStartRequest, actor: Option<&str>) -> StoreResult<SessionStart> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let now = Utc::now();

        let (revision, config) = self.transaction(|tables| {
            let revision = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            let config = tables.ensure_config(req.project_id, now).clone();
            Ok((revision, config))
        })?;

        self.audit(
            req.project_id,
            Some(revision.id),
            actor,
            "session-start",
            json!({ "pagePath": page_path }),
        );
        info!(project_id = req.project_id, page_path = %page_path, revision_id = revision.id, "editor session started");
        Ok(SessionStart {
            page_path,
            revision,
            config,
        })
    }

    pub fn resolve_element(&mut self, req: &ResolveElementRequest, actor: Option<&str>) -> StoreResult<Edit<ElementMap>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let selector = trimmed(req.selector.as_deref())
            .ok_or_else(|| StoreError::validation("Selector is required."))?;
        let element_key = element_key_for(&page_path, req.element_key.as_deref(), Some(selector))
            .unwrap_or_else(|| build_element_key(&page_path, selector));
        let upsert = ElementMapUpsert {
            element_key: element_key.clone(),
            selector: selector.to_string(),
            fallback_selectors: req.fallback_selectors.clone(),
            fingerprint_hash: req.fingerprint_hash.clone(),
            anchor_hash: req.anchor_hash.clone(),
        };
        let now = Utc::now();

        let (revision_id, map) = self.transaction(|tables| {
            let revision = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            Ok((revision.id, tables.upsert_element_map(revision.id, &upsert, now)))
        })?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "element-resolve",
            json!({ "pagePath": page_path, "elementKey": element_key }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: map,
        })
    }

    pub fn set_text(&mut self, req: &TextEditRequest, actor: Option<&str>) -> StoreResult<Edit<TextPatch>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let element_key = element_key_for(&page_path, req.element_key.as_deref(), req.selector.as_deref())
            .ok_or_else(|| StoreError::validation("Element key or selector is required."))?;
        let text_mode = TextMode::parse_or_default(req.text_mode.as_deref())?;
        let upsert = ElementMapUpsert::new(element_key.clone(), req.selector.clone().unwrap_or_default());
        let now = Utc::now();

        let (revision_id, patch) = self.transaction(|tables| {
            let revision = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            tables.upsert_element_map(revision.id, &upsert, now);
            Ok((revision.id, tables.upsert_text(revision.id, &element_key, text_mode, &req.content, now)))
        })?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "text-set",
            json!({ "pagePath": page_path, "elementKey": element_key }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: patch,
        })
    }

    pub fn set_style(&mut self, req: &StyleEditRequest, actor: Option<&str>) -> StoreResult<Edit<PatchRule>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let element_key = element_key_for(&page_path, req.element_key.as_deref(), req.selector.as_deref());
        let property = req.property.trim();
        let (Some(element_key), false) = (element_key, property.is_empty()) else {
            return Err(StoreError::validation("Element key and property are required."));
        };
        let patch = StylePatch {
            element_key: element_key.clone(),
            breakpoint: Breakpoint::parse_or_default(req.breakpoint.as_deref())?,
            state: InteractionState::parse_or_default(req.state.as_deref())?,
            property: property.to_string(),
            value: req.value.trim().to_string(),
            priority: req.priority,
        };
        let upsert = ElementMapUpsert::new(element_key.clone(), req.selector.clone().unwrap_or_default());
        let now = Utc::now();

        let (revision_id, rule) = self.transaction(|tables| {
            let revision = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            tables.upsert_element_map(revision.id, &upsert, now);
            Ok((revision.id, tables.upsert_rule(revision.id, &patch, now)))
        })?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "style-set",
            json!({ "pagePath": page_path, "elementKey": element_key, "property": rule.property }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: rule,
        })
    }

    pub fn insert_section(&mut self, req: &SectionInsertRequest, actor: Option<&str>) -> StoreResult<Edit<SectionInstance>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        if req.markup.trim().is_empty() {
            return Err(StoreError::validation("Markup is required."));
        }
        let patch = SectionPatch {
            instance_id: req.instance_id.filter(|id| *id > 0),
            template_id: trimmed(req.template_id.as_deref())
                .unwrap_or(DEFAULT_TEMPLATE_ID)
                .to_string(),
            insert_mode: InsertMode::parse_or_default(req.insert_mode.as_deref())?,
            target_element_key: trimmed(req.target_element_key.as_deref()).map(str::to_string),
            markup: SectionMarkup::new(req.markup.clone())
                .with_css(req.css.clone().unwrap_or_default())
                .with_js(req.js.clone().unwrap_or_default()),
        };
        let now = Utc::now();

        let (revision_id, section) = self.transaction(|tables| {
            let revision = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            Ok((revision.id, tables.upsert_section(revision.id, &patch, now)))
        })?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "section-insert",
            json!({ "pagePath": page_path, "templateId": section.template_id }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: section.target_element_key.clone(),
            row: section,
        })
    }

    pub fn bind_action(&mut self, req: &BindActionRequest, actor: Option<&str>) -> StoreResult<Edit<ActionBinding>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let element_key = require_key(req.element_key.as_deref())?;

        let raw_type = trimmed(req.action_type.as_deref()).unwrap_or("navigate").to_ascii_lowercase();
        let definition = action_definition(&raw_type)
            .ok_or_else(|| StoreError::validation(format!("Unsupported action type '{}'.", raw_type)))?;
        let action_type = definition.key;

        let raw_trigger = trimmed(req.trigger_event.as_deref()).unwrap_or("auto").to_ascii_lowercase();
        let trigger_event = raw_trigger
            .parse::<TriggerEvent>()
            .ok()
            .filter(|t| definition.allows(*t))
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "Trigger event '{}' is not allowed for action '{}'.",
                    raw_trigger, action_type
                ))
            })?;

        let navigate_url = trimmed(req.navigate_url.as_deref()).map(str::to_string);
        if action_type.navigates() && navigate_url.is_none() {
            return Err(StoreError::validation("Navigate URL required for navigate/hybrid actions."));
        }
        let workflow_id = trimmed(req.workflow_id.as_deref()).map(str::to_string);
        if action_type.runs_workflow() && workflow_id.is_none() {
            return Err(StoreError::validation("Workflow id required for workflow/hybrid actions."));
        }

        let patch = BindingPatch {
            element_key: element_key.clone(),
            action_type,
            workflow_id: workflow_id.filter(|_| action_type.runs_workflow()),
            navigate_url: navigate_url.filter(|_| action_type.navigates()),
            trigger_event,
            behavior: ActionBehavior::decode(action_type, req.behavior.clone()),
        };
        let now = Utc::now();

        let (revision_id, binding) = self.transaction(|tables| {
            let revision = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            Ok((revision.id, tables.upsert_binding(revision.id, &patch, now)))
        })?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "action-bind",
            json!({ "pagePath": page_path, "elementKey": element_key, "actionType": action_type }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: binding,
        })
    }

    /// Legacy bulk edit: one plain text patch plus one desktop/base rule per
    /// style property, keyed by the selector (default `body`).
    pub fn save_draft(&mut self, req: &SaveDraftRequest, actor: Option<&str>) -> StoreResult<Edit<SavedDraft>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let patch = req.patch.clone().unwrap_or_default();
        let selector = trimmed(patch.selector.as_deref())
            .unwrap_or(DEFAULT_DRAFT_SELECTOR)
            .to_string();
        let element_key = build_element_key(&page_path, &selector);
        let styles: Vec<StylePatch> = patch
            .styles
            .iter()
            .filter(|(property, _)| !property.trim().is_empty())
            .map(|(property, value)| StylePatch {
                element_key: element_key.clone(),
                breakpoint: Breakpoint::Desktop,
                state: InteractionState::Base,
                property: property.trim().to_string(),
                value: value.trim().to_string(),
                priority: 0,
            })
            .collect();
        let upsert = ElementMapUpsert::new(element_key.clone(), selector);
        let now = Utc::now();

        let (revision_id, saved) = self.transaction(|tables| {
            let revision = tables.ensure_draft_revision(req.project_id, &page_path, actor, now);
            tables.upsert_element_map(revision.id, &upsert, now);
            let text = patch
                .text
                .as_deref()
                .map(|text| tables.upsert_text(revision.id, &element_key, TextMode::Plain, text, now));
            let rules = styles
                .iter()
                .map(|style| tables.upsert_rule(revision.id, style, now))
                .collect();
            Ok((revision.id, SavedDraft { text, rules }))
        })?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "save-draft",
            json!({ "pagePath": page_path }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: saved,
        })
    }

    /// Record an arbitrary client operation in the audit log.
    pub fn append_ops(&mut self, payload: Value, actor: Option<&str>) -> StoreResult<AuditLogEntry> {
        let project_id = payload.get("projectId").and_then(Value::as_i64).unwrap_or(0);
        require_project(project_id)?;
        let revision_id = payload.get("revisionId").and_then(Value::as_i64);
        let now = Utc::now();
        self.transaction(|tables| {
            Ok(tables.append_audit(project_id, revision_id, actor, "ops-append", payload, now))
        })
    }

    pub fn remove_style(&mut self, req: &StyleRemoveRequest, actor: Option<&str>) -> StoreResult<Edit<PatchRule>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let element_key = require_key(req.element_key.as_deref())?;
        let property = req.property.trim();
        if property.is_empty() {
            return Err(StoreError::validation("Element key and property are required."));
        }
        let breakpoint = Breakpoint::parse_or_default(req.breakpoint.as_deref())?;
        let state = InteractionState::parse_or_default(req.state.as_deref())?;
        let revision_id = self.draft_for(req.project_id, &page_path)?;

        let rule = self.transaction(|tables| {
            tables.remove_rule(revision_id, &element_key, breakpoint, state, property)
        })?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "style-remove",
            json!({ "pagePath": page_path, "elementKey": element_key, "property": property }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: rule,
        })
    }

    pub fn remove_text(&mut self, req: &TextRemoveRequest, actor: Option<&str>) -> StoreResult<Edit<TextPatch>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let element_key = require_key(req.element_key.as_deref())?;
        let text_mode = TextMode::parse_or_default(req.text_mode.as_deref())?;
        let revision_id = self.draft_for(req.project_id, &page_path)?;

        let patch = self.transaction(|tables| tables.remove_text(revision_id, &element_key, text_mode))?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "text-remove",
            json!({ "pagePath": page_path, "elementKey": element_key }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: patch,
        })
    }

    pub fn remove_section(&mut self, req: &SectionRemoveRequest, actor: Option<&str>) -> StoreResult<Edit<SectionInstance>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        if req.instance_id <= 0 {
            return Err(StoreError::validation("Instance id is required."));
        }
        let revision_id = self.draft_for(req.project_id, &page_path)?;

        let section = self.transaction(|tables| tables.remove_section(revision_id, req.instance_id))?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "section-remove",
            json!({ "pagePath": page_path, "instanceId": section.id }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: section.target_element_key.clone(),
            row: section,
        })
    }

    pub fn unbind_action(&mut self, req: &UnbindActionRequest, actor: Option<&str>) -> StoreResult<Edit<ActionBinding>> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let element_key = require_key(req.element_key.as_deref())?;
        let revision_id = self.draft_for(req.project_id, &page_path)?;

        let binding = self.transaction(|tables| tables.remove_binding(revision_id, &element_key))?;

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "action-unbind",
            json!({ "pagePath": page_path, "elementKey": element_key }),
        );
        Ok(Edit {
            page_path,
            revision_id,
            element_key: Some(element_key),
            row: binding,
        })
    }

    /// Dry-run the draft binding of one element. The workflow engine is not
    /// called; only the binding's own wiring is checked.
    pub fn simulate_binding(&mut self, req: &UnbindActionRequest, actor: Option<&str>) -> StoreResult<BindingSimulation> {
        require_project(req.project_id)?;
        let page_path = normalize_page_path(req.page_path.as_deref());
        let element_key = require_key(req.element_key.as_deref())?;
        let revision_id = self.draft_for(req.project_id, &page_path)?;
        let binding = self
            .tables()
            .action_bindings
            .iter()
            .find(|b| b.revision_id == revision_id && b.element_key == element_key)
            .cloned()
            .ok_or_else(|| StoreError::not_found("No binding found for selected element."))?;

        let now = Utc::now();
        let seed = format!("{}|{}|{}", revision_id, element_key, now.timestamp_nanos_opt().unwrap_or_default());
        let mut simulation = BindingSimulation {
            ok: true,
            trace_id: sha256_hex(seed.as_bytes())[..32].to_ascii_lowercase(),
            execution_path: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        if binding.action_type.runs_workflow() {
            if trimmed(binding.workflow_id.as_deref()).is_none() {
                simulation.ok = false;
                simulation.errors.push("Workflow is missing for this binding.".to_string());
            }
            simulation.execution_path.push("workflow");
        }
        if binding.action_type.navigates() {
            if trimmed(binding.navigate_url.as_deref()).is_none() {
                simulation.ok = false;
                simulation.errors.push("Navigate URL is missing.".to_string());
            }
            simulation.execution_path.push("navigate");
        }
        let resolved = self
            .tables()
            .element_map(revision_id, &element_key)
            .is_some_and(ElementMap::is_resolved);
        if !resolved {
            simulation
                .warnings
                .push("Bound element has no resolved selector.".to_string());
        }

        self.audit(
            req.project_id,
            Some(revision_id),
            actor,
            "binding-test",
            json!({
                "traceId": simulation.trace_id,
                "elementKey": element_key,
                "actionType": binding.action_type,
                "ok": simulation.ok,
                "errors": simulation.errors,
            }),
        );
        Ok(simulation)
    }
}
