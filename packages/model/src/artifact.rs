//! Wire formats read by the client runtime.
//!
//! The overlay artifact joins every patch row with the selector context of
//! its element map so the runtime can resolve without a second lookup.

use crate::payload::{ActionBehavior, SectionMarkup};
use crate::records::{
    ActionBinding, ElementMap, PageRevision, PatchRule, SectionInstance, TextPatch,
};
use crate::types::{
    ActionType, Breakpoint, InsertMode, InteractionState, ProjectId, RevisionId, TextMode,
    TriggerEvent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CONFIG_SCRIPT_ID: &str = "bugence-dve-config";
pub const RUNTIME_SCRIPT_ID: &str = "bugence-dve-runtime";
pub const STYLE_ELEMENT_ID: &str = "bugence-dve-style";
pub const NODE_MARKER_ATTR: &str = "data-bugence-node";
pub const SECTION_MARKER_ATTR: &str = "data-bugence-dve-section";

/// Built overlay for one revision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayArtifact {
    pub revision_id: RevisionId,
    pub page_path: String,
    pub generated_at_utc: Option<DateTime<Utc>>,
    pub element_maps: Vec<ArtifactElementMap>,
    pub rules: Vec<ArtifactRule>,
    pub text_patches: Vec<ArtifactTextPatch>,
    pub section_instances: Vec<ArtifactSectionInstance>,
    pub action_bindings: Vec<ArtifactActionBinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactElementMap {
    pub element_key: String,
    pub primary_selector: String,
    pub fallback_selectors: Vec<String>,
    pub fingerprint_hash: String,
    pub anchor_hash: String,
    pub confidence: f64,
    pub last_resolved_selector: Option<String>,
    pub last_resolved_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactRule {
    pub id: i64,
    pub element_key: String,
    pub selector: String,
    pub fallback_selectors: Vec<String>,
    pub rule_type: String,
    pub breakpoint: Breakpoint,
    pub state: InteractionState,
    pub property: String,
    pub value: String,
    pub priority: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactTextPatch {
    pub id: i64,
    pub element_key: String,
    pub selector: String,
    pub fallback_selectors: Vec<String>,
    pub text_mode: TextMode,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactSectionInstance {
    pub id: i64,
    pub template_id: String,
    pub insert_mode: InsertMode,
    pub target_element_key: Option<String>,
    pub selector: String,
    pub fallback_selectors: Vec<String>,
    pub markup: SectionMarkup,
}

impl ArtifactSectionInstance {
    /// Guard id stamped on the hidden marker node
    pub fn instance_id(&self) -> String {
        if self.id > 0 {
            return self.id.to_string();
        }
        let template = if self.template_id.is_empty() {
            "section"
        } else {
            self.template_id.as_str()
        };
        let target = self
            .target_element_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or("root");
        format!("{}_{}", template, target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactActionBinding {
    #[serde(default)]
    pub id: i64,
    pub element_key: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub fallback_selectors: Vec<String>,
    pub action_type: ActionType,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub navigate_url: Option<String>,
    #[serde(default)]
    pub trigger_event: TriggerEvent,
    #[serde(default = "empty_behavior")]
    pub behavior: ActionBehavior,
}

fn empty_behavior() -> ActionBehavior {
    ActionBehavior::Opaque(serde_json::Value::Object(Default::default()))
}

/// Embedded `<script id="bugence-dve-config">` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    pub overlay_path: String,
    pub debug: bool,
    pub project_id: Option<ProjectId>,
    pub revision_id: Option<RevisionId>,
    pub emitted_at_utc: Option<DateTime<Utc>>,
}

/// Rows of one revision, as read from the store
#[derive(Debug, Clone, Copy)]
pub struct RevisionRows<'a> {
    pub revision: &'a PageRevision,
    pub element_maps: &'a [ElementMap],
    pub rules: &'a [PatchRule],
    pub text_patches: &'a [TextPatch],
    pub section_instances: &'a [SectionInstance],
    pub action_bindings: &'a [ActionBinding],
}

impl OverlayArtifact {
    /// Join patch rows with their element maps.
    ///
    /// Keys without a map get an empty selector and no fallbacks; the runtime
    /// then falls back to the node marker attribute.
    pub fn assemble(rows: RevisionRows<'_>, generated_at: DateTime<Utc>) -> Self {
        let by_key: HashMap<String, &ElementMap> = rows
            .element_maps
            .iter()
            .map(|m| (m.element_key.to_ascii_lowercase(), m))
            .collect();
        let context = |key: &str| -> (String, Vec<String>) {
            by_key
                .get(&key.to_ascii_lowercase())
                .map(|m| (m.primary_selector.clone(), m.fallback_selectors.clone()))
                .unwrap_or_default()
        };

        let mut maps: Vec<&ElementMap> = rows.element_maps.iter().collect();
        maps.sort_by_key(|m| m.id);

        Self {
            revision_id: rows.revision.id,
            page_path: rows.revision.page_path.clone(),
            generated_at_utc: Some(generated_at),
            element_maps: maps
                .into_iter()
                .map(|m| ArtifactElementMap {
                    element_key: m.element_key.clone(),
                    primary_selector: m.primary_selector.clone(),
                    fallback_selectors: m.fallback_selectors.clone(),
                    fingerprint_hash: m.fingerprint_hash.clone(),
                    anchor_hash: m.anchor_hash.clone(),
                    confidence: m.confidence,
                    last_resolved_selector: m.last_resolved_selector.clone(),
                    last_resolved_at_utc: m.last_resolved_at_utc,
                })
                .collect(),
            rules: sorted(rows.rules, |r| r.id)
                .map(|r| {
                    let (selector, fallback_selectors) = context(&r.element_key);
                    ArtifactRule {
                        id: r.id,
                        element_key: r.element_key.clone(),
                        selector,
                        fallback_selectors,
                        rule_type: r.rule_type.clone(),
                        breakpoint: r.breakpoint,
                        state: r.state,
                        property: r.property.clone(),
                        value: r.value.clone(),
                        priority: r.priority,
                    }
                })
                .collect(),
            text_patches: sorted(rows.text_patches, |t| t.id)
                .map(|t| {
                    let (selector, fallback_selectors) = context(&t.element_key);
                    ArtifactTextPatch {
                        id: t.id,
                        element_key: t.element_key.clone(),
                        selector,
                        fallback_selectors,
                        text_mode: t.text_mode,
                        content: t.content.clone(),
                    }
                })
                .collect(),
            section_instances: sorted(rows.section_instances, |s| s.id)
                .map(|s| {
                    let (selector, fallback_selectors) =
                        s.target_key().map(&context).unwrap_or_default();
                    ArtifactSectionInstance {
                        id: s.id,
                        template_id: s.template_id.clone(),
                        insert_mode: s.insert_mode,
                        target_element_key: s.target_element_key.clone(),
                        selector,
                        fallback_selectors,
                        markup: s.markup.clone(),
                    }
                })
                .collect(),
            action_bindings: sorted(rows.action_bindings, |b| b.id)
                .map(|b| {
                    let (selector, fallback_selectors) = context(&b.element_key);
                    ArtifactActionBinding {
                        id: b.id,
                        element_key: b.element_key.clone(),
                        selector,
                        fallback_selectors,
                        action_type: b.action_type,
                        workflow_id: b.workflow_id.clone(),
                        navigate_url: b.navigate_url.clone(),
                        trigger_event: b.trigger_event,
                        behavior: b.behavior.clone(),
                    }
                })
                .collect(),
        }
    }
}

fn sorted<T, F>(rows: &[T], key: F) -> impl Iterator<Item = &T>
where
    F: Fn(&T) -> i64,
{
    let mut refs: Vec<&T> = rows.iter().collect();
    refs.sort_by_key(|row| key(*row));
    refs.into_iter()
}
