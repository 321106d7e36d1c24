//! Action bindings and their event handlers.
//!
//! Each bound node gets at most one handler per event type. Binding again
//! replaces the handler for that pair instead of stacking a second one, and
//! a pass drops every handler it did not install, so nodes the host page
//! replaced stop firing.

use crate::host::Navigation;
use crate::overlay::{ElementIndex, Target};
use crate::trace::{TraceKind, Tracer};
use dve_dom::{Document, NodeId};
use dve_model::{ActionType, ArtifactActionBinding};
use serde_json::json;
use std::collections::{HashMap, HashSet};

pub const ACTION_ATTR: &str = "data-bugence-action";
pub const WORKFLOW_ID_ATTR: &str = "data-bugence-workflow-id";
pub const WORKFLOW_RUNNER_ATTR: &str = "data-bugence-dve-workflow-runner";

/// What a bound node does when its event fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundAction {
    pub element_key: String,
    pub action_type: ActionType,
    pub navigation: Option<Navigation>,
    pub workflow_id: Option<String>,
    pub prevent_default: bool,
}

/// Result of dispatching an event to a bound node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub event_type: String,
    pub navigation: Option<Navigation>,
    pub workflow_id: Option<String>,
    pub default_prevented: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<NodeId, HashMap<&'static str, BoundAction>>,
}

impl HandlerRegistry {
    /// Install `action` for `(node, event_type)`, returning the one it replaced
    pub fn set(&mut self, node: NodeId, event_type: &'static str, action: BoundAction) -> Option<BoundAction> {
        self.handlers.entry(node).or_default().insert(event_type, action)
    }

    pub fn get(&self, node: NodeId, event_type: &str) -> Option<&BoundAction> {
        self.handlers.get(&node)?.get(event_type)
    }

    /// Keep only the handlers for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(NodeId, &'static str) -> bool) {
        self.handlers.retain(|node, events| {
            events.retain(|event_type, _| keep(*node, event_type));
            !events.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Add the workflow runner script to the page once.
pub fn ensure_workflow_runner(doc: &mut Document, runner_src: &str) -> NodeId {
    if let Some(existing) = doc.find_element(|el| el.tag == "script" && el.attr(WORKFLOW_RUNNER_ATTR) == Some("true")) {
        return existing;
    }
    let script = doc.create_element("script");
    doc.set_attr(script, "src", runner_src);
    doc.set_attr(script, "defer", "");
    doc.set_attr(script, WORKFLOW_RUNNER_ATTR, "true");
    let parent = doc.head().unwrap_or_else(|| doc.root());
    doc.append_child(parent, script);
    script
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BindingReport {
    pub attached: usize,
    pub unresolved: Vec<String>,
}

/// Stamp and wire every binding whose element resolves.
pub fn apply_bindings(
    doc: &mut Document,
    index: &mut ElementIndex,
    bindings: &[ArtifactActionBinding],
    handlers: &mut HandlerRegistry,
    tracer: &mut Tracer,
    runner_src: &str,
) -> BindingReport {
    let mut report = BindingReport::default();
    let mut needs_runner = false;
    let mut installed: HashSet<(NodeId, &'static str)> = HashSet::new();

    for binding in bindings {
        let target = Target::new(
            Some(binding.element_key.as_str()),
            &binding.selector,
            &binding.fallback_selectors,
        );
        let Some(node) = index.resolve(doc, target, tracer) else {
            report.unresolved.push(binding.element_key.clone());
            continue;
        };
        doc.set_attr(node, ACTION_ATTR, binding.action_type.as_str());

        let navigate_url = trimmed(binding.navigate_url.as_deref()).filter(|_| binding.action_type.navigates());
        let workflow_id = trimmed(binding.workflow_id.as_deref()).filter(|_| binding.action_type.runs_workflow());
        if let Some(workflow_id) = &workflow_id {
            doc.set_attr(node, WORKFLOW_ID_ATTR, workflow_id);
            needs_runner = true;
        }
        if navigate_url.is_none() && workflow_id.is_none() {
            continue;
        }

        let event_type = binding
            .trigger_event
            .event_type_for(doc.tag(node).unwrap_or_default());
        let navigation = navigate_url.map(|url| {
            if binding.behavior.open_in_new_tab() {
                Navigation::NewTab(url)
            } else {
                Navigation::SameTab(url)
            }
        });
        let prevent_default =
            event_type == "submit" || (workflow_id.is_some() && binding.behavior.prevent_default());

        tracer.emit(
            TraceKind::BindingAttached,
            json!({
                "actionType": binding.action_type.as_str(),
                "eventType": event_type,
                "elementKey": binding.element_key,
                "workflowId": workflow_id,
            }),
        );
        installed.insert((node, event_type));
        handlers.set(
            node,
            event_type,
            BoundAction {
                element_key: binding.element_key.clone(),
                action_type: binding.action_type,
                navigation,
                workflow_id,
                prevent_default,
            },
        );
        report.attached += 1;
    }

    handlers.retain(|node, event_type| installed.contains(&(node, event_type)));

    if needs_runner {
        ensure_workflow_runner(doc, runner_src);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullTransport;
    use dve_dom::{parse_document, serialize};
    use dve_model::{ActionBehavior, RuntimeConfig, TriggerEvent};
    use serde_json::json;
    use std::rc::Rc;

    const RUNNER: &str = "/js/workflow-trigger-runner.js";

    fn binding(key: &str, selector: &str, action_type: ActionType) -> ArtifactActionBinding {
        ArtifactActionBinding {
            id: 0,
            element_key: key.into(),
            selector: selector.into(),
            fallback_selectors: Vec::new(),
            action_type,
            workflow_id: Some("wf-1".into()),
            navigate_url: Some("/next".into()),
            trigger_event: TriggerEvent::Auto,
            behavior: ActionBehavior::default_for(action_type),
        }
    }

    fn run(doc: &mut Document, bindings: &[ArtifactActionBinding], handlers: &mut HandlerRegistry) -> BindingReport {
        let mut tracer = Tracer::new(&RuntimeConfig::default(), "/trace", Rc::new(NullTransport));
        apply_bindings(doc, &mut ElementIndex::default(), bindings, handlers, &mut tracer, RUNNER)
    }

    #[test]
    fn test_form_binds_submit_and_prevents_default() {
        let mut doc = parse_document(r#"<head></head><form id="f"></form>"#);
        let mut handlers = HandlerRegistry::default();
        run(&mut doc, &[binding("f", "#f", ActionType::Workflow)], &mut handlers);

        let form = doc.get_element_by_id("f").unwrap();
        let action = handlers.get(form, "submit").unwrap();
        assert!(action.prevent_default);
        assert_eq!(action.workflow_id.as_deref(), Some("wf-1"));
        assert_eq!(action.navigation, None);
        assert!(handlers.get(form, "click").is_none());
        assert_eq!(doc.attr(form, WORKFLOW_ID_ATTR), Some("wf-1"));
        assert_eq!(doc.attr(form, ACTION_ATTR), Some("workflow"));
    }

    #[test]
    fn test_hybrid_is_one_handler_doing_both() {
        let mut doc = parse_document(r#"<a id="cta">Go</a>"#);
        let mut handlers = HandlerRegistry::default();
        let mut hybrid = binding("cta", "#cta", ActionType::Hybrid);
        hybrid.behavior = ActionBehavior::decode(ActionType::Hybrid, Some(json!({ "openInNewTab": true })));
        run(&mut doc, &[hybrid], &mut handlers);

        let node = doc.get_element_by_id("cta").unwrap();
        assert_eq!(handlers.len(), 1);
        let action = handlers.get(node, "click").unwrap();
        assert_eq!(action.navigation, Some(Navigation::NewTab("/next".into())));
        assert_eq!(action.workflow_id.as_deref(), Some("wf-1"));
        assert!(!action.prevent_default);
    }

    #[test]
    fn test_rebinding_replaces_handler() {
        let mut doc = parse_document(r#"<a id="cta">Go</a>"#);
        let mut handlers = HandlerRegistry::default();
        let bindings = [binding("cta", "#cta", ActionType::Navigate)];
        run(&mut doc, &bindings, &mut handlers);
        run(&mut doc, &bindings, &mut handlers);
        assert_eq!(handlers.len(), 1);
    }

    #[test]
    fn test_replaced_node_loses_its_handler() {
        let mut doc = parse_document(r#"<html><head></head><body><a id="cta">Go</a></body></html>"#);
        let mut handlers = HandlerRegistry::default();
        let bindings = [binding("cta", "#cta", ActionType::Navigate)];
        run(&mut doc, &bindings, &mut handlers);

        let old = doc.get_element_by_id("cta").unwrap();
        doc.remove(old);
        let fresh = doc.create_element("a");
        doc.set_attr(fresh, "id", "cta");
        let body = doc.body().unwrap();
        doc.append_child(body, fresh);
        run(&mut doc, &bindings, &mut handlers);

        assert_eq!(handlers.len(), 1);
        assert!(handlers.get(old, "click").is_none());
        assert!(handlers.get(fresh, "click").is_some());
    }

    #[test]
    fn test_unresolved_binding_drops_stale_handler() {
        let mut doc = parse_document(r#"<html><head></head><body><a id="cta">Go</a></body></html>"#);
        let mut handlers = HandlerRegistry::default();
        let bindings = [binding("cta", "#cta", ActionType::Navigate)];
        run(&mut doc, &bindings, &mut handlers);

        let old = doc.get_element_by_id("cta").unwrap();
        doc.remove(old);
        let report = run(&mut doc, &bindings, &mut handlers);
        assert_eq!(report.unresolved, vec!["cta"]);
        assert!(handlers.is_empty());
    }

    #[test]
    fn test_runner_script_added_once() {
        let mut doc = parse_document("<html><head></head><body><a id=\"a\">a</a></body></html>");
        let mut handlers = HandlerRegistry::default();
        let bindings = [binding("a", "#a", ActionType::Workflow)];
        run(&mut doc, &bindings, &mut handlers);
        run(&mut doc, &bindings, &mut handlers);
        let html = serialize(&doc);
        assert_eq!(html.matches(WORKFLOW_RUNNER_ATTR).count(), 1);
        assert!(html.contains(r#"<head><script src="/js/workflow-trigger-runner.js""#));
    }

    #[test]
    fn test_navigate_without_url_only_stamps() {
        let mut doc = parse_document(r#"<a id="a">a</a>"#);
        let mut handlers = HandlerRegistry::default();
        let mut navigate = binding("a", "#a", ActionType::Navigate);
        navigate.navigate_url = Some("  ".into());
        let report = run(&mut doc, &[navigate, binding("gone", "#gone", ActionType::Navigate)], &mut handlers);
        assert_eq!(report.attached, 0);
        assert_eq!(report.unresolved, vec!["gone"]);
        assert!(handlers.is_empty());
        let node = doc.get_element_by_id("a").unwrap();
        assert_eq!(doc.attr(node, ACTION_ATTR), Some("navigate"));
    }
}
