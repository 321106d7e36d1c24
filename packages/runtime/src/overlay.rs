//! Loaded overlay with its element maps indexed for resolution.

use crate::trace::{TraceKind, Tracer};
use chrono::Utc;
use dve_dom::{resolve_element, selector_candidates, Document, NodeId, ResolvedVia};
use dve_model::{
    ArtifactActionBinding, ArtifactElementMap, ArtifactRule, ArtifactSectionInstance,
    ArtifactTextPatch, OverlayArtifact, NODE_MARKER_ATTR,
};
use serde_json::json;
use std::collections::HashMap;

/// What a patch row says about the element it targets
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub element_key: Option<&'a str>,
    pub selector: &'a str,
    pub fallback_selectors: &'a [String],
}

impl<'a> Target<'a> {
    pub fn new(element_key: Option<&'a str>, selector: &'a str, fallback_selectors: &'a [String]) -> Self {
        Self {
            element_key: element_key.filter(|k| !k.is_empty()),
            selector,
            fallback_selectors,
        }
    }
}

/// Element maps by key, updated as elements resolve
#[derive(Debug, Clone, Default)]
pub struct ElementIndex {
    maps: Vec<ArtifactElementMap>,
    by_key: HashMap<String, usize>,
}

impl ElementIndex {
    pub fn new(maps: Vec<ArtifactElementMap>) -> Self {
        let by_key = maps
            .iter()
            .enumerate()
            .map(|(at, map)| (map.element_key.to_ascii_lowercase(), at))
            .collect();
        Self { maps, by_key }
    }

    pub fn get(&self, element_key: &str) -> Option<&ArtifactElementMap> {
        self.by_key
            .get(&element_key.to_ascii_lowercase())
            .map(|at| &self.maps[*at])
    }

    /// Entry selector, map primary, entry fallbacks, map fallbacks
    pub fn candidates(&self, target: Target<'_>) -> Vec<String> {
        let map = target.element_key.and_then(|key| self.get(key));
        let primary = map.map(|m| m.primary_selector.as_str()).unwrap_or_default();
        let map_fallbacks = map.map(|m| m.fallback_selectors.as_slice()).unwrap_or_default();

        selector_candidates(
            [target.selector, primary]
                .into_iter()
                .chain(target.fallback_selectors.iter().map(String::as_str))
                .chain(map_fallbacks.iter().map(String::as_str)),
        )
    }

    /// Resolve `target` against `doc`.
    ///
    /// A CSS hit stamps the node marker and records the selector on the map.
    pub fn resolve(&mut self, doc: &mut Document, target: Target<'_>, tracer: &mut Tracer) -> Option<NodeId> {
        let candidates = self.candidates(target);
        let Some(found) = resolve_element(doc, target.element_key, &candidates) else {
            tracer.emit(
                TraceKind::ElementUnresolved,
                json!({ "elementKey": target.element_key, "candidates": candidates }),
            );
            return None;
        };

        if let ResolvedVia::Selector(selector) = &found.via {
            if let Some(key) = target.element_key {
                doc.set_attr(found.node, NODE_MARKER_ATTR, key);
                if let Some(at) = self.by_key.get(&key.to_ascii_lowercase()) {
                    let map = &mut self.maps[*at];
                    map.last_resolved_selector = Some(selector.clone());
                    map.last_resolved_at_utc = Some(Utc::now());
                }
            }
        }
        tracer.emit(
            TraceKind::ElementResolved,
            json!({ "elementKey": target.element_key, "selector": found.selector() }),
        );
        Some(found.node)
    }
}

/// Artifact split into its element index and patch lists
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    pub index: ElementIndex,
    pub rules: Vec<ArtifactRule>,
    pub text_patches: Vec<ArtifactTextPatch>,
    pub section_instances: Vec<ArtifactSectionInstance>,
    pub action_bindings: Vec<ArtifactActionBinding>,
}

impl Overlay {
    pub fn new(artifact: OverlayArtifact) -> Self {
        Self {
            index: ElementIndex::new(artifact.element_maps),
            rules: artifact.rules,
            text_patches: artifact.text_patches,
            section_instances: artifact.section_instances,
            action_bindings: artifact.action_bindings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
            && self.text_patches.is_empty()
            && self.section_instances.is_empty()
            && self.action_bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullTransport;
    use dve_dom::parse_document;
    use dve_model::RuntimeConfig;
    use std::rc::Rc;

    fn map(key: &str, primary: &str, fallbacks: &[&str]) -> ArtifactElementMap {
        ArtifactElementMap {
            element_key: key.into(),
            primary_selector: primary.into(),
            fallback_selectors: fallbacks.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn tracer() -> Tracer {
        Tracer::new(&RuntimeConfig::default(), "/trace", Rc::new(NullTransport))
    }

    #[test]
    fn test_candidate_order() {
        let index = ElementIndex::new(vec![map("hero", "#hero", &[".hero", "h1"])]);
        let entry_fallbacks = vec![".banner".to_string(), "h1".to_string()];
        let candidates = index.candidates(Target::new(Some("HERO"), "#top", &entry_fallbacks));
        assert_eq!(candidates, vec!["#top", "#hero", ".banner", "h1", ".hero"]);
    }

    #[test]
    fn test_resolve_stamps_marker_and_records_selector() {
        let mut doc = parse_document(r#"<h1 class="hero">Hi</h1>"#);
        let mut index = ElementIndex::new(vec![map("hero", "#gone", &[".hero"])]);
        let node = index
            .resolve(&mut doc, Target::new(Some("hero"), "", &[]), &mut tracer())
            .unwrap();
        assert_eq!(doc.attr(node, NODE_MARKER_ATTR), Some("hero"));
        assert_eq!(index.get("hero").unwrap().last_resolved_selector.as_deref(), Some(".hero"));
    }

    #[test]
    fn test_marker_keeps_resolving_after_selector_drift() {
        let mut doc = parse_document(r#"<h1 class="hero">Hi</h1>"#);
        let mut index = ElementIndex::new(vec![map("hero", ".hero", &[])]);
        let node = index
            .resolve(&mut doc, Target::new(Some("hero"), "", &[]), &mut tracer())
            .unwrap();
        doc.set_attr(node, "class", "renamed");
        let again = index.resolve(&mut doc, Target::new(Some("hero"), "", &[]), &mut tracer());
        assert_eq!(again, Some(node));
    }
}
