//! Text patches: content replacement on the resolved node.

use crate::overlay::{ElementIndex, Target};
use crate::trace::{TraceKind, Tracer};
use dve_dom::{inner_html, set_inner_html, Document};
use dve_model::{ArtifactTextPatch, TextMode};
use serde_json::json;

/// Apply every patch whose element resolves. Returns the keys that did not.
pub fn apply_text(
    doc: &mut Document,
    index: &mut ElementIndex,
    patches: &[ArtifactTextPatch],
    tracer: &mut Tracer,
) -> (usize, Vec<String>) {
    let mut applied = 0;
    let mut unresolved = Vec::new();
    for patch in patches {
        let target = Target::new(Some(patch.element_key.as_str()), &patch.selector, &patch.fallback_selectors);
        let Some(node) = index.resolve(doc, target, tracer) else {
            unresolved.push(patch.element_key.clone());
            continue;
        };
        match patch.text_mode {
            TextMode::Plain => doc.set_text_content(node, &patch.content),
            TextMode::Html if inner_html(doc, node) == patch.content => {}
            TextMode::Html => set_inner_html(doc, node, &patch.content),
        }
        applied += 1;
        tracer.emit(TraceKind::TextApplied, json!({ "elementKey": patch.element_key }));
    }
    (applied, unresolved)
}
