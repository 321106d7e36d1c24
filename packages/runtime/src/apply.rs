//! One full apply pass: styles, text, sections, then bindings.

use crate::bindings::{apply_bindings, HandlerRegistry};
use crate::overlay::Overlay;
use crate::sections::apply_sections;
use crate::styles::{apply_styles, build_css};
use crate::text::apply_text;
use crate::trace::{TraceKind, Tracer};
use dve_dom::Document;
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub style_rules: usize,
    pub texts: usize,
    /// Newly inserted this pass
    pub sections: usize,
    pub bindings: usize,
    /// Element keys of text patches and bindings that did not resolve
    pub unresolved: Vec<String>,
}

/// Loaded overlay plus everything the runtime keeps between passes
#[derive(Debug)]
pub struct Applier {
    pub overlay: Overlay,
    pub handlers: HandlerRegistry,
    pub tracer: Tracer,
    runner_src: String,
}

impl Applier {
    pub fn new(overlay: Overlay, tracer: Tracer, runner_src: impl Into<String>) -> Self {
        Self {
            overlay,
            handlers: HandlerRegistry::default(),
            tracer,
            runner_src: runner_src.into(),
        }
    }

    /// Apply the whole overlay. Safe to repeat on the same document.
    pub fn apply(&mut self, doc: &mut Document) -> ApplyReport {
        let Self {
            overlay,
            handlers,
            tracer,
            runner_src,
        } = self;
        let mut report = ApplyReport::default();

        let css = build_css(&overlay.index, &overlay.rules);
        if apply_styles(doc, &css).is_some() {
            report.style_rules = overlay.rules.len();
            tracer.emit(TraceKind::StyleApplied, json!({ "rules": report.style_rules }));
        }

        let (texts, unresolved) = apply_text(doc, &mut overlay.index, &overlay.text_patches, tracer);
        report.texts = texts;
        report.unresolved.extend(unresolved);

        report.sections = apply_sections(doc, &mut overlay.index, &overlay.section_instances, tracer);

        let bindings = apply_bindings(
            doc,
            &mut overlay.index,
            &overlay.action_bindings,
            handlers,
            tracer,
            runner_src,
        );
        report.bindings = bindings.attached;
        report.unresolved.extend(bindings.unresolved);
        report
    }
}
