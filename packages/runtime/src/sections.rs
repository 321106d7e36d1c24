//! Section insertion guarded by hidden marker nodes.
//!
//! ```text
//! before:       [marker][fragment...][target]
//! after:        [target][marker][fragment...]
//! inside-start: <target>[fragment...][marker]...</target>
//! inside-end:   <target>...[marker][fragment...]</target>
//! ```

use crate::overlay::{ElementIndex, Target};
use crate::trace::{TraceKind, Tracer};
use dve_dom::{parse_fragment, Document, NodeId};
use dve_model::{ArtifactSectionInstance, InsertMode, SECTION_MARKER_ATTR};
use serde_json::json;

pub const SECTION_STYLE_ATTR: &str = "data-bugence-dve-section-style";

fn is_inserted(doc: &Document, instance_id: &str) -> bool {
    doc.find_element(|el| el.attr(SECTION_MARKER_ATTR) == Some(instance_id))
        .is_some()
}

fn insertion_target(
    doc: &mut Document,
    index: &mut ElementIndex,
    instance: &ArtifactSectionInstance,
    tracer: &mut Tracer,
) -> Option<NodeId> {
    let key = instance.target_element_key.as_deref().filter(|k| !k.is_empty());
    let resolved = if key.is_some() || !instance.selector.trim().is_empty() {
        index.resolve(
            doc,
            Target::new(key, &instance.selector, &instance.fallback_selectors),
            tracer,
        )
    } else {
        None
    };
    resolved.or_else(|| doc.first_by_tag("main")).or_else(|| doc.body())
}

/// Insert every section not inserted yet. Returns how many were inserted.
pub fn apply_sections(
    doc: &mut Document,
    index: &mut ElementIndex,
    instances: &[ArtifactSectionInstance],
    tracer: &mut Tracer,
) -> usize {
    let mut inserted = 0;
    for instance in instances {
        let instance_id = instance.instance_id();
        if is_inserted(doc, &instance_id) || instance.markup.html.trim().is_empty() {
            continue;
        }
        let Some(target) = insertion_target(doc, index, instance, tracer) else {
            continue;
        };
        let parent = doc.parent(target);
        let outside = matches!(instance.insert_mode, InsertMode::Before | InsertMode::After);
        if outside && parent.is_none() {
            continue;
        }

        let mut fragment = Vec::new();
        if !instance.markup.css.trim().is_empty() {
            let style = doc.create_element("style");
            doc.set_attr(style, SECTION_STYLE_ATTR, &instance_id);
            doc.set_text_content(style, &instance.markup.css);
            fragment.push(style);
        }
        fragment.extend(parse_fragment(doc, &instance.markup.html));

        let marker = doc.create_element("div");
        doc.set_attr(marker, SECTION_MARKER_ATTR, &instance_id);
        doc.set_attr(marker, "style", "display:none");

        match (instance.insert_mode, parent) {
            (InsertMode::Before, Some(parent)) => {
                doc.insert_before(parent, marker, Some(target));
                doc.insert_all_before(parent, &fragment, Some(target));
            }
            (InsertMode::After, Some(parent)) => {
                let next = doc.next_sibling(target);
                doc.insert_before(parent, marker, next);
                doc.insert_all_before(parent, &fragment, next);
            }
            (InsertMode::InsideStart, _) => {
                let first = doc.children(target).first().copied();
                doc.insert_all_before(target, &fragment, first);
                doc.insert_before(target, marker, first);
            }
            (InsertMode::InsideEnd, _) => {
                doc.append_child(target, marker);
                doc.insert_all_before(target, &fragment, None);
            }
            _ => continue,
        }

        inserted += 1;
        tracer.emit(
            TraceKind::SectionApplied,
            json!({ "id": instance_id, "mode": instance.insert_mode.as_str() }),
        );
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullTransport;
    use dve_dom::{parse_document, serialize};
    use dve_model::{RuntimeConfig, SectionMarkup};
    use std::rc::Rc;

    fn tracer() -> Tracer {
        Tracer::new(&RuntimeConfig::default(), "/trace", Rc::new(NullTransport))
    }

    fn section(id: i64, mode: InsertMode, selector: &str, html: &str) -> ArtifactSectionInstance {
        ArtifactSectionInstance {
            id,
            template_id: "promo".into(),
            insert_mode: mode,
            target_element_key: Some("hero".into()),
            selector: selector.into(),
            markup: SectionMarkup::new(html),
            ..Default::default()
        }
    }

    fn apply(source: &str, instances: &[ArtifactSectionInstance]) -> String {
        let mut doc = parse_document(source);
        apply_sections(&mut doc, &mut ElementIndex::default(), instances, &mut tracer());
        serialize(&doc)
    }

    #[test]
    fn test_insert_modes() {
        let page = r#"<body><h1 id="hero">H</h1></body>"#;
        let marker = |id: u8| format!(r#"<div data-bugence-dve-section="{}" style="display:none"></div>"#, id);
        let hero = r#"<h1 id="hero" data-bugence-node="hero">H</h1>"#;

        assert_eq!(
            apply(page, &[section(1, InsertMode::Before, "#hero", "<p>s</p>")]),
            format!("<body>{}<p>s</p>{}</body>", marker(1), hero)
        );
        assert_eq!(
            apply(page, &[section(2, InsertMode::After, "#hero", "<p>s</p>")]),
            format!("<body>{}{}<p>s</p></body>", hero, marker(2))
        );
        assert_eq!(
            apply(page, &[section(3, InsertMode::InsideStart, "#hero", "<i>s</i>")]),
            format!(
                r#"<body><h1 id="hero" data-bugence-node="hero"><i>s</i>{}H</h1></body>"#,
                marker(3)
            )
        );
        assert_eq!(
            apply(page, &[section(4, InsertMode::InsideEnd, "#hero", "<i>s</i>")]),
            format!(
                r#"<body><h1 id="hero" data-bugence-node="hero">H{}<i>s</i></h1></body>"#,
                marker(4)
            )
        );
    }

    #[test]
    fn test_guarded_against_double_insert() {
        let mut doc = parse_document(r#"<body><h1 id="hero">H</h1></body>"#);
        let instances = [section(5, InsertMode::After, "#hero", "<p>s</p>")];
        let mut index = ElementIndex::default();
        assert_eq!(apply_sections(&mut doc, &mut index, &instances, &mut tracer()), 1);
        let once = serialize(&doc);
        assert_eq!(apply_sections(&mut doc, &mut index, &instances, &mut tracer()), 0);
        assert_eq!(serialize(&doc), once);
    }

    #[test]
    fn test_falls_back_to_main_and_carries_css() {
        let mut instance = section(0, InsertMode::InsideEnd, "#missing", "<p>s</p>");
        instance.markup = instance.markup.with_css(".s{color:red}");
        let html = apply("<body><main><p>m</p></main></body>", &[instance]);
        assert_eq!(
            html,
            concat!(
                r#"<body><main><p>m</p><div data-bugence-dve-section="promo_hero" style="display:none"></div>"#,
                r#"<style data-bugence-dve-section-style="promo_hero">.s{color:red}</style><p>s</p></main></body>"#
            )
        );
    }

    #[test]
    fn test_empty_markup_is_skipped() {
        let page = "<body><main></main></body>";
        assert_eq!(apply(page, &[section(6, InsertMode::InsideEnd, "", " ")]), page);
    }
}
