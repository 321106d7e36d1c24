//! Style rules as one generated stylesheet.
//!
//! ```css
//! #hero{color: red;}
//! @media (min-width: 768px) and (max-width: 1024px){#hero:hover{color: blue;}}
//! ```

use crate::overlay::{ElementIndex, Target};
use dve_dom::{Document, NodeId};
use dve_model::{ArtifactRule, Breakpoint, InteractionState, STYLE_ELEMENT_ID};

struct Bucket<'a> {
    breakpoint: Breakpoint,
    state: InteractionState,
    selector: String,
    declarations: Vec<(&'a str, &'a str)>,
}

/// Group rules by (breakpoint, state, selector) into CSS text.
///
/// Rules with no property or no selector candidate are skipped. Desktop
/// blocks come first, unwrapped; tablet and mobile follow in `@media` blocks.
pub fn build_css(index: &ElementIndex, rules: &[ArtifactRule]) -> String {
    let mut buckets: Vec<Bucket<'_>> = Vec::new();
    for rule in rules {
        let property = rule.property.trim();
        if property.is_empty() {
            continue;
        }
        let target = Target::new(Some(rule.element_key.as_str()), &rule.selector, &rule.fallback_selectors);
        let Some(selector) = index.candidates(target).into_iter().next() else {
            continue;
        };

        let existing = buckets
            .iter_mut()
            .find(|b| b.breakpoint == rule.breakpoint && b.state == rule.state && b.selector == selector);
        match existing {
            Some(bucket) => bucket.declarations.push((property, rule.value.as_str())),
            None => buckets.push(Bucket {
                breakpoint: rule.breakpoint,
                state: rule.state,
                selector,
                declarations: vec![(property, rule.value.as_str())],
            }),
        }
    }

    let mut parts = Vec::new();
    for breakpoint in [Breakpoint::Desktop, Breakpoint::Tablet, Breakpoint::Mobile] {
        let blocks: Vec<String> = buckets
            .iter()
            .filter(|b| b.breakpoint == breakpoint)
            .map(|b| {
                let body: String = b
                    .declarations
                    .iter()
                    .map(|(property, value)| format!("{}: {};", property, value))
                    .collect();
                format!("{}{}{{{}}}", b.selector, b.state.pseudo_class(), body)
            })
            .collect();
        if blocks.is_empty() {
            continue;
        }
        match breakpoint.media_query() {
            None => parts.push(blocks.join("\n")),
            Some(query) => parts.push(format!("@media {}{{{}}}", query, blocks.join("\n"))),
        }
    }
    parts.join("\n")
}

/// Write `css` into the single overlay `<style>` element.
///
/// Empty CSS removes the element. Returns the element when one remains.
pub fn apply_styles(doc: &mut Document, css: &str) -> Option<NodeId> {
    let existing = doc.get_element_by_id(STYLE_ELEMENT_ID);
    if css.is_empty() {
        if let Some(node) = existing {
            doc.remove(node);
        }
        return None;
    }
    if let Some(node) = existing {
        doc.set_text_content(node, css);
        return Some(node);
    }

    let style = doc.create_element("style");
    doc.set_attr(style, "id", STYLE_ELEMENT_ID);
    doc.set_text_content(style, css);
    let parent = doc.head().unwrap_or_else(|| doc.root());
    doc.append_child(parent, style);
    Some(style)
}
