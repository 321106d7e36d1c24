//! Selector resolution with an ordered fallback chain.
//!
//! Candidates are tried in order and the first selector matching at least one
//! element wins; among several matches the first in document order is taken.
//! A candidate that does not parse is skipped. When the whole chain misses,
//! the node marker attribute stamped on a previous resolve is consulted.

use crate::dom::{Document, NodeId};
use crate::selector::parse_selector;
use dve_model::NODE_MARKER_ATTR;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedVia {
    Selector(String),
    Marker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub node: NodeId,
    pub via: ResolvedVia,
}

impl Resolution {
    /// Selector that located the node, if a CSS candidate did
    pub fn selector(&self) -> Option<&str> {
        match &self.via {
            ResolvedVia::Selector(selector) => Some(selector.as_str()),
            ResolvedVia::Marker => None,
        }
    }
}

/// Trim, drop blanks and de-duplicate, keeping first occurrence
pub fn selector_candidates<'a, I>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<String> = Vec::new();
    for part in parts {
        let trimmed = part.trim();
        if trimmed.is_empty() || out.iter().any(|existing| existing == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// First candidate that matches, without marker fallback
pub fn resolve(doc: &Document, candidates: &[String]) -> Option<Resolution> {
    for candidate in candidates {
        let selector = match parse_selector(candidate) {
            Ok(selector) => selector,
            Err(err) => {
                debug!(selector = %candidate, error = %err, "skipping unparseable selector");
                continue;
            }
        };
        if let Some(node) = selector.first_match(doc) {
            return Some(Resolution {
                node,
                via: ResolvedVia::Selector(candidate.clone()),
            });
        }
    }
    None
}

/// Resolve `candidates`, then fall back to `[data-bugence-node="<key>"]`
pub fn resolve_element(
    doc: &Document,
    element_key: Option<&str>,
    candidates: &[String],
) -> Option<Resolution> {
    if let Some(found) = resolve(doc, candidates) {
        return Some(found);
    }
    let key = element_key.filter(|k| !k.is_empty())?;
    doc.find_element(|el| el.attr(NODE_MARKER_ATTR) == Some(key))
        .map(|node| Resolution {
            node,
            via: ResolvedVia::Marker,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_candidates_dedupe_and_trim() {
        let candidates = selector_candidates(["#a", " ", " #a ", ".b", "", ".b", "#c"]);
        assert_eq!(candidates, list(&["#a", ".b", "#c"]));
    }

    #[test]
    fn test_first_matching_candidate_wins() {
        let doc = parse_document(r#"<div id="b">B</div><div class="c">C</div>"#);
        let found = resolve(&doc, &list(&["#a", "#b", ".c"])).unwrap();
        assert_eq!(found.selector(), Some("#b"));
        assert_eq!(doc.text_content(found.node), "B");
    }

    #[test]
    fn test_invalid_candidate_is_skipped() {
        let doc = parse_document(r#"<p class="x">x</p>"#);
        let found = resolve(&doc, &list(&["p:hover", "###", ".x"])).unwrap();
        assert_eq!(found.selector(), Some(".x"));
    }

    #[test]
    fn test_ambiguous_match_takes_document_order() {
        let doc = parse_document("<p>first</p><p>second</p>");
        let found = resolve(&doc, &list(&["p"])).unwrap();
        assert_eq!(doc.text_content(found.node), "first");
    }

    #[test]
    fn test_marker_fallback() {
        let doc = parse_document(r#"<section data-bugence-node="el_1">x</section>"#);
        assert!(resolve(&doc, &list(&["#gone"])).is_none());
        let found = resolve_element(&doc, Some("el_1"), &list(&["#gone"])).unwrap();
        assert_eq!(found.via, ResolvedVia::Marker);
        assert!(resolve_element(&doc, Some("el_2"), &list(&["#gone"])).is_none());
        assert!(resolve_element(&doc, None, &[]).is_none());
    }
}
