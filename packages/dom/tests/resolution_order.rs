//! Resolution behaviour against realistic uploaded pages.

use dve_dom::{parse_document, resolve, resolve_element, selector_candidates, ResolvedVia};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Acme</title></head>
<body>
  <nav class="menu"><a href="/">Home</a><a href="/pricing" class="cta">Pricing</a></nav>
  <main>
    <section id="hero"><h1>Build faster</h1><p>Tagline</p></section>
    <section class="features"><h2>Features</h2></section>
  </main>
</body>
</html>"#;

#[test]
fn test_only_middle_candidate_matches() {
    let doc = parse_document(PAGE);
    let candidates = selector_candidates(["#missing", "section.features h2", ".also-missing"]);
    let found = resolve(&doc, &candidates).expect("middle candidate should resolve");
    assert_eq!(found.via, ResolvedVia::Selector("section.features h2".into()));
    assert_eq!(doc.text_content(found.node), "Features");
}

#[test]
fn test_primary_beats_fallbacks() {
    let doc = parse_document(PAGE);
    let candidates = selector_candidates(["#hero h1", "h1", "main h1"]);
    let found = resolve(&doc, &candidates).unwrap();
    assert_eq!(found.via, ResolvedVia::Selector("#hero h1".into()));
}

#[test]
fn test_marker_survives_selector_drift() {
    let mut doc = parse_document(PAGE);
    let candidates = selector_candidates(["nav a.cta"]);
    let found = resolve(&doc, &candidates).unwrap();
    doc.set_attr(found.node, "data-bugence-node", "el_cta");

    // a page script renames the class
    doc.set_attr(found.node, "class", "button");
    assert!(resolve(&doc, &candidates).is_none());

    let again = resolve_element(&doc, Some("el_cta"), &candidates).unwrap();
    assert_eq!(again.node, found.node);
    assert_eq!(again.via, ResolvedVia::Marker);
}

#[test]
fn test_nothing_resolves() {
    let doc = parse_document(PAGE);
    let candidates = selector_candidates(["#nope", "", "  "]);
    assert_eq!(candidates.len(), 1);
    assert!(resolve_element(&doc, Some("el_unknown"), &candidates).is_none());
}
