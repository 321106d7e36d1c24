//! # DVE DOM
//!
//! A small in-memory document model for applying overlays outside a browser:
//! a forgiving HTML parser and serializer, a CSS selector engine lexed with
//! `logos`, the selector resolver with its fallback chain, and mutation
//! observation.

pub mod dom;
pub mod error;
pub mod html;
pub mod observer;
pub mod resolver;
pub mod selector;

pub use dom::{Document, ElementData, NodeData, NodeId};
pub use error::{SelectorError, SelectorResult};
pub use html::{inner_html, outer_html, parse_document, parse_fragment, serialize, set_inner_html};
pub use observer::{DomObserver, MutationKind, MutationRecord, SharedDocument};
pub use resolver::{resolve, resolve_element, selector_candidates, Resolution, ResolvedVia};
pub use selector::{parse_selector, SelectorList};
