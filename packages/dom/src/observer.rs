//! Mutation observation.
//!
//! Records carry the marker key of the nearest stamped node so observers can
//! track affected elements without reading the document back while it is
//! being mutated.

use crate::dom::{Document, NodeId};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    /// Lowercase attribute name
    Attributes(String),
    CharacterData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub marker_key: Option<String>,
}

/// Source of mutation notifications for a live document
pub trait DomObserver {
    fn on_mutation(&self, callback: Box<dyn FnMut(&MutationRecord)>);
}

pub type SharedDocument = Rc<RefCell<Document>>;

impl DomObserver for SharedDocument {
    fn on_mutation(&self, callback: Box<dyn FnMut(&MutationRecord)>) {
        self.borrow_mut().observe(callback);
    }
}
