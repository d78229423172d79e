//! lqip DOM - Document Object Model
//!
//! Arena-based element tree that the progressive image engine reads and
//! mutates: attributes, inline and cascaded style, layout geometry written by
//! the host, selector queries and viewport intersection.

mod attributes;
mod document;
mod geometry;
mod node;
mod observer;
mod selector;
mod style;
mod tree;

pub use attributes::{Attr, NamedNodeMap};
pub use document::Document;
pub use geometry::{DOMRect, ElementGeometry};
pub use node::{ElementData, Node, NodeData};
pub use observer::{IntersectionObserver, IntersectionObserverEntry};
pub use selector::{Compound, Selector};
pub use style::{StyleDeclaration, initial_value, split_top_level};
pub use tree::DomTree;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root (document) node ID
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check that this is not the sentinel
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// DOM error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Node not found: {0:?}")]
    NotFound(NodeId),

    #[error("Node is not an element: {0:?}")]
    NotAnElement(NodeId),

    #[error("Node has no parent: {0:?}")]
    NoParent(NodeId),
}
