//! Visibility Gate
//!
//! Defers a session until its subject is first reported intersecting the
//! viewport, and fires at most once.

use lqip_dom::{DomTree, IntersectionObserver, NodeId};

use crate::SubjectKind;

/// One-shot visibility trigger for a not-yet-started session
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    subject: NodeId,
    kind: SubjectKind,
    triggered: bool,
}

impl VisibilityGate {
    pub fn new(subject: NodeId, kind: SubjectKind) -> Self {
        Self {
            subject,
            kind,
            triggered: false,
        }
    }

    pub fn subject(&self) -> NodeId {
        self.subject
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Register the subject with the viewport observer
    pub fn observe(&self, observer: &mut IntersectionObserver) {
        observer.observe(self.subject);
    }

    /// Handle one intersection notification.
    ///
    /// Returns `true` exactly once: on the first intersecting notification
    /// while the subject does not yet carry `processed_attr`. Firing sets the
    /// marker and stops observing the subject.
    pub fn on_intersection(
        &mut self,
        tree: &mut DomTree,
        observer: &mut IntersectionObserver,
        is_intersecting: bool,
        processed_attr: &str,
    ) -> bool {
        if self.triggered || !is_intersecting {
            return false;
        }
        if tree.has_attribute(self.subject, processed_attr) {
            // Someone else already claimed the element
            self.triggered = true;
            observer.unobserve(self.subject);
            return false;
        }

        self.triggered = true;
        observer.unobserve(self.subject);
        if let Err(err) = tree.set_attribute(self.subject, processed_attr, "true") {
            tracing::warn!("Cannot mark {:?} as processed: {}", self.subject, err);
            return false;
        }
        tracing::debug!("Subject {:?} became visible", self.subject);
        true
    }
}
