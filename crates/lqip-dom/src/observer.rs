//! Intersection Observer
//!
//! Reports when observed elements enter or leave the viewport.

use std::collections::BTreeMap;

use crate::{DOMRect, DomTree, NodeId};

/// Intersection observer entry
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionObserverEntry {
    pub target: NodeId,
    pub bounding_client_rect: DOMRect,
    pub intersection_ratio: f64,
    pub is_intersecting: bool,
}

/// Intersection observer rooted at the viewport
#[derive(Debug, Default)]
pub struct IntersectionObserver {
    /// Last reported intersecting state per target (None until first check)
    observed: BTreeMap<NodeId, Option<bool>>,
}

impl IntersectionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe an element; re-observing resets its reported state
    pub fn observe(&mut self, target: NodeId) {
        self.observed.insert(target, None);
    }

    /// Stop observing
    pub fn unobserve(&mut self, target: NodeId) {
        self.observed.remove(&target);
    }

    /// Disconnect all
    pub fn disconnect(&mut self) {
        self.observed.clear();
    }

    pub fn is_observing(&self, target: NodeId) -> bool {
        self.observed.contains_key(&target)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Compare every observed element against `viewport`.
    ///
    /// The first check of a target always produces an entry; afterwards only
    /// changes of the intersecting state do. Detached targets are skipped.
    pub fn check_intersections(
        &mut self,
        tree: &DomTree,
        viewport: DOMRect,
    ) -> Vec<IntersectionObserverEntry> {
        let mut entries = Vec::new();

        for (&target, last) in self.observed.iter_mut() {
            if !tree.is_connected(target) {
                continue;
            }
            let Some(geometry) = tree.geometry(target) else {
                continue;
            };
            let rect = geometry.bounding_client_rect();
            let ratio = match rect.intersection(&viewport) {
                Some(hit) if rect.area() > 0.0 => hit.area() / rect.area(),
                _ => 0.0,
            };
            // Zero-area boxes count as visible when they sit inside the viewport
            let is_intersecting = ratio > 0.0
                || (rect.area() == 0.0 && viewport.contains_point(rect.x, rect.y));

            if *last != Some(is_intersecting) {
                *last = Some(is_intersecting);
                entries.push(IntersectionObserverEntry {
                    target,
                    bounding_client_rect: rect,
                    intersection_ratio: ratio,
                    is_intersecting,
                });
            }
        }

        if !entries.is_empty() {
            tracing::trace!("{} intersection change(s)", entries.len());
        }
        entries
    }
}
