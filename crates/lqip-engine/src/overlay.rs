//! Overlay Positioning
//!
//! Places a staging clone exactly over its source element, and makes the
//! minimal positioning changes that absolute placement depends on.

use lqip_dom::{DomError, DomTree, NodeId};

/// Absolute placement of an overlay, in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl OverlayRect {
    /// Write the placement into `node`'s inline style
    pub fn apply(&self, tree: &mut DomTree, node: NodeId) -> Result<(), DomError> {
        tree.set_style(node, "position", "absolute")?;
        tree.set_style(node, "top", &px(self.top))?;
        tree.set_style(node, "left", &px(self.left))?;
        tree.set_style(node, "width", &px(self.width))?;
        tree.set_style(node, "height", &px(self.height))?;
        Ok(())
    }
}

/// Format a length, trimming the fraction when it is whole
fn px(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}px", value as i64)
    } else {
        format!("{value}px")
    }
}

/// Region occupied by `source`: its offset position relative to the
/// positioned ancestor, and its rendered box size.
pub fn compute_overlay_rect(tree: &DomTree, source: NodeId) -> Option<OverlayRect> {
    let geometry = tree.geometry(source)?;
    let rect = geometry.bounding_client_rect();
    Some(OverlayRect {
        top: geometry.offset_top,
        left: geometry.offset_left,
        width: rect.width,
        height: rect.height,
    })
}

/// One inline value replaced by `ensure_positioning_context`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Override {
    node: NodeId,
    property: &'static str,
    previous: Option<String>,
}

/// Inline values replaced by `ensure_positioning_context`, for restoring.
///
/// Only properties that were actually changed are recorded, so a second
/// `ensure` on an already prepared element yields an empty context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositioningContext {
    overrides: Vec<Override>,
    /// Parent made the containing block of the overlay
    parent: Option<NodeId>,
}

impl PositioningContext {
    /// Nothing was changed
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn pinned_parent(&self) -> Option<NodeId> {
        self.parent
            .filter(|&parent| self.overrides.iter().any(|o| o.node == parent))
    }

    fn record(&mut self, node: NodeId, property: &'static str, previous: Option<String>) {
        self.overrides.push(Override {
            node,
            property,
            previous,
        });
    }

    /// Put every overridden inline value back exactly
    pub fn restore(self, tree: &mut DomTree) {
        for o in self.overrides.into_iter().rev() {
            tree.restore_style(o.node, o.property, o.previous.as_deref());
        }
    }
}

/// Make `source` stack above an absolutely positioned sibling and, when
/// `pin_parent` is set, make its parent the containing block for that
/// sibling.
///
/// Any subject that is not `absolute` becomes `relative`. The parent only
/// changes when it is `static`, and an `inline` parent is made `block` so
/// its box can hold the overlay. Values already in place are not touched,
/// which makes repeated calls no-ops.
pub fn ensure_positioning_context(
    tree: &mut DomTree,
    source: NodeId,
    pin_parent: bool,
) -> PositioningContext {
    let mut context = PositioningContext::default();

    let position = tree.computed_style(source, "position");
    if position != "absolute" && position != "relative" {
        force(tree, &mut context, source, "position", "relative");
    }

    if pin_parent {
        if let Some(parent) = tree.parent(source).filter(|&p| tree.element(p).is_some()) {
            context.parent = Some(parent);
            if tree.computed_style(parent, "position") == "static" {
                force(tree, &mut context, parent, "position", "relative");
            }
            if tree.computed_style(parent, "display") == "inline" {
                force(tree, &mut context, parent, "display", "block");
            }
        }
    }

    context
}

/// Set an inline value, recording the one it replaced
fn force(
    tree: &mut DomTree,
    context: &mut PositioningContext,
    id: NodeId,
    property: &'static str,
    value: &str,
) {
    let previous = tree.inline_style(id, property).map(str::to_string);
    match tree.set_style(id, property, value) {
        Ok(()) => context.record(id, property, previous),
        Err(err) => tracing::debug!("Cannot set {} on {:?}: {}", property, id, err),
    }
}
