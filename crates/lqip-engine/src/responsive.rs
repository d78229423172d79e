//! Responsive Sources
//!
//! Sessions stage a draft source attribute on their clone and then ask for a
//! single document-wide rescan. Whatever negotiates responsive sources (a
//! browser library, a server-side renderer) plugs in behind this trait.

use lqip_dom::{DomError, DomTree, NodeId};

use crate::{Axis, ImageUrl};

/// Attribute marking an element whose draft source has been negotiated
pub const INITIALIZED_ATTR: &str = "ix-initialized";

/// Negotiates responsive sources for every element with a pending draft
pub trait ResponsiveSources {
    /// Scan the whole tree once; returns how many elements were initialized
    fn rescan(&mut self, tree: &mut DomTree) -> usize;
}

/// Default negotiator.
///
/// Promotes the draft attribute into `src` plus a `srcset`: a width ladder
/// for fluid images, or device-pixel-ratio variants when the draft pins both
/// dimensions. A missing `sizes` defaults to `100vw`.
#[derive(Debug, Clone)]
pub struct DraftSourceActivator {
    draft_attr: String,
    widths: Vec<u32>,
}

const DEFAULT_WIDTHS: &[u32] = &[320, 640, 960, 1280, 1920, 2560];
const DPR_STEPS: &[u32] = &[1, 2, 3, 4, 5];

impl DraftSourceActivator {
    pub fn new(draft_attr: &str) -> Self {
        Self {
            draft_attr: draft_attr.to_string(),
            widths: DEFAULT_WIDTHS.to_vec(),
        }
    }

    /// Replace the width ladder used for fluid `srcset`s
    pub fn with_widths(mut self, widths: Vec<u32>) -> Self {
        self.widths = widths;
        self
    }

    pub fn draft_attr(&self) -> &str {
        &self.draft_attr
    }

    fn srcset(&self, draft: &ImageUrl) -> String {
        if draft.has_param(Axis::Width.key()) && draft.has_param(Axis::Height.key()) {
            DPR_STEPS
                .iter()
                .map(|dpr| format!("{} {dpr}x", draft.with_param("dpr", &dpr.to_string())))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.widths
                .iter()
                .map(|&w| format!("{} {w}w", draft.with_dimension(Axis::Width, w)))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    fn activate(&self, tree: &mut DomTree, id: NodeId) -> Result<bool, DomError> {
        let Some(raw) = tree.attribute(id, &self.draft_attr).map(str::to_string) else {
            return Ok(false);
        };
        let srcset = self.srcset(&ImageUrl::parse(&raw));

        tree.set_attribute(id, "src", &raw)?;
        tree.set_attribute(id, "srcset", &srcset)?;
        if !tree.has_attribute(id, "sizes") {
            tree.set_attribute(id, "sizes", "100vw")?;
        }
        tree.set_attribute(id, INITIALIZED_ATTR, "")?;
        Ok(true)
    }
}

impl ResponsiveSources for DraftSourceActivator {
    fn rescan(&mut self, tree: &mut DomTree) -> usize {
        let pending: Vec<NodeId> = tree
            .descendants(tree.root())
            .into_iter()
            .filter(|&id| {
                tree.has_attribute(id, &self.draft_attr) && !tree.has_attribute(id, INITIALIZED_ATTR)
            })
            .collect();

        let count = pending
            .into_iter()
            .filter(|&id| match self.activate(tree, id) {
                Ok(activated) => activated,
                Err(err) => {
                    tracing::warn!("Cannot initialize responsive source: {}", err);
                    false
                }
            })
            .count();
        if count > 0 {
            tracing::debug!("Responsive sources initialized for {} element(s)", count);
        }
        count
    }
}
