//! Subject Variants
//!
//! One replacement state machine serves both kinds of subject. What differs
//! between an inline `<img>` and a CSS-background element is captured by a
//! small table of accessors and flags.

use lqip_dom::{DomError, DomTree, NodeId, split_top_level};

use crate::RenderSize;
use crate::responsive::INITIALIZED_ATTR;

/// Kind of optimizable element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    /// `<img>` whose `src` is the placeholder
    InlinePicture,
    /// Any element whose `background-image` is the placeholder
    CssBackground,
}

/// Capability descriptor for a subject kind
#[derive(Debug, Clone, Copy)]
pub struct SubjectVariant {
    pub kind: SubjectKind,
    /// Rendered size used to size the full-resolution request
    pub read_size: fn(&DomTree, NodeId) -> Option<RenderSize>,
    /// URL the element currently displays
    pub read_source: fn(&DomTree, NodeId) -> Option<String>,
    /// Placeholder URL; `None` aborts the session
    pub read_placeholder_url: fn(&DomTree, NodeId) -> Option<String>,
    /// Point the element itself at a URL
    pub write_source: fn(&mut DomTree, NodeId, &str) -> Result<(), DomError>,
    /// Point a staging clone at a URL; the last argument names the draft
    /// attribute read by responsive-source negotiation
    pub stage_source: fn(&mut DomTree, NodeId, &str, &str) -> Result<(), DomError>,
    /// Clone is made without children (decorative containers hold content)
    pub strips_clone_content: bool,
    /// Subject's own background is cleared while staged
    pub clears_subject_background: bool,
    /// Parent is made a positioning context while staged
    pub pins_parent: bool,
}

impl SubjectVariant {
    pub const INLINE: SubjectVariant = SubjectVariant {
        kind: SubjectKind::InlinePicture,
        read_size: inline_size,
        read_source: inline_source,
        read_placeholder_url: inline_source,
        write_source: write_inline_source,
        stage_source: stage_inline_source,
        strips_clone_content: false,
        clears_subject_background: false,
        pins_parent: false,
    };

    pub const BACKGROUND: SubjectVariant = SubjectVariant {
        kind: SubjectKind::CssBackground,
        read_size: outer_size,
        read_source: background_source,
        read_placeholder_url: background_source,
        write_source: write_background_source,
        stage_source: stage_background_source,
        strips_clone_content: true,
        clears_subject_background: true,
        pins_parent: true,
    };

    pub fn for_kind(kind: SubjectKind) -> &'static SubjectVariant {
        match kind {
            SubjectKind::InlinePicture => &Self::INLINE,
            SubjectKind::CssBackground => &Self::BACKGROUND,
        }
    }
}

/// Precise (fractional) bounding box, so the swap does not slide
fn inline_size(tree: &DomTree, id: NodeId) -> Option<RenderSize> {
    let rect = tree.geometry(id)?.bounding_client_rect();
    Some(RenderSize::new(rect.width, rect.height))
}

/// Border-box size
fn outer_size(tree: &DomTree, id: NodeId) -> Option<RenderSize> {
    let geometry = tree.geometry(id)?;
    Some(RenderSize::new(geometry.offset_width, geometry.offset_height))
}

fn inline_source(tree: &DomTree, id: NodeId) -> Option<String> {
    tree.attribute(id, "src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn background_source(tree: &DomTree, id: NodeId) -> Option<String> {
    background_image_url(tree.computed_style(id, "background-image"))
}

fn write_inline_source(tree: &mut DomTree, id: NodeId, url: &str) -> Result<(), DomError> {
    tree.set_attribute(id, "src", url)
}

fn stage_inline_source(
    tree: &mut DomTree,
    id: NodeId,
    url: &str,
    draft_attr: &str,
) -> Result<(), DomError> {
    // `src` is set as well for hosts without responsive-source negotiation
    tree.set_attribute(id, draft_attr, url)?;
    tree.remove_attribute(id, INITIALIZED_ATTR);
    tree.set_attribute(id, "src", url)
}

fn write_background_source(tree: &mut DomTree, id: NodeId, url: &str) -> Result<(), DomError> {
    tree.set_style(id, "background-image", &format!("url('{url}')"))
}

fn stage_background_source(
    tree: &mut DomTree,
    id: NodeId,
    url: &str,
    _draft_attr: &str,
) -> Result<(), DomError> {
    tree.set_style(id, "background-image", &format!("url(\"{url}\")"))
}

/// URL of the first layer of a `background-image` value.
///
/// `none`, gradients and empty values yield `None`.
pub fn background_image_url(value: &str) -> Option<String> {
    let first = split_top_level(value, ',').into_iter().next()?.trim();
    let lower = first.to_ascii_lowercase();
    if !lower.starts_with("url(") || !first.ends_with(')') {
        return None;
    }
    let inner = first[4..first.len() - 1].trim();
    let inner = ['"', '\'']
        .iter()
        .find_map(|&q| inner.strip_prefix(q).and_then(|s| s.strip_suffix(q)))
        .unwrap_or(inner)
        .trim();
    (!inner.is_empty()).then(|| inner.to_string())
}
