//! Replacement Session
//!
//! Per-element state machine: probe the placeholder, stage a full-resolution
//! clone behind the subject, wait for it to load, crossfade, then write the
//! full-resolution source into the subject and remove every temporary
//! change. Both subject kinds share this machine; `SubjectVariant` supplies
//! what differs.

use lqip_dom::{DomTree, NodeId};

use crate::overlay::{PositioningContext, compute_overlay_rect, ensure_positioning_context};
use crate::{
    BACKGROUND_MARKER_ATTR, DimensionPolicy, EventLoop, INLINE_MARKER_ATTR, ImageUrl, LoadId,
    LoadOutcome, LoadQueue, LoadTarget, OptimizeError, ResponsiveSources, STAGING_CLASS,
    SubjectKind, SubjectVariant, Task, TimerId,
};

/// Session handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Init,
    /// Waiting for the off-DOM probe of the placeholder URL
    AwaitingPlaceholderLoad,
    /// Clone inserted behind the subject
    Staged,
    /// Waiting for the clone to load the full-resolution source
    AwaitingFullLoad,
    /// Clone fading out
    Transitioning,
    /// Subject shows the full-resolution source
    Done,
    /// Nothing to optimize (no placeholder URL)
    Skipped,
    /// A load failed or timed out; the placeholder stays
    Failed(OptimizeError),
    /// Subject left the document
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Done
                | SessionState::Skipped
                | SessionState::Failed(_)
                | SessionState::Cancelled
        )
    }
}

/// Per-session settings derived from the optimizer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub fade_duration_ms: u64,
    /// 0 waits forever
    pub load_timeout_ms: u64,
    pub dimension_policy: DimensionPolicy,
    pub draft_source_attr: String,
    pub processed_attr: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fade_duration_ms: 500,
            load_timeout_ms: 10_000,
            dimension_policy: DimensionPolicy::SingleAxis,
            draft_source_attr: "ix-src".to_string(),
            processed_attr: crate::PROCESSED_ATTR.to_string(),
        }
    }
}

/// Engine services a session acts through
pub(crate) struct SessionCtx<'a> {
    pub tree: &'a mut DomTree,
    pub timers: &'a mut EventLoop<Task>,
    pub loads: &'a mut LoadQueue,
    pub sources: &'a mut dyn ResponsiveSources,
}

/// Subject inline background values replaced while staged
#[derive(Debug, Clone, PartialEq, Eq)]
struct SavedBackground {
    color: Option<String>,
    image: Option<String>,
}

/// One element's progressive replacement
#[derive(Debug)]
pub struct ReplacementSession {
    id: SessionId,
    subject: NodeId,
    variant: &'static SubjectVariant,
    options: SessionOptions,
    state: SessionState,
    placeholder_url: Option<ImageUrl>,
    target_url: Option<ImageUrl>,
    staging_clone: Option<NodeId>,
    positioning: Option<PositioningContext>,
    saved_background: Option<SavedBackground>,
    pending_load: Option<LoadId>,
    fade_timer: Option<TimerId>,
    resize_recomputes: u32,
}

impl ReplacementSession {
    pub fn new(id: SessionId, subject: NodeId, kind: SubjectKind, options: SessionOptions) -> Self {
        Self {
            id,
            subject,
            variant: SubjectVariant::for_kind(kind),
            options,
            state: SessionState::Init,
            placeholder_url: None,
            target_url: None,
            staging_clone: None,
            positioning: None,
            saved_background: None,
            pending_load: None,
            fade_timer: None,
            resize_recomputes: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn subject(&self) -> NodeId {
        self.subject
    }

    pub fn kind(&self) -> SubjectKind {
        self.variant.kind
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn placeholder_url(&self) -> Option<&ImageUrl> {
        self.placeholder_url.as_ref()
    }

    pub fn target_url(&self) -> Option<&ImageUrl> {
        self.target_url.as_ref()
    }

    pub fn staging_clone(&self) -> Option<NodeId> {
        self.staging_clone
    }

    /// Load the session is waiting on
    pub fn pending_load(&self) -> Option<LoadId> {
        self.pending_load
    }

    /// Resize-triggered recomputations performed after the swap
    pub fn resize_recomputes(&self) -> u32 {
        self.resize_recomputes
    }

    fn set_state(&mut self, next: SessionState) {
        tracing::debug!(
            "Session {:?} ({:?}): {:?} -> {:?}",
            self.id,
            self.variant.kind,
            self.state,
            next
        );
        self.state = next;
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Leave `Init`: read the placeholder, prepare positioning and probe it
    pub(crate) fn start(&mut self, ctx: &mut SessionCtx<'_>) {
        if self.state != SessionState::Init {
            return;
        }
        if !ctx.tree.is_connected(self.subject) {
            self.cancel(ctx);
            return;
        }

        let Some(raw) = (self.variant.read_placeholder_url)(ctx.tree, self.subject) else {
            self.set_state(SessionState::Skipped);
            return;
        };
        self.placeholder_url = Some(ImageUrl::parse(&raw));
        self.positioning = Some(ensure_positioning_context(
            ctx.tree,
            self.subject,
            self.variant.pins_parent,
        ));

        self.request_load(ctx, &raw, LoadTarget::Probe);
        self.set_state(SessionState::AwaitingPlaceholderLoad);
    }

    /// A load this session asked for has settled
    pub(crate) fn on_load(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        load: LoadId,
        url: &str,
        outcome: LoadOutcome,
    ) {
        if self.pending_load != Some(load) {
            return;
        }
        self.pending_load = None;

        if let LoadOutcome::Failed(reason) = outcome {
            let url = url.to_string();
            self.fail(ctx, OptimizeError::LoadFailed { url, reason });
            return;
        }

        let result = match self.state {
            SessionState::AwaitingPlaceholderLoad => self.stage(ctx),
            SessionState::AwaitingFullLoad => self.begin_transition(ctx),
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.fail(ctx, err);
        }
    }

    /// A load this session asked for outlived the timeout
    pub(crate) fn on_load_timeout(&mut self, ctx: &mut SessionCtx<'_>, load: LoadId, url: &str) {
        if self.pending_load != Some(load) {
            return;
        }
        self.pending_load = None;
        let err = OptimizeError::LoadTimedOut {
            url: url.to_string(),
            timeout_ms: self.options.load_timeout_ms,
        };
        self.fail(ctx, err);
    }

    /// The crossfade finished: swap the subject's source and clean up
    pub(crate) fn on_fade_complete(&mut self, ctx: &mut SessionCtx<'_>) {
        if self.state != SessionState::Transitioning {
            return;
        }
        self.fade_timer = None;
        if !ctx.tree.is_connected(self.subject) {
            self.cancel(ctx);
            return;
        }

        if let Err(err) = self.swap(ctx) {
            self.fail(ctx, err);
            return;
        }
        self.set_state(SessionState::Done);
    }

    /// Resizing settled: size the live source for the subject's current box.
    ///
    /// Returns `false` once the session can no longer react (subject gone).
    pub(crate) fn on_resize(&mut self, tree: &mut DomTree) -> bool {
        if self.state != SessionState::Done {
            return !self.is_terminal();
        }
        if !tree.is_connected(self.subject) {
            return false;
        }
        let Some(target) = self.current_target(tree) else {
            return true;
        };

        self.resize_recomputes += 1;
        if self.target_url.as_ref() != Some(&target) {
            tracing::debug!("Session {:?} resized to {}", self.id, target);
            if let Err(err) = (self.variant.write_source)(tree, self.subject, &target.serialize()) {
                tracing::warn!("Session {:?} cannot update its source: {}", self.id, err);
                return true;
            }
            self.target_url = Some(target);
        }
        true
    }

    /// Cancel when the subject has been removed from the document
    pub(crate) fn cancel_if_detached(&mut self, ctx: &mut SessionCtx<'_>) -> bool {
        if self.is_terminal() || ctx.tree.is_connected(self.subject) {
            return false;
        }
        self.cancel(ctx);
        true
    }

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    /// Clone the subject behind itself and request the full-resolution load
    fn stage(&mut self, ctx: &mut SessionCtx<'_>) -> Result<(), OptimizeError> {
        if !ctx.tree.is_connected(self.subject) {
            self.cancel(ctx);
            return Ok(());
        }

        let tree = &mut *ctx.tree;
        let clone = tree.clone_node(self.subject, !self.variant.strips_clone_content)?;
        self.staging_clone = Some(clone);

        for marker in [
            INLINE_MARKER_ATTR,
            BACKGROUND_MARKER_ATTR,
            self.options.processed_attr.as_str(),
        ] {
            tree.remove_attribute(clone, marker);
        }
        if let Some(element) = tree.element_mut(clone) {
            element.attrs.add_class(STAGING_CLASS);
        }
        if let Some(rect) = compute_overlay_rect(tree, self.subject) {
            rect.apply(tree, clone)?;
        }
        tree.insert_before(clone, self.subject)?;

        if self.variant.clears_subject_background {
            self.saved_background = Some(SavedBackground {
                color: tree.inline_style(self.subject, "background-color").map(str::to_string),
                image: tree.inline_style(self.subject, "background-image").map(str::to_string),
            });
            tree.set_style(self.subject, "background-color", "transparent")?;
            tree.set_style(self.subject, "background-image", "none")?;
        }
        self.set_state(SessionState::Staged);

        self.request_full_load(ctx, clone)
    }

    /// Write the full-resolution source into the subject and undo the
    /// staging changes
    fn swap(&mut self, ctx: &mut SessionCtx<'_>) -> Result<(), OptimizeError> {
        // The box may have changed size while the clone was loading
        if let Some(target) = self.current_target(ctx.tree) {
            if self.target_url.as_ref() != Some(&target) {
                tracing::debug!("Session {:?} resized before swap: {}", self.id, target);
            }
            self.target_url = Some(target);
        }
        if let Some(target) = &self.target_url {
            (self.variant.write_source)(ctx.tree, self.subject, &target.serialize())?;
        }
        if let Some(saved) = self.saved_background.take() {
            // The image now carries the full-resolution source
            ctx.tree
                .restore_style(self.subject, "background-color", saved.color.as_deref());
        }
        self.remove_staging_clone(ctx.tree);
        if let Some(positioning) = self.positioning.take() {
            positioning.restore(ctx.tree);
        }
        ctx.tree.remove_attribute(self.subject, self.selection_marker());
        Ok(())
    }

    /// Placeholder sized for the subject's current box
    fn current_target(&self, tree: &DomTree) -> Option<ImageUrl> {
        let size = (self.variant.read_size)(tree, self.subject).filter(|size| !size.is_empty())?;
        let placeholder = self.placeholder_url.as_ref()?;
        Some(placeholder.sized_for(size, self.options.dimension_policy))
    }

    /// Point the clone at the correctly sized URL and wait for it
    fn request_full_load(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        clone: NodeId,
    ) -> Result<(), OptimizeError> {
        let size = (self.variant.read_size)(ctx.tree, self.subject)
            .filter(|size| !size.is_empty())
            .ok_or(OptimizeError::Unmeasurable)?;
        let Some(placeholder) = &self.placeholder_url else {
            return Err(OptimizeError::Unmeasurable);
        };
        let target = placeholder.sized_for(size, self.options.dimension_policy);

        (self.variant.stage_source)(
            ctx.tree,
            clone,
            &target.serialize(),
            &self.options.draft_source_attr,
        )?;
        ctx.sources.rescan(ctx.tree);

        let url = (self.variant.read_source)(ctx.tree, clone).unwrap_or_else(|| target.serialize());
        self.target_url = Some(target);
        self.request_load(ctx, &url, LoadTarget::Element(clone));
        self.set_state(SessionState::AwaitingFullLoad);
        Ok(())
    }

    /// Fade the clone out; one timer drives completion
    fn begin_transition(&mut self, ctx: &mut SessionCtx<'_>) -> Result<(), OptimizeError> {
        if !ctx.tree.is_connected(self.subject) {
            self.cancel(ctx);
            return Ok(());
        }
        if let Some(clone) = self.staging_clone {
            let fade = format!("opacity {}ms", self.options.fade_duration_ms);
            ctx.tree.set_style(clone, "transition", &fade)?;
            ctx.tree.set_style(clone, "opacity", "0")?;
        }
        self.fade_timer = Some(
            ctx.timers
                .set_timeout(Task::FadeComplete(self.id), self.options.fade_duration_ms),
        );
        self.set_state(SessionState::Transitioning);
        Ok(())
    }

    fn request_load(&mut self, ctx: &mut SessionCtx<'_>, url: &str, target: LoadTarget) {
        let id = ctx.loads.request(self.id, url, target);
        if self.options.load_timeout_ms > 0 {
            let timer = ctx
                .timers
                .set_timeout(Task::LoadTimeout(id), self.options.load_timeout_ms);
            ctx.loads.arm_timeout(id, timer);
        }
        self.pending_load = Some(id);
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    fn fail(&mut self, ctx: &mut SessionCtx<'_>, err: OptimizeError) {
        tracing::warn!("Session {:?} on {:?} failed: {}", self.id, self.subject, err);
        self.release(ctx);
        self.set_state(SessionState::Failed(err));
    }

    fn cancel(&mut self, ctx: &mut SessionCtx<'_>) {
        self.release(ctx);
        self.set_state(SessionState::Cancelled);
    }

    /// Drop outstanding work and undo every temporary change, leaving the
    /// subject showing its placeholder
    fn release(&mut self, ctx: &mut SessionCtx<'_>) {
        if let Some(load) = self.pending_load.take() {
            if let Some(pending) = ctx.loads.complete(load) {
                if let Some(timer) = pending.timeout {
                    ctx.timers.clear_timer(timer);
                }
            }
        }
        if let Some(timer) = self.fade_timer.take() {
            ctx.timers.clear_timer(timer);
        }

        self.remove_staging_clone(ctx.tree);
        if let Some(saved) = self.saved_background.take() {
            let tree = &mut *ctx.tree;
            tree.restore_style(self.subject, "background-color", saved.color.as_deref());
            tree.restore_style(self.subject, "background-image", saved.image.as_deref());
        }
        if let Some(positioning) = self.positioning.take() {
            positioning.restore(ctx.tree);
        }
    }

    fn remove_staging_clone(&mut self, tree: &mut DomTree) {
        if let Some(clone) = self.staging_clone.take() {
            tree.detach(clone);
        }
    }

    fn selection_marker(&self) -> &'static str {
        match self.variant.kind {
            SubjectKind::InlinePicture => INLINE_MARKER_ATTR,
            SubjectKind::CssBackground => BACKGROUND_MARKER_ATTR,
        }
    }
}
