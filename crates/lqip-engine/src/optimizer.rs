//! Optimizer
//!
//! Discovers optimizable elements and drives one replacement session per
//! element on a shared event loop. The host feeds it load results,
//! viewport changes, resize events and the passage of time.

use std::collections::BTreeMap;

use lqip_dom::{DOMRect, Document, IntersectionObserver, NodeId, Selector};

use crate::session::SessionCtx;
use crate::{
    ConfigError, DraftSourceActivator, EventLoop, LoadId, LoadOutcome, LoadQueue, LoadRequest,
    OptimizerConfig, ReplacementSession, ResizeCoordinator, ResponsiveSources, SessionId,
    SessionState, SubjectKind, Task, VisibilityGate,
};

/// Result of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Sessions started by this pass
    pub sessions: Vec<SessionId>,
    /// Subjects now waiting for visibility
    pub gated: Vec<NodeId>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.gated.is_empty()
    }
}

/// Everything a session acts through
struct Runtime {
    document: Document,
    timers: EventLoop<Task>,
    loads: LoadQueue,
    sources: Box<dyn ResponsiveSources>,
}

impl Runtime {
    fn ctx(&mut self) -> SessionCtx<'_> {
        SessionCtx {
            tree: self.document.tree_mut(),
            timers: &mut self.timers,
            loads: &mut self.loads,
            sources: self.sources.as_mut(),
        }
    }
}

/// Progressive image optimizer for one document
pub struct Optimizer {
    config: OptimizerConfig,
    inline_selector: Selector,
    background_selector: Selector,
    runtime: Runtime,
    observer: IntersectionObserver,
    viewport: Option<DOMRect>,
    resize: ResizeCoordinator<SessionId>,
    sessions: BTreeMap<SessionId, ReplacementSession>,
    by_subject: BTreeMap<NodeId, SessionId>,
    gates: BTreeMap<NodeId, VisibilityGate>,
    next_session: u64,
}

impl Optimizer {
    /// Create an optimizer; blank options fall back to their defaults
    pub fn new(document: Document, config: OptimizerConfig) -> Result<Self, ConfigError> {
        let config = config.with_defaults();
        let (inline_selector, background_selector) = config.compile_selectors()?;
        let sources = Box::new(DraftSourceActivator::new(&config.draft_source_attr));

        Ok(Self {
            inline_selector,
            background_selector,
            runtime: Runtime {
                document,
                timers: EventLoop::new(),
                loads: LoadQueue::new(),
                sources,
            },
            observer: IntersectionObserver::new(),
            viewport: None,
            resize: ResizeCoordinator::new(config.resize_debounce_ms),
            sessions: BTreeMap::new(),
            by_subject: BTreeMap::new(),
            gates: BTreeMap::new(),
            next_session: 0,
            config,
        })
    }

    /// Replace the responsive-source negotiator
    pub fn with_responsive_sources(mut self, sources: Box<dyn ResponsiveSources>) -> Self {
        self.runtime.sources = sources;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.runtime.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.runtime.document
    }

    /// Current time on the engine clock (ms)
    pub fn now(&self) -> u64 {
        self.runtime.timers.now()
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Find unclaimed elements and start (or gate) a session for each.
    ///
    /// Elements carrying the processed marker, or already tracked, are
    /// skipped, so repeated scans are idempotent.
    pub fn scan(&mut self) -> ScanReport {
        let mut report = ScanReport::default();
        let tree = self.runtime.document.tree();
        let candidates: Vec<(NodeId, SubjectKind)> = tree
            .descendants(tree.root())
            .into_iter()
            .filter_map(|id| {
                if self.inline_selector.matches(tree, id) {
                    Some((id, SubjectKind::InlinePicture))
                } else if self.background_selector.matches(tree, id) {
                    Some((id, SubjectKind::CssBackground))
                } else {
                    None
                }
            })
            .filter(|(id, _)| {
                !tree.has_attribute(*id, &self.config.processed_attr)
                    && !self.by_subject.contains_key(id)
                    && !self.gates.contains_key(id)
            })
            .collect();

        for (subject, kind) in candidates {
            if self.config.lazy {
                let gate = VisibilityGate::new(subject, kind);
                gate.observe(&mut self.observer);
                self.gates.insert(subject, gate);
                report.gated.push(subject);
                continue;
            }

            let claimed = self
                .runtime
                .document
                .tree_mut()
                .set_attribute(subject, &self.config.processed_attr, "true");
            if let Err(err) = claimed {
                tracing::warn!("Cannot claim {:?}: {}", subject, err);
                continue;
            }
            report.sessions.push(self.spawn(subject, kind));
        }

        if !report.is_empty() {
            tracing::info!(
                "Scan found {} element(s) ({} started, {} gated)",
                report.sessions.len() + report.gated.len(),
                report.sessions.len(),
                report.gated.len()
            );
        }
        if let Some(viewport) = self.viewport.filter(|_| !report.gated.is_empty()) {
            self.update_viewport(viewport);
        }
        report
    }

    fn spawn(&mut self, subject: NodeId, kind: SubjectKind) -> SessionId {
        self.next_session += 1;
        let id = SessionId::from_raw(self.next_session);
        let mut session =
            ReplacementSession::new(id, subject, kind, self.config.session_options());
        session.start(&mut self.runtime.ctx());

        self.sessions.insert(id, session);
        self.by_subject.insert(subject, id);
        self.after_step(id);
        id
    }

    // ------------------------------------------------------------------
    // Host events
    // ------------------------------------------------------------------

    /// New viewport rectangle; gated subjects that entered it start
    pub fn update_viewport(&mut self, viewport: DOMRect) -> Vec<SessionId> {
        self.viewport = Some(viewport);
        let entries = self
            .observer
            .check_intersections(self.runtime.document.tree(), viewport);
        entries
            .into_iter()
            .filter_map(|entry| self.notify_intersection(entry.target, entry.is_intersecting))
            .collect()
    }

    /// Intersection notification for one subject
    pub fn notify_intersection(&mut self, subject: NodeId, is_intersecting: bool) -> Option<SessionId> {
        let gate = self.gates.get_mut(&subject)?;
        let fired = gate.on_intersection(
            self.runtime.document.tree_mut(),
            &mut self.observer,
            is_intersecting,
            &self.config.processed_attr,
        );
        let kind = gate.kind();
        if gate.is_triggered() {
            self.gates.remove(&subject);
        }
        fired.then(|| self.spawn(subject, kind))
    }

    /// Load requests the host has not yet been given
    pub fn take_load_requests(&mut self) -> Vec<LoadRequest> {
        self.runtime.loads.take_requests()
    }

    /// Report the result of a load. Returns `false` for unknown or already
    /// settled requests (e.g. after a timeout).
    pub fn complete_load(&mut self, load: LoadId, outcome: LoadOutcome) -> bool {
        let Some(pending) = self.runtime.loads.complete(load) else {
            return false;
        };
        if let Some(timer) = pending.timeout {
            self.runtime.timers.clear_timer(timer);
        }
        if let Some(session) = self.sessions.get_mut(&pending.owner) {
            session.on_load(&mut self.runtime.ctx(), load, &pending.url, outcome);
            self.after_step(pending.owner);
        }
        true
    }

    /// A window resize event
    pub fn window_resized(&mut self) {
        self.resize.notify_resize(&mut self.runtime.timers);
    }

    /// Move the clock forward, running every timer that falls due
    pub fn advance(&mut self, ms: u64) {
        let deadline = self.now() + ms;
        self.advance_to(deadline);
    }

    fn advance_to(&mut self, deadline: u64) {
        self.cancel_detached();
        while let Some(task) = self.runtime.timers.pop_due(deadline) {
            self.dispatch(task);
        }
        self.runtime.timers.advance_to(deadline);
    }

    /// Run timers until nothing is scheduled or a load is awaiting the host
    pub fn run_until_idle(&mut self) {
        while self.runtime.loads.is_empty() {
            let Some(deadline) = self.runtime.timers.next_deadline() else {
                break;
            };
            self.advance_to(deadline);
        }
    }

    /// Loads outstanding or timers scheduled
    pub fn has_pending_work(&self) -> bool {
        !self.runtime.loads.is_empty() || self.runtime.timers.has_pending()
    }

    fn dispatch(&mut self, task: Task) {
        match task {
            Task::FadeComplete(id) => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.on_fade_complete(&mut self.runtime.ctx());
                    self.after_step(id);
                }
            }
            Task::LoadTimeout(load) => {
                let Some(pending) = self.runtime.loads.complete(load) else {
                    return;
                };
                if let Some(session) = self.sessions.get_mut(&pending.owner) {
                    session.on_load_timeout(&mut self.runtime.ctx(), load, &pending.url);
                    self.after_step(pending.owner);
                }
            }
            Task::ResizeSettled => {
                let subscribers = self.resize.settle();
                let tree = self.runtime.document.tree_mut();
                let mut recomputed = 0;
                for id in subscribers {
                    let active = self
                        .sessions
                        .get_mut(&id)
                        .is_some_and(|session| session.on_resize(tree));
                    if active {
                        recomputed += 1;
                    } else {
                        self.resize.unsubscribe(id);
                    }
                }
                tracing::debug!("Resize settled, {} session(s) recomputed", recomputed);
            }
        }
    }

    /// Bookkeeping after a session moved
    fn after_step(&mut self, id: SessionId) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        match session.state() {
            SessionState::Done => {
                tracing::info!("Optimized {:?}", session.subject());
                if self.config.resize_reactive {
                    self.resize.subscribe(id);
                }
            }
            SessionState::Cancelled => {
                tracing::debug!("Session {:?} cancelled: subject detached", id);
            }
            _ => {}
        }
    }

    /// Cancel in-flight sessions whose subject left the document, and drop
    /// gates that can no longer open
    fn cancel_detached(&mut self) {
        for (&id, session) in self.sessions.iter_mut() {
            if session.cancel_if_detached(&mut self.runtime.ctx()) {
                tracing::debug!("Session {:?} cancelled: subject detached", id);
            }
        }

        let tree = self.runtime.document.tree();
        let observer = &mut self.observer;
        self.gates.retain(|&subject, _| {
            let connected = tree.is_connected(subject);
            if !connected {
                observer.unobserve(subject);
                tracing::debug!("Gate on {:?} dropped: subject detached", subject);
            }
            connected
        });
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn session(&self, id: SessionId) -> Option<&ReplacementSession> {
        self.sessions.get(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &ReplacementSession> {
        self.sessions.values()
    }

    /// Session owning `subject`, if one was started
    pub fn session_for(&self, subject: NodeId) -> Option<&ReplacementSession> {
        self.by_subject.get(&subject).and_then(|id| self.sessions.get(id))
    }

    /// Subjects still waiting for visibility
    pub fn gated_count(&self) -> usize {
        self.gates.len()
    }

    pub fn resize_coordinator(&self) -> &ResizeCoordinator<SessionId> {
        &self.resize
    }
}
