//! Integration tests - Discovery to swap
//!
//! Drives the optimizer the way a host does: scan, answer loads, move the
//! clock, report resizes and viewport changes.

use lqip_engine::dom::{DOMRect, Document, DomTree, ElementGeometry, NodeId};
use lqip_engine::{
    Axis, DimensionPolicy, ImageUrl, LoadOutcome, OptimizeError, Optimizer, OptimizerConfig,
    PROCESSED_ATTR, RenderSize, ResponsiveSources, STAGING_CLASS, SessionState,
    ensure_positioning_context,
};

// ============================================================================
// HELPERS
// ============================================================================

fn add_image(doc: &mut Document, parent: NodeId, src: &str, width: f64, height: f64) -> NodeId {
    let img = doc.append_element(parent, "img").unwrap();
    let tree = doc.tree_mut();
    tree.set_attribute(img, "src", src).unwrap();
    tree.set_attribute(img, "data-optimize-img", "").unwrap();
    tree.set_geometry(img, ElementGeometry::at(8.0, 16.0, width, height)).unwrap();
    img
}

fn add_hero(doc: &mut Document, parent: NodeId, background: &str) -> NodeId {
    let hero = doc.append_element(parent, "div").unwrap();
    let tree = doc.tree_mut();
    tree.set_attribute(hero, "data-optimize-bg-img", "").unwrap();
    tree.element_mut(hero)
        .unwrap()
        .cascaded
        .set_property("background-image", background);
    tree.set_geometry(hero, ElementGeometry::at(0.0, 0.0, 1200.0, 600.0)).unwrap();
    hero
}

/// Answer every load with `Loaded` and run timers until nothing is left
fn drive(optimizer: &mut Optimizer) {
    while optimizer.has_pending_work() {
        for request in optimizer.take_load_requests() {
            optimizer.complete_load(request.id, LoadOutcome::Loaded);
        }
        optimizer.run_until_idle();
    }
}

/// Answer the loads currently queued, without running timers
fn answer(optimizer: &mut Optimizer, outcome: LoadOutcome) -> usize {
    let requests = optimizer.take_load_requests();
    for request in &requests {
        optimizer.complete_load(request.id, outcome.clone());
    }
    requests.len()
}

fn element_children(tree: &DomTree, parent: NodeId) -> Vec<NodeId> {
    tree.children(parent)
        .filter(|(_, node)| node.is_element())
        .map(|(id, _)| id)
        .collect()
}

// ============================================================================
// IMAGE URL MODEL
// ============================================================================

#[test]
fn test_width_round_trip() {
    let urls = [
        "https://assets.imgix.net/a.jpg",
        "https://assets.imgix.net/a.jpg?w=20",
        "https://assets.imgix.net/a.jpg?h=10&blur=200",
        "a.jpg?auto=format,compress&w=1&h=1&fit=max",
    ];
    for raw in urls {
        for width in [1, 320, 1999] {
            let out = ImageUrl::parse(raw).with_dimension(Axis::Width, width).serialize();
            let reparsed = ImageUrl::parse(&out);
            let expected = format!("w={width}");

            let widths: Vec<&str> = out
                .split(['?', '&'])
                .skip(1)
                .filter(|p| p.starts_with("w="))
                .collect();
            assert_eq!(widths, vec![expected.as_str()], "{out}");
            assert!(!reparsed.has_param("h"), "{out}");
            assert_eq!(reparsed.serialize(), out);
        }
    }
}

#[test]
fn test_aspect_tie_break() {
    let url = ImageUrl::parse("a.jpg?blur=50");
    let wide = url.sized_for(RenderSize::new(200.0, 100.0), DimensionPolicy::SingleAxis);
    assert_eq!(wide.param("w"), Some("200"));
    assert!(!wide.has_param("h"));

    let tall = url.sized_for(RenderSize::new(100.0, 200.0), DimensionPolicy::SingleAxis);
    assert_eq!(tall.param("h"), Some("200"));
    assert!(!tall.has_param("w"));
}

#[test]
fn test_aspect_tie_break_through_optimizer() {
    let mut doc = Document::default();
    let body = doc.body();
    let wide = add_image(&mut doc, body, "wide.jpg?blur=50", 200.0, 100.0);
    let tall = add_image(&mut doc, body, "tall.jpg?blur=50", 100.0, 200.0);

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    drive(&mut optimizer);

    let tree = optimizer.document().tree();
    assert_eq!(tree.attribute(wide, "src"), Some("wide.jpg?blur=50&w=200"));
    assert_eq!(tree.attribute(tall, "src"), Some("tall.jpg?blur=50&h=200"));
}

#[test]
fn test_pin_both_policy() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "a.jpg?w=20", 300.0, 200.0);
    let config = OptimizerConfig {
        dimension_policy: DimensionPolicy::PinBoth,
        ..OptimizerConfig::default()
    };

    let mut optimizer = Optimizer::new(doc, config).unwrap();
    optimizer.scan();
    drive(&mut optimizer);

    let src = optimizer.document().tree().attribute(img, "src").unwrap();
    assert_eq!(src, "a.jpg?w=300&h=200&fit=crop");
}

// ============================================================================
// OVERLAY POSITIONING
// ============================================================================

#[test]
fn test_positioning_is_idempotent() {
    let mut doc = Document::default();
    let body = doc.body();
    let wrapper = doc.append_element(body, "figure").unwrap();
    let hero = doc.append_element(wrapper, "div").unwrap();
    let tree = doc.tree_mut();

    let first = ensure_positioning_context(tree, hero, true);
    assert!(!first.is_empty());
    let hero_style = tree.element(hero).unwrap().style.clone();
    let wrapper_style = tree.element(wrapper).unwrap().style.clone();

    let second = ensure_positioning_context(tree, hero, true);
    assert!(second.is_empty());
    assert_eq!(tree.element(hero).unwrap().style, hero_style);
    assert_eq!(tree.element(wrapper).unwrap().style, wrapper_style);
    assert_eq!(tree.computed_style(wrapper, "position"), "relative");
}

// ============================================================================
// REPLACEMENT SESSION
// ============================================================================

#[test]
fn test_inline_lifecycle_restores_everything() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "https://a.imgix.net/cat.jpg?w=20&blur=200", 640.0, 480.0);
    doc.tree_mut().set_style(img, "border", "1px solid black").unwrap();
    let style_before = doc.tree().element(img).unwrap().style.clone();

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    let report = optimizer.scan();
    assert_eq!(report.sessions.len(), 1);
    let id = report.sessions[0];
    assert_eq!(optimizer.session(id).unwrap().state(), &SessionState::AwaitingPlaceholderLoad);

    // Probe answered: the clone is staged in front of the subject
    assert_eq!(answer(&mut optimizer, LoadOutcome::Loaded), 1);
    let clone = optimizer.session(id).unwrap().staging_clone().unwrap();
    {
        let tree = optimizer.document().tree();
        assert_eq!(element_children(tree, body), vec![clone, img]);
        assert!(tree.element(clone).unwrap().attrs.has_class(STAGING_CLASS));
        assert!(!tree.has_attribute(clone, PROCESSED_ATTR));
        assert_eq!(tree.inline_style(clone, "top"), Some("16px"));
        assert_eq!(tree.inline_style(clone, "width"), Some("640px"));
    }

    // Full load answered: crossfade in progress
    let requests = optimizer.take_load_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://a.imgix.net/cat.jpg?w=640&blur=200");
    optimizer.complete_load(requests[0].id, LoadOutcome::Loaded);
    assert_eq!(optimizer.session(id).unwrap().state(), &SessionState::Transitioning);

    optimizer.advance(499);
    assert_eq!(optimizer.session(id).unwrap().state(), &SessionState::Transitioning);
    optimizer.advance(1);

    let session = optimizer.session(id).unwrap();
    assert_eq!(session.state(), &SessionState::Done);
    assert!(session.staging_clone().is_none());

    let tree = optimizer.document().tree();
    assert_eq!(tree.attribute(img, "src"), Some("https://a.imgix.net/cat.jpg?w=640&blur=200"));
    assert_eq!(element_children(tree, body), vec![img]);
    assert!(!tree.is_connected(clone));
    assert_eq!(tree.element(img).unwrap().style, style_before);
    assert!(!tree.has_attribute(img, "data-optimize-img"));
    assert!(tree.has_attribute(img, PROCESSED_ATTR));
    assert!(!optimizer.has_pending_work());
}

#[test]
fn test_background_lifecycle_restores_everything() {
    let mut doc = Document::default();
    let body = doc.body();
    let section = doc.append_element(body, "section").unwrap();
    let hero = add_hero(&mut doc, section, "url('https://a.imgix.net/hero.jpg?w=40'), none");
    let caption = doc.tree_mut().create_text("Welcome");
    doc.tree_mut().append_child(hero, caption).unwrap();
    doc.tree_mut().set_style(hero, "background-color", "#eee").unwrap();

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    let id = optimizer.scan().sessions[0];
    answer(&mut optimizer, LoadOutcome::Loaded);

    let clone = optimizer.session(id).unwrap().staging_clone().unwrap();
    {
        let tree = optimizer.document().tree();
        assert_eq!(tree.children(clone).count(), 0);
        assert_eq!(tree.inline_style(hero, "background-color"), Some("transparent"));
        assert_eq!(tree.inline_style(hero, "background-image"), Some("none"));
        assert_eq!(tree.inline_style(section, "position"), Some("relative"));
        assert_eq!(
            tree.inline_style(clone, "background-image"),
            Some("url(\"https://a.imgix.net/hero.jpg?w=1200\")")
        );
    }

    drive(&mut optimizer);
    assert_eq!(optimizer.session(id).unwrap().state(), &SessionState::Done);

    let tree = optimizer.document().tree();
    assert_eq!(
        tree.inline_style(hero, "background-image"),
        Some("url('https://a.imgix.net/hero.jpg?w=1200')")
    );
    assert_eq!(tree.inline_style(hero, "background-color"), Some("#eee"));
    assert_eq!(tree.inline_style(hero, "position"), None);
    assert_eq!(tree.inline_style(section, "position"), None);
    assert_eq!(element_children(tree, section), vec![hero]);
    assert_eq!(tree.children(hero).count(), 1);
}

#[test]
fn test_background_without_image_is_skipped() {
    let mut doc = Document::default();
    let body = doc.body();
    let plain = add_hero(&mut doc, body, "none");
    let gradient = add_hero(&mut doc, body, "linear-gradient(red, blue)");

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    let report = optimizer.scan();
    assert_eq!(report.sessions.len(), 2);
    for subject in [plain, gradient] {
        assert_eq!(optimizer.session_for(subject).unwrap().state(), &SessionState::Skipped);
        assert_eq!(optimizer.document().tree().inline_style(subject, "position"), None);
    }
    assert!(!optimizer.has_pending_work());
}

#[test]
fn test_failed_load_is_isolated() {
    let mut doc = Document::default();
    let body = doc.body();
    let broken = add_image(&mut doc, body, "broken.jpg?w=20", 400.0, 300.0);
    let healthy = add_image(&mut doc, body, "healthy.jpg?w=20", 400.0, 300.0);

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    answer(&mut optimizer, LoadOutcome::Loaded);

    for request in optimizer.take_load_requests() {
        let outcome = if request.url.starts_with("broken") {
            LoadOutcome::Failed("HTTP 404".into())
        } else {
            LoadOutcome::Loaded
        };
        optimizer.complete_load(request.id, outcome);
    }
    drive(&mut optimizer);

    let failed = optimizer.session_for(broken).unwrap();
    assert!(matches!(
        failed.state(),
        SessionState::Failed(OptimizeError::LoadFailed { reason, .. }) if reason == "HTTP 404"
    ));
    assert_eq!(optimizer.session_for(healthy).unwrap().state(), &SessionState::Done);

    let tree = optimizer.document().tree();
    assert_eq!(tree.attribute(broken, "src"), Some("broken.jpg?w=20"));
    assert_eq!(tree.inline_style(broken, "position"), None);
    assert_eq!(tree.attribute(healthy, "src"), Some("healthy.jpg?w=400"));
    assert_eq!(element_children(tree, body), vec![broken, healthy]);
}

#[test]
fn test_unanswered_load_times_out() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "slow.jpg?w=20", 400.0, 300.0);
    let config = OptimizerConfig {
        load_timeout_ms: 3_000,
        ..OptimizerConfig::default()
    };

    let mut optimizer = Optimizer::new(doc, config).unwrap();
    optimizer.scan();
    answer(&mut optimizer, LoadOutcome::Loaded);
    let late = optimizer.take_load_requests();
    assert_eq!(late.len(), 1);

    optimizer.advance(2_999);
    assert_eq!(optimizer.session_for(img).unwrap().state(), &SessionState::AwaitingFullLoad);
    optimizer.advance(1);

    assert!(matches!(
        optimizer.session_for(img).unwrap().state(),
        SessionState::Failed(OptimizeError::LoadTimedOut { timeout_ms: 3_000, .. })
    ));
    assert!(!optimizer.complete_load(late[0].id, LoadOutcome::Loaded));
    assert_eq!(element_children(optimizer.document().tree(), body), vec![img]);
    assert!(!optimizer.has_pending_work());
}

#[test]
fn test_detached_subject_cancels_session() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "gone.jpg?w=20", 400.0, 300.0);

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    answer(&mut optimizer, LoadOutcome::Loaded);
    let clone = optimizer.session_for(img).unwrap().staging_clone().unwrap();

    optimizer.document_mut().tree_mut().detach(img);
    optimizer.advance(0);

    assert_eq!(optimizer.session_for(img).unwrap().state(), &SessionState::Cancelled);
    assert!(!optimizer.document().tree().is_connected(clone));
    assert!(!optimizer.has_pending_work());
}

fn staged_background(doc: &mut Document) -> (NodeId, NodeId) {
    let body = doc.body();
    let section = doc.append_element(body, "section").unwrap();
    let hero = add_hero(doc, section, "none");
    let tree = doc.tree_mut();
    tree.set_style(hero, "background-image", "url(h.jpg?w=20)").unwrap();
    tree.set_style(hero, "background-color", "red").unwrap();
    (section, hero)
}

fn assert_background_restored(tree: &DomTree, section: NodeId, hero: NodeId) {
    assert_eq!(tree.inline_style(hero, "background-image"), Some("url(h.jpg?w=20)"));
    assert_eq!(tree.inline_style(hero, "background-color"), Some("red"));
    assert_eq!(tree.inline_style(hero, "position"), None);
    assert_eq!(tree.inline_style(section, "position"), None);
}

#[test]
fn test_failed_background_load_restores_styles() {
    let mut doc = Document::default();
    let (section, hero) = staged_background(&mut doc);

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    answer(&mut optimizer, LoadOutcome::Loaded);
    {
        let tree = optimizer.document().tree();
        assert_eq!(tree.inline_style(hero, "background-image"), Some("none"));
        assert_eq!(tree.inline_style(section, "position"), Some("relative"));
    }

    answer(&mut optimizer, LoadOutcome::Failed("HTTP 500".into()));
    assert!(matches!(
        optimizer.session_for(hero).unwrap().state(),
        SessionState::Failed(OptimizeError::LoadFailed { .. })
    ));

    let tree = optimizer.document().tree();
    assert_background_restored(tree, section, hero);
    assert_eq!(element_children(tree, section), vec![hero]);
    assert!(!optimizer.has_pending_work());
}

#[test]
fn test_detached_background_subject_restores_styles() {
    let mut doc = Document::default();
    let (section, hero) = staged_background(&mut doc);

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    answer(&mut optimizer, LoadOutcome::Loaded);
    let clone = optimizer.session_for(hero).unwrap().staging_clone().unwrap();

    optimizer.document_mut().tree_mut().detach(hero);
    optimizer.advance(0);

    assert_eq!(optimizer.session_for(hero).unwrap().state(), &SessionState::Cancelled);
    let tree = optimizer.document().tree();
    assert_background_restored(tree, section, hero);
    assert!(!tree.is_connected(clone));
    assert!(element_children(tree, section).is_empty());
    assert!(!optimizer.has_pending_work());
}

#[test]
fn test_fixed_subject_positioned_for_overlay() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "pinned.jpg?w=20", 300.0, 200.0);
    doc.tree_mut().set_style(img, "position", "fixed").unwrap();

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    assert_eq!(optimizer.document().tree().inline_style(img, "position"), Some("relative"));

    drive(&mut optimizer);
    assert_eq!(optimizer.document().tree().inline_style(img, "position"), Some("fixed"));
}

// ============================================================================
// DISCOVERY
// ============================================================================

#[test]
fn test_second_scan_finds_nothing() {
    let mut doc = Document::default();
    let body = doc.body();
    add_image(&mut doc, body, "a.jpg?w=20", 100.0, 100.0);
    add_hero(&mut doc, body, "url(b.jpg?w=20)");

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    assert_eq!(optimizer.scan().sessions.len(), 2);
    assert!(optimizer.scan().is_empty());

    drive(&mut optimizer);
    assert!(optimizer.scan().is_empty());
    assert_eq!(optimizer.sessions().count(), 2);
}

#[test]
fn test_parent_scope_limits_discovery() {
    let mut doc = Document::default();
    let body = doc.body();
    let gallery = doc.append_element(body, "div").unwrap();
    doc.tree_mut().set_attribute(gallery, "id", "gallery").unwrap();
    let inside = add_image(&mut doc, gallery, "in.jpg?w=20", 100.0, 100.0);
    let outside = add_image(&mut doc, body, "out.jpg?w=20", 100.0, 100.0);

    let config = OptimizerConfig {
        parent: "#gallery".into(),
        ..OptimizerConfig::default()
    };
    let mut optimizer = Optimizer::new(doc, config).unwrap();
    optimizer.scan();

    assert!(optimizer.session_for(inside).is_some());
    assert!(optimizer.session_for(outside).is_none());
    assert!(!optimizer.document().tree().has_attribute(outside, PROCESSED_ATTR));
}

// ============================================================================
// VISIBILITY GATE
// ============================================================================

#[test]
fn test_gate_fires_once() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "lazy.jpg?w=20", 300.0, 200.0);
    let config = OptimizerConfig {
        lazy: true,
        ..OptimizerConfig::default()
    };

    let mut optimizer = Optimizer::new(doc, config).unwrap();
    let report = optimizer.scan();
    assert_eq!(report.gated, vec![img]);
    assert!(report.sessions.is_empty());
    assert!(!optimizer.has_pending_work());

    assert_eq!(optimizer.notify_intersection(img, false), None);
    let started: Vec<_> = (0..3)
        .filter_map(|_| optimizer.notify_intersection(img, true))
        .collect();
    assert_eq!(started.len(), 1);
    assert_eq!(optimizer.sessions().count(), 1);
    assert!(optimizer.document().tree().has_attribute(img, PROCESSED_ATTR));
    assert!(optimizer.scan().is_empty());
}

#[test]
fn test_gate_opens_when_viewport_reaches_subject() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "below.jpg?w=20", 300.0, 200.0);
    doc.tree_mut()
        .set_geometry(img, ElementGeometry::at(0.0, 2000.0, 300.0, 200.0))
        .unwrap();
    let config = OptimizerConfig {
        lazy: true,
        ..OptimizerConfig::default()
    };

    let mut optimizer = Optimizer::new(doc, config).unwrap();
    optimizer.update_viewport(DOMRect::from_xywh(0.0, 0.0, 1024.0, 768.0));
    optimizer.scan();
    assert_eq!(optimizer.gated_count(), 1);
    assert!(optimizer.session_for(img).is_none());

    // Scrolled down
    let started = optimizer.update_viewport(DOMRect::from_xywh(0.0, 1500.0, 1024.0, 768.0));
    assert_eq!(started.len(), 1);
    assert_eq!(optimizer.gated_count(), 0);

    drive(&mut optimizer);
    assert_eq!(optimizer.session_for(img).unwrap().state(), &SessionState::Done);
}

#[test]
fn test_detached_gated_subject_is_dropped() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "lazy.jpg?w=20", 300.0, 200.0);
    let config = OptimizerConfig {
        lazy: true,
        ..OptimizerConfig::default()
    };

    let mut optimizer = Optimizer::new(doc, config).unwrap();
    optimizer.scan();
    assert_eq!(optimizer.gated_count(), 1);

    optimizer.document_mut().tree_mut().detach(img);
    optimizer.advance(0);
    assert_eq!(optimizer.gated_count(), 0);
    assert_eq!(optimizer.notify_intersection(img, true), None);
    assert!(optimizer.session_for(img).is_none());
}

// ============================================================================
// RESIZE REACTOR
// ============================================================================

#[test]
fn test_resize_burst_recomputes_once() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "a.jpg?w=20", 800.0, 400.0);

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    drive(&mut optimizer);
    assert_eq!(optimizer.document().tree().attribute(img, "src"), Some("a.jpg?w=800"));

    optimizer
        .document_mut()
        .tree_mut()
        .set_geometry(img, ElementGeometry::at(8.0, 16.0, 500.0, 250.0))
        .unwrap();

    for i in 0..10 {
        if i > 0 {
            optimizer.advance(50);
        }
        optimizer.window_resized();
    }
    let last_event = optimizer.now();

    optimizer.advance(499);
    assert_eq!(optimizer.session_for(img).unwrap().resize_recomputes(), 0);
    assert_eq!(optimizer.document().tree().attribute(img, "src"), Some("a.jpg?w=800"));

    optimizer.advance(1);
    assert_eq!(optimizer.now() - last_event, 500);
    assert_eq!(optimizer.session_for(img).unwrap().resize_recomputes(), 1);
    assert_eq!(optimizer.resize_coordinator().settled_count(), 1);
    assert_eq!(optimizer.document().tree().attribute(img, "src"), Some("a.jpg?w=500"));

    optimizer.advance(5_000);
    assert_eq!(optimizer.session_for(img).unwrap().resize_recomputes(), 1);
}

#[test]
fn test_detached_subject_leaves_resize_fanout() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "a.jpg?w=20", 800.0, 400.0);

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    drive(&mut optimizer);
    assert_eq!(optimizer.resize_coordinator().subscriber_count(), 1);

    optimizer.document_mut().tree_mut().detach(img);
    optimizer.window_resized();
    optimizer.advance(500);
    assert_eq!(optimizer.resize_coordinator().subscriber_count(), 0);
}

#[test]
fn test_resize_during_load_applies_at_swap() {
    let mut doc = Document::default();
    let body = doc.body();
    let hero = add_hero(&mut doc, body, "url('h.jpg?w=20')");
    doc.tree_mut()
        .set_geometry(hero, ElementGeometry::at(0.0, 0.0, 1200.0, 400.0))
        .unwrap();

    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default()).unwrap();
    optimizer.scan();
    answer(&mut optimizer, LoadOutcome::Loaded);
    let full = optimizer.take_load_requests();
    assert_eq!(full[0].url, "h.jpg?w=1200");

    optimizer
        .document_mut()
        .tree_mut()
        .set_geometry(hero, ElementGeometry::at(0.0, 0.0, 600.0, 200.0))
        .unwrap();
    optimizer.window_resized();
    optimizer.advance(500);
    assert_eq!(optimizer.session_for(hero).unwrap().state(), &SessionState::AwaitingFullLoad);

    optimizer.complete_load(full[0].id, LoadOutcome::Loaded);
    optimizer.advance(500);

    let session = optimizer.session_for(hero).unwrap();
    assert_eq!(session.state(), &SessionState::Done);
    assert_eq!(session.target_url().map(ImageUrl::serialize).as_deref(), Some("h.jpg?w=600"));
    assert_eq!(
        optimizer.document().tree().inline_style(hero, "background-image"),
        Some("url('h.jpg?w=600')")
    );
}

// ============================================================================
// RESPONSIVE SOURCES
// ============================================================================

#[derive(Default)]
struct CountingSources {
    calls: std::rc::Rc<std::cell::Cell<usize>>,
}

impl ResponsiveSources for CountingSources {
    fn rescan(&mut self, tree: &mut DomTree) -> usize {
        self.calls.set(self.calls.get() + 1);
        let staged: Vec<NodeId> = tree
            .descendants(tree.root())
            .into_iter()
            .filter(|&id| tree.has_attribute(id, "ix-src"))
            .collect();
        for &id in &staged {
            let draft = tree.attribute(id, "ix-src").unwrap_or_default().to_string();
            tree.set_attribute(id, "src", &format!("{draft}&dpr=2")).unwrap();
        }
        staged.len()
    }
}

#[test]
fn test_injected_responsive_sources() {
    let mut doc = Document::default();
    let body = doc.body();
    let img = add_image(&mut doc, body, "a.jpg?w=20", 320.0, 240.0);

    let sources = CountingSources::default();
    let calls = sources.calls.clone();
    let mut optimizer = Optimizer::new(doc, OptimizerConfig::default())
        .unwrap()
        .with_responsive_sources(Box::new(sources));
    optimizer.scan();
    answer(&mut optimizer, LoadOutcome::Loaded);

    assert_eq!(calls.get(), 1);
    let requests = optimizer.take_load_requests();
    assert_eq!(requests[0].url, "a.jpg?w=320&dpr=2");
    optimizer.complete_load(requests[0].id, LoadOutcome::Loaded);
    optimizer.run_until_idle();

    // The subject takes the computed target, not the negotiated variant
    assert_eq!(optimizer.document().tree().attribute(img, "src"), Some("a.jpg?w=320"));
}
