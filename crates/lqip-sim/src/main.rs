//! lqip-sim - Replays a scene against the engine
//!
//! Usage: `lqip-sim [scene.json] [--fast]`
//!
//! Without a scene file the bundled demo runs. `--fast` skips real-time
//! pacing. Set `RUST_LOG=debug` to follow every session transition.

mod network;
mod scene;

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lqip_dom::{DomTree, NodeId};
use lqip_engine::{Optimizer, ReplacementSession, SubjectKind, background_image_url};

use network::FakeNetwork;
use scene::{Scene, WindowEvent, scale_layout};

const DEMO_SCENE: &str = include_str!("../scenes/demo.json");

/// Simulated milliseconds per loop iteration
const TICK_MS: u64 = 10;

/// Give up on scenes that never settle
const MAX_SIM_MS: u64 = 120_000;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut path = None;
    let mut fast = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--fast" => fast = true,
            _ => path = Some(arg),
        }
    }

    let text = match &path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading scene {path}"))?
        }
        None => DEMO_SCENE.to_string(),
    };
    let scene = Scene::from_json(&text)?;
    let document = scene.build()?;
    let optimizer = Optimizer::new(document, scene.config.clone())?;

    tracing::info!(
        "lqip engine v{}: {} ({} element(s))",
        lqip_engine::VERSION,
        path.as_deref().unwrap_or("demo scene"),
        scene.elements.len()
    );

    let optimizer = smol::block_on(run(optimizer, scene, fast))?;
    print_report(&optimizer);
    Ok(())
}

async fn run(mut optimizer: Optimizer, scene: Scene, fast: bool) -> anyhow::Result<Optimizer> {
    let mut network = FakeNetwork::new(scene.network.clone());
    let mut viewport = scene.viewport_rect();
    let mut events = scene.events.into_iter().peekable();

    optimizer.scan();
    optimizer.update_viewport(viewport);

    loop {
        let now = optimizer.now();

        while let Some(event) = events.next_if(|e| e.at_ms() <= now) {
            match event {
                WindowEvent::Resize { scale, .. } => {
                    tracing::info!("t={}ms: window resized (x{})", now, scale);
                    scale_layout(optimizer.document_mut(), scale);
                    optimizer.window_resized();
                }
                WindowEvent::Scroll { y, .. } => {
                    tracing::info!("t={}ms: scrolled to y={}", now, y);
                    viewport.y = y;
                    optimizer.update_viewport(viewport);
                }
                WindowEvent::Remove { id, .. } => {
                    let doc = optimizer.document_mut();
                    let node = doc
                        .get_element_by_id(&id)
                        .with_context(|| format!("remove event: no element '{id}'"))?;
                    tracing::info!("t={}ms: removed #{}", now, id);
                    doc.tree_mut().detach(node);
                }
            }
        }

        network.submit(optimizer.take_load_requests(), now);
        for (load, outcome) in network.poll(now) {
            optimizer.complete_load(load, outcome);
        }

        let settled = !optimizer.has_pending_work() && network.is_idle() && events.peek().is_none();
        if settled {
            break;
        }
        if now >= MAX_SIM_MS {
            tracing::warn!("Scene still busy after {}ms, stopping", MAX_SIM_MS);
            break;
        }

        if !fast {
            smol::Timer::after(Duration::from_millis(TICK_MS)).await;
        }
        optimizer.advance(TICK_MS);
    }

    tracing::info!(
        "Finished at t={}ms ({} request(s) never answered)",
        optimizer.now(),
        network.stalled()
    );
    Ok(optimizer)
}

fn print_report(optimizer: &Optimizer) {
    let tree = optimizer.document().tree();
    println!("{:<6} {:<10} {:<22} SOURCE", "NODE", "KIND", "STATE");
    for session in optimizer.sessions() {
        println!(
            "{:<6} {:<10} {:<22} {}",
            format!("{:?}", session.subject()),
            kind_label(session),
            state_label(session),
            current_source(tree, session.subject(), session.kind()).unwrap_or_else(|| "-".into())
        );
    }
    let pending = optimizer.gated_count();
    if pending > 0 {
        println!("{pending} element(s) never became visible");
    }
}

fn kind_label(session: &ReplacementSession) -> &'static str {
    match session.kind() {
        SubjectKind::InlinePicture => "inline",
        SubjectKind::CssBackground => "background",
    }
}

fn state_label(session: &ReplacementSession) -> String {
    use lqip_engine::SessionState;

    match session.state() {
        SessionState::Failed(err) => format!("failed ({err})"),
        state => format!("{state:?}").to_lowercase(),
    }
}

fn current_source(tree: &DomTree, subject: NodeId, kind: SubjectKind) -> Option<String> {
    match kind {
        SubjectKind::InlinePicture => tree.attribute(subject, "src").map(str::to_string),
        SubjectKind::CssBackground => {
            background_image_url(tree.computed_style(subject, "background-image"))
        }
    }
}
