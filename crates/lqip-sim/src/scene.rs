//! Scene files
//!
//! A scene describes a page (elements with their layout boxes), the
//! optimizer configuration, how the simulated network behaves and the
//! window events to replay.

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use serde::Deserialize;

use lqip_dom::{DOMRect, Document, ElementGeometry, NodeId};
use lqip_engine::OptimizerConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub url: String,
    /// `[x, y, width, height]`
    pub viewport: [f64; 4],
    pub config: OptimizerConfig,
    pub network: NetworkSpec,
    pub elements: Vec<ElementSpec>,
    pub events: Vec<WindowEvent>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            url: "about:blank".into(),
            viewport: [0.0, 0.0, 1280.0, 800.0],
            config: OptimizerConfig::default(),
            network: NetworkSpec::default(),
            elements: Vec::new(),
            events: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSpec {
    pub latency_ms: u64,
    /// Extra latency per 100 requested pixels of width
    pub latency_per_100px_ms: u64,
    /// URLs containing any of these fail
    pub fail: Vec<String>,
    /// URLs containing any of these never answer
    pub stall: Vec<String>,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            latency_ms: 80,
            latency_per_100px_ms: 15,
            fail: Vec::new(),
            stall: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    #[serde(default = "default_tag")]
    pub tag: String,
    /// `id` of the parent element; the body when absent
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Inline `style` text
    #[serde(default)]
    pub style: Option<String>,
    /// Stylesheet-resolved declarations
    #[serde(default)]
    pub cascaded: Option<String>,
    /// `[left, top, width, height]`
    #[serde(default)]
    pub geometry: Option<[f64; 4]>,
    #[serde(default)]
    pub text: Option<String>,
}

fn default_tag() -> String {
    "div".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowEvent {
    /// Scale every element box by `scale`, firing one resize event
    Resize { at_ms: u64, scale: f64 },
    /// Move the viewport to `y`
    Scroll { at_ms: u64, y: f64 },
    /// Remove the element with `id` from the page
    Remove { at_ms: u64, id: String },
}

impl WindowEvent {
    pub fn at_ms(&self) -> u64 {
        match self {
            WindowEvent::Resize { at_ms, .. }
            | WindowEvent::Scroll { at_ms, .. }
            | WindowEvent::Remove { at_ms, .. } => *at_ms,
        }
    }
}

impl Scene {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let mut scene: Scene = serde_json::from_str(text).context("parsing scene")?;
        scene.config = scene.config.with_defaults();
        scene.events.sort_by_key(WindowEvent::at_ms);
        Ok(scene)
    }

    pub fn viewport_rect(&self) -> DOMRect {
        let [x, y, width, height] = self.viewport;
        DOMRect::from_xywh(x, y, width, height)
    }

    /// Build the page
    pub fn build(&self) -> anyhow::Result<Document> {
        let mut doc = Document::new(&self.url);
        for (index, spec) in self.elements.iter().enumerate() {
            let parent = match &spec.parent {
                Some(id) => doc
                    .get_element_by_id(id)
                    .with_context(|| format!("element {index}: no parent with id '{id}'"))?,
                None => doc.body(),
            };
            let node = doc.append_element(parent, &spec.tag)?;
            apply(&mut doc, node, spec)
                .with_context(|| format!("element {index} <{}>", spec.tag))?;
        }
        Ok(doc)
    }
}

fn apply(doc: &mut Document, node: NodeId, spec: &ElementSpec) -> anyhow::Result<()> {
    let tree = doc.tree_mut();
    for (name, value) in &spec.attrs {
        tree.set_attribute(node, name, value)?;
    }
    let Some(element) = tree.element_mut(node) else {
        bail!("not an element");
    };
    if let Some(style) = &spec.style {
        element.style = lqip_dom::StyleDeclaration::parse(style);
    }
    if let Some(cascaded) = &spec.cascaded {
        element.cascaded = lqip_dom::StyleDeclaration::parse(cascaded);
    }
    if let Some([left, top, width, height]) = spec.geometry {
        element.geometry = ElementGeometry::at(left, top, width, height);
    }
    if let Some(text) = &spec.text {
        let text = tree.create_text(text);
        tree.append_child(node, text)?;
    }
    Ok(())
}

/// Scale every element box, as a window resize reflows the page
pub fn scale_layout(doc: &mut Document, scale: f64) {
    let tree = doc.tree_mut();
    for id in tree.descendants(tree.root()) {
        if let Some(element) = tree.element_mut(id) {
            let g = element.geometry;
            element.geometry = ElementGeometry {
                offset_top: g.offset_top * scale,
                offset_left: g.offset_left * scale,
                offset_width: g.offset_width * scale,
                offset_height: g.offset_height * scale,
                client_rect: DOMRect::from_xywh(
                    g.client_rect.x * scale,
                    g.client_rect.y * scale,
                    g.client_rect.width * scale,
                    g.client_rect.height * scale,
                ),
            };
        }
    }
}
