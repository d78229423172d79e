//! Optimizer configuration

use serde::{Deserialize, Serialize};

use lqip_dom::{Selector, split_top_level};

use crate::{ConfigError, DimensionPolicy, SessionOptions};

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Selector scoping discovery
    pub parent: String,
    /// Inline images to optimize
    pub selector: String,
    /// Background-image elements to optimize
    pub bg_selector: String,
    /// Marker set once an element has been claimed
    pub processed_attr: String,
    /// Draft source attribute read by responsive-source negotiation
    pub draft_source_attr: String,
    pub fade_duration_ms: u64,
    /// 0 disables the timeout
    pub load_timeout_ms: u64,
    pub resize_debounce_ms: u64,
    /// Defer each session until its subject is visible
    pub lazy: bool,
    /// Re-size swapped images when the window settles after resizing
    pub resize_reactive: bool,
    pub dimension_policy: DimensionPolicy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            parent: "body".into(),
            selector: format!("img[{}]", crate::INLINE_MARKER_ATTR),
            bg_selector: format!("[{}]", crate::BACKGROUND_MARKER_ATTR),
            processed_attr: crate::PROCESSED_ATTR.into(),
            draft_source_attr: "ix-src".into(),
            fade_duration_ms: 500,
            load_timeout_ms: 10_000,
            resize_debounce_ms: 500,
            lazy: false,
            resize_reactive: true,
            dimension_policy: DimensionPolicy::SingleAxis,
        }
    }
}

impl OptimizerConfig {
    /// Parse a JSON document; missing or empty fields take their defaults
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config.with_defaults())
    }

    /// Replace blank string options with their defaults
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        for (value, default) in [
            (&mut self.parent, defaults.parent),
            (&mut self.selector, defaults.selector),
            (&mut self.bg_selector, defaults.bg_selector),
            (&mut self.processed_attr, defaults.processed_attr),
            (&mut self.draft_source_attr, defaults.draft_source_attr),
        ] {
            if value.trim().is_empty() {
                *value = default;
            }
        }
        self
    }

    /// Check that every selector parses
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile_selectors().map(|_| ())
    }

    /// `(inline, background)` discovery selectors, each scoped by `parent`
    pub(crate) fn compile_selectors(&self) -> Result<(Selector, Selector), ConfigError> {
        let inline = Selector::parse(&scoped(&self.parent, &self.selector))?;
        let background = Selector::parse(&scoped(&self.parent, &self.bg_selector))?;
        Ok((inline, background))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            fade_duration_ms: self.fade_duration_ms,
            load_timeout_ms: self.load_timeout_ms,
            dimension_policy: self.dimension_policy,
            draft_source_attr: self.draft_source_attr.clone(),
            processed_attr: self.processed_attr.clone(),
        }
    }
}

/// `parent selector` for every alternative of a selector list
fn scoped(parent: &str, selector: &str) -> String {
    split_top_level(selector, ',')
        .into_iter()
        .map(|alternative| format!("{} {}", parent.trim(), alternative.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
