//! Engine errors

use lqip_dom::DomError;

/// Why a replacement session ended without swapping
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptimizeError {
    #[error("Image failed to load: {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("Image load timed out after {timeout_ms}ms: {url}")]
    LoadTimedOut { url: String, timeout_ms: u64 },

    #[error("Element has no rendered size")]
    Unmeasurable,

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid selector: {0}")]
    Selector(#[from] DomError),
}
