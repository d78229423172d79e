//! lqip Engine
//!
//! Progressive image replacement: swaps a low-resolution placeholder (an
//! inline `<img>` or an element's CSS background) for a correctly sized
//! full-resolution image, staged behind the placeholder and crossfaded in
//! without layout shift.
//!
//! # Example
//! ```rust,ignore
//! use lqip_engine::{Optimizer, OptimizerConfig, LoadOutcome};
//!
//! let mut optimizer = Optimizer::new(document, OptimizerConfig::default())?;
//! optimizer.scan();
//! while optimizer.has_pending_work() {
//!     for request in optimizer.take_load_requests() {
//!         optimizer.complete_load(request.id, LoadOutcome::Loaded);
//!     }
//!     optimizer.run_until_idle();
//! }
//! ```

mod config;
mod error;
mod event_loop;
mod gate;
mod loader;
mod optimizer;
mod overlay;
mod resize;
mod responsive;
mod session;
mod url;
mod variant;

pub use config::OptimizerConfig;
pub use error::{ConfigError, OptimizeError};
pub use event_loop::{EventLoop, Task, TimerId};
pub use gate::VisibilityGate;
pub use loader::{LoadId, LoadOutcome, LoadQueue, LoadRequest, LoadTarget, PendingLoad};
pub use optimizer::{Optimizer, ScanReport};
pub use overlay::{OverlayRect, PositioningContext, compute_overlay_rect, ensure_positioning_context};
pub use resize::ResizeCoordinator;
pub use responsive::{DraftSourceActivator, INITIALIZED_ATTR, ResponsiveSources};
pub use session::{ReplacementSession, SessionId, SessionOptions, SessionState};
pub use url::{Axis, DimensionPolicy, ImageUrl, RenderSize};
pub use variant::{SubjectKind, SubjectVariant, background_image_url};

// Re-export the DOM crate for hosts
pub use lqip_dom as dom;

/// Presence attribute selecting inline images for optimization
pub const INLINE_MARKER_ATTR: &str = "data-optimize-img";

/// Presence attribute selecting background-image elements for optimization
pub const BACKGROUND_MARKER_ATTR: &str = "data-optimize-bg-img";

/// Presence attribute recording that an element was already processed
pub const PROCESSED_ATTR: &str = "data-imgix-img-processed";

/// Class carried by staging clones while they load
pub const STAGING_CLASS: &str = "imgix-optimizing";

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
