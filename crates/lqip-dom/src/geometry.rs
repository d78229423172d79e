//! Geometry APIs
//!
//! DOMRect and the per-element layout box written by the host layout pass.

/// DOMRect - rectangle geometry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DOMRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DOMRect {
    /// Create with dimensions
    pub const fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Top edge (same as y)
    pub fn top(&self) -> f64 {
        self.y
    }

    /// Right edge
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Left edge (same as x)
    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Check if point is inside (edges inclusive)
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Get intersection rect; touching edges produce no intersection
    pub fn intersection(&self, other: &DOMRect) -> Option<DOMRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right > x && bottom > y {
            Some(DOMRect::from_xywh(x, y, right - x, bottom - y))
        } else {
            None
        }
    }
}

/// Element layout box
///
/// `offset_*` are relative to the offset parent (nearest positioned
/// ancestor); `client_rect` is the viewport-relative border box
/// (`getBoundingClientRect`), which may be fractional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementGeometry {
    pub offset_top: f64,
    pub offset_left: f64,
    pub offset_width: f64,
    pub offset_height: f64,
    pub client_rect: DOMRect,
}

impl ElementGeometry {
    /// Geometry for an element whose offset parent is the viewport
    pub fn at(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            offset_top: top,
            offset_left: left,
            offset_width: width,
            offset_height: height,
            client_rect: DOMRect::from_xywh(left, top, width, height),
        }
    }

    /// Get bounding client rect
    pub fn bounding_client_rect(&self) -> DOMRect {
        self.client_rect
    }

    /// Move the viewport-relative box, e.g. after scrolling
    pub fn scrolled_by(mut self, dx: f64, dy: f64) -> Self {
        self.client_rect.x -= dx;
        self.client_rect.y -= dy;
        self
    }
}
