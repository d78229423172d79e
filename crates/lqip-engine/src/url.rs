//! Image URL Model
//!
//! Minimal query-string handling for image CDN URLs. Values are kept
//! verbatim (never decoded or escaped) so that re-serializing an unmodified
//! URL reproduces its parameters exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dimension axis of a resize request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

impl Axis {
    /// Query parameter key for this axis
    pub fn key(self) -> &'static str {
        match self {
            Axis::Width => "w",
            Axis::Height => "h",
        }
    }

    pub fn opposite(self) -> Axis {
        match self {
            Axis::Width => Axis::Height,
            Axis::Height => Axis::Width,
        }
    }
}

/// How the full-resolution URL pins its dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionPolicy {
    /// Request a single axis and drop the other; the CDN keeps the aspect ratio.
    #[default]
    SingleAxis,
    /// Request both axes so the box cannot change shape, adding `fit=crop`
    /// when the placeholder did not already carry the second axis.
    PinBoth,
}

/// Rendered size of an element in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderSize {
    pub width: f64,
    pub height: f64,
}

impl RenderSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size along `axis`, rounded to whole pixels
    pub fn pixels(&self, axis: Axis) -> u32 {
        let value = match axis {
            Axis::Width => self.width,
            Axis::Height => self.height,
        };
        value.max(0.0).round() as u32
    }

    /// Landscape and square boxes are sized by width, portrait by height
    pub fn dominant_axis(&self) -> Axis {
        if self.width >= self.height {
            Axis::Width
        } else {
            Axis::Height
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pixels(Axis::Width) == 0 || self.pixels(Axis::Height) == 0
    }
}

/// Parsed image resource reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrl {
    base: String,
    /// Unique keys in first-seen order; `None` for a bare `key` without `=`
    params: Vec<(String, Option<String>)>,
}

impl ImageUrl {
    /// Split at the first `?`, then on `&`, then each pair at its first `=`.
    ///
    /// Empty segments are skipped. A repeated key keeps its first position
    /// and takes the last value.
    pub fn parse(raw: &str) -> Self {
        let (base, query) = match raw.split_once('?') {
            Some((base, query)) => (base, query),
            None => (raw, ""),
        };

        let mut url = Self {
            base: base.to_string(),
            params: Vec::new(),
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((key, value)) => url.put(key, Some(value.to_string())),
                None => url.put(pair, None),
            }
        }
        url
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Parameters in serialization order
    pub fn params(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Value of `key`; bare keys read as the empty string
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    fn put(&mut self, key: &str, value: Option<String>) {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    /// Copy with `key` set, keeping its position if present
    pub fn with_param(&self, key: &str, value: &str) -> Self {
        let mut url = self.clone();
        url.put(key, Some(value.to_string()));
        url
    }

    /// Copy without `key`
    pub fn without_param(&self, key: &str) -> Self {
        let mut url = self.clone();
        url.params.retain(|(k, _)| k != key);
        url
    }

    /// Single-axis resize: set `axis` and drop the opposite axis
    pub fn with_dimension(&self, axis: Axis, value: u32) -> Self {
        self.with_param(axis.key(), &value.to_string())
            .without_param(axis.opposite().key())
    }

    /// Both-axes resize: set `axis`, and pin the opposite axis to
    /// `opposite_value`. When the opposite axis was absent, `fit=crop` is
    /// added (unless a fit mode is already present) so the CDN fills the box
    /// instead of letterboxing it.
    pub fn with_pinned_dimension(&self, axis: Axis, value: u32, opposite_value: u32) -> Self {
        let opposite = axis.opposite().key();
        let injecting = !self.has_param(opposite);
        let mut url = self
            .with_param(axis.key(), &value.to_string())
            .with_param(opposite, &opposite_value.to_string());
        if injecting && !url.has_param("fit") {
            url = url.with_param("fit", "crop");
        }
        url
    }

    /// Axis to request for an element of `size`.
    ///
    /// An axis already named by the URL wins; with none or both present the
    /// element's aspect decides.
    pub fn preferred_axis(&self, size: RenderSize) -> Axis {
        match (self.has_param("w"), self.has_param("h")) {
            (true, false) => Axis::Width,
            (false, true) => Axis::Height,
            _ => size.dominant_axis(),
        }
    }

    /// Full-resolution URL for an element rendered at `size`
    pub fn sized_for(&self, size: RenderSize, policy: DimensionPolicy) -> Self {
        let axis = self.preferred_axis(size);
        match policy {
            DimensionPolicy::SingleAxis => self.with_dimension(axis, size.pixels(axis)),
            DimensionPolicy::PinBoth => self.with_pinned_dimension(
                axis,
                size.pixels(axis),
                size.pixels(axis.opposite()),
            ),
        }
    }

    /// `base?key=value&...`; the bare base when there are no parameters
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            f.write_str(if i == 0 { "?" } else { "&" })?;
            f.write_str(key)?;
            if let Some(value) = value {
                write!(f, "={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize_unmodified() {
        let raw = "https://assets.imgix.net/hero.jpg?w=20&blur=200&auto=format,compress";
        let url = ImageUrl::parse(raw);
        assert_eq!(url.base(), "https://assets.imgix.net/hero.jpg");
        assert_eq!(url.param("w"), Some("20"));
        assert_eq!(url.param("auto"), Some("format,compress"));
        assert_eq!(url.serialize(), raw);
    }

    #[test]
    fn test_parse_keeps_value_verbatim() {
        let url = ImageUrl::parse("a.jpg?txt=a%20b&mark=x=y&flag");
        assert_eq!(url.param("txt"), Some("a%20b"));
        assert_eq!(url.param("mark"), Some("x=y"));
        assert_eq!(url.param("flag"), Some(""));
        assert_eq!(url.serialize(), "a.jpg?txt=a%20b&mark=x=y&flag");
    }

    #[test]
    fn test_parse_without_query() {
        let url = ImageUrl::parse("/images/a.png");
        assert_eq!(url.params().count(), 0);
        assert_eq!(url.serialize(), "/images/a.png");
        assert_eq!(url.with_dimension(Axis::Width, 10).serialize(), "/images/a.png?w=10");
    }

    #[test]
    fn test_duplicate_and_empty_segments() {
        let url = ImageUrl::parse("a.jpg?w=1&&h=2&w=3&");
        assert_eq!(url.serialize(), "a.jpg?w=3&h=2");
    }

    #[test]
    fn test_with_dimension_single_axis() {
        let url = ImageUrl::parse("a.jpg?h=10&w=20&q=50");
        let sized = url.with_dimension(Axis::Width, 640);
        assert_eq!(sized.serialize(), "a.jpg?w=640&q=50");

        let sized = url.with_dimension(Axis::Height, 480);
        assert_eq!(sized.serialize(), "a.jpg?h=480&q=50");
    }

    #[test]
    fn test_with_pinned_dimension_injects_crop() {
        let url = ImageUrl::parse("a.jpg?w=20");
        let pinned = url.with_pinned_dimension(Axis::Width, 640, 360);
        assert_eq!(pinned.serialize(), "a.jpg?w=640&h=360&fit=crop");

        // Opposite axis already present: updated, no fit hint added
        let url = ImageUrl::parse("a.jpg?w=20&h=10");
        let pinned = url.with_pinned_dimension(Axis::Width, 640, 360);
        assert_eq!(pinned.serialize(), "a.jpg?w=640&h=360");

        // Author's fit mode is kept
        let url = ImageUrl::parse("a.jpg?w=20&fit=max");
        let pinned = url.with_pinned_dimension(Axis::Width, 640, 360);
        assert_eq!(pinned.serialize(), "a.jpg?w=640&fit=max&h=360");
    }

    #[test]
    fn test_preferred_axis() {
        let landscape = RenderSize::new(200.0, 100.0);
        let portrait = RenderSize::new(100.0, 200.0);

        assert_eq!(ImageUrl::parse("a.jpg").preferred_axis(landscape), Axis::Width);
        assert_eq!(ImageUrl::parse("a.jpg").preferred_axis(portrait), Axis::Height);
        assert_eq!(ImageUrl::parse("a.jpg?w=5").preferred_axis(portrait), Axis::Width);
        assert_eq!(ImageUrl::parse("a.jpg?h=5").preferred_axis(landscape), Axis::Height);
        assert_eq!(ImageUrl::parse("a.jpg?w=5&h=5").preferred_axis(portrait), Axis::Height);
        assert_eq!(RenderSize::new(50.0, 50.0).dominant_axis(), Axis::Width);
    }

    #[test]
    fn test_sized_for_rounds_fractional_sizes() {
        let url = ImageUrl::parse("a.jpg?w=20");
        let size = RenderSize::new(320.6, 180.2);
        assert_eq!(url.sized_for(size, DimensionPolicy::SingleAxis).serialize(), "a.jpg?w=321");
        assert_eq!(
            url.sized_for(size, DimensionPolicy::PinBoth).serialize(),
            "a.jpg?w=321&h=180&fit=crop"
        );
    }
}
