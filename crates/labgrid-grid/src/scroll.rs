//! Scroll-driven loading and row virtualization

use labgrid_cache::CollectionView;
use std::ops::Range;

/// Estimated height of one rendered row, in pixels
pub const ROW_HEIGHT_PX: f64 = 33.0;

/// Rows rendered beyond each edge of the viewport
pub const OVERSCAN: usize = 5;

/// Geometry of the scrollable container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Total content height
    pub scroll_height: f64,
    /// Offset of the viewport top
    pub scroll_top: f64,
    /// Viewport height
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Create metrics
    #[inline]
    #[must_use]
    pub fn new(scroll_height: f64, scroll_top: f64, client_height: f64) -> Self {
        Self {
            scroll_height,
            scroll_top,
            client_height,
        }
    }

    /// Pixels left below the viewport
    #[inline]
    #[must_use]
    pub fn distance_to_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    /// Whether the viewport is within `threshold` pixels of the bottom
    #[inline]
    #[must_use]
    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.distance_to_bottom() < threshold
    }
}

/// Whether a scroll position should trigger `load_more`
///
/// Called on every scroll event and once after mount, so a viewport taller
/// than the first page keeps loading until it is filled.
#[must_use]
pub fn should_load_more(metrics: &ScrollMetrics, view: &CollectionView, threshold: f64) -> bool {
    metrics.is_near_bottom(threshold) && view.has_more && !view.is_fetching
}

/// Slice of rows to render for the current scroll position
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn visible_range(metrics: &ScrollMetrics, row_count: usize) -> Range<usize> {
    if row_count == 0 {
        return 0..0;
    }
    let first = (metrics.scroll_top.max(0.0) / ROW_HEIGHT_PX).floor() as usize;
    let shown = (metrics.client_height.max(0.0) / ROW_HEIGHT_PX).ceil() as usize + 1;
    let start = first.saturating_sub(OVERSCAN).min(row_count);
    let end = first
        .saturating_add(shown)
        .saturating_add(OVERSCAN)
        .min(row_count);
    start..end
}

/// Content height for `row_count` rows
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn total_height(row_count: usize) -> f64 {
    row_count as f64 * ROW_HEIGHT_PX
}
