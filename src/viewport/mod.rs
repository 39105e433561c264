//! Scrollable views and their measured geometry.
//!
//! A [`Viewport`] is one of the two scrolling surfaces (the source text or
//! the rendered preview). The sync layer only talks to views through this
//! trait; [`TextLayout`] and [`BoxLayout`] are headless implementations that
//! lay content out on a pixel grid.

mod boxes;
mod text;
mod tracker;

pub use boxes::{BlockBox, BoxLayout, BoxMetrics};
pub use text::{TextLayout, TextMetrics};
pub use tracker::{DimensionTracker, LayoutQuery, MAX_LINE_SAMPLES, measure_sections};

use std::fmt;

use serde::Serialize;

use crate::document::{Block, LineRange};

/// One of the two synchronized views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pane {
    /// The source text editor
    Source,
    /// The rendered HTML preview
    Preview,
}

impl Pane {
    pub const fn other(self) -> Self {
        match self {
            Self::Source => Self::Preview,
            Self::Preview => Self::Source,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Source => 0,
            Self::Preview => 1,
        }
    }
}

impl fmt::Display for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Preview => "preview",
        })
    }
}

/// Scroll metrics of a view, as sampled on a scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollState {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollState {
    /// Largest reachable `scroll_top`.
    pub fn max_scroll(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}

/// A vertical extent in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Measured geometry of one block, relative to the scroll content origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dimension {
    pub start_offset: f64,
    pub end_offset: f64,
    pub height: f64,
}

impl Dimension {
    pub fn new(start_offset: f64, end_offset: f64) -> Self {
        Self {
            start_offset,
            end_offset,
            height: (end_offset - start_offset).max(0.0),
        }
    }
}

/// A block paired with its geometry in one view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Section {
    /// Position of the block in the list the view was measured against
    pub index: usize,
    pub lines: LineRange,
    pub dimension: Dimension,
}

/// The capabilities the sync layer needs from a scrolling view.
pub trait Viewport {
    /// Current scroll metrics, or `None` while the view has no layout.
    fn scroll_state(&self) -> Option<ScrollState>;

    /// Scroll to an absolute offset; implementations clamp to the range.
    fn set_scroll_top(&mut self, px: f64);

    /// Measure the given block line ranges as currently laid out.
    fn measure_sections(&mut self, ranges: &[LineRange]) -> Vec<Section>;
}

/// Views that can be reloaded with new document content.
pub trait Present {
    fn present(&mut self, text: &str, blocks: &[Block]);
}

/// Scroll container state shared by the headless layouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScrollBox {
    pub scroll_top: f64,
    pub client_height: f64,
    /// Top of the container's content origin in viewport coordinates
    pub origin_top: f64,
}

impl ScrollBox {
    pub(crate) const fn new(client_height: f64) -> Self {
        Self {
            scroll_top: 0.0,
            client_height,
            origin_top: 0.0,
        }
    }

    pub(crate) fn state(&self, content_height: f64) -> ScrollState {
        ScrollState {
            scroll_top: self.scroll_top,
            scroll_height: content_height.max(self.client_height),
            client_height: self.client_height,
        }
    }

    pub(crate) fn scroll_to(&mut self, px: f64, content_height: f64) {
        let max = (content_height - self.client_height).max(0.0);
        self.scroll_top = if px.is_finite() { px.clamp(0.0, max) } else { 0.0 };
    }

    /// Re-clamp after the content or container changed size.
    pub(crate) fn clamp(&mut self, content_height: f64) {
        self.scroll_to(self.scroll_top, content_height);
    }

    /// Convert a content-space offset to viewport coordinates.
    pub(crate) fn to_viewport(&self, content_px: f64) -> f64 {
        self.origin_top + content_px - self.scroll_top
    }
}

/// Whole character columns that fit in `width_px`, at least one.
pub(crate) fn columns_for(width_px: f64, char_width: f64) -> usize {
    let cols = (width_px / char_width).floor();
    if cols.is_finite() && cols >= 1.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            cols as usize
        }
    } else {
        1
    }
}
