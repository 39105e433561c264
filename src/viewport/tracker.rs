//! Measuring block geometry after layout.

use super::{Dimension, Rect, Section};
use crate::document::LineRange;

/// Upper bound on interior lines sampled per block in a wrapping view.
pub const MAX_LINE_SAMPLES: usize = 30;

/// Geometry queries against a laid-out view.
///
/// All rects are in viewport coordinates, the way a layout engine reports
/// client rects; the tracker converts them to scroll-content offsets.
pub trait LayoutQuery {
    /// Top of the scroll container's content origin.
    fn origin_top(&self) -> f64;

    fn scroll_top(&self) -> f64;

    /// Rects of the nodes the block at `index` produced, in document order.
    fn node_rects(&self, index: usize, lines: LineRange) -> Vec<Rect>;

    /// The block's own bounding box, used when it has no node geometry.
    fn block_rect(&self, index: usize, lines: LineRange) -> Option<Rect>;

    /// Full rect of one source line, including every wrapped row.
    fn line_rect(&self, _line: usize) -> Option<Rect> {
        None
    }

    /// Whether long lines wrap onto several rows.
    fn wraps(&self) -> bool {
        false
    }
}

/// Measure `ranges` against `layout`.
///
/// Blocks without any geometry are left out for this cycle. Start offsets are
/// kept non-decreasing in document order.
pub fn measure_sections<L: LayoutQuery + ?Sized>(layout: &L, ranges: &[LineRange]) -> Vec<Section> {
    let origin = layout.origin_top();
    let scroll_top = layout.scroll_top();
    let mut sections: Vec<Section> = Vec::with_capacity(ranges.len());

    for (index, lines) in ranges.iter().copied().enumerate() {
        let Some(bounds) = block_bounds(layout, index, lines) else {
            tracing::trace!(
                target: "mdsync::measure",
                index,
                lines = %lines,
                "block has no geometry yet, skipping"
            );
            continue;
        };

        let mut start = bounds.top - origin + scroll_top;
        let end = bounds.bottom - origin + scroll_top;
        if let Some(prev) = sections.last() {
            start = start.max(prev.dimension.start_offset);
        }
        sections.push(Section {
            index,
            lines,
            dimension: Dimension::new(start, end.max(start)),
        });
    }
    sections
}

/// Viewport-space bounds of one block, or `None` if it has no height.
fn block_bounds<L: LayoutQuery + ?Sized>(layout: &L, index: usize, lines: LineRange) -> Option<Rect> {
    let nodes = layout.node_rects(index, lines);
    let mut bounds = match (nodes.first(), nodes.last()) {
        (Some(first), Some(last)) => Some(Rect::new(first.top, last.bottom)),
        _ => None,
    };

    if layout.wraps()
        && let Some(rect) = bounds.as_mut()
    {
        for line in sample_lines(lines) {
            if let Some(line_rect) = layout.line_rect(line) {
                rect.top = rect.top.min(line_rect.top);
                rect.bottom = rect.bottom.max(line_rect.bottom);
            }
        }
    }

    match bounds {
        Some(rect) if rect.height() > 0.0 => Some(rect),
        _ => layout
            .block_rect(index, lines)
            .filter(|rect| rect.height() > 0.0),
    }
}

/// Evenly spaced lines of `lines`, always including the first and last,
/// never more than [`MAX_LINE_SAMPLES`].
fn sample_lines(lines: LineRange) -> impl Iterator<Item = usize> {
    let count = lines.len();
    let samples = count.min(MAX_LINE_SAMPLES);
    (0..samples).map(move |k| {
        if samples == 1 {
            lines.start
        } else {
            lines.start + k * (count - 1) / (samples - 1)
        }
    })
}

/// The last measured sections of one view.
///
/// Every measurement replaces the whole list.
#[derive(Debug, Clone, Default)]
pub struct DimensionTracker {
    sections: Vec<Section>,
    generation: u64,
}

impl DimensionTracker {
    pub const fn new() -> Self {
        Self {
            sections: Vec::new(),
            generation: 0,
        }
    }

    /// Store a fresh measurement.
    pub fn replace(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        self.generation += 1;
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Number of measurements taken so far.
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}
