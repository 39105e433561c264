//! Interpolating scroll offsets between the two views.
//!
//! Each paired block owns the interval from its start to the next block's
//! start, so whitespace between blocks belongs to the block above it. A
//! position inside that interval keeps its fraction when moved to the other
//! view.

use serde::Serialize;

use crate::viewport::{Dimension, Pane, Section};

/// Position inside a view expressed against its blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollPosition {
    /// Block index of the section at the top of the view
    pub section_index: usize,
    /// Progress through that section's interval, `0.0..=1.0`
    pub pos_in_section: f64,
}

/// One block measured in both views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectionPair {
    pub index: usize,
    pub source: Dimension,
    pub preview: Dimension,
}

impl SectionPair {
    pub const fn side(&self, pane: Pane) -> Dimension {
        match pane {
            Pane::Source => self.source,
            Pane::Preview => self.preview,
        }
    }
}

/// The paired sections both views currently agree on.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappingTable {
    pairs: Vec<SectionPair>,
}

impl MappingTable {
    /// Pair sections by block index.
    ///
    /// Both lists are in document order. Blocks measured in only one view
    /// are left out, so a stale view that measured fewer blocks yields the
    /// common prefix.
    pub fn build(source: &[Section], preview: &[Section]) -> Self {
        let mut pairs = Vec::with_capacity(source.len().min(preview.len()));
        let (mut a, mut b) = (source.iter().peekable(), preview.iter().peekable());
        while let (Some(s), Some(p)) = (a.peek(), b.peek()) {
            match s.index.cmp(&p.index) {
                std::cmp::Ordering::Less => {
                    a.next();
                }
                std::cmp::Ordering::Greater => {
                    b.next();
                }
                std::cmp::Ordering::Equal => {
                    pairs.push(SectionPair {
                        index: s.index,
                        source: s.dimension,
                        preview: p.dimension,
                    });
                    a.next();
                    b.next();
                }
            }
        }
        Self { pairs }
    }

    pub fn pairs(&self) -> &[SectionPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Map `scroll` in `from` to the corresponding offset in the other view.
    ///
    /// `from_max` and `to_max` are the views' largest scroll offsets. The
    /// document's start and end always map onto each other exactly.
    pub fn map(&self, from: Pane, scroll: f64, from_max: f64, to_max: f64) -> f64 {
        if from_max <= 1.0 || to_max <= 1.0 || !scroll.is_finite() || scroll <= 0.0 {
            return 0.0;
        }
        if scroll >= from_max - 1.0 {
            return to_max;
        }
        let to = from.other();
        let Some(first) = self.pairs.first() else {
            return (scroll / from_max * to_max).clamp(0.0, to_max);
        };

        let target = match self
            .pairs
            .partition_point(|pair| pair.side(from).start_offset <= scroll)
        {
            0 => {
                // Above the first block: interpolate over [0, first start).
                let head = first.side(from).start_offset;
                first.side(to).start_offset * (scroll / head)
            }
            n => {
                let i = n - 1;
                let next = self.pairs.get(i + 1);
                let here = self.pairs[i].side(from);
                let len = span(here, next.map(|p| p.side(from)), from_max);
                let pos = fraction(scroll - here.start_offset, len);
                let there = self.pairs[i].side(to);
                there.start_offset + pos * span(there, next.map(|p| p.side(to)), to_max)
            }
        };
        target.clamp(0.0, to_max)
    }
}

/// Length of a section's interpolation interval.
///
/// The interval runs to the next section's start; the last one runs for
/// its own height or up to the end of scrolling, whichever is longer.
fn span(here: Dimension, next: Option<Dimension>, max_scroll: f64) -> f64 {
    next.map_or_else(
        || here.height.max(max_scroll - here.start_offset),
        |next| next.start_offset - here.start_offset,
    )
    .max(0.0)
}

fn fraction(offset: f64, span: f64) -> f64 {
    if span > 0.0 {
        (offset / span).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Which section sits at `scroll` and how far into it.
///
/// A position above the first section reports that section at 0.
pub fn position_at(sections: &[Section], scroll: f64, max_scroll: f64) -> Option<ScrollPosition> {
    let first = sections.first()?;
    let n = sections.partition_point(|s| s.dimension.start_offset <= scroll);
    if n == 0 {
        return Some(ScrollPosition {
            section_index: first.index,
            pos_in_section: 0.0,
        });
    }
    let here = &sections[n - 1];
    let next = sections.get(n).map(|s| s.dimension);
    let len = span(here.dimension, next, max_scroll);
    Some(ScrollPosition {
        section_index: here.index,
        pos_in_section: fraction(scroll - here.dimension.start_offset, len),
    })
}

/// The scroll offset that puts block `index` at `pos_in_section`.
pub fn offset_for(sections: &[Section], index: usize, pos_in_section: f64, max_scroll: f64) -> Option<f64> {
    let i = sections.binary_search_by_key(&index, |s| s.index).ok()?;
    let here = sections[i].dimension;
    let next = sections.get(i + 1).map(|s| s.dimension);
    let pos = if pos_in_section.is_finite() {
        pos_in_section.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let offset = here.start_offset + pos * span(here, next, max_scroll);
    Some(offset.clamp(0.0, max_scroll.max(0.0)))
}
