//! Headless source view: document text on a monospace grid.

use ropey::Rope;
use unicode_width::UnicodeWidthChar;

use super::tracker::{LayoutQuery, measure_sections};
use super::{Present, Rect, ScrollBox, ScrollState, Section, Viewport, columns_for};
use crate::document::{Block, LineRange};

/// Columns a tab advances.
const TAB_WIDTH: usize = 4;

/// Pixel metrics of the source grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub line_height: f64,
    pub char_width: f64,
    pub padding_top: f64,
    pub padding_bottom: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            line_height: 20.0,
            char_width: 8.0,
            padding_top: 8.0,
            padding_bottom: 8.0,
        }
    }
}

/// The source text laid out as rows of a fixed-width font.
///
/// With wrapping enabled a line occupies as many rows as its display width
/// needs at the current column count.
#[derive(Debug, Clone)]
pub struct TextLayout {
    rope: Rope,
    metrics: TextMetrics,
    wrap: bool,
    width_px: f64,
    scroll: ScrollBox,
    /// `row_starts[i]` is the number of rows above 0-based line `i`;
    /// the final entry is the total row count.
    row_starts: Vec<usize>,
}

impl TextLayout {
    pub fn new(text: &str, width_px: f64, client_height: f64, metrics: TextMetrics) -> Self {
        let mut layout = Self {
            rope: Rope::from_str(text),
            metrics,
            wrap: true,
            width_px,
            scroll: ScrollBox::new(client_height),
            row_starts: Vec::new(),
        };
        layout.reflow();
        layout
    }

    /// Replace the text, keeping the scroll position where possible.
    pub fn set_text(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.reflow();
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        if self.wrap != wrap {
            self.wrap = wrap;
            self.reflow();
        }
    }

    pub const fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn set_size(&mut self, width_px: f64, client_height: f64) {
        self.width_px = width_px;
        self.scroll.client_height = client_height;
        self.reflow();
    }

    /// Offset the container below other chrome (toolbars, tabs).
    pub const fn set_origin_top(&mut self, px: f64) {
        self.scroll.origin_top = px;
    }

    /// Columns available per row.
    pub fn columns(&self) -> usize {
        columns_for(self.width_px, self.metrics.char_width)
    }

    /// Number of lines, counted the way `str::lines` counts them.
    pub fn line_count(&self) -> usize {
        let len = self.rope.len_chars();
        if len == 0 {
            return 0;
        }
        let lines = self.rope.len_lines();
        if self.rope.char(len - 1) == '\n' {
            lines - 1
        } else {
            lines
        }
    }

    /// Total height of the scrollable content.
    pub fn content_height(&self) -> f64 {
        let rows = self.row_starts.last().copied().unwrap_or(0);
        self.metrics.padding_top + rows as f64 * self.metrics.line_height + self.metrics.padding_bottom
    }

    fn reflow(&mut self) {
        let count = self.line_count();
        let columns = self.columns();
        let mut row_starts = Vec::with_capacity(count + 1);
        let mut rows = 0;
        row_starts.push(0);
        for idx in 0..count {
            rows += if self.wrap {
                self.display_width(idx).div_ceil(columns).max(1)
            } else {
                1
            };
            row_starts.push(rows);
        }
        self.row_starts = row_starts;
        self.scroll.clamp(self.content_height());
    }

    fn display_width(&self, idx: usize) -> usize {
        self.rope
            .line(idx)
            .chars()
            .filter(|ch| *ch != '\n' && *ch != '\r')
            .map(|ch| {
                if ch == '\t' {
                    TAB_WIDTH
                } else {
                    ch.width().unwrap_or(0)
                }
            })
            .sum()
    }

    /// Content-space rows `(first_row, row_count)` of a 1-indexed line.
    fn rows_of(&self, line: usize) -> Option<(usize, usize)> {
        if line == 0 || line >= self.row_starts.len() {
            return None;
        }
        let first = self.row_starts[line - 1];
        Some((first, self.row_starts[line] - first))
    }

    fn row_rect(&self, first_row: usize, rows: usize) -> Rect {
        let top = self.metrics.padding_top + first_row as f64 * self.metrics.line_height;
        let bottom = top + rows as f64 * self.metrics.line_height;
        Rect::new(self.scroll.to_viewport(top), self.scroll.to_viewport(bottom))
    }

    /// Rect of the first row of a line, where a caret at its start sits.
    fn caret_rect(&self, line: usize) -> Option<Rect> {
        self.rows_of(line).map(|(first, _)| self.row_rect(first, 1))
    }
}

impl LayoutQuery for TextLayout {
    fn origin_top(&self) -> f64 {
        self.scroll.origin_top
    }

    fn scroll_top(&self) -> f64 {
        self.scroll.scroll_top
    }

    fn node_rects(&self, _index: usize, lines: LineRange) -> Vec<Rect> {
        [lines.start, lines.end]
            .into_iter()
            .filter_map(|line| self.caret_rect(line))
            .collect()
    }

    fn block_rect(&self, _index: usize, lines: LineRange) -> Option<Rect> {
        let first = self.line_rect(lines.start)?;
        let last = self.line_rect(lines.end).unwrap_or(first);
        Some(Rect::new(first.top, last.bottom))
    }

    fn line_rect(&self, line: usize) -> Option<Rect> {
        self.rows_of(line)
            .map(|(first, rows)| self.row_rect(first, rows))
    }

    fn wraps(&self) -> bool {
        self.wrap
    }
}

impl Viewport for TextLayout {
    fn scroll_state(&self) -> Option<ScrollState> {
        Some(self.scroll.state(self.content_height()))
    }

    fn set_scroll_top(&mut self, px: f64) {
        self.scroll.scroll_to(px, self.content_height());
    }

    fn measure_sections(&mut self, ranges: &[LineRange]) -> Vec<Section> {
        measure_sections(&*self, ranges)
    }
}

impl Present for TextLayout {
    fn present(&mut self, text: &str, _blocks: &[Block]) {
        self.set_text(text);
    }
}
