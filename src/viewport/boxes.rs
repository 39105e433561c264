//! Headless preview: rendered blocks as a vertical stack of boxes.

use std::sync::LazyLock;

use regex::Regex;
use unicode_width::UnicodeWidthStr;

use super::tracker::{LayoutQuery, measure_sections};
use super::{Present, Rect, ScrollBox, ScrollState, Section, Viewport, columns_for};
use crate::document::{Block, LineRange};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());
static LEAD_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<([a-zA-Z][a-zA-Z0-9]*)").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Line height multipliers for `h1` through `h6`.
const HEADING_SCALES: [f64; 6] = [2.0, 1.6, 1.35, 1.2, 1.1, 1.0];

/// Pixel metrics of the preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxMetrics {
    pub line_height: f64,
    pub char_width: f64,
    /// Space below each block
    pub block_gap: f64,
    pub padding_top: f64,
    pub padding_bottom: f64,
}

impl Default for BoxMetrics {
    fn default() -> Self {
        Self {
            line_height: 24.0,
            char_width: 8.0,
            block_gap: 16.0,
            padding_top: 16.0,
            padding_bottom: 16.0,
        }
    }
}

/// Geometry of one block in the preview.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockBox {
    pub margin_top: f64,
    /// Heights of the child nodes, top to bottom
    pub nodes: Vec<f64>,
    pub margin_bottom: f64,
    /// Height of the box when it has no child nodes
    pub min_height: f64,
}

impl BlockBox {
    pub fn new(nodes: Vec<f64>, margin_bottom: f64) -> Self {
        Self {
            nodes,
            margin_bottom,
            ..Self::default()
        }
    }

    /// Border-box height.
    pub fn height(&self) -> f64 {
        self.nodes.iter().sum::<f64>().max(self.min_height)
    }

    fn outer_height(&self) -> f64 {
        self.margin_top + self.height() + self.margin_bottom
    }
}

/// The rendered document laid out as stacked block boxes.
#[derive(Debug, Clone)]
pub struct BoxLayout {
    boxes: Vec<BlockBox>,
    /// Content-space top of each box's border edge
    tops: Vec<f64>,
    content_height: f64,
    metrics: BoxMetrics,
    width_px: f64,
    scroll: ScrollBox,
    /// Rendered markup the boxes were estimated from, if any
    html: Option<Vec<String>>,
}

impl BoxLayout {
    /// A layout with explicit box geometry.
    pub fn new(boxes: Vec<BlockBox>, client_height: f64, metrics: BoxMetrics) -> Self {
        let mut layout = Self {
            boxes,
            tops: Vec::new(),
            content_height: 0.0,
            metrics,
            width_px: 0.0,
            scroll: ScrollBox::new(client_height),
            html: None,
        };
        layout.reflow();
        layout
    }

    /// Estimate box geometry from the blocks' rendered markup.
    pub fn from_rendered(blocks: &[Block], width_px: f64, client_height: f64, metrics: BoxMetrics) -> Self {
        let mut layout = Self::new(Vec::new(), client_height, metrics);
        layout.width_px = width_px;
        layout.load(blocks);
        layout
    }

    fn load(&mut self, blocks: &[Block]) {
        let html: Vec<String> = blocks.iter().map(|b| b.rendered.html.clone()).collect();
        self.boxes = html
            .iter()
            .map(|h| estimate_box(h, self.width_px, &self.metrics))
            .collect();
        self.html = Some(html);
        self.reflow();
    }

    pub fn boxes(&self) -> &[BlockBox] {
        &self.boxes
    }

    pub const fn content_height(&self) -> f64 {
        self.content_height
    }

    /// Resize the pane. Estimated layouts re-flow at the new width.
    pub fn set_size(&mut self, width_px: f64, client_height: f64) {
        self.scroll.client_height = client_height;
        if (self.width_px - width_px).abs() > f64::EPSILON {
            self.width_px = width_px;
            if let Some(html) = &self.html {
                self.boxes = html
                    .iter()
                    .map(|h| estimate_box(h, width_px, &self.metrics))
                    .collect();
            }
        }
        self.reflow();
    }

    pub const fn set_origin_top(&mut self, px: f64) {
        self.scroll.origin_top = px;
    }

    fn reflow(&mut self) {
        let mut y = self.metrics.padding_top;
        self.tops = self
            .boxes
            .iter()
            .map(|b| {
                let top = y + b.margin_top;
                y += b.outer_height();
                top
            })
            .collect();
        self.content_height = y + self.metrics.padding_bottom;
        self.scroll.clamp(self.content_height);
    }

    fn rect(&self, top: f64, height: f64) -> Rect {
        Rect::new(
            self.scroll.to_viewport(top),
            self.scroll.to_viewport(top + height),
        )
    }
}

impl LayoutQuery for BoxLayout {
    fn origin_top(&self) -> f64 {
        self.scroll.origin_top
    }

    fn scroll_top(&self) -> f64 {
        self.scroll.scroll_top
    }

    fn node_rects(&self, index: usize, _lines: LineRange) -> Vec<Rect> {
        let (Some(block), Some(&top)) = (self.boxes.get(index), self.tops.get(index)) else {
            return Vec::new();
        };
        let mut y = top;
        block
            .nodes
            .iter()
            .map(|&height| {
                let rect = self.rect(y, height);
                y += height;
                rect
            })
            .collect()
    }

    fn block_rect(&self, index: usize, _lines: LineRange) -> Option<Rect> {
        let block = self.boxes.get(index)?;
        let top = *self.tops.get(index)?;
        Some(self.rect(top, block.height()))
    }
}

impl Viewport for BoxLayout {
    fn scroll_state(&self) -> Option<ScrollState> {
        Some(self.scroll.state(self.content_height))
    }

    fn set_scroll_top(&mut self, px: f64) {
        self.scroll.scroll_to(px, self.content_height);
    }

    fn measure_sections(&mut self, ranges: &[LineRange]) -> Vec<Section> {
        measure_sections(&*self, ranges)
    }
}

impl Present for BoxLayout {
    fn present(&mut self, _text: &str, blocks: &[Block]) {
        self.load(blocks);
    }
}

/// Guess the box a fragment of rendered markup would produce.
fn estimate_box(html: &str, width_px: f64, metrics: &BoxMetrics) -> BlockBox {
    if html.trim().is_empty() {
        return BlockBox::default();
    }
    let line = metrics.line_height;
    let tag = LEAD_TAG_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();

    let nodes = match tag.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<usize>().unwrap_or(6);
            let scale = HEADING_SCALES[level.clamp(1, 6) - 1];
            let rows = wrapped_rows(&plain_text(html), width_px, metrics.char_width * scale);
            vec![rows as f64 * line * scale]
        }
        "pre" => {
            let text = strip_tags(html);
            let rows = text.trim_end_matches('\n').lines().count().max(1);
            vec![rows as f64 * line]
        }
        "table" => split_items(html, "<tr")
            .map(|_| line)
            .collect(),
        "ul" | "ol" => split_items(html, "<li")
            .map(|item| wrapped_rows(&plain_text(item), width_px, metrics.char_width) as f64 * line)
            .collect(),
        "hr" => vec![line / 2.0],
        _ => {
            let text = plain_text(html);
            if text.is_empty() {
                vec![line]
            } else {
                vec![wrapped_rows(&text, width_px, metrics.char_width) as f64 * line]
            }
        }
    };
    BlockBox::new(nodes, metrics.block_gap)
}

/// The fragments following each `marker`, with the marker's own tag
/// remainder removed.
fn split_items<'a>(html: &'a str, marker: &'a str) -> impl Iterator<Item = &'a str> {
    html.split(marker)
        .skip(1)
        .map(|item| item.split_once('>').map_or(item, |(_, rest)| rest))
}

fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, "");
    ENTITY_RE.replace_all(&text, "x").into_owned()
}

/// Visible text with whitespace collapsed.
fn plain_text(html: &str) -> String {
    SPACE_RE
        .replace_all(strip_tags(html).trim(), " ")
        .into_owned()
}

fn wrapped_rows(text: &str, width_px: f64, char_width: f64) -> usize {
    text.width().div_ceil(columns_for(width_px, char_width)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Rendered, Segment};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn block(ordinal: usize, line: usize, html: &str) -> Block {
        let lines = LineRange::new(line, line);
        Block::new(
            ordinal,
            Segment {
                source: format!("block {ordinal}"),
                lines,
                extent: lines,
            },
            Rendered::ok(html.to_string()),
        )
    }

    fn metrics() -> BoxMetrics {
        BoxMetrics::default()
    }

    #[test]
    fn test_boxes_stack_with_gaps() {
        let boxes = vec![BlockBox::new(vec![24.0], 16.0), BlockBox::new(vec![48.0], 16.0)];
        let mut layout = BoxLayout::new(boxes, 100.0, metrics());
        let sections = layout.measure_sections(&[LineRange::new(1, 1), LineRange::new(3, 4)]);
        assert!(approx(sections[0].dimension.start_offset, 16.0));
        assert!(approx(sections[0].dimension.end_offset, 40.0));
        assert!(approx(sections[1].dimension.start_offset, 56.0));
        assert!(approx(sections[1].dimension.end_offset, 104.0));
        assert!(approx(layout.content_height(), 16.0 + 40.0 + 64.0 + 16.0));
    }

    #[test]
    fn test_empty_box_has_no_geometry() {
        let boxes = vec![
            BlockBox::new(vec![24.0], 0.0),
            BlockBox::default(),
            BlockBox::new(vec![24.0], 0.0),
        ];
        let mut layout = BoxLayout::new(boxes, 100.0, metrics());
        let ranges = [LineRange::new(1, 1), LineRange::new(2, 2), LineRange::new(3, 3)];
        let sections = layout.measure_sections(&ranges);
        let indices: Vec<_> = sections.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_min_height_box_measures_through_block_rect() {
        let boxes = vec![BlockBox {
            min_height: 30.0,
            ..BlockBox::default()
        }];
        let mut layout = BoxLayout::new(boxes, 100.0, metrics());
        let sections = layout.measure_sections(&[LineRange::new(1, 1)]);
        assert!(approx(sections[0].dimension.height, 30.0));
    }

    #[test]
    fn test_heading_scales_line_height() {
        let h1 = estimate_box("<h1 data-sourcepos=\"1:1-1:3\">A</h1>\n", 800.0, &metrics());
        let h3 = estimate_box("<h3>A</h3>\n", 800.0, &metrics());
        assert!(approx(h1.height(), 48.0));
        assert!(approx(h3.height(), 24.0 * 1.35));
    }

    #[test]
    fn test_paragraph_wraps_at_pane_width() {
        // 80px is ten columns; 25 characters need three rows.
        let para = estimate_box("<p>this line is twenty-five!</p>", 80.0, &metrics());
        assert!(approx(para.height(), 72.0));
    }

    #[test]
    fn test_entities_count_as_one_column() {
        let para = estimate_box("<p>a &amp; b &lt;&gt;</p>", 56.0, &metrics());
        // "a x b xx" is eight columns at seven per row.
        assert!(approx(para.height(), 48.0));
    }

    #[test]
    fn test_code_block_takes_row_per_line() {
        let html = "<pre class=\"md-code\"><code><span>a</span>\nb\nc\n</code></pre>\n";
        assert!(approx(estimate_box(html, 800.0, &metrics()).height(), 72.0));
    }

    #[test]
    fn test_list_item_per_node() {
        let html = "<ul>\n<li>one</li>\n<li>two\n<ul>\n<li>nested</li>\n</ul>\n</li>\n</ul>\n";
        let list = estimate_box(html, 800.0, &metrics());
        assert_eq!(list.nodes.len(), 3);
    }

    #[test]
    fn test_table_row_per_node() {
        let html = "<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td>1</td>\n</tr>\n<tr>\n<td>2</td>\n</tr>\n</tbody>\n</table>\n";
        assert_eq!(estimate_box(html, 800.0, &metrics()).nodes.len(), 3);
    }

    #[test]
    fn test_empty_markup_has_no_nodes() {
        let empty = estimate_box("  \n", 800.0, &metrics());
        assert!(empty.nodes.is_empty());
        assert!(approx(empty.outer_height(), 0.0));
    }

    #[test]
    fn test_width_change_reflows_estimates() {
        let blocks = vec![block(0, 1, "<p>this line is twenty-five!</p>")];
        let mut layout = BoxLayout::from_rendered(&blocks, 800.0, 100.0, metrics());
        let wide = layout.boxes()[0].height();
        layout.set_size(80.0, 100.0);
        assert!(layout.boxes()[0].height() > wide);
    }

    #[test]
    fn test_present_reloads_blocks() {
        let mut layout = BoxLayout::from_rendered(&[], 800.0, 100.0, metrics());
        assert!(layout.boxes().is_empty());
        layout.present("", &[block(0, 1, "<p>a</p>"), block(1, 3, "<p>b</p>")]);
        assert_eq!(layout.boxes().len(), 2);
    }

    #[test]
    fn test_scroll_clamps_and_offsets_stay_fixed() {
        let boxes = (0..20).map(|_| BlockBox::new(vec![24.0], 16.0)).collect();
        let mut layout = BoxLayout::new(boxes, 200.0, metrics());
        let before = layout.measure_sections(&[LineRange::new(1, 1)]);
        layout.set_scroll_top(1e9);
        let state = layout.scroll_state().unwrap();
        assert!(approx(state.scroll_top, state.max_scroll()));
        let after = layout.measure_sections(&[LineRange::new(1, 1)]);
        assert!(approx(before[0].dimension.start_offset, after[0].dimension.start_offset));
    }
}
