//! Splitting a document into top-level blocks with comrak.

use comrak::{Arena, Options, parse_document};

use super::types::{LineRange, Segment};

/// Split `source` into its top-level structural units.
///
/// Each segment carries the line span comrak reports for the node and an
/// extent that widens that span over the blank lines that follow it, so the
/// extents of all segments tile `1..=line_count(source)` exactly.
///
/// # Example
///
/// ```
/// use mdsync::document::segment;
///
/// let segments = segment("# A\n\ntext\n\n# B\n");
/// let spans: Vec<_> = segments.iter().map(|s| (s.lines.start, s.lines.end)).collect();
/// assert_eq!(spans, vec![(1, 1), (3, 3), (5, 5)]);
/// ```
pub fn segment(source: &str) -> Vec<Segment> {
    if source.trim().is_empty() {
        return Vec::new();
    }

    let table = LineTable::new(source);
    let total = table.len();
    let spans = cover_definitions(&table, source, &top_level_spans(&table, source));

    let mut segments = Vec::with_capacity(spans.len());
    for (i, lines) in spans.iter().enumerate() {
        let extent_start = if i == 0 { 1 } else { lines.start };
        let extent_end = spans.get(i + 1).map_or(total, |next| next.start - 1);
        segments.push(Segment {
            source: table.slice(source, *lines).to_string(),
            lines: *lines,
            extent: LineRange::new(extent_start, extent_end),
        });
    }

    tracing::trace!(
        target: "mdsync::segment",
        lines = total,
        blocks = segments.len(),
        "segmented document"
    );
    segments
}

/// Number of lines in `source`, counted the way `str::lines` counts them.
pub fn line_count(source: &str) -> usize {
    source.split_inclusive('\n').count()
}

/// Parser options shared by segmentation and rendering.
pub(crate) fn configure_extensions(options: &mut Options) {
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.superscript = true;
    options.extension.subscript = true;
    options.extension.description_lists = true;
}

/// Line spans of the document's top-level nodes, normalized so they are
/// ordered, non-overlapping, inside `1..=total` and free of trailing blank
/// lines.
fn top_level_spans(table: &LineTable, source: &str) -> Vec<LineRange> {
    let total = table.len();
    let arena = Arena::new();
    let mut options = Options::default();
    configure_extensions(&mut options);
    let root = parse_document(&arena, source, &options);

    // Footnote definitions are moved to the end of the tree.
    let mut positions: Vec<(usize, usize)> = root
        .children()
        .map(|node| {
            let pos = node.data.borrow().sourcepos;
            (pos.start.line, pos.end.line)
        })
        .collect();
    positions.sort_unstable();

    let mut spans: Vec<LineRange> = Vec::new();
    for (mut start, end) in positions {
        if start == 0 || start > total {
            continue;
        }
        let mut end = end.max(start).min(total);
        while end > start && table.line(source, end).trim().is_empty() {
            end -= 1;
        }
        if let Some(prev) = spans.last()
            && start <= prev.end
        {
            start = prev.end + 1;
        }
        // Nothing left of this node; its lines stay in the previous extent.
        if start > end {
            continue;
        }
        spans.push(LineRange::new(start, end));
    }
    spans
}

/// Add a span for every run of non-blank lines no node claims.
///
/// Link reference definitions and unreferenced footnotes leave no node
/// behind, but their lines still belong to a block.
fn cover_definitions(table: &LineTable, source: &str, spans: &[LineRange]) -> Vec<LineRange> {
    let mut covered = Vec::with_capacity(spans.len());
    let mut nodes = spans.iter().peekable();
    let mut run: Option<usize> = None;
    let mut line = 1;
    while line <= table.len() {
        if let Some(span) = nodes.next_if(|span| span.start == line) {
            if let Some(start) = run.take() {
                covered.push(LineRange::new(start, line - 1));
            }
            covered.push(*span);
            line = span.end + 1;
            continue;
        }
        let blank = table.line(source, line).trim().is_empty();
        match (blank, run) {
            (false, None) => run = Some(line),
            (true, Some(start)) => {
                covered.push(LineRange::new(start, line - 1));
                run = None;
            }
            _ => {}
        }
        line += 1;
    }
    if let Some(start) = run {
        covered.push(LineRange::new(start, table.len()));
    }
    covered
}

/// Byte offsets of each line, without line terminators.
struct LineTable {
    lines: Vec<(usize, usize)>,
}

impl LineTable {
    fn new(source: &str) -> Self {
        let mut lines = Vec::new();
        let mut offset = 0;
        for piece in source.split_inclusive('\n') {
            let content = piece
                .strip_suffix('\n')
                .map_or(piece, |s| s.strip_suffix('\r').unwrap_or(s));
            lines.push((offset, offset + content.len()));
            offset += piece.len();
        }
        Self { lines }
    }

    const fn len(&self) -> usize {
        self.lines.len()
    }

    fn line<'a>(&self, source: &'a str, n: usize) -> &'a str {
        self.slice(source, LineRange::new(n, n))
    }

    fn slice<'a>(&self, source: &'a str, range: LineRange) -> &'a str {
        let start = self.lines[range.start - 1].0;
        let end = self.lines[range.end - 1].1;
        &source[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(source: &str) -> Vec<(usize, usize)> {
        segment(source)
            .iter()
            .map(|s| (s.lines.start, s.lines.end))
            .collect()
    }

    fn extents(source: &str) -> Vec<(usize, usize)> {
        segment(source)
            .iter()
            .map(|s| (s.extent.start, s.extent.end))
            .collect()
    }

    #[test]
    fn test_segment_headings_and_paragraph() {
        assert_eq!(spans("# A\n\ntext\n\n# B\n"), vec![(1, 1), (3, 3), (5, 5)]);
    }

    #[test]
    fn test_segment_sources_are_exact_lines() {
        let segments = segment("# A\n\ntext\nmore\n\n# B\n");
        let sources: Vec<_> = segments.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(sources, vec!["# A", "text\nmore", "# B"]);
    }

    #[test]
    fn test_segment_empty_document() {
        assert!(segment("").is_empty());
    }

    #[test]
    fn test_segment_whitespace_only_document() {
        assert!(segment("  \n\n\t\n").is_empty());
    }

    #[test]
    fn test_segment_extents_cover_blank_lines() {
        assert_eq!(extents("# A\n\ntext\n\n# B\n"), vec![(1, 2), (3, 4), (5, 5)]);
    }

    #[test]
    fn test_segment_leading_blank_lines_belong_to_first_block() {
        let segments = segment("\n\n# A\n");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].lines, LineRange::new(3, 3));
        assert_eq!(segments[0].extent, LineRange::new(1, 3));
    }

    #[test]
    fn test_segment_trailing_blank_lines_belong_to_last_block() {
        let segments = segment("# A\n\n\n");
        assert_eq!(segments[0].extent, LineRange::new(1, 3));
    }

    #[test]
    fn test_segment_fenced_code_is_one_block() {
        let md = "intro\n\n```rust\nfn main() {}\n\nlet x = 1;\n```\n\nafter";
        assert_eq!(spans(md), vec![(1, 1), (3, 7), (9, 9)]);
    }

    #[test]
    fn test_segment_unterminated_fence_runs_to_end() {
        let md = "```\ncode\n\nmore";
        assert_eq!(spans(md), vec![(1, 4)]);
    }

    #[test]
    fn test_segment_list_is_one_block() {
        let md = "- one\n- two\n- three\n\npara";
        assert_eq!(spans(md), vec![(1, 3), (5, 5)]);
    }

    #[test]
    fn test_segment_table_is_one_block() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n\ntext";
        assert_eq!(spans(md), vec![(1, 3), (5, 5)]);
    }

    #[test]
    fn test_segment_crlf_sources_drop_terminators() {
        let segments = segment("# A\r\n\r\ntext\r\n");
        assert_eq!(segments[0].source, "# A");
        assert_eq!(segments[1].source, "text");
    }

    #[test]
    fn test_segment_is_deterministic() {
        let md = "# A\n\n- x\n- y\n\n> quote\n\n```\ncode\n```\n";
        assert_eq!(segment(md), segment(md));
    }

    #[test]
    fn test_segment_reference_definitions_are_blocks() {
        let md = "See [docs][1] and note[^n].\n\n[1]: https://example.com\n\n[^n]: a footnote\n";
        assert_eq!(spans(md), vec![(1, 1), (3, 3), (5, 5)]);
        assert_eq!(extents(md), vec![(1, 2), (3, 4), (5, 5)]);
    }

    #[test]
    fn test_segment_definitions_only_document() {
        let segments = segment("[a]: https://a.example\n[b]: https://b.example\n");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].lines, LineRange::new(1, 2));
    }

    #[test]
    fn test_segment_footnote_before_later_blocks_keeps_order() {
        let md = "text[^a]\n\n[^a]: note\n\n# After\n";
        assert_eq!(spans(md), vec![(1, 1), (3, 3), (5, 5)]);
    }

    #[test]
    fn test_segment_unreferenced_footnote_is_a_block() {
        let md = "# A\n\n[^lonely]: never cited\n";
        assert_eq!(spans(md), vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn test_line_count_ignores_trailing_newline() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\n"), 1);
        assert_eq!(line_count("a\n\n"), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn markdown_line() -> impl Strategy<Value = String> {
            prop_oneof![
                Just(String::new()),
                Just("# Heading".to_string()),
                Just("plain text".to_string()),
                Just("- item".to_string()),
                Just("1. step".to_string()),
                Just("> quoted".to_string()),
                Just("```".to_string()),
                Just("    indented".to_string()),
                Just("| a | b |".to_string()),
                Just("|---|---|".to_string()),
                Just("---".to_string()),
                Just("[ref]: https://example.com".to_string()),
                "[a-z ]{0,12}",
            ]
        }

        fn markdown_document() -> impl Strategy<Value = String> {
            (prop::collection::vec(markdown_line(), 0..40), any::<bool>()).prop_map(
                |(lines, trailing_newline)| {
                    let mut doc = lines.join("\n");
                    if trailing_newline {
                        doc.push('\n');
                    }
                    doc
                },
            )
        }

        proptest! {
            #[test]
            fn extents_tile_the_document(doc in markdown_document()) {
                let segments = segment(&doc);
                if doc.trim().is_empty() {
                    prop_assert!(segments.is_empty());
                    return Ok(());
                }
                let mut expected_start = 1;
                for seg in &segments {
                    prop_assert_eq!(seg.extent.start, expected_start);
                    prop_assert!(seg.extent.end >= seg.extent.start);
                    expected_start = seg.extent.end + 1;
                }
                prop_assert_eq!(expected_start - 1, line_count(&doc));
            }

            #[test]
            fn lines_sit_inside_extents(doc in markdown_document()) {
                for seg in segment(&doc) {
                    prop_assert!(seg.extent.start <= seg.lines.start);
                    prop_assert!(seg.lines.end <= seg.extent.end);
                }
            }

            #[test]
            fn sources_match_their_lines(doc in markdown_document()) {
                let lines: Vec<&str> = doc.lines().collect();
                for seg in segment(&doc) {
                    let expected = lines[seg.lines.start - 1..seg.lines.end].join("\n");
                    prop_assert_eq!(&seg.source, &expected);
                }
            }
        }
    }
}
