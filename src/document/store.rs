//! The block list of the document being edited.

use serde::Serialize;

use super::context::{RenderContext, uses_definitions};
use super::diff::{DiffSummary, diff_blocks};
use super::segment::{line_count, segment};
use super::types::{Block, BlockChange, LineRange};
use crate::render::{BlockRenderer, escape_html, render_block};

/// What one update pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPass {
    /// Store revision after the pass
    pub revision: u64,
    /// Per-position classification against the previous block list
    pub changes: Vec<BlockChange>,
    /// Blocks converted by the renderer in this pass
    pub rendered: usize,
    /// Blocks whose previous output was reused
    pub reused: usize,
    /// Rendered blocks that came back as error placeholders
    pub failed: usize,
}

impl RenderPass {
    pub fn summary(&self) -> DiffSummary {
        DiffSummary::of(&self.changes)
    }
}

/// Owns the current blocks and re-renders only what changed.
#[derive(Debug)]
pub struct BlockStore<R> {
    renderer: R,
    blocks: Vec<Block>,
    /// Definitions the current renders were produced with
    context: RenderContext,
    line_count: usize,
    revision: u64,
}

impl<R: BlockRenderer> BlockStore<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            blocks: Vec::new(),
            context: RenderContext::default(),
            line_count: 0,
            revision: 0,
        }
    }

    /// Re-segment `text` and replace the block list.
    ///
    /// Positions classified `keep` reuse the previous output; `add` and
    /// `update` positions are rendered. A block that fails to render becomes
    /// a placeholder without affecting its siblings. When the document's
    /// link or footnote definitions change, kept blocks that may refer to
    /// them are rendered again.
    pub fn update(&mut self, text: &str) -> RenderPass {
        let _scope = crate::perf::scope("store.update");
        let segments = segment(text);
        let changes = diff_blocks(&self.blocks, &segments);
        let context = RenderContext::collect(&segments);
        let context_changed = context != self.context;

        let mut previous = std::mem::take(&mut self.blocks).into_iter();
        let mut blocks = Vec::with_capacity(segments.len());
        let (mut rendered, mut reused, mut failed) = (0, 0, 0);
        for (ordinal, (segment, change)) in segments.into_iter().zip(&changes).enumerate() {
            let old = previous.next();
            let output = match (change, old) {
                (BlockChange::Keep, Some(old)) if !(context_changed && uses_definitions(&old.source)) => {
                    reused += 1;
                    old.rendered
                }
                _ => {
                    rendered += 1;
                    let output = render_block(&self.renderer, &segment.source, &context);
                    if output.is_error() {
                        failed += 1;
                    }
                    output
                }
            };
            blocks.push(Block::new(ordinal, segment, output));
        }

        self.blocks = blocks;
        self.context = context;
        self.line_count = line_count(text);
        self.revision += 1;

        let pass = RenderPass {
            revision: self.revision,
            changes,
            rendered,
            reused,
            failed,
        };
        tracing::debug!(
            target: "mdsync::store",
            revision = pass.revision,
            blocks = self.blocks.len(),
            rendered,
            reused,
            failed,
            "render pass"
        );
        crate::perf::log_event(
            "store.update",
            format!(
                "revision={} blocks={} rendered={rendered} reused={reused} failed={failed}",
                pass.revision,
                self.blocks.len()
            ),
        );
        pass
    }

    pub const fn renderer(&self) -> &R {
        &self.renderer
    }
}

impl<R> BlockStore<R> {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Link and footnote definitions of the current document.
    pub const fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Number of source lines in the last text passed to `update`.
    pub const fn line_count(&self) -> usize {
        self.line_count
    }

    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Structural line ranges of the blocks, in document order.
    pub fn line_ranges(&self) -> Vec<LineRange> {
        self.blocks.iter().map(|b| b.lines).collect()
    }

    /// Index of the block whose extent holds `line`.
    pub fn block_for_line(&self, line: usize) -> Option<usize> {
        let idx = self.blocks.partition_point(|b| b.extent.end < line);
        self.blocks
            .get(idx)
            .filter(|b| b.extent.contains(line))
            .map(|_| idx)
    }

    /// The rendered document body: every block wrapped with its identity and
    /// absolute line span.
    pub fn assemble_html(&self) -> String {
        let mut html = String::new();
        for block in &self.blocks {
            html.push_str(&format!(
                "<div class=\"md-block\" data-block=\"{}\" data-line-start=\"{}\" data-line-end=\"{}\">\n",
                escape_html(&block.id),
                block.lines.start,
                block.lines.end
            ));
            html.push_str(&block.rendered.html);
            html.push_str("</div>\n");
        }
        html
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::render::{HtmlRenderer, RenderError};
    use BlockChange::{Add, Keep, Remove, Update};

    /// Counts calls and fails on sources containing "FAIL".
    #[derive(Default)]
    struct CountingRenderer {
        calls: Cell<usize>,
    }

    impl BlockRenderer for CountingRenderer {
        fn render(&self, source: &str) -> Result<String, RenderError> {
            self.calls.set(self.calls.get() + 1);
            if source.contains("FAIL") {
                return Err(RenderError::Other("bad block".to_string()));
            }
            Ok(format!("<p>{source}</p>"))
        }
    }

    #[test]
    fn test_first_update_renders_everything() {
        let mut store = BlockStore::new(CountingRenderer::default());
        let pass = store.update("# A\n\ntext\n\n# B\n");
        assert_eq!(pass.changes, vec![Add, Add, Add]);
        assert_eq!(pass.rendered, 3);
        assert_eq!(pass.reused, 0);
        assert_eq!(store.blocks().len(), 3);
    }

    #[test]
    fn test_identical_update_reuses_every_render() {
        let mut store = BlockStore::new(CountingRenderer::default());
        store.update("# A\n\ntext\n\n# B\n");
        let pass = store.update("# A\n\ntext\n\n# B\n");
        assert_eq!(pass.changes, vec![Keep, Keep, Keep]);
        assert_eq!(pass.rendered, 0);
        assert_eq!(store.renderer().calls.get(), 3);
    }

    #[test]
    fn test_edit_renders_only_the_changed_block() {
        let mut store = BlockStore::new(CountingRenderer::default());
        store.update("# A\n\ntext\n\n# B\n");
        let pass = store.update("# A\n\nnew text\n\n# B\n");
        assert_eq!(pass.changes, vec![Keep, Update, Keep]);
        assert_eq!(pass.rendered, 1);
        assert_eq!(pass.reused, 2);
        assert_eq!(store.blocks()[1].rendered.html, "<p>new text</p>");
    }

    #[test]
    fn test_removed_blocks_are_dropped() {
        let mut store = BlockStore::new(CountingRenderer::default());
        store.update("a\n\nb\n\nc\n");
        let pass = store.update("a\n");
        assert_eq!(pass.changes, vec![Keep, Remove, Remove]);
        assert_eq!(store.blocks().len(), 1);
    }

    #[test]
    fn test_failed_block_does_not_affect_siblings() {
        let mut store = BlockStore::new(CountingRenderer::default());
        let pass = store.update("one\n\nFAIL two\n\nthree\n");
        assert_eq!(pass.failed, 1);
        let blocks = store.blocks();
        assert_eq!(blocks[0].rendered.html, "<p>one</p>");
        assert!(blocks[1].rendered.html.contains("md-render-error"));
        assert_eq!(blocks[1].rendered.error.as_deref(), Some("bad block"));
        assert_eq!(blocks[2].rendered.html, "<p>three</p>");
    }

    #[test]
    fn test_kept_block_gets_fresh_id_when_it_moves() {
        let mut store = BlockStore::new(CountingRenderer::default());
        store.update("# A\n\ntext\n");
        let before = store.blocks()[1].id.clone();
        store.update("# A\n\n\n\ntext\n");
        let after = &store.blocks()[1];
        assert_ne!(before, after.id);
        assert_eq!(after.lines, LineRange::new(5, 5));
        assert_eq!(after.rendered.html, "<p>text</p>");
    }

    #[test]
    fn test_block_for_line_uses_extents() {
        let mut store = BlockStore::new(CountingRenderer::default());
        store.update("# A\n\ntext\n\n# B\n");
        assert_eq!(store.block_for_line(1), Some(0));
        assert_eq!(store.block_for_line(2), Some(0));
        assert_eq!(store.block_for_line(3), Some(1));
        assert_eq!(store.block_for_line(5), Some(2));
        assert_eq!(store.block_for_line(6), None);
        assert_eq!(store.block_for_line(0), None);
    }

    #[test]
    fn test_assemble_html_wraps_blocks_with_lines() {
        let mut store = BlockStore::new(HtmlRenderer::default());
        store.update("# A\n\ntext\n");
        let html = store.assemble_html();
        assert!(html.contains("data-line-start=\"1\" data-line-end=\"1\""));
        assert!(html.contains("data-line-start=\"3\" data-line-end=\"3\""));
        assert_eq!(html.matches("class=\"md-block\"").count(), 2);
    }

    #[test]
    fn test_reference_link_resolves_across_blocks() {
        let mut store = BlockStore::new(HtmlRenderer::default());
        store.update("See [docs][1] and note[^n].\n\n[1]: https://example.com\n\n[^n]: a footnote\n");
        let blocks = store.blocks();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].rendered.html.contains("href=\"https://example.com\""));
        assert!(blocks[0].rendered.html.contains(">docs</a>"));
        assert!(blocks[0].rendered.html.contains("href=\"#fn-n\""));
        assert!(!blocks[0].rendered.html.contains("[^n]"));
        assert!(!blocks[0].rendered.html.contains("<section"));
        assert!(blocks[2].rendered.html.contains("id=\"fn-n\""));
        assert!(blocks[2].rendered.html.contains("a footnote"));
    }

    #[test]
    fn test_definitions_only_document_has_a_block() {
        let mut store = BlockStore::new(HtmlRenderer::default());
        store.update("[1]: https://example.com\n");
        assert_eq!(store.blocks().len(), 1);
        assert_eq!(store.block_for_line(1), Some(0));
    }

    #[test]
    fn test_changed_definition_rerenders_blocks_that_use_it() {
        let mut store = BlockStore::new(HtmlRenderer::default());
        store.update("See [docs][1].\n\n[1]: https://example.com\n\nplain\n");
        let pass = store.update("See [docs][1].\n\n[1]: https://example.org\n\nplain\n");
        assert_eq!(pass.changes, vec![Keep, Update, Keep]);
        assert_eq!(pass.rendered, 2);
        assert_eq!(pass.reused, 1);
        assert!(store.blocks()[0].rendered.html.contains("href=\"https://example.org\""));
    }

    #[test]
    fn test_unchanged_definitions_keep_referencing_blocks() {
        let mut store = BlockStore::new(HtmlRenderer::default());
        store.update("See [docs][1].\n\ntext\n\n[1]: https://example.com\n");
        let pass = store.update("See [docs][1].\n\nnew text\n\n[1]: https://example.com\n");
        assert_eq!(pass.changes, vec![Keep, Update, Keep]);
        assert_eq!(pass.rendered, 1);
    }

    #[test]
    fn test_empty_text_clears_blocks() {
        let mut store = BlockStore::new(CountingRenderer::default());
        store.update("a\n\nb");
        let pass = store.update("   \n");
        assert_eq!(pass.changes, vec![Remove, Remove]);
        assert!(store.blocks().is_empty());
        assert_eq!(store.revision(), 2);
    }
}
