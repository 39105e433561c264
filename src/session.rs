//! An editing session: the document, its two views and the sync between them.
//!
//! The session sequences the pipeline. Edits are debounced; a due edit is
//! segmented, diffed and rendered, both views are reloaded, and only then are
//! they re-measured. Layout changes suspend synchronization until the next
//! measurement.

use crate::document::{BlockStore, RenderPass};
use crate::render::BlockRenderer;
use crate::sync::{
    Clock, Debouncer, Decision, FrameScheduler, ManualFrames, SettleReason, SyncController, SyncSettings,
    SystemClock,
};
use crate::viewport::{BoxLayout, BoxMetrics, Pane, Present, TextLayout, TextMetrics, Viewport};

pub type Controller<C, F> = SyncController<TextLayout, BoxLayout, C, F>;

#[derive(Debug)]
pub struct Session<R, C, F> {
    store: BlockStore<R>,
    text: String,
    edits: Debouncer<String>,
    controller: Controller<C, F>,
}

impl<R: BlockRenderer> Session<R, SystemClock, ManualFrames> {
    /// A session over default-sized headless views on wall-clock time.
    pub fn headless(renderer: R, source_width: f64, preview_width: f64, height: f64, settings: SyncSettings) -> Self {
        Self::new(
            renderer,
            TextLayout::new("", source_width, height, TextMetrics::default()),
            BoxLayout::from_rendered(&[], preview_width, height, BoxMetrics::default()),
            settings,
            SystemClock::new(),
            ManualFrames::new(),
        )
    }
}

impl<R, C, F> Session<R, C, F>
where
    R: BlockRenderer,
    C: Clock,
    F: FrameScheduler,
{
    pub fn new(
        renderer: R,
        source: TextLayout,
        preview: BoxLayout,
        settings: SyncSettings,
        clock: C,
        frames: F,
    ) -> Self {
        Self {
            store: BlockStore::new(renderer),
            text: String::new(),
            edits: Debouncer::new(settings.edit_debounce_ms),
            controller: SyncController::new(source, preview, settings, clock, frames),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn store(&self) -> &BlockStore<R> {
        &self.store
    }

    pub const fn controller(&self) -> &Controller<C, F> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller<C, F> {
        &mut self.controller
    }

    /// Render `text` right away, skipping the edit debounce.
    pub fn load(&mut self, text: impl Into<String>) -> RenderPass {
        self.edits.cancel();
        self.controller.begin_settling(SettleReason::Rendering);
        self.apply(text.into())
    }

    /// The text changed; re-render once typing pauses.
    pub fn edit(&mut self, text: impl Into<String>) {
        let now = self.controller.clock().now_ms();
        self.edits.queue(text.into(), now);
        self.controller.begin_settling(SettleReason::Rendering);
    }

    pub const fn has_pending_edit(&self) -> bool {
        self.edits.is_pending()
    }

    /// Run whatever is due. Returns the render pass if one ran.
    pub fn tick(&mut self) -> Option<RenderPass> {
        let now = self.controller.clock().now_ms();
        let pass = self.edits.take_ready(now).map(|text| self.apply(text));
        self.controller.tick();
        pass
    }

    fn apply(&mut self, text: String) -> RenderPass {
        let _scope = crate::perf::scope("session.apply");
        let pass = self.store.update(&text);
        let blocks = self.store.blocks();
        self.controller.source_mut().view_mut().present(&text, blocks);
        self.controller.preview_mut().view_mut().present(&text, blocks);
        self.controller.set_ranges(self.store.line_ranges());
        self.controller.content_rendered();
        self.controller.resync(Pane::Source);
        self.text = text;
        pass
    }

    /// Resize both panes.
    pub fn resize(&mut self, source_width: f64, preview_width: f64, height: f64) {
        self.controller.source_mut().view_mut().set_size(source_width, height);
        self.controller.preview_mut().view_mut().set_size(preview_width, height);
        self.controller.on_layout_change(SettleReason::Resizing);
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        if self.controller.source().view().wrap() != wrap {
            self.controller.source_mut().view_mut().set_wrap(wrap);
            self.controller.on_layout_change(SettleReason::Resizing);
        }
    }

    pub fn set_preview_width(&mut self, width: f64) {
        let Some(height) = self.controller.scroll_state(Pane::Preview).map(|s| s.client_height) else {
            return;
        };
        self.controller.preview_mut().view_mut().set_size(width, height);
        self.controller.on_layout_change(SettleReason::Resizing);
    }

    /// Scroll `pane` to `px` and forward the resulting event, the way a
    /// host reports a user scroll.
    pub fn scroll(&mut self, pane: Pane, px: f64) -> Option<Decision> {
        let state = match pane {
            Pane::Source => {
                let view = self.controller.source_mut().view_mut();
                view.set_scroll_top(px);
                view.scroll_state()
            }
            Pane::Preview => {
                let view = self.controller.preview_mut().view_mut();
                view.set_scroll_top(px);
                view.scroll_state()
            }
        }?;
        Some(self.controller.on_scroll(pane, state))
    }

    /// Bring the preview to the block holding source `line`.
    pub fn reveal_line(&mut self, line: usize) -> bool {
        self.store
            .block_for_line(line)
            .is_some_and(|index| self.controller.scroll_to_section(Pane::Preview, index, 0.0, true))
    }
}
