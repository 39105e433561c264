//! The controller that keeps both views scrolled to the same place.

use super::SyncSettings;
use super::animation::{FrameHandle, FrameScheduler, ScrollAnimation};
use super::clock::Clock;
use super::debounce::Debouncer;
use super::mapper::{MappingTable, ScrollPosition, offset_for, position_at};
use super::state::{Decision, ScrollArbiter, SettleReason, SyncState};
use crate::document::LineRange;
use crate::viewport::{DimensionTracker, Pane, ScrollState, Section, Viewport};

/// A view with its last measurement and any scroll animation toward it.
#[derive(Debug)]
pub struct TrackedView<V> {
    view: V,
    tracker: DimensionTracker,
    animation: Option<ScrollAnimation>,
}

impl<V> TrackedView<V> {
    pub const fn new(view: V) -> Self {
        Self {
            view,
            tracker: DimensionTracker::new(),
            animation: None,
        }
    }

    pub const fn view(&self) -> &V {
        &self.view
    }

    /// Direct access to the view. Re-measure after changing its layout.
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Sections from the last measurement.
    pub fn section_info(&self) -> &[Section] {
        self.tracker.sections()
    }

    pub const fn tracker(&self) -> &DimensionTracker {
        &self.tracker
    }

    pub const fn animation(&self) -> Option<ScrollAnimation> {
        self.animation
    }

    pub const fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    fn stop<F: FrameScheduler + ?Sized>(&mut self, frames: &mut F) {
        if let Some(anim) = self.animation.take() {
            frames.cancel_frame(anim.handle);
        }
    }
}

impl<V: Viewport> TrackedView<V> {
    /// Measure `ranges` and replace the stored sections.
    pub fn measure_sections(&mut self, ranges: &[LineRange]) -> &[Section] {
        let sections = self.view.measure_sections(ranges);
        self.tracker.replace(sections);
        self.tracker.sections()
    }

    /// The section at the top of the view, or `None` before the view has
    /// layout or measurements.
    pub fn scroll_position(&self) -> Option<ScrollPosition> {
        let state = self.view.scroll_state()?;
        position_at(self.tracker.sections(), state.scroll_top, state.max_scroll())
    }

    pub fn scroll_to_offset(&mut self, px: f64) {
        self.view.set_scroll_top(px);
    }

    /// Scroll to a fraction of the scrollable range.
    pub fn scroll_to_percent(&mut self, fraction: f64) {
        if let Some(state) = self.view.scroll_state() {
            let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
            self.view.set_scroll_top(fraction * state.max_scroll());
        }
    }

    pub fn scroll_dimensions(&self) -> Option<ScrollState> {
        self.view.scroll_state()
    }

    fn section_offset(&self, index: usize, pos_in_section: f64) -> Option<f64> {
        let state = self.view.scroll_state()?;
        offset_for(self.tracker.sections(), index, pos_in_section, state.max_scroll())
    }

    /// Move toward `to`, animated when `duration_ms` is non-zero.
    ///
    /// A target within `threshold` of the running animation's target is
    /// ignored; any other target restarts from the current position.
    fn animate_to<F: FrameScheduler + ?Sized>(
        &mut self,
        to: f64,
        now_ms: u64,
        duration_ms: u64,
        threshold: f64,
        frames: &mut F,
    ) -> bool {
        let Some(state) = self.view.scroll_state() else {
            return false;
        };
        if let Some(anim) = self.animation {
            if (anim.to - to).abs() < threshold {
                return false;
            }
            self.stop(frames);
        }
        let from = state.scroll_top;
        if duration_ms == 0 || (to - from).abs() < 0.5 {
            self.view.set_scroll_top(to);
            return true;
        }
        let handle = frames.request_frame();
        self.animation = Some(ScrollAnimation {
            from,
            to,
            started_ms: now_ms,
            duration_ms,
            handle,
        });
        true
    }

    /// Advance the animation owning `handle`; returns the new scroll top.
    fn step<F: FrameScheduler + ?Sized>(&mut self, handle: FrameHandle, now_ms: u64, frames: &mut F) -> Option<f64> {
        let anim = self.animation.filter(|a| a.handle == handle)?;
        self.view.set_scroll_top(anim.sample(now_ms));
        self.animation = if anim.is_finished(now_ms) {
            None
        } else {
            Some(ScrollAnimation {
                handle: frames.request_frame(),
                ..anim
            })
        };
        self.view.scroll_state().map(|s| s.scroll_top)
    }
}

/// Mirrors scrolling between a source view `S` and a preview view `P`.
#[derive(Debug)]
pub struct SyncController<S, P, C, F> {
    source: TrackedView<S>,
    preview: TrackedView<P>,
    arbiter: ScrollArbiter,
    table: MappingTable,
    ranges: Vec<LineRange>,
    measure: Debouncer<()>,
    clock: C,
    frames: F,
}

impl<S, P, C, F> SyncController<S, P, C, F>
where
    S: Viewport,
    P: Viewport,
    C: Clock,
    F: FrameScheduler,
{
    pub fn new(source: S, preview: P, settings: SyncSettings, clock: C, frames: F) -> Self {
        Self {
            source: TrackedView::new(source),
            preview: TrackedView::new(preview),
            measure: Debouncer::new(settings.measure_debounce_ms),
            arbiter: ScrollArbiter::new(settings),
            table: MappingTable::default(),
            ranges: Vec::new(),
            clock,
            frames,
        }
    }

    pub const fn state(&self) -> SyncState {
        self.arbiter.state()
    }

    pub const fn settings(&self) -> &SyncSettings {
        self.arbiter.settings()
    }

    pub const fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn ranges(&self) -> &[LineRange] {
        &self.ranges
    }

    pub const fn source(&self) -> &TrackedView<S> {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut TrackedView<S> {
        &mut self.source
    }

    pub const fn preview(&self) -> &TrackedView<P> {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut TrackedView<P> {
        &mut self.preview
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn frames(&self) -> &F {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    pub fn scroll_state(&self, pane: Pane) -> Option<ScrollState> {
        match pane {
            Pane::Source => self.source.scroll_dimensions(),
            Pane::Preview => self.preview.scroll_dimensions(),
        }
    }

    pub fn scroll_position(&self, pane: Pane) -> Option<ScrollPosition> {
        match pane {
            Pane::Source => self.source.scroll_position(),
            Pane::Preview => self.preview.scroll_position(),
        }
    }

    pub const fn is_animating(&self, pane: Pane) -> bool {
        match pane {
            Pane::Source => self.source.is_animating(),
            Pane::Preview => self.preview.is_animating(),
        }
    }

    /// Handle a scroll event the host observed on `pane`.
    pub fn on_scroll(&mut self, pane: Pane, scroll: ScrollState) -> Decision {
        let now = self.clock.now_ms();
        let decision = self.arbiter.on_scroll(pane, scroll, now);
        tracing::trace!(
            target: "mdsync::sync",
            %pane,
            scroll_top = scroll.scroll_top,
            ?decision,
            "scroll event"
        );
        if decision == Decision::Sync {
            self.mirror(pane, scroll, now, true);
        }
        decision
    }

    /// Suspend synchronization until the matching re-measurement.
    pub fn begin_settling(&mut self, reason: SettleReason) {
        self.arbiter.begin_settling(reason);
        self.source.stop(&mut self.frames);
        self.preview.stop(&mut self.frames);
    }

    /// A view was resized or re-wrapped; re-measure once it stops changing.
    pub fn on_layout_change(&mut self, reason: SettleReason) {
        self.begin_settling(reason);
        self.measure.queue((), self.clock.now_ms());
    }

    /// Line ranges of the current block list, used by every measurement.
    pub fn set_ranges(&mut self, ranges: Vec<LineRange>) {
        self.ranges = ranges;
    }

    /// Both views show the latest render: measure and resume.
    pub fn content_rendered(&mut self) {
        self.remeasure();
        self.arbiter.settled(SettleReason::Rendering);
    }

    /// Measure both views against the current ranges and rebuild the table.
    pub fn remeasure(&mut self) {
        let _scope = crate::perf::scope("sync.remeasure");
        let source = self.source.measure_sections(&self.ranges).len();
        let preview = self.preview.measure_sections(&self.ranges).len();
        self.table = MappingTable::build(self.source.section_info(), self.preview.section_info());
        tracing::debug!(
            target: "mdsync::measure",
            blocks = self.ranges.len(),
            source,
            preview,
            paired = self.table.len(),
            "re-measured"
        );
        crate::perf::log_event(
            "sync.remeasure",
            format!(
                "blocks={} source={source} preview={preview} paired={}",
                self.ranges.len(),
                self.table.len()
            ),
        );
    }

    /// Run due timers: the debounced re-measure and the drive release.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        if self.measure.take_ready(now).is_some() {
            self.remeasure();
            self.arbiter.settled(SettleReason::Resizing);
        }
        self.release(now);
    }

    /// An animation frame requested through the scheduler fired.
    pub fn on_frame(&mut self, handle: FrameHandle) {
        let now = self.clock.now_ms();
        if let Some(top) = self.source.step(handle, now, &mut self.frames) {
            self.arbiter.observe(Pane::Source, top);
        } else if let Some(top) = self.preview.step(handle, now, &mut self.frames) {
            self.arbiter.observe(Pane::Preview, top);
        }
        self.release(now);
    }

    /// Scroll `pane` so block `index` sits at `pos_in_section`. Returns
    /// false when the block has not been measured in that view.
    pub fn scroll_to_section(&mut self, pane: Pane, index: usize, pos_in_section: f64, animate: bool) -> bool {
        let now = self.clock.now_ms();
        let duration = if animate { self.settings().animation_ms } else { 0 };
        let moved = match pane {
            Pane::Source => self
                .source
                .section_offset(index, pos_in_section)
                .map(|to| self.source.animate_to(to, now, duration, 0.0, &mut self.frames)),
            Pane::Preview => self
                .preview
                .section_offset(index, pos_in_section)
                .map(|to| self.preview.animate_to(to, now, duration, 0.0, &mut self.frames)),
        };
        self.observe(pane);
        moved.is_some()
    }

    pub fn scroll_to_offset(&mut self, pane: Pane, px: f64) {
        match pane {
            Pane::Source => {
                self.source.stop(&mut self.frames);
                self.source.scroll_to_offset(px);
            }
            Pane::Preview => {
                self.preview.stop(&mut self.frames);
                self.preview.scroll_to_offset(px);
            }
        }
        self.observe(pane);
    }

    pub fn scroll_to_percent(&mut self, pane: Pane, fraction: f64) {
        match pane {
            Pane::Source => {
                self.source.stop(&mut self.frames);
                self.source.scroll_to_percent(fraction);
            }
            Pane::Preview => {
                self.preview.stop(&mut self.frames);
                self.preview.scroll_to_percent(fraction);
            }
        }
        self.observe(pane);
    }

    /// Bring the other view in line with `from` immediately, as if `from`
    /// had just been scrolled. Does nothing while settling.
    pub fn resync(&mut self, from: Pane) {
        if matches!(self.state(), SyncState::Settling(_)) {
            return;
        }
        let Some(scroll) = self.scroll_state(from) else {
            return;
        };
        let now = self.clock.now_ms();
        self.arbiter.observe(from, scroll.scroll_top);
        self.arbiter.drive(from, now);
        self.mirror(from, scroll, now, false);
    }

    fn mirror(&mut self, from: Pane, scroll: ScrollState, now: u64, animate: bool) {
        let target_pane = from.other();
        let Some(target) = self.scroll_state(target_pane) else {
            return;
        };
        let to = self
            .table
            .map(from, scroll.scroll_top, scroll.max_scroll(), target.max_scroll());
        let threshold = self.arbiter.noise_threshold(target.client_height);
        let duration = if animate { self.settings().animation_ms } else { 0 };
        let changed = match target_pane {
            Pane::Source => self
                .source
                .animate_to(to, now, duration, threshold, &mut self.frames),
            Pane::Preview => self
                .preview
                .animate_to(to, now, duration, threshold, &mut self.frames),
        };
        if changed {
            tracing::trace!(target: "mdsync::sync", %from, to, "mirrored");
        }
        self.observe(target_pane);
    }

    fn observe(&mut self, pane: Pane) {
        if let Some(state) = self.scroll_state(pane) {
            self.arbiter.observe(pane, state.scroll_top);
        }
    }

    fn release(&mut self, now: u64) {
        let animating = match self.arbiter.state() {
            SyncState::DrivenBy(driver) => self.is_animating(driver.other()),
            _ => false,
        };
        self.arbiter.release_if_due(now, animating);
    }
}
