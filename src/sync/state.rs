//! Deciding which scroll events drive synchronization.

use serde::Serialize;

use super::SyncSettings;
use crate::viewport::{Pane, ScrollState};

/// Why synchronization is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleReason {
    /// New content is being rendered
    Rendering,
    /// A view changed size or wrapping
    Resizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    /// The pane's scroll events are being mirrored onto the other pane
    DrivenBy(Pane),
    /// Section offsets are stale; nothing is mirrored
    Settling(SettleReason),
}

/// Outcome of one scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Mirror the event onto the other pane
    Sync,
    /// The other pane is driving; this is the echo of our own correction
    Feedback,
    /// Moved less than the noise threshold
    BelowThreshold,
    Settling,
}

/// The drive state machine.
#[derive(Debug, Clone)]
pub struct ScrollArbiter {
    state: SyncState,
    settings: SyncSettings,
    /// Last scroll top accepted or observed per pane
    baselines: [Option<f64>; 2],
    last_drive_ms: u64,
}

impl ScrollArbiter {
    pub const fn new(settings: SyncSettings) -> Self {
        Self {
            state: SyncState::Idle,
            settings,
            baselines: [None, None],
            last_drive_ms: 0,
        }
    }

    pub const fn state(&self) -> SyncState {
        self.state
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Smallest movement treated as intentional for a view this tall.
    pub fn noise_threshold(&self, client_height: f64) -> f64 {
        let s = &self.settings;
        (client_height * s.noise_fraction).clamp(s.noise_min_px, s.noise_max_px.max(s.noise_min_px))
    }

    pub fn on_scroll(&mut self, pane: Pane, scroll: ScrollState, now_ms: u64) -> Decision {
        let top = scroll.scroll_top;
        match self.state {
            SyncState::Settling(_) => {
                self.baselines[pane.index()] = Some(top);
                Decision::Settling
            }
            SyncState::DrivenBy(driver) if driver != pane => {
                self.baselines[pane.index()] = Some(top);
                Decision::Feedback
            }
            _ => {
                let moved = self.baselines[pane.index()].map_or(f64::INFINITY, |base| (top - base).abs());
                let at_extreme = top <= 0.0 || top >= scroll.max_scroll() - 1.0;
                let threshold = self.noise_threshold(scroll.client_height);
                if moved < threshold && !(at_extreme && moved > 0.0) {
                    // Small moves from the driver still hold the drive.
                    if self.state == SyncState::DrivenBy(pane) {
                        self.last_drive_ms = now_ms;
                    }
                    return Decision::BelowThreshold;
                }
                self.baselines[pane.index()] = Some(top);
                self.drive(pane, now_ms);
                Decision::Sync
            }
        }
    }

    /// Make `pane` the driver as of `now_ms`.
    pub fn drive(&mut self, pane: Pane, now_ms: u64) {
        if self.state != SyncState::DrivenBy(pane) {
            tracing::trace!(target: "mdsync::sync", %pane, "driving");
        }
        self.state = SyncState::DrivenBy(pane);
        self.last_drive_ms = now_ms;
    }

    /// Record a scroll position the controller set itself.
    pub fn observe(&mut self, pane: Pane, scroll_top: f64) {
        self.baselines[pane.index()] = Some(scroll_top);
    }

    /// Release the driver once it has been quiet long enough and nothing is
    /// still animating toward the driven pane. Returns whether it released.
    pub fn release_if_due(&mut self, now_ms: u64, animating: bool) -> bool {
        let SyncState::DrivenBy(pane) = self.state else {
            return false;
        };
        if animating || now_ms.saturating_sub(self.last_drive_ms) < self.settings.drive_release_ms {
            return false;
        }
        tracing::trace!(target: "mdsync::sync", %pane, "drive released");
        self.state = SyncState::Idle;
        true
    }

    /// Suspend synchronization. A pending render outranks a resize.
    pub fn begin_settling(&mut self, reason: SettleReason) {
        if self.state == SyncState::Settling(SettleReason::Rendering) {
            return;
        }
        self.state = SyncState::Settling(reason);
    }

    /// Leave `Settling(reason)` after a completed re-measurement.
    pub fn settled(&mut self, reason: SettleReason) -> bool {
        if self.state == SyncState::Settling(reason) {
            self.state = SyncState::Idle;
            true
        } else {
            false
        }
    }
}
