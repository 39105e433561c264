//! Scroll synchronization between the source and preview views.
//!
//! The [`SyncController`] owns both views, a [`MappingTable`] built from their
//! last measurements, and the drive state machine. Everything time-based is
//! polled against an injected [`Clock`]; animation frames come from a
//! [`FrameScheduler`] the host drives.

mod animation;
mod clock;
mod controller;
mod debounce;
mod mapper;
mod state;

pub use animation::{FrameHandle, FrameScheduler, ManualFrames, ScrollAnimation, ease_out_cubic};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{SyncController, TrackedView};
pub use debounce::Debouncer;
pub use mapper::{MappingTable, ScrollPosition, SectionPair, offset_for, position_at};
pub use state::{Decision, ScrollArbiter, SettleReason, SyncState};

/// Timing and threshold constants of the sync layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    /// Noise threshold as a fraction of the view's client height
    pub noise_fraction: f64,
    pub noise_min_px: f64,
    pub noise_max_px: f64,
    /// Quiet time after the last driving event before the drive is released
    pub drive_release_ms: u64,
    /// Duration of a smoothed scroll; 0 jumps straight to the target
    pub animation_ms: u64,
    /// Quiet time after an edit before re-rendering
    pub edit_debounce_ms: u64,
    /// Quiet time after a resize before re-measuring
    pub measure_debounce_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            noise_fraction: 0.02,
            noise_min_px: 2.0,
            noise_max_px: 16.0,
            drive_release_ms: 200,
            animation_ms: 160,
            edit_debounce_ms: 250,
            measure_debounce_ms: 100,
        }
    }
}
