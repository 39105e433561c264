//! Eased scroll animation and frame scheduling.

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Source of animation frames.
///
/// The host calls back into the controller with the handle once the frame
/// fires. A cancelled handle must not be delivered.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

impl<F: FrameScheduler + ?Sized> FrameScheduler for &mut F {
    fn request_frame(&mut self) -> FrameHandle {
        (**self).request_frame()
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        (**self).cancel_frame(handle);
    }
}

/// Frames kept in a queue the host drains itself.
#[derive(Debug, Default)]
pub struct ManualFrames {
    next: u64,
    pending: Vec<FrameHandle>,
    cancelled: usize,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every frame requested so far.
    pub fn drain(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[FrameHandle] {
        &self.pending
    }

    /// Number of frames cancelled over the scheduler's life.
    pub const fn cancelled(&self) -> usize {
        self.cancelled
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let before = self.pending.len();
        self.pending.retain(|h| *h != handle);
        if self.pending.len() != before {
            self.cancelled += 1;
        }
    }
}

/// Cubic ease-out over `t` in `0.0..=1.0`.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// An in-flight scroll from one offset to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnimation {
    pub from: f64,
    pub to: f64,
    pub started_ms: u64,
    pub duration_ms: u64,
    /// The frame currently requested for this animation
    pub handle: FrameHandle,
}

impl ScrollAnimation {
    /// Offset at `now_ms`.
    pub fn sample(&self, now_ms: u64) -> f64 {
        let t = self.progress(now_ms);
        self.from + (self.to - self.from) * ease_out_cubic(t)
    }

    pub fn progress(&self, now_ms: u64) -> f64 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.started_ms);
        (elapsed as f64 / self.duration_ms as f64).min(1.0)
    }

    pub fn is_finished(&self, now_ms: u64) -> bool {
        self.progress(now_ms) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ease_out_endpoints() {
        assert!(approx(ease_out_cubic(0.0), 0.0));
        assert!(approx(ease_out_cubic(1.0), 1.0));
        assert!(ease_out_cubic(0.5) > 0.5);
        assert!(approx(ease_out_cubic(2.0), 1.0));
    }

    #[test]
    fn test_animation_reaches_target() {
        let anim = ScrollAnimation {
            from: 100.0,
            to: 300.0,
            started_ms: 1000,
            duration_ms: 160,
            handle: FrameHandle(1),
        };
        assert!(approx(anim.sample(1000), 100.0));
        let mid = anim.sample(1080);
        assert!(mid > 200.0 && mid < 300.0);
        assert!(approx(anim.sample(1160), 300.0));
        assert!(anim.is_finished(1200));
    }

    #[test]
    fn test_zero_duration_jumps() {
        let anim = ScrollAnimation {
            from: 0.0,
            to: 50.0,
            started_ms: 0,
            duration_ms: 0,
            handle: FrameHandle(1),
        };
        assert!(approx(anim.sample(0), 50.0));
    }

    #[test]
    fn test_manual_frames_cancel() {
        let mut frames = ManualFrames::new();
        let a = frames.request_frame();
        let b = frames.request_frame();
        frames.cancel_frame(a);
        assert_eq!(frames.pending(), &[b]);
        assert_eq!(frames.cancelled(), 1);
        assert_eq!(frames.drain(), vec![b]);
        assert!(frames.pending().is_empty());
    }
}
