//! Clocks, frame gating and time tracking.
//!
//! Nothing in the engine reads the wall clock directly. The runner owns a
//! [`Clock`] and every time-dependent decision (frame gate, resize debounce,
//! pointer idle timeout, glow schedules) works off its readings, so tests can
//! drive a whole animation with a [`ManualClock`].
//!
//! # Example
//!
//! ```ignore
//! use glint::time::{Clock, FrameGate, ManualClock, Time};
//!
//! let clock = ManualClock::new();
//! let mut gate = FrameGate::from_fps(60.0);
//! let mut time = Time::new();
//!
//! clock.advance_ms(16.7);
//! if gate.admit(clock.now()) {
//!     time.update(clock.now());
//!     println!("Frame {} at {:.2}s", time.frame(), time.elapsed());
//! }
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Real time, measured from when the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for tests and headless runs.
///
/// Clones share the same reading, so a test can keep one handle while the
/// runner owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: f64) {
        self.advance(Duration::from_secs_f64(ms.max(0.0) / 1000.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Caps the render rate by skipping callbacks that arrive too early.
///
/// On admit the reference point is moved back by the overshoot
/// (`last = now - elapsed % interval`) so the average rate stays at the
/// target even when callbacks arrive at a different cadence.
#[derive(Debug, Clone, Copy)]
pub struct FrameGate {
    interval: Duration,
    last: Option<Duration>,
}

impl FrameGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Gate for a target frame rate. Zero or negative means uncapped.
    pub fn from_fps(fps: f32) -> Self {
        if fps > 0.0 {
            Self::new(Duration::from_secs_f64(1.0 / fps as f64))
        } else {
            Self::new(Duration::ZERO)
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a frame should be rendered at `now`. The first call always
    /// admits.
    pub fn admit(&mut self, now: Duration) -> bool {
        let Some(last) = self.last else {
            self.last = Some(now);
            return true;
        };

        let elapsed = now.saturating_sub(last);
        if elapsed < self.interval {
            return false;
        }

        let interval_ns = self.interval.as_nanos();
        let overshoot = if interval_ns == 0 {
            0
        } else {
            (elapsed.as_nanos() % interval_ns) as u64
        };
        self.last = Some(now.saturating_sub(Duration::from_nanos(overshoot)));
        true
    }

    /// Forget the reference point; the next call admits.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Time tracking for rendered frames.
///
/// Provides consistent timing information including elapsed time, delta time,
/// frame counting, and FPS calculation. Readings come from the caller's
/// [`Clock`] instead of the system clock.
///
/// `elapsed` is the sum of the scaled deltas, so with a fixed delta it
/// advances by exactly `fixed_delta * time_scale` per update no matter how
/// irregular the callbacks are.
#[derive(Debug, Clone)]
pub struct Time {
    /// Clock reading of the first update.
    start: Option<Duration>,
    /// Clock reading of the last frame.
    last_frame: Duration,
    /// Total elapsed time in seconds (cached for fast access).
    elapsed_secs: f32,
    /// Time since last frame in seconds.
    delta_secs: f32,
    /// Total frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Time of last FPS calculation.
    fps_update_time: Duration,
    /// How often to update FPS calculation.
    fps_update_interval: Duration,
    /// Whether time is paused.
    paused: bool,
    /// Fixed delta time for deterministic updates (optional).
    fixed_delta: Option<f32>,
    /// Time scale multiplier (1.0 = normal speed).
    time_scale: f32,
}

impl Time {
    pub fn new() -> Self {
        Self {
            start: None,
            last_frame: Duration::ZERO,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: Duration::ZERO,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
        }
    }

    /// Update timing values. Call once per rendered frame.
    ///
    /// Returns `(elapsed_time, delta_time)` for convenience.
    pub fn update(&mut self, now: Duration) -> (f32, f32) {
        if self.start.is_none() {
            self.start = Some(now);
            self.last_frame = now;
            self.fps_update_time = now;
        }

        if self.paused {
            self.delta_secs = 0.0;
            return (self.elapsed_secs, self.delta_secs);
        }

        let raw_delta = now.saturating_sub(self.last_frame).as_secs_f32();
        self.delta_secs = self.fixed_delta.unwrap_or(raw_delta) * self.time_scale;
        self.last_frame = now;
        self.elapsed_secs += self.delta_secs;

        self.frame_count += 1;

        let fps_elapsed = now.saturating_sub(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        (self.elapsed_secs, self.delta_secs)
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second, measured over the last half second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Pause time progression.
    ///
    /// While paused, `delta()` returns 0 and `elapsed()` stops increasing.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume time progression after pausing.
    pub fn resume(&mut self, now: Duration) {
        if self.paused {
            self.last_frame = now;
            self.paused = false;
        }
    }

    /// Set a fixed delta time for deterministic updates.
    ///
    /// Pass `None` to use real frame timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Set time scale multiplier. Negative values clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(ms(250));
        assert_eq!(clock.now(), ms(250));
    }

    #[test]
    fn test_gate_skips_early_frames() {
        let mut gate = FrameGate::new(ms(50));
        assert!(gate.admit(ms(0)));
        assert!(!gate.admit(ms(20)));
        assert!(!gate.admit(ms(49)));
        assert!(gate.admit(ms(50)));
    }

    #[test]
    fn test_gate_keeps_overshoot() {
        let mut gate = FrameGate::new(ms(50));
        gate.admit(ms(0));
        // 70ms late: the next reference point is 50, not 70
        assert!(gate.admit(ms(70)));
        assert!(gate.admit(ms(100)));
        assert!(!gate.admit(ms(120)));
    }

    #[test]
    fn test_gate_uncapped() {
        let mut gate = FrameGate::from_fps(0.0);
        assert!(gate.admit(ms(0)));
        assert!(gate.admit(ms(0)));
    }

    #[test]
    fn test_time_update() {
        let mut time = Time::new();
        time.update(ms(1000));
        let (elapsed, delta) = time.update(ms(1010));

        assert!((elapsed - 0.01).abs() < 1e-4);
        assert!((delta - 0.01).abs() < 1e-4);
        assert_eq!(time.frame(), 2);
    }

    #[test]
    fn test_time_pause() {
        let mut time = Time::new();
        time.update(ms(0));
        time.update(ms(100));

        time.pause();
        assert!(time.is_paused());
        let elapsed_before = time.elapsed();
        time.update(ms(500));

        // Elapsed should not increase while paused
        assert_eq!(time.elapsed(), elapsed_before);
        assert_eq!(time.delta(), 0.0);

        time.resume(ms(500));
        time.update(ms(600));
        assert!((time.elapsed() - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_time_scale() {
        let mut time = Time::new();
        time.set_time_scale(2.0);
        assert_eq!(time.time_scale(), 2.0);

        // Negative scale should clamp to 0
        time.set_time_scale(-1.0);
        assert_eq!(time.time_scale(), 0.0);
    }

    #[test]
    fn test_fixed_delta() {
        let mut time = Time::new();
        time.set_fixed_delta(Some(1.0 / 60.0));
        time.update(ms(0));
        time.update(ms(100));

        let expected = 1.0 / 60.0;
        assert!((time.delta() - expected).abs() < 0.0001);
    }

    #[test]
    fn test_fixed_delta_accumulates_scaled() {
        let mut time = Time::new();
        time.set_fixed_delta(Some(0.5));
        time.set_time_scale(2.0);
        // irregular callbacks do not matter with a fixed step
        for now in [0, 3, 400, 401] {
            time.update(ms(now));
        }
        assert_eq!(time.delta(), 1.0);
        assert_eq!(time.elapsed(), 4.0);
        assert_eq!(time.frame(), 4);
    }

    #[test]
    fn test_fps_measured() {
        let mut time = Time::new();
        for i in 0..=50 {
            time.update(ms(i * 20));
        }
        assert!((time.fps() - 50.0).abs() < 1.0);
    }
}
