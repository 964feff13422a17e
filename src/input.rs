//! Pointer and host input.
//!
//! The host translates its native events into [`HostEvent`]s and hands them
//! to the runner. Event handlers only write fields here; the next rendered
//! frame reads them. The `Pointer` struct tracks both instantaneous events
//! (clicks since the last frame) and continuous state (position, recent
//! velocity, whether it is still moving).
//!
//! # Usage
//!
//! ```ignore
//! animation.handle(HostEvent::Pointer(PointerEvent::Moved(Vec2::new(320.0, 200.0))));
//!
//! // Inside an effect's update:
//! if ctx.pointer.is_moving(ctx.now) {
//!     self.center += (ctx.pointer.position() - self.center) * 0.03;
//! }
//! ```

use crate::color::Theme;
use crate::viewport::Viewport;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pointer events in surface coordinates (CSS pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved(Vec2),
    /// The pointer left the surface or the document.
    Left,
    Pressed(Vec2),
}

/// Everything the host can tell a running animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Pointer(PointerEvent),
    Resized(Viewport),
    ThemeChanged(Theme),
    /// Page visibility; hidden pages keep their state but skip rendering.
    VisibilityChanged(bool),
}

impl From<PointerEvent> for HostEvent {
    fn from(event: PointerEvent) -> Self {
        HostEvent::Pointer(event)
    }
}

/// Tuning for pointer tracking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    /// How long after the last move the pointer still counts as moving.
    #[serde(with = "millis")]
    pub idle_timeout: Duration,
    /// Moves closer together than this are dropped. Zero keeps every move.
    #[serde(with = "millis")]
    pub sample_interval: Duration,
    /// Velocity is pixels per millisecond times this factor.
    pub velocity_scale: f32,
    /// Upper bound for `speed()`, in pixels per move.
    pub speed_cap: f32,
    /// Per-frame multiplier applied to `speed()`.
    pub speed_decay: f32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(2000),
            sample_interval: Duration::ZERO,
            velocity_scale: 8.0,
            speed_cap: 50.0,
            speed_decay: 0.95,
        }
    }
}

/// Pointer state shared between event handlers and the frame callback.
#[derive(Debug, Clone)]
pub struct Pointer {
    config: PointerConfig,
    position: Vec2,
    last_position: Option<Vec2>,
    velocity: Vec2,
    speed: f32,
    active: bool,
    last_move: Option<Duration>,
    clicks: Vec<Vec2>,
}

impl Pointer {
    pub fn new(config: PointerConfig) -> Self {
        Self {
            config,
            position: Vec2::ZERO,
            last_position: None,
            velocity: Vec2::ZERO,
            speed: 0.0,
            active: false,
            last_move: None,
            clicks: Vec::new(),
        }
    }

    pub fn config(&self) -> &PointerConfig {
        &self.config
    }

    /// Record a pointer event received at `now`.
    pub fn handle(&mut self, event: PointerEvent, now: Duration, viewport: &Viewport) {
        match event {
            PointerEvent::Moved(position) => self.moved(position, now, viewport),
            PointerEvent::Left => {
                self.active = false;
                self.last_position = None;
            }
            PointerEvent::Pressed(position) => {
                if viewport.contains(position, 0.0) {
                    self.clicks.push(position);
                }
            }
        }
    }

    fn moved(&mut self, position: Vec2, now: Duration, viewport: &Viewport) {
        if let Some(last) = self.last_move {
            if now.saturating_sub(last) < self.config.sample_interval {
                return;
            }
        }

        if let (Some(last_pos), Some(last_time)) = (self.last_position, self.last_move) {
            let delta = position - last_pos;
            let dt_ms = now.saturating_sub(last_time).as_secs_f32() * 1000.0;
            if self.active && dt_ms > 0.0 {
                self.velocity = delta / dt_ms * self.config.velocity_scale;
            }
            self.speed = delta.length().min(self.config.speed_cap);
        }

        self.position = position;
        self.last_position = Some(position);
        self.active = viewport.contains(position, 0.0);
        self.last_move = Some(now);
    }

    /// Call once per rendered frame, after the effect has updated.
    pub fn end_frame(&mut self) {
        self.speed *= self.config.speed_decay;
    }

    /// Clicks received since the last call.
    pub fn take_clicks(&mut self) -> Vec<Vec2> {
        std::mem::take(&mut self.clicks)
    }

    /// Last known position; meaningful even after the pointer left.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Position while the pointer is over the surface.
    #[inline]
    pub fn active_position(&self) -> Option<Vec2> {
        self.active.then_some(self.position)
    }

    /// Velocity of the last sampled move.
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Distance covered by the last move, capped and decaying per frame.
    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Clock reading of the last accepted move.
    #[inline]
    pub fn last_move(&self) -> Option<Duration> {
        self.last_move
    }

    /// Whether the pointer moved within the idle timeout.
    pub fn is_moving(&self, now: Duration) -> bool {
        self.last_move
            .is_some_and(|t| now.saturating_sub(t) < self.config.idle_timeout)
    }
}

impl Default for Pointer {
    fn default() -> Self {
        Self::new(PointerConfig::default())
    }
}

/// Serde helper storing a `Duration` as whole milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn viewport() -> Viewport {
        Viewport::new(800.0, 600.0)
    }

    #[test]
    fn test_move_sets_active_and_position() {
        let mut pointer = Pointer::default();
        pointer.handle(PointerEvent::Moved(Vec2::new(100.0, 50.0)), ms(0), &viewport());
        assert!(pointer.is_active());
        assert_eq!(pointer.active_position(), Some(Vec2::new(100.0, 50.0)));

        pointer.handle(PointerEvent::Moved(Vec2::new(900.0, 50.0)), ms(10), &viewport());
        assert!(!pointer.is_active());
        assert_eq!(pointer.active_position(), None);
    }

    #[test]
    fn test_velocity_scaled_per_ms() {
        let mut pointer = Pointer::default();
        pointer.handle(PointerEvent::Moved(Vec2::new(100.0, 100.0)), ms(0), &viewport());
        pointer.handle(PointerEvent::Moved(Vec2::new(120.0, 100.0)), ms(10), &viewport());
        // 20px over 10ms = 2 px/ms, times 8
        assert!((pointer.velocity().x - 16.0).abs() < 1e-3);
        assert_eq!(pointer.velocity().y, 0.0);
        assert!((pointer.speed() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_speed_capped_and_decays() {
        let mut pointer = Pointer::default();
        pointer.handle(PointerEvent::Moved(Vec2::new(0.0, 0.0)), ms(0), &viewport());
        pointer.handle(PointerEvent::Moved(Vec2::new(300.0, 0.0)), ms(16), &viewport());
        assert_eq!(pointer.speed(), 50.0);

        pointer.end_frame();
        assert!((pointer.speed() - 47.5).abs() < 1e-3);
    }

    #[test]
    fn test_moving_timeout() {
        let mut pointer = Pointer::default();
        assert!(!pointer.is_moving(ms(0)));
        pointer.handle(PointerEvent::Moved(Vec2::new(10.0, 10.0)), ms(1000), &viewport());
        assert!(pointer.is_moving(ms(2999)));
        assert!(!pointer.is_moving(ms(3000)));
    }

    #[test]
    fn test_sample_interval_drops_moves() {
        let config = PointerConfig {
            sample_interval: ms(80),
            ..Default::default()
        };
        let mut pointer = Pointer::new(config);
        pointer.handle(PointerEvent::Moved(Vec2::new(10.0, 10.0)), ms(0), &viewport());
        pointer.handle(PointerEvent::Moved(Vec2::new(50.0, 10.0)), ms(40), &viewport());
        assert_eq!(pointer.position(), Vec2::new(10.0, 10.0));
        pointer.handle(PointerEvent::Moved(Vec2::new(50.0, 10.0)), ms(80), &viewport());
        assert_eq!(pointer.position(), Vec2::new(50.0, 10.0));
    }

    #[test]
    fn test_leave_resets_speed_tracking() {
        let mut pointer = Pointer::default();
        pointer.handle(PointerEvent::Moved(Vec2::new(10.0, 10.0)), ms(0), &viewport());
        pointer.handle(PointerEvent::Left, ms(5), &viewport());
        assert!(!pointer.is_active());

        // Re-entering far away is not a 50px jump
        pointer.handle(PointerEvent::Moved(Vec2::new(700.0, 500.0)), ms(10), &viewport());
        assert_eq!(pointer.speed(), 0.0);
    }

    #[test]
    fn test_clicks_taken_once() {
        let mut pointer = Pointer::default();
        pointer.handle(PointerEvent::Pressed(Vec2::new(5.0, 5.0)), ms(0), &viewport());
        pointer.handle(PointerEvent::Pressed(Vec2::new(-5.0, 5.0)), ms(0), &viewport());
        assert_eq!(pointer.take_clicks(), vec![Vec2::new(5.0, 5.0)]);
        assert!(pointer.take_clicks().is_empty());
    }
}
