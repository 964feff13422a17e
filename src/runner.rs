//! Frame loop for a mounted effect.
//!
//! A host calls [`Animation::tick`] from its frame callback and forwards its
//! native events through [`Animation::handle`]. The animation decides whether
//! the callback turns into a rendered frame:
//!
//! - stopped animations do nothing ([`Tick::Idle`]),
//! - hidden pages and callbacks that arrive before the frame gate opens are
//!   skipped ([`Tick::Skipped`]),
//! - everything else updates and renders the effect ([`Tick::Rendered`]).
//!
//! Resizes are debounced: the effect is reseeded once, after the viewport
//! stayed unchanged for the configured delay.
//!
//! # Example
//!
//! ```ignore
//! use glint::prelude::*;
//!
//! let clock = ManualClock::new();
//! let effect = ParticleField::new(FieldConfig::default(), Some(1));
//! let mut animation = Animation::mount(
//!     Some(Viewport::new(1280.0, 720.0)),
//!     effect,
//!     clock.clone(),
//!     RunOptions::default(),
//! )
//! .expect("mount point present");
//!
//! animation.start();
//! let mut canvas = DrawList::new();
//! clock.advance_ms(16.7);
//! assert_eq!(animation.tick(&mut canvas), Tick::Rendered);
//! ```

use crate::color::Theme;
use crate::effects::{Effect, FrameContext};
use crate::input::{HostEvent, Pointer, PointerConfig};
use crate::render::Canvas;
use crate::time::{Clock, FrameGate, Time};
use crate::viewport::Viewport;
use std::time::Duration;

/// The two states of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

/// Outcome of one frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The animation is stopped.
    Idle,
    /// Too early for the next frame, or the page is hidden.
    Skipped,
    Rendered,
}

/// Settings the runner needs besides the effect itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    /// Zero or negative renders on every callback.
    pub target_fps: f32,
    pub pointer: PointerConfig,
    pub resize_debounce: Duration,
    pub theme: Theme,
    /// Multiplier on the effect's time step.
    pub time_scale: f32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            pointer: PointerConfig::default(),
            resize_debounce: Duration::from_millis(250),
            theme: Theme::Light,
            time_scale: 1.0,
        }
    }
}

/// Collapses bursts of resize events into one.
///
/// Every [`schedule`](Self::schedule) restarts the timer; [`poll`](Self::poll)
/// hands out the latest viewport once the delay has passed.
#[derive(Debug, Clone, Copy)]
pub struct ResizeDebouncer {
    delay: Duration,
    pending: Option<(Viewport, Duration)>,
}

impl ResizeDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn schedule(&mut self, viewport: Viewport, now: Duration) {
        self.pending = Some((viewport, now + self.delay));
    }

    pub fn poll(&mut self, now: Duration) -> Option<Viewport> {
        match self.pending {
            Some((viewport, due)) if now >= due => {
                self.pending = None;
                Some(viewport)
            }
            _ => None,
        }
    }
}

/// A mounted effect plus everything needed to drive it.
pub struct Animation<E: Effect> {
    effect: E,
    clock: Box<dyn Clock>,
    gate: FrameGate,
    time: Time,
    pointer: Pointer,
    resize: ResizeDebouncer,
    viewport: Viewport,
    theme: Theme,
    state: RunState,
    visible: bool,
    frame: u64,
}

impl<E: Effect> Animation<E> {
    /// Seed `effect` for the host's viewport.
    ///
    /// A missing mount point is not an error: it is logged and `None` is
    /// returned, so pages without the expected container simply show nothing.
    pub fn mount(
        viewport: Option<Viewport>,
        mut effect: E,
        clock: impl Clock + 'static,
        options: RunOptions,
    ) -> Option<Self> {
        let Some(viewport) = viewport else {
            log::warn!("No mount point for {}, not starting", effect.name());
            return None;
        };

        effect.seed(&viewport, options.theme);
        let mut time = Time::new();
        time.set_fixed_delta(Some(effect.time_step()));
        time.set_time_scale(options.time_scale);
        log::debug!(
            "{} mounted at {}x{} (target {} fps)",
            effect.name(),
            viewport.width,
            viewport.height,
            options.target_fps
        );

        Some(Self {
            effect,
            clock: Box::new(clock),
            gate: FrameGate::from_fps(options.target_fps),
            time,
            pointer: Pointer::new(options.pointer),
            resize: ResizeDebouncer::new(options.resize_debounce),
            viewport,
            theme: options.theme,
            state: RunState::Stopped,
            visible: true,
            frame: 0,
        })
    }

    pub fn start(&mut self) {
        if self.state == RunState::Running {
            return;
        }
        self.state = RunState::Running;
        self.gate.reset();
        self.time.resume(self.clock.now());
        log::debug!("{} running", self.effect.name());
    }

    pub fn stop(&mut self) {
        if self.state == RunState::Stopped {
            return;
        }
        self.state = RunState::Stopped;
        self.time.pause();
        log::debug!(
            "{} stopped after {} frames",
            self.effect.name(),
            self.frame
        );
    }

    pub fn handle(&mut self, event: HostEvent) {
        let now = self.clock.now();
        match event {
            HostEvent::Pointer(e) => self.pointer.handle(e, now, &self.viewport),
            HostEvent::Resized(viewport) => {
                if viewport.is_empty() {
                    log::warn!(
                        "Ignoring resize of {} to {}x{}",
                        self.effect.name(),
                        viewport.width,
                        viewport.height
                    );
                    return;
                }
                self.resize.schedule(viewport, now);
            }
            HostEvent::ThemeChanged(theme) => {
                if theme != self.theme {
                    self.theme = theme;
                    self.effect.set_theme(theme);
                    log::debug!("{} theme set to {:?}", self.effect.name(), theme);
                }
            }
            HostEvent::VisibilityChanged(visible) => {
                if visible == self.visible {
                    return;
                }
                self.visible = visible;
                if visible {
                    self.gate.reset();
                    self.time.resume(now);
                } else {
                    self.time.pause();
                }
            }
        }
    }

    /// One host frame callback.
    pub fn tick(&mut self, canvas: &mut dyn Canvas) -> Tick {
        if self.state == RunState::Stopped {
            return Tick::Idle;
        }
        let now = self.clock.now();

        if let Some(viewport) = self.resize.poll(now) {
            self.reseed(viewport);
        }
        if !self.visible || !self.gate.admit(now) {
            return Tick::Skipped;
        }

        let (effect_time, _) = self.time.update(now);
        let clicks = self.pointer.take_clicks();
        let ctx = FrameContext {
            time: effect_time,
            now,
            frame: self.frame,
            viewport: self.viewport,
            clicks: &clicks,
        };

        self.effect.update(&ctx, &self.pointer);
        canvas.clear();
        self.effect.render(canvas);
        self.pointer.end_frame();
        self.frame += 1;

        log::trace!(
            "{} frame {}: {} records, step {:.4}, {:.1} fps",
            self.effect.name(),
            self.frame,
            self.effect.record_count(),
            self.time.delta(),
            self.time.fps()
        );
        Tick::Rendered
    }

    fn reseed(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.effect.seed(&viewport, self.theme);
        log::debug!(
            "{} reseeded for {}x{}",
            self.effect.name(),
            viewport.width,
            viewport.height
        );
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    pub fn effect_mut(&mut self) -> &mut E {
        &mut self.effect
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Rendered frames since mount.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Sum of the scaled effect time steps over rendered frames.
    #[inline]
    pub fn effect_time(&self) -> f32 {
        self.time.elapsed()
    }

    pub fn time(&self) -> &Time {
        &self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_debouncer_waits_for_quiet() {
        let mut d = ResizeDebouncer::new(ms(250));
        let small = Viewport::new(400.0, 300.0);
        let large = Viewport::new(800.0, 600.0);

        d.schedule(small, ms(0));
        assert_eq!(d.poll(ms(200)), None);
        d.schedule(large, ms(200));
        assert_eq!(d.poll(ms(300)), None);
        assert_eq!(d.poll(ms(450)), Some(large));
        assert_eq!(d.poll(ms(900)), None);
        assert!(!d.is_pending());
    }

    #[test]
    fn test_default_options() {
        let options = RunOptions::default();
        assert_eq!(options.target_fps, 60.0);
        assert_eq!(options.resize_debounce, ms(250));
        assert_eq!(options.time_scale, 1.0);
    }
}
