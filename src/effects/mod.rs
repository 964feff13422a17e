//! Animated backgrounds.
//!
//! Every effect follows the same three stages: [`Effect::seed`] builds the
//! records for a viewport, [`Effect::update`] advances them by one frame, and
//! [`Effect::render`] draws them. The runner drives the stages and owns time,
//! input and frame pacing; an effect owns nothing but its own records.
//!
//! | Effect | Records |
//! |--------|---------|
//! | [`ParticleField`] | free particles in a rect, sphere or shell |
//! | [`Lattice`] | vertices and edges of nested cubes, plus an optional point cloud |
//! | [`SignalGrid`] | a line grid plus fast signal particles |
//! | [`DotMatrix`] | a checkerboard of dots plus ripples |
//! | [`MatrixRain`] | falling glyph columns |
//! | [`QuantumField`] | species groups plus interaction lines |
//! | [`Panels`] | dashboard panels drifting through depth |

pub mod dots;
pub mod field;
pub mod lattice;
pub mod panels;
pub mod quantum;
pub mod rain;
pub mod signals;

pub use dots::{DotConfig, DotMatrix, Ripple, RippleConfig};
pub use field::{FieldConfig, ParticleField, Volume};
pub use lattice::{InteriorConfig, Lattice, LatticeConfig, StreamConfig};
pub use panels::{PanelConfig, Panels};
pub use quantum::{QuantumConfig, QuantumField};
pub use rain::{MatrixRain, RainConfig};
pub use signals::{SignalConfig, SignalGrid};

use crate::color::Theme;
use crate::input::Pointer;
use crate::render::Canvas;
use crate::viewport::Viewport;
use glam::Vec2;
use std::time::Duration;

/// Per-frame values handed to [`Effect::update`].
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Effect time accumulator, advanced by the effect's time step per frame.
    pub time: f32,
    /// Clock reading for this frame.
    pub now: Duration,
    /// Rendered frames since the effect started.
    pub frame: u64,
    pub viewport: Viewport,
    /// Clicks inside the surface since the previous frame.
    pub clicks: &'a [Vec2],
}

impl<'a> FrameContext<'a> {
    /// Context for tests and one-off updates.
    pub fn at(time: f32, frame: u64, viewport: Viewport) -> Self {
        Self {
            time,
            now: Duration::ZERO,
            frame,
            viewport,
            clicks: &[],
        }
    }

    /// Clock reading in milliseconds.
    #[inline]
    pub fn now_ms(&self) -> f64 {
        self.now.as_secs_f64() * 1000.0
    }
}

/// An animated background.
pub trait Effect {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Replace all records with a fresh set for `viewport`.
    fn seed(&mut self, viewport: &Viewport, theme: Theme);

    /// Advance one frame.
    fn update(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer);

    /// Draw the current frame. Must not change simulation state.
    fn render(&self, canvas: &mut dyn Canvas);

    /// Switch palettes without reseeding.
    fn set_theme(&mut self, theme: Theme);

    /// Time accumulator increment per rendered frame.
    fn time_step(&self) -> f32 {
        0.01
    }

    /// Number of live records, for logs and tests.
    fn record_count(&self) -> usize;
}

impl<E: Effect + ?Sized> Effect for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn seed(&mut self, viewport: &Viewport, theme: Theme) {
        (**self).seed(viewport, theme)
    }

    fn update(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer) {
        (**self).update(ctx, pointer)
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        (**self).render(canvas)
    }

    fn set_theme(&mut self, theme: Theme) {
        (**self).set_theme(theme)
    }

    fn time_step(&self) -> f32 {
        (**self).time_step()
    }

    fn record_count(&self) -> usize {
        (**self).record_count()
    }
}
