//! Backend-neutral drawing.
//!
//! Effects never talk to a graphics API. They issue calls on a [`Canvas`],
//! which a host implements on top of a 2D context, WebGL, wgpu, or the
//! [`DrawList`] recorder used by tests and the headless runner.
//!
//! Coordinates are surface pixels with the origin at the top-left. Every
//! call must tolerate degenerate input (zero radius, zero alpha) and simply
//! draw nothing.

pub mod gpu;
mod recorder;

pub use recorder::{DrawCommand, DrawList, DrawStats};

use crate::color::{BlendMode, Color};
use glam::Vec2;

/// How a circle is filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Solid(Color),
    /// Radial gradient from `inner` at the center to `outer` at the rim.
    Radial { inner: Color, outer: Color },
}

impl Fill {
    /// Alpha at the center of the fill.
    pub fn peak_alpha(&self) -> f32 {
        match self {
            Fill::Solid(c) => c.a,
            Fill::Radial { inner, outer } => inner.a.max(outer.a),
        }
    }
}

/// Soft glow drawn behind a glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub blur: f32,
}

/// Drawing surface effects render into.
pub trait Canvas {
    /// Erase everything to transparent.
    fn clear(&mut self);

    /// Blend mode for subsequent calls.
    fn set_blend(&mut self, mode: BlendMode);

    fn fill_circle(&mut self, center: Vec2, radius: f32, fill: Fill);

    /// Rectangle of `size` centered at `center`, rotated by `rotation` radians.
    fn fill_rect(&mut self, center: Vec2, size: Vec2, rotation: f32, color: Color);

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color);

    fn stroke_circle(&mut self, center: Vec2, radius: f32, width: f32, color: Color);

    /// A single glyph of monospace text, centered horizontally on `position`.
    fn fill_glyph(
        &mut self,
        glyph: char,
        position: Vec2,
        size: f32,
        color: Color,
        shadow: Option<Shadow>,
    );
}
