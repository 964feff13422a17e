//! Recording canvas.

use super::{Canvas, Fill, Shadow};
use crate::color::{BlendMode, Color};
use glam::Vec2;

/// One recorded canvas call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Clear,
    Blend(BlendMode),
    Circle {
        center: Vec2,
        radius: f32,
        fill: Fill,
    },
    Rect {
        center: Vec2,
        size: Vec2,
        rotation: f32,
        color: Color,
    },
    Line {
        from: Vec2,
        to: Vec2,
        width: f32,
        color: Color,
    },
    Ring {
        center: Vec2,
        radius: f32,
        width: f32,
        color: Color,
    },
    Glyph {
        glyph: char,
        position: Vec2,
        size: f32,
        color: Color,
        shadow: Option<Shadow>,
    },
}

/// Per-kind command counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawStats {
    pub circles: usize,
    pub rects: usize,
    pub lines: usize,
    pub rings: usize,
    pub glyphs: usize,
}

impl DrawStats {
    pub fn total(&self) -> usize {
        self.circles + self.rects + self.lines + self.rings + self.glyphs
    }
}

/// A [`Canvas`] that records every call instead of drawing.
///
/// Calls that could never put a pixel on screen (non-positive size, zero
/// alpha, non-finite coordinates) are dropped, which keeps counts meaningful.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
    blend: BlendMode,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Current blend mode.
    #[inline]
    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    /// Drop all recorded commands.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn stats(&self) -> DrawStats {
        let mut stats = DrawStats::default();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Circle { .. } => stats.circles += 1,
                DrawCommand::Rect { .. } => stats.rects += 1,
                DrawCommand::Line { .. } => stats.lines += 1,
                DrawCommand::Ring { .. } => stats.rings += 1,
                DrawCommand::Glyph { .. } => stats.glyphs += 1,
                DrawCommand::Clear | DrawCommand::Blend(_) => {}
            }
        }
        stats
    }

    /// Commands recorded since the last `Clear`.
    pub fn last_frame(&self) -> &[DrawCommand] {
        let start = self
            .commands
            .iter()
            .rposition(|c| matches!(c, DrawCommand::Clear))
            .map_or(0, |i| i + 1);
        &self.commands[start..]
    }
}

fn finite(v: Vec2) -> bool {
    v.is_finite()
}

impl Canvas for DrawList {
    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn set_blend(&mut self, mode: BlendMode) {
        if self.blend != mode {
            self.blend = mode;
            self.commands.push(DrawCommand::Blend(mode));
        }
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, fill: Fill) {
        if radius > 0.0 && fill.peak_alpha() > 0.0 && finite(center) {
            self.commands.push(DrawCommand::Circle {
                center,
                radius,
                fill,
            });
        }
    }

    fn fill_rect(&mut self, center: Vec2, size: Vec2, rotation: f32, color: Color) {
        if size.x > 0.0 && size.y > 0.0 && color.a > 0.0 && finite(center) {
            self.commands.push(DrawCommand::Rect {
                center,
                size,
                rotation,
                color,
            });
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        if width > 0.0 && color.a > 0.0 && finite(from) && finite(to) {
            self.commands.push(DrawCommand::Line {
                from,
                to,
                width,
                color,
            });
        }
    }

    fn stroke_circle(&mut self, center: Vec2, radius: f32, width: f32, color: Color) {
        if radius > 0.0 && width > 0.0 && color.a > 0.0 && finite(center) {
            self.commands.push(DrawCommand::Ring {
                center,
                radius,
                width,
                color,
            });
        }
    }

    fn fill_glyph(
        &mut self,
        glyph: char,
        position: Vec2,
        size: f32,
        color: Color,
        shadow: Option<Shadow>,
    ) {
        if size > 0.0 && color.a > 0.0 && finite(position) {
            self.commands.push(DrawCommand::Glyph {
                glyph,
                position,
                size,
                color,
                shadow,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_counts() {
        let mut list = DrawList::new();
        list.clear();
        list.fill_circle(Vec2::ZERO, 2.0, Fill::Solid(Color::WHITE));
        list.stroke_line(Vec2::ZERO, Vec2::ONE, 1.0, Color::WHITE);
        list.fill_glyph('ア', Vec2::ONE, 20.0, Color::WHITE, None);

        let stats = list.stats();
        assert_eq!(stats.circles, 1);
        assert_eq!(stats.lines, 1);
        assert_eq!(stats.glyphs, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_drops_invisible_calls() {
        let mut list = DrawList::new();
        list.fill_circle(Vec2::ZERO, 0.0, Fill::Solid(Color::WHITE));
        list.fill_circle(Vec2::ZERO, 2.0, Fill::Solid(Color::TRANSPARENT));
        list.stroke_line(Vec2::new(f32::NAN, 0.0), Vec2::ONE, 1.0, Color::WHITE);
        assert!(list.is_empty());
    }

    #[test]
    fn test_blend_deduplicated() {
        let mut list = DrawList::new();
        list.set_blend(BlendMode::Alpha);
        list.set_blend(BlendMode::Screen);
        list.set_blend(BlendMode::Screen);
        assert_eq!(list.commands(), &[DrawCommand::Blend(BlendMode::Screen)]);
    }

    #[test]
    fn test_last_frame() {
        let mut list = DrawList::new();
        list.clear();
        list.fill_circle(Vec2::ZERO, 1.0, Fill::Solid(Color::WHITE));
        list.clear();
        list.stroke_line(Vec2::ZERO, Vec2::ONE, 1.0, Color::WHITE);
        assert_eq!(list.last_frame().len(), 1);
    }
}
