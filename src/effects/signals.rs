//! Flat cyber grid crossed by fast signals.
//!
//! A faint line grid covers the surface. A handful of signals enter from a
//! random edge and race straight across it, horizontally or vertically,
//! dragging a long fading tail. A signal brightens while it crosses a grid
//! line and starts over from a fresh edge once it is well past the canvas.

use super::{Effect, FrameContext};
use crate::color::{Color, Palette, Theme, ThemedPalette};
use crate::error::ConfigError;
use crate::input::Pointer;
use crate::particle::{Trail, TrailPoint};
use crate::render::{Canvas, Fill};
use crate::spawn::SpawnContext;
use crate::viewport::Viewport;
use glam::Vec2;
use serde::{Deserialize, Serialize};

const PARTICLE: usize = 0;
const LINE: usize = 1;
const NODE: usize = 2;
const TAIL: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub rows: u32,
    pub columns: u32,
    pub line_width: f32,
    /// Per-line intensity range; line alpha is `intensity * 80 / 255`.
    pub line_intensity: (f32, f32),
    pub node_radius: f32,
    pub node_alpha: f32,
    pub count: u32,
    /// Pixels per frame.
    pub speed: (f32, f32),
    pub size: (f32, f32),
    pub tail_length: usize,
    /// How far past the edge a signal travels before it restarts.
    pub margin: f32,
    /// Signals brighten within this many pixels of a grid line.
    pub snap_distance: f32,
    pub brightness: (f32, f32),
    pub brightness_decay: f32,
    /// Per-frame chance of a spark along a tail.
    pub spark_chance: f32,
    /// Particle, grid line, node and tail color, in that order.
    pub palette: ThemedPalette,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rows: 10,
            columns: 10,
            line_width: 0.1,
            line_intensity: (0.3, 1.0),
            node_radius: 1.5,
            node_alpha: 0.25,
            count: 5,
            speed: (10.0, 30.0),
            size: (0.5, 1.0),
            tail_length: 300,
            margin: 50.0,
            snap_distance: 5.0,
            brightness: (0.8, 1.0),
            brightness_decay: 0.05,
            spark_chance: 0.2,
            palette: ThemedPalette::signal_grid(),
        }
    }
}

impl SignalConfig {
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_grid(mut self, rows: u32, columns: u32) -> Self {
        self.rows = rows;
        self.columns = columns;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows < 2 || self.columns < 2 {
            return Err(ConfigError::Invalid(
                "signal grid needs at least 2 rows and 2 columns".into(),
            ));
        }
        if self.tail_length == 0 {
            return Err(ConfigError::Invalid("signal tail_length must be > 0".into()));
        }
        Ok(())
    }

    fn cell(&self, viewport: &Viewport) -> Vec2 {
        Vec2::new(
            viewport.width / (self.columns - 1) as f32,
            viewport.height / (self.rows - 1) as f32,
        )
    }
}

/// A straight grid line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLine {
    pub from: Vec2,
    pub to: Vec2,
    pub intensity: f32,
}

/// One signal particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub position: Vec2,
    /// Axis-aligned, pixels per frame.
    pub velocity: Vec2,
    pub base_size: f32,
    pub size: f32,
    /// Pulse phase seed.
    pub id: f32,
    pub brightness: f32,
    pub base_brightness: f32,
    pub tail: Trail,
    /// Tail index and radius factor of this frame's spark.
    spark: Option<(usize, f32)>,
}

impl Signal {
    fn spawn(config: &SignalConfig, spawn: &mut SpawnContext, viewport: &Viewport) -> Self {
        let speed = spawn.random_in(config.speed);
        let (position, velocity) = if spawn.chance(0.5) {
            let from_left = spawn.chance(0.5);
            let x = if from_left { 0.0 } else { viewport.width };
            let y = spawn.random() * viewport.height;
            let vx = if from_left { speed } else { -speed };
            (Vec2::new(x, y), Vec2::new(vx, 0.0))
        } else {
            let from_top = spawn.chance(0.5);
            let x = spawn.random() * viewport.width;
            let y = if from_top { 0.0 } else { viewport.height };
            let vy = if from_top { speed } else { -speed };
            (Vec2::new(x, y), Vec2::new(0.0, vy))
        };

        let size = spawn.random_in(config.size);
        let brightness = spawn.random_in(config.brightness);
        let mut tail = Trail::new(config.tail_length);
        for _ in 0..config.tail_length {
            tail.push(TrailPoint {
                position,
                size,
                alpha: 1.0,
            });
        }

        Self {
            position,
            velocity,
            base_size: size,
            size,
            id: spawn.random() * 1000.0,
            brightness,
            base_brightness: brightness,
            tail,
            spark: None,
        }
    }

    /// Distance to the nearest grid line on either axis.
    fn grid_distance(&self, cell: Vec2) -> f32 {
        let near = Vec2::new(
            self.position.x.rem_euclid(cell.x),
            self.position.y.rem_euclid(cell.y),
        );
        near.x
            .min(cell.x - near.x)
            .min(near.y.min(cell.y - near.y))
    }
}

/// Line grid plus fast signals.
#[derive(Debug, Clone)]
pub struct SignalGrid {
    config: SignalConfig,
    spawn: SpawnContext,
    viewport: Viewport,
    palette: Palette,
    lines: Vec<GridLine>,
    nodes: Vec<Vec2>,
    signals: Vec<Signal>,
    now_ms: f64,
}

impl SignalGrid {
    pub fn new(config: SignalConfig, seed: Option<u64>) -> Self {
        let palette = config.palette.light.clone();
        Self {
            config,
            spawn: SpawnContext::from_seed(seed),
            viewport: Viewport::default(),
            palette,
            lines: Vec::new(),
            nodes: Vec::new(),
            signals: Vec::new(),
            now_ms: 0.0,
        }
    }

    #[inline]
    pub fn lines(&self) -> &[GridLine] {
        &self.lines
    }

    #[inline]
    pub fn nodes(&self) -> &[Vec2] {
        &self.nodes
    }

    #[inline]
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Mutable access for hosts that place signals by hand.
    #[inline]
    pub fn signals_mut(&mut self) -> &mut [Signal] {
        &mut self.signals
    }

    fn build_grid(&mut self) {
        let cell = self.config.cell(&self.viewport);
        let (rows, cols) = (self.config.rows, self.config.columns);
        self.nodes = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| Vec2::new(c as f32 * cell.x, r as f32 * cell.y)))
            .collect();

        self.lines.clear();
        let (w, h) = (self.viewport.width, self.viewport.height);
        for r in 0..rows {
            let y = r as f32 * cell.y;
            let intensity = self.spawn.random_in(self.config.line_intensity);
            self.lines.push(GridLine {
                from: Vec2::new(0.0, y),
                to: Vec2::new(w.max(0.0), y),
                intensity,
            });
        }
        for c in 0..cols {
            let x = c as f32 * cell.x;
            let intensity = self.spawn.random_in(self.config.line_intensity);
            self.lines.push(GridLine {
                from: Vec2::new(x, 0.0),
                to: Vec2::new(x, h.max(0.0)),
                intensity,
            });
        }
    }

    fn draw_signal(&self, canvas: &mut dyn Canvas, signal: &Signal, pulse: f32) {
        let particle = self.palette.get(PARTICLE);
        let tail_color = self.palette.get(TAIL);
        let at = signal.position;
        let s = signal.size;

        canvas.fill_circle(
            at,
            s * (3.0 + pulse),
            Fill::Radial {
                inner: particle.with_alpha(signal.brightness),
                outer: particle.with_alpha(0.0),
            },
        );

        let points: Vec<Vec2> = signal.tail.points().map(|p| p.position).collect();
        let n = points.len();
        if n > 1 {
            let width = s * 0.6 * pulse;
            for k in 1..n {
                if points[k - 1] == points[k] {
                    continue;
                }
                // opaque at the head, transparent at the far end
                let t = k as f32 / (n - 1) as f32;
                let color = particle.lerp(tail_color, t).with_alpha(1.0 - t);
                canvas.stroke_line(points[k - 1], points[k], width, color);
            }
            if let Some((index, factor)) = signal.spark {
                if let Some(&spark) = points.get(index) {
                    canvas.fill_circle(spark, s * 0.3 * factor, Fill::Solid(Color::WHITE));
                }
            }
        }

        canvas.fill_circle(at, s, Fill::Solid(particle));
        canvas.fill_circle(at, s * 0.4 * pulse, Fill::Solid(Color::WHITE));
        canvas.fill_circle(at - Vec2::splat(s * 0.3), s * 0.2, Fill::Solid(Color::WHITE));
    }
}

impl Effect for SignalGrid {
    fn name(&self) -> &'static str {
        "signal_grid"
    }

    fn seed(&mut self, viewport: &Viewport, theme: Theme) {
        self.viewport = *viewport;
        self.palette = self.config.palette.for_theme(theme).clone();
        self.build_grid();
        self.signals = (0..self.config.count)
            .map(|_| Signal::spawn(&self.config, &mut self.spawn, viewport))
            .collect();

        log::info!(
            "✓ Signal grid seeded: {} lines, {} signals",
            self.lines.len(),
            self.signals.len()
        );
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _pointer: &Pointer) {
        self.now_ms = ctx.now_ms();
        self.viewport = ctx.viewport;
        let cell = self.config.cell(&self.viewport);
        let margin = self.config.margin;

        for signal in &mut self.signals {
            signal.tail.push(TrailPoint {
                position: signal.position,
                size: signal.size,
                alpha: 1.0,
            });
            signal.position += signal.velocity;

            if !self.viewport.contains(signal.position, margin) {
                *signal = Signal::spawn(&self.config, &mut self.spawn, &self.viewport);
            }

            let pulse = (self.now_ms * 0.002 + signal.id as f64 * 0.1).sin() as f32;
            signal.size = signal.base_size * (1.0 + pulse * 0.2);

            let dist = signal.grid_distance(cell);
            let snap = self.config.snap_distance;
            signal.brightness = if dist < snap {
                (signal.base_brightness + (1.0 - dist / snap) * 0.5).min(1.0)
            } else {
                (signal.brightness - self.config.brightness_decay).max(signal.base_brightness)
            };

            signal.spark = if self.spawn.chance(self.config.spark_chance) && signal.tail.len() > 1 {
                let index = self.spawn.random_index(signal.tail.len() - 1) + 1;
                Some((index, self.spawn.random()))
            } else {
                None
            };
        }
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        let line_color = self.palette.get(LINE);
        for line in &self.lines {
            let alpha = (line.intensity * 80.0).floor() / 255.0;
            canvas.stroke_line(
                line.from,
                line.to,
                self.config.line_width,
                line_color.with_alpha(alpha),
            );
        }
        let node_color = self.palette.get(NODE).with_alpha(self.config.node_alpha);
        for &node in &self.nodes {
            canvas.fill_circle(node, self.config.node_radius, Fill::Solid(node_color));
        }

        let pulse = ((self.now_ms * 0.003).sin() * 0.5 + 1.0) as f32;
        for signal in &self.signals {
            self.draw_signal(canvas, signal, pulse);
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.palette = self.config.palette.for_theme(theme).clone();
    }

    fn record_count(&self) -> usize {
        self.signals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, DrawList};
    use std::time::Duration;

    fn seeded() -> (SignalGrid, Viewport) {
        let viewport = Viewport::new(900.0, 900.0);
        let mut grid = SignalGrid::new(SignalConfig::default(), Some(17));
        grid.seed(&viewport, Theme::Light);
        (grid, viewport)
    }

    #[test]
    fn test_grid_layout() {
        let (grid, _) = seeded();
        assert_eq!(grid.lines().len(), 20);
        assert_eq!(grid.nodes().len(), 100);
        // last node sits on the far corner
        let last = grid.nodes()[99];
        assert!((last - Vec2::new(900.0, 900.0)).length() < 1e-3);
        for line in grid.lines() {
            assert!((0.3..1.0).contains(&line.intensity));
        }
    }

    #[test]
    fn test_signals_start_on_an_edge() {
        let (grid, viewport) = seeded();
        for s in grid.signals() {
            let on_edge = s.position.x == 0.0
                || s.position.x == viewport.width
                || s.position.y == 0.0
                || s.position.y == viewport.height;
            assert!(on_edge);
            assert!(s.velocity.x == 0.0 || s.velocity.y == 0.0);
            let speed = s.velocity.length();
            assert!((10.0..30.0).contains(&speed));
            assert_eq!(s.tail.len(), 300);
        }
    }

    #[test]
    fn test_signals_restart_past_margin() {
        let (mut grid, viewport) = seeded();
        let pointer = Pointer::default();
        for frame in 0..200u64 {
            let mut ctx = FrameContext::at(0.0, frame, viewport);
            ctx.now = Duration::from_millis(frame * 16);
            grid.update(&ctx, &pointer);
            for s in grid.signals() {
                assert!(viewport.contains(s.position, 50.0));
                assert!(s.tail.len() <= 300);
            }
        }
    }

    #[test]
    fn test_brightens_near_grid_line() {
        let (mut grid, viewport) = seeded();
        let pointer = Pointer::default();
        {
            let s = &mut grid.signals_mut()[0];
            // one px before a vertical line, moving along it
            s.position = Vec2::new(99.0, 450.0 + 50.0);
            s.velocity = Vec2::new(0.0, 1.0);
            s.base_brightness = 0.8;
            s.brightness = 0.8;
        }
        grid.update(&FrameContext::at(0.0, 0, viewport), &pointer);
        let s = &grid.signals()[0];
        // one px away: 0.8 + 0.8 * 0.5, clamped to 1
        assert!((s.brightness - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_size_pulse_bounded() {
        let (mut grid, viewport) = seeded();
        let pointer = Pointer::default();
        for frame in 0..50u64 {
            let mut ctx = FrameContext::at(0.0, frame, viewport);
            ctx.now = Duration::from_millis(frame * 97);
            grid.update(&ctx, &pointer);
            for s in grid.signals() {
                assert!(s.size >= s.base_size * 0.8 - 1e-5);
                assert!(s.size <= s.base_size * 1.2 + 1e-5);
            }
        }
    }

    #[test]
    fn test_theme_switch_recolors_grid() {
        let (mut grid, _) = seeded();
        grid.set_theme(Theme::Dark);
        let mut list = DrawList::new();
        grid.render(&mut list);
        let dark_line = Color::from_hex("#155D38").unwrap();
        let first_line = list.commands().iter().find_map(|c| match c {
            DrawCommand::Line { color, .. } => Some(*color),
            _ => None,
        });
        let first_line = first_line.unwrap();
        assert_eq!(first_line.r, dark_line.r);
        assert_eq!(first_line.g, dark_line.g);
    }
}
