//! Checkerboard dot matrix with pointer hover and ripples.
//!
//! Dots sit on every other cell of a square grid. Two behaviors can be
//! enabled independently:
//!
//! - **Hover**: dots near the pointer grow and brighten; the radius widens
//!   with pointer speed. An overlay behind the dots fades in with the number
//!   of affected dots.
//! - **Ripples**: expanding rings, spawned on a timer and along the pointer
//!   path. Dots the ring passes over take its color, swell briefly and get
//!   pushed outward before springing back. Some rings carry a faint
//!   harmonic wobble, a soft interference glow and radial spokes. A ring
//!   a third of the way to its full size throws off short particle flows,
//!   and the moving pointer occasionally sheds a few more.

use super::{Effect, FrameContext};
use crate::color::{BlendMode, Color, Palette, Theme};
use crate::error::ConfigError;
use crate::input::Pointer;
use crate::render::{Canvas, Fill};
use crate::spawn::SpawnContext;
use crate::viewport::Viewport;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Pointer hover response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoverConfig {
    pub size: f32,
    pub opacity: f32,
    /// Base radius of influence, in pixels.
    pub radius: f32,
    /// Extra radius per unit of pointer speed.
    pub speed_factor: f32,
    /// Ceiling of the overlay opacity.
    pub overlay_max: f32,
    pub overlay_color: Color,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            size: 6.0,
            opacity: 0.15,
            radius: 100.0,
            speed_factor: 0.7,
            overlay_max: 0.2,
            overlay_color: Color::rgb8(0x42, 0x85, 0xF4),
        }
    }
}

/// Faint glow and spokes drawn inside strong ripples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterferenceConfig {
    pub tint: Color,
    /// Glow alpha at the ring center, scaled by ripple opacity.
    pub alpha: f32,
    /// Share of ripples that also draw spokes.
    pub spoke_chance: f32,
    pub spoke_alpha: f32,
    pub spoke_width: f32,
    /// Ripples at or below this opacity draw no interference.
    pub min_opacity: f32,
}

impl Default for InterferenceConfig {
    fn default() -> Self {
        Self {
            tint: Color::rgb8(245, 250, 255),
            alpha: 0.06,
            spoke_chance: 0.4,
            spoke_alpha: 0.1,
            spoke_width: 0.7,
            min_opacity: 0.1,
        }
    }
}

/// Short particle streams thrown off by ripples and the pointer.
///
/// Every age and lifespan is counted in frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Share of the ring's full radius at which it emits.
    pub band: (f32, f32),
    pub per_ripple: (u32, u32),
    /// Hue offset range of a ripple flow against its ring, in degrees.
    pub ripple_hue: f32,
    /// Hue offset range of each particle against its flow.
    pub particle_hue: f32,
    pub speed: (f32, f32),
    pub lifespan: (f32, f32),
    pub particles: (u32, u32),
    pub particle_size: (f32, f32),
    /// Heading jitter of each particle, in radians.
    pub spread: f32,
    pub alpha: (f32, f32),
    pub particle_lifespan: (f32, f32),
    /// Head start in age between consecutive particles.
    pub stagger: f32,
    /// Per-frame chance the active pointer emits.
    pub pointer_chance: f32,
    pub pointer_count: (u32, u32),
    pub pointer_radius: f32,
    /// Oldest flows are dropped past this count.
    pub max_flows: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            band: (0.3, 0.35),
            per_ripple: (2, 5),
            ripple_hue: 30.0,
            particle_hue: 15.0,
            speed: (0.3, 1.1),
            lifespan: (80.0, 140.0),
            particles: (5, 25),
            particle_size: (0.5, 2.5),
            spread: 0.25,
            alpha: (0.3, 1.0),
            particle_lifespan: (50.0, 150.0),
            stagger: 3.0,
            pointer_chance: 0.03,
            pointer_count: (1, 4),
            pointer_radius: 30.0,
            max_flows: 40,
        }
    }
}

/// Ripple spawning and dot response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    /// Milliseconds between ripples at random positions.
    pub natural_interval: f64,
    pub natural_strength: (f32, f32),
    /// Milliseconds between ripples along the pointer path.
    pub pointer_interval: f64,
    /// Ring radius at full strength.
    pub max_radius: f32,
    /// Radius growth per frame.
    pub speed: (f32, f32),
    pub line_width: (f32, f32),
    pub alpha: f32,
    pub max_ripples: usize,
    /// Natural ripples kept alive before the oldest is evicted.
    pub min_natural: usize,
    pub colors: Palette,
    /// Frames a dot keeps the ring color.
    pub highlight_frames: (u32, u32),
    /// Highlighted size as a multiple of the base size.
    pub highlight_size: (f32, f32),
    pub highlight_opacity: f32,
    /// Outward displacement per ring hit, in pixels.
    pub push: f32,
    /// Fraction of the displacement recovered per frame.
    pub spring: f32,
    /// Share of ripples with a harmonic wobble in their hit band.
    pub harmonic_chance: f32,
    pub harmonic: (f32, f32),
    /// Spin range of the spoke pattern, in radians per frame.
    pub rotation_speed: f32,
    pub interference: Option<InterferenceConfig>,
    pub flows: Option<FlowConfig>,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            natural_interval: 5_000.0,
            natural_strength: (0.2, 0.5),
            pointer_interval: 300.0,
            max_radius: 120.0,
            speed: (1.0, 3.0),
            line_width: (1.0, 3.0),
            alpha: 0.8,
            max_ripples: 15,
            min_natural: 5,
            colors: Palette::from_hex(&["#2575FC", "#79A9F5", "#5D9DF5", "#83B7FF", "#3D89FF"]),
            highlight_frames: (20, 51),
            highlight_size: (1.5, 2.5),
            highlight_opacity: 0.8,
            push: 0.2,
            spring: 0.05,
            harmonic_chance: 0.4,
            harmonic: (0.01, 0.03),
            rotation_speed: 0.001,
            interference: Some(InterferenceConfig::default()),
            flows: Some(FlowConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotConfig {
    pub grid_size: f32,
    /// Offset of every dot from its cell corner.
    pub offset: f32,
    /// Share of checkerboard cells left empty.
    pub dropout: f32,
    /// Maximum positional jitter on each axis.
    pub jitter: f32,
    pub size: f32,
    /// Per-dot size multiplier range.
    pub size_variation: (f32, f32),
    pub opacity: f32,
    pub color: Color,
    pub hover: Option<HoverConfig>,
    pub ripples: Option<RippleConfig>,
    pub blend: BlendMode,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self::hover()
    }
}

impl DotConfig {
    /// Faint blue dots that swell under the pointer.
    pub fn hover() -> Self {
        Self {
            grid_size: 20.0,
            offset: 3.0,
            dropout: 0.0,
            jitter: 0.0,
            size: 3.0,
            size_variation: (1.0, 1.0),
            opacity: 0.05,
            color: Color::rgb8(0x42, 0x85, 0xF4),
            hover: Some(HoverConfig::default()),
            ripples: None,
            blend: BlendMode::Alpha,
        }
    }

    /// Pale dots disturbed by expanding ripples.
    pub fn ripples() -> Self {
        Self {
            grid_size: 30.0,
            offset: 0.0,
            dropout: 0.05,
            jitter: 2.0,
            size: 3.0,
            size_variation: (0.8, 1.2),
            opacity: 0.5,
            color: Color::rgb8(0x97, 0xC4, 0xFB),
            hover: None,
            ripples: Some(RippleConfig::default()),
            blend: BlendMode::Screen,
        }
    }

    pub fn with_grid_size(mut self, grid_size: f32) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_hover(mut self, hover: Option<HoverConfig>) -> Self {
        self.hover = hover;
        self
    }

    pub fn with_ripples(mut self, ripples: Option<RippleConfig>) -> Self {
        self.ripples = ripples;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size.is_nan() || self.grid_size <= 0.0 {
            return Err(ConfigError::Invalid("dot grid_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::Invalid("dot dropout must be within 0..1".into()));
        }
        if let Some(ripples) = &self.ripples {
            if ripples.max_ripples == 0 || ripples.max_radius <= 0.0 {
                return Err(ConfigError::Invalid(
                    "ripples need max_ripples > 0 and a positive max_radius".into(),
                ));
            }
            if let Some(flows) = &ripples.flows {
                if flows.max_flows == 0 {
                    return Err(ConfigError::Invalid("flows need max_flows > 0".into()));
                }
            }
        }
        Ok(())
    }
}

/// One dot of the matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dot {
    /// Rest position.
    pub origin: Vec2,
    pub position: Vec2,
    pub base_size: f32,
    pub size: f32,
    pub base_opacity: f32,
    pub opacity: f32,
    pub color: Color,
    /// Frames left on a ripple highlight.
    pub highlight: u32,
    offset: Vec2,
}

/// An expanding ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub center: Vec2,
    pub radius: f32,
    pub max_radius: f32,
    pub speed: f32,
    pub strength: f32,
    pub line_width: f32,
    pub color: Color,
    /// Spawned by the timer rather than the pointer.
    pub natural: bool,
    pub alpha: f32,
    /// Amplitude of the `sin(8a) * cos(3a)` wobble, zero for a plain ring.
    pub harmonic: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    pub phase: f32,
    pub spokes: bool,
    /// Already emitted its particle flows.
    pub flowed: bool,
}

impl Ripple {
    pub fn is_done(&self) -> bool {
        self.radius > self.max_radius
    }

    /// Hit band scale for a point at `offset` from the center.
    fn wave(&self, offset: Vec2) -> f32 {
        let angle = offset.y.atan2(offset.x) + self.rotation;
        1.0 + (angle * 8.0).sin() * (angle * 3.0).cos() * self.harmonic
    }
}

/// One particle of a [`Flow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowParticle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub alpha: f32,
    pub age: f32,
    pub lifespan: f32,
    pub color: Color,
}

impl FlowParticle {
    /// Alpha after the age fade.
    pub fn faded_alpha(&self) -> f32 {
        self.alpha * (1.0 - self.age / self.lifespan).max(0.0)
    }
}

/// A burst of particles streaming out in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub origin: Vec2,
    pub age: f32,
    pub lifespan: f32,
    pub particles: Vec<FlowParticle>,
}

impl Flow {
    pub fn is_done(&self) -> bool {
        self.age > self.lifespan || self.particles.is_empty()
    }
}

/// Grid cells smaller than this are clamped up to it.
const MIN_GRID: f32 = 4.0;

/// Dot matrix background.
#[derive(Debug, Clone)]
pub struct DotMatrix {
    config: DotConfig,
    spawn: SpawnContext,
    viewport: Viewport,
    dots: Vec<Dot>,
    ripples: Vec<Ripple>,
    flows: Vec<Flow>,
    overlay: f32,
    epoch: Option<f64>,
    last_natural: f64,
    last_pointer: f64,
}

impl DotMatrix {
    pub fn new(config: DotConfig, seed: Option<u64>) -> Self {
        Self {
            config,
            spawn: SpawnContext::from_seed(seed),
            viewport: Viewport::default(),
            dots: Vec::new(),
            ripples: Vec::new(),
            flows: Vec::new(),
            overlay: 0.0,
            epoch: None,
            last_natural: 0.0,
            last_pointer: f64::NEG_INFINITY,
        }
    }

    #[inline]
    pub fn dots(&self) -> &[Dot] {
        &self.dots
    }

    #[inline]
    pub fn ripples(&self) -> &[Ripple] {
        &self.ripples
    }

    #[inline]
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Opacity of the hover overlay after the last update.
    #[inline]
    pub fn overlay_opacity(&self) -> f32 {
        self.overlay
    }

    /// Start a ripple at `center`, evicting one when over the limit.
    ///
    /// Does nothing when ripples are disabled.
    pub fn add_ripple(&mut self, center: Vec2, strength: f32, natural: bool) {
        let Some(cfg) = &self.config.ripples else {
            return;
        };
        let harmonic = if self.spawn.chance(cfg.harmonic_chance) {
            self.spawn.random_in(cfg.harmonic)
        } else {
            0.0
        };
        let spokes = cfg
            .interference
            .is_some_and(|i| self.spawn.chance(i.spoke_chance));
        let ripple = Ripple {
            center,
            radius: 0.0,
            max_radius: cfg.max_radius * (0.5 + strength * 0.5),
            speed: self.spawn.random_in(cfg.speed),
            strength,
            line_width: self.spawn.random_in(cfg.line_width),
            color: self.spawn.pick(&cfg.colors),
            natural,
            alpha: cfg.alpha,
            harmonic,
            rotation: 0.0,
            rotation_speed: self.spawn.random_range(-cfg.rotation_speed, cfg.rotation_speed),
            phase: self.spawn.random_angle(),
            spokes,
            flowed: false,
        };
        self.ripples.push(ripple);

        if self.ripples.len() > cfg.max_ripples {
            let naturals = self.ripples.iter().filter(|r| r.natural).count();
            let evict = if naturals > cfg.min_natural {
                self.ripples.iter().position(|r| r.natural).unwrap_or(0)
            } else {
                0
            };
            self.ripples.remove(evict);
        }
    }

    fn build_dots(&mut self) {
        let cfg = &self.config;
        let grid = cfg.grid_size.max(MIN_GRID);
        let cols = (self.viewport.width / grid).ceil().max(0.0) as u32;
        let rows = (self.viewport.height / grid).ceil().max(0.0) as u32;
        self.dots.clear();

        for i in 0..cols {
            for j in 0..rows {
                if (i + j) % 2 != 0 {
                    continue;
                }
                if cfg.dropout > 0.0 && self.spawn.chance(cfg.dropout) {
                    continue;
                }
                let jitter = Vec2::new(
                    self.spawn.random_range(-cfg.jitter, cfg.jitter),
                    self.spawn.random_range(-cfg.jitter, cfg.jitter),
                );
                let origin = Vec2::new(i as f32, j as f32) * grid
                    + Vec2::splat(cfg.offset)
                    + jitter;
                let size = cfg.size * self.spawn.random_in(cfg.size_variation);
                self.dots.push(Dot {
                    origin,
                    position: origin,
                    base_size: size,
                    size,
                    base_opacity: cfg.opacity,
                    opacity: cfg.opacity,
                    color: cfg.color,
                    highlight: 0,
                    offset: Vec2::ZERO,
                });
            }
        }
    }

    fn hover(&mut self, pointer: &Pointer) {
        let Some(hover) = self.config.hover else {
            return;
        };
        let radius = hover.radius + pointer.speed() * hover.speed_factor;
        let target = pointer.active_position();
        let mut active = 0usize;
        let mut max_factor = 0.0f32;

        // ripple highlights own their dots until they expire
        for dot in self.dots.iter_mut().filter(|d| d.highlight == 0) {
            let factor = target
                .map(|p| p.distance(dot.position))
                .filter(|&d| d < radius)
                .map(|d| 1.0 - d / radius);
            match factor {
                Some(f) => {
                    dot.size = dot.base_size + (hover.size - dot.base_size) * f;
                    dot.opacity = dot.base_opacity + (hover.opacity - dot.base_opacity) * f;
                    active += 1;
                    max_factor = max_factor.max(f);
                }
                None => {
                    dot.size = dot.base_size;
                    dot.opacity = dot.base_opacity;
                }
            }
        }

        self.overlay = if active > 0 {
            (active as f32 / 100.0 * 0.1 + max_factor * 0.1).min(hover.overlay_max)
        } else {
            0.0
        };
    }

    fn spawn_ripples(&mut self, elapsed: f64, pointer: &Pointer, now: std::time::Duration) {
        let Some(cfg) = &self.config.ripples else {
            return;
        };
        let (natural_interval, pointer_interval, strength) =
            (cfg.natural_interval, cfg.pointer_interval, cfg.natural_strength);

        if elapsed - self.last_natural > natural_interval {
            self.last_natural = elapsed;
            let center = self.spawn.random_in_rect(self.viewport.size());
            let s = self.spawn.random_in(strength);
            self.add_ripple(center, s, true);
        }

        if let Some(position) = pointer.active_position() {
            if pointer.is_moving(now) && elapsed - self.last_pointer > pointer_interval {
                self.last_pointer = elapsed;
                let s = (pointer.speed() / 8.0 + 0.3).min(1.0);
                self.add_ripple(position, s, false);
            }
        }
        self.shed_pointer_flows(pointer);
    }

    fn shed_pointer_flows(&mut self, pointer: &Pointer) {
        let Some(position) = pointer.active_position() else {
            return;
        };
        let Some(ripples) = &self.config.ripples else {
            return;
        };
        let Some(flow) = &ripples.flows else {
            return;
        };
        if !self.spawn.chance(flow.pointer_chance) {
            return;
        }

        let count = self.spawn.random_uint(flow.pointer_count.0, flow.pointer_count.1);
        let mut pending = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let angle = self.spawn.random_angle();
            let distance = self.spawn.random_range(0.0, flow.pointer_radius);
            let origin = position + Vec2::new(angle.cos(), angle.sin()) * distance;
            let heading = self.spawn.random_angle();
            pending.push((origin, heading, self.spawn.pick(&ripples.colors)));
        }
        for (origin, heading, color) in pending {
            self.emit_flow(origin, heading, color);
        }
    }

    /// Start a particle flow heading along `angle`.
    ///
    /// Does nothing unless ripple flows are enabled.
    pub fn emit_flow(&mut self, origin: Vec2, angle: f32, color: Color) {
        let Some(cfg) = self.config.ripples.as_ref().and_then(|r| r.flows.as_ref()) else {
            return;
        };
        let spawn = &mut self.spawn;
        let speed = spawn.random_in(cfg.speed);
        let lifespan = spawn.random_in(cfg.lifespan);
        let count = spawn.random_uint(cfg.particles.0, cfg.particles.1);

        let particles = (0..count)
            .map(|i| {
                let heading = angle + spawn.random_range(-cfg.spread, cfg.spread);
                let speed = speed * spawn.random_range(0.8, 1.2);
                FlowParticle {
                    position: origin,
                    velocity: Vec2::new(heading.cos(), heading.sin()) * speed,
                    size: spawn.random_in(cfg.particle_size),
                    alpha: spawn.random_in(cfg.alpha),
                    age: i as f32 * cfg.stagger,
                    lifespan: spawn.random_in(cfg.particle_lifespan),
                    color: color.shift_hue(spawn.random_range(-cfg.particle_hue, cfg.particle_hue)),
                }
            })
            .collect();

        self.flows.push(Flow {
            origin,
            age: 0.0,
            lifespan,
            particles,
        });
        if self.flows.len() > cfg.max_flows {
            self.flows.remove(0);
        }
    }

    fn advance_flows(&mut self) {
        let viewport = self.viewport;
        for flow in &mut self.flows {
            flow.age += 1.0;
            flow.particles.retain_mut(|p| {
                p.age += 1.0;
                p.position += p.velocity;
                p.age <= p.lifespan && viewport.contains(p.position, 0.0)
            });
        }
        self.flows.retain(|f| !f.is_done());
    }

    fn advance_ripples(&mut self) {
        let Some(cfg) = &self.config.ripples else {
            return;
        };
        let mut pending = Vec::new();
        for ripple in &mut self.ripples {
            ripple.radius += ripple.speed;
            ripple.rotation += ripple.rotation_speed;
            ripple.alpha = cfg.alpha * (1.0 - ripple.radius / ripple.max_radius).max(0.0);

            let Some(flow) = &cfg.flows else {
                continue;
            };
            let share = ripple.radius / ripple.max_radius;
            let before = (ripple.radius - ripple.speed) / ripple.max_radius;
            if ripple.flowed || share < flow.band.0 || before > flow.band.1 {
                continue;
            }
            ripple.flowed = true;
            let count = self.spawn.random_uint(flow.per_ripple.0, flow.per_ripple.1);
            for _ in 0..count {
                let angle = self.spawn.random_angle();
                let origin =
                    ripple.center + Vec2::new(angle.cos(), angle.sin()) * ripple.radius * 0.8;
                let hue = self.spawn.random_range(-flow.ripple_hue, flow.ripple_hue);
                pending.push((origin, angle, ripple.color.shift_hue(hue)));
            }
        }
        self.ripples.retain(|r| !r.is_done());

        for dot in &mut self.dots {
            if dot.highlight > 0 {
                dot.highlight -= 1;
                if dot.highlight == 0 {
                    dot.color = self.config.color;
                    dot.size = dot.base_size;
                    dot.opacity = dot.base_opacity;
                }
            }

            for ripple in &self.ripples {
                let offset = dot.origin - ripple.center;
                let d = offset.length();
                let wave = ripple.wave(offset);
                if (d - ripple.radius).abs() < ripple.line_width * 2.0 * wave {
                    dot.color = ripple.color;
                    dot.highlight = self
                        .spawn
                        .random_uint(cfg.highlight_frames.0, cfg.highlight_frames.1);
                    dot.size = dot.base_size * self.spawn.random_in(cfg.highlight_size);
                    dot.opacity = cfg.highlight_opacity;
                    dot.offset += offset.normalize_or_zero() * cfg.push * wave;
                }
            }

            dot.offset -= dot.offset * cfg.spring;
            dot.position = dot.origin + dot.offset;
        }

        for (origin, angle, color) in pending {
            self.emit_flow(origin, angle, color);
        }
        self.advance_flows();
    }

    fn render_interference(&self, canvas: &mut dyn Canvas, ripple: &Ripple) {
        let Some(cfg) = self.config.ripples.as_ref().and_then(|r| r.interference) else {
            return;
        };
        let opacity = ripple.alpha;
        if opacity <= cfg.min_opacity {
            return;
        }
        let radius = ripple.radius.max(0.1);
        canvas.fill_circle(
            ripple.center,
            radius,
            Fill::Radial {
                inner: cfg.tint.with_alpha(opacity * cfg.alpha),
                outer: cfg.tint.with_alpha(0.0),
            },
        );
        if !ripple.spokes {
            return;
        }

        let segments = 8 + (radius / 15.0) as u32;
        let amplitude = radius * 0.1 * opacity;
        let color = cfg.tint.with_alpha(opacity * cfg.spoke_alpha);
        for i in 0..segments {
            let angle = i as f32 / segments as f32 * std::f32::consts::TAU + ripple.rotation;
            let dir = Vec2::new(angle.cos(), angle.sin());
            let inner = radius * 0.7 + (angle * 6.0 + ripple.phase).sin() * amplitude;
            let outer = radius + (angle * 8.0 + ripple.phase * 2.0).sin() * amplitude;
            canvas.stroke_line(
                ripple.center + dir * inner,
                ripple.center + dir * outer,
                cfg.spoke_width,
                color,
            );
        }
    }
}

impl Effect for DotMatrix {
    fn name(&self) -> &'static str {
        "dot_matrix"
    }

    fn seed(&mut self, viewport: &Viewport, _theme: Theme) {
        self.viewport = *viewport;
        self.ripples.clear();
        self.flows.clear();
        self.overlay = 0.0;
        self.epoch = None;
        self.last_natural = 0.0;
        self.last_pointer = f64::NEG_INFINITY;
        self.build_dots();
        log::info!("✓ Dot matrix seeded: {} dots", self.dots.len());
    }

    fn update(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer) {
        let now = ctx.now_ms();
        let epoch = *self.epoch.get_or_insert(now);
        let elapsed = now - epoch;
        self.viewport = ctx.viewport;

        self.hover(pointer);
        self.spawn_ripples(elapsed, pointer, ctx.now);
        self.advance_ripples();
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.set_blend(self.config.blend);
        if let Some(hover) = self.config.hover {
            canvas.fill_rect(
                self.viewport.center(),
                self.viewport.size(),
                0.0,
                hover.overlay_color.with_alpha(self.overlay),
            );
        }
        for ripple in &self.ripples {
            self.render_interference(canvas, ripple);
        }
        for ripple in &self.ripples {
            canvas.stroke_circle(
                ripple.center,
                ripple.radius,
                ripple.line_width,
                ripple.color.with_alpha(ripple.alpha),
            );
        }
        for dot in &self.dots {
            canvas.fill_circle(
                dot.position,
                dot.size,
                Fill::Solid(dot.color.with_alpha(dot.opacity)),
            );
        }

        if self.flows.is_empty() {
            return;
        }
        canvas.set_blend(BlendMode::Additive);
        for p in self.flows.iter().flat_map(|f| &f.particles) {
            let alpha = p.faded_alpha();
            canvas.fill_circle(
                p.position,
                p.size,
                Fill::Radial {
                    inner: p.color.with_alpha(alpha),
                    outer: p.color.with_alpha(alpha * 0.5),
                },
            );
        }
    }

    fn set_theme(&mut self, _theme: Theme) {}

    fn record_count(&self) -> usize {
        self.dots.len()
            + self.ripples.len()
            + self.flows.iter().map(|f| f.particles.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerConfig, PointerEvent};
    use std::time::Duration;

    fn seeded(config: DotConfig, viewport: Viewport) -> DotMatrix {
        let mut dots = DotMatrix::new(config, Some(31));
        dots.seed(&viewport, Theme::Light);
        dots
    }

    #[test]
    fn test_checkerboard_layout() {
        let dots = seeded(DotConfig::hover(), Viewport::new(100.0, 60.0));
        // 5 columns x 3 rows, every other cell
        assert_eq!(dots.dots().len(), 8);
        assert_eq!(dots.dots()[0].origin, Vec2::new(3.0, 3.0));
        assert_eq!(dots.dots()[1].origin, Vec2::new(3.0, 43.0));
    }

    #[test]
    fn test_hover_grows_nearby_dots() {
        let viewport = Viewport::new(400.0, 400.0);
        let mut dots = seeded(DotConfig::hover(), viewport);
        let ctx = FrameContext::at(0.0, 0, viewport);

        let idle = Pointer::new(PointerConfig::default());
        dots.update(&ctx, &idle);
        assert_eq!(dots.overlay_opacity(), 0.0);
        assert!(dots.dots().iter().all(|d| d.size == 3.0));

        let mut pointer = Pointer::new(PointerConfig::default());
        pointer.handle(PointerEvent::Moved(Vec2::new(203.0, 203.0)), Duration::ZERO, &viewport);
        dots.update(&ctx, &pointer);

        let under = dots
            .dots()
            .iter()
            .find(|d| d.origin == Vec2::new(203.0, 203.0))
            .unwrap();
        assert_eq!(under.size, 6.0);
        assert!((under.opacity - 0.15).abs() < 1e-6);
        let overlay = dots.overlay_opacity();
        assert!(overlay > 0.0 && overlay <= 0.2);
    }

    #[test]
    fn test_ripple_mode_drops_and_jitters() {
        let viewport = Viewport::new(1200.0, 900.0);
        let dots = seeded(DotConfig::ripples(), viewport);
        // 40 x 30 cells, half of them, minus about 5 %
        let full = 40 * 30 / 2;
        assert!(dots.dots().len() < full);
        assert!(dots.dots().len() > full * 85 / 100);
        for d in dots.dots() {
            let cell = (d.origin / 30.0).round() * 30.0;
            assert!((d.origin - cell).abs().max_element() <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn test_eviction_prefers_oldest_natural() {
        let mut dots = seeded(DotConfig::ripples(), Viewport::new(600.0, 600.0));
        for i in 0..8 {
            dots.add_ripple(Vec2::splat(i as f32), 0.5, true);
        }
        for i in 0..7 {
            dots.add_ripple(Vec2::splat(100.0 + i as f32), 0.5, false);
        }
        assert_eq!(dots.ripples().len(), 15);

        // 8 natural > 5: the oldest natural goes
        dots.add_ripple(Vec2::splat(500.0), 0.5, false);
        assert_eq!(dots.ripples().len(), 15);
        assert_eq!(dots.ripples()[0].center, Vec2::splat(1.0));
    }

    #[test]
    fn test_eviction_falls_back_to_oldest() {
        let mut dots = seeded(DotConfig::ripples(), Viewport::new(600.0, 600.0));
        for i in 0..15 {
            dots.add_ripple(Vec2::splat(i as f32), 0.5, i < 3);
        }
        dots.add_ripple(Vec2::splat(99.0), 0.5, false);
        assert_eq!(dots.ripples().len(), 15);
        assert_eq!(dots.ripples()[0].center, Vec2::splat(1.0));
    }

    #[test]
    fn test_natural_ripple_on_timer() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut dots = seeded(DotConfig::ripples(), viewport);
        let pointer = Pointer::default();

        let mut ctx = FrameContext::at(0.0, 0, viewport);
        dots.update(&ctx, &pointer);
        assert!(dots.ripples().is_empty());

        ctx.now = Duration::from_millis(5_100);
        dots.update(&ctx, &pointer);
        assert_eq!(dots.ripples().len(), 1);
        assert!(dots.ripples()[0].natural);
        let max = dots.ripples()[0].max_radius;
        assert!((120.0 * 0.6..=120.0 * 0.75).contains(&max));
    }

    #[test]
    fn test_ripple_fades_and_finishes() {
        let mut dots = seeded(DotConfig::ripples(), Viewport::new(600.0, 600.0));
        dots.add_ripple(Vec2::splat(300.0), 1.0, false);
        let mut last_alpha = f32::MAX;
        for _ in 0..200 {
            dots.advance_ripples();
            if let Some(r) = dots.ripples().first() {
                assert!(r.alpha <= last_alpha);
                last_alpha = r.alpha;
            }
        }
        assert!(dots.ripples().is_empty());
    }

    #[test]
    fn test_ring_highlights_and_springs_back() {
        let mut config = DotConfig::ripples();
        config.dropout = 0.0;
        config.jitter = 0.0;
        if let Some(ripples) = config.ripples.as_mut() {
            ripples.speed = (1.0, 1.0);
        }
        let mut dots = seeded(config, Viewport::new(300.0, 300.0));
        let center = dots.dots()[0].origin;
        dots.add_ripple(center, 1.0, false);

        dots.advance_ripples();
        let hit = dots.dots()[0];
        assert!(hit.highlight > 0);
        assert_ne!(hit.color, DotConfig::ripples().color);

        for _ in 0..200 {
            dots.advance_ripples();
        }
        let rested = dots.dots()[0];
        assert_eq!(rested.color, DotConfig::ripples().color);
        assert!((rested.position - rested.origin).length() < 0.01);
    }

    fn steady_ripples() -> DotConfig {
        let mut config = DotConfig::ripples();
        config.dropout = 0.0;
        config.jitter = 0.0;
        if let Some(ripples) = config.ripples.as_mut() {
            ripples.speed = (1.0, 1.0);
        }
        config
    }

    #[test]
    fn test_ripple_emits_flows_once_in_band() {
        let mut dots = seeded(steady_ripples(), Viewport::new(600.0, 600.0));
        dots.add_ripple(Vec2::splat(300.0), 1.0, false);
        let band_start = dots.ripples()[0].max_radius * 0.3;

        while dots.ripples()[0].radius + 1.0 < band_start {
            dots.advance_ripples();
            assert!(dots.flows().is_empty());
        }
        for _ in 0..10 {
            dots.advance_ripples();
        }
        assert!(dots.ripples()[0].flowed);
        let emitted = dots.flows().len();
        assert!((2..=4).contains(&emitted), "{emitted} flows");

        for _ in 0..10 {
            dots.advance_ripples();
        }
        assert!(dots.flows().len() <= emitted);
    }

    #[test]
    fn test_flows_are_pruned_by_age() {
        let mut dots = seeded(steady_ripples(), Viewport::new(600.0, 600.0));
        dots.emit_flow(Vec2::splat(300.0), 0.0, Color::WHITE);
        assert_eq!(dots.flows().len(), 1);
        assert!(dots.record_count() > dots.dots().len());

        let first = dots.flows()[0].particles[0];
        dots.advance_flows();
        let later = dots.flows()[0].particles[0];
        assert!(later.faded_alpha() < first.faded_alpha());

        // the longest flow lives 140 frames
        for _ in 0..150 {
            dots.advance_flows();
        }
        assert!(dots.flows().is_empty());
        assert_eq!(dots.record_count(), dots.dots().len());
    }

    #[test]
    fn test_flows_leaving_the_viewport_are_dropped() {
        let mut dots = seeded(steady_ripples(), Viewport::new(600.0, 600.0));
        dots.emit_flow(Vec2::new(0.5, 300.0), std::f32::consts::PI, Color::WHITE);
        for _ in 0..5 {
            dots.advance_flows();
        }
        assert!(dots.flows().is_empty());
    }

    #[test]
    fn test_flow_count_is_capped() {
        let mut dots = seeded(steady_ripples(), Viewport::new(600.0, 600.0));
        for _ in 0..100 {
            dots.emit_flow(Vec2::splat(300.0), 1.0, Color::WHITE);
        }
        assert_eq!(dots.flows().len(), FlowConfig::default().max_flows);

        let mut plain = seeded(DotConfig::hover(), Viewport::new(600.0, 600.0));
        plain.emit_flow(Vec2::splat(300.0), 1.0, Color::WHITE);
        assert!(plain.flows().is_empty());
    }

    #[test]
    fn test_interference_spokes_follow_radius() {
        let mut config = steady_ripples();
        if let Some(ripples) = config.ripples.as_mut() {
            ripples.interference = Some(InterferenceConfig {
                spoke_chance: 1.0,
                ..InterferenceConfig::default()
            });
        }
        let mut dots = seeded(config, Viewport::new(600.0, 600.0));
        dots.add_ripple(Vec2::splat(300.0), 1.0, false);
        for _ in 0..20 {
            dots.advance_ripples();
        }

        let mut canvas = crate::render::DrawList::new();
        dots.render(&mut canvas);
        // 8 spokes plus one per 15 px of radius
        assert_eq!(canvas.stats().lines, 9);
        assert_eq!(canvas.stats().rings, 1);
    }

    #[test]
    fn test_hover_keeps_ripple_highlights() {
        let config = steady_ripples().with_hover(Some(HoverConfig::default()));
        let mut dots = seeded(config, Viewport::new(300.0, 300.0));
        let center = dots.dots()[0].origin;
        dots.add_ripple(center, 1.0, false);
        dots.advance_ripples();

        let lit = dots.dots()[0];
        assert!(lit.highlight > 0);
        assert!(lit.size > lit.base_size);

        dots.hover(&Pointer::default());
        assert_eq!(dots.dots()[0].size, lit.size);
        assert_eq!(dots.dots()[0].opacity, lit.opacity);
    }

    #[test]
    fn test_degenerate_grid_is_clamped() {
        let viewport = Viewport::new(100.0, 60.0);
        for grid in [0.0, -3.0, f32::NAN] {
            let dots = seeded(DotConfig::hover().with_grid_size(grid), viewport);
            // 25 x 15 cells of 4 px, every other one
            assert_eq!(dots.dots().len(), 188);
        }
        assert!(DotConfig::hover().with_grid_size(0.0).validate().is_err());
        assert!(DotConfig::hover().with_grid_size(f32::NAN).validate().is_err());
    }
}
