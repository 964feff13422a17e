//! Configurable particle field.
//!
//! One engine covers every free-particle background: a flat field filling the
//! viewport, the twinkling hero sphere, and the thousands-of-points vortex.
//! What differs between them is data: a [`FieldConfig`] describing where
//! particles spawn ([`Volume`]), how they move ([`Rule`]s and a
//! [`Boundary`]), and what gets drawn around them (trails, connections,
//! click bursts, a centre glow).
//!
//! # Frame order
//!
//! 1. Click bursts spawn at the clicked positions.
//! 2. The field centre eases toward the pointer, or back to the viewport centre.
//! 3. Every particle pulses, runs its rules, integrates, and hits the boundary.
//! 4. Particles are projected, culled and their trails extended.
//! 5. Burst particles age, and the expired ones are pruned.
//! 6. Connections are found between the candidate particles.
//!
//! # Presets
//!
//! ```ignore
//! let mut sphere = ParticleField::new(FieldConfig::sphere(), Some(7));
//! let mut vortex = ParticleField::new(FieldConfig::vortex(), None);
//! ```

use super::{Effect, FrameContext};
use crate::color::{BlendMode, Color, Theme, ThemedPalette};
use crate::connections::{find_connections, Connection, ConnectionLimits};
use crate::error::ConfigError;
use crate::input::Pointer;
use crate::particle::{Life, Particle, Perspective, Projection, Shape, Trail, TrailPoint};
use crate::render::gpu::{pack_lines, pack_points, LineVertex, PointVertex};
use crate::render::{Canvas, Fill};
use crate::rules::{
    Boundary, Bounds, Crossing, Falloff, PointerForce, PointerMode, PointerSpace, Pulse, Rule,
    RuleContext,
};
use crate::spawn::SpawnContext;
use crate::viewport::{CountPolicy, DeviceClass, Viewport};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

// ========== Configuration ==========

/// Where particles spawn and live.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volume {
    /// Flat rectangle covering the viewport, in surface pixels.
    Viewport,
    /// Sphere inscribed in the viewport, `fraction` of the smaller half
    /// extent. Radii are drawn linearly, so the centre is denser.
    InscribedSphere { fraction: f32 },
    /// Uniformly filled sphere of fixed radius.
    Sphere { radius: f32 },
    /// Fibonacci shell, each point's radius scaled by a factor from `jitter`.
    Shell { radius: f32, jitter: (f32, f32) },
    /// Axis-aligned box of edge lengths `size`, centred on the origin.
    Box { size: Vec3 },
}

impl Volume {
    /// Whether particles stay at `z = 0` in surface pixels.
    pub fn is_flat(&self) -> bool {
        matches!(self, Volume::Viewport)
    }

    /// Bounds for this volume in `viewport`.
    pub fn bounds(&self, viewport: &Viewport) -> Bounds {
        match *self {
            Volume::Viewport => Bounds::Box {
                min: Vec3::ZERO,
                max: Vec3::new(viewport.width, viewport.height, 0.0),
            },
            Volume::InscribedSphere { fraction } => Bounds::Sphere {
                radius: viewport.half_min() * fraction,
            },
            Volume::Sphere { radius } | Volume::Shell { radius, .. } => Bounds::Sphere { radius },
            Volume::Box { size } => Bounds::Box {
                min: -size * 0.5,
                max: size * 0.5,
            },
        }
    }

    /// Seed position of record `index` out of `count`.
    pub fn sample(
        &self,
        spawn: &mut SpawnContext,
        index: u32,
        count: u32,
        viewport: &Viewport,
    ) -> Vec3 {
        match *self {
            Volume::Viewport => spawn.random_in_rect(viewport.size()).extend(0.0),
            Volume::InscribedSphere { fraction } => {
                spawn.random_in_sphere_centered(viewport.half_min() * fraction)
            }
            Volume::Sphere { radius } => spawn.random_in_sphere(radius),
            Volume::Shell { radius, jitter } => {
                let r = radius * spawn.random_in(jitter);
                spawn.fibonacci_sphere(index, count, r)
            }
            Volume::Box { size } => spawn.random_in_box(size * 0.5),
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume::InscribedSphere { fraction: 0.45 }
    }
}

/// Direction of seed velocities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// Random heading in the XY plane; `vz` is uniform in `±speed * depth`.
    Planar { depth: f32 },
    /// Perpendicular to the seed position, for fields that orbit.
    Tangent,
    /// Each axis uniform in `±speed`.
    PerAxis,
}

impl Default for VelocityMode {
    fn default() -> Self {
        VelocityMode::Planar { depth: 0.5 }
    }
}

/// Seed size distribution: `min + r^exponent * (max - min)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: f32,
    pub max: f32,
    /// Above 1.0 skews toward small particles.
    pub exponent: f32,
}

impl SizeRange {
    pub fn sample(&self, r: f32) -> f32 {
        self.min + r.powf(self.exponent) * (self.max - self.min)
    }
}

/// Speed multiplier for the smallest draws of the size distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBoost {
    /// Applies when the raw size draw is below this.
    pub below: f32,
    pub factor: f32,
}

/// Field centre tracking the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    /// Easing rate toward the pointer while it moves.
    pub toward_pointer: f32,
    /// Easing rate back to the viewport centre once it rests.
    pub return_rate: f32,
}

impl Default for Follow {
    fn default() -> Self {
        Self {
            toward_pointer: 0.03,
            return_rate: 0.01,
        }
    }
}

/// Off-screen culling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Culling {
    /// Pixels beyond the surface edge that still count as on screen.
    pub margin: f32,
    /// Particles whose projected size falls below this are skipped.
    pub min_size: f32,
}

impl Default for Culling {
    fn default() -> Self {
        Self {
            margin: 50.0,
            min_size: 0.5,
        }
    }
}

/// Fading position history behind large particles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailConfig {
    /// Only particles with a seed size above this get a trail.
    pub min_size: f32,
    /// History length range, upper bound exclusive.
    pub length: (u32, u32),
    pub color: Color,
    /// Opacity of the segment nearest the particle.
    pub opacity: f32,
    /// Segment width as a fraction of the recorded size.
    pub width: f32,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            min_size: 4.0,
            length: (3, 8),
            color: Color::rgb8(255, 250, 200),
            opacity: 0.2,
            width: 0.3,
        }
    }
}

/// Which particles take part in connection finding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Candidates {
    All,
    /// The largest `fraction` of visible particles, at most `max`.
    Largest { fraction: f32, max: usize },
}

/// Space connection distances are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSpace {
    /// Projected surface pixels.
    Screen,
    /// Particle coordinates.
    World,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub limits: ConnectionLimits,
    pub candidates: Candidates,
    pub space: LinkSpace,
    /// Line color; `None` uses the color of the first particle.
    pub color: Option<Color>,
    /// Line width, scaled by the smaller projection scale of the pair.
    pub width: f32,
    /// Multiply opacity by both particles' alpha.
    pub weight_by_alpha: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            limits: ConnectionLimits {
                max_distance: 200.0,
                max_total: usize::MAX,
                max_per_particle: Some(2),
                opacity: 0.12,
            },
            candidates: Candidates::Largest {
                fraction: 0.25,
                max: 15,
            },
            space: LinkSpace::Screen,
            color: Some(Color::rgb8(255, 250, 200)),
            width: 0.5,
            weight_by_alpha: true,
        }
    }
}

/// Ring of short-lived particles spawned by a click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstConfig {
    pub count: u32,
    pub speed: (f32, f32),
    pub size: (f32, f32),
    /// Frames until a burst particle is pruned.
    pub lifespan: u32,
    /// Trail length range, upper bound exclusive.
    pub trail: (u32, u32),
    /// Velocity kept per frame.
    pub drag: f32,
    /// Alpha at birth, fading linearly with age.
    pub opacity: f32,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            count: 12,
            speed: (1.0, 2.5),
            size: (1.0, 3.0),
            lifespan: 150,
            trail: (5, 11),
            drag: 0.98,
            opacity: 0.6,
        }
    }
}

/// Soft radial glow behind the field centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlowConfig {
    /// Radius as a fraction of the smaller half extent.
    pub radius: f32,
    pub inner: Color,
    pub outer: Color,
    /// Centre alpha over time.
    pub intensity: Pulse,
}

impl Default for GlowConfig {
    fn default() -> Self {
        Self {
            radius: 0.6,
            inner: Color::rgb8(255, 240, 180),
            outer: Color::rgba8(255, 245, 150, 0.0),
            intensity: Pulse {
                base: 0.04,
                amplitude: 0.02,
                frequency: 0.5,
            },
        }
    }
}

/// How a single particle is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sprite {
    /// Circles or rotated rects; large circles get a gradient and a highlight.
    #[default]
    Shaded,
    /// Soft point sprite fading to transparent at the rim.
    Glow,
}

/// Everything that shapes a [`ParticleField`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub count: CountPolicy,
    pub device: DeviceClass,
    pub volume: Volume,
    pub velocity: VelocityMode,
    /// Seed speed range.
    pub speed: (f32, f32),
    pub size: SizeRange,
    pub small_boost: Option<SpeedBoost>,
    /// Share of the largest size draws drawn as rects.
    pub rect_fraction: f32,
    /// Seed alpha range, used when there is no pulse.
    pub alpha: (f32, f32),
    /// Alpha pulse; each particle brings its own phase and speed.
    pub pulse: Option<Pulse>,
    pub pulse_speed: (f32, f32),
    /// Rotation speed is uniform in `±rotation_speed`.
    pub rotation_speed: f32,
    /// Only particles larger than this rotate.
    pub rotate_above: f32,
    pub rules: Vec<Rule>,
    pub boundary: Boundary,
    pub perspective: Option<Perspective>,
    /// Surface pixels per particle unit, for 3D volumes.
    pub world_scale: f32,
    pub follow: Option<Follow>,
    pub culling: Culling,
    pub trails: Option<TrailConfig>,
    pub links: Option<LinkConfig>,
    pub bursts: Option<BurstConfig>,
    pub glow: Option<GlowConfig>,
    pub sprite: Sprite,
    pub blend: BlendMode,
    pub time_step: f32,
    pub palette: ThemedPalette,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self::sphere()
    }
}

impl FieldConfig {
    /// Twinkling hero sphere following the pointer.
    pub fn sphere() -> Self {
        Self {
            count: CountPolicy::default(),
            device: DeviceClass::Desktop,
            volume: Volume::InscribedSphere { fraction: 0.45 },
            velocity: VelocityMode::Planar { depth: 0.5 },
            speed: (0.1, 0.4),
            size: SizeRange {
                min: 1.5,
                max: 6.5,
                exponent: 2.0,
            },
            small_boost: Some(SpeedBoost {
                below: 0.3,
                factor: 1.5,
            }),
            rect_fraction: 0.3,
            alpha: (0.6, 1.0),
            pulse: Some(Pulse {
                base: 0.6,
                amplitude: 0.4,
                frequency: 5.0,
            }),
            pulse_speed: (0.01, 0.03),
            rotation_speed: 0.01,
            rotate_above: 3.0,
            rules: Vec::new(),
            boundary: Boundary::Reflect,
            perspective: Some(Perspective::default()),
            world_scale: 1.0,
            follow: Some(Follow::default()),
            culling: Culling::default(),
            trails: Some(TrailConfig::default()),
            links: Some(LinkConfig::default()),
            bursts: Some(BurstConfig::default()),
            glow: Some(GlowConfig::default()),
            sprite: Sprite::Shaded,
            blend: BlendMode::Alpha,
            time_step: 0.01,
            palette: ThemedPalette::warm_sparkle(),
        }
    }

    /// Swirling shell of glowing points, pulled by the pointer.
    pub fn vortex() -> Self {
        let radius = 25.0;
        let count = 2500;
        Self {
            count: CountPolicy::Fixed(count),
            device: DeviceClass::Desktop,
            volume: Volume::Shell {
                radius,
                jitter: (0.75, 1.10),
            },
            velocity: VelocityMode::Tangent,
            speed: (0.03, 0.07),
            size: SizeRange {
                min: 0.65,
                max: 6.5,
                exponent: 1.0,
            },
            small_boost: None,
            rect_fraction: 0.0,
            alpha: (1.0, 1.0),
            pulse: None,
            pulse_speed: (0.0, 0.0),
            rotation_speed: 0.0,
            rotate_above: f32::MAX,
            rules: vec![
                Rule::SphereSpring {
                    radius,
                    stiffness: 0.01,
                },
                Rule::Swirl {
                    radius,
                    strength: 0.05,
                    secondary: 0.3,
                },
                Rule::Pointer(PointerForce {
                    radius: 8.0,
                    strength: 0.05,
                    mode: PointerMode::Attract,
                    falloff: Falloff::Linear,
                    space: PointerSpace::Normalized {
                        scale: radius,
                        depth: radius * 0.5,
                    },
                }),
                Rule::Wave { strength: 0.01 },
                Rule::SpeedLimit { min: 0.0, max: 0.2 },
                Rule::Drag(0.02),
            ],
            boundary: Boundary::Respawn { threshold: 2.0 },
            perspective: Some(Perspective::new(35.0)),
            world_scale: 13.0,
            follow: None,
            culling: Culling::default(),
            trails: None,
            links: Some(LinkConfig {
                limits: ConnectionLimits {
                    max_distance: 15.0,
                    max_total: count as usize,
                    max_per_particle: None,
                    opacity: 0.12,
                },
                candidates: Candidates::All,
                space: LinkSpace::World,
                color: None,
                width: 1.0,
                weight_by_alpha: false,
            }),
            bursts: None,
            glow: None,
            sprite: Sprite::Glow,
            blend: BlendMode::Additive,
            time_step: 1.0 / 60.0,
            palette: ThemedPalette::mint(),
        }
    }

    /// Drifting cube of points that wraps at its faces, with faint links
    /// between neighbours and a gentle pull toward the pointer.
    pub fn cube() -> Self {
        let edge = 50.0;
        let count = 1500;
        Self {
            count: CountPolicy::Fixed(count),
            device: DeviceClass::Desktop,
            volume: Volume::Box {
                size: Vec3::splat(edge),
            },
            velocity: VelocityMode::PerAxis,
            speed: (0.025, 0.025),
            size: SizeRange {
                min: 2.0,
                max: 2.5,
                exponent: 1.0,
            },
            small_boost: None,
            rect_fraction: 0.0,
            alpha: (1.0, 1.0),
            pulse: None,
            pulse_speed: (0.0, 0.0),
            rotation_speed: 0.0,
            rotate_above: f32::MAX,
            rules: vec![Rule::Pointer(PointerForce {
                radius: 5.0,
                strength: 0.001,
                mode: PointerMode::Attract,
                falloff: Falloff::Constant,
                space: PointerSpace::Normalized {
                    scale: 30.0,
                    depth: 0.0,
                },
            })],
            boundary: Boundary::Wrap,
            perspective: Some(Perspective::new(30.0)),
            world_scale: 12.0,
            follow: None,
            culling: Culling::default(),
            trails: None,
            links: Some(LinkConfig {
                limits: ConnectionLimits {
                    max_distance: 15.0,
                    max_total: count as usize,
                    max_per_particle: None,
                    opacity: 0.15,
                },
                candidates: Candidates::All,
                space: LinkSpace::World,
                color: None,
                width: 1.0,
                weight_by_alpha: false,
            }),
            bursts: None,
            glow: None,
            sprite: Sprite::Glow,
            blend: BlendMode::Additive,
            time_step: 1.0 / 60.0,
            palette: ThemedPalette::mint(),
        }
    }

    pub fn with_count(mut self, count: CountPolicy) -> Self {
        self.count = count;
        self
    }

    pub fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = device;
        self
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_speed(mut self, min: f32, max: f32) -> Self {
        self.speed = (min, max);
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_links(mut self, links: Option<LinkConfig>) -> Self {
        self.links = links;
        self
    }

    pub fn with_bursts(mut self, bursts: Option<BurstConfig>) -> Self {
        self.bursts = bursts;
        self
    }

    pub fn with_trails(mut self, trails: Option<TrailConfig>) -> Self {
        self.trails = trails;
        self
    }

    pub fn with_follow(mut self, follow: Option<Follow>) -> Self {
        self.follow = follow;
        self
    }

    pub fn with_palette(mut self, palette: ThemedPalette) -> Self {
        self.palette = palette;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speed.0 < 0.0 || self.speed.1 < self.speed.0 {
            return Err(invalid("field speed range must be non-negative and ordered"));
        }
        if self.size.min <= 0.0 || self.size.max < self.size.min {
            return Err(invalid("field size range must be positive and ordered"));
        }
        if !(0.0..=1.0).contains(&self.rect_fraction) {
            return Err(invalid("rect_fraction must be within 0..=1"));
        }
        if self.world_scale <= 0.0 || self.time_step <= 0.0 {
            return Err(invalid("world_scale and time_step must be positive"));
        }
        if let Some(p) = self.perspective {
            if p.focal <= 0.0 {
                return Err(invalid("perspective focal length must be positive"));
            }
        }
        match self.volume {
            Volume::InscribedSphere { fraction } if fraction <= 0.0 => {
                return Err(invalid("inscribed sphere fraction must be positive"));
            }
            Volume::Sphere { radius } | Volume::Shell { radius, .. } if radius <= 0.0 => {
                return Err(invalid("volume radius must be positive"));
            }
            Volume::Box { size } if size.min_element() <= 0.0 => {
                return Err(invalid("volume box size must be positive"));
            }
            _ => {}
        }
        if let Some(links) = &self.links {
            if links.limits.max_distance < 0.0 {
                return Err(invalid("connection distance must be non-negative"));
            }
        }
        Ok(())
    }

    fn seed_velocity(&self, spawn: &mut SpawnContext, position: Vec3, speed: f32) -> Vec3 {
        match self.velocity {
            VelocityMode::Planar { depth } => {
                let heading = spawn.random_direction_2d() * speed;
                let vz = if self.volume.is_flat() {
                    0.0
                } else {
                    spawn.random_range(-1.0, 1.0) * speed * depth
                };
                heading.extend(vz)
            }
            VelocityMode::Tangent => spawn.tangent_velocity(position, speed),
            VelocityMode::PerAxis => spawn.random_velocity(speed),
        }
    }

    fn make_particle(
        &self,
        spawn: &mut SpawnContext,
        index: u32,
        count: u32,
        viewport: &Viewport,
        color: Color,
    ) -> Particle {
        let raw = spawn.random();
        let size = self.size.sample(raw);
        let mut speed = spawn.random_in(self.speed);
        if let Some(boost) = self.small_boost {
            if raw < boost.below {
                speed *= boost.factor;
            }
        }

        let position = self.volume.sample(spawn, index, count, viewport);
        let velocity = self.seed_velocity(spawn, position, speed);

        let mut p = Particle::new(position, color)
            .with_velocity(velocity)
            .with_size(size)
            .with_alpha(spawn.random_in(self.alpha));
        p.phase = spawn.random_angle();
        p.pulse_speed = spawn.random_in(self.pulse_speed);
        p.rotation = spawn.random_angle();
        p.rotation_speed = spawn.random_range(-self.rotation_speed, self.rotation_speed);
        if self.rect_fraction > 0.0 && raw >= 1.0 - self.rect_fraction {
            p.shape = Shape::Rect;
        }
        if let Some(trails) = &self.trails {
            if size > trails.min_size {
                let len = spawn.random_uint(trails.length.0, trails.length.1);
                p.trail = Some(Trail::new(len as usize));
            }
        }
        p
    }

    /// Put an escaped particle back into the volume. Size and color survive.
    fn respawn(&self, spawn: &mut SpawnContext, viewport: &Viewport, p: &mut Particle) {
        match self.volume {
            Volume::Shell { radius, .. } => {
                let r = radius * spawn.random_range(0.8, 1.1);
                p.position = spawn.random_on_sphere(r);
                p.velocity = spawn.random_velocity(0.01);
            }
            volume => {
                p.position = volume.sample(spawn, 0, 1, viewport);
                let speed = spawn.random_in(self.speed);
                p.velocity = self.seed_velocity(spawn, p.position, speed);
            }
        }
        if let Some(trail) = p.trail.as_mut() {
            trail.clear();
        }
    }

    fn project(&self, position: Vec3, center: Vec2) -> Option<Projection> {
        if self.volume.is_flat() {
            return Some(Projection {
                screen: position.truncate(),
                scale: 1.0,
            });
        }
        let ws = self.world_scale;
        match self.perspective {
            Some(perspective) => {
                perspective.project(Vec3::new(position.x * ws, position.y * ws, position.z), center)
            }
            None => Some(Projection {
                screen: center + position.truncate() * ws,
                scale: 1.0,
            }),
        }
    }

    /// Pointer in particle space for the first pointer rule.
    fn pointer_target(&self, screen: Vec2, center: Vec2, viewport: &Viewport) -> Option<Vec3> {
        let force = self.rules.iter().find_map(Rule::pointer_force)?;
        let target = match force.space {
            PointerSpace::Screen if self.volume.is_flat() => screen.extend(0.0),
            PointerSpace::Screen => ((screen - center) / self.world_scale).extend(0.0),
            PointerSpace::Normalized { scale, depth } => {
                let n = screen / viewport.size() * 2.0 - Vec2::ONE;
                (n * scale).extend(depth)
            }
        };
        Some(target)
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

// ========== Field ==========

/// Free particles in a configurable volume.
#[derive(Debug, Clone)]
pub struct ParticleField {
    config: FieldConfig,
    spawn: SpawnContext,
    viewport: Viewport,
    theme: Theme,
    center: Vec2,
    time: f32,
    particles: Vec<Particle>,
    /// Palette index of each particle, so a theme switch can recolor.
    slots: Vec<usize>,
    bursts: Vec<Particle>,
    links: Vec<Connection>,
    /// Visible particle indices, far first.
    order: Vec<usize>,
}

impl ParticleField {
    pub fn new(config: FieldConfig, seed: Option<u64>) -> Self {
        Self {
            config,
            spawn: SpawnContext::from_seed(seed),
            viewport: Viewport::default(),
            theme: Theme::default(),
            center: Viewport::default().center(),
            time: 0.0,
            particles: Vec::new(),
            slots: Vec::new(),
            bursts: Vec::new(),
            links: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access for hosts that place particles by hand.
    #[inline]
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    #[inline]
    pub fn bursts(&self) -> &[Particle] {
        &self.bursts
    }

    /// Connections found by the last update, indexing [`particles`](Self::particles).
    #[inline]
    pub fn links(&self) -> &[Connection] {
        &self.links
    }

    /// Current field centre on the surface.
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn bounds(&self) -> Bounds {
        self.config.volume.bounds(&self.viewport)
    }

    /// Point sprites for a GPU backend.
    pub fn point_vertices(&self) -> Vec<PointVertex> {
        pack_points(&self.particles)
    }

    /// Connection lines for a GPU backend.
    pub fn line_vertices(&self) -> Vec<LineVertex> {
        let color = self
            .config
            .links
            .and_then(|l| l.color)
            .unwrap_or_else(|| self.config.palette.for_theme(self.theme).get(0));
        pack_lines(&self.particles, &self.links, color)
    }

    fn spawn_burst(&mut self, click: Vec2) {
        let Some(burst) = self.config.bursts else {
            return;
        };
        let flat = self.config.volume.is_flat();
        let (origin, unit) = if flat {
            (click.extend(0.0), 1.0)
        } else {
            let ws = self.config.world_scale;
            (((click - self.center) / ws).extend(0.0), 1.0 / ws)
        };
        let palette = self.config.palette.for_theme(self.theme);

        for k in 0..burst.count {
            let angle = k as f32 / burst.count as f32 * TAU;
            let speed = self.spawn.random_in(burst.speed) * unit;
            let vz = if flat {
                0.0
            } else {
                self.spawn.random_range(-0.5, 0.5) * speed
            };
            let velocity = Vec3::new(angle.cos() * speed, angle.sin() * speed, vz);
            let color = self.spawn.pick(palette);
            let mut p = Particle::new(origin, color)
                .with_velocity(velocity)
                .with_size(self.spawn.random_in(burst.size))
                .with_alpha(burst.opacity);
            p.life = Some(Life::new(burst.lifespan));
            let len = self.spawn.random_uint(burst.trail.0, burst.trail.1);
            p.trail = Some(Trail::new(len as usize));
            self.bursts.push(p);
        }
    }

    fn update_center(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer) {
        let home = ctx.viewport.center();
        match self.config.follow {
            Some(follow) => {
                let (target, rate) = match pointer.active_position() {
                    Some(p) if pointer.is_moving(ctx.now) => (p, follow.toward_pointer),
                    _ => (home, follow.return_rate),
                };
                self.center += (target - self.center) * rate;
            }
            None => self.center = home,
        }
    }

    /// Project, cull and extend the trail of one particle.
    fn place(&self, p: &mut Particle) {
        let culling = self.config.culling;
        match self.config.project(p.position, self.center) {
            Some(projected) => {
                p.projected = projected;
                p.visible = self.viewport.contains(projected.screen, culling.margin)
                    && p.screen_size() >= culling.min_size;
            }
            None => p.visible = false,
        }
        if p.visible {
            let point = TrailPoint {
                position: p.projected.screen,
                size: p.screen_size(),
                alpha: p.alpha,
            };
            if let Some(trail) = p.trail.as_mut() {
                trail.push(point);
            }
        }
    }

    fn find_links(&self) -> Vec<Connection> {
        let Some(links) = &self.config.links else {
            return Vec::new();
        };

        let mut candidates: Vec<usize> = (0..self.particles.len())
            .filter(|&i| self.particles[i].visible)
            .collect();
        if let Candidates::Largest { fraction, max } = links.candidates {
            candidates.sort_by(|&a, &b| {
                self.particles[b]
                    .screen_size()
                    .total_cmp(&self.particles[a].screen_size())
            });
            let keep = ((candidates.len() as f32 * fraction).floor() as usize).min(max);
            candidates.truncate(keep);
        }

        let points: Vec<Vec3> = candidates
            .iter()
            .map(|&i| {
                let p = &self.particles[i];
                match links.space {
                    LinkSpace::Screen => p.projected.screen.extend(0.0),
                    LinkSpace::World => p.position,
                }
            })
            .collect();

        find_connections(&points, &links.limits)
            .into_iter()
            .map(|c| {
                let (a, b) = (candidates[c.a], candidates[c.b]);
                let opacity = if links.weight_by_alpha {
                    c.opacity * self.particles[a].alpha * self.particles[b].alpha
                } else {
                    c.opacity
                };
                Connection {
                    a: a.min(b),
                    b: a.max(b),
                    distance: c.distance,
                    opacity,
                }
            })
            .collect()
    }

    fn sort_far_first(&mut self) {
        self.order.clear();
        self.order
            .extend((0..self.particles.len()).filter(|&i| self.particles[i].visible));
        if !self.config.volume.is_flat() {
            let particles = &self.particles;
            self.order
                .sort_by(|&a, &b| particles[b].position.z.total_cmp(&particles[a].position.z));
        }
    }

    fn refresh_projection(&mut self) {
        let mut particles = std::mem::take(&mut self.particles);
        for p in &mut particles {
            self.place(p);
        }
        self.particles = particles;
        self.sort_far_first();
    }

    // ========== Drawing ==========

    fn draw_glow(&self, canvas: &mut dyn Canvas) {
        let Some(glow) = self.config.glow else {
            return;
        };
        let alpha = glow.intensity.value(self.time, 0.0, 1.0);
        canvas.fill_circle(
            self.center,
            self.viewport.half_min() * glow.radius,
            Fill::Radial {
                inner: glow.inner.with_alpha(alpha),
                outer: glow.outer,
            },
        );
    }

    fn draw_links(&self, canvas: &mut dyn Canvas) {
        let Some(links) = &self.config.links else {
            return;
        };
        for c in &self.links {
            let (a, b) = (&self.particles[c.a], &self.particles[c.b]);
            let color = links.color.unwrap_or(a.color).with_alpha(c.opacity);
            let width = links.width * a.projected.scale.min(b.projected.scale);
            canvas.stroke_line(a.projected.screen, b.projected.screen, width, color);
        }
    }

    fn draw_trail(&self, canvas: &mut dyn Canvas, p: &Particle, color: Color, opacity: f32) {
        let Some(trail) = &p.trail else {
            return;
        };
        let len = trail.len();
        if len < 2 {
            return;
        }
        let width = self.config.trails.map_or(0.3, |t| t.width);
        let points: Vec<&TrailPoint> = trail.points().collect();
        for t in 1..len {
            let fade = 1.0 - t as f32 / len as f32;
            canvas.stroke_line(
                points[t - 1].position,
                points[t].position,
                points[t].size * width * fade,
                color.with_alpha(fade * opacity * p.alpha),
            );
        }
    }

    fn draw_particle(&self, canvas: &mut dyn Canvas, p: &Particle) {
        let s = p.screen_size();
        let at = p.projected.screen;
        let color = p.color.with_alpha(p.alpha);
        match self.config.sprite {
            Sprite::Glow => canvas.fill_circle(
                at,
                s,
                Fill::Radial {
                    inner: color,
                    outer: p.color.with_alpha(0.0),
                },
            ),
            Sprite::Shaded => {
                let rotation = if s > self.config.rotate_above {
                    p.rotation
                } else {
                    0.0
                };
                match p.shape {
                    Shape::Rect => {
                        canvas.fill_rect(at, Vec2::new(s * 1.2, s * 0.8), rotation, color);
                    }
                    Shape::Circle => {
                        let fill = if s > 3.5 {
                            Fill::Radial {
                                inner: color,
                                outer: Color::WHITE.with_alpha(0.0),
                            }
                        } else {
                            Fill::Solid(color)
                        };
                        canvas.fill_circle(at, s, fill);
                        if s > 4.0 {
                            let offset = Vec2::from_angle(rotation).rotate(Vec2::splat(-0.3 * s));
                            canvas.fill_circle(
                                at + offset,
                                s * 0.15,
                                Fill::Solid(Color::WHITE.with_alpha(p.alpha * 0.9)),
                            );
                        }
                    }
                }
            }
        }
    }
}

impl Effect for ParticleField {
    fn name(&self) -> &'static str {
        "particle_field"
    }

    fn seed(&mut self, viewport: &Viewport, theme: Theme) {
        self.viewport = *viewport;
        self.theme = theme;
        self.center = viewport.center();
        self.particles.clear();
        self.slots.clear();
        self.bursts.clear();
        self.links.clear();

        let count = self
            .config
            .count
            .resolve(viewport, self.config.device.performance_ratio());
        let palette = self.config.palette.for_theme(theme);
        for i in 0..count {
            let slot = self.spawn.random_index(palette.len());
            let p = self
                .config
                .make_particle(&mut self.spawn, i, count, viewport, palette.get(slot));
            self.particles.push(p);
            self.slots.push(slot);
        }
        self.refresh_projection();

        log::info!(
            "✓ Particle field seeded: {} particles, bounds radius {:.1}",
            count,
            self.bounds().radius()
        );
    }

    fn update(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer) {
        self.time = ctx.time;
        self.viewport = ctx.viewport;

        for &click in ctx.clicks {
            self.spawn_burst(click);
        }
        self.update_center(ctx, pointer);

        let rule_ctx = RuleContext {
            time: ctx.time,
            pointer: pointer
                .active_position()
                .and_then(|p| self.config.pointer_target(p, self.center, &self.viewport)),
        };
        let bounds = self.bounds();

        let mut particles = std::mem::take(&mut self.particles);
        let mut respawned = 0;
        for (i, p) in particles.iter_mut().enumerate() {
            p.alpha = match self.config.pulse {
                Some(pulse) => pulse.value(ctx.time, p.phase, p.pulse_speed),
                None => p.base_alpha,
            };
            if p.size > self.config.rotate_above {
                p.rotation += p.rotation_speed;
            }

            let mut velocity = p.velocity;
            for rule in &self.config.rules {
                rule.apply(&rule_ctx, i, p.position, &mut velocity);
            }
            p.velocity = velocity;
            p.position += p.velocity;

            let crossing = self
                .config
                .boundary
                .apply(&mut p.position, &mut p.velocity, &bounds);
            if crossing == Crossing::Escaped {
                self.config.respawn(&mut self.spawn, &self.viewport, p);
                respawned += 1;
            }
            self.place(p);
        }
        self.particles = particles;

        let mut bursts = std::mem::take(&mut self.bursts);
        if let Some(burst) = self.config.bursts {
            for p in &mut bursts {
                p.position += p.velocity;
                p.velocity *= burst.drag;
                if let Some(life) = p.life.as_mut() {
                    life.tick();
                    p.alpha = life.remaining() * burst.opacity;
                }
                self.place(p);
            }
        }
        bursts.retain(|p| !p.is_expired());
        self.bursts = bursts;

        self.sort_far_first();
        self.links = self.find_links();

        if respawned > 0 {
            log::trace!("{} particles respawned", respawned);
        }
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.set_blend(self.config.blend);
        self.draw_glow(canvas);
        self.draw_links(canvas);

        let trail_color = self.config.trails.map_or(Color::WHITE, |t| t.color);
        let trail_opacity = self.config.trails.map_or(0.0, |t| t.opacity);
        for &i in &self.order {
            let p = &self.particles[i];
            self.draw_trail(canvas, p, trail_color, trail_opacity);
            self.draw_particle(canvas, p);
        }

        for p in self.bursts.iter().filter(|p| p.visible) {
            self.draw_trail(canvas, p, p.color, 1.0);
            canvas.fill_circle(
                p.projected.screen,
                p.screen_size(),
                Fill::Solid(p.color.with_alpha(p.alpha)),
            );
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        let palette = self.config.palette.for_theme(theme);
        for (p, &slot) in self.particles.iter_mut().zip(&self.slots) {
            p.color = palette.get(slot);
        }
    }

    fn time_step(&self) -> f32 {
        self.config.time_step
    }

    fn record_count(&self) -> usize {
        self.particles.len() + self.bursts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerConfig, PointerEvent};
    use crate::render::{DrawCommand, DrawList};
    use std::time::Duration;

    fn flat_config(count: u32) -> FieldConfig {
        FieldConfig::sphere()
            .with_count(CountPolicy::Fixed(count))
            .with_volume(Volume::Viewport)
            .with_follow(None)
    }

    fn run(field: &mut ParticleField, viewport: Viewport, frames: u64) {
        let pointer = Pointer::new(PointerConfig::default());
        for frame in 0..frames {
            let ctx = FrameContext::at(frame as f32 * field.time_step(), frame, viewport);
            field.update(&ctx, &pointer);
        }
    }

    #[test]
    fn test_seed_resolves_count() {
        let viewport = Viewport::new(1200.0, 800.0);
        let mut field = ParticleField::new(FieldConfig::sphere(), Some(1));
        field.seed(&viewport, Theme::Light);
        // 960000 / 18000 = 53
        assert_eq!(field.particles().len(), 53);

        let mut mobile = ParticleField::new(
            FieldConfig::sphere().with_device(DeviceClass::Mobile),
            Some(1),
        );
        mobile.seed(&viewport, Theme::Light);
        // floor(960000 / 36000) = 26, halved
        assert_eq!(mobile.particles().len(), 13);
    }

    #[test]
    fn test_sphere_seed_inside_radius() {
        let viewport = Viewport::new(1000.0, 600.0);
        let mut field = ParticleField::new(FieldConfig::sphere(), Some(4));
        field.seed(&viewport, Theme::Dark);
        let radius = field.bounds().radius();
        assert!((radius - 135.0).abs() < 1e-3);
        for p in field.particles() {
            assert!(p.position.length() <= radius + 1e-3);
            assert!(p.size >= 1.5 && p.size <= 6.5);
        }
    }

    #[test]
    fn test_shell_seed_within_jitter() {
        let mut field = ParticleField::new(
            FieldConfig::vortex().with_count(CountPolicy::Fixed(200)),
            Some(2),
        );
        field.seed(&Viewport::default(), Theme::Dark);
        for p in field.particles() {
            let r = p.position.length();
            assert!(r >= 25.0 * 0.75 - 1e-3 && r <= 25.0 * 1.10 + 1e-3);
            assert!(p.velocity.dot(p.position).abs() < 1e-3);
        }
    }

    #[test]
    fn test_flat_field_stays_in_viewport() {
        let viewport = Viewport::new(400.0, 300.0);
        let mut field = ParticleField::new(flat_config(30).with_speed(2.0, 4.0), Some(9));
        field.seed(&viewport, Theme::Light);
        run(&mut field, viewport, 500);
        for p in field.particles() {
            assert!(p.position.x >= 0.0 && p.position.x <= 400.0);
            assert!(p.position.y >= 0.0 && p.position.y <= 300.0);
            assert_eq!(p.position.z, 0.0);
        }
    }

    #[test]
    fn test_largest_candidates_capped() {
        let viewport = Viewport::new(300.0, 300.0);
        let config = flat_config(100).with_links(Some(LinkConfig {
            limits: ConnectionLimits {
                max_distance: 1000.0,
                max_per_particle: None,
                ..ConnectionLimits::default()
            },
            ..LinkConfig::default()
        }));
        let mut field = ParticleField::new(config, Some(3));
        field.seed(&viewport, Theme::Light);
        run(&mut field, viewport, 1);

        let mut endpoints: Vec<usize> = field.links().iter().flat_map(|c| [c.a, c.b]).collect();
        endpoints.sort_unstable();
        endpoints.dedup();
        assert!(endpoints.len() <= 15);
        assert!(field.links().iter().all(|c| c.a < c.b));
    }

    #[test]
    fn test_bursts_expire() {
        let viewport = Viewport::new(500.0, 500.0);
        let mut field = ParticleField::new(flat_config(0), Some(5));
        field.seed(&viewport, Theme::Light);

        let pointer = Pointer::new(PointerConfig::default());
        let clicks = [Vec2::new(250.0, 250.0)];
        let mut ctx = FrameContext::at(0.0, 0, viewport);
        ctx.clicks = &clicks;
        field.update(&ctx, &pointer);
        assert_eq!(field.bursts().len(), 12);

        run(&mut field, viewport, 149);
        assert!(field.bursts().is_empty());
    }

    #[test]
    fn test_center_follows_moving_pointer() {
        let viewport = Viewport::new(800.0, 600.0);
        let mut field = ParticleField::new(FieldConfig::sphere(), Some(6));
        field.seed(&viewport, Theme::Light);

        let mut pointer = Pointer::new(PointerConfig::default());
        pointer.handle(
            PointerEvent::Moved(Vec2::new(700.0, 100.0)),
            Duration::ZERO,
            &viewport,
        );
        let mut ctx = FrameContext::at(0.0, 0, viewport);
        ctx.now = Duration::from_millis(16);
        field.update(&ctx, &pointer);
        let moved = field.center();
        assert!(moved.x > 400.0 && moved.y < 300.0);

        // after the idle timeout the centre heads home
        ctx.now = Duration::from_secs(5);
        field.update(&ctx, &pointer);
        assert!(field.center().x < moved.x);
    }

    #[test]
    fn test_draws_far_first() {
        let viewport = Viewport::new(800.0, 600.0);
        let mut field = ParticleField::new(
            FieldConfig::sphere()
                .with_count(CountPolicy::Fixed(40))
                .with_links(None),
            Some(8),
        );
        field.seed(&viewport, Theme::Light);
        run(&mut field, viewport, 1);

        let zs: Vec<f32> = field.order.iter().map(|&i| field.particles[i].position.z).collect();
        assert!(zs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_theme_recolors_in_place() {
        let viewport = Viewport::new(800.0, 600.0);
        let mut field = ParticleField::new(FieldConfig::vortex().with_count(CountPolicy::Fixed(5)), Some(1));
        field.seed(&viewport, Theme::Light);
        let before: Vec<Vec3> = field.particles().iter().map(|p| p.position).collect();

        field.set_theme(Theme::Dark);
        let mint = Color::from_hex("#4EFF9E").unwrap();
        assert!(field.particles().iter().all(|p| p.color == mint));
        let after: Vec<Vec3> = field.particles().iter().map(|p| p.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_render_glow_then_links_then_particles() {
        let viewport = Viewport::new(800.0, 600.0);
        let mut field = ParticleField::new(FieldConfig::sphere(), Some(11));
        field.seed(&viewport, Theme::Light);
        run(&mut field, viewport, 3);

        let mut list = DrawList::new();
        field.render(&mut list);
        let first = list.commands().first().copied();
        assert!(matches!(first, Some(DrawCommand::Circle { fill: Fill::Radial { .. }, .. })));
        assert!(list.stats().circles + list.stats().rects >= 1);
    }

    #[test]
    fn test_gpu_vertices_match_records() {
        let mut field = ParticleField::new(FieldConfig::vortex().with_count(CountPolicy::Fixed(50)), Some(1));
        field.seed(&Viewport::default(), Theme::Dark);
        run(&mut field, Viewport::default(), 1);
        assert_eq!(field.point_vertices().len(), 50);
        assert_eq!(field.line_vertices().len(), field.links().len() * 2);
    }

    #[test]
    fn test_shell_respawn_lands_on_shell() {
        let config = FieldConfig::vortex().with_count(CountPolicy::Fixed(20));
        let mut field = ParticleField::new(config, Some(12));
        field.seed(&Viewport::default(), Theme::Dark);
        field.particles_mut()[0].position = Vec3::new(125.0, 0.0, 0.0);

        run(&mut field, Viewport::default(), 1);
        let r = field.particles()[0].position.length();
        assert!(r >= 25.0 * 0.8 - 1e-3 && r <= 25.0 * 1.1 + 1e-3, "respawned at {r}");
        assert!(field.particles()[0].velocity.abs().max_element() <= 0.01);
    }

    #[test]
    fn test_cube_wraps_at_faces() {
        let config = FieldConfig::cube()
            .with_count(CountPolicy::Fixed(100))
            .with_speed(3.0, 3.0);
        let mut field = ParticleField::new(config, Some(14));
        let viewport = Viewport::new(960.0, 540.0);
        field.seed(&viewport, Theme::Light);
        assert_eq!(field.bounds().radius(), 25.0);

        run(&mut field, viewport, 120);
        for p in field.particles() {
            assert!(p.position.abs().max_element() <= 25.0 + 1e-3);
        }
    }

    #[test]
    fn test_cube_pulls_toward_pointer() {
        let viewport = Viewport::new(960.0, 540.0);
        let mut field = ParticleField::new(FieldConfig::cube().with_count(CountPolicy::Fixed(2)), Some(2));
        field.seed(&viewport, Theme::Light);
        field.particles_mut()[0].position = Vec3::new(1.0, 0.0, 0.0);
        field.particles_mut()[0].velocity = Vec3::ZERO;
        field.particles_mut()[1].position = Vec3::new(20.0, 0.0, 0.0);
        field.particles_mut()[1].velocity = Vec3::ZERO;

        let mut pointer = Pointer::new(PointerConfig::default());
        pointer.handle(PointerEvent::Moved(viewport.center()), Duration::ZERO, &viewport);
        field.update(&FrameContext::at(0.0, 0, viewport), &pointer);

        // constant pull inside the 5 unit radius, nothing beyond it
        let near = field.particles()[0].velocity;
        assert!((near.x + 0.001).abs() < 1e-6);
        assert_eq!(field.particles()[1].velocity, Vec3::ZERO);
    }
}
