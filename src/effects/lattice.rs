//! Nested wireframe cubes seen from the inside.
//!
//! Two cube surfaces are subdivided into grids: an outer cube of `size`
//! units with `divisions` cells per side, and an inner one scaled by
//! `inner_scale` with two fewer divisions. Only surface vertices exist, joined
//! by edges along the three axes. Coordinates are negated so the camera sits
//! inside the outer cube, looking at its far walls.
//!
//! Edges glow on independent random schedules, the whole grid flashes on a
//! fixed period, and the pointer tilts the lattice with some inertia.
//!
//! An optional interior adds a cloud of pulsing points joined by faint
//! links, streams that drift outward from the centre and explode from
//! clicks, and a pointer that nudges nearby points aside.

use super::{Effect, FrameContext};
use crate::color::{BlendMode, Color, Palette, Theme};
use crate::error::ConfigError;
use crate::input::Pointer;
use crate::connections::{find_connections, Connection, ConnectionLimits};
use crate::particle::{Life, Perspective, Projection};
use crate::render::{Canvas, Fill};
use crate::spawn::SpawnContext;
use crate::viewport::Viewport;
use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_4, PI, TAU};
use std::time::Duration;

/// Shape of an edge's glow over its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlowPattern {
    Pulse,
    Steady,
    Flash,
    Wave,
}

impl GlowPattern {
    pub const ALL: [GlowPattern; 4] = [
        GlowPattern::Pulse,
        GlowPattern::Steady,
        GlowPattern::Flash,
        GlowPattern::Wave,
    ];

    /// Intensity at `progress` (0..1) through the glow.
    pub fn intensity(self, progress: f32) -> f32 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            GlowPattern::Pulse => (p * PI * 4.0).sin() * 0.5 + 0.5,
            GlowPattern::Steady => 0.8,
            GlowPattern::Flash => {
                if (p * PI * 8.0).sin() > 0.0 {
                    0.9
                } else {
                    0.2
                }
            }
            // ease-in-out quad
            GlowPattern::Wave => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// Random glow timing, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlowSchedule {
    pub first_delay: (f32, f32),
    pub duration: (f32, f32),
    pub rest: (f32, f32),
}

impl Default for GlowSchedule {
    fn default() -> Self {
        Self {
            first_delay: (0.0, 10_000.0),
            duration: (300.0, 2_300.0),
            rest: (1_000.0, 11_000.0),
        }
    }
}

/// Whole-grid flash timing, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlashTiming {
    pub period: f64,
    pub length: f64,
}

impl Default for FlashTiming {
    fn default() -> Self {
        Self {
            period: 4_000.0,
            length: 500.0,
        }
    }
}

/// Stream points thrown out from a click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplosionConfig {
    pub count: u32,
    pub speed: (f32, f32),
    pub size: (f32, f32),
    /// Frames until an explosion point is gone.
    pub lifespan: u32,
    pub drag: f32,
    /// Trail length range, upper bound exclusive.
    pub trail: (u32, u32),
    /// Click offset from the centre as a share of the lattice size.
    pub reach: f32,
    pub depth: f32,
}

impl Default for ExplosionConfig {
    fn default() -> Self {
        Self {
            count: 12,
            speed: (1.0, 2.5),
            size: (1.0, 3.0),
            lifespan: 150,
            drag: 0.98,
            trail: (5, 11),
            reach: 0.3,
            depth: -50.0,
        }
    }
}

/// Points streaming outward from the centre, each with a short trail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub count: u32,
    pub max: u32,
    /// Launch radius as a share of the lattice size.
    pub origin: f32,
    /// Streams past this share of the size on any axis are relaunched.
    pub escape: f32,
    pub speed: (f32, f32),
    pub size: (f32, f32),
    pub trail: (u32, u32),
    /// Chance per frame of one extra stream while below `max`.
    pub spawn_chance: f32,
    pub opacity: f32,
    pub explosion: Option<ExplosionConfig>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            count: 33,
            max: 66,
            origin: 0.14,
            escape: 0.6,
            speed: (0.1, 0.1045),
            size: (0.5, 2.0),
            trail: (3, 8),
            spawn_chance: 0.01,
            opacity: 0.6,
            explosion: Some(ExplosionConfig::default()),
        }
    }
}

/// Point cloud inside the cubes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteriorConfig {
    pub count: u32,
    /// Edge of the seeding box as a share of the lattice size.
    pub spread: f32,
    pub size: (f32, f32),
    pub pulse_speed: (f32, f32),
    /// Pulse swings between `1 - 2 * depth` and 1.
    pub pulse_depth: f32,
    pub flow_speed: (f32, f32),
    /// Drift distance around the rest position.
    pub flow_amplitude: f32,
    /// `opacity` scales link alpha at zero distance.
    pub links: ConnectionLimits,
    /// Link alpha never drops below this share of `links.opacity`.
    pub link_floor: f32,
    pub link_width: f32,
    pub halo: bool,
    pub pointer_radius: f32,
    pub pointer_strength: f32,
    /// Pointer offset from the centre as a share of the lattice size.
    pub pointer_reach: f32,
    pub streams: Option<StreamConfig>,
}

impl Default for InteriorConfig {
    fn default() -> Self {
        Self {
            count: 200,
            spread: 0.8,
            size: (1.0, 3.0),
            pulse_speed: (0.0005, 0.0015),
            pulse_depth: 0.2,
            flow_speed: (0.001, 0.004),
            flow_amplitude: 5.0,
            links: ConnectionLimits {
                max_distance: 120.0,
                max_total: 70,
                max_per_particle: None,
                opacity: 0.28,
            },
            link_floor: 0.1,
            link_width: 0.5,
            halo: true,
            pointer_radius: 250.0,
            pointer_strength: 0.15,
            pointer_reach: 0.2,
            streams: Some(StreamConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Outer cube edge length.
    pub size: f32,
    pub divisions: u32,
    /// Whether the scaled inner cube is built.
    pub inner_cube: bool,
    pub inner_scale: f32,
    pub inner_divisions: u32,
    /// Vertex dot size of the outer and inner cube.
    pub vertex_size: (f32, f32),
    pub line_width: f32,
    pub focal: f32,
    /// Geometry farther than this from the camera plane is skipped.
    pub cull_depth: f32,
    /// Tilt limit in radians on both axes.
    pub max_tilt: f32,
    pub tilt_ease: f32,
    pub glow: GlowSchedule,
    pub flash: FlashTiming,
    pub palette: Palette,
    pub glow_colors: Palette,
    pub interior: Option<InteriorConfig>,
    pub time_step: f32,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            size: 2000.0,
            divisions: 14,
            inner_cube: true,
            inner_scale: 0.6,
            inner_divisions: 12,
            vertex_size: (1.2, 1.0),
            line_width: 1.5,
            focal: 900.0,
            cull_depth: 5000.0,
            max_tilt: 0.12,
            tilt_ease: 0.05,
            glow: GlowSchedule::default(),
            flash: FlashTiming::default(),
            palette: Palette::cyber_blue(),
            glow_colors: Palette::lattice_glow(),
            interior: None,
            time_step: 0.005,
        }
    }
}

impl LatticeConfig {
    /// A single cube around a drifting point cloud.
    pub fn cube_points() -> Self {
        Self {
            size: 1500.0,
            divisions: 10,
            inner_cube: false,
            inner_divisions: 8,
            line_width: 1.6,
            focal: 1200.0,
            interior: Some(InteriorConfig::default()),
            ..Self::default()
        }
    }

    pub fn with_interior(mut self, interior: Option<InteriorConfig>) -> Self {
        self.interior = interior;
        self
    }

    pub fn with_divisions(mut self, outer: u32, inner: u32) -> Self {
        self.divisions = outer;
        self.inner_divisions = inner;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.divisions == 0 || self.inner_divisions == 0 {
            return Err(ConfigError::Invalid(
                "lattice divisions must be at least 1".into(),
            ));
        }
        if self.size <= 0.0 || self.focal <= 0.0 || self.cull_depth <= 0.0 {
            return Err(ConfigError::Invalid(
                "lattice size, focal and cull_depth must be positive".into(),
            ));
        }
        if let Some(interior) = &self.interior {
            if interior.links.max_distance <= 0.0 {
                return Err(ConfigError::Invalid(
                    "interior link distance must be positive".into(),
                ));
            }
            if interior.streams.is_some_and(|s| s.trail.1 <= s.trail.0) {
                return Err(ConfigError::Invalid(
                    "stream trail range must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// A surface vertex of one cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Color,
    pub size: f32,
    /// Whether the vertex gets a halo.
    pub glow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EdgeGlow {
    active: bool,
    pattern: GlowPattern,
    color: Color,
    start: f64,
    duration: f64,
    next_start: f64,
    intensity: f32,
}

/// Edge between two axis-adjacent vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub color: Color,
    glow: EdgeGlow,
}

impl Edge {
    /// Current glow intensity, 0.0 when idle.
    pub fn glow(&self) -> f32 {
        self.glow.intensity
    }

    pub fn is_glowing(&self) -> bool {
        self.glow.active
    }
}

/// A point of the interior cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteriorPoint {
    /// Position the point drifts around.
    pub rest: Vec3,
    pub position: Vec3,
    /// Offset away from the pointer.
    pub push: Vec3,
    pub size: f32,
    pub color: Color,
    pub pulse: f32,
    pulse_phase: f32,
    pulse_speed: f32,
    flow_phase: f32,
    flow_speed: f32,
}

/// A point drifting through the lattice with a trail of past positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub position: Vec3,
    pub velocity: Vec3,
    pub size: f32,
    pub color: Color,
    /// Set on explosion points, which fade out instead of relaunching.
    pub life: Option<Life>,
    drag: f32,
    trail: VecDeque<Vec3>,
    trail_len: usize,
}

impl Stream {
    pub fn trail(&self) -> impl Iterator<Item = &Vec3> {
        self.trail.iter()
    }

    fn advance(&mut self) {
        self.position += self.velocity;
        self.velocity *= self.drag;
        self.trail.push_back(self.position);
        while self.trail.len() > self.trail_len {
            self.trail.pop_front();
        }
    }
}

fn launch_stream(
    spawn: &mut SpawnContext,
    cfg: &StreamConfig,
    size: f32,
    palette: &Palette,
) -> Stream {
    let direction = spawn.random_direction();
    let radius = size * cfg.origin * spawn.random_range(0.0, 1.0);
    Stream {
        position: direction * radius,
        velocity: direction * spawn.random_in(cfg.speed),
        size: spawn.random_in(cfg.size),
        color: spawn.pick(palette),
        life: None,
        drag: 1.0,
        trail: VecDeque::new(),
        trail_len: spawn.random_uint(cfg.trail.0, cfg.trail.1) as usize,
    }
}

/// Wireframe cube lattice.
#[derive(Debug, Clone)]
pub struct Lattice {
    config: LatticeConfig,
    spawn: SpawnContext,
    viewport: Viewport,
    time: f32,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    /// Rotated positions and projections from the last update.
    view: Vec<(Vec3, Option<Projection>)>,
    rotation: Mat3,
    points: Vec<InteriorPoint>,
    links: Vec<Connection>,
    streams: Vec<Stream>,
    tilt: Vec2,
    inertia: Vec2,
    seen_move: Option<Duration>,
    epoch: Option<f64>,
    elapsed: f64,
}

fn palette_index(outer: bool, i: u32, j: u32, k: u32, d: u32) -> usize {
    const BASE: usize = 0;
    const ACCENT: usize = 1;
    const DREAM1: usize = 2;
    const DREAM2: usize = 3;
    const DREAM3: usize = 4;

    let corner_pair = (i == 0 && j == 0) || (i == d && j == d);
    let checker = (i + j) % 2 == 0;
    let on_edge = |c: u32| c == 0 || c == d;
    if outer {
        if corner_pair {
            ACCENT
        } else if k == 0 && checker {
            DREAM1
        } else if k == d && checker {
            DREAM2
        } else if on_edge(i) && on_edge(j) {
            DREAM3
        } else {
            BASE
        }
    } else if corner_pair {
        DREAM2
    } else if k == 0 && checker {
        DREAM3
    } else if k == d && checker {
        ACCENT
    } else {
        DREAM1
    }
}

impl Lattice {
    pub fn new(config: LatticeConfig, seed: Option<u64>) -> Self {
        Self {
            config,
            spawn: SpawnContext::from_seed(seed),
            viewport: Viewport::default(),
            time: 0.0,
            vertices: Vec::new(),
            edges: Vec::new(),
            view: Vec::new(),
            rotation: Mat3::IDENTITY,
            points: Vec::new(),
            links: Vec::new(),
            streams: Vec::new(),
            tilt: Vec2::ZERO,
            inertia: Vec2::ZERO,
            seen_move: None,
            epoch: None,
            elapsed: 0.0,
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn points(&self) -> &[InteriorPoint] {
        &self.points
    }

    /// Interior links from the last update, opacity already floored.
    #[inline]
    pub fn links(&self) -> &[Connection] {
        &self.links
    }

    #[inline]
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// Current tilt around the X and Y axes.
    #[inline]
    pub fn tilt(&self) -> Vec2 {
        self.tilt
    }

    /// Whether the whole-grid flash is on, and how far into it (0..1).
    fn flash(&self) -> Option<f32> {
        let timing = self.config.flash;
        let since = self.elapsed % timing.period;
        (since < timing.length).then(|| (since / timing.length) as f32)
    }

    fn build_cube(&mut self, size: f32, divisions: u32, vertex_size: f32, outer: bool) {
        let d = divisions;
        let step = size / d as f32;
        let half = size / 2.0;
        let glow_every = if outer { 4 } else { 3 };
        let mut index: HashMap<(u32, u32, u32), usize> = HashMap::new();

        for i in 0..=d {
            for j in 0..=d {
                for k in 0..=d {
                    let surface = [i, j, k].iter().any(|&c| c == 0 || c == d);
                    if !surface {
                        continue;
                    }
                    let coords = Vec3::new(i as f32, j as f32, k as f32) * step - Vec3::splat(half);
                    index.insert((i, j, k), self.vertices.len());
                    self.vertices.push(Vertex {
                        position: -coords,
                        color: self.config.palette.get(palette_index(outer, i, j, k, d)),
                        size: vertex_size,
                        glow: (i + j + k) % glow_every == 0,
                    });
                }
            }
        }

        let mut keys: Vec<(u32, u32, u32)> = index.keys().copied().collect();
        keys.sort_unstable();
        for (i, j, k) in keys {
            let a = index[&(i, j, k)];
            for next in [(i + 1, j, k), (i, j + 1, k), (i, j, k + 1)] {
                if let Some(&b) = index.get(&next) {
                    let glow = self.schedule_first();
                    self.edges.push(Edge {
                        a,
                        b,
                        color: self.vertices[a].color,
                        glow,
                    });
                }
            }
        }
    }

    fn schedule_first(&mut self) -> EdgeGlow {
        EdgeGlow {
            active: false,
            pattern: GlowPattern::Steady,
            color: Color::WHITE,
            start: 0.0,
            duration: 0.0,
            next_start: self.spawn.random_in(self.config.glow.first_delay) as f64,
            intensity: 0.0,
        }
    }

    fn update_glows(&mut self) {
        let now = self.elapsed;
        let schedule = self.config.glow;
        for edge in &mut self.edges {
            let g = &mut edge.glow;
            if !g.active && now >= g.next_start {
                g.active = true;
                g.start = now;
                g.duration = self.spawn.random_in(schedule.duration) as f64;
                g.pattern = GlowPattern::ALL[self.spawn.random_index(GlowPattern::ALL.len())];
                g.color = self.spawn.pick(&self.config.glow_colors);
            }
            if g.active {
                let progress = if g.duration > 0.0 {
                    (now - g.start) / g.duration
                } else {
                    1.0
                };
                if progress >= 1.0 {
                    g.active = false;
                    g.intensity = 0.0;
                    g.next_start = now + self.spawn.random_in(schedule.rest) as f64;
                } else {
                    g.intensity = g.pattern.intensity(progress as f32);
                }
            }
        }
    }

    fn update_tilt(&mut self, pointer: &Pointer) {
        let max = self.config.max_tilt;
        if pointer.last_move() != self.seen_move {
            self.seen_move = pointer.last_move();
            self.inertia = pointer.velocity();
        }

        let n = pointer
            .active_position()
            .map(|p| p / self.viewport.size() * 2.0 - Vec2::ONE)
            .unwrap_or(Vec2::ZERO);
        let mut target = Vec2::new(-n.y * max, n.x * max);
        target += Vec2::new(-self.inertia.y, self.inertia.x) * 0.05;

        if pointer.is_active() {
            self.inertia *= 0.95;
        } else {
            self.inertia *= 0.97;
            if self.inertia.length() < 0.01 {
                self.inertia = Vec2::ZERO;
            }
        }

        self.tilt += (target - self.tilt) * self.config.tilt_ease;
        self.tilt = self.tilt.clamp(Vec2::splat(-max), Vec2::splat(max));
    }

    fn project_all(&mut self) {
        // X first, then Y
        let rotation = Mat3::from_rotation_y(self.tilt.y) * Mat3::from_rotation_x(self.tilt.x);
        self.rotation = rotation;
        let perspective = Perspective::new(self.config.focal);
        let center = self.viewport.center();
        self.view = self
            .vertices
            .iter()
            .map(|v| {
                let p = rotation * v.position;
                (p, perspective.project(p, center))
            })
            .collect();
    }

    fn seed_interior(&mut self) {
        self.points.clear();
        self.links.clear();
        self.streams.clear();
        let Some(cfg) = self.config.interior.as_ref() else {
            return;
        };
        let half = Vec3::splat(self.config.size * cfg.spread / 2.0);
        for _ in 0..cfg.count {
            let rest = self.spawn.random_in_box(half);
            self.points.push(InteriorPoint {
                rest,
                position: rest,
                push: Vec3::ZERO,
                size: self.spawn.random_in(cfg.size),
                color: self.spawn.pick(&self.config.palette),
                pulse: 1.0,
                pulse_phase: self.spawn.random_angle(),
                pulse_speed: self.spawn.random_in(cfg.pulse_speed),
                flow_phase: self.spawn.random_angle(),
                flow_speed: self.spawn.random_in(cfg.flow_speed),
            });
        }
        if let Some(streams) = &cfg.streams {
            for _ in 0..streams.count {
                let stream =
                    launch_stream(&mut self.spawn, streams, self.config.size, &self.config.palette);
                self.streams.push(stream);
            }
        }
    }

    fn update_interior(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer) {
        let Some(cfg) = self.config.interior.as_ref() else {
            return;
        };
        // drift runs on wall-clock milliseconds
        let t = self.elapsed as f32;
        let reach = self.config.size * cfg.pointer_reach;
        let mouse = pointer
            .active_position()
            .map(|p| (p / self.viewport.size() * 2.0 - Vec2::ONE) * reach);

        for point in &mut self.points {
            point.pulse = (t * point.pulse_speed + point.pulse_phase).sin() * cfg.pulse_depth
                + (1.0 - cfg.pulse_depth);
            let (fs, fo) = (point.flow_speed, point.flow_phase);
            let flow = Vec3::new(
                (t * fs + fo).sin(),
                (t * fs * 0.7 + fo).cos(),
                (t * fs * 0.5 + fo + FRAC_PI_4).sin(),
            );
            point.position = point.rest + flow * cfg.flow_amplitude;

            point.push = Vec3::ZERO;
            if let Some(m) = mouse {
                let rotated = self.rotation * point.position;
                let d = Vec3::new(rotated.x - m.x, rotated.y - m.y, rotated.z);
                let dist = d.length();
                if dist < cfg.pointer_radius {
                    let f = (1.0 - dist / cfg.pointer_radius) * cfg.pointer_strength;
                    point.push = d * f * Vec3::new(-0.5, -0.5, -0.2);
                }
            }
        }

        let positions: Vec<Vec3> = self.points.iter().map(|p| p.position).collect();
        let limits = cfg.links;
        self.links = find_connections(&positions, &limits);
        for link in &mut self.links {
            let share = (1.0 - link.distance / limits.max_distance).max(cfg.link_floor);
            link.opacity = share * limits.opacity;
        }

        let Some(sc) = cfg.streams.as_ref() else {
            return;
        };
        let escape = self.config.size * sc.escape;
        let mut relaunch = 0;
        self.streams.retain_mut(|s| {
            s.advance();
            match s.life.as_mut() {
                Some(life) => {
                    life.tick();
                    !life.is_expired()
                }
                None => {
                    let inside = s.position.abs().max_element() <= escape;
                    relaunch += usize::from(!inside);
                    inside
                }
            }
        });
        for _ in 0..relaunch {
            let stream = launch_stream(&mut self.spawn, sc, self.config.size, &self.config.palette);
            self.streams.push(stream);
        }
        if self.streams.len() < sc.max as usize && self.spawn.chance(sc.spawn_chance) {
            let stream = launch_stream(&mut self.spawn, sc, self.config.size, &self.config.palette);
            self.streams.push(stream);
        }

        let Some(ex) = sc.explosion else {
            return;
        };
        for &click in ctx.clicks {
            let n = click / self.viewport.size() * 2.0 - Vec2::ONE;
            let origin = (n * self.config.size * ex.reach).extend(ex.depth);
            for i in 0..ex.count {
                let angle = i as f32 / ex.count as f32 * TAU;
                let speed = self.spawn.random_in(ex.speed);
                let velocity = Vec3::new(
                    angle.cos() * speed,
                    angle.sin() * speed,
                    self.spawn.random_range(-0.5, 0.5) * speed,
                ) * 0.5;
                self.streams.push(Stream {
                    position: origin,
                    velocity,
                    size: self.spawn.random_in(ex.size),
                    color: self.spawn.pick(&self.config.palette),
                    life: Some(Life::new(ex.lifespan)),
                    drag: ex.drag,
                    trail: VecDeque::new(),
                    trail_len: self.spawn.random_uint(ex.trail.0, ex.trail.1) as usize,
                });
            }
        }
        log::trace!(
            "lattice interior: {} links, {} streams",
            self.links.len(),
            self.streams.len()
        );
    }

    fn depth_factor(&self, z: f32) -> Option<f32> {
        let limit = self.config.cull_depth;
        (z.abs() <= limit).then(|| 1.0 - z.abs() / limit)
    }

    fn draw_edges(&self, canvas: &mut dyn Canvas) {
        let lw = self.config.line_width;
        let flash = self.flash().map(|t| (1.0 - t) * 0.5);
        let flashing = flash.is_some();
        let flash = flash.unwrap_or(0.0);

        for edge in &self.edges {
            let (ra, pa) = self.view[edge.a];
            let (rb, pb) = self.view[edge.b];
            let (Some(pa), Some(pb)) = (pa, pb) else {
                continue;
            };
            let Some(df) = self.depth_factor((ra.z + rb.z) / 2.0) else {
                continue;
            };
            let g = edge.glow();
            let (from, to) = (pa.screen, pb.screen);

            if g > 0.0 || flashing {
                let color = if g > 0.5 {
                    edge.glow.color
                } else if flashing {
                    Color::rgba8(120, 200, 255, 0.8)
                } else {
                    Color::rgba8(240, 250, 255, 0.6)
                };
                let alpha = ((0.5 + flash + g * 0.7) * df).min(1.0);
                canvas.stroke_line(from, to, lw * 2.5 * (1.0 + g * 1.5), color.scale_alpha(alpha));
            }

            if g > 0.6 || flashing {
                let color = if g > 0.6 {
                    edge.glow.color.scale_alpha(0.3 * g * df)
                } else {
                    Color::rgba8(150, 230, 255, 0.2).scale_alpha(0.2 * df)
                };
                canvas.stroke_line(from, to, lw * 4.0 * (1.0 + 2.0 * g), color);
            }

            if g > 0.8 {
                canvas.stroke_line(
                    from,
                    to,
                    lw * 6.0 * g,
                    Color::WHITE.with_alpha(0.15 * g * df),
                );
            }

            let main = if g > 0.7 {
                edge.glow.color.with_alpha(1.0)
            } else if flashing {
                Color::WHITE
            } else {
                edge.color
            };
            let alpha = ((0.8 + flash * 0.3 + g * 0.5) * df).min(1.0);
            canvas.stroke_line(from, to, lw * (1.0 + 0.7 * g), main.scale_alpha(alpha));
        }
    }

    fn draw_vertices(&self, canvas: &mut dyn Canvas) {
        let ff = self.flash().map_or(0.0, |t| (1.0 - t) * 0.7);

        let mut order: Vec<usize> = (0..self.vertices.len())
            .filter(|&i| self.view[i].1.is_some())
            .collect();
        order.sort_by(|&a, &b| self.view[b].0.z.total_cmp(&self.view[a].0.z));

        for i in order {
            let (rotated, Some(projected)) = self.view[i] else {
                continue;
            };
            let Some(df) = self.depth_factor(rotated.z) else {
                continue;
            };
            let vertex = &self.vertices[i];
            let size = vertex.size * projected.scale;
            let at = projected.screen;

            if vertex.glow || ff > 0.3 {
                let color = if ff > 0.5 { Color::WHITE } else { vertex.color };
                let alpha = (0.3 + 0.3 * ff) * df;
                canvas.fill_circle(
                    at,
                    size * (4.0 + 3.0 * ff),
                    Fill::Radial {
                        inner: color.with_alpha(alpha),
                        outer: color.with_alpha(0.0),
                    },
                );
            }
            if ff > 0.6 {
                canvas.fill_circle(
                    at,
                    size * 2.0,
                    Fill::Radial {
                        inner: Color::WHITE.with_alpha(0.4 * df),
                        outer: Color::WHITE.with_alpha(0.0),
                    },
                );
            }
            let color = if ff > 0.5 { Color::WHITE } else { vertex.color };
            canvas.fill_circle(
                at,
                size * (1.0 + 0.5 * ff),
                Fill::Solid(color.with_alpha(df * (0.85 + 0.15 * ff))),
            );
        }
    }

    fn draw_interior(&self, canvas: &mut dyn Canvas) {
        let Some(cfg) = self.config.interior.as_ref() else {
            return;
        };
        let perspective = Perspective::new(self.config.focal);
        let center = self.viewport.center();
        let view = |p: Vec3| {
            let r = self.rotation * p;
            (r, perspective.project(r, center))
        };
        let views: Vec<(Vec3, Option<Projection>)> =
            self.points.iter().map(|p| view(p.position + p.push)).collect();

        for link in &self.links {
            let ((ra, Some(pa)), (rb, Some(pb))) = (views[link.a], views[link.b]) else {
                continue;
            };
            let Some(df) = self.depth_factor((ra.z + rb.z) / 2.0) else {
                continue;
            };
            let color = self.points[link.a].color.with_alpha(link.opacity * df);
            canvas.stroke_line(pa.screen, pb.screen, cfg.link_width, color);
        }

        let mut order: Vec<usize> = (0..views.len()).filter(|&i| views[i].1.is_some()).collect();
        order.sort_by(|&a, &b| views[b].0.z.total_cmp(&views[a].0.z));
        for i in order {
            let (rotated, Some(projected)) = views[i] else {
                continue;
            };
            let Some(df) = self.depth_factor(rotated.z) else {
                continue;
            };
            let point = &self.points[i];
            let size = point.size * point.pulse;
            if cfg.halo {
                canvas.fill_circle(
                    projected.screen,
                    size * 2.0,
                    Fill::Radial {
                        inner: point.color.with_alpha(0.4 * df),
                        outer: point.color.with_alpha(0.0),
                    },
                );
            }
            canvas.fill_circle(
                projected.screen,
                size,
                Fill::Solid(point.color.with_alpha(df * 0.8)),
            );
        }

        let Some(sc) = cfg.streams.as_ref() else {
            return;
        };
        for stream in &self.streams {
            let (rotated, Some(projected)) = view(stream.position) else {
                continue;
            };
            let Some(df) = self.depth_factor(rotated.z) else {
                continue;
            };
            let fade = stream.life.as_ref().map_or(1.0, Life::remaining);
            let opacity = df * sc.opacity * fade;

            let trail: Vec<Vec2> = stream
                .trail
                .iter()
                .filter_map(|&p| view(p).1.map(|q| q.screen))
                .collect();
            let n = trail.len() as f32;
            for (k, pair) in trail.windows(2).enumerate() {
                // brightest at the head
                let tail = (k + 1) as f32 / n;
                canvas.stroke_line(
                    pair[0],
                    pair[1],
                    stream.size * 0.5 * df,
                    stream.color.with_alpha(opacity * tail),
                );
            }
            canvas.fill_circle(
                projected.screen,
                stream.size * df,
                Fill::Solid(stream.color.with_alpha(opacity)),
            );
        }
    }

    fn draw_ambience(&self, canvas: &mut dyn Canvas) {
        let center = self.viewport.center();
        let t = self.time;
        canvas.fill_circle(
            center,
            self.viewport.width / 2.0,
            Fill::Radial {
                inner: Color::rgba8(150, 200, 255, 0.05),
                outer: Color::rgba8(150, 200, 255, 0.0),
            },
        );
        let base = self.viewport.width.min(self.viewport.height) * 0.4;
        canvas.stroke_circle(
            center,
            base + (t * 0.5).sin() * 30.0,
            2.0,
            Color::rgba8(150, 220, 255, 0.1),
        );
        canvas.stroke_circle(
            center,
            base + (t * 0.5 + PI).sin() * 20.0,
            1.5,
            Color::rgba8(100, 180, 255, 0.08),
        );
    }
}

impl Effect for Lattice {
    fn name(&self) -> &'static str {
        "lattice"
    }

    fn seed(&mut self, viewport: &Viewport, _theme: Theme) {
        self.viewport = *viewport;
        self.vertices.clear();
        self.edges.clear();
        self.epoch = None;
        self.elapsed = 0.0;

        let (outer_size, inner_size) = self.config.vertex_size;
        self.build_cube(self.config.size, self.config.divisions, outer_size, true);
        if self.config.inner_cube {
            self.build_cube(
                self.config.size * self.config.inner_scale,
                self.config.inner_divisions,
                inner_size,
                false,
            );
        }
        self.project_all();
        self.seed_interior();

        log::info!(
            "✓ Lattice seeded: {} vertices, {} edges, {} interior points, {} streams",
            self.vertices.len(),
            self.edges.len(),
            self.points.len(),
            self.streams.len()
        );
    }

    fn update(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer) {
        let now = ctx.now_ms();
        let epoch = *self.epoch.get_or_insert(now);
        self.elapsed = now - epoch;
        self.time = ctx.time;
        self.viewport = ctx.viewport;

        self.update_glows();
        self.update_tilt(pointer);
        self.project_all();
        self.update_interior(ctx, pointer);
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.set_blend(BlendMode::Screen);
        self.draw_edges(canvas);
        self.draw_vertices(canvas);
        self.draw_interior(canvas);
        canvas.set_blend(BlendMode::Additive);
        self.draw_ambience(canvas);
    }

    fn set_theme(&mut self, _theme: Theme) {}

    fn time_step(&self) -> f32 {
        self.config.time_step
    }

    fn record_count(&self) -> usize {
        self.vertices.len() + self.edges.len() + self.points.len() + self.streams.len()
    }
}
