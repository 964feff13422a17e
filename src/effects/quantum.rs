//! Standard-model themed particle groups.
//!
//! Three groups (quarks, leptons, bosons) float in a box as wide and tall as
//! the viewport and 400 units deep. Each group spins as a whole, each sprite
//! wobbles around its base position and pulses in size, and short-lived
//! interaction lines flicker between nearby quarks and bosons. A green
//! "Higgs" marker orbits near the center and a slow two-colour gradient with
//! drifting wave blobs sits behind everything.
//!
//! The scene is viewed through a 75° camera 150 units in front of the origin;
//! sprites and lines are projected on the CPU and drawn additively.

use super::{Effect, FrameContext};
use crate::color::{BlendMode, Color, Theme};
use crate::error::ConfigError;
use crate::input::Pointer;
use crate::particle::Perspective;
use crate::render::{Canvas, Fill};
use crate::species::{Species, SpeciesParams};
use crate::spawn::SpawnContext;
use crate::viewport::Viewport;
use glam::{EulerRot, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

// ========== Configuration ==========

/// One group of the field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub species: Species,
    pub count: u32,
}

/// Wrap-around of base positions that leave the inner box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunnel {
    /// Half-extent on x and y as a fraction of the viewport size.
    pub extent: f32,
    /// Half-extent on z, in world units.
    pub depth: f32,
    /// Multiplier applied to a coordinate past its limit.
    pub factor: f32,
}

impl Default for Tunnel {
    fn default() -> Self {
        Self {
            extent: 0.4,
            depth: 350.0,
            factor: -0.98,
        }
    }
}

impl Tunnel {
    /// Flip every coordinate of `pos` that is past its limit.
    pub fn apply(&self, pos: &mut Vec3, viewport: &Viewport) {
        if pos.x.abs() > viewport.width * self.extent {
            pos.x *= self.factor;
        }
        if pos.y.abs() > viewport.height * self.extent {
            pos.y *= self.factor;
        }
        if pos.z.abs() > self.depth {
            pos.z *= self.factor;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiggsConfig {
    /// Sphere radius in world units.
    pub radius: f32,
    pub color: Color,
    /// Orbit half-extents on x and y.
    pub orbit: Vec2,
    /// Orbit angular frequencies on x and y.
    pub frequency: Vec2,
}

impl Default for HiggsConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            color: Color::rgb8(0x00, 0xFF, 0x00),
            orbit: Vec2::new(50.0, 30.0),
            frequency: Vec2::new(0.2, 0.3),
        }
    }
}

impl HiggsConfig {
    /// Marker position at field time `t`.
    pub fn position(&self, t: f32) -> Vec3 {
        Vec3::new(
            (t * self.frequency.x).sin() * self.orbit.x,
            (t * self.frequency.y).cos() * self.orbit.y,
            0.0,
        )
    }
}

/// Random quark-boson lines, redrawn every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Only every `stride`-th quark and boson takes part.
    pub stride: usize,
    pub threshold: f32,
    /// Chance that an in-range pair shows a line this frame.
    pub probability: f32,
    pub max_lines: usize,
    pub color: Color,
    pub width: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            stride: 3,
            threshold: 50.0,
            probability: 0.03,
            max_lines: 49,
            color: Color::WHITE.with_alpha(0.2),
            width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Colour at the bottom edge.
    pub from: Color,
    /// Colour at the top edge.
    pub to: Color,
    pub alpha: f32,
    /// Horizontal bands used to step the gradient.
    pub bands: u32,
    /// Drifting wave blobs.
    pub waves: u32,
    pub wave_color: Color,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            from: Color::rgb8(0x42, 0x85, 0xF4),
            to: Color::rgb8(0x34, 0xA8, 0x53),
            alpha: 0.85,
            bands: 16,
            waves: 4,
            wave_color: Color::rgba(0.1, 0.2, 0.3, 0.05),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantumConfig {
    pub groups: Vec<GroupSpec>,
    /// Depth of the seeding box.
    pub depth: f32,
    pub tunnel: Tunnel,
    /// Camera distance from the origin.
    pub camera_z: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Sprite size attenuation numerator.
    pub point_scale: f32,
    pub higgs: Option<HiggsConfig>,
    pub interactions: Option<InteractionConfig>,
    pub background: Option<BackgroundConfig>,
    pub time_step: f32,
}

impl Default for QuantumConfig {
    fn default() -> Self {
        Self {
            groups: Species::ALL
                .iter()
                .map(|&species| GroupSpec {
                    species,
                    count: species.default_count(),
                })
                .collect(),
            depth: 400.0,
            tunnel: Tunnel::default(),
            camera_z: 150.0,
            fov: 75.0,
            point_scale: 400.0,
            higgs: Some(HiggsConfig::default()),
            interactions: Some(InteractionConfig::default()),
            background: Some(BackgroundConfig::default()),
            time_step: 0.01,
        }
    }
}

impl QuantumConfig {
    pub fn with_group(mut self, species: Species, count: u32) -> Self {
        match self.groups.iter_mut().find(|g| g.species == species) {
            Some(g) => g.count = count,
            None => self.groups.push(GroupSpec { species, count }),
        }
        self
    }

    pub fn with_interactions(mut self, interactions: Option<InteractionConfig>) -> Self {
        self.interactions = interactions;
        self
    }

    pub fn with_background(mut self, background: Option<BackgroundConfig>) -> Self {
        self.background = background;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera_z <= 0.0 {
            return Err(ConfigError::Invalid("quantum camera_z must be positive".into()));
        }
        if !(1.0..179.0).contains(&self.fov) {
            return Err(ConfigError::Invalid(format!(
                "quantum fov {} is outside 1..179 degrees",
                self.fov
            )));
        }
        if self.interactions.is_some_and(|i| i.stride == 0) {
            return Err(ConfigError::Invalid("interaction stride must be at least 1".into()));
        }
        Ok(())
    }
}

// ========== Records ==========

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantum {
    /// Position in group space before wobble.
    pub base: Vec3,
    pub velocity: Vec3,
    pub size: f32,
    pub color: Color,
    pub spin: f32,
    /// World position after wobble and group rotation.
    pub display: Vec3,
    /// Size after the pulse.
    pub display_size: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub params: SpeciesParams,
    /// Accumulated Euler angles.
    pub rotation: Vec3,
    pub members: Vec<Quantum>,
}

impl Group {
    fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }
}

/// A projected sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sprite {
    screen: Vec2,
    radius: f32,
    color: Color,
}

// ========== Effect ==========

#[derive(Debug, Clone)]
pub struct QuantumField {
    config: QuantumConfig,
    spawn: SpawnContext,
    viewport: Viewport,
    groups: Vec<Group>,
    lines: Vec<(Vec3, Vec3)>,
    time: f32,
}

impl QuantumField {
    pub fn new(config: QuantumConfig, seed: Option<u64>) -> Self {
        Self {
            config,
            spawn: SpawnContext::from_seed(seed),
            viewport: Viewport::default(),
            groups: Vec::new(),
            lines: Vec::new(),
            time: 0.0,
        }
    }

    pub fn config(&self) -> &QuantumConfig {
        &self.config
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [Group] {
        &mut self.groups
    }

    pub fn group(&self, species: Species) -> Option<&Group> {
        self.groups.iter().find(|g| g.params.species == species)
    }

    /// Interaction lines chosen by the last update, in world space.
    pub fn interaction_lines(&self) -> &[(Vec3, Vec3)] {
        &self.lines
    }

    pub fn higgs_position(&self) -> Option<Vec3> {
        self.config.higgs.map(|h| h.position(self.time))
    }

    /// Screen pixels per world unit at depth zero.
    fn pixels_per_unit(&self) -> f32 {
        let half_fov = (self.config.fov * 0.5).to_radians();
        self.viewport.height * 0.5 / half_fov.tan() / self.config.camera_z
    }

    /// Screen position and depth scale of a world point.
    fn project(&self, point: Vec3) -> Option<(Vec2, f32)> {
        let camera = Perspective::new(self.config.camera_z);
        let p = camera.project(Vec3::new(point.x, -point.y, -point.z), Vec2::ZERO)?;
        Some((
            self.viewport.center() + p.screen * self.pixels_per_unit(),
            p.scale,
        ))
    }

    fn seed_group(&mut self, spec: GroupSpec) -> Group {
        let params = spec.species.params();
        let box_size = Vec3::new(self.viewport.width, self.viewport.height, self.config.depth);
        let members = (0..spec.count)
            .map(|_| {
                let base = (Vec3::new(
                    self.spawn.random(),
                    self.spawn.random(),
                    self.spawn.random(),
                ) - 0.5)
                    * box_size;
                let m = params.max_speed;
                let velocity = Vec3::new(
                    self.spawn.random_range(-m, m),
                    self.spawn.random_range(-m, m),
                    self.spawn.random_range(-m, m),
                );
                let size = self.spawn.random_in(params.size);
                let color = self.spawn.pick(&params.palette);
                let spin = params.spins[self.spawn.random_index(params.spins.len())];
                Quantum {
                    base,
                    velocity,
                    size,
                    color,
                    spin,
                    display: base,
                    display_size: size,
                }
            })
            .collect();
        Group {
            params,
            rotation: Vec3::ZERO,
            members,
        }
    }

    fn advance_groups(&mut self) {
        let t = self.time;
        let viewport = self.viewport;
        let tunnel = self.config.tunnel;

        for group in &mut self.groups {
            group.rotation += group.params.rotation_rate;
            let orientation = group.orientation();
            let wobble = group.params.wobble;
            let (amplitude, frequency) =
                (group.params.pulse_amplitude, group.params.pulse_frequency);

            for (i, q) in group.members.iter_mut().enumerate() {
                q.base += q.velocity;
                tunnel.apply(&mut q.base, &viewport);
                let local = q.base + wobble.offset(q.base, i, t);
                q.display = orientation * local;
                q.display_size =
                    q.size * (1.0 + amplitude * (t * frequency + i as f32 * 0.05).sin());
            }
        }
    }

    fn pick_interactions(&mut self) {
        self.lines.clear();
        let Some(cfg) = self.config.interactions else {
            return;
        };
        let (Some(quarks), Some(bosons)) = (
            self.groups.iter().position(|g| g.params.species == Species::Quark),
            self.groups.iter().position(|g| g.params.species == Species::Boson),
        ) else {
            return;
        };

        'outer: for q in self.groups[quarks].members.iter().step_by(cfg.stride) {
            for b in self.groups[bosons].members.iter().step_by(cfg.stride) {
                if self.lines.len() >= cfg.max_lines {
                    break 'outer;
                }
                if q.display.distance(b.display) < cfg.threshold
                    && self.spawn.chance(cfg.probability)
                {
                    self.lines.push((q.display, b.display));
                }
            }
        }
    }

    fn sprites(&self) -> Vec<Sprite> {
        let dpr = self.viewport.device_pixel_ratio;
        let attenuation = self.config.point_scale / self.config.camera_z;
        let margin = 50.0;

        self.groups
            .iter()
            .flat_map(|g| g.members.iter())
            .filter_map(|q| {
                let (screen, scale) = self.project(q.display)?;
                let radius = q.display_size * dpr * attenuation * scale * 0.5;
                (radius > 0.0 && self.viewport.contains(screen, margin + radius)).then_some(
                    Sprite {
                        screen,
                        radius,
                        color: q.color,
                    },
                )
            })
            .collect()
    }

    fn draw_background(&self, canvas: &mut dyn Canvas, bg: &BackgroundConfig) {
        let (w, h) = (self.viewport.width, self.viewport.height);
        let drift = (self.time * 0.2).sin() * 0.5 + 0.5;
        let bands = bg.bands.max(1);
        let band_height = h / bands as f32;

        for k in 0..bands {
            // 0 at the bottom edge
            let v = 1.0 - (k as f32 + 0.5) / bands as f32;
            let color = bg.from.lerp(bg.to, v + drift * 0.2).with_alpha(bg.alpha);
            canvas.fill_rect(
                Vec2::new(w * 0.5, (k as f32 + 0.5) * band_height),
                Vec2::new(w, band_height),
                0.0,
                color,
            );
        }

        for i in 1..=bg.waves {
            let fi = i as f32;
            let t = self.time * (0.1 + 0.05 * fi);
            let uv = Vec2::new(
                0.5 + 0.3 * (t * 0.8 + fi * 1.2).sin(),
                0.5 + 0.3 * (t * 1.2 + fi * 0.8).cos(),
            );
            canvas.fill_circle(
                Vec2::new(uv.x * w, (1.0 - uv.y) * h),
                0.3 * w.min(h),
                Fill::Radial {
                    inner: bg.wave_color,
                    outer: bg.wave_color.with_alpha(0.0),
                },
            );
        }
    }
}

impl Effect for QuantumField {
    fn name(&self) -> &'static str {
        "quantum"
    }

    fn seed(&mut self, viewport: &Viewport, _theme: Theme) {
        self.viewport = *viewport;
        self.time = 0.0;
        self.lines.clear();
        let specs = self.config.groups.clone();
        self.groups = specs.into_iter().map(|spec| self.seed_group(spec)).collect();
        log::info!(
            "✓ Quantum field seeded: {} groups, {} particles",
            self.groups.len(),
            self.record_count()
        );
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _pointer: &Pointer) {
        self.viewport = ctx.viewport;
        self.time = ctx.time;
        self.advance_groups();
        self.pick_interactions();
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.set_blend(BlendMode::Additive);
        if let Some(bg) = &self.config.background {
            self.draw_background(canvas, bg);
        }

        if let Some(cfg) = &self.config.interactions {
            for (a, b) in &self.lines {
                if let (Some((sa, _)), Some((sb, _))) = (self.project(*a), self.project(*b)) {
                    canvas.stroke_line(sa, sb, cfg.width, cfg.color);
                }
            }
        }

        for sprite in self.sprites() {
            canvas.fill_circle(
                sprite.screen,
                sprite.radius,
                Fill::Radial {
                    inner: sprite.color.with_alpha(0.9),
                    outer: sprite.color.with_alpha(0.0),
                },
            );
        }

        if let (Some(higgs), Some(pos)) = (&self.config.higgs, self.higgs_position()) {
            if let Some((screen, scale)) = self.project(pos) {
                canvas.fill_circle(
                    screen,
                    higgs.radius * scale * self.pixels_per_unit(),
                    Fill::Radial {
                        inner: higgs.color,
                        outer: higgs.color.with_alpha(0.0),
                    },
                );
            }
        }
    }

    fn set_theme(&mut self, _theme: Theme) {}

    fn time_step(&self) -> f32 {
        self.config.time_step
    }

    fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, DrawList};

    fn seeded(config: QuantumConfig) -> QuantumField {
        let mut field = QuantumField::new(config, Some(11));
        field.seed(&Viewport::new(800.0, 600.0), Theme::Dark);
        field
    }

    #[test]
    fn test_seed_groups() {
        let field = seeded(QuantumConfig::default());
        assert_eq!(field.record_count(), 130);
        assert_eq!(field.group(Species::Quark).map(|g| g.members.len()), Some(60));
        assert_eq!(field.group(Species::Lepton).map(|g| g.members.len()), Some(40));

        let bosons = field.group(Species::Boson).unwrap();
        assert_eq!(bosons.members.len(), 30);
        for q in &bosons.members {
            assert!(q.base.x.abs() <= 400.0 && q.base.y.abs() <= 300.0 && q.base.z.abs() <= 200.0);
            assert!(q.velocity.abs().max_element() <= 0.3);
            assert!((3.0..8.0).contains(&q.size));
            assert!(bosons.params.spins.contains(&q.spin));
        }
    }

    #[test]
    fn test_tunnel_flips_past_limit() {
        let viewport = Viewport::new(800.0, 600.0);
        let mut p = Vec3::new(330.0, -10.0, 360.0);
        Tunnel::default().apply(&mut p, &viewport);
        assert!((p.x + 323.4).abs() < 1e-3);
        assert_eq!(p.y, -10.0);
        assert!((p.z + 352.8).abs() < 1e-3);
    }

    #[test]
    fn test_groups_rotate_each_frame() {
        let mut field = seeded(QuantumConfig::default());
        let viewport = Viewport::new(800.0, 600.0);
        for frame in 0..10 {
            let ctx = FrameContext::at(frame as f32 * 0.01, frame, viewport);
            field.update(&ctx, &Pointer::default());
        }
        let quarks = field.group(Species::Quark).unwrap();
        assert!((quarks.rotation.y - 0.02).abs() < 1e-5);
        let bosons = field.group(Species::Boson).unwrap();
        assert!((bosons.rotation.x - 0.03).abs() < 1e-5);
    }

    #[test]
    fn test_size_pulse_bounded() {
        let mut field = seeded(QuantumConfig::default());
        let viewport = Viewport::new(800.0, 600.0);
        for frame in 0..50 {
            let ctx = FrameContext::at(frame as f32 * 0.37, frame, viewport);
            field.update(&ctx, &Pointer::default());
            for g in field.groups() {
                let a = g.params.pulse_amplitude;
                for q in &g.members {
                    assert!(q.display_size >= q.size * (1.0 - a) - 1e-4);
                    assert!(q.display_size <= q.size * (1.0 + a) + 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_interactions_capped_and_strided() {
        let mut config = QuantumConfig::default();
        config.interactions = Some(InteractionConfig {
            probability: 1.0,
            ..InteractionConfig::default()
        });
        let mut field = seeded(config);
        for g in field.groups_mut() {
            for (i, q) in g.members.iter_mut().enumerate() {
                q.display = Vec3::new(i as f32 * 0.1, 0.0, 0.0);
            }
        }
        field.pick_interactions();
        assert_eq!(field.interaction_lines().len(), 49);

        let quarks = field.group(Species::Quark).unwrap();
        for (a, _) in field.interaction_lines() {
            let index = quarks.members.iter().position(|q| q.display == *a).unwrap();
            assert_eq!(index % 3, 0);
        }
    }

    #[test]
    fn test_no_interactions_out_of_range() {
        let mut config = QuantumConfig::default();
        config.interactions = Some(InteractionConfig {
            probability: 1.0,
            ..InteractionConfig::default()
        });
        let mut field = seeded(config);
        for g in field.groups_mut() {
            let offset = if g.params.species == Species::Quark { 0.0 } else { 500.0 };
            for q in &mut g.members {
                q.display = Vec3::new(offset, 0.0, 0.0);
            }
        }
        field.pick_interactions();
        assert!(field.interaction_lines().is_empty());
    }

    #[test]
    fn test_higgs_orbit() {
        let higgs = HiggsConfig::default();
        assert_eq!(higgs.position(0.0), Vec3::new(0.0, 30.0, 0.0));
        let p = higgs.position(10.0);
        assert!((p.x - 2f32.sin() * 50.0).abs() < 1e-4);
        assert!((p.y - 3f32.cos() * 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_origin_projects_to_center() {
        let field = seeded(QuantumConfig::default());
        let (screen, scale) = field.project(Vec3::ZERO).unwrap();
        assert_eq!(screen, Vec2::new(400.0, 300.0));
        assert_eq!(scale, 1.0);
        // nearer points spread further from the center
        let (near, _) = field.project(Vec3::new(10.0, 10.0, 50.0)).unwrap();
        let (far, _) = field.project(Vec3::new(10.0, 10.0, -50.0)).unwrap();
        assert!(near.x > far.x && near.y < far.y);
        assert!(field.project(Vec3::new(0.0, 0.0, 200.0)).is_none());
    }

    #[test]
    fn test_render_layers() {
        let mut field = seeded(QuantumConfig::default());
        let ctx = FrameContext::at(0.5, 1, Viewport::new(800.0, 600.0));
        field.update(&ctx, &Pointer::default());

        let mut list = DrawList::new();
        field.render(&mut list);
        let commands = list.commands();
        assert_eq!(commands[0], DrawCommand::Blend(BlendMode::Additive));
        assert!(matches!(commands[1], DrawCommand::Rect { .. }));
        assert_eq!(list.stats().rects, 16);
        // the Higgs marker is drawn last
        match commands.last() {
            Some(DrawCommand::Circle { fill: Fill::Radial { inner, .. }, .. }) => {
                assert_eq!(*inner, Color::rgb8(0x00, 0xFF, 0x00));
            }
            other => panic!("unexpected last command {other:?}"),
        }
    }
}
