//! Dashboard panels floating through depth.
//!
//! Translucent panels drift along Z from `near` toward `far` and respawn at
//! `near` with a fresh X/Y once they pass `far`. The whole scene tilts after
//! the pointer with eased motion, and pointer movement shifts panels with a
//! parallax that is strongest for the panels nearest `near`. Each panel
//! carries a small mock content: an icon, a line chart or a few text bars.

use super::{Effect, FrameContext};
use crate::color::{BlendMode, Color, Palette, Theme};
use crate::error::ConfigError;
use crate::input::Pointer;
use crate::particle::{Perspective, Projection};
use crate::render::Canvas;
use crate::spawn::SpawnContext;
use crate::viewport::Viewport;
use glam::{Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Icon,
    Chart,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub count: u32,
    /// Panel height range; width is up to half again as wide.
    pub size: (f32, f32),
    /// Z where panels enter.
    pub near: f32,
    /// Z where panels leave.
    pub far: f32,
    /// Z units per frame; each panel moves at 0.5 to 1 times this.
    pub speed: f32,
    pub rotation_speed: f32,
    /// Tilt limit in degrees.
    pub max_tilt: f32,
    pub tilt_ease: f32,
    /// Share of a pointer move applied to the nearest panels.
    pub parallax: f32,
    /// Per-frame decay of the pointer move carried into parallax.
    pub parallax_decay: f32,
    pub focal: f32,
    /// Kinds drawn uniformly; repeats weight a kind.
    pub kinds: Vec<PanelKind>,
    pub palette: Palette,
    pub opacity: (f32, f32),
    pub border: Color,
    pub content: Color,
    pub glow: Color,
    pub time_step: f32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            count: 30,
            size: (30.0, 120.0),
            near: -1200.0,
            far: 500.0,
            speed: 0.2,
            rotation_speed: 0.001,
            max_tilt: 10.0,
            tilt_ease: 0.05,
            parallax: 0.02,
            parallax_decay: 0.9,
            focal: 800.0,
            kinds: vec![
                PanelKind::Icon,
                PanelKind::Chart,
                PanelKind::Text,
                PanelKind::Chart,
                PanelKind::Icon,
            ],
            palette: Palette::new(vec![
                Color::rgba8(151, 196, 251, 0.5),
                Color::rgba8(37, 117, 252, 0.5),
                Color::rgba8(93, 157, 245, 0.5),
                Color::rgba8(131, 183, 255, 0.5),
                Color::rgba8(61, 137, 255, 0.5),
                Color::rgba8(180, 220, 255, 0.5),
            ]),
            opacity: (0.7, 1.0),
            border: Color::rgba8(255, 255, 255, 0.8),
            content: Color::rgba8(255, 255, 255, 0.9),
            glow: Color::rgba8(240, 250, 255, 0.3),
            time_step: 0.01,
        }
    }
}

impl PanelConfig {
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.far <= self.near {
            return Err(ConfigError::Invalid(
                "panel far depth must lie beyond near".into(),
            ));
        }
        if self.focal <= 0.0 || self.size.0 <= 0.0 || self.size.1 < self.size.0 {
            return Err(ConfigError::Invalid(
                "panel focal and size must be positive".into(),
            ));
        }
        if self.kinds.is_empty() || self.palette.is_empty() {
            return Err(ConfigError::Invalid(
                "panel kinds and palette must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// 1.0 at `near`, 0.0 at `far`.
    fn nearness(&self, z: f32) -> f32 {
        (1.0 - (z - self.near) / (self.far - self.near)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Offset from the surface centre, Z along the view axis.
    pub position: Vec3,
    pub rotation: Vec3,
    pub size: Vec2,
    pub speed: f32,
    pub kind: PanelKind,
    pub color: Color,
    pub opacity: f32,
    /// Chart points or text bar widths, each 0..1.
    pub values: Vec<f32>,
}

/// Projected panel, ready to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placed {
    index: usize,
    depth: f32,
    projection: Projection,
}

#[derive(Debug, Clone)]
pub struct Panels {
    config: PanelConfig,
    spawn: SpawnContext,
    viewport: Viewport,
    time: f32,
    panels: Vec<Panel>,
    /// Tilt in degrees around X and Y.
    tilt: Vec2,
    /// Pointer movement still feeding parallax.
    drift: Vec2,
    seen_move: Option<Duration>,
    last_pointer: Option<Vec2>,
}

impl Panels {
    pub fn new(config: PanelConfig, seed: Option<u64>) -> Self {
        Self {
            config,
            spawn: SpawnContext::from_seed(seed),
            viewport: Viewport::default(),
            time: 0.0,
            panels: Vec::new(),
            tilt: Vec2::ZERO,
            drift: Vec2::ZERO,
            seen_move: None,
            last_pointer: None,
        }
    }

    #[inline]
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    #[inline]
    pub fn tilt(&self) -> Vec2 {
        self.tilt
    }

    fn random_spot(&mut self) -> Vec2 {
        let size = self.viewport.size();
        self.spawn.random_in_rect(size * 1.5) - size * 0.75
    }

    fn new_panel(&mut self) -> Panel {
        let spot = self.random_spot();
        let cfg = &self.config;
        let height = self.spawn.random_in(cfg.size);
        let kind = cfg.kinds[self.spawn.random_index(cfg.kinds.len())];
        let values = match kind {
            PanelKind::Icon => Vec::new(),
            PanelKind::Chart => {
                let n = self.spawn.random_uint(5, 10);
                (0..n).map(|_| self.spawn.random()).collect()
            }
            PanelKind::Text => {
                let n = self.spawn.random_uint(2, 5);
                (0..n).map(|_| self.spawn.random_range(0.5, 0.9)).collect()
            }
        };
        let z = self.spawn.random_range(cfg.near, cfg.far);
        let rotation = Vec3::new(
            self.spawn.random_angle(),
            self.spawn.random_angle(),
            self.spawn.random_angle(),
        );
        Panel {
            position: spot.extend(z),
            rotation,
            size: Vec2::new(height * self.spawn.random_range(1.0, 1.5), height),
            speed: cfg.speed * self.spawn.random_range(0.5, 1.0),
            kind,
            color: self.spawn.pick(&cfg.palette),
            opacity: self.spawn.random_in(cfg.opacity),
            values,
        }
    }

    fn scene_rotation(&self) -> Mat3 {
        let tilt = Vec2::new(self.tilt.x.to_radians(), self.tilt.y.to_radians());
        // Y first, then X
        Mat3::from_rotation_x(tilt.x) * Mat3::from_rotation_y(tilt.y)
    }

    fn update_pointer(&mut self, pointer: &Pointer) {
        let max = self.config.max_tilt;
        let target = match pointer.active_position() {
            Some(p) => {
                let n = p / self.viewport.size() * 2.0 - Vec2::ONE;
                Vec2::new(-n.y * max, n.x * max)
            }
            None => Vec2::ZERO,
        };
        self.tilt += (target - self.tilt) * self.config.tilt_ease;

        if pointer.last_move() != self.seen_move {
            self.seen_move = pointer.last_move();
            let position = pointer.position();
            if let Some(last) = self.last_pointer {
                self.drift = position - last;
            }
            self.last_pointer = Some(position);
        }
        if !pointer.is_active() {
            self.last_pointer = None;
        }
    }

    /// Panels in draw order, farthest first, with off-screen ones dropped.
    fn placed(&self) -> Vec<Placed> {
        let rotation = self.scene_rotation();
        let perspective = Perspective::new(self.config.focal);
        let center = self.viewport.center();
        let mut placed: Vec<Placed> = self
            .panels
            .iter()
            .enumerate()
            .filter_map(|(index, panel)| {
                let view = rotation * panel.position;
                let projection = perspective.project(view, center)?;
                let half = panel.size * projection.scale / 2.0;
                let reach = half.max_element().max(1.0);
                self.viewport.contains(projection.screen, reach).then_some(Placed {
                    index,
                    depth: view.z,
                    projection,
                })
            })
            .collect();
        placed.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        placed
    }

    fn draw_panel(&self, canvas: &mut dyn Canvas, panel: &Panel, at: &Placed) {
        let cfg = &self.config;
        let alpha = panel.opacity * cfg.nearness(at.depth);
        if alpha <= 0.0 {
            return;
        }
        let center = at.projection.screen;
        let size = panel.size * at.projection.scale;
        let angle = panel.rotation.z;
        let turn = Vec2::from_angle(angle);
        let local = |offset: Vec2| center + turn.rotate(offset * size);

        canvas.fill_rect(center, size * 1.15, angle, cfg.glow.scale_alpha(alpha * 0.5));
        canvas.fill_rect(center, size, angle, panel.color.scale_alpha(alpha));

        let corners = [
            Vec2::new(-0.5, -0.5),
            Vec2::new(0.5, -0.5),
            Vec2::new(0.5, 0.5),
            Vec2::new(-0.5, 0.5),
        ];
        let border = cfg.border.scale_alpha(alpha);
        for (i, &corner) in corners.iter().enumerate() {
            let next = corners[(i + 1) % corners.len()];
            canvas.stroke_line(local(corner), local(next), 1.0, border);
        }

        let ink = cfg.content.scale_alpha(alpha);
        match panel.kind {
            PanelKind::Icon => {
                canvas.fill_rect(center, size * 0.3, angle, ink);
            }
            PanelKind::Chart => {
                let pad = 0.15 * size.min_element() / size;
                let span = Vec2::ONE - pad * 2.0;
                let last = panel.values.len().saturating_sub(1).max(1) as f32;
                let points: Vec<Vec2> = panel
                    .values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| {
                        let x = -0.5 + pad.x + span.x * i as f32 / last;
                        let y = -0.5 + pad.y + span.y * (1.0 - v);
                        local(Vec2::new(x, y))
                    })
                    .collect();
                for pair in points.windows(2) {
                    canvas.stroke_line(pair[0], pair[1], 2.0 * at.projection.scale, ink);
                }
            }
            PanelKind::Text => {
                let rows = panel.values.len() as f32 + 1.0;
                for (i, &width) in panel.values.iter().enumerate() {
                    // bars sit on row lines, a third of a row thick
                    let y = -0.5 + (i as f32 + 1.0) / rows;
                    let bar = Vec2::new(width, 0.3 / rows) * size;
                    canvas.fill_rect(local(Vec2::new(0.0, y)), bar, angle, ink);
                }
            }
        }
    }
}

impl Effect for Panels {
    fn name(&self) -> &'static str {
        "panels"
    }

    fn seed(&mut self, viewport: &Viewport, _theme: Theme) {
        self.viewport = *viewport;
        self.panels.clear();
        for _ in 0..self.config.count {
            let panel = self.new_panel();
            self.panels.push(panel);
        }
        log::info!("✓ Panels seeded: {} panels", self.panels.len());
    }

    fn update(&mut self, ctx: &FrameContext<'_>, pointer: &Pointer) {
        self.time = ctx.time;
        self.viewport = ctx.viewport;
        self.update_pointer(pointer);

        let t = self.time;
        let spin = self.config.rotation_speed
            * Vec3::new((t * 0.3).sin(), (t * 0.2).cos(), (t * 0.4).sin());
        let (near, far) = (self.config.near, self.config.far);
        let moving = pointer.is_active();

        for i in 0..self.panels.len() {
            let panel = &mut self.panels[i];
            panel.position.z += panel.speed;
            panel.rotation += spin;
            if moving {
                let share = self.config.parallax * self.config.nearness(panel.position.z);
                panel.position += (self.drift * share).extend(0.0);
            }
            if panel.position.z > far {
                let spot = self.random_spot();
                self.panels[i].position = spot.extend(near);
            }
        }
        self.drift *= self.config.parallax_decay;
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.set_blend(BlendMode::Alpha);
        for at in self.placed() {
            self.draw_panel(canvas, &self.panels[at.index], &at);
        }
    }

    fn set_theme(&mut self, _theme: Theme) {}

    fn time_step(&self) -> f32 {
        self.config.time_step
    }

    fn record_count(&self) -> usize {
        self.panels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerConfig, PointerEvent};
    use crate::render::DrawList;

    const VIEWPORT: Viewport = Viewport {
        width: 1000.0,
        height: 600.0,
        device_pixel_ratio: 1.0,
    };

    fn seeded(config: PanelConfig) -> Panels {
        let mut panels = Panels::new(config, Some(8));
        panels.seed(&VIEWPORT, Theme::Light);
        panels
    }

    fn step(panels: &mut Panels, frame: u64, pointer: &Pointer) {
        let ctx = FrameContext::at(frame as f32 * 0.01, frame, VIEWPORT);
        panels.update(&ctx, pointer);
    }

    #[test]
    fn test_seed_spreads_panels_in_depth() {
        let panels = seeded(PanelConfig::default());
        assert_eq!(panels.panels().len(), 30);
        for panel in panels.panels() {
            assert!((-1200.0..=500.0).contains(&panel.position.z));
            assert!(panel.position.x.abs() <= 750.0 && panel.position.y.abs() <= 450.0);
            assert!((30.0..=120.0).contains(&panel.size.y));
            assert!(panel.size.x >= panel.size.y && panel.size.x <= panel.size.y * 1.5);
            assert!((0.1..=0.2).contains(&panel.speed));
        }
    }

    #[test]
    fn test_panels_respawn_at_near_depth() {
        let mut panels = seeded(PanelConfig::default());
        panels.panels[0].position.z = 499.95;
        panels.panels[0].speed = 0.2;
        step(&mut panels, 0, &Pointer::default());
        assert_eq!(panels.panels()[0].position.z, -1200.0);

        let before: Vec<f32> = panels.panels().iter().map(|p| p.position.z).collect();
        step(&mut panels, 1, &Pointer::default());
        for (panel, z) in panels.panels().iter().zip(before) {
            assert!((panel.position.z - (z + panel.speed)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_tilt_eases_toward_pointer() {
        let mut panels = seeded(PanelConfig::default());
        let mut pointer = Pointer::new(PointerConfig::default());
        pointer.handle(PointerEvent::Moved(Vec2::new(750.0, 150.0)), Duration::ZERO, &VIEWPORT);

        step(&mut panels, 0, &pointer);
        // 5% of the way to (5, 5)
        assert!((panels.tilt() - Vec2::new(0.25, 0.25)).length() < 1e-4);
        for frame in 1..200 {
            step(&mut panels, frame, &pointer);
        }
        assert!((panels.tilt() - Vec2::new(5.0, 5.0)).length() < 0.01);

        pointer.handle(PointerEvent::Left, Duration::from_millis(5), &VIEWPORT);
        step(&mut panels, 200, &pointer);
        assert!(panels.tilt().x < 5.0 - 0.2);
    }

    #[test]
    fn test_parallax_favours_near_panels() {
        let mut panels = seeded(PanelConfig::default());
        panels.panels[0].position = Vec3::new(0.0, 0.0, -1100.0);
        panels.panels[1].position = Vec3::new(0.0, 0.0, 400.0);
        let mut pointer = Pointer::new(PointerConfig::default());
        pointer.handle(PointerEvent::Moved(Vec2::new(100.0, 100.0)), Duration::ZERO, &VIEWPORT);
        step(&mut panels, 0, &pointer);
        pointer.handle(
            PointerEvent::Moved(Vec2::new(200.0, 100.0)),
            Duration::from_millis(20),
            &VIEWPORT,
        );
        step(&mut panels, 1, &pointer);

        let near = panels.panels()[0].position.x;
        let far = panels.panels()[1].position.x;
        assert!(near > far && far >= 0.0);
        assert!(near > 1.5 && near < 2.0);
    }

    #[test]
    fn test_render_skips_offscreen_panels() {
        let mut panels = seeded(PanelConfig::default().with_count(2));
        panels.panels[0].position = Vec3::new(0.0, 0.0, -400.0);
        panels.panels[0].kind = PanelKind::Icon;
        panels.panels[1].position = Vec3::new(5_000.0, 0.0, 0.0);
        let mut list = DrawList::new();
        panels.render(&mut list);
        let stats = list.stats();
        // glow, body and icon of the visible panel only
        assert_eq!(stats.rects, 3);
        assert_eq!(stats.lines, 4);
    }

    #[test]
    fn test_chart_and_text_content() {
        let mut panels = seeded(PanelConfig::default().with_count(1));
        panels.panels[0].position = Vec3::new(0.0, 0.0, -400.0);
        panels.panels[0].kind = PanelKind::Chart;
        panels.panels[0].values = vec![0.1, 0.9, 0.4, 0.6, 0.2];
        let mut list = DrawList::new();
        panels.render(&mut list);
        assert_eq!(list.stats().lines, 4 + 4);

        panels.panels[0].kind = PanelKind::Text;
        panels.panels[0].values = vec![0.5, 0.7, 0.9];
        let mut list = DrawList::new();
        panels.render(&mut list);
        assert_eq!(list.stats().rects, 2 + 3);
    }

    #[test]
    fn test_validate_rejects_inverted_depth() {
        let config = PanelConfig {
            near: 100.0,
            far: -100.0,
            ..PanelConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PanelConfig::default().validate().is_ok());
    }
}
