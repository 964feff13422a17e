//! Falling glyph columns in the style of digital rain.
//!
//! Each column is a stack of glyphs, newest at the bottom. A column falls at
//! its own speed and refreshes its stack every few frames: a fresh glyph is
//! pushed at the head, the tail is trimmed to the column length and the rest
//! fade a little. Occasionally one glyph "glitches" into another.
//!
//! ```ignore
//! let mut rain = MatrixRain::new(RainConfig::default().with_density(0.3), Some(7));
//! rain.seed(&Viewport::new(800.0, 600.0), Theme::Dark);
//! ```

use super::{Effect, FrameContext};
use crate::color::{BlendMode, Color, Theme};
use crate::error::ConfigError;
use crate::input::Pointer;
use crate::render::{Canvas, Shadow};
use crate::spawn::SpawnContext;
use crate::viewport::Viewport;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const KATAKANA_ALPHANUMERIC: &str = "01アイウエオカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワヲンABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainConfig {
    pub font_size: f32,
    /// Column pitch as a multiple of the font size.
    pub column_spacing: f32,
    /// Probability that a column is active.
    pub density: f32,
    pub speed: f32,
    pub speed_variation: (f32, f32),
    /// Glyphs per column, max exclusive.
    pub length: (u32, u32),
    /// Frames between stack refreshes, max exclusive.
    pub refresh_interval: (u32, u32),
    pub bright_head_chance: f32,
    /// Alpha multiplier applied to every glyph but the head on refresh.
    pub fade: f32,
    pub glitch_rate: f32,
    pub head_color: Color,
    pub head_alpha: f32,
    pub head_glow: Color,
    pub head_blur: f32,
    pub body_color: Color,
    pub body_alpha: f32,
    /// Tint drawn over the whole surface before the glyphs.
    pub background: Color,
    pub charset: String,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            font_size: 20.0,
            column_spacing: 0.7,
            density: 0.5,
            speed: 1.5,
            speed_variation: (0.7, 1.3),
            length: (5, 35),
            refresh_interval: (2, 5),
            bright_head_chance: 0.35,
            fade: 0.95,
            glitch_rate: 0.02,
            head_color: Color::rgb8(230, 255, 230),
            head_alpha: 0.95,
            head_glow: Color::rgb8(0x00, 0xFF, 0x33),
            head_blur: 8.0,
            body_color: Color::rgb8(0, 255, 60),
            body_alpha: 0.9,
            background: Color::rgba(0.0, 0.0, 0.0, 0.03),
            charset: KATAKANA_ALPHANUMERIC.to_string(),
        }
    }
}

impl RainConfig {
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.font_size <= 0.0 || self.column_spacing <= 0.0 {
            return Err(ConfigError::Invalid(
                "rain font_size and column_spacing must be positive".into(),
            ));
        }
        if self.charset.is_empty() {
            return Err(ConfigError::Invalid("rain charset is empty".into()));
        }
        if self.length.0 == 0 || self.refresh_interval.0 == 0 {
            return Err(ConfigError::Invalid(
                "rain length and refresh_interval must start at 1 or more".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainGlyph {
    pub glyph: char,
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub x: f32,
    /// Screen y of the head glyph.
    pub y: f32,
    pub speed: f32,
    pub length: usize,
    /// Opacity from the column's depth, 0.4 to 1.
    pub alpha: f32,
    pub refresh_interval: u32,
    pub bright_head: bool,
    pub active: bool,
    /// Head first.
    pub glyphs: VecDeque<RainGlyph>,
}

/// Digital rain effect.
#[derive(Debug, Clone)]
pub struct MatrixRain {
    config: RainConfig,
    charset: Vec<char>,
    spawn: SpawnContext,
    viewport: Viewport,
    columns: Vec<Column>,
    frame: u64,
}

impl MatrixRain {
    pub fn new(config: RainConfig, seed: Option<u64>) -> Self {
        let charset = config.charset.chars().collect();
        Self {
            config,
            charset,
            spawn: SpawnContext::from_seed(seed),
            viewport: Viewport::default(),
            columns: Vec::new(),
            frame: 0,
        }
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn active_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter().filter(|c| c.active)
    }

    fn random_glyph(&mut self) -> char {
        let i = self.spawn.random_index(self.charset.len());
        self.charset.get(i).copied().unwrap_or(' ')
    }

    fn random_length(&mut self) -> usize {
        self.spawn
            .random_uint(self.config.length.0, self.config.length.1) as usize
    }

    fn random_speed(&mut self) -> f32 {
        self.config.speed * self.spawn.random_in(self.config.speed_variation)
    }

    fn make_column(&mut self, x: f32) -> Column {
        let h = self.viewport.height;
        let y = self.spawn.random() * h * 2.0 - h;
        let speed = self.random_speed();
        let active = self.spawn.chance(self.config.density);
        let length = self.random_length();
        let depth = self.spawn.random();
        let refresh_interval = self
            .spawn
            .random_uint(self.config.refresh_interval.0, self.config.refresh_interval.1);
        let bright_head = self.spawn.chance(self.config.bright_head_chance);

        let glyphs = if active {
            (0..length)
                .map(|i| RainGlyph {
                    glyph: self.random_glyph(),
                    alpha: if i == 0 {
                        1.0
                    } else {
                        (1.0 - i as f32 / length as f32 * 1.2).max(0.1)
                    },
                })
                .collect()
        } else {
            VecDeque::new()
        };

        Column {
            x,
            y,
            speed,
            length,
            alpha: 0.4 + depth * 0.6,
            refresh_interval,
            bright_head,
            active,
            glyphs,
        }
    }

    fn refresh(&mut self, index: usize) {
        let glitch = self.spawn.chance(self.config.glitch_rate);
        let len = self.columns[index].glyphs.len();
        if glitch && len > 0 {
            let at = self.spawn.random_index(len);
            let glyph = self.random_glyph();
            if let Some(g) = self.columns[index].glyphs.get_mut(at) {
                g.glyph = glyph;
            }
        }

        let head = self.random_glyph();
        let fade = self.config.fade;
        let column = &mut self.columns[index];
        column.glyphs.push_front(RainGlyph {
            glyph: head,
            alpha: 1.0,
        });
        if column.glyphs.len() > column.length {
            column.glyphs.pop_back();
        }
        for g in column.glyphs.iter_mut().skip(1) {
            g.alpha *= fade;
        }
    }
}

impl Effect for MatrixRain {
    fn name(&self) -> &'static str {
        "matrix_rain"
    }

    fn seed(&mut self, viewport: &Viewport, _theme: Theme) {
        self.viewport = *viewport;
        self.frame = 0;
        let pitch = self.config.font_size * self.config.column_spacing;
        let count = (viewport.width / pitch).floor().max(0.0) as usize;

        self.columns.clear();
        for i in 0..count {
            let column = self.make_column(i as f32 * pitch);
            self.columns.push(column);
        }
        log::info!(
            "✓ Matrix rain seeded: {} columns ({} active)",
            self.columns.len(),
            self.active_columns().count()
        );
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _pointer: &Pointer) {
        self.viewport = ctx.viewport;
        self.frame += 1;
        let height = self.viewport.height;
        let font_size = self.config.font_size;

        for i in 0..self.columns.len() {
            if !self.columns[i].active {
                continue;
            }
            self.columns[i].y += self.columns[i].speed;

            if self.columns[i].y > height {
                let speed = self.random_speed();
                let length = self.random_length();
                let bright_head = self.spawn.chance(self.config.bright_head_chance);
                let column = &mut self.columns[i];
                column.y = -(column.length as f32) * font_size;
                column.speed = speed;
                column.length = length;
                column.bright_head = bright_head;
            }

            let interval = u64::from(self.columns[i].refresh_interval.max(1));
            if self.frame % interval == 0 {
                self.refresh(i);
            }
        }
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        let cfg = &self.config;
        let fs = cfg.font_size;
        let height = self.viewport.height;

        canvas.set_blend(BlendMode::Alpha);
        canvas.fill_rect(self.viewport.center(), self.viewport.size(), 0.0, cfg.background);

        for column in self.active_columns() {
            for (j, g) in column.glyphs.iter().enumerate() {
                let y = column.y - j as f32 * fs;
                if y <= -fs || y >= height + fs {
                    continue;
                }
                let position = Vec2::new(column.x, y);
                if j == 0 && column.bright_head {
                    canvas.fill_glyph(
                        g.glyph,
                        position,
                        fs,
                        cfg.head_color.with_alpha(cfg.head_alpha * column.alpha),
                        Some(Shadow {
                            color: cfg.head_glow,
                            blur: cfg.head_blur,
                        }),
                    );
                } else {
                    canvas.fill_glyph(
                        g.glyph,
                        position,
                        fs,
                        cfg.body_color.with_alpha(g.alpha * column.alpha * cfg.body_alpha),
                        None,
                    );
                }
            }
        }
    }

    fn set_theme(&mut self, _theme: Theme) {}

    fn record_count(&self) -> usize {
        self.active_columns().map(|c| c.glyphs.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, DrawList};

    fn seeded(config: RainConfig) -> MatrixRain {
        let mut rain = MatrixRain::new(config, Some(5));
        rain.seed(&Viewport::new(700.0, 400.0), Theme::Dark);
        rain
    }

    #[test]
    fn test_column_layout() {
        let rain = seeded(RainConfig::default());
        // 700 / (20 * 0.7)
        assert_eq!(rain.columns().len(), 50);
        assert_eq!(rain.columns()[3].x, 42.0);
        for c in rain.columns() {
            assert!((0.4..=1.0).contains(&c.alpha));
            assert!((5..35).contains(&c.length));
            assert!((2..5).contains(&c.refresh_interval));
            assert!((-400.0..400.0).contains(&c.y));
            if c.active {
                assert_eq!(c.glyphs.len(), c.length);
                assert_eq!(c.glyphs[0].alpha, 1.0);
                assert!(c.glyphs.iter().all(|g| g.alpha >= 0.1));
            } else {
                assert!(c.glyphs.is_empty());
            }
        }
    }

    #[test]
    fn test_density_bounds() {
        let none = seeded(RainConfig::default().with_density(0.0));
        assert_eq!(none.active_columns().count(), 0);
        let all = seeded(RainConfig::default().with_density(1.0));
        assert_eq!(all.active_columns().count(), 50);
    }

    #[test]
    fn test_refresh_pushes_head_and_trims() {
        let mut rain = seeded(RainConfig::default().with_density(1.0));
        rain.config.glitch_rate = 0.0;
        let before = rain.columns()[0].clone();
        rain.refresh(0);
        let after = &rain.columns()[0];

        assert_eq!(after.glyphs.len(), before.length);
        assert_eq!(after.glyphs[0].alpha, 1.0);
        assert_eq!(after.glyphs[1].glyph, before.glyphs[0].glyph);
        assert!((after.glyphs[1].alpha - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_column_wraps_to_top() {
        let mut rain = seeded(RainConfig::default().with_density(1.0));
        rain.columns_mut()[0].y = 399.9;
        let ctx = FrameContext::at(0.0, 0, Viewport::new(700.0, 400.0));
        rain.update(&ctx, &Pointer::default());

        let c = &rain.columns()[0];
        assert!(c.y < 0.0);
        assert!((1.05..1.95).contains(&c.speed));
    }

    #[test]
    fn test_offscreen_glyphs_not_drawn() {
        let mut rain = seeded(RainConfig::default().with_density(1.0));
        for c in rain.columns_mut() {
            c.y = -1000.0;
        }
        let mut list = DrawList::new();
        rain.render(&mut list);
        assert_eq!(list.stats().glyphs, 0);
        assert!(matches!(list.commands()[0], DrawCommand::Rect { .. }));
    }

    #[test]
    fn test_bright_head_has_glow() {
        let mut rain = seeded(RainConfig::default().with_density(1.0));
        for c in rain.columns_mut() {
            c.y = 200.0;
            c.bright_head = true;
        }
        let mut list = DrawList::new();
        rain.render(&mut list);
        let glowing = list
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Glyph { shadow: Some(_), .. }))
            .count();
        assert_eq!(glowing, 50);
    }
}
