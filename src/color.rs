//! Colors, palettes and blending.
//!
//! Every effect draws from a fixed palette chosen once at seed time. Pages
//! can switch between a light and a dark theme, so most effects carry a
//! [`ThemedPalette`] and pick the half that matches the current [`Theme`].
//!
//! # Usage
//!
//! ```ignore
//! let palette = ThemedPalette::warm_sparkle();
//! let color = palette.for_theme(Theme::Dark).pick(&mut rng);
//! canvas.set_blend(BlendMode::Screen);
//! ```
//!
//! Colors serialize as CSS strings so scene files stay readable:
//! `"#97C4FB"` or `"#FFF0B4B3"` with alpha. Colors that fall between 8-bit
//! steps are written as `"color(srgb 0.1 0.2 0.3 / 0.05)"` instead, so a
//! saved scene loads back unchanged.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Linear RGBA color, each channel in 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    /// Color from float channels.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from float channels.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// Opaque color from 8-bit channels.
    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgba8(r, g, b, 1.0)
    }

    /// Color from 8-bit channels with a float alpha, like CSS `rgba()`.
    pub fn rgba8(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a.clamp(0.0, 1.0),
        )
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA` (the `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();

        match digits.len() {
            3 => {
                let mut out = [0u8; 3];
                for (slot, c) in out.iter_mut().zip(digits.chars()) {
                    let v = c.to_digit(16)? as u8;
                    *slot = v * 17;
                }
                Some(Self::rgb8(out[0], out[1], out[2]))
            }
            6 => Some(Self::rgb8(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba8(
                channel(0)?,
                channel(2)?,
                channel(4)?,
                channel(6)? as f32 / 255.0,
            )),
            _ => None,
        }
    }

    /// Format as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (to_u8(self.r), to_u8(self.g), to_u8(self.b), to_u8(self.a));
        if a == 255 {
            format!("#{:02X}{:02X}{:02X}", r, g, b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
        }
    }

    /// Parse a hex color or a CSS `color(srgb r g b [/ a])` function with
    /// float channels.
    pub fn from_css(text: &str) -> Option<Self> {
        let text = text.trim();
        let Some(body) = text
            .strip_prefix("color(")
            .and_then(|rest| rest.strip_suffix(')'))
        else {
            return Self::from_hex(text);
        };

        let body = body.trim().strip_prefix("srgb")?;
        let (channels, alpha) = match body.split_once('/') {
            Some((channels, alpha)) => (channels, Some(alpha.trim().parse::<f32>().ok()?)),
            None => (body, None),
        };
        let mut values = channels.split_whitespace().map(|v| v.parse::<f32>().ok());
        let r = values.next()??;
        let g = values.next()??;
        let b = values.next()??;
        if values.next().is_some() {
            return None;
        }
        Some(Self::rgba(r, g, b, alpha.unwrap_or(1.0)))
    }

    /// Shortest CSS form that parses back to exactly this color.
    pub fn to_css(&self) -> String {
        let hex = self.to_hex();
        if Self::from_hex(&hex) == Some(*self) {
            return hex;
        }
        format!(
            "color(srgb {} {} {} / {})",
            self.r, self.g, self.b, self.a
        )
    }

    /// Same color with alpha replaced.
    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a: a.clamp(0.0, 1.0), ..self }
    }

    /// Same color with alpha multiplied by `factor`.
    #[inline]
    pub fn scale_alpha(self, factor: f32) -> Self {
        self.with_alpha(self.a * factor)
    }

    /// Linear interpolation between two colors, `t` clamped to 0-1.
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Rotate the hue by `degrees` in HSL space, keeping saturation,
    /// lightness and alpha.
    pub fn shift_hue(self, degrees: f32) -> Self {
        let (r, g, b) = (self.r, self.g, self.b);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        if max == min {
            return self;
        }

        let d = max - min;
        let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
        let sector = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        let h = (sector / 6.0 + degrees / 360.0).rem_euclid(1.0);

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let channel = |t: f32| {
            let t = t.rem_euclid(1.0);
            if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            }
        };
        Self::rgba(
            channel(h + 1.0 / 3.0),
            channel(h),
            channel(h - 1.0 / 3.0),
            self.a,
        )
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_css(&value).ok_or_else(|| format!("invalid color '{}'", value))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_css()
    }
}

/// Page color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Blend mode for draw calls.
///
/// Controls how particle colors combine with the background and each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Standard alpha blending (default).
    #[default]
    Alpha,

    /// Additive blending.
    ///
    /// Overlapping particles become brighter. Used by the glowing point-sprite
    /// fields.
    Additive,

    /// Screen blending.
    ///
    /// Lightens like additive but never overshoots white. The cube lattice
    /// draws with it.
    Screen,
}

/// Fixed list of colors an effect picks from uniformly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette(pub Vec<Color>);

impl Palette {
    pub fn new(colors: Vec<Color>) -> Self {
        Self(colors)
    }

    /// Build from hex strings, skipping any that fail to parse.
    pub fn from_hex(colors: &[&str]) -> Self {
        Self(colors.iter().filter_map(|c| Color::from_hex(c)).collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn colors(&self) -> &[Color] {
        &self.0
    }

    /// Color at `index`, wrapping. White for an empty palette.
    pub fn get(&self, index: usize) -> Color {
        if self.0.is_empty() {
            Color::WHITE
        } else {
            self.0[index % self.0.len()]
        }
    }

    /// Uniformly random color. White for an empty palette.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Color {
        if self.0.is_empty() {
            return Color::WHITE;
        }
        self.0[rng.gen_range(0..self.0.len())]
    }

    // ========== Named palettes ==========

    /// Cube lattice vertex colors: base, accent, then three "dream" blues.
    pub fn cyber_blue() -> Self {
        Self::from_hex(&["#97C4FB", "#2575FC", "#5D9DF5", "#83B7FF", "#3D89FF"])
    }

    /// Random edge glow colors of the cube lattice.
    pub fn lattice_glow() -> Self {
        Self(vec![
            Color::rgba8(255, 255, 255, 0.7),
            Color::rgba8(180, 230, 255, 0.6),
            Color::rgba8(120, 210, 255, 0.5),
            Color::rgba8(150, 200, 255, 0.6),
            Color::rgba8(180, 180, 255, 0.5),
        ])
    }

    pub fn quarks() -> Self {
        Self::from_hex(&["#FF5733", "#33A8FF", "#FFBD33", "#33FF57", "#FF33A8", "#A833FF"])
    }

    pub fn leptons() -> Self {
        Self::from_hex(&["#FFFFFF", "#CCCCCC", "#999999", "#DDFFDD", "#DDDDFF", "#FFDDDD"])
    }

    pub fn bosons() -> Self {
        Self::from_hex(&["#FFFF00", "#00FFFF", "#FF00FF", "#FF0000"])
    }
}

/// A light and a dark palette for the same effect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThemedPalette {
    pub light: Palette,
    pub dark: Palette,
}

impl ThemedPalette {
    pub fn new(light: Palette, dark: Palette) -> Self {
        Self { light, dark }
    }

    /// Same palette for both themes.
    pub fn uniform(palette: Palette) -> Self {
        Self {
            light: palette.clone(),
            dark: palette,
        }
    }

    pub fn for_theme(&self, theme: Theme) -> &Palette {
        match theme {
            Theme::Light => &self.light,
            Theme::Dark => &self.dark,
        }
    }

    /// Faintly yellow sparkles of the hero particle sphere.
    pub fn warm_sparkle() -> Self {
        Self {
            light: Palette(vec![
                Color::rgba8(255, 240, 180, 0.7),
                Color::rgba8(255, 245, 200, 0.7),
                Color::rgba8(255, 250, 210, 0.7),
                Color::rgba8(255, 253, 225, 0.7),
            ]),
            dark: Palette(vec![
                Color::rgba8(255, 230, 150, 0.7),
                Color::rgba8(255, 235, 170, 0.7),
                Color::rgba8(255, 240, 190, 0.7),
                Color::rgba8(255, 245, 210, 0.7),
            ]),
        }
    }

    /// White on light pages, mint on dark pages.
    pub fn mint() -> Self {
        Self {
            light: Palette::from_hex(&["#FFFFFF"]),
            dark: Palette::from_hex(&["#4EFF9E"]),
        }
    }

    /// Signal grid colors, by index: particle, grid line, node, tail.
    pub fn signal_grid() -> Self {
        Self {
            light: Palette::from_hex(&["#FFFFFF", "#2ECC71", "#16A085", "#FFFFFF"]),
            dark: Palette::from_hex(&["#2FFF83", "#155D38", "#0D3A2E", "#155D38"]),
        }
    }
}
