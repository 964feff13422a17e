//! Drawing surface size and particle counts.
//!
//! Particle count is fixed per session. It is derived once per seed from the
//! viewport area and a coarse device-performance heuristic, so phones get a
//! lighter field than desktops.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Size of the surface an effect draws into, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    /// Physical pixels per CSS pixel.
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f32,
}

fn default_dpr() -> f32 {
    1.0
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_device_pixel_ratio(mut self, dpr: f32) -> Self {
        self.device_pixel_ratio = dpr.max(0.1);
        self
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.size() * 0.5
    }

    /// Area in CSS pixels.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Area of the backing store in physical pixels.
    #[inline]
    pub fn physical_area(&self) -> f32 {
        self.area() * self.device_pixel_ratio * self.device_pixel_ratio
    }

    /// Half of the shorter side.
    #[inline]
    pub fn half_min(&self) -> f32 {
        self.width.min(self.height) * 0.5
    }

    /// True for a zero-sized or degenerate surface.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Whether `point` lies inside the surface grown by `margin` on every side.
    pub fn contains(&self, point: Vec2, margin: f32) -> bool {
        point.x >= -margin
            && point.x <= self.width + margin
            && point.y >= -margin
            && point.y <= self.height + margin
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Coarse device class used to scale particle counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

const MOBILE_AGENTS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Surfaces narrower than this are treated as mobile.
pub const MOBILE_BREAKPOINT: f32 = 768.0;

impl DeviceClass {
    /// Classify from a user agent string and the window width.
    pub fn detect(user_agent: &str, window_width: f32) -> Self {
        let agent = user_agent.to_ascii_lowercase();
        let mobile_agent = MOBILE_AGENTS.iter().any(|m| agent.contains(m));
        if mobile_agent || window_width < MOBILE_BREAKPOINT {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    /// Multiplier applied to particle counts.
    pub fn performance_ratio(&self) -> f32 {
        match self {
            DeviceClass::Desktop => 1.0,
            DeviceClass::Mobile => 0.5,
        }
    }
}

/// How many particles an effect seeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPolicy {
    /// Always exactly this many.
    Fixed(u32),
    /// One particle per `area_per_particle` physical pixels, capped at `max`,
    /// then scaled by the device ratio.
    Density { area_per_particle: f32, max: u32 },
}

impl CountPolicy {
    /// Resolve to a concrete count.
    ///
    /// For `Density` the ratio is applied twice, once to the area divisor
    /// and once to the capped result, so low-end devices lose particles on
    /// both ends of the range.
    pub fn resolve(&self, viewport: &Viewport, ratio: f32) -> u32 {
        match *self {
            CountPolicy::Fixed(n) => n,
            CountPolicy::Density {
                area_per_particle,
                max,
            } => {
                if viewport.is_empty() || area_per_particle <= 0.0 || ratio <= 0.0 {
                    return 0;
                }
                let divisor = area_per_particle / ratio;
                let base = ((viewport.physical_area() / divisor).floor() as u32).min(max);
                (base as f32 * ratio).floor() as u32
            }
        }
    }
}

impl Default for CountPolicy {
    fn default() -> Self {
        CountPolicy::Density {
            area_per_particle: 18_000.0,
            max: 80,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_empty() {
        let vp = Viewport::new(500.0, 300.0);
        assert_eq!(vp.center(), Vec2::new(250.0, 150.0));
        assert!(!vp.is_empty());
        assert!(Viewport::new(0.0, 300.0).is_empty());
        assert!(Viewport::new(f32::NAN, 300.0).is_empty());
    }

    #[test]
    fn test_device_detect() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        assert_eq!(DeviceClass::detect(iphone, 1200.0), DeviceClass::Mobile);
        assert_eq!(DeviceClass::detect("Mozilla/5.0 (X11; Linux)", 500.0), DeviceClass::Mobile);
        assert_eq!(DeviceClass::detect("Mozilla/5.0 (X11; Linux)", 1920.0), DeviceClass::Desktop);
    }

    #[test]
    fn test_density_count() {
        let policy = CountPolicy::default();
        // 1920x1080 / 18000 = 115, capped at 80
        assert_eq!(policy.resolve(&Viewport::new(1920.0, 1080.0), 1.0), 80);
        // 600x600 at half ratio: 360000 / 36000 = 10, then * 0.5 = 5
        assert_eq!(policy.resolve(&Viewport::new(600.0, 600.0), 0.5), 5);
        assert_eq!(policy.resolve(&Viewport::new(0.0, 0.0), 1.0), 0);
    }

    #[test]
    fn test_density_uses_physical_pixels() {
        let policy = CountPolicy::Density {
            area_per_particle: 10_000.0,
            max: 1000,
        };
        let vp = Viewport::new(100.0, 100.0).with_device_pixel_ratio(2.0);
        assert_eq!(policy.resolve(&vp, 1.0), 4);
    }

    #[test]
    fn test_contains_margin() {
        let vp = Viewport::new(100.0, 100.0);
        assert!(vp.contains(Vec2::new(-40.0, 50.0), 50.0));
        assert!(!vp.contains(Vec2::new(-60.0, 50.0), 50.0));
    }
}
