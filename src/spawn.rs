//! Spawn context for particle initialization.
//!
//! Provides helper methods to reduce boilerplate when seeding records. Each
//! effect owns one context for its whole session, so a fixed seed reproduces
//! the same field on every run.

use crate::color::{Color, Palette};
use glam::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{PI, TAU};

/// Seeded RNG with helpers for common spawn patterns.
///
/// ```ignore
/// let mut ctx = SpawnContext::new(42);
/// let particles: Vec<Particle> = (0..count)
///     .map(|_| Particle::at(ctx.random_in_sphere(radius), ctx.pick(&palette)))
///     .collect();
/// ```
#[derive(Debug, Clone)]
pub struct SpawnContext {
    rng: SmallRng,
}

impl SpawnContext {
    /// Reproducible context.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Context seeded from OS entropy, different each program execution.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Seed for a given scene seed, or entropy when absent.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(seed),
            None => Self::from_entropy(),
        }
    }

    /// Direct access for callers that need `rand` APIs.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    // ========== Random primitives ==========

    /// Random f32 between 0.0 and 1.0.
    #[inline]
    pub fn random(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Random f32 in `min..max`. Returns `min` for an empty range.
    #[inline]
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        }
    }

    /// Random f32 in a `(min, max)` pair.
    #[inline]
    pub fn random_in(&mut self, range: (f32, f32)) -> f32 {
        self.random_range(range.0, range.1)
    }

    /// Random u32 in `min..max`. Returns `min` for an empty range.
    #[inline]
    pub fn random_uint(&mut self, min: u32, max: u32) -> u32 {
        if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        }
    }

    /// Random index into a collection of `len` items. `len` must be non-zero.
    #[inline]
    pub fn random_index(&mut self, len: usize) -> usize {
        if len > 1 {
            self.rng.gen_range(0..len)
        } else {
            0
        }
    }

    /// True with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f32) -> bool {
        self.random() < p
    }

    /// Either -1.0 or 1.0.
    #[inline]
    pub fn random_sign(&mut self) -> f32 {
        if self.rng.gen::<bool>() {
            1.0
        } else {
            -1.0
        }
    }

    /// Random angle in radians.
    #[inline]
    pub fn random_angle(&mut self) -> f32 {
        self.rng.gen_range(0.0..TAU)
    }

    // ========== Position helpers ==========

    /// Random point inside a sphere of given radius, centered at origin.
    ///
    /// Distribution is uniform throughout the volume.
    pub fn random_in_sphere(&mut self, radius: f32) -> Vec3 {
        // Cube root for uniform volume distribution
        let r = radius * self.random().cbrt();
        self.random_on_sphere(r)
    }

    /// Random point inside a sphere whose radius is drawn linearly.
    ///
    /// Points bunch up toward the center, which reads as a glowing core when
    /// projected.
    pub fn random_in_sphere_centered(&mut self, radius: f32) -> Vec3 {
        let r = radius * self.random();
        self.random_on_sphere(r)
    }

    /// Random point on the surface of a sphere of given radius.
    pub fn random_on_sphere(&mut self, radius: f32) -> Vec3 {
        let theta = self.rng.gen_range(0.0..TAU);
        let phi = self.rng.gen_range(0.0..PI);

        Vec3::new(
            radius * phi.sin() * theta.cos(),
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
        )
    }

    /// Random point inside an axis-aligned box of given half extents.
    pub fn random_in_box(&mut self, half: Vec3) -> Vec3 {
        Vec3::new(
            self.random_range(-half.x, half.x),
            self.random_range(-half.y, half.y),
            self.random_range(-half.z, half.z),
        )
    }

    /// Random point inside the rectangle `[0, size)`.
    pub fn random_in_rect(&mut self, size: Vec2) -> Vec2 {
        Vec2::new(self.random_range(0.0, size.x), self.random_range(0.0, size.y))
    }

    /// Point `index` of `count` on a Fibonacci sphere.
    ///
    /// Neighbouring indices land on a continuous spiral, which gives an even
    /// spread without clumping at the poles.
    pub fn fibonacci_sphere(&self, index: u32, count: u32, radius: f32) -> Vec3 {
        let n = count.max(1) as f32;
        let phi = (-1.0 + 2.0 * index as f32 / n).clamp(-1.0, 1.0).acos();
        let theta = (n * PI).sqrt() * phi;

        Vec3::new(
            radius * theta.cos() * phi.sin(),
            radius * theta.sin() * phi.sin(),
            radius * phi.cos(),
        )
    }

    // ========== Direction/velocity helpers ==========

    /// Random unit vector in the XY plane.
    pub fn random_direction_2d(&mut self) -> Vec2 {
        Vec2::from_angle(self.random_angle())
    }

    /// Random unit vector (uniformly distributed on unit sphere).
    pub fn random_direction(&mut self) -> Vec3 {
        self.random_on_sphere(1.0).normalize_or_zero()
    }

    /// Random velocity perpendicular to `position` (for orbital motion).
    ///
    /// The orbit axis is jittered around +Y, so a seeded sphere spins mostly
    /// about its vertical axis.
    pub fn tangent_velocity(&mut self, position: Vec3, speed: f32) -> Vec3 {
        let up = Vec3::new(
            self.random() - 0.5,
            1.0 + (self.random() - 0.5) * 0.3,
            self.random() - 0.5,
        );
        let tangent = position.normalize_or_zero().cross(up.normalize_or_zero());
        if tangent.length_squared() > 0.0001 {
            tangent.normalize() * speed
        } else {
            Vec3::new(speed, 0.0, 0.0)
        }
    }

    /// Velocity with each axis uniform in `-max..max`.
    pub fn random_velocity(&mut self, max: f32) -> Vec3 {
        self.random_in_box(Vec3::splat(max))
    }

    // ========== Color helpers ==========

    /// Uniformly random palette color.
    pub fn pick(&mut self, palette: &Palette) -> Color {
        palette.pick(&mut self.rng)
    }
}

impl Default for SpawnContext {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SpawnContext::new(9);
        let mut b = SpawnContext::new(9);
        for _ in 0..10 {
            assert_eq!(a.random(), b.random());
        }
    }

    #[test]
    fn test_random_in_sphere_bounds() {
        let mut ctx = SpawnContext::new(0);
        for _ in 0..100 {
            let pos = ctx.random_in_sphere(0.5);
            assert!(pos.length() <= 0.5 + 0.001);
            let pos = ctx.random_in_sphere_centered(0.5);
            assert!(pos.length() <= 0.5 + 0.001);
        }
    }

    #[test]
    fn test_empty_range_returns_min() {
        let mut ctx = SpawnContext::new(1);
        assert_eq!(ctx.random_range(3.0, 3.0), 3.0);
        assert_eq!(ctx.random_range(5.0, 1.0), 5.0);
        assert_eq!(ctx.random_uint(4, 4), 4);
    }

    #[test]
    fn test_fibonacci_on_surface() {
        let ctx = SpawnContext::new(0);
        for i in 0..50 {
            let p = ctx.fibonacci_sphere(i, 50, 25.0);
            assert!((p.length() - 25.0).abs() < 0.01);
        }
        // First point sits at the -Z pole
        let first = ctx.fibonacci_sphere(0, 50, 1.0);
        assert!((first.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_tangent_is_perpendicular() {
        let mut ctx = SpawnContext::new(3);
        let pos = Vec3::new(10.0, 0.0, 0.0);
        let v = ctx.tangent_velocity(pos, 0.05);
        assert!(v.dot(pos).abs() < 1e-4);
        assert!((v.length() - 0.05).abs() < 1e-5);
    }
}
