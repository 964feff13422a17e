//! Particle records and perspective projection.

use crate::color::Color;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Drawn shape of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    Circle,
    /// 1.2 × 0.8 rectangle, rotated with the particle.
    Rect,
}

/// Screen-space result of projecting a 3D point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Projection {
    pub screen: Vec2,
    /// `focal / (focal + z)`; 1.0 for flat fields.
    pub scale: f32,
}

/// Pinhole projection with the camera `focal` units in front of the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub focal: f32,
}

impl Perspective {
    pub fn new(focal: f32) -> Self {
        Self { focal }
    }

    /// `scale = focal / (focal + z)`, `screen = center + xy * scale`.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project(&self, point: Vec3, center: Vec2) -> Option<Projection> {
        let denom = self.focal + point.z;
        if denom <= 1e-3 {
            return None;
        }
        let scale = self.focal / denom;
        Some(Projection {
            screen: center + point.truncate() * scale,
            scale,
        })
    }
}

impl Default for Perspective {
    fn default() -> Self {
        Self { focal: 500.0 }
    }
}

/// Bounded history of recent screen positions, newest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trail {
    points: VecDeque<TrailPoint>,
    capacity: usize,
}

/// One remembered position on a trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub position: Vec2,
    pub size: f32,
    pub alpha: f32,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record the newest point, dropping the oldest beyond capacity.
    pub fn push(&mut self, point: TrailPoint) {
        if self.capacity == 0 {
            return;
        }
        self.points.push_front(point);
        while self.points.len() > self.capacity {
            self.points.pop_back();
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points from newest to oldest.
    pub fn points(&self) -> impl Iterator<Item = &TrailPoint> + '_ {
        self.points.iter()
    }
}

/// Age tracking for short-lived burst particles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Life {
    pub age: u32,
    pub lifespan: u32,
}

impl Life {
    pub fn new(lifespan: u32) -> Self {
        Self { age: 0, lifespan }
    }

    /// Age by one frame.
    #[inline]
    pub fn tick(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.age >= self.lifespan
    }

    /// 1.0 when born, 0.0 when expired.
    #[inline]
    pub fn remaining(&self) -> f32 {
        if self.lifespan == 0 {
            0.0
        } else {
            1.0 - (self.age as f32 / self.lifespan as f32).min(1.0)
        }
    }
}

/// A single particle.
///
/// Positions are 3D; flat fields keep `z = 0`. Derived render attributes
/// (`alpha`, `projected`) are recomputed every frame from the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Current size, possibly pulsed.
    pub size: f32,
    /// Size at seed time.
    pub base_size: f32,
    pub color: Color,
    /// Current alpha, possibly pulsed.
    pub alpha: f32,
    /// Alpha at seed time.
    pub base_alpha: f32,
    pub phase: f32,
    pub pulse_speed: f32,
    pub shape: Shape,
    pub rotation: f32,
    pub rotation_speed: f32,
    pub trail: Option<Trail>,
    pub life: Option<Life>,
    pub projected: Projection,
    /// Whether the last update left the particle on screen.
    pub visible: bool,
}

impl Particle {
    /// Particle at rest with neutral render attributes.
    pub fn new(position: Vec3, color: Color) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            size: 1.0,
            base_size: 1.0,
            color,
            alpha: 1.0,
            base_alpha: 1.0,
            phase: 0.0,
            pulse_speed: 0.0,
            shape: Shape::Circle,
            rotation: 0.0,
            rotation_speed: 0.0,
            trail: None,
            life: None,
            projected: Projection {
                screen: position.truncate(),
                scale: 1.0,
            },
            visible: true,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self.base_size = size;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self.base_alpha = alpha;
        self
    }

    /// Size on screen after projection.
    #[inline]
    pub fn screen_size(&self) -> f32 {
        self.size * self.projected.scale
    }

    /// Whether a burst particle outlived its lifespan.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.life.is_some_and(|l| l.is_expired())
    }
}
