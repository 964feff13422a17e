//! Particle behavior rules.
//!
//! Rules define how particles move each frame. A field applies its rules in
//! order to every particle's velocity, integrates position by velocity, then
//! enforces its [`Boundary`].
//!
//! # Rule Categories
//!
//! - **Basic Physics**: Drag, SpeedLimit
//! - **Shape Keeping**: SphereSpring
//! - **Field Effects**: Swirl, Wave
//! - **Input**: Pointer (attract or repel within a radius)
//!
//! # Example
//!
//! ```ignore
//! let rules = vec![
//!     Rule::SphereSpring { radius: 25.0, stiffness: 0.01 },
//!     Rule::Swirl { radius: 25.0, strength: 0.05, secondary: 0.3 },
//!     Rule::SpeedLimit { min: 0.0, max: 0.2 },
//!     Rule::Drag(0.02),
//! ];
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// `sin(time * frequency + phase)`.
///
/// Pure: equal inputs always give equal outputs, so every pulsing property
/// is reproducible from the time accumulator alone.
#[inline]
pub fn pulse(time: f32, phase: f32, frequency: f32) -> f32 {
    (time * frequency + phase).sin()
}

/// Sinusoidal modulation of a property around a base value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    pub base: f32,
    pub amplitude: f32,
    /// Multiplies each particle's own pulse speed.
    pub frequency: f32,
}

impl Pulse {
    /// `base + amplitude * pulse(time, phase, speed * frequency)`.
    #[inline]
    pub fn value(&self, time: f32, phase: f32, speed: f32) -> f32 {
        self.base + self.amplitude * pulse(time, phase, speed * self.frequency)
    }
}

/// Distance falloff functions for force-based rules.
///
/// Controls how a force's strength changes with distance from the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    /// Constant force regardless of distance.
    #[default]
    Constant,

    /// Linear falloff: force decreases linearly to zero at max range.
    Linear,

    /// Inverse falloff: force = 1/distance (with softening).
    Inverse,

    /// Inverse-square falloff: force = 1/distance².
    InverseSquare,

    /// Smooth falloff using smoothstep for gradual transitions.
    Smooth,
}

impl Falloff {
    /// Strength multiplier at `dist` from a source of range `radius`.
    pub fn factor(&self, dist: f32, radius: f32) -> f32 {
        match self {
            Falloff::Constant => 1.0,
            Falloff::Linear => (1.0 - dist / radius).max(0.0),
            Falloff::Inverse => 1.0 / (dist + 0.01),
            Falloff::InverseSquare => 1.0 / (dist * dist + 0.0001),
            Falloff::Smooth => {
                let t = (dist / radius).clamp(0.0, 1.0);
                1.0 - t * t * (3.0 - 2.0 * t)
            }
        }
    }
}

/// Direction of a pointer force.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerMode {
    #[default]
    Attract,
    Repel,
}

/// How pointer pixels map into particle space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerSpace {
    /// Particle coordinates are surface pixels relative to the field center.
    Screen,
    /// Pointer in -1..1 on each axis times `scale`, placed at depth `depth`.
    Normalized { scale: f32, depth: f32 },
}

/// Nudges velocity toward or away from the pointer within a radius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerForce {
    pub radius: f32,
    pub strength: f32,
    #[serde(default)]
    pub mode: PointerMode,
    #[serde(default)]
    pub falloff: Falloff,
    pub space: PointerSpace,
}

impl PointerForce {
    /// Velocity change for a particle at `position` with the pointer at `target`.
    pub fn impulse(&self, position: Vec3, target: Vec3) -> Vec3 {
        let offset = target - position;
        let dist = offset.length();
        if dist >= self.radius || dist < 1e-6 {
            return Vec3::ZERO;
        }
        let sign = match self.mode {
            PointerMode::Attract => 1.0,
            PointerMode::Repel => -1.0,
        };
        offset / dist * self.strength * self.falloff.factor(dist, self.radius) * sign
    }
}

/// Per-frame values rules read.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleContext {
    /// Effect time accumulator.
    pub time: f32,
    /// Pointer position in particle space, when the pointer is over the surface.
    pub pointer: Option<Vec3>,
}

/// Forces applied to particle velocity, in order, every frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Fraction of velocity lost per frame (`0.02` keeps 98 %).
    Drag(f32),

    /// Clamps speed into `min..=max`.
    SpeedLimit { min: f32, max: f32 },

    /// Pulls particles back toward a sphere surface around the origin.
    SphereSpring { radius: f32, stiffness: f32 },

    /// Vortex around a slowly wobbling, mostly vertical axis.
    ///
    /// Particles nearer the center spin faster. A second, per-particle axis
    /// adds `secondary` times the main strength for less regular motion.
    Swirl {
        radius: f32,
        strength: f32,
        secondary: f32,
    },

    /// Global breathing motion: each axis gets a phase-shifted sine.
    Wave { strength: f32 },

    /// Pointer attraction or repulsion.
    Pointer(PointerForce),
}

impl Rule {
    /// Rule that uses the pointer, if this is one.
    pub fn pointer_force(&self) -> Option<&PointerForce> {
        match self {
            Rule::Pointer(force) => Some(force),
            _ => None,
        }
    }

    /// Apply to the velocity of particle `index` at `position`.
    pub fn apply(&self, ctx: &RuleContext, index: usize, position: Vec3, velocity: &mut Vec3) {
        match *self {
            Rule::Drag(drag) => {
                *velocity *= (1.0 - drag).max(0.0);
            }

            Rule::SpeedLimit { min, max } => {
                let speed = velocity.length();
                if speed > max && speed > 0.0 {
                    *velocity *= max / speed;
                } else if speed < min && speed > 1e-6 {
                    *velocity *= min / speed;
                }
            }

            Rule::SphereSpring { radius, stiffness } => {
                let dist = position.length();
                if dist > 1e-6 {
                    *velocity += position / dist * (radius - dist) * stiffness;
                }
            }

            Rule::Swirl {
                radius,
                strength,
                secondary,
            } => {
                let dist = position.length();
                if dist < 1e-6 {
                    return;
                }
                let direction = position / dist;
                let t = ctx.time;
                let spin = strength * (0.5 + 0.5 * (1.0 - dist / radius).min(1.0));

                let axis = Vec3::new((t * 0.1).sin() * 0.2 + 0.1, 1.0, (t * 0.15).cos() * 0.2)
                    .normalize();
                *velocity += direction.cross(axis).normalize_or_zero() * spin;

                let i = index as f32;
                let second_axis = Vec3::new(
                    (t * 0.3 + i * 0.01).sin(),
                    (t * 0.2 + i * 0.01).cos(),
                    (t * 0.25 + i * 0.02).sin(),
                )
                .normalize_or_zero();
                *velocity += direction.cross(second_axis).normalize_or_zero() * spin * secondary;
            }

            Rule::Wave { strength } => {
                let t = ctx.time;
                let i = index as f32 * 0.1;
                *velocity += Vec3::new(
                    (t * 0.5 + i).sin(),
                    (t * 0.4 + i).cos(),
                    (t * 0.3 + i).sin(),
                ) * strength;
            }

            Rule::Pointer(force) => {
                if let Some(target) = ctx.pointer {
                    *velocity += force.impulse(position, target);
                }
            }
        }
    }
}

/// Region particles live in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bounds {
    /// Axis-aligned box.
    Box { min: Vec3, max: Vec3 },
    /// Sphere around the origin.
    Sphere { radius: f32 },
}

impl Bounds {
    pub fn center(&self) -> Vec3 {
        match *self {
            Bounds::Box { min, max } => (min + max) * 0.5,
            Bounds::Sphere { .. } => Vec3::ZERO,
        }
    }

    /// Sphere radius, or the smallest half extent of a box.
    pub fn radius(&self) -> f32 {
        match *self {
            Bounds::Box { min, max } => {
                let half = (max - min) * 0.5;
                // a flat box (2D field) has zero z extent
                if half.z > 0.0 {
                    half.min_element()
                } else {
                    half.x.min(half.y)
                }
            }
            Bounds::Sphere { radius } => radius,
        }
    }

    /// Whether `p` is inside the bounds grown by `slack`.
    pub fn contains(&self, p: Vec3, slack: f32) -> bool {
        match *self {
            Bounds::Box { min, max } => {
                p.x >= min.x - slack
                    && p.x <= max.x + slack
                    && p.y >= min.y - slack
                    && p.y <= max.y + slack
                    && p.z >= min.z - slack
                    && p.z <= max.z + slack
            }
            Bounds::Sphere { radius } => p.length() <= radius + slack,
        }
    }
}

/// What happened to a particle at the boundary this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crossing {
    Inside,
    Reflected,
    Wrapped,
    /// The particle must be reseeded.
    Escaped,
}

/// What happens when a particle leaves its bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Unbounded.
    None,

    /// Clamp to the bounds and point the offending velocity component back
    /// inside. For a sphere the whole velocity reverses.
    #[default]
    Reflect,

    /// Leave one side, re-enter from the opposite side.
    Wrap,

    /// Reseed once the distance from the center reaches `threshold` times
    /// the bounds radius.
    Respawn { threshold: f32 },

    /// Reseed once outside the bounds grown by `margin`.
    RespawnOutside { margin: f32 },
}

impl Boundary {
    /// Enforce the boundary on one particle.
    pub fn apply(&self, position: &mut Vec3, velocity: &mut Vec3, bounds: &Bounds) -> Crossing {
        match *self {
            Boundary::None => Crossing::Inside,

            Boundary::Reflect => match *bounds {
                Bounds::Box { min, max } => {
                    let mut crossed = false;
                    for axis in 0..3 {
                        if min[axis] >= max[axis] {
                            continue;
                        }
                        if position[axis] < min[axis] {
                            position[axis] = min[axis];
                            velocity[axis] = velocity[axis].abs();
                            crossed = true;
                        } else if position[axis] > max[axis] {
                            position[axis] = max[axis];
                            velocity[axis] = -velocity[axis].abs();
                            crossed = true;
                        }
                    }
                    if crossed {
                        Crossing::Reflected
                    } else {
                        Crossing::Inside
                    }
                }
                Bounds::Sphere { radius } => {
                    let dist = position.length();
                    if dist > radius && dist > 0.0 {
                        *velocity = -*velocity;
                        *position *= radius / dist;
                        Crossing::Reflected
                    } else {
                        Crossing::Inside
                    }
                }
            },

            Boundary::Wrap => match *bounds {
                Bounds::Box { min, max } => {
                    let mut wrapped = false;
                    for axis in 0..3 {
                        let size = max[axis] - min[axis];
                        if size <= 0.0 {
                            continue;
                        }
                        if position[axis] < min[axis] {
                            position[axis] += size;
                            wrapped = true;
                        } else if position[axis] > max[axis] {
                            position[axis] -= size;
                            wrapped = true;
                        }
                    }
                    if wrapped {
                        Crossing::Wrapped
                    } else {
                        Crossing::Inside
                    }
                }
                Bounds::Sphere { radius } => {
                    let dist = position.length();
                    if dist > radius && dist > 0.0 {
                        // re-enter at the antipode
                        *position *= -radius / dist;
                        Crossing::Wrapped
                    } else {
                        Crossing::Inside
                    }
                }
            },

            Boundary::Respawn { threshold } => {
                let dist = (*position - bounds.center()).length();
                if !dist.is_finite() || dist >= threshold * bounds.radius() {
                    Crossing::Escaped
                } else {
                    Crossing::Inside
                }
            }

            Boundary::RespawnOutside { margin } => {
                if !position.is_finite() || !bounds.contains(*position, margin) {
                    Crossing::Escaped
                } else {
                    Crossing::Inside
                }
            }
        }
    }
}
