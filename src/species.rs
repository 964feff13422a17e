//! Particle species of the quantum field.
//!
//! Each group of the quantum field is one [`Species`]. The species is resolved
//! into a [`SpeciesParams`] once, when the field seeds, and per-frame code only
//! ever reads the resolved parameters.

use crate::color::Palette;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Kind of elementary particle a group represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Quark,
    Lepton,
    Boson,
}

/// How sprites of a group drift around their seeded position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wobble {
    /// Repulsion plus positional uncertainty.
    Fermion,
    /// Small orbit around the seeded position plus a slow wave.
    Boson,
}

/// Everything a group needs, fixed at seed time.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesParams {
    pub species: Species,
    pub palette: Palette,
    /// Sprite size range.
    pub size: (f32, f32),
    /// Each axis of the seed velocity is uniform in `-max..max`.
    pub max_speed: f32,
    /// Possible spin values, picked uniformly.
    pub spins: &'static [f32],
    /// Group rotation added every frame, radians per axis.
    pub rotation_rate: Vec3,
    pub wobble: Wobble,
    /// Size pulse amplitude.
    pub pulse_amplitude: f32,
    /// Size pulse frequency, per unit of field time.
    pub pulse_frequency: f32,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Quark, Species::Lepton, Species::Boson];

    /// Default group size.
    pub fn default_count(self) -> u32 {
        match self {
            Species::Quark => 60,
            Species::Lepton => 40,
            Species::Boson => 30,
        }
    }

    pub fn is_fermion(self) -> bool {
        matches!(self, Species::Quark | Species::Lepton)
    }

    pub fn params(self) -> SpeciesParams {
        match self {
            Species::Quark | Species::Lepton => SpeciesParams {
                species: self,
                palette: if self == Species::Quark {
                    Palette::quarks()
                } else {
                    Palette::leptons()
                },
                size: (2.0, 7.0),
                max_speed: 0.2,
                spins: &[-0.5, 0.5],
                rotation_rate: Vec3::new(0.001, 0.002, 0.0005),
                wobble: Wobble::Fermion,
                pulse_amplitude: 0.4,
                pulse_frequency: 2.0,
            },
            Species::Boson => SpeciesParams {
                species: self,
                palette: Palette::bosons(),
                size: (3.0, 8.0),
                max_speed: 0.3,
                spins: &[-1.0, 0.0, 1.0],
                rotation_rate: Vec3::new(0.003, 0.004, 0.002),
                wobble: Wobble::Boson,
                pulse_amplitude: 0.5,
                pulse_frequency: 3.0,
            },
        }
    }
}

impl Wobble {
    /// Displacement of sprite `index` at `pos` and field time `t`.
    pub fn offset(self, pos: Vec3, index: usize, t: f32) -> Vec3 {
        match self {
            Wobble::Fermion => {
                let off = index as f32 * 0.01;
                let uncertainty = (t * 3.0 + off * 20.0).sin() * 2.0;
                let jitter = Vec3::new(
                    (t * 2.0 + pos.y * 0.1).sin(),
                    (t * 2.2 + pos.z * 0.1).cos(),
                    (t * 2.4 + pos.x * 0.1).sin(),
                ) * uncertainty;
                let repulsion = Vec3::new(
                    (t * 0.7 + pos.z * 0.2).sin() * 3.0,
                    (t * 0.8 + pos.x * 0.2).cos() * 3.0,
                    (t * 0.9 + pos.y * 0.2).sin() * 3.0,
                );
                jitter + repulsion * ((t * 1.5 + off * 10.0).sin() * 0.5 + 0.5)
            }
            Wobble::Boson => {
                let mut p = pos;
                if pos.length() > 10.0 {
                    let orbit = t * 0.8 + index as f32 * 0.01;
                    let radius = 5.0 + (t * 0.2).sin() * 2.0;
                    p += Vec3::new(
                        orbit.sin() * radius,
                        orbit.cos() * radius,
                        (orbit * 0.7).sin() * radius * 0.5,
                    );
                }
                // each axis reads the already shifted components
                p.x += (t * 1.2 + p.z * 0.3).sin() * 2.0;
                p.y += (t * 1.5 + p.x * 0.3).cos() * 2.0;
                p.z += (t + p.y * 0.3).sin() * 2.0;
                p - pos
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_resolved_per_species() {
        let quark = Species::Quark.params();
        let lepton = Species::Lepton.params();
        let boson = Species::Boson.params();

        assert_eq!(quark.palette, Palette::quarks());
        assert_eq!(lepton.palette, Palette::leptons());
        assert_eq!(quark.wobble, Wobble::Fermion);
        assert_eq!(boson.wobble, Wobble::Boson);
        assert_eq!(boson.spins, &[-1.0, 0.0, 1.0]);
        assert!(boson.rotation_rate.x > quark.rotation_rate.x);
    }

    #[test]
    fn test_default_counts() {
        let total: u32 = Species::ALL.iter().map(|s| s.default_count()).sum();
        assert_eq!(total, 130);
    }

    #[test]
    fn test_wobble_bounded() {
        for i in 0..50 {
            let t = i as f32 * 0.37;
            let pos = Vec3::new(i as f32 * 3.0, -20.0, 5.0);
            assert!(Wobble::Fermion.offset(pos, i, t).length() < 10.0);
            assert!(Wobble::Boson.offset(pos, i, t).length() < 12.0);
        }
    }

    #[test]
    fn test_boson_centre_does_not_orbit() {
        let near = Wobble::Boson.offset(Vec3::ZERO, 0, 0.0);
        // only the wave term applies near the origin
        assert!(near.length() <= 2.0 * 3f32.sqrt() + 1e-4);
    }
}
