//! Scene configuration and named presets.
//!
//! A scene is one effect plus the runner settings it was designed for.
//! Scenes serialize to JSON, so a page (or the `glint` binary) can load a
//! tuned background from a file instead of code.
//!
//! ```ignore
//! let scene = SceneConfig::preset("cyber-cube").unwrap();
//! scene.save("cube.json")?;
//!
//! let loaded = SceneConfig::load("cube.json")?;
//! let animation = loaded.mount(Some(Viewport::new(1280.0, 720.0)), SystemClock::new());
//! ```
//!
//! The effect is internally tagged by `kind`:
//!
//! ```json
//! {
//!   "name": "Dot ripples",
//!   "target_fps": 60.0,
//!   "effect": { "kind": "dot_matrix", "grid_size": 30.0 }
//! }
//! ```

use crate::color::Theme;
use crate::effects::{
    DotConfig, DotMatrix, Effect, FieldConfig, Lattice, LatticeConfig, MatrixRain, PanelConfig,
    Panels, ParticleField, QuantumConfig, QuantumField, RainConfig, SignalConfig, SignalGrid,
};
use crate::error::ConfigError;
use crate::input::PointerConfig;
use crate::runner::{Animation, RunOptions};
use crate::time::Clock;
use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Names accepted by [`SceneConfig::preset`].
pub const PRESETS: &[&str] = &[
    "particle-sphere",
    "particle-vortex",
    "particle-cube",
    "cyber-cube",
    "cyber-cube-points",
    "signal-grid",
    "dot-hover",
    "dot-ripples",
    "matrix-rain",
    "quantum",
    "panels",
];

/// Which effect a scene runs, with its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectConfig {
    ParticleField(FieldConfig),
    Lattice(LatticeConfig),
    SignalGrid(SignalConfig),
    DotMatrix(DotConfig),
    MatrixRain(RainConfig),
    Quantum(QuantumConfig),
    Panels(PanelConfig),
}

impl Default for EffectConfig {
    fn default() -> Self {
        EffectConfig::ParticleField(FieldConfig::default())
    }
}

impl EffectConfig {
    /// The `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            EffectConfig::ParticleField(_) => "particle_field",
            EffectConfig::Lattice(_) => "lattice",
            EffectConfig::SignalGrid(_) => "signal_grid",
            EffectConfig::DotMatrix(_) => "dot_matrix",
            EffectConfig::MatrixRain(_) => "matrix_rain",
            EffectConfig::Quantum(_) => "quantum",
            EffectConfig::Panels(_) => "panels",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            EffectConfig::ParticleField(c) => c.validate(),
            EffectConfig::Lattice(c) => c.validate(),
            EffectConfig::SignalGrid(c) => c.validate(),
            EffectConfig::DotMatrix(c) => c.validate(),
            EffectConfig::MatrixRain(c) => c.validate(),
            EffectConfig::Quantum(c) => c.validate(),
            EffectConfig::Panels(c) => c.validate(),
        }
    }

    /// Construct the effect. Call [`validate`](Self::validate) first.
    pub fn build(&self, seed: Option<u64>) -> Box<dyn Effect> {
        match self {
            EffectConfig::ParticleField(c) => Box::new(ParticleField::new(c.clone(), seed)),
            EffectConfig::Lattice(c) => Box::new(Lattice::new(c.clone(), seed)),
            EffectConfig::SignalGrid(c) => Box::new(SignalGrid::new(c.clone(), seed)),
            EffectConfig::DotMatrix(c) => Box::new(DotMatrix::new(c.clone(), seed)),
            EffectConfig::MatrixRain(c) => Box::new(MatrixRain::new(c.clone(), seed)),
            EffectConfig::Quantum(c) => Box::new(QuantumField::new(c.clone(), seed)),
            EffectConfig::Panels(c) => Box::new(Panels::new(c.clone(), seed)),
        }
    }
}

fn default_fps() -> f32 {
    60.0
}

fn default_time_scale() -> f32 {
    1.0
}

fn default_debounce() -> Duration {
    Duration::from_millis(250)
}

/// A complete, loadable scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub name: String,
    /// Frame rate cap. Zero renders on every host callback.
    #[serde(default = "default_fps")]
    pub target_fps: f32,
    /// Fixed RNG seed; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub pointer: PointerConfig,
    #[serde(default = "default_debounce", with = "crate::input::millis")]
    pub resize_debounce: Duration,
    /// Playback speed; 2.0 runs the effect twice as fast.
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
    pub effect: EffectConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: "Untitled".into(),
            target_fps: default_fps(),
            seed: None,
            theme: Theme::Light,
            pointer: PointerConfig::default(),
            resize_debounce: default_debounce(),
            time_scale: default_time_scale(),
            effect: EffectConfig::default(),
        }
    }
}

impl SceneConfig {
    pub fn new(name: impl Into<String>, effect: EffectConfig) -> Self {
        Self {
            name: name.into(),
            effect,
            ..Self::default()
        }
    }

    pub fn with_target_fps(mut self, fps: f32) -> Self {
        self.target_fps = fps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale;
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// One of the [`PRESETS`], or `None` for an unknown name.
    pub fn preset(name: &str) -> Option<Self> {
        let scene = match name {
            "particle-sphere" => Self::new(
                "Particle sphere",
                EffectConfig::ParticleField(FieldConfig::sphere()),
            ),
            "particle-vortex" => {
                Self::new("Particle vortex", EffectConfig::ParticleField(FieldConfig::vortex()))
                    .with_theme(Theme::Dark)
            }
            "particle-cube" => {
                Self::new("Particle cube", EffectConfig::ParticleField(FieldConfig::cube()))
                    .with_theme(Theme::Dark)
            }
            "cyber-cube" => {
                let mut scene =
                    Self::new("Cyber cube", EffectConfig::Lattice(LatticeConfig::default()))
                        .with_target_fps(20.0)
                        .with_theme(Theme::Dark);
                scene.pointer.sample_interval = Duration::from_millis(80);
                scene
            }
            "cyber-cube-points" => Self::new(
                "Cyber cube points",
                EffectConfig::Lattice(LatticeConfig::cube_points()),
            )
            .with_target_fps(30.0)
            .with_theme(Theme::Dark),
            "signal-grid" => {
                Self::new("Signal grid", EffectConfig::SignalGrid(SignalConfig::default()))
            }
            "dot-hover" => Self::new("Dot hover", EffectConfig::DotMatrix(DotConfig::hover())),
            "dot-ripples" => Self::new("Dot ripples", EffectConfig::DotMatrix(DotConfig::ripples())),
            "matrix-rain" => {
                Self::new("Matrix rain", EffectConfig::MatrixRain(RainConfig::default()))
                    .with_theme(Theme::Dark)
            }
            "quantum" => {
                Self::new("Quantum field", EffectConfig::Quantum(QuantumConfig::default()))
                    .with_theme(Theme::Dark)
            }
            "panels" => Self::new("Panels", EffectConfig::Panels(PanelConfig::default())),
            _ => return None,
        };
        Some(scene)
    }

    /// Save the scene as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load and validate a scene file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse and validate scene JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let scene: Self = serde_json::from_str(json)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_fps.is_finite() || self.target_fps < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "target_fps must be a non-negative number, got {}",
                self.target_fps
            )));
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_scale must be a non-negative number, got {}",
                self.time_scale
            )));
        }
        self.effect.validate()
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            target_fps: self.target_fps,
            pointer: self.pointer,
            resize_debounce: self.resize_debounce,
            theme: self.theme,
            time_scale: self.time_scale,
        }
    }

    pub fn build(&self) -> Box<dyn Effect> {
        self.effect.build(self.seed)
    }

    /// Build the effect and mount it. `None` when the mount point is absent.
    pub fn mount(
        &self,
        viewport: Option<Viewport>,
        clock: impl Clock + 'static,
    ) -> Option<Animation<Box<dyn Effect>>> {
        Animation::mount(viewport, self.build(), clock, self.run_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_resolves() {
        for name in PRESETS {
            let scene = SceneConfig::preset(name).unwrap();
            assert!(scene.validate().is_ok(), "{name} failed validation");
        }
        assert!(SceneConfig::preset("nope").is_none());
    }

    #[test]
    fn test_kind_tag() {
        let scene = SceneConfig::preset("matrix-rain").unwrap();
        let json = scene.to_json().unwrap();
        assert!(json.contains("\"kind\": \"matrix_rain\""));
        assert_eq!(scene.effect.kind(), "matrix_rain");
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let scene = SceneConfig::from_json(
            r#"{ "name": "tiny", "effect": { "kind": "signal_grid", "count": 3 } }"#,
        )
        .unwrap();
        assert_eq!(scene.target_fps, 60.0);
        assert_eq!(scene.resize_debounce, Duration::from_millis(250));
        match scene.effect {
            EffectConfig::SignalGrid(c) => {
                assert_eq!(c.count, 3);
                assert_eq!(c.rows, 10);
            }
            other => panic!("wrong effect {:?}", other.kind()),
        }
    }

    #[test]
    fn test_invalid_fps_rejected() {
        let scene = SceneConfig::default().with_target_fps(-1.0);
        assert!(matches!(scene.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_time_scale_reaches_runner() {
        let scene = SceneConfig::preset("quantum").unwrap().with_time_scale(0.5);
        assert_eq!(scene.run_options().time_scale, 0.5);
        let json = r#"{ "name": "x", "time_scale": -2.0, "effect": { "kind": "quantum" } }"#;
        assert!(matches!(SceneConfig::from_json(json), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_cube_preset_runner_settings() {
        let options = SceneConfig::preset("cyber-cube").unwrap().run_options();
        assert_eq!(options.target_fps, 20.0);
        assert_eq!(options.pointer.sample_interval, Duration::from_millis(80));
        assert_eq!(options.theme, Theme::Dark);
    }

    #[test]
    fn test_added_presets_pick_their_effects() {
        let cube = SceneConfig::preset("particle-cube").unwrap();
        assert!(matches!(
            &cube.effect,
            EffectConfig::ParticleField(c) if matches!(c.volume, crate::effects::Volume::Box { .. })
        ));

        let points = SceneConfig::preset("cyber-cube-points").unwrap();
        assert_eq!(points.target_fps, 30.0);
        match &points.effect {
            EffectConfig::Lattice(c) => {
                assert!(c.interior.is_some());
                assert!(!c.inner_cube);
            }
            other => panic!("wrong effect {:?}", other.kind()),
        }

        let panels = SceneConfig::preset("panels").unwrap();
        assert_eq!(panels.effect.kind(), "panels");
        assert!(panels.to_json().unwrap().contains("\"kind\": \"panels\""));
    }
}
