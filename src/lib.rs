//! # Glint - ambient backgrounds for hero sections
//!
//! CPU particle fields, cube lattices, signal grids, dot ripples, digital rain
//! and a quantum-themed particle scene, all drawn through a backend-neutral
//! [`Canvas`](render::Canvas).
//!
//! ## Quick Start
//!
//! ```ignore
//! use glint::prelude::*;
//!
//! let clock = SystemClock::new();
//! let mut animation = SceneConfig::preset("particle-sphere")
//!     .unwrap()
//!     .mount(Some(Viewport::new(1280.0, 720.0)), clock)
//!     .unwrap();
//!
//! animation.start();
//! loop {
//!     // Forward host input as it arrives.
//!     animation.handle(HostEvent::Pointer(PointerEvent::Moved(Vec2::new(400.0, 300.0))));
//!     // Call once per host frame; the runner decides whether to render.
//!     animation.tick(&mut my_canvas);
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Effects
//!
//! Every background implements [`Effect`](effects::Effect) with three
//! stages:
//!
//! - **seed**: build the records for a viewport,
//! - **update**: advance them by one frame,
//! - **render**: issue draw calls on a canvas.
//!
//! Effects are configured with plain structs (`FieldConfig`, `LatticeConfig`,
//! ...) that serialize to JSON and come with `with_*` builders:
//!
//! ```ignore
//! let config = FieldConfig::sphere()
//!     .with_count(CountPolicy::Fixed(120))
//!     .with_rule(Rule::Drag(0.01))
//!     .with_boundary(Boundary::Reflect);
//! let field = ParticleField::new(config, Some(42));
//! ```
//!
//! ### Runner
//!
//! [`Animation`](runner::Animation) owns an effect, a [`Clock`](time::Clock),
//! the pointer state and frame pacing. It has two states, stopped and
//! running. Hidden pages skip rendering and resizes are debounced before the
//! effect is reseeded.
//!
//! ### Rendering
//!
//! Effects draw circles, radial glows, rectangles, lines, rings and glyphs on
//! a [`Canvas`](render::Canvas). [`DrawList`](render::DrawList) records the
//! calls for tests and headless runs; [`render::gpu`] packs particles into
//! vertex buffers for point-sprite backends.
//!
//! ## Determinism
//!
//! Every effect takes an optional `u64` seed, and the runner reads time only
//! from its injected clock. A [`ManualClock`](time::ManualClock) plus a
//! fixed seed reproduces a run exactly.

pub mod color;
pub mod config;
pub mod connections;
pub mod effects;
pub mod error;
pub mod input;
pub mod particle;
pub mod render;
pub mod rules;
pub mod runner;
pub mod spawn;
pub mod species;
pub mod time;
pub mod viewport;

pub use bytemuck;
pub use glam::{Vec2, Vec3};

pub use color::{BlendMode, Color, Palette, Theme, ThemedPalette};
pub use config::{EffectConfig, SceneConfig, PRESETS};
pub use effects::{Effect, FrameContext};
pub use error::{ConfigError, RunError};
pub use runner::{Animation, RunOptions, RunState, Tick};
pub use spawn::SpawnContext;

pub mod prelude {
    pub use crate::color::{BlendMode, Color, Palette, Theme, ThemedPalette};
    pub use crate::config::{EffectConfig, SceneConfig, PRESETS};
    pub use crate::connections::{find_connections, Connection, ConnectionLimits};
    pub use crate::effects::{
        DotConfig, DotMatrix, Effect, FieldConfig, FrameContext, InteriorConfig, Lattice,
        LatticeConfig, MatrixRain, PanelConfig, Panels, ParticleField, QuantumConfig, QuantumField,
        RainConfig, Ripple, RippleConfig, SignalConfig, SignalGrid, Volume,
    };
    pub use crate::error::{ConfigError, RunError};
    pub use crate::input::{HostEvent, Pointer, PointerConfig, PointerEvent};
    pub use crate::particle::{Particle, Perspective};
    pub use crate::render::{Canvas, DrawCommand, DrawList, Fill};
    pub use crate::rules::{Boundary, Falloff, PointerForce, PointerMode, Rule};
    pub use crate::runner::{Animation, ResizeDebouncer, RunOptions, RunState, Tick};
    pub use crate::spawn::SpawnContext;
    pub use crate::species::Species;
    pub use crate::time::{Clock, FrameGate, ManualClock, SystemClock, Time};
    pub use crate::viewport::{CountPolicy, DeviceClass, Viewport};
    pub use crate::{Vec2, Vec3};
}
