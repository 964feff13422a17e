//! Headless runner: drives a scene with a manual clock and reports what it
//! would have drawn.
//!
//! ```text
//! glint [PRESET | --config FILE] [--frames N] [--size WxH] [--seed S]
//!       [--dump-config] [--list]
//! ```

use glint::prelude::*;
use glint::render::DrawStats;
use std::path::PathBuf;
use std::time::Duration;

const USAGE: &str = "Usage: glint [PRESET | --config FILE] [--frames N] [--size WxH] [--seed S] [--dump-config] [--list]";

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Preset(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    source: Source,
    frames: u64,
    viewport: Viewport,
    seed: Option<u64>,
    dump_config: bool,
    list: bool,
}

fn parse_size(value: &str) -> Result<Viewport, RunError> {
    let bad = || RunError::Usage(format!("Invalid size '{}', expected WxH", value));
    let (w, h) = value.split_once(['x', 'X']).ok_or_else(bad)?;
    let width: f32 = w.trim().parse().map_err(|_| bad())?;
    let height: f32 = h.trim().parse().map_err(|_| bad())?;
    let viewport = Viewport::new(width, height);
    if viewport.is_empty() {
        return Err(bad());
    }
    Ok(viewport)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, RunError> {
    let mut parsed = Args {
        source: Source::Preset("particle-sphere".into()),
        frames: 300,
        viewport: Viewport::new(1280.0, 720.0),
        seed: None,
        dump_config: false,
        list: false,
    };

    fn value(
        args: &mut impl Iterator<Item = String>,
        flag: &str,
    ) -> Result<String, RunError> {
        args.next()
            .ok_or_else(|| RunError::Usage(format!("{} needs a value\n{}", flag, USAGE)))
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.source = Source::File(value(&mut args, "--config")?.into()),
            "--frames" => {
                let v = value(&mut args, "--frames")?;
                parsed.frames = v
                    .parse()
                    .map_err(|_| RunError::Usage(format!("Invalid frame count '{}'", v)))?;
            }
            "--size" => parsed.viewport = parse_size(&value(&mut args, "--size")?)?,
            "--seed" => {
                let v = value(&mut args, "--seed")?;
                parsed.seed = Some(
                    v.parse()
                        .map_err(|_| RunError::Usage(format!("Invalid seed '{}'", v)))?,
                );
            }
            "--dump-config" => parsed.dump_config = true,
            "--list" => parsed.list = true,
            "-h" | "--help" => return Err(RunError::Usage(USAGE.into())),
            flag if flag.starts_with("--") => {
                return Err(RunError::Usage(format!("Unknown option '{}'\n{}", flag, USAGE)))
            }
            preset => parsed.source = Source::Preset(preset.to_string()),
        }
    }
    Ok(parsed)
}

fn load_scene(args: &Args) -> Result<SceneConfig, RunError> {
    let mut scene = match &args.source {
        Source::Preset(name) => {
            SceneConfig::preset(name).ok_or_else(|| RunError::UnknownPreset(name.clone()))?
        }
        Source::File(path) => SceneConfig::load(path)?,
    };
    if let Some(seed) = args.seed {
        scene.seed = Some(seed);
    }
    Ok(scene)
}

/// Pointer position for frame `i`: a slow figure eight across the surface.
fn scripted_pointer(viewport: &Viewport, i: u64) -> Vec2 {
    let t = i as f32 * 0.02;
    viewport.center() + Vec2::new(t.sin(), (t * 2.0).sin() * 0.5) * viewport.size() * 0.35
}

fn run() -> Result<(), RunError> {
    let args = parse_args(std::env::args().skip(1))?;

    if args.list {
        for name in PRESETS {
            println!("{}", name);
        }
        return Ok(());
    }

    let scene = load_scene(&args)?;
    if args.dump_config {
        println!("{}", scene.to_json()?);
        return Ok(());
    }

    let clock = ManualClock::new();
    let Some(mut animation) = scene.mount(Some(args.viewport), clock.clone()) else {
        return Ok(());
    };
    let step = if scene.target_fps > 0.0 {
        Duration::from_secs_f64(1.0 / scene.target_fps as f64)
    } else {
        Duration::from_micros(16_667)
    };

    log::info!(
        "Running '{}' ({}) for {} frames at {}x{}",
        scene.name,
        scene.effect.kind(),
        args.frames,
        args.viewport.width,
        args.viewport.height
    );

    animation.start();
    let mut canvas = DrawList::new();
    let mut totals = DrawStats::default();
    let mut rendered = 0u64;

    for i in 0..args.frames {
        clock.advance(step);
        let pointer = PointerEvent::Moved(scripted_pointer(&args.viewport, i));
        animation.handle(pointer.into());

        canvas.reset();
        if animation.tick(&mut canvas) == Tick::Rendered {
            rendered += 1;
            let stats = canvas.stats();
            log::trace!("frame {}: {:?}", i, stats);
            totals.circles += stats.circles;
            totals.rects += stats.rects;
            totals.lines += stats.lines;
            totals.rings += stats.rings;
            totals.glyphs += stats.glyphs;
        }
    }
    animation.stop();

    log::info!(
        "✓ {} frames rendered, {} records live, {} draw calls ({} circles, {} lines, {} rings, {} rects, {} glyphs)",
        rendered,
        animation.effect().record_count(),
        totals.total(),
        totals.circles,
        totals.lines,
        totals.rings,
        totals.rects,
        totals.glyphs
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, RunError> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.source, Source::Preset("particle-sphere".into()));
        assert_eq!(parsed.frames, 300);
        assert!(!parsed.dump_config);
    }

    #[test]
    fn test_parse_flags() {
        let parsed = args(&["cyber-cube", "--frames", "20", "--size", "640x480", "--seed", "9"]).unwrap();
        assert_eq!(parsed.source, Source::Preset("cyber-cube".into()));
        assert_eq!(parsed.frames, 20);
        assert_eq!(parsed.viewport.size(), Vec2::new(640.0, 480.0));
        assert_eq!(parsed.seed, Some(9));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(args(&["--frames"]), Err(RunError::Usage(_))));
        assert!(matches!(args(&["--size", "wide"]), Err(RunError::Usage(_))));
        assert!(matches!(args(&["--bogus"]), Err(RunError::Usage(_))));
    }

    #[test]
    fn test_unknown_preset() {
        let parsed = args(&["sparkles"]).unwrap();
        assert!(matches!(load_scene(&parsed), Err(RunError::UnknownPreset(_))));
    }
}
