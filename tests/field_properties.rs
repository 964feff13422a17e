//! Behavioural properties of the particle field and its building blocks.

use glint::connections::{find_connections, ConnectionLimits};
use glint::effects::field::{FieldConfig, ParticleField, Volume};
use glint::effects::{Effect, FrameContext};
use glint::input::Pointer;
use glint::render::{DrawCommand, DrawList, Fill};
use glint::rules::{pulse, Boundary};
use glint::spawn::SpawnContext;
use glint::viewport::{CountPolicy, Viewport};
use glint::{Theme, Vec3};

fn tick(field: &mut ParticleField, frame: u64, viewport: Viewport) {
    let ctx = FrameContext::at(frame as f32 * 0.01, frame, viewport);
    field.update(&ctx, &Pointer::default());
}

#[test]
fn flat_field_stays_bounded_for_1000_ticks() {
    let viewport = Viewport::new(500.0, 500.0);
    let config = FieldConfig::sphere()
        .with_volume(Volume::Viewport)
        .with_count(CountPolicy::Fixed(50))
        .with_speed(0.1, 0.5)
        .with_boundary(Boundary::Reflect);
    let mut field = ParticleField::new(config, Some(2024));
    field.seed(&viewport, Theme::Light);
    assert_eq!(field.particles().len(), 50);

    for frame in 0..1000 {
        tick(&mut field, frame, viewport);
    }

    for p in field.particles() {
        assert!(p.position.is_finite(), "non-finite position {:?}", p.position);
        assert!((-250.0..=750.0).contains(&p.position.x));
        assert!((-250.0..=750.0).contains(&p.position.y));
    }
}

#[test]
fn sphere_field_stays_inside_volume() {
    let viewport = Viewport::new(800.0, 600.0);
    let config = FieldConfig::sphere().with_count(CountPolicy::Fixed(80));
    let mut field = ParticleField::new(config, Some(7));
    field.seed(&viewport, Theme::Dark);
    let radius = field.bounds().radius();

    for frame in 0..500 {
        tick(&mut field, frame, viewport);
        for p in field.particles() {
            // one frame of overshoot is corrected by the boundary
            assert!(p.position.length() <= radius + 1e-3);
        }
    }
}

#[test]
fn reflection_flips_velocity_once_per_crossing() {
    let viewport = Viewport::new(200.0, 200.0);
    let config = FieldConfig::sphere()
        .with_volume(Volume::Viewport)
        .with_count(CountPolicy::Fixed(1))
        .with_boundary(Boundary::Reflect);
    let mut field = ParticleField::new(config, Some(3));
    field.seed(&viewport, Theme::Light);
    {
        let p = &mut field.particles_mut()[0];
        p.position = Vec3::new(199.5, 100.0, 0.0);
        p.velocity = Vec3::new(1.0, 0.0, 0.0);
    }

    let mut flips = 0;
    let mut last_sign = 1.0f32;
    for frame in 0..50 {
        tick(&mut field, frame, viewport);
        let sign = field.particles()[0].velocity.x.signum();
        if sign != last_sign {
            flips += 1;
            last_sign = sign;
        }
    }
    assert_eq!(flips, 1);
    assert!(field.particles()[0].velocity.x < 0.0);
}

#[test]
fn escaped_particle_respawns_inside() {
    let viewport = Viewport::new(800.0, 600.0);
    let config = FieldConfig::sphere()
        .with_volume(Volume::Sphere { radius: 100.0 })
        .with_count(CountPolicy::Fixed(10))
        .with_boundary(Boundary::Respawn { threshold: 2.0 });
    let mut field = ParticleField::new(config, Some(99));
    field.seed(&viewport, Theme::Light);
    {
        let p = &mut field.particles_mut()[0];
        p.position = Vec3::new(200.0, 0.0, 0.0);
        p.velocity = Vec3::ZERO;
    }

    tick(&mut field, 0, viewport);
    assert!(field.particles()[0].position.length() <= 100.0 + 1e-3);
}

#[test]
fn connections_are_unordered_and_within_threshold() {
    let mut spawn = SpawnContext::new(12);
    let points: Vec<Vec3> = (0..120).map(|_| spawn.random_in_sphere(150.0)).collect();
    let limits = ConnectionLimits {
        max_distance: 60.0,
        ..ConnectionLimits::default()
    };

    let connections = find_connections(&points, &limits);
    assert!(!connections.is_empty());
    let mut seen = std::collections::HashSet::new();
    for c in &connections {
        assert!(c.a < c.b);
        assert!(c.distance <= 60.0);
        assert!((points[c.a].distance(points[c.b]) - c.distance).abs() < 1e-3);
        assert!(seen.insert((c.a, c.b)));
        assert!(!seen.contains(&(c.b, c.a)));
    }
}

#[test]
fn connection_cap_is_first_come() {
    let points: Vec<Vec3> = (0..10).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
    let limits = ConnectionLimits {
        max_distance: 100.0,
        max_total: 5,
        ..ConnectionLimits::default()
    };
    let connections = find_connections(&points, &limits);
    assert_eq!(connections.len(), 5);
    // record order: all pairs of record 0 come first
    assert!(connections.iter().all(|c| c.a == 0));
}

#[test]
fn pulse_is_pure() {
    for i in 0..20 {
        let t = i as f32 * 0.73;
        assert_eq!(pulse(t, 0.4, 1.7), pulse(t, 0.4, 1.7));
    }
    assert!((pulse(0.0, std::f32::consts::FRAC_PI_2, 3.0) - 1.0).abs() < 1e-6);
}

#[test]
fn same_seed_same_field() {
    let viewport = Viewport::new(640.0, 480.0);
    let run = || {
        let mut field = ParticleField::new(FieldConfig::sphere(), Some(5));
        field.seed(&viewport, Theme::Light);
        for frame in 0..30 {
            tick(&mut field, frame, viewport);
        }
        field.particles().iter().map(|p| p.position).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

/// Render one frame and check that only the centre glow was drawn.
fn assert_glow_only(field: &ParticleField) {
    let mut list = DrawList::new();
    field.render(&mut list);
    let stats = list.stats();
    assert_eq!(stats.circles, 1, "{:?}", list.commands());
    assert_eq!(stats.lines + stats.rects + stats.rings + stats.glyphs, 0);
    let glow = list
        .commands()
        .iter()
        .find(|c| matches!(c, DrawCommand::Circle { .. }));
    assert!(matches!(
        glow,
        Some(DrawCommand::Circle {
            fill: Fill::Radial { .. },
            ..
        })
    ));
}

#[test]
fn empty_field_renders_only_glow() {
    let viewport = Viewport::new(800.0, 600.0);
    let config = FieldConfig::sphere().with_count(CountPolicy::Fixed(0));
    let mut field = ParticleField::new(config, Some(1));
    field.seed(&viewport, Theme::Light);
    assert!(field.particles().is_empty());

    for frame in 0..3 {
        tick(&mut field, frame, viewport);
    }
    assert!(field.links().is_empty());
    assert_glow_only(&field);
}

#[test]
fn culled_field_renders_only_glow() {
    let viewport = Viewport::new(800.0, 600.0);
    let config = FieldConfig::sphere()
        .with_volume(Volume::Viewport)
        .with_count(CountPolicy::Fixed(40))
        .with_boundary(Boundary::None)
        .with_follow(None);
    let mut field = ParticleField::new(config, Some(17));
    field.seed(&viewport, Theme::Dark);

    // just past the 50 px culling margin on every side
    for (i, p) in field.particles_mut().iter_mut().enumerate() {
        p.position = match i % 4 {
            0 => Vec3::new(-51.0, 300.0, 0.0),
            1 => Vec3::new(851.0, 300.0, 0.0),
            2 => Vec3::new(400.0, -51.0, 0.0),
            _ => Vec3::new(400.0, 651.0, 0.0),
        };
        p.velocity = Vec3::ZERO;
    }

    tick(&mut field, 0, viewport);
    assert!(field.particles().iter().all(|p| !p.visible));
    assert!(field.links().is_empty());
    assert_glow_only(&field);
}
