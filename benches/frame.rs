//! Benchmarks for per-frame CPU work.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glint::connections::{find_connections, ConnectionLimits};
use glint::prelude::*;
use glint::render::gpu::{as_bytes, pack_points};

const VIEWPORT: Viewport = Viewport {
    width: 1280.0,
    height: 720.0,
    device_pixel_ratio: 1.0,
};

fn bench_preset_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("preset_frame");

    for name in PRESETS {
        group.bench_with_input(BenchmarkId::from_parameter(name), name, |b, name| {
            let scene = SceneConfig::preset(name).unwrap().with_seed(1);
            let mut effect = scene.build();
            effect.seed(&VIEWPORT, scene.theme);
            let pointer = Pointer::default();
            let mut canvas = DrawList::new();
            let mut frame = 0u64;

            b.iter(|| {
                let ctx = FrameContext::at(frame as f32 * effect.time_step(), frame, VIEWPORT);
                effect.update(&ctx, &pointer);
                canvas.reset();
                effect.render(&mut canvas);
                frame += 1;
                black_box(canvas.len())
            })
        });
    }

    group.finish();
}

fn bench_connections(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_connections");
    let limits = ConnectionLimits {
        max_distance: 80.0,
        ..ConnectionLimits::default()
    };

    for count in [50usize, 200, 500] {
        let mut spawn = SpawnContext::new(7);
        let points: Vec<Vec3> = (0..count).map(|_| spawn.random_in_sphere(300.0)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| black_box(find_connections(points, &limits)))
        });
    }

    group.finish();
}

fn bench_pack_points(c: &mut Criterion) {
    let config = FieldConfig::sphere().with_count(CountPolicy::Fixed(2000));
    let mut field = ParticleField::new(config, Some(3));
    field.seed(&VIEWPORT, Theme::Light);

    c.bench_function("pack_points_2000", |b| {
        b.iter(|| {
            let vertices = pack_points(field.particles());
            black_box(as_bytes(&vertices).len())
        })
    });
}

criterion_group!(benches, bench_preset_frame, bench_connections, bench_pack_points);
criterion_main!(benches);
