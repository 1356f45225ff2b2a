// This file contains benchmarks for the purpose of guarding against
// performance regressions. To run them, use `cargo bench`.

use steersky::config::BuildParameters;
use steersky::env_image::EnvImage;
use steersky::rng::RngState;
use steersky::spectrum::Spectrum;
use steersky::steerable::SteerableValue;
use steersky::tree::{build_balanced, pick};
use steersky::triangulate::build;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn checkerboard_image(width: u32, height: u32) -> EnvImage {
    // A uniform map is enough to drive the triangulation builder and tree
    // through a realistic number of subdivisions and picks without needing
    // an on-disk asset for a microbenchmark.
    steersky::env_image::test_support::uniform(width, height, Spectrum::new(0.6, 0.4, 0.2))
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Performance regression tests");
    group.sample_size(10);

    let em_small = checkerboard_image(64, 32);
    let params_shallow = BuildParameters { min_subdiv: 2, max_subdiv: 3, ..Default::default() };
    group.bench_function("triangulation build (shallow, 64x32 EM)", |b| {
        b.iter(|| black_box(build(&em_small, &params_shallow)))
    });

    let em_large = checkerboard_image(256, 128);
    let params_deep = BuildParameters { min_subdiv: 3, max_subdiv: 5, ..Default::default() };
    group.bench_function("triangulation build (deep, 256x128 EM)", |b| {
        b.iter(|| black_box(build(&em_large, &params_deep)))
    });

    let (_storage, leaves) = build(&em_large, &params_deep);
    let tree = build_balanced(leaves).expect("non-empty leaf set");
    let coeffs = SteerableValue::clamped_cosine(glam::Vec3::Z, true);
    group.bench_function("tree pick (10k draws)", |b| {
        b.iter(|| {
            let mut rng = RngState::new(1, 0);
            for _ in 0..10_000 {
                black_box(pick(&tree, &coeffs, rng.gen_1d()));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
