//! Per-frame processing benchmarks
//!
//! One frame must be sampled, filtered and gated well inside a 33 ms frame
//! period, even on low-end phones.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ppg_core::{ChromaPlane, Frame, SamplingStrategy};
use ppg_processing::{FilterBank, FilterConfig, FrameProcessor, FrameSampler, ProcessingConfig};

fn frame(width: usize, height: usize, pixel_stride: usize) -> Frame {
    let cw = width / 2;
    let ch = height / 2;
    let row_stride = cw * pixel_stride;
    let chroma: Vec<u8> = (0..row_stride * ch).map(|i| 160 + (i % 20) as u8).collect();

    Frame::new(
        1,
        width,
        height,
        vec![60; width * height],
        ChromaPlane {
            data: chroma,
            row_stride,
            pixel_stride,
        },
    )
    .unwrap()
}

fn bench_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler");
    let sampler = FrameSampler::default();

    for &(width, height) in &[(120, 160), (480, 640), (1080, 1920)] {
        let f = frame(width, height, 2);
        let label = format!("{}x{}", width, height);

        group.bench_with_input(BenchmarkId::new("plane_averages", &label), &f, |b, f| {
            b.iter(|| black_box(sampler.plane_averages(black_box(f))));
        });
        group.bench_with_input(BenchmarkId::new("four_zone", &label), &f, |b, f| {
            b.iter(|| black_box(sampler.four_zone_averages(black_box(f))));
        });
        group.bench_with_input(BenchmarkId::new("center_box", &label), &f, |b, f| {
            b.iter(|| black_box(sampler.center_box_average(black_box(f))));
        });
    }

    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut bank = FilterBank::new(4, FilterConfig::default());
    let zones = [-170.0f32, -169.5, -170.2, -170.1];

    c.bench_function("filter_bank_4_zones", |b| {
        b.iter(|| black_box(bank.apply(black_box(&zones))));
    });
}

fn bench_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor");
    let f = frame(120, 160, 1);

    for strategy in [SamplingStrategy::FourZoneFiltered, SamplingStrategy::CenterBoxRaw] {
        let mut processor = FrameProcessor::new(ProcessingConfig {
            strategy,
            ..Default::default()
        })
        .unwrap();

        group.bench_function(strategy.tag(), |b| {
            b.iter(|| black_box(processor.process(black_box(&f))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sampler, bench_filters, bench_processor);
criterion_main!(benches);
