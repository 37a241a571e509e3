//! Range and matrix expansion growth.
//!
//! Run with: cargo bench --package tinct_build

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use tinct_build::{apply_patch, expand_ranges, ApplyOptions, Patch, PatchOperation};

fn bench_serial_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_ranges_serial");
    for size in [10usize, 100, 1_000, 10_000] {
        let input = format!("/space/$[[1..{size}]]");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| expand_ranges(black_box(input)))
        });
    }
    group.finish();
}

fn bench_range_product(c: &mut Criterion) {
    c.bench_function("expand_ranges_product", |b| {
        b.iter(|| expand_ranges(black_box("/$[[x3s..x3l]]/$[[1..9]]/$[[sm..lg]]")))
    });
}

fn scale(size: usize) -> Value {
    let steps: serde_json::Map<String, Value> =
        (1..=size).map(|i| (i.to_string(), json!(format!("{}px", i * 4)))).collect();
    json!({ "scale": steps })
}

fn bench_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_patch_matrix");
    for size in [4usize, 16, 64] {
        let patch = Patch::new(vec![PatchOperation::add(
            "/space/${{ matrix.step }}/${{ matrix.axis }}",
            "${{ scale.${{ matrix.step }} }}",
        )])
        .with_matrix("step", vec![format!("$[[1..{size}]]").as_str().into()])
        .with_matrix("axis", vec!["x".into(), "y".into()]);
        let doc = scale(size);

        group.throughput(Throughput::Elements(size as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| apply_patch(black_box(doc.clone()), &patch, ApplyOptions::default()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_serial_ranges, bench_range_product, bench_matrix);
criterion_main!(benches);
