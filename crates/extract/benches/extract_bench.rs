//! Benchmarks for constraint extraction.
//!
//! Measures full extraction and face-pair matching at various scales.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use u_layout_core::{ContentDump, ExtractConfig, FloorDump};
use u_layout_extract::body::match_containers;
use u_layout_extract::{ConstraintsExtractor, SpatialContainer};

fn bedroom_items(n: usize) -> Vec<ContentDump> {
    let mut dumps = Vec::with_capacity(n + 1);
    dumps.push(
        ContentDump::new("bed", "furniture/bed", [2.0, 2.0, 0.5])
            .with_position(10.0, 18.0, 0.0)
            .with_tag("bed"),
    );
    for i in 0..n {
        let x = 1.0 + (i as f64 * 1.7) % 18.0;
        let y = 1.0 + (i as f64 * 2.3) % 14.0;
        let kind = if i % 3 == 0 { "nightstand" } else { "lamp" };
        let mut dump = ContentDump::new(format!("item-{}", i), kind, [0.5, 0.4, 0.6])
            .with_position(x, y, 0.0);
        if i % 4 == 0 {
            dump = dump.with_host_tag("bed");
        }
        if i % 5 == 0 {
            dump = dump.with_group_type(format!("Zone{}", i % 3));
        }
        dumps.push(dump);
    }
    dumps
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    group.sample_size(10);
    let floor = FloorDump::rectangle("room", "Bedroom", 20.0, 20.0, 2.8);

    for &n in &[10, 50, 200] {
        let dumps = bedroom_items(n);
        for parallel in [false, true] {
            let extractor =
                ConstraintsExtractor::new(ExtractConfig::default().with_parallel_regions(parallel));
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, n), &dumps, |b, d| {
                b.iter(|| {
                    let result = extractor.execute_by_dumps(black_box(&floor), black_box(d));
                    black_box(result)
                })
            });
        }
    }
    group.finish();
}

fn bench_match_containers(c: &mut Criterion) {
    let bed = SpatialContainer::from_content(&ContentDump::new("bed", "bed", [2.0, 2.0, 0.5]));
    let ns = SpatialContainer::from_content(
        &ContentDump::new("ns", "nightstand", [0.5, 0.5, 0.5])
            .with_position(1.55, 0.75, 0.0)
            .with_z_rotation(15.0),
    );
    let config = ExtractConfig::default();
    c.bench_function("match_containers", |b| {
        b.iter(|| match_containers(black_box(&ns), black_box(&bed), &config))
    });
}

criterion_group!(benches, bench_extraction, bench_match_containers);
criterion_main!(benches);
