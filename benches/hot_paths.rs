use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use traceoor::agg::buckets::{BucketTables, LquantizeParams};
use traceoor::agg::translate::Translator;
use traceoor::config::EngineConfig;

fn warmed_translator() -> Translator {
    let translator = Translator::new(EngineConfig::default(), Arc::new(BucketTables::new()));
    translator
        .translate("quantize()", &[64, 1])
        .expect("warm quantize table");
    translator
        .translate("lquantize()", &[100, 10, 3])
        .expect("warm lquantize table");
    translator
}

fn bench_bucket_tables(c: &mut Criterion) {
    let config = EngineConfig::default();

    c.bench_function("bucket_tables/quantize_build", |b| {
        b.iter(|| {
            let tables = BucketTables::new();
            black_box(tables.quantize(black_box(&config)).len())
        })
    });

    c.bench_function("bucket_tables/quantize_cache_hit", |b| {
        let tables = BucketTables::new();
        tables.quantize(&config);
        b.iter(|| black_box(tables.quantize(black_box(&config)).len()))
    });

    c.bench_function("bucket_tables/lquantize_build", |b| {
        let params = LquantizeParams::from_raw(0, 16, 256).expect("params");
        b.iter(|| {
            let tables = BucketTables::new();
            black_box(tables.lquantize(black_box(&config), params).len())
        })
    });

    c.bench_function("bucket_tables/lquantize_cache_hit", |b| {
        let tables = BucketTables::new();
        let params = LquantizeParams::from_raw(0, 16, 256).expect("params");
        tables.lquantize(&config, params);
        b.iter(|| black_box(tables.lquantize(black_box(&config), params).len()))
    });
}

fn bench_translate(c: &mut Criterion) {
    let translator = warmed_translator();
    let quantize_data: Vec<i64> = (54_i64..74).flat_map(|i| [i, 1_000 - i]).collect();
    let lquantize_data: Vec<i64> = [100_i64, 10, 3]
        .into_iter()
        .chain((0_i64..5).flat_map(|i| [i, 40 + i]))
        .collect();
    let scalar_data = [42_i64];

    c.bench_function("translate/quantize_pairs", |b| {
        b.iter(|| {
            translator
                .translate(black_box("quantize()"), black_box(&quantize_data))
                .expect("quantize")
        })
    });

    c.bench_function("translate/lquantize_pairs", |b| {
        b.iter(|| {
            translator
                .translate(black_box("lquantize()"), black_box(&lquantize_data))
                .expect("lquantize")
        })
    });

    c.bench_function("translate/scalar_passthrough", |b| {
        b.iter(|| {
            translator
                .translate(black_box("count()"), black_box(&scalar_data))
                .expect("count")
        })
    });
}

fn bench_suite(c: &mut Criterion) {
    bench_bucket_tables(c);
    bench_translate(c);
}

criterion_group!(benches, bench_suite);
criterion_main!(benches);
