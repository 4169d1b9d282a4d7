//! Criterion benchmarks for the request planning hot path.
//!
//! Benchmarks:
//! 1. Param normalization of a mixed mapping
//! 2. Query classification across the four shapes
//! 3. Historical and career splitting

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use gridstats_core::{
    classify, normalize, FixedClock, ParamValue, Params, Requirements, Splitter,
};

fn raw_params() -> Params {
    let mut params = Params::new();
    params.insert("season".into(), ParamValue::from(" 2021 "));
    params.insert("driver".into(), ParamValue::list(["Max Verstappen", "Lewis Hamilton"]));
    params.insert("circuit".into(), ParamValue::from("  monza "));
    params.insert("round".into(), ParamValue::Null);
    params.insert("query".into(), ParamValue::from("fastest laps"));
    params
}

fn bench_normalize(c: &mut Criterion) {
    let params = raw_params();
    c.bench_function("normalize_mixed", |b| b.iter(|| normalize(black_box(&params))));
}

fn bench_classify(c: &mut Criterion) {
    let shapes = [
        ("historical", Requirements::new("RESULTS.race").param("year", "since 2010")),
        ("career", Requirements::new("DRIVERS.specific").param("query", "all time stats")),
        (
            "multi_entity",
            Requirements::new("RESULTS.race").param("driver", ParamValue::list(["a", "b", "c"])),
        ),
        ("single", Requirements::new("RESULTS.race").param("year", 2023)),
    ];

    let mut group = c.benchmark_group("classify");
    for (name, req) in &shapes {
        group.bench_with_input(BenchmarkId::from_parameter(name), req, |b, req| {
            b.iter(|| classify(black_box(&req.params)))
        });
    }
    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let splitter = Splitter::new(Arc::new(FixedClock(2024)));

    let mut group = c.benchmark_group("split_historical");
    for since in [2019, 2000, 1950] {
        let req = Requirements::new("RESULTS.race").param("year", format!("since {since}"));
        group.bench_with_input(BenchmarkId::from_parameter(since), &req, |b, req| {
            b.iter(|| splitter.split_historical(black_box(req)))
        });
    }
    group.finish();

    let req = Requirements::new("DRIVERS.specific")
        .param("driver", "alonso")
        .param("query", "career");
    c.bench_function("split_career", |b| {
        b.iter(|| Splitter::split_career(black_box(&req)))
    });
}

criterion_group!(benches, bench_normalize, bench_classify, bench_split);
criterion_main!(benches);
