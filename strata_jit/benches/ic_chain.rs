//! Inline Cache Chain Benchmarks
//!
//! Measures the cost of the hot path against the fallback path.
//!
//! # Key Metrics
//!
//! - Monomorphic chain hit: one guard, no fallback entry
//! - Megamorphic hit: key-only lookup after the chain collapsed
//! - Fallback dispatch: generic operation plus attach bookkeeping
//! - Reset: unlink every stub of a populated entry

#[path = "../tests/support/mod.rs"]
#[allow(dead_code)]
mod support;

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use strata_core::{ObjectRef, Value};
use strata_gc::NoBarrier;
use strata_jit::ic::{IcConfig, IcInputs, IcSite, Op};
use support::TestRuntime;

// =============================================================================
// Chain Hits
// =============================================================================

fn bench_get_prop_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_prop_hit");

    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::named(0, Op::GetProp, "x")]);
    let obj = rt.object(&[("x", Value::Int32(1))]);
    let inputs = IcInputs::unary(Value::Object(obj));
    let _ = rt.run(&script, 0, &inputs);
    group.bench_function("monomorphic", |b| {
        b.iter(|| black_box(rt.run(&script, 0, black_box(&inputs))))
    });

    // Enough shapes to exhaust the default stub limit.
    let mut rt = TestRuntime::new();
    let script = rt.script(&[IcSite::named(0, Op::GetProp, "x")]);
    let objects: Vec<ObjectRef> = (0..8)
        .map(|i| rt.distinct_object(i, Value::Int32(i as i32)))
        .collect();
    let inputs: Vec<IcInputs> = objects
        .iter()
        .map(|obj| IcInputs::unary(Value::Object(*obj)))
        .collect();
    for input in &inputs {
        let _ = rt.run(&script, 0, input);
    }
    group.bench_function("megamorphic", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % inputs.len();
            black_box(rt.run(&script, 0, &inputs[i]))
        })
    });

    group.finish();
}

// =============================================================================
// Fallback Dispatch
// =============================================================================

fn bench_fallback(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback");

    for op in [Op::Add, Op::Lt, Op::Not] {
        let mut rt = TestRuntime::new();
        let script = rt.script_with(&[IcSite::new(0, op)], IcConfig::disabled());
        let inputs = match op {
            Op::Not => IcInputs::unary(Value::Int32(3)),
            _ => IcInputs::binary(Value::Int32(3), Value::Int32(4)),
        };
        group.bench_with_input(BenchmarkId::new("generic", format!("{op:?}")), &inputs, |b, inputs| {
            b.iter(|| black_box(rt.run(&script, 0, inputs)))
        });
    }

    group.finish();
}

// =============================================================================
// Reset
// =============================================================================

fn bench_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset");

    let mut rt = TestRuntime::new();
    let objects: Vec<ObjectRef> = (0..6)
        .map(|i| rt.distinct_object(i, Value::Null))
        .collect();

    group.bench_function("six_stubs", |b| {
        b.iter_batched(
            || {
                let script = rt.script(&[IcSite::named(0, Op::GetProp, "x")]);
                for obj in &objects {
                    let _ = rt.run(&script, 0, &IcInputs::unary(Value::Object(*obj)));
                }
                script
            },
            |script| {
                script.reset(&mut NoBarrier);
                script
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_get_prop_hit, bench_fallback, bench_reset);
criterion_main!(benches);
