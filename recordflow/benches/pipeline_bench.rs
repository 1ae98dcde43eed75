//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use recordflow::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn orchestrator(stages: usize) -> PipelineOrchestrator {
    let orchestrator = PipelineOrchestrator::new(PipelineConfig::default())
        .unwrap()
        .with_event_sink(Arc::new(NoOpEventSink));

    let mut names = Vec::with_capacity(stages);
    for i in 0..stages {
        let name = format!("stage_{i}");
        let mut options = StageOptions::new();
        if let Some(previous) = names.last() {
            options = options.depends_on(String::clone(previous));
        }
        orchestrator
            .register(
                name.clone(),
                Arc::new(FnStage::new(|ctx: &mut ExecutionContext, _attempt: u32| {
                    for record in &mut ctx.records {
                        let v = record["v"].as_i64().unwrap_or_default();
                        record["v"] = json!(v + 1);
                    }
                    Ok(json!(ctx.records.len()))
                })),
                options,
            )
            .unwrap();
        names.push(name);
    }
    orchestrator.set_pipeline(names).unwrap();
    orchestrator
}

fn records(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({ "v": i })).collect()
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("run");
    for stages in [1, 5, 20] {
        let orchestrator = orchestrator(stages);
        group.bench_with_input(BenchmarkId::from_parameter(stages), &stages, |b, _| {
            b.iter(|| {
                let ctx = runtime.block_on(orchestrator.run(records(1000))).unwrap();
                black_box(ctx.records.len())
            });
        });
    }
    group.finish();

    let orchestrator = orchestrator(5);
    c.bench_function("run_batched_1000x100", |b| {
        b.iter(|| {
            let outcomes = runtime
                .block_on(orchestrator.run_batched(records(1000), Some(100), RunOptions::new()))
                .unwrap();
            black_box(outcomes.len())
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
