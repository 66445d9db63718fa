#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]
//! Benchmark for grouping and bar-chart aggregation.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trial_viz::prelude::*;

const TERMS: [&str; 6] = ["Nausea", "Rash", "Headache", "Fatigue", "Cough", "Dizziness"];
const ARMS: [&str; 3] = ["Placebo", "Low dose", "High dose"];

fn events(size: usize) -> Vec<AdverseEvent> {
    let subjects: Vec<Arc<Subject>> = (0..size / 4 + 1)
        .map(|i| {
            Arc::new(
                Subject::new(format!("S{i}"))
                    .arm(ARMS[i % ARMS.len()])
                    .age(18 + (i % 70) as i64),
            )
        })
        .collect();
    (0..size)
        .map(|i| {
            // Deterministic spread over subjects, terms and grades
            AdverseEvent::new(i as u64, Arc::clone(&subjects[i % subjects.len()]), TERMS[i % 6])
                .severity(1 + (i % 5) as i64)
        })
        .collect()
}

fn grouping_benchmark(c: &mut Criterion) {
    let catalog = adverse_event_options();
    let settings = ChartSettings::builder()
        .role(ChartRole::XAxis, catalog.get("term").unwrap().clone(), OptionParams::new())
        .role(ChartRole::ColorBy, catalog.get("severity").unwrap().clone(), OptionParams::new())
        .trellis(catalog.get("arm").unwrap().clone(), OptionParams::new())
        .build()
        .unwrap();
    let engine = GroupingEngine::new();

    let mut group = c.benchmark_group("grouping");
    for size in [1_000, 10_000, 100_000] {
        let data = events(size);
        group.bench_with_input(BenchmarkId::new("group", size), &size, |b, _| {
            b.iter(|| engine.group(black_box(&data), &settings).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("bar_chart", size), &size, |b, _| {
            b.iter(|| {
                BarChart::new(BarValue::Subjects)
                    .build(black_box(&data), &settings)
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, grouping_benchmark);
criterion_main!(benches);
