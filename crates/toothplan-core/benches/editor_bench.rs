//! # Editor Benchmarks
//!
//! Performance benchmarks for toothplan-core organizer operations.
//!
//! Run with: `cargo bench -p toothplan-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use toothplan_core::{
    Finding, IdAllocator, NoOverrides, OrganizerConfig, StageEditor, StageSerializer,
    StageValidator,
};

const TREATMENTS: [&str; 6] = [
    "filling",
    "crown",
    "root-canal-treatment",
    "extraction",
    "scale-and-clean",
    "implant",
];
const CONDITIONS: [&str; 4] = ["abscess", "caries", "gingivitis", "fracture"];

/// N findings spread over the adult dentition.
fn findings(size: usize) -> Vec<Finding> {
    (0..size)
        .map(|i| {
            Finding::new(
                (11 + i % 38).to_string(),
                CONDITIONS[i % CONDITIONS.len()],
                TREATMENTS[i % TREATMENTS.len()],
            )
        })
        .collect()
}

fn editor(size: usize) -> StageEditor {
    StageEditor::from_findings(
        Arc::new(OrganizerConfig::default()),
        Arc::new(NoOverrides),
        &findings(size),
    )
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_default_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("default_layout");
    let config = OrganizerConfig::default();

    for size in [10, 100, 1000].iter() {
        let input = findings(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let serializer = StageSerializer::new(&config);
                let mut ids = IdAllocator::new();
                let items = serializer.findings_to_items(input, &mut ids);
                black_box(serializer.default_stages(items, &mut ids))
            });
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    let config = OrganizerConfig::default();

    for size in [10, 100, 1000].iter() {
        let editor = editor(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &editor, |b, editor| {
            b.iter(|| black_box(StageValidator::new(&config).validate(editor.stages())));
        });
    }

    group.finish();
}

fn bench_move_item(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_item");

    for size in [10, 100, 1000].iter() {
        let base = editor(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &base, |b, base| {
            b.iter_batched(
                || base.clone(),
                |mut editor| {
                    let from = editor.stages()[0].id.clone();
                    let to = editor.stages()[editor.stages().len() - 1].id.clone();
                    if let Some(item) = editor.stages()[0].items.first().map(|i| i.id.clone()) {
                        editor.move_item_between_stages(&item, &from, &to, 0);
                    }
                    black_box(editor)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_default_layout,
    bench_validate,
    bench_move_item
);
criterion_main!(benches);
