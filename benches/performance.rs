use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tabflow_core::table::{MemTable, Row, SharedTable, Table};
use tabflow_core::Value;
use tabflow_operators::aggregate::Agg;
use tabflow_operators::reshape::{melt, recast};
use tabflow_operators::sort::{SortOptions, SortView};
use tabflow_operators::TableExt;

fn make_table(rows: usize) -> SharedTable {
    let mut seed = 0x9e37_79b9_7f4a_7c15u64;
    let data: Vec<Row> = (0..rows)
        .map(|i| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            vec![
                Value::Int((seed % 10_000) as i64),
                Value::from(format!("group-{}", i % 16)),
                Value::Float((seed % 1000) as f64 / 10.0),
            ]
        })
        .collect();
    MemTable::new(["id", "group", "value"], data).shared()
}

fn drain(t: &dyn Table) -> usize {
    t.iter().unwrap().map(|r| r.unwrap()).count()
}

fn bench_sort(c: &mut Criterion) {
    let table = make_table(50_000);
    let dir = tempfile::tempdir().unwrap();
    let mut group = c.benchmark_group("sort");
    group.sample_size(10);

    group.bench_function("in_memory", |b| {
        b.iter(|| {
            let view = SortView::new(Arc::clone(&table), "id").options(SortOptions::in_memory().cache(false));
            drain(&view)
        })
    });

    for buffer in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::new("external", buffer), &buffer, |b, &buffer| {
            b.iter(|| {
                let opts = SortOptions::default()
                    .buffer_rows(Some(buffer))
                    .spill_dir(dir.path())
                    .cache(false);
                drain(&SortView::new(Arc::clone(&table), "id").options(opts))
            })
        });
    }

    group.bench_function("cached", |b| {
        let view = SortView::new(Arc::clone(&table), "id").options(SortOptions::default().spill_dir(dir.path()));
        drain(&view);
        b.iter(|| drain(&view))
    });
    group.finish();
}

fn bench_reshape(c: &mut Criterion) {
    let table = make_table(20_000);
    c.bench_function("melt_recast", |b| {
        b.iter(|| {
            let melted: SharedTable = Arc::new(melt(Arc::clone(&table)).key(["id", "group"]));
            let back = recast(melted)
                .key(["id", "group"])
                .reducer("value", Agg::Mean.reducer());
            drain(&back)
        })
    });
    c.bench_function("distinct_groups", |b| {
        b.iter(|| drain(table.cut(["group"]).distinct().as_ref()))
    });
}

criterion_group!(benches, bench_sort, bench_reshape);
criterion_main!(benches);
