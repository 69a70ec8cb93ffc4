//! melt / recast / pivot / unpack scenarios

mod test_data_gen;

use std::sync::Arc;

use tabflow_core::table::{MemTable, Row, SharedTable, Table};
use tabflow_core::{row, Value};
use tabflow_operators::aggregate::Agg;
use tabflow_operators::reshape::{melt, pivot, recast, transpose, unpackdict};
use tabflow_operators::sort::SortOptions;
use test_data_gen::{create_temp_spill_dir, multiset};

fn collect(t: &dyn Table) -> Vec<Row> {
    t.iter().unwrap().collect_rows().unwrap()
}

fn measurements() -> SharedTable {
    MemTable::from_rows(vec![
        row!["id", "time", "height", "weight"],
        row![1, 11, 66.4, 12.2],
        row![2, 16, 53.2, 17.3],
    ])
    .shared()
}

#[test]
fn test_melt_scenario() {
    let view = melt(measurements()).key(["id", "time"]);
    let it = view.iter().unwrap();
    assert_eq!(it.header(), &vec!["id", "time", "variable", "value"]);
    assert_eq!(
        it.collect_rows().unwrap(),
        vec![
            row![1, 11, "height", 66.4],
            row![1, 11, "weight", 12.2],
            row![2, 16, "height", 53.2],
            row![2, 16, "weight", 17.3],
        ]
    );
}

#[test]
fn test_melt_then_recast_round_trips() {
    let melted: SharedTable = Arc::new(melt(measurements()).key(["id", "time"]));
    let back = recast(melted).key(["id", "time"]);
    let it = back.iter().unwrap();
    assert_eq!(it.header(), &vec!["id", "time", "height", "weight"]);
    let rows = it.collect_rows().unwrap();
    assert_eq!(multiset(&rows), multiset(&collect(measurements().as_ref())));
}

#[test]
fn test_recast_round_trip_through_spilled_sort() {
    let dir = create_temp_spill_dir();
    let data: Vec<Row> = (0..150)
        .map(|i| row![i, format!("n{i}"), i % 4, (i * 7) % 11])
        .collect();
    let t = MemTable::new(["id", "name", "a", "b"], data).shared();
    let melted: SharedTable = Arc::new(melt(Arc::clone(&t)).key(["id", "name"]));
    let opts = SortOptions::default().buffer_rows(Some(17)).spill_dir(dir.path());
    let back = recast(melted).key(["id", "name"]).options(opts);
    assert_eq!(multiset(&collect(&back)), multiset(&collect(t.as_ref())));
}

#[test]
fn test_recast_reduces_repeated_pairs() {
    let long = MemTable::from_rows(vec![
        row!["id", "variable", "value"],
        row![1, "x", 2],
        row![1, "x", 5],
        row![1, "y", 1],
        row![2, "y", 4],
    ])
    .shared();
    let rows = collect(&recast(Arc::clone(&long)).key(["id"]));
    assert_eq!(rows[0], row![1, Value::List(row![2, 5]), 1]);
    assert_eq!(rows[1], row![2, Value::Null, 4]);

    let summed = collect(&recast(long).key(["id"]).reducer("x", Agg::Sum.reducer()));
    assert_eq!(summed[0], row![1, 7, 1]);
}

fn sales() -> SharedTable {
    MemTable::from_rows(vec![
        row!["region", "gender", "style", "units"],
        row!["east", "boy", "tee", 12],
        row!["east", "boy", "golf", 14],
        row!["east", "boy", "fancy", 7],
        row!["east", "girl", "tee", 3],
        row!["east", "girl", "golf", 8],
        row!["east", "girl", "fancy", 18],
        row!["west", "boy", "tee", 12],
        row!["west", "boy", "golf", 15],
        row!["west", "boy", "fancy", 8],
        row!["west", "girl", "tee", 6],
        row!["west", "girl", "golf", 16],
        row!["west", "girl", "fancy", 1],
        row!["south", "boy", "tee", 4],
    ])
    .shared()
}

#[test]
fn test_pivot_cross_tab() {
    let view = pivot(sales(), "region", "gender", "units", Agg::Sum.reducer()).missing(Value::from(0));
    let it = view.iter().unwrap();
    assert_eq!(it.header(), &vec!["region", "boy", "girl"]);
    assert_eq!(
        it.collect_rows().unwrap(),
        vec![row!["east", 33, 29], row!["south", 4, 0], row!["west", 35, 23]]
    );
}

#[test]
fn test_pivot_spilled_matches_in_memory() {
    let dir = create_temp_spill_dir();
    let in_memory = collect(&pivot(sales(), "style", "region", "units", Agg::Max.reducer()));
    let spilled = pivot(sales(), "style", "region", "units", Agg::Max.reducer())
        .options(SortOptions::default().buffer_rows(Some(3)).spill_dir(dir.path()));
    assert_eq!(collect(&spilled), in_memory);
    assert_eq!(in_memory[0], row!["fancy", 18, Value::Null, 8]);
}

#[test]
fn test_transpose_and_unpackdict() {
    let t = transpose(measurements());
    let it = t.iter().unwrap();
    assert_eq!(it.header(), &vec!["id", "1", "2"]);
    assert_eq!(it.collect_rows().unwrap()[0], row!["time", 11, 16]);

    let attrs = |pairs: &[(&str, i64)]| {
        Value::Map(pairs.iter().map(|(k, v)| (k.to_string(), Value::Int(*v))).collect())
    };
    let nested = MemTable::from_rows(vec![
        row!["id", "attrs"],
        row![1, attrs(&[("x", 1)])],
        row![2, attrs(&[("y", 2), ("x", 3)])],
    ])
    .shared();
    let it_view = unpackdict(nested, "attrs");
    let it = it_view.iter().unwrap();
    assert_eq!(it.header(), &vec!["id", "x", "y"]);
    assert_eq!(it.collect_rows().unwrap(), vec![row![1, 1, Value::Null], row![2, 3, 2]]);
}
