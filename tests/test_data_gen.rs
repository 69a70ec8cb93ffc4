//! Deterministic table generators shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tabflow_core::hash::Hash256;
use tabflow_core::row;
use tabflow_core::table::{MemTable, Row, RowIter, SharedTable, Table};
use tabflow_core::Result;
use tabflow_core::value::Value;

/// xorshift64*, enough to scatter test data without a rand dependency.
pub struct Gen(u64);

impl Gen {
    pub fn new(seed: u64) -> Self {
        Gen(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// `(k, n, s)` rows: a small key domain, mixed numeric/null values and
/// the occasional short row.
pub fn random_table(rows: usize, seed: u64) -> SharedTable {
    let mut g = Gen::new(seed);
    let mut data = vec![row!["k", "n", "s"]];
    for i in 0..rows {
        let k = Value::from(format!("key-{}", g.below(7)));
        let n = match g.below(10) {
            0 => Value::Null,
            1 => Value::Float(g.below(100) as f64 / 4.0),
            _ => Value::Int(g.below(50) as i64),
        };
        if g.below(20) == 0 {
            data.push(vec![k, n]);
        } else {
            data.push(vec![k, n, Value::from(format!("s{i}"))]);
        }
    }
    MemTable::from_rows(data).shared()
}

/// Rows of a small integer domain, so duplicates are common.
pub fn small_domain(rows: usize, seed: u64) -> SharedTable {
    let mut g = Gen::new(seed);
    let data = (0..rows)
        .map(|_| row![g.below(5) as i64, g.below(3) as i64])
        .collect();
    MemTable::new(["a", "b"], data).shared()
}

pub fn multiset(rows: &[Row]) -> BTreeMap<Row, usize> {
    let mut out = BTreeMap::new();
    for r in rows {
        *out.entry(r.clone()).or_insert(0) += 1;
    }
    out
}

pub fn create_temp_spill_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("tabflow-test-")
        .tempdir()
        .expect("temp dir")
}

/// Counts how many passes were opened over the wrapped table.
pub struct Counting {
    inner: MemTable,
    passes: AtomicUsize,
}

impl Counting {
    pub fn new(inner: SharedTable) -> Arc<Self> {
        Arc::new(Self {
            inner: MemTable::collect(inner.as_ref()).expect("collect"),
            passes: AtomicUsize::new(0),
        })
    }

    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }
}

impl Table for Counting {
    fn iter(&self) -> Result<RowIter<'_>> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        self.inner.iter()
    }

    fn cachetag(&self) -> Result<Hash256> {
        self.inner.cachetag()
    }
}
