//! External sort: run generation plus a streaming k-way merge.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tabflow_core::error::{Error, Result};
use tabflow_core::field::KeySpec;
use tabflow_core::sortkey::{KeyComparator, SortKey};
use tabflow_core::table::{Header, Row, RowIter, Table};
use tabflow_mem::{RunFile, RunReader};
use tracing::{debug, trace};

use super::run::{RunGenConfig, RunGenerator};

/// A fully sorted copy of a table: spilled runs plus an in-memory tail.
///
/// Immutable once built; iterations share it through an `Arc` and keep
/// their cursor state to themselves.
pub struct SortedData {
    header: Header,
    comparator: Arc<KeyComparator>,
    runs: Vec<RunFile>,
    tail: Vec<Row>,
}

impl SortedData {
    /// Already-sorted rows held in memory.
    pub fn in_memory(header: Header, rows: Vec<Row>) -> Self {
        Self {
            header,
            comparator: Arc::new(KeyComparator::whole_row(false)),
            runs: Vec::new(),
            tail: rows,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn spilled_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn len(&self) -> u64 {
        self.runs.iter().map(RunFile::rows).sum::<u64>() + self.tail.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open an independent pass over the sorted rows.
    pub fn rows(self: &Arc<Self>) -> Result<RowIter<'static>> {
        let header = self.header.clone();
        if self.runs.is_empty() {
            let data = Arc::clone(self);
            let mut pos = 0;
            let rows = std::iter::from_fn(move || {
                let row = data.tail.get(pos)?.clone();
                pos += 1;
                Some(Ok(row))
            });
            return Ok(RowIter::new(header, rows));
        }
        Ok(RowIter::new(header, MergeIter::open(Arc::clone(self))?))
    }
}

/// Read `source` to the end and sort it.
pub fn sort_table(
    source: &dyn Table,
    key: &KeySpec,
    reverse: bool,
    config: RunGenConfig,
) -> Result<SortedData> {
    let it = source.iter()?;
    let header = it.header().clone();
    let comparator = KeyComparator::new(key, &header, reverse)?;
    let mut gen = RunGenerator::new(config, comparator.clone());
    for row in it {
        gen.push(row?)?;
    }
    let (runs, tail) = gen.finalize();
    debug!(
        runs = runs.len(),
        tail_rows = tail.len(),
        "sorted source"
    );
    Ok(SortedData {
        header,
        comparator: Arc::new(comparator),
        runs,
        tail,
    })
}

/// Entry in the merge heap.
///
/// Ordered by key, then by source index so ties come out in the order the
/// rows were first seen (earlier runs first, the in-memory tail last).
/// Reversed for min-heap behavior.
struct MergeEntry {
    key: SortKey,
    source: usize,
    row: Row,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Streaming k-way merge over every run plus the tail.
///
/// Holds one decoded block per run and one pending row per source.
struct MergeIter {
    data: Arc<SortedData>,
    readers: Vec<RunReader>,
    tail_pos: usize,
    heap: BinaryHeap<MergeEntry>,
    started: bool,
    failed: bool,
}

impl MergeIter {
    fn open(data: Arc<SortedData>) -> Result<Self> {
        let readers = data
            .runs
            .iter()
            .map(|r| r.open().map_err(|e| Error::Spill(format!("spill open: {e}"))))
            .collect::<Result<Vec<_>>>()?;
        debug!(fan_in = readers.len() + 1, "merging sorted runs");
        let heap = BinaryHeap::with_capacity(readers.len() + 1);
        Ok(Self {
            data,
            readers,
            tail_pos: 0,
            heap,
            started: false,
            failed: false,
        })
    }

    /// Pull the next row of `source` into the heap.
    fn refill(&mut self, source: usize) -> Result<()> {
        let next = if source < self.readers.len() {
            self.readers[source]
                .next()
                .transpose()
                .map_err(|e| Error::Spill(format!("spill read: {e}")))?
        } else {
            let row = self.data.tail.get(self.tail_pos).cloned();
            self.tail_pos += 1;
            row
        };
        if let Some(row) = next {
            let key = self.data.comparator.key_of(&row);
            self.heap.push(MergeEntry { key, source, row });
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Row>> {
        if !self.started {
            self.started = true;
            for source in 0..=self.readers.len() {
                self.refill(source)?;
            }
        }
        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        trace!(source = entry.source, "merge advance");
        self.refill(entry.source)?;
        Ok(Some(entry.row))
    }
}

impl Iterator for MergeIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
