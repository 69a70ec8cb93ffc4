use std::collections::BTreeSet;

use tabflow_core::error::Result;
use tabflow_core::field::{Field, KeySpec};
use tabflow_core::sortkey::KeyComparator;
use tabflow_core::table::{Header, RowIter, SharedTable, Table};
use tabflow_core::value::Value;
use tracing::debug;

use crate::sort::{SortOptions, Sorter};
use crate::traits::{step_iter, Grouper, ReduceFn};

/// Cross-tabulation: one row per distinct `f1`, one column per distinct
/// `f2`, cells aggregating the `f3` values of each `(f1, f2)` pair.
///
/// The first pass scans the whole source for the distinct `f2` values
/// (sorted); the second reads it sorted by `(f1, f2)`. Pairs that never
/// occur are filled with `missing`.
pub struct PivotView {
    source: SharedTable,
    f1: Field,
    f2: Field,
    f3: Field,
    aggfun: ReduceFn,
    missing: Value,
    sorter: Sorter,
}

impl PivotView {
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }

    pub fn options(mut self, opts: SortOptions) -> Self {
        let presorted = self.sorter.is_presorted();
        self.sorter = Sorter::new(opts).presorted(presorted);
        self
    }

    pub fn presorted(mut self, presorted: bool) -> Self {
        self.sorter = self.sorter.presorted(presorted);
        self
    }
}

impl Table for PivotView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let i1 = self.f1.resolve(it.header())?;
        let i2 = self.f2.resolve(it.header())?;
        let i3 = self.f3.resolve(it.header())?;
        let f1_name = it.header()[i1].clone();
        let mut columns = BTreeSet::new();
        for row in it {
            columns.insert(row?.get(i2).cloned().unwrap_or(Value::Null));
        }
        let columns: Vec<Value> = columns.into_iter().collect();
        let mut header: Header = vec![f1_name];
        header.extend(columns.iter().map(Value::to_field_name));
        debug!(columns = columns.len(), "pivot discovered columns");

        let key = KeySpec::new([i1, i2]);
        let sorted = self.sorter.iter(self.source.as_ref(), &key, false)?;
        let by_f1 = KeyComparator::new(&KeySpec::new([i1]), sorted.header(), false)?;
        let mut groups = Grouper::new(sorted, by_f1);
        let aggfun = self.aggfun.clone();
        let missing = self.missing.clone();

        let rows = step_iter(move || {
            let Some(group) = groups.next_group()? else {
                return Ok(None);
            };
            let mut out = Vec::with_capacity(columns.len() + 1);
            out.push(group[0].get(i1).cloned().unwrap_or(Value::Null));
            let mut cells = group.iter().peekable();
            for col in &columns {
                let mut values = Vec::new();
                while let Some(row) = cells.next_if(|r| r.get(i2).unwrap_or(&Value::Null) == col) {
                    values.push(row.get(i3).cloned().unwrap_or(Value::Null));
                }
                out.push(if values.is_empty() {
                    missing.clone()
                } else {
                    aggfun(&values)?
                });
            }
            Ok(Some(out))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn pivot(
    source: SharedTable,
    f1: impl Into<Field>,
    f2: impl Into<Field>,
    f3: impl Into<Field>,
    aggfun: ReduceFn,
) -> PivotView {
    PivotView {
        source,
        f1: f1.into(),
        f2: f2.into(),
        f3: f3.into(),
        aggfun,
        missing: Value::Null,
        sorter: Sorter::new(SortOptions::default()),
    }
}
