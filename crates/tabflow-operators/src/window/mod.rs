//! Views needing lookahead, lookback or whole key groups.

use std::collections::VecDeque;
use std::sync::Arc;

use tabflow_core::error::Result;
use tabflow_core::field::{Field, KeySpec};
use tabflow_core::record::Record;
use tabflow_core::sortkey::KeyComparator;
use tabflow_core::table::{Header, Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

use crate::sort::{SortOptions, Sorter};
use crate::traits::{fields_arc, group_key, pull, step_iter, ContextFn, FoldFn, GroupFn, Grouper};

/// Appends a field computed from `(previous, current, next)` records.
///
/// Previous and next are `None` at the edges; one row of lookahead is held.
pub struct AddFieldUsingContextView {
    source: SharedTable,
    field: String,
    f: ContextFn,
}

impl Table for AddFieldUsingContextView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let mut it = self.source.iter()?;
        let mut header = it.header().clone();
        let fields = fields_arc(&header);
        header.push(self.field.clone());
        let f = Arc::clone(&self.f);
        let record = move |row: Row| Record::new(Arc::clone(&fields), row, Value::Null);

        let mut prev: Option<Record> = None;
        let mut cur: Option<Record> = None;
        let mut started = false;
        let rows = step_iter(move || {
            if !started {
                started = true;
                cur = pull(&mut it)?.map(&record);
            }
            let Some(c) = cur.take() else {
                return Ok(None);
            };
            let next = pull(&mut it)?.map(&record);
            let v = f(prev.as_ref(), &c, next.as_ref())?;
            let mut out = c.padded();
            out.push(v);
            prev = Some(c);
            cur = next;
            Ok(Some(out))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn addfieldusingcontext<F>(source: SharedTable, field: impl Into<String>, f: F) -> AddFieldUsingContextView
where
    F: Fn(Option<&Record>, &Record, Option<&Record>) -> Result<Value> + Send + Sync + 'static,
{
    AddFieldUsingContextView {
        source,
        field: field.into(),
        f: Arc::new(f),
    }
}

/// One `(key, value)` row per key group, the value being a left fold of the
/// group's values (the `value` field, or whole rows as lists) seeded with
/// the first of them.
pub struct FoldView {
    source: SharedTable,
    key: KeySpec,
    f: FoldFn,
    value: Option<Field>,
    sorter: Sorter,
}

impl FoldView {
    /// Fold this field instead of whole rows.
    pub fn value(mut self, field: impl Into<Field>) -> Self {
        self.value = Some(field.into());
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

impl Table for FoldView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let sorted = self.sorter.iter(self.source.as_ref(), &self.key, false)?;
        let key_idx = self.key.indices(sorted.header())?;
        let value_idx = match &self.value {
            Some(f) => Some(f.resolve(sorted.header())?),
            None => None,
        };
        let cmp = KeyComparator::new(&self.key, sorted.header(), false)?;
        let mut groups = Grouper::new(sorted, cmp);
        let f = Arc::clone(&self.f);
        let rows = step_iter(move || {
            let Some(group) = groups.next_group()? else {
                return Ok(None);
            };
            let key = group_key(&key_idx, &group[0]);
            let mut values = group.into_iter().map(|row| match value_idx {
                Some(i) => row.get(i).cloned().unwrap_or(Value::Null),
                None => Value::List(row),
            });
            let mut acc = values.next().unwrap_or_default();
            for v in values {
                acc = f(acc, v)?;
            }
            Ok(Some(vec![key, acc]))
        });
        Ok(RowIter::new(vec!["key".to_string(), "value".to_string()], rows))
    }
}

pub fn fold(source: SharedTable, key: impl Into<KeySpec>, f: FoldFn) -> FoldView {
    FoldView {
        source,
        key: key.into(),
        f,
        value: None,
        sorter: Sorter::new(SortOptions::default()),
    }
}

/// Hands each key group to a callback producing any number of rows under a
/// caller-declared header.
pub struct RowGroupMapView {
    source: SharedTable,
    key: KeySpec,
    f: GroupFn,
    header: Header,
    sorter: Sorter,
}

impl RowGroupMapView {
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

impl Table for RowGroupMapView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let sorted = self.sorter.iter(self.source.as_ref(), &self.key, false)?;
        let key_idx = self.key.indices(sorted.header())?;
        let fields = fields_arc(sorted.header());
        let cmp = KeyComparator::new(&self.key, sorted.header(), false)?;
        let mut groups = Grouper::new(sorted, cmp);
        let f = Arc::clone(&self.f);
        let mut pending: VecDeque<Row> = VecDeque::new();
        let rows = step_iter(move || loop {
            if let Some(row) = pending.pop_front() {
                return Ok(Some(row));
            }
            let Some(group) = groups.next_group()? else {
                return Ok(None);
            };
            let key = group_key(&key_idx, &group[0]);
            let records: Vec<Record> = group
                .into_iter()
                .map(|row| Record::new(Arc::clone(&fields), row, Value::Null))
                .collect();
            pending.extend(f(&key, &records)?);
        });
        Ok(RowIter::new(self.header.clone(), rows))
    }
}

pub fn rowgroupmap<F, I, S>(source: SharedTable, key: impl Into<KeySpec>, f: F, header: I) -> RowGroupMapView
where
    F: Fn(&Value, &[Record]) -> Result<Vec<Row>> + Send + Sync + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RowGroupMapView {
        source,
        key: key.into(),
        f: Arc::new(f),
        header: header.into_iter().map(Into::into).collect(),
        sorter: Sorter::new(SortOptions::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::add;
    use tabflow_core::row;
    use tabflow_core::table::MemTable;

    fn readings() -> SharedTable {
        MemTable::from_rows(vec![
            row!["id", "obs"],
            row!["a", 1],
            row!["b", 4],
            row!["a", 3],
            row!["b"],
            row!["c", 9],
        ])
        .shared()
    }

    #[test]
    fn context_sees_neighbours() {
        let t = MemTable::from_rows(vec![row!["n"], row![1], row![5], row![12]]).shared();
        let view = addfieldusingcontext(t, "delta", |prev, cur, _next| {
            Ok(match prev {
                Some(p) => Value::Int(cur.at(0).as_i64().unwrap_or(0) - p.at(0).as_i64().unwrap_or(0)),
                None => Value::Null,
            })
        });
        let rows = view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows, vec![row![1, Value::Null], row![5, 4], row![12, 7]]);

        let t = MemTable::from_rows(vec![row!["n"], row![1], row![2]]).shared();
        let view = addfieldusingcontext(t, "next", |_, _, next| Ok(next.map(|n| n.at(0).clone()).unwrap_or_default()));
        let rows = view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows, vec![row![1, 2], row![2, Value::Null]]);
    }

    #[test]
    fn context_pads_short_rows_and_handles_empty() {
        let t = MemTable::from_rows(vec![row!["a", "b"], row![1]]).shared();
        let rows = addfieldusingcontext(t, "x", |_, _, _| Ok(Value::from("x")))
            .iter()
            .unwrap()
            .collect_rows()
            .unwrap();
        assert_eq!(rows, vec![row![1, Value::Null, "x"]]);
        let empty = MemTable::new(["a"], Vec::new()).shared();
        let it_view = addfieldusingcontext(empty, "x", |_, _, _| Ok(Value::Null));
        let it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["a", "x"]);
        assert_eq!(it.count(), 0);
    }

    #[test]
    fn fold_sums_values_per_key() {
        let it_view = fold(readings(), "id", add()).value("obs");
        let mut it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["key", "value"]);
        assert_eq!(it.next().unwrap().unwrap(), row!["a", 4]);
        // the short row contributes Null, which is not a number
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());

        let t = MemTable::from_rows(vec![row!["k", "v"], row!["x", 2], row!["y", 1], row!["x", 5]]).shared();
        let rows_view = fold(t, "k", add()).value("v");
        let rows = rows_view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows, vec![row!["x", 7], row!["y", 1]]);
    }

    #[test]
    fn fold_whole_rows() {
        let count_rows: FoldFn = Arc::new(|acc, _row| {
            Ok(match acc {
                Value::List(_) => Value::Int(2),
                other => Value::Int(other.as_i64().unwrap_or(0) + 1),
            })
        });
        let rows_view = fold(readings(), "id", count_rows);
        let rows = rows_view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows[0], row!["a", 2]);
        assert_eq!(rows[2], row!["c", Value::List(row!["c", 9])]);
    }

    #[test]
    fn rowgroupmap_emits_per_group() {
        let view = rowgroupmap(
            readings(),
            "id",
            |key, rows| {
                let total: i64 = rows.iter().filter_map(|r| r.at(1).as_i64()).sum();
                Ok(vec![vec![key.clone(), Value::Int(rows.len() as i64), Value::Int(total)]])
            },
            ["id", "n", "total"],
        );
        let it = view.iter().unwrap();
        assert_eq!(it.header(), &vec!["id", "n", "total"]);
        let rows = it.collect_rows().unwrap();
        assert_eq!(rows, vec![row!["a", 2, 4], row!["b", 2, 4], row!["c", 1, 9]]);
    }

    #[test]
    fn compound_group_keys_are_lists() {
        let view = rowgroupmap(
            readings(),
            ["id", "obs"],
            |key, _| Ok(vec![vec![key.clone()]]),
            ["k"],
        );
        let rows = view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows[0], row![Value::List(row!["a", 1])]);
    }
}
