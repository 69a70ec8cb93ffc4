//! Adjacent-comparison operators over a key-sorted stream.
//!
//! Each keeps at most one previous row; correctness relies on the input being
//! fully sorted by the key so equal keys are adjacent.

use std::collections::HashSet;

use tabflow_core::error::Result;
use tabflow_core::field::{resolve_all, Field, KeySpec};
use tabflow_core::sortkey::KeyComparator;
use tabflow_core::table::{Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

use crate::sort::{SortOptions, Sorter};
use crate::traits::{pull, step_iter};

macro_rules! sorted_view_options {
    ($view:ident) => {
        impl $view {
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
    };
}

fn open<'a>(
    sorter: &Sorter,
    source: &'a dyn Table,
    key: &KeySpec,
) -> Result<(RowIter<'a>, KeyComparator)> {
    let it = sorter.iter(source, key, false)?;
    let cmp = KeyComparator::new(key, it.header(), false)?;
    Ok((it, cmp))
}

/// First row of every run of equal keys (whole rows by default), optionally
/// with a trailing count column.
pub struct DistinctView {
    source: SharedTable,
    key: KeySpec,
    count_field: Option<String>,
    sorter: Sorter,
}

sorted_view_options!(DistinctView);

impl DistinctView {
    /// Append a column holding the size of each key group.
    pub fn count_field(mut self, name: impl Into<String>) -> Self {
        self.count_field = Some(name.into());
        self
    }
}

impl Table for DistinctView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let (mut it, cmp) = open(&self.sorter, self.source.as_ref(), &self.key)?;
        let mut header = it.header().clone();
        let counting = self.count_field.is_some();
        if let Some(f) = &self.count_field {
            header.push(f.clone());
        }
        let mut pending: Option<Row> = None;
        let mut started = false;
        let rows = step_iter(move || {
            if !started {
                started = true;
                pending = pull(&mut it)?;
            }
            let Some(mut first) = pending.take() else {
                return Ok(None);
            };
            let mut n: i64 = 1;
            loop {
                match pull(&mut it)? {
                    Some(row) if cmp.same_key(&first, &row) => n += 1,
                    next => {
                        pending = next;
                        break;
                    }
                }
            }
            if counting {
                first.push(Value::Int(n));
            }
            Ok(Some(first))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn distinct(source: SharedTable) -> DistinctView {
    distinct_by(source, KeySpec::all())
}

pub fn distinct_by(source: SharedTable, key: impl Into<KeySpec>) -> DistinctView {
    DistinctView {
        source,
        key: key.into(),
        count_field: None,
        sorter: Sorter::new(SortOptions::default()),
    }
}

/// Every row whose key occurs in two or more rows (all members of the group).
pub struct DuplicatesView {
    source: SharedTable,
    key: KeySpec,
    sorter: Sorter,
}

sorted_view_options!(DuplicatesView);

impl Table for DuplicatesView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let (mut it, cmp) = open(&self.sorter, self.source.as_ref(), &self.key)?;
        let header = it.header().clone();
        let mut previous: Option<Row> = None;
        let mut previous_yielded = false;
        let mut queued: Option<Row> = None;
        let rows = step_iter(move || {
            if let Some(row) = queued.take() {
                return Ok(Some(row));
            }
            loop {
                let Some(row) = pull(&mut it)? else {
                    return Ok(None);
                };
                let Some(prev) = previous.take() else {
                    previous = Some(row);
                    continue;
                };
                if cmp.same_key(&prev, &row) {
                    previous = Some(row.clone());
                    if !previous_yielded {
                        previous_yielded = true;
                        queued = Some(row);
                        return Ok(Some(prev));
                    }
                    return Ok(Some(row));
                }
                previous_yielded = false;
                previous = Some(row);
            }
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn duplicates(source: SharedTable, key: impl Into<KeySpec>) -> DuplicatesView {
    DuplicatesView {
        source,
        key: key.into(),
        sorter: Sorter::new(SortOptions::default()),
    }
}

/// Rows whose key occurs exactly once.
///
/// Tracks whether the previous row differed from its own predecessor, so no
/// group is ever buffered.
pub struct UniqueView {
    source: SharedTable,
    key: KeySpec,
    sorter: Sorter,
}

sorted_view_options!(UniqueView);

impl Table for UniqueView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let (mut it, cmp) = open(&self.sorter, self.source.as_ref(), &self.key)?;
        let header = it.header().clone();
        let mut prev: Option<Row> = None;
        let mut prev_differs = true;
        let mut started = false;
        let rows = step_iter(move || {
            if !started {
                started = true;
                prev = pull(&mut it)?;
            }
            loop {
                let Some(p) = prev.take() else {
                    return Ok(None);
                };
                match pull(&mut it)? {
                    None => {
                        // last row: unique if it differed from its predecessor
                        return Ok(prev_differs.then_some(p));
                    }
                    Some(curr) => {
                        let curr_differs = !cmp.same_key(&p, &curr);
                        let emit = prev_differs && curr_differs;
                        prev = Some(curr);
                        prev_differs = curr_differs;
                        if emit {
                            return Ok(Some(p));
                        }
                    }
                }
            }
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn unique(source: SharedTable, key: impl Into<KeySpec>) -> UniqueView {
    UniqueView {
        source,
        key: key.into(),
        sorter: Sorter::new(SortOptions::default()),
    }
}

/// Rows that share a key with their predecessor but differ from it in some
/// compared field where neither value is `missing`.
///
/// Comparison is pairwise between adjacent rows; both members of a
/// conflicting pair are emitted, each row at most once.
pub struct ConflictsView {
    source: SharedTable,
    key: KeySpec,
    missing: Value,
    include: Option<Vec<Field>>,
    exclude: Option<Vec<Field>>,
    sorter: Sorter,
}

sorted_view_options!(ConflictsView);

impl ConflictsView {
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }

    /// Only compare these fields.
    pub fn include<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.include = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Never compare these fields; wins over `include`.
    pub fn exclude<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.exclude = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Column positions to compare; `None` compares every position.
    /// When `exclude` is set, `include` is ignored.
    fn compared(&self, header: &[String]) -> Result<Option<Vec<usize>>> {
        match (&self.include, &self.exclude) {
            (_, Some(ex)) => {
                let ex: HashSet<usize> = resolve_all(ex, header)?.into_iter().collect();
                Ok(Some((0..header.len()).filter(|i| !ex.contains(i)).collect()))
            }
            (Some(inc), None) => Ok(Some(resolve_all(inc, header)?)),
            (None, None) => Ok(None),
        }
    }
}

fn conflict(a: &[Value], b: &[Value], compared: Option<&[usize]>, missing: &Value) -> bool {
    let differs = |x: &Value, y: &Value| x != missing && y != missing && x != y;
    match compared {
        None => a.iter().zip(b.iter()).any(|(x, y)| differs(x, y)),
        Some(idx) => idx.iter().any(|&i| match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => differs(x, y),
            _ => false,
        }),
    }
}

impl Table for ConflictsView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let (mut it, cmp) = open(&self.sorter, self.source.as_ref(), &self.key)?;
        let header = it.header().clone();
        let compared = self.compared(&header)?;
        let missing = self.missing.clone();
        let mut previous: Option<Row> = None;
        let mut previous_yielded = false;
        let mut queued: Option<Row> = None;
        let rows = step_iter(move || {
            if let Some(row) = queued.take() {
                return Ok(Some(row));
            }
            loop {
                let Some(row) = pull(&mut it)? else {
                    return Ok(None);
                };
                let Some(prev) = previous.take() else {
                    previous = Some(row);
                    continue;
                };
                let hit = cmp.same_key(&prev, &row)
                    && conflict(&prev, &row, compared.as_deref(), &missing);
                previous = Some(row.clone());
                let prev_was_yielded = std::mem::replace(&mut previous_yielded, hit);
                if hit {
                    if !prev_was_yielded {
                        queued = Some(row);
                        return Ok(Some(prev));
                    }
                    return Ok(Some(row));
                }
            }
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn conflicts(source: SharedTable, key: impl Into<KeySpec>) -> ConflictsView {
    ConflictsView {
        source,
        key: key.into(),
        missing: Value::Null,
        include: None,
        exclude: None,
        sorter: Sorter::new(SortOptions::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::row;
    use tabflow_core::table::MemTable;

    fn table() -> SharedTable {
        MemTable::from_rows(vec![
            row!["foo", "bar", "baz"],
            row!["A", 1, 2],
            row!["B", "2", "3.4"],
            row!["D", "xyz", 9.0],
            row!["B", "3", 7.8],
            row!["B", "2", 42],
            row!["E", Value::Null, Value::Null],
            row!["D", 4, 12.3],
            row!["F", 7, 2.3],
            row!["B", "2", "3.4"],
        ])
        .shared()
    }

    fn collect(t: &dyn Table) -> Vec<Row> {
        t.iter().unwrap().collect_rows().unwrap()
    }

    #[test]
    fn distinct_whole_rows() {
        let rows = collect(&distinct(table()));
        assert_eq!(rows.len(), 8);
        for pair in rows.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn distinct_with_counts() {
        let rows = collect(&distinct_by(table(), "foo").count_field("n"));
        assert_eq!(rows[1], row!["B", "2", "3.4", 4]);
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn duplicates_emits_every_group_member() {
        let rows = collect(&duplicates(table(), "foo"));
        let keys: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
        assert_eq!(
            keys,
            vec![
                &Value::from("B"),
                &Value::from("B"),
                &Value::from("B"),
                &Value::from("B"),
                &Value::from("D"),
                &Value::from("D"),
            ]
        );
    }

    #[test]
    fn unique_keeps_singletons() {
        let rows = collect(&unique(table(), "foo"));
        let keys: Vec<Value> = rows.into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(keys, vec![Value::from("A"), Value::from("E"), Value::from("F")]);
    }

    #[test]
    fn unique_on_empty_and_single() {
        let empty = MemTable::new(["k"], Vec::new()).shared();
        assert!(collect(&unique(empty, "k")).is_empty());
        let one = MemTable::from_rows(vec![row!["k"], row![1]]).shared();
        assert_eq!(collect(&unique(one, "k")), vec![row![1]]);
    }

    #[test]
    fn conflicts_ignore_missing() {
        let t = MemTable::from_rows(vec![
            row!["foo", "bar", "baz"],
            row!["A", 1, 2.7],
            row!["B", 2, Value::Null],
            row!["D", 3, 9.4],
            row!["B", Value::Null, 7.8],
            row!["E", Value::Null, Value::Null],
            row!["D", 3, 12.3],
            row!["A", 2, Value::Null],
        ])
        .shared();
        let rows = collect(&conflicts(t.clone(), "foo"));
        assert_eq!(
            rows,
            vec![
                row!["A", 1, 2.7],
                row!["A", 2, Value::Null],
                row!["D", 3, 9.4],
                row!["D", 3, 12.3],
            ]
        );
        let only_bar = collect(&conflicts(t.clone(), "foo").include(["bar"]));
        assert_eq!(only_bar, vec![row!["A", 1, 2.7], row!["A", 2, Value::Null]]);
        let no_baz = collect(&conflicts(t, "foo").exclude(["baz"]));
        assert_eq!(no_baz, vec![row!["A", 1, 2.7], row!["A", 2, Value::Null]]);
    }

    #[test]
    fn conflicts_exclude_overrides_include() {
        let t = MemTable::from_rows(vec![
            row!["k", "a", "b", "c"],
            row![1, 1, 1, 1],
            row![1, 1, 1, 2],
            row![2, 5, 5, 5],
            row![2, 5, 6, 5],
        ])
        .shared();
        let rows = collect(&conflicts(t, "k").include(["a"]).exclude(["b"]));
        assert_eq!(rows, vec![row![1, 1, 1, 1], row![1, 1, 1, 2]]);
    }
}
