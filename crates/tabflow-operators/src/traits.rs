//! Callback types and iteration plumbing shared by every view.
//!
//! Views own their sources as `SharedTable`s and build a fresh iterator per
//! `Table::iter` call. Stateful operators are written as a `step` closure
//! that yields `Ok(Some(row))`, `Ok(None)` at exhaustion or `Err` to halt;
//! [`step_iter`] turns that into a fused row iterator.

use std::sync::Arc;

use tabflow_core::error::Result;
use tabflow_core::record::Record;
use tabflow_core::sortkey::KeyComparator;
use tabflow_core::table::{Row, RowIter};
use tabflow_core::value::Value;

/// Derive one value from a record.
pub type RecordFn = Arc<dyn Fn(&Record) -> Result<Value> + Send + Sync>;

/// Translate a single value.
pub type ValueFn = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Map a record to one output row.
pub type RowFn = Arc<dyn Fn(&Record) -> Result<Row> + Send + Sync>;

/// Map a record to zero or more output rows.
pub type RowsFn = Arc<dyn Fn(&Record) -> Result<Vec<Row>> + Send + Sync>;

/// Collapse several values into one (recast reducers, pivot aggregation).
pub type ReduceFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Binary left-fold step.
pub type FoldFn = Arc<dyn Fn(Value, Value) -> Result<Value> + Send + Sync>;

/// `(previous, current, next)` context callback.
pub type ContextFn =
    Arc<dyn Fn(Option<&Record>, &Record, Option<&Record>) -> Result<Value> + Send + Sync>;

/// Map a key group to output rows.
pub type GroupFn = Arc<dyn Fn(&Value, &[Record]) -> Result<Vec<Row>> + Send + Sync>;

/// How a computed column gets its value.
#[derive(Clone)]
pub enum Derive {
    Const(Value),
    /// Expression over the record, see [`crate::expr`].
    Expr(String),
    Func(RecordFn),
}

impl Derive {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Record) -> Result<Value> + Send + Sync + 'static,
    {
        Derive::Func(Arc::new(f))
    }

    pub fn expr(src: impl Into<String>) -> Self {
        Derive::Expr(src.into())
    }
}

impl From<Value> for Derive {
    fn from(v: Value) -> Self {
        Derive::Const(v)
    }
}

impl std::fmt::Debug for Derive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Derive::Const(v) => f.debug_tuple("Const").field(v).finish(),
            Derive::Expr(s) => f.debug_tuple("Expr").field(s).finish(),
            Derive::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// A `Derive` compiled against one header.
pub(crate) enum Compiled {
    Const(Value),
    Expr(crate::expr::Expr),
    Func(RecordFn),
}

impl Compiled {
    pub(crate) fn new(derive: &Derive, header: &[String]) -> Result<Self> {
        Ok(match derive {
            Derive::Const(v) => Compiled::Const(v.clone()),
            Derive::Expr(src) => {
                let e = crate::expr::Expr::parse(src)?;
                e.check_fields(header)?;
                Compiled::Expr(e)
            }
            Derive::Func(f) => Compiled::Func(Arc::clone(f)),
        })
    }

    pub(crate) fn eval(&self, rec: &Record) -> Result<Value> {
        match self {
            Compiled::Const(v) => Ok(v.clone()),
            Compiled::Expr(e) => e.eval(rec),
            Compiled::Func(f) => f(rec),
        }
    }
}

pub(crate) fn fields_arc(header: &[String]) -> Arc<[String]> {
    header.to_vec().into()
}

/// Next row of a pass, with exhaustion as `Ok(None)`.
pub(crate) fn pull<I>(it: &mut I) -> Result<Option<Row>>
where
    I: Iterator<Item = Result<Row>> + ?Sized,
{
    it.next().transpose()
}

/// Fused iterator over a fallible step function; stops after the first
/// error or exhaustion.
pub(crate) fn step_iter<'a, F>(mut step: F) -> impl Iterator<Item = Result<Row>> + 'a
where
    F: FnMut() -> Result<Option<Row>> + 'a,
{
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match step() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                done = true;
                None
            }
            Err(e) => {
                done = true;
                Some(Err(e))
            }
        }
    })
}

/// Splits a key-sorted pass into runs of adjacent rows with equal keys.
pub(crate) struct Grouper<'a> {
    rows: RowIter<'a>,
    cmp: KeyComparator,
    pending: Option<Row>,
    started: bool,
}

impl<'a> Grouper<'a> {
    pub(crate) fn new(rows: RowIter<'a>, cmp: KeyComparator) -> Self {
        Self {
            rows,
            cmp,
            pending: None,
            started: false,
        }
    }

    pub(crate) fn next_group(&mut self) -> Result<Option<Vec<Row>>> {
        if !self.started {
            self.started = true;
            self.pending = pull(&mut self.rows)?;
        }
        let Some(first) = self.pending.take() else {
            return Ok(None);
        };
        let mut group = vec![first];
        loop {
            match pull(&mut self.rows)? {
                Some(row) if self.cmp.same_key(&group[0], &row) => group.push(row),
                other => {
                    self.pending = other;
                    return Ok(Some(group));
                }
            }
        }
    }
}

/// Key value of a row for grouping callbacks: the single field's value, or a
/// list of values for compound keys.
pub(crate) fn group_key(indices: &[usize], row: &[Value]) -> Value {
    match indices {
        [i] => row.get(*i).cloned().unwrap_or(Value::Null),
        _ => Value::List(
            indices
                .iter()
                .map(|i| row.get(*i).cloned().unwrap_or(Value::Null))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::field::KeySpec;
    use tabflow_core::row;
    use tabflow_core::table::{MemTable, Table};

    #[test]
    fn grouper_splits_adjacent_runs() {
        let t = MemTable::from_rows(vec![
            row!["k", "v"],
            row!["a", 1],
            row!["a", 2],
            row!["b", 3],
            row!["a", 4],
        ]);
        let it = t.iter().unwrap();
        let cmp = KeyComparator::new(&KeySpec::from("k"), it.header(), false).unwrap();
        let mut g = Grouper::new(it, cmp);
        let mut sizes = Vec::new();
        while let Some(group) = g.next_group().unwrap() {
            sizes.push(group.len());
        }
        assert_eq!(sizes, vec![2, 1, 1]);
    }

    #[test]
    fn step_iter_stops_after_error() {
        let mut n = 0;
        let mut it = step_iter(move || {
            n += 1;
            if n == 2 {
                Err(tabflow_core::Error::Transform("boom".into()))
            } else {
                Ok(Some(row![n]))
            }
        });
        assert!(it.next().unwrap().is_ok());
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }
}
