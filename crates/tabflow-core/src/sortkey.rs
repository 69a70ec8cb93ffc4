//! Sortable keys over rows.
//!
//! `KeyComparator` is a resolved key specification: which columns take part,
//! in which direction, and whether the whole order is reversed. Positions past
//! the end of a short row read as `Null`, so comparisons never fail.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::field::{KeySpec, SortOrder};
use crate::table::Row;
use crate::value::Value;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComparator {
    /// `None` compares entire rows.
    parts: Option<Vec<(usize, SortOrder)>>,
    reverse: bool,
}

impl KeyComparator {
    pub fn new(key: &KeySpec, header: &[String], reverse: bool) -> Result<Self> {
        Ok(Self {
            parts: key.resolve(header)?,
            reverse,
        })
    }

    pub fn whole_row(reverse: bool) -> Self {
        Self {
            parts: None,
            reverse,
        }
    }

    /// Copy out the key values of `row`.
    pub fn extract(&self, row: &[Value]) -> Vec<Value> {
        match &self.parts {
            None => row.to_vec(),
            Some(parts) => parts
                .iter()
                .map(|(i, _)| row.get(*i).cloned().unwrap_or(Value::Null))
                .collect(),
        }
    }

    /// Compare two rows directly without allocating.
    pub fn compare_rows(&self, a: &[Value], b: &[Value]) -> Ordering {
        let ord = match &self.parts {
            None => a.cmp(b),
            Some(parts) => {
                let mut ord = Ordering::Equal;
                for (i, order) in parts {
                    let x = a.get(*i).unwrap_or(&NULL);
                    let y = b.get(*i).unwrap_or(&NULL);
                    ord = directed(x.cmp(y), *order);
                    if ord != Ordering::Equal {
                        break;
                    }
                }
                ord
            }
        };
        if self.reverse {
            ord.reverse()
        } else {
            ord
        }
    }

    /// Compare two already-extracted keys.
    pub fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        let ord = match &self.parts {
            None => a.cmp(b),
            Some(parts) => {
                let mut ord = Ordering::Equal;
                for ((x, y), (_, order)) in a.iter().zip(b.iter()).zip(parts.iter()) {
                    ord = directed(x.cmp(y), *order);
                    if ord != Ordering::Equal {
                        break;
                    }
                }
                ord
            }
        };
        if self.reverse {
            ord.reverse()
        } else {
            ord
        }
    }

    /// Whether two rows fall in the same key group (direction-independent).
    pub fn same_key(&self, a: &[Value], b: &[Value]) -> bool {
        match &self.parts {
            None => a == b,
            Some(parts) => parts
                .iter()
                .all(|(i, _)| a.get(*i).unwrap_or(&NULL) == b.get(*i).unwrap_or(&NULL)),
        }
    }

    /// Sort a buffer in place; ties keep their input order.
    pub fn sort(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| self.compare_rows(a, b));
    }

    pub fn key_of(self: &Arc<Self>, row: &[Value]) -> SortKey {
        SortKey {
            values: self.extract(row),
            comparator: Arc::clone(self),
        }
    }
}

fn directed(ord: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}

/// Owned, totally ordered key for a row.
///
/// Equality and order follow the comparator the key was made with, so keys
/// can sit in heaps and be grouped with plain `==`.
#[derive(Debug, Clone)]
pub struct SortKey {
    values: Vec<Value>,
    comparator: Arc<KeyComparator>,
}

impl SortKey {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator.compare_keys(&self.values, &other.values)
    }
}
