//! Ordered-merge set operators over whole rows.
//!
//! Both operands are sorted (unless declared presorted) and walked once with
//! two cursors. Rows compare with the total `Value` order, so mixed-type
//! columns never fail.

pub mod dedup;

use std::cmp::Ordering;
use std::sync::Arc;

use tabflow_core::error::{Error, Result};
use tabflow_core::field::KeySpec;
use tabflow_core::table::{Row, RowIter, SharedTable, Table};
use tracing::trace;

use crate::sort::{SortOptions, Sorter};
use crate::traits::{pull, step_iter};

pub use dedup::{conflicts, distinct, distinct_by, duplicates, unique, ConflictsView, DistinctView, DuplicatesView, UniqueView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Rows of `a` with no equal counterpart in `b`.
    Complement,
    /// Rows of `a` matched by a row of `b`.
    Intersection,
}

/// Two-cursor merge of sorted `a` and `b`. Its private sort cache holds
/// both operands, so repeated passes over cacheable inputs sort once.
pub struct MergeView {
    a: SharedTable,
    b: SharedTable,
    mode: Mode,
    sorter: Sorter,
}

impl MergeView {
    pub fn options(mut self, opts: SortOptions) -> Self {
        let presorted = self.sorter.is_presorted();
        self.sorter = Sorter::with_slots(opts, 2).presorted(presorted);
        self
    }

    pub fn presorted(mut self, presorted: bool) -> Self {
        self.sorter = self.sorter.presorted(presorted);
        self
    }
}

fn walk<'a>(mode: Mode, mut a: RowIter<'a>, mut b: RowIter<'a>) -> impl Iterator<Item = Result<Row>> + 'a {
    let mut cur_a: Option<Row> = None;
    let mut cur_b: Option<Row> = None;
    let mut started = false;
    step_iter(move || {
        if !started {
            started = true;
            cur_a = pull(&mut a)?;
            cur_b = pull(&mut b)?;
        }
        loop {
            let Some(ra) = cur_a.take() else {
                return Ok(None);
            };
            let ord = match &cur_b {
                Some(rb) => ra.cmp(rb),
                // `b` exhausted: everything left in `a` is unmatched
                None => {
                    return match mode {
                        Mode::Complement => {
                            cur_a = pull(&mut a)?;
                            Ok(Some(ra))
                        }
                        Mode::Intersection => Ok(None),
                    };
                }
            };
            trace!(?ord, "merge compare");
            match (ord, mode) {
                (Ordering::Less, Mode::Complement) => {
                    cur_a = pull(&mut a)?;
                    return Ok(Some(ra));
                }
                (Ordering::Less, Mode::Intersection) => {
                    cur_a = pull(&mut a)?;
                }
                (Ordering::Equal, Mode::Complement) => {
                    cur_a = pull(&mut a)?;
                    cur_b = pull(&mut b)?;
                }
                (Ordering::Equal, Mode::Intersection) => {
                    cur_a = pull(&mut a)?;
                    cur_b = pull(&mut b)?;
                    return Ok(Some(ra));
                }
                (Ordering::Greater, _) => {
                    cur_a = Some(ra);
                    cur_b = pull(&mut b)?;
                }
            }
        }
    })
}

impl Table for MergeView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let a = self.sorter.iter(self.a.as_ref(), &KeySpec::all(), false)?;
        let b = self.sorter.iter(self.b.as_ref(), &KeySpec::all(), false)?;
        let header = a.header().clone();
        Ok(RowIter::new(header, walk(self.mode, a, b)))
    }
}

/// Rows in `a` that are not in `b`. Duplicates in `a` are kept except for
/// the occurrences matched one-for-one by rows of `b`.
pub fn complement(a: SharedTable, b: SharedTable) -> MergeView {
    MergeView {
        a,
        b,
        mode: Mode::Complement,
        sorter: Sorter::with_slots(SortOptions::default(), 2),
    }
}

/// Rows in `a` that are also in `b`, once per matched pair.
pub fn intersection(a: SharedTable, b: SharedTable) -> MergeView {
    MergeView {
        a,
        b,
        mode: Mode::Intersection,
        sorter: Sorter::with_slots(SortOptions::default(), 2),
    }
}

/// `(added, subtracted)`: rows in `b` not in `a`, and rows in `a` not in `b`.
///
/// Both sides are sorted once through a shared cache.
pub fn diff(a: SharedTable, b: SharedTable, opts: SortOptions) -> (SharedTable, SharedTable) {
    let opts = match opts.cache_store {
        Some(_) => opts,
        None => opts.with_cache_store(crate::sort::SortCache::shared(2)),
    };
    let added = complement(Arc::clone(&b), Arc::clone(&a)).options(opts.clone());
    let subtracted = complement(a, b).options(opts);
    (Arc::new(added), Arc::new(subtracted))
}

/// Projects `source` onto the field order of `like`, which must have the
/// same set of fields.
struct Reordered {
    source: SharedTable,
    like: SharedTable,
}

impl Table for Reordered {
    fn iter(&self) -> Result<RowIter<'_>> {
        let target = self.like.header()?;
        let it = self.source.iter()?;
        let mut have = it.header().clone();
        let mut want = target.clone();
        have.sort();
        want.sort();
        if have != want {
            return Err(Error::Spec(format!(
                "tables must have the same set of fields: {:?} vs {:?}",
                it.header(),
                target
            )));
        }
        let indices = crate::project::indices_of(&target, it.header())?;
        let missing = tabflow_core::value::Value::Null;
        Ok(RowIter::new(
            target,
            it.map(move |r| r.map(|row| tabflow_core::table::project(&row, &indices, &missing))),
        ))
    }

    fn cachetag(&self) -> Result<tabflow_core::hash::Hash256> {
        Ok(tabflow_core::hash::Fingerprint::new("reordered")
            .tag(self.source.cachetag()?)
            .tag(self.like.cachetag()?)
            .finish())
    }
}

/// Like [`complement`], but `b` is first re-projected onto `a`'s field order
/// so tables with the same fields in different order compare correctly.
pub fn recordcomplement(a: SharedTable, b: SharedTable) -> MergeView {
    let b: SharedTable = Arc::new(Reordered {
        source: b,
        like: Arc::clone(&a),
    });
    complement(a, b)
}

/// [`diff`] after aligning field order.
pub fn recorddiff(a: SharedTable, b: SharedTable, opts: SortOptions) -> (SharedTable, SharedTable) {
    let b_aligned: SharedTable = Arc::new(Reordered {
        source: b,
        like: Arc::clone(&a),
    });
    diff(a, b_aligned, opts)
}
