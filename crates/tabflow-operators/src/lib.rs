#![forbid(unsafe_code)]
//! tabflow-operators: lazy views over `Table`s.
//!
//! Every operator is a constructor returning a view that owns its sources
//! as `SharedTable`s. Nothing is read until the view is iterated, and each
//! iteration is an independent pass.
//!
//! - `sort`: buffered external merge sort with an optional result cache.
//! - `merge`: ordered-merge set operators and key-group deduplication.
//! - `facet`: one view per distinct value or numeric range of a field.
//! - `reshape`: melt/recast, pivot, transpose, unpack.
//! - row transforms: `project`, `combine`, `pattern`, `filter`, `map`, `flatten`.
//! - `window`: context and key-group callbacks.

pub mod traits;

pub mod aggregate;
pub mod combine;
pub mod expr;
pub mod ext;
pub mod facet;
pub mod filter;
pub mod flatten;
pub mod map;
pub mod merge;
pub mod pattern;
pub mod project;
pub mod reshape;
pub mod sort;
pub mod window;

pub use aggregate::Agg;
pub use combine::{annex, cat};
pub use expr::Expr;
pub use ext::TableExt;
pub use facet::{facet, rangefacet, RangeBin};
pub use filter::{head, rowslice, skipcomments, tail};
pub use flatten::{flatten, unflatten, unflatten_field};
pub use map::{coalesce, fieldmap, rowmap, rowmapmany, Mapping};
pub use merge::{
    complement, conflicts, diff, distinct, distinct_by, duplicates, intersection, recordcomplement,
    recorddiff, unique,
};
pub use pattern::{capture, search, split};
pub use project::{addcolumn, addfield, addrownumbers, cut, cutout, movefield};
pub use reshape::{melt, pivot, recast, transpose, unpack, unpackdict, NewFields};
pub use sort::{sort, SortCache, SortOptions, SortView, Sorter};
pub use traits::{
    ContextFn, Derive, FoldFn, GroupFn, RecordFn, ReduceFn, RowFn, RowsFn, ValueFn,
};
pub use window::{addfieldusingcontext, fold, rowgroupmap};
