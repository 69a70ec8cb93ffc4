//! Fluent chaining over shared tables.
//!
//! Each method wraps `self` in the corresponding view with default options
//! and returns it as a new `SharedTable`; use the free functions when a
//! view needs further configuration.

use std::sync::Arc;

use tabflow_core::field::{Field, KeySpec};
use tabflow_core::table::SharedTable;

use crate::combine;
use crate::filter;
use crate::merge;
use crate::project;
use crate::reshape;
use crate::sort::SortView;
use crate::traits::Derive;

pub trait TableExt {
    fn sort(&self, key: impl Into<KeySpec>) -> SharedTable;
    fn sort_reverse(&self, key: impl Into<KeySpec>) -> SharedTable;
    fn cut<I, F>(&self, fields: I) -> SharedTable
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>;
    fn cutout<I, F>(&self, fields: I) -> SharedTable
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>;
    fn addfield(&self, field: &str, value: impl Into<Derive>) -> SharedTable;
    fn distinct(&self) -> SharedTable;
    fn complement(&self, other: &SharedTable) -> SharedTable;
    fn intersection(&self, other: &SharedTable) -> SharedTable;
    fn cat(&self, other: &SharedTable) -> SharedTable;
    fn melt<I, F>(&self, key: I) -> SharedTable
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>;
    fn transpose(&self) -> SharedTable;
    fn head(&self, n: usize) -> SharedTable;
    fn tail(&self, n: usize) -> SharedTable;
    fn search(&self, pattern: &str) -> SharedTable;
    fn skipcomments(&self, prefix: &str) -> SharedTable;
}

impl TableExt for SharedTable {
    fn sort(&self, key: impl Into<KeySpec>) -> SharedTable {
        Arc::new(SortView::new(Arc::clone(self), key))
    }

    fn sort_reverse(&self, key: impl Into<KeySpec>) -> SharedTable {
        Arc::new(SortView::new(Arc::clone(self), key).reverse(true))
    }

    fn cut<I, F>(&self, fields: I) -> SharedTable
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Arc::new(project::cut(Arc::clone(self), fields))
    }

    fn cutout<I, F>(&self, fields: I) -> SharedTable
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Arc::new(project::cutout(Arc::clone(self), fields))
    }

    fn addfield(&self, field: &str, value: impl Into<Derive>) -> SharedTable {
        Arc::new(project::addfield(Arc::clone(self), field, value))
    }

    fn distinct(&self) -> SharedTable {
        Arc::new(merge::distinct(Arc::clone(self)))
    }

    fn complement(&self, other: &SharedTable) -> SharedTable {
        Arc::new(merge::complement(Arc::clone(self), Arc::clone(other)))
    }

    fn intersection(&self, other: &SharedTable) -> SharedTable {
        Arc::new(merge::intersection(Arc::clone(self), Arc::clone(other)))
    }

    fn cat(&self, other: &SharedTable) -> SharedTable {
        Arc::new(combine::cat(vec![Arc::clone(self), Arc::clone(other)]))
    }

    fn melt<I, F>(&self, key: I) -> SharedTable
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Arc::new(reshape::melt(Arc::clone(self)).key(key))
    }

    fn transpose(&self) -> SharedTable {
        Arc::new(reshape::transpose(Arc::clone(self)))
    }

    fn head(&self, n: usize) -> SharedTable {
        Arc::new(filter::head(Arc::clone(self), n))
    }

    fn tail(&self, n: usize) -> SharedTable {
        Arc::new(filter::tail(Arc::clone(self), n))
    }

    fn search(&self, pattern: &str) -> SharedTable {
        Arc::new(crate::pattern::search(Arc::clone(self), pattern))
    }

    fn skipcomments(&self, prefix: &str) -> SharedTable {
        Arc::new(filter::skipcomments(Arc::clone(self), prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::row;
    use tabflow_core::table::{MemTable, Table};
    use tabflow_core::value::Value;

    #[test]
    fn chains_views() {
        let t = MemTable::from_rows(vec![
            row!["name", "n", "note"],
            row!["b", 2, "x"],
            row!["a", 1, "y"],
            row!["b", 2, "z"],
            row!["c", 3],
        ])
        .shared();
        let out = t.cutout(["note"]).sort("name").distinct().head(2);
        let it = out.iter().unwrap();
        assert_eq!(it.header(), &vec!["name", "n"]);
        assert_eq!(it.collect_rows().unwrap(), vec![row!["a", 1], row!["b", 2]]);

        let last = t.sort_reverse("n").cut(["name"]).tail(1);
        assert_eq!(last.iter().unwrap().collect_rows().unwrap(), vec![row!["a"]]);
    }

    #[test]
    fn chains_expression_fields() {
        let t = MemTable::from_rows(vec![row!["x"], row![2], row![5]]).shared();
        let out = t.addfield("y", Derive::expr("{x} * 10")).cut(["y"]);
        let rows = out.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows, vec![row![20], row![50]]);
        let melted = t.addfield("k", Value::from("k")).melt(["k"]);
        assert_eq!(melted.iter().unwrap().collect_rows().unwrap()[1], row!["k", "x", 5]);
    }
}
