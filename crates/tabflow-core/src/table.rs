//! The table contract every operator consumes and produces.
//!
//! A table is re-iterable: each call to [`Table::iter`] starts a fresh,
//! independent pass. The pass exposes the header up front and then yields
//! data rows lazily. Rows may be shorter (or longer) than the header.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::hash::{Fingerprint, Hash256};
use crate::value::Value;

pub type Row = Vec<Value>;
pub type Header = Vec<String>;

/// Shared handle to any table; views own their sources through this.
pub type SharedTable = Arc<dyn Table>;

pub trait Table: Send + Sync {
    /// Start a new pass from the beginning.
    fn iter(&self) -> Result<RowIter<'_>>;

    /// Fingerprint of the table's current content/identity.
    ///
    /// Tables without a stable identity return [`Error::Uncacheable`].
    fn cachetag(&self) -> Result<Hash256> {
        Err(Error::Uncacheable(std::any::type_name::<Self>().to_string()))
    }

    /// Header of a fresh pass (opens and drops one iteration).
    fn header(&self) -> Result<Header> {
        Ok(self.iter()?.header().clone())
    }
}

/// One pass over a table: a header plus a lazy stream of rows.
pub struct RowIter<'a> {
    header: Header,
    rows: Box<dyn Iterator<Item = Result<Row>> + 'a>,
}

impl<'a> RowIter<'a> {
    pub fn new<I>(header: Header, rows: I) -> Self
    where
        I: Iterator<Item = Result<Row>> + 'a,
    {
        Self {
            header,
            rows: Box::new(rows),
        }
    }

    pub fn empty(header: Header) -> Self {
        Self::new(header, std::iter::empty())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn into_parts(self) -> (Header, Box<dyn Iterator<Item = Result<Row>> + 'a>) {
        (self.header, self.rows)
    }

    /// Drain the remaining rows, stopping at the first error.
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.rows.collect()
    }
}

impl Iterator for RowIter<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl fmt::Debug for RowIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowIter").field("header", &self.header).finish()
    }
}

impl<T: Table + ?Sized> Table for Arc<T> {
    fn iter(&self) -> Result<RowIter<'_>> {
        (**self).iter()
    }

    fn cachetag(&self) -> Result<Hash256> {
        (**self).cachetag()
    }
}

/// Immutable in-memory table.
///
/// Its content never changes after construction, so its fingerprint is a
/// hash of the content (computed once, on first request).
#[derive(Clone)]
pub struct MemTable {
    header: Arc<Header>,
    rows: Arc<Vec<Row>>,
    tag: Arc<OnceLock<Hash256>>,
}

impl MemTable {
    pub fn new<H, S>(header: H, rows: Vec<Row>) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: Arc::new(header.into_iter().map(Into::into).collect()),
            rows: Arc::new(rows),
            tag: Arc::new(OnceLock::new()),
        }
    }

    /// First row is the header (values rendered as field names).
    pub fn from_rows(mut rows: Vec<Row>) -> Self {
        if rows.is_empty() {
            return Self::new(Vec::<String>::new(), Vec::new());
        }
        let header: Header = rows.remove(0).iter().map(Value::to_field_name).collect();
        Self::new(header, rows)
    }

    /// Materialize any table into memory (first error aborts).
    pub fn collect(table: &dyn Table) -> Result<Self> {
        let it = table.iter()?;
        let header = it.header().clone();
        let rows = it.collect_rows()?;
        Ok(Self::new(header, rows))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn fields(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn shared(self) -> SharedTable {
        Arc::new(self)
    }

    fn compute_tag(&self) -> Result<Hash256> {
        let mut fp = Fingerprint::new("memtable");
        for f in self.header.iter() {
            fp = fp.str(f);
        }
        for row in self.rows.iter() {
            fp = fp.u64(row.len() as u64);
            for v in row {
                fp = fp.value(v)?;
            }
        }
        Ok(fp.finish())
    }
}

impl Table for MemTable {
    fn iter(&self) -> Result<RowIter<'_>> {
        Ok(RowIter::new(
            (*self.header).clone(),
            self.rows.iter().cloned().map(Ok),
        ))
    }

    fn cachetag(&self) -> Result<Hash256> {
        if let Some(tag) = self.tag.get() {
            return Ok(*tag);
        }
        let tag = self.compute_tag()?;
        Ok(*self.tag.get_or_init(|| tag))
    }

    fn header(&self) -> Result<Header> {
        Ok((*self.header).clone())
    }
}

impl fmt::Debug for MemTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTable")
            .field("header", &self.header)
            .field("rows", &self.rows.len())
            .finish()
    }
}

/// Pad (or leave) a row so positions up to `len` exist.
pub fn pad_row(mut row: Row, len: usize, missing: &Value) -> Row {
    if row.len() < len {
        row.resize(len, missing.clone());
    }
    row
}

/// Pick `indices` from `row`, filling positions past its end with `missing`.
pub fn project(row: &[Value], indices: &[usize], missing: &Value) -> Row {
    indices
        .iter()
        .map(|&i| row.get(i).cloned().unwrap_or_else(|| missing.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn each_iteration_starts_fresh() {
        let t = MemTable::from_rows(vec![row!["a", "b"], row![1, 2], row![3, 4]]);
        let mut first = t.iter().unwrap();
        assert_eq!(first.header(), &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(first.next().unwrap().unwrap(), row![1, 2]);
        let second = t.iter().unwrap().collect_rows().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(first.next().unwrap().unwrap(), row![3, 4]);
    }

    #[test]
    fn content_tag_is_stable_and_content_sensitive() {
        let a = MemTable::from_rows(vec![row!["x"], row![1]]);
        let b = MemTable::from_rows(vec![row!["x"], row![1]]);
        let c = MemTable::from_rows(vec![row!["x"], row![2]]);
        assert_eq!(a.cachetag().unwrap(), b.cachetag().unwrap());
        assert_ne!(a.cachetag().unwrap(), c.cachetag().unwrap());
    }

    #[test]
    fn project_fills_short_rows() {
        assert_eq!(
            project(&row!["x"], &[0, 2], &Value::Null),
            row!["x", Value::Null]
        );
    }
}
