//! Row-selection views that need no ordering: comment skipping and slicing.

use std::collections::VecDeque;

use tabflow_core::error::{Error, Result};
use tabflow_core::table::{Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

/// Drop rows whose first value is text starting with `prefix`.
pub struct SkipCommentsView {
    source: SharedTable,
    prefix: String,
}

impl Table for SkipCommentsView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let header = it.header().clone();
        let prefix = self.prefix.as_str();
        let rows = it.filter(move |r| match r {
            Ok(row) => !matches!(row.first(), Some(Value::Str(s)) if s.starts_with(prefix)),
            Err(_) => true,
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn skipcomments(source: SharedTable, prefix: impl Into<String>) -> SkipCommentsView {
    SkipCommentsView {
        source,
        prefix: prefix.into(),
    }
}

/// Rows `start..stop` taking every `step`-th, by data-row position.
pub struct RowSliceView {
    source: SharedTable,
    start: usize,
    stop: Option<usize>,
    step: usize,
}

impl Table for RowSliceView {
    fn iter(&self) -> Result<RowIter<'_>> {
        if self.step == 0 {
            return Err(Error::Spec("rowslice step must be positive".into()));
        }
        let it = self.source.iter()?;
        let header = it.header().clone();
        let (start, step) = (self.start, self.step);
        let rows: Box<dyn Iterator<Item = Result<Row>> + '_> = match self.stop {
            // take first: nothing past `stop` is read
            Some(stop) => Box::new(it.take(stop).skip(start).step_by(step)),
            None => Box::new(it.skip(start).step_by(step)),
        };
        Ok(RowIter::new(header, rows))
    }
}

pub fn rowslice(source: SharedTable, start: usize, stop: Option<usize>, step: usize) -> RowSliceView {
    RowSliceView {
        source,
        start,
        stop,
        step,
    }
}

/// First `n` rows.
pub fn head(source: SharedTable, n: usize) -> RowSliceView {
    rowslice(source, 0, Some(n), 1)
}

/// Last `n` rows; holds at most `n` rows while reading to the end.
pub struct TailView {
    source: SharedTable,
    n: usize,
}

impl Table for TailView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let mut it = self.source.iter()?;
        let header = it.header().clone();
        let n = self.n;
        let mut window: Option<VecDeque<Row>> = None;
        let mut failed = false;
        let rows = std::iter::from_fn(move || {
            if failed {
                return None;
            }
            if window.is_none() {
                let mut buf = VecDeque::with_capacity(n);
                for r in it.by_ref() {
                    match r {
                        Ok(row) => {
                            if n == 0 {
                                continue;
                            }
                            if buf.len() == n {
                                buf.pop_front();
                            }
                            buf.push_back(row);
                        }
                        Err(e) => {
                            failed = true;
                            return Some(Err(e));
                        }
                    }
                }
                window = Some(buf);
            }
            window.as_mut()?.pop_front().map(Ok)
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn tail(source: SharedTable, n: usize) -> TailView {
    TailView { source, n }
}
