//! Vertical (`cat`) and horizontal (`annex`) concatenation.

use std::collections::HashSet;

use tabflow_core::error::{Error, Result};
use tabflow_core::table::{Header, Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

use crate::traits::{pull, step_iter};

/// Rows of every source in turn, re-projected onto one header.
///
/// The header is either fixed by the caller or the union of the source
/// headers in first-seen order. Fields a source lacks read as `missing`.
pub struct CatView {
    sources: Vec<SharedTable>,
    header: Option<Header>,
    missing: Value,
}

impl CatView {
    /// Use this exact header instead of the union.
    pub fn fixed_header(mut self, header: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.header = Some(header.into_iter().map(Into::into).collect());
        self
    }

    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

fn union_header<'a>(headers: impl Iterator<Item = &'a Header>) -> Header {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for h in headers {
        for f in h {
            if seen.insert(f.as_str()) {
                out.push(f.clone());
            }
        }
    }
    out
}

impl Table for CatView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let passes = self
            .sources
            .iter()
            .map(|s| s.iter())
            .collect::<Result<Vec<_>>>()?;
        let header = match &self.header {
            Some(h) => h.clone(),
            None => union_header(passes.iter().map(RowIter::header)),
        };
        let missing = self.missing.clone();
        let parts: Vec<_> = passes
            .into_iter()
            .map(|pass| {
                let mapping: Vec<Option<usize>> = header
                    .iter()
                    .map(|f| pass.header().iter().position(|h| h == f))
                    .collect();
                let missing = missing.clone();
                pass.map(move |r| {
                    let row = r?;
                    Ok(mapping
                        .iter()
                        .map(|m| m.and_then(|i| row.get(i).cloned()).unwrap_or_else(|| missing.clone()))
                        .collect::<Row>())
                })
            })
            .collect();
        Ok(RowIter::new(header, parts.into_iter().flatten()))
    }
}

pub fn cat(sources: Vec<SharedTable>) -> CatView {
    CatView {
        sources,
        header: None,
        missing: Value::Null,
    }
}

/// Join tables side by side by row position.
///
/// Each contribution is padded or truncated to its own header width; output
/// ends when every source is exhausted.
pub struct AnnexView {
    sources: Vec<SharedTable>,
    missing: Value,
}

impl AnnexView {
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for AnnexView {
    fn iter(&self) -> Result<RowIter<'_>> {
        if self.sources.is_empty() {
            return Err(Error::Spec("annex needs at least one table".into()));
        }
        let mut passes = self
            .sources
            .iter()
            .map(|s| s.iter())
            .collect::<Result<Vec<_>>>()?;
        let widths: Vec<usize> = passes.iter().map(|p| p.header().len()).collect();
        let header: Header = passes.iter().flat_map(|p| p.header().iter().cloned()).collect();
        let missing = self.missing.clone();
        let rows = step_iter(move || {
            let mut pulled = Vec::with_capacity(passes.len());
            for pass in passes.iter_mut() {
                pulled.push(pull(pass)?);
            }
            if pulled.iter().all(Option::is_none) {
                return Ok(None);
            }
            let mut out = Vec::with_capacity(widths.iter().sum());
            for (row, &width) in pulled.into_iter().zip(&widths) {
                let mut row = row.unwrap_or_default();
                row.resize(width, missing.clone());
                out.extend(row);
            }
            Ok(Some(out))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn annex(sources: Vec<SharedTable>) -> AnnexView {
    AnnexView {
        sources,
        missing: Value::Null,
    }
}
