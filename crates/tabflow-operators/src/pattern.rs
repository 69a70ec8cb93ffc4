//! Regex-based views: `capture` and `split` decompose one field into several,
//! `search` filters rows by pattern.
//!
//! Patterns compile when a pass starts; an invalid pattern is a
//! specification error. Non-text values are matched against their display
//! form.

use std::borrow::Cow;

use regex::Regex;
use tabflow_core::error::{Error, Result};
use tabflow_core::field::{resolve_all, Field};
use tabflow_core::table::{Header, Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Spec(format!("invalid pattern {pattern:?}: {e}")))
}

fn text_of(v: &Value) -> Cow<'_, str> {
    match v {
        Value::Str(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

/// Header with `idx` optionally removed and `newfields` appended.
pub(crate) fn decomposed_header(header: &Header, idx: usize, include_original: bool, newfields: &[String]) -> Header {
    let mut out: Header = header
        .iter()
        .enumerate()
        .filter(|(i, _)| include_original || *i != idx)
        .map(|(_, f)| f.clone())
        .collect();
    out.extend(newfields.iter().cloned());
    out
}

pub(crate) fn base_row(mut row: Row, idx: usize, include_original: bool) -> (Value, Row) {
    let value = row.get(idx).cloned().unwrap_or(Value::Null);
    if !include_original && idx < row.len() {
        row.remove(idx);
    }
    (value, row)
}

/// Replace a field with the capture groups of a regex match against it.
pub struct CaptureView {
    source: SharedTable,
    field: Field,
    pattern: String,
    newfields: Vec<String>,
    include_original: bool,
    fill: Option<Vec<Value>>,
}

impl CaptureView {
    pub fn include_original(mut self, on: bool) -> Self {
        self.include_original = on;
        self
    }

    /// Values used when the pattern does not match, instead of failing.
    pub fn fill(mut self, fill: Vec<Value>) -> Self {
        self.fill = Some(fill);
        self
    }
}

impl Table for CaptureView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let re = compile(&self.pattern)?;
        let it = self.source.iter()?;
        let idx = self.field.resolve(it.header())?;
        let header = decomposed_header(it.header(), idx, self.include_original, &self.newfields);
        let include_original = self.include_original;
        let fill = self.fill.clone();
        let rows = it.map(move |r| {
            let (value, mut row) = base_row(r?, idx, include_original);
            let text = text_of(&value);
            match re.captures(&text) {
                Some(caps) => row.extend(
                    caps.iter()
                        .skip(1)
                        .map(|m| m.map_or(Value::Null, |m| Value::from(m.as_str()))),
                ),
                None => match &fill {
                    Some(fill) => row.extend(fill.iter().cloned()),
                    None => {
                        return Err(Error::Transform(format!(
                            "value {text:?} did not match pattern {:?}",
                            re.as_str()
                        )))
                    }
                },
            }
            Ok(row)
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn capture<I, S>(source: SharedTable, field: impl Into<Field>, pattern: &str, newfields: I) -> CaptureView
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CaptureView {
        source,
        field: field.into(),
        pattern: pattern.to_string(),
        newfields: newfields.into_iter().map(Into::into).collect(),
        include_original: false,
        fill: None,
    }
}

/// Replace a field with the pieces of a regex split of it.
///
/// A value with no separator yields itself as the single piece.
pub struct SplitView {
    source: SharedTable,
    field: Field,
    pattern: String,
    newfields: Vec<String>,
    include_original: bool,
    maxsplit: usize,
}

impl SplitView {
    pub fn include_original(mut self, on: bool) -> Self {
        self.include_original = on;
        self
    }

    /// Split at most `n` times; 0 splits at every match.
    pub fn maxsplit(mut self, n: usize) -> Self {
        self.maxsplit = n;
        self
    }
}

impl Table for SplitView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let re = compile(&self.pattern)?;
        let it = self.source.iter()?;
        let idx = self.field.resolve(it.header())?;
        let header = decomposed_header(it.header(), idx, self.include_original, &self.newfields);
        let include_original = self.include_original;
        let maxsplit = self.maxsplit;
        let rows = it.map(move |r| {
            let (value, mut row) = base_row(r?, idx, include_original);
            let text = text_of(&value);
            if maxsplit == 0 {
                row.extend(re.split(&text).map(Value::from));
            } else {
                row.extend(re.splitn(&text, maxsplit + 1).map(Value::from));
            }
            Ok(row)
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn split<I, S>(source: SharedTable, field: impl Into<Field>, pattern: &str, newfields: I) -> SplitView
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    SplitView {
        source,
        field: field.into(),
        pattern: pattern.to_string(),
        newfields: newfields.into_iter().map(Into::into).collect(),
        include_original: false,
        maxsplit: 0,
    }
}

/// Rows where the pattern matches any value (or any of the given fields).
pub struct SearchView {
    source: SharedTable,
    pattern: String,
    fields: Option<Vec<Field>>,
    complement: bool,
}

impl SearchView {
    /// Only look at these fields.
    pub fn fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Keep the rows that do not match instead.
    pub fn complement(mut self, on: bool) -> Self {
        self.complement = on;
        self
    }
}

impl Table for SearchView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let re = compile(&self.pattern)?;
        let it = self.source.iter()?;
        let indices = match &self.fields {
            Some(f) => Some(resolve_all(f, it.header())?),
            None => None,
        };
        let header = it.header().clone();
        let complement = self.complement;
        let rows = it.filter(move |r| {
            let Ok(row) = r else {
                return true;
            };
            let hit = match &indices {
                Some(idx) => idx
                    .iter()
                    .filter_map(|&i| row.get(i))
                    .any(|v| re.is_match(&text_of(v))),
                None => row.iter().any(|v| re.is_match(&text_of(v))),
            };
            hit != complement
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn search(source: SharedTable, pattern: &str) -> SearchView {
    SearchView {
        source,
        pattern: pattern.to_string(),
        fields: None,
        complement: false,
    }
}
