use std::collections::{BTreeSet, VecDeque};

use tabflow_core::config::EngineConfig;
use tabflow_core::error::{Error, Result};
use tabflow_core::field::Field;
use tabflow_core::table::{Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;
use tracing::debug;

use crate::pattern::{base_row, decomposed_header};
use crate::traits::{pull, step_iter};

/// Names of the fields a composite value unpacks into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewFields {
    Names(Vec<String>),
    /// `n` fields named `<field>1..<field>n`.
    Count(usize),
    /// Append every item; the header gains no names.
    Unbounded,
}

impl<S: Into<String>> FromIterator<S> for NewFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        NewFields::Names(iter.into_iter().map(Into::into).collect())
    }
}

fn items(v: &Value) -> Result<Vec<Value>> {
    Ok(match v {
        Value::Null => Vec::new(),
        Value::List(l) => l.clone(),
        Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        Value::Bytes(b) => b.iter().map(|&x| Value::Int(x as i64)).collect(),
        other => {
            return Err(Error::Transform(format!(
                "cannot unpack {} value '{other}'",
                other.kind().name()
            )))
        }
    })
}

/// Expand a sequence-valued field into several fields, padding with
/// `missing` or truncating to the number of new fields.
pub struct UnpackView {
    source: SharedTable,
    field: Field,
    newfields: NewFields,
    include_original: bool,
    missing: Value,
}

impl UnpackView {
    pub fn include_original(mut self, on: bool) -> Self {
        self.include_original = on;
        self
    }

    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for UnpackView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let idx = self.field.resolve(it.header())?;
        let names: Vec<String> = match &self.newfields {
            NewFields::Names(n) => n.clone(),
            NewFields::Count(n) => (1..=*n).map(|i| format!("{}{i}", it.header()[idx])).collect(),
            NewFields::Unbounded => Vec::new(),
        };
        let width = match self.newfields {
            NewFields::Unbounded => None,
            _ => Some(names.len()),
        };
        let header = decomposed_header(it.header(), idx, self.include_original, &names);
        let include_original = self.include_original;
        let missing = self.missing.clone();
        let rows = it.map(move |r| {
            let (value, mut row) = base_row(r?, idx, include_original);
            let mut vals = items(&value)?;
            if let Some(w) = width {
                vals.resize(w, missing.clone());
            }
            row.extend(vals);
            Ok(row)
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn unpack(source: SharedTable, field: impl Into<Field>, newfields: NewFields) -> UnpackView {
    UnpackView {
        source,
        field: field.into(),
        newfields,
        include_original: false,
        missing: Value::Null,
    }
}

/// Expand a mapping-valued field into one field per key.
///
/// Without explicit keys the first `samplesize` rows are read to discover
/// them (sorted), then replayed ahead of the rest of the pass.
pub struct UnpackDictView {
    source: SharedTable,
    field: Field,
    keys: Option<Vec<String>>,
    include_original: bool,
    samplesize: usize,
    missing: Value,
}

impl UnpackDictView {
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn include_original(mut self, on: bool) -> Self {
        self.include_original = on;
        self
    }

    pub fn samplesize(mut self, n: usize) -> Self {
        self.samplesize = n;
        self
    }

    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for UnpackDictView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let mut it = self.source.iter()?;
        let idx = self.field.resolve(it.header())?;
        let mut peeked: VecDeque<Row> = VecDeque::new();
        let keys = match &self.keys {
            Some(k) => k.clone(),
            None => {
                let mut found = BTreeSet::new();
                while peeked.len() < self.samplesize {
                    let Some(row) = pull(&mut it)? else {
                        break;
                    };
                    if let Some(Value::Map(m)) = row.get(idx) {
                        found.extend(m.keys().cloned());
                    }
                    peeked.push_back(row);
                }
                debug!(sampled = peeked.len(), keys = found.len(), "unpackdict discovered keys");
                found.into_iter().collect()
            }
        };
        let header = decomposed_header(it.header(), idx, self.include_original, &keys);
        let include_original = self.include_original;
        let missing = self.missing.clone();
        let rows = step_iter(move || {
            let next = match peeked.pop_front() {
                Some(row) => Some(row),
                None => pull(&mut it)?,
            };
            let Some(row) = next else {
                return Ok(None);
            };
            let (value, mut row) = base_row(row, idx, include_original);
            match value {
                Value::Map(m) => {
                    row.extend(keys.iter().map(|k| m.get(k).cloned().unwrap_or_else(|| missing.clone())))
                }
                Value::Null => row.extend(keys.iter().map(|_| missing.clone())),
                other => {
                    return Err(Error::Transform(format!(
                        "cannot unpack {} value '{other}' as a mapping",
                        other.kind().name()
                    )))
                }
            }
            Ok(Some(row))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn unpackdict(source: SharedTable, field: impl Into<Field>) -> UnpackDictView {
    UnpackDictView {
        source,
        field: field.into(),
        keys: None,
        include_original: false,
        samplesize: EngineConfig::default().sample_size,
        missing: Value::Null,
    }
}
