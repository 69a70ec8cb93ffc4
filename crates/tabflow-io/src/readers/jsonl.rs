//! Record-stream source: one JSON document per line.
//!
//! The first non-blank line is the header (a JSON array of field names).
//! Every following line is one row, either a JSON array of values or an
//! object keyed by field name (absent keys read as `Null`).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tabflow_core::error::Result as CoreResult;
use tabflow_core::hash::{Fingerprint, Hash256};
use tabflow_core::table::{Header, Row, RowIter, Table};
use tabflow_core::value::Value;

use crate::checksum::{Checksum, StatSum};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct JsonlSource {
    path: PathBuf,
    checksum: Arc<dyn Checksum>,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            checksum: Arc::new(StatSum),
        }
    }

    pub fn with_checksum(mut self, checksum: Arc<dyn Checksum>) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<RowIter<'static>> {
        let mut lines = BufReader::new(File::open(&self.path)?)
            .lines()
            .enumerate()
            .map(|(i, l)| (i as u64 + 1, l))
            .filter(|(_, l)| !matches!(l, Ok(s) if s.trim().is_empty()));

        let header: Header = match lines.next() {
            None => Vec::new(),
            Some((line, text)) => match serde_json::from_str::<serde_json::Value>(&text?)? {
                serde_json::Value::Array(items) => {
                    items.iter().map(|v| from_json(v).to_field_name()).collect()
                }
                _ => {
                    return Err(Error::Malformed {
                        line,
                        msg: "header must be a JSON array".into(),
                    })
                }
            },
        };

        let fields = header.clone();
        let rows = lines.map(move |(line, text)| -> CoreResult<Row> {
            let text = text.map_err(Error::from)?;
            let doc: serde_json::Value = serde_json::from_str(&text).map_err(Error::from)?;
            Ok(row_from_json(&fields, doc, line)?)
        });
        Ok(RowIter::new(header, rows))
    }
}

fn row_from_json(fields: &[String], doc: serde_json::Value, line: u64) -> Result<Row> {
    match doc {
        serde_json::Value::Array(items) => Ok(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Ok(fields
            .iter()
            .map(|f| map.get(f).map(from_json).unwrap_or(Value::Null))
            .collect()),
        _ => Err(Error::Malformed {
            line,
            msg: "row must be a JSON array or object".into(),
        }),
    }
}

/// Convert a JSON value; integers that fit `i64` stay integral.
pub fn from_json(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

impl Table for JsonlSource {
    fn iter(&self) -> CoreResult<RowIter<'_>> {
        Ok(self.open()?)
    }

    fn cachetag(&self) -> CoreResult<Hash256> {
        let sum = self.checksum.checksum(&self.path)?;
        Ok(Fingerprint::new("jsonl")
            .tag(sum)
            .str(self.checksum.name())
            .finish())
    }
}

impl std::fmt::Debug for JsonlSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSource")
            .field("path", &self.path)
            .field("checksum", &self.checksum.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::row;

    #[test]
    fn arrays_and_objects() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("t.jsonl");
        std::fs::write(
            &p,
            "[\"id\",\"tags\"]\n[1,[\"a\",\"b\"]]\n\n{\"id\":2.5}\n[null]\n",
        )
        .unwrap();
        let it_view = JsonlSource::new(&p);
        let it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["id".to_string(), "tags".into()]);
        let rows = it.collect_rows().unwrap();
        assert_eq!(
            rows,
            vec![
                row![1, Value::List(row!["a", "b"])],
                row![2.5, Value::Null],
                row![Value::Null],
            ]
        );
    }

    #[test]
    fn bad_row_stops_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("t.jsonl");
        std::fs::write(&p, "[\"a\"]\n[1]\n\"scalar\"\n[3]\n").unwrap();
        let it_view = JsonlSource::new(&p);
        let mut it = it_view.iter().unwrap();
        assert!(it.next().unwrap().is_ok());
        assert!(it.next().unwrap().is_err());
    }

    #[test]
    fn empty_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("t.jsonl");
        std::fs::write(&p, "").unwrap();
        let it_view = JsonlSource::new(&p);
        let it = it_view.iter().unwrap();
        assert!(it.header().is_empty());
        assert_eq!(it.count(), 0);
    }
}
