//! Streaming NDJSON writer: a header array line, then one array per row.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tabflow_core::table::Table;
use tabflow_core::value::Value;

use crate::error::Result;

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
}

impl JsonlWriter<File> {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Drain `table`; returns the number of data rows written.
    pub fn write_table(&mut self, table: &dyn Table) -> Result<u64> {
        let it = table.iter()?;
        let line = serde_json::to_string(it.header())?;
        writeln!(self.writer, "{}", line)?;
        let mut n = 0u64;
        for row in it {
            let row = row?;
            let doc: Vec<serde_json::Value> = row.iter().map(to_json).collect();
            let line = serde_json::to_string(&doc)?;
            writeln!(self.writer, "{}", line)?;
            n += 1;
        }
        self.writer.flush()?;
        Ok(n)
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

/// Non-finite floats become `null`; bytes become an array of integers.
pub fn to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|x| (*x).into()).collect()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(m) => serde_json::Value::Object(
            m.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

/// Write `table` to a JSON-lines file.
pub fn write_jsonl(table: &dyn Table, path: impl AsRef<Path>) -> Result<u64> {
    JsonlWriter::to_path(path)?.write_table(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::jsonl::JsonlSource;
    use tabflow_core::row;
    use tabflow_core::table::MemTable;

    #[test]
    fn written_stream_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.jsonl");
        let t = MemTable::from_rows(vec![
            row!["k", "v"],
            row!["a", 1],
            row!["b", Value::List(row![1.5, Value::Null])],
        ]);
        assert_eq!(write_jsonl(&t, &p).unwrap(), 2);
        let back = JsonlSource::new(&p).iter().unwrap().collect_rows().unwrap();
        assert_eq!(back, t.rows().to_vec());
    }

    #[test]
    fn nan_is_written_as_null() {
        assert_eq!(to_json(&Value::Float(f64::NAN)), serde_json::Value::Null);
    }
}
