//! Streaming CSV writer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tabflow_core::table::Table;

use crate::error::Result;
use crate::readers::csv::CsvDialect;

pub struct CsvWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvWriter<File> {
    pub fn to_path(path: impl AsRef<Path>, dialect: CsvDialect) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f, dialect))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn to_writer(writer: W, dialect: CsvDialect) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(dialect.delimiter)
            .quote(dialect.quote)
            .flexible(true)
            .from_writer(writer);
        Self { writer }
    }

    /// Drain `table`, writing its header (if any) and every row. Values are
    /// rendered with their `Display` form; `Null` becomes an empty field.
    /// Returns the number of data rows written.
    pub fn write_table(&mut self, table: &dyn Table) -> Result<u64> {
        let it = table.iter()?;
        if !it.header().is_empty() {
            self.writer.write_record(it.header())?;
        }
        let mut n = 0u64;
        for row in it {
            let row = row?;
            self.writer
                .write_record(row.iter().map(|v| v.to_string()))?;
            n += 1;
        }
        self.writer.flush()?;
        Ok(n)
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

/// Write `table` to a CSV file with the default dialect.
pub fn write_csv(table: &dyn Table, path: impl AsRef<Path>) -> Result<u64> {
    CsvWriter::to_path(path, CsvDialect::default())?.write_table(table)
}
