//! Delimited-text source.
//!
//! Every value is read as text (`Value::Str`); typing is left to downstream
//! operators. Ragged records are passed through as short or long rows.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabflow_core::error::Result as CoreResult;
use tabflow_core::hash::{Fingerprint, Hash256};
use tabflow_core::table::{Row, RowIter, Table};
use tabflow_core::value::Value;
use tracing::debug;

use crate::checksum::{Checksum, StatSum};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub quote: u8,
    /// First record is the header. When false the table has an empty header.
    pub has_header: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
        }
    }
}

impl CsvDialect {
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }

    pub(crate) fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut b = csv::ReaderBuilder::new();
        b.delimiter(self.delimiter)
            .quote(self.quote)
            .has_headers(false)
            .flexible(true);
        b
    }
}

/// A CSV file as a re-iterable table. The file is reopened on each pass.
#[derive(Clone)]
pub struct CsvSource {
    path: PathBuf,
    dialect: CsvDialect,
    checksum: Arc<dyn Checksum>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dialect: CsvDialect::default(),
            checksum: Arc::new(StatSum),
        }
    }

    pub fn with_dialect(mut self, dialect: CsvDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_checksum(mut self, checksum: Arc<dyn Checksum>) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<RowIter<'static>> {
        let rdr = self.dialect.reader_builder().from_path(&self.path)?;
        let mut records = rdr.into_records();
        let header = if self.dialect.has_header {
            match records.next() {
                Some(rec) => rec?.iter().map(str::to_string).collect(),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };
        debug!(path = %self.path.display(), fields = header.len(), "opened csv source");
        let rows = records.map(|rec| -> CoreResult<Row> {
            let rec = rec.map_err(Error::from)?;
            Ok(rec.iter().map(|s| Value::Str(s.to_string())).collect())
        });
        Ok(RowIter::new(header, rows))
    }
}

impl Table for CsvSource {
    fn iter(&self) -> CoreResult<RowIter<'_>> {
        Ok(self.open()?)
    }

    /// Checksum of the file combined with the dialect.
    fn cachetag(&self) -> CoreResult<Hash256> {
        let sum = self.checksum.checksum(&self.path)?;
        Ok(Fingerprint::new("csv")
            .tag(sum)
            .str(self.checksum.name())
            .bytes(&[self.dialect.delimiter, self.dialect.quote])
            .flag(self.dialect.has_header)
            .finish())
    }
}

impl fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvSource")
            .field("path", &self.path)
            .field("dialect", &self.dialect)
            .field("checksum", &self.checksum.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::row;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn reads_header_and_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "t.csv", "a,b,c\n1,2,3\nx\n");
        let src = CsvSource::new(p);
        let it = src.iter().unwrap();
        assert_eq!(it.header(), &vec!["a".to_string(), "b".into(), "c".into()]);
        let rows = it.collect_rows().unwrap();
        assert_eq!(rows, vec![row!["1", "2", "3"], row!["x"]]);
    }

    #[test]
    fn headerless_dialect_gives_empty_header() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "t.tsv", "1\t2\n");
        let src = CsvSource::new(p).with_dialect(CsvDialect {
            has_header: false,
            ..CsvDialect::tsv()
        });
        let it = src.iter().unwrap();
        assert!(it.header().is_empty());
        assert_eq!(it.collect_rows().unwrap(), vec![row!["1", "2"]]);
    }

    #[test]
    fn cachetag_tracks_content_and_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "t.csv", "a\n1\n");
        let src = CsvSource::new(&p).with_checksum(Arc::new(crate::Blake3Sum));
        let before = src.cachetag().unwrap();
        assert_eq!(before, src.cachetag().unwrap());
        let tsv = src.clone().with_dialect(CsvDialect::tsv());
        assert_ne!(before, tsv.cachetag().unwrap());
        std::fs::write(&p, "a\n2\n").unwrap();
        assert_ne!(before, src.cachetag().unwrap());
    }

    #[test]
    fn missing_file_fails_at_iteration() {
        let src = CsvSource::new("/no/such/file.csv");
        assert!(src.iter().is_err());
    }
}
