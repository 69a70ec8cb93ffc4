//! Run generation for external sort.
//!
//! Accumulates rows in memory up to the buffer limit, sorts them and writes
//! each full buffer to a spill run. Whatever is left at the end stays in
//! memory as the final (sorted) tail.

use std::path::PathBuf;

use tabflow_core::error::{Error, Result};
use tabflow_core::sortkey::KeyComparator;
use tabflow_core::table::Row;
use tabflow_mem::{Codec, RunFile, SpillManager};
use tracing::debug;

/// Where and how runs are spilled.
#[derive(Debug, Clone)]
pub struct RunGenConfig {
    /// `None` never spills (pure in-memory sort).
    pub max_in_mem_rows: Option<usize>,
    pub spill_dir: PathBuf,
    pub codec: Codec,
    pub block_rows: usize,
}

/// Generator for sorted runs.
pub struct RunGenerator {
    config: RunGenConfig,
    comparator: KeyComparator,
    buffer: Vec<Row>,
    spill: Option<SpillManager>,
    runs: Vec<RunFile>,
}

impl RunGenerator {
    pub fn new(config: RunGenConfig, comparator: KeyComparator) -> Self {
        Self {
            config,
            comparator,
            buffer: Vec::new(),
            spill: None,
            runs: Vec::new(),
        }
    }

    /// Add a row; flushes a sorted run when the buffer is full.
    pub fn push(&mut self, row: Row) -> Result<()> {
        self.buffer.push(row);
        if let Some(limit) = self.config.max_in_mem_rows {
            if self.buffer.len() >= limit.max(1) {
                self.flush_run()?;
            }
        }
        Ok(())
    }

    fn flush_run(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.comparator.sort(&mut self.buffer);

        let config = &self.config;
        let mgr = self.spill.get_or_insert_with(|| {
            SpillManager::new(config.spill_dir.clone(), config.codec)
                .with_block_rows(config.block_rows)
        });
        let run = mgr
            .write_run(&self.buffer)
            .map_err(|e| Error::Spill(format!("spill write: {e}")))?;
        debug!(run = self.runs.len(), rows = self.buffer.len(), "flushed sort buffer");
        self.runs.push(run);
        self.buffer.clear();
        Ok(())
    }

    /// Finish generation: spilled runs in creation order plus the sorted tail.
    pub fn finalize(mut self) -> (Vec<RunFile>, Vec<Row>) {
        self.comparator.sort(&mut self.buffer);
        (self.runs, self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::field::KeySpec;
    use tabflow_core::row;

    fn config(dir: &std::path::Path, limit: Option<usize>) -> RunGenConfig {
        RunGenConfig {
            max_in_mem_rows: limit,
            spill_dir: dir.to_path_buf(),
            codec: Codec::None,
            block_rows: 2,
        }
    }

    #[test]
    fn spills_every_full_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let header = vec!["n".to_string()];
        let cmp = KeyComparator::new(&KeySpec::from("n"), &header, false).unwrap();
        let mut gen = RunGenerator::new(config(dir.path(), Some(3)), cmp);
        for n in [5, 3, 9, 1, 7, 2, 8] {
            gen.push(row![n]).unwrap();
        }
        let (runs, tail) = gen.finalize();
        assert_eq!(runs.len(), 2);
        let first: Vec<Row> = runs[0].open().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(first, vec![row![3], row![5], row![9]]);
        assert_eq!(tail, vec![row![8]]);
    }

    #[test]
    fn unbounded_buffer_never_spills() {
        let dir = tempfile::tempdir().unwrap();
        let mut gen = RunGenerator::new(config(dir.path(), None), KeyComparator::whole_row(true));
        for n in 0..100 {
            gen.push(row![n]).unwrap();
        }
        let (runs, tail) = gen.finalize();
        assert!(runs.is_empty());
        assert_eq!(tail[0], row![99]);
    }
}
