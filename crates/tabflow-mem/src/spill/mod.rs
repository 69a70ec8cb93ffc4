//! Spill manager for external-memory operators.
//!
//! Writes sorted runs of rows to private temp files and reads them back as
//! streaming cursors with end-to-end checksum validation.

pub mod codec;
pub mod segment;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tabflow_core::table::Row;
use tempfile::TempPath;
use tracing::debug;

use crate::error::{Error, Result};

pub use codec::Codec;
pub use segment::{BlockHeader, SegmentMeta, SegmentName, SpillId, HEADER_LEN};

/// Central manager for spilling sorted runs to local temp storage.
///
/// One manager serves one sort invocation; every run it writes shares the
/// manager's spill id in its file name.
pub struct SpillManager {
    root_dir: PathBuf,
    codec: Codec,
    block_rows: usize,
    spill_id: SpillId,
    next_run: AtomicU32,
}

impl SpillManager {
    pub fn new(root_dir: impl Into<PathBuf>, codec: Codec) -> Self {
        Self {
            root_dir: root_dir.into(),
            codec,
            block_rows: 1024,
            spill_id: SpillId::next(),
            next_run: AtomicU32::new(0),
        }
    }

    pub fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = block_rows.max(1);
        self
    }

    pub fn spill_id(&self) -> SpillId {
        self.spill_id
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Generate a unique run index for this spill session.
    pub fn next_run_index(&self) -> u32 {
        self.next_run.fetch_add(1, Ordering::Relaxed)
    }

    /// Write `rows` (already in final order) as one run file.
    ///
    /// Steps per block of `block_rows` rows:
    /// 1. Encode the rows with postcard
    /// 2. Compress with the configured codec
    /// 3. Frame with a `BlockHeader`
    /// 4. Feed header + payload into the run checksum
    pub fn write_run(&self, rows: &[Row]) -> Result<RunFile> {
        if !self.codec.is_available() {
            return Err(Error::CodecUnsupported(self.codec.name()));
        }
        std::fs::create_dir_all(&self.root_dir)
            .map_err(|e| Error::io("create spill dir", e))?;

        let name = SegmentName::new(self.spill_id, self.next_run_index());
        let named = tempfile::Builder::new()
            .prefix(&format!("{}_", name.0))
            .suffix(".run")
            .tempfile_in(&self.root_dir)
            .map_err(|e| Error::io("create run file", e))?;
        let (file, path) = named.into_parts();
        let mut out = BufWriter::new(file);

        let mut hasher = blake3::Hasher::new();
        let mut blocks = 0u32;
        let mut bytes = 0u64;
        for chunk in rows.chunks(self.block_rows) {
            let raw = postcard::to_allocvec(chunk)
                .map_err(|e| Error::Codec(format!("postcard encode: {e}")))?;
            let payload = self.codec.encode(&raw)?;
            let header = BlockHeader {
                codec: self.codec,
                rows: chunk.len() as u32,
                uncompressed_len: to_len(raw.len())?,
                compressed_len: to_len(payload.len())?,
            };
            let header_bytes = header.to_bytes();
            hasher.update(&header_bytes);
            hasher.update(&payload);
            out.write_all(&header_bytes)
                .and_then(|_| out.write_all(&payload))
                .map_err(|e| Error::io("write run block", e))?;
            blocks += 1;
            bytes += (HEADER_LEN + payload.len()) as u64;
        }
        out.flush().map_err(|e| Error::io("flush run file", e))?;

        let meta = SegmentMeta {
            name,
            codec: self.codec,
            rows: rows.len() as u64,
            blocks,
            bytes,
            checksum: hasher.finalize().into(),
        };
        debug!(
            run = %meta.name.0,
            rows = meta.rows,
            blocks = meta.blocks,
            bytes = meta.bytes,
            codec = self.codec.name(),
            "spilled sorted run"
        );
        Ok(RunFile { meta, path })
    }
}

impl fmt::Debug for SpillManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpillManager")
            .field("root_dir", &self.root_dir)
            .field("codec", &self.codec)
            .field("block_rows", &self.block_rows)
            .field("spill_id", &self.spill_id)
            .finish()
    }
}

fn to_len(n: usize) -> Result<u32> {
    u32::try_from(n)
        .ok()
        .filter(|v| *v <= segment::MAX_BLOCK_BYTES)
        .ok_or_else(|| Error::Storage(format!("block of {n} bytes too large")))
}

/// A spilled, sorted run on disk. The file is removed when this is dropped.
pub struct RunFile {
    meta: SegmentMeta,
    path: TempPath,
}

impl RunFile {
    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn rows(&self) -> u64 {
        self.meta.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open an independent cursor over the run.
    pub fn open(&self) -> Result<RunReader> {
        let file = File::open(&self.path).map_err(|e| Error::io("open run file", e))?;
        Ok(RunReader {
            name: self.meta.name.0.clone(),
            input: BufReader::new(file),
            hasher: blake3::Hasher::new(),
            expected: self.meta.checksum,
            blocks_left: self.meta.blocks,
            pending: Vec::new().into_iter(),
            failed: false,
        })
    }
}

impl fmt::Debug for RunFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunFile")
            .field("meta", &self.meta)
            .field("path", &self.path.display())
            .finish()
    }
}

/// Streaming cursor over one run: holds at most one decoded block.
///
/// The checksum is verified when the last block has been read; a mismatch is
/// yielded as the final item.
pub struct RunReader {
    name: String,
    input: BufReader<File>,
    hasher: blake3::Hasher,
    expected: [u8; 32],
    blocks_left: u32,
    pending: std::vec::IntoIter<Row>,
    failed: bool,
}

impl RunReader {
    fn read_block(&mut self) -> Result<Vec<Row>> {
        let mut header_bytes = [0u8; HEADER_LEN];
        self.input
            .read_exact(&mut header_bytes)
            .map_err(|e| Error::io("read block header", e))?;
        let header = BlockHeader::from_bytes(&header_bytes)?;
        let mut payload = vec![0u8; header.compressed_len as usize];
        self.input
            .read_exact(&mut payload)
            .map_err(|e| Error::io("read block payload", e))?;
        self.hasher.update(&header_bytes);
        self.hasher.update(&payload);
        self.blocks_left -= 1;

        if self.blocks_left == 0 {
            let computed: [u8; 32] = self.hasher.finalize().into();
            if computed != self.expected {
                return Err(Error::ChecksumMismatch(self.name.clone()));
            }
        }

        let raw = header.codec.decode(&payload)?;
        if raw.len() != header.uncompressed_len as usize {
            return Err(Error::Codec(format!(
                "block decoded to {} bytes, expected {}",
                raw.len(),
                header.uncompressed_len
            )));
        }
        let rows: Vec<Row> = postcard::from_bytes(&raw)
            .map_err(|e| Error::Codec(format!("postcard decode: {e}")))?;
        if rows.len() != header.rows as usize {
            return Err(Error::Codec("block row count mismatch".into()));
        }
        Ok(rows)
    }
}

impl Iterator for RunReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.next() {
                return Some(Ok(row));
            }
            if self.failed || self.blocks_left == 0 {
                return None;
            }
            match self.read_block() {
                Ok(rows) => self.pending = rows.into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::row;
    use tabflow_core::value::Value;

    fn rows(n: i64) -> Vec<Row> {
        (0..n)
            .map(|i| row![i, format!("name-{i}"), i as f64 / 3.0, Value::Null])
            .collect()
    }

    #[test]
    fn run_reads_back_in_order_across_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SpillManager::new(dir.path(), Codec::None).with_block_rows(3);
        let input = rows(10);
        let run = mgr.write_run(&input).unwrap();
        assert_eq!(run.meta().blocks, 4);
        let back: Vec<Row> = run.open().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn cursors_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SpillManager::new(dir.path(), Codec::None).with_block_rows(2);
        let run = mgr.write_run(&rows(5)).unwrap();
        let mut a = run.open().unwrap();
        let mut b = run.open().unwrap();
        a.next();
        a.next();
        assert_eq!(b.next().unwrap().unwrap()[0], Value::from(0));
        assert_eq!(a.next().unwrap().unwrap()[0], Value::from(2));
    }

    #[test]
    fn nan_survives_spill() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SpillManager::new(dir.path(), Codec::None);
        let run = mgr.write_run(&[row![f64::NAN]]).unwrap();
        let back: Vec<Row> = run.open().unwrap().collect::<Result<_>>().unwrap();
        assert!(matches!(back[0][0], Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SpillManager::new(dir.path(), Codec::None);
        let run = mgr.write_run(&rows(3)).unwrap();
        let path = run.path().to_path_buf();
        assert!(path.exists());
        drop(run);
        assert!(!path.exists());
    }

    #[test]
    fn corruption_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SpillManager::new(dir.path(), Codec::None);
        let run = mgr.write_run(&rows(4)).unwrap();
        let mut bytes = std::fs::read(run.path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(run.path(), &bytes).unwrap();
        let res: Result<Vec<Row>> = run.open().unwrap().collect();
        assert!(res.is_err());
    }

    #[test]
    fn empty_run_has_no_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SpillManager::new(dir.path(), Codec::None);
        let run = mgr.write_run(&[]).unwrap();
        assert_eq!(run.meta().blocks, 0);
        assert_eq!(run.open().unwrap().count(), 0);
    }
}
