//! File checksums used to fingerprint file-backed sources.
//!
//! Three interchangeable strategies, strongest first:
//! - [`Sha256Sum`]: full-content SHA-256.
//! - [`Blake3Sum`]: full-content BLAKE3 (much faster on large files).
//! - [`StatSum`]: absolute path, size and mtime only; never reads the file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use blake3::Hasher;
use sha2::{Digest, Sha256};
use tabflow_core::hash::Hash256;

use crate::error::Result;

const CHUNK: usize = 64 * 1024;

/// Summarize a file's content or identity.
pub trait Checksum: Send + Sync {
    fn checksum(&self, path: &Path) -> Result<Hash256>;

    /// Short stable name, folded into fingerprints so switching strategy
    /// invalidates cached results.
    fn name(&self) -> &'static str;
}

fn for_each_chunk(path: &Path, mut f: impl FnMut(&[u8])) -> Result<()> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        f(&buf[..n]);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Sum;

impl Checksum for Sha256Sum {
    fn checksum(&self, path: &Path) -> Result<Hash256> {
        let mut h = Sha256::new();
        for_each_chunk(path, |chunk| h.update(chunk))?;
        let digest = h.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Ok(Hash256(out))
    }

    fn name(&self) -> &'static str {
        "sha256"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Sum;

impl Checksum for Blake3Sum {
    fn checksum(&self, path: &Path) -> Result<Hash256> {
        let mut h = Hasher::new();
        for_each_chunk(path, |chunk| {
            h.update(chunk);
        })?;
        Ok(Hash256(h.finalize().into()))
    }

    fn name(&self) -> &'static str {
        "blake3"
    }
}

/// Pseudo-ETag: hash(size || mtime || absolute path).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatSum;

impl Checksum for StatSum {
    fn checksum(&self, path: &Path) -> Result<Hash256> {
        let meta = std::fs::metadata(path)?;
        let abs = std::fs::canonicalize(path)?;
        let mut h = Hasher::new();
        h.update(&meta.len().to_le_bytes());
        if let Ok(m) = meta.modified() {
            if let Ok(d) = m.duration_since(std::time::SystemTime::UNIX_EPOCH) {
                h.update(&d.as_secs().to_le_bytes());
                h.update(&d.subsec_nanos().to_le_bytes());
            }
        }
        h.update(abs.to_string_lossy().as_bytes());
        Ok(Hash256(h.finalize().into()))
    }

    fn name(&self) -> &'static str {
        "stat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn content_sums_follow_content() {
        let a = file_with(b"a,b\n1,2\n");
        let b = file_with(b"a,b\n1,2\n");
        let c = file_with(b"a,b\n1,3\n");
        for sum in [&Sha256Sum as &dyn Checksum, &Blake3Sum] {
            assert_eq!(sum.checksum(a.path()).unwrap(), sum.checksum(b.path()).unwrap());
            assert_ne!(sum.checksum(a.path()).unwrap(), sum.checksum(c.path()).unwrap());
        }
    }

    #[test]
    fn sha256_of_known_input() {
        let f = file_with(b"abc");
        assert_eq!(
            Sha256Sum.checksum(f.path()).unwrap().to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn stat_sum_depends_on_path() {
        let a = file_with(b"same");
        let b = file_with(b"same");
        assert_eq!(StatSum.checksum(a.path()).unwrap(), StatSum.checksum(a.path()).unwrap());
        assert_ne!(StatSum.checksum(a.path()).unwrap(), StatSum.checksum(b.path()).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(StatSum.checksum(Path::new("/definitely/not/here.csv")).is_err());
    }
}
