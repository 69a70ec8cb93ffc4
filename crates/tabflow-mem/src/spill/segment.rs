//! Block framing and run metadata.
//!
//! A run file is a sequence of blocks. Each block on disk:
//! [ magic: u32 ][ version: u16 ][ codec: u8 ][ reserved: u8 ]
//! [ rows: u32 ][ uncompressed_len: u32 ][ compressed_len: u32 ]
//! [ payload bytes … ]
//!
//! The run checksum is blake3 over every (header || payload) in order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use super::Codec;
use crate::error::{Error, Result};

pub const MAGIC: u32 = 0x5446_5250; // "TFRP"
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 1 + 1 + 4 + 4 + 4;

/// Upper bound on a single block payload; anything larger is corruption.
pub const MAX_BLOCK_BYTES: u32 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub codec: Codec,
    pub rows: u32,
    pub uncompressed_len: u32,
    pub compressed_len: u32,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        out[4..6].copy_from_slice(&VERSION.to_le_bytes());
        out[6] = self.codec as u8;
        // out[7] reserved
        out[8..12].copy_from_slice(&self.rows.to_le_bytes());
        out[12..16].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        out[16..20].copy_from_slice(&self.compressed_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let magic = u32_at(0);
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if magic != MAGIC || version != VERSION {
            return Err(Error::Storage("bad magic/version".into()));
        }
        let header = Self {
            codec: Codec::from_u8(bytes[6])?,
            rows: u32_at(8),
            uncompressed_len: u32_at(12),
            compressed_len: u32_at(16),
        };
        header.validate_sizes()?;
        Ok(header)
    }

    /// Reject sizes that would cause excessive allocations on corrupted data.
    pub fn validate_sizes(&self) -> Result<()> {
        if self.uncompressed_len > MAX_BLOCK_BYTES || self.compressed_len > MAX_BLOCK_BYTES {
            return Err(Error::Storage(format!(
                "block sizes {}/{} exceed max {}",
                self.compressed_len, self.uncompressed_len, MAX_BLOCK_BYTES
            )));
        }
        if self.codec == Codec::None && self.compressed_len != self.uncompressed_len {
            return Err(Error::Storage(
                "uncompressed block with differing lengths".into(),
            ));
        }
        Ok(())
    }
}

/// Process-unique id of one sort invocation's run set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpillId(u64);

static NEXT_SPILL: AtomicU64 = AtomicU64::new(1);

impl SpillId {
    pub fn next() -> Self {
        Self(NEXT_SPILL.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Human-friendly name for a run, derived from a spill id and a run index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentName(pub String);

impl SegmentName {
    pub fn new(id: SpillId, run_index: u32) -> Self {
        SegmentName(format!("spill{}_run{}", id.get(), run_index))
    }
}

/// What the engine keeps about a spilled run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub name: SegmentName,
    pub codec: Codec,
    pub rows: u64,
    pub blocks: u32,
    pub bytes: u64,
    pub checksum: [u8; 32],
}
