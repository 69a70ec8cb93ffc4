//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rows held in memory by a sort before a sorted run is spilled to disk.
    pub sort_buffer_rows: usize,

    /// Directory for spill files. `None` uses the system temp dir.
    pub spill_dir: Option<String>,

    /// Reuse spilled sort results across iterations when the source is cacheable.
    pub sort_cache: bool,

    /// Rows read by discovery passes (recast, unpackdict).
    pub sample_size: usize,

    /// Rows per encoded block inside a spill file.
    pub spill_block_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sort_buffer_rows: 100_000,
            spill_dir: None,
            sort_cache: true,
            sample_size: 1000,
            spill_block_rows: 1024,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `TABFLOW_SORT_BUFFER_ROWS`: in-memory sort buffer (rows)
    /// - `TABFLOW_SPILL_DIR`: spill directory
    /// - `TABFLOW_SORT_CACHE`: `0`/`false` disables sort result caching
    /// - `TABFLOW_SAMPLE_SIZE`: discovery pass sample size
    /// - `TABFLOW_SPILL_BLOCK_ROWS`: rows per spill block
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("TABFLOW_SORT_BUFFER_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.sort_buffer_rows = v.max(1);
            }
        }

        if let Ok(s) = std::env::var("TABFLOW_SPILL_DIR") {
            if !s.trim().is_empty() {
                cfg.spill_dir = Some(s);
            }
        }

        if let Ok(s) = std::env::var("TABFLOW_SORT_CACHE") {
            cfg.sort_cache = !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }

        if let Ok(s) = std::env::var("TABFLOW_SAMPLE_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.sample_size = v;
            }
        }

        if let Ok(s) = std::env::var("TABFLOW_SPILL_BLOCK_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.spill_block_rows = v.max(1);
            }
        }

        cfg
    }

    /// Resolved spill directory.
    pub fn spill_path(&self) -> std::path::PathBuf {
        match &self.spill_dir {
            Some(dir) => std::path::PathBuf::from(dir),
            None => std::env::temp_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.sort_buffer_rows, 100_000);
        assert!(cfg.sort_cache);
        assert_eq!(cfg.spill_path(), std::env::temp_dir());
    }

    #[test]
    fn serde_round_trips() {
        let cfg = EngineConfig {
            spill_dir: Some("/data/spill".into()),
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
