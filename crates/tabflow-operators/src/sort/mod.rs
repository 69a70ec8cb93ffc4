//! Sorting: the `sort` view and the sorted-input plumbing shared by every
//! order-dependent operator.
//!
//! Rows are buffered up to `buffer_rows`; each full buffer is sorted and
//! spilled as a run. When nothing was spilled the result is an in-memory
//! sorted sequence, otherwise the runs and the final buffer are merged.
//!
//! With caching enabled and a source that can fingerprint itself, the sorted
//! result is kept under `hash(source tag, key, reverse)` and reused by later
//! iterations (and by any other view sharing the same cache store).

pub mod cache;
pub mod external;
pub mod run;

use std::path::PathBuf;
use std::sync::Arc;

use tabflow_core::config::EngineConfig;
use tabflow_core::error::Result;
use tabflow_core::field::KeySpec;
use tabflow_core::hash::{Fingerprint, Hash256};
use tabflow_core::table::{RowIter, SharedTable, Table};
use tabflow_mem::Codec;
use tracing::debug;

pub use cache::SortCache;
pub use external::{sort_table, SortedData};
use run::RunGenConfig;

#[derive(Debug, Clone)]
pub struct SortOptions {
    /// Rows per in-memory buffer; `None` sorts entirely in memory.
    pub buffer_rows: Option<usize>,
    pub spill_dir: PathBuf,
    /// Reuse sorted results when the source is cacheable.
    pub cache: bool,
    pub codec: Codec,
    pub block_rows: usize,
    /// Shared cache store; views create a private one when unset.
    pub cache_store: Option<Arc<SortCache>>,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SortOptions {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            buffer_rows: Some(cfg.sort_buffer_rows),
            spill_dir: cfg.spill_path(),
            cache: cfg.sort_cache,
            codec: Codec::None,
            block_rows: cfg.spill_block_rows,
            cache_store: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            buffer_rows: None,
            ..Self::default()
        }
    }

    pub fn buffer_rows(mut self, rows: Option<usize>) -> Self {
        self.buffer_rows = rows;
        self
    }

    pub fn spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = dir.into();
        self
    }

    pub fn cache(mut self, on: bool) -> Self {
        self.cache = on;
        self
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_cache_store(mut self, store: Arc<SortCache>) -> Self {
        self.cache_store = Some(store);
        self
    }

    fn run_config(&self) -> RunGenConfig {
        RunGenConfig {
            max_in_mem_rows: self.buffer_rows,
            spill_dir: self.spill_dir.clone(),
            codec: self.codec,
            block_rows: self.block_rows,
        }
    }
}

/// Fingerprint of a sorted view of a source.
pub(crate) fn sort_tag(source_tag: Hash256, key: &KeySpec, reverse: bool) -> Result<Hash256> {
    Ok(Fingerprint::new("sort")
        .tag(source_tag)
        .serde(key)?
        .flag(reverse)
        .finish())
}

/// Produces sorted passes over a source, consulting a cache when allowed.
///
/// Embedded by every operator that needs key-ordered input.
#[derive(Debug, Clone)]
pub struct Sorter {
    opts: SortOptions,
    cache: Arc<SortCache>,
    presorted: bool,
}

impl Sorter {
    pub fn new(opts: SortOptions) -> Self {
        Self::with_slots(opts, 1)
    }

    /// A sorter whose private cache keeps `slots` sorted results, for
    /// operators that sort more than one source per pass.
    pub fn with_slots(opts: SortOptions, slots: usize) -> Self {
        let cache = opts
            .cache_store
            .clone()
            .unwrap_or_else(|| SortCache::shared(slots.max(1)));
        Self {
            opts,
            cache,
            presorted: false,
        }
    }

    /// Trust the source to already be ordered by the requested key.
    pub fn presorted(mut self, presorted: bool) -> Self {
        self.presorted = presorted;
        self
    }

    pub fn options(&self) -> &SortOptions {
        &self.opts
    }

    pub fn is_presorted(&self) -> bool {
        self.presorted
    }

    /// A pass over `source` ordered by `key`.
    pub fn iter<'a>(
        &self,
        source: &'a dyn Table,
        key: &KeySpec,
        reverse: bool,
    ) -> Result<RowIter<'a>> {
        if self.presorted {
            return source.iter();
        }
        Ok(self.sorted(source, key, reverse)?.rows()?)
    }

    /// The sorted copy of `source`, from the cache when possible.
    pub fn sorted(&self, source: &dyn Table, key: &KeySpec, reverse: bool) -> Result<Arc<SortedData>> {
        let tag = if self.opts.cache {
            match source.cachetag() {
                Ok(src) => Some(sort_tag(src, key, reverse)?),
                Err(e) if e.is_uncacheable() => {
                    debug!("source uncacheable, sorting without cache");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        if let Some(tag) = &tag {
            if let Some(hit) = self.cache.get(tag) {
                debug!(tag = %tag, "sort cache hit");
                return Ok(hit);
            }
            debug!(tag = %tag, "sort cache miss");
        }

        let data = Arc::new(sort_table(source, key, reverse, self.opts.run_config())?);
        if let Some(tag) = tag {
            self.cache.put(tag, Arc::clone(&data));
        }
        Ok(data)
    }
}

/// Sorted view of a table.
pub struct SortView {
    source: SharedTable,
    key: KeySpec,
    reverse: bool,
    sorter: Sorter,
}

impl SortView {
    pub fn new(source: SharedTable, key: impl Into<KeySpec>) -> Self {
        Self {
            source,
            key: key.into(),
            reverse: false,
            sorter: Sorter::new(SortOptions::default()),
        }
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn options(mut self, opts: SortOptions) -> Self {
        self.sorter = Sorter::new(opts);
        self
    }

    pub fn key(&self) -> &KeySpec {
        &self.key
    }
}

impl Table for SortView {
    fn iter(&self) -> Result<RowIter<'_>> {
        self.sorter.iter(self.source.as_ref(), &self.key, self.reverse)
    }

    fn cachetag(&self) -> Result<Hash256> {
        sort_tag(self.source.cachetag()?, &self.key, self.reverse)
    }
}

/// `sort(table, key)` with default options.
pub fn sort(source: SharedTable, key: impl Into<KeySpec>) -> SharedTable {
    Arc::new(SortView::new(source, key))
}
