//! Views that restructure the row/column layout.
//!
//! `recast`, `pivot` and `unpackdict` (without explicit keys) open the source
//! twice per pass: once to discover the output columns, once to produce
//! rows. An expensive upstream pipeline is therefore evaluated twice; put a
//! cacheable stage (or a `MemTable`) in front when that matters.

pub mod melt;
pub mod pivot;
pub mod recast;
pub mod transpose;
pub mod unpack;

pub use melt::{melt, MeltView};
pub use pivot::{pivot, PivotView};
pub use recast::{recast, RecastView};
pub use transpose::{transpose, TransposeView};
pub use unpack::{unpack, unpackdict, NewFields, UnpackDictView, UnpackView};
