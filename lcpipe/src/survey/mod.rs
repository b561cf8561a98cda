//! Survey tile discovery.
//!
//! A [`Tile`] is one partitioned unit of the input collection. The
//! [`TileEnumerator`] discovers the set of tiles to process, subtracts
//! already-completed work, and slices the list for sharded job submissions.

mod enumerator;
mod tile;

pub use enumerator::{
    Discovery, EnumerationError, EnumerationMode, Shard, TileEnumerator, DEFAULT_TILE_PATTERN,
};
pub use tile::Tile;
