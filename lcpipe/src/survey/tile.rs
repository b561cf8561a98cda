//! Tile identity and backing data handle.

use std::path::{Path, PathBuf};

/// One partitioned unit of the input survey data.
///
/// Immutable once enumerated: discovered by the enumerator, consumed exactly
/// once per successful run by a worker, never mutated. The id is the file
/// stem (`n512_3.hdf5` → `n512_3`) and is the key used throughout the
/// checkpoint documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    id: String,
    path: PathBuf,
}

impl Tile {
    /// Create a tile from its backing file path.
    ///
    /// Returns `None` if the path has no usable file stem.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let id = path.file_stem()?.to_str()?.to_string();
        Some(Self { id, path })
    }

    /// Checkpoint key for this tile.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path to the tile's backing data container.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_file_stem() {
        let tile = Tile::from_path(PathBuf::from("/data/tiles/n512_3.hdf5")).unwrap();
        assert_eq!(tile.id(), "n512_3");
        assert_eq!(tile.path(), Path::new("/data/tiles/n512_3.hdf5"));
    }

    #[test]
    fn test_stemless_path_rejected() {
        assert!(Tile::from_path(PathBuf::from("/")).is_none());
    }
}
