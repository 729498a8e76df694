use serde::Deserialize;

// On-media layout
pub const DIR_RECORD_SIZE: usize = 32;
pub const RECORDS_PER_SECTOR: usize = 16;

// FAT entry sentinels: the low 28 bits are significant, but the raw word
// is compared against the end-of-chain threshold as-is.
pub const EOC_MIN: u32 = 0x0FFF_FFF8;
pub const MAX_DATA_CLUSTER: u32 = 0x0FFF_FFEF;

// Attribute bits of a directory record
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_LONG_NAME: u8 = 0x0F;

/// Bounded-table caps inherited from the original memory-constrained
/// design, surfaced as configuration. The caps still gate the
/// too-large/overflow contracts even though the containers grow.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Longest cluster chain a single walk will materialize.
    pub max_chain_clusters: usize,
    /// Directory entries listed per folder before truncation.
    pub max_dir_entries: usize,
    /// Folders enumerated per subtree copy before truncation.
    pub max_tree_folders: usize,
    /// Longest reconstructed relative path, in bytes.
    pub max_path_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_chain_clusters: 1024,
            max_dir_entries: 128,
            max_tree_folders: 64,
            max_path_len: 80,
        }
    }
}

pub mod dir;
pub mod partition;
pub mod volume;

#[cfg(test)]
pub(crate) mod fixture;

pub use dir::{FileEntry, Folder};
pub use partition::Partition;
pub use volume::Volume;
