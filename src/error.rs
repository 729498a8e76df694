use std::io;

use thiserror::Error;

/// Failure kinds surfaced by the card driver, the FAT32 engine and the
/// tree copier. Transport-level I/O bubbles up through `Bus`; host-side
/// write failures are wrapped in `Sink` so the two directions stay
/// distinguishable in reports.
#[derive(Debug, Error)]
pub enum Error {
    #[error("SD card not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    #[error("bus I/O error: {0}")]
    Bus(#[from] io::Error),

    #[error("read of sector {lba} failed (response {code:#04x})")]
    ReadFailed { lba: u32, code: u8 },

    #[error("bad on-media structure: {0}")]
    BadMagic(&'static str),

    #[error("cluster chain ended early at cluster {cluster}")]
    ChainTruncated { cluster: u32 },

    #[error("file of {size} bytes exceeds the {max} byte transfer limit")]
    FileTooLarge { size: u32, max: u64 },

    #[error("entry is a directory, not a file")]
    NotFile,

    #[error("reconstructed path of {len} bytes exceeds the {max} byte limit")]
    PathTooLong { len: usize, max: usize },

    #[error("host filesystem error: {0}")]
    Sink(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
