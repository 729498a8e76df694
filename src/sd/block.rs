use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::SECTOR_SIZE;
use crate::error::{Error, Result};

pub type Sector = [u8; SECTOR_SIZE];

/// A source of 512-byte sectors addressed by LBA. Returning the sector by
/// value keeps the one-buffer-in-flight rule enforceable: nothing borrowed
/// from a previous read can survive the next one.
pub trait BlockDevice {
    fn read_sector(&mut self, lba: u32) -> Result<Sector>;
}

/// Raw SD card image in a host file, sector N at byte offset N * 512.
/// Stands in for the physical card when testing or working offline.
pub struct ImageDevice {
    file: File,
}

impl ImageDevice {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(ImageDevice {
            file: File::open(path)?,
        })
    }
}

impl BlockDevice for ImageDevice {
    fn read_sector(&mut self, lba: u32) -> Result<Sector> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.file.seek(SeekFrom::Start(lba as u64 * SECTOR_SIZE as u64))?;
        self.file
            .read_exact(&mut sector)
            .map_err(|_| Error::ReadFailed { lba, code: 0xFF })?;
        Ok(sector)
    }
}
