use std::io::Write;

use log::warn;

use super::dir::{listing_order, FileEntry, Folder};
use super::partition::{read_u32, Partition};
use super::{
    Limits, ATTR_LONG_NAME, ATTR_VOLUME_ID, DIR_RECORD_SIZE, EOC_MIN, RECORDS_PER_SECTOR,
};
use crate::error::{Error, Result};
use crate::sd::{BlockDevice, SECTOR_SIZE};

// FAT entries are 4 bytes, so a 512-byte FAT sector holds 128 of them.
const FAT_ENTRIES_PER_SECTOR_SHIFT: u32 = 7;
const FAT_ENTRY_INDEX_MASK: u32 = 0x7F;

/// A mounted FAT32 volume: the block device plus its partition geometry.
/// All reads share one sector buffer inside the device, so every cluster
/// chain is materialized in full before any data sector is touched.
pub struct Volume<D: BlockDevice> {
    dev: D,
    partition: Partition,
    limits: Limits,
}

impl<D: BlockDevice> Volume<D> {
    pub fn mount(mut dev: D, limits: Limits) -> Result<Self> {
        let partition = Partition::mount(&mut dev)?;
        Ok(Volume {
            dev,
            partition,
            limits,
        })
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Follow the FAT from `start` and collect the cluster chain in order.
    /// The walk ends at an end-of-chain mark or a free entry; it is capped
    /// at `max_chain_clusters`, with truncation left to the caller to
    /// detect against the expected byte count.
    pub fn cluster_chain(&mut self, start: u32) -> Result<Vec<u32>> {
        let mut chain = Vec::new();
        let mut cluster = start;

        while cluster != 0 && cluster < EOC_MIN {
            if chain.len() >= self.limits.max_chain_clusters {
                warn!(
                    "cluster chain from {} truncated at {} clusters",
                    start, chain.len()
                );
                break;
            }
            chain.push(cluster);

            let fat_lba = self.partition.fat_begin_lba + (cluster >> FAT_ENTRIES_PER_SECTOR_SHIFT);
            let fat_sector = self.dev.read_sector(fat_lba)?;
            let index = (cluster & FAT_ENTRY_INDEX_MASK) as usize;
            cluster = read_u32(&fat_sector, index * 4);
        }

        Ok(chain)
    }

    /// Decode every live 8.3 record in a directory, then sort: directories
    /// first, then files, each group by raw name. `.` and `..` are kept.
    pub fn list_dir(&mut self, folder: &Folder) -> Result<Vec<FileEntry>> {
        let first_cluster = self.resolve_root(folder.first_cluster);
        let chain = self.cluster_chain(first_cluster)?;

        let mut entries = Vec::new();
        'scan: for &cluster in &chain {
            for sector in 0..self.partition.sectors_per_cluster {
                let lba = self.partition.sector_of(cluster, sector);
                let data = self.dev.read_sector(lba)?;

                for slot in 0..RECORDS_PER_SECTOR {
                    let record = &data[slot * DIR_RECORD_SIZE..(slot + 1) * DIR_RECORD_SIZE];
                    match record[0] {
                        0x00 => break 'scan, // end of directory
                        0xE5 => continue,    // unused slot
                        _ => {}
                    }
                    let attributes = record[0x0B];
                    if attributes & ATTR_LONG_NAME == ATTR_LONG_NAME {
                        continue; // VFAT long-name fragment
                    }
                    if attributes & ATTR_VOLUME_ID != 0 {
                        continue; // volume label record
                    }

                    if entries.len() >= self.limits.max_dir_entries {
                        warn!(
                            "directory listing capped at {} entries",
                            self.limits.max_dir_entries
                        );
                        break 'scan;
                    }
                    entries.push(FileEntry::from_record(record));
                }
            }
        }

        entries.sort_by(listing_order);
        Ok(entries)
    }

    /// Stream a file's content into `sink`, honoring the logical file size:
    /// full sectors until fewer than 512 bytes remain, then one terminal
    /// residual write.
    pub fn stream_file<W: Write>(&mut self, entry: &FileEntry, sink: &mut W) -> Result<u64> {
        if entry.is_dir() {
            return Err(Error::NotFile);
        }

        let max = SECTOR_SIZE as u64
            * self.partition.sectors_per_cluster as u64
            * self.limits.max_chain_clusters as u64;
        if entry.size as u64 > max {
            return Err(Error::FileTooLarge {
                size: entry.size,
                max,
            });
        }

        if entry.size == 0 || entry.first_cluster == 0 {
            return Ok(0);
        }

        let chain = self.cluster_chain(entry.first_cluster)?;
        let size = entry.size as u64;
        let mut written: u64 = 0;

        'copy: for &cluster in &chain {
            for sector in 0..self.partition.sectors_per_cluster {
                let lba = self.partition.sector_of(cluster, sector);
                let data = self.dev.read_sector(lba)?;

                let remaining = size - written;
                if remaining > SECTOR_SIZE as u64 {
                    sink.write_all(&data).map_err(Error::Sink)?;
                    written += SECTOR_SIZE as u64;
                } else {
                    sink.write_all(&data[..remaining as usize])
                        .map_err(Error::Sink)?;
                    written = size;
                    break 'copy;
                }
            }
        }

        if written < size {
            return Err(Error::ChainTruncated {
                cluster: chain.last().copied().unwrap_or(entry.first_cluster),
            });
        }
        Ok(written)
    }

    fn resolve_root(&self, cluster: u32) -> u32 {
        if cluster == 0 {
            self.partition.root_dir_first_cluster
        } else {
            cluster
        }
    }
}
