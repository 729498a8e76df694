//! In-memory FAT32 card images for tests: a sparse sector map behind the
//! `BlockDevice` trait plus a builder that lays down the MBR, BPB, FAT and
//! directory clusters.

use std::collections::HashMap;

use crate::error::Result;
use crate::sd::{BlockDevice, Sector, SECTOR_SIZE};

use super::{ATTR_VOLUME_ID, DIR_RECORD_SIZE, EOC_MIN};

pub(crate) struct MemDevice {
    sectors: HashMap<u32, Sector>,
}

impl BlockDevice for MemDevice {
    fn read_sector(&mut self, lba: u32) -> Result<Sector> {
        Ok(self.sectors.get(&lba).copied().unwrap_or([0u8; SECTOR_SIZE]))
    }
}

pub(crate) fn dir_record(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut rec = [0u8; DIR_RECORD_SIZE];
    rec[0..11].copy_from_slice(name);
    rec[0x0B] = attr;
    rec[0x14..0x16].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    rec[0x1A..0x1C].copy_from_slice(&(cluster as u16).to_le_bytes());
    rec[0x1C..0x20].copy_from_slice(&size.to_le_bytes());
    rec
}

pub(crate) struct ImageBuilder {
    partition_lba: u32,
    reserved_sectors: u16,
    number_of_fats: u8,
    sectors_per_fat: u32,
    spc: u8,
    root_cluster: u32,
    fat: HashMap<u32, u32>,
    cluster_bytes: HashMap<u32, Vec<u8>>,
    root_records: Vec<[u8; 32]>,
    corrupt_mbr: bool,
}

impl ImageBuilder {
    pub fn new() -> Self {
        let mut fat = HashMap::new();
        fat.insert(2u32, EOC_MIN | 0x7); // root directory, single cluster
        ImageBuilder {
            partition_lba: 2048,
            reserved_sectors: 32,
            number_of_fats: 2,
            sectors_per_fat: 0x1000,
            spc: 8,
            root_cluster: 2,
            fat,
            cluster_bytes: HashMap::new(),
            root_records: Vec::new(),
            corrupt_mbr: false,
        }
    }

    pub fn sectors_per_cluster(mut self, spc: u8) -> Self {
        self.spc = spc;
        self
    }

    pub fn corrupt_mbr_signature(mut self) -> Self {
        self.corrupt_mbr = true;
        self
    }

    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        self.fat.insert(cluster, value);
    }

    /// Records placed in the root directory after the volume-label record.
    pub fn set_root_records(&mut self, records: &[[u8; 32]]) {
        self.root_records = records.to_vec();
    }

    /// Records forming the content of a subdirectory cluster. The caller
    /// is responsible for the matching FAT entry.
    pub fn set_cluster_records(&mut self, cluster: u32, records: &[[u8; 32]]) {
        let mut bytes = Vec::new();
        for rec in records {
            bytes.extend_from_slice(rec);
        }
        self.cluster_bytes.insert(cluster, bytes);
    }

    /// Raw file content for a cluster, laid out from its first sector.
    pub fn fill_cluster(&mut self, cluster: u32, data: &[u8]) {
        self.cluster_bytes.insert(cluster, data.to_vec());
    }

    fn fat_begin(&self) -> u32 {
        self.partition_lba + self.reserved_sectors as u32
    }

    fn data_begin(&self) -> u32 {
        self.fat_begin() + self.number_of_fats as u32 * self.sectors_per_fat
    }

    fn cluster_lba(&self, cluster: u32) -> u32 {
        self.data_begin() + (cluster - 2) * self.spc as u32
    }

    pub fn build(self) -> MemDevice {
        let mut sectors: HashMap<u32, Sector> = HashMap::new();

        // MBR: first-partition LBA and the boot signature
        let mut mbr = [0u8; SECTOR_SIZE];
        mbr[0x1C6..0x1CA].copy_from_slice(&self.partition_lba.to_le_bytes());
        if !self.corrupt_mbr {
            mbr[510] = 0x55;
            mbr[511] = 0xAA;
        }
        sectors.insert(0, mbr);

        // BPB
        let mut bpb = [0u8; SECTOR_SIZE];
        bpb[0x0B..0x0D].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
        bpb[0x0D] = self.spc;
        bpb[0x0E..0x10].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        bpb[0x10] = self.number_of_fats;
        bpb[0x24..0x28].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
        bpb[0x2C..0x30].copy_from_slice(&self.root_cluster.to_le_bytes());
        bpb[510] = 0x55;
        bpb[511] = 0xAA;
        sectors.insert(self.partition_lba, bpb);

        // FAT entries, first copy only (the engine never reads the second)
        for (&cluster, &value) in &self.fat {
            let lba = self.fat_begin() + (cluster >> 7);
            let sector = sectors.entry(lba).or_insert([0u8; SECTOR_SIZE]);
            let offset = (cluster & 0x7F) as usize * 4;
            sector[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }

        // Root directory: volume label, then the configured records
        let mut root = Vec::new();
        root.extend_from_slice(&dir_record(b"NO NAME    ", ATTR_VOLUME_ID, 0, 0));
        for rec in &self.root_records {
            root.extend_from_slice(rec);
        }

        let mut cluster_bytes = self.cluster_bytes.clone();
        cluster_bytes.insert(self.root_cluster, root);

        for (&cluster, bytes) in &cluster_bytes {
            let base = self.cluster_lba(cluster);
            for (i, chunk) in bytes.chunks(SECTOR_SIZE).enumerate() {
                let mut sector = [0u8; SECTOR_SIZE];
                sector[..chunk.len()].copy_from_slice(chunk);
                sectors.insert(base + i as u32, sector);
            }
        }

        MemDevice { sectors }
    }
}
