use log::info;

use crate::error::{Error, Result};
use crate::sd::BlockDevice;

// MBR layout
const MBR_SIGNATURE_OFFSET: usize = 510;
const FIRST_PARTITION_LBA_OFFSET: usize = 0x1C6;

// BPB field offsets within the partition's first sector
const BPB_BYTES_PER_SECTOR: usize = 0x0B;
const BPB_SECTORS_PER_CLUSTER: usize = 0x0D;
const BPB_RESERVED_SECTORS: usize = 0x0E;
const BPB_NUMBER_OF_FATS: usize = 0x10;
const BPB_SECTORS_PER_FAT32: usize = 0x24;
const BPB_ROOT_DIR_CLUSTER: usize = 0x2C;

/// FAT32 partition geometry, computed once at mount and immutable until
/// the card is dismounted.
#[derive(Debug, Clone)]
pub struct Partition {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub number_of_fats: u8,
    pub sectors_per_fat: u32,
    pub root_dir_first_cluster: u32,
    pub fat_begin_lba: u32,
    pub data_begin_lba: u32,
    pub root_dir_lba: u32,
    pub volume_label: [u8; 11],
}

impl Partition {
    /// Probe the first MBR partition and decode its BPB. Repeating the
    /// mount re-reads everything; nothing is cached across mounts.
    pub fn mount<D: BlockDevice>(dev: &mut D) -> Result<Self> {
        let mbr = dev.read_sector(0)?;
        if mbr[MBR_SIGNATURE_OFFSET] != 0x55 || mbr[MBR_SIGNATURE_OFFSET + 1] != 0xAA {
            return Err(Error::BadMagic("boot sector signature"));
        }

        let partition_lba = read_u32(&mbr, FIRST_PARTITION_LBA_OFFSET);

        let bpb = dev.read_sector(partition_lba)?;
        let bytes_per_sector = read_u16(&bpb, BPB_BYTES_PER_SECTOR);
        let sectors_per_cluster = bpb[BPB_SECTORS_PER_CLUSTER];
        let reserved_sectors = read_u16(&bpb, BPB_RESERVED_SECTORS);
        let number_of_fats = bpb[BPB_NUMBER_OF_FATS];
        let sectors_per_fat = read_u32(&bpb, BPB_SECTORS_PER_FAT32);
        let root_dir_first_cluster = read_u32(&bpb, BPB_ROOT_DIR_CLUSTER);

        if bytes_per_sector as usize != crate::sd::SECTOR_SIZE {
            return Err(Error::BadMagic("unsupported sector size"));
        }
        if !sectors_per_cluster.is_power_of_two() {
            return Err(Error::BadMagic("sectors per cluster"));
        }

        let fat_begin_lba = partition_lba + reserved_sectors as u32;
        let data_begin_lba = fat_begin_lba + number_of_fats as u32 * sectors_per_fat;

        let mut partition = Partition {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            number_of_fats,
            sectors_per_fat,
            root_dir_first_cluster,
            fat_begin_lba,
            data_begin_lba,
            root_dir_lba: 0,
            volume_label: [0u8; 11],
        };
        partition.root_dir_lba = partition.sector_of(root_dir_first_cluster, 0);

        // the first record of the root directory carries the volume label
        let root = dev.read_sector(partition.root_dir_lba)?;
        partition.volume_label.copy_from_slice(&root[0..11]);

        info!(
            "mounted FAT32 partition at LBA {}: {} sectors/cluster, FAT at {}, data at {}",
            partition_lba, sectors_per_cluster, fat_begin_lba, data_begin_lba
        );

        Ok(partition)
    }

    /// LBA of sector `sector` within data cluster `cluster` (numbering
    /// starts at 2).
    pub fn sector_of(&self, cluster: u32, sector: u8) -> u32 {
        self.data_begin_lba + (cluster - 2) * self.sectors_per_cluster as u32 + sector as u32
    }

    pub fn label_string(&self) -> String {
        let trimmed: &[u8] = match self.volume_label.iter().rposition(|&b| b != b' ') {
            Some(last) => &self.volume_label[..=last],
            None => &[],
        };
        String::from_utf8_lossy(trimmed).into_owned()
    }
}

pub(crate) fn read_u16(sector: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([sector[offset], sector[offset + 1]])
}

pub(crate) fn read_u32(sector: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        sector[offset],
        sector[offset + 1],
        sector[offset + 2],
        sector[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fat32::fixture::ImageBuilder;

    #[test]
    fn test_mount_computes_geometry() {
        let mut dev = ImageBuilder::new().build();
        let p = Partition::mount(&mut dev).unwrap();

        assert_eq!(p.bytes_per_sector, 512);
        assert_eq!(p.sectors_per_cluster, 8);
        assert_eq!(p.reserved_sectors, 32);
        assert_eq!(p.number_of_fats, 2);
        assert_eq!(p.sectors_per_fat, 0x1000);
        assert_eq!(p.root_dir_first_cluster, 2);
        assert_eq!(p.fat_begin_lba, 2048 + 32);
        assert_eq!(p.data_begin_lba, 2048 + 32 + 2 * 0x1000);
        assert_eq!(p.root_dir_lba, p.data_begin_lba);
    }

    #[test]
    fn test_mount_reads_volume_label() {
        let mut dev = ImageBuilder::new().build();
        let p = Partition::mount(&mut dev).unwrap();
        assert_eq!(&p.volume_label, b"NO NAME    ");
        assert_eq!(p.label_string(), "NO NAME");
    }

    #[test]
    fn test_mount_rejects_missing_signature() {
        let mut dev = ImageBuilder::new().corrupt_mbr_signature().build();
        match Partition::mount(&mut dev) {
            Err(Error::BadMagic(_)) => {}
            other => panic!("expected BadMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_mount_rejects_bad_cluster_size() {
        let mut dev = ImageBuilder::new().sectors_per_cluster(3).build();
        match Partition::mount(&mut dev) {
            Err(Error::BadMagic(_)) => {}
            other => panic!("expected BadMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_sector_address_property() {
        let mut dev = ImageBuilder::new().build();
        let p = Partition::mount(&mut dev).unwrap();
        for cluster in [2u32, 3, 9, 1000] {
            for sector in 0..p.sectors_per_cluster {
                let lba = p.sector_of(cluster, sector);
                assert_eq!(
                    lba - p.data_begin_lba,
                    (cluster - 2) * p.sectors_per_cluster as u32 + sector as u32
                );
            }
        }
    }

    #[test]
    fn test_mount_is_idempotent() {
        let mut dev = ImageBuilder::new().build();
        let a = Partition::mount(&mut dev).unwrap();
        let b = Partition::mount(&mut dev).unwrap();
        assert_eq!(a.data_begin_lba, b.data_begin_lba);
        assert_eq!(a.volume_label, b.volume_label);
    }
}
