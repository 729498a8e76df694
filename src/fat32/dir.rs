use std::cmp::Ordering;

use super::partition::{read_u16, read_u32};
use super::ATTR_DIRECTORY;

// Field offsets within a 32-byte directory record
const REC_ATTRIBUTES: usize = 0x0B;
const REC_FIRST_CLUSTER_HI: usize = 0x14;
const REC_FIRST_CLUSTER_LO: usize = 0x1A;
const REC_FILE_SIZE: usize = 0x1C;

/// One decoded 8.3 directory record. Names keep their on-media space
/// padding and case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    pub basename: [u8; 8],
    pub extension: [u8; 3],
    pub attributes: u8,
    pub first_cluster: u32,
    pub size: u32,
}

impl FileEntry {
    /// Decode one 32-byte record. The caller has already filtered unused
    /// records and long-name fragments.
    pub fn from_record(record: &[u8]) -> Self {
        let mut basename = [0u8; 8];
        let mut extension = [0u8; 3];
        basename.copy_from_slice(&record[0..8]);
        extension.copy_from_slice(&record[8..11]);

        FileEntry {
            basename,
            extension,
            attributes: record[REC_ATTRIBUTES],
            first_cluster: (read_u16(record, REC_FIRST_CLUSTER_HI) as u32) << 16
                | read_u16(record, REC_FIRST_CLUSTER_LO) as u32,
            size: read_u32(record, REC_FILE_SIZE),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    /// The `.` and `..` records every non-root directory carries.
    pub fn is_dot(&self) -> bool {
        self.basename == *b".       " || self.basename == *b"..      "
    }

    /// The full 11-byte raw name, the unit of the listing sort order.
    pub fn raw_name(&self) -> [u8; 11] {
        let mut name = [0u8; 11];
        name[0..8].copy_from_slice(&self.basename);
        name[8..11].copy_from_slice(&self.extension);
        name
    }
}

/// Listing order: directories before files, each group byte-wise by raw
/// name.
pub(crate) fn listing_order(a: &FileEntry, b: &FileEntry) -> Ordering {
    match (a.is_dir(), b.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.raw_name().cmp(&b.raw_name()),
    }
}

/// A directory handle: where it starts and what it is called. Cluster 0 is
/// the root alias, resolved against the partition on use.
#[derive(Debug, Clone, Copy)]
pub struct Folder {
    pub first_cluster: u32,
    pub name: [u8; 11],
}

impl Folder {
    pub fn root() -> Self {
        Folder {
            first_cluster: 0,
            name: [0u8; 11],
        }
    }

    pub fn from_entry(entry: &FileEntry) -> Self {
        Folder {
            first_cluster: entry.first_cluster,
            name: entry.raw_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
        let mut rec = [0u8; 32];
        rec[0..11].copy_from_slice(name);
        rec[REC_ATTRIBUTES] = attr;
        rec[REC_FIRST_CLUSTER_HI..REC_FIRST_CLUSTER_HI + 2]
            .copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
        rec[REC_FIRST_CLUSTER_LO..REC_FIRST_CLUSTER_LO + 2]
            .copy_from_slice(&(cluster as u16).to_le_bytes());
        rec[REC_FILE_SIZE..REC_FILE_SIZE + 4].copy_from_slice(&size.to_le_bytes());
        rec
    }

    #[test]
    fn test_from_record_decodes_fields() {
        let rec = record(b"HELLO   TXT", 0x20, 0x0012_0003, 5);
        let entry = FileEntry::from_record(&rec);

        assert_eq!(&entry.basename, b"HELLO   ");
        assert_eq!(&entry.extension, b"TXT");
        assert_eq!(entry.attributes, 0x20);
        assert_eq!(entry.first_cluster, 0x0012_0003);
        assert_eq!(entry.size, 5);
        assert!(!entry.is_dir());
    }

    #[test]
    fn test_first_cluster_combines_hi_and_lo_words() {
        let rec = record(b"BIG     BIN", 0x20, 0xABCD_1234, 0);
        let entry = FileEntry::from_record(&rec);
        assert_eq!(entry.first_cluster, 0xABCD_1234);
    }

    #[test]
    fn test_dot_entries_are_recognized() {
        let dot = FileEntry::from_record(&record(b".          ", ATTR_DIRECTORY, 3, 0));
        let dotdot = FileEntry::from_record(&record(b"..         ", ATTR_DIRECTORY, 0, 0));
        let plain = FileEntry::from_record(&record(b"DOTFILE    ", 0x20, 4, 1));

        assert!(dot.is_dot());
        assert!(dotdot.is_dot());
        assert!(!plain.is_dot());
    }

    #[test]
    fn test_listing_order_groups_directories_first() {
        let mut entries = vec![
            FileEntry::from_record(&record(b"ZETA    TXT", 0x20, 5, 1)),
            FileEntry::from_record(&record(b"ALPHA   TXT", 0x20, 6, 1)),
            FileEntry::from_record(&record(b"ZDIR       ", ATTR_DIRECTORY, 7, 0)),
            FileEntry::from_record(&record(b"ADIR       ", ATTR_DIRECTORY, 8, 0)),
        ];
        entries.sort_by(listing_order);

        let names: Vec<[u8; 11]> = entries.iter().map(|e| e.raw_name()).collect();
        assert_eq!(
            names,
            vec![
                *b"ADIR       ",
                *b"ZDIR       ",
                *b"ALPHA   TXT",
                *b"ZETA    TXT",
            ]
        );
    }

    #[test]
    fn test_folder_root_alias() {
        let root = Folder::root();
        assert_eq!(root.first_cluster, 0);
    }
}
