/*
 * SD Card Navigator Library
 * =========================
 *
 * This library provides the core functionality for the two-pane SD card
 * navigator: a block-level SD card driver, a read-only FAT32 engine and
 * the subtree copier that moves files onto the host filesystem.
 *
 * Components:
 * ----------
 * - SD Card Driver (SPI command protocol, single-block reads)
 * - FAT32 Engine (partition probe, FAT walker, directory decoder,
 *   file streamer)
 * - Tree Copier (breadth-first enumeration, overwrite policy)
 * - Host Sink (destination filesystem operations)
 * - Navigator Frontend (two scrolling panes, keyboard loop)
 */

pub mod config;
pub mod copy;
pub mod error;
pub mod fat32;
pub mod host;
pub mod nav;
pub mod sd;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use fat32::{FileEntry, Folder, Partition, Volume};
pub use host::{HostSink, LocalSink};
pub use nav::Navigator;
pub use sd::{BlockDevice, ImageDevice, PortBus, SdCard};
