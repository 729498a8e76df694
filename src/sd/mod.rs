// Sector geometry
pub const SECTOR_SIZE: usize = 512;
// Data blocks carry a 2-byte CRC trailer on the wire
pub const CRC_SIZE: usize = 2;

// SPI-mode command set used by this driver
pub const CMD_GO_IDLE: u8 = 0; // CMD0
pub const CMD_SEND_IF_COND: u8 = 8; // CMD8
pub const CMD_READ_SINGLE_BLOCK: u8 = 17; // CMD17
pub const CMD_APP_CMD: u8 = 55; // CMD55
pub const CMD_READ_OCR: u8 = 58; // CMD58
pub const ACMD_SD_SEND_OP_COND: u8 = 41; // ACMD41

// R1 response bits and data-transfer tokens
pub const R1_READY: u8 = 0x00;
pub const R1_IDLE: u8 = 0x01;
pub const DATA_START_TOKEN: u8 = 0xFE;

pub mod block;
pub mod bus;
pub mod card;

pub use block::{BlockDevice, ImageDevice, Sector};
pub use bus::{PortBus, SpiBus};
pub use card::SdCard;
