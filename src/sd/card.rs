use log::debug;

use super::block::{BlockDevice, Sector};
use super::bus::SpiBus;
use super::{
    ACMD_SD_SEND_OP_COND, CMD_APP_CMD, CMD_GO_IDLE, CMD_READ_OCR, CMD_READ_SINGLE_BLOCK,
    CMD_SEND_IF_COND, CRC_SIZE, DATA_START_TOKEN, R1_IDLE, R1_READY, SECTOR_SIZE,
};
use crate::error::{Error, Result};

// The card must answer CMD17 with a data token within this many byte times.
const TOKEN_POLL_LIMIT: u32 = 10_000;

// ACMD41 argument: host supports high-capacity cards.
const ACMD41_HCS: u32 = 0x4000_0000;

pub struct SdCard<B: SpiBus> {
    bus: B,
    init_attempts: u32,
}

impl<B: SpiBus> SdCard<B> {
    pub fn new(bus: B, init_attempts: u32) -> Self {
        SdCard { bus, init_attempts }
    }

    /// Sequence the card from power-up into SPI-mode ready state:
    /// CMD0 until idle, CMD8, then CMD55+ACMD41 at 1 ms intervals until the
    /// card reports ready, then CMD58. Every phase is attempt-bounded.
    pub fn init(&mut self) -> Result<()> {
        // at least 74 clock cycles with the card deselected
        self.bus.deselect()?;
        for _ in 0..10 {
            self.bus.transfer(0xFF)?;
        }

        let mut attempts = 0;
        loop {
            let r1 = self.command(CMD_GO_IDLE, 0)?;
            if r1 == R1_IDLE {
                break;
            }
            attempts += 1;
            if attempts >= self.init_attempts {
                self.bus.deselect()?;
                return Err(Error::NotReady { attempts });
            }
        }

        // voltage range 2.7-3.6V, check pattern 0xAA
        let (r1, echo) = self.command_long(CMD_SEND_IF_COND, 0x1AA)?;
        debug!("CMD8 response {:#04x} {:02x?}", r1, echo);

        attempts = 0;
        loop {
            self.bus.wait_ms(1);
            let r1 = self.command(CMD_APP_CMD, 0)?;
            if r1 != 0xFF {
                let r1 = self.command(ACMD_SD_SEND_OP_COND, ACMD41_HCS)?;
                if r1 == R1_READY {
                    break;
                }
            }
            attempts += 1;
            if attempts >= self.init_attempts {
                self.bus.deselect()?;
                return Err(Error::NotReady { attempts });
            }
        }

        let (r1, ocr) = self.command_long(CMD_READ_OCR, 0)?;
        debug!("CMD58 response {:#04x}, OCR {:02x?}", r1, ocr);

        Ok(())
    }

    /// Single-block read. The 2-byte CRC trailer is clocked off the wire so
    /// the transport never overruns, but is not verified.
    pub fn read_sector(&mut self, lba: u32) -> Result<Sector> {
        self.bus.select()?;
        let r1 = self.send_command(CMD_READ_SINGLE_BLOCK, lba)?;
        if r1 != R1_READY {
            self.bus.deselect()?;
            return Err(Error::ReadFailed { lba, code: r1 });
        }

        let mut token = 0xFF;
        for _ in 0..TOKEN_POLL_LIMIT {
            token = self.bus.transfer(0xFF)?;
            if token != 0xFF {
                break;
            }
        }
        if token != DATA_START_TOKEN {
            self.bus.deselect()?;
            return Err(Error::ReadFailed { lba, code: token });
        }

        let mut sector = [0u8; SECTOR_SIZE];
        for byte in sector.iter_mut() {
            *byte = self.bus.transfer(0xFF)?;
        }
        let mut crc = [0u8; CRC_SIZE];
        for byte in crc.iter_mut() {
            *byte = self.bus.transfer(0xFF)?;
        }

        self.bus.deselect()?;
        self.bus.transfer(0xFF)?;
        Ok(sector)
    }

    // One command with an R1 response, chip-select framed.
    fn command(&mut self, cmd: u8, arg: u32) -> Result<u8> {
        self.bus.select()?;
        let r1 = self.send_command(cmd, arg)?;
        self.bus.deselect()?;
        self.bus.transfer(0xFF)?;
        Ok(r1)
    }

    // One command with an R3/R7 response: R1 followed by four data bytes.
    fn command_long(&mut self, cmd: u8, arg: u32) -> Result<(u8, [u8; 4])> {
        self.bus.select()?;
        let r1 = self.send_command(cmd, arg)?;
        let mut tail = [0u8; 4];
        for byte in tail.iter_mut() {
            *byte = self.bus.transfer(0xFF)?;
        }
        self.bus.deselect()?;
        self.bus.transfer(0xFF)?;
        Ok((r1, tail))
    }

    // Send the 6-byte frame and poll for the R1 byte (MSB clear). Assumes
    // the card is selected. 0xFF means the card never answered.
    fn send_command(&mut self, cmd: u8, arg: u32) -> Result<u8> {
        let mut frame = [0u8; 6];
        frame[0] = 0x40 | cmd;
        frame[1..5].copy_from_slice(&arg.to_be_bytes());
        frame[5] = crc7(&frame[..5]);
        for &byte in &frame {
            self.bus.transfer(byte)?;
        }
        for _ in 0..8 {
            let r = self.bus.transfer(0xFF)?;
            if r & 0x80 == 0 {
                return Ok(r);
            }
        }
        Ok(0xFF)
    }
}

impl<B: SpiBus> BlockDevice for SdCard<B> {
    fn read_sector(&mut self, lba: u32) -> Result<Sector> {
        SdCard::read_sector(self, lba)
    }
}

// CRC7 over the first five frame bytes, shifted up with the end bit set.
fn crc7(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        let mut d = byte;
        for _ in 0..8 {
            crc <<= 1;
            if (d ^ crc) & 0x80 != 0 {
                crc ^= 0x09;
            }
            d <<= 1;
        }
    }
    (crc << 1) | 0x01
}
