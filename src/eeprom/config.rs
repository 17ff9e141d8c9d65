// The decoded configuration image and its builder.

use std::fmt;

use crate::chunk::Chunk;

use super::ConfigError;
use super::encoder::{RECORD_HEADER_LEN, TERMINATOR};
use super::header::{ConfigFlags, HEADER_LEN};

/// Cypress Semiconductor vendor ID.
pub const VID_CYPRESS: u16 = 0x04B4;
/// Product ID of an unconfigured FX2.
pub const PID_FX2: u16 = 0x8613;

/// Longest data record the boot loader accepts (the length field is
/// 10 bits wide and 1024 is reserved).
pub const MAX_RECORD_LEN: usize = 1023;

/// FX2 boot EEPROM contents.
///
/// Two configurations are equal when every field, and every firmware
/// record in order, is equal. Writers use this to verify an image after
/// reading it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fx2Config {
    /// USB vendor ID.
    pub vendor_id: u16,
    /// USB product ID.
    pub product_id: u16,
    /// USB device release number (BCD).
    pub device_id: u16,
    /// Boot-time options stored in the configuration byte.
    pub flags: ConfigFlags,
    /// Firmware records loaded into on-chip RAM at boot. An empty list
    /// produces a "C0 load" image; otherwise a "C2 load" image with a final
    /// record that releases the CPU from reset.
    pub firmware: Vec<Chunk>,
}

impl Default for Fx2Config {
    fn default() -> Self {
        Self::new(VID_CYPRESS, PID_FX2, 0x0000)
    }
}

impl Fx2Config {
    pub fn new(vendor_id: u16, product_id: u16, device_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            device_id,
            flags: ConfigFlags::empty(),
            firmware: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: ConfigFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn disconnect(&self) -> bool {
        self.flags.contains(ConfigFlags::DISCONNECT)
    }

    pub fn i2c_400khz(&self) -> bool {
        self.flags.contains(ConfigFlags::I2C_400KHZ)
    }

    /// Queue `data` to be loaded at `address` on boot.
    ///
    /// Data longer than 1023 bytes is split into consecutive records, each
    /// addressed independently. The whole range must lie below 0x10000;
    /// nothing is appended otherwise.
    pub fn append(&mut self, address: u32, data: &[u8]) -> Result<(), ConfigError> {
        if address as u64 + data.len() as u64 > 0x1_0000 {
            return Err(ConfigError::AddressOutOfRange {
                address,
                length: data.len(),
            });
        }
        let mut address = address;
        for piece in data.chunks(MAX_RECORD_LEN) {
            self.firmware.push(Chunk::new(address, piece));
            address += piece.len() as u32;
        }
        Ok(())
    }

    /// Append every chunk of a decoded firmware file.
    pub fn append_chunks(&mut self, chunks: &[Chunk]) -> Result<(), ConfigError> {
        for chunk in chunks {
            self.append(chunk.address, &chunk.data)?;
        }
        Ok(())
    }

    /// Total firmware payload in bytes.
    pub fn firmware_size(&self) -> usize {
        self.firmware.iter().map(Chunk::len).sum()
    }

    /// Length of the encoded image, without encoding it.
    pub fn image_size(&self) -> usize {
        if self.firmware.is_empty() {
            return HEADER_LEN;
        }
        HEADER_LEN
            + self.firmware.len() * RECORD_HEADER_LEN
            + self.firmware_size()
            + TERMINATOR.len()
    }
}

impl fmt::Display for Fx2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "USB VID:    {:04x}", self.vendor_id)?;
        writeln!(f, "    PID:    {:04x}", self.product_id)?;
        writeln!(f, "    DID:    {:04x}", self.device_id)?;
        writeln!(
            f,
            "Disconnect: {}",
            if self.disconnect() { "enabled" } else { "disabled" }
        )?;
        writeln!(
            f,
            "I2C clock:  {}",
            if self.i2c_400khz() { "400 kHz" } else { "100 kHz" }
        )?;
        write!(
            f,
            "Firmware:   {}",
            if self.firmware.is_empty() { "absent" } else { "present" }
        )?;
        if !self.firmware.is_empty() {
            write!(
                f,
                " ({} records, {} bytes)",
                self.firmware.len(),
                self.firmware_size()
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
