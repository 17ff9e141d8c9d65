// Configuration image header.
//
// Byte layout:
//
//   0      load command (0xC0 / 0xC2, 0xFF when erased)
//   1..3   vendor ID  (little-endian)
//   3..5   product ID (little-endian)
//   5..7   device ID  (little-endian)
//   7      configuration byte

use bitflags::bitflags;

use super::ConfigError;

/// Length of the fixed header in bytes.
pub const HEADER_LEN: usize = 8;

/// First byte of an erased EEPROM.
pub const ERASED: u8 = 0xFF;

// ---------------------------------------------------------------------------
// Load command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadCommand {
    /// Enumerate with the stored identity only.
    IdentityOnly = 0xC0,
    /// Load firmware records, then release the CPU from reset.
    Firmware = 0xC2,
}

impl TryFrom<u8> for LoadCommand {
    type Error = ConfigError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0xC0 => Ok(LoadCommand::IdentityOnly),
            0xC2 => Ok(LoadCommand::Firmware),
            other => Err(ConfigError::InvalidLoadCommand(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration byte
// ---------------------------------------------------------------------------

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConfigFlags: u8 {
        /// Read firmware from the EEPROM with a 400 kHz I2C clock.
        const I2C_400KHZ = 1 << 0;
        /// Stay disconnected from the bus after boot.
        const DISCONNECT = 1 << 6;
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub load: LoadCommand,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_id: u16,
    pub flags: ConfigFlags,
}

/// VID/PID 0x0000 and 0xFFFF are reserved; hosts refuse to enumerate them.
pub fn check_identity(vendor_id: u16, product_id: u16) -> Result<(), ConfigError> {
    let reserved = |id: u16| id == 0x0000 || id == 0xFFFF;
    if reserved(vendor_id) || reserved(product_id) {
        return Err(ConfigError::InvalidIdentity {
            vendor_id,
            product_id,
        });
    }
    Ok(())
}

impl Header {
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ConfigError> {
        check_identity(self.vendor_id, self.product_id)?;
        out.push(self.load as u8);
        out.extend_from_slice(&self.vendor_id.to_le_bytes());
        out.extend_from_slice(&self.product_id.to_le_bytes());
        out.extend_from_slice(&self.device_id.to_le_bytes());
        out.push(self.flags.bits());
        Ok(())
    }

    /// Parse the header. The caller handles the erased-EEPROM case first.
    pub fn decode(buf: &[u8]) -> Result<Self, ConfigError> {
        let first = *buf.first().ok_or(ConfigError::TruncatedHeader)?;
        let load = LoadCommand::try_from(first)?;
        let h = buf.get(..HEADER_LEN).ok_or(ConfigError::TruncatedHeader)?;

        let vendor_id = u16::from_le_bytes([h[1], h[2]]);
        let product_id = u16::from_le_bytes([h[3], h[4]]);
        check_identity(vendor_id, product_id)?;

        Ok(Header {
            load,
            vendor_id,
            product_id,
            device_id: u16::from_le_bytes([h[5], h[6]]),
            flags: ConfigFlags::from_bits_truncate(h[7]),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            load: LoadCommand::IdentityOnly,
            vendor_id: 0x04B4,
            product_id: 0x8613,
            device_id: 0x0102,
            flags: ConfigFlags::DISCONNECT | ConfigFlags::I2C_400KHZ,
        }
    }

    #[test]
    fn layout_is_little_endian() {
        let mut out = Vec::new();
        header().encode(&mut out).unwrap();
        assert_eq!(out, [0xC0, 0xB4, 0x04, 0x13, 0x86, 0x02, 0x01, 0x41]);
        assert_eq!(Header::decode(&out).unwrap(), header());
    }

    #[test]
    fn unknown_flag_bits_are_dropped() {
        let buf = [0xC0, 0xB4, 0x04, 0x13, 0x86, 0x00, 0x00, 0xFF];
        assert_eq!(
            Header::decode(&buf).unwrap().flags,
            ConfigFlags::DISCONNECT | ConfigFlags::I2C_400KHZ
        );
    }

    #[test]
    fn load_command_is_checked_before_length() {
        assert_eq!(
            Header::decode(&[0x00]),
            Err(ConfigError::InvalidLoadCommand(0x00))
        );
        assert_eq!(Header::decode(&[0xC2, 0xB4]), Err(ConfigError::TruncatedHeader));
        assert_eq!(Header::decode(&[]), Err(ConfigError::TruncatedHeader));
    }

    #[test]
    fn reserved_identities() {
        for (vid, pid) in [(0x0000, 0x1234), (0xFFFF, 0x1234), (0x1234, 0x0000), (0x1234, 0xFFFF)] {
            assert_eq!(
                check_identity(vid, pid),
                Err(ConfigError::InvalidIdentity {
                    vendor_id: vid,
                    product_id: pid
                })
            );
        }
        assert!(check_identity(0x0001, 0xFFFE).is_ok());
    }
}
