// Configuration image serialization.
//
// After the header, a "C2 load" image holds data records
//
//   length (u16 BE) | address (u16 BE) | data[length]
//
// followed by a terminator record: a length with the 0x8000 "last" flag
// that writes 0x00 to CPUCS (0xE600), releasing the 8051 from reset.

use super::ConfigError;
use super::config::{Fx2Config, MAX_RECORD_LEN};
use super::header::{Header, LoadCommand, check_identity};

/// Size of a data record's length and address fields.
pub const RECORD_HEADER_LEN: usize = 4;

/// Flag in the length field marking the final record.
pub const LAST_RECORD: u16 = 0x8000;

/// CPU control and status register.
pub const REG_CPUCS: u16 = 0xE600;

/// Final record: one byte, 0x00, written to CPUCS.
pub const TERMINATOR: [u8; 5] = [0x80, 0x01, 0xE6, 0x00, 0x00];

impl Fx2Config {
    /// Serialize the configuration into an EEPROM image.
    ///
    /// Fails without producing anything if the identity is reserved, a
    /// firmware record is empty, too long or out of the 16-bit address
    /// space, or the image would be larger than `max_size`.
    pub fn encode(&self, max_size: Option<usize>) -> Result<Vec<u8>, ConfigError> {
        check_identity(self.vendor_id, self.product_id)?;

        let size = self.image_size();
        if let Some(max) = max_size
            && size > max
        {
            return Err(ConfigError::ImageTooLarge { size, max });
        }

        let header = Header {
            load: if self.firmware.is_empty() {
                LoadCommand::IdentityOnly
            } else {
                LoadCommand::Firmware
            },
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            device_id: self.device_id,
            flags: self.flags,
        };

        let mut out = Vec::with_capacity(size);
        header.encode(&mut out)?;

        if !self.firmware.is_empty() {
            for record in &self.firmware {
                let length = record.len();
                if length == 0 || length > MAX_RECORD_LEN {
                    return Err(ConfigError::InvalidRecordLength {
                        offset: out.len(),
                        length,
                    });
                }
                let address = u16::try_from(record.address)
                    .ok()
                    .filter(|_| record.end() <= 0x1_0000)
                    .ok_or(ConfigError::AddressOutOfRange {
                        address: record.address,
                        length,
                    })?;
                out.extend_from_slice(&(length as u16).to_be_bytes());
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&record.data);
            }
            out.extend_from_slice(&TERMINATOR);
        }

        debug_assert_eq!(out.len(), size);
        log::debug!(
            "encoded configuration {:04x}:{:04x}, {} firmware record(s), {} bytes",
            self.vendor_id,
            self.product_id,
            self.firmware.len(),
            out.len()
        );
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::eeprom::ConfigFlags;

    #[test]
    fn terminator_matches_its_fields() {
        let mut expected = (LAST_RECORD | 1).to_be_bytes().to_vec();
        expected.extend_from_slice(&REG_CPUCS.to_be_bytes());
        expected.push(0x00);
        assert_eq!(TERMINATOR.as_slice(), expected.as_slice());
    }

    #[test]
    fn identity_only_image() {
        let config = Fx2Config::new(0x04B4, 0x1004, 0x0000).with_flags(ConfigFlags::I2C_400KHZ);
        assert_eq!(
            config.encode(None).unwrap(),
            [0xC0, 0xB4, 0x04, 0x04, 0x10, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn firmware_image() {
        let mut config = Fx2Config::new(0x04B4, 0x8613, 0x0001);
        config.append(0x0080, &[0xAA, 0xBB]).unwrap();
        let image = config.encode(None).unwrap();
        assert_eq!(
            image,
            [
                0xC2, 0xB4, 0x04, 0x13, 0x86, 0x01, 0x00, 0x00, // header
                0x00, 0x02, 0x00, 0x80, 0xAA, 0xBB, // record
                0x80, 0x01, 0xE6, 0x00, 0x00, // terminator
            ]
        );
    }

    #[test]
    fn reserved_identity_is_rejected() {
        for (vid, pid) in [(0x0000, 0x8613), (0xFFFF, 0x8613), (0x04B4, 0x0000), (0x04B4, 0xFFFF)] {
            assert!(matches!(
                Fx2Config::new(vid, pid, 0).encode(None),
                Err(ConfigError::InvalidIdentity { .. })
            ));
        }
    }

    #[test]
    fn size_limit() {
        let mut config = Fx2Config::default();
        config.append(0, &[0; 100]).unwrap();
        assert_eq!(config.encode(Some(117)).unwrap().len(), 117);
        assert_eq!(
            config.encode(Some(116)),
            Err(ConfigError::ImageTooLarge {
                size: 117,
                max: 116
            })
        );
    }

    #[test]
    fn hand_built_records_are_validated() {
        let mut config = Fx2Config::default();
        config.firmware.push(Chunk::new(0, vec![0; 1024]));
        assert!(matches!(
            config.encode(None),
            Err(ConfigError::InvalidRecordLength { offset: 8, length: 1024 })
        ));

        config.firmware = vec![Chunk::new(0x1_0000, vec![0])];
        assert!(matches!(
            config.encode(None),
            Err(ConfigError::AddressOutOfRange { .. })
        ));

        config.firmware = vec![Chunk::new(0, vec![])];
        assert!(matches!(
            config.encode(None),
            Err(ConfigError::InvalidRecordLength { length: 0, .. })
        ));
    }
}
