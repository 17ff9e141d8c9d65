// Configuration image parsing.
//
// An EEPROM read back from a device usually carries trailing bytes beyond
// the image (the EEPROM size is not known up front). Strict decoding
// requires the terminator record; partial decoding stops quietly at the end
// of the buffer, which lets callers decode whatever prefix they have read.

use crate::chunk::Chunk;

use super::ConfigError;
use super::config::{Fx2Config, MAX_RECORD_LEN};
use super::encoder::{LAST_RECORD, RECORD_HEADER_LEN};
use super::header::{ERASED, HEADER_LEN, Header, LoadCommand};

impl Fx2Config {
    /// Parse an EEPROM image.
    ///
    /// Returns `Ok(None)` for an erased EEPROM (first byte 0xFF). With
    /// `partial` unset, a "C2 load" image must contain the terminator record;
    /// with it set, decoding also ends successfully at the end of `buf`.
    /// Records that are cut short are an error in both modes.
    pub fn decode(buf: &[u8], partial: bool) -> Result<Option<Fx2Config>, ConfigError> {
        match buf.first() {
            None => return Err(ConfigError::TruncatedHeader),
            Some(&ERASED) => {
                log::debug!("EEPROM is erased");
                return Ok(None);
            }
            Some(_) => {}
        }

        let header = Header::decode(buf)?;
        let mut config = Fx2Config::new(header.vendor_id, header.product_id, header.device_id)
            .with_flags(header.flags);

        if header.load == LoadCommand::Firmware {
            config.firmware = decode_records(buf, partial)?;
        }

        log::debug!(
            "decoded configuration {:04x}:{:04x}, {} firmware record(s)",
            config.vendor_id,
            config.product_id,
            config.firmware.len()
        );
        Ok(Some(config))
    }
}

fn decode_records(buf: &[u8], partial: bool) -> Result<Vec<Chunk>, ConfigError> {
    let mut records = Vec::new();
    let mut offset = HEADER_LEN;

    while !partial || offset < buf.len() {
        let fields = buf
            .get(offset..offset + RECORD_HEADER_LEN)
            .ok_or(ConfigError::TruncatedRecord { offset })?;
        let length = u16::from_be_bytes([fields[0], fields[1]]);
        let address = u16::from_be_bytes([fields[2], fields[3]]);

        if length & LAST_RECORD != 0 {
            log::trace!("terminator record at offset {offset}");
            return Ok(records);
        }

        let length = length as usize;
        if length == 0 || length > MAX_RECORD_LEN {
            return Err(ConfigError::InvalidRecordLength { offset, length });
        }

        let start = offset + RECORD_HEADER_LEN;
        let data = buf
            .get(start..start + length)
            .ok_or(ConfigError::TruncatedRecord { offset })?;
        log::trace!("record at offset {offset}: {length} bytes at {address:#06x}");
        records.push(Chunk::new(address as u32, data));
        offset = start + length;
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
