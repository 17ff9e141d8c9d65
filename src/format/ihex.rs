// Intel HEX encoding and decoding.
//
// Record layout (all fields hex-encoded after the leading colon):
//
//   :LL OOOO TT DD..DD CC
//
// LL is the data length, OOOO the 16-bit big-endian offset, TT the record
// type and CC the two's complement of the sum of all preceding bytes.
//
// The encoder only ever emits Data, Extended Linear Address and
// End-Of-File records. The decoder additionally understands Extended
// Segment Address records; segment and linear offsets are tracked
// independently and both added to the record offset.

use crate::chunk::Chunk;

use super::{DecodeError, EncodeError};
use super::hex::parse_byte;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

pub const REC_DATA: u8 = 0x00;
pub const REC_EOF: u8 = 0x01;
pub const REC_EXT_SEGMENT: u8 = 0x02;
pub const REC_EXT_LINEAR: u8 = 0x04;

/// Maximum payload of an emitted Data record.
pub const RECORD_DATA_LEN: usize = 16;

const BANK_SIZE: u64 = 1 << 16;

/// Highest address + 1 that Extended Linear Address records can reach.
const ADDRESS_SPACE: u64 = 1 << 32;

/// Two's complement of the byte sum, so that the sum of the whole record
/// including the checksum is zero modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

fn write_record(out: &mut Vec<u8>, record_type: u8, offset: u16, data: &[u8]) {
    const UPPER: &[u8; 16] = b"0123456789ABCDEF";

    let mut record = Vec::with_capacity(5 + data.len());
    record.push(data.len() as u8);
    record.extend_from_slice(&offset.to_be_bytes());
    record.push(record_type);
    record.extend_from_slice(data);
    record.push(checksum(&record));

    out.push(b':');
    for b in record {
        out.push(UPPER[(b >> 4) as usize]);
        out.push(UPPER[(b & 0x0f) as usize]);
    }
    out.push(b'\n');
}

/// Encode `chunks` as Intel HEX.
///
/// Chunks are written in the given order, split into Data records of at
/// most 16 bytes. A record never straddles a 64 KiB bank; when the bank of
/// the next record differs from the last announced one (initially 0), an
/// Extended Linear Address record is written first. The bank cursor carries
/// over between chunks of the same call. The output always ends with an
/// End-Of-File record.
///
/// Fails without producing output if any chunk extends past the 32-bit
/// address space.
pub fn encode(chunks: &[Chunk]) -> Result<Vec<u8>, EncodeError> {
    if let Some(chunk) = chunks.iter().find(|c| c.end() > ADDRESS_SPACE) {
        return Err(EncodeError::AddressOverflow {
            address: chunk.address,
            length: chunk.len(),
        });
    }

    let mut out = Vec::new();
    let mut bank: u16 = 0;

    for chunk in chunks {
        let mut pos = 0usize;
        while pos < chunk.len() {
            let addr = chunk.address as u64 + pos as u64;
            let record_bank = (addr >> 16) as u16;
            if record_bank != bank {
                bank = record_bank;
                log::debug!("switching to bank {bank:#06x} at {addr:#x}");
                write_record(&mut out, REC_EXT_LINEAR, 0, &bank.to_be_bytes());
            }

            let to_boundary = (BANK_SIZE - (addr & (BANK_SIZE - 1))) as usize;
            let len = RECORD_DATA_LEN.min(to_boundary).min(chunk.len() - pos);
            write_record(
                &mut out,
                REC_DATA,
                addr as u16,
                &chunk.data[pos..pos + len],
            );
            pos += len;
        }
    }

    write_record(&mut out, REC_EOF, 0, &[]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Data run being accumulated from consecutive Data records.
#[derive(Debug)]
enum Run {
    Idle,
    Accumulating {
        /// Record offset (without segment/bank) of the first byte.
        start: u32,
        data: Vec<u8>,
    },
}

/// Intel HEX parser state.
#[derive(Debug)]
struct Parser {
    /// Caller-supplied base address added to every chunk.
    offset: u32,
    /// Set by Extended Segment Address records (value << 4).
    segment: u32,
    /// Set by Extended Linear Address records (value << 16).
    bank: u32,
    run: Run,
    chunks: Vec<Chunk>,
}

impl Parser {
    fn new(offset: u32) -> Self {
        Self {
            offset,
            segment: 0,
            bank: 0,
            run: Run::Idle,
            chunks: Vec::new(),
        }
    }

    /// Emit the current run as a chunk, if it holds any data.
    fn flush(&mut self, record_pos: usize) -> Result<(), DecodeError> {
        if let Run::Accumulating { start, data } = std::mem::replace(&mut self.run, Run::Idle)
            && !data.is_empty()
        {
            let address = self
                .offset
                .checked_add(start)
                .and_then(|a| a.checked_add(self.segment))
                .and_then(|a| a.checked_add(self.bank))
                .ok_or(DecodeError::AddressOverflow { offset: record_pos })?;
            log::trace!("chunk at {address:#x}, {} bytes", data.len());
            self.chunks.push(Chunk::new(address, data));
        }
        Ok(())
    }

    fn data(&mut self, record_offset: u16, payload: &[u8], pos: usize) -> Result<(), DecodeError> {
        let record_offset = record_offset as u64;
        let contiguous = matches!(
            &self.run,
            Run::Accumulating { start, data } if *start as u64 + data.len() as u64 == record_offset
        );
        if contiguous {
            if let Run::Accumulating { data, .. } = &mut self.run {
                data.extend_from_slice(payload);
            }
        } else {
            self.flush(pos)?;
            self.run = Run::Accumulating {
                start: record_offset as u32,
                data: payload.to_vec(),
            };
        }
        Ok(())
    }

    fn extended_address(
        &mut self,
        record_type: u8,
        payload: &[u8],
        pos: usize,
    ) -> Result<(), DecodeError> {
        // A segment/bank switch is always a discontinuity.
        self.flush(pos)?;
        let value = match payload {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]) as u32,
            _ => return Err(DecodeError::InvalidRecordData { offset: pos }),
        };
        if record_type == REC_EXT_SEGMENT {
            self.segment = value << 4;
            log::debug!("segment offset {:#x}", self.segment);
        } else {
            self.bank = value << 16;
            log::debug!("bank offset {:#x}", self.bank);
        }
        Ok(())
    }
}

/// Decode Intel HEX text into chunks, adding `offset` to every address.
///
/// Parsing stops at the first End-Of-File record; anything after it is
/// ignored. Input that ends without one is accepted. Every error names the
/// byte position of the offending record.
pub fn decode(text: &[u8], offset: u32) -> Result<Vec<Chunk>, DecodeError> {
    let mut parser = Parser::new(offset);

    let mut pos = skip_whitespace(text, 0);
    while pos < text.len() {
        let header = text
            .get(pos..pos + 9)
            .filter(|h| h[0] == b':')
            .and_then(|h| decode_hex(&h[1..]))
            .ok_or(DecodeError::InvalidRecord { offset: pos })?;
        let [len, offset_hi, offset_lo, record_type] = [header[0], header[1], header[2], header[3]];

        let body_start = pos + 9;
        let body_end = body_start + (len as usize + 1) * 2;
        let body = text
            .get(body_start..body_end)
            .ok_or(DecodeError::TruncatedRecord { offset: pos })?;
        let body = decode_hex(body).ok_or(DecodeError::InvalidRecordData { offset: pos })?;
        let (payload, stored) = body.split_at(len as usize);
        let stored = stored[0];

        let expected = checksum(&[header.as_slice(), payload].concat());
        if expected != stored {
            return Err(DecodeError::Checksum {
                offset: pos,
                expected,
                actual: stored,
            });
        }

        log::trace!("record type {record_type:02x}, {len} bytes at offset {pos}");
        match record_type {
            REC_DATA => {
                parser.data(u16::from_be_bytes([offset_hi, offset_lo]), payload, pos)?;
            }
            REC_EOF => break,
            REC_EXT_SEGMENT | REC_EXT_LINEAR => {
                parser.extended_address(record_type, payload, pos)?;
            }
            _ => {
                return Err(DecodeError::UnknownRecordType {
                    record_type,
                    offset: pos,
                });
            }
        }

        pos = skip_whitespace(text, body_end);
    }

    parser.flush(pos)?;
    Ok(parser.chunks)
}

fn skip_whitespace(text: &[u8], mut pos: usize) -> usize {
    while pos < text.len() && text[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Decode an exact, even-length run of hex digits.
fn decode_hex(digits: &[u8]) -> Option<Vec<u8>> {
    digits
        .chunks_exact(2)
        .map(|pair| parse_byte(pair[0], pair[1]))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
