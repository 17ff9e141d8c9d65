// Interchange formats: raw binary, hexadecimal text and Intel HEX.
//
// # Modules
//
// - `hex`: Whitespace-separated hexadecimal dump (16 bytes per line)
// - `ihex`: Intel HEX records (data, EOF, extended segment/linear address)
//
// Binary is trivial enough to live here. `encode()` and `decode()` are the
// single entry points; they dispatch on `Format`.

pub mod hex;
pub mod ihex;

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::chunk::{self, Chunk, DEFAULT_FILL};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The format could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("specify file format explicitly")]
    FormatRequired,
    #[error("unknown format '{0}' (expected auto, bin, hex or ihex)")]
    Unknown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("specify file format explicitly")]
    FormatRequired,
    #[error("encoded data is {size} bytes, exceeding the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("data at {address:#x} ({length} bytes) runs past the 32-bit address space")]
    AddressOverflow { address: u32, length: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("specify file format explicitly")]
    FormatRequired,
    #[error("invalid hexadecimal data")]
    InvalidHex,
    #[error("invalid record header at offset {offset}")]
    InvalidRecord { offset: usize },
    #[error("truncated record at offset {offset}")]
    TruncatedRecord { offset: usize },
    #[error("invalid record data at offset {offset}")]
    InvalidRecordData { offset: usize },
    #[error("invalid record checksum at offset {offset}: expected {expected:#04x}, got {actual:#04x}")]
    Checksum {
        offset: usize,
        expected: u8,
        actual: u8,
    },
    #[error("unknown record type {record_type:02x} at offset {offset}")]
    UnknownRecordType { record_type: u8, offset: usize },
    #[error("address overflow in record at offset {offset}")]
    AddressOverflow { offset: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Format selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Resolve from the file name or terminal status via [`Format::detect`].
    #[default]
    Auto,
    Bin,
    Hex,
    Ihex,
}

impl Format {
    /// Guess the format of a file.
    ///
    /// `.hex`, `.ihex` and `.ihx` are Intel HEX, `.bin` is binary. Anything
    /// else is hexadecimal text if it is attached to a terminal, and
    /// ambiguous otherwise.
    pub fn detect(path: Option<&Path>, is_terminal: bool) -> Result<Format, FormatError> {
        let ext = path
            .and_then(Path::extension)
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("hex" | "ihex" | "ihx") => Ok(Format::Ihex),
            Some("bin") => Ok(Format::Bin),
            _ if is_terminal => Ok(Format::Hex),
            _ => Err(FormatError::FormatRequired),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Auto => "auto",
            Format::Bin => "bin",
            Format::Hex => "hex",
            Format::Ihex => "ihex",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Format::Auto),
            "bin" => Ok(Format::Bin),
            "hex" => Ok(Format::Hex),
            "ihex" => Ok(Format::Ihex),
            other => Err(FormatError::Unknown(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Address of the data when encoding a flat buffer (`encode_bytes`).
    pub offset: u32,
    /// Gap fill byte for `bin` and `hex`.
    pub fill: u8,
    /// Refuse to write more than this many bytes.
    pub max_size: Option<usize>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            fill: DEFAULT_FILL,
            max_size: None,
        }
    }
}

/// Encode `chunks` in `format` and write them to `w`.
///
/// `bin` and `hex` flatten the chunks first; `ihex` keeps them sparse.
/// The output is rendered into memory before anything is written, so a
/// size-bound violation leaves `w` untouched. Returns the number of bytes
/// written.
pub fn encode<W: Write>(
    w: &mut W,
    chunks: &[Chunk],
    format: Format,
    opts: &EncodeOptions,
) -> Result<u64, EncodeError> {
    let out = match format {
        Format::Auto => return Err(EncodeError::FormatRequired),
        Format::Bin => chunk::flatten(chunks, opts.fill),
        Format::Hex => hex::encode(&chunk::flatten(chunks, opts.fill)),
        Format::Ihex => ihex::encode(chunks)?,
    };

    if let Some(max) = opts.max_size
        && out.len() > max
    {
        return Err(EncodeError::TooLarge {
            size: out.len(),
            max,
        });
    }

    log::debug!(
        "encoded {} chunk(s) as {format}: {} bytes",
        chunks.len(),
        out.len()
    );
    w.write_all(&out)?;
    Ok(out.len() as u64)
}

/// Encode a flat buffer.
///
/// `bin` and `hex` write the buffer as is. `ihex` places it at
/// `opts.offset`.
pub fn encode_bytes<W: Write>(
    w: &mut W,
    data: &[u8],
    format: Format,
    opts: &EncodeOptions,
) -> Result<u64, EncodeError> {
    let address = match format {
        Format::Ihex => opts.offset,
        _ => 0,
    };
    encode(w, &[Chunk::new(address, data)], format, opts)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Read all of `r` and decode it as `format`.
///
/// `offset` is added to every decoded address.
pub fn decode<R: Read>(
    r: &mut R,
    format: Format,
    offset: u32,
) -> Result<Vec<Chunk>, DecodeError> {
    if format == Format::Auto {
        return Err(DecodeError::FormatRequired);
    }
    let mut data = Vec::new();
    r.read_to_end(&mut data)?;
    decode_slice(&data, format, offset)
}

/// Decode an in-memory buffer as `format`.
pub fn decode_slice(
    data: &[u8],
    format: Format,
    offset: u32,
) -> Result<Vec<Chunk>, DecodeError> {
    let chunks = match format {
        Format::Auto => return Err(DecodeError::FormatRequired),
        Format::Bin => vec![Chunk::new(offset, data)],
        Format::Hex => vec![Chunk::new(offset, hex::decode(data)?)],
        Format::Ihex => ihex::decode(data, offset)?,
    };
    log::debug!(
        "decoded {} bytes of {format} into {} chunk(s)",
        data.len(),
        chunks.len()
    );
    Ok(chunks)
}

/// Decode a literal string. Strings are always hexadecimal.
pub fn decode_str(s: &str, offset: u32) -> Result<Vec<Chunk>, DecodeError> {
    decode_slice(s.as_bytes(), Format::Hex, offset)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
