// File-level I/O helpers for the interchange formats.
//
// Provides `read_file()`/`write_file()` and their stdin/stdout counterparts.
// They resolve `Format::Auto` from the file name (or terminal status) and
// use buffered I/O. Optionally computes SHA-256 digests of the file contents
// (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::chunk::Chunk;
use crate::format::{self, DecodeError, EncodeError, EncodeOptions, Format, FormatError};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `read_file()`.
#[derive(Debug, Clone)]
pub struct ReadStats {
    /// Format the input was decoded as.
    pub format: Format,
    /// Input size in bytes.
    pub size: u64,
    /// Number of chunks decoded.
    pub chunks: usize,
    /// SHA-256 of the input (if `file-io` feature is enabled).
    pub sha256: Option<[u8; 32]>,
}

/// Statistics returned by `write_file()`.
#[derive(Debug, Clone)]
pub struct WriteStats {
    /// Format the output was encoded as.
    pub format: Format,
    /// Output size in bytes.
    pub size: u64,
    /// Number of chunks encoded.
    pub chunks: usize,
    /// SHA-256 of the output (if `file-io` feature is enabled).
    pub sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug)]
pub enum IoError {
    /// I/O error (file open, read, write).
    Io(io::Error),
    /// The format could not be determined.
    Format(FormatError),
    /// Encoding error.
    Encode(EncodeError),
    /// Decoding error.
    Decode(DecodeError),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Format(e) => write!(f, "{e}"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
        }
    }
}

impl From<io::Error> for IoError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FormatError> for IoError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<EncodeError> for IoError {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e)
    }
}

impl From<DecodeError> for IoError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Resolve `Format::Auto`; explicit formats pass through.
pub fn resolve_format(
    format: Format,
    path: Option<&Path>,
    is_terminal: bool,
) -> Result<Format, FormatError> {
    match format {
        Format::Auto => Format::detect(path, is_terminal),
        explicit => Ok(explicit),
    }
}

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn read_from<R: Read>(
    reader: R,
    format: Format,
    offset: u32,
) -> Result<(Vec<Chunk>, ReadStats), IoError> {
    let mut data = Vec::new();
    BufReader::with_capacity(BUF_SIZE, reader).read_to_end(&mut data)?;
    let chunks = format::decode_slice(&data, format, offset)?;
    let stats = ReadStats {
        format,
        size: data.len() as u64,
        chunks: chunks.len(),
        sha256: sha256(&data),
    };
    Ok((chunks, stats))
}

/// Read and decode a file. `Format::Auto` is resolved from the extension.
pub fn read_file(
    path: &Path,
    format: Format,
    offset: u32,
) -> Result<(Vec<Chunk>, ReadStats), IoError> {
    let format = resolve_format(format, Some(path), false)?;
    log::debug!("reading {} as {format}", path.display());
    read_from(File::open(path)?, format, offset)
}

/// Read and decode standard input. `Format::Auto` means hexadecimal text
/// when stdin is a terminal.
pub fn read_stdin(format: Format, offset: u32) -> Result<(Vec<Chunk>, ReadStats), IoError> {
    let stdin = io::stdin();
    let format = resolve_format(format, None, stdin.is_terminal())?;
    read_from(stdin.lock(), format, offset)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn render(chunks: &[Chunk], format: Format, opts: &EncodeOptions) -> Result<Vec<u8>, IoError> {
    let mut out = Vec::new();
    format::encode(&mut out, chunks, format, opts)?;
    Ok(out)
}

/// Encode `chunks` and write them to `path`.
///
/// The output is fully encoded before the file is created, so a failed
/// encode never leaves a truncated file behind.
pub fn write_file(
    path: &Path,
    chunks: &[Chunk],
    format: Format,
    opts: &EncodeOptions,
) -> Result<WriteStats, IoError> {
    let format = resolve_format(format, Some(path), false)?;
    let out = render(chunks, format, opts)?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(path)?);
    writer.write_all(&out)?;
    writer.flush()?;
    log::debug!("wrote {} bytes of {format} to {}", out.len(), path.display());

    Ok(WriteStats {
        format,
        size: out.len() as u64,
        chunks: chunks.len(),
        sha256: sha256(&out),
    })
}

/// Encode `chunks` to standard output. `Format::Auto` means hexadecimal
/// text when stdout is a terminal.
pub fn write_stdout(
    chunks: &[Chunk],
    format: Format,
    opts: &EncodeOptions,
) -> Result<WriteStats, IoError> {
    let stdout = io::stdout();
    let format = resolve_format(format, None, stdout.is_terminal())?;
    let out = render(chunks, format, opts)?;

    let mut lock = stdout.lock();
    lock.write_all(&out)?;
    lock.flush()?;

    Ok(WriteStats {
        format,
        size: out.len() as u64,
        chunks: chunks.len(),
        sha256: sha256(&out),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
