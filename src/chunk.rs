// Sparse, address-tagged data and flattening.
//
// A chunk list is the common currency between the interchange formats, the
// EEPROM image codec and the image diff. Chunks need not be sorted or
// contiguous; every codec that produces chunks guarantees non-empty data.

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// Default byte used to fill gaps when flattening.
pub const DEFAULT_FILL: u8 = 0x00;

/// A contiguous run of bytes located at `address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub address: u32,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(address: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Exclusive end address. Widened so that a chunk ending exactly at
    /// 4 GiB does not overflow.
    pub fn end(&self) -> u64 {
        self.address as u64 + self.data.len() as u64
    }

    /// `true` if `other` starts exactly where `self` ends.
    pub fn is_contiguous_with(&self, other: &Chunk) -> bool {
        self.end() == other.address as u64
    }
}

impl From<(u32, Vec<u8>)> for Chunk {
    fn from((address, data): (u32, Vec<u8>)) -> Self {
        Self { address, data }
    }
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

/// Flatten `chunks` into a buffer starting at address 0.
///
/// The buffer is exactly `max(address + len)` bytes long; bytes not covered
/// by any chunk are set to `fill`. Overlapping chunks are written in order,
/// so later chunks win. An empty list flattens to an empty buffer.
pub fn flatten(chunks: &[Chunk], fill: u8) -> Vec<u8> {
    let len = chunks.iter().map(Chunk::end).max().unwrap_or(0) as usize;
    let mut flat = vec![fill; len];
    for chunk in chunks {
        let start = chunk.address as usize;
        flat[start..start + chunk.len()].copy_from_slice(&chunk.data);
    }
    flat
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
