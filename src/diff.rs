// Byte-level diff of two flat images.
//
// Used to rewrite only the parts of an EEPROM that actually changed. The
// result is a list of chunks taken from the new image, ordered by address
// and never overlapping.

use crate::chunk::Chunk;

/// Compute the chunks of `new` that differ from `old`.
///
/// Differing bytes over the common length are grouped into maximal runs.
/// If `new` is longer than `old`, its tail is appended as one final chunk
/// at `old.len()` whether or not it differs from anything. Bytes past the
/// end of a longer `old` are not reported.
pub fn diff(old: &[u8], new: &[u8]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut run: Option<Chunk> = None;

    for (pos, (&o, &n)) in old.iter().zip(new).enumerate() {
        if o == n {
            if let Some(chunk) = run.take() {
                chunks.push(chunk);
            }
            continue;
        }
        run.get_or_insert_with(|| Chunk::new(pos as u32, Vec::new()))
            .data
            .push(n);
    }
    if let Some(chunk) = run {
        chunks.push(chunk);
    }

    if new.len() > old.len() {
        chunks.push(Chunk::new(old.len() as u32, &new[old.len()..]));
    }

    log::debug!(
        "diff: {} changed chunk(s), {} bytes",
        chunks.len(),
        chunks.iter().map(Chunk::len).sum::<usize>()
    );
    chunks
}

/// Write `patches` into `buf`, growing it with zeros where a patch extends
/// past the end.
pub fn apply(buf: &mut Vec<u8>, patches: &[Chunk]) {
    for patch in patches {
        let start = patch.address as usize;
        let end = start + patch.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(&patch.data);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
