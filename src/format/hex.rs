// Hexadecimal text: lowercase byte pairs, 16 per line, with an extra space
// between the two 8-byte halves of a line.
//
//   00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f
//   10 11 12 \n

use super::DecodeError;

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Render `data` as a hex dump.
///
/// Every byte is followed by a separator: a newline after the 16th byte of a
/// line, two spaces after the 8th, one space otherwise. The output always
/// ends with a newline, even for empty input.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 3 + 1);
    for (n, &byte) in data.iter().enumerate() {
        out.push(DIGITS[(byte >> 4) as usize]);
        out.push(DIGITS[(byte & 0x0f) as usize]);
        match n % 16 {
            15 => out.push(b'\n'),
            7 => out.extend_from_slice(b"  "),
            _ => out.push(b' '),
        }
    }
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }
    out
}

/// Parse hexadecimal text, ignoring all whitespace. Digits may be either
/// case; the digit count must be even.
pub fn decode(text: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let digits: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(DecodeError::InvalidHex);
    }
    digits
        .chunks_exact(2)
        .map(|pair| parse_byte(pair[0], pair[1]).ok_or(DecodeError::InvalidHex))
        .collect()
}

/// Value of one ASCII hex digit.
pub(crate) fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

pub(crate) fn parse_byte(hi: u8, lo: u8) -> Option<u8> {
    Some((nibble(hi)? << 4) | nibble(lo)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_line_layout() {
        let data: Vec<u8> = (0..16).collect();
        assert_eq!(
            encode(&data),
            b"00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f\n"
        );
    }

    #[test]
    fn partial_last_line_is_terminated() {
        let data: Vec<u8> = (0u8..18).map(|i| i.wrapping_mul(0x11)).collect();
        let text = String::from_utf8(encode(&data)).unwrap();
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "10 21 \n");
    }

    #[test]
    fn empty_input_is_a_newline() {
        assert_eq!(encode(&[]), b"\n");
    }

    #[test]
    fn decode_ignores_whitespace_and_case() {
        assert_eq!(
            decode(b" De\tad\r\nbE ef \n").unwrap(),
            vec![0xDE, 0xAD, 0xBE, 0xEF]
        );
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_bad_digits() {
        assert!(matches!(decode(b"0g"), Err(DecodeError::InvalidHex)));
        assert!(matches!(decode(b"012"), Err(DecodeError::InvalidHex)));
        assert!(matches!(decode(b"0x12"), Err(DecodeError::InvalidHex)));
    }

    #[test]
    fn dump_decodes_back() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }
}
