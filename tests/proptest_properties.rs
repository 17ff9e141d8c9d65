use fx2image::chunk::{Chunk, flatten};
use fx2image::diff;
use fx2image::eeprom::{ConfigFlags, Fx2Config};
use fx2image::format::{self, DecodeError, EncodeOptions, Format, ihex};
use proptest::prelude::*;

fn encode(chunks: &[Chunk], fmt: Format) -> Vec<u8> {
    let mut out = Vec::new();
    format::encode(&mut out, chunks, fmt, &EncodeOptions::default()).unwrap();
    out
}

fn data_record(address: u16, data: &[u8]) -> Vec<u8> {
    let mut record = vec![data.len() as u8];
    record.extend_from_slice(&address.to_be_bytes());
    record.push(0x00);
    record.extend_from_slice(data);
    record
}

fn record_line(record: &[u8], checksum: u8) -> String {
    let mut line = String::from(":");
    for b in record.iter().chain(std::iter::once(&checksum)) {
        line.push_str(&format!("{b:02X}"));
    }
    line
}

/// Non-overlapping chunks in ascending order below 0x40000.
fn sparse_chunks() -> impl Strategy<Value = Vec<Chunk>> {
    proptest::collection::vec(
        (0u32..0x2000, proptest::collection::vec(any::<u8>(), 1..300)),
        0..6,
    )
    .prop_map(|parts| {
        let mut chunks = Vec::new();
        let mut next = 0u32;
        for (gap, data) in parts {
            let address = next + gap;
            next = address + data.len() as u32;
            chunks.push(Chunk::new(address, data));
        }
        chunks
    })
}

proptest! {
    #[test]
    fn prop_ihex_round_trip_preserves_image(chunks in sparse_chunks(), shift in 0u32..0x3_0000) {
        let shifted: Vec<Chunk> = chunks
            .iter()
            .map(|c| Chunk::new(c.address + shift, c.data.clone()))
            .collect();
        let text = encode(&shifted, Format::Ihex);
        let decoded = format::decode_slice(&text, Format::Ihex, 0).unwrap();
        prop_assert_eq!(flatten(&decoded, 0), flatten(&shifted, 0));
    }

    #[test]
    fn prop_bin_and_hex_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let chunks = [Chunk::new(0, data.clone())];
        for fmt in [Format::Bin, Format::Hex] {
            let decoded = format::decode_slice(&encode(&chunks, fmt), fmt, 0).unwrap();
            prop_assert_eq!(decoded, vec![Chunk::new(0, data.clone())]);
        }
    }

    #[test]
    fn prop_ihex_records_are_well_formed(chunks in sparse_chunks()) {
        let text = String::from_utf8(encode(&chunks, Format::Ihex)).unwrap();
        prop_assert!(text.ends_with(":00000001FF\n"));
        for line in text.lines() {
            prop_assert!(line.starts_with(':'));
            prop_assert_eq!(line, line.to_ascii_uppercase());
            let len = u8::from_str_radix(&line[1..3], 16).unwrap();
            prop_assert!(len <= 16);
            prop_assert_eq!(line.len(), 11 + 2 * len as usize);
        }
    }

    #[test]
    fn prop_corrupted_checksum_is_rejected(
        data in proptest::collection::vec(any::<u8>(), 1..16),
        address in 0u16..0xFF00,
        delta in 1u8..=255,
    ) {
        let record = data_record(address, &data);
        let good = ihex::checksum(&record);
        let bad = good.wrapping_add(delta);

        let err = format::decode_slice(record_line(&record, bad).as_bytes(), Format::Ihex, 0)
            .unwrap_err();
        let is_checksum = matches!(
            err,
            DecodeError::Checksum { offset: 0, expected, actual }
                if expected == good && actual == bad
        );
        prop_assert!(is_checksum, "{err}");
    }

    #[test]
    fn prop_mutated_record_byte_is_rejected(
        data in proptest::collection::vec(any::<u8>(), 1..16),
        address in 0u16..0xFF00,
        pick in any::<proptest::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut record = data_record(address, &data);
        let stored = ihex::checksum(&record);
        // Offset, type or data byte; the length byte would change the extent.
        let idx = 1 + pick.index(record.len() - 1);
        record[idx] ^= flip;

        let err = format::decode_slice(record_line(&record, stored).as_bytes(), Format::Ihex, 0)
            .unwrap_err();
        let is_checksum = matches!(
            err,
            DecodeError::Checksum { offset: 0, expected, actual }
                if expected == ihex::checksum(&record) && actual == stored
        );
        prop_assert!(is_checksum, "byte {idx}: {err}");
    }

    #[test]
    fn prop_diff_apply_reproduces_new(
        old in proptest::collection::vec(0u8..4, 0..512),
        new in proptest::collection::vec(0u8..4, 0..512),
    ) {
        let changes = diff::diff(&old, &new);
        let mut patched = old.clone();
        diff::apply(&mut patched, &changes);
        prop_assert_eq!(&patched[..new.len()], &new[..]);
        if new.len() >= old.len() {
            prop_assert_eq!(patched, new);
        }
    }

    #[test]
    fn prop_diff_chunks_are_ordered_and_disjoint(
        old in proptest::collection::vec(any::<u8>(), 0..256),
        new in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let changes = diff::diff(&old, &new);
        for pair in changes.windows(2) {
            prop_assert!(pair[0].end() <= pair[1].address as u64);
        }
        prop_assert!(changes.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn prop_config_round_trip(
        vendor_id in 1u16..0xFFFF,
        product_id in 1u16..0xFFFF,
        device_id in any::<u16>(),
        flag_bits in 0u8..4,
        firmware in proptest::collection::vec(
            (0u32..0xF000, proptest::collection::vec(any::<u8>(), 1..2500)),
            0..4,
        ),
    ) {
        let mut flags = ConfigFlags::empty();
        flags.set(ConfigFlags::I2C_400KHZ, flag_bits & 1 != 0);
        flags.set(ConfigFlags::DISCONNECT, flag_bits & 2 != 0);
        let mut config = Fx2Config::new(vendor_id, product_id, device_id).with_flags(flags);
        for (address, data) in firmware {
            let len = data.len().min(0x1_0000 - address as usize);
            config.append(address, &data[..len]).unwrap();
        }

        let image = config.encode(None).unwrap();
        prop_assert_eq!(image.len(), config.image_size());
        prop_assert_eq!(Fx2Config::decode(&image, false).unwrap(), Some(config.clone()));
        prop_assert_eq!(Fx2Config::decode(&image, true).unwrap(), Some(config));
    }

    #[test]
    fn prop_erased_eeprom_of_any_size(len in 1usize..4096, partial in any::<bool>()) {
        prop_assert_eq!(Fx2Config::decode(&vec![0xFF; len], partial), Ok(None));
    }

    #[test]
    fn prop_config_decode_never_panics(buf in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = Fx2Config::decode(&buf, false);
        let _ = Fx2Config::decode(&buf, true);
    }

    #[test]
    fn prop_ihex_decode_never_panics(text in "[:0-9A-Fa-f\r\n ]{0,120}") {
        let _ = format::decode_slice(text.as_bytes(), Format::Ihex, 0);
    }
}
