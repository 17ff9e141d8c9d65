#![no_main]
use fx2image::chunk::{Chunk, flatten};
use fx2image::eeprom::Fx2Config;
use fx2image::format::ihex;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First two bytes pick the load address.
    let address = u16::from_le_bytes([data[0], data[1]]) as u32;
    let payload = &data[2..];

    // Intel HEX: decoding the encoder's output reproduces the image.
    let chunks = [Chunk::new(address, payload)];
    let decoded = ihex::decode(&ihex::encode(&chunks).unwrap(), 0).unwrap();
    assert_eq!(flatten(&decoded, 0), flatten(&chunks, 0));

    // EEPROM image: whatever fits below 64K survives encode/decode.
    let len = payload.len().min(0x1_0000 - address as usize);
    let mut config = Fx2Config::default();
    config.append(address, &payload[..len]).unwrap();
    let image = config.encode(None).unwrap();
    assert_eq!(Fx2Config::decode(&image, false).unwrap(), Some(config));
});
