#![no_main]
use fx2image::eeprom::Fx2Config;
use fx2image::format::{Format, decode_slice};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // None of the decoders may panic on arbitrary input.
    let _ = decode_slice(data, Format::Ihex, 0);
    let _ = decode_slice(data, Format::Hex, 0);
    let _ = Fx2Config::decode(data, false);
    let _ = Fx2Config::decode(data, true);

    // Offsets near the top of the address space must not overflow.
    let _ = decode_slice(data, Format::Ihex, u32::MAX - 0xFF);
});
