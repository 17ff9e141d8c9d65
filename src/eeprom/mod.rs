// FX2 boot EEPROM configuration image.
//
// On reset the FX2 reads its boot EEPROM and, depending on the first byte,
// either enumerates with the VID/PID/DID stored there ("C0 load") or also
// loads firmware records into on-chip RAM before starting the CPU
// ("C2 load").
//
// # Modules
//
// - `header`: Load command, identity fields and configuration byte
// - `config`: `Fx2Config`, the decoded image and its builder
// - `encoder`: Image serialization
// - `decoder`: Image parsing (strict or partial)

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod header;

pub use config::{Fx2Config, PID_FX2, VID_CYPRESS};
pub use header::{ConfigFlags, LoadCommand};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid VID/PID {vendor_id:04x}:{product_id:04x}")]
    InvalidIdentity { vendor_id: u16, product_id: u16 },

    #[error("invalid load command {0:#04x}")]
    InvalidLoadCommand(u8),

    #[error("configuration image is {size} bytes, exceeding the {max} byte limit")]
    ImageTooLarge { size: usize, max: usize },

    #[error("truncated configuration header")]
    TruncatedHeader,

    #[error("truncated data record at offset {offset}")]
    TruncatedRecord { offset: usize },

    #[error("invalid data record length {length} at offset {offset}")]
    InvalidRecordLength { offset: usize, length: usize },

    #[error("firmware at {address:#06x} ({length} bytes) does not fit in 16-bit address space")]
    AddressOutOfRange { address: u32, length: usize },
}
