//! fx2image: firmware interchange formats and FX2 boot EEPROM images.
//!
//! The crate provides:
//! - A sparse chunk model with flattening (`chunk`)
//! - Binary, hexadecimal and Intel HEX codecs (`format`)
//! - The FX2 EEPROM configuration image codec (`eeprom`)
//! - A byte diff for incremental EEPROM rewrites (`diff`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use fx2image::eeprom::Fx2Config;
//! use fx2image::format::{self, Format};
//!
//! let firmware = format::decode(&mut std::fs::File::open("blinky.ihx")?, Format::Ihex, 0)?;
//! let mut config = Fx2Config::new(0x04B4, 0x8613, 0x0000);
//! config.append_chunks(&firmware)?;
//! let image = config.encode(Some(16 * 1024))?;
//! assert_eq!(Fx2Config::decode(&image, false)?, Some(config));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod chunk;
pub mod diff;
pub mod eeprom;
pub mod format;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use chunk::{Chunk, flatten};
