//! VE.Direct text protocol decoding.
//!
//! A device transmits blocks of fields, each field formatted as
//! `<CR><LF><label><TAB><value>`. The last field in a block is always `Checksum`,
//! whose value is a single raw byte, not necessarily printable, chosen such that
//! the modulo 256 sum of all bytes in the block is 0.
//!
//! References:
//! * VE.Direct Protocol FAQ
//!     - https://www.victronenergy.com/live/vedirect_protocol:faq
//! * Data communication with Victron Energy products (whitepaper)
//!
mod block;
mod checksum;
mod config;
mod decoder;
mod reader;
mod scanner;

pub use checksum::*;
pub use config::*;
pub use decoder::*;
pub use reader::*;

/// Carriage return; first byte of the newline pair preceding every field.
pub const CR: u8 = 0x0d;
/// Line feed; second byte of the newline pair preceding every field.
pub const LF: u8 = 0x0a;
/// Horizontal tab separating a field label from its value.
pub const TAB: u8 = 0x09;
/// Label of the field terminating a block.
pub const CHECKSUM_LABEL: &[u8] = b"Checksum";
