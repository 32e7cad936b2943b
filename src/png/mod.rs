//! Minimal PNG codec for diagnostic artifacts
//!
//! The decoder accepts the subset that headless screenshot tools emit:
//! 8-bit RGB or RGBA, non-interlaced, any of the five scanline filters.
//! Everything else fails fast with [`Error::UnsupportedFormat`](crate::Error)
//! rather than being decoded on a best-effort basis. The encoder always writes
//! 8-bit RGBA with filter type 0.

pub mod crc;
mod decode;
mod encode;

pub use crc::{crc32, Crc32};
pub use decode::{decode, decode_base64, probe_header, ColorType, Header};
pub use encode::encode;

/// The eight bytes every PNG stream starts with.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

pub(crate) const IHDR: [u8; 4] = *b"IHDR";
pub(crate) const IDAT: [u8; 4] = *b"IDAT";
pub(crate) const IEND: [u8; 4] = *b"IEND";
