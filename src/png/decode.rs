use std::io::Read;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::ZlibDecoder;
use log::debug;

use super::crc::Crc32;
use super::{IDAT, IEND, IHDR, PNG_SIGNATURE};
use crate::raster::RasterImage;
use crate::{Error, Result};

/// PNG color types the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Rgb,
    Rgba,
}

impl ColorType {
    /// Map an IHDR color type code; `None` for anything but RGB and RGBA.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(ColorType::Rgb),
            6 => Some(ColorType::Rgba),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }
}

/// Raw IHDR fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression: u8,
    pub filter_method: u8,
    pub interlace: u8,
}

impl Header {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 13 {
            return Err(Error::malformed(format!("IHDR has {} bytes, expected 13", data.len())));
        }
        Ok(Header {
            width: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            height: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            bit_depth: data[8],
            color_type: data[9],
            compression: data[10],
            filter_method: data[11],
            interlace: data[12],
        })
    }

    /// Reject anything outside 8-bit, non-interlaced RGB/RGBA.
    fn color_type_checked(&self) -> Result<ColorType> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::malformed(format!(
                "IHDR declares an empty image ({}x{})",
                self.width, self.height
            )));
        }
        if self.bit_depth != 8 {
            return Err(Error::unsupported(format!("bit depth {}", self.bit_depth)));
        }
        if self.interlace != 0 {
            return Err(Error::unsupported("interlaced images"));
        }
        let color = ColorType::from_code(self.color_type)
            .ok_or_else(|| Error::unsupported(format!("color type {}", self.color_type)))?;
        if self.compression != 0 {
            return Err(Error::malformed(format!("unknown compression method {}", self.compression)));
        }
        if self.filter_method != 0 {
            return Err(Error::malformed(format!("unknown filter method {}", self.filter_method)));
        }
        Ok(color)
    }
}

struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
}

/// Walks `length, type, data, crc` records after the signature.
struct Chunks<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Chunks<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < PNG_SIGNATURE.len() || bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
            return Err(Error::malformed("bad PNG signature"));
        }
        Ok(Self { buf: bytes, pos: PNG_SIGNATURE.len() })
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.buf.len() - self.pos;
        if remaining == 0 {
            return None;
        }
        if remaining < 12 {
            self.pos = self.buf.len();
            return Some(Err(Error::malformed("truncated chunk header")));
        }
        let p = self.pos;
        let len = u32::from_be_bytes([self.buf[p], self.buf[p + 1], self.buf[p + 2], self.buf[p + 3]]) as usize;
        let kind = [self.buf[p + 4], self.buf[p + 5], self.buf[p + 6], self.buf[p + 7]];
        let data_start = p + 8;
        let data_end = match data_start.checked_add(len) {
            Some(end) if end + 4 <= self.buf.len() => end,
            _ => {
                self.pos = self.buf.len();
                return Some(Err(Error::malformed(format!(
                    "truncated {} chunk",
                    String::from_utf8_lossy(&kind)
                ))));
            }
        };
        let data = &self.buf[data_start..data_end];
        let stored = u32::from_be_bytes([
            self.buf[data_end],
            self.buf[data_end + 1],
            self.buf[data_end + 2],
            self.buf[data_end + 3],
        ]);
        let mut crc = Crc32::new();
        crc.update(&kind);
        crc.update(data);
        if crc.finalize() != stored {
            self.pos = self.buf.len();
            return Some(Err(Error::malformed(format!(
                "CRC mismatch in {} chunk",
                String::from_utf8_lossy(&kind)
            ))));
        }
        self.pos = data_end + 4;
        Some(Ok(Chunk { kind, data }))
    }
}

/// Read only the IHDR of a PNG stream.
pub fn probe_header(bytes: &[u8]) -> Result<Header> {
    for chunk in Chunks::new(bytes)? {
        let chunk = chunk?;
        if chunk.kind == IHDR {
            return Header::parse(chunk.data);
        }
    }
    Err(Error::malformed("PNG missing IHDR"))
}

/// Decode a PNG stream into an RGBA [`RasterImage`].
///
/// Identical input bytes always produce an identical image.
pub fn decode(bytes: &[u8]) -> Result<RasterImage> {
    let mut header = None;
    let mut compressed = Vec::new();

    for chunk in Chunks::new(bytes)? {
        let chunk = chunk?;
        match chunk.kind {
            IHDR => header = Some(Header::parse(chunk.data)?),
            IDAT => compressed.extend_from_slice(chunk.data),
            IEND => break,
            _ => {}
        }
    }

    let header = header.ok_or_else(|| Error::malformed("PNG missing IHDR"))?;
    let color = header.color_type_checked()?;
    if compressed.is_empty() {
        return Err(Error::malformed("PNG has no IDAT data"));
    }

    let width = header.width as usize;
    let height = header.height as usize;
    let bpp = color.bytes_per_pixel();
    let row_bytes = width
        .checked_mul(bpp)
        .ok_or_else(|| Error::malformed("image dimensions overflow"))?;
    let expected = (row_bytes + 1)
        .checked_mul(height)
        .ok_or_else(|| Error::malformed("image dimensions overflow"))?;

    // Deflate expands at most ~1032:1; bound the reservation by the stream.
    let mut inflated = Vec::with_capacity(compressed.len().saturating_mul(1032).min(expected));
    ZlibDecoder::new(&compressed[..])
        .take(expected as u64)
        .read_to_end(&mut inflated)
        .map_err(|e| Error::malformed(format!("corrupt IDAT stream: {}", e)))?;
    if inflated.len() < expected {
        return Err(Error::malformed(format!(
            "truncated IDAT: {} of {} bytes",
            inflated.len(),
            expected
        )));
    }
    debug!(
        "decoded PNG header {}x{} {:?}, {} compressed bytes",
        header.width,
        header.height,
        color,
        compressed.len()
    );

    let pixels = unfilter_scanlines(&inflated, row_bytes, height, bpp)?;
    let rgba = match color {
        ColorType::Rgba => pixels,
        ColorType::Rgb => {
            let mut out = Vec::with_capacity(width * height * 4);
            for px in pixels.chunks_exact(3) {
                out.extend_from_slice(px);
                out.push(255);
            }
            out
        }
    };
    Ok(RasterImage::from_raw_unchecked(header.width, header.height, rgba))
}

/// Decode a base64 PNG payload, optionally wrapped in a `data:` URL.
pub fn decode_base64(text: &str) -> Result<RasterImage> {
    let text = text.trim();
    let payload = match text.find("base64,") {
        Some(idx) if text.starts_with("data:") => &text[idx + "base64,".len()..],
        _ => text,
    };
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| Error::malformed(format!("invalid base64 payload: {}", e)))?;
    decode(&bytes)
}

#[derive(Debug, Clone, Copy)]
enum Filter {
    None,
    Sub,
    Up,
    Average,
    Paeth,
}

impl Filter {
    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => Filter::None,
            1 => Filter::Sub,
            2 => Filter::Up,
            3 => Filter::Average,
            4 => Filter::Paeth,
            other => return Err(Error::malformed(format!("unknown scanline filter {}", other))),
        })
    }

    /// Predictor for one byte given its left, up and upper-left neighbors.
    #[inline]
    fn predict(self, a: u8, b: u8, c: u8) -> u8 {
        match self {
            Filter::None => 0,
            Filter::Sub => a,
            Filter::Up => b,
            Filter::Average => ((a as u16 + b as u16) / 2) as u8,
            Filter::Paeth => paeth(a, b, c),
        }
    }
}

#[inline]
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Undo per-row filtering. Neighbors outside the image read as 0.
fn unfilter_scanlines(data: &[u8], row_bytes: usize, height: usize, bpp: usize) -> Result<Vec<u8>> {
    let stride = row_bytes + 1;
    let mut out = vec![0u8; row_bytes * height];

    for y in 0..height {
        let line = &data[y * stride..(y + 1) * stride];
        let filter = Filter::from_byte(line[0])?;
        let raw = &line[1..];
        let (done, rest) = out.split_at_mut(y * row_bytes);
        let cur = &mut rest[..row_bytes];
        let up = if y > 0 { Some(&done[(y - 1) * row_bytes..]) } else { None };

        for x in 0..row_bytes {
            let a = if x >= bpp { cur[x - bpp] } else { 0 };
            let b = up.map_or(0, |u| u[x]);
            let c = match up {
                Some(u) if x >= bpp => u[x - bpp],
                _ => 0,
            };
            cur[x] = raw[x].wrapping_add(filter.predict(a, b, c));
        }
    }

    Ok(out)
}
