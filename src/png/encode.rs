use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::crc::Crc32;
use super::decode::Header;
use super::{IDAT, IEND, IHDR, PNG_SIGNATURE};
use crate::raster::RasterImage;
use crate::{Error, Result};

// Large artifacts are split across several IDAT chunks.
const MAX_IDAT_LEN: usize = 1 << 20;

/// Encode an image as 8-bit RGBA, non-interlaced, filter type 0 on every row.
///
/// Compression ratio is not a goal here; `decode(encode(img))` reproduces
/// `img` exactly.
pub fn encode(image: &RasterImage) -> Result<Vec<u8>> {
    if image.is_empty() {
        return Err(Error::unsupported(format!(
            "cannot encode an empty {}x{} image",
            image.width(),
            image.height()
        )));
    }
    let row_bytes = image.width() as usize * 4;
    let mut scanlines = Vec::with_capacity((row_bytes + 1) * image.height() as usize);
    for row in image.data().chunks_exact(row_bytes) {
        scanlines.push(0);
        scanlines.extend_from_slice(row);
    }

    let header = Header {
        width: image.width(),
        height: image.height(),
        bit_depth: 8,
        color_type: 6,
        compression: 0,
        filter_method: 0,
        interlace: 0,
    };
    Ok(assemble(&header, &zlib(&scanlines)?))
}

pub(crate) fn zlib(raw: &[u8]) -> Result<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2 + 64), Compression::default());
    enc.write_all(raw).map_err(|e| Error::Compression(e.to_string()))?;
    enc.finish().map_err(|e| Error::Compression(e.to_string()))
}

/// Lay out signature, IHDR, IDAT(s) and IEND around an already-compressed
/// stream.
pub(crate) fn assemble(header: &Header, compressed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(compressed.len() + 64);
    out.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&header.width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&header.height.to_be_bytes());
    ihdr[8] = header.bit_depth;
    ihdr[9] = header.color_type;
    ihdr[10] = header.compression;
    ihdr[11] = header.filter_method;
    ihdr[12] = header.interlace;
    write_chunk(&mut out, &IHDR, &ihdr);

    if compressed.is_empty() {
        write_chunk(&mut out, &IDAT, &[]);
    }
    for part in compressed.chunks(MAX_IDAT_LEN) {
        write_chunk(&mut out, &IDAT, part);
    }
    write_chunk(&mut out, &IEND, &[]);
    out
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut crc = Crc32::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
}
