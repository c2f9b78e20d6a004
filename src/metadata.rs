//! EXIF capture and re-attachment.
//!
//! The metadata block is the raw TIFF-structured EXIF payload. It is read
//! from the source container and spliced, byte for byte, into the freshly
//! encoded output: an APP1 segment for JPEG, an `eXIf` chunk for PNG and an
//! `EXIF` chunk (with a `VP8X` header) for WebP.

use crate::config::Dimensions;
use crate::error::{FileError, FileErrorKind, FileResult};
use crate::formats::ImageKind;
use std::io::Cursor;
use tracing::debug;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_APP0: [u8; 2] = [0xFF, 0xE0];
const JPEG_APP1: [u8; 2] = [0xFF, 0xE1];
const JPEG_EXIF_HEADER: &[u8] = b"Exif\0\0";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const WEBP_FLAG_ALPHA: u8 = 0x10;
const WEBP_FLAG_EXIF: u8 = 0x08;

/// Reads the EXIF block out of an encoded image, if it has one.
///
/// Blocks that cannot be parsed are treated as absent.
pub fn read_exif(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut cursor = Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(found) => Some(found.buf().to_vec()),
        Err(exif::Error::NotFound(_)) => None,
        Err(e) => {
            debug!("Ignoring unreadable EXIF block: {}", e);
            None
        }
    }
}

/// Splices `exif` into an encoded image of the given kind.
///
/// Kinds that cannot carry EXIF are returned unchanged; callers check
/// [`ImageKind::supports_exif`] first when they need to know.
pub fn attach_exif(
    kind: ImageKind,
    encoded: Vec<u8>,
    exif: &[u8],
    canvas: Dimensions,
    has_alpha: bool,
) -> FileResult<Vec<u8>> {
    match kind {
        ImageKind::Jpeg => attach_jpeg(&encoded, exif),
        ImageKind::Png => attach_png(&encoded, exif),
        ImageKind::WebP => attach_webp(&encoded, exif, canvas, has_alpha),
        ImageKind::Bmp | ImageKind::Tiff | ImageKind::Gif => Ok(encoded),
    }
}

fn malformed(kind: &str) -> FileError {
    FileError::new(
        FileErrorKind::EncodeFailure,
        format!("encoder produced an unexpected {} layout", kind),
    )
}

fn attach_jpeg(encoded: &[u8], exif: &[u8]) -> FileResult<Vec<u8>> {
    if encoded.len() < 4 || encoded[..2] != JPEG_SOI {
        return Err(malformed("JPEG"));
    }

    let segment_len = u16::try_from(2 + JPEG_EXIF_HEADER.len() + exif.len()).map_err(|_| {
        FileError::new(
            FileErrorKind::EncodeFailure,
            format!("EXIF block of {} bytes does not fit in a JPEG segment", exif.len()),
        )
    })?;

    // Keep a JFIF APP0 marker first if the encoder wrote one.
    let mut insert_at = JPEG_SOI.len();
    if encoded.len() >= 6 && encoded[2..4] == JPEG_APP0 {
        let app0_len = usize::from(u16::from_be_bytes([encoded[4], encoded[5]]));
        insert_at = (4 + app0_len).min(encoded.len());
    }

    let mut out = Vec::with_capacity(encoded.len() + usize::from(segment_len) + 2);
    out.extend_from_slice(&encoded[..insert_at]);
    out.extend_from_slice(&JPEG_APP1);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(JPEG_EXIF_HEADER);
    out.extend_from_slice(exif);
    out.extend_from_slice(&encoded[insert_at..]);
    Ok(out)
}

fn attach_png(encoded: &[u8], exif: &[u8]) -> FileResult<Vec<u8>> {
    if encoded.len() < 33 || encoded[..8] != PNG_SIGNATURE || &encoded[12..16] != b"IHDR" {
        return Err(malformed("PNG"));
    }

    // eXIf must come before IDAT; right after IHDR always satisfies that.
    let ihdr_len =
        u32::from_be_bytes([encoded[8], encoded[9], encoded[10], encoded[11]]) as usize;
    let insert_at = (8 + 12 + ihdr_len).min(encoded.len());
    let chunk_len = u32::try_from(exif.len()).map_err(|_| malformed("PNG"))?;

    let mut crc = crc32fast::Hasher::new();
    crc.update(b"eXIf");
    crc.update(exif);

    let mut out = Vec::with_capacity(encoded.len() + exif.len() + 12);
    out.extend_from_slice(&encoded[..insert_at]);
    out.extend_from_slice(&chunk_len.to_be_bytes());
    out.extend_from_slice(b"eXIf");
    out.extend_from_slice(exif);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
    out.extend_from_slice(&encoded[insert_at..]);
    Ok(out)
}

fn attach_webp(
    encoded: &[u8],
    exif: &[u8],
    canvas: Dimensions,
    has_alpha: bool,
) -> FileResult<Vec<u8>> {
    if encoded.len() < 20 || &encoded[..4] != b"RIFF" || &encoded[8..12] != b"WEBP" {
        return Err(malformed("WebP"));
    }
    if canvas.width == 0 || canvas.height == 0 {
        return Err(malformed("WebP"));
    }

    let mut body = Vec::with_capacity(encoded.len() + exif.len() + 32);
    if &encoded[12..16] == b"VP8X" {
        body.extend_from_slice(&encoded[12..]);
        body[8] |= WEBP_FLAG_EXIF;
    } else {
        let mut flags = WEBP_FLAG_EXIF;
        if has_alpha {
            flags |= WEBP_FLAG_ALPHA;
        }
        body.extend_from_slice(b"VP8X");
        body.extend_from_slice(&10u32.to_le_bytes());
        body.extend_from_slice(&[flags, 0, 0, 0]);
        body.extend_from_slice(&(canvas.width - 1).to_le_bytes()[..3]);
        body.extend_from_slice(&(canvas.height - 1).to_le_bytes()[..3]);
        body.extend_from_slice(&encoded[12..]);
    }

    let chunk_len = u32::try_from(exif.len()).map_err(|_| malformed("WebP"))?;
    body.extend_from_slice(b"EXIF");
    body.extend_from_slice(&chunk_len.to_le_bytes());
    body.extend_from_slice(exif);
    if exif.len() % 2 == 1 {
        body.push(0);
    }

    let riff_len = u32::try_from(body.len() + 4).map_err(|_| malformed("WebP"))?;
    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&body);
    Ok(out)
}
