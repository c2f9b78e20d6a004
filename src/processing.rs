use crate::config::Dimensions;
use crate::constants::{
    DEFAULT_QUALITY, LIBDEFLATER_HIGH_LEVEL, LIBDEFLATER_LOW_LEVEL, MAX_FILE_SIZE, OXIPNG_PRESET,
    PNG_HIGH_THRESHOLD, PNG_ZOPFLI_THRESHOLD, ZOPFLI_ITERATIONS,
};
use crate::error::{FileError, FileErrorKind, FileResult};
use crate::formats::ImageKind;
use crate::metadata::{attach_exif, read_exif};
use crate::policy::{fit_within, ImageTask, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageReader};
use oxipng::{Deflaters, Options};
use std::fs;
use std::io::Cursor;
use std::num::NonZeroU8;
use std::path::Path;
use tracing::{debug, warn};

/// A decoded source image.
pub struct DecodedImage {
    pub raster: DynamicImage,
    /// Container detected from the bytes themselves.
    pub kind: ImageKind,
    pub exif: Option<Vec<u8>>,
}

/// Bytes produced by the local path, ready to be written.
#[derive(Debug, Clone)]
pub struct LocalOutput {
    pub bytes: Vec<u8>,
    pub original_dimensions: Dimensions,
    pub final_dimensions: Dimensions,
    pub metadata_kept: bool,
}

/// Reads a source file into memory.
///
/// # Security
/// Files above [`MAX_FILE_SIZE`] are rejected with `ReadFailure` before any
/// byte is read.
pub fn read_source(path: &Path) -> FileResult<Vec<u8>> {
    read_limited(path, MAX_FILE_SIZE)
}

fn read_limited(path: &Path, limit: u64) -> FileResult<Vec<u8>> {
    let size = fs::metadata(path)
        .map_err(|e| FileError::new(FileErrorKind::ReadFailure, e.to_string()))?
        .len();
    if size > limit {
        return Err(FileError::new(
            FileErrorKind::ReadFailure,
            format!("file too large: {} bytes, maximum {} bytes", size, limit),
        ));
    }
    fs::read(path).map_err(|e| FileError::new(FileErrorKind::ReadFailure, e.to_string()))
}

/// Decodes `bytes`, trusting their content over the extension-derived `hint`.
pub fn decode_image(bytes: &[u8], hint: ImageKind, want_exif: bool) -> FileResult<DecodedImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FileError::new(FileErrorKind::ReadFailure, e.to_string()))?;

    let kind = match reader.format() {
        Some(format) => ImageKind::from_image_format(format).ok_or_else(|| {
            FileError::new(
                FileErrorKind::UnsupportedFormat,
                format!("{:?} content is not handled", format),
            )
        })?,
        None => {
            reader.set_format(hint.to_image_format());
            hint
        }
    };

    let raster = reader.decode().map_err(FileError::decode)?;
    let exif = if want_exif { read_exif(bytes) } else { None };

    Ok(DecodedImage { raster, kind, exif })
}

/// Shrinks `img` to fit inside `ceiling`, keeping its aspect ratio.
///
/// Returns the new size, or `None` when the image already fits.
pub fn resize_image(img: &mut DynamicImage, ceiling: Option<Dimensions>) -> Option<Dimensions> {
    let ceiling = ceiling?;
    let (width, height) = img.dimensions();
    let target = fit_within(Dimensions::new(width, height), ceiling)?;

    debug!("Resizing {}x{} to {}", width, height, target);
    *img = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
    Some(target)
}

/// Encodes `img` as `kind`. Quality drives the JPEG encoder and the PNG
/// deflate effort; WebP output is always lossless.
pub fn encode_image(img: &DynamicImage, kind: ImageKind, quality: u8) -> FileResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());

    match kind {
        ImageKind::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            let result = match img.color() {
                ColorType::L8 | ColorType::L16 => encoder.encode_image(&img.to_luma8()),
                _ => encoder.encode_image(&img.to_rgb8()),
            };
            result.map_err(FileError::encode)?;
        }
        ImageKind::Png => {
            img.write_to(&mut buf, image::ImageFormat::Png)
                .map_err(FileError::encode)?;
            return optimize_png(&buf.into_inner(), quality);
        }
        ImageKind::Tiff => {
            img.write_to(&mut buf, image::ImageFormat::Tiff)
                .map_err(FileError::encode)?;
        }
        ImageKind::WebP | ImageKind::Bmp => {
            to_8bit(img)
                .write_to(&mut buf, kind.to_image_format())
                .map_err(FileError::encode)?;
        }
        ImageKind::Gif => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut buf, image::ImageFormat::Gif)
                .map_err(FileError::encode)?;
        }
    }

    Ok(buf.into_inner())
}

fn to_8bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn optimize_png(png: &[u8], quality: u8) -> FileResult<Vec<u8>> {
    let mut options = Options::from_preset(OXIPNG_PRESET);

    // 根据质量设置调整压缩级别
    options.deflate = if quality >= PNG_ZOPFLI_THRESHOLD {
        Deflaters::Zopfli {
            iterations: NonZeroU8::new(ZOPFLI_ITERATIONS).unwrap_or(NonZeroU8::MIN),
        }
    } else if quality >= PNG_HIGH_THRESHOLD {
        Deflaters::Libdeflater {
            compression: LIBDEFLATER_HIGH_LEVEL,
        }
    } else {
        Deflaters::Libdeflater {
            compression: LIBDEFLATER_LOW_LEVEL,
        }
    };

    oxipng::optimize_from_memory(png, &options)
        .map_err(|e| FileError::new(FileErrorKind::EncodeFailure, format!("PNG optimization: {}", e)))
}

/// Local pipeline for one task: decode -> resize -> encode -> metadata.
pub fn compress_local(task: &ImageTask, source: &[u8]) -> FileResult<LocalOutput> {
    let decoded = decode_image(source, task.source_kind, task.preserve_metadata)?;
    if decoded.kind != task.source_kind {
        debug!(
            "{:?} holds {} data despite its extension",
            task.source_path, decoded.kind
        );
    }

    let mut raster = decoded.raster;
    let (width, height) = raster.dimensions();
    let original_dimensions = Dimensions::new(width, height);
    let final_dimensions = resize_image(&mut raster, task.resize).unwrap_or(original_dimensions);

    let quality = match task.quality {
        Quality::Level(q) => q,
        Quality::Remote => DEFAULT_QUALITY,
    };
    let output_kind = task.output_kind();
    let mut bytes = encode_image(&raster, output_kind, quality)?;

    let mut metadata_kept = false;
    if let Some(exif) = decoded.exif.as_deref() {
        if output_kind.supports_exif() {
            bytes = attach_exif(
                output_kind,
                bytes,
                exif,
                final_dimensions,
                raster.color().has_alpha(),
            )?;
            metadata_kept = true;
        } else {
            warn!(
                "{} output cannot carry EXIF, metadata of {:?} dropped",
                output_kind, task.source_path
            );
        }
    }

    Ok(LocalOutput {
        bytes,
        original_dimensions,
        final_dimensions,
        metadata_kept,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::sample_exif;
    use crate::policy::TaskFormat;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn task(kind: ImageKind, format: TaskFormat) -> ImageTask {
        ImageTask {
            source_path: PathBuf::from("/in/source"),
            target_path: PathBuf::from("/out/target"),
            source_kind: kind,
            format,
            quality: Quality::Level(80),
            resize: None,
            preserve_metadata: false,
        }
    }

    #[test]
    fn test_oversized_source_is_a_read_failure() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("huge.png");
        fs::write(&path, vec![0u8; 2048]).unwrap();

        let err = read_limited(&path, 1024).unwrap_err();
        assert_eq!(err.kind, FileErrorKind::ReadFailure);
        assert!(err.message.contains("too large"));
        assert_eq!(read_limited(&path, 4096).unwrap().len(), 2048);
    }

    #[test]
    fn test_resize_image_within_ceiling() {
        let mut img = DynamicImage::new_rgb8(2000, 1500);
        let resized = resize_image(&mut img, Some(Dimensions::new(800, 600)));

        assert_eq!(resized, Some(Dimensions::new(800, 600)));
        assert_eq!(img.dimensions(), (800, 600));
    }

    #[test]
    fn test_resize_image_no_upscale() {
        let mut img = DynamicImage::new_rgb8(400, 300);
        let resized = resize_image(&mut img, Some(Dimensions::new(800, 600)));

        assert_eq!(resized, None);
        assert_eq!(img.dimensions(), (400, 300));
    }

    #[test]
    fn test_resize_image_no_ceiling() {
        let mut img = DynamicImage::new_rgb8(2000, 1500);
        assert_eq!(resize_image(&mut img, None), None);
        assert_eq!(img.dimensions(), (2000, 1500));
    }

    #[test]
    fn test_encode_then_decode_each_kind() {
        let img = gradient(32, 24);
        for kind in [
            ImageKind::Jpeg,
            ImageKind::Png,
            ImageKind::WebP,
            ImageKind::Bmp,
            ImageKind::Tiff,
            ImageKind::Gif,
        ] {
            let bytes = encode_image(&img, kind, 75).unwrap();
            let decoded = decode_image(&bytes, kind, false).unwrap();
            assert_eq!(decoded.kind, kind);
            assert_eq!(decoded.raster.dimensions(), (32, 24));
        }
    }

    #[test]
    fn test_jpeg_quality_affects_size() {
        let img = gradient(128, 128);
        let low = encode_image(&img, ImageKind::Jpeg, 10).unwrap();
        let high = encode_image(&img, ImageKind::Jpeg, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_decode_garbage_is_corrupt_or_unsupported() {
        let err = decode_image(b"definitely not pixels", ImageKind::Jpeg, false)
            .err()
            .unwrap();
        assert!(matches!(
            err.kind,
            FileErrorKind::CorruptSource | FileErrorKind::UnsupportedFormat
        ));
    }

    #[test]
    fn test_decode_uses_content_over_extension() {
        let png = encode_image(&gradient(4, 4), ImageKind::Png, 80).unwrap();
        let decoded = decode_image(&png, ImageKind::Jpeg, false).unwrap();
        assert_eq!(decoded.kind, ImageKind::Png);
    }

    #[test]
    fn test_compress_local_keeps_metadata() {
        let jpeg = encode_image(&gradient(40, 30), ImageKind::Jpeg, 90).unwrap();
        let jpeg = attach_exif(
            ImageKind::Jpeg,
            jpeg,
            &sample_exif(),
            Dimensions::new(40, 30),
            false,
        )
        .unwrap();

        let mut keep = task(ImageKind::Jpeg, TaskFormat::Raster(ImageKind::Jpeg));
        keep.preserve_metadata = true;
        let output = compress_local(&keep, &jpeg).unwrap();
        assert!(output.metadata_kept);
        assert_eq!(read_exif(&output.bytes), Some(sample_exif()));

        let drop = task(ImageKind::Jpeg, TaskFormat::Raster(ImageKind::Jpeg));
        let output = compress_local(&drop, &jpeg).unwrap();
        assert!(!output.metadata_kept);
        assert_eq!(read_exif(&output.bytes), None);
    }

    #[test]
    fn test_compress_local_converts_to_webp() {
        let png = encode_image(&gradient(50, 20), ImageKind::Png, 80).unwrap();
        let mut convert = task(ImageKind::Png, TaskFormat::WebP);
        convert.resize = Some(Dimensions::new(25, 25));

        let output = compress_local(&convert, &png).unwrap();
        assert_eq!(output.original_dimensions, Dimensions::new(50, 20));
        assert_eq!(output.final_dimensions, Dimensions::new(25, 10));

        let decoded = decode_image(&output.bytes, ImageKind::WebP, false).unwrap();
        assert_eq!(decoded.kind, ImageKind::WebP);
        assert_eq!(decoded.raster.dimensions(), (25, 10));
    }
}
