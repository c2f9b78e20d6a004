#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use img_squeeze::config::Dimensions;
use img_squeeze::formats::ImageKind;
use img_squeeze::metadata::attach_exif;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

/// A gradient, so encoders have something to chew on.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, encode(&gradient(width, height), format)).unwrap();
    path.to_path_buf()
}

pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    write_image(&dir.join(name), width, height, ImageFormat::Jpeg)
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    write_image(&dir.join(name), width, height, ImageFormat::Png)
}

/// A file with an image extension and garbage inside.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"\xFF\xD8\xFF\xE0 this is not really a jpeg").unwrap();
    path
}

pub fn write_text(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"not an image").unwrap();
    path
}

/// Little-endian TIFF block with Orientation = 6.
pub fn sample_exif() -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&[6, 0, 0, 0]);
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff
}

/// An image of the given kind carrying [`sample_exif`].
pub fn write_with_exif(dir: &Path, name: &str, width: u32, height: u32, kind: ImageKind) -> PathBuf {
    let encoded = encode(&gradient(width, height), kind.to_image_format());
    let tagged = attach_exif(
        kind,
        encoded,
        &sample_exif(),
        Dimensions::new(width, height),
        false,
    )
    .unwrap();
    let path = dir.join(name);
    fs::write(&path, tagged).unwrap();
    path
}

pub fn write_jpeg_with_exif(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    write_with_exif(dir, name, width, height, ImageKind::Jpeg)
}

pub fn dimensions_of(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}
