//! Every file the batch touches is classified into an [`ImageKind`] from its
//! extension; the run-wide conversion choice is a [`TargetFormat`].

use crate::error::ConfigError;
use image::ImageFormat;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Container formats recognized by the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Tiff,
    Gif,
}

impl ImageKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::WebP),
            "bmp" => Some(ImageKind::Bmp),
            "tif" | "tiff" => Some(ImageKind::Tiff),
            "gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::WebP => Some(ImageKind::WebP),
            ImageFormat::Bmp => Some(ImageKind::Bmp),
            ImageFormat::Tiff => Some(ImageKind::Tiff),
            ImageFormat::Gif => Some(ImageKind::Gif),
            _ => None,
        }
    }

    /// Canonical extension for freshly written files of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::WebP => "webp",
            ImageKind::Bmp => "bmp",
            ImageKind::Tiff => "tiff",
            ImageKind::Gif => "gif",
        }
    }

    pub fn to_image_format(&self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::WebP => ImageFormat::WebP,
            ImageKind::Bmp => ImageFormat::Bmp,
            ImageKind::Tiff => ImageFormat::Tiff,
            ImageKind::Gif => ImageFormat::Gif,
        }
    }

    /// Whether an EXIF block can be carried by this container.
    pub fn supports_exif(&self) -> bool {
        matches!(self, ImageKind::Jpeg | ImageKind::Png | ImageKind::WebP)
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Png => "PNG",
            ImageKind::WebP => "WebP",
            ImageKind::Bmp => "BMP",
            ImageKind::Tiff => "TIFF",
            ImageKind::Gif => "GIF",
        };
        write!(f, "{}", name)
    }
}

/// Output container choice for a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    /// Re-encode into the source's own format.
    #[default]
    KeepOriginal,
    /// Convert everything to lossless WebP.
    LosslessWebP,
}

impl FromStr for TargetFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" | "original" | "keep-original" => Ok(TargetFormat::KeepOriginal),
            "webp" | "lossless-webp" => Ok(TargetFormat::LosslessWebP),
            _ => Err(ConfigError::UnknownTargetFormat(s.to_string())),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFormat::KeepOriginal => write!(f, "keep-original"),
            TargetFormat::LosslessWebP => write!(f, "lossless-webp"),
        }
    }
}

/// Check if a file path carries a recognized image extension
pub fn is_image_file(path: &Path) -> bool {
    ImageKind::from_path(path).is_some()
}
