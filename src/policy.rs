//! Per-file decisions: quality, resize ceiling, output format and path.
//!
//! Nothing in here touches the filesystem.

use crate::config::{Configuration, Dimensions};
use crate::constants::{MAX_QUALITY, MIN_QUALITY};
use crate::error::{FileError, FileErrorKind, FileResult};
use crate::formats::{ImageKind, TargetFormat};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Local encoder quality, 1-100.
    Level(u8),
    /// The remote service picks its own settings.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFormat {
    /// Decode and re-encode locally into the given container.
    Raster(ImageKind),
    /// Decode locally and write lossless WebP.
    WebP,
    /// Hand the original bytes to the remote compressor untouched.
    Passthrough,
}

/// Everything needed to process one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub source_kind: ImageKind,
    pub format: TaskFormat,
    pub quality: Quality,
    pub resize: Option<Dimensions>,
    pub preserve_metadata: bool,
}

impl ImageTask {
    /// Container of the file that ends up at `target_path`.
    pub fn output_kind(&self) -> ImageKind {
        match self.format {
            TaskFormat::Raster(kind) => kind,
            TaskFormat::WebP => ImageKind::WebP,
            TaskFormat::Passthrough => self.source_kind,
        }
    }
}

/// Builds the task for `path`, a file found below `root`.
///
/// # Arguments
/// * `path` - Enumerated source file
/// * `root` - Batch root the source was found under, used to mirror it into the output root
/// * `config` - Run configuration
///
/// # Returns
/// * `Ok(ImageTask)` - Output format, clamped quality, resize ceiling, metadata flag and target path
/// * `Err(FileError)` - `UnsupportedFormat` when the extension is not a known image kind
pub fn decide(path: &Path, root: &Path, config: &Configuration) -> FileResult<ImageTask> {
    let source_kind = ImageKind::from_path(path).ok_or_else(|| {
        FileError::new(
            FileErrorKind::UnsupportedFormat,
            format!("unrecognized extension on {}", path.display()),
        )
    })?;

    let (format, quality) = if config.use_remote_api {
        (TaskFormat::Passthrough, Quality::Remote)
    } else {
        let format = match config.target_format {
            TargetFormat::KeepOriginal => TaskFormat::Raster(source_kind),
            TargetFormat::LosslessWebP => TaskFormat::WebP,
        };
        (format, Quality::Level(config.quality.clamp(MIN_QUALITY, MAX_QUALITY)))
    };

    let output_kind = match format {
        TaskFormat::Raster(kind) => kind,
        TaskFormat::WebP => ImageKind::WebP,
        TaskFormat::Passthrough => source_kind,
    };
    let target_path = target_path(
        path,
        root,
        config.output_root.as_deref(),
        source_kind,
        output_kind,
    );

    Ok(ImageTask {
        source_path: path.to_path_buf(),
        target_path,
        source_kind,
        format,
        quality,
        resize: if config.use_remote_api { None } else { config.resize },
        preserve_metadata: config.preserve_exif && !config.use_remote_api,
    })
}

/// Where the output for `source` goes.
///
/// With an output root, the source's position below `root` is mirrored
/// there. The original extension (and its spelling) is kept unless the
/// container changes.
pub fn target_path(
    source: &Path,
    root: &Path,
    output_root: Option<&Path>,
    source_kind: ImageKind,
    output_kind: ImageKind,
) -> PathBuf {
    let base = match output_root {
        Some(out) => {
            let relative = source
                .strip_prefix(root)
                .ok()
                .map(Path::to_path_buf)
                .or_else(|| source.file_name().map(PathBuf::from))
                .unwrap_or_default();
            out.join(relative)
        }
        None => source.to_path_buf(),
    };

    if source_kind == output_kind {
        base
    } else {
        base.with_extension(output_kind.extension())
    }
}

/// Largest size fitting inside `ceiling` with the aspect ratio of `source`.
///
/// # Arguments
/// * `source` - Current pixel size
/// * `ceiling` - Bounding box the result must fit in
///
/// # Returns
/// * `Some(Dimensions)` - Shrunk size, at least 1x1
/// * `None` - `source` already fits, so images are never enlarged
pub fn fit_within(source: Dimensions, ceiling: Dimensions) -> Option<Dimensions> {
    if source.width == 0 || source.height == 0 {
        return None;
    }
    if source.width <= ceiling.width && source.height <= ceiling.height {
        return None;
    }

    let (w, h) = (u64::from(source.width), u64::from(source.height));
    let (max_w, max_h) = (u64::from(ceiling.width), u64::from(ceiling.height));

    // Compare max_w / w against max_h / h without floats.
    let (new_w, new_h) = if max_w * h <= max_h * w {
        (max_w, ((h * max_w + w / 2) / w).clamp(1, max_h))
    } else {
        (((w * max_h + h / 2) / h).clamp(1, max_w), max_h)
    };

    // Both results are bounded by the u32 ceiling.
    Some(Dimensions::new(new_w as u32, new_h as u32))
}
