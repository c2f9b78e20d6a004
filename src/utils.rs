//! Size formatting for the report and the atomic writer used for every
//! output file.

use crate::error::{FileError, FileErrorKind, FileResult};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Writes `bytes` to `target` through a temporary file in the same directory.
///
/// The target is replaced only once the data is fully on disk, so an
/// in-place run never leaves a truncated image behind.
///
/// # Arguments
/// * `target` - Destination path; a symlink is followed and its destination rewritten
/// * `bytes` - Complete file contents
///
/// # Returns
/// * `Ok(())` - The target holds `bytes` and keeps the permissions it had before
/// * `Err(FileError)` - `WriteFailure`, with the target left untouched
pub fn write_atomic(target: &Path, bytes: &[u8]) -> FileResult<()> {
    let write_err = |e: std::io::Error| {
        FileError::new(
            FileErrorKind::WriteFailure,
            format!("{}: {}", target.display(), e),
        )
    };

    let is_link = fs::symlink_metadata(target)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    let target = if is_link {
        target.canonicalize().map_err(write_err)?
    } else {
        target.to_path_buf()
    };
    let existing = fs::metadata(&target).ok().map(|meta| meta.permissions());

    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_err)?;

    #[allow(unused_mut)]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Fresh outputs get the mode `File::create` would give them.
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut temp = builder.tempfile_in(parent).map_err(write_err)?;
    temp.write_all(bytes).map_err(write_err)?;
    if let Some(permissions) = existing {
        temp.as_file().set_permissions(permissions).map_err(write_err)?;
    }
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(&target).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Human-readable size for the summary: `512 B`, `1.5 KB`, `3.2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    match unit {
        0 => format!("{} B", bytes),
        _ => format!("{:.1} {}", value, UNITS[unit]),
    }
}

/// Space saved as a percentage of `original_size`; negative when the
/// output grew.
pub fn calculate_compression_ratio(original_size: u64, final_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - final_size as f64 / original_size as f64) * 100.0
}
