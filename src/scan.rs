//! Directory walking.
//!
//! Symlinks are followed. walkdir keeps the identity of every ancestor
//! directory, so a link pointing back up the tree surfaces as a loop error
//! for that entry rather than an endless descent.

use crate::error::{ConfigError, Result};
use crate::formats::is_image_file;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One item produced by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    /// A file with a recognized image extension.
    Image(PathBuf),
    /// An entry that could not be examined; the batch carries on without it.
    Unreadable { path: PathBuf, reason: String },
}

/// A validated batch root.
#[derive(Debug, Clone)]
pub struct ImageScanner {
    root: PathBuf,
    recursive: bool,
    exclude: Option<PathBuf>,
}

impl ImageScanner {
    /// Checks the root and resolves it to an absolute path.
    pub fn new(root: &Path, recursive: bool) -> Result<Self> {
        if !root.exists() {
            return Err(ConfigError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ConfigError::RootNotDirectory(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|_| ConfigError::RootNotFound(root.to_path_buf()))?;

        Ok(Self {
            root,
            recursive,
            exclude: None,
        })
    }

    /// Skips a directory (and everything below it) during the walk.
    pub fn excluding(mut self, dir: Option<PathBuf>) -> Self {
        self.exclude = dir;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a fresh walk. Each call begins again from the root.
    pub fn iter(&self) -> ImageFiles {
        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut visited = HashSet::new();
        visited.insert(self.root.clone());

        ImageFiles {
            inner: walker.into_iter(),
            exclude: self.exclude.clone(),
            visited,
            seen_files: HashSet::new(),
        }
    }
}

/// Lazy walk over a batch root, in file-name order per directory.
///
/// Directories and files are tracked by their resolved path, so a symlink to
/// something already walked is skipped instead of yielding the same physical
/// file twice.
pub struct ImageFiles {
    inner: walkdir::IntoIter,
    exclude: Option<PathBuf>,
    visited: HashSet<PathBuf>,
    seen_files: HashSet<PathBuf>,
}

impl Iterator for ImageFiles {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<ScanEntry> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        let resolved = match entry.path().canonicalize() {
                            Ok(resolved) => resolved,
                            Err(e) => {
                                self.inner.skip_current_dir();
                                return Some(ScanEntry::Unreadable {
                                    path: entry.into_path(),
                                    reason: e.to_string(),
                                });
                            }
                        };
                        if self.exclude.as_deref() == Some(resolved.as_path()) {
                            debug!("Skipping output directory {:?}", entry.path());
                            self.inner.skip_current_dir();
                        } else if !self.visited.insert(resolved) {
                            debug!("Skipping {:?}, already walked", entry.path());
                            self.inner.skip_current_dir();
                        }
                        continue;
                    }
                    if entry.file_type().is_file() && is_image_file(entry.path()) {
                        let resolved = entry
                            .path()
                            .canonicalize()
                            .unwrap_or_else(|_| entry.path().to_path_buf());
                        if !self.seen_files.insert(resolved) {
                            debug!("Skipping {:?}, same file already listed", entry.path());
                            continue;
                        }
                        return Some(ScanEntry::Image(entry.into_path()));
                    }
                }
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let reason = match err.loop_ancestor() {
                        Some(ancestor) => format!("symlink loop back to {}", ancestor.display()),
                        None => err.to_string(),
                    };
                    return Some(ScanEntry::Unreadable { path, reason });
                }
            }
        }
    }
}

/// Result of walking a root to completion.
#[derive(Debug, Default, Clone)]
pub struct Scan {
    pub images: Vec<PathBuf>,
    pub unreadable: Vec<(PathBuf, String)>,
}

impl Scan {
    pub fn collect(scanner: &ImageScanner) -> Self {
        let mut scan = Scan::default();
        for entry in scanner.iter() {
            match entry {
                ScanEntry::Image(path) => scan.images.push(path),
                ScanEntry::Unreadable { path, reason } => scan.unreadable.push((path, reason)),
            }
        }
        scan
    }
}

/// Collects every image below `root`.
///
/// # Arguments
/// * `root` - Directory to walk
/// * `recursive` - Descend into subdirectories
///
/// # Returns
/// * `Ok(Scan)` - Images in walk order plus entries that could not be read
/// * `Err(ConfigError)` - `root` is missing or not a directory
pub fn collect_image_files(root: &Path, recursive: bool) -> Result<Scan> {
    let scanner = ImageScanner::new(root, recursive)?;
    Ok(Scan::collect(&scanner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn names(scan: &Scan) -> Vec<String> {
        scan.images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_root_must_exist() {
        let result = ImageScanner::new(Path::new("/nonexistent/batch/root"), true);
        assert!(matches!(result, Err(ConfigError::RootNotFound(_))));
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("photo.jpg");
        File::create(&file).unwrap();

        let result = ImageScanner::new(&file, true);
        assert!(matches!(result, Err(ConfigError::RootNotDirectory(_))));
    }

    #[test]
    fn test_collect_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.webp", "d.tif", "archive.zip"] {
            File::create(temp_dir.path().join(name)).unwrap();
        }

        let scan = collect_image_files(temp_dir.path(), true).unwrap();
        assert_eq!(names(&scan), vec!["a.JPG", "b.png", "c.webp", "d.tif"]);
        assert!(scan.images.iter().all(|p| p.is_absolute()));
        assert!(scan.unreadable.is_empty());
    }

    #[test]
    fn test_collect_recursive_and_shallow() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("nested");
        fs::create_dir(&subdir).unwrap();
        File::create(temp_dir.path().join("top.jpg")).unwrap();
        File::create(subdir.join("deep.png")).unwrap();

        let deep = collect_image_files(temp_dir.path(), true).unwrap();
        assert_eq!(names(&deep), vec!["deep.png", "top.jpg"]);

        let shallow = collect_image_files(temp_dir.path(), false).unwrap();
        assert_eq!(names(&shallow), vec!["top.jpg"]);
    }

    #[test]
    fn test_excluded_directory_is_not_walked() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();
        File::create(temp_dir.path().join("in.jpg")).unwrap();
        File::create(out.join("previous.jpg")).unwrap();

        let scanner = ImageScanner::new(temp_dir.path(), true).unwrap();
        let exclude = out.canonicalize().unwrap();
        let scan = Scan::collect(&scanner.excluding(Some(exclude)));
        assert_eq!(names(&scan), vec!["in.jpg"]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("one.gif")).unwrap();
        File::create(temp_dir.path().join("two.bmp")).unwrap();

        let scanner = ImageScanner::new(temp_dir.path(), true).unwrap();
        let first: Vec<_> = scanner.iter().collect();
        let second: Vec<_> = scanner.iter().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_walked_once() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        fs::create_dir(&real).unwrap();
        File::create(real.join("x.jpg")).unwrap();
        std::os::unix::fs::symlink(&real, temp_dir.path().join("alias")).unwrap();
        std::os::unix::fs::symlink(real.join("x.jpg"), temp_dir.path().join("y.jpg")).unwrap();

        let scan = collect_image_files(temp_dir.path(), true).unwrap();
        assert_eq!(scan.images.len(), 1);
        assert!(scan.unreadable.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_reported_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("album");
        fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("cover.png")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path(), subdir.join("back")).unwrap();

        let scan = collect_image_files(temp_dir.path(), true).unwrap();
        assert_eq!(names(&scan), vec!["cover.png"]);
        assert_eq!(scan.unreadable.len(), 1);
        assert!(scan.unreadable[0].1.contains("loop"));
    }
}
