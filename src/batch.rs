use crate::config::Configuration;
use crate::constants::{PROGRESS_BAR_TEMPLATE, PROGRESS_TICK_CHARS, TINIFY_API_KEY_ENV};
use crate::error::{ConfigError, FileError, FileErrorKind, FileResult, Result};
use crate::policy::{decide, ImageTask, TaskFormat};
use crate::processing::{compress_local, read_source};
use crate::remote::{RemoteCompressor, TinifyClient};
use crate::report::{BatchReport, CompressionResult, Outcome, SkipReason};
use crate::scan::{ImageScanner, Scan};
use crate::utils::write_atomic;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compresses every image below `root` with the given configuration.
///
/// # Arguments
/// * `root` - Directory to walk
/// * `config` - Run configuration, credential already injected
///
/// # Returns
/// * `Ok(BatchReport)` - One result per enumerated image, in walk order
/// * `Err(ConfigError)` - Only configuration problems; everything that goes
///   wrong with an individual file ends up in the report
pub fn batch_compress_images(root: &Path, config: &Configuration) -> Result<BatchReport> {
    Pipeline::new(config).run(root)
}

/// One batch run: walk, decide, process, report.
pub struct Pipeline<'a> {
    config: &'a Configuration,
    remote: Option<&'a dyn RemoteCompressor>,
    cancel: Arc<AtomicBool>,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self {
            config,
            remote: None,
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }

    /// Uses `remote` instead of building a Tinify client from the credential.
    pub fn with_remote(mut self, remote: &'a dyn RemoteCompressor) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Once `flag` is set, files that have not started are skipped.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Runs the batch below `root`.
    ///
    /// # Arguments
    /// * `root` - Directory to walk
    ///
    /// # Returns
    /// * `Ok(BatchReport)` - Every enumerated image with its outcome, in walk
    ///   order regardless of which worker finished first
    /// * `Err(ConfigError)` - Invalid configuration, missing root, output
    ///   directory or worker pool problems; no file has been touched
    pub fn run(&self, root: &Path) -> Result<BatchReport> {
        let start_time = Instant::now();
        self.config.validate()?;

        let owned_client;
        let remote: Option<&dyn RemoteCompressor> = match (self.config.use_remote_api, self.remote)
        {
            (false, _) => None,
            (true, Some(remote)) => Some(remote),
            (true, None) => {
                let credential = self
                    .config
                    .api_credential
                    .clone()
                    .ok_or(ConfigError::MissingCredential(TINIFY_API_KEY_ENV))?;
                owned_client = TinifyClient::new(credential)?;
                Some(&owned_client as &dyn RemoteCompressor)
            }
        };

        let scanner = ImageScanner::new(root, self.config.recursive)?;
        let mut config = self.config.clone();
        if let Some(output) = &self.config.output_root {
            fs::create_dir_all(output)
                .map_err(|_| ConfigError::DirectoryCreationFailed(output.clone()))?;
            let output = output
                .canonicalize()
                .map_err(|_| ConfigError::DirectoryCreationFailed(output.clone()))?;
            config.output_root = Some(output);
        }
        let scanner = scanner.excluding(config.output_root.clone());

        info!("Starting batch compression in {:?}", scanner.root());
        let scan = Scan::collect(&scanner);
        for (path, reason) in &scan.unreadable {
            warn!("Skipping unreadable entry {:?}: {}", path, reason);
        }

        let total_files = scan.images.len();
        if total_files == 0 {
            warn!("No image files found in {:?}", scanner.root());
            return Ok(BatchReport {
                results: Vec::new(),
                unreadable: scan.unreadable,
                elapsed: start_time.elapsed(),
            });
        }
        info!("Found {} image files to process", total_files);

        let tasks: Vec<(PathBuf, FileResult<ImageTask>)> = scan
            .images
            .iter()
            .map(|path| (path.clone(), decide(path, scanner.root(), &config)))
            .collect();
        let tasks = claim_targets(tasks);

        let threads = config.threads.unwrap_or_else(num_cpus::get).max(1);
        debug!("Using {} worker threads", threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;

        let progress = self.progress_bar(total_files as u64);
        let tally = Tally::default();

        // Indexed parallel iteration keeps the collected results in walk order.
        let results: Vec<CompressionResult> = pool.install(|| {
            tasks
                .into_par_iter()
                .map(|(source, task)| {
                    let result = self.process_one(source, task, remote, config.skip_if_larger);
                    tally.record(&result, &progress);
                    result
                })
                .collect()
        });

        if self.cancel.load(Ordering::Acquire) {
            progress.abandon_with_message("Batch aborted");
        } else {
            progress.finish_with_message("Batch compression complete");
        }

        Ok(BatchReport {
            results,
            unreadable: scan.unreadable,
            elapsed: start_time.elapsed(),
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(PROGRESS_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(PROGRESS_TICK_CHARS);
        ProgressBar::new(len).with_style(style)
    }

    fn process_one(
        &self,
        source: PathBuf,
        task: FileResult<ImageTask>,
        remote: Option<&dyn RemoteCompressor>,
        skip_if_larger: bool,
    ) -> CompressionResult {
        if self.cancel.load(Ordering::Acquire) {
            return CompressionResult {
                source_path: source,
                target_path: None,
                outcome: Outcome::Skipped(SkipReason::Cancelled),
            };
        }

        match task {
            Ok(task) => {
                let target = task.target_path.clone();
                let outcome = match execute(&task, remote, skip_if_larger) {
                    Ok(outcome) => outcome,
                    Err(err) => Outcome::Failed(err),
                };
                CompressionResult {
                    source_path: source,
                    target_path: Some(target),
                    outcome,
                }
            }
            Err(err) => CompressionResult {
                source_path: source,
                target_path: None,
                outcome: Outcome::Failed(err),
            },
        }
    }
}

/// Processes one task end to end. Every error stays with this file.
fn execute(
    task: &ImageTask,
    remote: Option<&dyn RemoteCompressor>,
    skip_if_larger: bool,
) -> FileResult<Outcome> {
    let source = read_source(&task.source_path)?;
    let original_size = source.len() as u64;

    let (bytes, dimensions) = match task.format {
        TaskFormat::Passthrough => {
            let remote = remote.ok_or_else(|| {
                FileError::new(
                    FileErrorKind::RemoteNetworkFailure,
                    "no remote compressor available",
                )
            })?;
            (remote.compress(&source)?, None)
        }
        TaskFormat::Raster(_) | TaskFormat::WebP => {
            let output = compress_local(task, &source)?;
            (
                output.bytes,
                Some((output.original_dimensions, output.final_dimensions)),
            )
        }
    };

    let final_size = bytes.len() as u64;
    if skip_if_larger && final_size >= original_size {
        return Ok(Outcome::Skipped(SkipReason::NotSmaller {
            original_size,
            final_size,
        }));
    }

    write_atomic(&task.target_path, &bytes)?;
    debug!(
        "{:?} -> {:?}: {} -> {} bytes",
        task.source_path, task.target_path, original_size, final_size
    );

    Ok(Outcome::Success {
        original_size,
        final_size,
        dimensions,
    })
}

/// Resolves target path clashes before any work starts.
///
/// Every source owns its own path. A task whose target is another source's
/// path, or a target already claimed earlier in walk order, fails with
/// `TargetCollision` instead of overwriting.
fn claim_targets(
    tasks: Vec<(PathBuf, FileResult<ImageTask>)>,
) -> Vec<(PathBuf, FileResult<ImageTask>)> {
    let mut owners: HashMap<PathBuf, PathBuf> = tasks
        .iter()
        .map(|(source, _)| (source.clone(), source.clone()))
        .collect();

    tasks
        .into_iter()
        .map(|(source, task)| {
            let task = task.and_then(|task| match owners.get(&task.target_path) {
                Some(owner) if owner != &task.source_path => Err(FileError::new(
                    FileErrorKind::TargetCollision,
                    format!(
                        "{} is already the target of {}",
                        task.target_path.display(),
                        owner.display()
                    ),
                )),
                _ => {
                    owners.insert(task.target_path.clone(), task.source_path.clone());
                    Ok(task)
                }
            });
            (source, task)
        })
        .collect()
}

/// Running success/failure counts shown on the progress bar.
#[derive(Default)]
struct Tally {
    ok: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    fn record(&self, result: &CompressionResult, progress: &ProgressBar) {
        match &result.outcome {
            Outcome::Success { .. } => {
                self.ok.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Skipped(reason) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                debug!("Skipped {:?}: {}", result.source_path, reason);
            }
            Outcome::Failed(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                progress.suspend(|| warn!("Failed to process {:?}: {}", result.source_path, err));
            }
        }

        progress.set_message(format!(
            "✅ {} ⏭️ {} ❌ {}",
            self.ok.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        ));
        progress.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dimensions;
    use crate::formats::ImageKind;
    use crate::policy::Quality;

    fn task(source: &str, target: &str) -> ImageTask {
        ImageTask {
            source_path: PathBuf::from(source),
            target_path: PathBuf::from(target),
            source_kind: ImageKind::Jpeg,
            format: TaskFormat::WebP,
            quality: Quality::Level(80),
            resize: Some(Dimensions::new(10, 10)),
            preserve_metadata: false,
        }
    }

    fn entries(pairs: &[(&str, &str)]) -> Vec<(PathBuf, FileResult<ImageTask>)> {
        pairs
            .iter()
            .map(|(s, t)| (PathBuf::from(s), Ok(task(s, t))))
            .collect()
    }

    #[test]
    fn test_claim_targets_first_wins() {
        let claimed = claim_targets(entries(&[
            ("/in/a.jpg", "/out/a.webp"),
            ("/in/a.png", "/out/a.webp"),
            ("/in/b.jpg", "/out/b.webp"),
        ]));

        assert!(claimed[0].1.is_ok());
        assert_eq!(
            claimed[1].1.as_ref().unwrap_err().kind,
            FileErrorKind::TargetCollision
        );
        assert!(claimed[2].1.is_ok());
    }

    #[test]
    fn test_claim_targets_never_overwrites_another_source() {
        let claimed = claim_targets(entries(&[
            ("/in/a.jpg", "/in/a.webp"),
            ("/in/a.webp", "/in/a.webp"),
        ]));

        assert_eq!(
            claimed[0].1.as_ref().unwrap_err().kind,
            FileErrorKind::TargetCollision
        );
        assert!(claimed[1].1.is_ok());
    }

    #[test]
    fn test_claim_targets_in_place_is_fine() {
        let claimed = claim_targets(entries(&[("/in/a.jpg", "/in/a.jpg"), ("/in/b.jpg", "/in/b.jpg")]));
        assert!(claimed.iter().all(|(_, task)| task.is_ok()));
    }
}
