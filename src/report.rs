use crate::config::Dimensions;
use crate::constants::{
    COMPRESSED_SIZE_PREFIX, COMPRESSION_RATIO_PREFIX, ERROR_PREFIX, ORIGINAL_SIZE_PREFIX,
    SKIP_PREFIX, SUCCESS_PREFIX, WARNING_PREFIX,
};
use crate::error::{FileError, FileErrorKind};
use crate::utils::{calculate_compression_ratio, format_file_size};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The batch was aborted before this file started.
    Cancelled,
    /// Output would not have been smaller; the target was left alone.
    NotSmaller { original_size: u64, final_size: u64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::NotSmaller {
                original_size,
                final_size,
            } => write!(
                f,
                "output not smaller ({} -> {})",
                format_file_size(*original_size),
                format_file_size(*final_size)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        original_size: u64,
        final_size: u64,
        /// Pixel sizes before and after, when the file went through the
        /// local codec.
        dimensions: Option<(Dimensions, Dimensions)>,
    },
    Skipped(SkipReason),
    Failed(FileError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    pub source_path: PathBuf,
    pub target_path: Option<PathBuf>,
    pub outcome: Outcome,
}

impl CompressionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn failure_kind(&self) -> Option<FileErrorKind> {
        match &self.outcome {
            Outcome::Failed(err) => Some(err.kind),
            _ => None,
        }
    }

    /// Written, but not smaller than the source.
    pub fn grew(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Success { original_size, final_size, .. } if final_size >= original_size
        )
    }
}

/// Outcome of one batch, one entry per enumerated file in walk order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<CompressionResult>,
    /// Walk entries that could not be examined.
    pub unreadable: Vec<(PathBuf, String)>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Success { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(CompressionResult::is_failure)
    }

    /// Files that were written even though they did not shrink.
    pub fn grown(&self) -> impl Iterator<Item = &CompressionResult> {
        self.results.iter().filter(|r| r.grew())
    }

    /// Byte totals over successful files: (before, after).
    pub fn totals(&self) -> (u64, u64) {
        self.results
            .iter()
            .fold((0, 0), |(before, after), r| match r.outcome {
                Outcome::Success {
                    original_size,
                    final_size,
                    ..
                } => (before + original_size, after + final_size),
                _ => (before, after),
            })
    }

    /// Prints the end-of-run summary.
    pub fn print_summary(&self) {
        let (before, after) = self.totals();
        let ratio = calculate_compression_ratio(before, after);

        println!("\n📊 Batch Compression Summary:");
        println!("  📁 Files enumerated: {}", self.len());
        println!("  {} Succeeded: {}", SUCCESS_PREFIX, self.succeeded());
        if self.skipped() > 0 {
            println!("  {}  Skipped: {}", SKIP_PREFIX, self.skipped());
        }
        if self.failed() > 0 {
            println!("  {} Failed: {}", ERROR_PREFIX, self.failed());
        }
        println!("  {} {} ({})", ORIGINAL_SIZE_PREFIX, before, format_file_size(before));
        println!("  {} {} ({})", COMPRESSED_SIZE_PREFIX, after, format_file_size(after));
        println!("  {} {:.1}%", COMPRESSION_RATIO_PREFIX, ratio);
        println!("  ⏱️  Total time: {:.2?}", self.elapsed);
        if !self.is_empty() && self.elapsed.as_secs_f64() > 0.0 {
            println!(
                "  ⚡ Average speed: {:.2} files/second",
                self.len() as f64 / self.elapsed.as_secs_f64()
            );
        }

        let grown: Vec<_> = self.grown().collect();
        if !grown.is_empty() {
            println!("\n{}  Not reduced ({}):", WARNING_PREFIX, grown.len());
            for result in grown {
                if let Outcome::Success {
                    original_size,
                    final_size,
                    ..
                } = result.outcome
                {
                    println!(
                        "  {} {} -> {}",
                        result.source_path.display(),
                        format_file_size(original_size),
                        format_file_size(final_size)
                    );
                }
            }
        }

        if self.failed() > 0 {
            println!("\n{} Failures:", ERROR_PREFIX);
            for result in self.results.iter().filter(|r| r.is_failure()) {
                if let Outcome::Failed(err) = &result.outcome {
                    println!("  {} [{}] {}", result.source_path.display(), err.kind, err.message);
                }
            }
        }

        if !self.unreadable.is_empty() {
            println!("\n{}  Unreadable entries ({}):", WARNING_PREFIX, self.unreadable.len());
            for (path, reason) in &self.unreadable {
                println!("  {} ({})", path.display(), reason);
            }
        }
    }
}
