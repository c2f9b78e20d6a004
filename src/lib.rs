pub mod batch;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod formats;
pub mod logger;
pub mod metadata;
pub mod policy;
pub mod processing;
pub mod remote;
pub mod report;
pub mod scan;
pub mod utils;

pub use batch::{batch_compress_images, Pipeline};
pub use config::{ApiCredential, Configuration, Dimensions};
pub use error::{ConfigError, FileError, FileErrorKind, Result};
pub use formats::{is_image_file, ImageKind, TargetFormat};
pub use policy::{decide, fit_within, ImageTask, Quality, TaskFormat};
pub use remote::{RemoteCompressor, RemoteError, TinifyClient};
pub use report::{BatchReport, CompressionResult, Outcome, SkipReason};
pub use scan::{collect_image_files, ImageScanner, ScanEntry};
