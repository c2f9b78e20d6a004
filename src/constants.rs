pub const DEFAULT_QUALITY: u8 = 80;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// Sources above this size are rejected before decoding.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

pub const ZOPFLI_ITERATIONS: u8 = 15;
pub const LIBDEFLATER_HIGH_LEVEL: u8 = 12;
pub const LIBDEFLATER_LOW_LEVEL: u8 = 8;
pub const OXIPNG_PRESET: u8 = 4;

/// Quality at or above which PNG output goes through Zopfli.
pub const PNG_ZOPFLI_THRESHOLD: u8 = 90;
/// Quality at or above which PNG output uses the high libdeflater level.
pub const PNG_HIGH_THRESHOLD: u8 = 70;

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp"];

pub const TINIFY_API_KEY_ENV: &str = "TINIFY_API_KEY";
pub const TINIFY_SHRINK_URL: &str = "https://api.tinify.com/shrink";
pub const TINIFY_USER: &str = "api";
pub const REMOTE_TIMEOUT_SECS: u64 = 60;

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
pub const PROGRESS_TICK_CHARS: &str = "=>-";

// Common output message prefixes
pub const ORIGINAL_SIZE_PREFIX: &str = "📊 Total original size:";
pub const COMPRESSED_SIZE_PREFIX: &str = "📈 Total final size:";
pub const COMPRESSION_RATIO_PREFIX: &str = "🎯 Overall compression ratio:";
pub const SUCCESS_PREFIX: &str = "✅";
pub const WARNING_PREFIX: &str = "⚠️";
pub const ERROR_PREFIX: &str = "❌";
pub const SKIP_PREFIX: &str = "⏭️";
