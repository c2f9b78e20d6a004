use crate::constants::{DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY, TINIFY_API_KEY_ENV};
use crate::error::{ConfigError, Result};
use crate::formats::TargetFormat;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = ConfigError;

    /// Parses `800x600` (also accepts `X` and `×` as separator).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidResize(s.to_string());
        let (w, h) = s
            .trim()
            .split_once(['x', 'X', '×'])
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

/// Remote API key. Kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential(String);

impl ApiCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential(***)")
    }
}

/// Read-only settings for one batch run.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub quality: u8,
    /// Bounding box the output must fit in; never used to upscale.
    pub resize: Option<Dimensions>,
    pub preserve_exif: bool,
    pub use_remote_api: bool,
    pub target_format: TargetFormat,
    pub api_credential: Option<ApiCredential>,
    /// Separate output tree. `None` writes next to (or over) the sources.
    pub output_root: Option<PathBuf>,
    pub recursive: bool,
    /// Worker count, `None` for one per CPU.
    pub threads: Option<usize>,
    /// Leave the target untouched when re-encoding does not shrink the file.
    pub skip_if_larger: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            resize: None,
            preserve_exif: false,
            use_remote_api: false,
            target_format: TargetFormat::KeepOriginal,
            api_credential: None,
            output_root: None,
            recursive: true,
            threads: None,
            skip_if_larger: false,
        }
    }
}

impl Configuration {
    /// Fills in the remote credential from the process environment.
    ///
    /// Call once at startup; workers only ever see the injected value.
    pub fn with_credential_from_env(self) -> Self {
        self.with_credential_from(|name| std::env::var(name).ok())
    }

    pub fn with_credential_from<F>(mut self, lookup: F) -> Self
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if self.api_credential.is_none() {
            self.api_credential = lookup(TINIFY_API_KEY_ENV)
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
                .map(ApiCredential);
        }
        self
    }

    /// Rejects settings that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(ConfigError::InvalidQuality(self.quality));
        }

        if let Some(ceiling) = self.resize {
            if ceiling.width == 0 || ceiling.height == 0 {
                return Err(ConfigError::InvalidResize(ceiling.to_string()));
            }
        }

        if self.threads == Some(0) {
            return Err(ConfigError::ThreadPool(
                "thread count must be at least 1".to_string(),
            ));
        }

        if self.use_remote_api {
            if self.api_credential.is_none() {
                return Err(ConfigError::MissingCredential(TINIFY_API_KEY_ENV));
            }
            if self.resize.is_some() {
                return Err(ConfigError::IncompatibleOptions(
                    "resizing is only available for local compression",
                ));
            }
            if self.target_format != TargetFormat::KeepOriginal {
                return Err(ConfigError::IncompatibleOptions(
                    "format conversion is only available for local compression",
                ));
            }
            if self.preserve_exif {
                return Err(ConfigError::IncompatibleOptions(
                    "metadata preservation is only available for local compression",
                ));
            }
        }

        Ok(())
    }
}
