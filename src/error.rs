use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Problems found while building the run configuration.
///
/// These abort the batch before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Input root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Input root is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    #[error("Remote compression requested but {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid quality value: {0}. Must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Invalid resize ceiling: {0}. Expected WIDTHxHEIGHT with both sides above zero")]
    InvalidResize(String),

    #[error("Unknown target format: {0}. Expected one of: keep, webp")]
    UnknownTargetFormat(String),

    #[error("Incompatible options: {0}")]
    IncompatibleOptions(&'static str),

    #[error("Failed to create output directory: {0}")]
    DirectoryCreationFailed(PathBuf),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("Failed to start remote client: {0}")]
    RemoteClient(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Classification of a per-file failure, as it appears in the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileErrorKind {
    UnsupportedFormat,
    CorruptSource,
    ReadFailure,
    EncodeFailure,
    WriteFailure,
    RemoteAuthFailure,
    RemoteQuotaExceeded,
    RemoteNetworkFailure,
    TargetCollision,
}

impl FileErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileErrorKind::UnsupportedFormat => "unsupported format",
            FileErrorKind::CorruptSource => "corrupt source",
            FileErrorKind::ReadFailure => "read failure",
            FileErrorKind::EncodeFailure => "encode failure",
            FileErrorKind::WriteFailure => "write failure",
            FileErrorKind::RemoteAuthFailure => "remote auth failure",
            FileErrorKind::RemoteQuotaExceeded => "remote quota exceeded",
            FileErrorKind::RemoteNetworkFailure => "remote network failure",
            FileErrorKind::TargetCollision => "target collision",
        }
    }
}

impl fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure confined to a single file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FileError {
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies a decoder error. Decoding runs over bytes already in memory,
    /// so I/O errors here mean truncated data.
    pub fn decode(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => {
                Self::new(FileErrorKind::UnsupportedFormat, e.to_string())
            }
            other => Self::new(FileErrorKind::CorruptSource, other.to_string()),
        }
    }

    /// Classifies an encoder error.
    pub fn encode(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => {
                Self::new(FileErrorKind::UnsupportedFormat, e.to_string())
            }
            other => Self::new(FileErrorKind::EncodeFailure, other.to_string()),
        }
    }
}

pub type FileResult<T> = std::result::Result<T, FileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use image::error::{DecodingError, ImageFormatHint};

    #[test]
    fn test_decode_error_classification() {
        let err = image::ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Unknown,
            "bad huffman table",
        ));
        assert_eq!(FileError::decode(err).kind, FileErrorKind::CorruptSource);

        let err = image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "eof",
        ));
        assert_eq!(FileError::decode(err).kind, FileErrorKind::CorruptSource);
    }

    #[test]
    fn test_file_error_display() {
        let err = FileError::new(FileErrorKind::RemoteQuotaExceeded, "monthly limit reached");
        assert_eq!(err.to_string(), "remote quota exceeded: monthly limit reached");
    }
}
