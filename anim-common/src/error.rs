//! Conversion error type
//!
//! Every fatal failure in the converter is an [`Error`]. Each variant carries a
//! numeric code (see [`ErrorCode`]) which the command-line driver reports as
//! its process exit status.
//!
//! Mapping failures while decoding (unknown skeleton, size mismatch, missing
//! annotations) are *not* errors: they degrade to an empty result.

/// Process-level error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    InvalidArgs = 1,
    InvalidInput = 2,
    ReadFail = 3,
    WriteFail = 4,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidArgs(String),

    #[error("animation has no frames")]
    NoFrames,

    #[error("invalid frame rate {0} (must be 30)")]
    InvalidFrameRate(i32),

    #[error("track '{track}' has {found} keys (expected 1 or {expected})")]
    MissingKeys {
        track: String,
        expected: usize,
        found: usize,
    },

    #[error("track '{0}' has no keys")]
    EmptyTrack(String),

    #[error("expected 1 or 2 clips, found {0}")]
    ClipCount(usize),

    #[error("track layout mismatch: {0}")]
    TrackLayout(String),

    #[error("invalid skeleton '{name}': {reason}")]
    InvalidSkeleton { name: String, reason: String },

    #[error("unsupported {format} version {version}")]
    UnsupportedVersion { format: &'static str, version: u32 },

    #[error("{0}")]
    InvalidInput(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Numeric category of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgs(_) => ErrorCode::InvalidArgs,
            Error::Read { .. } => ErrorCode::ReadFail,
            Error::Write { .. } => ErrorCode::WriteFail,
            _ => ErrorCode::InvalidInput,
        }
    }

    pub fn read(
        path: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Read {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn write(
        path: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
