//! Error taxonomy shared by the scoring pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias for results produced by this crate.
pub type Result<T, E = NomadError> = std::result::Result<T, E>;

/// Errors raised while provisioning weights, loading models or scoring audio.
#[derive(Debug, Error)]
pub enum NomadError {
    /// A required argument was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A checkpoint was missing, corrupt or did not match the model layout.
    #[error("Failed to load model from {path}: {detail}")]
    ModelLoad { path: PathBuf, detail: String },
    /// A checkpoint could not be fetched.
    #[error("Failed to download {url}: {detail}")]
    Download { url: String, detail: String },
    /// An embedding set had no members.
    #[error("Empty input: {0}")]
    EmptyInput(String),
    /// The projector produced a vector that cannot be normalized.
    #[error("Embedding norm is zero or not finite ({norm})")]
    ZeroNorm { norm: f32 },
    /// Audio could not be decoded.
    #[error("Audio decode failed for {path}: {detail}")]
    Audio { path: PathBuf, detail: String },
    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl NomadError {
    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidArgument(detail.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn download(url: &str, detail: impl Into<String>) -> Self {
        Self::Download {
            url: url.to_string(),
            detail: detail.into(),
        }
    }
}
