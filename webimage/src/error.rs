//! Errors delivered to request completions.
//!
//! Every failure is scoped to the request that hit it and reported exactly
//! once through the completion callback. Cancellation is not an error and is
//! never reported.

use crate::executor::ExecutorError;
use crate::ports::FetchError;
use thiserror::Error;

/// Terminal failure of a single load request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The fetch port failed; the error is passed through unchanged.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched bytes could not be decoded into an image.
    #[error("invalid image data")]
    InvalidData,

    /// Decoding succeeded but the image has no pixels.
    #[error("downloaded image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// The editor declined to produce an image.
    #[error("editor '{editor}' produced no image")]
    EditFailed { editor: String },

    /// The request key was empty.
    #[error("request key is empty")]
    EmptyKey,

    /// The decode/edit worker failed before producing a result.
    #[error("decode worker failed: {0}")]
    Worker(#[from] ExecutorError),
}

/// Payload-free classification of a [`LoadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadErrorKind {
    Fetch,
    InvalidData,
    EmptyImage,
    EditFailed,
    EmptyKey,
    Worker,
}

impl LoadError {
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            Self::Fetch(_) => LoadErrorKind::Fetch,
            Self::InvalidData => LoadErrorKind::InvalidData,
            Self::EmptyImage { .. } => LoadErrorKind::EmptyImage,
            Self::EditFailed { .. } => LoadErrorKind::EditFailed,
            Self::EmptyKey => LoadErrorKind::EmptyKey,
            Self::Worker(_) => LoadErrorKind::Worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        assert_eq!(LoadError::InvalidData.to_string(), "invalid image data");
        assert_eq!(
            LoadError::EmptyImage {
                width: 0,
                height: 100
            }
            .to_string(),
            "downloaded image has no pixels (0x100)"
        );
        assert_eq!(
            LoadError::EditFailed {
                editor: "grayscale".to_string()
            }
            .to_string(),
            "editor 'grayscale' produced no image"
        );
    }

    #[test]
    fn test_fetch_error_is_transparent() {
        let fetch = FetchError::Status {
            key: "https://example.com/a.png".to_string(),
            status: 404,
        };
        let err = LoadError::from(fetch.clone());
        assert_eq!(err.to_string(), fetch.to_string());
        assert_eq!(err, LoadError::Fetch(fetch));
    }

    #[test]
    fn test_kind() {
        assert_eq!(LoadError::InvalidData.kind(), LoadErrorKind::InvalidData);
        assert_eq!(LoadError::EmptyKey.kind(), LoadErrorKind::EmptyKey);
        assert_eq!(
            LoadError::Fetch(FetchError::Abandoned).kind(),
            LoadErrorKind::Fetch
        );
        assert_eq!(
            LoadError::from(ExecutorError::Shutdown).kind(),
            LoadErrorKind::Worker
        );
    }
}
