//! Error types for translation calls.
use thiserror::Error;

/// Result type for translation calls.
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Why one translation attempt produced no usable text.
///
/// These never escape [`translate_batch`](crate::translate::translate_batch):
/// a unit that keeps failing resolves to its original text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The translator reported a failure
    #[error("translation failed: {0}")]
    Failed(String),

    /// The translator returned nothing
    #[error("translator returned an empty result")]
    Empty,

    /// The translator declined the request
    #[error("translator refused: {0}")]
    Refused(String),

    /// Separator or placeholder tokens were lost, duplicated or repeated
    /// the instructions
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The translator panicked
    #[error("translator panicked: {0}")]
    Panicked(String),

    /// The worker pool could not be created
    #[error("worker pool error: {0}")]
    Pool(String),
}

impl TranslateError {
    /// Whether another attempt may succeed.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Pool(_))
    }
}
