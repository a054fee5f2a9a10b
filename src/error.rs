use thiserror::Error;

/// Every failure the training loop can surface.
///
/// Nothing is retried; an error from any batch aborts the phase, the epoch
/// and the run.
#[derive(Error, Debug)]
pub enum SegError {
    #[error("optimizer {0} is not supported")]
    UnsupportedOptimizer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("expected exactly {expected} class channels, got {found}")]
    ClassCount { expected: usize, found: usize },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },

    #[error("batch source yielded no batches")]
    EmptySource,

    #[error("backward called without a recorded forward pass (model in eval mode?)")]
    NoGradientTape,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, SegError>;
