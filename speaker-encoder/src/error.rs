use thiserror::Error;

/// Errors returned by speaker encoder operations.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("speaker-encoder: invalid framing config: {0}")]
    InvalidConfig(String),

    #[error("speaker-encoder: invalid input: {0}")]
    InvalidInput(String),

    #[error("speaker-encoder: model was not loaded, call load() before inference")]
    ModelNotLoaded,

    #[error("speaker-encoder: internal consistency error: {0}")]
    Inconsistent(String),

    #[error("speaker-encoder: mean of partial embeddings has zero norm")]
    DegenerateEmbedding,

    #[error("speaker-encoder: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("speaker-encoder: model error: {0}")]
    Model(String),

    #[error("speaker-encoder: parse config: {0}")]
    Config(#[from] serde_json::Error),
}
