use thiserror::Error;

/// Errors surfaced by the traversal engine.
///
/// Any variant here aborts the in-flight `gather` call; the engine never
/// retries internally and always returns the terminal cursor on error so
/// a caller restarts clean rather than resuming a half-advanced one.
#[derive(Debug, Error)]
pub enum GatherError {
    #[error("invalid request arguments: {0}")]
    InvalidArgs(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("upload {0} referenced by cursor is no longer in the request cache")]
    ConcurrentModification(i32),

    #[error("failed to parse symbol name {symbol:?}: {reason}")]
    SymbolParseError { symbol: String, reason: String },

    #[error("collaborator store unavailable")]
    StoreUnavailable(#[from] anyhow::Error),

    #[error("request cancelled")]
    Cancelled,
}

pub type GatherResult<T> = Result<T, GatherError>;
