use thiserror::Error;

/// Errors surfaced by the search engine.
///
/// Every variant indicates a caller bug or malformed batch data. The engine
/// performs no I/O, so there is no transient failure mode and nothing here
/// is worth retrying.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("batch length mismatch for {what}: expected {expected}, got {got}")]
    BatchSizeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("legal action {action} is outside the policy range 0..{limit}")]
    LegalActionOutOfRange { action: u32, limit: usize },

    #[error("to_play must be -1 (play-with-bot), 1 or 2, got {0}")]
    InvalidToPlay(i32),

    #[error(
        "action space needs at least one head and one action per head, got {num_heads} x {actions_per_head}"
    )]
    InvalidActionSpace {
        num_heads: usize,
        actions_per_head: usize,
    },

    #[error("root Dirichlet alpha must be finite and positive, got {0}")]
    InvalidDirichletAlpha(f32),
}

/// Convenience Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
