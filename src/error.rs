use crate::card::{Card, Move, Suit};

/// Malformed input: a layout text, a canonical state, or a hex string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty state")]
    Empty,

    #[error("state truncated after {columns} complete columns")]
    Truncated { columns: usize },

    #[error("state holds more than {max} columns")]
    TooManyColumns { max: usize },

    #[error("column {column} holds more than {max} cards")]
    ColumnOverflow { column: usize, max: usize },

    #[error("invalid card code {0}")]
    InvalidCode(u8),

    #[error("invalid foundation rank {rank} for {suit:?}")]
    InvalidFoundation { suit: Suit, rank: u8 },

    #[error("trailing bits after the last column")]
    TrailingBits,

    #[error("invalid card {token:?} at line {line}, position {position}")]
    InvalidCard {
        token: String,
        line: usize,
        position: usize,
    },

    #[error("card {0} appears more than once")]
    DuplicateCard(Card),

    #[error("card {0} is missing")]
    MissingCard(Card),

    #[error("{suit:?} cards missing from the layout do not form a foundation from Ace")]
    NotAFoundation { suit: Suit },

    #[error("invalid hex string")]
    InvalidHex,
}

#[derive(thiserror::Error, Debug)]
pub enum SolverError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Bookkeeping went wrong inside the search; the run cannot be trusted.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("seed move {mv} is not legal after {played} moves")]
    IllegalSeedMove { mv: Move, played: usize },

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SolverError> = std::result::Result<T, E>;

pub(crate) fn invariant(message: impl Into<String>) -> SolverError {
    SolverError::InvariantViolation(message.into())
}
