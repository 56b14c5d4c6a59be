//! Parallel solver for Streets and Alleys solitaire.
//!
//! Layouts are keyed by an encoding that ignores column order, explored
//! best-first by a pool of work-stealing workers sharing one visited-state
//! map, and solutions are replayed back into the columns as dealt. A Monte
//! Carlo tree search covers deals too large to exhaust.

pub mod card;
pub mod codec;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod layout;
pub mod mcts;
pub mod movegen;
pub mod path;
pub mod pool;
pub mod protocol;
pub mod queue;
pub mod store;

pub use card::{Card, Move, Suit, Target};
pub use codec::CanonicalState;
pub use config::{MctsConfig, SearchConfig};
pub use error::{ParseError, Result, SolverError};
pub use layout::GameState;
pub use path::Solution;
pub use pool::{Outcome, SearchEvent, Solver};
