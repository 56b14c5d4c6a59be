//! JSON-lines protocol between an external driver and one solver process.
//!
//! The driver sends a single [`SetupMessage`]; the process answers with one
//! [`WorkerMessage`] per line until the search ends.

use crate::card::Move;
use crate::codec::CanonicalState;
use crate::config::SearchConfig;
use crate::error::{invariant, Result, SolverError};
use crate::layout::GameState;
use crate::pool::{Outcome, Progress, SearchEvent, Solver, WorkerSnapshot};
use log::info;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

/// Where the search starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Seed {
    State { state: CanonicalState },
    Layout { layout: String },
    /// The layout after playing `moves`, given in its own column numbering.
    Moves { layout: String, moves: Vec<Move> },
}

impl Seed {
    pub fn initial(&self) -> Result<GameState> {
        match self {
            Seed::State { state } => Ok(state.decode()?),
            Seed::Layout { layout } => Ok(GameState::parse(layout)?),
            Seed::Moves { layout, moves } => {
                let mut state = GameState::parse(layout)?;
                for (played, mv) in moves.iter().enumerate() {
                    if !state.can_play(*mv) {
                        return Err(SolverError::IllegalSeedMove { mv: *mv, played });
                    }
                    state = state.apply(*mv)?;
                }
                Ok(state)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupMessage {
    pub seed: Seed,
    pub worker_id: usize,
    /// Capacity of the local worker pool.
    pub total_workers: usize,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl SetupMessage {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// `base` with the worker count and deadline this message asks for.
    pub fn search_config(&self, base: SearchConfig) -> SearchConfig {
        let deadline = self.deadline_ms.map(Duration::from_millis).or(base.deadline);
        SearchConfig {
            deadline,
            ..base.with_workers(self.total_workers)
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Log {
        worker_id: usize,
        message: String,
    },
    Progress {
        worker_id: usize,
        #[serde(flatten)]
        progress: Progress,
    },
    Solution {
        worker_id: usize,
        moves: Vec<Move>,
        visited: usize,
    },
    Snapshot {
        worker_id: usize,
        #[serde(flatten)]
        snapshot: WorkerSnapshot,
    },
    Exhausted {
        worker_id: usize,
        visited: usize,
    },
}

impl WorkerMessage {
    pub fn from_event(worker_id: usize, event: SearchEvent) -> Self {
        match event {
            SearchEvent::Log { worker, message } => WorkerMessage::Log {
                worker_id,
                message: format!("worker {worker}: {message}"),
            },
            SearchEvent::Progress(progress) => WorkerMessage::Progress {
                worker_id,
                progress,
            },
            SearchEvent::Solution(solution) => WorkerMessage::Solution {
                worker_id,
                moves: solution.moves,
                visited: solution.visited,
            },
            SearchEvent::Snapshot(snapshot) => WorkerMessage::Snapshot {
                worker_id,
                snapshot,
            },
        }
    }

    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Runs the search a setup message describes, streaming messages to `out`
/// as they happen.
pub fn run_setup<W: Write>(
    setup: &SetupMessage,
    base: SearchConfig,
    out: &mut W,
) -> Result<Outcome> {
    let initial = setup.seed.initial()?;
    let config = setup.search_config(base);
    let worker_id = setup.worker_id;
    info!(
        "worker {worker_id}: starting search with {} threads",
        config.max_workers
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let solver = Solver::new(config).with_events(tx);
    let outcome = std::thread::scope(|s| -> Result<Outcome> {
        // The solver, and with it the sender, is dropped when the search ends.
        let search = s.spawn(move || solver.solve(&initial));
        for event in rx.iter() {
            let line = WorkerMessage::from_event(worker_id, event).to_json_line()?;
            writeln!(out, "{line}")?;
        }
        search
            .join()
            .map_err(|_| invariant("search thread panicked"))?
    })?;

    if let Outcome::Exhausted { visited, .. } = outcome {
        let line = WorkerMessage::Exhausted { worker_id, visited }.to_json_line()?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(outcome)
}
