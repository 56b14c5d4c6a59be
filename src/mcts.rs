//! Monte Carlo tree search over layouts, for deals too large to exhaust.
//!
//! Rewards are the share of the deck on the foundations when a playout
//! stops. Only a full solve earns 1.0.

use crate::card::{Move, DECK_SIZE};
use crate::codec::CanonicalState;
use crate::config::MctsConfig;
use crate::error::Result;
use crate::layout::GameState;
use crate::movegen;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Partial progress never scores as high as a solve.
const PARTIAL_CAP: f64 = 0.999;

#[derive(Default)]
struct Node {
    visits: u32,
    reward: f64,
    expanded: bool,
    children: BTreeMap<Move, Node>,
}

impl Node {
    fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.reward / self.visits as f64
        }
    }

    fn ucb1(&self, parent_visits: u32, exploration: f64) -> f64 {
        if self.visits == 0 {
            f64::INFINITY
        } else {
            self.mean() + exploration * ((parent_visits as f64).ln() / self.visits as f64).sqrt()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeStats {
    pub mv: Move,
    pub visits: u32,
    pub mean: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayReport {
    pub moves: Vec<Move>,
    pub solved: bool,
    pub foundation_cards: usize,
}

fn progress(state: &GameState) -> f64 {
    state.foundation_cards() as f64 / DECK_SIZE as f64
}

/// One iteration's view of the tree: the configuration and the random source.
struct Playout<'a> {
    config: &'a MctsConfig,
    rng: &'a mut StdRng,
}

impl Playout<'_> {
    /// Selection, expansion and simulation below `node`, then
    /// backpropagation on the way out. `seen` holds every state on the
    /// current path, including `state`.
    fn visit(
        &mut self,
        node: &mut Node,
        state: &GameState,
        seen: &mut HashSet<CanonicalState>,
    ) -> Result<f64> {
        let reward = if state.is_solved() {
            1.0
        } else if node.visits == 0 {
            self.rollout(state, seen)?
        } else {
            if !node.expanded {
                for mv in movegen::legal_moves(state) {
                    node.children.insert(mv, Node::default());
                }
                node.expanded = true;
            }
            match self.select(node, state, seen)? {
                Some((mv, next, key)) => {
                    seen.insert(key);
                    match node.children.get_mut(&mv) {
                        Some(child) => self.visit(child, &next, seen)?,
                        None => progress(state),
                    }
                }
                // Every way out leads back onto the path.
                None => progress(state),
            }
        };

        node.visits += 1;
        node.reward += reward;
        Ok(reward)
    }

    fn select(
        &self,
        node: &Node,
        state: &GameState,
        seen: &HashSet<CanonicalState>,
    ) -> Result<Option<(Move, GameState, CanonicalState)>> {
        let mut best: Option<(f64, Move, GameState, CanonicalState)> = None;
        for (mv, child) in node.children.iter() {
            let next = state.apply(*mv)?;
            let key = CanonicalState::encode(&next);
            if seen.contains(&key) {
                continue;
            }
            if child.visits == 0 {
                return Ok(Some((*mv, next, key)));
            }
            let score = child.ucb1(node.visits, self.config.exploration);
            if best.as_ref().map_or(true, |(s, ..)| score > *s) {
                best = Some((score, *mv, next, key));
            }
        }
        Ok(best.map(|(_, mv, next, key)| (mv, next, key)))
    }

    /// Random playout that never revisits a state on the path or earlier
    /// in the playout.
    fn rollout(&mut self, state: &GameState, seen: &HashSet<CanonicalState>) -> Result<f64> {
        let mut state = state.clone();
        let mut visited = HashSet::new();

        for _ in 0..self.config.rollout_limit {
            if state.is_solved() {
                return Ok(1.0);
            }
            let mut options = vec![];
            for (_, next) in movegen::successors(&state)? {
                let key = CanonicalState::encode(&next);
                if !seen.contains(&key) && !visited.contains(&key) {
                    options.push((key, next));
                }
            }
            if options.is_empty() {
                return Ok(progress(&state));
            }
            let (key, next) = options.swap_remove(self.rng.gen_range(0..options.len()));
            visited.insert(key);
            state = next;
        }

        if state.is_solved() {
            return Ok(1.0);
        }
        Ok((progress(&state) + self.config.survival_bonus).min(PARTIAL_CAP))
    }
}

/// A search tree rooted at the current position of one game.
pub struct Mcts {
    state: GameState,
    root: Node,
    /// Positions already played, which the search never returns to.
    history: HashSet<CanonicalState>,
    config: MctsConfig,
    rng: StdRng,
}

impl Mcts {
    pub fn new(state: GameState, config: MctsConfig) -> Result<Self> {
        state.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut history = HashSet::new();
        history.insert(CanonicalState::encode(&state));
        Ok(Mcts {
            state,
            root: Node::default(),
            history,
            config,
            rng,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn search(&mut self, iterations: usize) -> Result<()> {
        let mut playout = Playout {
            config: &self.config,
            rng: &mut self.rng,
        };
        for _ in 0..iterations {
            let mut seen = self.history.clone();
            playout.visit(&mut self.root, &self.state, &mut seen)?;
        }
        Ok(())
    }

    /// Searches for `iterations` more rounds and returns the most visited
    /// move. A foundation move whose every playout solved the game is taken
    /// straight away. `None` when no move was ever explored.
    pub fn best_move(&mut self, iterations: usize) -> Result<Option<Move>> {
        self.search(iterations)?;

        let certain = self
            .root
            .children
            .iter()
            .find(|(mv, child)| mv.is_foundation() && child.visits > 0 && child.mean() == 1.0);
        if let Some((mv, _)) = certain {
            return Ok(Some(*mv));
        }

        let mut best: Option<(&Move, &Node)> = None;
        for (mv, child) in self.root.children.iter() {
            if child.visits > 0 && best.map_or(true, |(_, b)| child.visits > b.visits) {
                best = Some((mv, child));
            }
        }
        Ok(best.map(|(mv, _)| *mv))
    }

    /// Plays `mv` and keeps the subtree below it.
    pub fn advance(&mut self, mv: Move) -> Result<()> {
        let next = self.state.apply(mv)?;
        self.history.insert(CanonicalState::encode(&next));
        self.root = self.root.children.remove(&mv).unwrap_or_default();
        self.state = next;
        Ok(())
    }

    /// Mean reward at the root: a rough measure of how promising the
    /// position is.
    pub fn estimate(&self) -> f64 {
        self.root.mean()
    }

    pub fn root_visits(&self) -> u32 {
        self.root.visits
    }

    pub fn root_stats(&self) -> Vec<NodeStats> {
        self.root
            .children
            .iter()
            .map(|(mv, child)| NodeStats {
                mv: *mv,
                visits: child.visits,
                mean: child.mean(),
            })
            .collect()
    }
}

/// Plays a whole game, searching `iterations` rounds before every move.
pub fn play(
    state: &GameState,
    config: MctsConfig,
    iterations: usize,
    max_moves: usize,
) -> Result<PlayReport> {
    let mut mcts = Mcts::new(state.clone(), config)?;
    let mut moves = vec![];

    while moves.len() < max_moves && !mcts.state().is_solved() {
        let Some(mv) = mcts.best_move(iterations)? else {
            debug!("no move left to explore after {} moves", moves.len());
            break;
        };
        debug!("playing {mv}, estimate {:.3}", mcts.estimate());
        mcts.advance(mv)?;
        moves.push(mv);
    }

    let report = PlayReport {
        moves,
        solved: mcts.state().is_solved(),
        foundation_cards: mcts.state().foundation_cards(),
    };
    info!(
        "tree search played {} moves, {} cards on the foundations",
        report.moves.len(),
        report.foundation_cards
    );
    Ok(report)
}
