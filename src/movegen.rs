use crate::card::Move;
use crate::codec::CanonicalState;
use crate::error::{invariant, Result};
use crate::layout::GameState;
use std::collections::HashSet;

/// A layout reachable in one move, keyed for the store.
#[derive(Clone, Debug)]
pub struct Successor {
    pub mv: Move,
    pub layout: GameState,
    pub key: CanonicalState,
}

/// All legal moves, sources in column order, each source trying the
/// foundation before the other columns.
///
/// Of several empty columns only the first is offered, and a lone card is
/// never moved to an empty column since that changes nothing.
pub fn legal_moves(state: &GameState) -> Vec<Move> {
    let mut v = Vec::new();
    let empty = state.first_empty_column();

    for (from, from_column) in state.columns().iter().enumerate() {
        let Some(card) = from_column.top() else {
            continue;
        };

        if state.accepts_on_foundation(card) {
            v.push(Move::to_foundation(from));
        }

        for (to, to_column) in state.columns().iter().enumerate() {
            if from == to {
                continue;
            }
            match to_column.top() {
                None if Some(to) == empty && from_column.len() > 1 => {
                    v.push(Move::to_column(from, to));
                }
                Some(top) if top.rank() == card.rank() + 1 => {
                    v.push(Move::to_column(from, to));
                }
                _ => {}
            }
        }
    }

    v
}

pub fn successors(state: &GameState) -> Result<Vec<(Move, GameState)>> {
    legal_moves(state)
        .into_iter()
        .map(|mv| Ok((mv, state.apply(mv)?)))
        .collect()
}

/// Successors with their keys. Two different moves never reach the same
/// layout, so a repeated key means the codec lost information.
pub fn expand(state: &GameState) -> Result<Vec<Successor>> {
    let parent = CanonicalState::encode(state);
    let mut seen = HashSet::new();
    let mut v = Vec::new();

    for (mv, layout) in successors(state)? {
        let key = CanonicalState::encode(&layout);
        if key == parent {
            return Err(invariant(format!("move {mv} leaves the layout unchanged")));
        }
        if !seen.insert(key.clone()) {
            return Err(invariant(format!(
                "move {mv} reaches an already generated state {key}"
            )));
        }
        v.push(Successor { mv, layout, key });
    }

    Ok(v)
}

/// Decodes a key and expands it; moves refer to the decoded column order.
pub fn expand_key(key: &CanonicalState) -> Result<(GameState, Vec<Successor>)> {
    let state = key
        .decode()
        .map_err(|e| invariant(format!("stored state {key} does not decode: {e}")))?;
    let children = expand(&state)?;
    Ok((state, children))
}
