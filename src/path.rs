use crate::card::{Move, Target};
use crate::codec::CanonicalState;
use crate::error::{invariant, Result};
use crate::layout::GameState;
use crate::store::StateStore;
use serde::Serialize;
use std::collections::HashSet;

/// Walks parent links back to the initial state and returns the moves from
/// there to `last`, each in its parent's canonical column order.
pub fn reconstruct(store: &StateStore, last: &CanonicalState) -> Result<Vec<Move>> {
    let mut path = vec![];
    let mut visited = HashSet::new();
    let mut current = last.clone();

    loop {
        if !visited.insert(current.clone()) {
            return Err(invariant(format!(
                "parent links loop back to {current} after {} moves",
                path.len()
            )));
        }
        let Some(record) = store.get(&current) else {
            return Err(invariant(format!("state {current} has no record")));
        };
        match (record.parent, record.mv) {
            (None, _) => break,
            (Some(parent), Some(mv)) => {
                path.push(mv);
                current = parent;
            }
            (Some(_), None) => {
                return Err(invariant(format!("state {current} has a parent but no move")));
            }
        }
    }

    path.reverse();
    Ok(path)
}

/// Replays canonical moves from `initial`, translating each one into the
/// column numbering of the layout as given. Every move is checked.
pub fn translate(initial: &GameState, canonical: &[Move]) -> Result<(Vec<Move>, GameState)> {
    let mut state = initial.clone();
    let mut moves = Vec::with_capacity(canonical.len());

    for mv in canonical {
        let order = state.canonical_order();
        let column = |i: usize| {
            order
                .get(i)
                .copied()
                .ok_or_else(|| invariant(format!("move {mv} names a column out of range")))
        };
        let actual = Move {
            from: column(mv.from)?,
            to: match mv.to {
                Target::Column(to) => Target::Column(column(to)?),
                Target::Foundation => Target::Foundation,
            },
        };
        state = state.apply(actual)?;
        moves.push(actual);
    }

    Ok((moves, state))
}

/// A winning line. Not necessarily the shortest one: the first worker to
/// reach the solved state wins.
#[derive(Clone, Debug, Serialize)]
pub struct Solution {
    /// In the column numbering of the layout the search started from.
    pub moves: Vec<Move>,
    /// As recorded in the store, against each canonical parent.
    pub canonical_moves: Vec<Move>,
    pub visited: usize,
}

impl Solution {
    pub fn new(initial: &GameState, canonical_moves: Vec<Move>, visited: usize) -> Result<Self> {
        let (moves, end) = translate(initial, &canonical_moves)?;
        if !end.is_solved() {
            return Err(invariant(format!(
                "replaying {} moves does not solve the layout:\n{end}",
                moves.len()
            )));
        }
        Ok(Solution {
            moves,
            canonical_moves,
            visited,
        })
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::SolverError;
    use crate::layout::test::EIGHT_CARDS;
    use crate::movegen;
    use crate::store::StateRecord;

    /// Drives the store along a greedy line, foundation moves first, the
    /// same way a worker records children.
    fn greedy_line(store: &StateStore, start: &GameState) -> CanonicalState {
        let mut key = CanonicalState::encode(start);
        store.insert_root(key.clone());
        let mut depth = 0;
        loop {
            let (state, children) = movegen::expand_key(&key).unwrap();
            if state.is_solved() {
                return key;
            }
            let child = children
                .iter()
                .find(|s| s.mv.is_foundation())
                .unwrap_or(&children[0]);
            depth += 1;
            assert!(store.record_if_better(&child.key, &key, child.mv, depth));
            key = child.key.clone();
        }
    }

    #[test]
    fn test_reconstruct_and_translate() {
        let start = GameState::parse(EIGHT_CARDS).unwrap();
        let store = StateStore::new();
        let last = greedy_line(&store, &start);

        let canonical = reconstruct(&store, &last).unwrap();
        assert_eq!(canonical.len(), 8);
        assert!(canonical.iter().all(Move::is_foundation));

        let solution = Solution::new(&start, canonical, store.len()).unwrap();
        assert_eq!(solution.len(), 8);
        // QC sits on top of the fourth column as dealt.
        assert_eq!(solution.moves[0], Move::to_foundation(3));

        let mut state = start;
        for mv in solution.moves.iter() {
            state = state.apply(*mv).unwrap();
        }
        assert!(state.is_solved());
    }

    #[test]
    fn test_root_alone() {
        let start = GameState::parse(EIGHT_CARDS).unwrap();
        let store = StateStore::new();
        let root = CanonicalState::encode(&start);
        store.insert_root(root.clone());
        assert_eq!(reconstruct(&store, &root).unwrap(), vec![]);
        assert!(Solution::new(&start, vec![], 1).is_err());
    }

    #[test]
    fn test_cycle_is_fatal() {
        let start = GameState::parse(EIGHT_CARDS).unwrap();
        let children = movegen::expand(&start).unwrap();
        let (a, b) = (children[0].key.clone(), children[1].key.clone());
        let store = StateStore::new();
        store.overwrite(
            a.clone(),
            StateRecord {
                parent: Some(b.clone()),
                mv: Some(Move::to_foundation(0)),
                depth: 2,
            },
        );
        store.overwrite(
            b,
            StateRecord {
                parent: Some(a.clone()),
                mv: Some(Move::to_foundation(1)),
                depth: 1,
            },
        );
        assert!(matches!(
            reconstruct(&store, &a),
            Err(SolverError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_missing_parent_is_fatal() {
        let start = GameState::parse(EIGHT_CARDS).unwrap();
        let children = movegen::expand(&start).unwrap();
        let store = StateStore::new();
        store.record_if_better(
            &children[0].key,
            &CanonicalState::encode(&start),
            children[0].mv,
            1,
        );
        assert!(matches!(
            reconstruct(&store, &children[0].key),
            Err(SolverError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_translate_rejects_bad_moves() {
        let start = GameState::parse(EIGHT_CARDS).unwrap();
        assert!(translate(&start, &[Move::to_column(0, 12)]).is_err());
        assert!(translate(&start, &[Move::to_foundation(7)]).is_err());
    }
}
