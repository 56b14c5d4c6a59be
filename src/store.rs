use crate::card::Move;
use crate::codec::CanonicalState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

/// How a state was first (or most cheaply) reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateRecord {
    /// `None` only for the initial state.
    pub parent: Option<CanonicalState>,
    /// Move from `parent`, in the parent's canonical column order.
    pub mv: Option<Move>,
    pub depth: u32,
}

/// Visited states of one search run, shared by all its workers.
///
/// Records are only ever replaced by a strictly shallower path, so following
/// parents always strictly decreases depth.
#[derive(Default)]
pub struct StateStore {
    records: DashMap<CanonicalState, StateRecord>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        StateStore {
            records: DashMap::with_capacity(capacity),
        }
    }

    /// Installs the initial state. Returns false if it was already known.
    pub fn insert_root(&self, root: CanonicalState) -> bool {
        match self.records.entry(root) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(StateRecord {
                    parent: None,
                    mv: None,
                    depth: 0,
                });
                true
            }
        }
    }

    /// Records `state` as reached from `parent` by `mv` at `depth`.
    ///
    /// Returns true when the state was unseen or this path is strictly
    /// shorter than the recorded one, i.e. when the caller should expand it.
    /// Racing callers are serialized on the shard lock after an optimistic
    /// read, and the depth is compared again there, so exactly one of several
    /// equal offers wins.
    pub fn record_if_better(
        &self,
        state: &CanonicalState,
        parent: &CanonicalState,
        mv: Move,
        depth: u32,
    ) -> bool {
        // The read guard must be gone before `entry` takes the write lock.
        let known = self.records.get(state).map(|r| r.depth);
        if known.is_some_and(|d| d <= depth) {
            return false;
        }

        let record = StateRecord {
            parent: Some(parent.clone()),
            mv: Some(mv),
            depth,
        };
        match self.records.entry(state.clone()) {
            Entry::Occupied(mut e) => {
                if e.get().depth <= depth {
                    return false;
                }
                e.insert(record);
                true
            }
            Entry::Vacant(v) => {
                v.insert(record);
                true
            }
        }
    }

    pub fn get(&self, state: &CanonicalState) -> Option<StateRecord> {
        self.records.get(state).map(|r| r.value().clone())
    }

    pub fn depth(&self, state: &CanonicalState) -> Option<u32> {
        self.records.get(state).map(|r| r.depth)
    }

    pub fn contains(&self, state: &CanonicalState) -> bool {
        self.records.contains_key(state)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A copy of every record, for diagnostics after a run.
    pub fn entries(&self) -> Vec<(CanonicalState, StateRecord)> {
        self.records
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Drops everything deeper than `max_depth`. Only for use once the run
    /// is over: it can orphan records of states still being expanded.
    pub fn retain_depth(&self, max_depth: u32) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.depth <= max_depth);
        let removed = before - self.records.len();
        debug!("pruned {removed} of {before} visited states deeper than {max_depth}");
        removed
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    #[cfg(test)]
    pub(crate) fn overwrite(&self, state: CanonicalState, record: StateRecord) {
        self.records.insert(state, record);
    }
}
