use crate::codec::CanonicalState;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

/// Higher score first; among equal scores the shallower state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority {
    pub score: u8,
    pub depth: Reverse<u32>,
}

impl Priority {
    pub fn new(score: u8, depth: u32) -> Self {
        Priority {
            score,
            depth: Reverse(depth),
        }
    }
}

/// One worker's frontier. A state is queued at most once, at the best
/// priority it was offered.
#[derive(Default)]
pub struct ScoredQueue {
    frontier: PriorityQueue<CanonicalState, Priority>,
}

impl ScoredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: CanonicalState, score: u8, depth: u32) {
        self.frontier.push_increase(state, Priority::new(score, depth));
    }

    /// The best state and the depth it was queued at.
    pub fn pop(&mut self) -> Option<(CanonicalState, u32)> {
        self.frontier.pop().map(|(s, p)| (s, p.depth.0))
    }

    pub fn len(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Removes up to `n` of the best entries, keeping their priorities.
    pub fn split_off(&mut self, n: usize) -> Vec<(CanonicalState, Priority)> {
        let mut batch = Vec::with_capacity(n.min(self.len()));
        while batch.len() < n {
            let Some(entry) = self.frontier.pop() else {
                break;
            };
            batch.push(entry);
        }
        batch
    }

    pub fn extend(&mut self, batch: Vec<(CanonicalState, Priority)>) {
        for (state, priority) in batch {
            self.frontier.push_increase(state, priority);
        }
    }

    pub fn states(&self) -> Vec<CanonicalState> {
        self.frontier.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.frontier.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::test::EIGHT_CARDS;
    use crate::layout::GameState;
    use crate::movegen;

    fn some_keys(n: usize) -> Vec<CanonicalState> {
        let state = GameState::parse(EIGHT_CARDS).unwrap();
        movegen::expand(&state)
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .take(n)
            .collect()
    }

    #[test]
    fn test_order() {
        let keys = some_keys(4);
        let mut q = ScoredQueue::new();
        q.push(keys[0].clone(), 10, 3);
        q.push(keys[1].clone(), 50, 9);
        q.push(keys[2].clone(), 10, 1);
        q.push(keys[3].clone(), 99, 2);
        assert_eq!(q.len(), 4);
        assert_eq!(q.pop(), Some((keys[3].clone(), 2)));
        assert_eq!(q.pop(), Some((keys[1].clone(), 9)));
        assert_eq!(q.pop(), Some((keys[2].clone(), 1)));
        assert_eq!(q.pop(), Some((keys[0].clone(), 3)));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_requeue_keeps_best() {
        let keys = some_keys(1);
        let mut q = ScoredQueue::new();
        q.push(keys[0].clone(), 10, 8);
        q.push(keys[0].clone(), 10, 4);
        q.push(keys[0].clone(), 10, 6);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some((keys[0].clone(), 4)));
    }

    #[test]
    fn test_split() {
        let keys = some_keys(6);
        let mut q = ScoredQueue::new();
        for (i, k) in keys.iter().enumerate() {
            q.push(k.clone(), i as u8, 1);
        }
        let batch = q.split_off(4);
        assert_eq!(batch.len(), 4);
        assert_eq!(q.len(), 2);
        assert_eq!(batch[0].0, keys[5]);

        let mut other = ScoredQueue::new();
        other.extend(batch);
        assert_eq!(other.len(), 4);
        assert_eq!(other.pop(), Some((keys[5].clone(), 1)));
        assert_eq!(other.states().len(), 3);

        assert_eq!(q.split_off(10).len(), 2);
        assert!(q.is_empty());
    }
}
