//! Parallel best-first search over canonical states.
//!
//! Every worker slot owns a scored queue. Slot 0 starts with the initial
//! state; the others are idle until a busy worker hands them a batch of its
//! queue. An idle worker steals from siblings and stops once none of them
//! has more than one queued state. The first worker to pop the solved state
//! wins, so the reported line is not necessarily the shortest.

use crate::codec::CanonicalState;
use crate::config::SearchConfig;
use crate::error::{Result, SolverError};
use crate::heuristic::{ScorePolicy, WeightedScore};
use crate::layout::GameState;
use crate::movegen;
use crate::path::{self, Solution};
use crate::queue::ScoredQueue;
use crate::store::StateStore;
use crossbeam_channel::Sender;
use log::{debug, error, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Debug, Serialize)]
pub struct Progress {
    pub worker: usize,
    pub iterations: u64,
    pub queue: usize,
    pub visited: usize,
    pub current: CanonicalState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub state: CanonicalState,
    pub depth: u32,
}

/// What a worker leaves behind when it stops without a solution: the
/// deadline passed or there was no work left to take.
#[derive(Clone, Debug, Serialize)]
pub struct WorkerSnapshot {
    pub worker: usize,
    pub iterations: u64,
    /// Size of the shared store.
    pub visited: usize,
    /// States this worker recorded in the store.
    pub discovered: usize,
    /// The recorded states themselves, when `capture_entries` is set.
    pub entries: Vec<SnapshotEntry>,
    pub queue: usize,
    /// Queued states, when `capture_entries` is set.
    pub frontier: Vec<CanonicalState>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Log { worker: usize, message: String },
    Progress(Progress),
    Solution(Solution),
    Snapshot(WorkerSnapshot),
}

#[derive(Debug)]
pub enum Outcome {
    Solved(Solution),
    /// Every reachable state was expanded without reaching the solved one.
    Exhausted {
        visited: usize,
        snapshots: Vec<WorkerSnapshot>,
    },
    TimedOut {
        visited: usize,
        snapshots: Vec<WorkerSnapshot>,
    },
}

pub struct Solver {
    config: SearchConfig,
    policy: Arc<dyn ScorePolicy>,
    events: Option<Sender<SearchEvent>>,
}

impl Solver {
    pub fn new(config: SearchConfig) -> Self {
        Solver {
            config,
            policy: Arc::new(WeightedScore::default()),
            events: None,
        }
    }

    pub fn with_policy<P: ScorePolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_events(mut self, events: Sender<SearchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn solve_key(&self, key: &CanonicalState) -> Result<Outcome> {
        self.solve(&key.decode()?)
    }

    /// Runs one search to completion. The visited states live only for the
    /// duration of the call.
    pub fn solve(&self, initial: &GameState) -> Result<Outcome> {
        initial.validate()?;
        let started = Instant::now();
        let search = Search::new(self, initial, started);
        let workers = search.slots.len();

        let root = CanonicalState::encode(initial);
        search.store.insert_root(root.clone());
        search.slots[0]
            .queue
            .lock()
            .push(root, self.policy.score(initial), 0);
        search.slots[0].active.store(true, Ordering::Release);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("solver-worker-{i}"))
            .build()?;
        info!("searching with up to {workers} workers");
        pool.scope(|scope| search.run_worker(scope, 0));

        let Search {
            store,
            solution,
            failure,
            snapshots,
            timed_out,
            ..
        } = search;
        let visited = store.len();
        info!(
            "search finished in {:.2?}, releasing {visited} visited states",
            started.elapsed()
        );

        if let Some(err) = failure.into_inner() {
            return Err(err);
        }
        if let Some(solution) = solution.into_inner() {
            return Ok(Outcome::Solved(solution));
        }
        let snapshots = snapshots.into_inner();
        if timed_out.into_inner() {
            return Ok(Outcome::TimedOut { visited, snapshots });
        }
        Ok(Outcome::Exhausted { visited, snapshots })
    }
}

#[derive(Default)]
struct Slot {
    queue: Mutex<ScoredQueue>,
    active: AtomicBool,
}

#[derive(Default)]
struct WorkerStats {
    iterations: u64,
    discovered: usize,
    entries: Vec<SnapshotEntry>,
}

struct Search<'a> {
    config: &'a SearchConfig,
    policy: &'a dyn ScorePolicy,
    events: Option<&'a Sender<SearchEvent>>,
    initial: &'a GameState,
    store: StateStore,
    slots: Vec<Slot>,
    done: AtomicBool,
    timed_out: AtomicBool,
    deadline: Option<Instant>,
    solution: Mutex<Option<Solution>>,
    failure: Mutex<Option<SolverError>>,
    snapshots: Mutex<Vec<WorkerSnapshot>>,
}

impl<'a> Search<'a> {
    fn new(solver: &'a Solver, initial: &'a GameState, started: Instant) -> Self {
        let config = &solver.config;
        Search {
            config,
            policy: solver.policy.as_ref(),
            events: solver.events.as_ref(),
            initial,
            store: StateStore::new(),
            slots: (0..config.max_workers.max(1))
                .map(|_| Slot::default())
                .collect(),
            done: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
            deadline: config.deadline.map(|d| started + d),
            solution: Mutex::new(None),
            failure: Mutex::new(None),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    fn run_worker<'s>(&'s self, scope: &rayon::Scope<'s>, id: usize) {
        debug!(
            "worker {id}: starting with {} queued states",
            self.slots[id].queue.lock().len()
        );
        let mut stats = WorkerStats::default();
        let mut last_report = Instant::now();
        let mut last_split = Instant::now();

        loop {
            if self.done.load(Ordering::Acquire) {
                debug!("worker {id}: stopping, search is over");
                break;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.timed_out.store(true, Ordering::Release);
                self.snapshot(id, &stats, "deadline passed");
                break;
            }

            let next = self.slots[id].queue.lock().pop();
            let Some((state, depth)) = next.or_else(|| self.steal(id)) else {
                self.snapshot(id, &stats, "no work left");
                break;
            };

            stats.iterations += 1;
            if let Err(err) = self.step(id, &state, depth, &mut stats) {
                self.fail(id, err);
                break;
            }

            if last_report.elapsed() >= self.config.report_interval {
                self.report(id, &stats, &state);
                last_report = Instant::now();
            }
            if last_split.elapsed() >= self.config.split_interval {
                self.try_split(scope, id);
                last_split = Instant::now();
            }
        }

        self.slots[id].active.store(false, Ordering::Release);
    }

    fn step(
        &self,
        id: usize,
        state: &CanonicalState,
        depth: u32,
        stats: &mut WorkerStats,
    ) -> Result<()> {
        let (layout, children) = movegen::expand_key(state)?;
        if layout.is_solved() {
            return self.publish(id, state);
        }

        // The store may know a shorter path than the one this entry was queued with.
        let depth = self.store.depth(state).map_or(depth, |d| d.min(depth));
        let mut accepted = Vec::new();
        for child in children {
            if self
                .store
                .record_if_better(&child.key, state, child.mv, depth + 1)
            {
                stats.discovered += 1;
                if self.config.capture_entries {
                    stats.entries.push(SnapshotEntry {
                        state: child.key.clone(),
                        depth: depth + 1,
                    });
                }
                accepted.push((self.policy.score(&child.layout), child.key));
            }
        }

        let mut queue = self.slots[id].queue.lock();
        for (score, key) in accepted {
            queue.push(key, score, depth + 1);
        }
        Ok(())
    }

    fn publish(&self, id: usize, state: &CanonicalState) -> Result<()> {
        if self.done.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let canonical = path::reconstruct(&self.store, state)?;
        let solution = Solution::new(self.initial, canonical, self.store.len())?;
        info!(
            "worker {id}: solved in {} moves after visiting {} states",
            solution.len(),
            solution.visited
        );
        self.emit(SearchEvent::Solution(solution.clone()));
        *self.solution.lock() = Some(solution);
        Ok(())
    }

    fn fail(&self, id: usize, err: SolverError) {
        error!("worker {id}: aborting search: {err}");
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(err);
        }
        self.done.store(true, Ordering::Release);
    }

    /// Takes the best state of the first sibling holding more than one.
    fn steal(&self, id: usize) -> Option<(CanonicalState, u32)> {
        for (j, slot) in self.slots.iter().enumerate() {
            if j == id {
                continue;
            }
            let mut queue = slot.queue.lock();
            if queue.len() > 1 {
                let item = queue.pop();
                drop(queue);
                debug!("worker {id}: stole a state from worker {j}");
                return item;
            }
        }
        None
    }

    /// Hands part of an oversized queue to an idle slot and starts a worker
    /// on it. Slots are claimed through their `active` flag, so no more than
    /// `max_workers` workers ever run.
    fn try_split<'s>(&'s self, scope: &rayon::Scope<'s>, id: usize) {
        let queued = self.slots[id].queue.lock().len();
        if queued <= self.config.split_threshold {
            return;
        }
        let Some(j) = self.slots.iter().position(|slot| {
            slot.active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        }) else {
            return;
        };

        let batch = self.slots[id].queue.lock().split_off(self.config.split_batch);
        let message = format!(
            "queue of {queued} states, handing {} to worker {j}",
            batch.len()
        );
        self.slots[j].queue.lock().extend(batch);
        info!("worker {id}: {message}");
        self.emit(SearchEvent::Log { worker: id, message });
        scope.spawn(move |scope| self.run_worker(scope, j));
    }

    fn report(&self, id: usize, stats: &WorkerStats, current: &CanonicalState) {
        let progress = Progress {
            worker: id,
            iterations: stats.iterations,
            queue: self.slots[id].queue.lock().len(),
            visited: self.store.len(),
            current: current.clone(),
        };
        info!(
            "worker {id}: {} iterations, {} queued, {} visited",
            progress.iterations, progress.queue, progress.visited
        );
        self.emit(SearchEvent::Progress(progress));
    }

    fn snapshot(&self, id: usize, stats: &WorkerStats, reason: &str) {
        let (queue, frontier) = {
            let mut queue = self.slots[id].queue.lock();
            let frontier = if self.config.capture_entries {
                queue.states()
            } else {
                vec![]
            };
            let len = queue.len();
            queue.clear();
            (len, frontier)
        };
        let snapshot = WorkerSnapshot {
            worker: id,
            iterations: stats.iterations,
            visited: self.store.len(),
            discovered: stats.discovered,
            entries: stats.entries.clone(),
            queue,
            frontier,
        };
        info!(
            "worker {id}: {reason} after {} iterations with {queue} states queued",
            stats.iterations
        );
        self.emit(SearchEvent::Snapshot(snapshot.clone()));
        self.snapshots.lock().push(snapshot);
    }

    fn emit(&self, event: SearchEvent) {
        if let Some(events) = self.events {
            if events.send(event).is_err() {
                debug!("event receiver is gone");
            }
        }
    }
}
