use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Upper bound on workers running at once. Threads are allocated up front.
    pub max_workers: usize,
    /// A queue longer than this hands a batch to an idle worker slot.
    pub split_threshold: usize,
    pub split_batch: usize,
    /// How often a worker considers splitting its queue.
    pub split_interval: Duration,
    pub report_interval: Duration,
    /// Wall-clock budget for the whole run.
    pub deadline: Option<Duration>,
    /// Whether timeout snapshots list states, not just counts.
    pub capture_entries: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_workers: num_cpus::get().max(1),
            split_threshold: 30_000,
            split_batch: 10_000,
            split_interval: Duration::from_secs(1),
            report_interval: Duration::from_secs(5),
            deadline: None,
            capture_entries: false,
        }
    }
}

impl SearchConfig {
    pub fn with_workers(mut self, n: usize) -> Self {
        self.max_workers = n.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Clone, Debug)]
pub struct MctsConfig {
    /// UCT exploration constant.
    pub exploration: f64,
    /// Moves per random playout.
    pub rollout_limit: usize,
    /// Added to the reward of a playout that used its whole budget without
    /// getting stuck.
    pub survival_bonus: f64,
    pub seed: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        MctsConfig {
            exploration: std::f64::consts::SQRT_2,
            rollout_limit: 200,
            survival_bonus: 0.05,
            seed: None,
        }
    }
}
