use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use streets_solver::mcts;
use streets_solver::protocol::{run_setup, SetupMessage};
use streets_solver::{CanonicalState, GameState, MctsConfig, Outcome, SearchConfig, Solver};

#[derive(Parser)]
#[command(name = "streets-solver")]
#[command(about = "Solves Streets and Alleys deals")]
struct Cli {
    /// Layout file, one column per line, bottom card first ("-" for stdin)
    #[arg(long, conflicts_with_all = ["state", "setup"])]
    layout: Option<PathBuf>,

    /// Hex canonical state to start from
    #[arg(long, conflicts_with = "setup")]
    state: Option<String>,

    /// Read a JSON setup message on stdin and answer with JSON lines
    #[arg(long)]
    setup: bool,

    /// Seed for the random deal (and the tree search)
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Queue length above which a worker hands work to an idle slot
    #[arg(long, default_value_t = 30_000)]
    split_threshold: usize,

    /// Play with tree search instead of searching exhaustively
    #[arg(long)]
    mcts: bool,

    /// Tree search iterations per move
    #[arg(long, default_value_t = 2_000)]
    iterations: usize,

    #[arg(long, default_value_t = 300)]
    max_moves: usize,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn search_config(&self) -> SearchConfig {
        let mut config = SearchConfig {
            split_threshold: self.split_threshold,
            ..SearchConfig::default()
        };
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(secs) = self.deadline_secs {
            config = config.with_deadline(Duration::from_secs(secs));
        }
        config
    }

    fn initial_state(&self) -> anyhow::Result<GameState> {
        if let Some(path) = &self.layout {
            let text = if path.as_os_str() == "-" {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                text
            } else {
                std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?
            };
            return Ok(GameState::parse(&text)?);
        }
        if let Some(hex) = &self.state {
            return Ok(CanonicalState::from_hex(hex)?.decode()?);
        }
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(GameState::deal(&mut rng))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.setup {
        let mut json = String::new();
        std::io::stdin().read_to_string(&mut json)?;
        let setup = SetupMessage::from_json(&json).context("parsing setup message")?;
        run_setup(&setup, cli.search_config(), &mut std::io::stdout().lock())?;
        return Ok(());
    }

    let mut state = cli.initial_state()?;
    if !cli.json {
        println!("{state}");
        println!("{}", CanonicalState::encode(&state));
    }

    if cli.mcts {
        let config = MctsConfig {
            seed: cli.seed,
            ..MctsConfig::default()
        };
        let report = mcts::play(&state, config, cli.iterations, cli.max_moves)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            for m in report.moves.iter() {
                println!("{m}");
            }
            println!(
                "Played {} moves, {} cards on the foundations, solved: {}",
                report.moves.len(),
                report.foundation_cards,
                report.solved
            );
        }
        return Ok(());
    }

    match Solver::new(cli.search_config()).solve(&state)? {
        Outcome::Solved(solution) if cli.json => {
            println!("{}", serde_json::to_string_pretty(&solution)?);
        }
        Outcome::Solved(solution) => {
            for m in solution.moves.iter() {
                println!("{m}");
                state = state.apply(*m)?;
                println!("{state}");
            }
            println!("Path length: {}", solution.len());
        }
        Outcome::Exhausted { visited, snapshots } if cli.json => {
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
            eprintln!("No solution: all {visited} reachable states visited");
        }
        Outcome::Exhausted { visited, snapshots } => {
            for s in snapshots.iter() {
                println!(
                    "worker {}: {} iterations, {} states discovered",
                    s.worker, s.iterations, s.discovered
                );
            }
            println!("No solution: all {visited} reachable states visited");
        }
        Outcome::TimedOut { visited, snapshots } if cli.json => {
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
            eprintln!("Deadline passed after visiting {visited} states");
        }
        Outcome::TimedOut { visited, snapshots } => {
            for s in snapshots.iter() {
                println!(
                    "worker {}: {} iterations, {} states discovered, {} queued",
                    s.worker, s.iterations, s.discovered, s.queue
                );
            }
            println!("Deadline passed after visiting {visited} states");
        }
    }

    Ok(())
}
