//! Command line entry point for the refill planner.

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use refill_planner::jiggle::Jiggler;
use refill_planner::problem::Mode;
use refill_planner::provider::{GeneralDataProvider, JsonFileProvider, MapDataProvider};
use refill_planner::solution::Allocation;
use refill_planner::store::{FileStore, PersistenceStore};
use refill_planner::utils::format_total;
use refill_planner::{solve, solver_for, SearchConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `<map>.json` and `general.json`
    #[arg(long, default_value = "cache")]
    data_dir: PathBuf,

    /// Directory for full score snapshots
    #[arg(long, default_value = "my_games")]
    games_dir: PathBuf,

    /// Directory for per-map total logs
    #[arg(long, default_value = "log")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the local search on a map until it converges
    Solve {
        #[arg(long)]
        map: String,
        /// JSON file with search settings
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        max_generations: Option<u32>,
        /// Do not build the merged group candidate
        #[arg(long)]
        no_groups: bool,
        /// Score every key every generation
        #[arg(long)]
        no_set_pruning: bool,
    },
    /// Print the best stored total for a map
    Best {
        #[arg(long)]
        map: String,
    },
    /// Reload a stored result, validate and rescore it
    Verify {
        #[arg(long)]
        id: String,
    },
    /// Randomly perturb the best stored result looking for small gains
    Jiggle {
        #[arg(long)]
        map: String,
        #[arg(long, default_value_t = 10_000)]
        iterations: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> refill_planner::Result<SearchConfig> {
    match path {
        Some(path) => SearchConfig::from_file(path),
        None => Ok(SearchConfig::new()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let provider = JsonFileProvider::new(&cli.data_dir);
    let mut store = FileStore::new(&cli.games_dir, &cli.log_dir)?;

    match cli.command {
        Command::Solve {
            map,
            config,
            workers,
            max_generations,
            no_groups,
            no_set_pruning,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            if let Some(generations) = max_generations {
                config = config.with_max_generations(generations);
            }
            if no_groups {
                config = config.with_groups(false);
            }
            if no_set_pruning {
                config = config.with_set_pruning(false);
            }

            let statistics = solve(&provider, &map, config, Box::new(store))?;
            println!("{}", statistics.format());
        }
        Command::Best { map } => match store.best(&map)? {
            Some((total, id)) => println!("{}\t{}", format_total(total as f64), id),
            None => println!("no results stored for {}", map),
        },
        Command::Verify { id } => {
            let snapshot = store.load(&id)?;
            let map = provider.map(&snapshot.map_name)?;
            let general = provider.general()?;
            let mode = map.mode();
            let solver = solver_for(map, general, SearchConfig::new());

            let allocation = Allocation::from_scored(&snapshot, mode);
            let result = solver.verify(&allocation)?;
            println!("{}", serde_json::to_string_pretty(&result.game_score)?);
            println!(
                "stored {}\trescored {}",
                format_total(snapshot.total()),
                format_total(result.total())
            );
            if mode == Mode::Sandbox {
                println!("{} sandbox locations", allocation.len());
            }
        }
        Command::Jiggle {
            map,
            iterations,
            seed,
            config,
        } => {
            let config = load_config(config.as_ref())?;
            let map = provider.map(&map)?;
            let general = provider.general()?;

            let rng = ChaCha8Rng::seed_from_u64(seed);
            let mut jiggler = Jiggler::new(&map, &general, &config, rng);
            let report = jiggler.run(&mut store, iterations)?;
            println!(
                "{} -> {} after {} iterations ({} improvements, {} resets), best {}",
                format_total(report.start_total),
                format_total(report.best_total),
                report.iterations,
                report.improvements,
                report.resets,
                report.best_id
            );
        }
    }

    Ok(())
}
