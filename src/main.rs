//! coinjoin-analyzer CLI
//!
//! Reconstruct taker/maker partitions of a CoinJoin from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Analyze a transaction document (Esplora/mempool JSON)
//! coinjoin-analyzer analyze --input tx.json
//!
//! # Looser fee cap, more solutions, JSON output
//! coinjoin-analyzer analyze --input tx.json --max-fee-rel 0.02 --max-solutions 50 --format json
//!
//! # Persist solutions as they are found
//! coinjoin-analyzer analyze --input tx.json --output solutions.json
//!
//! # Generate a synthetic CoinJoin for testing
//! coinjoin-analyzer generate --participants 5 --seed 7
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use coinjoin_analyzer::config::AnalyzerConfig;
use coinjoin_analyzer::core::transaction::parse_raw_transaction;
use coinjoin_analyzer::optimization::enumeration::{EnumerationContext, EnumerationDriver};
use coinjoin_analyzer::output::report::SolutionsDocument;
use coinjoin_analyzer::simulation::synthetic::{generate_coinjoin, SyntheticConfig};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "coinjoin-analyzer",
    version,
    about = "Reconstruct taker/maker partitions of JoinMarket-style CoinJoins"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate the participant partitions of a transaction
    Analyze {
        /// Raw transaction document (Esplora/mempool JSON)
        #[arg(short, long)]
        input: PathBuf,
        /// Largest maker fee as a fraction of the equal amount
        #[arg(long)]
        max_fee_rel: Option<f64>,
        /// Stop after this many distinct solutions
        #[arg(long)]
        max_solutions: Option<usize>,
        /// Seconds allowed per solver call
        #[arg(long)]
        time_limit: Option<u64>,
        /// TOML file with analyzer settings
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write solutions to this file as they are found
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Generate a synthetic CoinJoin transaction document
    Generate {
        #[arg(short, long, default_value_t = 4)]
        participants: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn cmd_analyze(
    input: PathBuf,
    overrides: (Option<f64>, Option<usize>, Option<u64>),
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Format,
) {
    let mut config = match config_path {
        Some(path) => AnalyzerConfig::from_toml_file(&path)
            .unwrap_or_else(|e| fail(format!("loading '{}': {}", path.display(), e))),
        None => AnalyzerConfig::default(),
    };
    let (max_fee_rel, max_solutions, time_limit) = overrides;
    if let Some(rel) = max_fee_rel {
        config = config.with_max_fee_rel(rel);
    }
    if let Some(n) = max_solutions {
        config = config.with_max_solutions(n);
    }
    if let Some(seconds) = time_limit {
        config = config.with_time_limit(seconds);
    }
    if let Some(path) = output {
        config = config.with_output_path(path);
    }

    let raw = fs::read_to_string(&input)
        .unwrap_or_else(|e| fail(format!("reading '{}': {}", input.display(), e)));
    let tx = parse_raw_transaction(&raw).unwrap_or_else(|e| fail(e));

    let mut ctx = EnumerationContext::new();
    let result = EnumerationDriver::new(&tx, &config)
        .run(&mut ctx)
        .unwrap_or_else(|e| fail(e));

    match format {
        Format::Text => println!("{}", result),
        Format::Json => {
            let document = SolutionsDocument::new(result.transaction(), result.solutions());
            println!("{}", document.to_json().unwrap_or_else(|e| fail(e)));
        }
    }

    if result.num_solutions() == 0 {
        process::exit(1);
    }
}

fn cmd_generate(participants: usize, seed: Option<u64>, output: Option<PathBuf>) {
    let config = SyntheticConfig {
        num_participants: participants,
        seed,
        ..Default::default()
    };
    let coinjoin = generate_coinjoin(&config).unwrap_or_else(|e| fail(e));
    let json = serde_json::to_string_pretty(&coinjoin.raw).unwrap_or_else(|e| fail(e));

    match output {
        Some(path) => {
            fs::write(&path, &json)
                .unwrap_or_else(|e| fail(format!("writing '{}': {}", path.display(), e)));
            eprintln!(
                "Generated {} with {} inputs and {} participants -> {}",
                coinjoin.transaction.txid(),
                coinjoin.transaction.inputs().len(),
                participants,
                path.display()
            );
        }
        None => println!("{}", json),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Analyze {
            input,
            max_fee_rel,
            max_solutions,
            time_limit,
            config,
            output,
            format,
        } => cmd_analyze(
            input,
            (max_fee_rel, max_solutions, time_limit),
            config,
            output,
            format,
        ),
        Command::Generate {
            participants,
            seed,
            output,
        } => cmd_generate(participants, seed, output),
    }
}
