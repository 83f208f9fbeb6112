//! Motif CLI
//!
//! Command-line interface over one pattern store. Every command prints
//! JSON to stdout; logs go to stderr (`RUST_LOG` controls verbosity).

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use motif::{EngineConfig, MergePair, Outcome, PatternEngine};

#[derive(Parser)]
#[command(name = "motif")]
#[command(about = "Pattern memory engine CLI")]
#[command(version)]
struct Cli {
    /// Store file path
    #[arg(
        long,
        env = "MOTIF_STORE_PATH",
        default_value = "~/.local/share/motif/patterns.json"
    )]
    store: String,

    /// Optional TOML configuration file
    #[arg(long, env = "MOTIF_CONFIG")]
    config: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize and record one batch of notes
    Ingest {
        /// Batch identifier (a YYYY-MM-DD id also dates the batch)
        batch_id: String,
        /// Read the batch from this file (- for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Inline batch text
        #[arg(short, long)]
        text: Option<String>,
        /// Batch date, overriding the id
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Recompute all scores
    Recompute {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// List near-duplicate pairs
    Candidates {
        /// Maximum edit distance (defaults to the configured one)
        #[arg(short, long)]
        threshold: Option<usize>,
    },
    /// Merge near-duplicates; pairs further apart than the threshold are skipped
    Merge {
        /// Explicit pair as `a,b` (repeatable); all current candidates if omitted
        #[arg(short, long)]
        pair: Vec<String>,
        #[arg(short, long)]
        threshold: Option<usize>,
    },
    /// Record an SM-2 review rating (0-5)
    Review { pattern: String, quality: i64 },
    /// Patterns due for review
    Due {
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Print bucket counts instead of the patterns
        #[arg(long)]
        summary: bool,
    },
    /// Current promotion candidates
    Promotions {
        /// Include suggested artifact kind, name and description
        #[arg(long)]
        suggest: bool,
    },
    /// Mark a pattern as promoted
    Promote {
        pattern: String,
        /// skill or agent
        kind: String,
        /// Where the artifact lives
        artifact_ref: String,
    },
    /// Record a success/failure observation
    Feedback { pattern: String, outcome: Outcome },
    /// Show a pattern's confidence
    Confidence { pattern: String },
    /// Thompson-sampled selection
    Select {
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },
    /// Flag or unflag a stopword
    Stopword {
        pattern: String,
        #[arg(long)]
        clear: bool,
    },
    /// Show one pattern
    Show { pattern: String },
    /// Show statistics
    Stats,
    /// Back up and empty the store
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .with(filter)
            .init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_pair(raw: &str) -> anyhow::Result<MergePair> {
    match raw.split_once(',') {
        Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
            Ok(MergePair::new(a.trim(), b.trim()))
        }
        _ => bail!("invalid pair '{}', expected a,b", raw),
    }
}

fn read_batch(file: Option<PathBuf>, text: Option<String>) -> anyhow::Result<String> {
    match (file, text) {
        (Some(_), Some(_)) => bail!("pass either --file or --text, not both"),
        (None, Some(text)) => Ok(text),
        (Some(path), None) if path.as_os_str() == "-" => read_stdin(),
        (Some(path), None) => std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display())),
        (None, None) => read_stdin(),
    }
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    // Expand ~ in paths
    let store_path = shellexpand::tilde(&cli.store).to_string();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(shellexpand::tilde(path).to_string())?,
        None => EngineConfig::default(),
    };
    // A command-line threshold governs both candidate search and merging
    if let Commands::Candidates { threshold: Some(t) } | Commands::Merge { threshold: Some(t), .. } =
        &cli.command
    {
        config.similarity.max_distance = *t;
    }

    let engine = PatternEngine::open(store_path, config)?;
    let today = chrono::Utc::now().date_naive();

    match cli.command {
        Commands::Ingest {
            batch_id,
            file,
            text,
            date,
        } => {
            let text = read_batch(file, text)?;
            let summary = match date {
                Some(date) => engine.ingest_on(&batch_id, date, &text)?,
                None => engine.ingest(&batch_id, &text)?,
            };
            print_json(&summary)?;
        }

        Commands::Recompute { as_of } => {
            let report = engine.recompute_scores_as_of(as_of.unwrap_or(today))?;
            print_json(&report)?;
        }

        Commands::Candidates { .. } => {
            let threshold = engine.config().similarity.max_distance;
            print_json(&engine.find_merge_candidates(threshold)?)?;
        }

        Commands::Merge { pair, .. } => {
            let pairs: Vec<MergePair> = if pair.is_empty() {
                engine
                    .find_merge_candidates(engine.config().similarity.max_distance)?
                    .iter()
                    .map(MergePair::from)
                    .collect()
            } else {
                pair.iter()
                    .map(|p| parse_pair(p))
                    .collect::<anyhow::Result<_>>()?
            };
            print_json(&engine.apply_merges(&pairs)?)?;
        }

        Commands::Review { pattern, quality } => {
            print_json(&engine.record_review(&pattern, quality)?)?;
        }

        Commands::Due { as_of, summary } => {
            let as_of = as_of.unwrap_or(today);
            if summary {
                print_json(&engine.review_summary(as_of)?)?;
            } else {
                print_json(&engine.due_reviews(as_of)?)?;
            }
        }

        Commands::Promotions { suggest } => {
            if suggest {
                print_json(&engine.promotion_suggestions()?)?;
            } else {
                print_json(&engine.promotion_candidates()?)?;
            }
        }

        Commands::Promote {
            pattern,
            kind,
            artifact_ref,
        } => {
            let changed = engine.mark_promoted(&pattern, &kind, &artifact_ref)?;
            print_json(&serde_json::json!({ "pattern": pattern, "promoted": changed }))?;
        }

        Commands::Feedback { pattern, outcome } => {
            print_json(&engine.record_feedback(&pattern, outcome)?)?;
        }

        Commands::Confidence { pattern } => {
            print_json(&engine.confidence(&pattern)?)?;
        }

        Commands::Select { limit } => {
            print_json(&engine.thompson_select(limit)?)?;
        }

        Commands::Stopword { pattern, clear } => {
            engine.set_stopword(&pattern, !clear)?;
            print_json(&serde_json::json!({ "pattern": pattern, "is_stopword": !clear }))?;
        }

        Commands::Show { pattern } => {
            print_json(&engine.get_pattern(&pattern)?)?;
        }

        Commands::Stats => {
            print_json(&engine.stats()?)?;
        }

        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to reset {} without --yes", engine.store_path().display());
            }
            let backup = engine.reset()?;
            print_json(&serde_json::json!({ "reset": true, "backup": backup }))?;
        }
    }

    Ok(())
}
