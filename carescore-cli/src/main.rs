//! carescore CLI - member risk stratification from pre-trained horizon models

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Logs go to stderr; stdout carries only rendered reports

use anyhow::Context;
use carescore_core::config::{self, ResolvedConfig};
use carescore_core::{
    load_engine, load_members, render_json, render_jsonl, render_text, sort_reports, ModelBundle,
    ScoreOptions,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "carescore")]
#[command(about = "Multi-horizon member risk scoring with feature attribution")]
#[command(version = env!("CARESCORE_VERSION"))]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score members from a JSON or JSON Lines file
    Score {
        /// Path to member file (.json array or .jsonl)
        members: PathBuf,

        /// Model directory containing manifest.json
        #[arg(long)]
        models: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Skip attribution and narrative
        #[arg(long)]
        no_explain: bool,

        /// Score only the member with this id
        #[arg(long)]
        member: Option<String>,

        /// Sort by 90-day tier and score, highest first
        #[arg(long)]
        rank: bool,

        /// Show only top N reports (after ranking)
        #[arg(long)]
        top: Option<usize>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worker threads for batch scoring (default: all cores)
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Inspect model bundles
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ModelsAction {
    /// Load and validate every artifact in a model directory
    Check {
        /// Model directory containing manifest.json
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without scoring
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "carescore=debug,carescore_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Score {
            members,
            models,
            format,
            no_explain,
            member,
            rank,
            top,
            config: config_path,
            jobs,
        } => {
            if let Some(jobs) = jobs {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .context("failed to configure worker threads")?;
            }

            let working_dir = std::env::current_dir()?;
            let resolved = config::load_and_resolve(&working_dir, config_path.as_deref())
                .context("failed to load configuration")?;
            if let Some(path) = &resolved.config_path {
                tracing::info!(path = %path.display(), "using config");
            }

            let failed = score(ScoreArgs {
                members: &members,
                models: &models,
                format,
                explain: !no_explain && resolved.explain,
                member: member.as_deref(),
                rank,
                top,
                config: resolved,
            })?;

            if failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Models { action } => match action {
            ModelsAction::Check { dir } => match ModelBundle::load(&dir) {
                Ok(bundle) => {
                    let source = bundle.source().unwrap_or(dir.as_path());
                    println!("Models valid: {}", source.display());
                    for line in bundle.describe() {
                        println!("  {}", line);
                    }
                }
                Err(e) => {
                    eprintln!("Model check failed: {:#}", e);
                    std::process::exit(1);
                }
            },
        },
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let working_dir = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&working_dir, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let working_dir = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&working_dir, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

struct ScoreArgs<'a> {
    members: &'a Path,
    models: &'a Path,
    format: OutputFormat,
    explain: bool,
    member: Option<&'a str>,
    rank: bool,
    top: Option<usize>,
    config: ResolvedConfig,
}

/// Score a member file and print the reports; returns the number of members that failed
fn score(args: ScoreArgs<'_>) -> anyhow::Result<usize> {
    let mut records = load_members(args.members, &args.config.id_field)?;
    if let Some(id) = args.member {
        records.retain(|r| r.id == id);
        if records.is_empty() {
            anyhow::bail!("member {} not found in {}", id, args.members.display());
        }
    }

    let engine = load_engine(args.models, args.config)?;

    let progress = if std::io::stderr().is_terminal() && records.len() > 1 {
        let bar = ProgressBar::new(records.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} scoring [{bar:30}] {pos}/{len} members")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let results = engine.score_batch_with_progress(
        &records,
        ScoreOptions {
            explain: args.explain,
        },
        || progress.inc(1),
    );
    progress.finish_and_clear();

    let mut reports = Vec::with_capacity(results.len());
    let mut failed = 0;
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                failed += 1;
                eprintln!("error: {}", e);
            }
        }
    }

    if args.rank {
        reports = sort_reports(reports);
    }
    if let Some(n) = args.top {
        reports.truncate(n);
    }

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&reports)),
        OutputFormat::Json => println!("{}", render_json(&reports)),
        OutputFormat::Jsonl => print!(
            "{}",
            render_jsonl(&reports).context("failed to serialize reports")?
        ),
    }

    let degraded = reports.iter().filter(|r| r.degraded).count();
    if degraded > 0 || failed > 0 {
        eprintln!(
            "{} scored, {} degraded, {} failed",
            reports.len(),
            degraded,
            failed
        );
    }

    Ok(failed)
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Normalization:");
    println!("  scale: {}", resolved.normalization.scale);
    println!("  epsilon: {}", resolved.normalization.epsilon);
    println!("  magnitude: {}", resolved.magnitude.as_str());
    println!();
    println!("Tier thresholds:");
    println!("  tier2: {}", resolved.thresholds.tier2);
    println!("  tier3: {}", resolved.thresholds.tier3);
    println!("  tier4: {}", resolved.thresholds.tier4);
    println!("  tier5: {}", resolved.thresholds.tier5);
    println!();
    println!("Intervention:");
    for (i, cost) in resolved.decision.costs.as_array().iter().enumerate() {
        println!("  cost tier {}: {}", i + 1, cost);
    }
    println!("  savings_rate: {}", resolved.decision.savings_rate);
    println!();
    println!("Explanation:");
    println!("  explain: {}", resolved.explain);
    println!("  top_k: {}", resolved.top_k);
    println!("  precision: {}", resolved.precision);
    println!(
        "  friendly_names: {}",
        if resolved.friendly_names.is_empty() {
            "built-in".to_string()
        } else {
            format!("built-in + {} custom", resolved.friendly_names.len())
        }
    );
    println!();
    println!("Input fields:");
    println!("  id_field: {}", resolved.id_field);
    println!("  spending_field: {}", resolved.spending_field);
}
