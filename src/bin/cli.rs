//! Boatrace Features CLI - point-in-time feature generation over CSV files

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use boatrace_features::core::compute_stats;
use boatrace_features::data::{augmented_to_frame, read_csv, records_from_frame, targets_from_frame};
use boatrace_features::{AugmentConfig, Augmenter, EntityKind, EventTime, HistoricalRecords, Timelines};

#[derive(Parser)]
#[command(name = "boatrace-features")]
#[command(author, version, about = "Point-in-time race history features", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Augment target rows with competitor/operator/handler history features
    Augment {
        /// Target rows CSV (event_id, competitor_number, event_time, {kind}_id)
        #[arg(short, long)]
        targets: PathBuf,

        /// Competitor history CSV
        #[arg(long)]
        competitor_history: Option<PathBuf>,

        /// Operator history CSV
        #[arg(long)]
        operator_history: Option<PathBuf>,

        /// Handler history CSV
        #[arg(long)]
        handler_history: Option<PathBuf>,

        /// JSON config (defaults to all kinds with default windows)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worker threads (overrides config and BOATRACE_WORKERS)
        #[arg(long)]
        workers: Option<usize>,

        /// Output CSV path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print one entity's timeline with cumulative counters
    Timeline {
        /// History CSV for the entity's kind
        #[arg(long)]
        history: PathBuf,

        /// Entity kind (competitor, operator, handler)
        #[arg(short, long, default_value = "competitor")]
        kind: EntityKind,

        /// Entity id
        #[arg(short, long)]
        entity: String,

        /// Also print statistics as of this time (YYYY-MM-DD or YYYYMMDD)
        #[arg(long)]
        before: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose || std::env::var("BOATRACE_LOG").is_ok_and(|v| v == "debug") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    match cli.command {
        Commands::Augment {
            targets,
            competitor_history,
            operator_history,
            handler_history,
            config,
            workers,
            out,
        } => {
            let histories = [
                (EntityKind::Competitor, competitor_history),
                (EntityKind::Operator, operator_history),
                (EntityKind::Handler, handler_history),
            ];
            run_augment(&targets, histories, config.as_deref(), workers, &out)?;
        }
        Commands::Timeline {
            history,
            kind,
            entity,
            before,
        } => {
            print_timeline(&history, kind, &entity, before.as_deref())?;
        }
    }

    Ok(())
}

fn run_augment(
    targets_path: &Path,
    histories: [(EntityKind, Option<PathBuf>); 3],
    config_path: Option<&Path>,
    workers: Option<usize>,
    out: &Path,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => AugmentConfig::from_json_file(path)?,
        None => AugmentConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(workers) = workers {
        config.workers = Some(workers);
    }

    let targets_df = read_csv(targets_path)
        .with_context(|| format!("Failed to load targets from {:?}", targets_path))?;
    let targets = targets_from_frame(&targets_df)?;
    info!("Loaded {} target rows from {:?}", targets.len(), targets_path);

    let mut historical = HistoricalRecords::new();
    for (kind, path) in histories {
        let Some(path) = path else { continue };
        let df = read_csv(&path).with_context(|| format!("Failed to load {} history from {:?}", kind, path))?;
        let records = records_from_frame(&df)?;
        info!("Loaded {} {} records from {:?}", records.len(), kind, path);
        historical.insert(kind, records);
    }

    let augmenter = Augmenter::new(config)?;
    let rows = augmenter.augment(&targets, &historical)?;
    let mut df = augmented_to_frame(&rows, augmenter.config())?;

    let mut file = File::create(out).with_context(|| format!("Failed to create {:?}", out))?;
    CsvWriter::new(&mut file)
        .finish(&mut df)
        .with_context(|| format!("Failed to write {:?}", out))?;
    info!("Wrote {} rows x {} columns to {:?}", df.height(), df.width(), out);

    Ok(())
}

fn print_timeline(history: &Path, kind: EntityKind, entity: &str, before: Option<&str>) -> Result<()> {
    let df = read_csv(history).with_context(|| format!("Failed to load history from {:?}", history))?;
    let records = records_from_frame(&df)?;
    let timelines = Timelines::build(kind, &records)?;

    let Some(timeline) = timelines.get(entity) else {
        bail!("No {} history for {}", kind, entity);
    };

    println!(
        "{:<12} {:<20} {:>5} {:>6} {:>5} {:>5} {:>8}",
        "event", "time", "rank", "races", "wins", "top3", "avg"
    );
    println!("{}", "-".repeat(68));
    for entry in timeline.entries() {
        let c = entry.cumulative;
        println!(
            "{:<12} {:<20} {:>5} {:>6} {:>5} {:>5} {:>8.3}",
            entry.record.event_id,
            entry.event_time.to_string(),
            entry.record.finish_rank.map_or("-".to_string(), |r| r.to_string()),
            c.races,
            c.wins,
            c.top3,
            c.avg_rank()
        );
    }

    if let Some(before) = before {
        let Some(query_time) = EventTime::parse(before) else {
            bail!("Invalid time: {}", before);
        };
        let stats = compute_stats(Some(timeline), query_time, None, AugmentConfig::default().rolling_window);
        println!();
        println!("As of {} (strictly earlier records only):", query_time);
        println!("  race_count: {}", stats.race_count);
        println!("  win_rate:   {:.3}", stats.win_rate);
        println!("  place_rate: {:.3}", stats.place_rate);
        println!("  avg_rank:   {:.3}", stats.avg_rank);
    }

    Ok(())
}
