//! tidytree - organize, de-duplicate and clean up file trees.
//!
//! Usage:
//!   tidytree duplicates [PATH]     Report duplicate files
//!   tidytree dedupe [PATH]         Move or delete duplicates
//!   tidytree clean [PATH]          Apply cleanup rules
//!   tidytree organize [PATH]       Sort files into folders
//!   tidytree run [PATH]            Organize, dedupe and clean in one go
//!   tidytree dedupe-lines FILE     Drop duplicate lines from a text file
//!   tidytree watch [PATH]          Clean and dedupe periodically
//!   tidytree --help                Show help

mod logging;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use indexmap::IndexMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use tidytree_analyze::{DEFAULT_THRESHOLD, DedupStrategy, DuplicateConfig, DuplicateFinder, dedup_strings};
use tidytree_core::{BatchReport, KeepPolicy, Settings, Summary};
use tidytree_engine::{
    Disposition, DuplicateRemover, EMPTY_DIRS_OPERATION, MaintenanceLoop, Organizer,
    RemovalOptions, RuleEngine,
};
use tidytree_ops::OperationRecorder;

#[derive(Parser)]
#[command(
    name = "tidytree",
    version,
    about = "Organize, de-duplicate and clean up file trees",
    long_about = "tidytree sorts files into folders, removes duplicate files and \
                  applies age/size based cleanup rules.\n\n\
                  Settings are read from the platform config directory \
                  (tidytree/config.toml) unless --config is given."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find duplicate files
    Duplicates {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Minimum file size to consider (e.g., "1KB", "1MB")
        #[arg(short, long, default_value = "1B")]
        min_size: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove duplicate files, keeping one copy of each
    Dedupe {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Which copy survives (keep_first, keep_last)
        #[arg(short, long)]
        keep: Option<KeepPolicy>,

        /// Delete duplicates instead of moving them to the duplicates folder
        #[arg(long)]
        delete: bool,

        /// Show what would happen without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Apply cleanup rules
    Clean {
        /// Directory to clean
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Also remove empty directories, deepest first
        #[arg(long)]
        empty_dirs: bool,

        /// Show what would happen without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Sort files into folders
    Organize {
        /// Directory to organize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// How destination folders are chosen
        #[arg(short, long, default_value = "type")]
        by: OrganizeBy,

        /// Folder layout for --by date (chrono format, e.g. "%Y/%m")
        #[arg(long)]
        date_format: Option<String>,

        /// Show what would happen without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Organize by type, remove duplicates, then apply cleanup rules
    Run {
        /// Directory to process
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Show what would happen without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Skip the organize step
        #[arg(long)]
        no_organize: bool,

        /// Skip the duplicate removal step
        #[arg(long)]
        no_dedupe: bool,

        /// Skip the cleanup step
        #[arg(long)]
        no_clean: bool,

        /// Keep empty directories left behind
        #[arg(long)]
        no_empty_dirs: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Print the lines of a text file with duplicates removed
    DedupeLines {
        /// Input file
        file: PathBuf,

        /// Comparison strategy (exact, fuzzy, semantic, hash_based)
        #[arg(short, long, default_value = "exact")]
        strategy: String,

        /// Similarity threshold for the fuzzy strategy
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },

    /// Apply cleanup rules and remove duplicates periodically until interrupted
    Watch {
        /// Directory to maintain
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Seconds between runs (defaults to the settings value)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Only apply cleanup rules
        #[arg(long)]
        no_dedupe: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OrganizeBy {
    /// Organization rules from the settings file
    Rules,
    /// Category folders by file extension
    #[default]
    Type,
    /// Folders derived from modification dates
    Date,
    /// Size bucket folders from the settings file
    Size,
}

/// Combined result of `run`.
#[derive(Debug, Serialize)]
struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    organize: Option<BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dedupe: Option<BatchReport>,
    clean: IndexMap<String, BatchReport>,
    summary: Summary,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose).map_err(|e| eyre!("Failed to initialize logging: {e}"))?;

    let settings = match &cli.config {
        Some(path) => Settings::load(path),
        None => Settings::load_default(),
    }
    .context("Failed to load settings")?;

    match cli.command {
        Command::Duplicates {
            path,
            min_size,
            format,
        } => run_duplicates(&settings, &path, &min_size, format)?,
        Command::Dedupe {
            path,
            keep,
            delete,
            dry_run,
            export,
        } => run_dedupe(&settings, &path, keep, delete, dry_run, export.as_deref())?,
        Command::Clean {
            path,
            empty_dirs,
            dry_run,
            export,
        } => run_clean(&settings, &path, empty_dirs, dry_run, export.as_deref())?,
        Command::Organize {
            path,
            by,
            date_format,
            dry_run,
            export,
        } => run_organize(&settings, &path, by, date_format, dry_run, export.as_deref())?,
        Command::Run {
            path,
            dry_run,
            no_organize,
            no_dedupe,
            no_clean,
            no_empty_dirs,
            export,
        } => {
            let steps = Steps {
                organize: !no_organize,
                dedupe: !no_dedupe,
                clean: !no_clean,
                empty_dirs: !no_empty_dirs,
            };
            run_all(&settings, &path, steps, dry_run, export.as_deref())?
        }
        Command::DedupeLines {
            file,
            strategy,
            threshold,
        } => run_dedupe_lines(&file, &strategy, threshold)?,
        Command::Watch {
            path,
            interval,
            no_dedupe,
        } => run_watch(&settings, &path, interval, !no_dedupe)?,
    }

    Ok(())
}

/// Report duplicate groups without changing anything.
fn run_duplicates(settings: &Settings, path: &Path, min_size: &str, format: OutputFormat) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let min_bytes = parse_size(min_size)?;

    eprintln!("Finding duplicates in {} (min size: {})...", path.display(), min_size);

    let config = DuplicateConfig::builder()
        .min_size(min_bytes)
        .ignore_patterns(vec![settings.duplicates_dir.clone()])
        .build()
        .context("Invalid duplicate settings")?;
    let report = DuplicateFinder::with_config(config)
        .find(&path)
        .context("Duplicate scan failed")?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate File Report");
            println!("{}", "─".repeat(70));
            println!();

            if report.groups.is_empty() {
                println!(" No duplicate files found ({} files checked).", report.files_analyzed);
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    report.group_count(),
                    report.files_with_duplicates
                );
                println!(" Total wasted space: {}", format_size(report.total_wasted_space));
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {} each, {} wasted)",
                        i + 1,
                        group.count(),
                        format_size(group.size),
                        format_size(group.wasted_bytes)
                    );
                    for path in &group.paths {
                        println!("   {}", path.display());
                    }
                    println!();
                }
            }

            if !report.skipped.is_empty() {
                println!("{} file(s) could not be read", report.skipped.len());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn run_dedupe(
    settings: &Settings,
    path: &Path,
    keep: Option<KeepPolicy>,
    delete: bool,
    dry_run: bool,
    export: Option<&Path>,
) -> Result<()> {
    let mut options = RemovalOptions::from_settings(settings).with_dry_run(dry_run);
    if let Some(keep) = keep {
        options.keep = keep;
    }
    if delete {
        options.disposition = Disposition::Delete;
    }

    let mut recorder = OperationRecorder::new(settings.history_capacity);
    let report = DuplicateRemover::new()
        .remove(path, &options, &mut recorder)
        .context("Duplicate removal failed")?;

    print_report("Duplicate removal", &report);
    export_json(export, &report)
}

fn run_clean(
    settings: &Settings,
    path: &Path,
    empty_dirs: bool,
    dry_run: bool,
    export: Option<&Path>,
) -> Result<()> {
    let engine = RuleEngine::from_settings(settings)
        .context("Invalid cleanup rules")?
        .with_dry_run(dry_run);

    let mut recorder = OperationRecorder::new(settings.history_capacity);
    let mut reports = engine
        .apply_rules(path, &mut recorder)
        .context("Cleanup failed")?;
    if empty_dirs {
        let report = engine
            .remove_empty_dirs(path, &mut recorder)
            .context("Empty directory removal failed")?;
        reports.insert(EMPTY_DIRS_OPERATION.to_string(), report);
    }

    for (rule, report) in &reports {
        print_report(rule, report);
    }
    print_summary(&recorder.stats());
    export_json(export, &reports)
}

fn run_organize(
    settings: &Settings,
    path: &Path,
    by: OrganizeBy,
    date_format: Option<String>,
    dry_run: bool,
    export: Option<&Path>,
) -> Result<()> {
    let organizer = Organizer::from_settings(settings).context("Invalid organization rules")?;
    let mut recorder = OperationRecorder::new(settings.history_capacity);

    let report = match by {
        OrganizeBy::Rules => {
            if organizer.rules().is_empty() {
                return Err(eyre!("No organization rules configured"));
            }
            organizer.organize(path, dry_run, &mut recorder)
        }
        OrganizeBy::Type => organizer.organize_by_type(path, dry_run, &mut recorder),
        OrganizeBy::Date => {
            let format = date_format.unwrap_or_else(|| settings.date_format.clone());
            organizer.organize_by_date(path, &format, dry_run, &mut recorder)
        }
        OrganizeBy::Size => organizer.organize_by_size(path, dry_run, &mut recorder),
    }
    .context("Organize failed")?;

    print_report("Organize", &report);
    export_json(export, &report)
}

/// Which steps `run` performs.
#[derive(Debug, Clone, Copy)]
struct Steps {
    organize: bool,
    dedupe: bool,
    clean: bool,
    empty_dirs: bool,
}

fn run_all(
    settings: &Settings,
    path: &Path,
    steps: Steps,
    dry_run: bool,
    export: Option<&Path>,
) -> Result<()> {
    let mut recorder = OperationRecorder::new(settings.history_capacity);

    let organize = if steps.organize {
        let organizer = Organizer::from_settings(settings).context("Invalid organization rules")?;
        let report = organizer
            .organize_by_type(path, dry_run, &mut recorder)
            .context("Organize failed")?;
        print_report("Organize", &report);
        Some(report)
    } else {
        None
    };

    let dedupe = if steps.dedupe {
        let options = RemovalOptions::from_settings(settings).with_dry_run(dry_run);
        let report = DuplicateRemover::new()
            .remove(path, &options, &mut recorder)
            .context("Duplicate removal failed")?;
        print_report("Duplicate removal", &report);
        Some(report)
    } else {
        None
    };

    let engine = RuleEngine::from_settings(settings)
        .context("Invalid cleanup rules")?
        .with_dry_run(dry_run);
    let mut clean = if steps.clean {
        engine
            .apply_rules(path, &mut recorder)
            .context("Cleanup failed")?
    } else {
        IndexMap::new()
    };
    if steps.empty_dirs {
        let report = engine
            .remove_empty_dirs(path, &mut recorder)
            .context("Empty directory removal failed")?;
        clean.insert(EMPTY_DIRS_OPERATION.to_string(), report);
    }
    for (name, report) in &clean {
        print_report(name, report);
    }

    let summary = recorder.stats();
    print_summary(&summary);

    let report = RunReport {
        organize,
        dedupe,
        clean,
        summary,
    };
    export_json(export, &report)
}

fn run_dedupe_lines(file: &Path, strategy: &str, threshold: f64) -> Result<()> {
    let strategy = DedupStrategy::from_name(strategy)?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(eyre!("Threshold must be between 0 and 1, got {threshold}"));
    }

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let lines: Vec<&str> = content.lines().collect();
    let kept = dedup_strings(&lines, strategy, threshold);

    for line in &kept {
        println!("{line}");
    }
    eprintln!(
        "{} of {} lines kept ({strategy})",
        kept.len(),
        lines.len()
    );
    Ok(())
}

fn run_watch(settings: &Settings, path: &Path, interval: Option<u64>, dedupe: bool) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let interval = Duration::from_secs(interval.unwrap_or(settings.maintenance_interval_secs).max(1));

    let engine = RuleEngine::from_settings(settings).context("Invalid cleanup rules")?;
    let engine = Arc::new(Mutex::new(engine));
    let recorder = Arc::new(Mutex::new(OperationRecorder::new(settings.history_capacity)));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let runs = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let mut maintenance = MaintenanceLoop::new(engine, Arc::clone(&recorder), path.clone(), interval);
        if dedupe {
            maintenance = maintenance.with_dedupe(RemovalOptions::from_settings(settings));
        }
        let handle = maintenance.spawn(cancel.clone());

        eprintln!(
            "Maintaining {} every {}s, press Ctrl-C to stop",
            path.display(),
            interval.as_secs()
        );
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        cancel.cancel();

        handle.await.context("Maintenance task failed")
    })?;

    let stats = recorder
        .lock()
        .map(|r| r.stats())
        .map_err(|_| eyre!("Operation history lock poisoned"))?;
    eprintln!("Stopped after {runs} run(s)");
    print_summary(&stats);
    Ok(())
}

/// Print one batch report.
fn print_report(title: &str, report: &BatchReport) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!();
    println!(" {title}{mode}");
    println!("{}", "─".repeat(50));
    println!("   processed: {:>8}", report.files_processed);
    println!("   moved:     {:>8}", report.files_moved);
    println!("   deleted:   {:>8}", report.files_deleted);
    if report.duplicates_removed > 0 {
        println!("   duplicates:{:>8}", report.duplicates_removed);
    }
    if report.directories_created > 0 {
        println!("   new dirs:  {:>8}", report.directories_created);
    }
    println!("   freed:     {:>8}", format_size(report.space_freed_bytes));

    for error in &report.errors {
        println!("   error: {error}");
    }
}

fn print_summary(summary: &Summary) {
    println!();
    println!("{}", "─".repeat(50));
    println!(
        " {} operation(s): {} processed, {} moved, {} deleted, {} freed, {} error(s)",
        summary.operations,
        summary.files_processed,
        summary.files_moved,
        summary.files_deleted,
        format_size(summary.space_freed_bytes),
        summary.error_count
    );
}

/// Write `value` as pretty JSON to `path`, if given.
fn export_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("Exported to {}", path.display());
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');
    let unit = &s[digits.len()..];

    let multiplier: u64 = match unit {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        other => return Err(eyre!("Unknown size unit '{other}'")),
    };
    let num: f64 = digits
        .parse()
        .with_context(|| format!("Invalid size '{s}'"))?;

    Ok((num * multiplier as f64) as u64)
}
