//! Sluice CLI - Concurrent document ingestion into a searchable store

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sluice - Ingest documents, transcripts and scans into a chunked, embedded store
#[derive(Parser)]
#[command(name = "sluice")]
#[command(author = "Lalo Morales <lalomorales22@github.com>")]
#[command(version)]
#[command(about = "Concurrent document ingestion into a searchable store", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize sluice (create config and database)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Ingest a file or directory
    Ingest {
        /// Path to file or directory to ingest
        path: String,

        /// Maximum files processed at once (default: from config)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Include files whose path is already in the store
        #[arg(short, long)]
        force: bool,

        /// Show what would be ingested without actually ingesting
        #[arg(long)]
        dry_run: bool,

        /// Tag stats records with this job id (default: random)
        #[arg(long, env = "SLUICE_JOB_ID")]
        job_id: Option<String>,
    },

    /// Watch configured directories and ingest changed files
    Watch,

    /// Show store statistics and outcome breakdown
    Stats {
        /// Restrict the outcome breakdown to one job
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Inspect and retry failed files
    #[command(subcommand)]
    Failed(FailedCommands),

    /// Check which external processing tools are available
    Tools,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., ingest.max_concurrent_files)
        key: String,

        /// Value to set
        value: String,
    },

    /// Add a directory to watch
    AddWatch {
        /// Directory path
        path: String,
    },
}

#[derive(Subcommand)]
enum FailedCommands {
    /// List failed files
    List {
        /// Only this classification (timeout, error, no_chunks, image_only_pdf)
        #[arg(short, long)]
        classification: Option<String>,

        /// Include resolved entries
        #[arg(short, long)]
        all: bool,
    },

    /// Re-ingest unresolved files of one classification
    Retry {
        /// Classification to retry
        #[arg(short, long)]
        classification: String,

        /// Maximum files processed at once (default: from config)
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sluice=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sluice=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value),
            ConfigCommands::AddWatch { path } => commands::config::add_watch(&path),
        },
        Commands::Ingest {
            path,
            concurrency,
            force,
            dry_run,
            job_id,
        } => commands::ingest::run(&path, concurrency, force, dry_run, job_id),
        Commands::Watch => commands::watch::run(),
        Commands::Stats { job_id } => commands::stats::run(job_id.as_deref()),
        Commands::Failed(cmd) => match cmd {
            FailedCommands::List { classification, all } => {
                commands::failed::list(classification.as_deref(), all)
            }
            FailedCommands::Retry {
                classification,
                concurrency,
            } => commands::failed::retry(&classification, concurrency),
        },
        Commands::Tools => commands::tools::run(),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
