mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    checkpoint::CheckpointSubcommand, config::ConfigSubcommand, knowledge::KnowledgeSubcommand,
    phase::PhaseSubcommand, query::QuerySubcommand, task::TaskSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dwh",
    about = "Checkpoint-gated workflow for data-warehouse analysis tasks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .dwh/ or .git/)
    #[arg(long, global = true, env = "DWH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .dwh/ in the current project
    Init,

    /// Classify the next action for a task
    Next {
        /// Task name or folder (omit to show every open task)
        #[arg(long = "for")]
        task: Option<String>,
        /// Print the full markdown directive instead of the summary lines
        #[arg(long)]
        directive: bool,
    },

    /// Create, list and inspect tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Complete, advance or fail the current phase
    Phase {
        #[command(subcommand)]
        subcommand: PhaseSubcommand,
    },

    /// Review, approve, reject and skip checkpoints
    Checkpoint {
        #[command(subcommand)]
        subcommand: CheckpointSubcommand,
    },

    /// Check a query against the read-only and PII guards
    Query {
        #[command(subcommand)]
        subcommand: QuerySubcommand,
    },

    /// Write knowledge-base notes for inspected tables
    Knowledge {
        #[command(subcommand)]
        subcommand: KnowledgeSubcommand,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Next { task, directive } => {
            cmd::next::run(&root, task.as_deref(), directive, cli.json)
        }
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Phase { subcommand } => cmd::phase::run(&root, subcommand, cli.json),
        Commands::Checkpoint { subcommand } => cmd::checkpoint::run(&root, subcommand, cli.json),
        Commands::Query { subcommand } => cmd::query::run(&root, subcommand, cli.json),
        Commands::Knowledge { subcommand } => cmd::knowledge::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
