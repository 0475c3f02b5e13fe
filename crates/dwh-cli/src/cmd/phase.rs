use crate::cmd::{describe_outcome, load_task};
use crate::output::{print_json, print_section};
use anyhow::Context;
use clap::Subcommand;
use dwh_core::{collaborator::FsDocumentStore, context::PhaseOutput, task::PhaseReport, types::Phase};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum PhaseSubcommand {
    /// Merge a phase output (YAML or JSON) into the task and move it on
    Complete {
        task: String,
        /// File holding the phase output; its `phase` field names the phase
        #[arg(long)]
        file: PathBuf,
    },
    /// Move to the next phase once its gate is open
    Advance {
        task: String,
        /// Target phase name or number (1-7)
        phase: String,
    },
    /// Record a testing failure and return to query design
    Fail {
        task: String,
        #[arg(long)]
        reason: String,
    },
}

pub fn run(root: &Path, subcmd: PhaseSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PhaseSubcommand::Complete { task, file } => complete(root, &task, &file, json),
        PhaseSubcommand::Advance { task, phase } => advance(root, &task, &phase, json),
        PhaseSubcommand::Fail { task, reason } => fail(root, &task, &reason, json),
    }
}

fn read_output(file: &Path) -> anyhow::Result<PhaseOutput> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    // YAML is a superset of JSON, so one parser covers both.
    serde_yaml::from_str(&data).with_context(|| format!("invalid phase output in {}", file.display()))
}

fn complete(root: &Path, key: &str, file: &Path, json: bool) -> anyhow::Result<()> {
    let (config, mut task) = load_task(root, key)?;
    let output = read_output(file)?;
    let store = FsDocumentStore::new(root);

    let report = task
        .complete_phase(output, &config, &store)
        .with_context(|| format!("cannot complete phase for '{}'", task.folder))?;
    task.save(root).context("failed to save task")?;

    print_report(&task.folder, &report, json)
}

fn advance(root: &Path, key: &str, raw: &str, json: bool) -> anyhow::Result<()> {
    let target: Phase = raw.parse()?;
    let (_config, mut task) = load_task(root, key)?;

    task.advance(target)
        .with_context(|| format!("cannot advance '{}' to {target}", task.folder))?;
    task.save(root).context("failed to save task")?;

    if json {
        print_json(&serde_json::json!({
            "folder": task.folder,
            "phase": task.phase(),
            "status": task.status,
        }))?;
    } else {
        println!("{}: advanced to {}", task.folder, task.phase().title());
    }
    Ok(())
}

fn fail(root: &Path, key: &str, reason: &str, json: bool) -> anyhow::Result<()> {
    let (_config, mut task) = load_task(root, key)?;

    let report = task
        .fail_testing(reason)
        .with_context(|| format!("cannot record a test failure for '{}'", task.folder))?;
    task.save(root).context("failed to save task")?;

    print_report(&task.folder, &report, json)
}

fn print_report(folder: &str, report: &PhaseReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }

    println!("{folder}: {} done, {}", report.completed.title(), describe_outcome(&report.outcome));
    for doc in &report.documents {
        println!("  wrote: {doc}");
    }
    if let Some(summary) = &report.summary {
        println!();
        print_section(&summary.title, &summary.body);
    }
    Ok(())
}
