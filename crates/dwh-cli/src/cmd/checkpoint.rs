use crate::cmd::{describe_outcome, load_task};
use crate::output::{print_json, print_section, print_table};
use anyhow::Context;
use clap::Subcommand;
use dwh_core::{
    checkpoint::{CheckpointResponse, Resolution, SkipSignal},
    context::{Correction, Feedback, SelectedTable},
    task::{CheckpointReport, Task},
    types::CheckpointId,
};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum CheckpointSubcommand {
    /// Show one checkpoint's summary, or every checkpoint's status
    Show {
        task: String,
        /// Checkpoint number 1-4 (default: the one the task waits on)
        checkpoint: Option<String>,
    },
    /// Resolve without a response: auto-approves a skipped checkpoint,
    /// otherwise reports it still pending
    Pending { task: String, checkpoint: String },
    /// Approve a presented checkpoint
    Approve {
        task: String,
        checkpoint: String,
        /// Who approved
        #[arg(long)]
        by: Option<String>,
    },
    /// Reject a presented checkpoint and send the phase back for revision
    Reject {
        task: String,
        checkpoint: String,
        /// Free-form feedback
        #[arg(long, default_value = "")]
        feedback: String,
        /// Drop a table from the selection (repeatable)
        #[arg(long = "remove-table")]
        remove_tables: Vec<String>,
        /// Add a table as schema.table (repeatable)
        #[arg(long = "add-table")]
        add_tables: Vec<String>,
        /// YAML/JSON list of explicit corrections
        #[arg(long)]
        corrections_file: Option<PathBuf>,
    },
    /// Change checkpoint modes: skip-all, skip:N, enable-all, enable:N
    Mode { task: String, signal: String },
}

pub fn run(root: &Path, subcmd: CheckpointSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CheckpointSubcommand::Show { task, checkpoint } => {
            show(root, &task, checkpoint.as_deref(), json)
        }
        CheckpointSubcommand::Pending { task, checkpoint } => {
            pending(root, &task, &checkpoint, json)
        }
        CheckpointSubcommand::Approve {
            task,
            checkpoint,
            by,
        } => approve(root, &task, &checkpoint, by, json),
        CheckpointSubcommand::Reject {
            task,
            checkpoint,
            feedback,
            remove_tables,
            add_tables,
            corrections_file,
        } => {
            let feedback = build_feedback(
                &feedback,
                &remove_tables,
                &add_tables,
                corrections_file.as_deref(),
            )?;
            reject(root, &task, &checkpoint, feedback, json)
        }
        CheckpointSubcommand::Mode { task, signal } => mode(root, &task, &signal, json),
    }
}

fn show(root: &Path, key: &str, raw: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (_config, task) = load_task(root, key)?;

    let id = match raw {
        Some(raw) => Some(raw.parse::<CheckpointId>()?),
        None => task.phase().checkpoint().filter(|id| task.checkpoint(*id).summary.is_some()),
    };

    match id {
        Some(id) => {
            let cp = task.checkpoint(id);
            if json {
                return print_json(cp);
            }
            println!("CP{id} {} [{}]", id.title(), cp.status);
            match &cp.summary {
                Some(summary) => {
                    println!();
                    print_section(&summary.title, &summary.body);
                }
                None => println!("Not presented yet."),
            }
            if let Some(fb) = &cp.last_feedback {
                println!("\nLast feedback: {}", fb.describe());
            }
        }
        None => {
            if json {
                return print_json(&task.checkpoints);
            }
            print_statuses(&task);
        }
    }
    Ok(())
}

fn print_statuses(task: &Task) {
    let rows: Vec<Vec<String>> = task
        .checkpoints
        .iter()
        .map(|cp| {
            let mode = task.context.mode(cp.id);
            vec![
                format!("CP{}", cp.id),
                cp.id.title().to_string(),
                mode.to_string(),
                cp.status.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TITLE", "MODE", "STATUS"], rows);
}

fn pending(root: &Path, key: &str, raw: &str, json: bool) -> anyhow::Result<()> {
    let id: CheckpointId = raw.parse()?;
    let (config, mut task) = load_task(root, key)?;

    let report = task
        .resolve_checkpoint(id, None, &config)
        .with_context(|| format!("cannot resolve checkpoint {id} of '{}'", task.folder))?;
    task.save(root).context("failed to save task")?;

    print_report(&task.folder, &report, json)
}

fn approve(
    root: &Path,
    key: &str,
    raw: &str,
    by: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let id: CheckpointId = raw.parse()?;
    let (config, mut task) = load_task(root, key)?;

    let report = task
        .resolve_checkpoint(id, Some(CheckpointResponse::Approve { by }), &config)
        .with_context(|| format!("cannot approve checkpoint {id} of '{}'", task.folder))?;
    task.save(root).context("failed to save task")?;

    print_report(&task.folder, &report, json)
}

fn reject(
    root: &Path,
    key: &str,
    raw: &str,
    feedback: Feedback,
    json: bool,
) -> anyhow::Result<()> {
    let id: CheckpointId = raw.parse()?;
    let (config, mut task) = load_task(root, key)?;

    let report = task
        .resolve_checkpoint(id, Some(CheckpointResponse::reject(feedback)), &config)
        .with_context(|| format!("cannot reject checkpoint {id} of '{}'", task.folder))?;
    task.save(root).context("failed to save task")?;

    print_report(&task.folder, &report, json)
}

fn mode(root: &Path, key: &str, raw: &str, json: bool) -> anyhow::Result<()> {
    let signal: SkipSignal = raw.parse()?;
    let (config, mut task) = load_task(root, key)?;

    let report = task
        .apply_skip_signal(signal, &config)
        .with_context(|| format!("cannot apply '{signal}' to '{}'", task.folder))?;
    task.save(root).context("failed to save task")?;

    if json {
        return print_json(&report);
    }

    if report.changed.is_empty() {
        println!("{}: no checkpoint modes changed", task.folder);
    } else {
        let ids: Vec<String> = report.changed.iter().map(|id| format!("CP{id}")).collect();
        println!("{}: {} changed {}", task.folder, report.signal, ids.join(", "));
    }
    if let Some(released) = &report.released {
        println!("  {}", describe_outcome(&released.outcome));
    }
    Ok(())
}

fn build_feedback(
    note: &str,
    remove_tables: &[String],
    add_tables: &[String],
    corrections_file: Option<&Path>,
) -> anyhow::Result<Feedback> {
    let mut feedback = Feedback::note(note.trim());
    for table in remove_tables {
        feedback = feedback.with(Correction::RemoveTable {
            table: table.clone(),
        });
    }
    for table in add_tables {
        feedback = feedback.with(Correction::AddTable(SelectedTable::parse(table)));
    }
    if let Some(path) = corrections_file {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let corrections: Vec<Correction> = serde_yaml::from_str(&data)
            .with_context(|| format!("invalid corrections in {}", path.display()))?;
        for correction in corrections {
            feedback = feedback.with(correction);
        }
    }
    if feedback.is_empty() {
        anyhow::bail!("a rejection needs --feedback or at least one correction");
    }
    Ok(feedback)
}

fn print_report(folder: &str, report: &CheckpointReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }

    let verdict = match &report.resolution {
        Resolution::Pending => "still pending".to_string(),
        Resolution::Approved { auto: true } => "auto-approved".to_string(),
        Resolution::Approved { auto: false } => "approved".to_string(),
        Resolution::Rejected { feedback, .. } => format!("rejected ({})", feedback.describe()),
    };
    println!(
        "{folder}: CP{} {verdict}; {}",
        report.checkpoint,
        describe_outcome(&report.outcome)
    );
    Ok(())
}
