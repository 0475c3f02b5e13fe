pub mod checkpoint;
pub mod config;
pub mod init;
pub mod knowledge;
pub mod next;
pub mod phase;
pub mod query;
pub mod task;

use anyhow::Context;
use dwh_core::{config::Config, task::Outcome, task::Task};
use std::path::Path;

/// Load the config and a task together; every task-scoped command needs both.
pub(crate) fn load_task(root: &Path, key: &str) -> anyhow::Result<(Config, Task)> {
    let config = Config::load(root).context("failed to load config")?;
    let task = Task::load(root, key).with_context(|| format!("task '{key}' not found"))?;
    Ok((config, task))
}

pub(crate) fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::AwaitingCheckpoint { checkpoint } => {
            format!("waiting for checkpoint {checkpoint} ({})", checkpoint.title())
        }
        Outcome::Advanced { to, auto_approved } => {
            if *auto_approved {
                format!("checkpoint skipped; advanced to {to}")
            } else {
                format!("advanced to {to}")
            }
        }
        Outcome::Revising { phase, escalated } => {
            if *escalated {
                format!("revising {phase} (rejection limit reached; escalate to the user)")
            } else {
                format!("revising {phase}")
            }
        }
        Outcome::LoopedBack { to, reason } => format!("back to {to}: {reason}"),
        Outcome::Complete => "task complete".to_string(),
        Outcome::Unchanged { phase } => format!("no change; still in {phase}"),
    }
}
