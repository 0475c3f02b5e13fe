use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use dwh_core::{config::Config, query, task::Task};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum QuerySubcommand {
    /// Run the read-only and PII guards without touching the database
    Check {
        /// Check the task's current query (optimized if present)
        task: Option<String>,
        /// Check the SQL in this file instead
        #[arg(long, conflicts_with = "task")]
        file: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: QuerySubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        QuerySubcommand::Check { task, file } => check(root, task.as_deref(), file.as_deref(), json),
    }
}

fn check(root: &Path, task: Option<&str>, file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    let (label, sql) = match (task, file) {
        (_, Some(path)) => {
            let sql = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            (path.display().to_string(), sql)
        }
        (Some(key), None) => {
            let task =
                Task::load(root, key).with_context(|| format!("task '{key}' not found"))?;
            let sql = task
                .context
                .final_query()
                .map(str::to_string)
                .with_context(|| format!("task '{}' has no query yet", task.folder))?;
            (task.folder, sql)
        }
        (None, None) => anyhow::bail!("pass a task or --file"),
    };

    let read_only = query::ensure_read_only(&sql);
    let pii = config.pii.violations(&sql);

    if json {
        print_json(&serde_json::json!({
            "source": label,
            "read_only": read_only.as_ref().err().map(|e| e.to_string()),
            "pii_violations": pii,
            "ok": read_only.is_ok() && pii.is_empty(),
        }))?;
    } else {
        match &read_only {
            Ok(()) => println!("read-only: ok"),
            Err(e) => println!("read-only: {e}"),
        }
        if pii.is_empty() {
            println!("pii:       ok");
        } else {
            println!("pii:       {} selected without aggregation", pii.join(", "));
        }
    }

    read_only.with_context(|| format!("query in {label} is not safe to run"))?;
    config
        .pii
        .check(&sql)
        .with_context(|| format!("query in {label} is not safe to run"))?;
    Ok(())
}
