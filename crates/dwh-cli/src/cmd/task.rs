use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Subcommand;
use dwh_core::{config::Config, task::Task, types::CheckpointId};
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Create a task; its folder is <date>_<name>
    Create {
        name: String,
        /// Task date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Seed the business question
        #[arg(long)]
        question: Option<String>,
    },
    /// List every task
    List,
    /// Show a task's phase, checkpoints and accumulated context
    Show { task: String },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TaskSubcommand::Create {
            name,
            date,
            question,
        } => create(root, &name, date.as_deref(), question.as_deref(), json),
        TaskSubcommand::List => list(root, json),
        TaskSubcommand::Show { task } => show(root, &task, json),
    }
}

fn parse_date(raw: Option<&str>) -> anyhow::Result<NaiveDate> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn create(
    root: &Path,
    name: &str,
    date: Option<&str>,
    question: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let date = parse_date(date)?;
    let mut task = Task::create(root, name, date, &config)
        .with_context(|| format!("failed to create task '{name}'"))?;
    if let Some(q) = question.map(str::trim).filter(|q| !q.is_empty()) {
        task.context.business_question = q.to_string();
        task.save(root).context("failed to save task")?;
    }

    if json {
        print_json(&serde_json::json!({
            "task": task.name,
            "folder": task.folder,
            "phase": task.phase(),
            "status": task.status,
        }))?;
    } else {
        println!("Created task: {}", task.folder);
        println!("Phase:        {}", task.phase().title());
        println!("Next:         dwh next --for {}", task.folder);
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let tasks = Task::list(root).context("failed to list tasks")?;

    if json {
        let items: Vec<_> = tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "task": t.name,
                    "folder": t.folder,
                    "phase": t.phase(),
                    "status": t.status,
                })
            })
            .collect();
        print_json(&items)?;
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks. Run: dwh task create <name>");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                t.folder.clone(),
                format!("{}/7 {}", t.phase().number(), t.phase()),
                t.status.to_string(),
            ]
        })
        .collect();
    print_table(&["FOLDER", "PHASE", "STATUS"], rows);
    Ok(())
}

fn show(root: &Path, key: &str, json: bool) -> anyhow::Result<()> {
    let task = Task::load(root, key).with_context(|| format!("task '{key}' not found"))?;

    if json {
        print_json(&task)?;
        return Ok(());
    }

    let ctx = &task.context;
    println!("Task:     {}", task.name);
    println!("Folder:   {}", task.folder);
    println!(
        "Phase:    {} ({}/7)",
        task.phase().title(),
        task.phase().number()
    );
    println!("Status:   {}", task.status);
    if !ctx.business_question.is_empty() {
        println!("Question: {}", ctx.business_question);
    }
    if !ctx.selected_tables.is_empty() {
        let names: Vec<String> = ctx.selected_tables.iter().map(|t| t.qualified_name()).collect();
        println!("Tables:   {}", names.join(", "));
    }
    if let Some(report) = &ctx.test_report {
        let verdict = if report.passed { "passed" } else { "failed" };
        println!(
            "Test:     {verdict} ({} sample rows)",
            report.sample_row_count
        );
    }
    if ctx.query_locked {
        println!("Query:    locked");
    }

    println!("\nCheckpoints:");
    let rows: Vec<Vec<String>> = CheckpointId::all()
        .map(|id| {
            let cp = task.checkpoint(id);
            let mode = ctx.mode(id);
            vec![
                format!("CP{id}"),
                id.title().to_string(),
                mode.to_string(),
                cp.status.to_string(),
                cp.rejections.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TITLE", "MODE", "STATUS", "REJECTIONS"], rows);

    if !task.documents.is_empty() {
        println!("\nDocuments:");
        for doc in &task.documents {
            println!("  {doc}");
        }
    }
    Ok(())
}
