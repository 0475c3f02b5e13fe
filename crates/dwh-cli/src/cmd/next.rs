use crate::output::print_json;
use anyhow::Context;
use dwh_core::{
    classifier::classify, config::Config, directive::build_directive, task::Task,
};
use std::path::Path;

pub fn run(
    root: &Path,
    task_key: Option<&str>,
    directive: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    match task_key {
        Some(key) => {
            let task = Task::load(root, key).with_context(|| format!("task '{key}' not found"))?;
            let classification = classify(&task, &config);

            if json {
                let mut value = serde_json::to_value(&classification)?;
                if directive {
                    value["directive"] = build_directive(&classification, &task).into();
                }
                print_json(&value)?;
            } else if directive {
                print!("{}", build_directive(&classification, &task));
            } else {
                println!("Task:     {}", classification.folder);
                println!(
                    "Phase:    {} ({}/7)",
                    classification.current_phase,
                    classification.current_phase.number()
                );
                println!("Action:   {}", classification.action);
                println!("Message:  {}", classification.message);
                if !classification.next_command.is_empty() {
                    println!("Command:  {}", classification.next_command);
                }
                if let Some(ref path) = classification.output_path {
                    println!("Output:   {path}");
                }
            }
        }
        None => {
            let tasks = Task::list(root).context("failed to list tasks")?;
            let open: Vec<&Task> = tasks.iter().filter(|t| !t.is_complete()).collect();

            if open.is_empty() {
                println!("No open tasks. Run: dwh task create <name>");
                return Ok(());
            }

            let classifications: Vec<_> = open.iter().map(|t| classify(t, &config)).collect();
            if json {
                print_json(&classifications)?;
            } else {
                for c in &classifications {
                    println!("{}: {} ({})", c.folder, c.action, c.message);
                }
            }
        }
    }

    Ok(())
}
