use anyhow::Context;
use dwh_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    println!("Initializing dwh workflow in: {}", root.display());

    // 1. State directories
    let dirs = [paths::DWH_DIR, paths::TASKS_DIR];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    // 2. config.yaml, never overwritten
    let config_path = paths::config_path(root);
    if !config_path.exists() {
        let cfg = Config::new(&project_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    // 3. Document folders the workflow writes into
    let doc_dirs = [
        paths::AGENT_QUERIES_DIR,
        paths::KNOWLEDGE_SINGLE_DIR,
        paths::KNOWLEDGE_MULTI_DIR,
    ];
    for dir in doc_dirs {
        let p = root.join(dir);
        if p.is_dir() {
            println!("  exists:  {dir}/");
        } else {
            io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
            println!("  created: {dir}/");
        }
    }

    println!("\nNext: dwh task create <name>");
    Ok(())
}
