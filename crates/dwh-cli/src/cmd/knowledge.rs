use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use dwh_core::{
    collaborator::{FsDocumentStore, Relationship, TableInfo},
    config::Config,
    knowledge,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum KnowledgeSubcommand {
    /// Write a single-table note from an inspect_table result (YAML/JSON)
    Table {
        #[arg(long)]
        file: PathBuf,
    },
    /// Write a multi-table note from a list of relationships (YAML/JSON)
    Relationships {
        /// Tables covered by the note, in order
        #[arg(long, value_delimiter = ',', required = true)]
        tables: Vec<String>,
        #[arg(long)]
        file: PathBuf,
    },
}

pub fn run(root: &Path, subcmd: KnowledgeSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let store = FsDocumentStore::new(root);
    let source_db = &config.project.source_db;

    let path = match subcmd {
        KnowledgeSubcommand::Table { file } => {
            let info: TableInfo = read_file(&file)?;
            knowledge::write_table_note(&store, source_db, &info)
                .with_context(|| format!("failed to write note for {}.{}", info.schema, info.table))?
        }
        KnowledgeSubcommand::Relationships { tables, file } => {
            let relationships: Vec<Relationship> = read_file(&file)?;
            knowledge::write_relationship_note(&store, source_db, &tables, &relationships)
                .context("failed to write relationship note")?
        }
    };

    if json {
        print_json(&serde_json::json!({ "path": path }))?;
    } else {
        println!("wrote: {path}");
    }
    Ok(())
}

fn read_file<T: DeserializeOwned>(file: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_yaml::from_str(&data).with_context(|| format!("invalid content in {}", file.display()))
}
