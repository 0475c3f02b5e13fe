use crate::error::{DwhError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DWH_DIR: &str = ".dwh";
pub const TASKS_DIR: &str = ".dwh/tasks";
pub const CONFIG_FILE: &str = ".dwh/config.yaml";
pub const MANIFEST_FILE: &str = "manifest.yaml";

pub const AGENT_QUERIES_DIR: &str = "queries/agent-written";
pub const KNOWLEDGE_SINGLE_DIR: &str = "knowledge/single-table";
pub const KNOWLEDGE_MULTI_DIR: &str = "knowledge/multiple-tables";

// ---------------------------------------------------------------------------
// Workspace paths
// ---------------------------------------------------------------------------

pub fn dwh_dir(root: &Path) -> PathBuf {
    root.join(DWH_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn task_state_dir(root: &Path, folder: &str) -> PathBuf {
    root.join(TASKS_DIR).join(folder)
}

pub fn task_manifest(root: &Path, folder: &str) -> PathBuf {
    task_state_dir(root, folder).join(MANIFEST_FILE)
}

// ---------------------------------------------------------------------------
// Document naming contract
//
// These are relative to the document store root and must stay bit-exact;
// downstream tooling reads them by name.
// ---------------------------------------------------------------------------

/// `{YYYY-MM-DD}_{task-name}`
pub fn task_folder(date: NaiveDate, task_name: &str) -> String {
    format!("{}_{}", date.format("%Y-%m-%d"), task_name)
}

pub fn brief_path(folder: &str) -> String {
    format!("{folder}/{folder}-brief.md")
}

pub fn data_mapping_path(folder: &str) -> String {
    format!("{folder}/{folder}-data-mapping.md")
}

pub fn query_path(folder: &str) -> String {
    format!("{folder}/{folder}_query.sql")
}

pub fn agent_query_copy_path(folder: &str) -> String {
    format!("{AGENT_QUERIES_DIR}/{folder}.sql")
}

pub fn knowledge_single_path(source_db: &str, schema: &str, table: &str) -> String {
    format!("{KNOWLEDGE_SINGLE_DIR}/{source_db}_{schema}_{table}.md")
}

pub fn knowledge_multi_path(source_db: &str, tables: &[&str]) -> String {
    format!("{KNOWLEDGE_MULTI_DIR}/{source_db}_{}.md", tables.join("_"))
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(DwhError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// A task is addressed by its bare name or by its `{YYYY-MM-DD}_{name}`
/// folder. Anything else never reaches a filesystem join.
pub fn validate_task_key(key: &str) -> Result<()> {
    if validate_slug(key).is_ok() {
        return Ok(());
    }
    let valid_folder = key.split_once('_').is_some_and(|(date, name)| {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() && validate_slug(name).is_ok()
    });
    if valid_folder {
        Ok(())
    } else {
        Err(DwhError::InvalidSlug(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
