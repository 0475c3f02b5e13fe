//! Capabilities the orchestrator consumes but does not implement.
//!
//! Database access, metadata search and document storage live behind these
//! traits. The only implementation shipped here is [`FsDocumentStore`];
//! catalog and query backends are provided by the surrounding tooling.

use crate::config::QueryConfig;
use crate::context::TestReport;
use crate::error::{DwhError, Result};
use crate::pii::PiiPolicy;
use crate::query::{self, QueryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub calculation_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dwh_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMatch {
    pub doc_type: String,
    pub source_name: String,
    #[serde(rename = "match")]
    pub excerpt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIn {
    #[default]
    Name,
    Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMatch {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub comment: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(default)]
    pub partitions: Vec<String>,
    #[serde(default)]
    pub stats: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_table: String,
    pub to_table: String,
    pub condition: String,
}

/// Metadata search over glossary, documents and schema.
pub trait Catalog: Send + Sync {
    fn search_glossary(&self, keyword: &str) -> Result<Vec<GlossaryEntry>>;

    fn search_documents(&self, keyword: &str) -> Result<Vec<DocumentMatch>>;

    fn search_schema(
        &self,
        keyword: &str,
        search_in: SearchIn,
        schema: Option<&str>,
    ) -> Result<Vec<SchemaMatch>>;

    fn inspect_table(&self, schema: &str, table: &str) -> Result<TableInfo>;

    /// Sample rows, or per-column profiling stats when `profile` is set.
    fn sample_data(
        &self,
        schema: &str,
        table: &str,
        rows: u32,
        profile: bool,
    ) -> Result<QueryResult>;

    fn find_relationships(&self, schema: &str, tables: &[String]) -> Result<Vec<Relationship>>;
}

// ---------------------------------------------------------------------------
// QueryRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutput {
    Rows(QueryResult),
    CountOnly { count: u64 },
}

impl QueryOutput {
    pub fn row_count(&self) -> u64 {
        match self {
            QueryOutput::Rows(r) => r.row_count as u64,
            QueryOutput::CountOnly { count } => *count,
        }
    }
}

/// Raw database access. Implementations enforce `limit` and `timeout_seconds`
/// on their side; callers go through [`SafeExecutor`].
pub trait QueryRunner: Send + Sync {
    fn explain_plan(&self, sql: &str) -> Result<String>;

    fn run_query_safe(
        &self,
        sql: &str,
        limit: u32,
        timeout_seconds: u32,
        count_only: bool,
    ) -> Result<QueryOutput>;
}

// ---------------------------------------------------------------------------
// SafeExecutor
// ---------------------------------------------------------------------------

/// Guards a [`QueryRunner`]: read-only check, then PII check, then limits.
/// Nothing reaches the runner unless both checks pass.
pub struct SafeExecutor<'a> {
    runner: &'a dyn QueryRunner,
    policy: &'a PiiPolicy,
    limits: QueryConfig,
}

impl<'a> SafeExecutor<'a> {
    pub fn new(runner: &'a dyn QueryRunner, policy: &'a PiiPolicy, limits: QueryConfig) -> Self {
        Self {
            runner,
            policy,
            limits,
        }
    }

    pub fn guard(&self, sql: &str) -> Result<()> {
        query::ensure_read_only(sql)?;
        self.policy.check(sql)
    }

    pub fn explain(&self, sql: &str) -> Result<String> {
        self.guard(sql)?;
        self.runner.explain_plan(sql)
    }

    pub fn sample(&self, sql: &str) -> Result<QueryResult> {
        self.guard(sql)?;
        let limit = self.limits.row_limit;
        match self
            .runner
            .run_query_safe(sql, limit, self.limits.timeout_seconds, false)?
        {
            QueryOutput::Rows(result) => Ok(result.limited(limit)),
            QueryOutput::CountOnly { .. } => Err(DwhError::upstream(
                "query runner",
                "returned a count where rows were requested",
            )),
        }
    }

    pub fn count(&self, sql: &str) -> Result<u64> {
        self.guard(sql)?;
        let out = self.runner.run_query_safe(
            sql,
            self.limits.row_limit,
            self.limits.timeout_seconds,
            true,
        )?;
        Ok(out.row_count())
    }

    /// Phase 5: explain the query, then run a bounded sample.
    ///
    /// Guard and runner failures become a failed report rather than an
    /// error, so the task can loop back to query design.
    pub fn test_query(&self, sql: &str) -> TestReport {
        let mut report = TestReport::default();
        match self.explain(sql) {
            Ok(plan) => {
                report.explain_ok = true;
                tracing::debug!(plan_len = plan.len(), "explain plan ok");
            }
            Err(e) => {
                report.notes.push(format!("explain failed: {e}"));
                return report;
            }
        }
        match self.sample(sql) {
            Ok(result) => {
                report.sample_row_count = result.row_count as u64;
                report.passed = true;
                if result.truncated {
                    report.notes.push(format!(
                        "sample truncated at {} rows",
                        self.limits.row_limit
                    ));
                }
            }
            Err(e) => report.notes.push(format!("sample run failed: {e}")),
        }
        report
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

pub trait DocumentStore: Send + Sync {
    fn write_document(&self, path: &str, content: &str) -> Result<()>;

    /// `DocumentNotFound` when nothing is stored at `path`.
    fn read_document(&self, path: &str) -> Result<String>;
}

/// Documents as plain files under a root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(DwhError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("document path must be relative to the store: {path}"),
            )));
        }
        Ok(self.root.join(rel))
    }
}

impl DocumentStore for FsDocumentStore {
    fn write_document(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        crate::io::atomic_write(&full, content.as_bytes())?;
        tracing::debug!(path, "document written");
        Ok(())
    }

    fn read_document(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        crate::io::read_optional(&full)?.ok_or_else(|| DwhError::DocumentNotFound(path.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
