//! One analysis task and the 7-phase state machine that drives it.
//!
//! A [`Task`] owns its [`TaskContext`], the four checkpoint records and a
//! phase history. Every mutating operation works on a copy and commits only
//! when the whole step succeeded, so a failed document write or a bad
//! correction never leaves the manifest half-updated.

use crate::checkpoint::{self, Checkpoint, CheckpointResponse, CheckpointSummary, Resolution, SkipSignal};
use crate::collaborator::{DocumentStore, SafeExecutor};
use crate::config::Config;
use crate::context::{Feedback, PhaseOutput, TaskContext, TestReport};
use crate::error::{DwhError, Result};
use crate::paths;
use crate::query;
use crate::render;
use crate::types::{CheckpointId, CheckpointMode, CheckpointStatus, Phase, PhaseStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// PhaseTransition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub phase: Phase,
    pub entered: DateTime<Utc>,
    pub exited: Option<DateTime<Utc>>,
    /// Why the phase was entered again, for re-entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Where the task stands after an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    AwaitingCheckpoint { checkpoint: CheckpointId },
    Advanced { to: Phase, auto_approved: bool },
    Revising { phase: Phase, escalated: bool },
    LoopedBack { to: Phase, reason: String },
    Complete,
    Unchanged { phase: Phase },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub completed: Phase,
    pub outcome: Outcome,
    /// Checkpoint summary, present whether the checkpoint is active or skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<CheckpointSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointReport {
    pub checkpoint: CheckpointId,
    pub resolution: Resolution,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipReport {
    pub signal: String,
    pub changed: Vec<CheckpointId>,
    /// Set when the signal released the checkpoint the task was waiting on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<CheckpointReport>,
}

/// Read-only and PII checks every query must pass before it is tested or
/// delivered.
fn guard_query(sql: &str, cfg: &Config) -> Result<()> {
    query::ensure_read_only(sql)?;
    cfg.pii.check(sql)
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub date: NaiveDate,
    pub folder: String,
    pub status: PhaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub context: TaskContext,
    pub checkpoints: Vec<Checkpoint>,
    pub phase_history: Vec<PhaseTransition>,
    /// Store paths written for this task, in write order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, date: NaiveDate, default_mode: CheckpointMode) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            folder: paths::task_folder(date, &name),
            name,
            date,
            status: PhaseStatus::InProgress,
            created_at: now,
            updated_at: now,
            context: TaskContext::new(default_mode),
            checkpoints: CheckpointId::all().map(Checkpoint::new).collect(),
            phase_history: vec![PhaseTransition {
                phase: Phase::Requirements,
                entered: now,
                exited: None,
                reason: None,
            }],
            documents: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.context.phase
    }

    pub fn is_complete(&self) -> bool {
        self.status == PhaseStatus::Complete
    }

    pub fn checkpoint(&self, id: CheckpointId) -> &Checkpoint {
        // checkpoints always holds ids 1..=4 in order
        &self.checkpoints[usize::from(id.get()) - 1]
    }

    fn checkpoint_mut(&mut self, id: CheckpointId) -> &mut Checkpoint {
        &mut self.checkpoints[usize::from(id.get()) - 1]
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn create(root: &Path, name: impl Into<String>, date: NaiveDate, cfg: &Config) -> Result<Self> {
        let name = name.into();
        paths::validate_slug(&name)?;

        let folder = paths::task_folder(date, &name);
        if paths::task_state_dir(root, &folder).exists() {
            return Err(DwhError::TaskExists(folder));
        }

        let task = Self::new(name, date, cfg.checkpoints.default_mode);
        task.save(root)?;
        tracing::info!(task = %task.folder, "task created");
        Ok(task)
    }

    /// Load by folder (`2025-02-22_monthly-revenue`) or by bare task name.
    /// A bare name shared by several dates resolves to the most recent one.
    pub fn load(root: &Path, key: &str) -> Result<Self> {
        paths::validate_task_key(key)?;
        let manifest = paths::task_manifest(root, key);
        if manifest.exists() {
            let data = std::fs::read_to_string(&manifest)?;
            let task: Task = serde_yaml::from_str(&data)?;
            return Ok(task);
        }
        Self::list(root)?
            .into_iter()
            .filter(|t| t.name == key)
            .max_by_key(|t| (t.date, t.created_at))
            .ok_or_else(|| DwhError::TaskNotFound(key.to_string()))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let manifest = paths::task_manifest(root, &self.folder);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&manifest, data.as_bytes())
    }

    pub fn list(root: &Path) -> Result<Vec<Self>> {
        let tasks_dir = root.join(paths::TASKS_DIR);
        if !tasks_dir.exists() {
            return Ok(Vec::new());
        }

        let mut tasks = Vec::new();
        for entry in std::fs::read_dir(&tasks_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let manifest = entry.path().join(paths::MANIFEST_FILE);
            if !manifest.exists() {
                continue;
            }
            let data = std::fs::read_to_string(&manifest)?;
            tasks.push(serde_yaml::from_str::<Task>(&data)?);
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    // -----------------------------------------------------------------------
    // Phase sequencing
    // -----------------------------------------------------------------------

    /// The artifact `phase` must have produced before the task may leave it.
    pub fn missing_artifact(&self, phase: Phase) -> Option<&'static str> {
        let ctx = &self.context;
        match phase {
            Phase::Requirements if ctx.business_question.trim().is_empty() => {
                Some("business_question")
            }
            Phase::Discovery if ctx.selected_tables.is_empty() => Some("selected_tables"),
            Phase::Mapping if ctx.column_mapping.is_empty() => Some("column_mapping"),
            Phase::QueryDesign if ctx.query_text.is_none() => Some("query_text"),
            Phase::Testing if !ctx.test_report.as_ref().is_some_and(|r| r.passed) => {
                Some("test_report")
            }
            _ => None,
        }
    }

    pub fn can_advance_to(&self, target: Phase) -> Result<()> {
        let current = self.phase();
        if current.next() != Some(target) {
            return Err(DwhError::OutOfOrder {
                current: current.to_string(),
                target: target.to_string(),
            });
        }
        if self.is_complete() {
            return Err(DwhError::TaskComplete(self.folder.clone()));
        }
        if let Some(artifact) = self.missing_artifact(current) {
            return Err(DwhError::MissingArtifact {
                artifact: artifact.to_string(),
                phase: current.to_string(),
            });
        }
        if let Some(id) = current.checkpoint() {
            let cp = self.checkpoint(id);
            if cp.is_cleared() || self.context.mode(id) == CheckpointMode::Skipped {
                return Ok(());
            }
            if cp.status == CheckpointStatus::Rejected {
                return Err(DwhError::UserRejection {
                    checkpoint: id.get(),
                    feedback: cp
                        .last_feedback
                        .as_ref()
                        .map(Feedback::describe)
                        .unwrap_or_default(),
                });
            }
            return Err(DwhError::CheckpointPending(id.get()));
        }
        Ok(())
    }

    /// Move to `target`, which must be the next phase with every
    /// prerequisite met.
    pub fn advance(&mut self, target: Phase) -> Result<()> {
        self.can_advance_to(target)?;
        self.enter(target, None);
        Ok(())
    }

    fn enter(&mut self, phase: Phase, reason: Option<String>) {
        let now = Utc::now();
        if let Some(last) = self.phase_history.last_mut() {
            last.exited = Some(now);
        }
        tracing::info!(
            task = %self.folder,
            from = %self.context.phase,
            to = %phase,
            reason = reason.as_deref().unwrap_or(""),
            "phase transition"
        );
        self.context.phase = phase;
        self.status = PhaseStatus::InProgress;
        self.updated_at = now;
        self.phase_history.push(PhaseTransition {
            phase,
            entered: now,
            exited: None,
            reason,
        });
    }

    /// Merge the output of the current phase and move the task on: to its
    /// checkpoint, to the next phase, back to query design after a failed
    /// test, or to completion after documentation.
    pub fn complete_phase(
        &mut self,
        output: PhaseOutput,
        cfg: &Config,
        store: &dyn DocumentStore,
    ) -> Result<PhaseReport> {
        let mut next = self.clone();
        let report = next.complete_phase_inner(output, cfg, store)?;
        *self = next;
        Ok(report)
    }

    fn complete_phase_inner(
        &mut self,
        output: PhaseOutput,
        cfg: &Config,
        store: &dyn DocumentStore,
    ) -> Result<PhaseReport> {
        if self.is_complete() {
            return Err(DwhError::TaskComplete(self.folder.clone()));
        }
        let phase = self.phase();
        if output.phase() != phase {
            return Err(DwhError::OutOfOrder {
                current: phase.to_string(),
                target: output.phase().to_string(),
            });
        }

        if let PhaseOutput::Optimization {
            optimized_query: Some(sql),
            ..
        } = &output
        {
            if !sql.trim().is_empty() {
                guard_query(sql, cfg)?;
            }
        }

        self.context.merge_output(&output)?;
        tracing::debug!(task = %self.folder, phase = %phase, "phase output merged");
        if phase == Phase::QueryDesign {
            self.context.query_locked = true;
        }
        self.updated_at = Utc::now();

        if phase == Phase::Testing {
            // A self-reported pass still has to clear the guards.
            let claims_pass = self.context.test_report.as_ref().is_some_and(|r| r.passed);
            let rejected = self
                .context
                .query_text
                .as_deref()
                .filter(|_| claims_pass)
                .and_then(|sql| guard_query(sql, cfg).err());
            if let (Some(err), Some(report)) = (rejected, self.context.test_report.as_mut()) {
                report.passed = false;
                report.notes.push(format!("guard rejected query: {err}"));
            }
            if let Some(reason) = self.failed_test_reason() {
                let outcome = self.loop_back_to_query_design(reason);
                return Ok(PhaseReport {
                    completed: phase,
                    outcome,
                    summary: None,
                    documents: Vec::new(),
                });
            }
        }

        if let Some(artifact) = self.missing_artifact(phase) {
            return Err(DwhError::MissingArtifact {
                artifact: artifact.to_string(),
                phase: phase.to_string(),
            });
        }

        let documents = if phase.writes_documents() {
            self.write_documents(phase, store)?
        } else {
            Vec::new()
        };

        if let Some(id) = phase.checkpoint() {
            let summary = render::checkpoint_summary(id, &self.context);
            self.checkpoint_mut(id).present(summary.clone());
            self.status = PhaseStatus::AwaitingCheckpoint;

            let outcome = if self.context.mode(id) == CheckpointMode::Skipped {
                self.resolve_inner(id, None, cfg)?.outcome
            } else {
                tracing::info!(task = %self.folder, checkpoint = id.get(), "awaiting checkpoint");
                Outcome::AwaitingCheckpoint { checkpoint: id }
            };
            return Ok(PhaseReport {
                completed: phase,
                outcome,
                summary: Some(summary),
                documents,
            });
        }

        let outcome = match phase.next() {
            Some(to) => {
                self.advance(to)?;
                Outcome::Advanced {
                    to,
                    auto_approved: false,
                }
            }
            None => {
                let now = Utc::now();
                if let Some(last) = self.phase_history.last_mut() {
                    last.exited = Some(now);
                }
                self.status = PhaseStatus::Complete;
                self.updated_at = now;
                tracing::info!(task = %self.folder, "task complete");
                Outcome::Complete
            }
        };
        Ok(PhaseReport {
            completed: phase,
            outcome,
            summary: None,
            documents,
        })
    }

    fn failed_test_reason(&self) -> Option<String> {
        match &self.context.test_report {
            Some(report) if report.passed => None,
            Some(report) if !report.notes.is_empty() => Some(report.notes.join("; ")),
            Some(report) if !report.explain_ok => Some("explain plan failed".to_string()),
            _ => Some("test did not pass".to_string()),
        }
    }

    /// Phase 5 helper: run the guarded test through `executor` and complete
    /// the phase with the resulting report.
    pub fn run_testing(
        &mut self,
        executor: &SafeExecutor<'_>,
        cfg: &Config,
        store: &dyn DocumentStore,
    ) -> Result<PhaseReport> {
        if self.phase() != Phase::Testing {
            return Err(DwhError::OutOfOrder {
                current: self.phase().to_string(),
                target: Phase::Testing.to_string(),
            });
        }
        let sql = self
            .context
            .query_text
            .clone()
            .ok_or_else(|| DwhError::MissingArtifact {
                artifact: "query_text".to_string(),
                phase: Phase::QueryDesign.to_string(),
            })?;
        let report = executor.test_query(&sql);
        self.complete_phase(PhaseOutput::Testing(report), cfg, store)
    }

    /// Record a Phase 5 failure reported from outside (e.g. the database was
    /// unreachable) and return to query design.
    pub fn fail_testing(&mut self, reason: impl Into<String>) -> Result<PhaseReport> {
        if self.phase() != Phase::Testing {
            return Err(DwhError::OutOfOrder {
                current: self.phase().to_string(),
                target: Phase::Testing.to_string(),
            });
        }
        let reason = reason.into();
        self.context.test_report = Some(TestReport {
            explain_ok: false,
            sample_row_count: 0,
            passed: false,
            notes: vec![reason.clone()],
        });
        let outcome = self.loop_back_to_query_design(reason);
        Ok(PhaseReport {
            completed: Phase::Testing,
            outcome,
            summary: None,
            documents: Vec::new(),
        })
    }

    fn loop_back_to_query_design(&mut self, reason: String) -> Outcome {
        tracing::warn!(task = %self.folder, reason = %reason, "testing failed; back to query design");
        self.context.query_locked = false;
        if let Some(id) = Phase::QueryDesign.checkpoint() {
            self.checkpoint_mut(id).reopen();
        }
        self.enter(
            Phase::QueryDesign,
            Some(format!("testing failed: {reason}")),
        );
        Outcome::LoopedBack {
            to: Phase::QueryDesign,
            reason,
        }
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Resolve checkpoint `id` with an optional response. No response on an
    /// active checkpoint leaves the task untouched and reports it pending.
    pub fn resolve_checkpoint(
        &mut self,
        id: CheckpointId,
        response: Option<CheckpointResponse>,
        cfg: &Config,
    ) -> Result<CheckpointReport> {
        let mut next = self.clone();
        let report = next.resolve_inner(id, response, cfg)?;
        *self = next;
        Ok(report)
    }

    fn resolve_inner(
        &mut self,
        id: CheckpointId,
        response: Option<CheckpointResponse>,
        cfg: &Config,
    ) -> Result<CheckpointReport> {
        let mode = self.context.mode(id);
        let policy = cfg.checkpoints.rejection_policy();
        let already_cleared = self.checkpoint(id).is_cleared();
        let resolution = checkpoint::resolve(self.checkpoint_mut(id), mode, response, &policy)?;

        let outcome = match &resolution {
            Resolution::Pending => Outcome::AwaitingCheckpoint { checkpoint: id },
            Resolution::Approved { .. } if already_cleared => Outcome::Unchanged {
                phase: self.phase(),
            },
            Resolution::Approved { auto } => {
                let to = id.phase().next().ok_or_else(|| {
                    DwhError::InvalidCheckpoint(id.to_string())
                })?;
                self.advance(to)?;
                Outcome::Advanced {
                    to,
                    auto_approved: *auto,
                }
            }
            Resolution::Rejected {
                feedback,
                escalated,
            } => {
                let phase = id.phase();
                if phase == Phase::QueryDesign {
                    self.context.query_locked = false;
                }
                self.context.apply_feedback(phase, Some(id), feedback)?;
                self.enter(
                    phase,
                    Some(format!("checkpoint {id} rejected: {}", feedback.describe())),
                );
                Outcome::Revising {
                    phase,
                    escalated: *escalated,
                }
            }
        };
        self.updated_at = Utc::now();
        Ok(CheckpointReport {
            checkpoint: id,
            resolution,
            outcome,
        })
    }

    /// Apply a checkpoint mode toggle. If the task is waiting on a checkpoint
    /// that is now skipped, it is released at once.
    pub fn apply_skip_signal(&mut self, signal: SkipSignal, cfg: &Config) -> Result<SkipReport> {
        let mut next = self.clone();
        let changed = signal.apply(&mut next.context.checkpoint_modes);
        if !changed.is_empty() {
            tracing::info!(task = %next.folder, signal = %signal, changed = changed.len(), "checkpoint modes updated");
        }

        let mut released = None;
        if next.status == PhaseStatus::AwaitingCheckpoint {
            if let Some(id) = next.phase().checkpoint() {
                if next.context.mode(id) == CheckpointMode::Skipped
                    && next.checkpoint(id).status == CheckpointStatus::Pending
                {
                    released = Some(next.resolve_inner(id, None, cfg)?);
                }
            }
        }
        next.updated_at = Utc::now();
        *self = next;
        Ok(SkipReport {
            signal: signal.to_string(),
            changed,
            released,
        })
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    fn write_documents(&mut self, phase: Phase, store: &dyn DocumentStore) -> Result<Vec<String>> {
        let folder = self.folder.clone();
        let ctx = &self.context;
        let mut docs: Vec<(String, String)> = Vec::new();

        let brief = || render::brief(&self.name, &folder, self.date, ctx);
        let mapping = || render::data_mapping(&folder, ctx);

        match phase {
            Phase::Requirements => docs.push((paths::brief_path(&folder), brief())),
            Phase::Mapping => docs.push((paths::data_mapping_path(&folder), mapping())),
            Phase::QueryDesign => {
                if let Some(sql) = render::query_file(&folder, ctx) {
                    docs.push((paths::query_path(&folder), sql));
                }
            }
            Phase::Documentation => {
                docs.push((paths::brief_path(&folder), brief()));
                docs.push((paths::data_mapping_path(&folder), mapping()));
                if let Some(sql) = render::query_file(&folder, ctx) {
                    docs.push((paths::query_path(&folder), sql.clone()));
                    docs.push((paths::agent_query_copy_path(&folder), sql));
                }
            }
            _ => {}
        }

        let mut written = Vec::with_capacity(docs.len());
        for (path, content) in docs {
            store.write_document(&path, &content).map_err(|e| match e {
                DwhError::Upstream { .. } => e,
                other => DwhError::upstream("document store", format!("{path}: {other}")),
            })?;
            tracing::debug!(task = %folder, path = %path, "document written");
            written.push(path);
        }
        for path in &written {
            if !self.documents.contains(path) {
                self.documents.push(path.clone());
            }
        }
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{FsDocumentStore, QueryOutput, QueryRunner};
    use crate::context::{ColumnMapping, Correction, JoinCondition, OutputColumn, SelectedTable};
    use crate::pii::{PiiColumn, PiiPolicy};
    use crate::query::QueryResult;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 22).unwrap()
    }

    fn cp(n: u8) -> CheckpointId {
        CheckpointId::new(n).unwrap()
    }

    fn setup() -> (TempDir, Config, FsDocumentStore) {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("analytics");
        cfg.save(dir.path()).unwrap();
        let store = FsDocumentStore::new(dir.path());
        (dir, cfg, store)
    }

    fn requirements() -> PhaseOutput {
        PhaseOutput::Requirements {
            business_question: "What is monthly revenue per product?".to_string(),
            expected_output_columns: vec![OutputColumn {
                name: "month".to_string(),
                description: "calendar month".to_string(),
                source: String::new(),
            }],
            filters: vec!["order_date >= DATE '2024-01-01'".to_string()],
            glossary_findings: BTreeMap::new(),
        }
    }

    fn discovery(tables: &[&str]) -> PhaseOutput {
        PhaseOutput::Discovery {
            selected_tables: tables.iter().map(|t| SelectedTable::parse(t)).collect(),
            glossary_findings: BTreeMap::new(),
        }
    }

    fn mapping() -> PhaseOutput {
        PhaseOutput::Mapping {
            column_mapping: vec![ColumnMapping {
                table: "FACT_ORDERS".to_string(),
                column: "AMOUNT".to_string(),
                meaning: "net revenue".to_string(),
                role: "measure".to_string(),
                data_type: "NUMBER".to_string(),
            }],
            join_conditions: vec![JoinCondition {
                from_table: "FACT_ORDERS".to_string(),
                to_table: "DIM_PRODUCT".to_string(),
                condition: "f.product_id = p.product_id".to_string(),
                join_type: "INNER".to_string(),
            }],
            business_rules: vec!["exclude cancelled orders".to_string()],
        }
    }

    const QUERY: &str = "SELECT p.product_name, TRUNC(f.order_date, 'MM') AS month, SUM(f.amount) \
                         FROM sales.fact_orders f JOIN sales.dim_product p ON f.product_id = p.product_id \
                         GROUP BY p.product_name, TRUNC(f.order_date, 'MM')";

    fn query_design() -> PhaseOutput {
        PhaseOutput::QueryDesign {
            query_text: QUERY.to_string(),
        }
    }

    fn passed() -> PhaseOutput {
        PhaseOutput::Testing(TestReport {
            explain_ok: true,
            sample_row_count: 42,
            passed: true,
            notes: vec![],
        })
    }

    struct FakeRunner {
        rows: usize,
    }

    impl QueryRunner for FakeRunner {
        fn explain_plan(&self, _sql: &str) -> Result<String> {
            Ok("PARTITION RANGE ALL".to_string())
        }

        fn run_query_safe(
            &self,
            _sql: &str,
            _limit: u32,
            _timeout_seconds: u32,
            _count_only: bool,
        ) -> Result<QueryOutput> {
            let rows = (0..self.rows).map(|i| vec![json!(i)]).collect();
            Ok(QueryOutput::Rows(QueryResult::new(vec!["n".into()], rows)))
        }
    }

    #[test]
    fn create_load_list() {
        let (dir, cfg, _) = setup();
        let task = Task::create(dir.path(), "monthly-revenue", date(), &cfg).unwrap();
        assert_eq!(task.folder, "2025-02-22_monthly-revenue");
        assert!(dir
            .path()
            .join(".dwh/tasks/2025-02-22_monthly-revenue/manifest.yaml")
            .exists());

        let by_folder = Task::load(dir.path(), "2025-02-22_monthly-revenue").unwrap();
        let by_name = Task::load(dir.path(), "monthly-revenue").unwrap();
        assert_eq!(by_folder.folder, by_name.folder);
        assert_eq!(Task::list(dir.path()).unwrap().len(), 1);

        assert!(matches!(
            Task::create(dir.path(), "monthly-revenue", date(), &cfg),
            Err(DwhError::TaskExists(_))
        ));
        assert!(matches!(
            Task::load(dir.path(), "nope"),
            Err(DwhError::TaskNotFound(_))
        ));
    }

    #[test]
    fn create_rejects_bad_slug() {
        let (dir, cfg, _) = setup();
        assert!(matches!(
            Task::create(dir.path(), "Monthly Revenue", date(), &cfg),
            Err(DwhError::InvalidSlug(_))
        ));
    }

    #[test]
    fn advance_out_of_order_for_every_later_phase() {
        let task = Task::new("t", date(), CheckpointMode::Active);
        for &target in &Phase::all()[2..] {
            assert!(
                matches!(task.can_advance_to(target), Err(DwhError::OutOfOrder { .. })),
                "{target}"
            );
        }
    }

    #[test]
    fn advance_requires_artifact_then_checkpoint() {
        let (_dir, cfg, store) = setup();
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        assert!(matches!(
            task.advance(Phase::Discovery),
            Err(DwhError::MissingArtifact { .. })
        ));

        task.complete_phase(requirements(), &cfg, &store).unwrap();
        assert!(matches!(
            task.advance(Phase::Discovery),
            Err(DwhError::CheckpointPending(1))
        ));
        assert_eq!(task.phase(), Phase::Requirements);
    }

    #[test]
    fn complete_phase_rejects_wrong_phase_output() {
        let (_dir, cfg, store) = setup();
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        let err = task
            .complete_phase(discovery(&["SALES.FACT_ORDERS"]), &cfg, &store)
            .unwrap_err();
        assert!(matches!(err, DwhError::OutOfOrder { .. }));
        assert!(task.context.selected_tables.is_empty());
    }

    #[test]
    fn empty_requirements_are_refused_without_side_effects() {
        let (dir, cfg, store) = setup();
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        let err = task
            .complete_phase(
                PhaseOutput::Requirements {
                    business_question: String::new(),
                    expected_output_columns: vec![],
                    filters: vec!["region = 'EU'".to_string()],
                    glossary_findings: BTreeMap::new(),
                },
                &cfg,
                &store,
            )
            .unwrap_err();
        assert!(matches!(err, DwhError::MissingArtifact { .. }));
        assert!(task.context.filters.is_empty());
        assert!(!dir.path().join(paths::brief_path(&task.folder)).exists());
    }

    #[test]
    fn active_checkpoint_without_response_stays_pending() {
        let (_dir, cfg, store) = setup();
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        let report = task.complete_phase(requirements(), &cfg, &store).unwrap();
        assert_eq!(
            report.outcome,
            Outcome::AwaitingCheckpoint { checkpoint: cp(1) }
        );
        for _ in 0..3 {
            let r = task.resolve_checkpoint(cp(1), None, &cfg).unwrap();
            assert_eq!(r.resolution, Resolution::Pending);
        }
        assert_eq!(task.phase(), Phase::Requirements);
        assert_eq!(task.status, PhaseStatus::AwaitingCheckpoint);
    }

    #[test]
    fn resolving_unpresented_checkpoint_fails() {
        let (_dir, cfg, _) = setup();
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        assert!(matches!(
            task.resolve_checkpoint(cp(2), Some(CheckpointResponse::approve()), &cfg),
            Err(DwhError::CheckpointNotPresented(2))
        ));
    }

    #[test]
    fn rejection_reenters_phase_and_applies_feedback() {
        let (_dir, cfg, store) = setup();
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        task.complete_phase(requirements(), &cfg, &store).unwrap();
        task.resolve_checkpoint(cp(1), Some(CheckpointResponse::approve()), &cfg)
            .unwrap();

        task.complete_phase(
            discovery(&["SALES.FACT_ORDERS", "SALES.DIM_PRODUCT"]),
            &cfg,
            &store,
        )
        .unwrap();
        let fb = Feedback::note("remove DIM_PRODUCT").with(Correction::RemoveTable {
            table: "DIM_PRODUCT".to_string(),
        });
        let r = task
            .resolve_checkpoint(cp(2), Some(CheckpointResponse::reject(fb)), &cfg)
            .unwrap();
        assert_eq!(
            r.outcome,
            Outcome::Revising {
                phase: Phase::Discovery,
                escalated: false
            }
        );
        assert!(matches!(
            task.advance(Phase::Mapping),
            Err(DwhError::UserRejection { checkpoint: 2, .. })
        ));

        // The regenerated output proposes the table again.
        let report = task
            .complete_phase(
                discovery(&["SALES.FACT_ORDERS", "SALES.DIM_PRODUCT"]),
                &cfg,
                &store,
            )
            .unwrap();
        let summary = report.summary.unwrap();
        assert!(!summary.body.contains("| SALES.DIM_PRODUCT |"));
        assert!(summary.body.contains("SALES.FACT_ORDERS"));
        assert!(!task.context.has_table("DIM_PRODUCT"));
        assert_eq!(task.checkpoint(cp(2)).status, CheckpointStatus::Pending);
        assert_eq!(task.checkpoint(cp(2)).rejections, 1);
    }

    #[test]
    fn repeated_rejection_escalates_but_keeps_looping() {
        let (_dir, mut cfg, store) = setup();
        cfg.checkpoints.max_rejections = 2;
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        let mut escalations = Vec::new();
        for _ in 0..3 {
            task.complete_phase(requirements(), &cfg, &store).unwrap();
            let r = task
                .resolve_checkpoint(
                    cp(1),
                    Some(CheckpointResponse::reject(Feedback::note("narrow it down"))),
                    &cfg,
                )
                .unwrap();
            match r.outcome {
                Outcome::Revising { escalated, .. } => escalations.push(escalated),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(escalations, vec![false, true, true]);
        assert_eq!(task.phase(), Phase::Requirements);
    }

    #[test]
    fn query_is_locked_until_reentry() {
        let (_dir, mut cfg, store) = setup();
        cfg.checkpoints.default_mode = CheckpointMode::Skipped;
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        task.apply_skip_signal(SkipSignal::SkipAll, &cfg).unwrap();
        task.complete_phase(requirements(), &cfg, &store).unwrap();
        task.complete_phase(discovery(&["SALES.FACT_ORDERS"]), &cfg, &store)
            .unwrap();
        task.complete_phase(mapping(), &cfg, &store).unwrap();
        task.apply_skip_signal(SkipSignal::EnableOne(cp(4)), &cfg)
            .unwrap();
        task.complete_phase(query_design(), &cfg, &store).unwrap();
        assert!(task.context.query_locked);

        // No silent rewrite while CP4 is pending.
        assert!(matches!(
            task.complete_phase(
                PhaseOutput::QueryDesign {
                    query_text: "SELECT 1 FROM dual".to_string()
                },
                &cfg,
                &store
            ),
            Err(DwhError::QueryLocked)
        ));

        let fb = Feedback::note("use net amount").with(Correction::ReplaceQuery {
            query_text: "SELECT SUM(net_amount) FROM sales.fact_orders".to_string(),
        });
        task.resolve_checkpoint(cp(4), Some(CheckpointResponse::reject(fb)), &cfg)
            .unwrap();
        assert!(!task.context.query_locked);
        assert_eq!(
            task.context.query_text.as_deref(),
            Some("SELECT SUM(net_amount) FROM sales.fact_orders")
        );
    }

    #[test]
    fn failed_test_loops_back_to_query_design() {
        let (_dir, mut cfg, store) = setup();
        cfg.checkpoints.default_mode = CheckpointMode::Skipped;
        let mut task = Task::new("t", date(), CheckpointMode::Skipped);
        task.complete_phase(requirements(), &cfg, &store).unwrap();
        task.complete_phase(discovery(&["SALES.FACT_ORDERS"]), &cfg, &store)
            .unwrap();
        task.complete_phase(mapping(), &cfg, &store).unwrap();
        task.complete_phase(query_design(), &cfg, &store).unwrap();
        assert_eq!(task.phase(), Phase::Testing);

        let report = task
            .complete_phase(
                PhaseOutput::Testing(TestReport {
                    explain_ok: false,
                    sample_row_count: 0,
                    passed: false,
                    notes: vec!["ORA-00904: invalid identifier".to_string()],
                }),
                &cfg,
                &store,
            )
            .unwrap();
        assert_eq!(
            report.outcome,
            Outcome::LoopedBack {
                to: Phase::QueryDesign,
                reason: "ORA-00904: invalid identifier".to_string()
            }
        );
        assert_eq!(task.phase(), Phase::QueryDesign);
        assert!(!task.context.query_locked);
        assert_eq!(task.checkpoint(cp(4)).status, CheckpointStatus::NotReached);

        task.complete_phase(query_design(), &cfg, &store).unwrap();
        assert_eq!(task.phase(), Phase::Testing);
        task.fail_testing("database unreachable").unwrap();
        assert_eq!(task.phase(), Phase::QueryDesign);

        task.complete_phase(query_design(), &cfg, &store).unwrap();
        task.complete_phase(passed(), &cfg, &store).unwrap();
        assert_eq!(task.phase(), Phase::Optimization);
    }

    fn pii_task(cfg: &mut Config, store: &FsDocumentStore, query_text: &str) -> Task {
        cfg.pii = PiiPolicy::new(vec![PiiColumn::new(Some("DIM_CUSTOMER"), "EMAIL")]);
        let mut task = Task::new("t", date(), CheckpointMode::Skipped);
        task.complete_phase(requirements(), cfg, store).unwrap();
        task.complete_phase(discovery(&["CRM.DIM_CUSTOMER"]), cfg, store)
            .unwrap();
        task.complete_phase(mapping(), cfg, store).unwrap();
        task.complete_phase(
            PhaseOutput::QueryDesign {
                query_text: query_text.to_string(),
            },
            cfg,
            store,
        )
        .unwrap();
        task
    }

    #[test]
    fn reported_pass_still_clears_guards() {
        let (_dir, mut cfg, store) = setup();
        let mut task = pii_task(&mut cfg, &store, "SELECT c.email FROM crm.dim_customer c");
        assert_eq!(task.phase(), Phase::Testing);

        let report = task.complete_phase(passed(), &cfg, &store).unwrap();
        assert!(matches!(
            report.outcome,
            Outcome::LoopedBack {
                to: Phase::QueryDesign,
                ..
            }
        ));
        assert_eq!(task.phase(), Phase::QueryDesign);
        let test = task.context.test_report.as_ref().unwrap();
        assert!(!test.passed);
        assert!(test.notes.iter().any(|n| n.contains("DIM_CUSTOMER.EMAIL")));
    }

    #[test]
    fn optimized_query_must_clear_guards() {
        let (dir, mut cfg, store) = setup();
        let mut task = pii_task(
            &mut cfg,
            &store,
            "SELECT COUNT(DISTINCT c.email) AS customers FROM crm.dim_customer c",
        );
        task.complete_phase(passed(), &cfg, &store).unwrap();
        assert_eq!(task.phase(), Phase::Optimization);

        let stacked = PhaseOutput::Optimization {
            optimized_query: Some(
                "DELETE FROM crm.dim_customer; SELECT email FROM crm.dim_customer".to_string(),
            ),
            notes: vec![],
        };
        let err = task.complete_phase(stacked, &cfg, &store).unwrap_err();
        assert!(matches!(err, DwhError::ReadOnlyViolation(_)));

        let exposed = PhaseOutput::Optimization {
            optimized_query: Some("SELECT c.email FROM crm.dim_customer c".to_string()),
            notes: vec![],
        };
        let err = task.complete_phase(exposed, &cfg, &store).unwrap_err();
        assert!(matches!(err, DwhError::PiiViolation { .. }));
        assert_eq!(task.phase(), Phase::Optimization);
        assert_eq!(task.context.optimized_query, None);

        let clean = PhaseOutput::Optimization {
            optimized_query: Some(
                "SELECT COUNT(c.email) AS customers FROM crm.dim_customer c".to_string(),
            ),
            notes: vec![],
        };
        task.complete_phase(clean, &cfg, &store).unwrap();
        task.complete_phase(PhaseOutput::Documentation { notes: vec![] }, &cfg, &store)
            .unwrap();
        let delivered =
            std::fs::read_to_string(dir.path().join(paths::agent_query_copy_path(&task.folder)))
                .unwrap();
        assert!(delivered.contains("SELECT COUNT(c.email) AS customers"));
        assert!(!delivered.contains("DELETE"));
    }

    #[test]
    fn run_testing_blocks_pii_before_runner() {
        let (_dir, mut cfg, store) = setup();
        cfg.pii = PiiPolicy::new(vec![PiiColumn::new(Some("DIM_CUSTOMER"), "EMAIL")]);
        let mut task = Task::new("t", date(), CheckpointMode::Skipped);
        task.complete_phase(requirements(), &cfg, &store).unwrap();
        task.complete_phase(discovery(&["CRM.DIM_CUSTOMER"]), &cfg, &store)
            .unwrap();
        task.complete_phase(mapping(), &cfg, &store).unwrap();
        task.complete_phase(
            PhaseOutput::QueryDesign {
                query_text: "SELECT c.email FROM crm.dim_customer c".to_string(),
            },
            &cfg,
            &store,
        )
        .unwrap();

        let runner = FakeRunner { rows: 5 };
        let exec = SafeExecutor::new(&runner, &cfg.pii, cfg.query.clone());
        let report = task.run_testing(&exec, &cfg, &store).unwrap();
        assert!(matches!(report.outcome, Outcome::LoopedBack { .. }));
        let notes = &task.context.test_report.as_ref().unwrap().notes;
        assert!(notes[0].contains("DIM_CUSTOMER.EMAIL"));
    }

    #[test]
    fn skip_signal_releases_waiting_checkpoint() {
        let (_dir, cfg, store) = setup();
        let mut task = Task::new("t", date(), CheckpointMode::Active);
        task.complete_phase(requirements(), &cfg, &store).unwrap();
        let report = task
            .apply_skip_signal(SkipSignal::SkipOne(cp(1)), &cfg)
            .unwrap();
        assert_eq!(report.changed, vec![cp(1)]);
        let released = report.released.unwrap();
        assert_eq!(released.resolution, Resolution::Approved { auto: true });
        assert_eq!(task.phase(), Phase::Discovery);
    }

    #[test]
    fn skipped_summary_matches_active_summary() {
        let (_dir, cfg, store) = setup();
        let mut active = Task::new("t", date(), CheckpointMode::Active);
        let mut skipped = Task::new("t", date(), CheckpointMode::Skipped);
        let a = active.complete_phase(requirements(), &cfg, &store).unwrap();
        let s = skipped.complete_phase(requirements(), &cfg, &store).unwrap();
        assert_eq!(a.summary, s.summary);
        assert!(s.summary.is_some());
        assert_eq!(
            s.outcome,
            Outcome::Advanced {
                to: Phase::Discovery,
                auto_approved: true
            }
        );
    }

    #[test]
    fn end_to_end_monthly_revenue() {
        let (dir, cfg, store) = setup();
        let mut task = Task::create(dir.path(), "monthly-revenue", date(), &cfg).unwrap();
        let approve = || Some(CheckpointResponse::approve());

        // Phase 1 -> CP1 approve
        task.complete_phase(requirements(), &cfg, &store).unwrap();
        task.resolve_checkpoint(cp(1), approve(), &cfg).unwrap();
        assert_eq!(task.phase(), Phase::Discovery);

        // Phase 2 -> CP2 reject "add DIM_PRODUCT" -> rerun -> approve
        task.complete_phase(discovery(&["SALES.FACT_ORDERS", "SALES.DIM_DATE"]), &cfg, &store)
            .unwrap();
        let fb = Feedback::note("add DIM_PRODUCT")
            .with(Correction::AddTable(SelectedTable::new("SALES", "DIM_PRODUCT")));
        task.resolve_checkpoint(cp(2), Some(CheckpointResponse::reject(fb)), &cfg)
            .unwrap();
        assert_eq!(task.phase(), Phase::Discovery);
        let rerun = task
            .complete_phase(discovery(&["SALES.FACT_ORDERS", "SALES.DIM_DATE"]), &cfg, &store)
            .unwrap();
        assert!(rerun.summary.unwrap().body.contains("SALES.DIM_PRODUCT"));
        task.resolve_checkpoint(cp(2), approve(), &cfg).unwrap();

        // Phase 3 -> CP3, Phase 4 -> CP4
        task.complete_phase(mapping(), &cfg, &store).unwrap();
        task.resolve_checkpoint(cp(3), approve(), &cfg).unwrap();
        task.complete_phase(query_design(), &cfg, &store).unwrap();
        task.resolve_checkpoint(cp(4), approve(), &cfg).unwrap();
        assert_eq!(task.phase(), Phase::Testing);

        // Phase 5: explain passes, sample capped at the row limit
        let runner = FakeRunner { rows: 250 };
        let exec = SafeExecutor::new(&runner, &cfg.pii, cfg.query.clone());
        task.run_testing(&exec, &cfg, &store).unwrap();
        let report = task.context.test_report.clone().unwrap();
        assert!(report.passed);
        assert!(report.sample_row_count <= 100);
        assert_eq!(task.phase(), Phase::Optimization);

        // Phase 6 adds a partition filter
        let optimized = format!("{QUERY} HAVING 1 = 1");
        task.complete_phase(
            PhaseOutput::Optimization {
                optimized_query: Some(optimized.clone()),
                notes: vec!["partition pruning on ORDER_MONTH".to_string()],
            },
            &cfg,
            &store,
        )
        .unwrap();

        // Phase 7
        let done = task
            .complete_phase(PhaseOutput::Documentation { notes: vec![] }, &cfg, &store)
            .unwrap();
        assert_eq!(done.outcome, Outcome::Complete);
        task.save(dir.path()).unwrap();

        let task = Task::load(dir.path(), "monthly-revenue").unwrap();
        assert_eq!(task.phase(), Phase::Documentation);
        assert!(task.is_complete());
        assert!(task.context.has_table("DIM_PRODUCT"));
        assert_eq!(task.context.query_text.as_deref(), Some(QUERY));

        let copy = dir
            .path()
            .join("queries/agent-written/2025-02-22_monthly-revenue.sql");
        assert!(copy.exists());
        assert!(std::fs::read_to_string(&copy).unwrap().contains("HAVING 1 = 1"));
        for doc in [
            "2025-02-22_monthly-revenue/2025-02-22_monthly-revenue-brief.md",
            "2025-02-22_monthly-revenue/2025-02-22_monthly-revenue-data-mapping.md",
            "2025-02-22_monthly-revenue/2025-02-22_monthly-revenue_query.sql",
        ] {
            assert!(dir.path().join(doc).exists(), "{doc}");
        }
        assert!(matches!(
            Task::load(dir.path(), "monthly-revenue")
                .unwrap()
                .complete_phase(PhaseOutput::Documentation { notes: vec![] }, &cfg, &store),
            Err(DwhError::TaskComplete(_))
        ));
    }

    #[test]
    fn skip_all_runs_without_blocking() {
        let (dir, cfg, store) = setup();
        let mut task = Task::create(dir.path(), "monthly-revenue", date(), &cfg).unwrap();
        task.apply_skip_signal(SkipSignal::SkipAll, &cfg).unwrap();

        let mut summaries = Vec::new();
        for output in [
            requirements(),
            discovery(&["SALES.FACT_ORDERS"]),
            mapping(),
            query_design(),
        ] {
            let r = task.complete_phase(output, &cfg, &store).unwrap();
            assert!(matches!(
                r.outcome,
                Outcome::Advanced {
                    auto_approved: true,
                    ..
                }
            ));
            summaries.push(r.summary.unwrap());
        }
        assert_eq!(summaries.len(), 4);
        for id in CheckpointId::all() {
            assert_eq!(task.checkpoint(id).status, CheckpointStatus::Approved);
            assert!(task.checkpoint(id).auto_approved);
        }
        assert!(dir.path().join(paths::brief_path(&task.folder)).exists());
        assert!(dir.path().join(paths::data_mapping_path(&task.folder)).exists());
        assert!(dir.path().join(paths::query_path(&task.folder)).exists());
        assert_eq!(task.phase(), Phase::Testing);
    }

    #[test]
    fn skip_only_checkpoint_two() {
        let (_dir, cfg, store) = setup();
        let mut task = Task::new("monthly-revenue", date(), CheckpointMode::Active);
        task.apply_skip_signal(SkipSignal::SkipOne(cp(2)), &cfg)
            .unwrap();

        let r1 = task.complete_phase(requirements(), &cfg, &store).unwrap();
        assert_eq!(r1.outcome, Outcome::AwaitingCheckpoint { checkpoint: cp(1) });
        task.resolve_checkpoint(cp(1), Some(CheckpointResponse::approve()), &cfg)
            .unwrap();

        let r2 = task
            .complete_phase(discovery(&["SALES.FACT_ORDERS"]), &cfg, &store)
            .unwrap();
        assert_eq!(
            r2.outcome,
            Outcome::Advanced {
                to: Phase::Mapping,
                auto_approved: true
            }
        );

        let r3 = task.complete_phase(mapping(), &cfg, &store).unwrap();
        assert_eq!(r3.outcome, Outcome::AwaitingCheckpoint { checkpoint: cp(3) });
        task.resolve_checkpoint(cp(3), Some(CheckpointResponse::approve()), &cfg)
            .unwrap();

        let r4 = task.complete_phase(query_design(), &cfg, &store).unwrap();
        assert_eq!(r4.outcome, Outcome::AwaitingCheckpoint { checkpoint: cp(4) });

        for n in [1, 3, 4] {
            assert_eq!(task.context.mode(cp(n)), CheckpointMode::Active);
        }
        assert_eq!(task.context.mode(cp(2)), CheckpointMode::Skipped);
    }
}
