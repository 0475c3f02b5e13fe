use crate::config::Config;
use crate::paths;
use crate::task::Task;
use crate::types::{ActionType, CheckpointId, CheckpointStatus, Phase, PhaseStatus};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EvalContext
// ---------------------------------------------------------------------------

pub struct EvalContext<'a> {
    pub task: &'a Task,
    pub config: &'a Config,
}

impl EvalContext<'_> {
    fn current_checkpoint(&self) -> Option<CheckpointId> {
        self.task.phase().checkpoint()
    }

    fn checkpoint_status(&self) -> Option<CheckpointStatus> {
        self.current_checkpoint()
            .map(|id| self.task.checkpoint(id).status)
    }
}

// ---------------------------------------------------------------------------
// Classification (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub task: String,
    pub folder: String,
    pub current_phase: Phase,
    pub status: PhaseStatus,
    pub action: ActionType,
    pub message: String,
    pub next_command: String,
    pub output_path: Option<String>,
    pub checkpoint: Option<CheckpointId>,
    /// Consumer hint: the action goes through the catalog or query runner.
    pub touches_database: bool,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

pub struct Rule {
    pub id: &'static str,
    pub condition: fn(&EvalContext) -> bool,
    pub action: fn(&EvalContext) -> ActionType,
    pub message: fn(&EvalContext) -> String,
    pub next_command: fn(&EvalContext) -> String,
    pub output_path: Option<fn(&EvalContext) -> Option<String>>,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, ctx: &EvalContext) -> Classification {
        let task = ctx.task;
        for rule in &self.rules {
            if (rule.condition)(ctx) {
                let action = (rule.action)(ctx);
                tracing::debug!(task = %task.folder, rule = rule.id, action = %action, "classified");
                return Classification {
                    task: task.name.clone(),
                    folder: task.folder.clone(),
                    current_phase: task.phase(),
                    status: task.status,
                    action,
                    message: (rule.message)(ctx),
                    next_command: (rule.next_command)(ctx),
                    output_path: rule.output_path.and_then(|f| f(ctx)),
                    checkpoint: ctx.current_checkpoint(),
                    touches_database: action.touches_database(),
                };
            }
        }

        Classification {
            task: task.name.clone(),
            folder: task.folder.clone(),
            current_phase: task.phase(),
            status: task.status,
            action: ActionType::Done,
            message: format!("Task '{}' has no pending actions", task.folder),
            next_command: String::new(),
            output_path: None,
            checkpoint: None,
            touches_database: false,
        }
    }
}

pub fn classify(task: &Task, config: &Config) -> Classification {
    Classifier::new(default_rules()).classify(&EvalContext { task, config })
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn is_complete(ctx: &EvalContext) -> bool {
    ctx.task.status == PhaseStatus::Complete
}

fn awaiting_response(ctx: &EvalContext) -> bool {
    ctx.task.status == PhaseStatus::AwaitingCheckpoint
        && ctx.checkpoint_status() == Some(CheckpointStatus::Pending)
}

fn checkpoint_rejected(ctx: &EvalContext) -> bool {
    ctx.checkpoint_status() == Some(CheckpointStatus::Rejected)
}

fn test_failed(ctx: &EvalContext) -> bool {
    ctx.task.phase() == Phase::QueryDesign
        && ctx
            .task
            .context
            .test_report
            .as_ref()
            .is_some_and(|r| !r.passed)
}

fn complete_cmd(ctx: &EvalContext) -> String {
    format!("dwh phase complete {} --file <output.yaml>", ctx.task.folder)
}

fn phase_output_path(ctx: &EvalContext) -> Option<String> {
    let folder = &ctx.task.folder;
    match ctx.task.phase() {
        Phase::Requirements => Some(paths::brief_path(folder)),
        Phase::Mapping => Some(paths::data_mapping_path(folder)),
        Phase::QueryDesign => Some(paths::query_path(folder)),
        Phase::Documentation => Some(paths::agent_query_copy_path(folder)),
        _ => None,
    }
}

fn phase_message(ctx: &EvalContext) -> String {
    let task = ctx.task;
    let limits = &ctx.config.query;
    match task.phase() {
        Phase::Requirements => format!(
            "Capture the business question, expected output columns and filters for '{}'. \
             Look up every business term in the glossary.",
            task.name
        ),
        Phase::Discovery => {
            "Search the schema and documents for candidate tables and select the ones that \
             answer the question."
                .to_string()
        }
        Phase::Mapping => {
            "Map each output column to a source column, define the joins between the selected \
             tables and list the business rules."
                .to_string()
        }
        Phase::QueryDesign => format!(
            "Write the read-only query using only the mapped tables ({} selected).",
            task.context.selected_tables.len()
        ),
        Phase::Testing => format!(
            "Explain the query and run a sample through the safe executor (limit {} rows, {}s).",
            limits.row_limit, limits.timeout_seconds
        ),
        Phase::Optimization => {
            "Review the plan for full scans and missing partition filters; record an optimized \
             query if one helps."
                .to_string()
        }
        Phase::Documentation => {
            "Finalize the brief, data mapping and query file for handoff.".to_string()
        }
    }
}

pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "complete",
            condition: is_complete,
            action: |_| ActionType::Done,
            message: |ctx| {
                format!(
                    "Task complete. Final query at {}",
                    paths::agent_query_copy_path(&ctx.task.folder)
                )
            },
            next_command: |_| String::new(),
            output_path: None,
        },
        Rule {
            id: "await_checkpoint",
            condition: awaiting_response,
            action: |_| ActionType::WaitForApproval,
            message: |ctx| match ctx.current_checkpoint() {
                Some(id) => format!(
                    "Checkpoint {id} ({}) is waiting for the user. Show the summary and relay \
                     their answer.",
                    id.title()
                ),
                None => "Waiting for the user.".to_string(),
            },
            next_command: |ctx| {
                let k = ctx.current_checkpoint().map(|id| id.get()).unwrap_or(0);
                format!("dwh checkpoint approve {} {k}", ctx.task.folder)
            },
            output_path: None,
        },
        Rule {
            id: "revise_after_rejection",
            condition: checkpoint_rejected,
            action: |_| ActionType::RevisePhase,
            message: |ctx| {
                let feedback = ctx
                    .current_checkpoint()
                    .and_then(|id| ctx.task.checkpoint(id).last_feedback.as_ref())
                    .map(|f| f.describe())
                    .unwrap_or_default();
                format!(
                    "The user rejected the {} output: {feedback}. Revise the phase with this \
                     feedback and complete it again.",
                    ctx.task.phase().title().to_lowercase()
                )
            },
            next_command: complete_cmd,
            output_path: Some(phase_output_path),
        },
        Rule {
            id: "revise_after_failed_test",
            condition: test_failed,
            action: |_| ActionType::RevisePhase,
            message: |ctx| {
                let notes = ctx
                    .task
                    .context
                    .test_report
                    .as_ref()
                    .map(|r| r.notes.join("; "))
                    .unwrap_or_default();
                format!("Testing failed ({notes}). Fix the query and complete query design again.")
            },
            next_command: complete_cmd,
            output_path: Some(phase_output_path),
        },
        Rule {
            id: "work_phase",
            condition: |ctx| ctx.task.status == PhaseStatus::InProgress,
            action: |ctx| ActionType::for_phase(ctx.task.phase()),
            message: phase_message,
            next_command: complete_cmd,
            output_path: Some(phase_output_path),
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
