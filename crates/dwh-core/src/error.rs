use thiserror::Error;

#[derive(Debug, Error)]
pub enum DwhError {
    #[error("not initialized: run 'dwh init'")]
    NotInitialized,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already exists: {0}")]
    TaskExists(String),

    #[error("task is complete: {0}")]
    TaskComplete(String),

    #[error("invalid task name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("invalid checkpoint: {0} (expected 1-4)")]
    InvalidCheckpoint(String),

    #[error("invalid checkpoint signal: {0}")]
    InvalidSignal(String),

    #[error("out of order: cannot move to phase {target} while in phase {current}")]
    OutOfOrder { current: String, target: String },

    #[error("missing required artifact '{artifact}' for phase '{phase}'")]
    MissingArtifact { artifact: String, phase: String },

    #[error("checkpoint {0} is awaiting a response")]
    CheckpointPending(u8),

    #[error("checkpoint {0} has nothing to review yet: complete its phase first")]
    CheckpointNotPresented(u8),

    #[error("checkpoint {checkpoint} rejected: {feedback}")]
    UserRejection { checkpoint: u8, feedback: String },

    #[error("query text is locked; re-enter query_design to change it")]
    QueryLocked,

    #[error("PII columns selected without aggregation: {}", columns.join(", "))]
    PiiViolation { columns: Vec<String> },

    #[error("query rejected: {0}")]
    ReadOnlyViolation(String),

    #[error("upstream failure in {collaborator}: {message}")]
    Upstream {
        collaborator: String,
        message: String,
    },

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DwhError {
    pub fn upstream(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        DwhError::Upstream {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DwhError>;
