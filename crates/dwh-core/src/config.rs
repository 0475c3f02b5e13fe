use crate::checkpoint::RejectionPolicy;
use crate::error::{DwhError, Result};
use crate::paths;
use crate::pii::PiiPolicy;
use crate::types::CheckpointMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CheckpointConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Mode every checkpoint starts in for a new task.
    #[serde(default)]
    pub default_mode: CheckpointMode,
    /// Rejections per checkpoint before escalation. `0` = unbounded.
    #[serde(default = "default_max_rejections")]
    pub max_rejections: u32,
}

fn default_max_rejections() -> u32 {
    5
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            default_mode: CheckpointMode::Active,
            max_rejections: default_max_rejections(),
        }
    }
}

impl CheckpointConfig {
    pub fn rejection_policy(&self) -> RejectionPolicy {
        RejectionPolicy {
            max_rejections: self.max_rejections,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

fn default_row_limit() -> u32 {
    100
}

fn default_timeout() -> u32 {
    30
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            row_limit: default_row_limit(),
            timeout_seconds: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    /// Source database alias used in knowledge-base file names.
    #[serde(default = "default_source_db")]
    pub source_db: String,
}

fn default_source_db() -> String {
    "DWH".to_string()
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub checkpoints: CheckpointConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub pii: PiiPolicy,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                source_db: default_source_db(),
            },
            checkpoints: CheckpointConfig::default(),
            query: QueryConfig::default(),
            pii: PiiPolicy::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(DwhError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.query.row_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "query.row_limit is 0; every sample run would return nothing".to_string(),
            });
        }

        if self.query.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "query.timeout_seconds is 0; the runner decides the timeout".to_string(),
            });
        }

        if self.checkpoints.max_rejections > 20 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "checkpoints.max_rejections={} (>20 is unusual)",
                    self.checkpoints.max_rejections
                ),
            });
        }

        let mut seen = HashSet::new();
        for col in &self.pii.columns {
            if col.column.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "pii.columns has an entry with an empty column name".to_string(),
                });
                continue;
            }
            let key = col.key();
            if !seen.insert(key.clone()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("duplicate PII column '{key}'"),
                });
            }
        }

        if self.pii.allowed_aggregates.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "pii.allowed_aggregates is empty; PII columns can never be selected"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
