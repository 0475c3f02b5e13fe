//! Checkpoint gate.
//!
//! Checkpoint `k` sits between phase `k` and phase `k + 1` for k in 1..=4.
//! In `Active` mode it waits for a human response; in `Skipped` mode it
//! approves on its own. Either way the same summary is synthesized, so
//! skipping never hides information.
//!
//! Waiting is not blocking: [`resolve`] returns [`Resolution::Pending`] and
//! the caller re-invokes it once a response exists.

use crate::context::Feedback;
use crate::error::{DwhError, Result};
use crate::types::{CheckpointId, CheckpointMode, CheckpointStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// CheckpointSummary
// ---------------------------------------------------------------------------

/// The artifact shown to the user at a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub checkpoint: CheckpointId,
    pub title: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub status: CheckpointStatus,
    #[serde(default)]
    pub rejections: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<CheckpointSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presented_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub auto_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_feedback: Option<Feedback>,
}

impl Checkpoint {
    pub fn new(id: CheckpointId) -> Self {
        Self {
            id,
            status: CheckpointStatus::NotReached,
            rejections: 0,
            summary: None,
            presented_at: None,
            resolved_at: None,
            approved_by: None,
            auto_approved: false,
            last_feedback: None,
        }
    }

    /// Put a freshly generated summary in front of the user.
    pub fn present(&mut self, summary: CheckpointSummary) {
        self.status = CheckpointStatus::Pending;
        self.summary = Some(summary);
        self.presented_at = Some(Utc::now());
        self.resolved_at = None;
        self.approved_by = None;
        self.auto_approved = false;
    }

    /// Back to not-reached; used when the phase is re-entered.
    pub fn reopen(&mut self) {
        self.status = CheckpointStatus::NotReached;
        self.resolved_at = None;
        self.approved_by = None;
        self.auto_approved = false;
    }

    pub fn is_cleared(&self) -> bool {
        self.status == CheckpointStatus::Approved
    }

    fn approve(&mut self, by: Option<String>, auto: bool) {
        self.status = CheckpointStatus::Approved;
        self.resolved_at = Some(Utc::now());
        self.approved_by = by;
        self.auto_approved = auto;
    }

    fn reject(&mut self, feedback: Feedback) {
        self.status = CheckpointStatus::Rejected;
        self.resolved_at = Some(Utc::now());
        self.rejections += 1;
        self.last_feedback = Some(feedback);
    }
}

// ---------------------------------------------------------------------------
// Response / Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckpointResponse {
    Approve {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        by: Option<String>,
    },
    Reject {
        #[serde(flatten)]
        feedback: Feedback,
    },
}

impl CheckpointResponse {
    pub fn approve() -> Self {
        CheckpointResponse::Approve { by: None }
    }

    pub fn reject(feedback: Feedback) -> Self {
        CheckpointResponse::Reject { feedback }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// Active checkpoint with no response yet. Nothing changes.
    Pending,
    Approved {
        auto: bool,
    },
    Rejected {
        feedback: Feedback,
        /// The rejection count reached the configured limit.
        escalated: bool,
    },
}

impl Resolution {
    pub fn is_approved(&self) -> bool {
        matches!(self, Resolution::Approved { .. })
    }
}

/// Bound on how often a checkpoint may be rejected before escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionPolicy {
    /// `0` means unbounded.
    pub max_rejections: u32,
}

impl Default for RejectionPolicy {
    fn default() -> Self {
        Self { max_rejections: 5 }
    }
}

impl RejectionPolicy {
    pub fn is_escalated(&self, rejections: u32) -> bool {
        self.max_rejections > 0 && rejections >= self.max_rejections
    }
}

/// Resolve a presented checkpoint.
///
/// A skipped checkpoint approves regardless of `response`. An active one with
/// no response stays pending and is left untouched.
pub fn resolve(
    checkpoint: &mut Checkpoint,
    mode: CheckpointMode,
    response: Option<CheckpointResponse>,
    policy: &RejectionPolicy,
) -> Result<Resolution> {
    match checkpoint.status {
        CheckpointStatus::Pending => {}
        CheckpointStatus::Approved => return Ok(Resolution::Approved {
            auto: checkpoint.auto_approved,
        }),
        CheckpointStatus::NotReached | CheckpointStatus::Rejected => {
            return Err(DwhError::CheckpointNotPresented(checkpoint.id.get()))
        }
    }

    if mode == CheckpointMode::Skipped {
        checkpoint.approve(None, true);
        tracing::info!(checkpoint = checkpoint.id.get(), "checkpoint skipped, auto-approved");
        return Ok(Resolution::Approved { auto: true });
    }

    match response {
        None => Ok(Resolution::Pending),
        Some(CheckpointResponse::Approve { by }) => {
            checkpoint.approve(by, false);
            tracing::info!(checkpoint = checkpoint.id.get(), "checkpoint approved");
            Ok(Resolution::Approved { auto: false })
        }
        Some(CheckpointResponse::Reject { feedback }) => {
            checkpoint.reject(feedback.clone());
            let escalated = policy.is_escalated(checkpoint.rejections);
            if escalated {
                tracing::warn!(
                    checkpoint = checkpoint.id.get(),
                    rejections = checkpoint.rejections,
                    "checkpoint rejection limit reached; escalate to a reviewer"
                );
            } else {
                tracing::info!(
                    checkpoint = checkpoint.id.get(),
                    feedback = %feedback.describe(),
                    "checkpoint rejected"
                );
            }
            Ok(Resolution::Rejected {
                feedback,
                escalated,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// SkipSignal
// ---------------------------------------------------------------------------

/// Mode toggle produced by whatever classifies the user's words. The core
/// only consumes this enum; its string form is an explicit command syntax
/// (`skip-all`, `skip:2`, `enable-all`, `enable:3`, `none`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipSignal {
    SkipAll,
    SkipOne(CheckpointId),
    EnableAll,
    EnableOne(CheckpointId),
    None,
}

impl SkipSignal {
    /// Apply to a mode table. Returns the checkpoints whose mode changed.
    pub fn apply(self, modes: &mut BTreeMap<CheckpointId, CheckpointMode>) -> Vec<CheckpointId> {
        let targets: Vec<(CheckpointId, CheckpointMode)> = match self {
            SkipSignal::SkipAll => CheckpointId::all()
                .map(|id| (id, CheckpointMode::Skipped))
                .collect(),
            SkipSignal::EnableAll => CheckpointId::all()
                .map(|id| (id, CheckpointMode::Active))
                .collect(),
            SkipSignal::SkipOne(id) => vec![(id, CheckpointMode::Skipped)],
            SkipSignal::EnableOne(id) => vec![(id, CheckpointMode::Active)],
            SkipSignal::None => Vec::new(),
        };

        let mut changed = Vec::new();
        for (id, mode) in targets {
            let previous = modes.insert(id, mode).unwrap_or_default();
            if previous != mode {
                changed.push(id);
            }
        }
        changed
    }
}

impl fmt::Display for SkipSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipSignal::SkipAll => f.write_str("skip-all"),
            SkipSignal::SkipOne(id) => write!(f, "skip:{id}"),
            SkipSignal::EnableAll => f.write_str("enable-all"),
            SkipSignal::EnableOne(id) => write!(f, "enable:{id}"),
            SkipSignal::None => f.write_str("none"),
        }
    }
}

impl std::str::FromStr for SkipSignal {
    type Err = DwhError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "skip-all" | "skip_all" => return Ok(SkipSignal::SkipAll),
            "enable-all" | "enable_all" => return Ok(SkipSignal::EnableAll),
            "none" => return Ok(SkipSignal::None),
            _ => {}
        }
        if let Some(n) = s.strip_prefix("skip:") {
            return Ok(SkipSignal::SkipOne(n.parse()?));
        }
        if let Some(n) = s.strip_prefix("enable:") {
            return Ok(SkipSignal::EnableOne(n.parse()?));
        }
        Err(DwhError::InvalidSignal(s))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
