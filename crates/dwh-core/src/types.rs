use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Requirements,
    Discovery,
    Mapping,
    QueryDesign,
    Testing,
    Optimization,
    Documentation,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Requirements,
            Phase::Discovery,
            Phase::Mapping,
            Phase::QueryDesign,
            Phase::Testing,
            Phase::Optimization,
            Phase::Documentation,
        ]
    }

    /// 1-based position in the workflow.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Phase> {
        Phase::all().get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn next(self) -> Option<Phase> {
        Phase::from_number(self.number() + 1)
    }

    /// Checkpoint gating the exit of this phase, if any.
    pub fn checkpoint(self) -> Option<CheckpointId> {
        CheckpointId::new(self.number()).ok()
    }

    /// Phases whose completion writes documents to the task folder.
    pub fn writes_documents(self) -> bool {
        matches!(
            self,
            Phase::Requirements | Phase::Mapping | Phase::QueryDesign | Phase::Documentation
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Requirements => "requirements",
            Phase::Discovery => "discovery",
            Phase::Mapping => "mapping",
            Phase::QueryDesign => "query_design",
            Phase::Testing => "testing",
            Phase::Optimization => "optimization",
            Phase::Documentation => "documentation",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::Requirements => "Requirement gathering",
            Phase::Discovery => "Data discovery",
            Phase::Mapping => "Data mapping",
            Phase::QueryDesign => "Query design",
            Phase::Testing => "Testing",
            Phase::Optimization => "Optimization",
            Phase::Documentation => "Documentation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::DwhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<u8>() {
            return Phase::from_number(n)
                .ok_or_else(|| crate::error::DwhError::InvalidPhase(s.to_string()));
        }
        match s {
            "requirements" => Ok(Phase::Requirements),
            "discovery" => Ok(Phase::Discovery),
            "mapping" => Ok(Phase::Mapping),
            "query_design" | "query-design" => Ok(Phase::QueryDesign),
            "testing" => Ok(Phase::Testing),
            "optimization" => Ok(Phase::Optimization),
            "documentation" => Ok(Phase::Documentation),
            _ => Err(crate::error::DwhError::InvalidPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CheckpointId
// ---------------------------------------------------------------------------

/// One of the four human-confirmation checkpoints. Checkpoint `k` gates the
/// exit of phase `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CheckpointId(u8);

impl CheckpointId {
    pub const COUNT: u8 = 4;

    pub fn new(n: u8) -> crate::error::Result<Self> {
        if (1..=Self::COUNT).contains(&n) {
            Ok(CheckpointId(n))
        } else {
            Err(crate::error::DwhError::InvalidCheckpoint(n.to_string()))
        }
    }

    pub fn all() -> impl Iterator<Item = CheckpointId> {
        (1..=Self::COUNT).map(CheckpointId)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The phase this checkpoint confirms.
    pub fn phase(self) -> Phase {
        // 1..=4 always maps to a phase
        Phase::all()[usize::from(self.0) - 1]
    }

    pub fn title(self) -> &'static str {
        match self.0 {
            1 => "Confirm requirements",
            2 => "Confirm table selection",
            3 => "Confirm data mapping",
            _ => "Confirm query",
        }
    }
}

impl TryFrom<u8> for CheckpointId {
    type Error = crate::error::DwhError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        CheckpointId::new(n)
    }
}

impl From<CheckpointId> for u8 {
    fn from(id: CheckpointId) -> u8 {
        id.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CheckpointId {
    type Err = crate::error::DwhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches("cp");
        let n: u8 = digits
            .parse()
            .map_err(|_| crate::error::DwhError::InvalidCheckpoint(s.to_string()))?;
        CheckpointId::new(n)
    }
}

// ---------------------------------------------------------------------------
// CheckpointMode / CheckpointStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointMode {
    #[default]
    Active,
    Skipped,
}

impl fmt::Display for CheckpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckpointMode::Active => "active",
            CheckpointMode::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// Phase output not yet presented.
    NotReached,
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckpointStatus::NotReached => "not_reached",
            CheckpointStatus::Pending => "pending",
            CheckpointStatus::Approved => "approved",
            CheckpointStatus::Rejected => "rejected",
        })
    }
}

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

/// Where the task sits within its current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    InProgress,
    AwaitingCheckpoint,
    Complete,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::AwaitingCheckpoint => "awaiting_checkpoint",
            PhaseStatus::Complete => "complete",
        })
    }
}

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    GatherRequirements,
    DiscoverTables,
    MapData,
    DesignQuery,
    TestQuery,
    OptimizeQuery,
    WriteDocumentation,
    RevisePhase,
    WaitForApproval,
    Done,
}

impl ActionType {
    pub fn for_phase(phase: Phase) -> ActionType {
        match phase {
            Phase::Requirements => ActionType::GatherRequirements,
            Phase::Discovery => ActionType::DiscoverTables,
            Phase::Mapping => ActionType::MapData,
            Phase::QueryDesign => ActionType::DesignQuery,
            Phase::Testing => ActionType::TestQuery,
            Phase::Optimization => ActionType::OptimizeQuery,
            Phase::Documentation => ActionType::WriteDocumentation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::GatherRequirements => "gather_requirements",
            ActionType::DiscoverTables => "discover_tables",
            ActionType::MapData => "map_data",
            ActionType::DesignQuery => "design_query",
            ActionType::TestQuery => "test_query",
            ActionType::OptimizeQuery => "optimize_query",
            ActionType::WriteDocumentation => "write_documentation",
            ActionType::RevisePhase => "revise_phase",
            ActionType::WaitForApproval => "wait_for_approval",
            ActionType::Done => "done",
        }
    }

    /// Actions that hit the database through a collaborator.
    pub fn touches_database(self) -> bool {
        matches!(
            self,
            ActionType::DiscoverTables | ActionType::TestQuery | ActionType::OptimizeQuery
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
