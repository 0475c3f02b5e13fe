//! Task context accumulator.
//!
//! Every phase reads the accumulated [`TaskContext`] and appends to it. List
//! fields only grow (de-duplicated by their natural key) and scalars are only
//! overwritten with non-empty values, so no merge drops what an earlier phase
//! gathered. The only way to remove or replace an item is an explicit
//! [`Correction`] carried by checkpoint feedback.

use crate::error::{DwhError, Result};
use crate::types::{CheckpointId, CheckpointMode, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Context items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryFinding {
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub calculation_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_dwh_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedTable {
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rationale: String,
}

impl SelectedTable {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            description: String::new(),
            rationale: String::new(),
        }
    }

    /// Parse `SCHEMA.TABLE` (or a bare table name, schema left empty).
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, table)) => Self::new(schema.trim(), table.trim()),
            None => Self::new("", qualified.trim()),
        }
    }

    pub fn qualified_name(&self) -> String {
        if self.schema.is_empty() {
            self.table.clone()
        } else {
            format!("{}.{}", self.schema, self.table)
        }
    }

    /// Table names compare case-insensitively; an empty schema matches any.
    pub fn matches(&self, table: &str) -> bool {
        let other = SelectedTable::parse(table);
        let same_table = self.table.eq_ignore_ascii_case(&other.table);
        let same_schema = self.schema.is_empty()
            || other.schema.is_empty()
            || self.schema.eq_ignore_ascii_case(&other.schema);
        same_table && same_schema
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub data_type: String,
}

impl ColumnMapping {
    fn same_key(&self, table: &str, column: &str) -> bool {
        self.table.eq_ignore_ascii_case(table) && self.column.eq_ignore_ascii_case(column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinCondition {
    pub from_table: String,
    pub to_table: String,
    pub condition: String,
    #[serde(default = "default_join_type")]
    pub join_type: String,
}

fn default_join_type() -> String {
    "INNER".to_string()
}

impl JoinCondition {
    fn same_key(&self, from_table: &str, to_table: &str) -> bool {
        self.from_table.eq_ignore_ascii_case(from_table)
            && self.to_table.eq_ignore_ascii_case(to_table)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub explain_ok: bool,
    #[serde(default)]
    pub sample_row_count: u64,
    pub passed: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointId>,
    pub note: String,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PhaseOutput
// ---------------------------------------------------------------------------

/// What a phase hands back to the orchestrator. Tagged by phase name so it
/// can be authored as a YAML/JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseOutput {
    Requirements {
        #[serde(default)]
        business_question: String,
        #[serde(default)]
        expected_output_columns: Vec<OutputColumn>,
        #[serde(default)]
        filters: Vec<String>,
        #[serde(default)]
        glossary_findings: BTreeMap<String, GlossaryFinding>,
    },
    Discovery {
        #[serde(default)]
        selected_tables: Vec<SelectedTable>,
        #[serde(default)]
        glossary_findings: BTreeMap<String, GlossaryFinding>,
    },
    Mapping {
        #[serde(default)]
        column_mapping: Vec<ColumnMapping>,
        #[serde(default)]
        join_conditions: Vec<JoinCondition>,
        #[serde(default)]
        business_rules: Vec<String>,
    },
    QueryDesign {
        query_text: String,
    },
    Testing(TestReport),
    Optimization {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        optimized_query: Option<String>,
        #[serde(default)]
        notes: Vec<String>,
    },
    Documentation {
        #[serde(default)]
        notes: Vec<String>,
    },
}

impl PhaseOutput {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseOutput::Requirements { .. } => Phase::Requirements,
            PhaseOutput::Discovery { .. } => Phase::Discovery,
            PhaseOutput::Mapping { .. } => Phase::Mapping,
            PhaseOutput::QueryDesign { .. } => Phase::QueryDesign,
            PhaseOutput::Testing(_) => Phase::Testing,
            PhaseOutput::Optimization { .. } => Phase::Optimization,
            PhaseOutput::Documentation { .. } => Phase::Documentation,
        }
    }
}

// ---------------------------------------------------------------------------
// Feedback / Correction
// ---------------------------------------------------------------------------

/// An explicit user correction. Removal and replacement only happen through
/// one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Correction {
    SetBusinessQuestion { value: String },
    AddOutputColumn(OutputColumn),
    RemoveOutputColumn { name: String },
    AddFilter { value: String },
    RemoveFilter { value: String },
    AddTable(SelectedTable),
    RemoveTable { table: String },
    AddColumn(ColumnMapping),
    RemoveColumn { table: String, column: String },
    AddJoin(JoinCondition),
    RemoveJoin { from_table: String, to_table: String },
    AddRule { value: String },
    RemoveRule { value: String },
    ReplaceQuery { query_text: String },
}

/// Feedback attached to a checkpoint rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub corrections: Vec<Correction>,
}

impl Feedback {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            corrections: Vec::new(),
        }
    }

    pub fn with(mut self, correction: Correction) -> Self {
        self.corrections.push(correction);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.note.trim().is_empty() && self.corrections.is_empty()
    }

    /// One-line description used in logs and the feedback log.
    pub fn describe(&self) -> String {
        if !self.note.trim().is_empty() {
            return self.note.clone();
        }
        format!("{} correction(s)", self.corrections.len())
    }
}

// ---------------------------------------------------------------------------
// TaskContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default)]
    pub business_question: String,
    #[serde(default)]
    pub expected_output_columns: Vec<OutputColumn>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub glossary_findings: BTreeMap<String, GlossaryFinding>,
    #[serde(default)]
    pub selected_tables: Vec<SelectedTable>,
    #[serde(default)]
    pub column_mapping: Vec<ColumnMapping>,
    #[serde(default)]
    pub join_conditions: Vec<JoinCondition>,
    #[serde(default)]
    pub business_rules: Vec<String>,
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub query_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_report: Option<TestReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optimization_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documentation_notes: Vec<String>,
    pub phase: Phase,
    pub checkpoint_modes: BTreeMap<CheckpointId, CheckpointMode>,
    /// Tables removed by an explicit correction. Phase outputs cannot re-add
    /// them until a correction adds them back.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback_log: Vec<FeedbackEntry>,
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new(CheckpointMode::Active)
    }
}

impl TaskContext {
    pub fn new(default_mode: CheckpointMode) -> Self {
        Self {
            business_question: String::new(),
            expected_output_columns: Vec::new(),
            filters: Vec::new(),
            glossary_findings: BTreeMap::new(),
            selected_tables: Vec::new(),
            column_mapping: Vec::new(),
            join_conditions: Vec::new(),
            business_rules: Vec::new(),
            query_text: None,
            query_locked: false,
            test_report: None,
            optimized_query: None,
            optimization_notes: Vec::new(),
            documentation_notes: Vec::new(),
            phase: Phase::Requirements,
            checkpoint_modes: CheckpointId::all().map(|id| (id, default_mode)).collect(),
            exclusions: Vec::new(),
            feedback_log: Vec::new(),
        }
    }

    pub fn mode(&self, id: CheckpointId) -> CheckpointMode {
        self.checkpoint_modes.get(&id).copied().unwrap_or_default()
    }

    pub fn set_mode(&mut self, id: CheckpointId, mode: CheckpointMode) {
        self.checkpoint_modes.insert(id, mode);
    }

    /// The query the final documents should carry: the optimized rewrite when
    /// Phase 6 produced one, otherwise the Phase 4 query.
    pub fn final_query(&self) -> Option<&str> {
        self.optimized_query
            .as_deref()
            .or(self.query_text.as_deref())
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.selected_tables.iter().any(|t| t.matches(table))
    }

    fn is_excluded(&self, table: &SelectedTable) -> bool {
        self.exclusions.iter().any(|x| table.matches(x))
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    /// Pure form of [`merge_output`](Self::merge_output).
    pub fn merged(&self, output: &PhaseOutput) -> Result<TaskContext> {
        let mut next = self.clone();
        next.merge_output(output)?;
        Ok(next)
    }

    pub fn merge_output(&mut self, output: &PhaseOutput) -> Result<()> {
        match output {
            PhaseOutput::Requirements {
                business_question,
                expected_output_columns,
                filters,
                glossary_findings,
            } => {
                set_if_present(&mut self.business_question, business_question);
                for col in expected_output_columns {
                    self.push_output_column(col.clone());
                }
                for f in filters {
                    push_unique_text(&mut self.filters, f);
                }
                self.merge_glossary(glossary_findings);
            }
            PhaseOutput::Discovery {
                selected_tables,
                glossary_findings,
            } => {
                for t in selected_tables {
                    if self.is_excluded(t) {
                        tracing::debug!(table = %t.qualified_name(), "skipping excluded table");
                        continue;
                    }
                    self.push_table(t.clone());
                }
                self.merge_glossary(glossary_findings);
            }
            PhaseOutput::Mapping {
                column_mapping,
                join_conditions,
                business_rules,
            } => {
                for c in column_mapping {
                    self.push_column(c.clone());
                }
                for j in join_conditions {
                    self.push_join(j.clone());
                }
                for r in business_rules {
                    push_unique_text(&mut self.business_rules, r);
                }
            }
            PhaseOutput::QueryDesign { query_text } => {
                self.set_query(query_text)?;
            }
            PhaseOutput::Testing(report) => {
                self.test_report = Some(report.clone());
            }
            PhaseOutput::Optimization {
                optimized_query,
                notes,
            } => {
                if let Some(q) = optimized_query.as_deref().filter(|q| !q.trim().is_empty()) {
                    self.optimized_query = Some(q.to_string());
                }
                for n in notes {
                    push_unique_text(&mut self.optimization_notes, n);
                }
            }
            PhaseOutput::Documentation { notes } => {
                for n in notes {
                    push_unique_text(&mut self.documentation_notes, n);
                }
            }
        }
        Ok(())
    }

    /// Merge checkpoint feedback: apply every correction, then record the note.
    pub fn apply_feedback(
        &mut self,
        phase: Phase,
        checkpoint: Option<CheckpointId>,
        feedback: &Feedback,
    ) -> Result<()> {
        for correction in &feedback.corrections {
            self.apply_correction(correction)?;
        }
        if !feedback.is_empty() {
            self.feedback_log.push(FeedbackEntry {
                phase,
                checkpoint,
                note: feedback.describe(),
                at: Utc::now(),
            });
        }
        Ok(())
    }

    pub fn apply_correction(&mut self, correction: &Correction) -> Result<()> {
        match correction {
            Correction::SetBusinessQuestion { value } => {
                set_if_present(&mut self.business_question, value)
            }
            Correction::AddOutputColumn(col) => self.push_output_column(col.clone()),
            Correction::RemoveOutputColumn { name } => self
                .expected_output_columns
                .retain(|c| !c.name.eq_ignore_ascii_case(name)),
            Correction::AddFilter { value } => push_unique_text(&mut self.filters, value),
            Correction::RemoveFilter { value } => self.filters.retain(|f| f.trim() != value.trim()),
            Correction::AddTable(table) => {
                self.exclusions.retain(|x| !table.matches(x));
                self.push_table(table.clone());
            }
            Correction::RemoveTable { table } => {
                self.selected_tables.retain(|t| !t.matches(table));
                if !self.exclusions.iter().any(|x| x.eq_ignore_ascii_case(table)) {
                    self.exclusions.push(table.clone());
                }
            }
            Correction::AddColumn(col) => self.push_column(col.clone()),
            Correction::RemoveColumn { table, column } => {
                self.column_mapping.retain(|c| !c.same_key(table, column))
            }
            Correction::AddJoin(join) => self.push_join(join.clone()),
            Correction::RemoveJoin {
                from_table,
                to_table,
            } => self
                .join_conditions
                .retain(|j| !j.same_key(from_table, to_table)),
            Correction::AddRule { value } => push_unique_text(&mut self.business_rules, value),
            Correction::RemoveRule { value } => {
                self.business_rules.retain(|r| r.trim() != value.trim())
            }
            Correction::ReplaceQuery { query_text } => self.set_query(query_text)?,
        }
        Ok(())
    }

    fn set_query(&mut self, query_text: &str) -> Result<()> {
        if self.query_locked {
            return Err(DwhError::QueryLocked);
        }
        if !query_text.trim().is_empty() {
            self.query_text = Some(query_text.trim().to_string());
        }
        Ok(())
    }

    fn merge_glossary(&mut self, findings: &BTreeMap<String, GlossaryFinding>) {
        for (term, finding) in findings {
            self.glossary_findings
                .entry(term.clone())
                .and_modify(|existing| {
                    set_if_present(&mut existing.definition, &finding.definition);
                    set_if_present(&mut existing.calculation_method, &finding.calculation_method);
                    if finding.candidate_dwh_location.is_some() {
                        existing.candidate_dwh_location = finding.candidate_dwh_location.clone();
                    }
                })
                .or_insert_with(|| finding.clone());
        }
    }

    fn push_output_column(&mut self, col: OutputColumn) {
        match self
            .expected_output_columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&col.name))
        {
            Some(existing) => {
                set_if_present(&mut existing.description, &col.description);
                set_if_present(&mut existing.source, &col.source);
            }
            None => self.expected_output_columns.push(col),
        }
    }

    fn push_table(&mut self, table: SelectedTable) {
        match self
            .selected_tables
            .iter_mut()
            .find(|t| t.matches(&table.qualified_name()))
        {
            Some(existing) => {
                set_if_present(&mut existing.schema, &table.schema);
                set_if_present(&mut existing.description, &table.description);
                set_if_present(&mut existing.rationale, &table.rationale);
            }
            None => self.selected_tables.push(table),
        }
    }

    fn push_column(&mut self, col: ColumnMapping) {
        match self
            .column_mapping
            .iter_mut()
            .find(|c| c.same_key(&col.table, &col.column))
        {
            Some(existing) => {
                set_if_present(&mut existing.meaning, &col.meaning);
                set_if_present(&mut existing.role, &col.role);
                set_if_present(&mut existing.data_type, &col.data_type);
            }
            None => self.column_mapping.push(col),
        }
    }

    fn push_join(&mut self, join: JoinCondition) {
        match self
            .join_conditions
            .iter_mut()
            .find(|j| j.same_key(&join.from_table, &join.to_table))
        {
            Some(existing) => {
                set_if_present(&mut existing.condition, &join.condition);
                set_if_present(&mut existing.join_type, &join.join_type);
            }
            None => self.join_conditions.push(join),
        }
    }
}

fn set_if_present(slot: &mut String, value: &str) {
    if !value.trim().is_empty() {
        *slot = value.to_string();
    }
}

fn push_unique_text(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !list.iter().any(|v| v.trim() == value) {
        list.push(value.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery(tables: &[&str]) -> PhaseOutput {
        PhaseOutput::Discovery {
            selected_tables: tables.iter().map(|t| SelectedTable::parse(t)).collect(),
            glossary_findings: BTreeMap::new(),
        }
    }

    #[test]
    fn list_fields_are_append_only() {
        let mut ctx = TaskContext::default();
        ctx.merge_output(&discovery(&["DWH.FACT_SALES"])).unwrap();
        ctx.merge_output(&discovery(&["DWH.DIM_DATE"])).unwrap();
        assert_eq!(ctx.selected_tables.len(), 2);
        assert!(ctx.has_table("FACT_SALES"));
        assert!(ctx.has_table("dwh.dim_date"));
    }

    #[test]
    fn duplicate_items_are_merged_not_repeated() {
        let mut ctx = TaskContext::default();
        ctx.merge_output(&discovery(&["DWH.FACT_SALES"])).unwrap();
        let mut described = SelectedTable::new("DWH", "FACT_SALES");
        described.rationale = "holds revenue lines".to_string();
        ctx.merge_output(&PhaseOutput::Discovery {
            selected_tables: vec![described],
            glossary_findings: BTreeMap::new(),
        })
        .unwrap();
        assert_eq!(ctx.selected_tables.len(), 1);
        assert_eq!(ctx.selected_tables[0].rationale, "holds revenue lines");
    }

    #[test]
    fn empty_scalar_never_overwrites() {
        let mut ctx = TaskContext::default();
        ctx.merge_output(&PhaseOutput::Requirements {
            business_question: "Monthly revenue by region".to_string(),
            expected_output_columns: vec![],
            filters: vec!["year = 2024".to_string()],
            glossary_findings: BTreeMap::new(),
        })
        .unwrap();
        ctx.merge_output(&PhaseOutput::Requirements {
            business_question: String::new(),
            expected_output_columns: vec![],
            filters: vec![],
            glossary_findings: BTreeMap::new(),
        })
        .unwrap();
        assert_eq!(ctx.business_question, "Monthly revenue by region");
        assert_eq!(ctx.filters, vec!["year = 2024"]);
    }

    #[test]
    fn merged_leaves_original_untouched() {
        let ctx = TaskContext::default();
        let next = ctx.merged(&discovery(&["DWH.FACT_SALES"])).unwrap();
        assert!(ctx.selected_tables.is_empty());
        assert_eq!(next.selected_tables.len(), 1);
    }

    #[test]
    fn removed_table_stays_out_of_later_outputs() {
        let mut ctx = TaskContext::default();
        ctx.merge_output(&discovery(&["DWH.FACT_SALES", "DWH.DIM_PRODUCT"]))
            .unwrap();
        let fb = Feedback::note("remove DIM_PRODUCT").with(Correction::RemoveTable {
            table: "DIM_PRODUCT".to_string(),
        });
        ctx.apply_feedback(Phase::Discovery, CheckpointId::new(2).ok(), &fb)
            .unwrap();
        assert!(!ctx.has_table("DIM_PRODUCT"));

        // The regenerated output still proposes the table; it must not come back.
        ctx.merge_output(&discovery(&["DWH.FACT_SALES", "DWH.DIM_PRODUCT"]))
            .unwrap();
        assert!(!ctx.has_table("DIM_PRODUCT"));
        assert_eq!(ctx.feedback_log.len(), 1);
        assert_eq!(ctx.feedback_log[0].note, "remove DIM_PRODUCT");
    }

    #[test]
    fn explicit_add_lifts_exclusion() {
        let mut ctx = TaskContext::default();
        ctx.apply_correction(&Correction::RemoveTable {
            table: "DIM_PRODUCT".to_string(),
        })
        .unwrap();
        ctx.apply_correction(&Correction::AddTable(SelectedTable::new("DWH", "DIM_PRODUCT")))
            .unwrap();
        assert!(ctx.has_table("DIM_PRODUCT"));
        assert!(ctx.exclusions.is_empty());
    }

    #[test]
    fn locked_query_rejects_changes() {
        let mut ctx = TaskContext::default();
        ctx.merge_output(&PhaseOutput::QueryDesign {
            query_text: "SELECT 1 FROM dual".to_string(),
        })
        .unwrap();
        ctx.query_locked = true;
        let err = ctx
            .apply_correction(&Correction::ReplaceQuery {
                query_text: "SELECT 2 FROM dual".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DwhError::QueryLocked));
        assert_eq!(ctx.query_text.as_deref(), Some("SELECT 1 FROM dual"));
    }

    #[test]
    fn optimization_does_not_touch_query_text() {
        let mut ctx = TaskContext::default();
        ctx.query_text = Some("SELECT a FROM t".to_string());
        ctx.query_locked = true;
        ctx.merge_output(&PhaseOutput::Optimization {
            optimized_query: Some("SELECT a FROM t WHERE p = 1".to_string()),
            notes: vec!["partition filter".to_string()],
        })
        .unwrap();
        assert_eq!(ctx.query_text.as_deref(), Some("SELECT a FROM t"));
        assert_eq!(ctx.final_query(), Some("SELECT a FROM t WHERE p = 1"));
    }

    #[test]
    fn phase_output_yaml_is_tagged() {
        let yaml = r#"
phase: mapping
column_mapping:
  - table: FACT_SALES
    column: AMOUNT
    meaning: net revenue
    role: measure
    data_type: NUMBER(18,2)
join_conditions:
  - from_table: FACT_SALES
    to_table: DIM_DATE
    condition: FACT_SALES.DATE_KEY = DIM_DATE.DATE_KEY
"#;
        let out: PhaseOutput = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(out.phase(), Phase::Mapping);
        match out {
            PhaseOutput::Mapping {
                join_conditions, ..
            } => assert_eq!(join_conditions[0].join_type, "INNER"),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn correction_yaml_is_tagged() {
        let yaml = "op: add_table\nschema: DWH\ntable: DIM_PRODUCT\n";
        let c: Correction = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            c,
            Correction::AddTable(SelectedTable::new("DWH", "DIM_PRODUCT"))
        );
    }
}
