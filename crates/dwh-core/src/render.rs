//! Markdown and SQL documents produced for a task.
//!
//! Everything here is a pure function of the task context, so a summary
//! rendered for a skipped checkpoint is byte-identical to the one an active
//! checkpoint would have shown.

use crate::checkpoint::CheckpointSummary;
use crate::context::TaskContext;
use crate::types::{CheckpointId, Phase};
use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Markdown helpers
// ---------------------------------------------------------------------------

fn cell(s: &str) -> String {
    let s = s.trim().replace('|', "\\|").replace('\n', " ");
    if s.is_empty() {
        "-".to_string()
    } else {
        s
    }
}

pub(crate) fn md_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(format!("| {} |", headers.join(" | ")));
    out.push(format!(
        "|{}|",
        headers.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    ));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| cell(c)).collect();
        out.push(format!("| {} |", cells.join(" | ")));
    }
    out.join("\n")
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_placeholder(s: &str) -> &str {
    if s.trim().is_empty() {
        "_Not captured yet._"
    } else {
        s.trim()
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn requirements_section(ctx: &TaskContext) -> String {
    let mut parts = vec![format!(
        "## Business question\n\n{}",
        or_placeholder(&ctx.business_question)
    )];

    if !ctx.expected_output_columns.is_empty() {
        let rows: Vec<Vec<String>> = ctx
            .expected_output_columns
            .iter()
            .map(|c| vec![c.name.clone(), c.description.clone(), c.source.clone()])
            .collect();
        parts.push(format!(
            "## Expected output\n\n{}",
            md_table(&["Column", "Description", "Source"], &rows)
        ));
    }

    if !ctx.filters.is_empty() {
        parts.push(format!("## Filters\n\n{}", bullets(&ctx.filters)));
    }

    if !ctx.glossary_findings.is_empty() {
        let rows: Vec<Vec<String>> = ctx
            .glossary_findings
            .iter()
            .map(|(term, f)| {
                vec![
                    term.clone(),
                    f.definition.clone(),
                    f.calculation_method.clone(),
                    f.candidate_dwh_location.clone().unwrap_or_default(),
                ]
            })
            .collect();
        parts.push(format!(
            "## Glossary\n\n{}",
            md_table(&["Term", "Definition", "Calculation", "DWH location"], &rows)
        ));
    }

    parts.join("\n\n")
}

fn tables_section(ctx: &TaskContext) -> String {
    let mut parts = Vec::new();
    if ctx.selected_tables.is_empty() {
        parts.push("## Selected tables\n\n_None selected yet._".to_string());
    } else {
        let rows: Vec<Vec<String>> = ctx
            .selected_tables
            .iter()
            .map(|t| vec![t.qualified_name(), t.description.clone(), t.rationale.clone()])
            .collect();
        parts.push(format!(
            "## Selected tables\n\n{}",
            md_table(&["Table", "Description", "Why"], &rows)
        ));
    }
    if !ctx.exclusions.is_empty() {
        parts.push(format!("Excluded by review: {}", ctx.exclusions.join(", ")));
    }
    parts.join("\n\n")
}

fn mapping_section(ctx: &TaskContext) -> String {
    let mut parts = Vec::new();

    if ctx.column_mapping.is_empty() {
        parts.push("## Column mapping\n\n_No columns mapped yet._".to_string());
    } else {
        let rows: Vec<Vec<String>> = ctx
            .column_mapping
            .iter()
            .map(|c| {
                vec![
                    c.table.clone(),
                    c.column.clone(),
                    c.data_type.clone(),
                    c.role.clone(),
                    c.meaning.clone(),
                ]
            })
            .collect();
        parts.push(format!(
            "## Column mapping\n\n{}",
            md_table(&["Table", "Column", "Type", "Role", "Meaning"], &rows)
        ));
    }

    if !ctx.join_conditions.is_empty() {
        let rows: Vec<Vec<String>> = ctx
            .join_conditions
            .iter()
            .map(|j| {
                vec![
                    j.from_table.clone(),
                    j.join_type.clone(),
                    j.to_table.clone(),
                    j.condition.clone(),
                ]
            })
            .collect();
        parts.push(format!(
            "## Joins\n\n{}",
            md_table(&["From", "Join", "To", "Condition"], &rows)
        ));
    }

    if !ctx.business_rules.is_empty() {
        parts.push(format!("## Business rules\n\n{}", bullets(&ctx.business_rules)));
    }

    parts.join("\n\n")
}

fn sql_block(sql: &str) -> String {
    format!("```sql\n{}\n```", sql.trim())
}

// ---------------------------------------------------------------------------
// Checkpoint summaries
// ---------------------------------------------------------------------------

/// The artifact presented at checkpoint `id`.
pub fn checkpoint_summary(id: CheckpointId, ctx: &TaskContext) -> CheckpointSummary {
    let section = match id.phase() {
        Phase::Requirements => requirements_section(ctx),
        Phase::Discovery => tables_section(ctx),
        Phase::Mapping => mapping_section(ctx),
        _ => {
            let query = ctx
                .query_text
                .as_deref()
                .map(sql_block)
                .unwrap_or_else(|| "_No query yet._".to_string());
            let tables: Vec<String> = ctx
                .selected_tables
                .iter()
                .map(|t| t.qualified_name())
                .collect();
            format!(
                "## Query\n\n{query}\n\nTables: {}",
                if tables.is_empty() {
                    "-".to_string()
                } else {
                    tables.join(", ")
                }
            )
        }
    };

    let title = format!("Checkpoint {}: {}", id, id.title());
    let body = format!(
        "# {title}\n\n{section}\n\nApprove to continue, or reject with feedback to revise phase {}.\n",
        id.phase().number()
    );
    CheckpointSummary {
        checkpoint: id,
        title,
        body,
    }
}

// ---------------------------------------------------------------------------
// Task documents
// ---------------------------------------------------------------------------

/// `{folder}-brief.md`. Grows with the task; the Phase 7 version carries the
/// final query and test outcome.
pub fn brief(task_name: &str, folder: &str, date: NaiveDate, ctx: &TaskContext) -> String {
    let mut parts = vec![
        format!("# {task_name}"),
        format!(
            "- **Task folder:** `{folder}`\n- **Date:** {}\n- **Phase:** {} ({}/7)",
            date.format("%Y-%m-%d"),
            ctx.phase.title(),
            ctx.phase.number()
        ),
        requirements_section(ctx),
    ];

    if !ctx.selected_tables.is_empty() {
        parts.push(tables_section(ctx));
    }

    if let Some(report) = &ctx.test_report {
        let mut lines = vec![
            format!("- Explain plan: {}", if report.explain_ok { "ok" } else { "failed" }),
            format!("- Sample rows: {}", report.sample_row_count),
            format!("- Result: {}", if report.passed { "passed" } else { "failed" }),
        ];
        lines.extend(report.notes.iter().map(|n| format!("- {n}")));
        parts.push(format!("## Testing\n\n{}", lines.join("\n")));
    }

    if !ctx.optimization_notes.is_empty() {
        parts.push(format!(
            "## Optimization\n\n{}",
            bullets(&ctx.optimization_notes)
        ));
    }

    if let Some(query) = ctx.final_query() {
        parts.push(format!("## Final query\n\n{}", sql_block(query)));
    }

    if !ctx.documentation_notes.is_empty() {
        parts.push(format!("## Notes\n\n{}", bullets(&ctx.documentation_notes)));
    }

    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

/// `{folder}-data-mapping.md`
pub fn data_mapping(folder: &str, ctx: &TaskContext) -> String {
    format!(
        "# Data mapping: {folder}\n\n{}\n\n{}\n",
        tables_section(ctx),
        mapping_section(ctx)
    )
}

/// `{folder}_query.sql`: header comment plus the final query.
pub fn query_file(folder: &str, ctx: &TaskContext) -> Option<String> {
    let query = ctx.final_query()?;
    let mut header = vec![format!("-- Task: {folder}")];
    let question = ctx.business_question.trim();
    if !question.is_empty() {
        header.push(format!("-- Question: {}", question.replace('\n', " ")));
    }
    if !ctx.selected_tables.is_empty() {
        let tables: Vec<String> = ctx
            .selected_tables
            .iter()
            .map(|t| t.qualified_name())
            .collect();
        header.push(format!("-- Tables: {}", tables.join(", ")));
    }
    for note in &ctx.optimization_notes {
        header.push(format!("-- Optimization: {note}"));
    }

    let body = query.trim();
    let terminator = if body.ends_with(';') { "" } else { ";" };
    Some(format!("{}\n\n{body}{terminator}\n", header.join("\n")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ColumnMapping, OutputColumn, SelectedTable};

    fn ctx() -> TaskContext {
        let mut ctx = TaskContext::default();
        ctx.business_question = "Monthly revenue by product".to_string();
        ctx.expected_output_columns.push(OutputColumn {
            name: "month".to_string(),
            description: "calendar month".to_string(),
            source: "DIM_DATE".to_string(),
        });
        ctx.selected_tables
            .push(SelectedTable::new("SALES", "FACT_ORDERS"));
        ctx.column_mapping.push(ColumnMapping {
            table: "FACT_ORDERS".to_string(),
            column: "AMOUNT".to_string(),
            meaning: "net amount | VAT excluded".to_string(),
            role: "measure".to_string(),
            data_type: "NUMBER".to_string(),
        });
        ctx.query_text = Some("SELECT SUM(amount) FROM sales.fact_orders".to_string());
        ctx
    }

    #[test]
    fn summaries_cover_each_checkpoint() {
        let ctx = ctx();
        let s1 = checkpoint_summary(CheckpointId::new(1).unwrap(), &ctx);
        assert!(s1.title.starts_with("Checkpoint 1"));
        assert!(s1.body.contains("Monthly revenue by product"));

        let s2 = checkpoint_summary(CheckpointId::new(2).unwrap(), &ctx);
        assert!(s2.body.contains("SALES.FACT_ORDERS"));

        let s3 = checkpoint_summary(CheckpointId::new(3).unwrap(), &ctx);
        assert!(s3.body.contains("net amount \\| VAT excluded"));

        let s4 = checkpoint_summary(CheckpointId::new(4).unwrap(), &ctx);
        assert!(s4.body.contains("```sql\nSELECT SUM(amount)"));
    }

    #[test]
    fn summary_ignores_checkpoint_mode() {
        let mut active = ctx();
        let mut skipped = ctx();
        let id = CheckpointId::new(2).unwrap();
        active.set_mode(id, crate::types::CheckpointMode::Active);
        skipped.set_mode(id, crate::types::CheckpointMode::Skipped);
        assert_eq!(
            checkpoint_summary(id, &active),
            checkpoint_summary(id, &skipped)
        );
    }

    #[test]
    fn brief_placeholder_when_question_missing() {
        let ctx = TaskContext::default();
        let date = NaiveDate::from_ymd_opt(2025, 2, 22).unwrap();
        let out = brief("monthly-revenue", "2025-02-22_monthly-revenue", date, &ctx);
        assert!(out.starts_with("# monthly-revenue\n"));
        assert!(out.contains("_Not captured yet._"));
        assert!(!out.contains("## Final query"));
    }

    #[test]
    fn query_file_prefers_optimized_query() {
        let mut ctx = ctx();
        ctx.optimized_query =
            Some("SELECT SUM(amount) FROM sales.fact_orders WHERE part_month >= 202401".into());
        ctx.optimization_notes.push("partition filter on part_month".into());
        let out = query_file("2025-02-22_monthly-revenue", &ctx).unwrap();
        assert!(out.starts_with("-- Task: 2025-02-22_monthly-revenue\n"));
        assert!(out.contains("-- Optimization: partition filter on part_month"));
        assert!(out.ends_with("WHERE part_month >= 202401;\n"));
    }

    #[test]
    fn query_file_absent_without_query() {
        assert!(query_file("x", &TaskContext::default()).is_none());
    }

    #[test]
    fn data_mapping_lists_tables_and_columns() {
        let out = data_mapping("2025-02-22_monthly-revenue", &ctx());
        assert!(out.starts_with("# Data mapping: 2025-02-22_monthly-revenue"));
        assert!(out.contains("| FACT_ORDERS | AMOUNT | NUMBER | measure |"));
    }
}
