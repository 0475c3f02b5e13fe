use crate::classifier::Classification;
use crate::task::Task;
use crate::types::ActionType;

// ---------------------------------------------------------------------------
// completion_steps
// ---------------------------------------------------------------------------

pub fn completion_steps(c: &Classification) -> Vec<String> {
    let folder = &c.folder;
    match c.action {
        ActionType::Done => Vec::new(),
        ActionType::WaitForApproval => {
            let k = c.checkpoint.map(|id| id.get()).unwrap_or(0);
            vec![
                format!("dwh checkpoint approve {folder} {k}"),
                format!("dwh checkpoint reject {folder} {k} --feedback \"...\""),
                format!("dwh next --for {folder} --json"),
            ]
        }
        ActionType::TestQuery => vec![
            format!("dwh query check {folder}"),
            format!("dwh phase complete {folder} --file <testing.yaml>"),
            format!("dwh next --for {folder} --json"),
        ],
        _ => vec![
            format!("dwh phase complete {folder} --file <output.yaml>"),
            format!("dwh next --for {folder} --json"),
        ],
    }
}

// ---------------------------------------------------------------------------
// build_directive
// ---------------------------------------------------------------------------

/// Markdown instructions for whoever works the task next.
pub fn build_directive(c: &Classification, task: &Task) -> String {
    let mut doc = String::new();

    doc.push_str(&format!("# Directive: {}\n\n", c.folder));
    doc.push_str(&format!("**Action:** {}\n", c.action));
    doc.push_str(&format!(
        "**Phase:** {} ({}/7)\n",
        c.current_phase,
        c.current_phase.number()
    ));
    let output_display = c.output_path.as_deref().unwrap_or("-");
    doc.push_str(&format!("**Output:** {output_display}\n\n"));

    doc.push_str("## Task\n\n");
    doc.push_str(&c.message);
    doc.push('\n');

    if let Some(id) = c.checkpoint {
        let cp = task.checkpoint(id);
        if let Some(summary) = cp.summary.as_ref().filter(|_| c.action == ActionType::WaitForApproval) {
            doc.push_str("\n## Checkpoint summary\n\n");
            doc.push_str(&summary.body);
            if !summary.body.ends_with('\n') {
                doc.push('\n');
            }
        }
    }

    let modes: Vec<String> = task
        .context
        .checkpoint_modes
        .iter()
        .map(|(id, mode)| format!("CP{id}={mode}"))
        .collect();
    doc.push_str("\n## Context\n\n");
    doc.push_str(&format!("- **Task folder:** {}\n", c.folder));
    doc.push_str(&format!("- **Checkpoints:** {}\n", modes.join(", ")));
    if !task.context.business_question.trim().is_empty() {
        doc.push_str(&format!(
            "- **Question:** {}\n",
            task.context.business_question.trim()
        ));
    }
    if c.touches_database {
        doc.push_str("- Database access is read-only; PII columns only inside COUNT/MIN/MAX.\n");
    }

    let steps = completion_steps(c);
    if !steps.is_empty() {
        doc.push_str("\n## On Completion\n\n");
        doc.push_str("Run these commands in order:\n");
        for (i, step) in steps.iter().enumerate() {
            doc.push_str(&format!("{}. `{step}`\n", i + 1));
        }
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::collaborator::FsDocumentStore;
    use crate::config::Config;
    use crate::context::PhaseOutput;
    use crate::types::CheckpointMode;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn waiting_directive_embeds_summary() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("analytics");
        let store = FsDocumentStore::new(dir.path());
        let mut task = Task::new(
            "monthly-revenue",
            NaiveDate::from_ymd_opt(2025, 2, 22).unwrap(),
            CheckpointMode::Active,
        );
        task.complete_phase(
            PhaseOutput::Requirements {
                business_question: "Monthly revenue per product".to_string(),
                expected_output_columns: vec![],
                filters: vec![],
                glossary_findings: BTreeMap::new(),
            },
            &cfg,
            &store,
        )
        .unwrap();

        let c = classify(&task, &cfg);
        let doc = build_directive(&c, &task);
        assert!(doc.starts_with("# Directive: 2025-02-22_monthly-revenue\n"));
        assert!(doc.contains("**Action:** wait_for_approval"));
        assert!(doc.contains("## Checkpoint summary"));
        assert!(doc.contains("Monthly revenue per product"));
        assert!(doc.contains("CP1=active"));
        assert!(doc.contains("1. `dwh checkpoint approve 2025-02-22_monthly-revenue 1`"));
    }

    #[test]
    fn done_has_no_steps() {
        let mut task = Task::new(
            "x",
            NaiveDate::from_ymd_opt(2025, 2, 22).unwrap(),
            CheckpointMode::Active,
        );
        task.status = crate::types::PhaseStatus::Complete;
        let c = classify(&task, &Config::new("analytics"));
        assert!(completion_steps(&c).is_empty());
        assert!(!build_directive(&c, &task).contains("On Completion"));
    }
}
