//! Knowledge-base notes about tables learned during discovery and mapping.

use crate::collaborator::{DocumentStore, Relationship, TableInfo};
use crate::error::Result;
use crate::paths;
use crate::render::md_table;

/// Markdown note for one table, from `inspect_table` output.
pub fn table_note(source_db: &str, info: &TableInfo) -> String {
    let mut parts = vec![format!("# {}.{}.{}", source_db, info.schema, info.table)];
    if !info.comment.trim().is_empty() {
        parts.push(format!("> {}", info.comment.trim()));
    }

    let rows: Vec<Vec<String>> = info
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            vec![
                (i + 1).to_string(),
                c.name.clone(),
                c.data_type.clone(),
                if c.nullable { "Y" } else { "N" }.to_string(),
                c.comment.clone(),
            ]
        })
        .collect();
    parts.push(format!(
        "## Columns\n\n{}",
        md_table(&["#", "Column", "Type", "Nullable", "Comment"], &rows)
    ));

    parts.push(if info.indexes.is_empty() {
        "## Indexes\n\n_No indexes._".to_string()
    } else {
        format!("## Indexes\n\n{}", list(&info.indexes))
    });

    parts.push(if info.partitions.is_empty() {
        "## Partitions\n\n_Not partitioned._".to_string()
    } else {
        format!(
            "## Partitions\n\n{} partition(s)\n\n{}",
            info.partitions.len(),
            list(&info.partitions)
        )
    });

    if !info.stats.is_empty() {
        let lines: Vec<String> = info
            .stats
            .iter()
            .map(|(k, v)| format!("- **{k}:** {v}"))
            .collect();
        parts.push(format!("## Statistics\n\n{}", lines.join("\n")));
    }

    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

/// Markdown note for a set of related tables and how they join.
pub fn relationship_note(source_db: &str, tables: &[String], relationships: &[Relationship]) -> String {
    let mut parts = vec![
        format!("# {source_db}: {}", tables.join(" + ")),
        format!("## Tables\n\n{}", list(tables)),
    ];
    if relationships.is_empty() {
        parts.push("## Relationships\n\n_No relationships found._".to_string());
    } else {
        let rows: Vec<Vec<String>> = relationships
            .iter()
            .map(|r| vec![r.from_table.clone(), r.to_table.clone(), r.condition.clone()])
            .collect();
        parts.push(format!(
            "## Relationships\n\n{}",
            md_table(&["From", "To", "Condition"], &rows)
        ));
    }
    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

/// Write the single-table note; returns the store path.
pub fn write_table_note(
    store: &dyn DocumentStore,
    source_db: &str,
    info: &TableInfo,
) -> Result<String> {
    let path = paths::knowledge_single_path(source_db, &info.schema, &info.table);
    store.write_document(&path, &table_note(source_db, info))?;
    Ok(path)
}

/// Write the multi-table note; returns the store path.
pub fn write_relationship_note(
    store: &dyn DocumentStore,
    source_db: &str,
    tables: &[String],
    relationships: &[Relationship],
) -> Result<String> {
    let names: Vec<&str> = tables.iter().map(String::as_str).collect();
    let path = paths::knowledge_multi_path(source_db, &names);
    store.write_document(&path, &relationship_note(source_db, tables, relationships))?;
    Ok(path)
}

fn list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}
