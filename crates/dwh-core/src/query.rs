//! Read-only statement guard and query result rendering.

use crate::error::{DwhError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Read-only guard
// ---------------------------------------------------------------------------

/// Accept only a single `SELECT` or `WITH` statement.
///
/// Leading comments and whitespace are ignored, as is one trailing `;`.
/// Semicolons inside string literals or comments do not count as statement
/// separators.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let code = strip_comments_and_literals(sql);
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(DwhError::ReadOnlyViolation("empty statement".to_string()));
    }

    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(DwhError::ReadOnlyViolation(
            "multiple statements are not allowed".to_string(),
        ));
    }

    let first: String = body
        .chars()
        .skip_while(|c| *c == '(')
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    match first.as_str() {
        "SELECT" | "WITH" => Ok(()),
        "" => Err(DwhError::ReadOnlyViolation(
            "statement does not start with a keyword".to_string(),
        )),
        other => {
            tracing::warn!(keyword = other, "query rejected: not read-only");
            Err(DwhError::ReadOnlyViolation(format!(
                "only SELECT or WITH statements may run, got {other}"
            )))
        }
    }
}

/// Replace comments and quoted string literals with spaces.
fn strip_comments_and_literals(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            out.push(' ');
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
            out.push(' ');
        } else if c == '\'' {
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            i += 1;
            out.push_str("''");
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// QueryResult
// ---------------------------------------------------------------------------

/// Rows returned by a guarded sample run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    #[serde(default)]
    pub execution_time_ms: f64,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<u32>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms: 0.0,
            truncated: false,
            row_limit: None,
        }
    }

    /// Cap the rows at `limit` and record whether anything was cut.
    pub fn limited(mut self, limit: u32) -> Self {
        let limit_usize = limit as usize;
        if self.rows.len() > limit_usize {
            self.rows.truncate(limit_usize);
            self.truncated = true;
        }
        self.row_count = self.rows.len();
        self.row_limit = Some(limit);
        self
    }

    fn footer(&self) -> String {
        let mut footer = format!(
            "({} rows, {:.1} ms)",
            self.row_count, self.execution_time_ms
        );
        if self.truncated {
            match self.row_limit {
                Some(limit) => footer.push_str(&format!(
                    "\nResult truncated at the row limit of {limit}."
                )),
                None => footer.push_str("\nResult truncated."),
            }
        }
        footer
    }

    fn cells(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }

    pub fn to_text(&self) -> String {
        if self.columns.is_empty() {
            return format!("Query executed; no columns returned.\n{}", self.footer());
        }
        let cells = self.cells();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let line = |values: &[String]| -> String {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let w = widths.get(i).copied().unwrap_or(0);
                    format!("{v:<w$}")
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = Vec::with_capacity(cells.len() + 3);
        out.push(line(&self.columns));
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &cells {
            out.push(line(row));
        }
        out.push(self.footer());
        out.join("\n")
    }

    pub fn to_markdown(&self) -> String {
        if self.columns.is_empty() {
            return format!("_No columns returned._\n\n{}", self.footer());
        }
        let mut out = Vec::with_capacity(self.rows.len() + 4);
        out.push(format!("| {} |", self.columns.join(" | ")));
        out.push(format!(
            "|{}|",
            self.columns.iter().map(|_| "---").collect::<Vec<_>>().join("|")
        ));
        for row in self.cells() {
            let escaped: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
            out.push(format!("| {} |", escaped.join(" | ")));
        }
        out.push(String::new());
        out.push(self.footer());
        out.join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
