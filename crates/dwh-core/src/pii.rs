//! PII guard.
//!
//! A query may not project a PII column unless the column only appears inside
//! an allowed aggregate (COUNT, MIN, MAX by default). The set of PII columns
//! is configuration, injected as a [`PiiPolicy`].
//!
//! The check is lexical: comments and string literals are dropped, every
//! `SELECT` projection list is scanned, and column references are resolved
//! against the tables and aliases named in `FROM`/`JOIN` clauses. Anything
//! that cannot be resolved is treated as a match.

use crate::error::{DwhError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiColumn {
    /// Owning table. `None` flags the column name in every table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PiiColumn {
    pub fn new(table: Option<&str>, column: &str) -> Self {
        Self {
            table: table.map(str::to_string),
            column: column.to_string(),
            reason: None,
        }
    }

    /// Upper-cased `TABLE.COLUMN` (or `COLUMN`) used in reports.
    pub fn key(&self) -> String {
        match &self.table {
            Some(t) => format!("{}.{}", t.trim(), self.column.trim()).to_ascii_uppercase(),
            None => self.column.trim().to_ascii_uppercase(),
        }
    }

    fn table_upper(&self) -> Option<String> {
        self.table.as_ref().map(|t| bare_name(t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiPolicy {
    #[serde(default)]
    pub columns: Vec<PiiColumn>,
    #[serde(default = "default_aggregates")]
    pub allowed_aggregates: Vec<String>,
}

fn default_aggregates() -> Vec<String> {
    vec!["COUNT".to_string(), "MIN".to_string(), "MAX".to_string()]
}

impl Default for PiiPolicy {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            allowed_aggregates: default_aggregates(),
        }
    }
}

impl PiiPolicy {
    pub fn new(columns: Vec<PiiColumn>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Fail with [`DwhError::PiiViolation`] if `sql` exposes a PII column.
    pub fn check(&self, sql: &str) -> Result<()> {
        let columns = self.violations(sql);
        if columns.is_empty() {
            return Ok(());
        }
        tracing::warn!(columns = ?columns, "query rejected: unaggregated PII");
        Err(DwhError::PiiViolation { columns })
    }

    /// Keys of every PII column the query projects without aggregation.
    pub fn violations(&self, sql: &str) -> Vec<String> {
        if self.columns.is_empty() {
            return Vec::new();
        }
        let tokens = tokenize(sql);
        let tables = table_refs(&tokens);
        let aggregates: Vec<String> = self
            .allowed_aggregates
            .iter()
            .map(|a| a.trim().to_ascii_uppercase())
            .collect();

        let mut found: Vec<String> = Vec::new();
        let mut record = |key: String| {
            if !found.contains(&key) {
                found.push(key);
            }
        };

        for (i, tok) in tokens.iter().enumerate() {
            if !tok.is_word("SELECT") {
                continue;
            }
            for item in projection(&tokens, i + 1, &aggregates) {
                match item {
                    Projected::Column { qualifier, name } => {
                        for col in &self.columns {
                            if col.column.trim().eq_ignore_ascii_case(&name)
                                && tables.owns(col, qualifier.as_deref())
                            {
                                record(col.key());
                            }
                        }
                    }
                    Projected::Star { qualifier } => {
                        for col in &self.columns {
                            if tables.owns(col, qualifier.as_deref()) {
                                record(col.key());
                            }
                        }
                    }
                }
            }
        }
        found
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Literal,
    Sym(char),
}

impl Token {
    fn is_word(&self, kw: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(kw))
    }

    fn word_upper(&self) -> Option<String> {
        match self {
            Token::Word(w) => Some(w.to_ascii_uppercase()),
            _ => None,
        }
    }
}

fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
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
            tokens.push(Token::Literal);
        } else if c == '"' || c == '`' || c == '[' {
            let close = if c == '[' { ']' } else { c };
            let start = i + 1;
            i = start;
            while i < chars.len() && chars[i] != close {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i.min(chars.len())].iter().collect()));
            i += 1;
        } else if is_word_char(c) {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Sym(c));
            i += 1;
        }
    }
    tokens
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '#'
}

const KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "ALL", "AS", "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "BY",
    "UNION", "INTERSECT", "EXCEPT", "MINUS", "LIMIT", "FETCH", "OFFSET", "INTO", "JOIN", "LEFT",
    "RIGHT", "INNER", "OUTER", "FULL", "CROSS", "ON", "USING", "CASE", "WHEN", "THEN", "ELSE",
    "END", "AND", "OR", "NOT", "NULL", "IS", "IN", "LIKE", "BETWEEN", "OVER", "PARTITION", "ASC",
    "DESC", "TOP", "TRUE", "FALSE", "INTERVAL", "WITH", "WINDOW",
];

const PROJECTION_END: &[&str] = &[
    "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "INTERSECT", "EXCEPT", "MINUS", "LIMIT",
    "FETCH", "INTO",
];

fn is_keyword(upper: &str) -> bool {
    KEYWORDS.contains(&upper)
}

fn bare_name(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).trim().to_ascii_uppercase()
}

/// Index just past the parenthesis group that opens at `open`.
fn skip_group(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0i32;
    let mut i = open;
    while i < tokens.len() {
        match tokens[i] {
            Token::Sym('(') => depth += 1,
            Token::Sym(')') => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    tokens.len()
}

// ---------------------------------------------------------------------------
// Table references
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TableRefs {
    tables: Vec<String>,
    aliases: HashMap<String, String>,
}

impl TableRefs {
    fn references(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Does a reference with this qualifier point at `col`'s table?
    fn owns(&self, col: &PiiColumn, qualifier: Option<&str>) -> bool {
        let Some(table) = col.table_upper() else {
            return true;
        };
        match qualifier {
            None => self.references(&table),
            Some(q) => match self.aliases.get(q) {
                Some(resolved) => *resolved == table,
                None if self.references(q) => q == table,
                // Unknown qualifier (derived table, CTE): stay conservative.
                None => self.references(&table),
            },
        }
    }
}

fn table_refs(tokens: &[Token]) -> TableRefs {
    let mut refs = TableRefs::default();
    let mut i = 0;
    while i < tokens.len() {
        let from = tokens[i].is_word("FROM");
        if from || tokens[i].is_word("JOIN") {
            let mut j = i + 1;
            loop {
                j = parse_table_ref(tokens, j, &mut refs);
                if from && matches!(tokens.get(j), Some(Token::Sym(','))) {
                    j += 1;
                    continue;
                }
                break;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    refs
}

fn parse_table_ref(tokens: &[Token], start: usize, refs: &mut TableRefs) -> usize {
    let mut j = start;
    let table = match tokens.get(j) {
        // Derived table: keep scanning inside it for its own FROM/JOIN.
        Some(Token::Sym('(')) => return j + 1,
        Some(Token::Word(w)) if !is_keyword(&w.to_ascii_uppercase()) => {
            let mut name = w.to_ascii_uppercase();
            j += 1;
            while matches!(tokens.get(j), Some(Token::Sym('.'))) {
                match tokens.get(j + 1).and_then(Token::word_upper) {
                    Some(part) => {
                        name = part;
                        j += 2;
                    }
                    None => break,
                }
            }
            Some(name)
        }
        _ => return j,
    };

    if tokens.get(j).is_some_and(|t| t.is_word("AS")) {
        j += 1;
    }
    let alias = match tokens.get(j).and_then(Token::word_upper) {
        Some(a) if !is_keyword(&a) => {
            j += 1;
            Some(a)
        }
        _ => None,
    };

    if let Some(table) = table {
        if let Some(alias) = alias {
            refs.aliases.insert(alias, table.clone());
        }
        if !refs.tables.contains(&table) {
            refs.tables.push(table);
        }
    }
    j
}

// ---------------------------------------------------------------------------
// Projection scan
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Projected {
    Column {
        qualifier: Option<String>,
        name: String,
    },
    Star {
        qualifier: Option<String>,
    },
}

/// Column references in the projection list starting at `start` that are not
/// wrapped in an allowed aggregate.
fn projection(tokens: &[Token], start: usize, aggregates: &[String]) -> Vec<Projected> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    // Depth at which the enclosing allowed aggregate closes.
    let mut aggregate_depth: Option<i32> = None;
    let mut i = start;

    while i < tokens.len() {
        let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
        let next = tokens.get(i + 1);
        match &tokens[i] {
            Token::Sym('(') => {
                if next.is_some_and(|t| t.is_word("SELECT")) {
                    i = skip_group(tokens, i);
                    continue;
                }
                depth += 1;
            }
            Token::Sym(')') => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                if aggregate_depth == Some(depth) {
                    aggregate_depth = None;
                }
            }
            Token::Sym('*') if aggregate_depth.is_none() => {
                if is_select_star(prev, next) {
                    out.push(Projected::Star {
                        qualifier: qualifier_before(tokens, i),
                    });
                }
            }
            Token::Word(w) => {
                let upper = w.to_ascii_uppercase();
                if depth == 0 && PROJECTION_END.contains(&upper.as_str()) {
                    break;
                }
                let calls = matches!(next, Some(Token::Sym('(')));
                if aggregate_depth.is_some() {
                    // inside an allowed aggregate
                } else if calls {
                    if aggregates.contains(&upper) {
                        aggregate_depth = Some(depth);
                    }
                } else if !is_keyword(&upper)
                    && !is_alias_position(prev)
                    && !matches!(next, Some(Token::Sym('.')))
                    && !upper.starts_with(|c: char| c.is_ascii_digit())
                {
                    out.push(Projected::Column {
                        qualifier: qualifier_before(tokens, i),
                        name: upper,
                    });
                }
            }
            _ => {}
        }
        i += 1;
    }
    out
}

fn qualifier_before(tokens: &[Token], i: usize) -> Option<String> {
    if i >= 2 && tokens[i - 1] == Token::Sym('.') {
        tokens[i - 2].word_upper()
    } else {
        None
    }
}

/// A word directly after `AS`, a closing paren, a literal or another plain
/// word is a column alias, not a reference. A number does not start an
/// alias: in `TOP 10 email` the column is still a reference.
fn is_alias_position(prev: Option<&Token>) -> bool {
    match prev {
        Some(Token::Sym(')')) | Some(Token::Literal) => true,
        Some(Token::Word(w)) if w.starts_with(|c: char| c.is_ascii_digit()) => false,
        Some(Token::Word(w)) => {
            let upper = w.to_ascii_uppercase();
            upper == "AS" || !is_keyword(&upper)
        }
        _ => false,
    }
}

fn is_select_star(prev: Option<&Token>, next: Option<&Token>) -> bool {
    let after_ok = match prev {
        Some(Token::Sym(',')) | Some(Token::Sym('.')) => true,
        Some(t) => t.is_word("SELECT") || t.is_word("DISTINCT") || t.is_word("ALL"),
        None => false,
    };
    let before_ok = match next {
        None | Some(Token::Sym(',')) | Some(Token::Sym(')')) => true,
        Some(t) => t.is_word("FROM"),
    };
    after_ok && before_ok
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PiiPolicy {
        PiiPolicy::new(vec![
            PiiColumn::new(Some("DWH.DIM_CUSTOMER"), "PHONE_NUMBER"),
            PiiColumn::new(Some("DIM_CUSTOMER"), "EMAIL"),
            PiiColumn::new(None, "NATIONAL_ID"),
        ])
    }

    #[test]
    fn direct_pii_column_is_rejected() {
        let err = policy()
            .check("SELECT c.customer_id, c.phone_number FROM dwh.dim_customer c")
            .unwrap_err();
        match err {
            DwhError::PiiViolation { columns } => {
                assert_eq!(columns, vec!["DWH.DIM_CUSTOMER.PHONE_NUMBER"])
            }
            other => panic!("unexpected error: {other}"),
        }

        let p = policy();
        for sql in [
            "SELECT email FROM dim_customer",
            "SELECT TOP 10 email FROM dim_customer",
            "SELECT DISTINCT TOP 5 c.email FROM dim_customer c",
        ] {
            assert_eq!(p.violations(sql), vec!["DIM_CUSTOMER.EMAIL"], "{sql}");
        }
    }

    #[test]
    fn aggregated_pii_column_passes() {
        let p = policy();
        for sql in [
            "SELECT COUNT(phone_number) FROM dim_customer",
            "SELECT COUNT(DISTINCT c.email) AS email FROM dim_customer c",
            "SELECT MIN(email), MAX(email) FROM dim_customer",
            "SELECT region, count(national_id) cnt FROM dim_customer GROUP BY region",
        ] {
            p.check(sql).unwrap_or_else(|e| panic!("{sql}: {e}"));
        }
    }

    #[test]
    fn non_allowed_aggregate_is_rejected() {
        assert_eq!(
            policy().violations("SELECT SUM(national_id) FROM t"),
            vec!["NATIONAL_ID"]
        );
        assert_eq!(
            policy().violations("SELECT UPPER(email) FROM dim_customer"),
            vec!["DIM_CUSTOMER.EMAIL"]
        );
    }

    #[test]
    fn column_of_another_table_is_fine() {
        // EMAIL is only PII on DIM_CUSTOMER.
        policy()
            .check("SELECT e.email FROM dim_employee e")
            .unwrap();
        policy().check("SELECT email FROM dim_employee").unwrap();
    }

    #[test]
    fn where_clause_usage_is_not_projection() {
        policy()
            .check("SELECT COUNT(*) FROM dim_customer WHERE email LIKE '%@corp.com'")
            .unwrap();
    }

    #[test]
    fn star_exposes_pii_tables() {
        assert_eq!(
            policy().violations("SELECT * FROM dim_customer"),
            vec!["DWH.DIM_CUSTOMER.PHONE_NUMBER", "DIM_CUSTOMER.EMAIL", "NATIONAL_ID"]
        );
        policy()
            .check("SELECT COUNT(*) FROM dim_customer")
            .unwrap();
    }

    #[test]
    fn arithmetic_star_is_not_select_star() {
        let p = PiiPolicy::new(vec![PiiColumn::new(Some("DIM_CUSTOMER"), "EMAIL")]);
        p.check("SELECT amount * 2 AS doubled FROM dim_customer")
            .unwrap();
    }

    #[test]
    fn comments_and_literals_are_ignored() {
        policy()
            .check(
                "-- national_id is masked upstream\n\
                 SELECT 'national_id' AS label /* email */ FROM dim_customer",
            )
            .unwrap();
    }

    #[test]
    fn subquery_projection_is_checked() {
        let v = policy().violations(
            "SELECT COUNT(*) FROM (SELECT national_id FROM dim_customer) x",
        );
        assert_eq!(v, vec!["NATIONAL_ID"]);
    }

    #[test]
    fn scalar_subquery_filter_is_not_projection() {
        policy()
            .check(
                "SELECT o.order_id, (SELECT MAX(c.email) FROM dim_customer c \
                 WHERE c.phone_number = o.phone_number) AS last_email FROM fact_orders o",
            )
            .unwrap();
    }

    #[test]
    fn empty_policy_accepts_everything() {
        PiiPolicy::default()
            .check("SELECT * FROM dim_customer")
            .unwrap();
    }

    #[test]
    fn custom_aggregates_are_respected() {
        let mut p = policy();
        p.allowed_aggregates = vec!["count".to_string()];
        assert!(p.check("SELECT MAX(email) FROM dim_customer").is_err());
        assert!(p.check("SELECT COUNT(email) FROM dim_customer").is_ok());
    }
}
