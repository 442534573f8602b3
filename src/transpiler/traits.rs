//! Transpiler traits and utilities.

use crate::transpiler::Dialect;

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "order",
    "group",
    "user",
    "table",
    "select",
    "from",
    "where",
    "join",
    "left",
    "right",
    "inner",
    "outer",
    "on",
    "and",
    "or",
    "not",
    "null",
    "true",
    "false",
    "limit",
    "offset",
    "as",
    "in",
    "is",
    "like",
    "between",
    "having",
    "union",
    "all",
    "distinct",
    "case",
    "when",
    "then",
    "else",
    "end",
    "create",
    "alter",
    "drop",
    "insert",
    "update",
    "delete",
    "index",
    "key",
    "primary",
    "foreign",
    "references",
    "default",
    "constraint",
    "check",
    "match",
    "set",
    "values",
];

/// Escape an identifier with double quotes if it's a reserved word or
/// contains special chars.
pub fn escape_identifier(name: &str) -> String {
    escape_identifier_with(name, '"')
}

/// Escape an identifier using the given quote character. `*` passes through.
pub fn escape_identifier_with(name: &str, quote: char) -> String {
    if name == "*" {
        return name.to_string();
    }
    let lower = name.to_lowercase();
    let needs_escaping = RESERVED_WORDS.contains(&lower.as_str())
        || name.is_empty()
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_')
        || name.chars().next().map(|c| c.is_numeric()).unwrap_or(false);

    if needs_escaping {
        let doubled: String = [quote, quote].iter().collect();
        format!("{q}{}{q}", name.replace(quote, &doubled), q = quote)
    } else {
        name.to_string()
    }
}

/// Trait for dialect-specific SQL generation.
///
/// Array and fulltext hooks return `None` when the dialect has no
/// equivalent; callers turn that into a compile error.
pub trait SqlGenerator: Send + Sync {
    fn dialect(&self) -> Dialect;
    /// Quote an identifier (table, column or alias).
    fn quote_identifier(&self, name: &str) -> String;
    /// Generate the parameter placeholder for a 1-based index.
    fn placeholder(&self, index: usize) -> String;
    /// Whether INSERT/UPDATE/DELETE accept `RETURNING *`.
    fn supports_returning(&self) -> bool {
        false
    }
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        sql
    }
    /// Whether `SELECT DISTINCT ON (...)` is available.
    fn supports_distinct_on(&self) -> bool {
        false
    }
    /// Suffix for a FROM-less SELECT that carries a WHERE clause.
    fn dual_table(&self) -> &'static str {
        ""
    }

    /// Upsert conflict clause. `assignments` are rendered `col = expr` pairs.
    fn upsert_clause(&self, keys: &[String], assignments: &[String]) -> String {
        format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            keys.join(", "),
            assignments.join(", ")
        )
    }
    /// Reference to the value the conflicting INSERT tried to write.
    fn inserted_value(&self, col: &str) -> String {
        format!("EXCLUDED.{}", col)
    }

    fn array_is_empty(&self, _col: &str) -> Option<String> {
        None
    }
    fn array_has(&self, _col: &str, _value: &str) -> Option<String> {
        None
    }
    fn array_has_every(&self, _col: &str, _values: &[String]) -> Option<String> {
        None
    }
    fn array_has_some(&self, _col: &str, _values: &[String]) -> Option<String> {
        None
    }
    fn fulltext_search(&self, _col: &str, _query: &str) -> Option<String> {
        None
    }
}
