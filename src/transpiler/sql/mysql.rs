use crate::transpiler::Dialect;
use crate::transpiler::traits::{SqlGenerator, escape_identifier_with};

/// MySQL Generator. Array columns are JSON arrays.
pub struct MysqlGenerator;

impl Default for MysqlGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for MysqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier_with(name, '`')
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        // MySQL has no OFFSET without LIMIT
        match (limit, offset) {
            (Some(n), Some(o)) => format!(" LIMIT {} OFFSET {}", n, o),
            (Some(n), None) => format!(" LIMIT {}", n),
            (None, Some(o)) => format!(" LIMIT 18446744073709551615 OFFSET {}", o),
            (None, None) => String::new(),
        }
    }

    fn dual_table(&self) -> &'static str {
        " FROM DUAL"
    }

    fn upsert_clause(&self, _keys: &[String], assignments: &[String]) -> String {
        format!(" ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
    }

    fn inserted_value(&self, col: &str) -> String {
        format!("VALUES({})", col)
    }

    fn array_is_empty(&self, col: &str) -> Option<String> {
        Some(format!("JSON_LENGTH({}) = 0", col))
    }

    fn array_has(&self, col: &str, value: &str) -> Option<String> {
        Some(format!("JSON_CONTAINS({}, JSON_ARRAY({}))", col, value))
    }

    fn array_has_every(&self, col: &str, values: &[String]) -> Option<String> {
        Some(format!("JSON_CONTAINS({}, JSON_ARRAY({}))", col, values.join(", ")))
    }

    fn array_has_some(&self, col: &str, values: &[String]) -> Option<String> {
        Some(format!("JSON_OVERLAPS({}, JSON_ARRAY({}))", col, values.join(", ")))
    }

    fn fulltext_search(&self, col: &str, query: &str) -> Option<String> {
        Some(format!("MATCH({}) AGAINST({} IN NATURAL LANGUAGE MODE)", col, query))
    }
}
