use crate::transpiler::Dialect;
use crate::transpiler::escape_identifier;
use crate::transpiler::traits::SqlGenerator;

/// SQLite Generator. No array types; fulltext assumes an FTS5 table.
pub struct SqliteGenerator;

impl Default for SqliteGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(n), Some(o)) => format!(" LIMIT {} OFFSET {}", n, o),
            (Some(n), None) => format!(" LIMIT {}", n),
            (None, Some(o)) => format!(" LIMIT -1 OFFSET {}", o),
            (None, None) => String::new(),
        }
    }

    fn fulltext_search(&self, col: &str, query: &str) -> Option<String> {
        Some(format!("{} MATCH {}", col, query))
    }
}
