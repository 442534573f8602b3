use crate::transpiler::Dialect;
use crate::transpiler::escape_identifier;
use crate::transpiler::traits::SqlGenerator;

pub struct PostgresGenerator;

impl Default for PostgresGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_distinct_on(&self) -> bool {
        true
    }

    fn array_is_empty(&self, col: &str) -> Option<String> {
        Some(format!("COALESCE(array_length({}, 1), 0) = 0", col))
    }

    fn array_has(&self, col: &str, value: &str) -> Option<String> {
        Some(format!("{} = ANY({})", value, col))
    }

    fn array_has_every(&self, col: &str, values: &[String]) -> Option<String> {
        Some(format!("{} @> ARRAY[{}]", col, values.join(", ")))
    }

    fn array_has_some(&self, col: &str, values: &[String]) -> Option<String> {
        Some(format!("{} && ARRAY[{}]", col, values.join(", ")))
    }

    fn fulltext_search(&self, col: &str, query: &str) -> Option<String> {
        Some(format!("to_tsvector({}) @@ plainto_tsquery({})", col, query))
    }
}
