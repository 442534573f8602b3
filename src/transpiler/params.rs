//! Placeholder numbering shared by every statement compiler.

use crate::ast::Value;
use crate::transpiler::Dialect;
use crate::transpiler::traits::SqlGenerator;

/// Per-statement parameter context: the dialect's generator, a placeholder
/// counter, and the bound values in placeholder order.
///
/// Every bound value goes through [`ParamContext::add_param`], which appends
/// the value and returns its placeholder in one step, so the Nth placeholder
/// written into the SQL is always the Nth argument. Callers must write the
/// returned placeholder into the SQL before requesting the next one.
pub struct ParamContext {
    generator: Box<dyn SqlGenerator>,
    /// Current parameter index (1-based for Postgres $1, $2, etc.)
    index: usize,
    /// Collected parameter values in order
    params: Vec<Value>,
}

impl ParamContext {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            generator: dialect.generator(),
            index: 0,
            params: Vec::new(),
        }
    }

    pub fn generator(&self) -> &dyn SqlGenerator {
        self.generator.as_ref()
    }

    pub fn dialect(&self) -> Dialect {
        self.generator.dialect()
    }

    /// Quote an identifier for this dialect.
    pub fn quote(&self, name: &str) -> String {
        self.generator.quote_identifier(name)
    }

    /// Add a value and return the placeholder for it.
    pub fn add_param(&mut self, value: Value) -> String {
        self.index += 1;
        self.params.push(value);
        self.generator.placeholder(self.index)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Finish the statement, yielding the collected arguments.
    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}
