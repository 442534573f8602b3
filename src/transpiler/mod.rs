//! Query compiler.
//!
//! Turns a [`Query`] into SQL text plus positional arguments for one
//! [`Dialect`]. Compilation is pure: each call owns its [`ParamContext`],
//! reads metadata through [`Metadata`], and never touches the caller's query.

pub mod conditions;
pub mod dialect;
pub mod dml;
pub mod joins;
pub mod nested;
pub mod params;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use crate::ast::{NestedWrite, Operation, Query, Value};
use crate::error::{RelqError, RelqResult};
use crate::schema::{Metadata, Registry};
use serde::Serialize;

pub use conditions::{Clause, FilterCompiler};
pub use dialect::Dialect;
pub use nested::compile_nested_writes;
pub use params::ParamContext;
pub use traits::{SqlGenerator, escape_identifier};

/// Default bound on filter and inclusion nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One output column and where its value belongs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    /// Column name in the result set.
    pub column: String,
    /// Relation path from the root model; empty for root fields.
    pub path: Vec<String>,
    pub field: String,
}

/// A joined relation in the result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationMapping {
    pub path: Vec<String>,
    pub alias: String,
    /// To-many relations fan out rows; the executor folds them per parent.
    pub many: bool,
}

/// How to shape result rows. An empty `fields` list with no relations means
/// the rows are the model's columns as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResultMapping {
    pub model: String,
    pub fields: Vec<FieldMapping>,
    pub relations: Vec<RelationMapping>,
}

/// A standalone SQL statement and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Compiler output for one query.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery<'q> {
    pub sql: String,
    pub args: Vec<Value>,
    pub dialect: Dialect,
    pub mapping: ResultMapping,
    /// The query this was compiled from.
    #[serde(skip)]
    pub query: &'q Query,
}

impl CompiledQuery<'_> {
    /// Whether the executor should collapse the result to one record.
    pub fn expects_single(&self) -> bool {
        self.query.operation.returns_single()
    }

    /// Whether an empty result should raise not-found.
    pub fn throw_if_not_found(&self) -> bool {
        self.query.throw_if_not_found
    }

    /// Relation writes to expand with [`compile_nested_writes`] once the
    /// executor knows the parent key.
    pub fn nested_writes(&self) -> &[NestedWrite] {
        &self.query.writes
    }
}

/// Trait for compiling queries to SQL.
pub trait ToSql {
    /// Compile with default options.
    fn to_sql(&self, dialect: Dialect, meta: &dyn Metadata) -> RelqResult<CompiledQuery<'_>>;
}

impl ToSql for Query {
    fn to_sql(&self, dialect: Dialect, meta: &dyn Metadata) -> RelqResult<CompiledQuery<'_>> {
        compile(self, dialect, meta)
    }
}

/// Compile a query with default options.
pub fn compile<'q>(query: &'q Query, dialect: Dialect, meta: &dyn Metadata) -> RelqResult<CompiledQuery<'q>> {
    compile_with(query, dialect, meta, &CompileOptions::default())
}

/// Compile a query.
pub fn compile_with<'q>(
    query: &'q Query,
    dialect: Dialect,
    meta: &dyn Metadata,
    options: &CompileOptions,
) -> RelqResult<CompiledQuery<'q>> {
    check_payload(query)?;

    let mut params = ParamContext::new(dialect);
    let (sql, mapping) = match query.operation {
        Operation::FindMany
        | Operation::FindFirst
        | Operation::FindUnique
        | Operation::Aggregate
        | Operation::GroupBy => dml::select::build_select(query, meta, options, &mut params)?,
        Operation::Create => dml::insert::build_insert(query, meta, &mut params)?,
        Operation::CreateMany => dml::insert::build_insert_many(query, meta, &mut params)?,
        Operation::Update | Operation::UpdateMany => {
            dml::update::build_update(query, meta, options, &mut params)?
        }
        Operation::Delete | Operation::DeleteMany => {
            dml::delete::build_delete(query, meta, options, &mut params)?
        }
        Operation::Upsert => dml::upsert::build_upsert(query, meta, &mut params)?,
    };

    let args = params.into_params();
    tracing::debug!(
        operation = %query.operation,
        model = %query.model,
        dialect = %dialect,
        args = args.len(),
        "compiled query"
    );

    Ok(CompiledQuery {
        sql,
        args,
        dialect,
        mapping,
        query,
    })
}

/// Reject payloads that do not belong to the operation.
fn check_payload(query: &Query) -> RelqResult<()> {
    let expected = match query.operation {
        Operation::Create => "create",
        Operation::CreateMany => "createMany",
        Operation::Update | Operation::UpdateMany => "update",
        Operation::Upsert => "upsert",
        _ => "no",
    };
    let found = query.payload.kind();
    if expected != found {
        return Err(RelqError::PayloadMismatch {
            operation: query.operation.to_string(),
            expected,
            found,
        });
    }
    if !query.writes.is_empty() && !query.operation.accepts_nested_writes() {
        return Err(RelqError::NestedWritesNotAllowed {
            operation: query.operation.to_string(),
        });
    }
    Ok(())
}

/// Mapping for a plain single-table statement.
pub(crate) fn root_mapping(query: &Query) -> ResultMapping {
    ResultMapping {
        model: query.model.clone(),
        ..Default::default()
    }
}

/// Convenience front end that pins one registry snapshot per call.
pub struct Compiler<'r> {
    registry: &'r Registry,
    dialect: Dialect,
    options: CompileOptions,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r Registry, dialect: Dialect) -> Self {
        Self {
            registry,
            dialect,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn compile<'q>(&self, query: &'q Query) -> RelqResult<CompiledQuery<'q>> {
        let schema = self.registry.snapshot();
        compile_with(query, self.dialect, &*schema, &self.options)
    }

    /// Expand relation writes for a parent row.
    pub fn compile_nested_writes(
        &self,
        parent_model: &str,
        parent_key: &Value,
        writes: &[NestedWrite],
    ) -> RelqResult<Vec<Statement>> {
        let schema = self.registry.snapshot();
        nested::compile_nested_writes_with(
            parent_model,
            parent_key,
            writes,
            self.dialect,
            &*schema,
            &self.options,
        )
    }
}
