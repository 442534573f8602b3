//! DML (Data Manipulation Language) SQL generation.
//!
//! One builder per statement kind. Builders bind values through the shared
//! [`ParamContext`](crate::transpiler::ParamContext) in the same order their
//! placeholders appear in the SQL text.

pub mod aggregate;
pub mod delete;
pub mod insert;
pub mod select;
pub mod update;
pub mod upsert;

use crate::ast::{Data, Query};
use crate::error::{RelqError, RelqResult};
use crate::schema::Metadata;
use crate::transpiler::conditions::FilterCompiler;
use crate::transpiler::params::ParamContext;
use crate::transpiler::CompileOptions;

/// Compile the WHERE clause of an UPDATE/DELETE, refusing an empty filter.
pub(crate) fn safety_where(
    query: &Query,
    meta: &dyn Metadata,
    options: &CompileOptions,
    params: &mut ParamContext,
) -> RelqResult<String> {
    let clause = FilterCompiler::new(meta, Some(&query.model), options.max_depth)
        .compile(&query.filter, params)?;
    if clause.is_empty() {
        return Err(RelqError::MissingSafetyPredicate {
            operation: query.operation.to_string(),
            model: query.model.clone(),
        });
    }
    Ok(clause)
}

/// Refuse a payload that names the same field twice.
pub(crate) fn unique_fields(operation: &str, data: &Data) -> RelqResult<()> {
    match data.duplicate_field() {
        Some(field) => Err(RelqError::DuplicateField {
            operation: operation.to_string(),
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}
