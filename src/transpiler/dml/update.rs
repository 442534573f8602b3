//! UPDATE SQL generation.

use super::{safety_where, unique_fields};
use crate::ast::{Operation, Payload, Query};
use crate::error::{RelqError, RelqResult};
use crate::schema::Metadata;
use crate::transpiler::params::ParamContext;
use crate::transpiler::{CompileOptions, ResultMapping, root_mapping};

/// Generate UPDATE SQL. The filter is mandatory.
pub fn build_update(
    query: &Query,
    meta: &dyn Metadata,
    options: &CompileOptions,
    params: &mut ParamContext,
) -> RelqResult<(String, ResultMapping)> {
    let data = match &query.payload {
        Payload::Update(data) if !data.is_empty() => data,
        _ => return Err(RelqError::empty_payload(query.operation.to_string())),
    };
    unique_fields(&query.operation.to_string(), data)?;
    let table = meta.table_name(&query.model)?;

    // SET placeholders precede WHERE placeholders.
    let mut assignments = Vec::with_capacity(data.len());
    for (field, value) in data.iter() {
        let col = params.quote(meta.column_name(&query.model, field)?);
        assignments.push(format!("{} = {}", col, params.add_param(value.clone())));
    }
    let where_clause = safety_where(query, meta, options, params)?;

    let mut sql = format!(
        "UPDATE {} SET {} WHERE {}",
        params.quote(table),
        assignments.join(", "),
        where_clause
    );
    if query.operation == Operation::Update && params.generator().supports_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok((sql, root_mapping(query)))
}
