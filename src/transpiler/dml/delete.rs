//! DELETE SQL generation.

use super::safety_where;
use crate::ast::{Operation, Query};
use crate::error::RelqResult;
use crate::schema::Metadata;
use crate::transpiler::params::ParamContext;
use crate::transpiler::{CompileOptions, ResultMapping, root_mapping};

/// Generate DELETE SQL. The filter is mandatory.
pub fn build_delete(
    query: &Query,
    meta: &dyn Metadata,
    options: &CompileOptions,
    params: &mut ParamContext,
) -> RelqResult<(String, ResultMapping)> {
    let table = meta.table_name(&query.model)?;
    let where_clause = safety_where(query, meta, options, params)?;

    let mut sql = format!("DELETE FROM {} WHERE {}", params.quote(table), where_clause);
    if query.operation == Operation::Delete && params.generator().supports_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok((sql, root_mapping(query)))
}
