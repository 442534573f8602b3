//! Aggregation validation and rendering.

use crate::ast::{AggregateFunction, Aggregation, Operation, Query};
use crate::error::{RelqError, RelqResult};
use crate::schema::Metadata;
use crate::transpiler::params::ParamContext;

/// Check the aggregation requirements of an Aggregate/GroupBy query.
pub fn validate(query: &Query) -> RelqResult<()> {
    match query.operation {
        Operation::Aggregate if query.aggregations.is_empty() => {
            return Err(RelqError::MissingAggregation {
                model: query.model.clone(),
            });
        }
        Operation::GroupBy if query.group_by.is_empty() => {
            return Err(RelqError::MissingGroupBy {
                model: query.model.clone(),
            });
        }
        _ => {}
    }

    for agg in &query.aggregations {
        if agg.function != AggregateFunction::Count && agg.is_star() {
            return Err(RelqError::MissingAggregationField {
                function: agg.function.to_string(),
            });
        }
    }
    Ok(())
}

/// Render `FUNC(col) AS func_field`, qualifying the column when `qualifier` is set.
pub fn render(
    agg: &Aggregation,
    model: &str,
    qualifier: Option<&str>,
    meta: &dyn Metadata,
    params: &ParamContext,
) -> RelqResult<String> {
    let target = if agg.is_star() {
        "*".to_string()
    } else {
        let col = params.quote(meta.column_name(model, &agg.field)?);
        match qualifier {
            Some(q) => format!("{}.{}", params.quote(q), col),
            None => col,
        }
    };
    Ok(format!(
        "{}({}) AS {}",
        agg.function.sql_name(),
        target,
        params.quote(&agg.alias())
    ))
}
