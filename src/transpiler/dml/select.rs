//! SELECT SQL generation.
//!
//! Covers FindMany/FindFirst/FindUnique plus Aggregate and GroupBy. Clauses
//! are bound in textual order: join ON filters, WHERE, then HAVING.

use super::aggregate;
use crate::ast::{Condition, Filter, Operation, Operator, Query, SortOrder};
use crate::error::RelqResult;
use crate::schema::Metadata;
use crate::transpiler::conditions::{Clause, FilterCompiler};
use crate::transpiler::joins::JoinCompiler;
use crate::transpiler::params::ParamContext;
use crate::transpiler::{CompileOptions, FieldMapping, ResultMapping};
use std::borrow::Cow;

/// Generate SELECT SQL.
pub fn build_select(
    query: &Query,
    meta: &dyn Metadata,
    options: &CompileOptions,
    params: &mut ParamContext,
) -> RelqResult<(String, ResultMapping)> {
    let is_aggregate = matches!(query.operation, Operation::Aggregate | Operation::GroupBy);
    if is_aggregate {
        aggregate::validate(query)?;
    }

    let table = meta.table_name(&query.model)?;
    let plan = JoinCompiler::new(meta, options.max_depth).compile(&query.model, table, &query.include, params)?;
    let qualifier = if plan.is_empty() { None } else { Some(table) };

    let column = |field: &str, params: &ParamContext| -> RelqResult<String> {
        let col = params.quote(meta.column_name(&query.model, field)?);
        Ok(match qualifier {
            Some(q) => format!("{}.{}", params.quote(q), col),
            None => col,
        })
    };

    let mut mapping = ResultMapping {
        model: query.model.clone(),
        fields: Vec::new(),
        relations: plan.relations,
    };

    // Columns
    let mut columns: Vec<String> = Vec::new();
    if is_aggregate {
        for field in &query.group_by {
            columns.push(column(field, params)?);
            mapping.fields.push(root_field(field));
        }
        for agg in &query.aggregations {
            columns.push(aggregate::render(agg, &query.model, qualifier, meta, params)?);
            mapping.fields.push(root_field(&agg.alias()));
        }
    } else {
        let selection: &[String] = if query.selection.is_empty() && !params.generator().supports_distinct_on() {
            &query.distinct
        } else {
            &query.selection
        };
        if selection.is_empty() {
            match qualifier {
                Some(q) => columns.push(format!("{}.*", params.quote(q))),
                None => columns.push("*".to_string()),
            }
        } else {
            for field in selection {
                let col = column(field, params)?;
                let bare = meta.column_name(&query.model, field)?;
                if bare != field || qualifier.is_some() {
                    columns.push(format!("{} AS {}", col, params.quote(field)));
                } else {
                    columns.push(col);
                }
                mapping.fields.push(root_field(field));
            }
        }
        columns.extend(plan.projections);
        mapping.fields.extend(plan.fields);
    }

    let mut sql = String::from("SELECT ");
    if !query.distinct.is_empty() && !is_aggregate {
        if params.generator().supports_distinct_on() {
            let on = query
                .distinct
                .iter()
                .map(|f| column(f, params))
                .collect::<RelqResult<Vec<_>>>()?;
            sql.push_str(&format!("DISTINCT ON ({}) ", on.join(", ")));
        } else {
            sql.push_str("DISTINCT ");
        }
    }
    sql.push_str(&columns.join(", "));

    // FROM + JOINS
    sql.push_str(" FROM ");
    sql.push_str(&params.quote(table));
    for join in &plan.joins {
        sql.push_str(join);
    }

    // WHERE
    let filter = cursor_filter(query);
    let where_clause = FilterCompiler::new(meta, Some(&query.model), options.max_depth)
        .qualified(qualifier)
        .compile(&filter, params)?;
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause);
    }

    // GROUP BY
    if !query.group_by.is_empty() {
        let cols = query
            .group_by
            .iter()
            .map(|f| column(f, params))
            .collect::<RelqResult<Vec<_>>>()?;
        sql.push_str(" GROUP BY ");
        sql.push_str(&cols.join(", "));
    }

    // HAVING
    let having = FilterCompiler::new(meta, Some(&query.model), options.max_depth)
        .qualified(qualifier)
        .clause(Clause::Having)
        .compile(&query.having, params)?;
    if !having.is_empty() {
        sql.push_str(" HAVING ");
        sql.push_str(&having);
    }

    // ORDER BY
    if !query.order_by.is_empty() {
        let mut parts = Vec::with_capacity(query.order_by.len());
        for order in &query.order_by {
            let dir = match order.order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            parts.push(format!("{} {}", column(&order.field, params)?, dir));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&parts.join(", "));
    }

    // LIMIT / OFFSET
    let limit = match (query.take, query.operation) {
        (Some(n), _) => Some(n),
        (None, Operation::FindFirst) => Some(1),
        _ => None,
    };
    let offset = if query.cursor.is_some() { None } else { query.skip };
    sql.push_str(&params.generator().limit_offset(limit, offset));

    Ok((sql, mapping))
}

/// The root filter with the cursor seek predicate ANDed in.
fn cursor_filter(query: &Query) -> Cow<'_, Filter> {
    let Some(cursor) = &query.cursor else {
        return Cow::Borrowed(&query.filter);
    };

    let op = match query.order_by.iter().find(|o| o.field == cursor.field) {
        Some(o) if o.order == SortOrder::Desc => Operator::Lt,
        Some(_) => Operator::Gt,
        None => {
            tracing::warn!(
                "cursor on '{}.{}' has no matching ORDER BY; page order is not deterministic",
                query.model,
                cursor.field
            );
            Operator::Gt
        }
    };
    let seek = Condition::new(cursor.field.clone(), op, cursor.value.clone());
    Cow::Owned(query.filter.and_condition(seek))
}

fn root_field(name: &str) -> FieldMapping {
    FieldMapping {
        column: name.to_string(),
        path: Vec::new(),
        field: name.to_string(),
    }
}
