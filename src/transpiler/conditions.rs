//! Filter tree compilation.
//!
//! A [`Filter`] node renders its direct conditions first, then each non-empty
//! nested group in parentheses, joined by the node's operator. `NOT` wraps the
//! AND of all parts. Empty nodes render nothing, so callers can skip the
//! clause entirely.

use crate::ast::{CaseMode, Condition, Filter, LogicalOp, Operator, Value};
use crate::error::{RelqError, RelqResult};
use crate::schema::Metadata;
use crate::transpiler::params::ParamContext;

/// Which clause a filter is compiled for. Aggregates are only legal in HAVING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Where,
    Having,
    JoinOn,
}

/// Compiles filters against one model.
pub struct FilterCompiler<'a> {
    meta: &'a dyn Metadata,
    /// `None` skips registry lookups (nested writes against unmapped tables).
    model: Option<&'a str>,
    /// Table alias to qualify columns with.
    qualifier: Option<&'a str>,
    clause: Clause,
    max_depth: usize,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(meta: &'a dyn Metadata, model: Option<&'a str>, max_depth: usize) -> Self {
        Self {
            meta,
            model,
            qualifier: None,
            clause: Clause::Where,
            max_depth,
        }
    }

    pub fn qualified(mut self, alias: Option<&'a str>) -> Self {
        self.qualifier = alias;
        self
    }

    pub fn clause(mut self, clause: Clause) -> Self {
        self.clause = clause;
        self
    }

    /// Compile a filter tree. Returns an empty string for an empty tree.
    pub fn compile(&self, filter: &Filter, params: &mut ParamContext) -> RelqResult<String> {
        Ok(self.compile_node(filter, params, 1)?.unwrap_or_default())
    }

    /// Compile for use next to other AND-ed predicates, parenthesizing a
    /// top-level OR.
    pub fn compile_operand(&self, filter: &Filter, params: &mut ParamContext) -> RelqResult<String> {
        let sql = self.compile(filter, params)?;
        if !sql.is_empty() && filter.op == LogicalOp::Or && self.part_count(filter) > 1 {
            Ok(format!("({})", sql))
        } else {
            Ok(sql)
        }
    }

    fn part_count(&self, filter: &Filter) -> usize {
        filter.conditions.len() + filter.nested.iter().filter(|n| !n.is_empty()).count()
    }

    fn compile_node(
        &self,
        filter: &Filter,
        params: &mut ParamContext,
        depth: usize,
    ) -> RelqResult<Option<String>> {
        if depth > self.max_depth {
            return Err(RelqError::DepthExceeded {
                what: "Filter",
                limit: self.max_depth,
            });
        }

        let mut parts: Vec<String> = Vec::new();
        for cond in &filter.conditions {
            parts.push(self.compile_condition(cond, params)?);
        }
        let mut only_group = None;
        for nested in &filter.nested {
            if let Some(inner) = self.compile_node(nested, params, depth + 1)? {
                only_group = Some(inner.clone());
                parts.push(format!("({})", inner));
            }
        }

        if parts.is_empty() {
            return Ok(None);
        }

        let sql = match filter.op {
            LogicalOp::And => parts.join(" AND "),
            LogicalOp::Or => parts.join(" OR "),
            LogicalOp::Not => {
                // A lone nested group is already a single operand.
                match only_group {
                    Some(inner) if parts.len() == 1 && filter.conditions.is_empty() => {
                        format!("NOT ({})", inner)
                    }
                    _ => format!("NOT ({})", parts.join(" AND ")),
                }
            }
        };
        Ok(Some(sql))
    }

    /// Column reference for a condition field.
    fn column(&self, field: &str, params: &ParamContext) -> RelqResult<String> {
        let column = match self.model {
            Some(model) => self.meta.column_name(model, field)?,
            None => field,
        };
        let quoted = params.quote(column);
        Ok(match self.qualifier {
            Some(alias) if column != "*" => format!("{}.{}", params.quote(alias), quoted),
            _ => quoted,
        })
    }

    fn compile_condition(&self, cond: &Condition, params: &mut ParamContext) -> RelqResult<String> {
        let mut col = self.column(&cond.field, params)?;
        if let Some(func) = cond.aggregate {
            if self.clause != Clause::Having {
                return Err(RelqError::unsupported(
                    &cond.field,
                    cond.op.to_string(),
                    format!("aggregate {} is only allowed in HAVING", func),
                ));
            }
            col = format!("{}({})", func.sql_name(), col);
        }

        let insensitive = cond.mode == CaseMode::Insensitive;
        let lhs = if insensitive { format!("LOWER({})", col) } else { col.clone() };
        let bind = |value: Value, params: &mut ParamContext| -> String {
            let ph = params.add_param(value);
            if insensitive { format!("LOWER({})", ph) } else { ph }
        };
        let unsupported = |reason: String| RelqError::unsupported(&cond.field, cond.op.to_string(), reason);

        if insensitive
            && matches!(
                cond.op,
                Operator::IsEmpty | Operator::Has | Operator::HasEvery | Operator::HasSome | Operator::Search
            )
        {
            return Err(unsupported(
                "case-insensitive mode applies to comparison and LIKE operators only".to_string(),
            ));
        }

        match cond.op {
            Operator::Equals if cond.value.is_null() => Ok(format!("{} IS NULL", col)),
            Operator::Not if cond.value.is_null() => Ok(format!("{} IS NOT NULL", col)),
            Operator::Equals | Operator::Not => {
                let symbol = cond.op.sql_symbol().unwrap_or("=");
                Ok(format!("{} {} {}", lhs, symbol, bind(cond.value.clone(), params)))
            }
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
                if matches!(cond.value, Value::Null | Value::Array(_)) {
                    return Err(unsupported(format!(
                        "expected a scalar value, got {}",
                        cond.value.kind()
                    )));
                }
                let symbol = cond.op.sql_symbol().unwrap_or("=");
                Ok(format!("{} {} {}", lhs, symbol, bind(cond.value.clone(), params)))
            }
            Operator::In | Operator::NotIn => {
                let items = cond.value.as_array().ok_or_else(|| {
                    unsupported(format!("expected a list value, got {}", cond.value.kind()))
                })?;
                let negated = cond.op == Operator::NotIn;
                if items.is_empty() {
                    // IN () is not valid SQL
                    return Ok(if negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let placeholders: Vec<String> =
                    items.iter().map(|v| bind(v.clone(), params)).collect();
                let keyword = if negated { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", lhs, keyword, placeholders.join(", ")))
            }
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                let text = cond.value.as_str().ok_or_else(|| {
                    unsupported(format!("expected a string value, got {}", cond.value.kind()))
                })?;
                let pattern = match cond.op {
                    Operator::Contains => format!("%{}%", text),
                    Operator::StartsWith => format!("{}%", text),
                    _ => format!("%{}", text),
                };
                Ok(format!("{} LIKE {}", lhs, bind(Value::String(pattern), params)))
            }
            Operator::IsNull => match cond.value {
                Value::Bool(true) => Ok(format!("{} IS NULL", col)),
                Value::Bool(false) => Ok(format!("{} IS NOT NULL", col)),
                ref other => Err(unsupported(format!("expected a bool value, got {}", other.kind()))),
            },
            Operator::IsEmpty => {
                let empty = match cond.value {
                    Value::Bool(b) => b,
                    ref other => {
                        return Err(unsupported(format!("expected a bool value, got {}", other.kind())));
                    }
                };
                let check = params
                    .generator()
                    .array_is_empty(&col)
                    .ok_or_else(|| unsupported(format!("{} has no array columns", params.dialect())))?;
                Ok(if empty { check } else { format!("NOT ({})", check) })
            }
            Operator::Has => {
                if matches!(cond.value, Value::Array(_)) {
                    return Err(unsupported("expected a single element, got array".to_string()));
                }
                if params.generator().array_has(&col, "").is_none() {
                    return Err(unsupported(format!("{} has no array columns", params.dialect())));
                }
                let ph = params.add_param(cond.value.clone());
                Ok(params.generator().array_has(&col, &ph).unwrap_or_default())
            }
            Operator::HasEvery | Operator::HasSome => {
                let items = cond.value.as_array().ok_or_else(|| {
                    unsupported(format!("expected a list value, got {}", cond.value.kind()))
                })?;
                let every = cond.op == Operator::HasEvery;
                let available = if every {
                    params.generator().array_has_every(&col, &[])
                } else {
                    params.generator().array_has_some(&col, &[])
                };
                if available.is_none() {
                    return Err(unsupported(format!("{} has no array columns", params.dialect())));
                }
                if items.is_empty() {
                    // every element of nothing: true; some element of nothing: false
                    return Ok(if every { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let placeholders: Vec<String> =
                    items.iter().map(|v| params.add_param(v.clone())).collect();
                let sql = if every {
                    params.generator().array_has_every(&col, &placeholders)
                } else {
                    params.generator().array_has_some(&col, &placeholders)
                };
                Ok(sql.unwrap_or_default())
            }
            Operator::Search => {
                if cond.value.as_str().is_none() {
                    return Err(unsupported(format!(
                        "expected a string value, got {}",
                        cond.value.kind()
                    )));
                }
                if params.generator().fulltext_search(&col, "").is_none() {
                    return Err(unsupported(format!("{} has no fulltext search", params.dialect())));
                }
                let ph = params.add_param(cond.value.clone());
                Ok(params.generator().fulltext_search(&col, &ph).unwrap_or_default())
            }
        }
    }
}
