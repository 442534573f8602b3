//! Relation join compilation.
//!
//! Each inclusion becomes `LEFT JOIN <table> AS <parent>_<relation> ON ...`,
//! emitted outer-to-inner and siblings in declaration order. LEFT JOIN keeps
//! parents that have no related rows. Projected relation columns are aliased
//! `<alias>_<field>` so they cannot collide with base columns.

use crate::ast::RelationInclusion;
use crate::error::{RelqError, RelqResult};
use crate::schema::Metadata;
use crate::transpiler::conditions::{Clause, FilterCompiler};
use crate::transpiler::params::ParamContext;
use crate::transpiler::{FieldMapping, RelationMapping};
use std::collections::HashSet;

/// Output of the join walk.
#[derive(Debug, Default)]
pub struct JoinPlan {
    /// Rendered ` LEFT JOIN ...` clauses, each with a leading space.
    pub joins: Vec<String>,
    /// Projected relation columns for the SELECT list.
    pub projections: Vec<String>,
    pub fields: Vec<FieldMapping>,
    pub relations: Vec<RelationMapping>,
}

impl JoinPlan {
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

pub struct JoinCompiler<'a> {
    meta: &'a dyn Metadata,
    max_depth: usize,
    used_aliases: HashSet<String>,
}

impl<'a> JoinCompiler<'a> {
    pub fn new(meta: &'a dyn Metadata, max_depth: usize) -> Self {
        Self {
            meta,
            max_depth,
            used_aliases: HashSet::new(),
        }
    }

    /// Compile `inclusions` hanging off `base_model`, which is selected FROM
    /// `base_alias`.
    pub fn compile(
        mut self,
        base_model: &str,
        base_alias: &str,
        inclusions: &[RelationInclusion],
        params: &mut ParamContext,
    ) -> RelqResult<JoinPlan> {
        self.used_aliases.insert(base_alias.to_string());
        let mut plan = JoinPlan::default();
        self.walk(base_model, base_alias, &[], inclusions, 1, params, &mut plan)?;
        Ok(plan)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        parent_model: &str,
        parent_alias: &str,
        path: &[String],
        inclusions: &[RelationInclusion],
        depth: usize,
        params: &mut ParamContext,
        plan: &mut JoinPlan,
    ) -> RelqResult<()> {
        if inclusions.is_empty() {
            return Ok(());
        }
        if depth > self.max_depth {
            return Err(RelqError::DepthExceeded {
                what: "Relation inclusion",
                limit: self.max_depth,
            });
        }

        let meta = self.meta;
        for inclusion in inclusions {
            let relation = meta.relation(parent_model, &inclusion.relation)?;
            let target_model = relation.to_model.as_str();
            let table = meta.table_name(target_model)?;
            let alias = self.unique_alias(format!("{}_{}", parent_alias, relation.name));

            if relation.from_fields.len() != relation.to_fields.len() || relation.from_fields.is_empty() {
                return Err(RelqError::Config(format!(
                    "relation '{}' on '{}' must pair from_fields with to_fields",
                    relation.name, parent_model
                )));
            }

            let mut on: Vec<String> = Vec::new();
            for (from, to) in relation.from_fields.iter().zip(&relation.to_fields) {
                let from_col = meta.column_name(parent_model, from)?;
                let to_col = meta.column_name(target_model, to)?;
                on.push(format!(
                    "{}.{} = {}.{}",
                    params.quote(&alias),
                    params.quote(to_col),
                    params.quote(parent_alias),
                    params.quote(from_col)
                ));
            }

            if let Some(scoped) = &inclusion.query {
                let fragment = FilterCompiler::new(meta, Some(target_model), self.max_depth)
                    .qualified(Some(alias.as_str()))
                    .clause(Clause::JoinOn)
                    .compile_operand(&scoped.filter, params)?;
                if !fragment.is_empty() {
                    on.push(fragment);
                }
            }

            tracing::trace!("join {} -> {} AS {}", parent_alias, table, alias);
            plan.joins.push(format!(
                " LEFT JOIN {} AS {} ON {}",
                params.quote(table),
                params.quote(&alias),
                on.join(" AND ")
            ));

            let mut rel_path = path.to_vec();
            rel_path.push(relation.name.clone());
            plan.relations.push(RelationMapping {
                path: rel_path.clone(),
                alias: alias.clone(),
                many: relation.kind.is_many(),
            });

            if inclusion.include {
                self.project(target_model, &alias, &rel_path, inclusion, params, plan)?;
            }

            self.walk(
                target_model,
                &alias,
                &rel_path,
                &inclusion.nested,
                depth + 1,
                params,
                plan,
            )?;
        }
        Ok(())
    }

    fn project(
        &self,
        model: &str,
        alias: &str,
        path: &[String],
        inclusion: &RelationInclusion,
        params: &ParamContext,
        plan: &mut JoinPlan,
    ) -> RelqResult<()> {
        let fields: Vec<String> = match inclusion.query.as_deref() {
            Some(q) if !q.selection.is_empty() => q.selection.clone(),
            _ => self
                .meta
                .model_fields(model)?
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        if fields.is_empty() {
            plan.projections.push(format!("{}.*", params.quote(alias)));
            return Ok(());
        }

        for field in &fields {
            let column = self.meta.column_name(model, field)?;
            let output = format!("{}_{}", alias, field);
            plan.projections.push(format!(
                "{}.{} AS {}",
                params.quote(alias),
                params.quote(column),
                params.quote(&output)
            ));
            plan.fields.push(FieldMapping {
                column: output,
                path: path.to_vec(),
                field: field.clone(),
            });
        }
        Ok(())
    }

    /// Reserve `candidate`, suffixing `_2`, `_3`, ... on collision.
    fn unique_alias(&mut self, candidate: String) -> String {
        if self.used_aliases.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 2;
        loop {
            let next = format!("{}_{}", candidate, n);
            if self.used_aliases.insert(next.clone()) {
                return next;
            }
            n += 1;
        }
    }
}
