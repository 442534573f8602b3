//! Nested-write compilation.
//!
//! Expands relation writes into standalone statements keyed off a parent row.
//! Statements come out in input order, each with its own placeholder
//! numbering; the caller runs them in sequence inside its own transaction.

use crate::ast::{Data, Filter, NestedWrite, NestedWriteOp, Value};
use crate::error::{RelqError, RelqResult};
use crate::schema::{Metadata, RelationKind};
use crate::transpiler::conditions::FilterCompiler;
use crate::transpiler::dml::insert::{columns, rows_sql};
use crate::transpiler::dml::unique_fields;
use crate::transpiler::params::ParamContext;
use crate::transpiler::{CompileOptions, Dialect, Statement};

/// Where a relation's rows live and which column points back at the parent.
struct Target<'m> {
    /// Registered child model; `None` when resolved by naming convention.
    model: Option<&'m str>,
    table: String,
    fk: String,
}

/// Compile nested writes with default options.
pub fn compile_nested_writes(
    parent_model: &str,
    parent_key: &Value,
    writes: &[NestedWrite],
    dialect: Dialect,
    meta: &dyn Metadata,
) -> RelqResult<Vec<Statement>> {
    compile_nested_writes_with(
        parent_model,
        parent_key,
        writes,
        dialect,
        meta,
        &CompileOptions::default(),
    )
}

/// Compile nested writes for the parent row identified by `parent_key`.
pub fn compile_nested_writes_with(
    parent_model: &str,
    parent_key: &Value,
    writes: &[NestedWrite],
    dialect: Dialect,
    meta: &dyn Metadata,
    options: &CompileOptions,
) -> RelqResult<Vec<Statement>> {
    let mut statements = Vec::new();
    for write in writes {
        let target = resolve(meta, parent_model, write)?;
        let compiler = NestedCompiler {
            meta,
            dialect,
            options,
            target: &target,
            relation: &write.relation,
            key: parent_key,
        };
        let before = statements.len();
        compiler.compile(&write.op, &mut statements)?;
        tracing::debug!(
            relation = %write.relation,
            op = write.op.name(),
            table = %target.table,
            statements = statements.len() - before,
            "compiled nested write"
        );
    }
    Ok(statements)
}

/// Resolve the child table and foreign key from the parent's relation.
/// Parents without registered relations fall back to table = relation name
/// and FK = `<parentTable>_id`.
fn resolve<'m>(meta: &'m dyn Metadata, parent_model: &str, write: &NestedWrite) -> RelqResult<Target<'m>> {
    match meta.relation(parent_model, &write.relation) {
        Ok(rel) => {
            if rel.kind == RelationKind::ManyToOne {
                return Err(RelqError::unsupported(
                    &write.relation,
                    write.op.name(),
                    "nested writes need the foreign key on the related model",
                ));
            }
            let fk_field = rel.to_fields.first().ok_or_else(|| {
                RelqError::Config(format!(
                    "relation '{}' on '{}' has no to_fields",
                    rel.name, parent_model
                ))
            })?;
            Ok(Target {
                model: Some(rel.to_model.as_str()),
                table: meta.table_name(&rel.to_model)?.to_string(),
                fk: meta.column_name(&rel.to_model, fk_field)?.to_string(),
            })
        }
        Err(RelqError::UnknownModel { .. }) => Ok(conventional(parent_model, &write.relation)),
        Err(RelqError::UnknownRelation { .. }) if has_no_relations(meta, parent_model) => {
            let parent_table = meta.table_name(parent_model)?;
            Ok(conventional(parent_table, &write.relation))
        }
        Err(e) => Err(e),
    }
}

fn has_no_relations(meta: &dyn Metadata, model: &str) -> bool {
    meta.model_relations(model).map(|r| r.is_empty()).unwrap_or(true)
}

fn conventional(parent_table: &str, relation: &str) -> Target<'static> {
    Target {
        model: None,
        table: relation.to_string(),
        fk: format!("{}_id", parent_table),
    }
}

struct NestedCompiler<'a> {
    meta: &'a dyn Metadata,
    dialect: Dialect,
    options: &'a CompileOptions,
    target: &'a Target<'a>,
    relation: &'a str,
    key: &'a Value,
}

impl NestedCompiler<'_> {
    fn compile(&self, op: &NestedWriteOp, out: &mut Vec<Statement>) -> RelqResult<()> {
        match op {
            NestedWriteOp::Create(data) => {
                self.check_create(op, data)?;
                out.push(self.insert(op, std::slice::from_ref(data))?);
            }
            NestedWriteOp::CreateMany(rows) => {
                if rows.is_empty() {
                    return Err(RelqError::empty_payload(format!("nested {}", op.name())));
                }
                for row in rows {
                    self.check_create(op, row)?;
                }
                out.push(self.insert(op, rows)?);
            }
            NestedWriteOp::Connect(filter) => {
                out.push(self.connect(op, filter)?);
            }
            NestedWriteOp::ConnectOrCreate { filter, create } => {
                self.check_create(op, create)?;
                out.push(self.connect(op, filter)?);
                out.push(self.insert_if_absent(create, filter, false)?);
            }
            NestedWriteOp::Disconnect(filter) => {
                let mut params = self.params();
                let where_clause = self.required_where(op, filter, &mut params)?;
                let sql = format!(
                    "UPDATE {} SET {} = NULL WHERE {}",
                    params.quote(&self.target.table),
                    params.quote(&self.target.fk),
                    where_clause
                );
                out.push(finish(sql, params));
            }
            NestedWriteOp::Set(filter) => {
                // Disconnect-all must run before connect-selected.
                let mut params = self.params();
                let fk = params.quote(&self.target.fk);
                let sql = format!(
                    "UPDATE {} SET {} = NULL WHERE {} = {}",
                    params.quote(&self.target.table),
                    fk,
                    fk,
                    params.add_param(self.key.clone())
                );
                out.push(finish(sql, params));
                if !filter.is_empty() {
                    out.push(self.connect(op, filter)?);
                }
            }
            NestedWriteOp::Update { filter, data } | NestedWriteOp::UpdateMany { filter, data } => {
                self.check_data(op, data)?;
                out.push(self.update(data, filter)?);
            }
            NestedWriteOp::Delete(filter) | NestedWriteOp::DeleteMany(filter) => {
                let mut params = self.params();
                let table = params.quote(&self.target.table);
                let scope = self.scoped_where(filter, &mut params)?;
                out.push(finish(format!("DELETE FROM {} WHERE {}", table, scope), params));
            }
            NestedWriteOp::Upsert { filter, create, update } => {
                self.check_create(op, create)?;
                if !update.is_empty() {
                    unique_fields(&format!("nested {} update", op.name()), update)?;
                    out.push(self.update(update, filter)?);
                }
                out.push(self.insert_if_absent(create, filter, true)?);
            }
        }
        Ok(())
    }

    fn params(&self) -> ParamContext {
        ParamContext::new(self.dialect)
    }

    fn filter_compiler(&self) -> FilterCompiler<'_> {
        FilterCompiler::new(self.meta, self.target.model, self.options.max_depth)
    }

    fn check_data(&self, op: &NestedWriteOp, data: &Data) -> RelqResult<()> {
        let operation = format!("nested {}", op.name());
        if data.is_empty() {
            return Err(RelqError::empty_payload(operation));
        }
        unique_fields(&operation, data)
    }

    /// Rows inserted under the parent get the FK from the parent key, never
    /// from the payload.
    fn check_create(&self, op: &NestedWriteOp, data: &Data) -> RelqResult<()> {
        self.check_data(op, data)?;
        for field in data.fields() {
            let column = match self.target.model {
                Some(model) => self.meta.column_name(model, field)?,
                None => field,
            };
            if column == self.target.fk {
                return Err(RelqError::ForeignKeyInPayload {
                    operation: op.name().to_string(),
                    relation: self.relation.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn required_where(&self, op: &NestedWriteOp, filter: &Filter, params: &mut ParamContext) -> RelqResult<String> {
        let sql = self.filter_compiler().compile(filter, params)?;
        if sql.is_empty() {
            return Err(RelqError::MissingWhere {
                operation: op.name().to_string(),
                relation: self.relation.to_string(),
            });
        }
        Ok(sql)
    }

    /// `fk = key`, ANDed with `filter` when it has any conditions.
    fn scoped_where(&self, filter: &Filter, params: &mut ParamContext) -> RelqResult<String> {
        let mut sql = format!(
            "{} = {}",
            params.quote(&self.target.fk),
            params.add_param(self.key.clone())
        );
        let extra = self.filter_compiler().compile_operand(filter, params)?;
        if !extra.is_empty() {
            sql.push_str(" AND ");
            sql.push_str(&extra);
        }
        Ok(sql)
    }

    /// `UPDATE child SET fk = key WHERE <filter>`.
    fn connect(&self, op: &NestedWriteOp, filter: &Filter) -> RelqResult<Statement> {
        let mut params = self.params();
        let table = params.quote(&self.target.table);
        let fk = params.quote(&self.target.fk);
        let key = params.add_param(self.key.clone());
        let where_clause = self.required_where(op, filter, &mut params)?;
        Ok(finish(
            format!("UPDATE {} SET {} = {} WHERE {}", table, fk, key, where_clause),
            params,
        ))
    }

    fn insert(&self, op: &NestedWriteOp, rows: &[Data]) -> RelqResult<Statement> {
        let mut params = self.params();
        let (cols, groups) = rows_sql(
            &format!("nested {}", op.name()),
            self.target.model,
            rows,
            &[(self.target.fk.as_str(), self.key)],
            self.meta,
            &mut params,
        )?;
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            params.quote(&self.target.table),
            cols.join(", "),
            groups.join(", ")
        );
        if params.generator().supports_returning() {
            sql.push_str(" RETURNING *");
        }
        Ok(finish(sql, params))
    }

    /// `UPDATE child SET <data> WHERE fk = key AND <filter>`.
    fn update(&self, data: &Data, filter: &Filter) -> RelqResult<Statement> {
        let mut params = self.params();
        let table = params.quote(&self.target.table);
        let cols = columns(self.target.model, data.fields(), self.meta, &params)?;
        let assignments: Vec<String> = cols
            .iter()
            .zip(data.iter())
            .map(|(col, (_, v))| format!("{} = {}", col, params.add_param(v.clone())))
            .collect();
        let scope = self.scoped_where(filter, &mut params)?;
        Ok(finish(
            format!("UPDATE {} SET {} WHERE {}", table, assignments.join(", "), scope),
            params,
        ))
    }

    /// INSERT guarded by `NOT EXISTS`, so it only fires when no row matches.
    /// `scoped` limits the existence check to this parent's children.
    fn insert_if_absent(&self, data: &Data, filter: &Filter, scoped: bool) -> RelqResult<Statement> {
        let mut params = self.params();
        let table = params.quote(&self.target.table);
        let mut cols = vec![params.quote(&self.target.fk)];
        cols.extend(columns(self.target.model, data.fields(), self.meta, &params)?);

        let mut values = vec![params.add_param(self.key.clone())];
        for (_, v) in data.iter() {
            values.push(params.add_param(v.clone()));
        }

        let exists = if scoped {
            self.scoped_where(filter, &mut params)?
        } else {
            self.filter_compiler().compile(filter, &mut params)?
        };
        let mut sql = format!(
            "INSERT INTO {} ({}) SELECT {}{}",
            table,
            cols.join(", "),
            values.join(", "),
            params.generator().dual_table()
        );
        if !exists.is_empty() {
            sql.push_str(&format!(" WHERE NOT EXISTS (SELECT 1 FROM {} WHERE {})", table, exists));
        }
        Ok(finish(sql, params))
    }
}

fn finish(sql: String, params: ParamContext) -> Statement {
    Statement {
        sql,
        args: params.into_params(),
    }
}
