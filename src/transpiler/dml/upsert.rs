//! UPSERT SQL generation.
//!
//! `INSERT ... ON CONFLICT (keys) DO UPDATE SET ...` on Postgres and SQLite,
//! `INSERT ... ON DUPLICATE KEY UPDATE ...` on MySQL. The clause shape comes
//! from the dialect's [`SqlGenerator::upsert_clause`].
//!
//! [`SqlGenerator::upsert_clause`]: crate::transpiler::SqlGenerator::upsert_clause

use super::insert::columns;
use super::unique_fields;
use crate::ast::{Payload, Query};
use crate::error::{RelqError, RelqResult};
use crate::schema::Metadata;
use crate::transpiler::params::ParamContext;
use crate::transpiler::{ResultMapping, root_mapping};

/// Generate UPSERT SQL.
pub fn build_upsert(
    query: &Query,
    meta: &dyn Metadata,
    params: &mut ParamContext,
) -> RelqResult<(String, ResultMapping)> {
    let Payload::Upsert { keys, create, update } = &query.payload else {
        return Err(RelqError::empty_payload(query.operation.to_string()));
    };
    if keys.is_empty() {
        return Err(RelqError::MissingUpsertKeys {
            model: query.model.clone(),
        });
    }
    if create.is_empty() {
        return Err(RelqError::empty_payload(query.operation.to_string()));
    }
    unique_fields("upsert create", create)?;
    unique_fields("upsert update", update)?;

    let table = meta.table_name(&query.model)?;
    let cols = columns(Some(&query.model), create.fields(), meta, params)?;
    let values: Vec<String> = create.iter().map(|(_, v)| params.add_param(v.clone())).collect();
    let key_cols = columns(Some(&query.model), keys.iter().map(String::as_str), meta, params)?;

    let mut assignments = Vec::new();
    if update.is_empty() {
        // Keep the statement valid: reassign the keys from the proposed row.
        for key in &key_cols {
            assignments.push(format!("{} = {}", key, params.generator().inserted_value(key)));
        }
    } else {
        for (field, value) in update.iter() {
            let col = params.quote(meta.column_name(&query.model, field)?);
            assignments.push(format!("{} = {}", col, params.add_param(value.clone())));
        }
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        params.quote(table),
        cols.join(", "),
        values.join(", ")
    );
    sql.push_str(&params.generator().upsert_clause(&key_cols, &assignments));
    if params.generator().supports_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok((sql, root_mapping(query)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Data, Value};
    use crate::schema::{ModelMeta, Schema};
    use crate::transpiler::Dialect;
    use pretty_assertions::assert_eq;

    fn upsert(update: Data) -> Query {
        Query::upsert(
            "User",
            ["email"],
            Data::new().set("email", "a@b.com").set("name", "A"),
            update,
        )
    }

    fn build(q: &Query, dialect: Dialect) -> RelqResult<(String, Vec<Value>)> {
        let schema = Schema::new().with_model(ModelMeta::new("User", "users"));
        let mut params = ParamContext::new(dialect);
        let (sql, _) = build_upsert(q, &schema, &mut params)?;
        Ok((sql, params.into_params()))
    }

    #[test]
    fn test_upsert_postgres() {
        let (sql, args) = build(&upsert(Data::new().set("name", "A2")), Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO users (email, name) VALUES ($1, $2) ON CONFLICT (email) DO UPDATE SET name = $3 RETURNING *"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_upsert_mysql() {
        let (sql, _) = build(&upsert(Data::new().set("name", "A2")), Dialect::MySql).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO users (email, name) VALUES (?, ?) ON DUPLICATE KEY UPDATE name = ?"
        );
    }

    #[test]
    fn test_upsert_empty_update_reassigns_keys() {
        let (sql, args) = build(&upsert(Data::new()), Dialect::Sqlite).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO users (email, name) VALUES (?, ?) ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email"
        );
        assert_eq!(args.len(), 2);

        let (sql, _) = build(&upsert(Data::new()), Dialect::MySql).unwrap();
        assert!(sql.ends_with("ON DUPLICATE KEY UPDATE email = VALUES(email)"));
    }

    #[test]
    fn test_upsert_rejects_repeated_field() {
        let err = build(&upsert(Data::new().set("name", "A2").set("name", "A3")), Dialect::MySql).unwrap_err();
        assert_eq!(err.to_string(), "Field 'name' appears more than once in upsert update payload");

        let q = Query::upsert(
            "User",
            ["email"],
            Data::new().set("email", "a").set("email", "b"),
            Data::new(),
        );
        let err = build(&q, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, RelqError::DuplicateField { ref operation, .. } if operation == "upsert create"));
    }

    #[test]
    fn test_upsert_requires_keys() {
        let q = Query::upsert("User", Vec::<String>::new(), Data::new().set("email", "x"), Data::new());
        let err = build(&q, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, RelqError::MissingUpsertKeys { .. }));
    }
}
