//! INSERT SQL generation.

use super::unique_fields;
use crate::ast::{Data, Payload, Query, Value};
use crate::error::{RelqError, RelqResult};
use crate::schema::Metadata;
use crate::transpiler::params::ParamContext;
use crate::transpiler::{ResultMapping, root_mapping};

/// Generate INSERT SQL for a single row.
pub fn build_insert(
    query: &Query,
    meta: &dyn Metadata,
    params: &mut ParamContext,
) -> RelqResult<(String, ResultMapping)> {
    let data = match &query.payload {
        Payload::Create(data) => data,
        _ => return Err(RelqError::empty_payload(query.operation.to_string())),
    };
    if data.is_empty() {
        return Err(RelqError::empty_payload(query.operation.to_string()));
    }
    unique_fields(&query.operation.to_string(), data)?;

    let table = meta.table_name(&query.model)?;
    let cols = columns(Some(&query.model), data.fields(), meta, params)?;
    let values: Vec<String> = data.iter().map(|(_, v)| params.add_param(v.clone())).collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        params.quote(table),
        cols.join(", "),
        values.join(", ")
    );
    if params.generator().supports_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok((sql, root_mapping(query)))
}

/// Generate one multi-row INSERT. Every row must carry exactly the columns
/// of the first row; values are bound in the first row's column order.
pub fn build_insert_many(
    query: &Query,
    meta: &dyn Metadata,
    params: &mut ParamContext,
) -> RelqResult<(String, ResultMapping)> {
    let rows = match &query.payload {
        Payload::CreateMany(rows) => rows.as_slice(),
        _ => &[],
    };
    let table = meta.table_name(&query.model)?;
    let (cols, groups) = rows_sql("createMany", Some(&query.model), rows, &[], meta, params)?;

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        params.quote(table),
        cols.join(", "),
        groups.join(", ")
    );
    if params.generator().supports_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok((sql, root_mapping(query)))
}

/// Quoted column list for `fields`. Without a model the field names are
/// used as-is.
pub(crate) fn columns<'f>(
    model: Option<&str>,
    fields: impl Iterator<Item = &'f str>,
    meta: &dyn Metadata,
    params: &ParamContext,
) -> RelqResult<Vec<String>> {
    fields
        .map(|f| match model {
            Some(model) => Ok(params.quote(meta.column_name(model, f)?)),
            None => Ok(params.quote(f)),
        })
        .collect()
}

/// Shape-check `rows` and bind them as `(ph, ...)` groups. `prefix` values
/// (a foreign key, for nested writes) lead every group and are not part of
/// the row data.
pub(crate) fn rows_sql(
    operation: &str,
    model: Option<&str>,
    rows: &[Data],
    prefix: &[(&str, &Value)],
    meta: &dyn Metadata,
    params: &mut ParamContext,
) -> RelqResult<(Vec<String>, Vec<String>)> {
    let Some(first) = rows.first() else {
        return Err(RelqError::empty_payload(operation));
    };
    if first.is_empty() {
        return Err(RelqError::empty_payload(operation));
    }
    for row in rows {
        unique_fields(operation, row)?;
    }
    let reference: Vec<&str> = first.fields().collect();

    for (i, row) in rows.iter().enumerate().skip(1) {
        if let Some(missing) = reference.iter().find(|f| row.get(f).is_none()) {
            return Err(RelqError::ShapeMismatch {
                row: i,
                column: missing.to_string(),
                problem: "missing",
            });
        }
        if let Some(extra) = row.fields().find(|f| !reference.contains(f)) {
            return Err(RelqError::ShapeMismatch {
                row: i,
                column: extra.to_string(),
                problem: "unexpected",
            });
        }
    }

    let mut cols: Vec<String> = prefix.iter().map(|(c, _)| params.quote(c)).collect();
    cols.extend(columns(model, reference.iter().copied(), meta, params)?);

    let mut groups = Vec::with_capacity(rows.len());
    for row in rows {
        let mut phs: Vec<String> = prefix.iter().map(|(_, v)| params.add_param((*v).clone())).collect();
        for field in &reference {
            let value = row.get(field).cloned().unwrap_or(Value::Null);
            phs.push(params.add_param(value));
        }
        groups.push(format!("({})", phs.join(", ")));
    }
    Ok((cols, groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ModelMeta, Schema};
    use crate::transpiler::Dialect;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::new().with_model(ModelMeta::new("User", "users"))
    }

    #[test]
    fn test_insert_returning_only_on_postgres() {
        let schema = schema();
        let q = Query::create("User", Data::new().set("email", "a@b.com").set("name", "A"));

        let mut params = ParamContext::new(Dialect::Postgres);
        let (sql, _) = build_insert(&q, &schema, &mut params).unwrap();
        assert_eq!(sql, "INSERT INTO users (email, name) VALUES ($1, $2) RETURNING *");

        let mut params = ParamContext::new(Dialect::MySql);
        let (sql, _) = build_insert(&q, &schema, &mut params).unwrap();
        assert_eq!(sql, "INSERT INTO users (email, name) VALUES (?, ?)");
        assert_eq!(params.into_params(), vec![Value::from("a@b.com"), Value::from("A")]);
    }

    #[test]
    fn test_insert_empty_payload() {
        let schema = schema();
        let q = Query::create("User", Data::new());
        let mut params = ParamContext::new(Dialect::Postgres);
        let err = build_insert(&q, &schema, &mut params).unwrap_err();
        assert!(matches!(err, RelqError::EmptyPayload { .. }));
    }

    #[test]
    fn test_insert_many_binds_in_reference_order() {
        let schema = schema();
        let q = Query::create_many(
            "User",
            vec![
                Data::new().set("email", "a").set("name", "A"),
                Data::new().set("name", "B").set("email", "b"),
            ],
        );
        let mut params = ParamContext::new(Dialect::Sqlite);
        let (sql, _) = build_insert_many(&q, &schema, &mut params).unwrap();
        assert_eq!(sql, "INSERT INTO users (email, name) VALUES (?, ?), (?, ?)");
        assert_eq!(
            params.into_params(),
            vec![Value::from("a"), Value::from("A"), Value::from("b"), Value::from("B")]
        );
    }

    #[test]
    fn test_insert_many_shape_mismatch() {
        let schema = schema();
        let q = Query::create_many(
            "User",
            vec![
                Data::new().set("email", "a").set("name", "A"),
                Data::new().set("email", "b"),
            ],
        );
        let mut params = ParamContext::new(Dialect::Postgres);
        let err = build_insert_many(&q, &schema, &mut params).unwrap_err();
        assert_eq!(err.to_string(), "Shape mismatch in row 1: missing column 'name'");

        let q = Query::create_many(
            "User",
            vec![Data::new().set("email", "a"), Data::new().set("email", "b").set("age", 3)],
        );
        let mut params = ParamContext::new(Dialect::Postgres);
        let err = build_insert_many(&q, &schema, &mut params).unwrap_err();
        assert!(matches!(err, RelqError::ShapeMismatch { row: 1, problem: "unexpected", .. }));
    }

    #[test]
    fn test_insert_rejects_repeated_field() {
        let schema = schema();
        let q = Query::create("User", Data::new().set("name", "A").set("name", "B"));
        let mut params = ParamContext::new(Dialect::Postgres);
        let err = build_insert(&q, &schema, &mut params).unwrap_err();
        assert_eq!(err.to_string(), "Field 'name' appears more than once in create payload");

        // A later row repeating a reference column would pass the shape check.
        let q = Query::create_many(
            "User",
            vec![
                Data::new().set("email", "a").set("name", "A"),
                Data::new().set("email", "b").set("name", "B").set("email", "c"),
            ],
        );
        let mut params = ParamContext::new(Dialect::Postgres);
        let err = build_insert_many(&q, &schema, &mut params).unwrap_err();
        assert!(matches!(err, RelqError::DuplicateField { ref field, .. } if field == "email"));
    }

    #[test]
    fn test_insert_many_empty() {
        let schema = schema();
        let q = Query::create_many("User", Vec::new());
        let mut params = ParamContext::new(Dialect::Postgres);
        let err = build_insert_many(&q, &schema, &mut params).unwrap_err();
        assert_eq!(err.to_string(), "Empty payload: createMany requires at least one column");
    }
}
