//! Statement compilation through the public `compile` entry point.

use super::blog_schema;
use crate::ast::{
    AggregateFunction, Aggregation, Condition, Data, Filter, NestedWrite, Operation, Operator, Query,
    RelationInclusion, Value,
};
use crate::error::RelqError;
use crate::transpiler::{CompileOptions, Dialect, ToSql, compile, compile_with};
use pretty_assertions::assert_eq;

#[test]
fn test_nested_and_or() {
    let schema = blog_schema();
    let filter = Filter::and([Condition::equals("status", "active")])
        .group(Filter::or([Condition::equals("role", "admin"), Condition::equals("role", "moderator")]));
    let q = Query::find_many("User").filter_tree(filter);
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert_eq!(
        out.sql,
        "SELECT * FROM users WHERE status = $1 AND (role = $2 OR role = $3)"
    );
    assert_eq!(out.args.len(), 3);
}

#[test]
fn test_not_over_or() {
    let schema = blog_schema();
    let filter = Filter::not([Filter::or([
        Condition::equals("status", "inactive"),
        Condition::equals("deleted", true),
    ])]);
    let q = Query::find_many("User").filter_tree(filter);
    let out = q.to_sql(Dialect::Postgres, &schema).unwrap();
    assert_eq!(out.sql, "SELECT * FROM users WHERE NOT (status = $1 OR deleted = $2)");
    assert_eq!(out.args, vec![Value::from("inactive"), Value::Bool(true)]);
}

#[test]
fn test_empty_filter_omits_where() {
    let schema = blog_schema();
    let q = Query::find_many("User").filter_tree(Filter::and([]).group(Filter::or([])));
    let out = compile(&q, Dialect::Sqlite, &schema).unwrap();
    assert_eq!(out.sql, "SELECT * FROM users");
}

#[test]
fn test_mapped_column_in_where() {
    let schema = blog_schema();
    let q = Query::find_unique("User")
        .filter(Condition::new("email", Operator::EndsWith, "@example.com").insensitive());
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert_eq!(
        out.sql,
        "SELECT * FROM users WHERE LOWER(email_address) LIKE LOWER($1)"
    );
    assert_eq!(out.args, vec![Value::from("%@example.com")]);
    assert!(out.expects_single());
}

#[test]
fn test_unknown_field_suggests() {
    let schema = blog_schema();
    let q = Query::find_many("User").filter(Condition::equals("stauts", "x"));
    let err = compile(&q, Dialect::Postgres, &schema).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unknown field 'stauts' on model 'User'. Did you mean 'status'?"
    );
}

#[test]
fn test_include_chain_emits_two_joins() {
    let schema = blog_schema();
    let q = Query::find_many("User").include(
        RelationInclusion::new("posts")
            .select(["title"])
            .include(RelationInclusion::new("comments").select(["body"])),
    );
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert_eq!(out.sql.matches("LEFT JOIN").count(), 2);
    assert_eq!(
        out.sql,
        "SELECT users.*, users_posts.title AS users_posts_title, users_posts_comments.body AS users_posts_comments_body \
FROM users \
LEFT JOIN posts AS users_posts ON users_posts.author_id = users.id \
LEFT JOIN comments AS users_posts_comments ON users_posts_comments.post_id = users_posts.id"
    );
    assert_eq!(out.mapping.relations.len(), 2);
    assert_eq!(out.mapping.fields[1].path, vec!["posts", "comments"]);
}

#[test]
fn test_join_bind_order_precedes_where() {
    let schema = blog_schema();
    let q = Query::find_many("User")
        .select(["id"])
        .filter(Condition::equals("status", "active"))
        .include(
            RelationInclusion::new("posts")
                .select(["title"])
                .filter(Condition::equals("published", true)),
        );
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert_eq!(
        out.sql,
        "SELECT users.id AS id, users_posts.title AS users_posts_title FROM users \
LEFT JOIN posts AS users_posts ON users_posts.author_id = users.id AND users_posts.published = $1 \
WHERE users.status = $2"
    );
    assert_eq!(out.args, vec![Value::Bool(true), Value::from("active")]);
}

#[test]
fn test_create_many_k_by_m() {
    let schema = blog_schema();
    let rows: Vec<Data> = (0..4)
        .map(|i| Data::new().set("title", format!("t{}", i)).set("author_id", i).set("published", false))
        .collect();
    let q = Query::create_many("Post", rows);
    let out = compile(&q, Dialect::MySql, &schema).unwrap();
    assert_eq!(out.sql.matches("(?, ?, ?)").count(), 4);
    assert_eq!(out.args.len(), 12);
}

#[test]
fn test_upsert_scenario() {
    let schema = blog_schema();
    let q = Query::upsert(
        "User",
        ["email"],
        Data::new().set("email", "a@b.com").set("name", "A"),
        Data::new().set("name", "A2"),
    );
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert!(out.sql.contains("INSERT INTO users"));
    assert!(out.sql.contains("ON CONFLICT (email_address)"));
    assert!(out.sql.contains("DO UPDATE SET"));
    assert_eq!(out.args.len(), 3);
}

#[test]
fn test_aggregate_scenario() {
    let schema = blog_schema();
    let q = Query::aggregate("Order")
        .aggregation(Aggregation::count_all())
        .aggregation(Aggregation::new(AggregateFunction::Sum, "amount"))
        .group(["user_id"]);
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert!(out.sql.contains("COUNT(*) AS count_"));
    assert!(out.sql.contains("SUM(amount) AS sum_amount"));
    assert!(out.sql.contains("GROUP BY user_id"));
}

#[test]
fn test_aggregate_in_where_is_refused() {
    let schema = blog_schema();
    let q = Query::find_many("Order")
        .filter(Condition::new("amount", Operator::Gt, 10).on_aggregate(AggregateFunction::Sum));
    let err = compile(&q, Dialect::Postgres, &schema).unwrap_err();
    assert!(matches!(err, RelqError::UnsupportedOperator { .. }));
}

#[test]
fn test_safety_predicate() {
    let schema = blog_schema();
    for q in [Query::delete("User"), Query::delete_many("User")] {
        let err = compile(&q, Dialect::Postgres, &schema).unwrap_err();
        assert!(matches!(err, RelqError::MissingSafetyPredicate { .. }));
    }
}

#[test]
fn test_payload_mismatch() {
    let schema = blog_schema();
    let mut q = Query::find_many("User");
    q.payload = crate::ast::Payload::Create(Data::new().set("name", "x"));
    let err = compile(&q, Dialect::Postgres, &schema).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Operation findMany expects no payload, got create"
    );

    let q = Query::new("User", Operation::Create);
    let err = compile(&q, Dialect::Postgres, &schema).unwrap_err();
    assert!(matches!(err, RelqError::PayloadMismatch { expected: "create", found: "no", .. }));
}

#[test]
fn test_nested_writes_only_on_single_row_writes() {
    let schema = blog_schema();
    let write = NestedWrite::create("posts", Data::new().set("title", "t"));

    let q = Query::find_many("User").write(write.clone());
    let err = compile(&q, Dialect::Postgres, &schema).unwrap_err();
    assert_eq!(err.to_string(), "Operation findMany cannot carry nested writes");

    let q = Query::delete_many("User").filter(Condition::equals("id", 1)).write(write.clone());
    let err = compile(&q, Dialect::MySql, &schema).unwrap_err();
    assert!(matches!(err, RelqError::NestedWritesNotAllowed { .. }));

    let q = Query::create("User", Data::new().set("name", "A")).write(write.clone());
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert_eq!(out.sql, "INSERT INTO users (name) VALUES ($1) RETURNING *");
    assert_eq!(out.nested_writes(), &[write][..]);
}

#[test]
fn test_filter_depth_bound() {
    let schema = blog_schema();
    let mut filter = Filter::and([Condition::equals("id", 1)]);
    for _ in 0..10 {
        filter = Filter::or([]).group(filter);
    }
    let q = Query::find_many("User").filter_tree(filter);
    let options = CompileOptions { max_depth: 5 };
    let err = compile_with(&q, Dialect::Postgres, &schema, &options).unwrap_err();
    assert!(matches!(err, RelqError::DepthExceeded { limit: 5, .. }));
    assert!(compile(&q, Dialect::Postgres, &schema).is_ok());
}

#[test]
fn test_compiled_query_keeps_origin() {
    let schema = blog_schema();
    let q = Query::find_first("User").throw_if_not_found();
    let out = compile(&q, Dialect::Postgres, &schema).unwrap();
    assert!(out.expects_single());
    assert!(out.throw_if_not_found());
    assert_eq!(out.query.operation, Operation::FindFirst);
    assert_eq!(out.sql, "SELECT * FROM users LIMIT 1");
}
