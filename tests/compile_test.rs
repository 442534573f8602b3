use relq::prelude::*;
use std::sync::Arc;

const SCHEMA: &str = r#"
[[models]]
name = "User"
table = "users"
fields = [
    { name = "id" },
    { name = "email", column = "email_address" },
    { name = "status" },
]

[[models.relations]]
name = "posts"
to_model = "Post"
from_fields = ["id"]
to_fields = ["author_id"]
kind = "one_to_many"

[[models]]
name = "Post"
table = "posts"
fields = [{ name = "id" }, { name = "title" }, { name = "author_id" }]
"#;

fn registry() -> Registry {
    Registry::new(Schema::from_toml(SCHEMA).expect("schema parses"))
}

#[test]
fn test_query_from_json() {
    let json = r#"{
        "model": "User",
        "operation": "findMany",
        "selection": ["id", "email"],
        "filter": {
            "op": "AND",
            "conditions": [{ "field": "status", "op": "equals", "value": "active" }],
            "nested": [{
                "op": "OR",
                "conditions": [
                    { "field": "email", "op": "endsWith", "value": "@a.com" },
                    { "field": "email", "op": "isNull", "value": true }
                ]
            }]
        },
        "order_by": [{ "field": "id", "order": "desc" }],
        "take": 20
    }"#;
    let query: Query = serde_json::from_str(json).expect("query parses");
    let registry = registry();
    let compiled = Compiler::new(&registry, Dialect::Postgres).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT id, email_address AS email FROM users \
WHERE status = $1 AND (email_address LIKE $2 OR email_address IS NULL) ORDER BY id DESC LIMIT 20"
    );
    assert_eq!(compiled.args, vec![Value::from("active"), Value::from("%@a.com")]);
}

#[test]
fn test_compiled_query_serializes() {
    let registry = registry();
    let query = Query::find_many("User")
        .include(RelationInclusion::new("posts").select(["title"]))
        .filter(Condition::equals("id", 3));
    let compiled = Compiler::new(&registry, Dialect::Sqlite).compile(&query).unwrap();
    let json = serde_json::to_value(&compiled).unwrap();
    assert_eq!(json["dialect"], "sqlite");
    assert_eq!(json["args"], serde_json::json!([3]));
    assert_eq!(json["mapping"]["relations"][0]["alias"], "users_posts");
    assert_eq!(json["mapping"]["relations"][0]["many"], true);
}

#[test]
fn test_reload_between_compiles() {
    let registry = registry();
    let compiler = Compiler::new(&registry, Dialect::MySql);
    let query = Query::find_many("User");
    assert_eq!(compiler.compile(&query).unwrap().sql, "SELECT * FROM users");

    registry.reload(Schema::new().with_model(ModelMeta::new("User", "accounts")));
    assert_eq!(compiler.compile(&query).unwrap().sql, "SELECT * FROM accounts");
}

#[test]
fn test_concurrent_compiles() {
    let registry = Arc::new(registry());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let compiler = Compiler::new(&registry, Dialect::Postgres);
                for n in 0..50i64 {
                    let q = Query::find_many("User")
                        .filter(Condition::equals("id", n))
                        .filter(Condition::equals("status", format!("s{}", i)));
                    let out = compiler.compile(&q).unwrap();
                    assert_eq!(out.sql, "SELECT * FROM users WHERE id = $1 AND status = $2");
                    assert_eq!(out.args[0], Value::Int(n));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_nested_writes_from_json() {
    let writes: Vec<NestedWrite> = serde_json::from_str(
        r#"[
            { "relation": "posts", "op": { "create": [["title", "hello"]] } },
            { "relation": "posts", "op": { "set": { "conditions": [{ "field": "id", "op": "in", "value": [1, 2] }] } } }
        ]"#,
    )
    .expect("writes parse");
    let registry = registry();
    let stmts = Compiler::new(&registry, Dialect::Postgres)
        .compile_nested_writes("User", &Value::Int(5), &writes)
        .unwrap();
    let sql: Vec<&str> = stmts.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        sql,
        vec![
            "INSERT INTO posts (author_id, title) VALUES ($1, $2) RETURNING *",
            "UPDATE posts SET author_id = NULL WHERE author_id = $1",
            "UPDATE posts SET author_id = $1 WHERE id IN ($2, $3)",
        ]
    );
}

#[test]
fn test_errors_are_not_retryable() {
    let registry = registry();
    let err = Compiler::new(&registry, Dialect::Postgres)
        .compile(&Query::delete_many("User"))
        .unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.to_string(), "Refusing to compile deleteMany on 'User' without a filter");
}
