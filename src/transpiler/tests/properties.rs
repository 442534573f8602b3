//! Property tests for argument order and placeholder numbering.

use super::blog_schema;
use crate::ast::{Condition, Data, Filter, LogicalOp, Query, Value};
use crate::schema::{ModelMeta, Schema};
use crate::transpiler::{Dialect, compile};
use proptest::prelude::*;

/// Fields on `User` that take plain scalar comparisons.
const FIELDS: &[&str] = &["id", "name", "role", "status"];

fn arb_condition() -> impl Strategy<Value = Condition> {
    (0..FIELDS.len(), any::<i64>()).prop_map(|(f, v)| Condition::equals(FIELDS[f], v))
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    let leaf = prop::collection::vec(arb_condition(), 0..4).prop_map(|c| Filter::and(c));
    leaf.prop_recursive(4, 32, 4, |inner| {
        (
            prop_oneof![Just(LogicalOp::And), Just(LogicalOp::Or), Just(LogicalOp::Not)],
            prop::collection::vec(arb_condition(), 0..3),
            prop::collection::vec(inner, 0..3),
        )
            .prop_map(|(op, conditions, nested)| Filter {
                op,
                conditions,
                nested,
            })
    })
}

/// Leaf values in the order a depth-first, conditions-then-groups walk sees them.
fn leaf_values(filter: &Filter, out: &mut Vec<Value>) {
    for c in &filter.conditions {
        out.push(c.value.clone());
    }
    for n in &filter.nested {
        leaf_values(n, out);
    }
}

/// Postgres placeholder numbers in textual order.
fn numbers(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if let Ok(n) = sql[start..end].parse() {
                out.push(n);
            }
            i = end;
        } else {
            i += 1;
        }
    }
    out
}

proptest! {
    #[test]
    fn prop_args_follow_leaf_order(filter in arb_filter()) {
        let schema = blog_schema();
        let q = Query::find_many("User").filter_tree(filter.clone());
        let mut expected = Vec::new();
        leaf_values(&filter, &mut expected);

        for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
            let out = compile(&q, dialect, &schema).unwrap();
            prop_assert_eq!(&out.args, &expected);
            if dialect != Dialect::Postgres {
                prop_assert_eq!(out.sql.matches('?').count(), expected.len());
            }
        }
    }

    #[test]
    fn prop_postgres_numbering_is_dense(filter in arb_filter(), skip in 0u64..5) {
        let schema = blog_schema();
        let q = Query::find_many("User")
            .filter_tree(filter)
            .order_asc("id")
            .cursor("id", 10)
            .skip(skip);
        let out = compile(&q, Dialect::Postgres, &schema).unwrap();
        let found = numbers(&out.sql);
        let expected: Vec<usize> = (1..=out.args.len()).collect();
        prop_assert_eq!(found, expected);
        prop_assert!(!out.sql.contains("()"));
    }

    #[test]
    fn prop_create_many_binds_k_times_m(k in 1usize..6, m in 1usize..5) {
        // No declared fields, so any column name passes through.
        let schema = Schema::new().with_model(ModelMeta::new("Event", "events"));
        let rows: Vec<Data> = (0..k)
            .map(|r| (0..m).map(|c| (format!("c{}", c), Value::Int((r * m + c) as i64))).collect())
            .collect();
        let q = Query::create_many("Event", rows);
        let out = compile(&q, Dialect::Postgres, &schema).unwrap();
        prop_assert_eq!(out.args.len(), k * m);
        prop_assert_eq!(out.sql.matches('(').count(), k + 1);
        let in_order: Vec<Value> = (0..k * m).map(|i| Value::Int(i as i64)).collect();
        prop_assert_eq!(out.args, in_order);
    }

    #[test]
    fn prop_update_delete_never_unconditional(filter in arb_filter()) {
        let schema = blog_schema();
        let q = Query::delete_many("User").filter_tree(filter.clone());
        let result = compile(&q, Dialect::MySql, &schema);
        prop_assert_eq!(result.is_err(), filter.is_empty());

        let q = Query::update_many("User", Data::new().set("status", "x")).filter_tree(filter.clone());
        let result = compile(&q, Dialect::Sqlite, &schema);
        if let Ok(out) = &result {
            prop_assert!(out.sql.contains(" WHERE "));
        }
        prop_assert_eq!(result.is_err(), filter.is_empty());
    }
}
