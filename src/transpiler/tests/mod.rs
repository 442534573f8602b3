//! Transpiler test modules.
//!
//! Tests are organized by category:
//! - `core`: SELECT, INSERT, UPDATE, DELETE, UPSERT, aggregates and joins
//! - `dialects`: the same queries across Postgres, MySQL and SQLite
//! - `nested`: relation writes keyed off a parent row
//! - `properties`: argument-order and placeholder-numbering properties

mod core;
mod properties;

use crate::schema::{FieldMeta, ModelMeta, RelationKind, RelationMeta, Schema};

fn relation(name: &str, to: &str, from: &str, to_field: &str, kind: RelationKind) -> RelationMeta {
    RelationMeta {
        name: name.to_string(),
        to_model: to.to_string(),
        from_fields: vec![from.to_string()],
        to_fields: vec![to_field.to_string()],
        kind,
    }
}

/// Users write posts, posts have comments, comments have an author.
pub(super) fn blog_schema() -> Schema {
    Schema::new()
        .with_model(
            ModelMeta::new("User", "users")
                .fields(["id", "name", "role", "status", "deleted", "tags", "bio"])
                .field(FieldMeta {
                    name: "email".to_string(),
                    column: Some("email_address".to_string()),
                })
                .relation(relation("posts", "Post", "id", "author_id", RelationKind::OneToMany)),
        )
        .with_model(
            ModelMeta::new("Post", "posts")
                .fields(["id", "title", "author_id", "published"])
                .relation(relation("author", "User", "author_id", "id", RelationKind::ManyToOne))
                .relation(relation("comments", "Comment", "id", "post_id", RelationKind::OneToMany)),
        )
        .with_model(
            ModelMeta::new("Comment", "comments")
                .fields(["id", "body", "post_id", "user_id"])
                .relation(relation("user", "User", "user_id", "id", RelationKind::ManyToOne)),
        )
        .with_model(ModelMeta::new("Order", "orders").fields(["id", "user_id", "amount", "status"]))
}
