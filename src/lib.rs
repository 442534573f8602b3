//! # relq: relational query compiler
//!
//! Turns structured, dialect-independent queries into SQL text plus a
//! positional argument list for PostgreSQL (`$n`), MySQL and SQLite (`?`).
//!
//! ## Quick Example
//!
//! ```
//! use relq::prelude::*;
//!
//! let schema = Schema::new().with_model(ModelMeta::new("User", "users").fields(["id", "status"]));
//!
//! let query = Query::find_many("User")
//!     .filter(Condition::equals("status", "active"))
//!     .take(10);
//!
//! let compiled = relq::compile(&query, Dialect::Postgres, &schema).unwrap();
//! assert_eq!(compiled.sql, "SELECT * FROM users WHERE status = $1 LIMIT 10");
//! assert_eq!(compiled.args, vec![Value::from("active")]);
//! ```
//!
//! ## Layout
//!
//! | Module       | Role                                              |
//! |--------------|---------------------------------------------------|
//! | `ast`        | Query, Filter, RelationInclusion, NestedWrite ... |
//! | `schema`     | Model/field/relation registry                     |
//! | `transpiler` | Filter, join, statement and nested-write compilers|
//! | `config`     | `relq.toml` loading                               |

pub mod ast;
pub mod config;
pub mod error;
pub mod schema;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::RelqConfig;
    pub use crate::error::*;
    pub use crate::schema::{Metadata, ModelMeta, Registry, RelationKind, RelationMeta, Schema};
    pub use crate::transpiler::{
        CompileOptions, CompiledQuery, Compiler, Dialect, ResultMapping, Statement, ToSql,
    };
}

pub use transpiler::{compile, compile_nested_writes, compile_with};
