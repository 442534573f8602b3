//! Per-dialect SQL generators.

pub mod mysql;
pub mod postgres;
pub mod sqlite;
