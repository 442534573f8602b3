//! Domain model: immutable values describing query intent.

pub mod filter;
pub mod operators;
pub mod query;
pub mod values;
pub mod writes;

pub use filter::{Condition, Filter};
pub use operators::{AggregateFunction, CaseMode, LogicalOp, Operation, Operator, SortOrder};
pub use query::{Aggregation, Cursor, OrderBy, Query, RelationInclusion};
pub use values::Value;
pub use writes::{Data, NestedWrite, NestedWriteOp, Payload};
