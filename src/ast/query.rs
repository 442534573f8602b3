//! The query aggregate and its builder methods.
//!
//! ```
//! use relq::ast::{Condition, Query};
//!
//! let query = Query::find_many("User")
//!     .select(["id", "email"])
//!     .filter(Condition::equals("status", "active"))
//!     .order_desc("created_at")
//!     .take(10);
//! assert_eq!(query.selection, vec!["id", "email"]);
//! ```

use crate::ast::{AggregateFunction, Condition, Data, Filter, NestedWrite, Operation, Payload, SortOrder, Value};
use serde::{Deserialize, Serialize};

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Seek pagination sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub field: String,
    pub value: Value,
}

/// `FUNC(field) AS func_field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    #[serde(default)]
    pub field: String,
}

impl Aggregation {
    pub fn count_all() -> Self {
        Self {
            function: AggregateFunction::Count,
            field: "*".to_string(),
        }
    }

    pub fn new(function: AggregateFunction, field: impl Into<String>) -> Self {
        Self {
            function,
            field: field.into(),
        }
    }

    pub fn is_star(&self) -> bool {
        self.field.is_empty() || self.field == "*"
    }

    /// Result column name. `COUNT(*)` becomes `count_`.
    pub fn alias(&self) -> String {
        let field = if self.is_star() { "" } else { self.field.as_str() };
        format!("{}_{}", self.function.alias_prefix(), field)
    }
}

/// A request to join a relation and project its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationInclusion {
    pub relation: String,
    /// Projection and join filter scoped to the relation.
    #[serde(default)]
    pub query: Option<Box<Query>>,
    /// When false the relation is joined only as a path to deeper inclusions.
    #[serde(default = "default_true")]
    pub include: bool,
    #[serde(default)]
    pub nested: Vec<RelationInclusion>,
}

fn default_true() -> bool {
    true
}

impl RelationInclusion {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            query: None,
            include: true,
            nested: Vec::new(),
        }
    }

    /// Join without projecting.
    pub fn path(relation: impl Into<String>) -> Self {
        Self {
            include: false,
            ..Self::new(relation)
        }
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let relation = self.relation.clone();
        let query = self.query.get_or_insert_with(|| Box::new(Query::find_many(relation)));
        query.selection = fields.into_iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// AND a condition into the join's ON clause.
    pub fn filter(mut self, condition: Condition) -> Self {
        let relation = self.relation.clone();
        let query = self.query.get_or_insert_with(|| Box::new(Query::find_many(relation)));
        query.filter = query.filter.and_condition(condition);
        self
    }

    pub fn include(mut self, inclusion: RelationInclusion) -> Self {
        self.nested.push(inclusion);
        self
    }
}

/// Dialect-independent description of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub model: String,
    pub operation: Operation,
    #[serde(default)]
    pub selection: Vec<String>,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub include: Vec<RelationInclusion>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub take: Option<u64>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub having: Filter,
    #[serde(default)]
    pub distinct: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    #[serde(default)]
    pub payload: Payload,
    /// Relation writes the caller expands with the nested-write compiler
    /// once the parent key is known.
    #[serde(default)]
    pub writes: Vec<NestedWrite>,
    #[serde(default)]
    pub throw_if_not_found: bool,
}

impl Query {
    pub fn new(model: impl Into<String>, operation: Operation) -> Self {
        Self {
            model: model.into(),
            operation,
            selection: Vec::new(),
            filter: Filter::default(),
            include: Vec::new(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            cursor: None,
            group_by: Vec::new(),
            having: Filter::default(),
            distinct: Vec::new(),
            aggregations: Vec::new(),
            payload: Payload::None,
            writes: Vec::new(),
            throw_if_not_found: false,
        }
    }

    pub fn find_many(model: impl Into<String>) -> Self {
        Self::new(model, Operation::FindMany)
    }

    pub fn find_first(model: impl Into<String>) -> Self {
        Self::new(model, Operation::FindFirst)
    }

    pub fn find_unique(model: impl Into<String>) -> Self {
        Self::new(model, Operation::FindUnique)
    }

    pub fn create(model: impl Into<String>, data: Data) -> Self {
        Self {
            payload: Payload::Create(data),
            ..Self::new(model, Operation::Create)
        }
    }

    pub fn create_many(model: impl Into<String>, rows: Vec<Data>) -> Self {
        Self {
            payload: Payload::CreateMany(rows),
            ..Self::new(model, Operation::CreateMany)
        }
    }

    pub fn update(model: impl Into<String>, data: Data) -> Self {
        Self {
            payload: Payload::Update(data),
            ..Self::new(model, Operation::Update)
        }
    }

    pub fn update_many(model: impl Into<String>, data: Data) -> Self {
        Self {
            payload: Payload::Update(data),
            ..Self::new(model, Operation::UpdateMany)
        }
    }

    pub fn delete(model: impl Into<String>) -> Self {
        Self::new(model, Operation::Delete)
    }

    pub fn delete_many(model: impl Into<String>) -> Self {
        Self::new(model, Operation::DeleteMany)
    }

    pub fn upsert<I, S>(model: impl Into<String>, keys: I, create: Data, update: Data) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            payload: Payload::Upsert {
                keys: keys.into_iter().map(|k| k.as_ref().to_string()).collect(),
                create,
                update,
            },
            ..Self::new(model, Operation::Upsert)
        }
    }

    pub fn aggregate(model: impl Into<String>) -> Self {
        Self::new(model, Operation::Aggregate)
    }

    pub fn group_by<I, S>(model: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            group_by: fields.into_iter().map(|f| f.as_ref().to_string()).collect(),
            ..Self::new(model, Operation::GroupBy)
        }
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selection.extend(fields.into_iter().map(|f| f.as_ref().to_string()));
        self
    }

    /// AND a condition into the root filter.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = self.filter.and_condition(condition);
        self
    }

    /// Replace the root filter.
    pub fn filter_tree(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having = self.having.and_condition(condition);
        self
    }

    pub fn include(mut self, inclusion: RelationInclusion) -> Self {
        self.include.push(inclusion);
        self
    }

    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            order: SortOrder::Asc,
        });
        self
    }

    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            order: SortOrder::Desc,
        });
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }

    pub fn cursor(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cursor = Some(Cursor {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn distinct<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.distinct.extend(fields.into_iter().map(|f| f.as_ref().to_string()));
        self
    }

    pub fn group<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.group_by.extend(fields.into_iter().map(|f| f.as_ref().to_string()));
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    pub fn write(mut self, write: NestedWrite) -> Self {
        self.writes.push(write);
        self
    }

    pub fn throw_if_not_found(mut self) -> Self {
        self.throw_if_not_found = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_alias() {
        assert_eq!(Aggregation::count_all().alias(), "count_");
        assert_eq!(Aggregation::new(AggregateFunction::Sum, "amount").alias(), "sum_amount");
        assert_eq!(Aggregation::new(AggregateFunction::Count, "").alias(), "count_");
    }

    #[test]
    fn test_inclusion_builder() {
        let inc = RelationInclusion::new("posts")
            .select(["title"])
            .include(RelationInclusion::new("comments").include(RelationInclusion::new("author")));
        assert_eq!(inc.nested[0].nested[0].relation, "author");
        assert_eq!(inc.query.as_ref().unwrap().selection, vec!["title"]);
    }

    #[test]
    fn test_query_json() {
        let q: Query = serde_json::from_str(
            r#"{"model":"User","operation":"findMany","take":5,
                "filter":{"conditions":[{"field":"status","op":"equals","value":"active"}]}}"#,
        )
        .unwrap();
        assert_eq!(q.operation, Operation::FindMany);
        assert_eq!(q.take, Some(5));
        assert_eq!(q.filter.conditions.len(), 1);
        assert_eq!(q.payload, Payload::None);
    }
}
