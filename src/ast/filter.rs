//! Boolean filter trees.

use crate::ast::{AggregateFunction, CaseMode, LogicalOp, Operator, Value};
use serde::{Deserialize, Serialize};

/// A leaf comparison: `field <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    #[serde(default = "null_value")]
    pub value: Value,
    #[serde(default)]
    pub mode: CaseMode,
    /// Compare an aggregate of the field instead of the field (HAVING only).
    #[serde(default)]
    pub aggregate: Option<AggregateFunction>,
}

fn null_value() -> Value {
    Value::Null
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
            mode: CaseMode::Default,
            aggregate: None,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    pub fn is_in(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::new(field, Operator::In, values)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, true)
    }

    pub fn insensitive(mut self) -> Self {
        self.mode = CaseMode::Insensitive;
        self
    }

    /// Compare `FUNC(field)` instead of `field`.
    pub fn on_aggregate(mut self, function: AggregateFunction) -> Self {
        self.aggregate = Some(function);
        self
    }
}

/// A filter node: direct conditions plus nested sub-filters joined by one
/// logical operator. `Not` negates the AND of everything at its node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub op: LogicalOp,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub nested: Vec<Filter>,
}

impl Filter {
    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            op: LogicalOp::And,
            conditions: conditions.into_iter().collect(),
            nested: Vec::new(),
        }
    }

    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            op: LogicalOp::Or,
            conditions: conditions.into_iter().collect(),
            nested: Vec::new(),
        }
    }

    pub fn not(nested: impl IntoIterator<Item = Filter>) -> Self {
        Self {
            op: LogicalOp::Not,
            conditions: Vec::new(),
            nested: nested.into_iter().collect(),
        }
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn group(mut self, filter: Filter) -> Self {
        self.nested.push(filter);
        self
    }

    /// True when no condition exists anywhere in the tree.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.nested.iter().all(Filter::is_empty)
    }

    /// A copy of this filter with `condition` ANDed in.
    pub fn and_condition(&self, condition: Condition) -> Filter {
        if self.is_empty() {
            return Filter::and([condition]);
        }
        if self.op == LogicalOp::And {
            let mut merged = self.clone();
            merged.conditions.push(condition);
            return merged;
        }
        Filter {
            op: LogicalOp::And,
            conditions: vec![condition],
            nested: vec![self.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree() {
        let f = Filter::not([Filter::default(), Filter::or([])]);
        assert!(f.is_empty());
        assert!(!Filter::and([Condition::equals("a", 1)]).is_empty());
    }

    #[test]
    fn test_and_condition_wraps_or() {
        let f = Filter::or([Condition::equals("a", 1), Condition::equals("b", 2)]);
        let merged = f.and_condition(Condition::equals("c", 3));
        assert_eq!(merged.op, LogicalOp::And);
        assert_eq!(merged.conditions.len(), 1);
        assert_eq!(merged.nested, vec![f]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let f: Filter = serde_json::from_str(
            r#"{"op":"OR","conditions":[{"field":"role","op":"equals","value":"admin"}]}"#,
        )
        .unwrap();
        assert_eq!(f.op, LogicalOp::Or);
        assert_eq!(f.conditions[0].mode, CaseMode::Default);
        assert!(f.nested.is_empty());
    }
}
