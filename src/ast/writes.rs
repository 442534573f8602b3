//! Write payloads and nested relation writes.

use crate::ast::{Filter, Value};
use serde::{Deserialize, Serialize};

/// Ordered column/value pairs. Column order drives placeholder order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Data(pub Vec<(String, Value)>);

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(f, _)| f.as_str())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    /// The first field named twice, if any.
    pub fn duplicate_field(&self) -> Option<&str> {
        self.0
            .iter()
            .enumerate()
            .find(|(i, (f, _))| self.0[..*i].iter().any(|(prev, _)| prev == f))
            .map(|(_, (f, _))| f.as_str())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Data {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The write payload of a query. Exactly one kind per operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    #[default]
    None,
    Create(Data),
    CreateMany(Vec<Data>),
    Update(Data),
    Upsert {
        keys: Vec<String>,
        create: Data,
        update: Data,
    },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::None => "no",
            Payload::Create(_) => "create",
            Payload::CreateMany(_) => "createMany",
            Payload::Update(_) => "update",
            Payload::Upsert { .. } => "upsert",
        }
    }
}

/// A write against a related table, relative to a parent row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedWrite {
    pub relation: String,
    pub op: NestedWriteOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NestedWriteOp {
    Create(Data),
    CreateMany(Vec<Data>),
    Connect(Filter),
    ConnectOrCreate { filter: Filter, create: Data },
    Disconnect(Filter),
    Set(Filter),
    Update { filter: Filter, data: Data },
    UpdateMany { filter: Filter, data: Data },
    Delete(Filter),
    DeleteMany(Filter),
    Upsert { filter: Filter, create: Data, update: Data },
}

impl NestedWriteOp {
    pub fn name(&self) -> &'static str {
        match self {
            NestedWriteOp::Create(_) => "create",
            NestedWriteOp::CreateMany(_) => "createMany",
            NestedWriteOp::Connect(_) => "connect",
            NestedWriteOp::ConnectOrCreate { .. } => "connectOrCreate",
            NestedWriteOp::Disconnect(_) => "disconnect",
            NestedWriteOp::Set(_) => "set",
            NestedWriteOp::Update { .. } => "update",
            NestedWriteOp::UpdateMany { .. } => "updateMany",
            NestedWriteOp::Delete(_) => "delete",
            NestedWriteOp::DeleteMany(_) => "deleteMany",
            NestedWriteOp::Upsert { .. } => "upsert",
        }
    }
}

impl NestedWrite {
    pub fn new(relation: impl Into<String>, op: NestedWriteOp) -> Self {
        Self {
            relation: relation.into(),
            op,
        }
    }

    pub fn create(relation: impl Into<String>, data: Data) -> Self {
        Self::new(relation, NestedWriteOp::Create(data))
    }

    pub fn connect(relation: impl Into<String>, filter: Filter) -> Self {
        Self::new(relation, NestedWriteOp::Connect(filter))
    }

    pub fn disconnect(relation: impl Into<String>, filter: Filter) -> Self {
        Self::new(relation, NestedWriteOp::Disconnect(filter))
    }

    pub fn set(relation: impl Into<String>, filter: Filter) -> Self {
        Self::new(relation, NestedWriteOp::Set(filter))
    }

    pub fn update(relation: impl Into<String>, filter: Filter, data: Data) -> Self {
        Self::new(relation, NestedWriteOp::Update { filter, data })
    }

    pub fn delete(relation: impl Into<String>, filter: Filter) -> Self {
        Self::new(relation, NestedWriteOp::Delete(filter))
    }
}
