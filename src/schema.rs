//! Metadata registry.
//!
//! Maps model names to tables, fields to columns, and relation names to
//! relation definitions. A [`Schema`] is an immutable snapshot; [`Registry`]
//! holds the current snapshot and swaps it atomically on reload, so a compile
//! that pinned a snapshot never observes a half-applied schema.
//!
//! Schemas load from TOML:
//!
//! ```toml
//! [[models]]
//! name = "User"
//! table = "users"
//! fields = [
//!     { name = "id" },
//!     { name = "email", column = "email_address" },
//! ]
//!
//! [[models.relations]]
//! name = "posts"
//! to_model = "Post"
//! from_fields = ["id"]
//! to_fields = ["author_id"]
//! kind = "one_to_many"
//! ```

use crate::error::{RelqError, RelqResult};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use strsim::levenshtein;

/// Field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    /// Physical column; defaults to the field name.
    #[serde(default)]
    pub column: Option<String>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
        }
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
}

impl RelationKind {
    pub fn is_many(&self) -> bool {
        matches!(self, RelationKind::OneToMany)
    }
}

/// Relation definition. `from_fields[i]` on the owning model pairs with
/// `to_fields[i]` on `to_model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMeta {
    pub name: String,
    pub to_model: String,
    pub from_fields: Vec<String>,
    pub to_fields: Vec<String>,
    pub kind: RelationKind,
}

/// Model definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub name: String,
    pub table: String,
    /// An empty list disables field checking for this model.
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
    #[serde(default)]
    pub relations: Vec<RelationMeta>,
}

impl ModelMeta {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fields
            .extend(names.into_iter().map(|n| FieldMeta::new(n.as_ref())));
        self
    }

    pub fn relation(mut self, relation: RelationMeta) -> Self {
        self.relations.push(relation);
        self
    }
}

/// Read-only lookups the compiler needs. "Not found" is always an error
/// value naming the missing item.
pub trait Metadata {
    /// Physical table for a model.
    fn table_name(&self, model: &str) -> RelqResult<&str>;
    /// Physical column for a model field.
    fn column_name<'a>(&'a self, model: &str, field: &'a str) -> RelqResult<&'a str>;
    /// Relation definition on a model.
    fn relation(&self, model: &str, relation: &str) -> RelqResult<&RelationMeta>;
    /// Declared fields of a model, in declaration order.
    fn model_fields(&self, model: &str) -> RelqResult<Vec<&str>>;
    /// Declared relations of a model.
    fn model_relations(&self, model: &str) -> RelqResult<&[RelationMeta]>;
}

/// Immutable schema snapshot. Deserialization goes through `SchemaDef`, so
/// the name index is rebuilt whatever the source format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "SchemaDef")]
pub struct Schema {
    models: Vec<ModelMeta>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Wire form of a [`Schema`].
#[derive(Deserialize)]
struct SchemaDef {
    #[serde(default)]
    models: Vec<ModelMeta>,
}

impl From<SchemaDef> for Schema {
    fn from(def: SchemaDef) -> Self {
        let mut schema = Schema::new();
        for model in def.models {
            tracing::debug!("Loaded model '{}' -> table '{}'", model.name, model.table);
            schema.add_model(model);
        }
        schema
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model; a later model with the same name replaces the earlier one.
    pub fn add_model(&mut self, model: ModelMeta) {
        if let Some(&i) = self.index.get(&model.name) {
            self.models[i] = model;
        } else {
            self.index.insert(model.name.clone(), self.models.len());
            self.models.push(model);
        }
    }

    pub fn with_model(mut self, model: ModelMeta) -> Self {
        self.add_model(model);
        self
    }

    /// Parse a TOML schema document.
    pub fn from_toml(content: &str) -> RelqResult<Self> {
        toml::from_str(content).map_err(|e| RelqError::Config(format!("Failed to parse schema: {}", e)))
    }

    /// Registered models, in registration order.
    pub fn models(&self) -> &[ModelMeta] {
        &self.models
    }

    /// Load a TOML schema file.
    pub fn load_from_file(path: impl AsRef<Path>) -> RelqResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let schema = Self::from_toml(&content)?;
        tracing::info!("Loaded {} models from {}", schema.models.len(), path.display());
        Ok(schema)
    }

    pub fn model(&self, name: &str) -> RelqResult<&ModelMeta> {
        match self.index.get(name) {
            Some(&i) => Ok(&self.models[i]),
            None => Err(RelqError::UnknownModel {
                model: name.to_string(),
                suggestion: did_you_mean(name, self.models.iter().map(|m| m.name.as_str())),
            }),
        }
    }
}

impl Metadata for Schema {
    fn table_name(&self, model: &str) -> RelqResult<&str> {
        Ok(&self.model(model)?.table)
    }

    fn column_name<'a>(&'a self, model: &str, field: &'a str) -> RelqResult<&'a str> {
        let meta = self.model(model)?;
        if meta.fields.is_empty() || field == "*" {
            return Ok(field);
        }
        match meta.fields.iter().find(|f| f.name == field) {
            Some(f) => Ok(f.column_name()),
            None => Err(RelqError::UnknownField {
                model: model.to_string(),
                field: field.to_string(),
                suggestion: did_you_mean(field, meta.fields.iter().map(|f| f.name.as_str())),
            }),
        }
    }

    fn relation(&self, model: &str, relation: &str) -> RelqResult<&RelationMeta> {
        let meta = self.model(model)?;
        match meta.relations.iter().find(|r| r.name == relation) {
            Some(r) => Ok(r),
            None => Err(RelqError::UnknownRelation {
                model: model.to_string(),
                relation: relation.to_string(),
                suggestion: did_you_mean(relation, meta.relations.iter().map(|r| r.name.as_str())),
            }),
        }
    }

    fn model_fields(&self, model: &str) -> RelqResult<Vec<&str>> {
        Ok(self.model(model)?.fields.iter().map(|f| f.name.as_str()).collect())
    }

    fn model_relations(&self, model: &str) -> RelqResult<&[RelationMeta]> {
        Ok(&self.model(model)?.relations)
    }
}

/// Find the best match with a length-scaled Levenshtein threshold.
fn did_you_mean<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };

    let mut best_match = None;
    let mut min_dist = usize::MAX;
    for cand in candidates {
        let dist = levenshtein(input, cand);
        if dist <= threshold && dist < min_dist {
            min_dist = dist;
            best_match = Some(cand.to_string());
        }
    }
    best_match
}

/// Shared registry. Readers pin a snapshot with [`Registry::snapshot`];
/// [`Registry::reload`] publishes a new one without blocking them.
#[derive(Debug)]
pub struct Registry {
    current: ArcSwap<Schema>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Schema::new())
    }
}

impl Registry {
    pub fn new(schema: Schema) -> Self {
        Self {
            current: ArcSwap::from_pointee(schema),
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> RelqResult<Self> {
        Ok(Self::new(Schema::load_from_file(path)?))
    }

    /// The current snapshot. Holding it keeps that version alive across reloads.
    pub fn snapshot(&self) -> Arc<Schema> {
        self.current.load_full()
    }

    /// Publish a new schema.
    pub fn reload(&self, schema: Schema) {
        tracing::info!("Registry reloaded with {} models", schema.models.len());
        self.current.store(Arc::new(schema));
    }
}
