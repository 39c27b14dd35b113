// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Entity descriptors.
//!
//! An [`EntityDescriptor`] is the read-only structural view of one persisted
//! record type: its fields, their scalar types, nullability, default rules,
//! primary-key membership and relations to other entities. Everything else in
//! the crate (shapes, parameters, repositories, routes) is derived from it.
//!
//! # Construction
//!
//! Descriptors come either from `#[derive(Entity)]` or from the builder:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use autocrud_core::{
//!     EntityDescriptor, FieldDescriptor, ScalarType, defaults
//! };
//!
//! fn widget() -> Arc<EntityDescriptor> {
//!     EntityDescriptor::builder("Widget")
//!         .table("widgets")
//!         .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key().generated())
//!         .field(FieldDescriptor::scalar("name", ScalarType::Text))
//!         .field(
//!             FieldDescriptor::scalar("created_at", ScalarType::Timestamp)
//!                 .default_fn(defaults::now_utc)
//!         )
//!         .build()
//! }
//!
//! assert_eq!(widget().primary_keys().count(), 1);
//! ```
//!
//! # Relations
//!
//! Relation targets are function pointers resolved on demand, so two entities
//! may reference each other without the descriptors themselves recursing.

use std::{collections::HashSet, fmt, sync::Arc};

use serde_json::Value;

use crate::{Error, Result};

/// Scalar column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `true` / `false`.
    Bool,

    /// Signed 64-bit integer.
    Integer,

    /// 64-bit floating point number.
    Float,

    /// UTF-8 text.
    Text,

    /// Point in time, exchanged as RFC 3339 text.
    Timestamp,

    /// UUID, exchanged as hyphenated text.
    Uuid,

    /// Arbitrary JSON document.
    Json
}

impl ScalarType {
    /// Human readable name used in shape identities and documents.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Text => "Text",
            Self::Timestamp => "Timestamp",
            Self::Uuid => "Uuid",
            Self::Json => "Json"
        }
    }

    /// Whether a field of this type can be used as a list filter.
    pub const fn is_filterable(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Integer | Self::Text | Self::Timestamp | Self::Uuid
        )
    }

    /// Whether a filterable field of this type may also be an order-by key.
    pub const fn is_orderable(&self) -> bool {
        self.is_filterable() && !matches!(self, Self::Bool)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default-value rule of a scalar field.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// Fixed JSON value.
    Literal(Value),

    /// Value produced on demand (timestamps, fresh identifiers).
    Factory(fn() -> Value)
}

impl DefaultValue {
    /// Produce the default value.
    pub fn produce(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Factory(factory) => factory()
        }
    }
}

/// Metadata of a scalar (column) field.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    /// Column type.
    pub ty: ScalarType,

    /// Whether `null` is an acceptable value.
    pub nullable: bool,

    /// Schema-level default, if any.
    pub default: Option<DefaultValue>,

    /// Member of the primary key.
    pub primary_key: bool,

    /// Value assigned by storage on insert (serial keys).
    pub generated: bool
}

/// Relation cardinality seen from the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one related row.
    One,

    /// Any number of related rows.
    Many
}

/// Columns joining an owning row to its related rows.
///
/// `local` is a column of the owning entity, `remote` a column of the target:
/// related rows are those where `target.remote == owner.local`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationLink {
    /// Column on the owning entity.
    pub local: String,

    /// Column on the target entity.
    pub remote: String
}

/// Metadata of a relation field.
#[derive(Clone)]
pub struct RelationField {
    /// Resolves the target descriptor.
    pub target: fn() -> Arc<EntityDescriptor>,

    /// One or many related rows.
    pub cardinality: Cardinality,

    /// By-reference relation: never embedded, rendered as the target's key.
    pub lazy: bool,

    /// Join columns used by storage to load related rows.
    pub link: Option<RelationLink>
}

impl RelationField {
    /// Resolve the target descriptor.
    pub fn target(&self) -> Arc<EntityDescriptor> {
        (self.target)()
    }
}

impl fmt::Debug for RelationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationField")
            .field("cardinality", &self.cardinality)
            .field("lazy", &self.lazy)
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

/// Scalar or relation.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Column stored on the entity's own table.
    Scalar(ScalarField),

    /// Link to another entity.
    Relation(RelationField)
}

/// One named field of an entity.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind
}

impl FieldDescriptor {
    /// Non-nullable scalar field without default.
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar(ScalarField {
                ty,
                nullable: false,
                default: None,
                primary_key: false,
                generated: false
            })
        }
    }

    /// Embeddable relation field without link columns.
    pub fn relation(
        name: impl Into<String>,
        cardinality: Cardinality,
        target: fn() -> Arc<EntityDescriptor>
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Relation(RelationField {
                target,
                cardinality,
                lazy: false,
                link: None
            })
        }
    }

    /// Mark a scalar field nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        if let FieldKind::Scalar(scalar) = &mut self.kind {
            scalar.nullable = true;
        }
        self
    }

    /// Mark a scalar field as primary-key member.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        if let FieldKind::Scalar(scalar) = &mut self.kind {
            scalar.primary_key = true;
        }
        self
    }

    /// Mark a scalar field as assigned by storage on insert.
    #[must_use]
    pub fn generated(mut self) -> Self {
        if let FieldKind::Scalar(scalar) = &mut self.kind {
            scalar.generated = true;
        }
        self
    }

    /// Literal default value.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        if let FieldKind::Scalar(scalar) = &mut self.kind {
            scalar.default = Some(DefaultValue::Literal(value));
        }
        self
    }

    /// Deferred default produced by `factory`.
    #[must_use]
    pub fn default_fn(mut self, factory: fn() -> Value) -> Self {
        if let FieldKind::Scalar(scalar) = &mut self.kind {
            scalar.default = Some(DefaultValue::Factory(factory));
        }
        self
    }

    /// Mark a relation by-reference.
    #[must_use]
    pub fn lazy(mut self) -> Self {
        if let FieldKind::Relation(relation) = &mut self.kind {
            relation.lazy = true;
        }
        self
    }

    /// Set relation join columns.
    #[must_use]
    pub fn link(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        if let FieldKind::Relation(relation) = &mut self.kind {
            relation.link = Some(RelationLink {
                local:  local.into(),
                remote: remote.into()
            });
        }
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scalar or relation metadata.
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Scalar metadata, if this is a column.
    pub const fn as_scalar(&self) -> Option<&ScalarField> {
        match &self.kind {
            FieldKind::Scalar(scalar) => Some(scalar),
            FieldKind::Relation(_) => None
        }
    }

    /// Relation metadata, if this is a relation.
    pub const fn as_relation(&self) -> Option<&RelationField> {
        match &self.kind {
            FieldKind::Relation(relation) => Some(relation),
            FieldKind::Scalar(_) => None
        }
    }

    /// Whether the field is a primary-key member.
    pub fn is_primary_key(&self) -> bool {
        self.as_scalar().is_some_and(|s| s.primary_key)
    }
}

/// Structural metadata of one persisted record type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    name:   String,
    table:  String,
    fields: Vec<FieldDescriptor>
}

impl EntityDescriptor {
    /// Start building a descriptor named `name`.
    ///
    /// The table defaults to the lowercase name.
    pub fn builder(name: impl Into<String>) -> EntityDescriptorBuilder {
        let name = name.into();
        EntityDescriptorBuilder {
            table: name.to_lowercase(),
            name,
            fields: Vec::new()
        }
    }

    /// Entity name, used as the first half of every shape identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Scalar field by name.
    pub fn scalar(&self, name: &str) -> Option<&ScalarField> {
        self.field(name).and_then(FieldDescriptor::as_scalar)
    }

    /// Scalar fields in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = (&str, &ScalarField)> {
        self.fields
            .iter()
            .filter_map(|f| f.as_scalar().map(|s| (f.name(), s)))
    }

    /// Relation fields in declaration order.
    pub fn relation_fields(&self) -> impl Iterator<Item = (&str, &RelationField)> {
        self.fields
            .iter()
            .filter_map(|f| f.as_relation().map(|r| (f.name(), r)))
    }

    /// Primary-key fields in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = (&str, &ScalarField)> {
        self.scalar_fields().filter(|(_, s)| s.primary_key)
    }

    /// First primary-key field.
    pub fn primary_key(&self) -> Option<(&str, &ScalarField)> {
        self.primary_keys().next()
    }

    /// Primary-key field or a configuration error naming `operation`.
    pub fn require_primary_key(&self, operation: &str) -> Result<(&str, &ScalarField)> {
        self.primary_key().ok_or_else(|| {
            Error::configuration(format!(
                "entity `{}` has no primary key but `{operation}` requires one",
                self.name
            ))
        })
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Duplicate field names, nullable primary keys and relation link columns
    /// that are not scalar fields of this entity.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::configuration(format!(
                    "entity `{}` declares field `{}` twice",
                    self.name, field.name
                )));
            }
        }

        for (name, scalar) in self.primary_keys() {
            if scalar.nullable {
                return Err(Error::configuration(format!(
                    "primary key `{}.{name}` cannot be nullable",
                    self.name
                )));
            }
        }

        for (name, relation) in self.relation_fields() {
            if let Some(link) = &relation.link
                && self.scalar(&link.local).is_none()
            {
                return Err(Error::configuration(format!(
                    "relation `{}.{name}` links through unknown column `{}`",
                    self.name, link.local
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`EntityDescriptor`].
#[derive(Debug)]
pub struct EntityDescriptorBuilder {
    name:   String,
    table:  String,
    fields: Vec<FieldDescriptor>
}

impl EntityDescriptorBuilder {
    /// Override the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor {
            name:   self.name,
            table:  self.table,
            fields: self.fields
        })
    }
}

/// Types that describe a persisted entity.
///
/// Implemented by `#[derive(Entity)]`; can be implemented by hand for types
/// whose layout the macro cannot infer.
pub trait Entity {
    /// The entity's descriptor.
    fn descriptor() -> Arc<EntityDescriptor>;
}

/// Ready-made default factories.
pub mod defaults {
    use chrono::{SecondsFormat, Utc};
    use serde_json::Value;

    /// Current UTC time as RFC 3339 text.
    pub fn now_utc() -> Value {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Fresh time-ordered UUID (v7).
    pub fn uuid_v7() -> Value {
        Value::String(uuid::Uuid::now_v7().to_string())
    }

    /// Fresh random UUID (v4).
    pub fn uuid_v4() -> Value {
        Value::String(uuid::Uuid::new_v4().to_string())
    }

    /// Empty JSON array.
    pub fn empty_list() -> Value {
        Value::Array(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn author() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Author")
            .table("authors")
            .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
            .field(FieldDescriptor::scalar("name", ScalarType::Text))
            .field(
                FieldDescriptor::relation("books", Cardinality::Many, book).link("id", "author_id")
            )
            .build()
    }

    fn book() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Book")
            .field(FieldDescriptor::scalar("id", ScalarType::Uuid).primary_key())
            .field(FieldDescriptor::scalar("author_id", ScalarType::Integer))
            .field(FieldDescriptor::relation("author", Cardinality::One, author).lazy())
            .build()
    }

    #[test]
    fn builder_defaults_table_to_lowercase_name() {
        assert_eq!(book().table(), "book");
        assert_eq!(author().table(), "authors");
    }

    #[test]
    fn cyclic_descriptors_resolve_lazily() {
        let author = author();
        let (_, books) = author.relation_fields().next().unwrap();
        let book = books.target();
        let (_, back) = book.relation_fields().next().unwrap();
        assert_eq!(back.target().name(), "Author");
        assert!(back.lazy);
    }

    #[test]
    fn primary_key_lookup() {
        let book = book();
        let (name, pk) = book.primary_key().unwrap();
        assert_eq!(name, "id");
        assert_eq!(pk.ty, ScalarType::Uuid);
    }

    #[test]
    fn missing_primary_key_is_configuration_error() {
        let entity = EntityDescriptor::builder("Log")
            .field(FieldDescriptor::scalar("line", ScalarType::Text))
            .build();
        let err = entity.require_primary_key("detail").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn validate_rejects_duplicates() {
        let entity = EntityDescriptor::builder("Dup")
            .field(FieldDescriptor::scalar("a", ScalarType::Text))
            .field(FieldDescriptor::scalar("a", ScalarType::Integer))
            .build();
        assert!(entity.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_link_column() {
        let entity = EntityDescriptor::builder("Bad")
            .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
            .field(FieldDescriptor::relation("books", Cardinality::Many, book).link("nope", "id"))
            .build();
        assert!(entity.validate().is_err());
    }

    #[test]
    fn default_value_produces() {
        assert_eq!(DefaultValue::Literal(json!(3)).produce(), json!(3));
        assert!(DefaultValue::Factory(defaults::now_utc).produce().is_string());
    }
}
