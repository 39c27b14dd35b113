// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Derived data-transfer shapes.
//!
//! A [`Shape`] is an immutable, named record type synthesized from an
//! [`EntityDescriptor`](crate::EntityDescriptor) by the [`SchemaRegistry`].
//! Shapes do two jobs at request time:
//!
//! | Direction | Method | Input | Output |
//! |-----------|--------|-------|--------|
//! | inbound | [`Shape::decode`] | JSON body | [`Payload`] |
//! | outbound | [`Shape::project`] | storage [`Row`] | JSON value |
//!
//! # Identity
//!
//! Every shape is identified by a [`ShapeId`]: the entity name plus a variant
//! postfix, rendered `{Entity}Schema{Postfix}` (`WidgetSchemaList`,
//! `WidgetSchemaInCreate`, ...). The registry guarantees one `Arc<Shape>` per
//! identity.

mod registry;

#[cfg(test)]
mod tests;

use std::{fmt, sync::Arc};

use serde_json::{Map, Value};

pub use self::registry::{CyclePolicy, SchemaRegistry, SynthesisConfig};
use crate::{
    DefaultValue, Error, Result, ScalarType, arguments::ShapeArgs, descriptor::RelationLink,
    storage::Row
};

/// Identity of a shape: entity name and variant postfix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId {
    entity:  String,
    postfix: String
}

impl ShapeId {
    /// Identity for `entity` with variant `postfix`.
    pub fn new(entity: impl Into<String>, postfix: impl Into<String>) -> Self {
        Self {
            entity:  entity.into(),
            postfix: postfix.into()
        }
    }

    /// Entity half of the identity.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Variant postfix.
    pub fn postfix(&self) -> &str {
        &self.postfix
    }

    /// Rendered name, `{Entity}Schema{Postfix}`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Schema{}", self.entity, self.postfix)
    }
}

/// Whether and how a field must be supplied when decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    /// Must be present.
    Required,

    /// Filled with the given default when absent.
    Default(DefaultValue),

    /// Left unset when absent.
    Optional
}

/// Reference to another entity by primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Target entity name.
    pub target: String,

    /// Primary-key fields of the target.
    pub keys: Vec<(String, ScalarType)>,

    /// Join columns, when the relation declares them.
    pub link: Option<RelationLink>
}

impl Reference {
    /// Key value of a loaded target row: the single key, or an object of keys.
    fn key_of(&self, row: &Map<String, Value>) -> Value {
        match self.keys.as_slice() {
            [(name, _)] => row.get(name).cloned().unwrap_or(Value::Null),
            keys => Value::Object(
                keys.iter()
                    .map(|(name, _)| (name.clone(), row.get(name).cloned().unwrap_or(Value::Null)))
                    .collect()
            )
        }
    }

    /// Check a supplied reference value.
    fn check(&self, field: &str, value: &Value) -> Result<Value> {
        match self.keys.as_slice() {
            [(_, ty)] => ty.check(field, value, false),
            keys => {
                let object = value
                    .as_object()
                    .ok_or_else(|| Error::validation(field, "expected an object of keys"))?;
                let mut checked = Map::new();
                for (name, ty) in keys {
                    let raw = object.get(name).unwrap_or(&Value::Null);
                    checked.insert(name.clone(), ty.check(field, raw, false)?);
                }
                Ok(Value::Object(checked))
            }
        }
    }
}

/// Type of one shape field.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Plain column value.
    Scalar(ScalarType),

    /// Embedded related object.
    Nested(Arc<Shape>),

    /// Embedded list of related objects.
    NestedList(Arc<Shape>),

    /// Key of a related object.
    Reference(Reference),

    /// Keys of related objects.
    ReferenceList(Reference)
}

/// One field of a shape.
#[derive(Debug, Clone)]
pub struct ShapeField {
    /// Field name.
    pub name: String,

    /// Field type.
    pub ty: FieldType,

    /// Whether `null` is accepted.
    pub nullable: bool,

    /// Decoding presence rule.
    pub presence: Presence
}

/// Immutable named record type.
#[derive(Debug)]
pub struct Shape {
    id:     ShapeId,
    args:   ShapeArgs,
    fields: Vec<ShapeField>
}

impl Shape {
    pub(crate) fn new(id: ShapeId, args: ShapeArgs, fields: Vec<ShapeField>) -> Self {
        Self {
            id,
            args,
            fields
        }
    }

    /// Shape identity.
    pub const fn id(&self) -> &ShapeId {
        &self.id
    }

    /// Rendered name.
    pub fn name(&self) -> String {
        self.id.name()
    }

    /// Arguments the shape was synthesized with.
    pub const fn args(&self) -> &ShapeArgs {
        &self.args
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[ShapeField] {
        &self.fields
    }

    /// Field by name.
    pub fn field(&self, name: &str) -> Option<&ShapeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Decode a JSON body into a [`Payload`].
    ///
    /// Present values are type-checked and normalized. Absent fields are
    /// rejected when required, defaulted when a default exists and left
    /// unset otherwise. Keys the shape does not know are ignored.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a non-object body, a missing required field
    /// or a value of the wrong type.
    pub fn decode(&self, body: Value) -> Result<Payload> {
        let Value::Object(mut object) = body else {
            return Err(Error::validation(
                "body",
                format!("`{}` expects a JSON object", self.id)
            ));
        };

        let mut values = Map::new();
        for field in &self.fields {
            match object.remove(&field.name) {
                Some(value) => {
                    values.insert(field.name.clone(), field.decode(value)?);
                }
                None => match &field.presence {
                    Presence::Required => {
                        return Err(Error::validation(&field.name, "field required"));
                    }
                    Presence::Default(default) => {
                        values.insert(field.name.clone(), default.produce());
                    }
                    Presence::Optional => {}
                }
            }
        }

        if !object.is_empty() {
            tracing::debug!(
                shape = %self.id,
                ignored = ?object.keys().collect::<Vec<_>>(),
                "ignoring unknown body fields"
            );
        }

        Ok(Payload {
            shape: self.id.clone(),
            values
        })
    }

    /// Project a storage row into this shape's JSON form.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] when a loaded relation has an unexpected form.
    pub fn project(&self, row: &Row) -> Result<Value> {
        let mut out = Map::new();
        for field in &self.fields {
            let value = row.get(&field.name);
            let projected = match &field.ty {
                FieldType::Scalar(_) => value.cloned().unwrap_or(Value::Null),
                FieldType::Nested(shape) => match value {
                    Some(Value::Object(child)) => shape.project(child)?,
                    Some(Value::Null) | None => Value::Null,
                    Some(other) => return Err(unexpected(&field.name, other))
                },
                FieldType::NestedList(shape) => match value {
                    Some(Value::Array(items)) => Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Object(child) => shape.project(child),
                                other => Err(unexpected(&field.name, other))
                            })
                            .collect::<Result<_>>()?
                    ),
                    Some(Value::Null) | None => Value::Array(Vec::new()),
                    Some(other) => return Err(unexpected(&field.name, other))
                },
                FieldType::Reference(reference) => match value {
                    Some(Value::Object(child)) => reference.key_of(child),
                    Some(scalar) => scalar.clone(),
                    None => reference_from_link(reference, row)
                },
                FieldType::ReferenceList(reference) => match value {
                    Some(Value::Array(items)) => Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Object(child) => reference.key_of(child),
                                scalar => scalar.clone()
                            })
                            .collect()
                    ),
                    _ => Value::Array(Vec::new())
                }
            };
            out.insert(field.name.clone(), projected);
        }
        Ok(Value::Object(out))
    }
}

impl ShapeField {
    fn decode(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(Error::validation(&self.name, "must not be null"))
            };
        }

        match &self.ty {
            FieldType::Scalar(ty) => ty.check(&self.name, &value, self.nullable),
            FieldType::Nested(shape) => Ok(Value::Object(shape.decode(value)?.into_values())),
            FieldType::NestedList(shape) => match value {
                Value::Array(items) => Ok(Value::Array(
                    items
                        .into_iter()
                        .map(|item| shape.decode(item).map(|p| Value::Object(p.into_values())))
                        .collect::<Result<_>>()?
                )),
                _ => Err(Error::validation(&self.name, "expected a list"))
            },
            FieldType::Reference(reference) => reference.check(&self.name, &value),
            FieldType::ReferenceList(reference) => match value {
                Value::Array(items) => Ok(Value::Array(
                    items
                        .iter()
                        .map(|item| reference.check(&self.name, item))
                        .collect::<Result<_>>()?
                )),
                _ => Err(Error::validation(&self.name, "expected a list"))
            }
        }
    }
}

/// Owner-side foreign key pointing at the target's single primary key.
fn reference_from_link(reference: &Reference, row: &Row) -> Value {
    match (&reference.link, reference.keys.as_slice()) {
        (Some(link), [(key, _)]) if &link.remote == key => {
            row.get(&link.local).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null
    }
}

fn unexpected(field: &str, value: &Value) -> Error {
    Error::storage(format!("relation `{field}` loaded as unexpected value {value}"))
}

/// A body decoded against a specific shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    shape:  ShapeId,
    values: Map<String, Value>
}

impl Payload {
    /// Build a payload directly.
    ///
    /// Prefer [`Shape::decode`]; this exists for callers that already hold
    /// validated values.
    pub fn new(shape: ShapeId, values: Map<String, Value>) -> Self {
        Self {
            shape,
            values
        }
    }

    /// Identity of the shape the payload was decoded against.
    pub const fn shape(&self) -> &ShapeId {
        &self.shape
    }

    /// Supplied or defaulted values.
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Value of one field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Whether the field was supplied or defaulted.
    pub fn is_set(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Consume into the value map.
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}
