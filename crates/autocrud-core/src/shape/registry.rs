// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Shape cache and synthesizer.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock}
};

use serde::Deserialize;
use serde_json::Value;

use super::{FieldType, Presence, Reference, Shape, ShapeField, ShapeId};
use crate::{
    Cardinality, DefaultValue, EntityDescriptor, Error, FieldKind, Result, ScalarType,
    arguments::ShapeArgs, params::ParamShape
};

/// What to do when relation recursion revisits a shape under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Render the revisited relation as a reference to the target's key.
    #[default]
    Reference,

    /// Fail synthesis with a configuration error.
    Reject
}

/// Termination settings for relation recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// How many relation hops are embedded by value. Deeper relation fields
    /// become references.
    pub max_depth: usize,

    /// Handling of cycles among shapes under construction.
    pub cycle_policy: CyclePolicy
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_depth:    1,
            cycle_policy: CyclePolicy::default()
        }
    }
}

/// Injectable cache of synthesized shapes and parameter shapes.
///
/// Shared behind an `Arc` by every resource assembled from it. Entries are
/// never replaced: when two builders race on one identity the first
/// published shape wins and the loser adopts it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use autocrud_core::{
///     EntityDescriptor, FieldDescriptor, ScalarType, SchemaRegistry, ShapeArgs
/// };
///
/// let widget = EntityDescriptor::builder("Widget")
///     .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
///     .build();
///
/// let registry = SchemaRegistry::default();
/// let a = registry.synthesize(&widget, &ShapeArgs::list()).unwrap();
/// let b = registry.synthesize(&widget, &ShapeArgs::list()).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.name(), "WidgetSchemaList");
/// ```
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    config: SynthesisConfig,
    shapes: RwLock<HashMap<ShapeId, Arc<Shape>>>,
    params: RwLock<HashMap<String, Arc<ParamShape>>>
}

impl SchemaRegistry {
    /// Registry with explicit termination settings.
    pub fn new(config: SynthesisConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Termination settings.
    pub const fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Published shape by identity.
    pub fn get(&self, id: &ShapeId) -> Option<Arc<Shape>> {
        self.shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Snapshot of every published shape, sorted by identity.
    pub fn shapes(&self) -> Vec<Arc<Shape>> {
        let mut all: Vec<_> = self
            .shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Synthesize (or fetch) the shape of `entity` for `args`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when a relation cycle is met under
    /// [`CyclePolicy::Reject`].
    pub fn synthesize(&self, entity: &Arc<EntityDescriptor>, args: &ShapeArgs) -> Result<Arc<Shape>> {
        let mut stack = Vec::new();
        self.synthesize_at(entity, args, 0, &mut stack)
    }

    fn synthesize_at(
        &self,
        entity: &EntityDescriptor,
        args: &ShapeArgs,
        depth: usize,
        stack: &mut Vec<ShapeId>
    ) -> Result<Arc<Shape>> {
        let id = ShapeId::new(entity.name(), &args.name_postfix);
        if let Some(cached) = self.get(&id) {
            if cached.args() != args {
                tracing::warn!(
                    shape = %id,
                    "shape already published with different arguments, reusing it"
                );
            } else {
                tracing::trace!(shape = %id, "shape cache hit");
            }
            return Ok(cached);
        }

        stack.push(id.clone());
        let fields = self.fields_of(entity, args, depth, stack);
        stack.pop();
        let shape = Arc::new(Shape::new(id.clone(), args.clone(), fields?));

        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        let published = shapes.entry(id).or_insert_with(|| {
            tracing::debug!(shape = %shape.id(), fields = shape.fields().len(), "shape synthesized");
            shape
        });
        Ok(Arc::clone(published))
    }

    fn fields_of(
        &self,
        entity: &EntityDescriptor,
        args: &ShapeArgs,
        depth: usize,
        stack: &mut Vec<ShapeId>
    ) -> Result<Vec<ShapeField>> {
        let mut fields = Vec::new();
        for field in entity.fields() {
            let name = field.name();
            if args.excluded.contains(name) {
                continue;
            }

            match field.kind() {
                FieldKind::Scalar(scalar) => {
                    if args.put {
                        if scalar.primary_key {
                            continue;
                        }
                        fields.push(ShapeField {
                            name:     name.to_owned(),
                            ty:       FieldType::Scalar(scalar.ty),
                            nullable: scalar.nullable,
                            presence: Presence::Optional
                        });
                        continue;
                    }

                    let presence = if scalar.generated {
                        Presence::Optional
                    } else if !scalar.nullable && scalar.default.is_none() {
                        Presence::Required
                    } else if let Some(value) = args.defaults.get(name) {
                        Presence::Default(DefaultValue::Literal(value.clone()))
                    } else if let Some(default) = &scalar.default {
                        Presence::Default(default.clone())
                    } else {
                        Presence::Default(DefaultValue::Literal(Value::Null))
                    };
                    fields.push(ShapeField {
                        name: name.to_owned(),
                        ty: FieldType::Scalar(scalar.ty),
                        nullable: scalar.nullable,
                        presence
                    });
                }
                FieldKind::Relation(relation) => {
                    if !args.nested && !args.included.contains(name) {
                        continue;
                    }

                    let target = relation.target();
                    let many = relation.cardinality == Cardinality::Many;
                    let child_args = if many {
                        ShapeArgs::list()
                    } else {
                        ShapeArgs::detail()
                    };
                    let child_args = ShapeArgs {
                        nested: depth + 1 < self.config.max_depth,
                        ..child_args
                    };
                    let child_id = ShapeId::new(target.name(), &child_args.name_postfix);

                    let embed = !relation.lazy && depth < self.config.max_depth;
                    let cycle = stack.contains(&child_id);
                    if embed && cycle && self.config.cycle_policy == CyclePolicy::Reject {
                        return Err(Error::configuration(format!(
                            "relation `{}.{name}` forms a cycle through `{child_id}`",
                            entity.name()
                        )));
                    }

                    let ty = if embed && !cycle {
                        let child = self.synthesize_at(&target, &child_args, depth + 1, stack)?;
                        if many {
                            FieldType::NestedList(child)
                        } else {
                            FieldType::Nested(child)
                        }
                    } else {
                        let keys: Vec<(String, ScalarType)> = target
                            .primary_keys()
                            .map(|(key, scalar)| (key.to_owned(), scalar.ty))
                            .collect();
                        if keys.is_empty() {
                            tracing::debug!(
                                entity = entity.name(),
                                field = name,
                                "relation target has no primary key, field skipped"
                            );
                            continue;
                        }
                        let reference = Reference {
                            target: target.name().to_owned(),
                            keys,
                            link: relation.link.clone()
                        };
                        if many {
                            FieldType::ReferenceList(reference)
                        } else {
                            FieldType::Reference(reference)
                        }
                    };

                    let default = if many {
                        Value::Array(Vec::new())
                    } else {
                        Value::Null
                    };
                    fields.push(ShapeField {
                        name: name.to_owned(),
                        ty,
                        nullable: !many,
                        presence: Presence::Default(DefaultValue::Literal(default))
                    });
                }
            }
        }
        Ok(fields)
    }

    /// Shape echoing a created key: `IntegerIdSchema`, `UuidIdSchema`, ...
    pub fn id_echo(&self, ty: ScalarType) -> Arc<Shape> {
        let id = ShapeId::new(format!("{}Id", ty.name()), "");
        if let Some(cached) = self.get(&id) {
            return cached;
        }
        let shape = Arc::new(Shape::new(
            id.clone(),
            ShapeArgs::default(),
            vec![ShapeField {
                name:     "id".into(),
                ty:       FieldType::Scalar(ty),
                nullable: false,
                presence: Presence::Required
            }]
        ));
        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(shapes.entry(id).or_insert(shape))
    }

    /// Parameter shape of `entity`, cached per entity name.
    pub fn params(&self, entity: &EntityDescriptor) -> Arc<ParamShape> {
        if let Some(cached) = self
            .params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity.name())
        {
            return Arc::clone(cached);
        }
        let shape = Arc::new(ParamShape::synthesize(entity));
        let mut params = self.params.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(params.entry(entity.name().to_owned()).or_insert(shape))
    }
}
