// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Per-operation request/response derivation.
//!
//! An [`OperationStrategy`] answers, for each CRUD operation of one entity,
//! which key, parameters and body the operation accepts and what it returns.
//! Each answer is a [`StrategyBundle`] computed on first use and memoized for
//! the lifetime of the strategy instance.
//!
//! | Operation | Key | Params | Body | Response |
//! |-----------|-----|--------|------|----------|
//! | list | | `{Entity}ParamsList` | | page of `List` |
//! | detail | primary | | | `Detail` |
//! | post | | | `InCreate` | id echo |
//! | put | primary | | `InUpdate` | empty |
//! | delete | primary | | | empty |
//!
//! [`JoinStrategy`] is the restricted family for join entities.

use std::sync::{Arc, OnceLock};

use crate::{
    ArgumentsConfig, EntityDescriptor, Result, ScalarType,
    params::ParamShape,
    repository::join_keys,
    shape::{SchemaRegistry, Shape}
};

/// What an operation returns.
#[derive(Debug, Clone)]
pub enum ResponseType {
    /// One object of the shape.
    Shape(Arc<Shape>),

    /// A [`Page`](crate::Page) of the shape.
    Page(Arc<Shape>),

    /// A plain list of the shape.
    List(Arc<Shape>),

    /// The created key.
    IdEcho(Arc<Shape>),

    /// No body.
    Empty
}

/// What an operation accepts.
#[derive(Debug, Clone, Default)]
pub struct RequestTypes {
    /// Path key name and type.
    pub primary_key: Option<(String, ScalarType)>,

    /// Query parameters.
    pub params: Option<Arc<ParamShape>>,

    /// Request body.
    pub body: Option<Arc<Shape>>,

    /// Second path key of join operations.
    pub secondary_key: Option<(String, ScalarType)>
}

/// Request and response types of one operation.
#[derive(Debug, Clone)]
pub struct StrategyBundle {
    /// Accepted inputs.
    pub request: RequestTypes,

    /// Produced output.
    pub response: ResponseType
}

fn memo(
    cell: &OnceLock<StrategyBundle>,
    derive: impl FnOnce() -> Result<StrategyBundle>
) -> Result<&StrategyBundle> {
    if let Some(bundle) = cell.get() {
        return Ok(bundle);
    }
    let bundle = derive()?;
    Ok(cell.get_or_init(|| bundle))
}

/// Strategy family of a primary entity.
#[derive(Debug)]
pub struct OperationStrategy<'r> {
    registry:  &'r SchemaRegistry,
    entity:    Arc<EntityDescriptor>,
    arguments: ArgumentsConfig,
    list:      OnceLock<StrategyBundle>,
    detail:    OnceLock<StrategyBundle>,
    post:      OnceLock<StrategyBundle>,
    put:       OnceLock<StrategyBundle>,
    delete:    OnceLock<StrategyBundle>
}

impl<'r> OperationStrategy<'r> {
    /// Strategy for `entity` synthesizing through `registry`.
    pub fn new(
        registry: &'r SchemaRegistry,
        entity: Arc<EntityDescriptor>,
        arguments: ArgumentsConfig
    ) -> Self {
        Self {
            registry,
            entity,
            arguments,
            list: OnceLock::new(),
            detail: OnceLock::new(),
            post: OnceLock::new(),
            put: OnceLock::new(),
            delete: OnceLock::new()
        }
    }

    /// Entity the strategy serves.
    pub const fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    fn primary_key(&self, operation: &str) -> Result<(String, ScalarType)> {
        let (name, scalar) = self.entity.require_primary_key(operation)?;
        Ok((name.to_owned(), scalar.ty))
    }

    /// List: parameters in, page of `List` shapes out.
    pub fn list(&self) -> Result<&StrategyBundle> {
        memo(&self.list, || {
            Ok(StrategyBundle {
                request:  RequestTypes {
                    params: Some(self.registry.params(&self.entity)),
                    ..RequestTypes::default()
                },
                response: ResponseType::Page(
                    self.registry
                        .synthesize(&self.entity, &self.arguments.list)?
                )
            })
        })
    }

    /// Detail: primary key in, `Detail` shape out.
    pub fn detail(&self) -> Result<&StrategyBundle> {
        memo(&self.detail, || {
            Ok(StrategyBundle {
                request:  RequestTypes {
                    primary_key: Some(self.primary_key("detail")?),
                    ..RequestTypes::default()
                },
                response: ResponseType::Shape(
                    self.registry
                        .synthesize(&self.entity, &self.arguments.detail)?
                )
            })
        })
    }

    /// Create: `InCreate` body in, created key out.
    pub fn post(&self) -> Result<&StrategyBundle> {
        memo(&self.post, || {
            let (_, key_type) = self.primary_key("post")?;
            Ok(StrategyBundle {
                request:  RequestTypes {
                    body: Some(
                        self.registry
                            .synthesize(&self.entity, &self.arguments.post)?
                    ),
                    ..RequestTypes::default()
                },
                response: ResponseType::IdEcho(self.registry.id_echo(key_type))
            })
        })
    }

    /// Update: primary key and `InUpdate` body in, nothing out.
    pub fn put(&self) -> Result<&StrategyBundle> {
        memo(&self.put, || {
            Ok(StrategyBundle {
                request:  RequestTypes {
                    primary_key: Some(self.primary_key("put")?),
                    body: Some(
                        self.registry
                            .synthesize(&self.entity, &self.arguments.put)?
                    ),
                    ..RequestTypes::default()
                },
                response: ResponseType::Empty
            })
        })
    }

    /// Delete: detail's request, nothing out.
    pub fn delete(&self) -> Result<&StrategyBundle> {
        memo(&self.delete, || {
            Ok(StrategyBundle {
                request:  RequestTypes {
                    primary_key: Some(self.primary_key("delete")?),
                    ..RequestTypes::default()
                },
                response: ResponseType::Empty
            })
        })
    }
}

/// Strategy family of a join entity.
#[derive(Debug)]
pub struct JoinStrategy<'r> {
    registry:  &'r SchemaRegistry,
    entity:    Arc<EntityDescriptor>,
    arguments: ArgumentsConfig,
    list:      OnceLock<StrategyBundle>,
    post:      OnceLock<StrategyBundle>,
    delete:    OnceLock<StrategyBundle>
}

impl<'r> JoinStrategy<'r> {
    /// Strategy for join `entity` synthesizing through `registry`.
    pub fn new(
        registry: &'r SchemaRegistry,
        entity: Arc<EntityDescriptor>,
        arguments: ArgumentsConfig
    ) -> Self {
        Self {
            registry,
            entity,
            arguments,
            list: OnceLock::new(),
            post: OnceLock::new(),
            delete: OnceLock::new()
        }
    }

    /// Entity the strategy serves.
    pub const fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    /// List by the first key half: list of `List` shapes out.
    pub fn list(&self) -> Result<&StrategyBundle> {
        memo(&self.list, || {
            let (name, scalar) = self.entity.require_primary_key("join list")?;
            Ok(StrategyBundle {
                request:  RequestTypes {
                    primary_key: Some((name.to_owned(), scalar.ty)),
                    ..RequestTypes::default()
                },
                response: ResponseType::List(
                    self.registry
                        .synthesize(&self.entity, &self.arguments.list)?
                )
            })
        })
    }

    /// Create a link: `InCreate` body in, nothing out.
    pub fn post(&self) -> Result<&StrategyBundle> {
        memo(&self.post, || {
            Ok(StrategyBundle {
                request:  RequestTypes {
                    body: Some(
                        self.registry
                            .synthesize(&self.entity, &self.arguments.post)?
                    ),
                    ..RequestTypes::default()
                },
                response: ResponseType::Empty
            })
        })
    }

    /// Delete a link: both key halves in, nothing out.
    pub fn delete(&self) -> Result<&StrategyBundle> {
        memo(&self.delete, || {
            let [first, second] = join_keys(&self.entity)?;
            Ok(StrategyBundle {
                request:  RequestTypes {
                    primary_key: Some(first),
                    secondary_key: Some(second),
                    ..RequestTypes::default()
                },
                response: ResponseType::Empty
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Error, FieldDescriptor, defaults};

    fn widget() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Widget")
            .field(FieldDescriptor::scalar("id", ScalarType::Uuid).primary_key().default_fn(defaults::uuid_v7))
            .field(FieldDescriptor::scalar("name", ScalarType::Text))
            .field(FieldDescriptor::scalar("qty", ScalarType::Integer).default_value(json!(0)))
            .build()
    }

    fn keyless() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Log")
            .field(FieldDescriptor::scalar("line", ScalarType::Text))
            .build()
    }

    fn link() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("WidgetTag")
            .field(FieldDescriptor::scalar("widget_id", ScalarType::Uuid).primary_key())
            .field(FieldDescriptor::scalar("tag_id", ScalarType::Integer).primary_key())
            .build()
    }

    #[test]
    fn bundles_match_operation_table() {
        let registry = SchemaRegistry::default();
        let strategy = OperationStrategy::new(&registry, widget(), ArgumentsConfig::default());

        let list = strategy.list().unwrap();
        assert!(list.request.primary_key.is_none());
        assert_eq!(list.request.params.as_ref().unwrap().name(), "WidgetParamsList");
        assert!(matches!(&list.response, ResponseType::Page(s) if s.name() == "WidgetSchemaList"));

        let detail = strategy.detail().unwrap();
        assert_eq!(
            detail.request.primary_key,
            Some(("id".to_owned(), ScalarType::Uuid))
        );
        assert!(matches!(&detail.response, ResponseType::Shape(s) if s.name() == "WidgetSchemaDetail"));

        let post = strategy.post().unwrap();
        assert_eq!(post.request.body.as_ref().unwrap().name(), "WidgetSchemaInCreate");
        assert!(matches!(&post.response, ResponseType::IdEcho(s) if s.name() == "UuidIdSchema"));

        let put = strategy.put().unwrap();
        let body = put.request.body.as_ref().unwrap();
        assert_eq!(body.name(), "WidgetSchemaInUpdate");
        assert!(body.field("id").is_none());
        assert!(matches!(put.response, ResponseType::Empty));

        let delete = strategy.delete().unwrap();
        assert_eq!(delete.request.primary_key, detail.request.primary_key);
        assert!(matches!(delete.response, ResponseType::Empty));
    }

    #[test]
    fn bundles_are_memoized() {
        let registry = SchemaRegistry::default();
        let strategy = OperationStrategy::new(&registry, widget(), ArgumentsConfig::default());
        assert!(std::ptr::eq(strategy.list().unwrap(), strategy.list().unwrap()));
    }

    #[test]
    fn keyless_entity_rejects_keyed_operations() {
        let registry = SchemaRegistry::default();
        let strategy = OperationStrategy::new(&registry, keyless(), ArgumentsConfig::default());
        assert!(strategy.list().is_ok());
        for result in [strategy.detail(), strategy.post(), strategy.put(), strategy.delete()] {
            assert!(matches!(result, Err(Error::Configuration(_))));
        }
    }

    #[test]
    fn join_bundles() {
        let registry = SchemaRegistry::default();
        let strategy = JoinStrategy::new(&registry, link(), ArgumentsConfig::default());

        let list = strategy.list().unwrap();
        assert_eq!(list.request.primary_key, Some(("widget_id".to_owned(), ScalarType::Uuid)));
        assert!(matches!(&list.response, ResponseType::List(s) if s.name() == "WidgetTagSchemaList"));

        let post = strategy.post().unwrap();
        assert!(post.request.body.as_ref().unwrap().field("tag_id").is_some());
        assert!(matches!(post.response, ResponseType::Empty));

        let delete = strategy.delete().unwrap();
        assert_eq!(delete.request.secondary_key, Some(("tag_id".to_owned(), ScalarType::Integer)));
    }

    #[test]
    fn join_delete_needs_both_keys() {
        let registry = SchemaRegistry::default();
        let strategy = JoinStrategy::new(&registry, widget(), ArgumentsConfig::default());
        assert!(matches!(strategy.delete(), Err(Error::Configuration(_))));
    }
}
