// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Route assembly.
//!
//! A [`Resource`] collects everything one primary entity needs (storage
//! source, shape arguments, exposed capabilities and join sub-resources) and
//! [`Resource::build`] turns it into [`ResourceRoutes`]: a list of
//! transport-neutral [`RouteSpec`]s, each carrying its path template, verb,
//! status, input types, response type and handler.
//!
//! Every configuration problem surfaces from `build`, at startup.
//!
//! # Routes
//!
//! | Operation | Verb | Path | Status |
//! |-----------|------|------|--------|
//! | list | `GET` | `<prefix>` | 200 |
//! | detail | `GET` | `<prefix>/{key}` | 200 |
//! | create | `POST` | `<prefix>` | 201 |
//! | update | `PUT` | `<prefix>/{key}` | 204 |
//! | delete | `DELETE` | `<prefix>/{key}` | 204 |
//! | join list | `GET` | `<prefix>/{key}/<segment>` | 200 |
//! | join create | `POST` | `<prefix>/<segment>` | 201 |
//! | join delete | `DELETE` | `<prefix>/{key}/<segment>/{secondary_key}` | 204 |
//!
//! # Example
//!
//! ```rust,ignore
//! let routes = Resource::new("/widgets", Widget::descriptor())
//!     .session(storage)
//!     .secondary("tags", WidgetTag::descriptor(), None)
//!     .capabilities(Capabilities::all().without(Capability::Delete))
//!     .build(&registry)?;
//!
//! let app = axum::Router::new().merge(routes.into_router());
//! ```

mod router;

use std::{fmt, sync::Arc};

use axum::http::{Method, StatusCode};
use futures::{FutureExt, future::BoxFuture};
use serde_json::Value;

use crate::{
    ArgumentsConfig, EntityDescriptor, Error, ListParams, Result, ScalarType,
    params::ParamShape,
    repository::{
        CrudRepository, JoinRepository, RepositoryFactory, StorageJoinRepository,
        StorageRepository
    },
    service::{Capabilities, Capability, JoinService, JoinShapes, Service, ServiceShapes},
    shape::{Payload, SchemaRegistry, Shape},
    storage::{SessionProvider, Storage},
    strategy::{JoinStrategy, OperationStrategy, ResponseType, StrategyBundle}
};

/// Future returned by a route handler.
pub type HandlerFuture = BoxFuture<'static, Result<Option<Value>>>;

/// Route handler: decoded inputs in, optional JSON out.
///
/// `None` means an empty response with the route's status.
pub type HandlerFn = Arc<dyn Fn(HandlerInput) -> HandlerFuture + Send + Sync>;

/// Decoded inputs of one request.
///
/// Each part is present only when the route declares it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerInput {
    /// Value of the `{key}` path segment.
    pub primary_key: Option<Value>,

    /// Value of the `{secondary_key}` path segment.
    pub secondary_key: Option<Value>,

    /// Body decoded against the route's body shape.
    pub body: Option<Payload>,

    /// Query decoded against the route's parameter shape.
    pub params: Option<ListParams>
}

impl HandlerInput {
    fn key(&self) -> Result<&Value> {
        self.primary_key
            .as_ref()
            .ok_or_else(|| Error::validation("key", "missing path key"))
    }

    fn secondary(&self) -> Result<&Value> {
        self.secondary_key
            .as_ref()
            .ok_or_else(|| Error::validation("secondary_key", "missing path key"))
    }

    fn take_body(&mut self) -> Result<Payload> {
        self.body
            .take()
            .ok_or_else(|| Error::validation("body", "missing request body"))
    }
}

/// One route: transport description plus handler.
#[derive(Clone)]
pub struct RouteSpec {
    /// Operation identifier, unique within the resource.
    pub operation: String,

    /// HTTP verb.
    pub method: Method,

    /// Path template with `{key}` / `{secondary_key}` placeholders.
    pub path: String,

    /// Success status.
    pub status: StatusCode,

    /// `{key}` field name and type.
    pub primary_key: Option<(String, ScalarType)>,

    /// `{secondary_key}` field name and type.
    pub secondary_key: Option<(String, ScalarType)>,

    /// Query parameter shape.
    pub params: Option<Arc<ParamShape>>,

    /// Body shape.
    pub body: Option<Arc<Shape>>,

    /// Response type.
    pub response: ResponseType,

    /// Handler.
    pub handler: HandlerFn
}

impl RouteSpec {
    fn from_bundle(
        operation: String,
        method: Method,
        path: String,
        status: StatusCode,
        bundle: &StrategyBundle,
        handler: HandlerFn
    ) -> Self {
        Self {
            operation,
            method,
            path,
            status,
            primary_key: bundle.request.primary_key.clone(),
            secondary_key: bundle.request.secondary_key.clone(),
            params: bundle.request.params.clone(),
            body: bundle.request.body.clone(),
            response: bundle.response.clone(),
            handler
        }
    }

    /// Run the handler.
    pub async fn call(&self, input: HandlerInput) -> Result<Option<Value>> {
        (self.handler)(input).await
    }
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("status", &self.status)
            .field("primary_key", &self.primary_key)
            .field("secondary_key", &self.secondary_key)
            .field("params", &self.params.as_ref().map(|p| p.name()))
            .field("body", &self.body.as_ref().map(|s| s.name()))
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Where a request gets its primary repository from.
#[derive(Clone)]
enum CrudSource {
    Fixed(Arc<dyn CrudRepository>),
    Session {
        provider: Arc<dyn SessionProvider>,
        factory:  RepositoryFactory
    }
}

impl CrudSource {
    async fn open(&self) -> Result<Arc<dyn CrudRepository>> {
        match self {
            Self::Fixed(repository) => Ok(Arc::clone(repository)),
            Self::Session {
                provider,
                factory
            } => Ok(factory(provider.session().await?))
        }
    }
}

/// Where a request gets a join repository from.
#[derive(Clone)]
enum JoinSource {
    Fixed(Arc<dyn JoinRepository>),
    Session {
        provider: Arc<dyn SessionProvider>,
        entity:   Arc<EntityDescriptor>
    }
}

impl JoinSource {
    async fn open(&self) -> Result<Arc<dyn JoinRepository>> {
        match self {
            Self::Fixed(repository) => Ok(Arc::clone(repository)),
            Self::Session {
                provider,
                entity
            } => {
                let storage = provider.session().await?;
                let repository = StorageJoinRepository::new(storage, Arc::clone(entity))?;
                Ok(Arc::new(repository))
            }
        }
    }
}

struct Secondary {
    segment:    String,
    entity:     Arc<EntityDescriptor>,
    repository: Option<Arc<dyn JoinRepository>>
}

/// Builder of one primary resource and its join sub-resources.
pub struct Resource {
    prefix:       String,
    entity:       Arc<EntityDescriptor>,
    session:      Option<Arc<dyn SessionProvider>>,
    repository:   Option<Arc<dyn CrudRepository>>,
    factory:      Option<RepositoryFactory>,
    secondaries:  Vec<Secondary>,
    arguments:    ArgumentsConfig,
    capabilities: Capabilities
}

impl Resource {
    /// Resource for `entity` mounted at `prefix`.
    pub fn new(prefix: impl Into<String>, entity: Arc<EntityDescriptor>) -> Self {
        Self {
            prefix: prefix.into(),
            entity,
            session: None,
            repository: None,
            factory: None,
            secondaries: Vec::new(),
            arguments: ArgumentsConfig::default(),
            capabilities: Capabilities::all()
        }
    }

    /// Open one storage session per request from `provider`.
    #[must_use]
    pub fn session(mut self, provider: impl SessionProvider + 'static) -> Self {
        self.session = Some(Arc::new(provider));
        self
    }

    /// Serve every request from one pre-built repository.
    ///
    /// Takes precedence over [`session`](Self::session) for the primary
    /// entity.
    #[must_use]
    pub fn repository(mut self, repository: Arc<dyn CrudRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Build the per-request repository with `factory` instead of
    /// [`StorageRepository`].
    #[must_use]
    pub fn repository_factory(mut self, factory: RepositoryFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Add a join sub-resource under `segment`.
    ///
    /// Without a repository the join entity is served from the session. Join
    /// shapes are synthesized with default arguments.
    #[must_use]
    pub fn secondary(
        mut self,
        segment: impl Into<String>,
        entity: Arc<EntityDescriptor>,
        repository: Option<Arc<dyn JoinRepository>>
    ) -> Self {
        self.secondaries.push(Secondary {
            segment: segment.into().trim_matches('/').to_owned(),
            entity,
            repository
        });
        self
    }

    /// Shape arguments per operation of the primary entity.
    #[must_use]
    pub fn arguments(mut self, arguments: ArgumentsConfig) -> Self {
        self.arguments = arguments;
        self
    }

    /// Operations to expose.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Assemble the routes, synthesizing shapes through `registry`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when the prefix is empty, a descriptor is
    /// invalid, an operation needs a primary key the entity lacks, no storage
    /// source is configured, a join entity lacks a two-field key, or shape
    /// synthesis rejects a cycle.
    pub fn build(self, registry: &SchemaRegistry) -> Result<ResourceRoutes> {
        self.entity.validate()?;
        let prefix = normalize_prefix(&self.prefix);
        if prefix.is_empty() {
            return Err(Error::configuration(format!(
                "resource `{}` needs a non-empty path prefix",
                self.entity.name()
            )));
        }
        let source = self.crud_source()?;

        let strategy =
            OperationStrategy::new(registry, Arc::clone(&self.entity), self.arguments.clone());
        let shapes = Arc::new(ServiceShapes::from_strategy(&strategy, self.capabilities)?);
        let table = self.entity.table();
        let item = format!("{prefix}/{{key}}");

        let mut routes = Vec::new();
        for capability in self.capabilities.iter() {
            let handler = crud_handler(
                capability,
                source.clone(),
                Arc::clone(&shapes),
                self.capabilities
            );
            let route = match capability {
                Capability::List => RouteSpec::from_bundle(
                    format!("list_{table}"),
                    Method::GET,
                    prefix.clone(),
                    StatusCode::OK,
                    strategy.list()?,
                    handler
                ),
                Capability::Detail => RouteSpec::from_bundle(
                    format!("get_{table}"),
                    Method::GET,
                    item.clone(),
                    StatusCode::OK,
                    strategy.detail()?,
                    handler
                ),
                Capability::Create => RouteSpec::from_bundle(
                    format!("create_{table}"),
                    Method::POST,
                    prefix.clone(),
                    StatusCode::CREATED,
                    strategy.post()?,
                    handler
                ),
                Capability::Update => RouteSpec::from_bundle(
                    format!("update_{table}"),
                    Method::PUT,
                    item.clone(),
                    StatusCode::NO_CONTENT,
                    strategy.put()?,
                    handler
                ),
                Capability::Delete => RouteSpec::from_bundle(
                    format!("delete_{table}"),
                    Method::DELETE,
                    item.clone(),
                    StatusCode::NO_CONTENT,
                    strategy.delete()?,
                    handler
                )
            };
            routes.push(route);
        }

        for secondary in &self.secondaries {
            routes.extend(self.join_routes(registry, &prefix, secondary)?);
        }

        tracing::info!(
            entity = self.entity.name(),
            prefix = %prefix,
            capabilities = ?self.capabilities,
            secondaries = self.secondaries.len(),
            routes = routes.len(),
            "resource assembled"
        );

        Ok(ResourceRoutes {
            prefix,
            entity: self.entity,
            routes
        })
    }

    fn crud_source(&self) -> Result<CrudSource> {
        if let Some(repository) = &self.repository {
            if repository.entity().name() != self.entity.name() {
                return Err(Error::configuration(format!(
                    "repository serves `{}` but resource `{}` serves `{}`",
                    repository.entity().name(),
                    self.prefix,
                    self.entity.name()
                )));
            }
            if self.factory.is_some() {
                tracing::warn!(
                    entity = self.entity.name(),
                    "repository factory ignored: a fixed repository was supplied"
                );
            }
            return Ok(CrudSource::Fixed(Arc::clone(repository)));
        }

        let Some(provider) = &self.session else {
            return Err(Error::configuration(format!(
                "resource `{}` has neither a repository nor a session provider",
                self.prefix
            )));
        };
        let factory = self.factory.clone().unwrap_or_else(|| {
            let entity = Arc::clone(&self.entity);
            Arc::new(move |storage: Arc<dyn Storage>| {
                Arc::new(StorageRepository::new(storage, Arc::clone(&entity)))
                    as Arc<dyn CrudRepository>
            })
        });
        Ok(CrudSource::Session {
            provider: Arc::clone(provider),
            factory
        })
    }

    fn join_routes(
        &self,
        registry: &SchemaRegistry,
        prefix: &str,
        secondary: &Secondary
    ) -> Result<[RouteSpec; 3]> {
        secondary.entity.validate()?;
        let segment = &secondary.segment;
        if segment.is_empty() {
            return Err(Error::configuration(format!(
                "secondary `{}` of resource `{prefix}` has an empty route segment",
                secondary.entity.name()
            )));
        }

        let source = match (&secondary.repository, &self.session) {
            (Some(repository), _) => JoinSource::Fixed(Arc::clone(repository)),
            (None, Some(provider)) => JoinSource::Session {
                provider: Arc::clone(provider),
                entity:   Arc::clone(&secondary.entity)
            },
            (None, None) => {
                return Err(Error::configuration(format!(
                    "secondary `{segment}` of resource `{prefix}` has no join repository \
                     and the resource has no session provider"
                )));
            }
        };

        let strategy = JoinStrategy::new(
            registry,
            Arc::clone(&secondary.entity),
            ArgumentsConfig::default()
        );
        let shapes = Arc::new(JoinShapes::from_strategy(&strategy)?);
        let table = secondary.entity.table();

        Ok([
            RouteSpec::from_bundle(
                format!("list_{table}"),
                Method::GET,
                format!("{prefix}/{{key}}/{segment}"),
                StatusCode::OK,
                strategy.list()?,
                join_handler(JoinOperation::List, source.clone(), Arc::clone(&shapes))
            ),
            RouteSpec::from_bundle(
                format!("create_{table}"),
                Method::POST,
                format!("{prefix}/{segment}"),
                StatusCode::CREATED,
                strategy.post()?,
                join_handler(JoinOperation::Create, source.clone(), Arc::clone(&shapes))
            ),
            RouteSpec::from_bundle(
                format!("delete_{table}"),
                Method::DELETE,
                format!("{prefix}/{{key}}/{segment}/{{secondary_key}}"),
                StatusCode::NO_CONTENT,
                strategy.delete()?,
                join_handler(JoinOperation::Delete, source, shapes)
            )
        ])
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn crud_handler(
    capability: Capability,
    source: CrudSource,
    shapes: Arc<ServiceShapes>,
    capabilities: Capabilities
) -> HandlerFn {
    Arc::new(move |mut input: HandlerInput| {
        let source = source.clone();
        let shapes = Arc::clone(&shapes);
        async move {
            let service = Service::new(source.open().await?, shapes, capabilities);
            match capability {
                Capability::List => {
                    let params = input.params.take().unwrap_or_default();
                    let page = service.list(&params).await?;
                    serde_json::to_value(page).map(Some).map_err(Error::storage)
                }
                Capability::Detail => service.detail(input.key()?).await.map(Some),
                Capability::Create => service.post(input.take_body()?).await.map(Some),
                Capability::Update => {
                    let body = input.take_body()?;
                    service.put(body, input.key()?).await.map(|()| None)
                }
                Capability::Delete => service.delete(input.key()?).await.map(|()| None)
            }
        }
        .boxed()
    })
}

#[derive(Clone, Copy)]
enum JoinOperation {
    List,
    Create,
    Delete
}

fn join_handler(operation: JoinOperation, source: JoinSource, shapes: Arc<JoinShapes>) -> HandlerFn {
    Arc::new(move |mut input: HandlerInput| {
        let source = source.clone();
        let shapes = Arc::clone(&shapes);
        async move {
            let service = JoinService::with_shapes(source.open().await?, shapes);
            match operation {
                JoinOperation::List => {
                    let links = service.list(input.key()?).await?;
                    Ok(Some(Value::Array(links)))
                }
                JoinOperation::Create => service.post(input.take_body()?).await.map(|()| None),
                JoinOperation::Delete => service
                    .delete(input.key()?, input.secondary()?)
                    .await
                    .map(|()| None)
            }
        }
        .boxed()
    })
}

/// Assembled routes of one resource.
#[derive(Debug, Clone)]
pub struct ResourceRoutes {
    prefix: String,
    entity: Arc<EntityDescriptor>,
    routes: Vec<RouteSpec>
}

impl ResourceRoutes {
    /// Normalized path prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Primary entity.
    pub const fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    /// Every route, primary operations first.
    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    /// Route registered for `method` on `path`.
    pub fn route(&self, method: &Method, path: &str) -> Option<&RouteSpec> {
        self.routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
    }
}
