// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Operation logic between handlers and repositories.
//!
//! A [`Service`] exposes a [`Capabilities`] set over one repository. It
//! checks payload identity, calls the repository and projects rows into
//! response shapes. Calling an operation outside the capability set yields
//! [`Error::Unsupported`].

use std::{fmt, sync::Arc};

use serde_json::{Value, json};

use crate::{
    Error, ListParams, Page, Result,
    repository::{CrudRepository, JoinRepository},
    shape::{Payload, Shape},
    strategy::{JoinStrategy, OperationStrategy, ResponseType}
};

/// One CRUD operation a service may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Paginated list.
    List,

    /// Fetch by key.
    Detail,

    /// Delete by key.
    Delete,

    /// Create.
    Create,

    /// Partial update.
    Update
}

impl Capability {
    /// Every capability.
    pub const ALL: [Self; 5] = [Self::List, Self::Detail, Self::Delete, Self::Create, Self::Update];

    /// Operation name used in messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Detail => "detail",
            Self::Delete => "delete",
            Self::Create => "post",
            Self::Update => "put"
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of [`Capability`] values.
///
/// # Example
///
/// ```rust
/// use autocrud_core::{Capabilities, Capability};
///
/// let read_only = Capabilities::none()
///     .with(Capability::List)
///     .with(Capability::Detail);
/// assert!(read_only.contains(Capability::List));
/// assert!(!read_only.contains(Capability::Create));
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Every operation.
    pub const fn all() -> Self {
        Self(0b1_1111)
    }

    /// No operation.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Add one capability.
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Remove one capability.
    #[must_use]
    pub const fn without(self, capability: Capability) -> Self {
        Self(self.0 & !capability.bit())
    }

    /// Whether `capability` is in the set.
    pub const fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Members in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Shapes a [`Service`] projects through and checks payloads against.
#[derive(Debug, Clone, Default)]
pub struct ServiceShapes {
    /// Shape of list items.
    pub list: Option<Arc<Shape>>,

    /// Shape of detail responses.
    pub detail: Option<Arc<Shape>>,

    /// Shape create payloads must be decoded against.
    pub create: Option<Arc<Shape>>,

    /// Shape update payloads must be decoded against.
    pub update: Option<Arc<Shape>>
}

impl ServiceShapes {
    /// Shapes of the operations in `capabilities`.
    ///
    /// # Errors
    ///
    /// Whatever deriving the operation's strategy bundle fails with.
    pub fn from_strategy(
        strategy: &OperationStrategy<'_>,
        capabilities: Capabilities
    ) -> Result<Self> {
        let mut shapes = Self::default();
        if capabilities.contains(Capability::List)
            && let ResponseType::Page(shape) = &strategy.list()?.response
        {
            shapes.list = Some(Arc::clone(shape));
        }
        if capabilities.contains(Capability::Detail)
            && let ResponseType::Shape(shape) = &strategy.detail()?.response
        {
            shapes.detail = Some(Arc::clone(shape));
        }
        if capabilities.contains(Capability::Create) {
            shapes.create = strategy.post()?.request.body.clone();
        }
        if capabilities.contains(Capability::Update) {
            shapes.update = strategy.put()?.request.body.clone();
        }
        if capabilities.contains(Capability::Delete) {
            strategy.delete()?;
        }
        Ok(shapes)
    }
}

/// Generic CRUD service over one repository.
pub struct Service {
    repository:   Arc<dyn CrudRepository>,
    shapes:       Arc<ServiceShapes>,
    capabilities: Capabilities
}

impl Service {
    /// Service exposing `capabilities` over `repository`.
    pub fn new(
        repository: Arc<dyn CrudRepository>,
        shapes: Arc<ServiceShapes>,
        capabilities: Capabilities
    ) -> Self {
        Self {
            repository,
            shapes,
            capabilities
        }
    }

    /// Exposed capabilities.
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn require<'s>(
        &self,
        capability: Capability,
        shape: &'s Option<Arc<Shape>>
    ) -> Result<&'s Arc<Shape>> {
        if !self.capabilities.contains(capability) {
            return Err(Error::Unsupported(capability.name()));
        }
        shape.as_ref().ok_or(Error::Unsupported(capability.name()))
    }

    /// One page of list items.
    ///
    /// Filters are applied only when present and either allow-listed or not
    /// an empty sentinel (`null`, `false`, `0`, `""`, `[]`, `{}`).
    pub async fn list(&self, params: &ListParams) -> Result<Page<Value>> {
        let shape = self.require(Capability::List, &self.shapes.list)?;
        let filters = params.effective_filters();
        tracing::debug!(
            entity = self.repository.entity().name(),
            page = params.page,
            size = params.size,
            filters = ?filters.keys().collect::<Vec<_>>(),
            "list"
        );
        let (rows, count) = self
            .repository
            .get_by_page(
                params.page,
                params.size,
                &filters,
                params.order_by.as_deref(),
                params.order_direction
            )
            .await?;
        let page_data = rows
            .iter()
            .map(|row| shape.project(row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(params.page, params.size, count, page_data))
    }

    /// The object with `key`.
    pub async fn detail(&self, key: &Value) -> Result<Value> {
        let shape = self.require(Capability::Detail, &self.shapes.detail)?;
        let row = self.repository.get(key).await?;
        shape.project(&row)
    }

    /// Delete the object with `key`.
    pub async fn delete(&self, key: &Value) -> Result<()> {
        if !self.capabilities.contains(Capability::Delete) {
            return Err(Error::Unsupported(Capability::Delete.name()));
        }
        tracing::debug!(entity = self.repository.entity().name(), key = %key, "delete");
        self.repository.delete(key).await
    }

    /// Create from a payload decoded against the create shape; returns
    /// `{"id": key}`.
    pub async fn post(&self, payload: Payload) -> Result<Value> {
        let shape = self.require(Capability::Create, &self.shapes.create)?;
        check_identity(self.repository.entity().name(), shape, &payload)?;
        let key = self.repository.create(payload.into_values()).await?;
        tracing::debug!(entity = self.repository.entity().name(), key = %key, "created");
        Ok(json!({ "id": key }))
    }

    /// Apply the fields set in a payload decoded against the update shape.
    pub async fn put(&self, payload: Payload, key: &Value) -> Result<()> {
        let shape = self.require(Capability::Update, &self.shapes.update)?;
        check_identity(self.repository.entity().name(), shape, &payload)?;
        tracing::debug!(
            entity = self.repository.entity().name(),
            key = %key,
            fields = payload.values().len(),
            "update"
        );
        self.repository.update(key, payload.into_values()).await
    }
}

/// Shapes a [`JoinService`] projects through and checks payloads against.
#[derive(Debug, Clone)]
pub struct JoinShapes {
    /// Shape of listed links.
    pub list: Arc<Shape>,

    /// Shape create payloads must be decoded against.
    pub create: Arc<Shape>
}

impl JoinShapes {
    /// Shapes of every join operation.
    ///
    /// # Errors
    ///
    /// Whatever deriving the strategy bundles fails with, including an
    /// incomplete composite key.
    pub fn from_strategy(strategy: &JoinStrategy<'_>) -> Result<Self> {
        let ResponseType::List(list) = &strategy.list()?.response else {
            return Err(Error::configuration("join list must respond with a list"));
        };
        let create = strategy
            .post()?
            .request
            .body
            .clone()
            .ok_or_else(|| Error::configuration("join post must accept a body"))?;
        strategy.delete()?;
        Ok(Self {
            list: Arc::clone(list),
            create
        })
    }
}

/// Service of one join sub-resource.
pub struct JoinService {
    repository: Arc<dyn JoinRepository>,
    shapes:     Arc<JoinShapes>
}

impl JoinService {
    /// Service over `repository` using `strategy`'s shapes.
    ///
    /// # Errors
    ///
    /// Whatever deriving the strategy bundles fails with.
    pub fn new(repository: Arc<dyn JoinRepository>, strategy: &JoinStrategy<'_>) -> Result<Self> {
        Ok(Self::with_shapes(
            repository,
            Arc::new(JoinShapes::from_strategy(strategy)?)
        ))
    }

    /// Service over `repository` with already derived shapes.
    pub fn with_shapes(repository: Arc<dyn JoinRepository>, shapes: Arc<JoinShapes>) -> Self {
        Self {
            repository,
            shapes
        }
    }

    /// Every linked row whose first key half equals `key`.
    pub async fn list(&self, key: &Value) -> Result<Vec<Value>> {
        self.repository
            .get_by_first_pk(key)
            .await?
            .iter()
            .map(|row| self.shapes.list.project(row))
            .collect()
    }

    /// Create a link from a payload decoded against the create shape.
    pub async fn post(&self, payload: Payload) -> Result<()> {
        check_identity(self.repository.entity().name(), &self.shapes.create, &payload)?;
        self.repository.create(payload.into_values()).await?;
        Ok(())
    }

    /// Delete the link identified by both key halves.
    pub async fn delete(&self, key: &Value, secondary_key: &Value) -> Result<()> {
        self.repository.delete(key, secondary_key).await
    }
}

fn check_identity(entity: &str, expected: &Shape, payload: &Payload) -> Result<()> {
    if payload.shape() != expected.id() {
        tracing::error!(
            entity,
            expected = %expected.id(),
            actual = %payload.shape(),
            "payload decoded against the wrong shape"
        );
        return Err(Error::ShapeMismatch {
            expected: expected.id().clone(),
            actual:   payload.shape().clone()
        });
    }
    Ok(())
}
