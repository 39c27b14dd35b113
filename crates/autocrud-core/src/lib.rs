// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Runtime engine for autocrud.
//!
//! Given an [`EntityDescriptor`], this crate derives everything a CRUD
//! resource needs and wires it to storage and HTTP:
//!
//! - [`SchemaRegistry`]: cached request/response [`Shape`]s per operation
//! - [`ParamShape`]: filter, ordering and pagination query parameters
//! - [`StrategyBundle`]: request/response types of each operation
//! - [`CrudRepository`] / [`JoinRepository`]: storage access over [`Storage`]
//! - [`Service`] / [`JoinService`]: operation logic
//! - [`Resource`]: route assembly, mounted on axum through
//!   [`ResourceRoutes::into_router`]
//! - [`prelude`]: convenient re-exports
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use autocrud_core::prelude::*;
//!
//! let registry = SchemaRegistry::default();
//! let storage = Arc::new(MemoryStorage::new());
//!
//! let router = Resource::new("/widgets", Widget::descriptor())
//!     .session(storage)
//!     .build(&registry)?
//!     .into_router();
//! ```
//!
//! # Features
//!
//! | Feature | Adds |
//! |---------|------|
//! | `postgres` | [`storage::PgStorage`] on sqlx |
//! | `api` | OpenAPI documents for assembled routes (utoipa) |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod arguments;
pub mod descriptor;
mod error;
#[cfg(feature = "api")]
pub mod openapi;
pub mod page;
pub mod params;
pub mod prelude;
pub mod query;
pub mod repository;
pub mod routes;
pub mod service;
pub mod shape;
pub mod storage;
pub mod strategy;
pub mod value;

/// Re-export async_trait for implementors of the storage and repository
/// traits.
pub use async_trait::async_trait;

pub use crate::{
    arguments::{ArgumentsConfig, ShapeArgs},
    descriptor::{
        Cardinality, DefaultValue, Entity, EntityDescriptor, FieldDescriptor, FieldKind,
        RelationField, RelationLink, ScalarField, ScalarType, defaults
    },
    error::{Error, Result},
    page::Page,
    params::{ListParams, ParamKind, ParamShape, ParamSpec},
    repository::{
        CrudRepository, JoinRepository, RepositoryFactory, StorageJoinRepository,
        StorageRepository
    },
    routes::{HandlerInput, Resource, ResourceRoutes, RouteSpec},
    service::{Capabilities, Capability, JoinService, JoinShapes, Service, ServiceShapes},
    shape::{CyclePolicy, Payload, SchemaRegistry, Shape, ShapeId, SynthesisConfig},
    storage::{MemoryStorage, Row, SessionProvider, Storage},
    strategy::{JoinStrategy, OperationStrategy, ResponseType, StrategyBundle}
};

/// Fields tried, in order, as the default ordering key.
pub const DEFAULT_ORDER_FIELDS: [&str; 2] = ["id", "created_at"];

/// Query keys reserved for list controls.
pub const RESERVED_PARAMS: [&str; 5] = ["order_by", "order_direction", "allow_none", "page", "size"];

/// Page requested when `page` is absent.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when `size` is absent.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Sort direction for ordered queries.
///
/// Serializes as its query spelling, `asc` or `desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,

    /// Descending order (Z-A, 9-0, newest first).
    Desc
}

impl SortDirection {
    /// Convert to SQL keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC"
        }
    }

    /// Query-string spelling.
    pub const fn as_param(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc"
        }
    }

    /// Parse a query value, ignoring case.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for anything but `asc` / `desc`.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(Error::validation("order_direction", "expected `asc` or `desc`"))
        }
    }
}
