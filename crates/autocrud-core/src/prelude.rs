// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Convenient re-exports for common usage.
//!
//! # Usage
//!
//! ```rust,ignore
//! use autocrud_core::prelude::*;
//! ```

pub use crate::{
    ArgumentsConfig, Capabilities, Capability, Cardinality, CrudRepository, Entity,
    EntityDescriptor, Error, FieldDescriptor, JoinRepository, ListParams, MemoryStorage, Page,
    Resource, ResourceRoutes, Result, ScalarType, SchemaRegistry, SessionProvider, ShapeArgs,
    SortDirection, Storage, SynthesisConfig, async_trait
};
