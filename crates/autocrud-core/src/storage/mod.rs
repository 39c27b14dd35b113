// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Storage collaborator.
//!
//! The engine reaches persisted data only through [`Storage`], a narrow async
//! contract over JSON rows. Two backends ship with the crate:
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | [`MemoryStorage`] | always | tests, prototypes |
//! | [`PgStorage`] | `postgres` | sqlx connection pool |
//!
//! Handlers never hold a storage directly; they ask a [`SessionProvider`]
//! for one session per request.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use self::memory::MemoryStorage;
#[cfg(feature = "postgres")]
pub use self::postgres::PgStorage;
use crate::{
    EntityDescriptor, Result,
    query::{Predicate, SelectPlan}
};

/// One stored record as a JSON object keyed by column name.
///
/// Loaded relations appear under their field name.
pub type Row = Map<String, Value>;

/// Narrow async storage contract.
///
/// Every method is one atomic operation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert one row and return its key.
    async fn insert(&self, entity: &EntityDescriptor, values: Row) -> Result<Value>;

    /// Insert rows in one transaction and return their keys.
    async fn insert_many(&self, entity: &EntityDescriptor, rows: Vec<Row>) -> Result<Vec<Value>>;

    /// Set `values` on every row matching `predicates`; returns the number of
    /// matched rows.
    async fn update(
        &self,
        entity: &EntityDescriptor,
        predicates: &[Predicate],
        values: Row
    ) -> Result<u64>;

    /// Delete rows matching `predicates`; returns the number removed.
    async fn delete(&self, entity: &EntityDescriptor, predicates: &[Predicate]) -> Result<u64>;

    /// Rows selected by `plan`.
    async fn select(&self, plan: &SelectPlan) -> Result<Vec<Row>>;

    /// Number of rows matching `plan`'s predicates.
    async fn count(&self, plan: &SelectPlan) -> Result<u64>;
}

/// Source of storage sessions, one per request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a session.
    async fn session(&self) -> Result<Arc<dyn Storage>>;
}

#[async_trait]
impl<S: Storage + 'static> SessionProvider for Arc<S> {
    async fn session(&self) -> Result<Arc<dyn Storage>> {
        Ok(Arc::clone(self) as Arc<dyn Storage>)
    }
}

/// Key of a stored row: the single primary-key value, or an object of
/// primary-key values for composite keys.
pub fn key_of(entity: &EntityDescriptor, row: &Row) -> Value {
    let keys: Vec<&str> = entity.primary_keys().map(|(name, _)| name).collect();
    match keys.as_slice() {
        [single] => row.get(*single).cloned().unwrap_or(Value::Null),
        many => Value::Object(
            many.iter()
                .map(|name| ((*name).to_owned(), row.get(*name).cloned().unwrap_or(Value::Null)))
                .collect()
        )
    }
}
