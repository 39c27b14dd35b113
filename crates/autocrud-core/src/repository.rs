// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Generic repositories.
//!
//! [`CrudRepository`] is the storage-access contract the service layer uses
//! for a primary entity; [`JoinRepository`] is the restricted variant for
//! join entities with a composite key and no update. Both come with a
//! default implementation over any [`Storage`] session.
//!
//! # Keys
//!
//! Keys are passed as JSON: the bare value for a single primary key, an
//! object of key fields for composite keys. They are type-checked against
//! the descriptor before reaching storage.
//!
//! # Paginated select
//!
//! [`CrudRepository::get_by_page`] runs at most two statements:
//!
//! 1. a count with the filter predicates and no ordering;
//! 2. when the count is non-zero, the row query ordered by the requested
//!    field (or the default ordering field) with
//!    `LIMIT size OFFSET size * (page - 1)`.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    DEFAULT_ORDER_FIELDS, EntityDescriptor, Error, Result, SortDirection, page,
    query::{Predicate, RelationLoad, SelectPlan},
    storage::{Row, Storage},
    value::render_key
};

/// Storage access for one primary entity.
#[async_trait]
pub trait CrudRepository: Send + Sync {
    /// Entity served by this repository.
    fn entity(&self) -> &Arc<EntityDescriptor>;

    /// Insert one row and return its key.
    async fn create(&self, values: Row) -> Result<Value>;

    /// Insert rows atomically and return their keys.
    async fn bulk_create(&self, rows: Vec<Row>) -> Result<Vec<Value>>;

    /// Update the row with `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no row has `key`.
    async fn update(&self, key: &Value, values: Row) -> Result<()>;

    /// Update every row whose `field` equals `value`; returns the count.
    async fn bulk_update_by_field(&self, field: &str, value: &Value, values: Row) -> Result<u64>;

    /// Delete the row with `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no row has `key`.
    async fn delete(&self, key: &Value) -> Result<()>;

    /// Row with `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no row has `key`.
    async fn get(&self, key: &Value) -> Result<Row> {
        self.get_or_none(key)
            .await?
            .ok_or_else(|| Error::not_found(self.entity().name(), render_key(key)))
    }

    /// Row with `key`, if any.
    async fn get_or_none(&self, key: &Value) -> Result<Option<Row>>;

    /// Every row whose `field` equals `value`.
    async fn get_by_field(&self, field: &str, value: &Value) -> Result<Vec<Row>>;

    /// First row whose `field` equals `value`, if any.
    async fn get_by_field_or_none(&self, field: &str, value: &Value) -> Result<Option<Row>>;

    /// Every row.
    async fn all(&self) -> Result<Vec<Row>>;

    /// One page of rows matching `filters` and the total match count.
    async fn get_by_page(
        &self,
        page: u64,
        size: u64,
        filters: &BTreeMap<String, Value>,
        order_by: Option<&str>,
        direction: SortDirection
    ) -> Result<(Vec<Row>, u64)>;
}

/// Storage access for one join entity.
#[async_trait]
pub trait JoinRepository: Send + Sync {
    /// Entity served by this repository.
    fn entity(&self) -> &Arc<EntityDescriptor>;

    /// Insert one link row and return its key.
    async fn create(&self, values: Row) -> Result<Value>;

    /// Delete the link identified by both key halves.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no such link exists.
    async fn delete(&self, first: &Value, second: &Value) -> Result<()>;

    /// Every row whose first key field equals `first`.
    async fn get_by_first_pk(&self, first: &Value) -> Result<Vec<Row>>;

    /// Every row whose `field` equals `value`.
    async fn get_by_field(&self, field: &str, value: &Value) -> Result<Vec<Row>>;

    /// First row whose `field` equals `value`, if any.
    async fn get_by_field_or_none(&self, field: &str, value: &Value) -> Result<Option<Row>>;

    /// Every row.
    async fn all(&self) -> Result<Vec<Row>>;
}

/// Builds a repository over a per-request storage session.
pub type RepositoryFactory = Arc<dyn Fn(Arc<dyn Storage>) -> Arc<dyn CrudRepository> + Send + Sync>;

/// [`CrudRepository`] over a [`Storage`] session.
pub struct StorageRepository {
    storage:   Arc<dyn Storage>,
    entity:    Arc<EntityDescriptor>,
    relations: Vec<RelationLoad>
}

impl StorageRepository {
    /// Repository for `entity` over `storage`.
    ///
    /// Reads load every linked relation of the entity one hop deep.
    pub fn new(storage: Arc<dyn Storage>, entity: Arc<EntityDescriptor>) -> Self {
        let relations = RelationLoad::for_entity(&entity);
        Self {
            storage,
            entity,
            relations
        }
    }

    fn plan(&self) -> SelectPlan {
        SelectPlan::new(self.entity.table()).load(self.relations.clone())
    }
}

#[async_trait]
impl CrudRepository for StorageRepository {
    fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    async fn create(&self, values: Row) -> Result<Value> {
        let values = columns_only(&self.entity, values);
        self.storage.insert(&self.entity, values).await
    }

    async fn bulk_create(&self, rows: Vec<Row>) -> Result<Vec<Value>> {
        let rows = rows
            .into_iter()
            .map(|row| columns_only(&self.entity, row))
            .collect();
        self.storage.insert_many(&self.entity, rows).await
    }

    async fn update(&self, key: &Value, values: Row) -> Result<()> {
        let predicates = key_predicates(&self.entity, key)?;
        let values = columns_only(&self.entity, values);
        let matched = self
            .storage
            .update(&self.entity, &predicates, values)
            .await?;
        if matched == 0 {
            return Err(Error::not_found(self.entity.name(), render_key(key)));
        }
        Ok(())
    }

    async fn bulk_update_by_field(&self, field: &str, value: &Value, values: Row) -> Result<u64> {
        let predicate = field_predicate(&self.entity, field, value)?;
        let values = columns_only(&self.entity, values);
        self.storage
            .update(&self.entity, &[predicate], values)
            .await
    }

    async fn delete(&self, key: &Value) -> Result<()> {
        let predicates = key_predicates(&self.entity, key)?;
        if self.storage.delete(&self.entity, &predicates).await? == 0 {
            return Err(Error::not_found(self.entity.name(), render_key(key)));
        }
        Ok(())
    }

    async fn get_or_none(&self, key: &Value) -> Result<Option<Row>> {
        let mut plan = self.plan();
        plan.predicates = key_predicates(&self.entity, key)?;
        plan.limit = Some(1);
        Ok(self.storage.select(&plan).await?.into_iter().next())
    }

    async fn get_by_field(&self, field: &str, value: &Value) -> Result<Vec<Row>> {
        let plan = self
            .plan()
            .filter(field_predicate(&self.entity, field, value)?);
        self.storage.select(&plan).await
    }

    async fn get_by_field_or_none(&self, field: &str, value: &Value) -> Result<Option<Row>> {
        let mut plan = self
            .plan()
            .filter(field_predicate(&self.entity, field, value)?);
        plan.limit = Some(1);
        Ok(self.storage.select(&plan).await?.into_iter().next())
    }

    async fn all(&self) -> Result<Vec<Row>> {
        self.storage.select(&self.plan()).await
    }

    async fn get_by_page(
        &self,
        page: u64,
        size: u64,
        filters: &BTreeMap<String, Value>,
        order_by: Option<&str>,
        direction: SortDirection
    ) -> Result<(Vec<Row>, u64)> {
        if let Some(field) = order_by
            && self.entity.scalar(field).is_none()
        {
            return Err(Error::validation(
                "order_by",
                format!("`{}` has no field `{field}`", self.entity.name())
            ));
        }

        let mut plan = self.plan();
        for (field, value) in filters {
            plan = plan.filter(field_predicate(&self.entity, field, value)?);
        }

        let count = self.storage.count(&plan.count_plan()).await?;
        if count == 0 {
            tracing::debug!(entity = self.entity.name(), "page query matched nothing");
            return Ok((Vec::new(), 0));
        }

        plan = match order_by {
            Some(field) => plan.order_by(field, direction),
            None => match default_order_field(&self.entity) {
                Some(field) => plan.order_by(field, SortDirection::Asc),
                None => plan
            }
        };
        plan = plan.paginate(size, page::offset(page, size));

        tracing::debug!(
            entity = self.entity.name(),
            page,
            size,
            count,
            filters = plan.predicates.len(),
            "page query"
        );
        let rows = self.storage.select(&plan).await?;
        Ok((rows, count))
    }
}

/// [`JoinRepository`] over a [`Storage`] session.
pub struct StorageJoinRepository {
    storage: Arc<dyn Storage>,
    entity:  Arc<EntityDescriptor>
}

impl StorageJoinRepository {
    /// Join repository for `entity` over `storage`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when `entity` has fewer than two primary-key
    /// fields.
    pub fn new(storage: Arc<dyn Storage>, entity: Arc<EntityDescriptor>) -> Result<Self> {
        join_keys(&entity)?;
        Ok(Self {
            storage,
            entity
        })
    }
}

/// First two primary-key fields of a join entity.
pub(crate) fn join_keys(entity: &EntityDescriptor) -> Result<[(String, crate::ScalarType); 2]> {
    let mut keys = entity.primary_keys();
    match (keys.next(), keys.next()) {
        (Some((first, a)), Some((second, b))) => {
            Ok([(first.to_owned(), a.ty), (second.to_owned(), b.ty)])
        }
        _ => Err(Error::configuration(format!(
            "join entity `{}` needs a composite primary key of at least two fields",
            entity.name()
        )))
    }
}

#[async_trait]
impl JoinRepository for StorageJoinRepository {
    fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    async fn create(&self, values: Row) -> Result<Value> {
        let values = columns_only(&self.entity, values);
        self.storage.insert(&self.entity, values).await
    }

    async fn delete(&self, first: &Value, second: &Value) -> Result<()> {
        let [(first_name, first_ty), (second_name, second_ty)] = join_keys(&self.entity)?;
        let predicates = [
            Predicate::eq(
                first_name.as_str(),
                first_ty,
                first_ty.check(&first_name, first, false)?
            ),
            Predicate::eq(
                second_name.as_str(),
                second_ty,
                second_ty.check(&second_name, second, false)?
            )
        ];
        if self.storage.delete(&self.entity, &predicates).await? == 0 {
            return Err(Error::not_found(
                self.entity.name(),
                format!("{}/{}", render_key(first), render_key(second))
            ));
        }
        Ok(())
    }

    async fn get_by_first_pk(&self, first: &Value) -> Result<Vec<Row>> {
        let [(name, _), _] = join_keys(&self.entity)?;
        self.get_by_field(&name, first).await
    }

    async fn get_by_field(&self, field: &str, value: &Value) -> Result<Vec<Row>> {
        let plan = SelectPlan::new(self.entity.table())
            .filter(field_predicate(&self.entity, field, value)?);
        self.storage.select(&plan).await
    }

    async fn get_by_field_or_none(&self, field: &str, value: &Value) -> Result<Option<Row>> {
        let mut plan = SelectPlan::new(self.entity.table())
            .filter(field_predicate(&self.entity, field, value)?);
        plan.limit = Some(1);
        Ok(self.storage.select(&plan).await?.into_iter().next())
    }

    async fn all(&self) -> Result<Vec<Row>> {
        self.storage
            .select(&SelectPlan::new(self.entity.table()))
            .await
    }
}

/// Drop payload keys that are not columns of `entity`.
fn columns_only(entity: &EntityDescriptor, mut values: Row) -> Row {
    values.retain(|column, _| {
        let keep = entity.scalar(column).is_some();
        if !keep {
            tracing::debug!(
                entity = entity.name(),
                column = %column,
                "dropping non-column payload key"
            );
        }
        keep
    });
    values
}

/// Equality predicate on a scalar field, value checked against its type.
fn field_predicate(entity: &EntityDescriptor, field: &str, value: &Value) -> Result<Predicate> {
    let scalar = entity.scalar(field).ok_or_else(|| {
        Error::validation(field, format!("`{}` has no field `{field}`", entity.name()))
    })?;
    let value = scalar.ty.check(field, value, true)?;
    Ok(Predicate::eq(field, scalar.ty, value))
}

/// Predicates selecting the row with `key`.
fn key_predicates(entity: &EntityDescriptor, key: &Value) -> Result<Vec<Predicate>> {
    let keys: Vec<_> = entity.primary_keys().collect();
    match keys.as_slice() {
        [] => Err(Error::configuration(format!(
            "entity `{}` has no primary key",
            entity.name()
        ))),
        [(name, scalar)] => Ok(vec![Predicate::eq(
            *name,
            scalar.ty,
            scalar.ty.check(name, key, false)?
        )]),
        many => {
            let object = key
                .as_object()
                .ok_or_else(|| Error::validation("key", "expected an object of key fields"))?;
            many.iter()
                .map(|(name, scalar)| -> Result<Predicate> {
                    let raw = object
                        .get(*name)
                        .ok_or_else(|| Error::validation(*name, "key field missing"))?;
                    Ok(Predicate::eq(*name, scalar.ty, scalar.ty.check(name, raw, false)?))
                })
                .collect()
        }
    }
}

/// First scalar field from the default ordering priority list.
fn default_order_field(entity: &EntityDescriptor) -> Option<&'static str> {
    DEFAULT_ORDER_FIELDS
        .iter()
        .copied()
        .find(|field| entity.scalar(field).is_some())
}
