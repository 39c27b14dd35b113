// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! In-process storage backend.

use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Row, Storage, key_of};
use crate::{
    EntityDescriptor, Error, Result, ScalarType, SortDirection, defaults,
    query::{Order, Predicate, RelationLoad, SelectPlan},
    value::compare
};

/// Tables held in memory behind one async lock.
///
/// Applies descriptor defaults on insert, assigns generated integer keys from
/// a per-table sequence and uuid keys as v7, and enforces not-null columns
/// and primary-key uniqueness.
///
/// # Example
///
/// ```rust,ignore
/// let storage = Arc::new(MemoryStorage::new());
/// let key = storage.insert(&widget, row).await?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Table>>
}

#[derive(Debug, Default, Clone)]
struct Table {
    rows:     Vec<Row>,
    sequence: i64
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row of `table`, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

impl Table {
    fn prepare(&mut self, entity: &EntityDescriptor, mut values: Row) -> Result<Row> {
        if let Some(column) = values.keys().find(|c| entity.scalar(c).is_none()) {
            return Err(Error::validation(
                column.as_str(),
                format!("`{}` has no such column", entity.name())
            ));
        }

        let mut row = Row::new();
        for (name, scalar) in entity.scalar_fields() {
            let supplied = values.remove(name).filter(|v| !(v.is_null() && scalar.generated));
            let value = match supplied {
                Some(value) => scalar.ty.check(name, &value, scalar.nullable)?,
                None => match &scalar.default {
                    Some(default) => scalar.ty.check(name, &default.produce(), scalar.nullable)?,
                    None if scalar.generated => self.generate(entity, name, scalar.ty)?,
                    None => Value::Null
                }
            };
            if value.is_null() && !scalar.nullable {
                return Err(Error::storage(format!(
                    "null value in column `{}.{name}` violates not-null constraint",
                    entity.table()
                )));
            }
            if scalar.generated
                && let Some(n) = value.as_i64()
            {
                self.sequence = self.sequence.max(n);
            }
            row.insert(name.to_owned(), value);
        }
        Ok(row)
    }

    fn generate(&mut self, entity: &EntityDescriptor, name: &str, ty: ScalarType) -> Result<Value> {
        match ty {
            ScalarType::Integer => {
                self.sequence += 1;
                Ok(Value::from(self.sequence))
            }
            ScalarType::Uuid => Ok(defaults::uuid_v7()),
            ScalarType::Timestamp => Ok(defaults::now_utc()),
            other => Err(Error::storage(format!(
                "cannot generate `{}.{name}` of type {other}",
                entity.table()
            )))
        }
    }

    fn check_unique(&self, entity: &EntityDescriptor, row: &Row) -> Result<()> {
        let keys: Vec<&str> = entity.primary_keys().map(|(name, _)| name).collect();
        if keys.is_empty() {
            return Ok(());
        }
        let duplicate = self.rows.iter().any(|existing| {
            keys.iter().all(|k| {
                compare(
                    existing.get(*k).unwrap_or(&Value::Null),
                    row.get(*k).unwrap_or(&Value::Null)
                )
                .is_eq()
            })
        });
        if duplicate {
            return Err(Error::storage(format!(
                "duplicate key {} violates unique constraint on `{}`",
                key_of(entity, row),
                entity.table()
            )));
        }
        Ok(())
    }

    fn insert(&mut self, entity: &EntityDescriptor, values: Row) -> Result<Value> {
        let row = self.prepare(entity, values)?;
        self.check_unique(entity, &row)?;
        let key = key_of(entity, &row);
        self.rows.push(row);
        Ok(key)
    }
}

fn sort_rows(rows: &mut [Row], order: &[Order]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in order {
            let left = a.get(&key.column).unwrap_or(&Value::Null);
            let right = b.get(&key.column).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => match key.direction {
                    SortDirection::Asc => compare(left, right),
                    SortDirection::Desc => compare(right, left)
                }
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn load_relation(tables: &HashMap<String, Table>, load: &RelationLoad, row: &Row) -> Value {
    let local = row.get(&load.local).unwrap_or(&Value::Null);
    let related: Vec<Value> = if local.is_null() {
        Vec::new()
    } else {
        tables
            .get(&load.table)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter(|r| compare(r.get(&load.remote).unwrap_or(&Value::Null), local).is_eq())
                    .map(|r| match &load.columns {
                        None => Value::Object(r.clone()),
                        Some(columns) => Value::Object(
                            columns
                                .iter()
                                .map(|c| (c.clone(), r.get(c).cloned().unwrap_or(Value::Null)))
                                .collect()
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    match load.cardinality {
        crate::Cardinality::Many => Value::Array(related),
        crate::Cardinality::One => related.into_iter().next().unwrap_or(Value::Null)
    }
}

fn check_values(entity: &EntityDescriptor, values: &Row) -> Result<Row> {
    values
        .iter()
        .map(|(column, value)| -> Result<(String, Value)> {
            let scalar = entity.scalar(column).ok_or_else(|| {
                Error::validation(column.as_str(), format!("`{}` has no such column", entity.name()))
            })?;
            Ok((column.clone(), scalar.ty.check(column, value, scalar.nullable)?))
        })
        .collect()
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert(&self, entity: &EntityDescriptor, values: Row) -> Result<Value> {
        let mut tables = self.tables.write().await;
        tables
            .entry(entity.table().to_owned())
            .or_default()
            .insert(entity, values)
    }

    async fn insert_many(&self, entity: &EntityDescriptor, rows: Vec<Row>) -> Result<Vec<Value>> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.table().to_owned()).or_default();
        let mut staged = table.clone();
        let keys = rows
            .into_iter()
            .map(|row| staged.insert(entity, row))
            .collect::<Result<Vec<_>>>()?;
        *table = staged;
        Ok(keys)
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        predicates: &[Predicate],
        values: Row
    ) -> Result<u64> {
        let values = check_values(entity, &values)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(entity.table()) else {
            return Ok(0);
        };
        let mut matched = 0;
        for row in &mut table.rows {
            if predicates.iter().all(|p| p.matches(row)) {
                matched += 1;
                for (column, value) in &values {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(matched)
    }

    async fn delete(&self, entity: &EntityDescriptor, predicates: &[Predicate]) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(entity.table()) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|row| !predicates.iter().all(|p| p.matches(row)));
        Ok((before - table.rows.len()) as u64)
    }

    async fn select(&self, plan: &SelectPlan) -> Result<Vec<Row>> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&plan.table) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| plan.predicates.iter().all(|p| p.matches(row)))
            .cloned()
            .collect();
        sort_rows(&mut rows, &plan.order);

        let offset = plan.offset.map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
        let limit = plan.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let mut rows: Vec<Row> = rows.into_iter().skip(offset).take(limit).collect();

        for row in &mut rows {
            for load in &plan.relations {
                let related = load_relation(&tables, load, row);
                row.insert(load.field.clone(), related);
            }
        }
        Ok(rows)
    }

    async fn count(&self, plan: &SelectPlan) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.get(&plan.table).map_or(0, |table| {
            table
                .rows
                .iter()
                .filter(|row| plan.predicates.iter().all(|p| p.matches(row)))
                .count() as u64
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{Cardinality, FieldDescriptor};

    fn widget() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Widget")
            .table("widgets")
            .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key().generated())
            .field(FieldDescriptor::scalar("name", ScalarType::Text))
            .field(FieldDescriptor::scalar("qty", ScalarType::Integer).default_value(json!(0)))
            .field(FieldDescriptor::scalar("note", ScalarType::Text).nullable())
            .build()
    }

    fn part() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Part")
            .table("parts")
            .field(FieldDescriptor::scalar("id", ScalarType::Uuid).primary_key().generated())
            .field(FieldDescriptor::scalar("widget_id", ScalarType::Integer))
            .field(
                FieldDescriptor::relation("widget", Cardinality::One, widget)
                    .link("widget_id", "id")
            )
            .build()
    }

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn insert_applies_defaults_and_sequence() {
        let storage = MemoryStorage::new();
        let entity = widget();
        let first = storage.insert(&entity, row(json!({"name": "a"}))).await.unwrap();
        let second = storage.insert(&entity, row(json!({"name": "b"}))).await.unwrap();
        assert_eq!((first, second), (json!(1), json!(2)));

        let rows = storage.rows("widgets").await;
        assert_eq!(rows[0], row(json!({"id": 1, "name": "a", "qty": 0, "note": null})));
    }

    #[tokio::test]
    async fn explicit_key_advances_sequence() {
        let storage = MemoryStorage::new();
        let entity = widget();
        storage
            .insert(&entity, row(json!({"id": 10, "name": "a"})))
            .await
            .unwrap();
        let next = storage.insert(&entity, row(json!({"name": "b"}))).await.unwrap();
        assert_eq!(next, json!(11));
    }

    #[tokio::test]
    async fn insert_rejects_null_and_duplicates() {
        let storage = MemoryStorage::new();
        let entity = widget();
        let err = storage.insert(&entity, row(json!({}))).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        storage
            .insert(&entity, row(json!({"id": 1, "name": "a"})))
            .await
            .unwrap();
        let err = storage
            .insert(&entity, row(json!({"id": 1, "name": "b"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn insert_many_is_atomic() {
        let storage = MemoryStorage::new();
        let entity = widget();
        let err = storage
            .insert_many(&entity, vec![row(json!({"name": "a"})), row(json!({"qty": 1}))])
            .await;
        assert!(err.is_err());
        assert!(storage.rows("widgets").await.is_empty());

        let keys = storage
            .insert_many(&entity, vec![row(json!({"name": "a"})), row(json!({"name": "b"}))])
            .await
            .unwrap();
        assert_eq!(keys, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn select_orders_nulls_first_and_pages() {
        let storage = MemoryStorage::new();
        let entity = widget();
        for note in [json!("b"), json!(null), json!("a")] {
            storage
                .insert(&entity, row(json!({"name": "w", "note": note})))
                .await
                .unwrap();
        }
        let plan = SelectPlan::new("widgets").order_by("note", SortDirection::Desc);
        let notes: Vec<_> = storage
            .select(&plan)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["note"].clone())
            .collect();
        assert_eq!(notes, vec![json!(null), json!("b"), json!("a")]);

        let page = plan.paginate(1, 1);
        let rows = storage.select(&page).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["note"], json!("b"));
        assert_eq!(storage.count(&page.count_plan()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_and_delete_report_matches() {
        let storage = MemoryStorage::new();
        let entity = widget();
        storage.insert(&entity, row(json!({"name": "a"}))).await.unwrap();
        let key = [Predicate::eq("id", ScalarType::Integer, json!(1))];
        let missing = [Predicate::eq("id", ScalarType::Integer, json!(9))];

        assert_eq!(
            storage
                .update(&entity, &key, row(json!({"qty": 4})))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            storage
                .update(&entity, &missing, row(json!({"qty": 4})))
                .await
                .unwrap(),
            0
        );
        assert!(
            storage
                .update(&entity, &key, row(json!({"qty": "x"})))
                .await
                .is_err()
        );
        assert_eq!(storage.rows("widgets").await[0]["qty"], json!(4));

        assert_eq!(storage.delete(&entity, &missing).await.unwrap(), 0);
        assert_eq!(storage.delete(&entity, &key).await.unwrap(), 1);
        assert!(storage.rows("widgets").await.is_empty());
    }

    #[tokio::test]
    async fn select_loads_relations() {
        let storage = MemoryStorage::new();
        let widget = widget();
        let part = part();
        storage.insert(&widget, row(json!({"name": "a"}))).await.unwrap();
        let key = storage
            .insert(&part, row(json!({"widget_id": 1})))
            .await
            .unwrap();
        assert!(key.as_str().is_some());

        let plan = SelectPlan::new("parts").load(RelationLoad::for_entity(&part));
        let rows = storage.select(&plan).await.unwrap();
        assert_eq!(rows[0]["widget"]["name"], json!("a"));
    }
}
