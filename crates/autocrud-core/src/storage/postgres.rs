// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! PostgreSQL backend on sqlx.
//!
//! Plans are rendered by [`crate::query`]; this module only binds values and
//! runs the statements. Rows come back as one `jsonb` column.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, types::Json};

use super::{Row, Storage, key_of};
use crate::{
    EntityDescriptor, Error, Result, ScalarType,
    query::{Predicate, SelectPlan, Sql, delete_sql, insert_sql, update_sql}
};

/// Bind `(value, type)` pairs onto a sqlx query in placeholder order.
macro_rules! bind_values {
    ($query:expr, $binds:expr) => {{
        let mut query = $query;
        for (value, ty) in $binds {
            query = match (value, ty) {
                (Value::Null, _) => query.bind(None::<String>),
                (value, ScalarType::Json) => query.bind(Json(value.clone())),
                (Value::Bool(b), _) => query.bind(*b),
                (Value::Number(n), _) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => query.bind(n.as_f64())
                },
                (Value::String(s), _) => query.bind(s.clone()),
                (other, _) => query.bind(Json(other.clone()))
            };
        }
        query
    }};
}

/// Storage over a sqlx PostgreSQL pool.
///
/// Cloning is cheap; every clone shares the pool.
///
/// # Example
///
/// ```rust,ignore
/// let storage = Arc::new(PgStorage::connect("postgres://localhost/app").await?);
/// let routes = Resource::new("/widgets", Widget::descriptor())
///     .session(storage)
///     .build(&registry)?;
/// ```
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool
}

impl PgStorage {
    /// Wrap an existing pool.
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool
        }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] when the connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(PgPool::connect(url).await?))
    }

    /// Underlying pool.
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_row<'e, E>(executor: E, entity: &EntityDescriptor, values: &Row) -> Result<Value>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>
    {
        let sql = insert_sql(entity, values)?;
        tracing::trace!(sql = %sql.text, "insert");
        let Json(row) = bind_values!(sqlx::query_scalar::<_, Json<Value>>(&sql.text), &sql.binds)
            .fetch_one(executor)
            .await?;
        Ok(key_of(entity, &into_row(row)?))
    }

    async fn execute(&self, sql: Sql) -> Result<u64> {
        tracing::trace!(sql = %sql.text, "execute");
        let result = bind_values!(sqlx::query(&sql.text), &sql.binds)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn into_row(value: Value) -> Result<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(Error::storage(format!("expected a row object, got {other}")))
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn insert(&self, entity: &EntityDescriptor, values: Row) -> Result<Value> {
        Self::insert_row(&self.pool, entity, &values).await
    }

    async fn insert_many(&self, entity: &EntityDescriptor, rows: Vec<Row>) -> Result<Vec<Value>> {
        let mut tx = self.pool.begin().await?;
        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            keys.push(Self::insert_row(&mut *tx, entity, row).await?);
        }
        tx.commit().await?;
        Ok(keys)
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        predicates: &[Predicate],
        values: Row
    ) -> Result<u64> {
        if values.is_empty() {
            let mut plan = SelectPlan::new(entity.table());
            plan.predicates = predicates.to_vec();
            return self.count(&plan).await;
        }
        self.execute(update_sql(entity, predicates, &values)?).await
    }

    async fn delete(&self, entity: &EntityDescriptor, predicates: &[Predicate]) -> Result<u64> {
        self.execute(delete_sql(entity, predicates)).await
    }

    async fn select(&self, plan: &SelectPlan) -> Result<Vec<Row>> {
        let sql = plan.to_sql();
        tracing::trace!(sql = %sql.text, "select");
        let rows = bind_values!(sqlx::query_scalar::<_, Json<Value>>(&sql.text), &sql.binds)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|Json(row)| into_row(row)).collect()
    }

    async fn count(&self, plan: &SelectPlan) -> Result<u64> {
        let sql = plan.to_count_sql();
        tracing::trace!(sql = %sql.text, "count");
        let count: i64 = bind_values!(sqlx::query_scalar::<_, i64>(&sql.text), &sql.binds)
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(Error::storage)
    }
}
