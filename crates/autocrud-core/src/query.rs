// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Backend-neutral query plans and their PostgreSQL rendering.
//!
//! Repositories describe reads as a [`SelectPlan`]: equality predicates,
//! ordering, limit/offset and one-hop relation loads. Storage backends either
//! evaluate the plan directly ([`MemoryStorage`](crate::MemoryStorage)) or
//! render it to SQL ([`SelectPlan::to_sql`]).
//!
//! # SQL rendering
//!
//! Rows are returned as a single `jsonb` column so every backend hands the
//! engine the same [`Row`](crate::Row) form:
//!
//! ```sql
//! SELECT to_jsonb(t)
//!     || jsonb_build_object('books', (SELECT COALESCE(jsonb_agg(to_jsonb(r)), '[]'::jsonb)
//!                                     FROM "books" r WHERE r."author_id" = t."id")) AS row
//! FROM "authors" t
//! WHERE t."name" = $1::text
//! ORDER BY t."id" ASC
//! LIMIT 10 OFFSET 0
//! ```

use std::fmt::Write as _;

use serde_json::{Map, Value};

use crate::{
    Cardinality, EntityDescriptor, Error, Result, ScalarType, SortDirection, value::compare
};

/// Equality predicate. A `null` value means `IS NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Column name.
    pub column: String,

    /// Column type.
    pub ty: ScalarType,

    /// Value to match.
    pub value: Value
}

impl Predicate {
    /// `column = value`.
    pub fn eq(column: impl Into<String>, ty: ScalarType, value: Value) -> Self {
        Self {
            column: column.into(),
            ty,
            value
        }
    }

    /// Whether `row` satisfies the predicate.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        let actual = row.get(&self.column).unwrap_or(&Value::Null);
        compare(actual, &self.value).is_eq()
    }
}

/// Ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column name.
    pub column: String,

    /// Direction.
    pub direction: SortDirection
}

/// One-hop relation to load alongside each selected row.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationLoad {
    /// Field of the owning row receiving the related data.
    pub field: String,

    /// Target table.
    pub table: String,

    /// Owning-side column.
    pub local: String,

    /// Target-side column.
    pub remote: String,

    /// One object or a list.
    pub cardinality: Cardinality,

    /// Columns to load; `None` loads whole rows.
    pub columns: Option<Vec<String>>
}

impl RelationLoad {
    /// Loads for every linked relation of `entity`.
    ///
    /// By-reference relations load only the target's primary-key columns.
    pub fn for_entity(entity: &EntityDescriptor) -> Vec<Self> {
        entity
            .relation_fields()
            .filter_map(|(name, relation)| {
                let link = relation.link.as_ref()?;
                let target = relation.target();
                let columns = relation
                    .lazy
                    .then(|| target.primary_keys().map(|(key, _)| key.to_owned()).collect());
                Some(Self {
                    field: name.to_owned(),
                    table: target.table().to_owned(),
                    local: link.local.clone(),
                    remote: link.remote.clone(),
                    cardinality: relation.cardinality,
                    columns
                })
            })
            .collect()
    }
}

/// Read plan over one table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectPlan {
    /// Table name.
    pub table: String,

    /// Conjunction of equality predicates.
    pub predicates: Vec<Predicate>,

    /// Ordering keys, most significant first.
    pub order: Vec<Order>,

    /// Maximum number of rows.
    pub limit: Option<u64>,

    /// Rows to skip.
    pub offset: Option<u64>,

    /// Relations to load per row.
    pub relations: Vec<RelationLoad>
}

impl SelectPlan {
    /// Unfiltered plan over `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Add a predicate.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add an ordering key.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction
        });
        self
    }

    /// Limit and offset.
    #[must_use]
    pub const fn paginate(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Load relations with each row.
    #[must_use]
    pub fn load(mut self, relations: Vec<RelationLoad>) -> Self {
        self.relations = relations;
        self
    }

    /// The same predicates with ordering, pagination and relation loads
    /// stripped.
    pub fn count_plan(&self) -> Self {
        Self {
            table: self.table.clone(),
            predicates: self.predicates.clone(),
            ..Self::default()
        }
    }

    /// Render the plan as a PostgreSQL query yielding one `jsonb` column.
    pub fn to_sql(&self) -> Sql {
        let mut sql = Sql::default();
        sql.text.push_str("SELECT to_jsonb(t)");
        if !self.relations.is_empty() {
            sql.text.push_str(" || jsonb_build_object(");
            for (i, load) in self.relations.iter().enumerate() {
                if i > 0 {
                    sql.text.push_str(", ");
                }
                let _ = write!(sql.text, "{}, {}", literal(&load.field), relation_subquery(load));
            }
            sql.text.push(')');
        }
        let _ = write!(sql.text, " AS row FROM {} t", ident(&self.table));
        sql.push_where(&self.predicates);
        if !self.order.is_empty() {
            sql.text.push_str(" ORDER BY ");
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("t.{} {} NULLS FIRST", ident(&o.column), o.direction.as_sql()))
                .collect();
            sql.text.push_str(&keys.join(", "));
        }
        if let Some(limit) = self.limit {
            let _ = write!(sql.text, " LIMIT {limit}");
        }
        if let Some(offset) = self.offset {
            let _ = write!(sql.text, " OFFSET {offset}");
        }
        sql
    }

    /// Render the count query of this plan.
    pub fn to_count_sql(&self) -> Sql {
        let mut sql = Sql::default();
        let _ = write!(sql.text, "SELECT COUNT(*) FROM {} t", ident(&self.table));
        sql.push_where(&self.predicates);
        sql
    }
}

fn relation_subquery(load: &RelationLoad) -> String {
    let object = match &load.columns {
        None => "to_jsonb(r)".to_owned(),
        Some(columns) => {
            let pairs: Vec<String> = columns
                .iter()
                .map(|c| format!("{}, r.{}", literal(c), ident(c)))
                .collect();
            format!("jsonb_build_object({})", pairs.join(", "))
        }
    };
    let from = format!(
        "FROM {} r WHERE r.{} = t.{}",
        ident(&load.table),
        ident(&load.remote),
        ident(&load.local)
    );
    match load.cardinality {
        Cardinality::Many => {
            format!("(SELECT COALESCE(jsonb_agg({object}), '[]'::jsonb) {from})")
        }
        Cardinality::One => format!("(SELECT {object} {from} LIMIT 1)")
    }
}

/// SQL text with positional bind values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sql {
    /// Statement text using `$n` placeholders.
    pub text: String,

    /// Values for the placeholders with their column types, in order.
    pub binds: Vec<(Value, ScalarType)>
}

impl Sql {
    fn bind(&mut self, value: Value, ty: ScalarType) -> String {
        self.binds.push((value, ty));
        format!("${}::{}", self.binds.len(), pg_type(ty))
    }

    fn push_where(&mut self, predicates: &[Predicate]) {
        for (i, predicate) in predicates.iter().enumerate() {
            self.text.push_str(if i == 0 { " WHERE " } else { " AND " });
            let column = format!("t.{}", ident(&predicate.column));
            if predicate.value.is_null() {
                let _ = write!(self.text, "{column} IS NULL");
            } else {
                let placeholder = self.bind(predicate.value.clone(), predicate.ty);
                let _ = write!(self.text, "{column} = {placeholder}");
            }
        }
    }
}

/// `INSERT ... RETURNING to_jsonb(t)` for one row.
///
/// # Errors
///
/// [`Error::Validation`] when `values` names a column the entity lacks.
pub fn insert_sql(entity: &EntityDescriptor, values: &Map<String, Value>) -> Result<Sql> {
    let mut sql = Sql::default();
    let table = ident(entity.table());
    if values.is_empty() {
        sql.text = format!("INSERT INTO {table} AS t DEFAULT VALUES RETURNING to_jsonb(t)");
        return Ok(sql);
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (column, value) in values {
        let ty = column_type(entity, column)?;
        columns.push(ident(column));
        placeholders.push(sql.bind(value.clone(), ty));
    }
    sql.text = format!(
        "INSERT INTO {table} AS t ({}) VALUES ({}) RETURNING to_jsonb(t)",
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(sql)
}

/// `UPDATE ... SET ... WHERE ...`.
///
/// # Errors
///
/// [`Error::Validation`] when `values` names a column the entity lacks.
pub fn update_sql(
    entity: &EntityDescriptor,
    predicates: &[Predicate],
    values: &Map<String, Value>
) -> Result<Sql> {
    let mut sql = Sql::default();
    let mut assignments = Vec::with_capacity(values.len());
    for (column, value) in values {
        let ty = column_type(entity, column)?;
        let placeholder = sql.bind(value.clone(), ty);
        assignments.push(format!("{} = {placeholder}", ident(column)));
    }
    sql.text = format!(
        "UPDATE {} AS t SET {}",
        ident(entity.table()),
        assignments.join(", ")
    );
    sql.push_where(predicates);
    Ok(sql)
}

/// `DELETE ... WHERE ...`.
pub fn delete_sql(entity: &EntityDescriptor, predicates: &[Predicate]) -> Sql {
    let mut sql = Sql {
        text:  format!("DELETE FROM {} AS t", ident(entity.table())),
        binds: Vec::new()
    };
    sql.push_where(predicates);
    sql
}

fn column_type(entity: &EntityDescriptor, column: &str) -> Result<ScalarType> {
    entity
        .scalar(column)
        .map(|s| s.ty)
        .ok_or_else(|| Error::validation(column, format!("`{}` has no such column", entity.name())))
}

/// PostgreSQL type used to cast binds of `ty`.
pub const fn pg_type(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::Bool => "boolean",
        ScalarType::Integer => "bigint",
        ScalarType::Float => "double precision",
        ScalarType::Text => "text",
        ScalarType::Timestamp => "timestamptz",
        ScalarType::Uuid => "uuid",
        ScalarType::Json => "jsonb"
    }
}

/// Quote an identifier.
pub fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::FieldDescriptor;

    fn author() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Author")
            .table("authors")
            .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
            .field(FieldDescriptor::scalar("name", ScalarType::Text))
            .field(FieldDescriptor::relation("books", Cardinality::Many, book).link("id", "author_id"))
            .build()
    }

    fn book() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Book")
            .table("books")
            .field(FieldDescriptor::scalar("id", ScalarType::Uuid).primary_key())
            .field(FieldDescriptor::scalar("author_id", ScalarType::Integer))
            .field(
                FieldDescriptor::relation("author", Cardinality::One, author)
                    .lazy()
                    .link("author_id", "id")
            )
            .build()
    }

    #[test]
    fn select_with_filters_order_and_page() {
        let plan = SelectPlan::new("widgets")
            .filter(Predicate::eq("name", ScalarType::Text, json!("a")))
            .filter(Predicate::eq("note", ScalarType::Text, Value::Null))
            .order_by("id", SortDirection::Desc)
            .paginate(10, 20);
        let sql = plan.to_sql();
        assert_eq!(
            sql.text,
            "SELECT to_jsonb(t) AS row FROM \"widgets\" t WHERE t.\"name\" = $1::text AND \
             t.\"note\" IS NULL ORDER BY t.\"id\" DESC NULLS FIRST LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql.binds, vec![(json!("a"), ScalarType::Text)]);
    }

    #[test]
    fn count_plan_strips_ordering() {
        let plan = SelectPlan::new("widgets")
            .filter(Predicate::eq("qty", ScalarType::Integer, json!(3)))
            .order_by("id", SortDirection::Asc)
            .paginate(10, 0)
            .load(RelationLoad::for_entity(&author()));
        let count = plan.count_plan();
        assert!(count.order.is_empty());
        assert!(count.relations.is_empty());
        assert_eq!(count.limit, None);
        assert_eq!(
            count.to_count_sql().text,
            "SELECT COUNT(*) FROM \"widgets\" t WHERE t.\"qty\" = $1::bigint"
        );
    }

    #[test]
    fn relation_loads_render_subqueries() {
        let plan = SelectPlan::new("authors").load(RelationLoad::for_entity(&author()));
        assert_eq!(
            plan.to_sql().text,
            "SELECT to_jsonb(t) || jsonb_build_object('books', (SELECT \
             COALESCE(jsonb_agg(to_jsonb(r)), '[]'::jsonb) FROM \"books\" r WHERE \
             r.\"author_id\" = t.\"id\")) AS row FROM \"authors\" t"
        );

        let plan = SelectPlan::new("books").load(RelationLoad::for_entity(&book()));
        assert_eq!(
            plan.to_sql().text,
            "SELECT to_jsonb(t) || jsonb_build_object('author', (SELECT \
             jsonb_build_object('id', r.\"id\") FROM \"authors\" r WHERE r.\"id\" = \
             t.\"author_id\" LIMIT 1)) AS row FROM \"books\" t"
        );
    }

    #[test]
    fn insert_update_delete() {
        let entity = author();
        let mut values = Map::new();
        values.insert("name".into(), json!("Ann"));
        let insert = insert_sql(&entity, &values).unwrap();
        assert_eq!(
            insert.text,
            "INSERT INTO \"authors\" AS t (\"name\") VALUES ($1::text) RETURNING to_jsonb(t)"
        );

        let key = [Predicate::eq("id", ScalarType::Integer, json!(1))];
        let update = update_sql(&entity, &key, &values).unwrap();
        assert_eq!(
            update.text,
            "UPDATE \"authors\" AS t SET \"name\" = $1::text WHERE t.\"id\" = $2::bigint"
        );
        assert_eq!(
            update.binds,
            vec![(json!("Ann"), ScalarType::Text), (json!(1), ScalarType::Integer)]
        );

        assert_eq!(
            delete_sql(&entity, &key).text,
            "DELETE FROM \"authors\" AS t WHERE t.\"id\" = $1::bigint"
        );

        values.insert("books".into(), json!([]));
        assert!(insert_sql(&entity, &values).is_err());
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(literal("it's"), "'it''s'");
    }

    #[test]
    fn predicate_matches_rows() {
        let row: Map<String, Value> = serde_json::from_value(json!({"a": 1, "b": null})).unwrap();
        assert!(Predicate::eq("a", ScalarType::Integer, json!(1)).matches(&row));
        assert!(Predicate::eq("b", ScalarType::Text, Value::Null).matches(&row));
        assert!(Predicate::eq("c", ScalarType::Text, Value::Null).matches(&row));
        assert!(!Predicate::eq("a", ScalarType::Integer, json!(2)).matches(&row));
    }
}
