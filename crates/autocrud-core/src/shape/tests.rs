// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use std::{sync::Arc, thread};

use serde_json::{Map, Value, json};

use super::*;
use crate::{Cardinality, EntityDescriptor, FieldDescriptor, ScalarType, defaults};

fn widget() -> Arc<EntityDescriptor> {
    EntityDescriptor::builder("Widget")
        .table("widgets")
        .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key().generated())
        .field(FieldDescriptor::scalar("name", ScalarType::Text))
        .field(FieldDescriptor::scalar("qty", ScalarType::Integer).default_value(json!(0)))
        .field(FieldDescriptor::scalar("note", ScalarType::Text).nullable())
        .field(FieldDescriptor::scalar("created_at", ScalarType::Timestamp).default_fn(defaults::now_utc))
        .build()
}

fn author() -> Arc<EntityDescriptor> {
    EntityDescriptor::builder("Author")
        .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
        .field(FieldDescriptor::scalar("name", ScalarType::Text))
        .field(FieldDescriptor::relation("books", Cardinality::Many, book).link("id", "author_id"))
        .build()
}

fn book() -> Arc<EntityDescriptor> {
    EntityDescriptor::builder("Book")
        .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
        .field(FieldDescriptor::scalar("title", ScalarType::Text))
        .field(FieldDescriptor::scalar("author_id", ScalarType::Integer))
        .field(FieldDescriptor::relation("author", Cardinality::One, author).link("author_id", "id"))
        .build()
}

fn category() -> Arc<EntityDescriptor> {
    EntityDescriptor::builder("Category")
        .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
        .field(FieldDescriptor::scalar("parent_id", ScalarType::Integer).nullable())
        .field(
            FieldDescriptor::relation("parent", Cardinality::One, category)
                .link("parent_id", "id")
        )
        .build()
}

fn names(shape: &Shape) -> Vec<&str> {
    shape.fields().iter().map(|f| f.name.as_str()).collect()
}

#[test]
fn identity_is_stable() {
    let registry = SchemaRegistry::default();
    let entity = widget();
    let first = registry.synthesize(&entity, &ShapeArgs::list()).unwrap();
    let second = registry.synthesize(&entity, &ShapeArgs::list()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "WidgetSchemaList");
}

#[test]
fn conflicting_args_reuse_published_shape() {
    let registry = SchemaRegistry::default();
    let entity = widget();
    let first = registry.synthesize(&entity, &ShapeArgs::list()).unwrap();
    let other = ShapeArgs::list().exclude("name");
    let second = registry.synthesize(&entity, &other).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.field("name").is_some());
}

#[test]
fn create_shape_excludes_server_assigned() {
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&widget(), &ShapeArgs::post()).unwrap();
    assert_eq!(names(&shape), ["name", "qty", "note"]);
    assert_eq!(shape.field("name").unwrap().presence, Presence::Required);
    assert_eq!(
        shape.field("qty").unwrap().presence,
        Presence::Default(DefaultValue::Literal(json!(0)))
    );
    assert_eq!(
        shape.field("note").unwrap().presence,
        Presence::Default(DefaultValue::Literal(Value::Null))
    );
}

#[test]
fn defaults_override_field_default() {
    let registry = SchemaRegistry::default();
    let args = ShapeArgs::post().with_default("qty", json!(5));
    let shape = registry.synthesize(&widget(), &args).unwrap();
    let payload = shape.decode(json!({"name": "a"})).unwrap();
    assert_eq!(payload.get("qty"), Some(&json!(5)));
}

#[test]
fn update_shape_is_all_optional_without_key() {
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&widget(), &ShapeArgs::put()).unwrap();
    assert!(shape.field("id").is_none());
    assert!(shape.fields().iter().all(|f| f.presence == Presence::Optional));

    let payload = shape.decode(json!({"qty": 3})).unwrap();
    assert_eq!(payload.values().len(), 1);
    assert!(!payload.is_set("name"));
}

#[test]
fn list_shape_skips_relations() {
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&author(), &ShapeArgs::list()).unwrap();
    assert!(shape.field("books").is_none());
}

#[test]
fn detail_shape_embeds_one_hop() {
    let registry = SchemaRegistry::default();
    let author_detail = registry.synthesize(&author(), &ShapeArgs::detail()).unwrap();
    let books = author_detail.field("books").unwrap();
    let FieldType::NestedList(child) = &books.ty else {
        panic!("expected nested list, got {:?}", books.ty);
    };
    assert_eq!(child.name(), "BookSchemaList");
    assert!(child.field("author").is_none());
    assert_eq!(books.presence, Presence::Default(DefaultValue::Literal(json!([]))));

    let cached = registry.get(&ShapeId::new("Book", "List")).unwrap();
    assert!(Arc::ptr_eq(child, &cached));
}

#[test]
fn included_relation_past_depth_becomes_reference() {
    let registry = SchemaRegistry::default();
    let args = ShapeArgs::list().include("books");
    let shape = registry.synthesize(&author(), &args).unwrap();
    assert!(matches!(shape.field("books").unwrap().ty, FieldType::NestedList(_)));

    let deep = SchemaRegistry::new(SynthesisConfig {
        max_depth:    0,
        cycle_policy: CyclePolicy::Reference
    });
    let shape = deep.synthesize(&author(), &args).unwrap();
    let FieldType::ReferenceList(reference) = &shape.field("books").unwrap().ty else {
        panic!("expected reference list");
    };
    assert_eq!(reference.target, "Book");
}

#[test]
fn lazy_relation_is_reference() {
    fn owner() -> Arc<EntityDescriptor> {
        EntityDescriptor::builder("Owner")
            .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
            .field(FieldDescriptor::scalar("author_id", ScalarType::Integer))
            .field(
                FieldDescriptor::relation("author", Cardinality::One, author)
                    .lazy()
                    .link("author_id", "id")
            )
            .build()
    }
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&owner(), &ShapeArgs::detail()).unwrap();
    assert!(matches!(shape.field("author").unwrap().ty, FieldType::Reference(_)));

    let mut row = Map::new();
    row.insert("id".into(), json!(1));
    row.insert("author_id".into(), json!(9));
    let projected = shape.project(&row).unwrap();
    assert_eq!(projected["author"], json!(9));
}

#[test]
fn self_cycle_degrades_to_reference() {
    let registry = SchemaRegistry::new(SynthesisConfig {
        max_depth:    4,
        cycle_policy: CyclePolicy::Reference
    });
    let shape = registry.synthesize(&category(), &ShapeArgs::detail()).unwrap();
    let FieldType::Reference(reference) = &shape.field("parent").unwrap().ty else {
        panic!("expected reference");
    };
    assert_eq!(reference.keys, vec![("id".to_owned(), ScalarType::Integer)]);
}

#[test]
fn self_cycle_rejected_by_policy() {
    let registry = SchemaRegistry::new(SynthesisConfig {
        max_depth:    4,
        cycle_policy: CyclePolicy::Reject
    });
    let err = registry
        .synthesize(&category(), &ShapeArgs::detail())
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(registry.get(&ShapeId::new("Category", "Detail")).is_none());
}

#[test]
fn mutual_cycle_terminates_at_depth() {
    let registry = SchemaRegistry::new(SynthesisConfig {
        max_depth:    8,
        cycle_policy: CyclePolicy::Reference
    });
    let shape = registry.synthesize(&author(), &ShapeArgs::detail()).unwrap();
    let FieldType::NestedList(books) = &shape.field("books").unwrap().ty else {
        panic!("expected nested list");
    };
    assert!(matches!(books.field("author").unwrap().ty, FieldType::Reference(_)));
}

#[test]
fn concurrent_synthesis_publishes_one_shape() {
    let registry = SchemaRegistry::default();
    let entity = widget();
    let shapes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.synthesize(&entity, &ShapeArgs::detail()).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(shapes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn id_echo_names() {
    let registry = SchemaRegistry::default();
    assert_eq!(registry.id_echo(ScalarType::Integer).name(), "IntegerIdSchema");
    assert_eq!(registry.id_echo(ScalarType::Uuid).name(), "UuidIdSchema");
    assert!(Arc::ptr_eq(
        &registry.id_echo(ScalarType::Uuid),
        &registry.id_echo(ScalarType::Uuid)
    ));
}

#[test]
fn decode_rejects_missing_and_mistyped() {
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&widget(), &ShapeArgs::post()).unwrap();
    assert!(matches!(
        shape.decode(json!({})).unwrap_err(),
        Error::Validation { ref field, .. } if field == "name"
    ));
    assert!(shape.decode(json!({"name": 1})).is_err());
    assert!(shape.decode(json!({"name": null})).is_err());
    assert!(shape.decode(json!([1])).is_err());
}

#[test]
fn decode_ignores_unknown_keys() {
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&widget(), &ShapeArgs::post()).unwrap();
    let payload = shape.decode(json!({"name": "a", "bogus": true})).unwrap();
    assert!(!payload.is_set("bogus"));
    assert_eq!(payload.shape(), shape.id());
}

#[test]
fn project_nested_rows() {
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&author(), &ShapeArgs::detail()).unwrap();
    let row: Row = serde_json::from_value(json!({
        "id": 1,
        "name": "Ann",
        "books": [{"id": 2, "title": "B", "author_id": 1, "extra": true}]
    }))
    .unwrap();
    let projected = shape.project(&row).unwrap();
    assert_eq!(
        projected,
        json!({"id": 1, "name": "Ann", "books": [{"id": 2, "title": "B", "author_id": 1}]})
    );
}

#[test]
fn project_missing_relation_defaults() {
    let registry = SchemaRegistry::default();
    let shape = registry.synthesize(&author(), &ShapeArgs::detail()).unwrap();
    let row: Row = serde_json::from_value(json!({"id": 1, "name": "Ann"})).unwrap();
    assert_eq!(shape.project(&row).unwrap()["books"], json!([]));
}
