// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `#[field(...)]` options and `#[entity(...)]` overrides.

use autocrud::{DefaultValue, Entity, ScalarType};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct Metadata;

fn fresh_status() -> Value {
    json!("draft")
}

#[derive(Entity)]
#[entity(name = "Document", table = "docs")]
pub struct DocumentRow {
    #[id]
    #[auto]
    pub id: Uuid,

    #[field(default = 0)]
    pub views: u32,

    #[field(default = "en")]
    pub lang: String,

    #[field(default_fn = fresh_status)]
    pub status: String,

    #[field(ty = "json", nullable)]
    pub meta: Metadata,

    #[field(skip)]
    pub cache: Vec<Metadata>,

    pub r#type: String,
}

fn main() {
    let descriptor = DocumentRow::descriptor();
    assert_eq!(descriptor.name(), "Document");
    assert_eq!(descriptor.table(), "docs");

    let names: Vec<_> = descriptor.fields().iter().map(|f| f.name()).collect();
    assert_eq!(names, ["id", "views", "lang", "status", "meta", "type"]);

    let id = descriptor.scalar("id").unwrap();
    assert_eq!(id.ty, ScalarType::Uuid);
    let generated = id.default.as_ref().unwrap().produce();
    assert!(generated.as_str().and_then(|s| Uuid::parse_str(s).ok()).is_some());

    assert_eq!(
        descriptor.scalar("views").unwrap().default,
        Some(DefaultValue::Literal(json!(0)))
    );
    assert_eq!(
        descriptor.scalar("lang").unwrap().default,
        Some(DefaultValue::Literal(json!("en")))
    );
    assert_eq!(
        descriptor.scalar("status").unwrap().default.as_ref().map(DefaultValue::produce),
        Some(json!("draft"))
    );

    let meta = descriptor.scalar("meta").unwrap();
    assert_eq!(meta.ty, ScalarType::Json);
    assert!(meta.nullable);
}
