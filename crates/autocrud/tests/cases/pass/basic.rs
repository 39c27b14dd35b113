// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Columns, keys and `#[auto]` on a plain entity.

use autocrud::{Entity, ScalarType};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Entity)]
pub struct WidgetModel {
    #[id]
    #[auto]
    pub id: i64,

    pub name: String,

    pub note: Option<String>,

    #[auto]
    pub created_at: DateTime<Utc>,
}

fn main() {
    let descriptor = WidgetModel::descriptor();
    assert_eq!(descriptor.name(), "Widget");
    assert_eq!(descriptor.table(), "widgets");
    assert!(descriptor.validate().is_ok());

    let (key, id) = descriptor.primary_key().unwrap();
    assert_eq!(key, "id");
    assert_eq!(id.ty, ScalarType::Integer);
    assert!(id.generated);

    assert!(descriptor.scalar("note").unwrap().nullable);
    assert!(descriptor.scalar("created_at").unwrap().default.is_some());

    // memoized
    assert!(std::sync::Arc::ptr_eq(&descriptor, &WidgetModel::descriptor()));
}
