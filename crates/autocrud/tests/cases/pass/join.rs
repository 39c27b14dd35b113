// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Composite keys for association entities.

use autocrud::Entity;

#[derive(Entity)]
#[entity(table = "widget_tag")]
pub struct WidgetTag {
    #[id]
    pub widget_id: i64,
    #[id]
    pub tag_id: i64,
}

fn main() {
    let descriptor = WidgetTag::descriptor();
    let keys: Vec<_> = descriptor.primary_keys().map(|(name, _)| name).collect();
    assert_eq!(keys, ["widget_id", "tag_id"]);
    assert_eq!(descriptor.table(), "widget_tag");
}
