// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Per-operation synthesis arguments.
//!
//! [`ShapeArgs`] controls how one shape variant is derived from an entity.
//! [`ArgumentsConfig`] bundles one set per CRUD operation, starting from the
//! presets below.
//!
//! | op | postfix | nested | put | excluded |
//! |----|---------|--------|-----|----------|
//! | list | `List` | no | no | none |
//! | detail | `Detail` | yes | no | none |
//! | post | `InCreate` | no | no | `id`, `created_at`, `updated_at` |
//! | put | `InUpdate` | no | yes | `id`, `created_at`, `updated_at` |
//!
//! # Loading from configuration
//!
//! `ArgumentsConfig` deserializes with serde. Every operation section is
//! optional and every key inside a section overrides only itself, so the
//! server-assigned exclusions of `post`/`put` survive unless `excluded` is
//! given explicitly.
//!
//! ```rust
//! use autocrud_core::ArgumentsConfig;
//!
//! let cfg: ArgumentsConfig =
//!     serde_json::from_str(r#"{"post": {"defaults": {"qty": 1}}}"#).unwrap();
//! assert!(cfg.post.excluded.contains("id"));
//! assert_eq!(cfg.post.defaults["qty"], 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Fields assigned by the server and therefore excluded from write shapes.
pub const SERVER_ASSIGNED: [&str; 3] = ["id", "created_at", "updated_at"];

/// Arguments for synthesizing one shape variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeArgs {
    /// Per-field default overrides.
    pub defaults: BTreeMap<String, Value>,

    /// Fields left out of the shape.
    pub excluded: BTreeSet<String>,

    /// Relation fields kept even when `nested` is off.
    pub included: BTreeSet<String>,

    /// Embed relations.
    pub nested: bool,

    /// Variant postfix of the shape identity.
    pub name_postfix: String,

    /// Partial-update mode: no primary keys, every field optional.
    pub put: bool
}

impl ShapeArgs {
    /// List preset.
    pub fn list() -> Self {
        Self {
            name_postfix: "List".into(),
            ..Self::default()
        }
    }

    /// Detail preset.
    pub fn detail() -> Self {
        Self {
            nested: true,
            name_postfix: "Detail".into(),
            ..Self::default()
        }
    }

    /// Create preset.
    pub fn post() -> Self {
        Self {
            excluded: server_assigned(),
            name_postfix: "InCreate".into(),
            ..Self::default()
        }
    }

    /// Update preset.
    pub fn put() -> Self {
        Self {
            excluded: server_assigned(),
            name_postfix: "InUpdate".into(),
            put: true,
            ..Self::default()
        }
    }

    /// Replace the postfix.
    #[must_use]
    pub fn with_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.name_postfix = postfix.into();
        self
    }

    /// Override the default of one field.
    #[must_use]
    pub fn with_default(mut self, field: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    /// Exclude one more field.
    #[must_use]
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.excluded.insert(field.into());
        self
    }

    /// Keep a relation field even without `nested`.
    #[must_use]
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.included.insert(field.into());
        self
    }

    fn merge(mut self, patch: ShapeArgsPatch) -> Self {
        if let Some(defaults) = patch.defaults {
            self.defaults = defaults;
        }
        if let Some(excluded) = patch.excluded {
            self.excluded = excluded;
        }
        if let Some(included) = patch.included {
            self.included = included;
        }
        if let Some(nested) = patch.nested {
            self.nested = nested;
        }
        if let Some(postfix) = patch.name_postfix {
            self.name_postfix = postfix;
        }
        if let Some(put) = patch.put {
            self.put = put;
        }
        self
    }
}

fn server_assigned() -> BTreeSet<String> {
    SERVER_ASSIGNED.iter().map(|s| (*s).to_owned()).collect()
}

/// One [`ShapeArgs`] per CRUD operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentsConfig {
    /// List shape arguments.
    pub list: ShapeArgs,

    /// Detail shape arguments.
    pub detail: ShapeArgs,

    /// Create shape arguments.
    pub post: ShapeArgs,

    /// Update shape arguments.
    pub put: ShapeArgs
}

impl Default for ArgumentsConfig {
    fn default() -> Self {
        Self {
            list:   ShapeArgs::list(),
            detail: ShapeArgs::detail(),
            post:   ShapeArgs::post(),
            put:    ShapeArgs::put()
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ShapeArgsPatch {
    defaults:     Option<BTreeMap<String, Value>>,
    excluded:     Option<BTreeSet<String>>,
    included:     Option<BTreeSet<String>>,
    nested:       Option<bool>,
    name_postfix: Option<String>,
    put:          Option<bool>
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ArgumentsPatch {
    #[serde(default)]
    list:   Option<ShapeArgsPatch>,
    #[serde(default)]
    detail: Option<ShapeArgsPatch>,
    #[serde(default)]
    post:   Option<ShapeArgsPatch>,
    #[serde(default)]
    put:    Option<ShapeArgsPatch>
}

impl<'de> Deserialize<'de> for ArgumentsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let patch = ArgumentsPatch::deserialize(deserializer)?;
        Ok(Self {
            list:   ShapeArgs::list().merge(patch.list.unwrap_or_default()),
            detail: ShapeArgs::detail().merge(patch.detail.unwrap_or_default()),
            post:   ShapeArgs::post().merge(patch.post.unwrap_or_default()),
            put:    ShapeArgs::put().merge(patch.put.unwrap_or_default())
        })
    }
}
