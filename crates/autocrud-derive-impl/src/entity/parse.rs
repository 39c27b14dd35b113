// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Parsing of `#[derive(Entity)]` input.
//!
//! ```text
//! DeriveInput
//!     │
//!     ├── #[entity(name, table)] ──► EntityAttrs (darling)
//!     │
//!     └── fields ──► FieldDef::from_field
//!                       ├── #[id] / #[auto]
//!                       ├── #[field(...)]    ──► FieldOptions
//!                       ├── #[relation(...)] ──► RelationOptions
//!                       └── type inference   ──► ColumnType
//! ```

mod attrs;
mod column;
mod field;

use convert_case::{Case, Casing};
use darling::FromDeriveInput;
use syn::{DeriveInput, Ident};

pub use self::{
    column::ColumnType,
    field::{DefaultDef, FieldDef, FieldKind, RelationDef, ScalarDef}
};
use self::attrs::EntityAttrs;

/// Complete parsed entity definition.
#[derive(Debug)]
pub struct EntityDef {
    /// Struct identifier.
    pub ident: Ident,

    /// Entity name used in shape identities and logs.
    pub name: String,

    /// Storage table name.
    pub table: String,

    /// Descriptor fields in declaration order; skipped fields are absent.
    pub fields: Vec<FieldDef>
}

impl EntityDef {
    /// Parse a derive input.
    ///
    /// Errors from every field are collected before returning, so one
    /// compilation reports all of them.
    ///
    /// # Errors
    ///
    /// Non-struct or generic input, and any field error.
    pub fn from_derive_input(input: &DeriveInput) -> darling::Result<Self> {
        let attrs = EntityAttrs::from_derive_input(input)?;
        let mut errors = darling::Error::accumulator();

        if !attrs.generics.params.is_empty() {
            errors.push(
                darling::Error::custom("generic entities are not supported")
                    .with_span(&attrs.generics)
            );
        }

        let fields = match &input.data {
            syn::Data::Struct(data) => data
                .fields
                .iter()
                .filter_map(|field| errors.handle(FieldDef::from_field(field)).flatten())
                .collect(),
            _ => Vec::new()
        };

        let name = attrs
            .name
            .clone()
            .unwrap_or_else(|| default_name(&attrs.ident.to_string()));
        let table = attrs.table.clone().unwrap_or_else(|| default_table(&name));

        errors.finish_with(Self {
            ident: attrs.ident,
            name,
            table,
            fields
        })
    }
}

/// Struct name without a trailing `Model`.
pub fn default_name(ident: &str) -> String {
    match ident.strip_suffix("Model") {
        Some(stripped) if !stripped.is_empty() => stripped.to_owned(),
        _ => ident.to_owned()
    }
}

/// `snake_case` plural of the entity name.
pub fn default_table(name: &str) -> String {
    format!("{}s", name.to_case(Case::Snake))
}
