// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Entity-level `#[entity(...)]` attributes.

use darling::FromDeriveInput;
use syn::{Generics, Ident};

/// Raw entity attributes as darling parses them.
///
/// Everything is optional: `#[derive(Entity)]` on a bare struct derives the
/// entity name from the struct name and the table from the entity name.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(entity), supports(struct_named))]
pub struct EntityAttrs {
    /// Struct identifier.
    pub ident: Ident,

    /// Struct generics; rejected after parsing.
    pub generics: Generics,

    /// Entity name override.
    #[darling(default)]
    pub name: Option<String>,

    /// Table name override.
    #[darling(default)]
    pub table: Option<String>
}
