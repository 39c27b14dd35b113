// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Entity derive macro implementation.
//!
//! # Architecture
//!
//! ```text
//! entity.rs (orchestrator)
//! │
//! ├── parse/         → Attribute parsing (EntityDef, FieldDef, ColumnType)
//! │
//! └── descriptor.rs  → impl autocrud::Entity with a memoized descriptor
//! ```
//!
//! # Generated Code
//!
//! For an entity like:
//!
//! ```rust,ignore
//! #[derive(Entity)]
//! pub struct Widget {
//!     #[id]
//!     #[auto]
//!     pub id: i64,
//!     pub name: String,
//! }
//! ```
//!
//! The macro generates:
//!
//! ```rust,ignore
//! impl ::autocrud::Entity for Widget {
//!     fn descriptor() -> Arc<EntityDescriptor> {
//!         static DESCRIPTOR: OnceLock<Arc<EntityDescriptor>> = OnceLock::new();
//!         Arc::clone(DESCRIPTOR.get_or_init(|| {
//!             EntityDescriptor::builder("Widget")
//!                 .table("widgets")
//!                 .field(FieldDescriptor::scalar("id", ScalarType::Integer)
//!                     .primary_key()
//!                     .generated())
//!                 .field(FieldDescriptor::scalar("name", ScalarType::Text))
//!                 .build()
//!         }))
//!     }
//! }
//! ```

mod descriptor;
pub mod parse;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

use self::parse::EntityDef;

/// Main entry point for the Entity derive macro.
pub fn derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.write_errors().into()
    }
}

/// Parse and generate without touching the compiler-facing token type.
fn expand(input: &DeriveInput) -> darling::Result<proc_macro2::TokenStream> {
    let entity = EntityDef::from_derive_input(input)?;
    Ok(descriptor::generate(&entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_reports_errors_instead_of_panicking() {
        let input: DeriveInput = syn::parse_quote! {
            pub enum Widget { A, B }
        };
        assert!(expand(&input).is_err());
    }

    #[test]
    fn expand_produces_entity_impl() {
        let input: DeriveInput = syn::parse_quote! {
            pub struct Widget {
                #[id]
                pub id: i64,
            }
        };
        let tokens = expand(&input).unwrap().to_string();
        assert!(tokens.contains("impl :: autocrud :: Entity for Widget"));
    }
}
