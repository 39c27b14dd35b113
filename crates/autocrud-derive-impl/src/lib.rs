// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    rustdoc::broken_intra_doc_links,
    rust_2018_idioms
)]
#![deny(unsafe_code)]

//! # Attribute Quick Reference
//!
//! ## Entity-Level `#[entity(...)]`
//!
//! ```rust,ignore
//! #[derive(Entity)]
//! #[entity(
//!     name = "Post",   // Optional: entity name (default: struct name without `Model`)
//!     table = "posts"  // Optional: storage table (default: snake_case name + "s")
//! )]
//! pub struct PostModel { /* ... */ }
//! ```
//!
//! ## Field-Level Attributes
//!
//! ```rust,ignore
//! pub struct Post {
//!     #[id]                              // Primary-key member
//!     #[auto]                            // Assigned by storage on insert
//!     pub id: i64,
//!
//!     pub title: String,                 // Required text column
//!
//!     pub subtitle: Option<String>,      // Nullable column
//!
//!     #[field(default = 0)]              // Literal default (any `json!` input)
//!     pub views: i64,
//!
//!     #[field(default_fn = autocrud::defaults::now_utc)]
//!     pub created_at: DateTime<Utc>,     // Default produced on insert
//!
//!     #[field(ty = "json")]              // Override the inferred column type
//!     pub extra: Metadata,
//!
//!     #[field(skip)]                     // Not part of the descriptor
//!     pub cache: Cache,
//!
//!     #[relation(one, local = "author_id", remote = "id")]
//!     pub author: User,                  // Embedded related record
//!
//!     #[relation(lazy)]                  // `Vec<T>` infers `many`
//!     pub tags: Vec<Tag>,                // Rendered by primary key only
//! }
//! ```
//!
//! ## Type Mapping
//!
//! | Rust type | Column type |
//! |-----------|-------------|
//! | `bool` | `Bool` |
//! | `i8`..`i64`, `u8`..`u64`, `isize`, `usize` | `Integer` |
//! | `f32`, `f64` | `Float` |
//! | `String`, `str`, `char` | `Text` |
//! | `DateTime<_>`, `NaiveDateTime`, `OffsetDateTime`, `PrimitiveDateTime`, `SystemTime` | `Timestamp` |
//! | `Uuid` | `Uuid` |
//! | `Value`, `Json<_>` | `Json` |
//! | `Option<T>` | `T`, nullable |

mod entity;

use proc_macro::TokenStream;

/// Derive an `autocrud::Entity` implementation.
///
/// Generates `impl autocrud::Entity` whose `descriptor()` returns a memoized
/// `EntityDescriptor` built from the struct's fields and attributes. See the
/// [crate documentation](crate) for the attribute reference.
///
/// # Errors
///
/// Compilation fails with a spanned diagnostic for:
///
/// - generic structs, enums, tuple and unit structs
/// - field types without a column mapping (use `#[field(ty = "...")]`)
/// - `#[id]` on a nullable or relation field
/// - `#[auto]` on anything but integer, timestamp or UUID columns
/// - conflicting relation options (`one` with `many`, `local` without
///   `remote`)
#[proc_macro_derive(Entity, attributes(entity, id, auto, field, relation))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive(input)
}
