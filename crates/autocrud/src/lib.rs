// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//! # autocrud
//!
//! One crate, all features. Re-exports:
//! - [`Entity`](macro@Entity) derive macro from `autocrud-derive-impl`
//! - All types from `autocrud-core` ([`EntityDescriptor`], [`Resource`],
//!   [`SchemaRegistry`], [`MemoryStorage`])

pub use autocrud_core::*;
pub use autocrud_derive_impl::Entity;

/// Items referenced by generated code. Not public API.
#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
