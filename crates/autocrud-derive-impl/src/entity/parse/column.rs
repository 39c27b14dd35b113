// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Column types and Rust type inspection.

use darling::FromMeta;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{GenericArgument, PathArguments, Type};

/// Column type of a scalar field, mirrored by `autocrud::ScalarType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `bool`.
    Bool,

    /// Signed and unsigned integers.
    Integer,

    /// `f32` / `f64`.
    Float,

    /// Strings and characters.
    Text,

    /// Date-time types.
    Timestamp,

    /// `Uuid`.
    Uuid,

    /// Arbitrary JSON.
    Json
}

impl ColumnType {
    /// Infer the column type from the last path segment of `ty`.
    ///
    /// `&str` and other references are looked through. Returns `None` for
    /// anything without a known mapping.
    pub fn infer(ty: &Type) -> Option<Self> {
        let segment = match ty {
            Type::Reference(reference) => return Self::infer(&reference.elem),
            Type::Group(group) => return Self::infer(&group.elem),
            Type::Paren(paren) => return Self::infer(&paren.elem),
            Type::Path(path) => path.path.segments.last()?,
            _ => return None
        };
        let column = match segment.ident.to_string().as_str() {
            "bool" => Self::Bool,
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" => Self::Integer,
            "f32" | "f64" => Self::Float,
            "String" | "str" | "char" => Self::Text,
            "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime"
            | "SystemTime" => Self::Timestamp,
            "Uuid" => Self::Uuid,
            "Value" | "Json" | "JsonValue" => Self::Json,
            _ => return None
        };
        Some(column)
    }

    /// Whether `#[auto]` can apply.
    pub const fn is_generatable(&self) -> bool {
        matches!(self, Self::Integer | Self::Timestamp | Self::Uuid)
    }

    /// Default factory implied by `#[auto]`.
    ///
    /// Integers rely on storage sequences; timestamps and UUIDs get a factory
    /// so backends without column defaults still fill them.
    pub fn auto_factory(&self) -> Option<TokenStream> {
        match self {
            Self::Timestamp => Some(quote!(::autocrud::defaults::now_utc)),
            Self::Uuid => Some(quote!(::autocrud::defaults::uuid_v7)),
            _ => None
        }
    }

    /// Path of the matching `autocrud::ScalarType` variant.
    pub fn tokens(&self) -> TokenStream {
        match self {
            Self::Bool => quote!(::autocrud::ScalarType::Bool),
            Self::Integer => quote!(::autocrud::ScalarType::Integer),
            Self::Float => quote!(::autocrud::ScalarType::Float),
            Self::Text => quote!(::autocrud::ScalarType::Text),
            Self::Timestamp => quote!(::autocrud::ScalarType::Timestamp),
            Self::Uuid => quote!(::autocrud::ScalarType::Uuid),
            Self::Json => quote!(::autocrud::ScalarType::Json)
        }
    }
}

impl FromMeta for ColumnType {
    /// Parse `ty = "..."`, ignoring case.
    fn from_string(value: &str) -> darling::Result<Self> {
        match value.to_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "integer" => Ok(Self::Integer),
            "float" | "double" => Ok(Self::Float),
            "text" | "string" => Ok(Self::Text),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            "uuid" => Ok(Self::Uuid),
            "json" => Ok(Self::Json),
            _ => Err(darling::Error::unknown_value(value))
        }
    }
}

/// Single type argument of `ty` when its last segment is `wrapper`.
///
/// `unwrap_generic(Option<String>, "Option")` is `Some(String)`;
/// `std::vec::Vec<T>` matches `"Vec"` as well.
pub fn unwrap_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None
    });
    match (types.next(), types.next()) {
        (Some(inner), None) => Some(inner),
        _ => None
    }
}
