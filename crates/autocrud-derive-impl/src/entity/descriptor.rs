// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `impl autocrud::Entity` generation.
//!
//! The descriptor is built once per type and cached in a function-local
//! `OnceLock`. Relation targets are emitted as `<T as Entity>::descriptor`
//! function pointers, so self-referencing and mutually referencing entities
//! never recurse while building.

use proc_macro2::TokenStream;
use quote::quote;
use syn::LitStr;

use super::parse::{DefaultDef, EntityDef, FieldDef, FieldKind, RelationDef, ScalarDef};

/// Generate the `Entity` impl.
pub fn generate(entity: &EntityDef) -> TokenStream {
    let ident = &entity.ident;
    let name = &entity.name;
    let table = &entity.table;
    let fields = entity.fields.iter().map(field);

    quote! {
        impl ::autocrud::Entity for #ident {
            fn descriptor() -> ::std::sync::Arc<::autocrud::EntityDescriptor> {
                static DESCRIPTOR: ::std::sync::OnceLock<
                    ::std::sync::Arc<::autocrud::EntityDescriptor>
                > = ::std::sync::OnceLock::new();

                ::std::sync::Arc::clone(DESCRIPTOR.get_or_init(|| {
                    ::autocrud::EntityDescriptor::builder(#name)
                        .table(#table)
                        #(.field(#fields))*
                        .build()
                }))
            }
        }
    }
}

fn field(field: &FieldDef) -> TokenStream {
    let name = LitStr::new(&field.name, field.ident.span());
    match &field.kind {
        FieldKind::Scalar(scalar) => scalar_field(&name, scalar),
        FieldKind::Relation(relation) => relation_field(&name, relation)
    }
}

fn scalar_field(name: &LitStr, scalar: &ScalarDef) -> TokenStream {
    let ty = scalar.ty.tokens();
    let mut tokens = quote!(::autocrud::FieldDescriptor::scalar(#name, #ty));
    if scalar.nullable {
        tokens.extend(quote!(.nullable()));
    }
    if scalar.primary_key {
        tokens.extend(quote!(.primary_key()));
    }
    if scalar.generated {
        tokens.extend(quote!(.generated()));
    }
    match &scalar.default {
        Some(DefaultDef::Literal(value)) => tokens.extend(quote! {
            .default_value(::autocrud::__private::serde_json::json!(#value))
        }),
        Some(DefaultDef::Factory(factory)) => tokens.extend(quote!(.default_fn(#factory))),
        None => {}
    }
    tokens
}

fn relation_field(name: &LitStr, relation: &RelationDef) -> TokenStream {
    let target = &relation.target;
    let cardinality = if relation.many {
        quote!(::autocrud::Cardinality::Many)
    } else {
        quote!(::autocrud::Cardinality::One)
    };
    let mut tokens = quote! {
        ::autocrud::FieldDescriptor::relation(
            #name,
            #cardinality,
            <#target as ::autocrud::Entity>::descriptor
        )
    };
    if relation.lazy {
        tokens.extend(quote!(.lazy()));
    }
    if let Some((local, remote)) = &relation.link {
        tokens.extend(quote!(.link(#local, #remote)));
    }
    tokens
}
