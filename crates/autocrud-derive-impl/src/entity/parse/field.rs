// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Field-level attribute parsing.
//!
//! # Attributes
//!
//! | Attribute | Applies to | Effect |
//! |-----------|------------|--------|
//! | `#[id]` | columns | primary-key member |
//! | `#[auto]` | integer, timestamp, UUID columns | assigned on insert |
//! | `#[field(default = <expr>)]` | columns | literal default |
//! | `#[field(default_fn = path)]` | columns | `fn() -> serde_json::Value` default |
//! | `#[field(ty = "...")]` | columns | column type override |
//! | `#[field(nullable)]` | columns | nullable without `Option` |
//! | `#[field(skip)]` | any | left out of the descriptor |
//! | `#[relation(one \| many, lazy, local, remote)]` | entity-typed fields | relation |

use darling::FromMeta;
use syn::{Attribute, Expr, Field, Ident, Meta, Type, ext::IdentExt};

use super::column::{ColumnType, unwrap_generic};

/// Expression taken verbatim from `name = <expr>`.
///
/// darling's own `Expr` parsing re-parses string literals as code, which
/// would turn `default = "draft"` into a path.
#[derive(Debug, Clone)]
struct VerbatimExpr(Expr);

impl FromMeta for VerbatimExpr {
    fn from_expr(expr: &Expr) -> darling::Result<Self> {
        Ok(Self(expr.clone()))
    }
}

/// Options of `#[field(...)]`.
#[derive(Debug, Default, FromMeta)]
#[darling(default)]
struct FieldOptions {
    default:    Option<VerbatimExpr>,
    default_fn: Option<VerbatimExpr>,
    ty:         Option<ColumnType>,
    nullable:   bool,
    skip:       bool
}

impl FieldOptions {
    fn touches_column(&self) -> bool {
        self.default.is_some() || self.default_fn.is_some() || self.ty.is_some() || self.nullable
    }
}

/// Options of `#[relation(...)]`.
#[derive(Debug, Default, FromMeta)]
#[darling(default)]
struct RelationOptions {
    one:    bool,
    many:   bool,
    lazy:   bool,
    local:  Option<String>,
    remote: Option<String>
}

/// Default rule of a column.
#[derive(Debug, Clone)]
pub enum DefaultDef {
    /// `default = <expr>`, converted with `json!`.
    Literal(Expr),

    /// `default_fn = <fn() -> Value>`, or the factory implied by `#[auto]`.
    Factory(proc_macro2::TokenStream)
}

/// Parsed column field.
#[derive(Debug, Clone)]
pub struct ScalarDef {
    /// Column type.
    pub ty: ColumnType,

    /// `Option<T>` or `#[field(nullable)]`.
    pub nullable: bool,

    /// `#[id]`.
    pub primary_key: bool,

    /// `#[auto]`.
    pub generated: bool,

    /// Explicit default, or the one `#[auto]` implies.
    pub default: Option<DefaultDef>
}

/// Parsed relation field.
#[derive(Debug, Clone)]
pub struct RelationDef {
    /// Related entity type.
    pub target: Type,

    /// `true` for `many` / `Vec<T>`.
    pub many: bool,

    /// `lazy`.
    pub lazy: bool,

    /// `(local, remote)` join columns.
    pub link: Option<(String, String)>
}

/// What a field becomes in the descriptor.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Column.
    Scalar(ScalarDef),

    /// Relation to another entity.
    Relation(RelationDef)
}

/// Parsed field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field identifier.
    pub ident: Ident,

    /// Descriptor field name, the identifier without `r#`.
    pub name: String,

    /// Column or relation.
    pub kind: FieldKind
}

impl FieldDef {
    /// Parse one named field.
    ///
    /// Returns `Ok(None)` for `#[field(skip)]`.
    ///
    /// # Errors
    ///
    /// Malformed attributes, conflicting options and uninferable types. All
    /// problems of the field are reported together.
    pub fn from_field(field: &Field) -> darling::Result<Option<Self>> {
        let Some(ident) = field.ident.clone() else {
            return Err(darling::Error::custom("entity fields must be named").with_span(field));
        };

        let mut errors = darling::Error::accumulator();
        let mut primary_key = false;
        let mut generated = false;
        let mut options = FieldOptions::default();
        let mut relation: Option<RelationOptions> = None;

        for attr in &field.attrs {
            if attr.path().is_ident("id") {
                if let Err(err) = require_word(attr) {
                    errors.push(err);
                }
                primary_key = true;
            } else if attr.path().is_ident("auto") {
                if let Err(err) = require_word(attr) {
                    errors.push(err);
                }
                generated = true;
            } else if attr.path().is_ident("field") {
                if let Some(parsed) = errors.handle(parse_options::<FieldOptions>(attr)) {
                    options = parsed;
                }
            } else if attr.path().is_ident("relation") {
                relation = Some(
                    errors
                        .handle(parse_options::<RelationOptions>(attr))
                        .unwrap_or_default()
                );
            }
        }

        if options.skip {
            if primary_key || generated || relation.is_some() || options.touches_column() {
                errors.push(
                    darling::Error::custom("`skip` cannot be combined with other field options")
                        .with_span(&ident)
                );
            }
            return errors.finish_with(None);
        }

        let kind = match relation {
            Some(relation) => {
                if primary_key {
                    errors.push(
                        darling::Error::custom("`#[id]` cannot mark a relation").with_span(&ident)
                    );
                }
                if generated {
                    errors.push(
                        darling::Error::custom("`#[auto]` cannot mark a relation")
                            .with_span(&ident)
                    );
                }
                if options.touches_column() {
                    errors.push(
                        darling::Error::custom("`#[field(...)]` options apply to columns only")
                            .with_span(&ident)
                    );
                }
                errors
                    .handle(relation_def(&field.ty, relation))
                    .map(FieldKind::Relation)
            }
            None => errors
                .handle(scalar_def(&field.ty, &options, primary_key, generated))
                .map(FieldKind::Scalar)
        };

        let name = ident.unraw().to_string();
        match kind {
            Some(kind) => errors.finish_with(Some(Self {
                ident,
                name,
                kind
            })),
            None => errors.finish_with(None)
        }
    }

    /// Whether the field is a primary-key column.
    pub fn is_primary_key(&self) -> bool {
        matches!(&self.kind, FieldKind::Scalar(scalar) if scalar.primary_key)
    }
}

fn require_word(attr: &Attribute) -> darling::Result<()> {
    attr.meta.require_path_only()?;
    Ok(())
}

fn parse_options<T>(attr: &Attribute) -> darling::Result<T>
where
    T: FromMeta + Default
{
    match &attr.meta {
        Meta::Path(_) => Ok(T::default()),
        meta => T::from_meta(meta)
    }
}

fn scalar_def(
    ty: &Type,
    options: &FieldOptions,
    primary_key: bool,
    generated: bool
) -> darling::Result<ScalarDef> {
    let (inner, optional) = match unwrap_generic(ty, "Option") {
        Some(inner) => (inner, true),
        None => (ty, false)
    };
    let column = match options.ty.or_else(|| ColumnType::infer(inner)) {
        Some(column) => column,
        None => {
            return Err(darling::Error::custom(
                "cannot infer the column type; annotate with #[field(ty = \"...\")] or \
                 #[relation]"
            )
            .with_span(ty));
        }
    };
    let nullable = optional || options.nullable;

    let mut errors = darling::Error::accumulator();
    if primary_key && nullable {
        errors.push(darling::Error::custom("primary key cannot be nullable").with_span(ty));
    }
    if generated && !column.is_generatable() {
        errors.push(
            darling::Error::custom("`#[auto]` applies to integer, timestamp and UUID columns")
                .with_span(ty)
        );
    }

    let default = match (&options.default, &options.default_fn) {
        (Some(_), Some(VerbatimExpr(factory))) => {
            errors.push(
                darling::Error::custom("`default` and `default_fn` are mutually exclusive")
                    .with_span(factory)
            );
            None
        }
        (Some(VerbatimExpr(value)), None) => Some(DefaultDef::Literal(value.clone())),
        (None, Some(VerbatimExpr(factory))) => Some(DefaultDef::Factory(quote::quote!(#factory))),
        (None, None) if generated => column.auto_factory().map(DefaultDef::Factory),
        (None, None) => None
    };

    errors.finish_with(ScalarDef {
        ty: column,
        nullable,
        primary_key,
        generated,
        default
    })
}

fn relation_def(ty: &Type, options: RelationOptions) -> darling::Result<RelationDef> {
    if options.one && options.many {
        return Err(
            darling::Error::custom("a relation is either `one` or `many`").with_span(ty)
        );
    }
    let link = match (options.local, options.remote) {
        (Some(local), Some(remote)) => Some((local, remote)),
        (None, None) => None,
        _ => {
            return Err(darling::Error::custom(
                "`local` and `remote` must be given together"
            )
            .with_span(ty));
        }
    };

    let (target, inferred_many) = if let Some(inner) = unwrap_generic(ty, "Vec") {
        (inner, true)
    } else if let Some(inner) = unwrap_generic(ty, "Option") {
        (inner, false)
    } else {
        (ty, false)
    };
    let target = ["Box", "Arc"]
        .iter()
        .find_map(|pointer| unwrap_generic(target, pointer))
        .unwrap_or(target);
    if !matches!(target, Type::Path(_)) {
        return Err(darling::Error::custom("relation target must be an entity type").with_span(ty));
    }

    Ok(RelationDef {
        target: target.clone(),
        many: options.many || (inferred_many && !options.one),
        lazy: options.lazy,
        link
    })
}
