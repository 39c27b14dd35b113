// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! List query parameters.
//!
//! [`ParamShape`] is the declarative description of what a list endpoint
//! accepts in its query string. It is derived from the entity's scalar fields
//! and decodes raw query pairs into [`ListParams`].
//!
//! | Parameter | Kind | Default |
//! |-----------|------|---------|
//! | `<field>` | one per filterable scalar field | absent |
//! | `order_by` | enumeration of non-boolean filterable fields | `id`, else `created_at`, else first |
//! | `order_direction` | `asc` / `desc` | `asc` |
//! | `allow_none` | repeated filter names | empty |
//! | `page` | integer ≥ 1 | `1` |
//! | `size` | integer ≥ 1 | `10` |
//!
//! # Omitted vs explicitly null
//!
//! A filter absent from the query is not applied. A filter given with an
//! empty value (`?note=`) decodes to `null` (or `""` for text fields). Such
//! empty values are dropped by the service unless the field is also named in
//! `allow_none`, which is how a client asks for `note IS NULL`.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::{
    DEFAULT_ORDER_FIELDS, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, EntityDescriptor, Error, RESERVED_PARAMS,
    Result, ScalarType, SortDirection
};

/// Kind of one query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Equality filter on a scalar field.
    Filter(ScalarType),

    /// Field to order by, one of the listed names.
    OrderBy(Vec<String>),

    /// `asc` or `desc`.
    OrderDirection,

    /// Filter names allowed to match `null`.
    AllowNone(Vec<String>),

    /// 1-based page number.
    Page,

    /// Page size.
    Size
}

/// Declarative description of one query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Query key.
    pub name: String,

    /// What the parameter carries.
    pub kind: ParamKind,

    /// Value used when the parameter is absent.
    pub default: Option<Value>,

    /// Whether the key may repeat.
    pub multiple: bool
}

/// Query-parameter shape of one entity, named `{Entity}ParamsList`.
#[derive(Debug, Clone)]
pub struct ParamShape {
    entity:        String,
    filters:       Vec<(String, ScalarType)>,
    orderable:     Vec<String>,
    default_order: Option<String>
}

impl ParamShape {
    /// Derive the parameter shape of `entity`.
    pub fn synthesize(entity: &EntityDescriptor) -> Self {
        let mut filters = Vec::new();
        for (name, scalar) in entity.scalar_fields() {
            if !scalar.ty.is_filterable() {
                continue;
            }
            if RESERVED_PARAMS.contains(&name) {
                tracing::warn!(
                    entity = entity.name(),
                    field = name,
                    "field name collides with a reserved query parameter, not filterable"
                );
                continue;
            }
            filters.push((name.to_owned(), scalar.ty));
        }

        let orderable: Vec<String> = filters
            .iter()
            .filter(|(_, ty)| ty.is_orderable())
            .map(|(name, _)| name.clone())
            .collect();
        let default_order = DEFAULT_ORDER_FIELDS
            .iter()
            .find(|candidate| orderable.iter().any(|name| name == *candidate))
            .map(|name| (*name).to_owned())
            .or_else(|| orderable.first().cloned());

        Self {
            entity: entity.name().to_owned(),
            filters,
            orderable,
            default_order
        }
    }

    /// Rendered name.
    pub fn name(&self) -> String {
        format!("{}ParamsList", self.entity)
    }

    /// Filterable fields and their types.
    pub fn filters(&self) -> &[(String, ScalarType)] {
        &self.filters
    }

    /// Fields accepted by `order_by`.
    pub fn orderable(&self) -> &[String] {
        &self.orderable
    }

    /// Default `order_by` value.
    pub fn default_order(&self) -> Option<&str> {
        self.default_order.as_deref()
    }

    /// Every accepted parameter, filters first.
    ///
    /// `order_by` and `order_direction` appear only when some field is
    /// orderable, `allow_none` only when some field is filterable.
    pub fn parameters(&self) -> Vec<ParamSpec> {
        let mut specs: Vec<ParamSpec> = self
            .filters
            .iter()
            .map(|(name, ty)| ParamSpec {
                name:     name.clone(),
                kind:     ParamKind::Filter(*ty),
                default:  None,
                multiple: false
            })
            .collect();

        if !self.orderable.is_empty() {
            specs.push(ParamSpec {
                name:     "order_by".into(),
                kind:     ParamKind::OrderBy(self.orderable.clone()),
                default:  self.default_order.clone().map(Value::String),
                multiple: false
            });
            specs.push(ParamSpec {
                name:     "order_direction".into(),
                kind:     ParamKind::OrderDirection,
                default:  Some(Value::String(SortDirection::Asc.as_param().into())),
                multiple: false
            });
        }
        if !self.filters.is_empty() {
            specs.push(ParamSpec {
                name:     "allow_none".into(),
                kind:     ParamKind::AllowNone(
                    self.filters.iter().map(|(n, _)| n.clone()).collect()
                ),
                default:  Some(Value::Array(Vec::new())),
                multiple: true
            });
        }
        specs.push(ParamSpec {
            name:     "page".into(),
            kind:     ParamKind::Page,
            default:  Some(Value::from(DEFAULT_PAGE)),
            multiple: false
        });
        specs.push(ParamSpec {
            name:     "size".into(),
            kind:     ParamKind::Size,
            default:  Some(Value::from(DEFAULT_PAGE_SIZE)),
            multiple: false
        });
        specs
    }

    /// Decode query pairs.
    ///
    /// Unknown keys, and list controls the shape does not declare, are
    /// ignored. A repeated filter keeps its last value.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for unparsable filter values, an unknown
    /// `order_by` or `allow_none` name, a bad direction, or a page/size that
    /// is not an integer ≥ 1.
    pub fn decode(&self, pairs: &[(String, String)]) -> Result<ListParams> {
        let mut params = ListParams {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
            order_by: self.default_order.clone(),
            order_direction: SortDirection::Asc,
            allow_none: BTreeSet::new()
        };

        for (key, raw) in pairs {
            match key.as_str() {
                "order_by" | "order_direction" if self.orderable.is_empty() => continue,
                "allow_none" if self.filters.is_empty() => continue,
                "order_by" => {
                    if !self.orderable.iter().any(|name| name == raw) {
                        return Err(Error::validation(
                            "order_by",
                            format!("`{raw}` is not one of {:?}", self.orderable)
                        ));
                    }
                    params.order_by = Some(raw.clone());
                }
                "order_direction" => params.order_direction = SortDirection::parse(raw)?,
                "allow_none" => {
                    if !self.filters.iter().any(|(name, _)| name == raw) {
                        return Err(Error::validation(
                            "allow_none",
                            format!("`{raw}` is not a filter field")
                        ));
                    }
                    params.allow_none.insert(raw.clone());
                }
                "page" => params.page = positive("page", raw)?,
                "size" => params.size = positive("size", raw)?,
                _ => {
                    let Some((name, ty)) = self.filters.iter().find(|(name, _)| name == key) else {
                        continue;
                    };
                    let value = if raw.is_empty() && *ty != ScalarType::Text {
                        Value::Null
                    } else {
                        ty.parse_str(name, raw)?
                    };
                    params.filters.insert(name.clone(), value);
                }
            }
        }

        Ok(params)
    }
}

fn positive(name: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::validation(name, "must be an integer greater than or equal to 1"))
    }
}

/// Decoded list query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    /// 1-based page number.
    pub page: u64,

    /// Page size.
    pub size: u64,

    /// Filters that were present in the query, in name order.
    pub filters: BTreeMap<String, Value>,

    /// Field to order by.
    pub order_by: Option<String>,

    /// Ordering direction.
    pub order_direction: SortDirection,

    /// Filters allowed to match empty values.
    pub allow_none: BTreeSet<String>
}

impl ListParams {
    /// First page of the default size, no filters, no ordering.
    pub fn new() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
            order_by: None,
            order_direction: SortDirection::Asc,
            allow_none: BTreeSet::new()
        }
    }

    /// Filters the service applies: present and either allow-listed or not
    /// one of the empty sentinels.
    pub fn effective_filters(&self) -> BTreeMap<String, Value> {
        self.filters
            .iter()
            .filter(|(name, value)| {
                self.allow_none.contains(*name) || !crate::value::is_empty_value(value)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::FieldDescriptor;

    fn shape() -> ParamShape {
        let entity = EntityDescriptor::builder("Widget")
            .field(FieldDescriptor::scalar("id", ScalarType::Integer).primary_key())
            .field(FieldDescriptor::scalar("name", ScalarType::Text))
            .field(FieldDescriptor::scalar("active", ScalarType::Bool))
            .field(FieldDescriptor::scalar("note", ScalarType::Text).nullable())
            .field(FieldDescriptor::scalar("ratio", ScalarType::Float))
            .field(FieldDescriptor::scalar("meta", ScalarType::Json))
            .field(FieldDescriptor::scalar("size", ScalarType::Integer))
            .build();
        ParamShape::synthesize(&entity)
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn filters_cover_supported_types() {
        let shape = shape();
        let names: Vec<_> = shape.filters().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["id", "name", "active", "note"]);
        assert_eq!(shape.orderable(), ["id", "name", "note"]);
        assert_eq!(shape.name(), "WidgetParamsList");
    }

    #[test]
    fn default_order_prefers_priority_list() {
        assert_eq!(shape().default_order(), Some("id"));

        let entity = EntityDescriptor::builder("Event")
            .field(FieldDescriptor::scalar("title", ScalarType::Text))
            .field(FieldDescriptor::scalar("created_at", ScalarType::Timestamp))
            .build();
        assert_eq!(ParamShape::synthesize(&entity).default_order(), Some("created_at"));

        let entity = EntityDescriptor::builder("Tag")
            .field(FieldDescriptor::scalar("flag", ScalarType::Bool))
            .field(FieldDescriptor::scalar("label", ScalarType::Text))
            .build();
        assert_eq!(ParamShape::synthesize(&entity).default_order(), Some("label"));
    }

    #[test]
    fn decode_defaults() {
        let params = shape().decode(&[]).unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.size, 10);
        assert_eq!(params.order_by.as_deref(), Some("id"));
        assert_eq!(params.order_direction, SortDirection::Asc);
        assert!(params.filters.is_empty());
    }

    #[test]
    fn omitted_and_explicit_null_differ() {
        let shape = shape();
        let omitted = shape.decode(&[]).unwrap();
        assert!(!omitted.filters.contains_key("note"));

        let explicit = shape
            .decode(&pairs(&[("active", ""), ("allow_none", "active")]))
            .unwrap();
        assert_eq!(explicit.filters["active"], Value::Null);
        assert_eq!(explicit.effective_filters()["active"], Value::Null);

        let dropped = shape.decode(&pairs(&[("active", "")])).unwrap();
        assert!(dropped.effective_filters().is_empty());
    }

    #[test]
    fn empty_text_filter_is_empty_string() {
        let params = shape().decode(&pairs(&[("name", "")])).unwrap();
        assert_eq!(params.filters["name"], json!(""));
    }

    #[test]
    fn falsy_filters_dropped_unless_allowed() {
        let params = shape()
            .decode(&pairs(&[("active", "false"), ("id", "0")]))
            .unwrap();
        assert!(params.effective_filters().is_empty());

        let params = shape()
            .decode(&pairs(&[("active", "false"), ("allow_none", "active")]))
            .unwrap();
        assert_eq!(params.effective_filters()["active"], json!(false));
    }

    #[test]
    fn validation_failures() {
        let shape = shape();
        for bad in [
            pairs(&[("page", "0")]),
            pairs(&[("size", "-1")]),
            pairs(&[("size", "")]),
            pairs(&[("order_by", "active")]),
            pairs(&[("order_direction", "sideways")]),
            pairs(&[("allow_none", "ratio")]),
            pairs(&[("id", "abc")])
        ] {
            assert!(
                matches!(shape.decode(&bad), Err(Error::Validation { .. })),
                "{bad:?} should fail"
            );
        }
    }

    #[test]
    fn direction_case_insensitive_and_unknown_ignored() {
        let params = shape()
            .decode(&pairs(&[("order_direction", "DESC"), ("whatever", "1"), ("page", "3")]))
            .unwrap();
        assert_eq!(params.order_direction, SortDirection::Desc);
        assert_eq!(params.page, 3);
    }

    #[test]
    fn reserved_names_are_not_filters() {
        let shape = shape();
        assert!(shape.filters().iter().all(|(n, _)| n != "size"));
        let params = shape.decode(&pairs(&[("size", "25")])).unwrap();
        assert_eq!(params.size, 25);
    }

    #[test]
    fn controls_follow_available_fields() {
        let entity = EntityDescriptor::builder("Blob")
            .field(FieldDescriptor::scalar("data", ScalarType::Json))
            .build();
        let shape = ParamShape::synthesize(&entity);
        let names: Vec<_> = shape.parameters().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["page", "size"]);

        let params = shape
            .decode(&pairs(&[("order_by", "data"), ("allow_none", "data")]))
            .unwrap();
        assert_eq!(params.order_by, None);
        assert!(params.allow_none.is_empty());

        let entity = EntityDescriptor::builder("Flag")
            .field(FieldDescriptor::scalar("on", ScalarType::Bool))
            .build();
        let names: Vec<_> = ParamShape::synthesize(&entity)
            .parameters()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["on", "allow_none", "page", "size"]);
    }

    #[test]
    fn parameters_list() {
        let specs = shape().parameters();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["id", "name", "active", "note", "order_by", "order_direction", "allow_none", "page", "size"]
        );
        let allow = specs.iter().find(|s| s.name == "allow_none").unwrap();
        assert!(allow.multiple);
        let page = specs.iter().find(|s| s.name == "page").unwrap();
        assert_eq!(page.default, Some(json!(1)));
    }
}
