// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! OpenAPI documents for assembled routes.
//!
//! Every [`RouteSpec`] becomes one path operation. Shapes become component
//! schemas named after the shape (`WidgetSchemaDetail`), list pages become
//! `{Shape}Page` components, and query parameters come from
//! [`ParamShape::parameters`]. A common `ErrorResponse` component describes
//! error bodies.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut doc = widgets.openapi("Inventory", "1.0.0");
//! gadgets.extend_openapi(&mut doc);
//! let json = doc.to_pretty_json()?;
//! ```
//!
//! [`ParamShape::parameters`]: crate::ParamShape::parameters

use axum::http::Method;
use serde_json::json;
use utoipa::openapi::{
    Components, ComponentsBuilder, InfoBuilder, OpenApi, OpenApiBuilder, Paths, Ref, RefOr,
    Required, content, path, request_body, response,
    schema::{ArrayBuilder, KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type}
};

use crate::{
    ParamKind, ParamSpec, ResourceRoutes, RouteSpec, ScalarType,
    shape::{FieldType, Presence, Reference, Shape},
    strategy::ResponseType
};

const ERROR_RESPONSE: &str = "ErrorResponse";

impl ResourceRoutes {
    /// Fresh document describing these routes.
    pub fn openapi(&self, title: &str, version: &str) -> OpenApi {
        let mut openapi = OpenApiBuilder::new()
            .info(InfoBuilder::new().title(title).version(version).build())
            .paths(Paths::new())
            .components(Some(ComponentsBuilder::new().build()))
            .build();
        self.extend_openapi(&mut openapi);
        openapi
    }

    /// Add these routes and their schemas to an existing document.
    pub fn extend_openapi(&self, openapi: &mut OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(|| ComponentsBuilder::new().build());
        register_error_schema(components);
        for route in self.routes() {
            register_route_schemas(components, route);
        }

        let tag = self.entity().name();
        for route in self.routes() {
            let Some(method) = http_method(&route.method) else {
                tracing::warn!(method = %route.method, path = %route.path, "method not documented");
                continue;
            };
            openapi
                .paths
                .add_path_operation(&route.path, vec![method], operation(tag, route));
        }
    }
}

fn http_method(method: &Method) -> Option<path::HttpMethod> {
    match *method {
        Method::GET => Some(path::HttpMethod::Get),
        Method::POST => Some(path::HttpMethod::Post),
        Method::PUT => Some(path::HttpMethod::Put),
        Method::DELETE => Some(path::HttpMethod::Delete),
        Method::PATCH => Some(path::HttpMethod::Patch),
        _ => None
    }
}

fn operation(tag: &str, route: &RouteSpec) -> path::Operation {
    let mut op = path::OperationBuilder::new()
        .operation_id(Some(route.operation.clone()))
        .tag(tag)
        .summary(Some(format!("{} {}", route.method, route.path)));

    if let Some((name, ty)) = &route.primary_key {
        op = op.parameter(path_parameter("key", name, *ty));
    }
    if let Some((name, ty)) = &route.secondary_key {
        op = op.parameter(path_parameter("secondary_key", name, *ty));
    }
    if let Some(params) = &route.params {
        for spec in params.parameters() {
            op = op.parameter(query_parameter(&spec));
        }
    }
    if let Some(body) = &route.body {
        op = op.request_body(Some(
            request_body::RequestBodyBuilder::new()
                .description(Some("Request body"))
                .required(Some(Required::True))
                .content("application/json", json_content(reference(&body.name())))
                .build()
        ));
    }

    op = op.response(route.status.as_str(), success_response(route));
    if route.primary_key.is_some() {
        op = op.response("404", error_response("Not found"));
    }
    if route.primary_key.is_some() || route.params.is_some() || route.body.is_some() {
        op = op.response("422", error_response("Invalid request data"));
    }
    op.response("500", error_response("Internal server error"))
        .build()
}

fn success_response(route: &RouteSpec) -> response::Response {
    let builder = response::ResponseBuilder::new().description(match route.response {
        ResponseType::Empty => "Done",
        ResponseType::IdEcho(_) => "Created",
        _ => "Success"
    });
    let schema = match &route.response {
        ResponseType::Shape(shape) | ResponseType::IdEcho(shape) => Some(reference(&shape.name())),
        ResponseType::Page(shape) => Some(reference(&page_name(shape))),
        ResponseType::List(shape) => Some(array(reference(&shape.name()))),
        ResponseType::Empty => None
    };
    match schema {
        Some(schema) => builder.content("application/json", json_content(schema)).build(),
        None => builder.build()
    }
}

fn json_content(schema: RefOr<Schema>) -> content::Content {
    content::ContentBuilder::new().schema(Some(schema)).build()
}

fn reference(name: &str) -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name(name))
}

fn array(items: RefOr<Schema>) -> RefOr<Schema> {
    RefOr::T(Schema::Array(ArrayBuilder::new().items(items).build()))
}

fn object(builder: ObjectBuilder) -> RefOr<Schema> {
    RefOr::T(Schema::Object(builder.build()))
}

fn error_response(description: &str) -> response::Response {
    response::ResponseBuilder::new()
        .description(description)
        .content("application/json", json_content(reference(ERROR_RESPONSE)))
        .build()
}

fn path_parameter(placeholder: &str, field: &str, ty: ScalarType) -> path::Parameter {
    path::ParameterBuilder::new()
        .name(placeholder)
        .parameter_in(path::ParameterIn::Path)
        .required(Required::True)
        .description(Some(format!("Value of `{field}`")))
        .schema(Some(scalar_schema(ty, false)))
        .build()
}

fn query_parameter(spec: &ParamSpec) -> path::Parameter {
    let schema = match &spec.kind {
        ParamKind::Filter(ty) => scalar_schema(*ty, true),
        ParamKind::OrderBy(fields) => string_enum(fields.iter().cloned(), spec.default.clone()),
        ParamKind::OrderDirection => string_enum(
            ["asc".to_owned(), "desc".to_owned()],
            spec.default.clone()
        ),
        ParamKind::AllowNone(fields) => array(string_enum(fields.iter().cloned(), None)),
        ParamKind::Page | ParamKind::Size => object(
            ObjectBuilder::new()
                .schema_type(Type::Integer)
                .minimum(Some(1.0))
                .default(spec.default.clone())
        )
    };
    let description = match &spec.kind {
        ParamKind::Filter(_) => "Equality filter",
        ParamKind::OrderBy(_) => "Field to order by",
        ParamKind::OrderDirection => "Ordering direction",
        ParamKind::AllowNone(_) => "Filters allowed to match empty values",
        ParamKind::Page => "1-based page number",
        ParamKind::Size => "Page size"
    };
    path::ParameterBuilder::new()
        .name(&spec.name)
        .parameter_in(path::ParameterIn::Query)
        .required(Required::False)
        .description(Some(description))
        .schema(Some(schema))
        .build()
}

fn string_enum(
    values: impl IntoIterator<Item = String>,
    default: Option<serde_json::Value>
) -> RefOr<Schema> {
    object(
        ObjectBuilder::new()
            .schema_type(Type::String)
            .enum_values(Some(values))
            .default(default)
    )
}

fn scalar_schema(ty: ScalarType, nullable: bool) -> RefOr<Schema> {
    let (kind, format) = match ty {
        ScalarType::Bool => (Some(Type::Boolean), None),
        ScalarType::Integer => (Some(Type::Integer), Some(SchemaFormat::KnownFormat(KnownFormat::Int64))),
        ScalarType::Float => (Some(Type::Number), Some(SchemaFormat::KnownFormat(KnownFormat::Double))),
        ScalarType::Text => (Some(Type::String), None),
        ScalarType::Timestamp => (Some(Type::String), Some(SchemaFormat::KnownFormat(KnownFormat::DateTime))),
        ScalarType::Uuid => (Some(Type::String), Some(SchemaFormat::Custom("uuid".into()))),
        ScalarType::Json => (None, None)
    };
    let schema_type = match kind {
        Some(kind) if nullable => SchemaType::from_iter([kind, Type::Null]),
        Some(kind) => SchemaType::from(kind),
        None => SchemaType::AnyValue
    };
    object(ObjectBuilder::new().schema_type(schema_type).format(format))
}

fn key_schema(target: &Reference, nullable: bool) -> RefOr<Schema> {
    match target.keys.as_slice() {
        [(_, ty)] => scalar_schema(*ty, nullable),
        keys => object(keys.iter().fold(
            ObjectBuilder::new().schema_type(Type::Object),
            |builder, (name, ty)| builder.property(name, scalar_schema(*ty, false)).required(name)
        ))
    }
}

fn page_name(shape: &Shape) -> String {
    format!("{}Page", shape.name())
}

fn register_route_schemas(components: &mut Components, route: &RouteSpec) {
    if let Some(body) = &route.body {
        register_shape(components, body);
    }
    match &route.response {
        ResponseType::Shape(shape) | ResponseType::List(shape) | ResponseType::IdEcho(shape) => {
            register_shape(components, shape);
        }
        ResponseType::Page(shape) => {
            register_shape(components, shape);
            let page = ObjectBuilder::new()
                .schema_type(Type::Object)
                .title(Some(page_name(shape)))
                .property("page", ObjectBuilder::new().schema_type(Type::Integer).build())
                .required("page")
                .property("size", ObjectBuilder::new().schema_type(Type::Integer).build())
                .required("size")
                .property("total_pages", ObjectBuilder::new().schema_type(Type::Integer).build())
                .required("total_pages")
                .property("page_data", array(reference(&shape.name())))
                .required("page_data")
                .build();
            components.schemas.insert(page_name(shape), page.into());
        }
        ResponseType::Empty => {}
    }
}

fn register_shape(components: &mut Components, shape: &Shape) {
    let name = shape.name();
    if components.schemas.contains_key(&name) {
        return;
    }

    let mut object = ObjectBuilder::new()
        .schema_type(Type::Object)
        .title(Some(name.clone()));
    let mut nested = Vec::new();
    for field in shape.fields() {
        let property = match &field.ty {
            FieldType::Scalar(ty) => scalar_schema(*ty, field.nullable),
            FieldType::Nested(child) => {
                nested.push(child);
                reference(&child.name())
            }
            FieldType::NestedList(child) => {
                nested.push(child);
                array(reference(&child.name()))
            }
            FieldType::Reference(target) => key_schema(target, field.nullable),
            FieldType::ReferenceList(target) => array(key_schema(target, false))
        };
        object = object.property(&field.name, property);
        if field.presence == Presence::Required {
            object = object.required(&field.name);
        }
    }
    components.schemas.insert(name, object.build().into());

    for child in nested {
        register_shape(components, child);
    }
}

fn register_error_schema(components: &mut Components) {
    if components.schemas.contains_key(ERROR_RESPONSE) {
        return;
    }
    let string = |description: &str, example: serde_json::Value| {
        ObjectBuilder::new()
            .schema_type(Type::String)
            .description(Some(description))
            .example(Some(example))
            .build()
    };
    let error = ObjectBuilder::new()
        .schema_type(Type::Object)
        .title(Some(ERROR_RESPONSE))
        .description(Some("Error response following RFC 7807 Problem Details"))
        .property(
            "type",
            string("A URI reference that identifies the problem type", json!("about:blank"))
        )
        .property("title", string("A short summary of the problem", json!("Not Found")))
        .required("title")
        .property(
            "status",
            ObjectBuilder::new()
                .schema_type(Type::Integer)
                .description(Some("HTTP status code"))
                .example(Some(json!(404)))
                .build()
        )
        .required("status")
        .property(
            "detail",
            string("Explanation specific to this occurrence", json!("Widget `7` not found"))
        )
        .property("code", string("Application error code", json!("NOT_FOUND")))
        .build();
    components
        .schemas
        .insert(ERROR_RESPONSE.to_owned(), error.into());
}
