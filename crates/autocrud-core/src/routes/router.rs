// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! axum adapter.
//!
//! Mounts [`ResourceRoutes`] on an [`axum::Router`]. Each route decodes its
//! inputs independently:
//!
//! - `{key}` / `{secondary_key}` path segments through the key field's
//!   [`ScalarType`]
//! - the query string through the route's [`ParamShape`]
//! - a JSON body through the route's body [`Shape`]
//!
//! Errors become [`masterror::AppError`]: `NotFound` → 404, `Validation` →
//! 422, anything else → 500.
//!
//! [`ScalarType`]: crate::ScalarType
//! [`ParamShape`]: crate::ParamShape
//! [`Shape`]: crate::Shape

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter, on}
};
use masterror::AppError;
use serde_json::Value;
use tracing::Instrument;

use super::{HandlerInput, ResourceRoutes, RouteSpec};
use crate::{Error, Result};

type PathSegments = HashMap<String, String>;
type QueryPairs = Vec<(String, String)>;

impl ResourceRoutes {
    /// Mount every route on a fresh router.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let app = axum::Router::new()
    ///     .merge(widgets.into_router())
    ///     .merge(gadgets.into_router());
    /// ```
    pub fn into_router<S>(self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static
    {
        let mut mounted: Vec<(String, MethodRouter<S>)> = Vec::new();
        for spec in self.routes {
            let Ok(filter) = MethodFilter::try_from(spec.method.clone()) else {
                tracing::warn!(method = %spec.method, path = %spec.path, "unroutable method skipped");
                continue;
            };
            let path = spec.path.clone();
            let endpoint = Arc::new(spec);
            let handler = if endpoint.primary_key.is_some() || endpoint.secondary_key.is_some() {
                let endpoint = Arc::clone(&endpoint);
                on(
                    filter,
                    move |Path(segments): Path<PathSegments>,
                          Query(query): Query<QueryPairs>,
                          body: Bytes| {
                        dispatch(Arc::clone(&endpoint), segments, query, body)
                    }
                )
            } else {
                let endpoint = Arc::clone(&endpoint);
                on(
                    filter,
                    move |Query(query): Query<QueryPairs>, body: Bytes| {
                        dispatch(Arc::clone(&endpoint), PathSegments::new(), query, body)
                    }
                )
            };

            match mounted.iter_mut().find(|(mounted_path, _)| *mounted_path == path) {
                Some((_, existing)) => {
                    let merged = std::mem::take(existing).merge(handler);
                    *existing = merged;
                }
                None => mounted.push((path, handler))
            }
        }

        mounted
            .into_iter()
            .fold(Router::new(), |router, (path, handler)| router.route(&path, handler))
    }
}

async fn dispatch(
    endpoint: Arc<RouteSpec>,
    segments: PathSegments,
    query: QueryPairs,
    body: Bytes
) -> Response {
    let span = tracing::info_span!(
        "request",
        operation = %endpoint.operation,
        method = %endpoint.method,
        path = %endpoint.path
    );
    async move {
        let outcome = match decode(&endpoint, &segments, &query, &body) {
            Ok(input) => endpoint.call(input).await,
            Err(err) => Err(err)
        };
        match outcome {
            Ok(Some(value)) => (endpoint.status, Json(value)).into_response(),
            Ok(None) => endpoint.status.into_response(),
            Err(err) => into_app_error(err).into_response()
        }
    }
    .instrument(span)
    .await
}

fn decode(
    endpoint: &RouteSpec,
    segments: &PathSegments,
    query: &[(String, String)],
    body: &[u8]
) -> Result<HandlerInput> {
    let path_key = |placeholder: &str, key: &Option<(String, crate::ScalarType)>| {
        key.as_ref()
            .map(|(name, ty)| {
                let raw = segments
                    .get(placeholder)
                    .ok_or_else(|| Error::validation(name, "missing path segment"))?;
                ty.parse_str(name, raw)
            })
            .transpose()
    };

    let params = endpoint
        .params
        .as_ref()
        .map(|shape| shape.decode(query))
        .transpose()?;

    let body = endpoint
        .body
        .as_ref()
        .map(|shape| {
            if body.is_empty() {
                return Err(Error::validation("body", "request body is required"));
            }
            let value: Value = serde_json::from_slice(body)
                .map_err(|err| Error::validation("body", err.to_string()))?;
            shape.decode(value)
        })
        .transpose()?;

    Ok(HandlerInput {
        primary_key: path_key("key", &endpoint.primary_key)?,
        secondary_key: path_key("secondary_key", &endpoint.secondary_key)?,
        body,
        params
    })
}

fn into_app_error(err: Error) -> AppError {
    match err {
        Error::NotFound {
            ..
        } => AppError::not_found(err.to_string()),
        Error::Validation {
            ..
        } => AppError::validation(err.to_string()),
        other => {
            tracing::error!(error = %other, "request failed");
            AppError::internal(other.to_string())
        }
    }
}
