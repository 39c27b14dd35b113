// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Error type shared by every layer of the engine.
//!
//! Configuration errors are raised while assembling routes, i.e. at startup.
//! The remaining variants surface per request and are mapped onto HTTP
//! statuses by the axum adapter.

use crate::shape::ShapeId;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Engine error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No row matched the requested key.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity name.
        entity: String,

        /// Rendered key.
        key: String
    },

    /// A decoded value violates its declared type or constraint.
    #[error("validation failed for `{field}`: {message}")]
    Validation {
        /// Offending field or parameter.
        field: String,

        /// What went wrong.
        message: String
    },

    /// A payload reached an operation expecting another shape.
    #[error("payload decoded as `{actual}` but `{expected}` was expected")]
    ShapeMismatch {
        /// Shape the operation requires.
        expected: ShapeId,

        /// Shape the payload was decoded against.
        actual: ShapeId
    },

    /// Invalid wiring detected at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Capability not exposed by the service.
    #[error("operation `{0}` is not supported by this service")]
    Unsupported(&'static str),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String)
}

impl Error {
    /// Build a [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key:    key.to_string()
        }
    }

    /// Build a [`Error::Validation`].
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field:   field.into(),
            message: message.into()
        }
    }

    /// Build a [`Error::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a [`Error::Storage`].
    pub fn storage(message: impl std::fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Whether the error stems from the caller's input.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Validation { .. })
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_found() {
        let err = Error::not_found("Widget", 7);
        assert_eq!(err.to_string(), "Widget not found: 7");
        assert!(err.is_client_error());
    }

    #[test]
    fn display_shape_mismatch() {
        let err = Error::ShapeMismatch {
            expected: ShapeId::new("Widget", "InCreate"),
            actual:   ShapeId::new("Widget", "InUpdate")
        };
        assert_eq!(
            err.to_string(),
            "payload decoded as `WidgetSchemaInUpdate` but `WidgetSchemaInCreate` was expected"
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn display_unsupported() {
        assert_eq!(
            Error::Unsupported("put").to_string(),
            "operation `put` is not supported by this service"
        );
    }
}
