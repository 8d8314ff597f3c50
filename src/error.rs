//! Application error types.

use std::fmt;

use thiserror::Error;

/// Why a keyed read or write did not resolve to exactly one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No row matched.
    Missing,
    /// More than one row matched a command that expected exactly one.
    Ambiguous(usize),
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no matching row"),
            Self::Ambiguous(count) => write!(f, "{} rows affected, expected one", count),
        }
    }
}

/// Application-level errors for tablemap.
#[derive(Error, Debug)]
pub enum AppError {
    // Setup errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    // Caller input errors
    #[error("Query error: {message}")]
    Query { message: String, query: String },

    // Expected, recoverable condition
    #[error("Entity not found: {entity} ({reason})")]
    EntityNotFound {
        entity: String,
        reason: NotFoundReason,
    },

    // Store errors
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // Config errors
    #[error("Configuration loading failed: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Builds a [`AppError::Query`] for the given input.
    pub fn query(message: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            query: query.into(),
        }
    }

    /// Builds a [`AppError::EntityNotFound`] for a missing row.
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
            reason: NotFoundReason::Missing,
        }
    }

    /// Builds a [`AppError::EntityNotFound`] for a command that touched too many rows.
    pub fn ambiguous(entity: impl Into<String>, count: usize) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
            reason: NotFoundReason::Ambiguous(count),
        }
    }

    /// Returns true for the recoverable not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Argument(_) => "ARGUMENT_ERROR",
            AppError::Query { .. } => "QUERY_ERROR",
            AppError::EntityNotFound {
                reason: NotFoundReason::Missing,
                ..
            } => "ENTITY_NOT_FOUND",
            AppError::EntityNotFound {
                reason: NotFoundReason::Ambiguous(_),
                ..
            } => "ENTITY_AMBIGUOUS",
            AppError::Postgres(_) => "DATABASE_ERROR",
            AppError::Pool(_) => "CONNECTION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_codes() {
        assert_eq!(AppError::not_found("Foo").code(), "ENTITY_NOT_FOUND");
        assert_eq!(AppError::ambiguous("Foo", 2).code(), "ENTITY_AMBIGUOUS");
        assert!(AppError::ambiguous("Foo", 2).is_not_found());
    }

    #[test]
    fn test_display_mentions_reason() {
        let err = AppError::ambiguous("Foo", 3);
        assert_eq!(
            err.to_string(),
            "Entity not found: Foo (3 rows affected, expected one)"
        );
    }
}
