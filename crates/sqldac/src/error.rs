//! Error types for sqldac

use thiserror::Error;

/// Result type alias for sqldac operations
pub type DacResult<T> = Result<T, DacError>;

/// Error types raised by the statement builder pipeline.
///
/// Every variant carries the table (and, where it applies, the field) it was
/// raised for, so a failure deep inside a projection or a binding plan can be
/// traced back to the offending declaration.
#[derive(Debug, Error)]
pub enum DacError {
    /// Record declaration is unusable: missing table descriptor, empty table
    /// name, malformed field annotation, mapping to a non-record type.
    #[error("Config error on {table}{}: {cause}", field_suffix(.field))]
    Config {
        table: String,
        field: Option<String>,
        cause: String,
    },

    /// Kind/type incompatibility or a structural rule violation (missing
    /// primary key, empty conflicts for an upsert, ...).
    #[error("Invariant violation on {table}{}: {cause}", field_suffix(.field))]
    Invariant {
        table: String,
        field: Option<String>,
        cause: String,
    },

    /// An identifier could not be resolved or an expression is malformed
    /// during rendering.
    #[error("Render error on {table}{}: {cause}", field_suffix(.field))]
    Render {
        table: String,
        field: Option<String>,
        cause: String,
    },

    /// Argument extraction from a record failed.
    #[error("Bind error on {table}{}: {cause}", field_suffix(.field))]
    Bind {
        table: String,
        field: Option<String>,
        cause: String,
    },

    /// An audit column must be filled but the authorization context is
    /// absent or empty.
    #[error("Audit error on {table}{}: {cause}", field_suffix(.field))]
    Audit {
        table: String,
        field: Option<String>,
        cause: String,
    },

    /// Optimistic-lock conflict: an update/delete affected zero rows.
    ///
    /// Never raised by the builder itself; provided for callers that inspect
    /// the executor's affected-row count.
    #[error("Consistency conflict on {table}: {cause}")]
    Conflict { table: String, cause: String },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {cause}")]
    Decode { column: String, cause: String },
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(".{f}"),
        None => String::new(),
    }
}

impl DacError {
    /// Create a config error for a table.
    pub fn config(table: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Config {
            table: table.into(),
            field: None,
            cause: cause.into(),
        }
    }

    /// Create a config error for a specific field.
    pub fn config_field(
        table: impl Into<String>,
        field: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Config {
            table: table.into(),
            field: Some(field.into()),
            cause: cause.into(),
        }
    }

    /// Create an invariant error for a table.
    pub fn invariant(table: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Invariant {
            table: table.into(),
            field: None,
            cause: cause.into(),
        }
    }

    /// Create an invariant error for a specific field.
    pub fn invariant_field(
        table: impl Into<String>,
        field: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Invariant {
            table: table.into(),
            field: Some(field.into()),
            cause: cause.into(),
        }
    }

    /// Create a render error for a table.
    pub fn render(table: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Render {
            table: table.into(),
            field: None,
            cause: cause.into(),
        }
    }

    /// Create a render error for a specific field.
    pub fn render_field(
        table: impl Into<String>,
        field: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Render {
            table: table.into(),
            field: Some(field.into()),
            cause: cause.into(),
        }
    }

    /// Create a bind error for a table.
    pub fn bind(table: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Bind {
            table: table.into(),
            field: None,
            cause: cause.into(),
        }
    }

    /// Create a bind error for a specific field.
    pub fn bind_field(
        table: impl Into<String>,
        field: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Bind {
            table: table.into(),
            field: Some(field.into()),
            cause: cause.into(),
        }
    }

    /// Create an audit error.
    pub fn audit(table: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Audit {
            table: table.into(),
            field: None,
            cause: cause.into(),
        }
    }

    /// Create an optimistic-lock conflict error.
    pub fn conflict(table: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Conflict {
            table: table.into(),
            cause: cause.into(),
        }
    }

    /// Create a decode error for a specific column.
    pub fn decode(column: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            cause: cause.into(),
        }
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Check if this is an invariant error
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant { .. })
    }

    /// Check if this is an optimistic-lock conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this is an audit error
    pub fn is_audit(&self) -> bool {
        matches!(self, Self::Audit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_field() {
        let err = DacError::config_field("user", "Id", "bad annotation");
        assert_eq!(err.to_string(), "Config error on user.Id: bad annotation");
    }

    #[test]
    fn config_error_display_without_field() {
        let err = DacError::config("user", "no table descriptor");
        assert_eq!(err.to_string(), "Config error on user: no table descriptor");
    }

    #[test]
    fn conflict_predicate() {
        let err = DacError::conflict("doc", "zero rows affected");
        assert!(err.is_conflict());
        assert!(!err.is_config());
    }
}
