use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A numeric field is outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The target table declares no columns besides the identifier.
    #[error("`schema.columns` must declare at least one column")]
    NoColumns,
    /// Two columns share the same name, or a column reuses the identifier column name.
    #[error("column `{0}` is declared more than once")]
    DuplicateColumn(String),
    /// A column has no source field to read from.
    #[error("column `{0}` has no aliases")]
    MissingAliases(String),
    /// An identifier is empty.
    #[error("`{0}` cannot be empty")]
    EmptyIdentifier(String),
}

/// Shorthand for [`ValidationError::InvalidFieldValue`].
pub(crate) fn invalid_field(field: &str, constraint: &str) -> ValidationError {
    ValidationError::InvalidFieldValue {
        field: field.to_string(),
        constraint: constraint.to_string(),
    }
}
