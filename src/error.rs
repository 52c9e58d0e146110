//! Error taxonomy for the mapper.
//!
//! Every failure surfaced by schema resolution, condition compilation, hydration and
//! statement execution is a [`MapperError`]. None of them are retried by this crate;
//! callers that own the connection decide on transactions and retries.

use std::fmt;

use crate::value::ValueExtractionError;

/// Error type returned by every fallible mapper operation
#[derive(Debug)]
pub enum MapperError {
    /// Metadata for a type could not be turned into a schema
    ///
    /// Missing table name, unregistered type, reference to a type without an identifier.
    SchemaResolution(String),
    /// A condition or hydration step referenced a relationship with an incompatible value,
    /// or with a cardinality/comparator combination that is not implemented
    ReferenceResolution(String),
    /// A value could not be assigned to a property or column
    TypeCoercion {
        entity: String,
        property: String,
        message: String,
    },
    /// A relationship needed a database handle but the session has none
    MissingDatabase(String),
    /// A discriminator value does not name a registered sub-type
    SubtypeDispatch { super_type: String, discriminator: String },
    /// Statement misuse (executed twice, missing identifier, empty write)
    Statement(String),
    /// Failure reported by the database driver
    Driver(String),
    /// Configuration could not be loaded
    Config(config::ConfigError),
}

impl MapperError {
    /// Build a [`MapperError::TypeCoercion`] for a property of an entity
    pub fn coercion(
        entity: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MapperError::TypeCoercion {
            entity: entity.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    /// Build a "not implemented" reference error for a cardinality combination
    pub fn not_implemented(what: impl fmt::Display) -> Self {
        MapperError::ReferenceResolution(format!("case {what} not implemented"))
    }
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperError::SchemaResolution(msg) => write!(f, "Schema resolution error: {msg}"),
            MapperError::ReferenceResolution(msg) => {
                write!(f, "Reference resolution error: {msg}")
            }
            MapperError::TypeCoercion {
                entity,
                property,
                message,
            } => write!(f, "Type coercion error on {entity}.{property}: {message}"),
            MapperError::MissingDatabase(msg) => write!(f, "Missing database: {msg}"),
            MapperError::SubtypeDispatch {
                super_type,
                discriminator,
            } => write!(
                f,
                "Sub-type dispatch error: \"{discriminator}\" is not a registered sub-type of {super_type}"
            ),
            MapperError::Statement(msg) => write!(f, "Statement error: {msg}"),
            MapperError::Driver(msg) => write!(f, "Driver error: {msg}"),
            MapperError::Config(err) => write!(f, "Configuration error: {err}"),
        }
    }
}

impl std::error::Error for MapperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapperError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for MapperError {
    fn from(err: config::ConfigError) -> Self {
        MapperError::Config(err)
    }
}

impl From<ValueExtractionError> for MapperError {
    fn from(err: ValueExtractionError) -> Self {
        MapperError::TypeCoercion {
            entity: String::new(),
            property: String::new(),
            message: err.to_string(),
        }
    }
}

/// Result alias used across the crate
pub type MapperResult<T> = Result<T, MapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_property() {
        let err = MapperError::coercion("User", "name", "cannot take null value from column \"name\"");
        assert_eq!(
            err.to_string(),
            "Type coercion error on User.name: cannot take null value from column \"name\""
        );
    }

    #[test]
    fn test_subtype_dispatch_display() {
        let err = MapperError::SubtypeDispatch {
            super_type: "User".to_string(),
            discriminator: "Robot".to_string(),
        };
        assert!(err.to_string().contains("\"Robot\" is not a registered sub-type of User"));
    }

    #[test]
    fn test_extraction_error_converts_to_coercion() {
        let err: MapperError = ValueExtractionError::NullValue.into();
        assert!(matches!(err, MapperError::TypeCoercion { .. }));
    }
}
