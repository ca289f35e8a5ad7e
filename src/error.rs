use thiserror::Error;

/// Errors raised while declaring entities and relationships or coercing values
/// against a declared schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown field type '{type_name}' for field {entity}.{field}")]
    UnknownFieldType {
        entity: String,
        field: String,
        type_name: String,
    },

    #[error("Invalid default for field {entity}.{field}: {reason}")]
    InvalidDefault {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Value of {length} characters exceeds the limit of {max}")]
    ValueTooLong { max: usize, length: usize },

    #[error("Column {column} does not accept null")]
    NullNotAllowed { column: String },

    #[error("Entity already defined: {0}")]
    DuplicateEntity(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Field {field} defined twice on {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("Unknown column {column} on {entity}")]
    UnknownColumn { entity: String, column: String },

    #[error("Relationship already registered: {0}")]
    DuplicateRelationship(String),

    #[error("Unknown relationship: {0}")]
    UnknownRelationship(String),

    #[error("Foreign key {entity}.{column} conflicts with an existing field")]
    ConflictingForeignKey { entity: String, column: String },
}

/// Errors raised by the seed workflow itself.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Required {entity} not found: {key}")]
    MissingRecord { entity: String, key: String },

    #[error("Count mismatch for {relation}: counted {counted}, fetched {fetched}")]
    CountMismatch {
        relation: String,
        counted: i64,
        fetched: usize,
    },
}

impl SeedError {
    pub fn missing(entity: &str, key: impl Into<String>) -> Self {
        SeedError::MissingRecord {
            entity: entity.to_string(),
            key: key.into(),
        }
    }
}
