//! Error types for schema registration, encoding, decoding and loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while classifying declarations into a registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("type '{type_name}' declares no fields")]
    EmptyFields { type_name: String },

    #[error("field '{type_name}.{field}' references unregistered type '{target}'")]
    UnknownTarget {
        type_name: String,
        field: String,
        target: String,
    },

    #[error(
        "field '{type_name}.{field}' names '{target}', which matches several types: {}",
        .candidates.join(", ")
    )]
    AmbiguousType {
        type_name: String,
        field: String,
        target: String,
        candidates: Vec<String>,
    },

    #[error("{kind} binding '{type_name}' references unregistered resource type '{resource_type}'")]
    UnregisteredBinding {
        kind: &'static str,
        type_name: String,
        resource_type: String,
    },

    #[error("resource type '{resource_type}' is claimed by both '{first}' and '{second}'")]
    DuplicateResourceType {
        resource_type: String,
        first: String,
        second: String,
    },

    #[error("field '{field}' is declared more than once on '{type_name}'")]
    DuplicateField { type_name: String, field: String },

    #[error("field '{type_name}.{field}' has invalid type expression \"{expr}\"")]
    InvalidTypeExpr {
        type_name: String,
        field: String,
        expr: String,
    },
}

/// Errors while encoding domain values into a document.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("required relationship '{field}' of '{resource_type}' is missing")]
    MissingRequiredRelationship {
        resource_type: String,
        field: String,
    },

    #[error("'{resource_type}' value has no usable id in field '{id_field}'")]
    MissingId {
        resource_type: String,
        id_field: String,
    },

    #[error("value for '{type_name}' is not an object (got {actual})")]
    NotAnObject {
        type_name: String,
        actual: &'static str,
    },

    #[error("relationship '{field}' of '{resource_type}' expects {expected}, got {actual}")]
    InvalidRelationshipValue {
        resource_type: String,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("conflicting versions of included resource {key}")]
    ConflictingDuplicate { key: String },

    #[error("polymorphic value has no registered type under discriminator '{discriminator}'")]
    UnknownDiscriminator { discriminator: String },

    #[error("cannot serialize value: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

/// A single wire-shape violation with its location.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ShapeViolation {
    /// JSON Pointer (RFC 6901) to the offending member.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors while decoding a document back into domain values.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("relationship '{field}' references {resource_type}/{id}, which is neither included nor primary data")]
    UnresolvedReference {
        field: String,
        resource_type: String,
        id: String,
    },

    #[error("relationship '{field}' expects type '{expected}', found '{found}'")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("required relationship '{field}' of '{resource_type}' is missing")]
    MissingRelationship {
        resource_type: String,
        field: String,
    },

    #[error("relationship '{field}' expects {expected} linkage")]
    LinkageShape {
        field: String,
        expected: &'static str,
    },

    #[error("resource type '{resource_type}' is not handled here")]
    UnknownResourceType { resource_type: String },

    #[error("document has no primary data")]
    MissingData,

    #[error("expected {expected} primary data")]
    DataShape { expected: &'static str },

    #[error("malformed document: {} violation(s)", .violations.len())]
    Malformed { violations: Vec<ShapeViolation> },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot deserialize '{type_name}': {source}")]
    Deserialize {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors while loading schema files or documents.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Any failure from the typed codec entry points.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("type '{type_name}' is not registered")]
    Unsupported { type_name: String },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl EncodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            EncodeError::Serialize { .. } => 2,
            _ => 1,
        }
    }
}

impl DecodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DecodeError::InvalidJson { .. } => 2,
            _ => 1,
        }
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
            LoadError::Schema(e) => e.exit_code(),
        }
    }
}

impl CodecError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CodecError::Unsupported { .. } => 2,
            CodecError::Encode(e) => e.exit_code(),
            CodecError::Decode(e) => e.exit_code(),
        }
    }
}
