//! Structural validation of document text before decoding.
//!
//! The wire shape is checked against an embedded JSON Schema for resource
//! graph documents so callers get every violation with its JSON Pointer,
//! rather than the first serde error.

use serde_json::{json, Value};

use crate::document::Document;
use crate::error::{DecodeError, ShapeViolation};

fn document_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "anyOf": [
            { "required": ["data"] },
            { "required": ["errors"] },
            { "required": ["meta"] }
        ],
        "properties": {
            "data": {
                "oneOf": [
                    { "type": "null" },
                    { "$ref": "#/$defs/resource" },
                    { "type": "array", "items": { "$ref": "#/$defs/resource" } }
                ]
            },
            "included": { "type": "array", "items": { "$ref": "#/$defs/resource" } },
            "links": { "type": "object" },
            "meta": { "type": "object" },
            "errors": { "type": "array", "items": { "type": "object" } }
        },
        "$defs": {
            "identifier": {
                "type": "object",
                "required": ["type", "id"],
                "properties": {
                    "type": { "type": "string", "minLength": 1 },
                    "id": { "type": "string" },
                    "meta": { "type": "object" }
                }
            },
            "relationship": {
                "type": "object",
                "properties": {
                    "data": {
                        "oneOf": [
                            { "type": "null" },
                            { "$ref": "#/$defs/identifier" },
                            { "type": "array", "items": { "$ref": "#/$defs/identifier" } }
                        ]
                    },
                    "links": { "type": "object" },
                    "meta": { "type": "object" }
                }
            },
            "resource": {
                "type": "object",
                "required": ["type", "id"],
                "properties": {
                    "type": { "type": "string", "minLength": 1 },
                    "id": { "type": "string" },
                    "attributes": { "type": "object" },
                    "relationships": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/relationship" }
                    },
                    "links": { "type": "object" },
                    "meta": { "type": "object" }
                }
            }
        }
    })
}

/// Check a raw document against the wire shape.
///
/// # Errors
///
/// Returns `DecodeError::Malformed` carrying every violation found.
pub fn validate_document(raw: &Value) -> Result<(), DecodeError> {
    let schema = document_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| DecodeError::Malformed {
        violations: vec![ShapeViolation {
            path: String::new(),
            message: e.to_string(),
        }],
    })?;

    let violations: Vec<ShapeViolation> = validator
        .iter_errors(raw)
        .map(|e| ShapeViolation {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = violations.len(), "document failed shape check");
        Err(DecodeError::Malformed { violations })
    }
}

/// Convert a raw value into a [`Document`].
///
/// A conversion failure is reported as a single root-level violation.
pub fn into_document(raw: Value) -> Result<Document, DecodeError> {
    serde_json::from_value(raw).map_err(|e| DecodeError::Malformed {
        violations: vec![ShapeViolation {
            path: String::new(),
            message: e.to_string(),
        }],
    })
}
