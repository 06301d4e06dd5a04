//! Structural check of a queue spec document against an embedded JSON Schema.
//!
//! This catches shape problems (missing fields, wrong types) with readable
//! messages before semantic validation. Ranges and id contiguity are left to
//! [`QueueSet::validate`](crate::QueueSet::validate), which reports them with
//! dedicated error variants.

use serde_json::Value;

use crate::error::{ConfigError, Result};

/// JSON Schema (2020-12) for a queue spec file.
pub const QUEUE_SPEC_SCHEMA: &str = r#"{
    "$schema": "https://json-schema.org/draft/2020-12/schema",
    "title": "qlink queue spec",
    "type": "array",
    "items": {
        "type": "object",
        "properties": {
            "dir": { "type": "string" },
            "id": { "type": "integer" },
            "width_B": { "type": "integer" },
            "capacity_h_I": { "type": "integer" },
            "capacity_f_I": { "type": "integer" },
            "name": { "type": "string" }
        },
        "required": ["dir", "id", "width_B", "capacity_h_I", "capacity_f_I"]
    }
}"#;

/// Validate `document` against [`QUEUE_SPEC_SCHEMA`].
pub fn check_document(document: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(QUEUE_SPEC_SCHEMA)?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|err| ConfigError::Schema(format!("embedded schema invalid: {err}")))?;

    let mut errors = validator.iter_errors(document);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(ConfigError::Schema(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_document_passes() {
        let doc = serde_json::json!([
            {"dir": "h2f", "id": 0, "width_B": 8, "capacity_h_I": 4, "capacity_f_I": 4}
        ]);
        assert!(check_document(&doc).is_ok());
    }

    #[test]
    fn missing_field_fails() {
        let doc = serde_json::json!([{"dir": "h2f", "id": 0, "width_B": 8}]);
        assert!(matches!(check_document(&doc), Err(ConfigError::Schema(_))));
    }

    #[test]
    fn wrong_type_fails() {
        let doc = serde_json::json!([
            {"dir": "h2f", "id": "zero", "width_B": 8, "capacity_h_I": 4, "capacity_f_I": 4}
        ]);
        let err = check_document(&doc).unwrap_err();
        assert!(err.to_string().contains("schema check"));
    }

    #[test]
    fn object_root_fails() {
        let doc = serde_json::json!({"queues": []});
        assert!(check_document(&doc).is_err());
    }
}
