use crate::document::Item;
use crate::error::{PaperDbError, Result};
use crate::schema::{FieldType, Schema};

pub const SHAPE_MISMATCH: &str = "Data does not match schema";

/// Result of checking a candidate item against a schema
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a candidate item against a collection schema.
///
/// Without a schema every shape is accepted. The candidate must carry
/// exactly as many fields as the schema declares; a count mismatch is
/// reported alone, before any type comparison. Otherwise every field whose
/// value has the wrong type tag is reported. Each error is also logged.
pub fn type_check(schema: Option<&Schema>, candidate: &Item) -> ValidationResult {
    let mut result = ValidationResult::default();

    let schema = match schema {
        Some(s) => s,
        None => return result,
    };

    if schema.len() != candidate.len() {
        log::warn!("{SHAPE_MISMATCH}");
        result.errors.push(SHAPE_MISMATCH.into());
        return result;
    }

    for (field_name, expected) in schema.iter() {
        let actual = type_name(candidate.get(field_name));
        if actual != expected.as_str() {
            let message = format!("Field '{field_name}' expected {expected}, got {actual}");
            log::warn!("{message}");
            result.errors.push(message);
        }
    }

    result
}

/// Run `type_check` and turn a failure into `SchemaMismatch`.
pub fn validate_item(schema: Option<&Schema>, candidate: &Item) -> Result<()> {
    let result = type_check(schema, candidate);
    if !result.is_ok() {
        return Err(PaperDbError::SchemaMismatch(result.errors));
    }
    Ok(())
}

fn type_name(value: Option<&serde_json::Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(v) => FieldType::of(v).map(|t| t.as_str()).unwrap_or("null"),
    }
}
