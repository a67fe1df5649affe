use crate::error::{PaperDbError, Result};
use super::types::Schema;
use std::path::Path;

/// Parse a schema file (YAML or JSON) into a Schema
pub fn parse_schema(path: &Path) -> Result<Schema> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse schema text such as `{name: string, age: number}` into a Schema
pub fn parse_schema_str(content: &str) -> Result<Schema> {
    serde_yaml::from_str(content).map_err(|e| PaperDbError::InvalidSchema(e.to_string()))
}
