use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::parser::scan_references;

/// Source tag used when the caller does not name the script's origin.
pub const DEFAULT_SOURCE_TAG: &str = "N/A";

/// One distinct table reference found in a script.
///
/// Field names in every tabular rendering are `Table Name`, `Schema Name` and
/// `File Name`, in that order; downstream reports depend on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceRecord {
    #[serde(rename = "Table Name")]
    pub table_name: String,
    /// Empty when the reference was not schema-qualified.
    #[serde(rename = "Schema Name")]
    pub schema_name: String,
    #[serde(rename = "File Name")]
    pub source_tag: String,
}

impl ReferenceRecord {
    /// The deduplication identity: `(schema, table)`, compared as written.
    pub fn key(&self) -> (&str, &str) {
        (&self.schema_name, &self.table_name)
    }
}

/// Extract the distinct table references of `sql`, tagged `"N/A"`.
pub fn extract_references(sql: &str) -> Vec<ReferenceRecord> {
    extract_references_tagged(sql, None)
}

/// Extract the distinct `(schema, table)` pairs of `sql` in order of first
/// occurrence. Comparison is case-sensitive: `dbo.Orders` and `dbo.orders`
/// are two records.
pub fn extract_references_tagged(sql: &str, source_tag: Option<&str>) -> Vec<ReferenceRecord> {
    let mut seen: IndexSet<(&str, &str)> = IndexSet::new();
    for reference in scan_references(sql) {
        let table = reference.table_name();
        if table.is_empty() {
            continue;
        }
        seen.insert((reference.schema_name(), table));
    }

    let source_tag = source_tag.unwrap_or(DEFAULT_SOURCE_TAG);
    seen.into_iter()
        .map(|(schema, table)| ReferenceRecord {
            table_name: table.to_string(),
            schema_name: schema.to_string(),
            source_tag: source_tag.to_string(),
        })
        .collect()
}

/// Like [`extract_references_tagged`] for raw file contents; anything that is
/// not UTF-8 text is rejected rather than decoded lossily.
pub fn extract_references_from_bytes(bytes: &[u8], source_tag: Option<&str>) -> Result<Vec<ReferenceRecord>> {
    let sql = std::str::from_utf8(bytes)
        .map_err(|e| ExtractError::InvalidInput(format!("SQL text is not valid UTF-8: {e}")))?;
    Ok(extract_references_tagged(sql, source_tag))
}
