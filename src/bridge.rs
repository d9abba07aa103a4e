use crate::analyzer::extract::{self, ReferenceRecord};
use crate::parser;
use napi::bindgen_prelude::*;
use napi_derive::napi;

#[napi(object)]
pub struct JsReference {
    pub table_name: String,
    pub schema_name: String,
    pub file_name: String,
}

impl From<ReferenceRecord> for JsReference {
    fn from(r: ReferenceRecord) -> Self {
        JsReference {
            table_name: r.table_name,
            schema_name: r.schema_name,
            file_name: r.source_tag,
        }
    }
}

#[napi]
pub fn extract_references(sql: String, source_tag: Option<String>) -> Vec<JsReference> {
    extract::extract_references_tagged(&sql, source_tag.as_deref())
        .into_iter()
        .map(JsReference::from)
        .collect()
}

/// Same records serialized with the `Table Name` / `Schema Name` / `File Name` keys.
#[napi]
pub fn extract_references_json(sql: String, source_tag: Option<String>) -> Result<String> {
    let records = extract::extract_references_tagged(&sql, source_tag.as_deref());
    serde_json::to_string(&records)
        .map_err(|e| Error::from_reason(format!("serialize references failed: {}", e)))
}

#[napi(object)]
pub struct ScanStats {
    pub matches_seen: u32,
    pub unique_references: u32,
}

struct Counter(u32);

impl parser::Visitor for Counter {
    fn visit(&mut self, _reference: &parser::RawReference<'_>) {
        self.0 = self.0.saturating_add(1);
    }
}

#[napi]
pub fn scan_stats(sql: String) -> ScanStats {
    let mut counter = Counter(0);
    parser::traverse_references(&sql, &mut counter);
    let unique = extract::extract_references(&sql).len();
    ScanStats {
        matches_seen: counter.0,
        unique_references: u32::try_from(unique).unwrap_or(u32::MAX),
    }
}
