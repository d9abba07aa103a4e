pub mod parser;
pub mod cache;
pub mod error;
pub mod export;
#[cfg(feature = "node")]
pub mod bridge;
pub mod analyzer {
    pub mod extract;
    pub mod metadata;
}


// Re-export selected API for consumers
pub use analyzer::extract::{extract_references, extract_references_tagged, ReferenceRecord, DEFAULT_SOURCE_TAG};
pub use error::{ExtractError, Result};
pub use parser::{scan_references, traverse_references, Keyword, RawReference, Span};
