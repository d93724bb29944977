pub mod json;

pub use json::{evaluate_document, stream_documents, stream_ndjson};
