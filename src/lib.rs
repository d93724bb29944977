//! JSONPath (RFC 9535) queries over `serde_json` values.
//!
//! ```
//! use jpq::{JsonPath, PathEvaluationOptions};
//! use serde_json::json;
//!
//! let doc = json!({"store": {"book": [{"price": 8.95}, {"price": 22.99}]}});
//! let path = JsonPath::parse("$..book[?@.price < 10]").unwrap();
//! let result = path.evaluate(&doc, &PathEvaluationOptions::default());
//! let first = result.matches().next().unwrap();
//! assert_eq!(first.location.to_string(), "/store/book/0");
//! ```

pub mod error;
pub mod format;
pub mod output;
pub mod parser;
pub mod pointer;
pub mod query;
pub mod stream;

pub use error::PathError;
pub use pointer::{JsonPointer, PointerSegment};
pub use query::functions::{
    global_function, register_function, FunctionDefinition, FunctionRegistry, FunctionType,
    PathFunction, ReturnCategory,
};
pub use query::options::{DataReferenceDownload, ExperimentalFeatures, PathEvaluationOptions};
pub use query::parser::MAX_NESTING_DEPTH;
pub use query::result::{Document, Matches, PathResult};
pub use query::scanner::try_parse_json_element;
pub use query::value::{Match, NodeList, PathValue};
pub use query::JsonPath;
