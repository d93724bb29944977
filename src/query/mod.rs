pub mod ast;
pub mod eval;
pub mod filter;
pub mod functions;
pub mod options;
pub mod parser;
pub mod result;
pub mod scanner;
pub mod value;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::PathError;
use crate::pointer::{JsonPointer, PointerSegment};

use self::ast::{Path, Scope, Selector};
use self::options::PathEvaluationOptions;
use self::result::{Document, PathResult};
use self::value::NodeList;

/// A parsed, immutable JSONPath query.
///
/// Cloning is cheap and a `JsonPath` may be shared between threads and
/// evaluated against any number of documents.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    path: Arc<Path>,
}

impl JsonPath {
    /// Parse with default options.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        Self::parse_with_options(text, &PathEvaluationOptions::default())
    }

    pub fn parse_with_options(
        text: &str,
        options: &PathEvaluationOptions,
    ) -> Result<Self, PathError> {
        let path = parser::parse_path(text, options)?;
        Ok(JsonPath {
            path: Arc::new(path),
        })
    }

    /// Parse, discarding the error. Suited to untrusted input.
    pub fn try_parse(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn try_parse_with_options(text: &str, options: &PathEvaluationOptions) -> Option<Self> {
        Self::parse_with_options(text, options).ok()
    }

    pub fn ast(&self) -> &Path {
        &self.path
    }

    /// True when the path can select at most one node.
    pub fn is_singular(&self) -> bool {
        self.path.is_singular()
    }

    /// Bind the path to a document. No work is done until the matches of the
    /// result are enumerated.
    pub fn evaluate<D: Document>(&self, document: D, options: &PathEvaluationOptions) -> PathResult<D> {
        log::debug!("evaluating {self}");
        PathResult::new(self.clone(), document, options.clone())
    }

    /// Evaluate with default options and collect every match.
    pub fn select(&self, document: &Value) -> Result<NodeList, PathError> {
        self.evaluate(document, &PathEvaluationOptions::default())
            .to_node_list()
    }

    /// The JSON Pointer addressing the single node a singular path selects.
    ///
    /// Fails for paths that are not singular, and also for singular paths
    /// with a negative index such as `$[-1]`: a pointer cannot count from
    /// the end of an array.
    pub fn as_json_pointer(&self) -> Result<JsonPointer, PathError> {
        if self.path.scope != Scope::Root {
            return Err(PathError::NotSingular(format!(
                "{self} is relative to the current node"
            )));
        }
        let mut pointer = JsonPointer::root();
        for (i, segment) in self.path.segments.iter().enumerate() {
            let reject = |what: String| {
                PathError::NotSingular(format!("{self}: segment {i} is {what}"))
            };
            if segment.recursive {
                return Err(reject("a descendant segment".into()));
            }
            let token = match segment.selectors.as_slice() {
                [Selector::Name(name)] => PointerSegment::Name(name.clone()),
                [Selector::Index(index)] => match usize::try_from(*index) {
                    Ok(index) => PointerSegment::Index(index),
                    Err(_) => return Err(reject(format!("a negative index ({index})"))),
                },
                [Selector::Wildcard] => return Err(reject("a wildcard".into())),
                [Selector::Slice(_)] => return Err(reject("a slice".into())),
                [Selector::Filter(_)] => return Err(reject("a filter".into())),
                selectors => {
                    return Err(reject(format!("a union of {} selectors", selectors.len())))
                }
            };
            pointer.push(token);
        }
        Ok(pointer)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
