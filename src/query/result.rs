use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use url::Url;

use crate::error::PathError;
use crate::pointer::JsonPointer;

use super::eval::Walker;
use super::options::{ExperimentalFeatures, PathEvaluationOptions};
use super::value::{Match, NodeList};
use super::JsonPath;

/// A source a path can be evaluated against.
///
/// Enumerating matches borrows the document once per step, so changes made
/// between steps (or between enumerations) are observed. Mutating the
/// document from another thread while an enumeration is in progress is the
/// caller's responsibility: `Rc<RefCell<_>>` panics if it is mutably
/// borrowed during a step, and `Arc<RwLock<_>>` blocks.
pub trait Document {
    fn with_root<R>(&self, f: impl FnOnce(&Value) -> R) -> R;
}

impl Document for Value {
    fn with_root<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(self)
    }
}

impl<T: Document + ?Sized> Document for &T {
    fn with_root<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        (**self).with_root(f)
    }
}

impl Document for Rc<RefCell<Value>> {
    fn with_root<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.borrow())
    }
}

impl Document for Arc<RwLock<Value>> {
    fn with_root<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

/// The outcome of [`JsonPath::evaluate`].
///
/// Nothing is computed up front: every call to [`PathResult::matches`]
/// walks the document as it is at that moment.
pub struct PathResult<D> {
    path: JsonPath,
    document: D,
    options: PathEvaluationOptions,
    error: Mutex<Option<String>>,
}

impl<D: Document> PathResult<D> {
    pub(crate) fn new(path: JsonPath, document: D, options: PathEvaluationOptions) -> Self {
        PathResult {
            path,
            document,
            options,
            error: Mutex::new(None),
        }
    }

    /// A fresh, lazy enumeration of the matches.
    ///
    /// An evaluation error ends the enumeration early and is then reported
    /// by [`PathResult::error`]. A plain `for` loop cannot tell that apart
    /// from running out of matches, so check `error()` after the loop or
    /// drive the enumeration with [`Matches::try_next`].
    pub fn matches(&self) -> Matches<'_, D> {
        self.set_error(None);
        Matches {
            result: self,
            walker: Walker::new(JsonPointer::root()),
            finished: false,
        }
    }

    /// The error that ended the most recent enumeration, if any.
    pub fn error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Enumerate every match, failing on the first evaluation error.
    pub fn to_node_list(&self) -> Result<NodeList, PathError> {
        let mut matches = self.matches();
        let mut nodes = Vec::new();
        loop {
            match matches.try_next()? {
                Some(found) => nodes.push(found),
                None => return Ok(NodeList(nodes)),
            }
        }
    }

    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    fn set_error(&self, error: Option<String>) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }
}

/// Iterator over the matches of one enumeration.
pub struct Matches<'a, D> {
    result: &'a PathResult<D>,
    walker: Walker,
    finished: bool,
}

impl<D: Document> Matches<'_, D> {
    /// Like [`Iterator::next`], but returns the error that ends the
    /// enumeration instead of only recording it.
    pub fn try_next(&mut self) -> Result<Option<Match>, PathError> {
        if self.finished {
            return Ok(None);
        }
        let result = self.result;
        let walker = &mut self.walker;
        let step = result.document.with_root(|root| -> Result<Option<Match>, PathError> {
            let segments = &result.path.ast().segments;
            while let Some(location) = walker.next(segments, root)? {
                let Some(value) = location.resolve(root) else {
                    continue;
                };
                let value = if result.options.experimental.process_data_references {
                    resolve_data_reference(value.clone(), &result.options.experimental)?
                } else {
                    value.clone()
                };
                return Ok(Some(Match::new(value, location)));
            }
            Ok(None)
        });
        match step {
            Ok(Some(found)) => Ok(Some(found)),
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(err) => {
                self.finished = true;
                log::debug!("evaluation of {} failed: {err}", result.path);
                result.set_error(Some(err.to_string()));
                Err(err)
            }
        }
    }
}

impl<D: Document> Iterator for Matches<'_, D> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.try_next().ok().flatten()
    }
}

/// Replace `{"$ref": "<uri>"}` with the data the download hook returns for
/// it. Any other value is returned unchanged.
fn resolve_data_reference(
    value: Value,
    features: &ExperimentalFeatures,
) -> Result<Value, PathError> {
    let reference = match &value {
        Value::Object(map) if map.len() == 1 => match map.get("$ref") {
            Some(Value::String(reference)) => reference.clone(),
            _ => return Ok(value),
        },
        _ => return Ok(value),
    };

    let download = features.data_reference_download.as_ref().ok_or_else(|| {
        PathError::DataReference(format!("no download hook configured for '{reference}'"))
    })?;
    let url = Url::parse(&reference)
        .map_err(|e| PathError::DataReference(format!("invalid reference '{reference}': {e}")))?;

    log::debug!("resolving data reference {url}");
    let Some(document) = download(&url)
        .map_err(|e| PathError::DataReference(format!("failed to resolve '{url}': {e}")))?
    else {
        return Ok(Value::Null);
    };

    match url.fragment() {
        None | Some("") => Ok(document),
        Some(fragment) => {
            let pointer = JsonPointer::parse(fragment)
                .map_err(|e| PathError::DataReference(format!("bad fragment in '{url}': {e}")))?;
            pointer.resolve(&document).cloned().ok_or_else(|| {
                PathError::DataReference(format!("fragment '#{fragment}' not found in '{url}'"))
            })
        }
    }
}
