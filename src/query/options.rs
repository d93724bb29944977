use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::functions::{global_function, FunctionRegistry, PathFunction};

/// Resolves a data-reference URI to a document. `Ok(None)` means the target
/// exists but is empty and resolves to `null`.
pub type DataReferenceDownload = Arc<dyn Fn(&Url) -> Result<Option<Value>, String> + Send + Sync>;

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentalFeatures {
    /// Replace matches of the form `{"$ref": "<uri>"}` with the referenced data.
    pub process_data_references: bool,
    #[serde(skip)]
    pub data_reference_download: Option<DataReferenceDownload>,
}

impl fmt::Debug for ExperimentalFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentalFeatures")
            .field("process_data_references", &self.process_data_references)
            .field(
                "data_reference_download",
                &self.data_reference_download.as_ref().map(|_| "<hook>"),
            )
            .finish()
    }
}

/// Switches for optional grammar and evaluation features. Everything is off
/// by default, which gives plain RFC 9535 behavior.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathEvaluationOptions {
    /// `+ - * /` in filter value expressions.
    pub allow_math_operations: bool,
    /// `<value> in <array>` comparisons.
    pub allow_in_operator: bool,
    /// Array and object literals in filter expressions.
    pub allow_json_constructs: bool,
    /// A top-level path may start with `@`.
    pub allow_relative_path_start: bool,
    /// Ignore whitespace before and after the whole path.
    pub tolerate_extra_whitespace: bool,
    pub experimental: ExperimentalFeatures,
    /// Functions available to filters. `None` uses the process-wide registry.
    #[serde(skip)]
    pub functions: Option<Arc<FunctionRegistry>>,
}

impl PathEvaluationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_math_operations(mut self, enabled: bool) -> Self {
        self.allow_math_operations = enabled;
        self
    }

    pub fn with_in_operator(mut self, enabled: bool) -> Self {
        self.allow_in_operator = enabled;
        self
    }

    pub fn with_json_constructs(mut self, enabled: bool) -> Self {
        self.allow_json_constructs = enabled;
        self
    }

    pub fn with_relative_path_start(mut self, enabled: bool) -> Self {
        self.allow_relative_path_start = enabled;
        self
    }

    pub fn with_extra_whitespace(mut self, enabled: bool) -> Self {
        self.tolerate_extra_whitespace = enabled;
        self
    }

    pub fn with_functions(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.functions = Some(registry);
        self
    }

    pub fn with_data_references<F>(mut self, download: F) -> Self
    where
        F: Fn(&Url) -> Result<Option<Value>, String> + Send + Sync + 'static,
    {
        self.experimental.process_data_references = true;
        self.experimental.data_reference_download = Some(Arc::new(download));
        self
    }

    pub(crate) fn lookup_function(&self, name: &str) -> Option<Arc<dyn PathFunction>> {
        match &self.functions {
            Some(registry) => registry.get(name),
            None => global_function(name),
        }
    }
}
