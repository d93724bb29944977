//! Function extensions callable from filter expressions.
//!
//! Every function declares its parameter types and return category so calls
//! can be type-checked while the path is parsed. A process-wide registry holds
//! the built-ins (`length`, `count`, `value`, `match`, `search`) plus anything
//! added with [`register_function`]; callers that need isolation can build
//! their own [`FunctionRegistry`] and pass it through the options.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::PathError;

use super::value::PathValue;

/// Declared type of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    /// A single JSON value or Nothing: literals, singular queries, value functions.
    Value,
    /// A logical expression; queries are converted to an existence test.
    Logical,
    /// The node list of any query.
    Nodes,
}

/// What a function call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCategory {
    Value,
    Logical,
}

pub trait PathFunction: Send + Sync {
    fn name(&self) -> &str;

    fn parameter_types(&self) -> &[FunctionType];

    fn return_category(&self) -> ReturnCategory;

    /// Arguments arrive in declaration order: `Value` parameters as
    /// `PathValue::Node`/`Nothing`, `Logical` ones as `PathValue::Logical`,
    /// `Nodes` ones as `PathValue::NodeList`.
    fn invoke(&self, args: &[PathValue]) -> Result<PathValue, PathError>;
}

type Invoke = dyn Fn(&[PathValue]) -> Result<PathValue, PathError> + Send + Sync;

/// A function built from a name, a signature and a closure.
pub struct FunctionDefinition {
    name: String,
    parameter_types: Vec<FunctionType>,
    return_category: ReturnCategory,
    invoke: Box<Invoke>,
}

impl FunctionDefinition {
    pub fn new<F>(
        name: impl Into<String>,
        parameter_types: Vec<FunctionType>,
        return_category: ReturnCategory,
        invoke: F,
    ) -> Self
    where
        F: Fn(&[PathValue]) -> Result<PathValue, PathError> + Send + Sync + 'static,
    {
        FunctionDefinition {
            name: name.into(),
            parameter_types,
            return_category,
            invoke: Box::new(invoke),
        }
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("name", &self.name)
            .field("parameter_types", &self.parameter_types)
            .field("return_category", &self.return_category)
            .finish()
    }
}

impl PathFunction for FunctionDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_types(&self) -> &[FunctionType] {
        &self.parameter_types
    }

    fn return_category(&self) -> ReturnCategory {
        self.return_category
    }

    fn invoke(&self, args: &[PathValue]) -> Result<PathValue, PathError> {
        (self.invoke)(args)
    }
}

/// Function names follow the call syntax: a lowercase letter, then lowercase
/// letters, digits or underscores.
pub fn is_function_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// A name-keyed table of functions. Lookup is exact and case-sensitive.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn PathFunction>>,
}

impl FunctionRegistry {
    /// An empty registry, without the built-ins.
    pub fn new() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
        }
    }

    /// Add or replace a function.
    pub fn register<F: PathFunction + 'static>(&mut self, function: F) -> Result<(), PathError> {
        self.register_shared(Arc::new(function))
    }

    pub fn register_shared(&mut self, function: Arc<dyn PathFunction>) -> Result<(), PathError> {
        let name = function.name().to_string();
        if !is_function_name(&name) {
            return Err(PathError::Function {
                name,
                message: "function names must match [a-z][a-z0-9_]*".into(),
            });
        }
        log::debug!("registering path function {name}()");
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PathFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for FunctionRegistry {
    /// A registry populated with the built-in functions.
    fn default() -> Self {
        let mut registry = FunctionRegistry::new();
        for function in builtins() {
            registry
                .functions
                .insert(function.name().to_string(), Arc::new(function));
        }
        registry
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

static GLOBAL_FUNCTIONS: Lazy<RwLock<FunctionRegistry>> =
    Lazy::new(|| RwLock::new(FunctionRegistry::default()));

/// Add a function to the process-wide registry used by default parsing.
pub fn register_function<F: PathFunction + 'static>(function: F) -> Result<(), PathError> {
    GLOBAL_FUNCTIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(function)
}

/// Look up a function in the process-wide registry.
pub fn global_function(name: &str) -> Option<Arc<dyn PathFunction>> {
    GLOBAL_FUNCTIONS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
}

// ── Built-ins ──────────────────────────────────────────────────

fn builtins() -> Vec<FunctionDefinition> {
    vec![
        FunctionDefinition::new("length", vec![FunctionType::Value], ReturnCategory::Value, length),
        FunctionDefinition::new("count", vec![FunctionType::Nodes], ReturnCategory::Value, count),
        FunctionDefinition::new("value", vec![FunctionType::Nodes], ReturnCategory::Value, value),
        FunctionDefinition::new(
            "match",
            vec![FunctionType::Value, FunctionType::Value],
            ReturnCategory::Logical,
            |args| Ok(regex_test(args, true)),
        ),
        FunctionDefinition::new(
            "search",
            vec![FunctionType::Value, FunctionType::Value],
            ReturnCategory::Logical,
            |args| Ok(regex_test(args, false)),
        ),
    ]
}

fn length(args: &[PathValue]) -> Result<PathValue, PathError> {
    let len = match args.first().and_then(PathValue::as_value) {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(arr)) => arr.len(),
        Some(Value::Object(map)) => map.len(),
        _ => return Ok(PathValue::Nothing),
    };
    Ok(PathValue::Node(Value::Number(len.into())))
}

fn count(args: &[PathValue]) -> Result<PathValue, PathError> {
    let n = match args.first() {
        Some(PathValue::NodeList(nodes)) => nodes.len(),
        Some(PathValue::Node(_)) => 1,
        _ => 0,
    };
    Ok(PathValue::Node(Value::Number(n.into())))
}

fn value(args: &[PathValue]) -> Result<PathValue, PathError> {
    match args.first() {
        Some(PathValue::NodeList(nodes)) if nodes.len() == 1 => {
            Ok(PathValue::from_option(nodes.first().map(|m| m.value.clone())))
        }
        Some(PathValue::Node(v)) => Ok(PathValue::Node(v.clone())),
        _ => Ok(PathValue::Nothing),
    }
}

fn regex_test(args: &[PathValue], anchored: bool) -> PathValue {
    let subject = args.first().and_then(PathValue::as_value);
    let pattern = args.get(1).and_then(PathValue::as_value);
    let (Some(Value::String(subject)), Some(Value::String(pattern))) = (subject, pattern) else {
        return PathValue::Logical(false);
    };
    let matched = REGEX_CACHE
        .get_or_compile(pattern, anchored)
        .is_some_and(|re| re.is_match(subject));
    PathValue::Logical(matched)
}

/// Rewrite an I-Regexp pattern for the `regex` crate: an unescaped `.`
/// outside a character class must not match `\n` or `\r`.
pub(crate) fn translate_iregexp(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut in_class = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '.' if !in_class => out.push_str("[^\\n\\r]"),
            c => out.push(c),
        }
    }
    out
}

const REGEX_CACHE_LIMIT: usize = 64;

/// Compiled patterns keyed by translated source. Invalid patterns are
/// remembered as `None`.
struct RegexCache {
    cache: RwLock<HashMap<String, Option<Regex>>>,
}

impl RegexCache {
    fn new() -> Self {
        RegexCache {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str, anchored: bool) -> Option<Regex> {
        let translated = translate_iregexp(pattern);
        let source = if anchored {
            format!("^(?:{translated})$")
        } else {
            translated
        };

        if let Some(entry) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&source)
        {
            return entry.clone();
        }

        let compiled = match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                log::debug!("invalid regular expression {pattern:?}: {e}");
                None
            }
        };

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.len() < REGEX_CACHE_LIMIT {
            cache.insert(source, compiled.clone());
        }
        compiled
    }
}

static REGEX_CACHE: Lazy<RegexCache> = Lazy::new(RegexCache::new);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::JsonPointer;
    use crate::query::value::{Match, NodeList};
    use serde_json::json;

    fn node(v: Value) -> PathValue {
        PathValue::Node(v)
    }

    fn nodes(values: &[Value]) -> PathValue {
        PathValue::NodeList(
            values
                .iter()
                .map(|v| Match::new(v.clone(), JsonPointer::root()))
                .collect(),
        )
    }

    #[test]
    fn builtins_are_registered() {
        let registry = FunctionRegistry::default();
        assert_eq!(registry.names(), vec!["count", "length", "match", "search", "value"]);
        assert!(FunctionRegistry::new().names().is_empty());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = FunctionRegistry::default();
        assert!(registry.get("length").is_some());
        assert!(registry.get("Length").is_none());
    }

    #[test]
    fn test_length() {
        assert_eq!(length(&[node(json!("héllo"))]).unwrap(), node(json!(5)));
        assert_eq!(length(&[node(json!([1, 2, 3]))]).unwrap(), node(json!(3)));
        assert_eq!(length(&[node(json!({"a": 1}))]).unwrap(), node(json!(1)));
        assert_eq!(length(&[node(json!(42))]).unwrap(), PathValue::Nothing);
        assert_eq!(length(&[PathValue::Nothing]).unwrap(), PathValue::Nothing);
    }

    #[test]
    fn test_count_and_value() {
        assert_eq!(count(&[nodes(&[json!(1), json!(2)])]).unwrap(), node(json!(2)));
        assert_eq!(count(&[PathValue::NodeList(NodeList::new())]).unwrap(), node(json!(0)));
        assert_eq!(value(&[nodes(&[json!("x")])]).unwrap(), node(json!("x")));
        assert_eq!(value(&[nodes(&[json!(1), json!(2)])]).unwrap(), PathValue::Nothing);
    }

    #[test]
    fn test_match_is_anchored() {
        let args = [node(json!("1974-05-01")), node(json!("1974-05-.."))];
        assert_eq!(regex_test(&args, true), PathValue::Logical(true));
        let args = [node(json!("x1974-05-01")), node(json!("1974-05-.."))];
        assert_eq!(regex_test(&args, true), PathValue::Logical(false));
        assert_eq!(regex_test(&args, false), PathValue::Logical(true));
    }

    #[test]
    fn dot_does_not_match_line_breaks() {
        let args = [node(json!("a\nb")), node(json!("a.b"))];
        assert_eq!(regex_test(&args, true), PathValue::Logical(false));
        assert_eq!(translate_iregexp(r"a\.[.]."), r"a\.[.][^\n\r]");
    }

    #[test]
    fn invalid_pattern_or_non_string_is_false() {
        let args = [node(json!("abc")), node(json!("("))];
        assert_eq!(regex_test(&args, false), PathValue::Logical(false));
        let args = [node(json!(1)), node(json!("1"))];
        assert_eq!(regex_test(&args, false), PathValue::Logical(false));
    }

    #[test]
    fn register_validates_names() {
        let mut registry = FunctionRegistry::new();
        let bad = FunctionDefinition::new("Bad", vec![], ReturnCategory::Logical, |_| {
            Ok(PathValue::Logical(true))
        });
        assert!(registry.register(bad).is_err());
        let good = FunctionDefinition::new("always", vec![], ReturnCategory::Logical, |_| {
            Ok(PathValue::Logical(true))
        });
        registry.register(good).unwrap();
        assert!(registry.contains("always"));
    }
}
