//! Path evaluation.
//!
//! A [`Walker`] is a pull-based state machine over a path's segments. It
//! keeps locations, never references, so every call to [`Walker::next`] can
//! borrow the document afresh and see its current state. Each segment is
//! expanded lazily for one input node at a time, and filter predicates run
//! only when a candidate is reached, so taking the first match does the
//! least possible work.

use std::borrow::Cow;
use std::collections::HashSet;

use serde_json::Value;

use crate::error::PathError;
use crate::pointer::{JsonPointer, PointerSegment};

use super::ast::*;
use super::value::{arithmetic, compare, Match, NodeList, PathValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Fresh,
    Running,
    Done,
}

/// Enumerates the locations a path selects, starting from `start`.
///
/// The same segment slice and a document with the same structure must be
/// passed to every call of [`Walker::next`].
#[derive(Debug)]
pub(crate) struct Walker {
    start: JsonPointer,
    frames: Vec<Frame>,
    /// Output already produced by each recursive segment.
    seen: Vec<HashSet<JsonPointer>>,
    state: WalkState,
}

impl Walker {
    pub fn new(start: JsonPointer) -> Self {
        Walker {
            start,
            frames: Vec::new(),
            seen: Vec::new(),
            state: WalkState::Fresh,
        }
    }

    /// The next selected location, or `None` once the walk is complete.
    pub fn next(
        &mut self,
        segments: &[Segment],
        root: &Value,
    ) -> Result<Option<JsonPointer>, PathError> {
        match self.state {
            WalkState::Done => return Ok(None),
            WalkState::Running => {}
            WalkState::Fresh => {
                self.state = WalkState::Running;
                if self.start.resolve(root).is_none() {
                    self.state = WalkState::Done;
                    return Ok(None);
                }
                let Some(first) = segments.first() else {
                    self.state = WalkState::Done;
                    return Ok(Some(self.start.clone()));
                };
                self.seen = segments.iter().map(|_| HashSet::new()).collect();
                self.frames.push(Frame::new(self.start.clone(), first));
            }
        }

        while let Some(depth) = self.frames.len().checked_sub(1) {
            let Some(segment) = segments.get(depth) else {
                break;
            };
            let Some(found) = self.frames[depth].next_output(segment, root)? else {
                self.frames.pop();
                continue;
            };
            if segment.recursive && !self.seen[depth].insert(found.clone()) {
                continue;
            }
            match segments.get(depth + 1) {
                None => return Ok(Some(found)),
                Some(next_segment) => self.frames.push(Frame::new(found, next_segment)),
            }
        }

        self.state = WalkState::Done;
        self.frames.clear();
        Ok(None)
    }
}

/// One segment being applied to one input node.
#[derive(Debug)]
struct Frame {
    /// The node the selectors are applied to: the input itself, or for a
    /// recursive segment, the descendant currently visited.
    current: JsonPointer,
    descendants: Option<Descendants>,
    selector: usize,
    cursor: Option<SelectorCursor>,
}

impl Frame {
    fn new(input: JsonPointer, segment: &Segment) -> Self {
        Frame {
            current: input,
            descendants: segment.recursive.then(Descendants::default),
            selector: 0,
            cursor: None,
        }
    }

    fn next_output(
        &mut self,
        segment: &Segment,
        root: &Value,
    ) -> Result<Option<JsonPointer>, PathError> {
        loop {
            if let Some(cursor) = &mut self.cursor {
                let selector = &segment.selectors[self.selector];
                if let Some(found) = cursor.next(selector, &self.current, root)? {
                    return Ok(Some(found));
                }
                self.cursor = None;
                self.selector += 1;
                continue;
            }

            if let Some(selector) = segment.selectors.get(self.selector) {
                match self.current.resolve(root) {
                    Some(node) => self.cursor = Some(SelectorCursor::new(selector, node)),
                    None => self.selector = segment.selectors.len(),
                }
                continue;
            }

            let Some(descendants) = &mut self.descendants else {
                return Ok(None);
            };
            match descendants.advance(&self.current, root) {
                Some(next) => {
                    self.current = next;
                    self.selector = 0;
                }
                None => return Ok(None),
            }
        }
    }
}

/// Pre-order depth-first cursor over the descendants of a node.
#[derive(Debug, Default)]
struct Descendants {
    pending: Vec<(JsonPointer, std::vec::IntoIter<PointerSegment>)>,
}

impl Descendants {
    /// Queue the children of `visited` and move to the next node.
    fn advance(&mut self, visited: &JsonPointer, root: &Value) -> Option<JsonPointer> {
        if let Some(node) = visited.resolve(root) {
            let children = child_segments(node);
            if !children.is_empty() {
                self.pending.push((visited.clone(), children.into_iter()));
            }
        }
        while let Some((parent, children)) = self.pending.last_mut() {
            if let Some(child) = children.next() {
                return Some(parent.join(child));
            }
            self.pending.pop();
        }
        None
    }
}

fn child_segments(node: &Value) -> Vec<PointerSegment> {
    match node {
        Value::Array(items) => (0..items.len()).map(PointerSegment::Index).collect(),
        Value::Object(map) => map.keys().cloned().map(PointerSegment::Name).collect(),
        _ => Vec::new(),
    }
}

/// Progress of one selector over the children of one node.
#[derive(Debug)]
enum SelectorCursor {
    Once(Option<PointerSegment>),
    /// Array positions from `next` towards `stop` (exclusive).
    Positions { next: i64, stop: i64, step: i64 },
    /// Object member names, captured when the selector started.
    Members(std::vec::IntoIter<String>),
}

impl SelectorCursor {
    fn new(selector: &Selector, node: &Value) -> Self {
        match (selector, node) {
            (Selector::Name(name), Value::Object(_)) => {
                SelectorCursor::Once(Some(PointerSegment::Name(name.clone())))
            }
            (Selector::Index(index), Value::Array(items)) => {
                SelectorCursor::Once(normalize_index(*index, items.len()).map(PointerSegment::Index))
            }
            (Selector::Slice(slice), Value::Array(items)) => slice_positions(slice, items.len()),
            (Selector::Wildcard | Selector::Filter(_), Value::Array(items)) => {
                SelectorCursor::Positions {
                    next: 0,
                    stop: items.len() as i64,
                    step: 1,
                }
            }
            (Selector::Wildcard | Selector::Filter(_), Value::Object(map)) => {
                let keys: Vec<String> = map.keys().cloned().collect();
                SelectorCursor::Members(keys.into_iter())
            }
            _ => SelectorCursor::Once(None),
        }
    }

    fn next(
        &mut self,
        selector: &Selector,
        parent: &JsonPointer,
        root: &Value,
    ) -> Result<Option<JsonPointer>, PathError> {
        loop {
            let segment = match self {
                SelectorCursor::Once(slot) => match slot.take() {
                    Some(segment) => segment,
                    None => return Ok(None),
                },
                SelectorCursor::Positions { next, stop, step } => {
                    let in_range = if *step > 0 { *next < *stop } else { *next > *stop };
                    if !in_range {
                        return Ok(None);
                    }
                    let position = *next;
                    *next += *step;
                    match usize::try_from(position) {
                        Ok(index) => PointerSegment::Index(index),
                        Err(_) => return Ok(None),
                    }
                }
                SelectorCursor::Members(keys) => match keys.next() {
                    Some(key) => PointerSegment::Name(key),
                    None => return Ok(None),
                },
            };

            let location = parent.join(segment);
            // the document may have changed since the cursor was created
            let Some(value) = location.resolve(root) else {
                continue;
            };
            if let Selector::Filter(filter) = selector {
                let cx = FilterContext {
                    root,
                    current: value,
                    location: &location,
                };
                if !eval_logical(&filter.expression, &cx)? {
                    continue;
                }
            }
            return Ok(Some(location));
        }
    }
}

/// Resolve a possibly negative index against an array length.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let position = if index < 0 { len + index } else { index };
    if (0..len).contains(&position) {
        usize::try_from(position).ok()
    } else {
        None
    }
}

fn slice_positions(slice: &Slice, len: usize) -> SelectorCursor {
    let len = len as i64;
    let step = slice.step.unwrap_or(1);
    if step == 0 {
        return SelectorCursor::Once(None);
    }
    let normalize = |i: i64| if i >= 0 { i } else { len + i };
    if step > 0 {
        let lower = normalize(slice.start.unwrap_or(0)).clamp(0, len);
        let upper = normalize(slice.end.unwrap_or(len)).clamp(0, len);
        SelectorCursor::Positions {
            next: lower,
            stop: upper,
            step,
        }
    } else {
        let upper = normalize(slice.start.unwrap_or(len - 1)).clamp(-1, len - 1);
        let lower = normalize(slice.end.unwrap_or(-len - 1)).clamp(-1, len - 1);
        SelectorCursor::Positions {
            next: upper,
            stop: lower,
            step,
        }
    }
}

// ── Filter expressions ─────────────────────────────────────────

/// Bindings for one filter test: `$` is `root`, `@` is `current`.
struct FilterContext<'a> {
    root: &'a Value,
    current: &'a Value,
    location: &'a JsonPointer,
}

impl FilterContext<'_> {
    fn start_of(&self, path: &Path) -> JsonPointer {
        match path.scope {
            Scope::Root => JsonPointer::root(),
            Scope::Current => self.location.clone(),
        }
    }
}

fn eval_logical(expr: &LogicalExpr, cx: &FilterContext<'_>) -> Result<bool, PathError> {
    match expr {
        LogicalExpr::Binary {
            left,
            op: LogicalOp::And,
            right,
            ..
        } => Ok(eval_logical(left, cx)? && eval_logical(right, cx)?),
        LogicalExpr::Binary {
            left,
            op: LogicalOp::Or,
            right,
            ..
        } => Ok(eval_logical(left, cx)? || eval_logical(right, cx)?),
        LogicalExpr::Not { operand, .. } => Ok(!eval_logical(operand, cx)?),
        LogicalExpr::Comparison { left, op, right } => {
            let left = eval_value(left, cx)?;
            let right = eval_value(right, cx)?;
            Ok(compare(left.as_deref(), *op, right.as_deref()))
        }
        LogicalExpr::Exists(path) => {
            let mut walker = Walker::new(cx.start_of(path));
            Ok(walker.next(&path.segments, cx.root)?.is_some())
        }
        LogicalExpr::Function(call) => Ok(invoke(call, cx)?.is_truthy()),
    }
}

/// `None` is Nothing.
fn eval_value<'a>(
    expr: &'a ValueExpr,
    cx: &FilterContext<'a>,
) -> Result<Option<Cow<'a, Value>>, PathError> {
    match expr {
        ValueExpr::Literal(value) => Ok(Some(Cow::Borrowed(value))),
        ValueExpr::Query(path) => Ok(singular_value(path, cx).map(Cow::Borrowed)),
        ValueExpr::Function(call) => Ok(invoke(call, cx)?.into_value().map(Cow::Owned)),
        ValueExpr::Arithmetic {
            left, op, right, ..
        } => {
            let Some(left) = eval_value(left, cx)? else {
                return Ok(None);
            };
            let right = eval_value(right, cx)?;
            Ok(arithmetic(Some(&*left), *op, right.as_deref()).map(Cow::Owned))
        }
    }
}

/// Direct lookup for a path made only of single name/index segments.
fn singular_value<'a>(path: &Path, cx: &FilterContext<'a>) -> Option<&'a Value> {
    let mut node = match path.scope {
        Scope::Root => cx.root,
        Scope::Current => cx.current,
    };
    for segment in &path.segments {
        node = match segment.selectors.first()? {
            Selector::Name(name) => node.as_object()?.get(name)?,
            Selector::Index(index) => {
                let items = node.as_array()?;
                items.get(normalize_index(*index, items.len())?)?
            }
            _ => return None,
        };
    }
    Some(node)
}

fn node_list(path: &Path, cx: &FilterContext<'_>) -> Result<NodeList, PathError> {
    let mut walker = Walker::new(cx.start_of(path));
    let mut nodes = Vec::new();
    while let Some(location) = walker.next(&path.segments, cx.root)? {
        if let Some(value) = location.resolve(cx.root) {
            nodes.push(Match::new(value.clone(), location));
        }
    }
    Ok(NodeList(nodes))
}

fn invoke(call: &FunctionCall, cx: &FilterContext<'_>) -> Result<PathValue, PathError> {
    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        args.push(match arg {
            FunctionArg::Value(expr) => {
                PathValue::from_option(eval_value(expr, cx)?.map(Cow::into_owned))
            }
            FunctionArg::Logical(expr) => PathValue::Logical(eval_logical(expr, cx)?),
            FunctionArg::Nodes(path) => PathValue::NodeList(node_list(path, cx)?),
        });
    }
    call.function.invoke(&args)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::query::functions::{FunctionDefinition, FunctionRegistry, ReturnCategory};
    use crate::query::options::PathEvaluationOptions;
    use crate::query::parser::parse_path;

    fn run(text: &str, doc: &Value, options: &PathEvaluationOptions) -> Vec<Value> {
        let path = parse_path(text, options).unwrap();
        let mut walker = Walker::new(JsonPointer::root());
        let mut out = Vec::new();
        while let Some(location) = walker.next(&path.segments, doc).unwrap() {
            out.push(location.resolve(doc).cloned().unwrap());
        }
        out
    }

    fn query(text: &str, doc: &Value) -> Vec<Value> {
        run(text, doc, &PathEvaluationOptions::default())
    }

    fn locations(text: &str, doc: &Value) -> Vec<String> {
        let path = parse_path(text, &PathEvaluationOptions::default()).unwrap();
        let mut walker = Walker::new(JsonPointer::root());
        let mut out = Vec::new();
        while let Some(location) = walker.next(&path.segments, doc).unwrap() {
            out.push(location.to_string());
        }
        out
    }

    #[test]
    fn root_selects_document() {
        let doc = json!({"a": 1});
        assert_eq!(query("$", &doc), vec![doc.clone()]);
    }

    #[test]
    fn name_selector_is_shape_tolerant() {
        let doc = json!({"a": {"b": 1}, "list": [1, 2]});
        assert_eq!(query("$.a.b", &doc), vec![json!(1)]);
        assert!(query("$.missing", &doc).is_empty());
        assert!(query("$.list.b", &doc).is_empty());
        assert!(query("$.a.b.c", &doc).is_empty());
    }

    #[test]
    fn index_selector() {
        let doc = json!(["a", "b", "c"]);
        assert_eq!(query("$[0]", &doc), vec![json!("a")]);
        assert_eq!(query("$[-1]", &doc), vec![json!("c")]);
        assert!(query("$[3]", &doc).is_empty());
        assert!(query("$[-4]", &doc).is_empty());
        assert_eq!(query("$[0,0]", &doc), vec![json!("a"), json!("a")]);
    }

    #[test]
    fn slice_selector() {
        let doc = json!([0, 1, 2, 3, 4, 5]);
        assert_eq!(query("$[1:3]", &doc), vec![json!(1), json!(2)]);
        assert_eq!(query("$[-2:]", &doc), vec![json!(4), json!(5)]);
        assert_eq!(query("$[::2]", &doc), vec![json!(0), json!(2), json!(4)]);
        assert_eq!(
            query("$[::-1]", &doc),
            vec![json!(5), json!(4), json!(3), json!(2), json!(1), json!(0)]
        );
        assert_eq!(query("$[:-3:-1]", &doc), vec![json!(5), json!(4)]);
        assert_eq!(query("$[-100:2]", &doc), vec![json!(0), json!(1)]);
        assert!(query("$[5:1]", &doc).is_empty());
        assert!(query("$[::0]", &doc).is_empty());
        assert!(query("$[1:3]", &json!({"a": 1})).is_empty());
    }

    #[test]
    fn wildcard_keeps_document_order() {
        let doc = json!({"z": 1, "a": 2, "m": [3, 4]});
        assert_eq!(query("$.*", &doc), vec![json!(1), json!(2), json!([3, 4])]);
        assert_eq!(query("$.m[*]", &doc), vec![json!(3), json!(4)]);
        assert!(query("$.z.*", &doc).is_empty());
    }

    #[test]
    fn descendants_are_pre_order() {
        let doc = json!({"a": [1, {"b": 2}], "c": 3});
        assert_eq!(
            query("$..*", &doc),
            vec![json!([1, {"b": 2}]), json!(3), json!(1), json!({"b": 2}), json!(2)]
        );
        assert_eq!(
            locations("$..*", &doc),
            vec!["/a", "/c", "/a/0", "/a/1", "/a/1/b"]
        );
    }

    #[test]
    fn recursive_segment_deduplicates() {
        let doc = json!([[1]]);
        assert_eq!(query("$..[0,0]", &doc), vec![json!([1]), json!(1)]);
    }

    #[test]
    fn descendant_names() {
        let doc = json!({"a": {"k": 1, "b": {"k": 2}}, "k": 0});
        assert_eq!(query("$..k", &doc), vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn filter_comparisons() {
        let doc = json!([{"a": 1}, {"a": 2}, {"a": "x"}, {"b": 3}]);
        assert_eq!(query("$[?@.a>1]", &doc), vec![json!({"a": 2})]);
        assert_eq!(query("$[?@.a==\"x\"]", &doc), vec![json!({"a": "x"})]);
        assert_eq!(query("$[?@.a]", &doc).len(), 3);
        assert_eq!(query("$[?!@.a]", &doc), vec![json!({"b": 3})]);
        assert_eq!(query("$[?@.a!=1]", &doc).len(), 3);
    }

    #[test]
    fn nothing_equals_nothing() {
        let doc = json!([{"a": 1}, {"b": 2}]);
        assert_eq!(query("$[?@.x==@.y]", &doc).len(), 2);
        assert_eq!(query("$[?@.a==@.y]", &doc), vec![json!({"b": 2})]);
    }

    #[test]
    fn existence_includes_null() {
        let doc = json!([{"a": null}, {}]);
        assert_eq!(query("$[?@.a]", &doc), vec![json!({"a": null})]);
        assert_eq!(query("$[?@.a==null]", &doc), vec![json!({"a": null})]);
    }

    #[test]
    fn filter_over_object_members() {
        let doc = json!({"x": {"v": 1}, "y": {"v": 5}});
        assert_eq!(query("$[?@.v>2]", &doc), vec![json!({"v": 5})]);
    }

    #[test]
    fn filter_sees_root() {
        let doc = json!({"limit": 3, "items": [1, 5, 2]});
        assert_eq!(query("$.items[?@<$.limit]", &doc), vec![json!(1), json!(2)]);
    }

    #[test]
    fn nested_filters() {
        let doc = json!([{"tags": [{"n": "a"}]}, {"tags": [{"n": "b"}]}]);
        assert_eq!(
            query("$[?@.tags[?@.n==\"b\"]]", &doc),
            vec![json!({"tags": [{"n": "b"}]})]
        );
    }

    #[test]
    fn builtin_functions() {
        let doc = json!([
            {"name": "apple", "tags": ["a", "b"]},
            {"name": "fig", "tags": []},
            {"name": "kiwi\nfruit", "tags": ["c"]}
        ]);
        assert_eq!(query("$[?length(@.name)==3].name", &doc), vec![json!("fig")]);
        assert_eq!(query("$[?count(@.tags[*])>1].name", &doc), vec![json!("apple")]);
        assert_eq!(query("$[?match(@.name,\"a.*\")].name", &doc), vec![json!("apple")]);
        assert_eq!(query("$[?search(@.name,\"i\")]", &doc).len(), 2);
        assert!(query("$[?match(@.name,\"kiwi.fruit\")]", &doc).is_empty());
        assert_eq!(query("$[?value(@.tags[0])==\"c\"].name", &doc).len(), 1);
    }

    #[test]
    fn in_and_arithmetic() {
        let options = PathEvaluationOptions::default()
            .with_in_operator(true)
            .with_json_constructs(true)
            .with_math_operations(true);
        let doc = json!([{"a": 1, "b": 4}, {"a": 2, "b": 3}, {"a": 3, "b": 0}]);
        assert_eq!(run("$[?@.a in [1,3]].a", &doc, &options), vec![json!(1), json!(3)]);
        assert_eq!(run("$[?@.a+@.b==5].a", &doc, &options), vec![json!(1), json!(2)]);
        assert_eq!(run("$[?(@.a+@.b)*2==10].a", &doc, &options).len(), 2);
        // division by zero is Nothing, never equal to a number
        assert_eq!(run("$[?@.a/@.b>0].a", &doc, &options), vec![json!(1), json!(2)]);
        assert!(run("$[?@.missing+1==1]", &doc, &options).is_empty());
    }

    #[test]
    fn function_errors_propagate() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(FunctionDefinition::new(
                "fail",
                vec![],
                ReturnCategory::Logical,
                |_| {
                    Err(PathError::Function {
                        name: "fail".into(),
                        message: "boom".into(),
                    })
                },
            ))
            .unwrap();
        let options = PathEvaluationOptions::default().with_functions(Arc::new(registry));
        let path = parse_path("$[?fail()]", &options).unwrap();
        let doc = json!([1]);
        let mut walker = Walker::new(JsonPointer::root());
        let err = walker.next(&path.segments, &doc).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn walk_sees_changes_between_steps() {
        let path = parse_path("$[*]", &PathEvaluationOptions::default()).unwrap();
        let mut doc = json!([1, 2]);
        let mut walker = Walker::new(JsonPointer::root());
        assert_eq!(walker.next(&path.segments, &doc).unwrap().unwrap().to_string(), "/0");
        doc.as_array_mut().unwrap().remove(1);
        assert_eq!(walker.next(&path.segments, &doc).unwrap(), None);
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(0, 0), None);
    }
}
