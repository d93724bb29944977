use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::pointer::JsonPointer;

use super::ast::{ArithmeticOp, ComparisonOp};

/// A node found by a path: its value and where it lives in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub value: Value,
    pub location: JsonPointer,
}

impl Match {
    pub fn new(value: Value, location: JsonPointer) -> Self {
        Match { value, location }
    }

    /// The RFC 9535 normalized path of this match, e.g. `$['store']['book'][0]`.
    pub fn normalized_path(&self) -> String {
        self.location.to_normalized_path()
    }
}

/// An ordered list of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeList(pub Vec<Match>);

impl NodeList {
    pub fn new() -> Self {
        NodeList(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Match> {
        self.0.first()
    }

    /// Just the values, in order.
    pub fn values(&self) -> Vec<Value> {
        self.0.iter().map(|m| m.value.clone()).collect()
    }

    /// Just the locations, in order.
    pub fn locations(&self) -> Vec<JsonPointer> {
        self.0.iter().map(|m| m.location.clone()).collect()
    }

    pub fn into_inner(self) -> Vec<Match> {
        self.0
    }
}

impl IntoIterator for NodeList {
    type Item = Match;
    type IntoIter = std::vec::IntoIter<Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Match> for NodeList {
    fn from_iter<I: IntoIterator<Item = Match>>(iter: I) -> Self {
        NodeList(iter.into_iter().collect())
    }
}

/// The result of evaluating a filter sub-expression.
///
/// `Nothing` is distinct from JSON `null`: it is what a singular query that
/// matched no node, or an arithmetic operation with no defined result,
/// produces.
#[derive(Debug, Clone, PartialEq)]
pub enum PathValue {
    Node(Value),
    NodeList(NodeList),
    Logical(bool),
    Nothing,
}

impl PathValue {
    /// The single value this stands for, if any. A one-element node list
    /// counts as its element.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PathValue::Node(v) => Some(v),
            PathValue::NodeList(nodes) if nodes.len() == 1 => nodes.first().map(|m| &m.value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            PathValue::Node(v) => Some(v),
            PathValue::NodeList(nodes) if nodes.len() == 1 => {
                nodes.into_inner().pop().map(|m| m.value)
            }
            _ => None,
        }
    }

    /// Truthiness in a logical position: node lists test for existence.
    pub fn is_truthy(&self) -> bool {
        match self {
            PathValue::Logical(b) => *b,
            PathValue::NodeList(nodes) => !nodes.is_empty(),
            PathValue::Node(_) => true,
            PathValue::Nothing => false,
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, PathValue::Nothing)
    }

    pub fn nodes(&self) -> Option<&NodeList> {
        match self {
            PathValue::NodeList(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// `Nothing` for `None`.
    pub fn from_option(value: Option<Value>) -> Self {
        value.map(PathValue::Node).unwrap_or(PathValue::Nothing)
    }
}

impl From<Value> for PathValue {
    fn from(v: Value) -> Self {
        PathValue::Node(v)
    }
}

impl From<bool> for PathValue {
    fn from(b: bool) -> Self {
        PathValue::Logical(b)
    }
}

// ── Helpers ────────────────────────────────────────────────────

pub fn value_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn json_f64(f: f64) -> Option<Value> {
    Number::from_f64(f).map(Value::Number)
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Deep JSON equality where `1` and `1.0` are the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

fn equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => values_equal(x, y),
        _ => false,
    }
}

/// Ordering is only defined between two numbers or two strings.
fn less(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            compare_numbers(x, y) == Some(Ordering::Less)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x < y,
        _ => false,
    }
}

/// Apply a comparison operator; `None` stands for `Nothing`.
pub fn compare(left: Option<&Value>, op: ComparisonOp, right: Option<&Value>) -> bool {
    match op {
        ComparisonOp::Eq => equal(left, right),
        ComparisonOp::Ne => !equal(left, right),
        ComparisonOp::Lt => less(left, right),
        ComparisonOp::Le => less(left, right) || equal(left, right),
        ComparisonOp::Gt => less(right, left),
        ComparisonOp::Ge => less(right, left) || equal(left, right),
        ComparisonOp::In => match (left, right) {
            (Some(item), Some(Value::Array(items))) => {
                items.iter().any(|candidate| values_equal(item, candidate))
            }
            _ => false,
        },
    }
}

/// Apply an arithmetic operator. `None` (Nothing) in, or an undefined
/// result (non-numbers, division by zero, overflow to infinity), gives `None`.
pub fn arithmetic(left: Option<&Value>, op: ArithmeticOp, right: Option<&Value>) -> Option<Value> {
    match (left?, right?) {
        (Value::Number(a), Value::Number(b)) => number_op(a, op, b),
        (Value::String(a), Value::String(b)) if op == ArithmeticOp::Add => {
            Some(Value::String(format!("{a}{b}")))
        }
        _ => None,
    }
}

fn number_op(a: &Number, op: ArithmeticOp, b: &Number) -> Option<Value> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            ArithmeticOp::Add => x.checked_add(y),
            ArithmeticOp::Sub => x.checked_sub(y),
            ArithmeticOp::Mul => x.checked_mul(y),
            ArithmeticOp::Div => {
                if y == 0 {
                    return None;
                }
                match x.checked_rem(y) {
                    Some(0) => x.checked_div(y),
                    _ => None,
                }
            }
        };
        if let Some(r) = exact {
            return Some(Value::Number(r.into()));
        }
    }
    let x = a.as_f64()?;
    let y = b.as_f64()?;
    let result = match op {
        ArithmeticOp::Add => x + y,
        ArithmeticOp::Sub => x - y,
        ArithmeticOp::Mul => x * y,
        ArithmeticOp::Div => {
            if y == 0.0 {
                return None;
            }
            x / y
        }
    };
    json_f64(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_equality_ignores_representation() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!([1, {"a": 2.0}]), &json!([1.0, {"a": 2}])));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn nothing_equality() {
        assert!(compare(None, ComparisonOp::Eq, None));
        assert!(!compare(None, ComparisonOp::Eq, Some(&json!(null))));
        assert!(compare(None, ComparisonOp::Ne, Some(&json!(null))));
        assert!(!compare(None, ComparisonOp::Ne, None));
    }

    #[test]
    fn ordering_only_for_numbers_and_strings() {
        assert!(compare(Some(&json!(1)), ComparisonOp::Lt, Some(&json!(2.5))));
        assert!(compare(Some(&json!("a")), ComparisonOp::Lt, Some(&json!("b"))));
        assert!(!compare(Some(&json!("1")), ComparisonOp::Lt, Some(&json!(2))));
        assert!(!compare(Some(&json!(true)), ComparisonOp::Gt, Some(&json!(false))));
        assert!(compare(Some(&json!(true)), ComparisonOp::Ge, Some(&json!(true))));
        assert!(!compare(None, ComparisonOp::Le, Some(&json!(1))));
    }

    #[test]
    fn in_requires_array() {
        let items = json!([1, "two", 3]);
        assert!(compare(Some(&json!("two")), ComparisonOp::In, Some(&items)));
        assert!(!compare(Some(&json!(4)), ComparisonOp::In, Some(&items)));
        assert!(!compare(Some(&json!("a")), ComparisonOp::In, Some(&json!({"a": 1}))));
        assert!(!compare(None, ComparisonOp::In, Some(&items)));
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(
            arithmetic(Some(&json!(4)), ArithmeticOp::Add, Some(&json!(5))),
            Some(json!(9))
        );
        assert_eq!(
            arithmetic(Some(&json!(9)), ArithmeticOp::Div, Some(&json!(3))),
            Some(json!(3))
        );
        assert_eq!(
            arithmetic(Some(&json!(7)), ArithmeticOp::Div, Some(&json!(2))),
            Some(json!(3.5))
        );
    }

    #[test]
    fn arithmetic_nothing_cases() {
        assert_eq!(arithmetic(None, ArithmeticOp::Add, Some(&json!(1))), None);
        assert_eq!(arithmetic(Some(&json!(1)), ArithmeticOp::Div, Some(&json!(0))), None);
        assert_eq!(arithmetic(Some(&json!(1.5)), ArithmeticOp::Div, Some(&json!(0.0))), None);
        assert_eq!(arithmetic(Some(&json!(true)), ArithmeticOp::Add, Some(&json!(1))), None);
        assert_eq!(
            arithmetic(Some(&json!("ab")), ArithmeticOp::Add, Some(&json!("cd"))),
            Some(json!("abcd"))
        );
        assert_eq!(arithmetic(Some(&json!("ab")), ArithmeticOp::Sub, Some(&json!("b"))), None);
    }

    #[test]
    fn truthiness() {
        assert!(PathValue::Logical(true).is_truthy());
        assert!(!PathValue::NodeList(NodeList::new()).is_truthy());
        assert!(!PathValue::Nothing.is_truthy());
        assert!(PathValue::Node(json!(null)).is_truthy());
    }

    #[test]
    fn single_node_list_is_a_value() {
        let list = NodeList(vec![Match::new(json!(3), JsonPointer::root())]);
        assert_eq!(PathValue::NodeList(list).as_value(), Some(&json!(3)));
        assert_eq!(PathValue::Nothing.as_value(), None);
    }
}
