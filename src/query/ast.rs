use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::functions::PathFunction;

/// Where a path starts: the document root (`$`) or the current node (`@`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Root,
    Current,
}

/// A parsed path: a scope followed by segments. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub scope: Scope,
    pub segments: Vec<Segment>,
}

/// One path component: a union of selectors, optionally applied to all
/// descendants (`..`).
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub recursive: bool,
    pub selectors: Vec<Selector>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `.name`, `['name']`
    Name(String),
    /// `[3]`, `[-1]`
    Index(i64),
    /// `[start:end:step]`
    Slice(Slice),
    /// `*`
    Wildcard,
    /// `[?expr]`
    Filter(FilterSelector),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub step: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSelector {
    pub expression: LogicalExpr,
    /// Written as `?( ... )` in the source; kept so it prints back the same way.
    pub parenthesized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Expressions that produce true/false inside a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalExpr {
    Binary {
        left: Box<LogicalExpr>,
        op: LogicalOp,
        right: Box<LogicalExpr>,
        nest_level: usize,
    },
    Not {
        operand: Box<LogicalExpr>,
        nest_level: usize,
    },
    Comparison {
        left: ValueExpr,
        op: ComparisonOp,
        right: ValueExpr,
    },
    Exists(Path),
    Function(FunctionCall),
}

/// Expressions that produce a single value (or nothing) inside a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Literal(Value),
    Query(Path),
    Function(FunctionCall),
    Arithmetic {
        left: Box<ValueExpr>,
        op: ArithmeticOp,
        right: Box<ValueExpr>,
        nest_level: usize,
    },
}

#[derive(Clone)]
pub struct FunctionCall {
    pub function: Arc<dyn PathFunction>,
    pub args: Vec<FunctionArg>,
}

/// An argument, already checked against the declared parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArg {
    Value(ValueExpr),
    Logical(LogicalExpr),
    Nodes(Path),
}

impl Path {
    /// True when the path can match at most one node: every segment is a
    /// child segment with exactly one name or index selector.
    pub fn is_singular(&self) -> bool {
        self.segments.iter().all(Segment::is_singular)
    }
}

impl Segment {
    pub fn is_singular(&self) -> bool {
        !self.recursive
            && matches!(
                self.selectors.as_slice(),
                [Selector::Name(_)] | [Selector::Index(_)]
            )
    }
}

impl LogicalOp {
    pub fn precedence(self) -> u8 {
        match self {
            LogicalOp::Or => 1,
            LogicalOp::And => 2,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

impl ComparisonOp {
    pub const PRECEDENCE: u8 = 10;

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::In => " in ",
        }
    }
}

impl ArithmeticOp {
    pub fn precedence(self) -> u8 {
        match self {
            ArithmeticOp::Add | ArithmeticOp::Sub => 1,
            ArithmeticOp::Mul | ArithmeticOp::Div => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            ArithmeticOp::Add => '+',
            ArithmeticOp::Sub => '-',
            ArithmeticOp::Mul => '*',
            ArithmeticOp::Div => '/',
        }
    }

    fn is_associative(self) -> bool {
        matches!(self, ArithmeticOp::Add | ArithmeticOp::Mul)
    }
}

impl LogicalExpr {
    /// Parenthesis depth for composites, used when printing.
    pub fn nest_level(&self) -> Option<usize> {
        match self {
            LogicalExpr::Binary { nest_level, .. } | LogicalExpr::Not { nest_level, .. } => {
                Some(*nest_level)
            }
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            LogicalExpr::Binary { op, .. } => op.precedence(),
            LogicalExpr::Not { .. } => 3,
            _ => ComparisonOp::PRECEDENCE,
        }
    }
}

impl ValueExpr {
    pub fn nest_level(&self) -> Option<usize> {
        match self {
            ValueExpr::Arithmetic { nest_level, .. } => Some(*nest_level),
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            ValueExpr::Arithmetic { op, .. } => op.precedence(),
            _ => u8::MAX,
        }
    }
}

impl FunctionCall {
    pub fn name(&self) -> &str {
        self.function.name()
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("name", &self.function.name())
            .field("args", &self.args)
            .finish()
    }
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.function.name() == other.function.name() && self.args == other.args
    }
}

// ── Canonical printing ─────────────────────────────────────────

/// Member names that may use the `.name` shorthand.
pub fn is_shorthand_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || !c.is_ascii() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
}

fn write_quoted_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in name.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\u{8}' => f.write_str("\\b")?,
            '\u{c}' => f.write_str("\\f")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.scope {
            Scope::Root => "$",
            Scope::Current => "@",
        })?;
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.recursive, self.selectors.as_slice()) {
            (false, [Selector::Name(name)]) if is_shorthand_name(name) => write!(f, ".{name}"),
            (true, [Selector::Name(name)]) if is_shorthand_name(name) => write!(f, "..{name}"),
            (true, [Selector::Wildcard]) => f.write_str("..*"),
            (recursive, selectors) => {
                if recursive {
                    f.write_str("..")?;
                }
                f.write_str("[")?;
                for (i, selector) in selectors.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{selector}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Name(name) => write_quoted_name(f, name),
            Selector::Index(i) => write!(f, "{i}"),
            Selector::Slice(slice) => write!(f, "{slice}"),
            Selector::Wildcard => f.write_str("*"),
            Selector::Filter(filter) => write!(f, "{filter}"),
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        f.write_str(":")?;
        if let Some(end) = self.end {
            write!(f, "{end}")?;
        }
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}

impl fmt::Display for FilterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("?")?;
        if self.parenthesized {
            f.write_str("(")?;
            write_logical_bare(f, &self.expression)?;
            f.write_str(")")
        } else {
            write_logical_bare(f, &self.expression)
        }
    }
}

impl fmt::Display for LogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_logical_bare(f, self)
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value_bare(f, self)
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function.name())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match arg {
                FunctionArg::Value(v) => write_value_bare(f, v)?,
                FunctionArg::Logical(l) => write_logical_bare(f, l)?,
                FunctionArg::Nodes(p) => write!(f, "{p}")?,
            }
        }
        f.write_str(")")
    }
}

/// A composite child is wrapped when its operator binds looser than the
/// parent requires, or when it was grouped in the source on the right-hand
/// side of an operator of equal precedence (keeps the tree shape on reparse).
fn needs_group(
    child_nest: Option<usize>,
    parent_nest: usize,
    child_prec: u8,
    min_prec: u8,
    right_side: bool,
) -> bool {
    child_prec < min_prec
        || (right_side && child_prec == min_prec && child_nest.is_some_and(|n| n > parent_nest))
}

fn write_logical_child(
    f: &mut fmt::Formatter<'_>,
    child: &LogicalExpr,
    parent_nest: usize,
    min_prec: u8,
    right_side: bool,
) -> fmt::Result {
    if needs_group(child.nest_level(), parent_nest, child.precedence(), min_prec, right_side) {
        f.write_str("(")?;
        write_logical_bare(f, child)?;
        f.write_str(")")
    } else {
        write_logical_bare(f, child)
    }
}

fn write_logical_bare(f: &mut fmt::Formatter<'_>, expr: &LogicalExpr) -> fmt::Result {
    match expr {
        LogicalExpr::Binary {
            left,
            op,
            right,
            nest_level,
        } => {
            write_logical_child(f, left, *nest_level, op.precedence(), false)?;
            write!(f, " {} ", op.symbol())?;
            write_logical_child(f, right, *nest_level, op.precedence(), true)
        }
        LogicalExpr::Not { operand, nest_level } => {
            f.write_str("!")?;
            match operand.as_ref() {
                LogicalExpr::Comparison { .. } | LogicalExpr::Binary { .. } => {
                    f.write_str("(")?;
                    write_logical_bare(f, operand)?;
                    f.write_str(")")
                }
                other => write_logical_child(f, other, *nest_level, 3, false),
            }
        }
        LogicalExpr::Comparison { left, op, right } => {
            write_value_bare(f, left)?;
            f.write_str(op.symbol())?;
            write_value_bare(f, right)
        }
        LogicalExpr::Exists(path) => write!(f, "{path}"),
        LogicalExpr::Function(call) => write!(f, "{call}"),
    }
}

fn write_value_child(
    f: &mut fmt::Formatter<'_>,
    child: &ValueExpr,
    parent_nest: usize,
    min_prec: u8,
    right_side: bool,
) -> fmt::Result {
    if needs_group(child.nest_level(), parent_nest, child.precedence(), min_prec, right_side) {
        f.write_str("(")?;
        write_value_bare(f, child)?;
        f.write_str(")")
    } else {
        write_value_bare(f, child)
    }
}

fn write_value_bare(f: &mut fmt::Formatter<'_>, expr: &ValueExpr) -> fmt::Result {
    match expr {
        ValueExpr::Literal(value) => write!(f, "{value}"),
        ValueExpr::Query(path) => write!(f, "{path}"),
        ValueExpr::Function(call) => write!(f, "{call}"),
        ValueExpr::Arithmetic {
            left,
            op,
            right,
            nest_level,
        } => {
            let prec = op.precedence();
            write_value_child(f, left, *nest_level, prec, false)?;
            write!(f, "{}", op.symbol())?;
            let right_min = if op.is_associative() { prec } else { prec + 1 };
            write_value_child(f, right, *nest_level, right_min, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn name_segment(name: &str) -> Segment {
        Segment {
            recursive: false,
            selectors: vec![Selector::Name(name.into())],
        }
    }

    #[test]
    fn shorthand_names() {
        assert!(is_shorthand_name("store"));
        assert!(is_shorthand_name("_private1"));
        assert!(is_shorthand_name("naïve"));
        assert!(!is_shorthand_name("1abc"));
        assert!(!is_shorthand_name("with space"));
        assert!(!is_shorthand_name(""));
    }

    #[test]
    fn prints_shorthand_and_bracket_forms() {
        let path = Path {
            scope: Scope::Root,
            segments: vec![name_segment("store"), name_segment("a b"), name_segment("it's")],
        };
        assert_eq!(path.to_string(), r"$.store['a b']['it\'s']");
    }

    #[test]
    fn prints_unions_and_slices() {
        let path = Path {
            scope: Scope::Root,
            segments: vec![
                Segment {
                    recursive: true,
                    selectors: vec![Selector::Name("book".into())],
                },
                Segment {
                    recursive: false,
                    selectors: vec![
                        Selector::Index(0),
                        Selector::Slice(Slice {
                            start: None,
                            end: Some(2),
                            step: None,
                        }),
                    ],
                },
            ],
        };
        assert_eq!(path.to_string(), "$..book[0,:2]");
    }

    #[test]
    fn singular_detection() {
        let singular = Path {
            scope: Scope::Root,
            segments: vec![
                name_segment("a"),
                Segment {
                    recursive: false,
                    selectors: vec![Selector::Index(-1)],
                },
            ],
        };
        assert!(singular.is_singular());

        let wildcard = Path {
            scope: Scope::Root,
            segments: vec![Segment {
                recursive: false,
                selectors: vec![Selector::Wildcard],
            }],
        };
        assert!(!wildcard.is_singular());

        let recursive = Path {
            scope: Scope::Root,
            segments: vec![Segment {
                recursive: true,
                selectors: vec![Selector::Name("a".into())],
            }],
        };
        assert!(!recursive.is_singular());
    }

    #[test]
    fn arithmetic_grouping_is_minimal() {
        let lit = |n: i64| Box::new(ValueExpr::Literal(json!(n)));
        let sum = ValueExpr::Arithmetic {
            left: lit(1),
            op: ArithmeticOp::Add,
            right: lit(2),
            nest_level: 1,
        };
        let product = ValueExpr::Arithmetic {
            left: Box::new(sum.clone()),
            op: ArithmeticOp::Mul,
            right: lit(3),
            nest_level: 0,
        };
        assert_eq!(product.to_string(), "(1+2)*3");

        let flat = ValueExpr::Arithmetic {
            left: lit(3),
            op: ArithmeticOp::Mul,
            right: lit(4),
            nest_level: 1,
        };
        let sum_of_product = ValueExpr::Arithmetic {
            left: lit(1),
            op: ArithmeticOp::Add,
            right: Box::new(flat),
            nest_level: 0,
        };
        assert_eq!(sum_of_product.to_string(), "1+3*4");
    }

    #[test]
    fn not_wraps_comparisons() {
        let cmp = LogicalExpr::Comparison {
            left: ValueExpr::Literal(json!(1)),
            op: ComparisonOp::Eq,
            right: ValueExpr::Literal(json!(2)),
        };
        let not = LogicalExpr::Not {
            operand: Box::new(cmp),
            nest_level: 0,
        };
        assert_eq!(not.to_string(), "!(1==2)");
    }
}
