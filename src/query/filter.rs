//! Filter expressions: the part after `?` in a filter selector.
//!
//! Two grammars are interleaved. Logical expressions combine tests with
//! `!`, `&&` and `||`; value expressions produce the operands of comparisons
//! and function arguments. Both use precedence climbing, and every composite
//! node records how many parentheses enclosed it so it can be printed back
//! with minimal grouping.
//!
//! Operands are recognized in a fixed order: function call, then query,
//! then literal.

use crate::error::PathError;

use super::ast::*;
use super::functions::{FunctionType, ReturnCategory};
use super::parser::Parser;

/// Memoized result of parsing a parenthesized logical group.
#[derive(Debug, Clone)]
pub(crate) enum GroupAttempt {
    Parsed { expr: LogicalExpr, end: usize },
    Failed { position: usize, message: String },
}

impl Parser<'_> {
    /// The expression after `?`. A filter wrapped whole in parentheses,
    /// `?( ... )`, is remembered as such.
    pub(super) fn parse_filter_selector(&mut self) -> Result<FilterSelector, PathError> {
        if self.scanner.peek() == Some('(') {
            let start = self.checkpoint();
            if let Ok(expression) = self.parse_logical_group(0) {
                let after = self.checkpoint();
                self.scanner.skip_whitespace();
                let closes = matches!(self.scanner.peek(), Some(']') | Some(','));
                self.restore(after);
                if closes {
                    return Ok(FilterSelector {
                        expression,
                        parenthesized: true,
                    });
                }
            }
            self.restore(start);
        }
        Ok(FilterSelector {
            expression: self.parse_logical(0)?,
            parenthesized: false,
        })
    }

    pub(super) fn parse_logical(&mut self, nest: usize) -> Result<LogicalExpr, PathError> {
        self.parse_logical_binary(0, nest)
    }

    fn parse_logical_binary(
        &mut self,
        min_precedence: u8,
        nest: usize,
    ) -> Result<LogicalExpr, PathError> {
        let mut left = self.parse_logical_unary(nest)?;
        loop {
            let before = self.checkpoint();
            self.scanner.skip_whitespace();
            let op = if self.scanner.starts_with("&&") {
                LogicalOp::And
            } else if self.scanner.starts_with("||") {
                LogicalOp::Or
            } else {
                self.restore(before);
                break;
            };
            if op.precedence() < min_precedence {
                self.restore(before);
                break;
            }
            self.scanner.eat_str(op.symbol());
            self.scanner.skip_whitespace();
            let right = self.parse_logical_binary(op.precedence() + 1, nest)?;
            left = LogicalExpr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                nest_level: nest,
            };
        }
        Ok(left)
    }

    fn parse_logical_unary(&mut self, nest: usize) -> Result<LogicalExpr, PathError> {
        if self.scanner.peek() != Some('!') || self.scanner.peek_at(1) == Some('=') {
            return self.parse_logical_primary(nest);
        }
        self.scanner.advance();
        self.scanner.skip_whitespace();
        self.enter()?;
        let start = self.scanner.pos();
        let operand = if self.scanner.peek() == Some('(') {
            self.parse_logical_group(nest)?
        } else {
            let operand = self.parse_logical_unary(nest)?;
            if matches!(operand, LogicalExpr::Comparison { .. }) {
                return Err(PathError::syntax(
                    start,
                    "a comparison after '!' must be parenthesized",
                ));
            }
            operand
        };
        self.leave();
        Ok(LogicalExpr::Not {
            operand: Box::new(operand),
            nest_level: nest,
        })
    }

    fn parse_logical_primary(&mut self, nest: usize) -> Result<LogicalExpr, PathError> {
        let start = self.checkpoint();

        if self.scanner.peek() == Some('(') {
            match self.parse_logical_group(nest) {
                Ok(expr) => {
                    if !self.followed_by_value_operator() {
                        return Ok(expr);
                    }
                    // `(...)` was the left operand of a comparison
                    self.restore(start);
                }
                Err(err) if !self.options.allow_math_operations => return Err(err),
                Err(err) => {
                    self.restore(start);
                    return self
                        .parse_comparison(nest)
                        .map_err(|other| further(err, other));
                }
            }
        }

        if let Some(name) = self.scanner.peek_function_name() {
            let logical = self
                .options
                .lookup_function(&name)
                .is_some_and(|f| f.return_category() == ReturnCategory::Logical);
            if logical {
                return Ok(LogicalExpr::Function(self.parse_function_call(nest)?));
            }
        } else if matches!(self.scanner.peek(), Some('@') | Some('$')) {
            let path = self.parse_query()?;
            if !self.followed_by_value_operator() {
                return Ok(LogicalExpr::Exists(path));
            }
            self.restore(start);
        }

        self.parse_comparison(nest)
    }

    /// `'(' logical ')'`, memoized by offset so backtracking stays cheap.
    fn parse_logical_group(&mut self, nest: usize) -> Result<LogicalExpr, PathError> {
        let key = (self.scanner.pos(), nest);
        if let Some(attempt) = self.groups.get(&key) {
            return match attempt.clone() {
                GroupAttempt::Parsed { expr, end } => {
                    self.scanner.set_pos(end);
                    Ok(expr)
                }
                GroupAttempt::Failed { position, message } => {
                    Err(PathError::syntax(position, message))
                }
            };
        }

        let result = self.parse_logical_group_uncached(nest);
        let attempt = match &result {
            Ok(expr) => GroupAttempt::Parsed {
                expr: expr.clone(),
                end: self.scanner.pos(),
            },
            Err(PathError::Syntax { position, message }) => GroupAttempt::Failed {
                position: *position,
                message: message.clone(),
            },
            Err(other) => GroupAttempt::Failed {
                position: key.0,
                message: other.to_string(),
            },
        };
        self.groups.insert(key, attempt);
        result
    }

    fn parse_logical_group_uncached(&mut self, nest: usize) -> Result<LogicalExpr, PathError> {
        self.scanner.expect('(')?;
        self.enter()?;
        self.scanner.skip_whitespace();
        let expr = self.parse_logical(nest + 1)?;
        self.scanner.skip_whitespace();
        self.scanner.expect(')')?;
        self.leave();
        Ok(expr)
    }

    fn parse_comparison(&mut self, nest: usize) -> Result<LogicalExpr, PathError> {
        let left = self.parse_value_expr(nest)?;
        self.scanner.skip_whitespace();
        let op = self.parse_comparison_op()?;
        self.scanner.skip_whitespace();
        let right = self.parse_value_expr(nest)?;

        let after = self.checkpoint();
        self.scanner.skip_whitespace();
        if self.at_comparison_operator() {
            return Err(self.error("comparisons cannot be chained"));
        }
        self.restore(after);

        Ok(LogicalExpr::Comparison { left, op, right })
    }

    fn parse_comparison_op(&mut self) -> Result<ComparisonOp, PathError> {
        for (text, op) in [
            ("==", ComparisonOp::Eq),
            ("!=", ComparisonOp::Ne),
            ("<=", ComparisonOp::Le),
            (">=", ComparisonOp::Ge),
            ("<", ComparisonOp::Lt),
            (">", ComparisonOp::Gt),
        ] {
            if self.scanner.eat_str(text) {
                return Ok(op);
            }
        }
        if self.at_in_keyword() {
            if !self.options.allow_in_operator {
                return Err(self.error("the 'in' operator is not enabled"));
            }
            self.scanner.eat_str("in");
            return Ok(ComparisonOp::In);
        }
        Err(match self.scanner.peek() {
            Some(c) => self.error(format!("expected a comparison operator, found '{c}'")),
            None => self.error("expected a comparison operator, found end of input"),
        })
    }

    fn at_in_keyword(&self) -> bool {
        self.scanner.starts_with("in")
            && !self
                .scanner
                .peek_at(2)
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn at_comparison_operator(&self) -> bool {
        match self.scanner.peek() {
            Some('<') | Some('>') => true,
            Some('=') | Some('!') => self.scanner.peek_at(1) == Some('='),
            Some('i') => self.at_in_keyword(),
            _ => false,
        }
    }

    fn peek_arithmetic_op(&self) -> Option<ArithmeticOp> {
        match self.scanner.peek()? {
            '+' => Some(ArithmeticOp::Add),
            '-' => Some(ArithmeticOp::Sub),
            '*' => Some(ArithmeticOp::Mul),
            '/' => Some(ArithmeticOp::Div),
            _ => None,
        }
    }

    /// Whether, after optional whitespace, an operator continues a value
    /// expression. The cursor is left where it was.
    fn followed_by_value_operator(&mut self) -> bool {
        let before = self.checkpoint();
        self.scanner.skip_whitespace();
        let continues = self.at_comparison_operator()
            || (self.options.allow_math_operations && self.peek_arithmetic_op().is_some());
        self.restore(before);
        continues
    }

    // ── Value expressions ──────────────────────────────────────────

    pub(super) fn parse_value_expr(&mut self, nest: usize) -> Result<ValueExpr, PathError> {
        self.parse_arithmetic(0, nest)
    }

    fn parse_arithmetic(&mut self, min_precedence: u8, nest: usize) -> Result<ValueExpr, PathError> {
        let mut left = self.parse_value_operand(nest)?;
        if !self.options.allow_math_operations {
            return Ok(left);
        }
        loop {
            let before = self.checkpoint();
            self.scanner.skip_whitespace();
            let Some(op) = self.peek_arithmetic_op() else {
                self.restore(before);
                break;
            };
            if op.precedence() < min_precedence {
                self.restore(before);
                break;
            }
            self.scanner.advance();
            self.scanner.skip_whitespace();
            let right = self.parse_arithmetic(op.precedence() + 1, nest)?;
            left = ValueExpr::Arithmetic {
                left: Box::new(left),
                op,
                right: Box::new(right),
                nest_level: nest,
            };
        }
        Ok(left)
    }

    fn parse_value_operand(&mut self, nest: usize) -> Result<ValueExpr, PathError> {
        let start = self.scanner.pos();

        if let Some(name) = self.scanner.peek_function_name() {
            let call = self.parse_function_call(nest)?;
            if call.function.return_category() != ReturnCategory::Value {
                return Err(PathError::syntax(
                    start,
                    format!("{name}() returns a logical result, not a value"),
                ));
            }
            return Ok(ValueExpr::Function(call));
        }

        match self.scanner.peek() {
            Some('@') | Some('$') => {
                let path = self.parse_query()?;
                if !path.is_singular() {
                    return Err(PathError::syntax(
                        start,
                        format!("{path} is not a singular query and cannot be used as a value"),
                    ));
                }
                Ok(ValueExpr::Query(path))
            }
            Some('(') if self.options.allow_math_operations => {
                self.scanner.advance();
                self.enter()?;
                self.scanner.skip_whitespace();
                let inner = self.parse_arithmetic(0, nest + 1)?;
                self.scanner.skip_whitespace();
                self.scanner.expect(')')?;
                self.leave();
                Ok(inner)
            }
            _ => {
                let constructs = self.options.allow_json_constructs;
                if let Some(value) = self.scanner.try_literal(constructs)? {
                    return Ok(ValueExpr::Literal(value));
                }
                Err(match self.scanner.peek() {
                    Some('[') | Some('{') if !constructs => {
                        self.error("array and object literals are not enabled")
                    }
                    Some(c) => {
                        self.error(format!("expected a literal, query or function, found '{c}'"))
                    }
                    None => self.error("expected a literal, query or function, found end of input"),
                })
            }
        }
    }

    // ── Function calls ─────────────────────────────────────────────

    fn parse_function_call(&mut self, nest: usize) -> Result<FunctionCall, PathError> {
        let start = self.scanner.pos();
        let name = self
            .scanner
            .peek_function_name()
            .ok_or_else(|| self.error("expected a function call"))?;
        let function = self
            .options
            .lookup_function(&name)
            .ok_or_else(|| PathError::syntax(start, format!("unknown function '{name}'")))?;
        self.scanner.eat_str(&name);
        self.scanner.expect('(')?;
        self.enter()?;

        let parameters = function.parameter_types().to_vec();
        let mut args = Vec::with_capacity(parameters.len());
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(')') {
            loop {
                self.scanner.skip_whitespace();
                let Some(&kind) = parameters.get(args.len()) else {
                    return Err(self.error(format!(
                        "too many arguments for {name}(), expected {}",
                        parameters.len()
                    )));
                };
                args.push(self.parse_function_arg(kind, nest)?);
                self.scanner.skip_whitespace();
                if !self.scanner.eat(',') {
                    break;
                }
            }
        }
        self.scanner.expect(')')?;
        self.leave();

        if args.len() != parameters.len() {
            return Err(PathError::syntax(
                start,
                format!(
                    "{name}() expects {} argument(s), found {}",
                    parameters.len(),
                    args.len()
                ),
            ));
        }
        Ok(FunctionCall { function, args })
    }

    fn parse_function_arg(
        &mut self,
        kind: FunctionType,
        nest: usize,
    ) -> Result<FunctionArg, PathError> {
        match kind {
            FunctionType::Nodes => match self.scanner.peek() {
                Some('@') | Some('$') => Ok(FunctionArg::Nodes(self.parse_query()?)),
                _ => Err(self.error("expected a query for a node list parameter")),
            },
            FunctionType::Value => Ok(FunctionArg::Value(self.parse_value_expr(nest)?)),
            FunctionType::Logical => Ok(FunctionArg::Logical(self.parse_logical(nest)?)),
        }
    }
}

/// Of two failed interpretations, report the one that got further.
fn further(first: PathError, second: PathError) -> PathError {
    match (first.position(), second.position()) {
        (Some(a), Some(b)) if a > b => first,
        _ => second,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::query::functions::{FunctionDefinition, FunctionRegistry};
    use crate::query::options::PathEvaluationOptions;
    use crate::query::parser::parse_path;
    use crate::query::value::PathValue;
    use crate::query::JsonPath;

    use super::*;

    fn round_trip(text: &str, options: &PathEvaluationOptions) {
        let path = parse_path(text, options).unwrap();
        assert_eq!(path.to_string(), text);
    }

    fn rejects(text: &str, options: &PathEvaluationOptions) -> PathError {
        parse_path(text, options).unwrap_err()
    }

    fn strict() -> PathEvaluationOptions {
        PathEvaluationOptions::default()
    }

    #[test]
    fn goessner_filters_keep_parentheses() {
        round_trip("$..book[?(@.isbn)]", &strict());
        round_trip("$..book[?(@.price<10)]", &strict());
    }

    #[test]
    fn logical_round_trips() {
        for text in [
            "$[?@.a==1 && @.b!=\"x\"]",
            "$[?!(@.a==1)]",
            "$[?!@.a]",
            "$[?(@.a==1 || @.b==2) && @.c]",
            "$[?@.a || @.b && @.c]",
            "$[?@.a && (@.b && @.c)]",
            "$[?@.a>=1.5]",
            "$[?@.a==null]",
            "$[?$.limit>@.price]",
            "$[?@[0]==true]",
        ] {
            round_trip(text, &strict());
        }
    }

    #[test]
    fn function_round_trips() {
        for text in [
            "$[?length(@.name)>3]",
            "$[?count(@[*])==2]",
            "$[?match(@.date,\"1974-05-..\")]",
            "$[?search(@.author,\"[BR]ob\")]",
            "$[?value(@..color)==\"red\"]",
        ] {
            round_trip(text, &strict());
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let path = parse_path("$[? @.a  ==  1 &&@.b ]", &strict()).unwrap();
        assert_eq!(path.to_string(), "$[?@.a==1 && @.b]");
        let path = parse_path("$[?(@.a=='x')]", &strict()).unwrap();
        assert_eq!(path.to_string(), "$[?(@.a==\"x\")]");
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let path = parse_path("$[?@.a || @.b && @.c]", &strict()).unwrap();
        let Selector::Filter(filter) = &path.segments[0].selectors[0] else {
            panic!("expected a filter");
        };
        assert!(matches!(
            filter.expression,
            LogicalExpr::Binary {
                op: LogicalOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn comparison_operands_must_be_singular() {
        let err = rejects("$[?@.*==1]", &strict());
        assert_eq!(err.position(), Some(3));
        assert!(rejects("$[?@..a==1]", &strict()).to_string().contains("singular"));
        assert!(parse_path("$[?@.*]", &strict()).is_ok());
    }

    #[test]
    fn function_type_checks() {
        // wrong arity
        assert!(rejects("$[?match(@.a)]", &strict()).to_string().contains("argument"));
        // unknown
        assert!(rejects("$[?nope(@)]", &strict()).to_string().contains("unknown function"));
        // value function in logical position
        assert!(parse_path("$[?length(@)]", &strict()).is_err());
        // logical function compared
        assert!(parse_path("$[?match(@.a,'x')==true]", &strict()).is_err());
        // non-singular query as value argument
        assert!(parse_path("$[?length(@.*)>1]", &strict()).is_err());
        // literal where a node list is required
        assert!(parse_path("$[?count(1)==1]", &strict()).is_err());
    }

    #[test]
    fn not_requires_grouping_for_comparisons() {
        assert!(parse_path("$[?!@.a==1]", &strict()).is_err());
        assert!(parse_path("$[?!!@.a]", &strict()).is_ok());
    }

    #[test]
    fn comparisons_do_not_chain() {
        let err = rejects("$[?@.a==1==2]", &strict());
        assert!(err.to_string().contains("chained"));
    }

    #[test]
    fn in_operator_is_opt_in() {
        assert!(rejects("$[?@.a in $.allowed]", &strict()).to_string().contains("'in'"));
        let options = strict().with_in_operator(true).with_json_constructs(true);
        round_trip("$[?@.a in [1,2,3]]", &options);
        round_trip("$[?@.a in $.allowed]", &options);
    }

    #[test]
    fn json_constructs_are_opt_in() {
        assert!(rejects("$[?@.a==[1]]", &strict()).to_string().contains("not enabled"));
        let options = strict().with_json_constructs(true);
        round_trip("$[?@.a=={\"b\":[1,2]}]", &options);
    }

    #[test]
    fn arithmetic_is_opt_in() {
        assert!(parse_path("$[?@.a+1==2]", &strict()).is_err());
        let math = strict().with_math_operations(true);
        round_trip("$[?@.a+1==2]", &math);
        round_trip("$[?@.a*2+1>@.b]", &math);
        round_trip("$[?(1+2)*3==9]", &math);
        round_trip("$[?1-(2-3)==2]", &math);
        round_trip("$[?(@.a+@.b)/2<10]", &math);
    }

    #[test]
    fn deep_parentheses_are_rejected() {
        let text = format!("$[?{}@.a{}]", "(".repeat(200), ")".repeat(200));
        let err = rejects(&text, &strict());
        assert!(err.to_string().contains("nesting"));
    }

    #[test]
    fn deep_literals_are_rejected() {
        let options = strict().with_json_constructs(true);
        let text = format!("$[?@.a=={}{}]", "[".repeat(3000), "]".repeat(3000));
        let err = rejects(&text, &options);
        assert!(err.to_string().contains("nesting"));
        assert!(JsonPath::try_parse_with_options(&text, &options).is_none());

        let text = format!("$[?@.a=={}1{}]", "[".repeat(10), "]".repeat(10));
        assert!(JsonPath::try_parse_with_options(&text, &options).is_some());
    }

    #[test]
    fn custom_logical_function() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(FunctionDefinition::new(
                "even",
                vec![FunctionType::Value],
                ReturnCategory::Logical,
                |args| {
                    let even = args[0].as_value().and_then(|v| v.as_i64()).is_some_and(|n| n % 2 == 0);
                    Ok(PathValue::Logical(even))
                },
            ))
            .unwrap();
        let options = strict().with_functions(Arc::new(registry));
        round_trip("$[?even(@.n)]", &options);
        assert!(parse_path("$[?length(@)>1]", &options).is_err());
    }
}
