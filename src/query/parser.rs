use std::collections::HashMap;

use crate::error::PathError;

use super::ast::*;
use super::filter::GroupAttempt;
use super::options::PathEvaluationOptions;
use super::scanner::Scanner;

/// Limit on nested filters, parentheses, `!` and function calls.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parse a complete path string.
pub fn parse_path(text: &str, options: &PathEvaluationOptions) -> Result<Path, PathError> {
    let mut parser = Parser::new(text, options);
    let path = parser.parse()?;
    log::trace!("parsed path {path}");
    Ok(path)
}

pub(crate) struct Parser<'o> {
    pub(super) scanner: Scanner,
    pub(super) options: &'o PathEvaluationOptions,
    /// Outcomes of `( ... )` logical groups keyed by (offset, nest level).
    pub(super) groups: HashMap<(usize, usize), GroupAttempt>,
    depth: usize,
}

/// Saved parser position for backtracking.
#[derive(Debug, Clone, Copy)]
pub(super) struct Checkpoint {
    pos: usize,
    depth: usize,
}

impl<'o> Parser<'o> {
    pub fn new(text: &str, options: &'o PathEvaluationOptions) -> Self {
        Parser {
            scanner: Scanner::new(text),
            options,
            groups: HashMap::new(),
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Path, PathError> {
        if self.scanner.skip_whitespace() && !self.options.tolerate_extra_whitespace {
            return Err(PathError::syntax(0, "leading whitespace is not allowed"));
        }
        match self.scanner.peek() {
            Some('$') => {}
            Some('@') if self.options.allow_relative_path_start => {}
            Some('@') => {
                return Err(self.error("a path may only start with '@' inside a filter"));
            }
            Some(c) => return Err(self.error(format!("expected '$', found '{c}'"))),
            None => return Err(self.error("empty path")),
        }

        let path = self.parse_query()?;

        let end = self.scanner.pos();
        if self.scanner.skip_whitespace() && !self.options.tolerate_extra_whitespace {
            return Err(PathError::syntax(end, "trailing whitespace is not allowed"));
        }
        if let Some(c) = self.scanner.peek() {
            return Err(self.error(format!("unexpected character '{c}'")));
        }
        Ok(path)
    }

    pub(super) fn error(&self, message: impl Into<String>) -> PathError {
        self.scanner.error(message)
    }

    pub(super) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.scanner.pos(),
            depth: self.depth,
        }
    }

    pub(super) fn restore(&mut self, checkpoint: Checkpoint) {
        self.scanner.set_pos(checkpoint.pos);
        self.depth = checkpoint.depth;
    }

    pub(super) fn enter(&mut self) -> Result<(), PathError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "expression nesting exceeds the limit of {MAX_NESTING_DEPTH}"
            )));
        }
        Ok(())
    }

    pub(super) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// `$` or `@` followed by any number of segments. Whitespace after the
    /// last segment is left unconsumed.
    pub(super) fn parse_query(&mut self) -> Result<Path, PathError> {
        let scope = match self.scanner.advance() {
            Some('$') => Scope::Root,
            Some('@') => Scope::Current,
            _ => {
                let at = self.scanner.pos().saturating_sub(1);
                return Err(PathError::syntax(at, "expected '$' or '@'"));
            }
        };

        let mut segments = Vec::new();
        loop {
            let before = self.checkpoint();
            self.scanner.skip_whitespace();
            match self.scanner.peek() {
                Some('[') => segments.push(Segment {
                    recursive: false,
                    selectors: self.parse_bracketed()?,
                }),
                Some('.') if self.scanner.peek_at(1) == Some('.') => {
                    self.scanner.eat_str("..");
                    segments.push(self.parse_descendant()?);
                }
                Some('.') => {
                    self.scanner.advance();
                    segments.push(Segment {
                        recursive: false,
                        selectors: vec![self.parse_dot_member()?],
                    });
                }
                _ => {
                    self.restore(before);
                    break;
                }
            }
        }
        Ok(Path { scope, segments })
    }

    fn parse_descendant(&mut self) -> Result<Segment, PathError> {
        let selectors = if self.scanner.peek() == Some('[') {
            self.parse_bracketed()?
        } else {
            vec![self.parse_dot_member()?]
        };
        Ok(Segment {
            recursive: true,
            selectors,
        })
    }

    /// The `*` or name after `.` or `..`.
    fn parse_dot_member(&mut self) -> Result<Selector, PathError> {
        if self.scanner.eat('*') {
            return Ok(Selector::Wildcard);
        }
        let name = self.scanner.read_member_name();
        if name.is_empty() {
            return Err(match self.scanner.peek() {
                Some(c) => self.error(format!("expected a member name, found '{c}'")),
                None => self.error("expected a member name, found end of input"),
            });
        }
        Ok(Selector::Name(name))
    }

    fn parse_bracketed(&mut self) -> Result<Vec<Selector>, PathError> {
        self.scanner.expect('[')?;
        let mut selectors = Vec::new();
        loop {
            self.scanner.skip_whitespace();
            selectors.push(self.parse_selector()?);
            self.scanner.skip_whitespace();
            if !self.scanner.eat(',') {
                break;
            }
        }
        self.scanner.expect(']')?;
        Ok(selectors)
    }

    fn parse_selector(&mut self) -> Result<Selector, PathError> {
        match self.scanner.peek() {
            Some('\'') | Some('"') => Ok(Selector::Name(self.scanner.read_quoted_string()?)),
            Some('*') => {
                self.scanner.advance();
                Ok(Selector::Wildcard)
            }
            Some('?') => {
                self.scanner.advance();
                self.enter()?;
                self.scanner.skip_whitespace();
                let filter = self.parse_filter_selector()?;
                self.leave();
                Ok(Selector::Filter(filter))
            }
            Some(c) if c == '-' || c == ':' || c.is_ascii_digit() => self.parse_index_or_slice(),
            Some(c) => Err(self.error(format!("expected a selector, found '{c}'"))),
            None => Err(self.error("expected a selector, found end of input")),
        }
    }

    fn parse_index_or_slice(&mut self) -> Result<Selector, PathError> {
        let start = self.optional_integer()?;
        self.scanner.skip_whitespace();
        if !self.scanner.eat(':') {
            return match start {
                Some(index) => Ok(Selector::Index(index)),
                None => Err(self.error("expected an index or slice")),
            };
        }
        self.scanner.skip_whitespace();
        let end = self.optional_integer()?;
        self.scanner.skip_whitespace();
        let step = if self.scanner.eat(':') {
            self.scanner.skip_whitespace();
            self.optional_integer()?
        } else {
            None
        };
        Ok(Selector::Slice(Slice { start, end, step }))
    }

    fn optional_integer(&mut self) -> Result<Option<i64>, PathError> {
        match self.scanner.peek() {
            Some(c) if c == '-' || c.is_ascii_digit() => self.scanner.read_integer().map(Some),
            _ => Ok(None),
        }
    }
}
