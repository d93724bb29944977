use serde_json::{Map, Value};

use crate::error::PathError;

use super::parser::MAX_NESTING_DEPTH;

/// Largest integer allowed in index and slice selectors (I-JSON range).
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Character cursor shared by the path and filter parsers.
#[derive(Debug, Clone)]
pub struct Scanner {
    input: Vec<char>,
    pos: usize,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Scanner {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Rewind or fast-forward; used to backtrack after a failed attempt.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_str(&mut self, expected: &str) -> bool {
        if self.starts_with(expected) {
            self.pos += expected.chars().count();
            true
        } else {
            false
        }
    }

    pub fn starts_with(&self, expected: &str) -> bool {
        let mut i = self.pos;
        for c in expected.chars() {
            if self.input.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(is_blank) {
            self.pos += 1;
        }
        self.pos > start
    }

    pub fn error(&self, message: impl Into<String>) -> PathError {
        PathError::syntax(self.pos, message)
    }

    pub fn expect(&mut self, expected: char) -> Result<(), PathError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    /// A single- or double-quoted string at the cursor.
    pub fn read_quoted_string(&mut self) -> Result<String, PathError> {
        match scan_string(&self.input, self.pos) {
            Ok((s, end)) => {
                self.pos = end;
                Ok(s)
            }
            Err((position, message)) => Err(PathError::syntax(position, message)),
        }
    }

    /// An integer selector value: optional `-`, no leading zeros, no `-0`,
    /// within ±(2^53-1).
    pub fn read_integer(&mut self) -> Result<i64, PathError> {
        let start = self.pos;
        let negative = self.eat('-');
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.input[digits_start..self.pos].iter().collect();
        if digits.is_empty() {
            return Err(self.error("expected an integer"));
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return Err(PathError::syntax(start, "leading zeros are not allowed"));
        }
        if negative && digits == "0" {
            return Err(PathError::syntax(start, "'-0' is not a valid index"));
        }
        let magnitude: i64 = digits
            .parse()
            .ok()
            .filter(|n| *n <= MAX_SAFE_INTEGER)
            .ok_or_else(|| PathError::syntax(start, format!("integer {digits} is out of range")))?;
        Ok(if negative { -magnitude } else { magnitude })
    }

    /// A `.name` shorthand member name; empty if none is present.
    pub fn read_member_name(&mut self) -> String {
        let start = self.pos;
        if self.peek().is_some_and(is_name_first) {
            self.pos += 1;
            while self.peek().is_some_and(is_name_char) {
                self.pos += 1;
            }
        }
        self.input[start..self.pos].iter().collect()
    }

    /// A lowercase function name followed directly by `(`; `None` (cursor
    /// untouched) if the text here is not a function call.
    pub fn peek_function_name(&self) -> Option<String> {
        let mut i = self.pos;
        if !self.input.get(i).is_some_and(|c| c.is_ascii_lowercase()) {
            return None;
        }
        while self
            .input
            .get(i)
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        {
            i += 1;
        }
        if self.input.get(i) == Some(&'(') {
            Some(self.input[self.pos..i].iter().collect())
        } else {
            None
        }
    }

    /// Parse one JSON literal at the cursor. See [`try_parse_json_element`].
    ///
    /// Arrays and objects nested deeper than [`MAX_NESTING_DEPTH`] are a
    /// syntax error rather than "no literal here".
    pub fn try_literal(&mut self, allow_constructs: bool) -> Result<Option<Value>, PathError> {
        if !allow_constructs && matches!(self.peek(), Some('[') | Some('{')) {
            return Ok(None);
        }
        let mut too_deep = false;
        let mut i = self.pos;
        match parse_element(&self.input, &mut i, 0, &mut too_deep) {
            Some(value) => {
                self.pos = i;
                Ok(Some(value))
            }
            None if too_deep => Err(self.error(format!(
                "literal nesting exceeds the limit of {MAX_NESTING_DEPTH}"
            ))),
            None => Ok(None),
        }
    }
}

pub(crate) fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn is_name_first(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_first(c) || c.is_ascii_digit()
}

/// Consume exactly one JSON value starting at `index`.
///
/// On success `index` points just past the literal and anything after it is
/// left alone. On failure `None` is returned and `index` is unchanged.
/// Strings may use either quote style. Leading whitespace is the caller's.
/// Arrays and objects nested deeper than [`MAX_NESTING_DEPTH`] fail.
pub fn try_parse_json_element(source: &[char], index: &mut usize) -> Option<Value> {
    let mut i = *index;
    let value = parse_element(source, &mut i, 0, &mut false)?;
    *index = i;
    Some(value)
}

fn parse_element(src: &[char], i: &mut usize, depth: usize, too_deep: &mut bool) -> Option<Value> {
    match src.get(*i)? {
        '"' | '\'' => {
            let (s, end) = scan_string(src, *i).ok()?;
            *i = end;
            Some(Value::String(s))
        }
        '[' | '{' if depth >= MAX_NESTING_DEPTH => {
            *too_deep = true;
            None
        }
        '[' => parse_array(src, i, depth, too_deep),
        '{' => parse_object(src, i, depth, too_deep),
        't' => parse_keyword(src, i, "true", Value::Bool(true)),
        'f' => parse_keyword(src, i, "false", Value::Bool(false)),
        'n' => parse_keyword(src, i, "null", Value::Null),
        c if *c == '-' || c.is_ascii_digit() => parse_number(src, i),
        _ => None,
    }
}

fn parse_keyword(src: &[char], i: &mut usize, word: &str, value: Value) -> Option<Value> {
    let len = word.chars().count();
    let matches = src
        .get(*i..*i + len)
        .is_some_and(|s| s.iter().copied().eq(word.chars()));
    if !matches || src.get(*i + len).copied().is_some_and(is_name_char) {
        return None;
    }
    *i += len;
    Some(value)
}

fn parse_number(src: &[char], i: &mut usize) -> Option<Value> {
    let digits = |j: &mut usize| {
        let start = *j;
        while src.get(*j).is_some_and(|c| c.is_ascii_digit()) {
            *j += 1;
        }
        *j > start
    };

    let start = *i;
    let mut j = *i;
    if src.get(j) == Some(&'-') {
        j += 1;
    }
    match src.get(j) {
        Some('0') => j += 1,
        Some(c) if c.is_ascii_digit() => {
            digits(&mut j);
        }
        _ => return None,
    }
    if src.get(j) == Some(&'.') {
        j += 1;
        if !digits(&mut j) {
            return None;
        }
    }
    if matches!(src.get(j), Some('e') | Some('E')) {
        j += 1;
        if matches!(src.get(j), Some('+') | Some('-')) {
            j += 1;
        }
        if !digits(&mut j) {
            return None;
        }
    }
    let text: String = src[start..j].iter().collect();
    let number: serde_json::Number = text.parse().ok()?;
    *i = j;
    Some(Value::Number(number))
}

fn skip_blank(src: &[char], i: &mut usize) {
    while src.get(*i).copied().is_some_and(is_blank) {
        *i += 1;
    }
}

fn parse_array(src: &[char], i: &mut usize, depth: usize, too_deep: &mut bool) -> Option<Value> {
    let mut j = *i + 1;
    let mut items = Vec::new();
    skip_blank(src, &mut j);
    if src.get(j) == Some(&']') {
        *i = j + 1;
        return Some(Value::Array(items));
    }
    loop {
        skip_blank(src, &mut j);
        items.push(parse_element(src, &mut j, depth + 1, too_deep)?);
        skip_blank(src, &mut j);
        match src.get(j)? {
            ',' => j += 1,
            ']' => {
                *i = j + 1;
                return Some(Value::Array(items));
            }
            _ => return None,
        }
    }
}

fn parse_object(src: &[char], i: &mut usize, depth: usize, too_deep: &mut bool) -> Option<Value> {
    let mut j = *i + 1;
    let mut map = Map::new();
    skip_blank(src, &mut j);
    if src.get(j) == Some(&'}') {
        *i = j + 1;
        return Some(Value::Object(map));
    }
    loop {
        skip_blank(src, &mut j);
        if !matches!(src.get(j), Some('"') | Some('\'')) {
            return None;
        }
        let (key, end) = scan_string(src, j).ok()?;
        j = end;
        skip_blank(src, &mut j);
        if src.get(j) != Some(&':') {
            return None;
        }
        j += 1;
        skip_blank(src, &mut j);
        let value = parse_element(src, &mut j, depth + 1, too_deep)?;
        map.insert(key, value);
        skip_blank(src, &mut j);
        match src.get(j)? {
            ',' => j += 1,
            '}' => {
                *i = j + 1;
                return Some(Value::Object(map));
            }
            _ => return None,
        }
    }
}

/// Read a quoted string starting at `start` (which must hold the quote).
/// Returns the unescaped text and the index after the closing quote, or the
/// error offset and message.
fn scan_string(src: &[char], start: usize) -> Result<(String, usize), (usize, String)> {
    let quote = match src.get(start) {
        Some(&q @ ('"' | '\'')) => q,
        _ => return Err((start, "expected a quoted string".into())),
    };
    let mut out = String::new();
    let mut i = start + 1;
    loop {
        let c = *src
            .get(i)
            .ok_or_else(|| (start, "unterminated string".to_string()))?;
        match c {
            c if c == quote => return Ok((out, i + 1)),
            '\\' => {
                let escaped = *src
                    .get(i + 1)
                    .ok_or_else(|| (i, "unterminated string escape".to_string()))?;
                i += 2;
                match escaped {
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '/' => out.push('/'),
                    '\\' => out.push('\\'),
                    q if q == quote => out.push(q),
                    'u' => {
                        let (ch, next) = scan_unicode_escape(src, i)?;
                        out.push(ch);
                        i = next;
                    }
                    other => return Err((i - 2, format!("invalid escape '\\{other}'"))),
                }
            }
            c if (c as u32) < 0x20 => {
                return Err((i, "control characters must be escaped".into()));
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
}

fn read_hex4(src: &[char], at: usize) -> Result<u32, (usize, String)> {
    let hex: String = src
        .get(at..at + 4)
        .ok_or_else(|| (at, "incomplete unicode escape".to_string()))?
        .iter()
        .collect();
    u32::from_str_radix(&hex, 16).map_err(|_| (at, format!("invalid unicode escape '\\u{hex}'")))
}

/// `at` is just past `\u`. Handles surrogate pairs.
fn scan_unicode_escape(src: &[char], at: usize) -> Result<(char, usize), (usize, String)> {
    let high = read_hex4(src, at)?;
    let mut next = at + 4;
    let code = match high {
        0xD800..=0xDBFF => {
            if src.get(next) != Some(&'\\') || src.get(next + 1) != Some(&'u') {
                return Err((at, "unpaired surrogate in unicode escape".into()));
            }
            let low = read_hex4(src, next + 2)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err((next + 2, "invalid low surrogate in unicode escape".into()));
            }
            next += 6;
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        }
        0xDC00..=0xDFFF => return Err((at, "unpaired surrogate in unicode escape".into())),
        code => code,
    };
    char::from_u32(code)
        .map(|c| (c, next))
        .ok_or_else(|| (at, "invalid unicode escape".to_string()))
}
