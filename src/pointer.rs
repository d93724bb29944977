//! JSON Pointer (RFC 6901) locations.
//!
//! Every match produced by a path evaluation carries a [`JsonPointer`] to the
//! node it was found at. Pointers built by the evaluator keep typed segments
//! (member names vs. array indices); pointers parsed from text only know
//! names, and a name that is a canonical array index addresses an element.

use std::fmt;

use serde_json::Value;

use crate::error::PathError;

/// A single reference token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointerSegment {
    Name(String),
    Index(usize),
}

impl PointerSegment {
    /// The token as it appears in a pointer string, with `~0`/`~1` escaping.
    pub fn escaped(&self) -> String {
        match self {
            PointerSegment::Name(name) => name.replace('~', "~0").replace('/', "~1"),
            PointerSegment::Index(i) => i.to_string(),
        }
    }

    fn unescape(token: &str) -> Result<String, PathError> {
        let mut out = String::with_capacity(token.len());
        let mut chars = token.chars();
        while let Some(c) = chars.next() {
            if c != '~' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                Some(other) => {
                    return Err(PathError::InvalidPointer(format!(
                        "invalid escape '~{other}' in token '{token}'"
                    )))
                }
                None => {
                    return Err(PathError::InvalidPointer(format!(
                        "dangling '~' in token '{token}'"
                    )))
                }
            }
        }
        Ok(out)
    }

    fn as_array_index(&self) -> Option<usize> {
        match self {
            PointerSegment::Index(i) => Some(*i),
            PointerSegment::Name(name) => {
                let canonical = name == "0"
                    || (!name.is_empty()
                        && !name.starts_with('0')
                        && name.chars().all(|c| c.is_ascii_digit()));
                if canonical {
                    name.parse().ok()
                } else {
                    None
                }
            }
        }
    }

    fn step<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match value {
            Value::Object(map) => match self {
                PointerSegment::Name(name) => map.get(name),
                PointerSegment::Index(i) => map.get(&i.to_string()),
            },
            Value::Array(arr) => self.as_array_index().and_then(|i| arr.get(i)),
            _ => None,
        }
    }
}

impl fmt::Display for PointerSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.escaped())
    }
}

/// A location inside a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    segments: Vec<PointerSegment>,
}

impl JsonPointer {
    /// The empty pointer, addressing the whole document.
    pub fn root() -> Self {
        JsonPointer::default()
    }

    pub fn from_segments(segments: Vec<PointerSegment>) -> Self {
        JsonPointer { segments }
    }

    /// Parse a pointer string such as `/store/book/0`.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Ok(JsonPointer::root());
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Err(PathError::InvalidPointer(format!(
                "pointer must start with '/': {input}"
            )));
        };
        let segments = rest
            .split('/')
            .map(|token| PointerSegment::unescape(token).map(PointerSegment::Name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JsonPointer { segments })
    }

    pub fn segments(&self) -> &[PointerSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: PointerSegment) {
        self.segments.push(segment);
    }

    /// A new pointer one level below this one.
    pub fn join(&self, segment: PointerSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        JsonPointer { segments }
    }

    /// A new pointer with `other`'s segments appended.
    pub fn concat(&self, other: &JsonPointer) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        JsonPointer { segments }
    }

    /// Follow the pointer from `root`. `None` if any step is missing.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |value, segment| segment.step(value))
    }

    /// The RFC 9535 normalized path for this location, e.g. `$['a'][0]`.
    pub fn to_normalized_path(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.segments {
            match segment {
                PointerSegment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
                PointerSegment::Name(name) => {
                    out.push_str("['");
                    push_normalized_name(&mut out, name);
                    out.push_str("']");
                }
            }
        }
        out
    }
}

fn push_normalized_name(out: &mut String, name: &str) {
    for c in name.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for JsonPointer {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPointer::parse(s)
    }
}
