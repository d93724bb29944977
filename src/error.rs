use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("path is not singular: {0}")]
    NotSingular(String),

    #[error("function {name}() failed: {message}")]
    Function { name: String, message: String },

    #[error("data reference error: {0}")]
    DataReference(String),

    #[error("invalid JSON pointer: {0}")]
    InvalidPointer(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot detect format: no file extension")]
    NoExtension,

    #[error("unknown file extension: .{0}")]
    UnknownExtension(String),
}

impl PathError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        PathError::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Character offset of a syntax error, if this is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            PathError::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_reports_offset() {
        let err = PathError::syntax(4, "unexpected ']'");
        assert_eq!(err.position(), Some(4));
        assert_eq!(err.to_string(), "syntax error at position 4: unexpected ']'");
    }

    #[test]
    fn non_syntax_errors_have_no_offset() {
        assert_eq!(PathError::NotSingular("wildcard".into()).position(), None);
    }
}
