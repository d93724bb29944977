use std::path::Path;

use crate::error::PathError;

/// Document formats the command-line tool reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_extension(path: &Path) -> Result<Self, PathError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or(PathError::NoExtension)?;

        match ext.to_ascii_lowercase().as_str() {
            "json" | "jsonl" | "ndjson" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(PathError::UnknownExtension(other.to_string())),
        }
    }

    pub fn from_str_name(s: &str) -> Result<Self, PathError> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(PathError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Guess the format of text with no file name. Anything that does not
    /// open like a JSON document is read as YAML.
    pub fn sniff(input: &str) -> Self {
        match input.trim_start().chars().next() {
            Some('{') | Some('[') | Some('"') => Format::Json,
            _ => Format::Yaml,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Yaml => write!(f, "yaml"),
        }
    }
}
