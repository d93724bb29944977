//! Document loaders for the command-line tool.

pub mod json;
pub mod yaml;

use serde_json::Value;

use crate::error::PathError;
use crate::format::Format;

/// Load a document in the given format.
pub fn parse(input: &str, format: Format) -> Result<Value, PathError> {
    log::debug!("loading {format} document ({} bytes)", input.len());
    match format {
        Format::Json => json::parse(input),
        Format::Yaml => yaml::parse(input),
    }
}

/// Load a document, guessing its format from the content.
pub fn parse_sniffed(input: &str) -> Result<Value, PathError> {
    parse(input, Format::sniff(input))
}
