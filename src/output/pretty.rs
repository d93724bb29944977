use serde_json::{json, Value};

use crate::error::PathError;
use crate::format::Format;
use crate::query::value::Match;

/// What is printed for each match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Values,
    /// Locations only.
    Paths,
    /// `{"path": ..., "value": ...}` objects.
    Pairs,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub format: Format,
    pub compact: bool,
    pub raw: bool,
    pub layout: Layout,
    /// Print normalized paths (`$['a'][0]`) instead of JSON Pointers.
    pub normalized: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            format: Format::Json,
            compact: false,
            raw: false,
            layout: Layout::Values,
            normalized: false,
        }
    }
}

/// Format a value. In raw mode a string is written without quotes.
pub fn format_value(value: &Value, format: Format, compact: bool, raw: bool) -> Result<String, PathError> {
    if raw {
        if let Value::String(s) = value {
            return Ok(s.clone());
        }
    }

    match format {
        Format::Json => {
            let result = if compact {
                serde_json::to_string(value)
            } else {
                serde_json::to_string_pretty(value)
            };
            result.map_err(|e| PathError::Parse(e.to_string()))
        }
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| PathError::Parse(e.to_string())),
    }
}

fn location(found: &Match, normalized: bool) -> String {
    if normalized {
        found.normalized_path()
    } else {
        found.location.to_string()
    }
}

/// Render one match according to the layout.
pub fn render_match(found: &Match, options: &RenderOptions) -> Result<String, PathError> {
    match options.layout {
        Layout::Values => format_value(&found.value, options.format, options.compact, options.raw),
        // A location is always text, so it is printed bare like a raw string.
        Layout::Paths => Ok(location(found, options.normalized)),
        Layout::Pairs => {
            let pair = json!({
                "path": location(found, options.normalized),
                "value": found.value,
            });
            format_value(&pair, options.format, options.compact, false)
        }
    }
}

/// Render a sequence of matches, one per line (YAML documents are separated
/// by `---`).
pub fn render_matches<'a, I>(matches: I, options: &RenderOptions) -> Result<String, PathError>
where
    I: IntoIterator<Item = &'a Match>,
{
    let mut buf = String::new();
    let separate_documents = options.format == Format::Yaml && options.layout != Layout::Paths;
    for (i, found) in matches.into_iter().enumerate() {
        if separate_documents && i > 0 {
            buf.push_str("---\n");
        }
        let rendered = render_match(found, options)?;
        buf.push_str(&rendered);
        if !rendered.ends_with('\n') {
            buf.push('\n');
        }
    }
    Ok(buf)
}
