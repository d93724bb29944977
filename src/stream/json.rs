use serde_json::Value;

use crate::error::PathError;
use crate::query::options::PathEvaluationOptions;
use crate::query::value::Match;
use crate::query::JsonPath;

/// Evaluate `path` against every line of newline-delimited JSON. Blank lines
/// are skipped; `on_match` receives the 1-based line number with each match.
/// With `first`, at most one match is taken from each line.
pub fn stream_ndjson<F>(
    input: &str,
    path: &JsonPath,
    options: &PathEvaluationOptions,
    first: bool,
    mut on_match: F,
) -> Result<(), PathError>
where
    F: FnMut(usize, Match) -> Result<(), PathError>,
{
    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|e| PathError::Parse(format!("line {line_no}: {e}")))?;
        evaluate_document(&value, path, options, first, |found| on_match(line_no, found))?;
    }
    Ok(())
}

/// Evaluate `path` against a sequence of concatenated JSON documents
/// (`{"a":1} {"a":2}`), parsing them one at a time.
pub fn stream_documents<F>(
    input: &str,
    path: &JsonPath,
    options: &PathEvaluationOptions,
    first: bool,
    mut on_match: F,
) -> Result<(), PathError>
where
    F: FnMut(Match) -> Result<(), PathError>,
{
    let stream = serde_json::Deserializer::from_str(input).into_iter::<Value>();
    for item in stream {
        let value = item.map_err(|e| PathError::Parse(e.to_string()))?;
        evaluate_document(&value, path, options, first, &mut on_match)?;
    }
    Ok(())
}

/// Evaluate `path` against a single document. With `first`, only the first
/// match is passed on and the rest of the document is not searched.
pub fn evaluate_document<F>(
    value: &Value,
    path: &JsonPath,
    options: &PathEvaluationOptions,
    first: bool,
    mut on_match: F,
) -> Result<(), PathError>
where
    F: FnMut(Match) -> Result<(), PathError>,
{
    let result = path.evaluate(value, options);
    let mut matches = result.matches();
    while let Some(found) = matches.try_next()? {
        on_match(found)?;
        if first {
            break;
        }
    }
    Ok(())
}
