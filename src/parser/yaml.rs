use serde_json::{Map, Number, Value};
use serde_yaml::Value as Yaml;

use crate::error::PathError;

/// Parse a YAML document into the JSON value model paths are evaluated on.
pub fn parse(input: &str) -> Result<Value, PathError> {
    let yaml: Yaml =
        serde_yaml::from_str(input).map_err(|e| PathError::Parse(format!("invalid YAML: {e}")))?;
    to_json(yaml)
}

fn to_json(yaml: Yaml) -> Result<Value, PathError> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                // JSON has no NaN or infinity
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => {
            Value::Array(items.into_iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Yaml::Mapping(mapping) => {
            let mut members = Map::new();
            for (key, value) in mapping {
                members.insert(member_name(key)?, to_json(value)?);
            }
            Value::Object(members)
        }
        Yaml::Tagged(tagged) => to_json(tagged.value)?,
    })
}

fn member_name(key: Yaml) -> Result<String, PathError> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(PathError::Parse(
            "YAML mapping keys must be scalars to be used as member names".into(),
        )),
    }
}
