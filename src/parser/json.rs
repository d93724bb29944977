use serde_json::Value;

use crate::error::PathError;

/// Parse one JSON document. Object member order is kept as written.
pub fn parse(input: &str) -> Result<Value, PathError> {
    serde_json::from_str(input).map_err(|e| PathError::Parse(format!("invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_member_order() {
        let val = parse(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<_> = val.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn large_integers_survive() {
        let val = parse("[9007199254740993]").unwrap();
        assert_eq!(val[0].as_u64(), Some(9007199254740993));
    }

    #[test]
    fn invalid_json_errors() {
        let err = parse("{not json}").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }
}
