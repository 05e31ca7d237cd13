//! Convert serde_json::Value into text parameters with an explicit SQL cast.

use serde_json::Value;

/// One bound parameter. Every value is sent as text and cast server-side, so
/// the statement never depends on the wire type of the bind.
#[derive(Clone, Debug, PartialEq)]
pub struct PgParam {
    pub text: Option<String>,
    pub cast: String,
}

impl PgParam {
    pub fn from_json(v: &Value, cast: &str) -> Self {
        let text = match v {
            Value::Null => None,
            _ if is_json_type(cast) => Some(v.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Array(_) | Value::Object(_) => Some(v.to_string()),
        };
        PgParam {
            text,
            cast: cast.to_string(),
        }
    }

    /// Parameter for a column whose type is unknown: inferred from the JSON value.
    pub fn inferred(v: &Value) -> Self {
        let cast = match v {
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_i64() || n.is_u64() => "int8",
            Value::Number(_) => "float8",
            Value::Array(_) | Value::Object(_) => "jsonb",
            Value::Null | Value::String(_) => "text",
        };
        Self::from_json(v, cast)
    }
}

fn is_json_type(cast: &str) -> bool {
    cast == "json" || cast == "jsonb"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_columns_receive_serialized_text() {
        let p = PgParam::from_json(&json!("hello"), "jsonb");
        assert_eq!(p.text.as_deref(), Some("\"hello\""));
        let p = PgParam::from_json(&json!("hello"), "text");
        assert_eq!(p.text.as_deref(), Some("hello"));
    }

    #[test]
    fn null_binds_as_none() {
        assert_eq!(PgParam::from_json(&Value::Null, "int8").text, None);
        assert_eq!(PgParam::inferred(&json!(true)).cast, "bool");
    }
}
