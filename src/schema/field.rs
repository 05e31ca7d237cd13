//! Field attributes and per-type value codecs.

use crate::error::AdapterError;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Logical column type. Each type owns a [`FieldCodec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Json,
}

/// What the concrete store can hold natively. Anything it cannot is encoded on input.
#[derive(Clone, Copy, Debug)]
pub struct StoreCapabilities {
    pub supports_json: bool,
    pub supports_dates: bool,
    pub supports_booleans: bool,
}

impl Default for StoreCapabilities {
    fn default() -> Self {
        StoreCapabilities {
            supports_json: true,
            supports_dates: true,
            supports_booleans: true,
        }
    }
}

/// Conversion between API values and store values for one field type.
pub trait FieldCodec: Send + Sync {
    /// API value -> store value.
    fn input(&self, field: &str, value: Value, caps: &StoreCapabilities) -> Result<Value, AdapterError>;
    /// Store value -> API value.
    fn output(&self, value: Value) -> Value;
}

/// User supplied transform layered on top of the type codec.
pub trait FieldTransform: Send + Sync {
    fn input(&self, value: Value) -> Value {
        value
    }
    fn output(&self, value: Value) -> Value {
        value
    }
}

struct StringCodec;
struct NumberCodec;
struct BooleanCodec;
struct DateCodec;
struct JsonCodec;

impl FieldType {
    pub fn codec(&self) -> &'static dyn FieldCodec {
        match self {
            FieldType::String => &StringCodec,
            FieldType::Number => &NumberCodec,
            FieldType::Boolean => &BooleanCodec,
            FieldType::Date => &DateCodec,
            FieldType::Json => &JsonCodec,
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> AdapterError {
    AdapterError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

impl FieldCodec for StringCodec {
    fn input(&self, field: &str, value: Value, _caps: &StoreCapabilities) -> Result<Value, AdapterError> {
        match value {
            Value::Null | Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid(field, "expected a string")),
        }
    }

    fn output(&self, value: Value) -> Value {
        value
    }
}

/// Integral floats come back from some stores as `5.0`; fold them to `5`.
pub(crate) fn normalize_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl FieldCodec for NumberCodec {
    fn input(&self, field: &str, value: Value, _caps: &StoreCapabilities) -> Result<Value, AdapterError> {
        match value {
            Value::Null | Value::Number(_) => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(normalize_number)
                .map_err(|_| invalid(field, "expected a number")),
            _ => Err(invalid(field, "expected a number")),
        }
    }

    fn output(&self, value: Value) -> Value {
        match value {
            Value::Number(ref n) => match n.as_f64() {
                Some(f) if !n.is_i64() && !n.is_u64() => normalize_number(f),
                _ => value,
            },
            Value::String(s) => s.parse::<f64>().map(normalize_number).unwrap_or(Value::String(s)),
            other => other,
        }
    }
}

impl FieldCodec for BooleanCodec {
    fn input(&self, field: &str, value: Value, caps: &StoreCapabilities) -> Result<Value, AdapterError> {
        let b = match value {
            Value::Null => return Ok(Value::Null),
            Value::Bool(b) => b,
            Value::String(ref s) if s == "true" => true,
            Value::String(ref s) if s == "false" => false,
            Value::Number(ref n) if n.as_i64() == Some(1) => true,
            Value::Number(ref n) if n.as_i64() == Some(0) => false,
            _ => return Err(invalid(field, "expected a boolean")),
        };
        Ok(if caps.supports_booleans {
            Value::Bool(b)
        } else {
            Value::from(b as i64)
        })
    }

    fn output(&self, value: Value) -> Value {
        match value {
            Value::Number(n) => Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => Value::Bool(s == "true" || s == "1"),
            other => other,
        }
    }
}

/// Canonical wire format for dates: RFC 3339, millisecond precision, `Z` suffix.
pub fn format_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .map(|n| n.and_utc())
                    .ok()
            }),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

impl FieldCodec for DateCodec {
    fn input(&self, field: &str, value: Value, caps: &StoreCapabilities) -> Result<Value, AdapterError> {
        if value.is_null() {
            return Ok(value);
        }
        let d = parse_date(&value).ok_or_else(|| invalid(field, "expected an RFC 3339 date"))?;
        Ok(if caps.supports_dates {
            Value::String(format_date(&d))
        } else {
            Value::from(d.timestamp_millis())
        })
    }

    fn output(&self, value: Value) -> Value {
        match parse_date(&value) {
            Some(d) => Value::String(format_date(&d)),
            None => value,
        }
    }
}

impl FieldCodec for JsonCodec {
    fn input(&self, _field: &str, value: Value, caps: &StoreCapabilities) -> Result<Value, AdapterError> {
        if caps.supports_json || value.is_null() {
            return Ok(value);
        }
        Ok(Value::String(value.to_string()))
    }

    fn output(&self, value: Value) -> Value {
        match value {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other,
        }
    }
}

/// Value to fill when the caller omits a field.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    /// Current time in the canonical date format.
    Now,
    /// Fresh v4 uuid string.
    Uuid,
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Now => Value::String(format_date(&Utc::now())),
            DefaultValue::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            DefaultValue::Generator(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Now => f.write_str("Now"),
            DefaultValue::Uuid => f.write_str("Uuid"),
            DefaultValue::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl OnDelete {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::NoAction => "NO ACTION",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldReference {
    pub model: String,
    pub field: String,
    pub on_delete: OnDelete,
}

/// How one column is validated, defaulted, and (de)serialized.
#[derive(Clone)]
pub struct FieldAttribute {
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub default_value: Option<DefaultValue>,
    /// Applied on every update that does not set the field explicitly.
    pub on_update: Option<DefaultValue>,
    pub transform: Option<Arc<dyn FieldTransform>>,
    pub references: Option<FieldReference>,
    /// Physical column name; defaults to the logical key.
    pub field_name: Option<String>,
    /// When false the field is never included in adapter output.
    pub returned: bool,
}

impl FieldAttribute {
    pub fn new(field_type: FieldType) -> Self {
        FieldAttribute {
            field_type,
            required: false,
            unique: false,
            default_value: None,
            on_update: None,
            transform: None,
            references: None,
            field_name: None,
            returned: true,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn json() -> Self {
        Self::new(FieldType::Json)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_with(mut self, default: DefaultValue) -> Self {
        self.default_value = Some(default);
        self
    }

    pub fn on_update(mut self, default: DefaultValue) -> Self {
        self.on_update = Some(default);
        self
    }

    pub fn transform(mut self, transform: Arc<dyn FieldTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn references(mut self, model: &str, field: &str, on_delete: OnDelete) -> Self {
        self.references = Some(FieldReference {
            model: model.to_string(),
            field: field.to_string(),
            on_delete,
        });
        self
    }

    pub fn field_name(mut self, name: &str) -> Self {
        self.field_name = Some(name.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.returned = false;
        self
    }

    /// Column name in the store for logical key `key`.
    pub fn column<'a>(&'a self, key: &'a str) -> &'a str {
        self.field_name.as_deref().unwrap_or(key)
    }

    /// Run the custom transform then the type codec.
    pub fn encode(&self, key: &str, value: Value, caps: &StoreCapabilities) -> Result<Value, AdapterError> {
        let value = match &self.transform {
            Some(t) => t.input(value),
            None => value,
        };
        self.field_type.codec().input(key, value, caps)
    }

    /// Run the type codec then the custom transform.
    pub fn decode(&self, value: Value) -> Value {
        let value = self.field_type.codec().output(value);
        match &self.transform {
            Some(t) => t.output(value),
            None => value,
        }
    }
}

impl fmt::Debug for FieldAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAttribute")
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("default_value", &self.default_value)
            .field("on_update", &self.on_update)
            .field("references", &self.references)
            .field("field_name", &self.field_name)
            .field("returned", &self.returned)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn caps() -> StoreCapabilities {
        StoreCapabilities::default()
    }

    #[test]
    fn dates_normalize_to_millis_utc() {
        let out = FieldType::Date
            .codec()
            .input("createdAt", json!("2024-03-01T10:00:00+02:00"), &caps())
            .unwrap();
        assert_eq!(out, json!("2024-03-01T08:00:00.000Z"));
        assert_eq!(FieldType::Date.codec().output(json!(0)), json!("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn booleans_fall_back_to_integers() {
        let no_bools = StoreCapabilities {
            supports_booleans: false,
            ..caps()
        };
        let stored = FieldType::Boolean.codec().input("read", json!(true), &no_bools).unwrap();
        assert_eq!(stored, json!(1));
        assert_eq!(FieldType::Boolean.codec().output(stored), json!(true));
    }

    #[test]
    fn json_is_stringified_when_unsupported() {
        let no_json = StoreCapabilities {
            supports_json: false,
            ..caps()
        };
        let stored = FieldType::Json.codec().input("content", json!({"a": [1]}), &no_json).unwrap();
        assert!(stored.is_string());
        assert_eq!(FieldType::Json.codec().output(stored), json!({"a": [1]}));
    }

    #[test]
    fn numbers_reject_garbage() {
        assert!(FieldType::Number.codec().input("age", json!("abc"), &caps()).is_err());
        assert_eq!(FieldType::Number.codec().output(json!(5.0)), json!(5));
    }

    struct Lowercase;

    impl FieldTransform for Lowercase {
        fn input(&self, value: Value) -> Value {
            match value {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other,
            }
        }
    }

    #[test]
    fn custom_transform_runs_before_codec() {
        let attr = FieldAttribute::string().transform(Arc::new(Lowercase));
        assert_eq!(attr.encode("email", json!("A@B.COM"), &caps()).unwrap(), json!("a@b.com"));
    }
}
