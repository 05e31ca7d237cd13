//! Declared input schemas for endpoint bodies and query strings.

use crate::error::ApiError;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    #[default]
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
    DateTime,
}

#[derive(Clone, Debug, Default)]
pub struct FieldRule {
    pub kind: ValueKind,
    pub required: bool,
    pub format: Option<Format>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub allowed: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl FieldRule {
    pub fn of(kind: ValueKind) -> Self {
        FieldRule {
            kind,
            ..Default::default()
        }
    }

    pub fn string() -> Self {
        Self::of(ValueKind::String)
    }

    pub fn number() -> Self {
        Self::of(ValueKind::Number)
    }

    pub fn boolean() -> Self {
        Self::of(ValueKind::Boolean)
    }

    pub fn object() -> Self {
        Self::of(ValueKind::Object)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn email(self) -> Self {
        self.format(Format::Email)
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }
}

/// Field rules keyed by input field name. Unknown fields pass through.
#[derive(Clone, Debug, Default)]
pub struct InputSchema {
    pub fields: IndexMap<String, FieldRule>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rule: FieldRule) -> Self {
        self.fields.insert(name.to_string(), rule);
        self
    }

    /// Check every rule and report all failures at once as `VALIDATION_ERROR`
    /// with `details: [{field, message}]`.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<(), ApiError> {
        let mut issues = Vec::new();
        for (name, rule) in &self.fields {
            match input.get(name) {
                None | Some(Value::Null) if rule.required => issues.push((name.clone(), format!("{} is required", name))),
                None | Some(Value::Null) => {}
                Some(v) => {
                    if let Err(message) = check_field(name, v, rule) {
                        issues.push((name.clone(), message));
                    }
                }
            }
        }
        if issues.is_empty() {
            return Ok(());
        }
        let message = issues.iter().map(|(_, m)| m.as_str()).collect::<Vec<_>>().join("; ");
        let details = issues
            .into_iter()
            .map(|(field, message)| json!({"field": field, "message": message}))
            .collect();
        Err(ApiError::validation(message).with_details(Value::Array(details)))
    }

    /// Query values arrive as strings; convert them to the declared kind where possible.
    pub fn coerce(&self, query: &mut Map<String, Value>) {
        for (name, rule) in &self.fields {
            let Some(Value::String(s)) = query.get(name) else { continue };
            let coerced = match rule.kind {
                ValueKind::Number => s.parse::<f64>().ok().map(|n| {
                    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                        Value::from(n as i64)
                    } else {
                        Value::from(n)
                    }
                }),
                ValueKind::Boolean => match s.as_str() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                ValueKind::Object | ValueKind::Array => serde_json::from_str(s).ok(),
                ValueKind::String | ValueKind::Any => None,
            };
            if let Some(v) = coerced {
                query.insert(name.clone(), v);
            }
        }
    }
}

fn kind_matches(kind: ValueKind, v: &Value) -> bool {
    match kind {
        ValueKind::String => v.is_string(),
        ValueKind::Number => v.is_number(),
        ValueKind::Boolean => v.is_boolean(),
        ValueKind::Object => v.is_object(),
        ValueKind::Array => v.is_array(),
        ValueKind::Any => true,
    }
}

fn kind_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::String => "a string",
        ValueKind::Number => "a number",
        ValueKind::Boolean => "a boolean",
        ValueKind::Object => "an object",
        ValueKind::Array => "an array",
        ValueKind::Any => "any value",
    }
}

fn check_field(col: &str, v: &Value, rule: &FieldRule) -> Result<(), String> {
    if !kind_matches(rule.kind, v) {
        return Err(format!("{} must be {}", col, kind_name(rule.kind)));
    }
    if let Some(format) = rule.format {
        check_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max {
                return Err(format!("{} must be at most {} characters", col, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min {
                return Err(format!("{} must be at least {} characters", col, min));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern).map_err(|_| format!("invalid pattern for {}", col))?;
            if !re.is_match(s) {
                return Err(format!("{} does not match required pattern", col));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(format!(
                "{} must be one of: {}",
                col,
                allowed.iter().take(5).map(Value::to_string).collect::<Vec<_>>().join(", ")
            ));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(format!("{} must be at least {}", col, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(format!("{} must be at most {}", col, max));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(col: &str, v: &Value, format: Format) -> Result<(), String> {
    let Some(s) = v.as_str() else { return Ok(()) };
    let ok = match format {
        Format::Email => {
            let mut parts = s.splitn(2, '@');
            let local = parts.next().unwrap_or_default();
            let domain = parts.next().unwrap_or_default();
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        Format::DateTime => crate::schema::parse_date(v).is_some(),
    };
    if ok {
        Ok(())
    } else {
        let what = match format {
            Format::Email => "a valid email",
            Format::DateTime => "a valid date",
        };
        Err(format!("{} must be {}", col, what))
    }
}
