use fieldsync_config::shared::CoercionKind;
use serde_json::{Number, Value};
use thiserror::Error;

/// Why a source value could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("`{0}` is not a finite number")]
    NotANumber(String),
    #[error("`{0}` is not an integer")]
    NotAnInteger(String),
    #[error("`{0}` is not a boolean")]
    NotABoolean(String),
    #[error("{0} values cannot be converted to text")]
    NotAScalar(&'static str),
}

/// Converts `value` according to `kind`.
pub fn coerce(value: &Value, kind: CoercionKind) -> Result<Value, CoercionError> {
    match kind {
        CoercionKind::None => Ok(value.clone()),
        CoercionKind::Float => to_float(value),
        CoercionKind::Integer => to_integer(value),
        CoercionKind::Boolean => to_boolean(value),
        CoercionKind::String => to_text(value).map(Value::String),
        CoercionKind::StringList => to_string_list(value),
    }
}

fn to_float(value: &Value) -> Result<Value, CoercionError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| CoercionError::NotANumber(render(value)))
}

fn to_integer(value: &Value) -> Result<Value, CoercionError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .map(|i| Value::Number(i.into()))
        .ok_or_else(|| CoercionError::NotAnInteger(render(value)))
}

fn to_boolean(value: &Value) -> Result<Value, CoercionError> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };

    parsed
        .map(Value::Bool)
        .ok_or_else(|| CoercionError::NotABoolean(render(value)))
}

fn to_text(value: &Value) -> Result<String, CoercionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) => Err(CoercionError::NotAScalar("array")),
        Value::Object(_) => Err(CoercionError::NotAScalar("object")),
        Value::Null => Err(CoercionError::NotAScalar("null")),
    }
}

fn to_string_list(value: &Value) -> Result<Value, CoercionError> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(to_text)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        other => split_list(&to_text(other)?),
    };

    Ok(Value::Array(items.into_iter().map(Value::String).collect()))
}

/// Splits a `,` or `;` separated list, trimming and dropping empty items.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
