use sea_orm::Value;

use super::operators::{FieldType, Operator};
use crate::{ApiError, params::ParamValue};

/// A filter value after operator-specific coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// `eq` with exactly `true` / `false`
    Bool(bool),
    /// Passed through as received (or wrapped in `%...%` for `has`)
    Text(String),
    /// `in` members
    List(Vec<String>),
    /// `btw` bounds
    Range(String, String),
}

impl FilterValue {
    /// Coerce a raw request value for `operator`
    ///
    /// - `eq` turns the exact literals `"true"` / `"false"` into booleans
    /// - `has` wraps the value in leading and trailing wildcards
    /// - `in` splits a scalar on commas; a `[]` list is taken as is
    /// - `btw` splits on commas and requires exactly two parts
    ///
    /// # Errors
    ///
    /// Malformed input: a `btw` value without exactly two parts, or a nested value
    /// for an operator that compares against a single value.
    pub fn coerce(operator: Operator, raw: &ParamValue) -> Result<Self, ApiError> {
        match operator {
            Operator::In => match raw {
                ParamValue::Scalar(value) => Ok(Self::List(split(value))),
                ParamValue::Nested(_) => raw
                    .scalar_list()
                    .map(|values| Self::List(values.into_iter().map(str::to_string).collect()))
                    .ok_or_else(|| nested_value_error(operator)),
            },
            Operator::Btw => {
                let parts = match raw {
                    ParamValue::Scalar(value) => split(value),
                    ParamValue::Nested(_) => raw
                        .scalar_list()
                        .ok_or_else(|| nested_value_error(operator))?
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                };
                match <[String; 2]>::try_from(parts) {
                    Ok([low, high]) => Ok(Self::Range(low, high)),
                    Err(_) => Err(ApiError::bad_request(
                        "Invalid value count for \"btw\" filter, expected two comma separated values, example: column[btw]=10,20",
                    )),
                }
            }
            _ => {
                let value = raw.as_scalar().ok_or_else(|| nested_value_error(operator))?;
                Ok(match (operator, value) {
                    (Operator::Eq, "true") => Self::Bool(true),
                    (Operator::Eq, "false") => Self::Bool(false),
                    (Operator::Has, _) => Self::Text(format!("%{value}%")),
                    _ => Self::Text(value.to_string()),
                })
            }
        }
    }

    /// Single bound value, `None` for lists and ranges
    ///
    /// `field_type` decides how text is bound, see [`bind`].
    #[must_use]
    pub fn as_value(&self, field_type: Option<FieldType>) -> Option<Value> {
        match self {
            Self::Bool(flag) => Some(Value::from(*flag)),
            Self::Text(text) => Some(bind(text, field_type)),
            Self::List(_) | Self::Range(..) => None,
        }
    }

    /// Bound values for lists and ranges, a single element otherwise
    #[must_use]
    pub fn values(&self, field_type: Option<FieldType>) -> Vec<Value> {
        match self {
            Self::List(items) => items.iter().map(|item| bind(item, field_type)).collect(),
            Self::Range(low, high) => vec![bind(low, field_type), bind(high, field_type)],
            _ => self.as_value(field_type).into_iter().collect(),
        }
    }
}

/// Bind a text operand with the type of the column it is compared against
///
/// `string`, `date` and `boolean` columns keep text. `numeric` columns and
/// columns with an explicit operator list bind numeric-looking text as a
/// number, so backends with strict parameter types (Postgres) compare numbers
/// with numbers. Anything else stays text.
#[must_use]
pub fn bind(text: &str, field_type: Option<FieldType>) -> Value {
    match field_type {
        Some(FieldType::String | FieldType::Date | FieldType::Boolean) => {
            Value::from(text.to_string())
        }
        Some(FieldType::Numeric) | None => {
            number(text).unwrap_or_else(|| Value::from(text.to_string()))
        }
    }
}

/// Integer or decimal value for canonical numeric text, `None` otherwise
///
/// `007` or `+5` stay text so nothing is lost when the column is textual.
fn number(text: &str) -> Option<Value> {
    if let Ok(integer) = text.parse::<i64>() {
        return (integer.to_string() == text).then(|| Value::from(integer));
    }

    let digits = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = digits.split_once('.')?;
    let canonical = !whole.is_empty()
        && !fraction.is_empty()
        && (whole == "0" || !whole.starts_with('0'))
        && whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit());
    if !canonical {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .filter(|decimal| decimal.is_finite())
        .map(Value::from)
}

fn split(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

fn nested_value_error(operator: Operator) -> ApiError {
    ApiError::bad_request(format!(
        "Invalid value for \"{}\" filter, expected a single value, example: column[{}]=value",
        operator.symbol(),
        operator.symbol()
    ))
}
