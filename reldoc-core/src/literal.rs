//! Filter literals and their coercion rules.
//!
//! Filter values arrive either as raw strings (query parameters) or as typed JSON (SDK
//! builders, cloud functions) and are compared against heterogeneously typed stored
//! fields. [`Literal`] keeps the value tagged and the comparison methods below define,
//! per stored type, how a literal is coerced:
//!
//! | stored value | `Text` literal                 | `Num` literal          | `Bool` literal      |
//! |--------------|--------------------------------|------------------------|---------------------|
//! | number       | parsed as a number             | numeric                | no match            |
//! | string       | string comparison              | compared to its text   | `"true"`/`"false"`  |
//! | bool         | `"true"`/`"false"` (any case)  | no match               | equality            |
//! | null         | equals `"null"`                | no match               | no match            |
//!
//! A failed coercion is "no match", never an error.

use serde::Serialize;
use serde_json::{Number, Value};
use std::{borrow::Cow, cmp::Ordering};

/// A tagged filter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Num(f64),
    Text(String),
    List(Vec<Literal>),
}

impl Literal {
    /// Creates a text literal.
    pub fn text(value: impl Into<String>) -> Self {
        Literal::Text(value.into())
    }

    /// Creates a list literal from anything convertible to literals.
    pub fn list<T: Into<Literal>>(items: impl IntoIterator<Item = T>) -> Self {
        Literal::List(items.into_iter().map(Into::into).collect())
    }

    /// The numeric reading of this literal, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Num(n) => Some(*n),
            Literal::Text(text) => text
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// The boolean reading of this literal, if it has one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            Literal::Text(text) if text.eq_ignore_ascii_case("true") => Some(true),
            Literal::Text(text) if text.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// The textual reading of a scalar literal.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Literal::Text(text) => Some(Cow::Borrowed(text)),
            Literal::Num(n) => Some(Cow::Owned(format_number(*n))),
            Literal::Bool(b) => Some(Cow::Owned(b.to_string())),
            Literal::Null | Literal::List(_) => None,
        }
    }

    /// The members of a list literal, or the literal itself for scalars.
    pub fn items(&self) -> &[Literal] {
        match self {
            Literal::List(items) => items,
            scalar => std::slice::from_ref(scalar),
        }
    }

    /// Tests whether a stored value equals this literal under the coercion rules.
    pub fn matches(&self, stored: &Value) -> bool {
        match (stored, self) {
            (Value::Array(values), Literal::List(items)) => {
                values.len() == items.len()
                    && values
                        .iter()
                        .zip(items)
                        .all(|(value, item)| item.matches(value))
            }
            (_, Literal::List(_)) => false,
            (Value::Null, literal) => match literal {
                Literal::Null => true,
                Literal::Text(text) => text == "null",
                _ => false,
            },
            (Value::Bool(b), literal) => literal.as_bool() == Some(*b),
            (Value::Number(n), literal) => match (n.as_f64(), literal) {
                (Some(stored), Literal::Num(_) | Literal::Text(_)) => {
                    literal.as_number() == Some(stored)
                }
                _ => false,
            },
            (Value::String(s), literal) => literal
                .as_text()
                .is_some_and(|text| text == s.as_str()),
            (Value::Array(_) | Value::Object(_), _) => false,
        }
    }

    /// Orders a stored value relative to this literal.
    ///
    /// Returns `None` when the two cannot be ordered (e.g. a numeric bound against a
    /// stored string).
    pub fn compare(&self, stored: &Value) -> Option<Ordering> {
        match stored {
            Value::Number(n) => n.as_f64()?.partial_cmp(&self.as_number()?),
            Value::String(s) => match self {
                Literal::Bool(_) | Literal::Num(_) => None,
                literal => Some(s.as_str().cmp(literal.as_text()?.as_ref())),
            },
            Value::Bool(b) => Some(b.cmp(&self.as_bool()?)),
            _ => None,
        }
    }

    /// Converts the literal into its natural JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Num(n) => Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Text(text) => Value::String(text.clone()),
            Literal::List(items) => Value::Array(items.iter().map(Literal::to_json).collect()),
        }
    }
}

/// Formats a number the way it would usually be written in a query string.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(b),
            Value::Number(n) => n
                .as_f64()
                .map(Literal::Num)
                .unwrap_or_else(|| Literal::Text(n.to_string())),
            Value::String(s) => Literal::Text(s),
            Value::Array(items) => Literal::List(items.into_iter().map(Literal::from).collect()),
            Value::Object(map) => Literal::Text(Value::Object(map).to_string()),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Num(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Num(value as f64)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Num(value as f64)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}
