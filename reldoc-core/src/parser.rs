//! Flat filter parameters to typed clauses.
//!
//! A filter key has three parts, all optional except the field path:
//!
//! ```text
//! [or:group]author.role_in = admin,editor
//! ^^^^^^^^^^ ^^^^^^^^^^^ ^^^   ^^^^^^^^^^^^
//!  OR group  field path  op    value
//! ```
//!
//! `[or]` puts the clause in the request's anonymous OR group, `[or:NAME]` in a named one.
//! The operator suffix is matched longest-first against [`Operator`] names and defaults to
//! `eq`. Dots in the field path walk relationships; a trailing dot (`author._isnull`)
//! targets the relationship's existence.

use serde_json::Value;
use std::fmt;

use crate::{
    error::{EngineError, EngineResult},
    literal::Literal,
    query::Operator,
};

/// Group tag shared by every clause marked with a bare `[or]`.
pub const ANONYMOUS_GROUP: &str = "";

/// A dot-separated field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dot-separated path.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Parse`] for empty paths and empty segments other than a
    /// single trailing one.
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let segments = raw
            .split('.')
            .map(str::to_string)
            .collect::<Vec<_>>();
        let last = segments.len() - 1;

        if segments[0].is_empty() {
            return Err(EngineError::Parse(format!("empty field path in `{raw}`")));
        }
        if segments
            .iter()
            .enumerate()
            .any(|(i, segment)| segment.is_empty() && (i != last || last == 0))
        {
            return Err(EngineError::Parse(format!("empty path segment in `{raw}`")));
        }

        Ok(Self { segments })
    }

    /// A single-segment path naming a field of the root document.
    pub fn direct(field: impl Into<String>) -> Self {
        Self { segments: vec![field.into()] }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the path names a field of the root document itself.
    pub fn is_direct(&self) -> bool {
        self.segments.len() == 1
    }

    /// Whether the path targets a relationship's existence rather than a field.
    pub fn is_existence(&self) -> bool {
        self.segments.len() > 1
            && self
                .segments
                .last()
                .is_some_and(|segment| segment.is_empty())
    }

    /// The relations walked before reaching the target.
    pub fn relations(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Number of relation hops that require a sub-query.
    ///
    /// Existence checks on the last relation are answered from the foreign key itself.
    pub fn hops(&self) -> usize {
        if self.is_existence() {
            self.segments.len() - 2
        } else {
            self.segments.len() - 1
        }
    }

    /// The first segment and the path beneath it, for relationship traversal.
    pub fn split_first(&self) -> Option<(&str, FieldPath)> {
        if self.is_direct() {
            return None;
        }

        Some((
            &self.segments[0],
            FieldPath { segments: self.segments[1..].to_vec() },
        ))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// One field/operator/value condition.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub path: FieldPath,
    pub operator: Operator,
    pub value: Literal,
    /// `None` for clauses ANDed with everything; otherwise the OR group tag.
    pub or_group: Option<String>,
}

impl FilterClause {
    pub fn new(path: FieldPath, operator: Operator, value: impl Into<Literal>) -> Self {
        Self { path, operator, value: value.into(), or_group: None }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.or_group = Some(group.into());
        self
    }
}

/// A filter value as received from a caller.
#[derive(Debug, Clone, Copy)]
pub enum RawValue<'a> {
    /// A raw string, e.g. from a query parameter.
    Text(&'a str),
    /// A typed JSON value, e.g. from an SDK builder or cloud function.
    Json(&'a Value),
}

/// Parses flat filter parameters into [`FilterClause`]s.
pub struct FilterParser;

impl FilterParser {
    /// Parses string pairs, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Parse`] for a malformed OR marker, a bad field path, or a
    /// value the operator cannot accept.
    pub fn parse<K, V>(params: impl IntoIterator<Item = (K, V)>) -> EngineResult<Vec<FilterClause>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        params
            .into_iter()
            .map(|(key, value)| Self::parse_clause(key.as_ref(), RawValue::Text(value.as_ref())))
            .collect()
    }

    /// Parses typed JSON pairs, preserving their order.
    pub fn parse_json<'a>(
        params: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> EngineResult<Vec<FilterClause>> {
        params
            .into_iter()
            .map(|(key, value)| Self::parse_clause(key, RawValue::Json(value)))
            .collect()
    }

    /// Parses a single filter key and its value.
    pub fn parse_clause(key: &str, value: RawValue<'_>) -> EngineResult<FilterClause> {
        let (or_group, rest) = split_or_marker(key)?;
        let (field, operator) = split_operator(rest);
        let path = FieldPath::parse(field)?;
        let value = parse_value(key, operator, value)?;

        Ok(FilterClause { path, operator, value, or_group })
    }
}

fn split_or_marker(key: &str) -> EngineResult<(Option<String>, &str)> {
    let Some(marked) = key.strip_prefix('[') else {
        return Ok((None, key));
    };
    let Some((marker, rest)) = marked.split_once(']') else {
        return Err(EngineError::Parse(format!("unterminated OR marker in `{key}`")));
    };

    match marker.split_once(':') {
        None if marker == "or" => Ok((Some(ANONYMOUS_GROUP.to_string()), rest)),
        Some(("or", name))
            if !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
        {
            Ok((Some(name.to_string()), rest))
        }
        _ => Err(EngineError::Parse(format!("malformed OR marker `[{marker}]` in `{key}`"))),
    }
}

fn split_operator(key: &str) -> (&str, Operator) {
    for op in Operator::BY_SUFFIX_LEN {
        let Some(field) = key
            .strip_suffix(op.as_str())
            .and_then(|field| field.strip_suffix('_'))
        else {
            continue;
        };
        let field = field.strip_suffix('_').unwrap_or(field);

        if !field.is_empty() {
            return (field, op);
        }
    }

    (key, Operator::Eq)
}

fn parse_value(key: &str, operator: Operator, value: RawValue<'_>) -> EngineResult<Literal> {
    match (operator, value) {
        (Operator::IsNull, value) => {
            let literal = match value {
                RawValue::Text(text) => Literal::text(text),
                RawValue::Json(json) => Literal::from(json.clone()),
            };

            literal
                .as_bool()
                .map(Literal::Bool)
                .ok_or_else(|| {
                    EngineError::Parse(format!("`{key}` expects true or false, got {literal:?}"))
                })
        }
        (op, RawValue::Text(text)) if op.takes_list() => Ok(Literal::List(
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Literal::text)
                .collect(),
        )),
        (op, RawValue::Json(Value::String(text))) if op.takes_list() => {
            parse_value(key, op, RawValue::Text(text))
        }
        (op, RawValue::Json(json)) if op.takes_list() => Ok(match Literal::from(json.clone()) {
            list @ Literal::List(_) => list,
            scalar => Literal::List(vec![scalar]),
        }),
        (_, RawValue::Text(text)) => Ok(Literal::text(text)),
        (_, RawValue::Json(json)) => Ok(Literal::from(json.clone())),
    }
}
