//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions,
//! enabling filtering and ordering of JSON documents.

use serde_json::Value;
use std::cmp::Ordering;

use reldoc_core::{
    document::Document,
    error::EngineError,
    literal::Literal,
    query::{Expr, Operator, QueryVisitor, Sort, SortOrder},
};

/// Totally ordered view of a JSON value, used for sorting.
///
/// Values of different types order by type: null, booleans, numbers, strings, arrays,
/// objects. A missing field sorts as null.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All numbers normalized to f64
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Object,
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => value
                .as_f64()
                .map(Comparable::Number)
                .unwrap_or(Comparable::Null),
            Value::String(value) => Comparable::String(value),
            Value::Array(items) => Comparable::Array(
                items
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Value::Object(_) => Comparable::Object,
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Object => 5,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Comparable<'_> {}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Comparable<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Orders two documents by a list of sort keys.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left_value = left.field(&key.field);
        let right_value = right.field(&key.field);
        let left_cmp = left_value
            .as_deref()
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);
        let right_cmp = right_value
            .as_deref()
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        let ordering = match key.order {
            SortOrder::Asc => left_cmp.cmp(&right_cmp),
            SortOrder::Desc => right_cmp.cmp(&left_cmp),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<bool, EngineError> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> Vec<&'a Document> {
        documents
            .into_iter()
            .filter(|doc| {
                DocumentEvaluator::new(doc)
                    .evaluate(expr)
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>()
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = EngineError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: Operator,
        value: &Literal,
    ) -> Result<Self::Output, Self::Error> {
        let stored = self.document.field(field);

        match stored.as_deref() {
            None | Some(Value::Null) => Ok(match op {
                Operator::IsNull => value.as_bool() == Some(true),
                Operator::Ne | Operator::NotIn => true,
                _ => false,
            }),
            Some(stored) => Ok(match op {
                Operator::Eq => equals(stored, value),
                Operator::Ne => !equals(stored, value),
                Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                    match value.compare(stored) {
                        Some(ordering) => match op {
                            Operator::Gt => ordering == Ordering::Greater,
                            Operator::Gte => ordering != Ordering::Less,
                            Operator::Lt => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                }
                Operator::Contains | Operator::IContains => match stored {
                    Value::Array(items) => items.iter().any(|item| match (op, item) {
                        (Operator::IContains, Value::String(item)) => value
                            .as_text()
                            .is_some_and(|text| text.to_lowercase() == item.to_lowercase()),
                        _ => value.matches(item),
                    }),
                    _ => text_match(op, stored, value).unwrap_or(false),
                },
                Operator::StartsWith
                | Operator::IStartsWith
                | Operator::EndsWith
                | Operator::IEndsWith => text_match(op, stored, value).unwrap_or(false),
                Operator::In | Operator::Overlaps => value
                    .items()
                    .iter()
                    .any(|item| equals(stored, item)),
                Operator::NotIn => !value
                    .items()
                    .iter()
                    .any(|item| equals(stored, item)),
                Operator::IsNull => value.as_bool() == Some(false),
            }),
        }
    }
}

/// Equality with array fields matching when any element does.
fn equals(stored: &Value, value: &Literal) -> bool {
    match stored {
        Value::Array(items) => {
            value.matches(stored) || items.iter().any(|item| value.matches(item))
        }
        _ => value.matches(stored),
    }
}

/// String operators; `None` when `stored` is not a string.
fn text_match(op: Operator, stored: &Value, value: &Literal) -> Option<bool> {
    let Value::String(stored) = stored else {
        return None;
    };
    let needle = value.as_text()?;

    Some(match op {
        Operator::Contains => stored.contains(needle.as_ref()),
        Operator::StartsWith => stored.starts_with(needle.as_ref()),
        Operator::EndsWith => stored.ends_with(needle.as_ref()),
        Operator::IContains => stored
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        Operator::IStartsWith => stored
            .to_lowercase()
            .starts_with(&needle.to_lowercase()),
        Operator::IEndsWith => stored
            .to_lowercase()
            .ends_with(&needle.to_lowercase()),
        _ => return None,
    })
}
