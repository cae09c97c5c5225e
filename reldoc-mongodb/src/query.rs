//! Query translation from reldoc predicates to MongoDB query syntax.
//!
//! This module translates reldoc's store-level expressions into MongoDB BSON
//! documents for execution by the MongoDB query engine.
//!
//! MongoDB compares values only within a type bracket, while filter literals are
//! coerced against whatever type is stored. A literal is therefore expanded into every
//! BSON value it may equal: `"150"` becomes `["150", 150.0]` and `"true"` becomes
//! `["true", true]`.

use bson::{Bson, DateTime as BsonDateTime, Document, doc};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use reldoc_core::{
    document::{CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD},
    error::EngineError,
    literal::Literal,
    query::{Expr, Operator, QueryVisitor},
};

use crate::sanitizer::ValueSanitizer;

pub(crate) const MONGO_ID: &str = "_id";
pub(crate) const MONGO_CREATED_AT: &str = "_created_at";
pub(crate) const MONGO_UPDATED_AT: &str = "_updated_at";

/// Maps an engine field name to its stored MongoDB key.
pub(crate) fn stored_field(field: &str) -> String {
    match field {
        ID_FIELD => MONGO_ID.to_string(),
        CREATED_AT_FIELD => MONGO_CREATED_AT.to_string(),
        UPDATED_AT_FIELD => MONGO_UPDATED_AT.to_string(),
        _ => ValueSanitizer::sanitize_string(field),
    }
}

/// Translates reldoc query expressions into MongoDB query documents.
///
/// This struct implements the [`QueryVisitor`] trait to convert abstract
/// query expressions into MongoDB's native BSON query syntax.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// A filter no document satisfies.
    fn nothing() -> Document {
        doc! { MONGO_ID: { "$in": [] } }
    }

    /// Every BSON value `literal` is considered equal to.
    ///
    /// Range bounds pass `ordered`, which keeps numeric and boolean literals off stored strings.
    fn candidates(field: &str, literal: &Literal, ordered: bool) -> Vec<Bson> {
        if is_timestamp(field) {
            return literal
                .items()
                .iter()
                .filter_map(parse_timestamp)
                .map(Bson::DateTime)
                .collect();
        }

        literal
            .items()
            .iter()
            .flat_map(|item| {
                let mut values = Vec::new();

                match item {
                    Literal::Null => values.push(Bson::Null),
                    Literal::Bool(b) => {
                        values.push(Bson::Boolean(*b));
                        if !ordered {
                            values.push(Bson::String(b.to_string()));
                        }
                    }
                    Literal::Num(n) => {
                        values.push(Bson::Double(*n));
                        if !ordered && let Some(text) = item.as_text() {
                            values.push(Bson::String(text.into_owned()));
                        }
                    }
                    Literal::Text(text) => {
                        values.push(Bson::String(text.clone()));
                        if let Some(n) = item.as_number() {
                            values.push(Bson::Double(n));
                        }
                        if let Some(b) = item.as_bool() {
                            values.push(Bson::Boolean(b));
                        }
                    }
                    Literal::List(_) => {}
                }

                values
            })
            .collect()
    }

    fn regex(field: &str, op: Operator, value: &Literal) -> Document {
        let Some(text) = value.as_text() else {
            return Self::nothing();
        };
        let escaped = regex::escape(&text);
        let pattern = match op {
            Operator::StartsWith | Operator::IStartsWith => format!("^{escaped}"),
            Operator::EndsWith | Operator::IEndsWith => format!("{escaped}$"),
            _ => escaped,
        };
        let options = match op {
            Operator::IContains | Operator::IStartsWith | Operator::IEndsWith => "i",
            _ => "",
        };

        doc! { field: { "$regex": pattern, "$options": options } }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = EngineError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(Self::nothing());
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: Operator,
        value: &Literal,
    ) -> Result<Self::Output, Self::Error> {
        let key = stored_field(field);
        let ordered = matches!(op, Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte);
        let mut candidates = Self::candidates(field, value, ordered);

        if !matches!(op, Operator::IsNull) {
            candidates.retain(|candidate| !matches!(candidate, Bson::Null));
        }

        Ok(match op {
            Operator::Eq | Operator::In | Operator::Overlaps => {
                if candidates.is_empty() {
                    Self::nothing()
                } else {
                    doc! { key: { "$in": candidates } }
                }
            }
            Operator::Ne | Operator::NotIn => doc! { key: { "$nin": candidates } },
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let operator = match op {
                    Operator::Gt => "$gt",
                    Operator::Gte => "$gte",
                    Operator::Lt => "$lt",
                    _ => "$lte",
                };
                let bounds = candidates
                    .into_iter()
                    .map(|candidate| doc! { key.clone(): { operator: candidate } })
                    .collect::<Vec<_>>();

                match bounds.len() {
                    0 => Self::nothing(),
                    1 => bounds.into_iter().next().unwrap_or_else(Self::nothing),
                    _ => doc! { "$or": bounds },
                }
            }
            Operator::Contains | Operator::IContains => {
                let text = Self::regex(&key, op, value);

                if candidates.is_empty() {
                    text
                } else {
                    doc! { "$or": [text, { key: { "$elemMatch": { "$in": candidates } } }] }
                }
            }
            Operator::StartsWith
            | Operator::IStartsWith
            | Operator::EndsWith
            | Operator::IEndsWith => Self::regex(&key, op, value),
            Operator::IsNull => match value.as_bool() {
                Some(true) => doc! { key: Bson::Null },
                Some(false) => doc! { key: { "$ne": Bson::Null } },
                None => Self::nothing(),
            },
        })
    }
}

fn is_timestamp(field: &str) -> bool {
    matches!(field, CREATED_AT_FIELD | UPDATED_AT_FIELD)
}

/// Reads RFC 3339 timestamps, naive date-times and plain dates (as UTC midnight).
fn parse_timestamp(literal: &Literal) -> Option<BsonDateTime> {
    let text = literal.as_text()?;
    let parsed = DateTime::parse_from_rfc3339(&text)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|at| at.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|at| at.and_utc())
        })?;

    Some(BsonDateTime::from_chrono(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(expr: Expr) -> Document {
        MongoQueryTranslator.visit_expr(&expr).unwrap()
    }

    #[test]
    fn expands_text_literals_across_types() {
        let filter = translate(Expr::field("views", Operator::Eq, "150"));

        assert_eq!(filter, doc! { "views": { "$in": ["150", 150.0] } });
    }

    #[test]
    fn numeric_bounds_stay_numeric() {
        let filter = translate(Expr::field("views", Operator::Gte, 100));
        assert_eq!(filter, doc! { "views": { "$gte": 100.0 } });

        let filter = translate(Expr::field("views", Operator::Eq, 100));
        assert_eq!(filter, doc! { "views": { "$in": [100.0, "100"] } });
    }

    #[test]
    fn maps_pseudo_fields() {
        let filter = translate(Expr::field("id", Operator::In, Literal::list(["p1"])));
        assert_eq!(filter, doc! { "_id": { "$in": ["p1"] } });

        let filter = translate(Expr::field("created_at", Operator::Gte, "2024-01-01"));
        let expected = BsonDateTime::from_chrono(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc(),
        );
        assert_eq!(filter, doc! { "_created_at": { "$gte": expected } });
    }

    #[test]
    fn escapes_regex_input() {
        let filter = translate(Expr::field("title", Operator::IStartsWith, "a.b"));

        assert_eq!(filter, doc! { "title": { "$regex": "^a\\.b", "$options": "i" } });
    }

    #[test]
    fn null_checks_and_empty_groups() {
        assert_eq!(
            translate(Expr::field("deleted_at", Operator::IsNull, true)),
            doc! { "deleted_at": Bson::Null }
        );
        assert_eq!(translate(Expr::Or(vec![])), doc! { "_id": { "$in": [] } });
        assert_eq!(translate(Expr::And(vec![])), doc! {});
    }
}
