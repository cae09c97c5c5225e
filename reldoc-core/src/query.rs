//! Store-level predicates and scans.
//!
//! This is the structured form the engine hands to a store adapter once every relationship
//! traversal has been compiled away. Adapters evaluate or translate it with a
//! [`QueryVisitor`].
//!
//! ```ignore
//! use reldoc::query::{Expr, Operator, Scan, SortOrder};
//!
//! let scan = Scan::builder()
//!     .filter(Expr::field("views", Operator::Gte, 100).and(Expr::field("status", Operator::Eq, "published")))
//!     .sort("views", SortOrder::Desc)
//!     .limit(10)
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    error::{EngineError, EngineResult},
    literal::Literal,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    #[default]
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl FromStr for SortOrder {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(EngineError::Parse(format!("invalid sort order `{s}`"))),
        }
    }
}

/// Sort key for a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub order: SortOrder,
}

impl Sort {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self { field: field.into(), order }
    }
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal to (the default when a filter key has no suffix).
    Eq,
    /// Not equal to.
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// String contains substring, or array contains element.
    Contains,
    /// Case-insensitive [`Operator::Contains`].
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    /// Value is a member of the literal list.
    In,
    /// Value is not a member of the literal list.
    NotIn,
    /// Field is absent or null (`true`) or present and non-null (`false`).
    IsNull,
    /// Array field shares at least one element with the literal list.
    Overlaps,
}

impl Operator {
    /// Every operator, ordered by descending suffix length so suffix matching is longest-first.
    pub const BY_SUFFIX_LEN: [Operator; 16] = [
        Operator::IStartsWith,
        Operator::StartsWith,
        Operator::IContains,
        Operator::IEndsWith,
        Operator::Overlaps,
        Operator::Contains,
        Operator::EndsWith,
        Operator::IsNull,
        Operator::NotIn,
        Operator::Gte,
        Operator::Lte,
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::In,
    ];

    /// The key suffix naming this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::IContains => "icontains",
            Operator::StartsWith => "startswith",
            Operator::IStartsWith => "istartswith",
            Operator::EndsWith => "endswith",
            Operator::IEndsWith => "iendswith",
            Operator::In => "in",
            Operator::NotIn => "notin",
            Operator::IsNull => "isnull",
            Operator::Overlaps => "overlaps",
        }
    }

    /// Whether the operator takes a list of values.
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn | Operator::Overlaps)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate over a document's own fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match; empty matches everything).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match; empty matches nothing).
    Or(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: Operator,
        /// The value to compare against.
        value: Literal,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: impl Into<String>, op: Operator, value: impl Into<Literal>) -> Self {
        Expr::Field { field: field.into(), op, value: value.into() }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Collapses single-member groups.
    pub fn simplify(self) -> Self {
        match self {
            Expr::And(mut list) if list.len() == 1 => list.remove(0).simplify(),
            Expr::Or(mut list) if list.len() == 1 => list.remove(0).simplify(),
            Expr::And(list) => Expr::And(list.into_iter().map(Expr::simplify).collect()),
            Expr::Or(list) => Expr::Or(list.into_iter().map(Expr::simplify).collect()),
            field => field,
        }
    }
}

/// A filtered, sorted, paginated read of one collection.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Predicate to match; `None` matches every document.
    pub filter: Option<Expr>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub offset: usize,
    /// Whether to count all matching documents.
    pub count_total: bool,
}

impl Scan {
    pub fn builder() -> ScanBuilder {
        ScanBuilder::default()
    }
}

/// Documents returned by a [`Scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub documents: Vec<crate::document::Document>,
    /// Number of matching documents before pagination, when requested.
    pub total: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanBuilder {
    scan: Scan,
}

impl ScanBuilder {
    pub fn filter(mut self, filter: Expr) -> Self {
        self.scan.filter = Some(filter);
        self
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.scan.sort.push(Sort::new(field, order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.scan.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.scan.offset = offset;
        self
    }

    pub fn count_total(mut self, count_total: bool) -> Self {
        self.scan.count_total = count_total;
        self
    }

    pub fn build(self) -> Scan {
        self.scan
    }
}

/// Walks an [`Expr`] tree; implemented by store adapters to evaluate or translate predicates.
pub trait QueryVisitor {
    type Output;
    type Error: Into<EngineError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: Operator,
        value: &Literal,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}
