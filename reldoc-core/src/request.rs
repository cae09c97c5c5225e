//! Query requests and their wire form.
//!
//! [`QueryParams`] parses the flat parameter set used by the HTTP listing endpoint and the
//! SDKs:
//!
//! ```text
//! ?age_gte=18&[or]role=admin&[or]role=editor&populate=author,category&sort=-views&limit=20
//! ```
//!
//! Reserved keys (`populate`, `select`, `sort`, `order`, `limit`, `offset`, `page`,
//! `count`) configure the request; every other key is a filter.

use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

use crate::{
    config::EngineConfig,
    error::{EngineError, EngineResult},
    parser::{FilterClause, FilterParser, RawValue},
    query::SortOrder,
    tree::BooleanTree,
};

/// A chain of relation names to hydrate, e.g. `author.company`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopulateSpec(Vec<String>);

impl PopulateSpec {
    /// Parses a dot-separated relation chain.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Parse`] if any segment is empty.
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let relations = raw
            .trim()
            .split('.')
            .map(str::to_string)
            .collect::<Vec<_>>();

        if relations.iter().any(String::is_empty) {
            return Err(EngineError::Parse(format!("invalid populate spec `{raw}`")));
        }

        Ok(Self(relations))
    }

    /// Parses a comma-separated list of chains; empty items are skipped.
    pub fn parse_list(raw: &str) -> EngineResult<Vec<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn relations(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for PopulateSpec {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PopulateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A complete query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub collection: String,
    pub filter: BooleanTree,
    pub populate: Vec<PopulateSpec>,
    /// Data fields to keep in the output; `None` keeps all of them.
    pub select: Option<Vec<String>>,
    /// Field to sort by; `None` sorts by id.
    pub sort: Option<String>,
    pub order: SortOrder,
    /// Requested page size; clamped by [`EngineConfig::clamp_limit`].
    pub limit: Option<usize>,
    pub offset: usize,
    /// Whether to count all matching documents.
    pub count_total: bool,
}

impl QueryRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: BooleanTree::default(),
            populate: Vec::new(),
            select: None,
            sort: None,
            order: SortOrder::Asc,
            limit: None,
            offset: 0,
            count_total: true,
        }
    }

    /// Creates a new builder for a query against `collection`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let request = QueryRequest::builder("posts")
    ///     .filters(FilterParser::parse([("views_gte", "100")])?)
    ///     .populate("author")?
    ///     .sort("views", SortOrder::Desc)
    ///     .limit(10)
    ///     .build();
    /// ```
    pub fn builder(collection: impl Into<String>) -> QueryRequestBuilder {
        QueryRequestBuilder { request: Self::new(collection) }
    }
}

pub struct QueryRequestBuilder {
    request: QueryRequest,
}

impl QueryRequestBuilder {
    pub fn filter(mut self, filter: BooleanTree) -> Self {
        self.request.filter = filter;
        self
    }

    /// Replaces the filter with the tree built from `clauses`.
    pub fn filters(mut self, clauses: Vec<FilterClause>) -> Self {
        self.request.filter = BooleanTree::build(clauses);
        self
    }

    /// Adds a populate chain such as `author.company`.
    pub fn populate(mut self, spec: &str) -> EngineResult<Self> {
        self.request.populate.push(spec.parse()?);
        Ok(self)
    }

    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.request.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.request.sort = Some(field.into());
        self.request.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.request.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.request.offset = offset;
        self
    }

    pub fn count_total(mut self, count_total: bool) -> Self {
        self.request.count_total = count_total;
        self
    }

    pub fn build(self) -> QueryRequest {
        self.request
    }
}

/// Parsed wire parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub filters: Vec<FilterClause>,
    pub populate: Vec<PopulateSpec>,
    pub select: Option<Vec<String>>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// 1-based page number, converted to an offset using the effective limit.
    pub page: Option<usize>,
    pub count: Option<bool>,
}

impl QueryParams {
    /// Parses string pairs such as decoded query-string parameters.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Parse`] for malformed reserved values or filter keys.
    pub fn parse<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> EngineResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());

            if !params.apply_reserved(key, value)? {
                params
                    .filters
                    .push(FilterParser::parse_clause(key, RawValue::Text(value))?);
            }
        }

        Ok(params)
    }

    /// Parses a JSON parameter map; filter values keep their JSON types.
    pub fn parse_json(map: &Map<String, Value>) -> EngineResult<Self> {
        let mut params = Self::default();

        for (key, value) in map {
            let handled = match value {
                Value::String(text) => params.apply_reserved(key, text)?,
                Value::Number(n) => params.apply_reserved(key, &n.to_string())?,
                Value::Bool(b) => params.apply_reserved(key, &b.to_string())?,
                Value::Array(items) if is_list_key(key) => {
                    let joined = items
                        .iter()
                        .map(|item| match item {
                            Value::String(text) => Ok(text.clone()),
                            other => Err(EngineError::Parse(format!(
                                "`{key}` expects strings, got {other}"
                            ))),
                        })
                        .collect::<EngineResult<Vec<_>>>()?
                        .join(",");

                    params.apply_reserved(key, &joined)?
                }
                _ if is_reserved(key) => {
                    return Err(EngineError::Parse(format!("invalid value for `{key}`: {value}")));
                }
                _ => false,
            };

            if !handled {
                params
                    .filters
                    .push(FilterParser::parse_clause(key, RawValue::Json(value))?);
            }
        }

        Ok(params)
    }

    fn apply_reserved(&mut self, key: &str, value: &str) -> EngineResult<bool> {
        match key {
            "populate" => self
                .populate
                .extend(PopulateSpec::parse_list(value)?),
            "select" => self.select = parse_select(value)?,
            "sort" => match value.trim().strip_prefix('-') {
                Some(field) => {
                    self.sort = Some(non_empty(key, field)?);
                    self.order = Some(SortOrder::Desc);
                }
                None => self.sort = Some(non_empty(key, value.trim())?),
            },
            "order" => self.order = Some(value.parse()?),
            "limit" => self.limit = Some(parse_usize(key, value)?),
            "offset" => self.offset = Some(parse_usize(key, value)?),
            "page" => match parse_usize(key, value)? {
                0 => return Err(EngineError::Parse("`page` is 1-based".to_string())),
                page => self.page = Some(page),
            },
            "count" => {
                self.count = Some(match value.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    _ => return Err(EngineError::Parse(format!("invalid count flag `{value}`"))),
                })
            }
            _ => return Ok(false),
        }

        Ok(true)
    }

    /// Builds the request for `collection`; `page` is resolved against the effective limit.
    pub fn into_request(
        self,
        collection: impl Into<String>,
        config: &EngineConfig,
    ) -> EngineResult<QueryRequest> {
        let offset = match self.page {
            Some(page) => (page - 1)
                .checked_mul(config.clamp_limit(self.limit))
                .ok_or_else(|| EngineError::Parse(format!("`page` {page} is out of range")))?,
            None => self.offset.unwrap_or(0),
        };

        Ok(QueryRequest {
            collection: collection.into(),
            filter: BooleanTree::build(self.filters),
            populate: self.populate,
            select: self.select,
            sort: self.sort,
            order: self.order.unwrap_or_default(),
            limit: self.limit,
            offset,
            count_total: self.count.unwrap_or(true),
        })
    }
}

const RESERVED_KEYS: [&str; 8] = [
    "populate", "select", "sort", "order", "limit", "offset", "page", "count",
];

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

fn is_list_key(key: &str) -> bool {
    matches!(key, "populate" | "select")
}

fn parse_select(value: &str) -> EngineResult<Option<Vec<String>>> {
    if value.trim() == "*" {
        return Ok(None);
    }

    let fields = value
        .split(',')
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect::<Vec<_>>();

    if fields.is_empty() {
        return Err(EngineError::Parse("select cannot be empty".to_string()));
    }

    Ok(Some(fields))
}

fn parse_usize(key: &str, value: &str) -> EngineResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Parse(format!("invalid {key} `{value}`")))
}

fn non_empty(key: &str, value: &str) -> EngineResult<String> {
    if value.is_empty() {
        return Err(EngineError::Parse(format!("`{key}` cannot be empty")));
    }

    Ok(value.to_string())
}
