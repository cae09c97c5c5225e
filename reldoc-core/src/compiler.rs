//! Compilation of boolean filter trees into store predicates.
//!
//! Direct clauses become [`Expr::Field`] as they are. A clause whose path walks a
//! relationship (`author.role=admin`) is answered with a sub-query against the target
//! collection, then rewritten into a membership test on the foreign key:
//!
//! ```text
//! author.role = admin
//!   => ids = scan(users, role = admin)
//!   => author_id in ids  OR  author_ids overlaps ids
//! ```
//!
//! Sub-queries for independent clauses run concurrently.

use futures::{
    FutureExt,
    future::{BoxFuture, try_join_all},
    try_join,
};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    backend::StoreReader,
    config::EngineConfig,
    error::{EngineError, EngineResult, QueryWarning},
    executor::QueryExecutor,
    literal::Literal,
    parser::{FieldPath, FilterClause},
    query::{Expr, Operator},
    relation::{
        Cardinality, RelationshipDescriptor, RelationshipResolver, Target, ambiguity_warnings,
    },
    tree::BooleanTree,
};

/// Output of [`QueryCompiler::compile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    /// The predicate to scan with; `None` matches everything.
    pub filter: Option<Expr>,
    pub warnings: Vec<QueryWarning>,
}

#[derive(Debug)]
struct Compiled {
    expr: Expr,
    warnings: Vec<QueryWarning>,
}

impl Compiled {
    fn plain(expr: Expr) -> Self {
        Self { expr, warnings: Vec::new() }
    }
}

/// Compiles filter trees for one request.
pub struct QueryCompiler<'a, S: ?Sized> {
    executor: QueryExecutor<'a, S>,
    resolver: &'a RelationshipResolver,
    config: &'a EngineConfig,
}

impl<'a, S> QueryCompiler<'a, S>
where
    S: StoreReader + ?Sized,
{
    pub fn new(store: &'a S, resolver: &'a RelationshipResolver, config: &'a EngineConfig) -> Self {
        Self {
            executor: QueryExecutor::new(store, config),
            resolver,
            config,
        }
    }

    /// Compiles `tree` into a store predicate.
    ///
    /// Every clause is validated before any sub-query is issued.
    ///
    /// # Errors
    ///
    /// * [`EngineError::UnsupportedFilterDepth`] if a path walks more relations than
    ///   `max_filter_depth`.
    /// * [`EngineError::Parse`] if an existence path is used with an operator other than
    ///   `isnull`.
    /// * Any store error raised by a sub-query.
    pub async fn compile(&self, tree: &BooleanTree) -> EngineResult<CompiledQuery> {
        for clause in tree.clauses() {
            self.validate(clause)?;
        }

        if tree.is_empty() {
            return Ok(CompiledQuery::default());
        }

        let and = try_join_all(tree.and.iter().map(|clause| self.compile_clause(clause)));
        let groups = try_join_all(
            tree.or_groups
                .values()
                .filter(|group| !group.is_empty())
                .map(|group| try_join_all(group.iter().map(|clause| self.compile_clause(clause)))),
        );
        let (and, groups) = try_join!(and, groups)?;

        let mut warnings = Vec::new();
        let mut exprs = Vec::with_capacity(and.len() + groups.len());

        for compiled in and {
            merge_warnings(&mut warnings, compiled.warnings);
            exprs.push(compiled.expr);
        }
        for group in groups {
            let mut members = Vec::with_capacity(group.len());

            for compiled in group {
                merge_warnings(&mut warnings, compiled.warnings);
                members.push(compiled.expr);
            }
            exprs.push(Expr::Or(members));
        }

        let filter = Expr::And(exprs).simplify();

        debug!(?filter, warnings = warnings.len(), "compiled filter");

        Ok(CompiledQuery { filter: Some(filter), warnings })
    }

    fn validate(&self, clause: &FilterClause) -> EngineResult<()> {
        if clause.path.is_existence() && clause.operator != Operator::IsNull {
            return Err(EngineError::Parse(format!(
                "`{}` tests relationship existence and only supports isnull, got {}",
                clause.path, clause.operator
            )));
        }

        let depth = clause.path.hops();

        if depth > self.config.max_filter_depth {
            return Err(EngineError::UnsupportedFilterDepth {
                path: clause.path.to_string(),
                depth,
                max: self.config.max_filter_depth,
            });
        }

        Ok(())
    }

    fn compile_clause<'b>(
        &'b self,
        clause: &'b FilterClause,
    ) -> BoxFuture<'b, EngineResult<Compiled>> {
        self.compile_path(clause.path.clone(), clause.operator, &clause.value)
    }

    fn compile_path<'b>(
        &'b self,
        path: FieldPath,
        op: Operator,
        value: &'b Literal,
    ) -> BoxFuture<'b, EngineResult<Compiled>> {
        async move {
            let Some((relation, inner)) = path.split_first() else {
                return Ok(Compiled::plain(Expr::Field {
                    field: path.segments()[0].clone(),
                    op,
                    value: value.clone(),
                }));
            };

            let candidates = self.resolver.relation_candidates(relation);

            if path.is_existence() && path.hops() == 0 {
                return Ok(Compiled::plain(existence(&candidates, path.to_string(), value)?));
            }

            let compiled = self.compile_path(inner, op, value).await?;
            let mut targets = BTreeMap::<Target, Vec<String>>::new();

            for candidate in &candidates {
                targets.entry(candidate.target.clone()).or_default();
            }

            let lookups = targets.keys().map(|target| {
                self.executor
                    .collect_ids(&target.name, Some(compiled.expr.clone()))
            });
            let matched = try_join_all(lookups).await?;

            for (ids, slot) in matched.into_iter().zip(targets.values_mut()) {
                *slot = ids;
            }

            debug!(
                relation,
                targets = targets.len(),
                "resolved relationship filter"
            );

            let rewritten = candidates
                .iter()
                .map(|candidate| {
                    let ids = targets
                        .get(&candidate.target)
                        .cloned()
                        .unwrap_or_default();
                    let op = match candidate.cardinality {
                        Cardinality::Single => Operator::In,
                        Cardinality::Many => Operator::Overlaps,
                    };

                    Expr::field(candidate.source_field.clone(), op, Literal::list(ids))
                })
                .collect();

            let mut warnings = ambiguity_warnings(&candidates);
            merge_warnings(&mut warnings, compiled.warnings);

            Ok(Compiled { expr: Expr::Or(rewritten), warnings })
        }
        .boxed()
    }
}

fn existence(
    candidates: &[RelationshipDescriptor],
    path: String,
    value: &Literal,
) -> EngineResult<Expr> {
    let is_null = value
        .as_bool()
        .ok_or_else(|| EngineError::Parse(format!("`{path}` expects true or false")))?;
    let checks = candidates
        .iter()
        .map(|candidate| Expr::field(candidate.source_field.clone(), Operator::IsNull, is_null))
        .collect();

    // Absent means absent under every candidate field; present means present under any.
    Ok(if is_null { Expr::And(checks) } else { Expr::Or(checks) })
}

fn merge_warnings(into: &mut Vec<QueryWarning>, warnings: Vec<QueryWarning>) {
    for warning in warnings {
        if !into.contains(&warning) {
            into.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ResolverConfig,
        document::Document,
        parser::FilterParser,
        query::{Scan, ScanPage},
    };
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::Mutex;

    /// Answers every scan with the same ids and records what was asked.
    #[derive(Debug, Default)]
    struct RecordingStore {
        ids: Vec<&'static str>,
        scans: Mutex<Vec<(String, Option<Expr>)>>,
    }

    #[async_trait]
    impl StoreReader for RecordingStore {
        async fn fetch_by_ids(
            &self,
            _collection: &str,
            _ids: Vec<String>,
        ) -> EngineResult<Vec<Document>> {
            Ok(vec![])
        }

        async fn scan(&self, collection: &str, scan: Scan) -> EngineResult<ScanPage> {
            self.scans
                .lock()
                .unwrap()
                .push((collection.to_string(), scan.filter));

            Ok(ScanPage {
                documents: self
                    .ids
                    .iter()
                    .map(|id| Document::new(collection, *id, Map::new()))
                    .collect(),
                total: None,
            })
        }

        async fn list_collections(&self) -> EngineResult<Vec<String>> {
            Ok(vec!["tags".to_string(), "users".to_string()])
        }
    }

    async fn compile(
        store: &RecordingStore,
        params: &[(&str, &str)],
    ) -> EngineResult<CompiledQuery> {
        let config = EngineConfig::default();
        let resolver =
            RelationshipResolver::new(ResolverConfig::default(), store.list_collections().await?);
        let tree = BooleanTree::build(FilterParser::parse(params.iter().copied())?);

        QueryCompiler::new(store, &resolver, &config)
            .compile(&tree)
            .await
    }

    #[tokio::test]
    async fn direct_clauses_need_no_reads() {
        let store = RecordingStore::default();

        let compiled = compile(&store, &[("views_gte", "100")]).await.unwrap();

        assert_eq!(compiled.filter, Some(Expr::field("views", Operator::Gte, "100")));
        assert!(store.scans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_tree_matches_everything() {
        let store = RecordingStore::default();

        assert_eq!(compile(&store, &[]).await.unwrap(), CompiledQuery::default());
    }

    #[tokio::test]
    async fn relationship_clauses_become_membership_tests() {
        let store = RecordingStore { ids: vec!["u1", "u2"], ..Default::default() };

        let compiled = compile(&store, &[("owner.role", "admin")]).await.unwrap();

        assert_eq!(
            compiled.filter,
            Some(Expr::Or(vec![
                Expr::field("owner_id", Operator::In, Literal::list(["u1", "u2"])),
                Expr::field("owner_ids", Operator::Overlaps, Literal::list(["u1", "u2"])),
            ]))
        );
        assert_eq!(
            *store.scans.lock().unwrap(),
            vec![("users".to_string(), Some(Expr::field("role", Operator::Eq, "admin")))]
        );
        assert_eq!(compiled.warnings.len(), 1);
    }

    #[tokio::test]
    async fn user_aliases_resolve_without_warnings() {
        let store = RecordingStore { ids: vec!["u1"], ..Default::default() };

        let compiled = compile(&store, &[("app_user.email", "a@b.c")]).await.unwrap();

        assert!(compiled.warnings.is_empty());
        assert_eq!(store.scans.lock().unwrap()[0].0, "users");
    }

    #[tokio::test]
    async fn existence_checks_read_nothing() {
        let store = RecordingStore::default();

        let absent = compile(&store, &[("tag._isnull", "true")]).await.unwrap();

        assert_eq!(
            absent.filter,
            Some(Expr::And(vec![
                Expr::field("tag_id", Operator::IsNull, true),
                Expr::field("tag_ids", Operator::IsNull, true),
            ]))
        );
        assert!(store.scans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn validation_precedes_sub_queries() {
        let store = RecordingStore::default();

        let err = compile(&store, &[("owner.role", "admin"), ("owner.company.name", "x")])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::UnsupportedFilterDepth { depth: 2, max: 1, .. }));
        assert!(store.scans.lock().unwrap().is_empty());
    }
}
