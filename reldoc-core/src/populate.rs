//! Relationship hydration.
//!
//! Populate specs are merged into a tree of relation names, then walked breadth-first.
//! At every level the foreign keys of all documents in all branches are gathered, grouped
//! by target collection and fetched with one [`StoreReader::fetch_by_ids`] call per
//! target. Fetched entities are cached for the rest of the request, so an entity reached
//! through several paths is only read once.
//!
//! Hydrated values are written under the relation name (`author` for `author_id`), next
//! to the foreign key, which is kept:
//!
//! ```text
//! {"id": "p1", "author_id": "u1", "author": {"id": "u1", "email": "..."}}
//! ```

use futures::future::try_join_all;
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};
use tracing::debug;

use crate::{
    backend::StoreReader,
    config::EngineConfig,
    document::Document,
    error::{EngineResult, QueryWarning},
    relation::{Cardinality, RelationshipDescriptor, RelationshipResolver, Target, relation_name},
    request::PopulateSpec,
};

/// Merged populate specs.
#[derive(Debug, Default, PartialEq)]
pub struct PopulateTree {
    children: BTreeMap<String, PopulateTree>,
}

impl PopulateTree {
    /// Merges `specs`, truncating each to `max_depth` relations.
    ///
    /// Returns a [`QueryWarning::PopulationDepthExceeded`] for every truncated spec.
    pub fn build(specs: &[PopulateSpec], max_depth: usize) -> (Self, Vec<QueryWarning>) {
        let mut tree = Self::default();
        let mut warnings = Vec::new();

        for spec in specs {
            if spec.depth() > max_depth {
                let warning = QueryWarning::PopulationDepthExceeded {
                    spec: spec.to_string(),
                    max: max_depth,
                };

                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }

            let mut node = &mut tree;
            for relation in spec.relations().iter().take(max_depth) {
                node = node.children.entry(relation.clone()).or_default();
            }
        }

        (tree, warnings)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Names of the relations populated at this level.
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

type EntityCache = HashMap<Target, HashMap<String, Arc<Document>>>;

/// A relation edge with the referenced entities still to be fetched.
struct Pending<'t> {
    node: &'t PopulateTree,
    refs: Vec<(Target, String)>,
}

/// Hydrates relationship fields of executed documents.
pub struct PopulationEngine<'a, S: ?Sized> {
    store: &'a S,
    resolver: &'a RelationshipResolver,
    config: &'a EngineConfig,
}

impl<'a, S> PopulationEngine<'a, S>
where
    S: StoreReader + ?Sized,
{
    pub fn new(store: &'a S, resolver: &'a RelationshipResolver, config: &'a EngineConfig) -> Self {
        Self { store, resolver, config }
    }

    /// Populates `documents` according to `specs`, preserving their order.
    ///
    /// # Errors
    ///
    /// Propagates store failures; a missing target entity is not an error.
    pub async fn populate(
        &self,
        documents: Vec<Document>,
        specs: &[PopulateSpec],
    ) -> EngineResult<(Vec<Document>, Vec<QueryWarning>)> {
        let (tree, mut warnings) = PopulateTree::build(specs, self.config.max_populate_depth);

        if tree.is_empty() || documents.is_empty() {
            return Ok((documents, warnings));
        }

        let roots = documents
            .into_iter()
            .map(Arc::new)
            .collect::<Vec<_>>();
        let mut cache = EntityCache::new();
        let mut frontier = vec![(&tree, roots.clone())];
        let mut level = 0;

        while !frontier.is_empty() {
            let mut pending = Vec::new();
            let mut wanted = BTreeMap::<Target, BTreeSet<String>>::new();

            for (node, docs) in &frontier {
                let node = *node;

                for (relation, child) in &node.children {
                    let candidates = self.resolver.relation_candidates(relation);
                    let mut refs = Vec::new();

                    for doc in docs {
                        if let Some((candidate, ids)) = foreign_keys(doc, &candidates) {
                            for id in ids {
                                refs.push((candidate.target.clone(), id));
                            }
                            if let Some(warning) = candidate.warning()
                                && !warnings.contains(&warning)
                            {
                                warnings.push(warning);
                            }
                        }
                    }

                    for (target, id) in &refs {
                        let cached = cache
                            .get(target)
                            .is_some_and(|entities| entities.contains_key(id));

                        if !cached {
                            wanted
                                .entry(target.clone())
                                .or_default()
                                .insert(id.clone());
                        }
                    }

                    pending.push(Pending { node: child, refs });
                }
            }

            let fetches = wanted.into_iter().map(|(target, ids)| async move {
                let documents = self
                    .store
                    .fetch_by_ids(&target.name, ids.into_iter().collect())
                    .await?;

                EngineResult::Ok((target, documents))
            });

            for (target, documents) in try_join_all(fetches).await? {
                debug!(
                    level,
                    target = %target.name,
                    fetched = documents.len(),
                    "populated relation level"
                );

                let entities = cache.entry(target).or_default();
                for document in documents {
                    entities.insert(document.id.clone(), Arc::new(document));
                }
            }

            frontier = pending
                .into_iter()
                .filter(|pending| !pending.node.is_empty())
                .map(|pending| {
                    let mut seen = BTreeSet::new();
                    let docs = pending
                        .refs
                        .iter()
                        .filter(|reference| seen.insert((*reference).clone()))
                        .filter_map(|(target, id)| cache.get(target)?.get(id).cloned())
                        .collect::<Vec<_>>();

                    (pending.node, docs)
                })
                .filter(|(_, docs)| !docs.is_empty())
                .collect();
            level += 1;
        }

        let documents = roots
            .iter()
            .map(|document| self.render(document, &tree, &cache))
            .collect();

        Ok((documents, warnings))
    }

    fn render(&self, document: &Document, node: &PopulateTree, cache: &EntityCache) -> Document {
        let mut rendered = document.clone();

        for (relation, child) in &node.children {
            let candidates = self.resolver.relation_candidates(relation);
            let Some((candidate, ids)) = foreign_keys(document, &candidates) else {
                continue;
            };
            let mut entities = ids.iter().filter_map(|id| {
                cache
                    .get(&candidate.target)?
                    .get(id)
                    .map(|entity| self.render(entity, child, cache).to_entity())
            });

            let value = match candidate.cardinality {
                Cardinality::Single => entities.next().unwrap_or(Value::Null),
                Cardinality::Many => Value::Array(entities.collect()),
            };

            rendered
                .data
                .insert(relation_name(relation).to_string(), value);
        }

        rendered
    }
}

/// The first candidate field present on `document` and the ids it holds.
fn foreign_keys<'c>(
    document: &Document,
    candidates: &'c [RelationshipDescriptor],
) -> Option<(&'c RelationshipDescriptor, Vec<String>)> {
    candidates.iter().find_map(|candidate| {
        let ids = match document.data.get(&candidate.source_field)? {
            Value::Array(items) => items.iter().filter_map(id_of).collect(),
            value => id_of(value).into_iter().collect(),
        };

        Some((candidate, ids))
    })
}

fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
