//! Grouping of parsed clauses into an AND/OR tree.

use std::collections::BTreeMap;

use crate::parser::FilterClause;

/// Clauses grouped for evaluation.
///
/// A document matches when every `and` clause matches and every OR group has at least one
/// matching clause. The empty tree matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanTree {
    pub and: Vec<FilterClause>,
    /// OR groups keyed by tag; ordered so compiled predicates are deterministic.
    pub or_groups: BTreeMap<String, Vec<FilterClause>>,
}

impl BooleanTree {
    /// Splits clauses by OR group, keeping their relative order.
    pub fn build(clauses: impl IntoIterator<Item = FilterClause>) -> Self {
        let mut tree = Self::default();

        for clause in clauses {
            match &clause.or_group {
                Some(group) => tree
                    .or_groups
                    .entry(group.clone())
                    .or_default()
                    .push(clause),
                None => tree.and.push(clause),
            }
        }

        tree
    }

    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or_groups.values().all(Vec::is_empty)
    }

    /// Every clause in the tree, AND clauses first.
    pub fn clauses(&self) -> impl Iterator<Item = &FilterClause> {
        self.and
            .iter()
            .chain(self.or_groups.values().flatten())
    }

    /// Evaluates the tree with a per-clause predicate.
    pub fn matches(&self, mut clause_matches: impl FnMut(&FilterClause) -> bool) -> bool {
        self.and.iter().all(&mut clause_matches)
            && self
                .or_groups
                .values()
                .filter(|group| !group.is_empty())
                .all(|group| group.iter().any(&mut clause_matches))
    }
}

impl FromIterator<FilterClause> for BooleanTree {
    fn from_iter<I: IntoIterator<Item = FilterClause>>(iter: I) -> Self {
        Self::build(iter)
    }
}
