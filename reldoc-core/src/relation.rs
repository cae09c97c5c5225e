//! Relationship inference from field naming.
//!
//! There is no declared schema: a field is a foreign key exactly when its name ends in
//! `_id` (one target) or `_ids` (many targets), and the target is found by pluralizing the
//! stem. [`RelationshipResolver`] is a pure function of its [`ResolverConfig`] and a
//! snapshot of the collection names in the store, so the same inputs always resolve the
//! same way.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::{config::ResolverConfig, error::QueryWarning};

/// Whether a relationship field holds one foreign key or an array of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    Many,
}

/// What kind of entity a relationship points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    User,
    Collection,
}

/// The collection a relationship's ids live in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Target {
    pub kind: TargetKind,
    /// Collection to fetch from.
    pub name: String,
}

/// Derived description of a relationship field; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipDescriptor {
    /// The foreign key field, e.g. `author_id`.
    pub source_field: String,
    pub cardinality: Cardinality,
    pub target: Target,
    /// Set when no collection matched and the user collection was assumed.
    pub ambiguous: bool,
    /// The pluralized stem that was looked up.
    pub inferred_name: String,
}

impl RelationshipDescriptor {
    /// The warning to report when this descriptor came from the user fallback.
    pub fn warning(&self) -> Option<QueryWarning> {
        self.ambiguous
            .then(|| QueryWarning::RelationshipResolutionAmbiguous {
                field: self.source_field.clone(),
                missing: self.inferred_name.clone(),
                fallback: self.target.name.clone(),
            })
    }
}

/// Resolves relationship fields against a snapshot of known collections.
#[derive(Debug, Clone)]
pub struct RelationshipResolver {
    config: ResolverConfig,
    collections: BTreeSet<String>,
}

impl RelationshipResolver {
    pub fn new(config: ResolverConfig, collections: impl IntoIterator<Item = String>) -> Self {
        Self {
            config,
            collections: collections.into_iter().collect(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Whether `name` is a collection in the snapshot.
    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains(name)
    }

    /// Resolves a field name to its relationship, or `None` for plain fields.
    pub fn resolve(&self, field: &str) -> Option<RelationshipDescriptor> {
        let (stem, cardinality) = if let Some(stem) = field.strip_suffix("_ids") {
            (stem, Cardinality::Many)
        } else if let Some(stem) = field.strip_suffix("_id") {
            (stem, Cardinality::Single)
        } else {
            return None;
        };

        if stem.is_empty() {
            return None;
        }

        let plural = pluralize(stem);
        let user_target = || Target {
            kind: TargetKind::User,
            name: self.config.user_collection.clone(),
        };
        let (target, ambiguous) = if self.config.user_aliases.contains(&plural) {
            (user_target(), false)
        } else if self.collections.contains(&plural) {
            (Target { kind: TargetKind::Collection, name: plural.clone() }, false)
        } else {
            (user_target(), true)
        };

        Some(RelationshipDescriptor {
            source_field: field.to_string(),
            cardinality,
            target,
            ambiguous,
            inferred_name: plural,
        })
    }

    /// The foreign key fields a relation name may be stored under.
    ///
    /// `author` may live in `author_id` or `author_ids`; a plural relation such as `tags`
    /// may also live in `tag_ids`. A name that already carries the suffix resolves to
    /// itself only.
    pub fn relation_candidates(&self, relation: &str) -> Vec<RelationshipDescriptor> {
        if let Some(descriptor) = self.resolve(relation) {
            return vec![descriptor];
        }

        let mut fields = vec![format!("{relation}_id"), format!("{relation}_ids")];
        let singular = singularize(relation);

        if singular != relation {
            fields.push(format!("{singular}_ids"));
        }

        fields
            .iter()
            .filter_map(|field| self.resolve(field))
            .collect()
    }
}

/// One warning per missing collection among ambiguous descriptors.
pub fn ambiguity_warnings<'a>(
    descriptors: impl IntoIterator<Item = &'a RelationshipDescriptor>,
) -> Vec<QueryWarning> {
    let mut seen = BTreeSet::new();

    descriptors
        .into_iter()
        .filter(|descriptor| seen.insert(descriptor.inferred_name.as_str()))
        .filter_map(RelationshipDescriptor::warning)
        .collect()
}

/// Strips a trailing `_id`/`_ids` from a field name, giving the relation name.
pub fn relation_name(field: &str) -> &str {
    field
        .strip_suffix("_ids")
        .or_else(|| field.strip_suffix("_id"))
        .unwrap_or(field)
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// A trailing `s` that is not part of `ss`, `us` or `is`.
fn plain_plural(lower: &str) -> bool {
    lower.ends_with('s') && !["ss", "us", "is"].iter().any(|end| lower.ends_with(end))
}

/// Simple English pluralization.
///
/// Words that already look plural (a trailing `s` not preceded by `s`, `u` or `i`) are
/// kept as they are.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();

    if plain_plural(&lower) {
        return word.to_string();
    }
    if lower.ends_with("is") {
        return format!("{}es", &word[..word.len() - 2]);
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !is_vowel(c)) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return format!("{word}es");
    }

    format!("{word}s")
}

/// Simple English singularization, the inverse of [`pluralize`] for regular nouns.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();

    if lower.ends_with("ies") && word.len() > 3 {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "xes", "zes", "ches", "shes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return word[..word.len() - 2].to_string();
    }
    if plain_plural(&lower) {
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}
