//! Engine configuration.
//!
//! Every bound the engine enforces is a field here rather than a constant, so each surface
//! (collection listing, cloud functions, SDKs) can pick its own values.
//!
//! ```ignore
//! use reldoc::config::EngineConfig;
//!
//! let config = EngineConfig::default()
//!     .with_max_limit(100)
//!     .with_max_populate_depth(1);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tunables for query compilation, execution and population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size used when a request does not specify a limit.
    pub default_limit: usize,
    /// Upper bound every requested limit is clamped to.
    pub max_limit: usize,
    /// Maximum number of relation hops a filter path may traverse.
    pub max_filter_depth: usize,
    /// Maximum number of relation levels a populate spec may hydrate.
    pub max_populate_depth: usize,
    /// Relationship resolution settings.
    pub resolver: ResolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
            max_filter_depth: 1,
            max_populate_depth: 2,
            resolver: ResolverConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_default_limit(mut self, default_limit: usize) -> Self {
        self.default_limit = default_limit;
        self
    }

    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn with_max_filter_depth(mut self, max_filter_depth: usize) -> Self {
        self.max_filter_depth = max_filter_depth;
        self
    }

    pub fn with_max_populate_depth(mut self, max_populate_depth: usize) -> Self {
        self.max_populate_depth = max_populate_depth;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// The effective page size for a requested limit.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

/// Settings for inferring relationship targets from field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Collection user entities are fetched from.
    pub user_collection: String,
    /// Pluralized relation names that always denote the user entity.
    pub user_aliases: BTreeSet<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_collection: "users".to_string(),
            user_aliases: ["users", "app_users", "appusers"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ResolverConfig {
    pub fn with_user_collection(mut self, user_collection: impl Into<String>) -> Self {
        self.user_collection = user_collection.into();
        self
    }

    pub fn with_user_alias(mut self, alias: impl Into<String>) -> Self {
        self.user_aliases.insert(alias.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_max_limit() {
        let config = EngineConfig::default().with_max_limit(100);

        assert_eq!(config.clamp_limit(None), 50);
        assert_eq!(config.clamp_limit(Some(10)), 10);
        assert_eq!(config.clamp_limit(Some(1000)), 100);
    }

    #[test]
    fn deserializes_partial_config_with_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"max_limit": 20, "resolver": {"user_collection": "members"}}"#,
        )
        .unwrap();

        assert_eq!(config.max_limit, 20);
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.resolver.user_collection, "members");
        assert!(config.resolver.user_aliases.contains("app_users"));
    }
}
