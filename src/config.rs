//! Engine configuration: preserved keys, identity convention, override bags.
//!
//! All of this is business configuration supplied by the caller, passed into
//! the engine explicitly. Nothing here is derived from the schema and nothing
//! is held in process-wide state.

use std::collections::BTreeSet;

/// Reference data consumed by the compiler and the reducer.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Field names always written to a reduced document, even when they equal
    /// the inherited value. Typically structural pointers and type markers.
    pub preserved_keys: BTreeSet<String>,
    /// Suffix marking a record's identity field inside a list of records.
    pub identity_suffix: String,
    /// Names of nested override-bag fields whose values are reducible
    /// substructures and must be recursed into even when fully equal.
    pub override_bags: BTreeSet<String>,
    /// Service fields that never inherit: stripped from the top level of the
    /// compiled ancestors. The node's own document may still carry them.
    pub strip_fields: BTreeSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preserved_keys: BTreeSet::new(),
            identity_suffix: "Id".to_owned(),
            override_bags: BTreeSet::new(),
            strip_fields: ["_id", "_rev", "_creationTime", "_lastUpdateTime", "name"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Create a config with default conventions and no preserved keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preserved key list (builder).
    pub fn with_preserved_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserved_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the identity suffix (builder).
    pub fn with_identity_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.identity_suffix = suffix.into();
        self
    }

    /// Set the override-bag field names (builder).
    pub fn with_override_bags<I, S>(mut self, bags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.override_bags = bags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the service fields that never inherit from ancestors (builder).
    pub fn with_strip_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strip_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// True if `key` names an identity field under this config's convention.
    #[inline]
    pub fn is_identity_key(&self, key: &str) -> bool {
        key.len() > self.identity_suffix.len() && key.ends_with(&self.identity_suffix)
    }
}
