//! Key namespacing for the remote store.

/// Namespace for cache entries under the prefix.
const ENTRY_SEGMENT: &str = "e:";

/// Namespace for tag index sets under the prefix.
const TAG_SEGMENT: &str = "t:";

/// Builds namespaced remote keys from caller-facing keys.
///
/// Entries live under `{prefix}e:{key}` and tag index sets under
/// `{prefix}t:{tag}`, so no caller key can land on a tag index. Tag sets
/// store caller-facing keys so an invalidation can evict the same keys
/// from the local layer.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Creates a key builder with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Remote key for a cache entry.
    #[must_use]
    pub fn entry(&self, key: &str) -> String {
        format!("{}{}{}", self.prefix, ENTRY_SEGMENT, key)
    }

    /// Remote key for a tag's member set.
    #[must_use]
    pub fn tag(&self, tag: &str) -> String {
        format!("{}{}{}", self.prefix, TAG_SEGMENT, tag)
    }

    /// Remote pattern for a caller-facing glob pattern. Only entries can
    /// match it, never tag indexes.
    #[must_use]
    pub fn pattern(&self, pattern: &str) -> String {
        format!("{}{}{}", self.prefix, ENTRY_SEGMENT, pattern)
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("strata:")
    }
}
