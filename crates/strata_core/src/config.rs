//! # World Configuration
//!
//! Tunables for a [`World`](crate::World). Every field has a default, so a
//! partial serialized config (with the `serde` feature) fills in the rest.

/// Default retention threshold for retired entity indices.
pub const DEFAULT_MIN_FREE_INDICES: usize = 1024;

/// Default number of entity slots reserved up front.
pub const DEFAULT_INITIAL_ENTITY_CAPACITY: usize = 1024;

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorldConfig {
    /// Retired indices are reused only while more than this many wait in
    /// the free list.
    pub min_free_indices: usize,
    /// Entity slots reserved in the generation table and location map.
    pub initial_entity_capacity: usize,
    /// Zero-fill a component's bytes when it is removed from an entity.
    pub scrub_removed_components: bool,
}

impl WorldConfig {
    /// Sets the index retention threshold.
    #[must_use]
    pub const fn with_min_free_indices(mut self, min_free_indices: usize) -> Self {
        self.min_free_indices = min_free_indices;
        self
    }

    /// Sets the number of entity slots reserved up front.
    #[must_use]
    pub const fn with_initial_entity_capacity(mut self, capacity: usize) -> Self {
        self.initial_entity_capacity = capacity;
        self
    }

    /// Enables or disables zero-filling of removed components.
    #[must_use]
    pub const fn with_scrub_removed_components(mut self, scrub: bool) -> Self {
        self.scrub_removed_components = scrub;
        self
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            min_free_indices: DEFAULT_MIN_FREE_INDICES,
            initial_entity_capacity: DEFAULT_INITIAL_ENTITY_CAPACITY,
            scrub_removed_components: true,
        }
    }
}
