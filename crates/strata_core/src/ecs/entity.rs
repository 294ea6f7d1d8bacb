//! # Entity Management
//!
//! Entities are lightweight handles consisting of:
//! - An index addressing a logical slot
//! - A generation counter for safe reuse
//!
//! The [`EntityAllocator`] hands out handles and retires them. Retired
//! indices wait in a FIFO free list and are only reused once the list holds
//! more than a retention threshold, so a handle captured just before its
//! entity died does not immediately alias a fresh entity.

use std::collections::VecDeque;
use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Handle to an entity.
///
/// Two handles are equal iff both index and generation match. The handle is
/// `Pod` because chunks store it verbatim in their entity-ID array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Null/invalid entity handle.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: 0,
    };

    /// Creates a handle from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index of this handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of this handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX
    }

    /// Packs the handle into a single `u64`.
    ///
    /// Upper 32 bits hold the generation, lower 32 bits the index.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Inverse of [`Entity::to_bits`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}v{}", self.index, self.generation)
        }
    }
}

/// Generation and liveness of one entity index.
#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Issues and retires entity handles.
///
/// A handle is live while its slot is occupied and the generations match.
/// An index whose generation reaches `u32::MAX` is retired for good once
/// destroyed, so a stale handle never becomes valid again.
pub struct EntityAllocator {
    /// Every slot ever issued.
    slots: Vec<Slot>,
    /// Retired indices, oldest first.
    free_indices: VecDeque<u32>,
    /// Number of live handles.
    alive_count: usize,
    /// Free list length that must be exceeded before an index is reused.
    min_free_indices: usize,
}

impl EntityAllocator {
    /// Default retention threshold for retired indices.
    pub const DEFAULT_MIN_FREE_INDICES: usize = 1024;

    /// Creates an allocator with the default retention threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(Self::DEFAULT_MIN_FREE_INDICES, 0)
    }

    /// Creates an allocator with an explicit retention threshold.
    ///
    /// # Arguments
    ///
    /// * `min_free_indices` - Retired indices are reused only while the free
    ///   list holds more than this many entries
    /// * `capacity` - Slots to reserve up front
    #[must_use]
    pub fn with_threshold(min_free_indices: usize, capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_indices: VecDeque::new(),
            alive_count: 0,
            min_free_indices,
        }
    }

    /// Issues a new handle.
    ///
    /// Reuses the oldest retired index once the free list exceeds the
    /// retention threshold, otherwise opens a new slot at generation 0.
    ///
    /// # Panics
    ///
    /// Panics if every index below `u32::MAX` is in use.
    pub fn create(&mut self) -> Entity {
        let index = if self.free_indices.len() > self.min_free_indices {
            self.free_indices.pop_front()
        } else {
            None
        };

        let index = index.unwrap_or_else(|| {
            let next = self.slots.len();
            assert!(
                next < u32::MAX as usize,
                "entity index space exhausted"
            );
            self.slots.push(Slot {
                generation: 0,
                alive: false,
            });
            next as u32
        });

        let slot = &mut self.slots[index as usize];
        slot.alive = true;
        self.alive_count += 1;
        Entity::new(index, slot.generation)
    }

    /// Retires a handle.
    ///
    /// Stale or already-destroyed handles are ignored with a warning.
    ///
    /// # Returns
    ///
    /// `true` if the handle was live and is now retired.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            tracing::warn!(
                index = entity.index(),
                generation = entity.generation(),
                "attempted to destroy an invalid or already destroyed entity"
            );
            return false;
        }

        let slot = &mut self.slots[entity.index() as usize];
        slot.alive = false;
        self.alive_count -= 1;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free_indices.push_back(entity.index());
            }
            None => tracing::debug!(
                index = entity.index(),
                "entity index retired after exhausting its generations"
            ),
        }
        true
    }

    /// Checks if a handle is live: slot occupied and generation matches.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Returns the number of live handles.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns the number of slots ever issued.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of retired indices waiting for reuse.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_indices.len()
    }

    /// Returns the retention threshold.
    #[inline]
    #[must_use]
    pub const fn min_free_indices(&self) -> usize {
        self.min_free_indices
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_bits_roundtrip() {
        let id = Entity::new(12345, 67890);
        assert_eq!(Entity::from_bits(id.to_bits()), id);
        assert_eq!(id.to_bits() >> 32, 67890);
    }

    #[test]
    fn test_null_entity() {
        assert!(Entity::NULL.is_null());
        assert!(Entity::default().is_null());
        assert!(!Entity::new(0, 0).is_null());
        assert_eq!(Entity::NULL.to_string(), "null");
        assert_eq!(Entity::new(3, 7).to_string(), "3v7");
    }

    #[test]
    fn test_entity_ordering() {
        assert!(Entity::new(1, 9) < Entity::new(2, 0));
        assert!(Entity::new(2, 0) < Entity::new(2, 1));
    }

    #[test]
    fn test_sequential_indices() {
        let mut allocator = EntityAllocator::new();
        let a = allocator.create();
        let b = allocator.create();
        assert_eq!(a, Entity::new(0, 0));
        assert_eq!(b, Entity::new(1, 0));
        assert_eq!(allocator.alive_count(), 2);
        assert_eq!(allocator.slot_count(), 2);
    }

    #[test]
    fn test_generation_safety() {
        let mut allocator = EntityAllocator::with_threshold(0, 0);

        let first = allocator.create();
        assert!(allocator.destroy(first));
        let second = allocator.create();

        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(!allocator.is_alive(first));
        assert!(allocator.is_alive(second));
    }

    #[test]
    fn test_retention_threshold_delays_reuse() {
        let mut allocator = EntityAllocator::with_threshold(2, 0);

        let handles: Vec<Entity> = (0..3).map(|_| allocator.create()).collect();
        for &handle in &handles {
            assert!(allocator.destroy(handle));
        }
        assert_eq!(allocator.free_count(), 3);

        // 3 > 2: the oldest retired index comes back first.
        let reused = allocator.create();
        assert_eq!(reused.index(), handles[0].index());
        assert_eq!(allocator.free_count(), 2);

        // 2 is not > 2: a fresh slot is opened.
        let fresh = allocator.create();
        assert_eq!(fresh.index(), 3);
    }

    #[test]
    fn test_default_threshold_does_not_reuse_immediately() {
        let mut allocator = EntityAllocator::new();
        let first = allocator.create();
        allocator.destroy(first);
        let second = allocator.create();
        assert_ne!(second.index(), first.index());
    }

    #[test]
    fn test_double_destroy_is_ignored() {
        let mut allocator = EntityAllocator::new();
        let id = allocator.create();

        assert!(allocator.destroy(id));
        assert!(!allocator.destroy(id));
        assert_eq!(allocator.alive_count(), 0);
        assert_eq!(allocator.free_count(), 1);
    }

    #[test]
    fn test_exhausted_generation_retires_index() {
        let mut allocator = EntityAllocator::with_threshold(0, 0);
        let first = allocator.create();
        allocator.slots[0].generation = u32::MAX;
        let last = Entity::new(first.index(), u32::MAX);
        assert!(allocator.is_alive(last));

        assert!(allocator.destroy(last));
        assert!(!allocator.is_alive(last));
        assert!(!allocator.is_alive(first));
        assert_eq!(allocator.free_count(), 0);

        let next = allocator.create();
        assert_ne!(next.index(), first.index());
        assert!(!allocator.is_alive(Entity::new(first.index(), 0)));
    }

    #[test]
    fn test_retired_slot_rejects_next_generation() {
        let mut allocator = EntityAllocator::new();
        let id = allocator.create();
        allocator.destroy(id);
        assert!(!allocator.is_alive(Entity::new(id.index(), id.generation() + 1)));
    }

    #[test]
    fn test_out_of_range_and_null_are_dead() {
        let allocator = EntityAllocator::new();
        assert!(!allocator.is_alive(Entity::new(5, 0)));
        assert!(!allocator.is_alive(Entity::NULL));
    }
}
