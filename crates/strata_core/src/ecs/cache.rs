//! # Archetype Cache
//!
//! Deduplicates archetypes by signature, so every request for the same set
//! of component types (in any order) resolves to the same [`Archetype`].
//!
//! Single-component transitions (`+C` / `-C`) are memoized per archetype, so
//! repeated add/remove of the same component skips signature hashing.

use std::collections::HashMap;
use std::fmt;

use super::archetype::{Archetype, ArchetypeSignature};
use super::component::{ComponentInfo, ComponentTypeId};

/// Index of an archetype inside its owning [`ArchetypeCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(raw) => Self(raw),
            Err(_) => panic!("archetype id space exhausted"),
        }
    }

    /// Returns the position of the archetype in the cache.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archetype#{}", self.0)
    }
}

/// Owns every archetype of a world.
///
/// Archetypes are never removed, so an [`ArchetypeId`] stays valid for the
/// lifetime of the cache.
#[derive(Default)]
pub struct ArchetypeCache {
    archetypes: Vec<Archetype>,
    by_signature: HashMap<ArchetypeSignature, ArchetypeId>,
    add_edges: HashMap<(ArchetypeId, ComponentTypeId), ArchetypeId>,
    remove_edges: HashMap<(ArchetypeId, ComponentTypeId), ArchetypeId>,
}

impl ArchetypeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the archetype for a component set, creating it on a miss.
    ///
    /// The list is canonicalized first: order does not matter and repeated
    /// component types collapse into one.
    pub fn get_or_create(&mut self, components: &[ComponentInfo]) -> ArchetypeId {
        let mut components = components.to_vec();
        components.sort_unstable_by_key(ComponentInfo::id);
        components.dedup_by_key(|info| info.id());

        let signature = ArchetypeSignature::new(components.iter().map(ComponentInfo::id));
        if let Some(&id) = self.by_signature.get(&signature) {
            return id;
        }

        let id = ArchetypeId::from_index(self.archetypes.len());
        let archetype = Archetype::new(id, &components);
        tracing::debug!(
            archetype = id.0,
            components = signature.len(),
            capacity = archetype.chunk_capacity(),
            "created archetype"
        );
        self.archetypes.push(archetype);
        self.by_signature.insert(signature, id);
        id
    }

    /// Looks up an existing archetype without creating one.
    #[must_use]
    pub fn find(&self, signature: &ArchetypeSignature) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    /// Resolves the archetype reached by adding `component` to `from`.
    pub fn with_component(&mut self, from: ArchetypeId, component: ComponentInfo) -> ArchetypeId {
        if let Some(&to) = self.add_edges.get(&(from, component.id())) {
            return to;
        }

        let mut components = self.infos_of(from);
        components.push(component);
        let to = self.get_or_create(&components);
        self.add_edges.insert((from, component.id()), to);
        self.remove_edges.insert((to, component.id()), from);
        to
    }

    /// Resolves the archetype reached by removing `component` from `from`.
    pub fn without_component(&mut self, from: ArchetypeId, component: ComponentTypeId) -> ArchetypeId {
        if let Some(&to) = self.remove_edges.get(&(from, component)) {
            return to;
        }

        let mut components = self.infos_of(from);
        components.retain(|info| info.id() != component);
        let to = self.get_or_create(&components);
        self.remove_edges.insert((from, component), to);
        if to != from {
            self.add_edges.insert((to, component), from);
        }
        to
    }

    fn infos_of(&self, id: ArchetypeId) -> Vec<ComponentInfo> {
        self.archetypes[id.index()]
            .layout()
            .columns()
            .iter()
            .map(|column| column.info())
            .collect()
    }

    /// Returns an archetype by ID.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }

    /// Borrows two distinct archetypes mutably at once.
    pub(crate) fn pair_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        assert_ne!(a, b, "pair_mut needs two distinct archetypes");
        if a.index() < b.index() {
            let (low, high) = self.archetypes.split_at_mut(b.index());
            (&mut low[a.index()], &mut high[0])
        } else {
            let (low, high) = self.archetypes.split_at_mut(a.index());
            (&mut high[0], &mut low[b.index()])
        }
    }

    /// Iterates every archetype in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Archetype> {
        self.archetypes.iter()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[Archetype] {
        &self.archetypes
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    /// Returns the number of archetypes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Checks if no archetype has been created yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}

impl fmt::Debug for ArchetypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeCache")
            .field("archetypes", &self.archetypes)
            .field("edges", &(self.add_edges.len() + self.remove_edges.len()))
            .finish()
    }
}
