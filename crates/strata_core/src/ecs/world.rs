//! # ECS World
//!
//! The central container for all entities and components.
//!
//! A world owns an [`EntityAllocator`], an [`ArchetypeCache`] and a location
//! map from entity index to physical slot. Every structural change (create,
//! destroy, add, remove) completes its location fix-ups before returning.
//!
//! References handed out by accessors and queries borrow the world, so they
//! cannot outlive the next structural change, which may move bytes around.

use super::archetype::Archetype;
use super::builder::EntityBuilder;
use super::bundle::Bundle;
use super::cache::{ArchetypeCache, ArchetypeId};
use super::chunk::{CHUNK_SIZE, ENTITY_ID_SIZE};
use super::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
use super::entity::{Entity, EntityAllocator};
use super::query::{self, Query, QueryIter, QueryIterMut};
use crate::config::WorldConfig;
use crate::error::{StoreError, StoreResult};

/// Physical position of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityLocation {
    /// Archetype holding the entity.
    pub archetype: ArchetypeId,
    /// Chunk index within the archetype.
    pub chunk: usize,
    /// Slot index within the chunk.
    pub index: usize,
}

/// The ECS World - container for all entities and their components.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
///
/// let entity = world.spawn((Position::new(1.0, 2.0, 3.0), Velocity::default()));
/// world.for_each_mut::<(Position, Velocity)>(|_, (pos, vel)| {
///     pos.x += vel.x;
/// });
/// ```
pub struct World {
    config: WorldConfig,
    allocator: EntityAllocator,
    archetypes: ArchetypeCache,
    /// Indexed by entity index; `None` for retired or never-issued slots.
    locations: Vec<Option<EntityLocation>>,
}

impl World {
    /// Creates an empty world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates an empty world.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            allocator: EntityAllocator::with_threshold(
                config.min_free_indices,
                config.initial_entity_capacity,
            ),
            archetypes: ArchetypeCache::new(),
            locations: Vec::with_capacity(config.initial_entity_capacity),
        }
    }

    /// Returns the configuration this world was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Creates an entity holding the default value of every component in `B`.
    pub fn create_entity<B: Bundle + Default>(&mut self) -> Entity {
        self.spawn(B::default())
    }

    /// Creates an entity holding the given component values.
    ///
    /// The entity is placed directly into the archetype of the bundle.
    pub fn spawn<B: Bundle>(&mut self, values: B) -> Entity {
        let archetype = self.archetypes.get_or_create(&B::component_infos());
        let entity = self.allocator.create();

        let target = self.archetypes.get_mut(archetype);
        let (chunk, index) = target.allocate_slot(entity);
        values.write_components(&mut |id, bytes| {
            target.write_component(chunk, index, id, bytes);
        });

        self.set_location(entity, EntityLocation { archetype, chunk, index });
        entity
    }

    /// Creates an entity from runtime component descriptors.
    ///
    /// Every component starts as all-zero bytes.
    pub fn create_entity_with(&mut self, components: &[ComponentInfo]) -> Entity {
        let archetype = self.archetypes.get_or_create(components);
        let entity = self.allocator.create();

        let target = self.archetypes.get_mut(archetype);
        let (chunk, index) = target.allocate_slot(entity);
        target.zero_slot(chunk, index);

        self.set_location(entity, EntityLocation { archetype, chunk, index });
        entity
    }

    /// Starts building an entity one component at a time.
    pub fn build_entity(&mut self) -> EntityBuilder<'_> {
        EntityBuilder::new(self)
    }

    /// Destroys an entity and retires its handle.
    ///
    /// # Returns
    ///
    /// `true` if the entity was alive. Stale handles are ignored with a
    /// warning.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.allocator.destroy(entity) {
            return false;
        }

        let slot = self.locations.get_mut(entity.index() as usize);
        if let Some(location) = slot.and_then(Option::take) {
            let moved = self
                .archetypes
                .get_mut(location.archetype)
                .remove_slot(location.chunk, location.index);
            if let Some(moved) = moved {
                self.set_location(moved, location);
            }
        }
        true
    }

    /// Destroys every entity, keeping archetypes and their chunks for reuse.
    pub fn clear(&mut self) {
        let live: Vec<Entity> = self.entities().collect();
        for entity in live {
            self.allocator.destroy(entity);
        }
        for archetype in self.archetypes.as_mut_slice() {
            archetype.clear();
        }
        self.locations.fill(None);
    }

    /// Checks if an entity handle is live.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Returns the number of archetypes created so far.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Returns where a live entity is stored.
    #[inline]
    #[must_use]
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.locations.get(entity.index() as usize).copied().flatten()
    }

    /// Iterates every live entity, archetype by archetype.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.archetypes.iter().flat_map(|archetype| archetype.entities())
    }

    fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        let index = entity.index() as usize;
        if index >= self.locations.len() {
            self.locations.resize(index + 1, None);
        }
        self.locations[index] = Some(location);
    }

    // =========================================================================
    // Structural changes
    // =========================================================================

    /// Adds component `T` to an entity, moving it to the matching archetype.
    ///
    /// # Returns
    ///
    /// `false` if the entity is dead or already has a `T`; nothing changes.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        let Some(location) = self.location(entity) else {
            return false;
        };
        let info = ComponentInfo::of::<T>();
        if self.has_component_id(location, info.id()) {
            return false;
        }

        let target = self.archetypes.with_component(location.archetype, info);
        let moved_to = self.migrate(entity, location, target, None);
        self.archetypes.get_mut(target).write_component(
            moved_to.chunk,
            moved_to.index,
            info.id(),
            bytemuck::bytes_of(&value),
        );
        true
    }

    /// Removes component `T` from an entity, moving it to the matching
    /// archetype.
    ///
    /// # Returns
    ///
    /// `false` if the entity is dead or has no `T`; nothing changes.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        let Some(location) = self.location(entity) else {
            return false;
        };
        let Some(id) = ComponentRegistry::find_id::<T>() else {
            return false;
        };
        if !self.has_component_id(location, id) {
            return false;
        }

        let target = self.archetypes.without_component(location.archetype, id);
        self.migrate(entity, location, target, Some(id));
        true
    }

    /// Moves an entity from `from` into a fresh slot of archetype `to`.
    ///
    /// Shared components are copied byte for byte, `dropped` is scrubbed in
    /// the old slot, and the old slot is reclaimed by swap-back.
    fn migrate(
        &mut self,
        entity: Entity,
        from: EntityLocation,
        to: ArchetypeId,
        dropped: Option<ComponentTypeId>,
    ) -> EntityLocation {
        let scrub = self.config.scrub_removed_components;
        let (source, target) = self.archetypes.pair_mut(from.archetype, to);

        let (chunk, index) = target.allocate_slot(entity);
        target.copy_shared_from((chunk, index), source, (from.chunk, from.index));

        if let (true, Some(id)) = (scrub, dropped) {
            source.scrub_component(from.chunk, from.index, id);
        }
        if let Some(moved) = source.remove_slot(from.chunk, from.index) {
            self.set_location(moved, from);
        }

        let location = EntityLocation { archetype: to, chunk, index };
        self.set_location(entity, location);
        location
    }

    fn has_component_id(&self, location: EntityLocation, id: ComponentTypeId) -> bool {
        self.archetypes
            .get(location.archetype)
            .is_some_and(|archetype| archetype.has_component(id))
    }

    // =========================================================================
    // Component access
    // =========================================================================

    /// Checks if a live entity has component `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match (self.location(entity), ComponentRegistry::find_id::<T>()) {
            (Some(location), Some(id)) => self.has_component_id(location, id),
            _ => false,
        }
    }

    /// Returns a copy of component `T`, or `T::default()` if the entity is
    /// dead or lacks it.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> T {
        if !self.allocator.is_alive(entity) {
            tracing::warn!(
                index = entity.index(),
                generation = entity.generation(),
                component = std::any::type_name::<T>(),
                "read through a dead entity handle"
            );
            return T::default();
        }
        self.get_component_ref(entity).copied().unwrap_or_default()
    }

    /// Returns a reference to component `T` of a live entity.
    #[must_use]
    pub fn get_component_ref<T: Component>(&self, entity: Entity) -> Option<&T> {
        let location = self.location(entity)?;
        self.archetypes
            .get(location.archetype)?
            .component(location.chunk, location.index)
    }

    /// Returns a mutable reference to component `T` of a live entity.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let location = self.location(entity)?;
        self.archetypes
            .get_mut(location.archetype)
            .component_mut(location.chunk, location.index)
    }

    /// Overwrites component `T` if the entity is alive and already has one.
    ///
    /// # Returns
    ///
    /// `true` if the value was written.
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        match self.get_component_mut::<T>(entity) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Returns a reference to component `T`, telling a dead entity apart
    /// from a missing component.
    ///
    /// # Errors
    ///
    /// [`StoreError::DeadEntity`] if the handle is not live,
    /// [`StoreError::MissingComponent`] if the entity has no `T`.
    pub fn try_component<T: Component>(&self, entity: Entity) -> StoreResult<&T> {
        if self.location(entity).is_none() {
            return Err(StoreError::DeadEntity(entity));
        }
        self.get_component_ref(entity)
            .ok_or(StoreError::MissingComponent {
                entity,
                component: std::any::type_name::<T>(),
            })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Iterates `(entity, components)` for every entity holding all of `Q`.
    pub fn query<Q: Query>(&self) -> QueryIter<'_, Q> {
        QueryIter::new(self.archetypes.as_slice())
    }

    /// Iterates `(entity, mutable components)` for every entity holding all
    /// of `Q`.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names the same component twice.
    pub fn query_mut<Q: Query>(&mut self) -> QueryIterMut<'_, Q> {
        QueryIterMut::new(self.archetypes.as_mut_slice())
    }

    /// Calls `f` once for every entity holding all of `Q`.
    pub fn for_each<'w, Q: Query>(&'w self, mut f: impl FnMut(Entity, Q::Item<'w>)) {
        for (entity, item) in self.query::<Q>() {
            f(entity, item);
        }
    }

    /// Calls `f` once for every entity holding all of `Q`, with mutable
    /// access to the components.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names the same component twice.
    pub fn for_each_mut<'w, Q: Query>(&'w mut self, mut f: impl FnMut(Entity, Q::ItemMut<'w>)) {
        for (entity, item) in self.query_mut::<Q>() {
            f(entity, item);
        }
    }

    /// Counts the entities holding all of `Q`.
    #[must_use]
    pub fn query_count<Q: Query>(&self) -> usize {
        query::count::<Q>(self.archetypes.as_slice())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the archetype currently holding a live entity.
    #[must_use]
    pub fn archetype_of(&self, entity: Entity) -> Option<&Archetype> {
        self.archetypes.get(self.location(entity)?.archetype)
    }

    /// Returns an archetype by ID.
    #[must_use]
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// Iterates every archetype in creation order.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> + '_ {
        self.archetypes.iter()
    }

    /// Walks every archetype, chunk and location record and checks the
    /// storage invariants.
    ///
    /// # Errors
    ///
    /// [`StoreError::Integrity`] describing the first violation found.
    pub fn verify_integrity(&self) -> StoreResult<()> {
        let mut stored = 0;

        for archetype in self.archetypes.iter() {
            let id = archetype.id();
            let layout = archetype.layout();
            let capacity = layout.capacity();

            if capacity == 0 {
                return Err(integrity(format!("{id} has zero capacity")));
            }
            if capacity > 1 && layout.byte_len() > CHUNK_SIZE {
                return Err(integrity(format!(
                    "{id} layout of {} bytes exceeds the chunk size",
                    layout.byte_len()
                )));
            }

            let mut end = ENTITY_ID_SIZE * capacity;
            for column in layout.columns() {
                if column.offset() % column.align() != 0 {
                    return Err(integrity(format!(
                        "{id} column {} is misaligned at offset {}",
                        column.id(),
                        column.offset()
                    )));
                }
                if column.offset() < end {
                    return Err(integrity(format!("{id} column {} overlaps", column.id())));
                }
                end = column.offset() + column.size() * capacity;
            }

            let mut in_chunks = 0;
            for (chunk_index, chunk) in archetype.chunks().iter().enumerate() {
                if chunk.capacity() != capacity || chunk.byte_len() < layout.byte_len() {
                    return Err(integrity(format!(
                        "{id} chunk {chunk_index} does not match the archetype layout"
                    )));
                }
                if chunk.len() > chunk.capacity() {
                    return Err(integrity(format!("{id} chunk {chunk_index} is over capacity")));
                }
                if chunk.as_bytes().as_ptr() as usize % layout.block_align() != 0 {
                    return Err(integrity(format!("{id} chunk {chunk_index} is misaligned")));
                }

                for (index, &entity) in chunk.entities().iter().enumerate() {
                    let expected = EntityLocation {
                        archetype: id,
                        chunk: chunk_index,
                        index,
                    };
                    if self.location(entity) != Some(expected) {
                        return Err(integrity(format!(
                            "entity {entity} stored at {id} chunk {chunk_index} slot {index} \
                             but located at {:?}",
                            self.location(entity)
                        )));
                    }
                }
                in_chunks += chunk.len();
            }

            if in_chunks != archetype.len() {
                return Err(integrity(format!(
                    "{id} counts {} entities but its chunks hold {in_chunks}",
                    archetype.len()
                )));
            }
            stored += in_chunks;
        }

        if stored != self.allocator.alive_count() {
            return Err(integrity(format!(
                "{stored} entities stored but {} alive",
                self.allocator.alive_count()
            )));
        }
        Ok(())
    }
}

fn integrity(message: String) -> StoreError {
    StoreError::Integrity(message)
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.allocator.alive_count())
            .field("archetypes", &self.archetypes.len())
            .field("config", &self.config)
            .finish()
    }
}
