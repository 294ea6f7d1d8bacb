//! # Entity Builder
//!
//! Assembles an entity one component at a time:
//!
//! ```rust,ignore
//! let entity = world
//!     .build_entity()
//!     .with(Position::new(0.0, 1.0, 0.0))
//!     .with(Health::full(100))
//!     .build();
//! ```
//!
//! Each `with` is a structural change. When the full component set is known
//! up front, [`World::spawn`] places the entity in its final archetype
//! directly.

use super::component::Component;
use super::entity::Entity;
use super::world::World;

/// Adds components to a freshly created, initially empty entity.
#[must_use = "the entity exists already; call `build` to get its handle"]
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    entity: Entity,
}

impl<'w> EntityBuilder<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        let entity = world.spawn(());
        Self { world, entity }
    }

    /// Attaches `value`, overwriting an earlier value of the same type.
    pub fn with<T: Component>(self, value: T) -> Self {
        if !self.world.add_component(self.entity, value) {
            self.world.set_component(self.entity, value);
        }
        self
    }

    /// Attaches `T::default()`.
    pub fn with_default<T: Component>(self) -> Self {
        self.with(T::default())
    }

    /// Returns the handle of the entity being built.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    /// Finishes building and returns the entity handle.
    #[inline]
    pub fn build(self) -> Entity {
        self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Armor {
        rating: u32,
    }
    impl Component for Armor {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Shield {
        charge: f32,
    }
    impl Component for Shield {}

    #[test]
    fn test_builder_attaches_components() {
        let mut world = World::new();
        let entity = world
            .build_entity()
            .with(Armor { rating: 12 })
            .with_default::<Shield>()
            .build();

        assert_eq!(world.get_component::<Armor>(entity), Armor { rating: 12 });
        assert_eq!(world.get_component::<Shield>(entity), Shield { charge: 0.0 });
        assert_eq!(world.archetype_of(entity).unwrap().signature().len(), 2);
        world.verify_integrity().unwrap();
    }

    #[test]
    fn test_builder_with_overwrites() {
        let mut world = World::new();
        let builder = world.build_entity().with(Armor { rating: 1 });
        let entity = builder.entity();
        builder.with(Armor { rating: 2 }).build();

        assert_eq!(world.get_component::<Armor>(entity), Armor { rating: 2 });
        assert_eq!(world.entity_count(), 1);
    }
}
