//! # STRATA Core
//!
//! Archetype-based Entity Component System (ECS) storing component data in
//! fixed 16 KiB chunks:
//! - Entities grouped by exact component set
//! - Structure-of-Arrays chunks with alignment-aware layouts
//! - O(1) removal via swap-back compaction
//! - Generation-checked handles with delayed index reuse
//!
//! ## Architecture Rules
//!
//! 1. **Components are plain data** - `Pod`, moved as raw bytes
//! 2. **Dead handles never fault** - mutators return `false`, readers `None`
//! 3. **No structural changes while iterating** - queries borrow the world
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{Component, World};
//!
//! let mut world = World::new();
//! let entity = world.spawn((Position::default(), Velocity::default()));
//! world.add_component(entity, Health::default());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    Archetype, ArchetypeCache, ArchetypeId, ArchetypeSignature, Bundle, Chunk, ChunkLayout,
    ColumnLayout, Component, ComponentInfo, ComponentRegistry, ComponentTypeId, Entity,
    EntityAllocator, EntityBuilder, EntityLocation, Query, QueryIter, QueryIterMut, World,
    CHUNK_ALIGN, CHUNK_SIZE, MAX_COMPONENT_SIZE,
};
pub use error::{StoreError, StoreResult};
