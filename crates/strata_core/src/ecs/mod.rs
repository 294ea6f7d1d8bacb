//! # Entity Component System
//!
//! An archetype ECS over fixed-size chunks.
//!
//! ## Design Philosophy
//!
//! - Entities with the same component set share one archetype
//! - Component data lives in 16 KiB chunks, one dense array per type
//! - Entity handles are indices with generation counters
//! - Structural changes migrate raw bytes; components are `Pod`

pub mod archetype;
mod builder;
mod bundle;
pub mod cache;
pub mod chunk;
mod component;
mod entity;
pub mod query;
mod world;

pub use archetype::{Archetype, ArchetypeSignature, ChunkLayout, ColumnLayout};
pub use builder::EntityBuilder;
pub use bundle::Bundle;
pub use cache::{ArchetypeCache, ArchetypeId};
pub use chunk::{Chunk, CHUNK_ALIGN, CHUNK_SIZE};
pub use component::{
    Component, ComponentInfo, ComponentRegistry, ComponentTypeId, MAX_COMPONENT_SIZE,
};
pub use entity::{Entity, EntityAllocator};
pub use query::{Query, QueryIter, QueryIterMut};
pub use world::{EntityLocation, World};
