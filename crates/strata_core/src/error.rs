//! # Store Error Types
//!
//! Misuse of dead handles is never an error in the store API: mutators
//! return `false` and readers return `None` or a default value. These
//! errors surface only through the `try_*` accessors, raw component
//! registration and [`World::verify_integrity`](crate::World::verify_integrity).

use thiserror::Error;

use crate::ecs::Entity;

/// Errors reported by the component store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The handle is stale, destroyed or was never issued.
    #[error("entity {0} is not alive")]
    DeadEntity(Entity),

    /// The entity is alive but lacks the requested component.
    #[error("entity {entity} has no component {component}")]
    MissingComponent {
        /// The entity that was queried.
        entity: Entity,
        /// Type name of the missing component.
        component: &'static str,
    },

    /// Component alignment is not a power of two.
    #[error("invalid component alignment {align}: not a power of two")]
    InvalidAlignment {
        /// The rejected alignment.
        align: usize,
    },

    /// Component is too large to lay out without overflowing.
    #[error("component size {size} exceeds the largest supported size {max}")]
    ComponentTooLarge {
        /// The rejected size.
        size: usize,
        /// Largest supported size.
        max: usize,
    },

    /// Component size is not a multiple of its alignment.
    #[error("component size {size} is not a multiple of its alignment {align}")]
    UnpaddedSize {
        /// The rejected size.
        size: usize,
        /// The declared alignment.
        align: usize,
    },

    /// A storage invariant does not hold.
    #[error("integrity violation: {0}")]
    Integrity(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
