//! # Queries
//!
//! A query names a tuple of component types and visits every entity whose
//! archetype contains all of them:
//!
//! ```rust,ignore
//! world.for_each_mut::<(Position, Velocity)>(|_, (pos, vel)| {
//!     pos.x += vel.x;
//! });
//! ```
//!
//! Iteration walks archetypes, then chunks, then occupied slots in order.
//! Each requested component is read from its own contiguous array, using
//! the offsets computed once by the archetype layout.

// SAFETY: Column base pointers are taken from chunks borrowed for `'w`.
// Every fetched slot index is below the chunk's `len`, and column offsets
// are aligned for their component type, so each produced reference is in
// bounds and aligned. Mutable queries reject repeated component types, so
// the references handed out for one slot never overlap.
#![allow(unsafe_code)]

use std::marker::PhantomData;

use super::archetype::Archetype;
use super::chunk::Chunk;
use super::component::{Component, ComponentRegistry, ComponentTypeId};
use super::entity::Entity;

mod sealed {
    pub trait Sealed {}
}

/// A tuple of component types that can be iterated together.
///
/// Implemented for tuples of one to eight [`Component`] types.
pub trait Query: sealed::Sealed + 'static {
    /// Shared references to one entity's components.
    type Item<'w>;
    /// Mutable references to one entity's components.
    type ItemMut<'w>;

    /// Component IDs in tuple order.
    fn component_ids() -> Vec<ComponentTypeId>;

    /// Reads slot `index` from the column base pointers.
    ///
    /// # Safety
    ///
    /// `columns` must hold one pointer per tuple element, in tuple order,
    /// each pointing at a live array of at least `index + 1` values of that
    /// type which stays borrowed for `'w`.
    #[doc(hidden)]
    unsafe fn fetch<'w>(columns: &[*const u8], index: usize) -> Self::Item<'w>;

    /// Mutable variant of [`Query::fetch`].
    ///
    /// # Safety
    ///
    /// As for [`Query::fetch`], with exclusive access for `'w` and no
    /// component type repeated in the tuple.
    #[doc(hidden)]
    unsafe fn fetch_mut<'w>(columns: &[*mut u8], index: usize) -> Self::ItemMut<'w>;
}

macro_rules! impl_query {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Component),+> sealed::Sealed for ($($name,)+) {}

        impl<$($name: Component),+> Query for ($($name,)+) {
            type Item<'w> = ($(&'w $name,)+);
            type ItemMut<'w> = ($(&'w mut $name,)+);

            fn component_ids() -> Vec<ComponentTypeId> {
                vec![$(ComponentRegistry::id_of::<$name>()),+]
            }

            #[inline]
            unsafe fn fetch<'w>(columns: &[*const u8], index: usize) -> Self::Item<'w> {
                ($(&*columns[$idx].cast::<$name>().add(index),)+)
            }

            #[inline]
            unsafe fn fetch_mut<'w>(columns: &[*mut u8], index: usize) -> Self::ItemMut<'w> {
                ($(&mut *columns[$idx].cast::<$name>().add(index),)+)
            }
        }
    };
}

impl_query!(A 0);
impl_query!(A 0, B 1);
impl_query!(A 0, B 1, C 2);
impl_query!(A 0, B 1, C 2, D 3);
impl_query!(A 0, B 1, C 2, D 3, E 4);
impl_query!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_query!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_query!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Byte offsets of the query's columns inside `archetype`'s chunks.
fn column_offsets(archetype: &Archetype, ids: &[ComponentTypeId]) -> Vec<usize> {
    ids.iter()
        .filter_map(|&id| archetype.component_offset(id))
        .collect()
}

/// Iterator over `(entity, components)` for every match of `Q`.
pub struct QueryIter<'w, Q: Query> {
    ids: Vec<ComponentTypeId>,
    archetypes: std::slice::Iter<'w, Archetype>,
    chunks: std::slice::Iter<'w, Chunk>,
    offsets: Vec<usize>,
    columns: Vec<*const u8>,
    entities: &'w [Entity],
    index: usize,
    _marker: PhantomData<Q>,
}

impl<'w, Q: Query> QueryIter<'w, Q> {
    pub(crate) fn new(archetypes: &'w [Archetype]) -> Self {
        Self {
            ids: Q::component_ids(),
            archetypes: archetypes.iter(),
            chunks: Default::default(),
            offsets: Vec::new(),
            columns: Vec::new(),
            entities: &[],
            index: 0,
            _marker: PhantomData,
        }
    }
}

impl<'w, Q: Query> Iterator for QueryIter<'w, Q> {
    type Item = (Entity, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(&entity) = self.entities.get(self.index) {
                let index = self.index;
                self.index += 1;
                // SAFETY: `index < chunk.len()` and the chunk is borrowed for 'w.
                let item = unsafe { Q::fetch(&self.columns, index) };
                return Some((entity, item));
            }

            if let Some(chunk) = self.chunks.next() {
                let base = chunk.as_bytes().as_ptr();
                self.columns.clear();
                // SAFETY: Offsets come from the chunk's own layout and lie
                // within its allocation.
                self.columns
                    .extend(self.offsets.iter().map(|&offset| unsafe { base.add(offset) }));
                self.entities = chunk.entities();
                self.index = 0;
                continue;
            }

            let archetype = self
                .archetypes
                .find(|archetype| archetype.has_all_components(&self.ids))?;
            self.offsets = column_offsets(archetype, &self.ids);
            self.chunks = archetype.chunks().iter();
        }
    }
}

/// Iterator over `(entity, mutable components)` for every match of `Q`.
pub struct QueryIterMut<'w, Q: Query> {
    ids: Vec<ComponentTypeId>,
    archetypes: std::slice::IterMut<'w, Archetype>,
    chunks: std::slice::IterMut<'w, Chunk>,
    offsets: Vec<usize>,
    columns: Vec<*mut u8>,
    entities: *const Entity,
    len: usize,
    index: usize,
    _marker: PhantomData<&'w mut Q>,
}

impl<'w, Q: Query> QueryIterMut<'w, Q> {
    /// # Panics
    ///
    /// Panics if `Q` names the same component type twice.
    pub(crate) fn new(archetypes: &'w mut [Archetype]) -> Self {
        let ids = Q::component_ids();
        let mut distinct = ids.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(
            distinct.len(),
            ids.len(),
            "a mutable query must not request the same component twice"
        );

        Self {
            ids,
            archetypes: archetypes.iter_mut(),
            chunks: Default::default(),
            offsets: Vec::new(),
            columns: Vec::new(),
            entities: std::ptr::null(),
            len: 0,
            index: 0,
            _marker: PhantomData,
        }
    }
}

impl<'w, Q: Query> Iterator for QueryIterMut<'w, Q> {
    type Item = (Entity, Q::ItemMut<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.index < self.len {
                let index = self.index;
                self.index += 1;
                // SAFETY: The ID array starts at offset 0 of a chunk borrowed
                // for 'w and holds `len` entries. Each slot is yielded once and
                // the tuple has no repeated component, so no two live
                // references alias.
                let (entity, item) =
                    unsafe { (*self.entities.add(index), Q::fetch_mut(&self.columns, index)) };
                return Some((entity, item));
            }

            if let Some(chunk) = self.chunks.next() {
                self.len = chunk.len();
                let base = chunk.as_bytes_mut().as_mut_ptr();
                self.columns.clear();
                // SAFETY: See QueryIter.
                self.columns
                    .extend(self.offsets.iter().map(|&offset| unsafe { base.add(offset) }));
                self.entities = base.cast::<Entity>();
                self.index = 0;
                continue;
            }

            let ids = &self.ids;
            let archetype = self
                .archetypes
                .find(|archetype| archetype.has_all_components(ids))?;
            self.offsets = column_offsets(archetype, &self.ids);
            self.chunks = archetype.chunks_mut().iter_mut();
        }
    }
}

/// Counts the entities matching `Q` without visiting them.
pub(crate) fn count<Q: Query>(archetypes: &[Archetype]) -> usize {
    let ids = Q::component_ids();
    archetypes
        .iter()
        .filter(|archetype| archetype.has_all_components(&ids))
        .map(Archetype::len)
        .sum()
}
