//! # Chunks
//!
//! A chunk is one fixed-size block of raw memory holding the entity-ID
//! array and one array per component type of a single archetype:
//!
//! ```text
//! | Entity[capacity] | pad | A[capacity] | pad | B[capacity] | ... |
//! ```
//!
//! Offsets are computed once by the owning archetype's
//! [`ChunkLayout`]. The chunk itself only knows its byte buffer, its
//! capacity and how many leading slots are occupied.

// SAFETY: This module owns the raw chunk allocation.
// Every unsafe block is limited to allocation, deallocation and viewing the
// zero-initialized buffer as a byte slice.
#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::ops::Range;
use std::ptr::NonNull;

use super::archetype::ChunkLayout;
use super::entity::Entity;

/// Size of one chunk in bytes (16 KiB).
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Base alignment of every chunk allocation.
///
/// Cache-line aligned. Archetypes holding a stricter-aligned component
/// raise it to that component's alignment.
pub const CHUNK_ALIGN: usize = 64;

/// Size of one entry of the entity-ID array.
pub const ENTITY_ID_SIZE: usize = std::mem::size_of::<Entity>();

/// A fixed-size memory block holding one archetype's data.
///
/// Slots `0..len` are occupied; there are never holes.
pub struct Chunk {
    /// Start of the allocation.
    memory: NonNull<u8>,
    /// Layout of the allocation.
    alloc_layout: Layout,
    /// Occupied slots.
    len: usize,
    /// Maximum slots.
    capacity: usize,
}

impl Chunk {
    /// Allocates a zeroed chunk for `layout`.
    ///
    /// The block is [`CHUNK_SIZE`] bytes, aligned to
    /// [`ChunkLayout::block_align`]. A layout that cannot fit even one
    /// entity into that budget gets a block exactly as large as it needs.
    #[must_use]
    pub fn new(layout: &ChunkLayout) -> Self {
        let bytes = layout.byte_len().max(CHUNK_SIZE);
        let alloc_layout = match Layout::from_size_align(bytes, layout.block_align()) {
            Ok(alloc_layout) => alloc_layout,
            Err(_) => panic!("chunk of {bytes} bytes exceeds the address space"),
        };

        // SAFETY: `alloc_layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(alloc_layout) };
        let Some(memory) = NonNull::new(ptr) else {
            handle_alloc_error(alloc_layout);
        };

        tracing::trace!(bytes, capacity = layout.capacity(), "allocated chunk");

        Self {
            memory,
            alloc_layout,
            len: 0,
            capacity: layout.capacity(),
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks if every slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Returns the maximum number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the size of the backing block in bytes.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.alloc_layout.size()
    }

    /// Views the whole block as bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: The block is live, zero-initialized at allocation and only
        // ever written with plain bytes, so every byte is initialized.
        unsafe { std::slice::from_raw_parts(self.memory.as_ptr(), self.alloc_layout.size()) }
    }

    /// Views the whole block as mutable bytes.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: As in `as_bytes`; `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.memory.as_ptr(), self.alloc_layout.size()) }
    }

    /// Returns `len` bytes starting at `offset`, or `None` if out of bounds.
    #[inline]
    #[must_use]
    pub fn buffer_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.as_bytes().get(offset..offset.checked_add(len)?)
    }

    /// Mutable variant of [`Chunk::buffer_at`].
    #[inline]
    pub fn buffer_at_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(len)?;
        self.as_bytes_mut().get_mut(offset..end)
    }

    /// Returns the entity IDs of the occupied slots.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        // The ID array sits at offset 0 of a block aligned to at least CHUNK_ALIGN.
        bytemuck::cast_slice(&self.as_bytes()[..self.len * ENTITY_ID_SIZE])
    }

    /// Returns the entity stored in slot `index`, if occupied.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, index: usize) -> Option<Entity> {
        self.entities().get(index).copied()
    }

    /// Appends `entity` to the ID array and returns its slot.
    ///
    /// Component bytes of the new slot keep whatever the block held.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        assert!(!self.is_full(), "push into a full chunk");
        let index = self.len;
        let end = self.capacity * ENTITY_ID_SIZE;
        let ids: &mut [Entity] = bytemuck::cast_slice_mut(&mut self.as_bytes_mut()[..end]);
        ids[index] = entity;
        self.len += 1;
        index
    }

    /// Releases the last occupied slot.
    pub(crate) fn pop(&mut self) {
        debug_assert!(self.len > 0, "pop from an empty chunk");
        self.len -= 1;
    }

    /// Releases every slot.
    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    /// Copies the entity ID and every component of slot `src` over slot
    /// `dst` within this chunk.
    pub fn move_entity_data(&mut self, layout: &ChunkLayout, src: usize, dst: usize) {
        if src == dst {
            return;
        }

        let bytes = self.as_bytes_mut();
        bytes.copy_within(
            slot_range(0, ENTITY_ID_SIZE, src),
            dst * ENTITY_ID_SIZE,
        );
        for column in layout.columns() {
            let size = column.size();
            if size == 0 {
                continue;
            }
            bytes.copy_within(
                slot_range(column.offset(), size, src),
                column.offset() + dst * size,
            );
        }
    }
}

/// Byte range of slot `index` in an array starting at `offset`.
#[inline]
pub(crate) fn slot_range(offset: usize, size: usize, index: usize) -> Range<usize> {
    let start = offset + index * size;
    start..start + size
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: `memory` was allocated in `new` with exactly `alloc_layout`.
        unsafe {
            dealloc(self.memory.as_ptr(), self.alloc_layout);
        }
    }
}

// SAFETY: Chunk exclusively owns its allocation and holds only Pod data.
unsafe impl Send for Chunk {}
// SAFETY: Shared access only reads bytes; mutation requires `&mut Chunk`.
unsafe impl Sync for Chunk {}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("bytes", &self.alloc_layout.size())
            .finish()
    }
}
