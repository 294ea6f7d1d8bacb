//! # Archetype-based Entity Storage
//!
//! Entities with the same component set are stored together. Within each
//! archetype, data is split into fixed-size [`Chunk`]s laid out as
//! Structure of Arrays:
//!
//! ```text
//! Archetype {Position, Velocity}, capacity 4:
//!
//! chunk 0: | e0 e1 e2 e3 | P0 P1 P2 P3 | V0 V1 V2 V3 |
//! chunk 1: | e4 e5 .. .. | P4 P5 .. .. | V4 V5 .. .. |
//! ```
//!
//! Iterating one component walks a contiguous array. Removing an entity
//! moves the chunk's last slot into the hole (swap-back), so every chunk
//! stays dense.

use std::ops::Range;

use super::cache::ArchetypeId;
use super::chunk::{slot_range, Chunk, CHUNK_ALIGN, CHUNK_SIZE, ENTITY_ID_SIZE};
use super::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
use super::entity::Entity;

/// Signature of an archetype - which components it contains.
///
/// A sorted, duplicate-free list of component IDs, so `{A, B}` and `{B, A}`
/// compare and hash identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeSignature {
    /// Sorted list of component IDs.
    components: Vec<ComponentTypeId>,
}

impl ArchetypeSignature {
    /// Creates a signature from component IDs in any order.
    #[must_use]
    pub fn new(components: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        let mut components: Vec<ComponentTypeId> = components.into_iter().collect();
        components.sort_unstable();
        components.dedup();
        Self { components }
    }

    /// Checks if this signature contains a component type.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.components.binary_search(&id).is_ok()
    }

    /// Checks if this signature contains every listed component type.
    #[must_use]
    pub fn contains_all(&self, ids: &[ComponentTypeId]) -> bool {
        ids.iter().all(|&id| self.contains(id))
    }

    /// Returns a copy with `id` added.
    #[must_use]
    pub fn with(&self, id: ComponentTypeId) -> Self {
        let mut components = self.components.clone();
        if let Err(position) = components.binary_search(&id) {
            components.insert(position, id);
        }
        Self { components }
    }

    /// Returns a copy with `id` removed.
    #[must_use]
    pub fn without(&self, id: ComponentTypeId) -> Self {
        let mut components = self.components.clone();
        if let Ok(position) = components.binary_search(&id) {
            components.remove(position);
        }
        Self { components }
    }

    /// Returns the sorted component IDs.
    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[ComponentTypeId] {
        &self.components
    }

    /// Returns the number of component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Placement of one component array inside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnLayout {
    info: ComponentInfo,
    offset: usize,
}

impl ColumnLayout {
    /// Component type stored in this column.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ComponentTypeId {
        self.info.id()
    }

    /// Full type info of the column.
    #[inline]
    #[must_use]
    pub const fn info(&self) -> ComponentInfo {
        self.info
    }

    /// Byte offset of the array from the start of the chunk.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Size of one element in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.info.size()
    }

    /// Alignment of the array.
    #[inline]
    #[must_use]
    pub const fn align(&self) -> usize {
        self.info.align()
    }

    /// Byte range of slot `index` within the chunk.
    #[inline]
    #[must_use]
    pub fn slot(&self, index: usize) -> Range<usize> {
        slot_range(self.offset, self.info.size(), index)
    }
}

/// Memory layout shared by every chunk of one archetype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    /// Entities per chunk.
    capacity: usize,
    /// One column per component, in signature order.
    columns: Vec<ColumnLayout>,
    /// End offset of the last array.
    byte_len: usize,
    /// Alignment of each chunk allocation.
    block_align: usize,
}

#[inline]
fn align_up(offset: usize, align: usize) -> Option<usize> {
    Some(offset.checked_add(align - 1)? & !(align - 1))
}

impl ChunkLayout {
    /// Computes the layout for components given in signature order.
    ///
    /// Starts from an estimate of 90% of [`CHUNK_SIZE`] divided by the
    /// unpadded row size, shrinks until the padded layout fits, then grows
    /// while one more entity still fits. Capacity never drops below 1.
    ///
    /// # Panics
    ///
    /// Panics if a single entity of these components does not fit in the
    /// address space.
    #[must_use]
    pub fn compute(components: &[ComponentInfo]) -> Self {
        let row = components
            .iter()
            .fold(ENTITY_ID_SIZE, |row, info| row.saturating_add(info.size()));
        let mut capacity = (CHUNK_SIZE * 9 / 10 / row).max(1);

        while capacity > 1 && !Self::fits(components, capacity) {
            capacity -= 1;
        }
        while Self::fits(components, capacity + 1) {
            capacity += 1;
        }

        let mut columns = Vec::with_capacity(components.len());
        let Some(byte_len) = Self::place(components, capacity, |column| columns.push(column)) else {
            panic!("archetype layout exceeds the address space");
        };
        let block_align = components
            .iter()
            .map(ComponentInfo::align)
            .fold(CHUNK_ALIGN, usize::max);

        Self {
            capacity,
            columns,
            byte_len,
            block_align,
        }
    }

    /// Lays out every column at `capacity`, handing each to `visit`.
    ///
    /// Returns the end offset of the last array, or `None` on overflow.
    fn place(
        components: &[ComponentInfo],
        capacity: usize,
        mut visit: impl FnMut(ColumnLayout),
    ) -> Option<usize> {
        components
            .iter()
            .try_fold(ENTITY_ID_SIZE.checked_mul(capacity)?, |offset, &info| {
                let offset = align_up(offset, info.align())?;
                visit(ColumnLayout { info, offset });
                offset.checked_add(info.size().checked_mul(capacity)?)
            })
    }

    /// Total bytes used by the padded layout at `capacity`.
    fn end_offset(components: &[ComponentInfo], capacity: usize) -> Option<usize> {
        Self::place(components, capacity, |_| {})
    }

    fn fits(components: &[ComponentInfo], capacity: usize) -> bool {
        Self::end_offset(components, capacity).is_some_and(|end| end <= CHUNK_SIZE)
    }

    /// Entities per chunk.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// All columns, in signature order.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[ColumnLayout] {
        &self.columns
    }

    /// Column holding component `id`.
    #[inline]
    #[must_use]
    pub fn column(&self, id: ComponentTypeId) -> Option<&ColumnLayout> {
        self.columns
            .binary_search_by_key(&id, ColumnLayout::id)
            .ok()
            .map(|position| &self.columns[position])
    }

    /// Bytes used by the layout, padding included.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Checks if the layout fits the fixed chunk budget.
    #[inline]
    #[must_use]
    pub const fn fits_in_chunk(&self) -> bool {
        self.byte_len <= CHUNK_SIZE
    }

    /// Alignment of every chunk allocation: [`CHUNK_ALIGN`], raised to the
    /// strictest component alignment.
    #[inline]
    #[must_use]
    pub const fn block_align(&self) -> usize {
        self.block_align
    }
}

/// A single archetype - all entities with the same component set.
pub struct Archetype {
    /// Position in the owning cache.
    id: ArchetypeId,
    /// Signature identifying this archetype.
    signature: ArchetypeSignature,
    /// Layout shared by every chunk.
    layout: ChunkLayout,
    /// Chunks in allocation order.
    chunks: Vec<Chunk>,
    /// Chunk receiving new entities until it fills up.
    open: usize,
    /// Entities across all chunks.
    len: usize,
}

impl Archetype {
    /// Creates an empty archetype. `components` must be sorted by ID and
    /// duplicate-free.
    pub(crate) fn new(id: ArchetypeId, components: &[ComponentInfo]) -> Self {
        debug_assert!(components.windows(2).all(|pair| pair[0].id() < pair[1].id()));
        Self {
            id,
            signature: ArchetypeSignature::new(components.iter().map(ComponentInfo::id)),
            layout: ChunkLayout::compute(components),
            chunks: Vec::new(),
            open: 0,
            len: 0,
        }
    }

    /// Returns the ID of this archetype within its cache.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Returns the signature of this archetype.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    /// Returns the chunk layout.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Entities per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_capacity(&self) -> usize {
        self.layout.capacity
    }

    /// Returns the number of entities in this archetype.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns every chunk, including empty ones.
    #[inline]
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub(crate) fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    /// Checks if this archetype stores component `id`.
    #[inline]
    #[must_use]
    pub fn has_component(&self, id: ComponentTypeId) -> bool {
        self.signature.contains(id)
    }

    /// Checks if this archetype stores every listed component.
    #[inline]
    #[must_use]
    pub fn has_all_components(&self, ids: &[ComponentTypeId]) -> bool {
        self.signature.contains_all(ids)
    }

    /// Byte offset of component `id`'s array inside each chunk.
    #[inline]
    #[must_use]
    pub fn component_offset(&self, id: ComponentTypeId) -> Option<usize> {
        self.layout.column(id).map(ColumnLayout::offset)
    }

    /// Iterates the entities of every chunk, chunk by chunk, in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.entities().iter().copied())
    }

    /// Reads component `T` of the entity at (`chunk`, `index`).
    #[must_use]
    pub fn component<T: Component>(&self, chunk: usize, index: usize) -> Option<&T> {
        let column = self.layout.column(ComponentRegistry::find_id::<T>()?)?;
        let chunk = self.chunks.get(chunk)?;
        if index >= chunk.len() {
            return None;
        }
        bytemuck::try_from_bytes(&chunk.as_bytes()[column.slot(index)]).ok()
    }

    /// Mutable variant of [`Archetype::component`].
    pub fn component_mut<T: Component>(&mut self, chunk: usize, index: usize) -> Option<&mut T> {
        let column = *self.layout.column(ComponentRegistry::find_id::<T>()?)?;
        let chunk = self.chunks.get_mut(chunk)?;
        if index >= chunk.len() {
            return None;
        }
        bytemuck::try_from_bytes_mut(&mut chunk.as_bytes_mut()[column.slot(index)]).ok()
    }

    /// Appends `entity` to the open chunk.
    ///
    /// Once the open chunk is full, the first chunk with a free slot takes
    /// over, so chunks emptied by removals are refilled before a new chunk
    /// is allocated. Entities already stored never move.
    ///
    /// # Returns
    ///
    /// `(chunk index, index in chunk)`. Component bytes are left as found.
    pub(crate) fn allocate_slot(&mut self, entity: Entity) -> (usize, usize) {
        if self.chunks.get(self.open).map_or(true, Chunk::is_full) {
            self.open = match self.chunks.iter().position(|chunk| !chunk.is_full()) {
                Some(free) => free,
                None => {
                    self.chunks.push(Chunk::new(&self.layout));
                    self.chunks.len() - 1
                }
            };
        }
        let chunk_index = self.open;
        let index = self.chunks[chunk_index].push_entity(entity);
        self.len += 1;
        (chunk_index, index)
    }

    /// Removes slot `index` of chunk `chunk` by swap-back.
    ///
    /// # Returns
    ///
    /// The entity that was moved into `index`, or `None` if `index` was the
    /// last occupied slot.
    pub(crate) fn remove_slot(&mut self, chunk: usize, index: usize) -> Option<Entity> {
        let target = &mut self.chunks[chunk];
        let last = target.len() - 1;
        let moved = if index == last {
            None
        } else {
            let moved = target.entity_at(last);
            target.move_entity_data(&self.layout, last, index);
            moved
        };
        target.pop();
        self.len -= 1;
        moved
    }

    /// Overwrites component `id` of a slot with raw bytes.
    ///
    /// # Returns
    ///
    /// `false` if the archetype has no such component.
    pub(crate) fn write_component(
        &mut self,
        chunk: usize,
        index: usize,
        id: ComponentTypeId,
        bytes: &[u8],
    ) -> bool {
        let Some(column) = self.layout.column(id).copied() else {
            return false;
        };
        self.chunks[chunk].as_bytes_mut()[column.slot(index)].copy_from_slice(bytes);
        true
    }

    /// Zero-fills every component of a slot.
    pub(crate) fn zero_slot(&mut self, chunk: usize, index: usize) {
        let bytes = self.chunks[chunk].as_bytes_mut();
        for column in &self.layout.columns {
            bytes[column.slot(index)].fill(0);
        }
    }

    /// Zero-fills component `id` of a slot.
    pub(crate) fn scrub_component(&mut self, chunk: usize, index: usize, id: ComponentTypeId) {
        if let Some(column) = self.layout.column(id).copied() {
            self.chunks[chunk].as_bytes_mut()[column.slot(index)].fill(0);
        }
    }

    /// Copies every component shared with `source` from its slot into a
    /// slot of this archetype, byte for byte.
    pub(crate) fn copy_shared_from(
        &mut self,
        (chunk, index): (usize, usize),
        source: &Archetype,
        (src_chunk, src_index): (usize, usize),
    ) {
        let from = source.chunks[src_chunk].as_bytes();
        let to = self.chunks[chunk].as_bytes_mut();
        for column in &self.layout.columns {
            if let Some(src_column) = source.layout.column(column.id()) {
                to[column.slot(index)].copy_from_slice(&from[src_column.slot(src_index)]);
            }
        }
    }

    /// Forgets every entity while keeping the chunks for reuse.
    pub(crate) fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.clear();
        }
        self.open = 0;
        self.len = 0;
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .field("capacity", &self.layout.capacity)
            .field("chunks", &self.chunks.len())
            .field("open", &self.open)
            .field("len", &self.len)
            .finish()
    }
}
