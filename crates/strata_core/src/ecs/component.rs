//! # Component System
//!
//! Components are pure data containers with no behavior.
//! They must be `Pod` so that chunks can move them as raw bytes.
//!
//! Every component type receives a [`ComponentTypeId`] from the process-wide
//! [`ComponentRegistry`] on first use. IDs are plain integers, only ever
//! compared, so the registry needs no teardown.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use bytemuck::Pod;
use parking_lot::RwLock;

use super::chunk::CHUNK_SIZE;
use crate::error::{StoreError, StoreResult};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Pod`: Plain old data, bitwise copyable, no destructor
/// - `Default`: Value written when an entity is created without one
/// - `Send + Sync`: Stores may be handed between threads
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: Pod + Default + Send + Sync + 'static {}

/// Largest component size accepted by the registry.
///
/// Leaves room for one entity ID and padding so a layout holding one such
/// component cannot overflow.
pub const MAX_COMPONENT_SIZE: usize = isize::MAX as usize - CHUNK_SIZE;

/// Stable numeric identifier of a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    /// Returns the raw ID.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Byte shape of a component type: ID, size and alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    id: ComponentTypeId,
    size: usize,
    align: usize,
    name: &'static str,
}

impl ComponentInfo {
    /// Returns the info for a Rust component type, registering it if needed.
    #[inline]
    #[must_use]
    pub fn of<T: Component>() -> Self {
        ComponentRegistry::info_of::<T>()
    }

    /// Validates a raw `(size, align)` shape.
    fn checked(
        id: ComponentTypeId,
        size: usize,
        align: usize,
        name: &'static str,
    ) -> StoreResult<Self> {
        if !align.is_power_of_two() {
            return Err(StoreError::InvalidAlignment { align });
        }
        if size > MAX_COMPONENT_SIZE {
            return Err(StoreError::ComponentTooLarge {
                size,
                max: MAX_COMPONENT_SIZE,
            });
        }
        if size % align != 0 {
            return Err(StoreError::UnpaddedSize { size, align });
        }
        Ok(Self {
            id,
            size,
            align,
            name,
        })
    }

    /// Component type ID.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ComponentTypeId {
        self.id
    }

    /// Size of one value in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Alignment requirement in bytes.
    #[inline]
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Type name, for diagnostics.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Default)]
struct RegistryState {
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_id: Vec<ComponentInfo>,
}

impl RegistryState {
    fn next_id(&self) -> ComponentTypeId {
        match u32::try_from(self.by_id.len()) {
            Ok(raw) => ComponentTypeId(raw),
            Err(_) => panic!("component type id space exhausted"),
        }
    }
}

static REGISTRY: OnceLock<RwLock<RegistryState>> = OnceLock::new();

/// Process-wide map from component type to [`ComponentTypeId`].
///
/// IDs start at 0 and increase by one per registration. The first lookup of
/// a type registers it; later lookups return the cached ID.
pub struct ComponentRegistry;

impl ComponentRegistry {
    fn state() -> &'static RwLock<RegistryState> {
        REGISTRY.get_or_init(|| RwLock::new(RegistryState::default()))
    }

    /// Returns the ID of `T`, registering it on first use.
    #[inline]
    #[must_use]
    pub fn id_of<T: Component>() -> ComponentTypeId {
        Self::info_of::<T>().id
    }

    /// Returns the ID of `T` if it was registered, without registering it.
    #[must_use]
    pub fn find_id<T: Component>() -> Option<ComponentTypeId> {
        Self::state().read().by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the full info of `T`, registering it on first use.
    ///
    /// # Panics
    ///
    /// Panics if `T` is larger than [`MAX_COMPONENT_SIZE`].
    #[must_use]
    pub fn info_of<T: Component>() -> ComponentInfo {
        let type_id = TypeId::of::<T>();
        {
            let state = Self::state().read();
            if let Some(id) = state.by_type.get(&type_id) {
                return state.by_id[id.0 as usize];
            }
        }

        let mut state = Self::state().write();
        // Another thread may have won the race between the two locks.
        if let Some(id) = state.by_type.get(&type_id) {
            return state.by_id[id.0 as usize];
        }

        let name = std::any::type_name::<T>();
        let info = match ComponentInfo::checked(
            state.next_id(),
            std::mem::size_of::<T>(),
            std::mem::align_of::<T>(),
            name,
        ) {
            Ok(info) => info,
            Err(err) => panic!("cannot register component {name}: {err}"),
        };

        state.by_type.insert(type_id, info.id);
        state.by_id.push(info);
        tracing::debug!(
            component = name,
            id = info.id.0,
            size = info.size,
            align = info.align,
            "registered component type"
        );
        info
    }

    /// Registers a component described only by its byte shape.
    ///
    /// Every call issues a fresh ID, even for an identical shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the alignment is not a power of two, the size
    /// exceeds [`MAX_COMPONENT_SIZE`] or is not a multiple of the alignment.
    pub fn register_raw(name: &'static str, size: usize, align: usize) -> StoreResult<ComponentInfo> {
        let mut state = Self::state().write();
        let info = ComponentInfo::checked(state.next_id(), size, align, name)?;
        state.by_id.push(info);
        tracing::debug!(component = name, id = info.id.0, size, align, "registered raw component");
        Ok(info)
    }

    /// Returns the info registered under `id`.
    #[must_use]
    pub fn info(id: ComponentTypeId) -> Option<ComponentInfo> {
        Self::state().read().by_id.get(id.0 as usize).copied()
    }

    /// Returns the type name registered under `id`.
    #[must_use]
    pub fn name_of(id: ComponentTypeId) -> Option<&'static str> {
        Self::info(id).map(|info| info.name)
    }

    /// Returns the size of `T` in bytes.
    #[inline]
    #[must_use]
    pub fn size_of<T: Component>() -> usize {
        Self::info_of::<T>().size
    }

    /// Returns the alignment of `T` in bytes.
    #[inline]
    #[must_use]
    pub fn align_of<T: Component>() -> usize {
        Self::info_of::<T>().align
    }

    /// Returns how many component types have been registered so far.
    #[must_use]
    pub fn registered_count() -> usize {
        Self::state().read().by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Mass {
        kg: f32,
    }
    impl Component for Mass {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Wide {
        lanes: [f64; 4],
    }
    impl Component for Wide {}

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Unseen {
        value: u16,
    }
    impl Component for Unseen {}

    #[test]
    fn test_id_is_cached() {
        let first = ComponentRegistry::id_of::<Mass>();
        let second = ComponentRegistry::id_of::<Mass>();
        assert_eq!(first, second);
        assert_eq!(ComponentInfo::of::<Mass>().id(), first);
    }

    #[test]
    fn test_ids_are_distinct_and_increasing() {
        let mass = ComponentRegistry::id_of::<Mass>();
        let wide = ComponentRegistry::id_of::<Wide>();
        assert_ne!(mass, wide);

        let raw = ComponentRegistry::register_raw("later", 4, 4).unwrap();
        assert!(raw.id() > mass);
        assert!(raw.id() > wide);
    }

    #[test]
    fn test_size_and_align() {
        assert_eq!(ComponentRegistry::size_of::<Mass>(), 4);
        assert_eq!(ComponentRegistry::align_of::<Mass>(), 4);
        assert_eq!(ComponentRegistry::size_of::<Wide>(), 32);
        assert_eq!(ComponentRegistry::align_of::<Wide>(), 8);

        let info = ComponentRegistry::info(ComponentRegistry::id_of::<Wide>()).unwrap();
        assert!(info.name().ends_with("Wide"));
        assert_eq!(bytemuck::bytes_of(&Mass { kg: 0.0 }).len(), 4);
        assert_eq!(Wide { lanes: [0.0; 4] }, Wide::default());
    }

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C, align(128))]
    struct CacheLine {
        bytes: [u8; 128],
    }
    impl Component for CacheLine {}

    impl Default for CacheLine {
        fn default() -> Self {
            Self { bytes: [0; 128] }
        }
    }

    #[test]
    fn test_over_aligned_type_registers() {
        let info = ComponentInfo::of::<CacheLine>();
        assert_eq!(info.align(), 128);
        assert_eq!(info.size(), 128);
        assert_eq!(ComponentRegistry::id_of::<CacheLine>(), info.id());
        assert_eq!(CacheLine { bytes: [0; 128] }, CacheLine::default());
    }

    #[test]
    fn test_find_does_not_register() {
        assert!(ComponentRegistry::find_id::<Unseen>().is_none());
        let id = ComponentRegistry::id_of::<Unseen>();
        assert_eq!(ComponentRegistry::find_id::<Unseen>(), Some(id));
        assert_eq!(id.to_string(), format!("#{}", id.get()));
        assert_eq!(Unseen { value: 0 }, Unseen::default());
    }

    #[test]
    fn test_raw_registration_validates_shape() {
        assert_eq!(
            ComponentRegistry::register_raw("odd", 4, 3),
            Err(StoreError::InvalidAlignment { align: 3 })
        );
        assert_eq!(
            ComponentRegistry::register_raw("vast", usize::MAX - 7, 8),
            Err(StoreError::ComponentTooLarge {
                size: usize::MAX - 7,
                max: MAX_COMPONENT_SIZE,
            })
        );
        assert_eq!(
            ComponentRegistry::register_raw("short", 6, 4),
            Err(StoreError::UnpaddedSize { size: 6, align: 4 })
        );

        let tag = ComponentRegistry::register_raw("tag", 0, 1).unwrap();
        assert_eq!(tag.size(), 0);
        assert_eq!(ComponentRegistry::name_of(tag.id()), Some("tag"));
        assert!(ComponentRegistry::registered_count() > tag.id().get() as usize);
    }
}
