//! # Component Bundles
//!
//! A bundle is a tuple of component values written into a fresh slot in one
//! step, so an entity is created directly in its final archetype instead of
//! migrating once per component.

use super::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};

/// A statically known set of component values.
///
/// Implemented for `()` and for tuples of up to eight components.
pub trait Bundle: Send + Sync + 'static {
    /// Type infos of every component in the bundle, in tuple order.
    fn component_infos() -> Vec<ComponentInfo>;

    /// Hands each component's bytes to `write`, in tuple order.
    fn write_components(&self, write: &mut dyn FnMut(ComponentTypeId, &[u8]));
}

impl Bundle for () {
    fn component_infos() -> Vec<ComponentInfo> {
        Vec::new()
    }

    fn write_components(&self, _write: &mut dyn FnMut(ComponentTypeId, &[u8])) {}
}

macro_rules! impl_bundle {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            fn component_infos() -> Vec<ComponentInfo> {
                vec![$(ComponentInfo::of::<$name>()),+]
            }

            #[allow(non_snake_case)]
            fn write_components(&self, write: &mut dyn FnMut(ComponentTypeId, &[u8])) {
                let ($($name,)+) = self;
                $(write(ComponentRegistry::id_of::<$name>(), bytemuck::bytes_of($name));)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
