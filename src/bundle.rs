use crate::component::Component;
use crate::mask::Mask;
use crate::registry::{offset_in, Registry};
use std::any::type_name;
use std::{mem, ptr};

/// A set of component values inserted together as one entity.
///
/// Implemented for tuples of up to eight [`Component`] values. The order of
/// values within the tuple is immaterial: each value is scattered to its
/// canonical offset independently, so `(a, b)` and `(b, a)` produce
/// identical rows.
pub trait Bundle {
    /// Assigns ordinals for every kind in the bundle and returns their set.
    /// Panics if a kind repeats within the bundle.
    fn mask<R: Registry>(registry: &mut R) -> Mask;

    /// Copies each value to its canonical offset within `row`.
    fn write_row<R: Registry>(self, registry: &R, mask: Mask, row: &mut [u8]);
}

#[cold]
#[inline(never)]
pub(crate) fn duplicate_kind(name: &str) -> ! {
    panic!("component kind `{name}` appears more than once in the requested set");
}

macro_rules! impl_bundle {
    ($($t:ident),+) => {
        impl<$($t: Component),+> Bundle for ($($t,)+) {
            fn mask<R: Registry>(registry: &mut R) -> Mask {
                let mut mask = Mask::EMPTY;
                $(
                    let ordinal = registry.ordinal_of::<$t>();
                    if mask.contains(ordinal) {
                        duplicate_kind(type_name::<$t>());
                    }
                    mask = mask.with(ordinal);
                )+
                mask
            }

            #[allow(non_snake_case)]
            fn write_row<R: Registry>(self, registry: &R, mask: Mask, row: &mut [u8]) {
                let ($($t,)+) = self;
                $(
                    // The kind got its ordinal while the mask was built.
                    let ordinal = registry.lookup::<$t>().unwrap();
                    let offset = offset_in(registry, mask, ordinal);
                    // Safety: `row` spans the full row width, so the kind's
                    // canonical column lies within it. Kinds are `Copy`, so
                    // a byte copy moves the value.
                    unsafe {
                        ptr::copy_nonoverlapping(
                            &$t as *const $t as *const u8,
                            row.as_mut_ptr().add(offset),
                            mem::size_of::<$t>(),
                        );
                    }
                )+
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
