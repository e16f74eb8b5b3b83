use std::any::TypeId;
use std::mem;

/// A component kind carried by entities.
///
/// Kinds are plain data: no destructors, moved by byte copy. The `Copy`
/// bound is what enforces that, so any `Copy + Send + Sync + 'static` type
/// is a kind automatically.
pub trait Component: Copy + Send + Sync + 'static {}

impl<T> Component for T where T: Copy + Send + Sync + 'static {}

/// Layout record of a registered component kind.
#[derive(Copy, Clone)]
pub struct KindInfo {
    pub type_id: TypeId,
    pub size: usize,
    pub align: usize,
}

impl KindInfo {
    pub fn of<T: Component>() -> KindInfo {
        KindInfo {
            type_id: TypeId::of::<T>(),
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
        }
    }
}
