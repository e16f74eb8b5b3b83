use crate::component::{Component, KindInfo};
use crate::mask::Mask;
use crate::typelist::{IndexOf, KindList, INLINE_KINDS};
use smallvec::SmallVec;
use std::any::{type_name, TypeId};
use std::marker::PhantomData;

/// Assigns each component kind a dense ordinal and records its layout.
///
/// The two flavors, [`StaticRegistry`] and [`DynamicRegistry`], share this
/// contract; a [`World`](crate::World) works with either.
pub trait Registry: Default {
    /// Upper bound on assignable ordinals. At most [`Mask::MAX_BITS`].
    const MAX_KINDS: usize;

    /// Returns the dense ordinal of `T`, assigning one on first mention
    /// where the flavor allows it.
    ///
    /// Panics when assigning would exceed `MAX_KINDS`, or when a static
    /// registry is asked about a kind outside its declared list.
    fn ordinal_of<T: Component>(&mut self) -> usize;

    /// Returns the ordinal of `T` if the kind is already known; never
    /// assigns.
    fn lookup<T: Component>(&self) -> Option<usize>;

    /// Byte size of the kind with the given ordinal.
    /// Panics for ordinals not yet assigned.
    fn size_of(&self, ordinal: usize) -> usize;

    /// Alignment of the kind with the given ordinal.
    /// Panics for ordinals not yet assigned.
    fn align_of(&self, ordinal: usize) -> usize;

    /// Number of assigned ordinals.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cold]
#[inline(never)]
fn registry_full(max: usize) -> ! {
    panic!("registry is full: cannot assign an ordinal beyond the maximum of {max} kinds");
}

#[cold]
#[inline(never)]
fn unknown_kind(name: &str) -> ! {
    panic!("component kind `{name}` is not part of this registry's declared set");
}

/// A registry over a fixed, compile-time list of kinds.
///
/// Ordinals are declaration positions in the list, so they are known at
/// compile time; [`StaticRegistry::ordinal`] exposes them as constants.
pub struct StaticRegistry<L: KindList> {
    entries: SmallVec<[KindInfo; INLINE_KINDS]>,
    _list: PhantomData<L>,
}

impl<L: KindList> Default for StaticRegistry<L> {
    fn default() -> Self {
        let mut entries = SmallVec::new();
        L::collect(&mut entries);
        StaticRegistry {
            entries,
            _list: PhantomData,
        }
    }
}

impl<L: KindList> StaticRegistry<L> {
    /// Compile-time ordinal of `T`, total over the declared list. A kind
    /// outside the list fails to compile.
    pub const fn ordinal<T, I>() -> usize
    where
        L: IndexOf<T, I>,
    {
        <L as IndexOf<T, I>>::INDEX
    }
}

impl<L: KindList> Registry for StaticRegistry<L> {
    const MAX_KINDS: usize = L::LEN;

    fn ordinal_of<T: Component>(&mut self) -> usize {
        match self.lookup::<T>() {
            Some(ordinal) => ordinal,
            None => unknown_kind(type_name::<T>()),
        }
    }

    fn lookup<T: Component>(&self) -> Option<usize> {
        let key = TypeId::of::<T>();
        self.entries.iter().position(|e| e.type_id == key)
    }

    fn size_of(&self, ordinal: usize) -> usize {
        self.entries[ordinal].size
    }

    fn align_of(&self, ordinal: usize) -> usize {
        self.entries[ordinal].align
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A registry that assigns ordinals in first-mention order, up to `N`
/// kinds.
///
/// The entry table is inline (no heap allocation) and lookup is linear;
/// `N` is small.
pub struct DynamicRegistry<const N: usize> {
    entries: SmallVec<[KindInfo; N]>,
}

impl<const N: usize> Default for DynamicRegistry<N> {
    fn default() -> Self {
        DynamicRegistry {
            entries: SmallVec::new(),
        }
    }
}

impl<const N: usize> Registry for DynamicRegistry<N> {
    const MAX_KINDS: usize = N;

    fn ordinal_of<T: Component>(&mut self) -> usize {
        if let Some(ordinal) = self.lookup::<T>() {
            return ordinal;
        }
        if self.entries.len() == N {
            registry_full(N);
        }
        self.entries.push(KindInfo::of::<T>());
        self.entries.len() - 1
    }

    fn lookup<T: Component>(&self) -> Option<usize> {
        let key = TypeId::of::<T>();
        self.entries.iter().position(|e| e.type_id == key)
    }

    fn size_of(&self, ordinal: usize) -> usize {
        self.entries[ordinal].size
    }

    fn align_of(&self, ordinal: usize) -> usize {
        self.entries[ordinal].align
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Byte offset of `ordinal` within a row laid out for `mask`: the sum of
/// the sizes of all lower member ordinals.
pub(crate) fn offset_in<R: Registry>(registry: &R, mask: Mask, ordinal: usize) -> usize {
    debug_assert!(mask.contains(ordinal));
    mask.iter_ordinals()
        .take_while(|&i| i < ordinal)
        .map(|i| registry.size_of(i))
        .sum()
}

/// Row width of `mask`: the sum of its member sizes.
pub(crate) fn row_width<R: Registry>(registry: &R, mask: Mask) -> usize {
    mask.iter_ordinals().map(|i| registry.size_of(i)).sum()
}

/// Strictest member alignment of `mask`.
pub(crate) fn row_align<R: Registry>(registry: &R, mask: Mask) -> usize {
    mask.iter_ordinals()
        .map(|i| registry.align_of(i))
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds;

    #[test]
    fn dynamic_assigns_in_mention_order() {
        let mut registry = DynamicRegistry::<4>::default();

        assert_eq!(registry.ordinal_of::<u32>(), 0);
        assert_eq!(registry.ordinal_of::<[u32; 2]>(), 1);
        assert_eq!(registry.ordinal_of::<u32>(), 0);

        assert_eq!(registry.lookup::<u32>(), Some(0));
        assert_eq!(registry.lookup::<u64>(), None);
        assert_eq!(registry.size_of(1), 8);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    #[should_panic(expected = "registry is full")]
    fn dynamic_rejects_overflow() {
        let mut registry = DynamicRegistry::<2>::default();
        registry.ordinal_of::<u8>();
        registry.ordinal_of::<u16>();
        registry.ordinal_of::<u32>();
    }

    #[test]
    fn static_ordinals_are_positions() {
        type List = kinds![u8, u16, u32];
        let mut registry = StaticRegistry::<List>::default();

        assert_eq!(StaticRegistry::<List>::ordinal::<u16, _>(), 1);
        assert_eq!(registry.ordinal_of::<u16>(), 1);
        assert_eq!(registry.lookup::<u32>(), Some(2));
        assert_eq!(StaticRegistry::<List>::MAX_KINDS, 3);
    }

    #[test]
    #[should_panic(expected = "not part of this registry")]
    fn static_rejects_undeclared_kind() {
        let mut registry = StaticRegistry::<kinds![u8]>::default();
        registry.ordinal_of::<u64>();
    }

    #[test]
    fn canonical_offsets() {
        let mut registry = DynamicRegistry::<4>::default();
        registry.ordinal_of::<u32>();
        registry.ordinal_of::<[u32; 2]>();
        registry.ordinal_of::<[u32; 4]>();

        let mask = Mask::EMPTY.with(0).with(1).with(2);
        assert_eq!(offset_in(&registry, mask, 0), 0);
        assert_eq!(offset_in(&registry, mask, 1), 4);
        assert_eq!(offset_in(&registry, mask, 2), 12);
        assert_eq!(row_width(&registry, mask), 28);

        // A sparse mask skips absent ordinals in the sums.
        let sparse = Mask::EMPTY.with(0).with(2);
        assert_eq!(offset_in(&registry, sparse, 2), 4);
        assert_eq!(row_width(&registry, sparse), 20);
    }
}
