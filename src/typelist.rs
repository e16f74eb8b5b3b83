//! An ordered, compile-time list of component kinds.
//!
//! The list itself is a type (`Cons`/`Nil`, spelled with [`kinds!`](crate::kinds)),
//! so membership and position are resolved by the compiler: [`IndexOf`]
//! yields a kind's declaration position as a constant, and mentioning a
//! kind that is not in the list fails to compile.

use crate::component::{Component, KindInfo};
use smallvec::SmallVec;
use std::marker::PhantomData;

/// The empty kind list.
pub struct Nil;

/// A kind list with head `H` and tail `T`.
pub struct Cons<H, T>(PhantomData<(H, T)>);

/// Position marker: the head of the list.
pub struct Here;

/// Position marker: somewhere in the tail.
pub struct There<I>(PhantomData<I>);

/// Compile-time position of `T` within a kind list.
///
/// The marker parameter `I` is inferred; a kind absent from the list has no
/// valid marker, so the lookup is total over the declared set.
pub trait IndexOf<T, I> {
    const INDEX: usize;
}

impl<T, Tail> IndexOf<T, Here> for Cons<T, Tail> {
    const INDEX: usize = 0;
}

impl<T, Head, Tail, I> IndexOf<T, There<I>> for Cons<Head, Tail>
where
    Tail: IndexOf<T, I>,
{
    const INDEX: usize = 1 + <Tail as IndexOf<T, I>>::INDEX;
}

/// Compile-time membership test over a kind list.
pub trait Contains<T, I> {}

impl<L, T, I> Contains<T, I> for L where L: IndexOf<T, I> {}

/// Position of `T` in the list `L`, resolved at compile time.
pub const fn index_of<L, T, I>() -> usize
where
    L: IndexOf<T, I>,
{
    <L as IndexOf<T, I>>::INDEX
}

/// Inline capacity of collected kind tables.
pub(crate) const INLINE_KINDS: usize = 8;

/// An ordered list of component kinds walkable at runtime.
pub trait KindList: 'static {
    const LEN: usize;

    /// Appends one [`KindInfo`] per element, in declaration order.
    fn collect(out: &mut SmallVec<[KindInfo; INLINE_KINDS]>);
}

impl KindList for Nil {
    const LEN: usize = 0;

    fn collect(_: &mut SmallVec<[KindInfo; INLINE_KINDS]>) {}
}

impl<H: Component, T: KindList> KindList for Cons<H, T> {
    const LEN: usize = 1 + T::LEN;

    fn collect(out: &mut SmallVec<[KindInfo; INLINE_KINDS]>) {
        out.push(KindInfo::of::<H>());
        T::collect(out);
    }
}

/// Spells an ordered kind list: `kinds![Position, Velocity]`.
#[macro_export]
macro_rules! kinds {
    () => { $crate::typelist::Nil };
    ($head:ty $(, $tail:ty)* $(,)?) => {
        $crate::typelist::Cons<$head, $crate::kinds!($($tail),*)>
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_declaration_position() {
        type List = kinds![u8, u16, u32];

        assert_eq!(index_of::<List, u8, _>(), 0);
        assert_eq!(index_of::<List, u16, _>(), 1);
        assert_eq!(index_of::<List, u32, _>(), 2);
    }

    #[test]
    fn collect_preserves_order() {
        type List = kinds![u8, [u8; 3]];

        let mut infos = SmallVec::new();
        List::collect(&mut infos);

        assert_eq!(List::LEN, 2);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].size, 1);
        assert_eq!(infos[1].size, 3);
    }
}
