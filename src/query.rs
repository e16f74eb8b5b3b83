use crate::archetype::Archetype;
use crate::bundle::duplicate_kind;
use crate::component::Component;
use crate::hive::{RowPtrs, Rows};
use crate::mask::Mask;
use crate::registry::{offset_in, Registry};
use smallvec::SmallVec;
use std::any::type_name;
use std::marker::PhantomData;
use std::slice;

/// A set of component kinds requested from a query or an entity lookup.
///
/// Implemented for tuples of up to eight kinds; `Refs`/`RefsMut` are the
/// matching tuples of references.
pub trait ComponentTuple {
    type Refs<'a>;
    type RefsMut<'a>;

    /// The requested set, or `None` when some kind was never registered.
    /// Panics if a kind repeats: the mutable path would alias.
    fn mask<R: Registry>(registry: &R) -> Option<Mask>;

    /// Column offsets of the requested kinds within a row of
    /// `archetype_mask`, in tuple order. Computed once per archetype, not
    /// per row.
    fn offsets<R: Registry>(registry: &R, archetype_mask: Mask) -> SmallVec<[usize; 8]>;

    /// Builds the reference tuple over one row.
    ///
    /// # Safety
    /// `row` must point to a live row of an archetype whose mask is a
    /// superset of the requested set, `offsets` must come from
    /// [`offsets`](Self::offsets) for that archetype, and the row must stay
    /// unaliased by writers for `'a`.
    unsafe fn refs<'a>(row: *const u8, offsets: &[usize]) -> Self::Refs<'a>;

    /// Mutable counterpart of [`refs`](Self::refs).
    ///
    /// # Safety
    /// As for `refs`, and additionally no other reference into the row may
    /// exist for `'a`.
    unsafe fn refs_mut<'a>(row: *mut u8, offsets: &[usize]) -> Self::RefsMut<'a>;
}

macro_rules! impl_component_tuple {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentTuple for ($($t,)+) {
            type Refs<'a> = ($(&'a $t,)+);
            type RefsMut<'a> = ($(&'a mut $t,)+);

            fn mask<R: Registry>(registry: &R) -> Option<Mask> {
                let mut mask = Mask::EMPTY;
                $(
                    let ordinal = registry.lookup::<$t>()?;
                    if mask.contains(ordinal) {
                        duplicate_kind(type_name::<$t>());
                    }
                    mask = mask.with(ordinal);
                )+
                Some(mask)
            }

            fn offsets<R: Registry>(registry: &R, archetype_mask: Mask) -> SmallVec<[usize; 8]> {
                let mut out = SmallVec::new();
                $(
                    // Kinds of a matched set are always registered.
                    let ordinal = registry.lookup::<$t>().unwrap();
                    out.push(offset_in(registry, archetype_mask, ordinal));
                )+
                out
            }

            #[allow(non_snake_case)]
            unsafe fn refs<'a>(row: *const u8, offsets: &[usize]) -> Self::Refs<'a> {
                let &[$($t),+] = offsets else { unreachable!() };
                ($(&*(row.add($t) as *const $t),)+)
            }

            #[allow(non_snake_case)]
            unsafe fn refs_mut<'a>(row: *mut u8, offsets: &[usize]) -> Self::RefsMut<'a> {
                let &[$($t),+] = offsets else { unreachable!() };
                ($(&mut *(row.add($t) as *mut $t),)+)
            }
        }
    };
}

impl_component_tuple!(A);
impl_component_tuple!(A, B);
impl_component_tuple!(A, B, C);
impl_component_tuple!(A, B, C, D);
impl_component_tuple!(A, B, C, D, E);
impl_component_tuple!(A, B, C, D, E, F);
impl_component_tuple!(A, B, C, D, E, F, G);
impl_component_tuple!(A, B, C, D, E, F, G, H);

/// An iterator over every entity whose archetype holds all requested
/// kinds, yielding tuples of shared references.
///
/// Archetypes are visited in world creation order; rows within one
/// archetype in chunk-then-slot order, each live row exactly once.
/// Constructed by [`World::query`](crate::World::query).
pub struct Query<'w, R: Registry, Q: ComponentTuple> {
    registry: &'w R,
    archetypes: slice::Iter<'w, Archetype>,
    requested: Mask,
    rows: Option<Rows<'w>>,
    offsets: SmallVec<[usize; 8]>,
    _q: PhantomData<Q>,
}

impl<'w, R: Registry, Q: ComponentTuple> Query<'w, R, Q> {
    pub(crate) fn new(
        registry: &'w R,
        archetypes: &'w [Archetype],
        requested: Option<Mask>,
    ) -> Self {
        // An unregistered kind matches no archetype.
        let (archetypes, requested) = match requested {
            Some(mask) => (archetypes, mask),
            None => (&[][..], Mask::EMPTY),
        };
        Query {
            registry,
            archetypes: archetypes.iter(),
            requested,
            rows: None,
            offsets: SmallVec::new(),
            _q: PhantomData,
        }
    }
}

impl<'w, R: Registry, Q: ComponentTuple> Iterator for Query<'w, R, Q> {
    type Item = Q::Refs<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rows) = &mut self.rows {
                if let Some(row) = rows.next() {
                    // Safety: the row is live and the offsets were computed
                    // for its archetype; the world stays borrowed for 'w.
                    return Some(unsafe { Q::refs(row.as_ptr(), &self.offsets) });
                }
            }
            let archetype = self
                .archetypes
                .find(|a| a.mask().is_superset_of(self.requested))?;
            self.offsets = Q::offsets(self.registry, archetype.mask());
            self.rows = Some(archetype.iter());
        }
    }
}

/// The mutable counterpart of [`Query`], yielding tuples of mutable
/// references. Writes through them are persistent and visible to any later
/// query or lookup.
///
/// Constructed by [`World::query_mut`](crate::World::query_mut); the world
/// stays exclusively borrowed while the iterator lives, so structural
/// mutation mid-iteration does not compile.
pub struct QueryMut<'w, R: Registry, Q: ComponentTuple> {
    registry: &'w R,
    archetypes: slice::Iter<'w, Archetype>,
    requested: Mask,
    rows: Option<RowPtrs<'w>>,
    offsets: SmallVec<[usize; 8]>,
    _q: PhantomData<Q>,
}

impl<'w, R: Registry, Q: ComponentTuple> QueryMut<'w, R, Q> {
    pub(crate) fn new(
        registry: &'w R,
        archetypes: &'w [Archetype],
        requested: Option<Mask>,
    ) -> Self {
        let (archetypes, requested) = match requested {
            Some(mask) => (archetypes, mask),
            None => (&[][..], Mask::EMPTY),
        };
        QueryMut {
            registry,
            archetypes: archetypes.iter(),
            requested,
            rows: None,
            offsets: SmallVec::new(),
            _q: PhantomData,
        }
    }
}

impl<'w, R: Registry, Q: ComponentTuple> Iterator for QueryMut<'w, R, Q> {
    type Item = Q::RefsMut<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rows) = &mut self.rows {
                if let Some(row) = rows.next() {
                    // Safety: the query was built from the world's unique
                    // borrow, every live row is visited exactly once, and
                    // kinds within one tuple are distinct, so the yielded
                    // references never alias.
                    return Some(unsafe { Q::refs_mut(row.as_ptr(), &self.offsets) });
                }
            }
            let archetype = self
                .archetypes
                .find(|a| a.mask().is_superset_of(self.requested))?;
            self.offsets = Q::offsets(self.registry, archetype.mask());
            self.rows = Some(archetype.row_ptrs());
        }
    }
}
