use crate::archetype::Archetype;
use crate::bundle::Bundle;
use crate::entity::{Entity, EntityParts};
use crate::hive;
use crate::mask::Mask;
use crate::query::{ComponentTuple, Query, QueryMut};
use crate::registry::{offset_in, row_align, row_width, DynamicRegistry, Registry, StaticRegistry};
use crate::HashMap;
use smallvec::{smallvec, SmallVec};
use std::collections::hash_map;

/// The shipped dynamic-registry configuration: up to eight component kinds,
/// assigned ordinals on first mention.
pub type DynamicWorld = World<DynamicRegistry<8>>;

/// A world over a compile-time kind list: `StaticWorld<kinds![Pos, Vel]>`.
pub type StaticWorld<L> = World<StaticRegistry<L>>;

/// A container of entities, partitioned into archetypes by component set.
///
/// The world owns its registry and an append-only vector of archetypes;
/// at most one archetype exists per distinct mask, and archetype ordinals
/// never change once assigned.
pub struct World<R: Registry> {
    registry: R,
    archetypes: Vec<Archetype>,
    archetypes_by_mask: HashMap<Mask, usize>,
}

#[cold]
#[inline(never)]
fn invalid_handle(entity: Entity) -> ! {
    panic!("invalid entity handle {entity:?}: archetype or row out of range, or the entity was removed");
}

#[cold]
#[inline(never)]
fn missing_components() -> ! {
    panic!("the entity's archetype is missing some of the requested component kinds");
}

#[cold]
#[inline(never)]
fn misaligned_layout(mask: Mask) -> ! {
    panic!("canonical row layout for {mask:?} would misalign a member kind");
}

/// The canonical layout packs members back to back; component sets whose
/// members would end up misaligned are rejected, since references into
/// rows must be aligned.
fn check_layout<R: Registry>(registry: &R, mask: Mask, width: usize) {
    let stride = hive::slot_stride(width);
    for ordinal in mask.iter_ordinals() {
        let align = registry.align_of(ordinal);
        let offset = offset_in(registry, mask, ordinal);
        if offset % align != 0 || stride % align != 0 {
            misaligned_layout(mask);
        }
    }
}

impl<R: Registry> World<R> {
    /// Creates an empty world.
    pub fn new() -> World<R> {
        assert!(
            R::MAX_KINDS <= Mask::MAX_BITS,
            "a registry may hold at most {} kinds",
            Mask::MAX_BITS
        );
        World {
            registry: R::default(),
            archetypes: Vec::new(),
            archetypes_by_mask: Default::default(),
        }
    }

    /// The world's registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// All archetypes, in creation order. Ordinals are positions in this
    /// slice.
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// Number of distinct component sets seen so far.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Number of entities in the world.
    pub fn len(&self) -> usize {
        self.archetypes.iter().fold(0, |acc, arch| acc + arch.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a new entity from a tuple of component values and returns
    /// its handle.
    ///
    /// The archetype for the tuple's component set is created on first
    /// use. Value order within the tuple does not matter: each value lands
    /// at its canonical offset, so `insert((a, b))` and `insert((b, a))`
    /// produce identical rows.
    ///
    /// Panics if assigning an ordinal would overflow the registry, or if a
    /// kind repeats within the tuple.
    pub fn insert<B: Bundle>(&mut self, bundle: B) -> Entity {
        let mask = B::mask(&mut self.registry);
        let archetype_ordinal = self.archetype_ordinal(mask);

        let width = self.archetypes[archetype_ordinal].row_stride();
        let mut row: SmallVec<[u8; 64]> = smallvec![0; width];
        bundle.write_row(&self.registry, mask, &mut row);

        let arch = &mut self.archetypes[archetype_ordinal];
        let index = arch.insert(&row);

        EntityParts {
            generation: arch.generation(index),
            archetype: archetype_ordinal as u16,
            row: index,
        }
        .pack()
    }

    fn archetype_ordinal(&mut self, mask: Mask) -> usize {
        #[cold]
        #[inline(never)]
        fn assert_failed() -> ! {
            panic!(
                "too many archetypes: the maximum of {} distinct component sets is reached",
                u16::MAX as usize + 1
            );
        }

        match self.archetypes_by_mask.entry(mask) {
            hash_map::Entry::Occupied(e) => *e.get(),
            hash_map::Entry::Vacant(e) => {
                let width = row_width(&self.registry, mask);
                let align = row_align(&self.registry, mask);
                check_layout(&self.registry, mask, width);

                let ordinal = self.archetypes.len();
                if ordinal > u16::MAX as usize {
                    assert_failed();
                }
                e.insert(ordinal);
                self.archetypes.push(Archetype::new(mask, width, align));
                ordinal
            }
        }
    }

    fn resolve(&self, entity: Entity) -> (&Archetype, EntityParts) {
        let parts = EntityParts::unpack(entity);
        match self.archetypes.get(parts.archetype as usize) {
            Some(arch)
                if arch.contains(parts.row) && arch.generation(parts.row) == parts.generation =>
            {
                (arch, parts)
            }
            _ => invalid_handle(entity),
        }
    }

    fn requested_offsets<Q: ComponentTuple>(&self, archetype_mask: Mask) -> SmallVec<[usize; 8]> {
        match Q::mask(&self.registry) {
            Some(requested) if archetype_mask.is_superset_of(requested) => {}
            _ => missing_components(),
        }
        Q::offsets(&self.registry, archetype_mask)
    }

    /// Resolves a handle to shared references of the requested kinds.
    ///
    /// Panics when the handle is stale or out of range, or when the
    /// entity's archetype lacks a requested kind.
    pub fn entity<Q: ComponentTuple>(&self, entity: Entity) -> Q::Refs<'_> {
        let (arch, parts) = self.resolve(entity);
        let offsets = self.requested_offsets::<Q>(arch.mask());
        // Safety: the row is live and the offsets match its archetype.
        unsafe { Q::refs(arch.at(parts.row).as_ptr(), &offsets) }
    }

    /// Mutable counterpart of [`entity`](Self::entity).
    pub fn entity_mut<Q: ComponentTuple>(&mut self, entity: Entity) -> Q::RefsMut<'_> {
        let (arch, parts) = self.resolve(entity);
        let offsets = self.requested_offsets::<Q>(arch.mask());
        let row = arch.row_ptr(parts.row);
        // Safety: `&mut self` makes this the only access to the row, and
        // kinds within `Q` are distinct, so the references do not alias.
        unsafe { Q::refs_mut(row.as_ptr(), &offsets) }
    }

    /// Removes an entity, freeing its row and bumping the slot generation
    /// so the handle becomes stale. Returns `true` if the entity was
    /// present.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let parts = EntityParts::unpack(entity);
        let Some(arch) = self.archetypes.get_mut(parts.archetype as usize) else {
            return false;
        };
        if !arch.contains(parts.row) || arch.generation(parts.row) != parts.generation {
            return false;
        }
        arch.remove(parts.row);
        true
    }

    /// Iterates over every entity whose archetype holds all kinds of `Q`,
    /// yielding tuples of shared references.
    pub fn query<Q: ComponentTuple>(&self) -> Query<'_, R, Q> {
        Query::new(&self.registry, &self.archetypes, Q::mask(&self.registry))
    }

    /// Mutable counterpart of [`query`](Self::query). The world stays
    /// exclusively borrowed while the iterator lives.
    pub fn query_mut<Q: ComponentTuple>(&mut self) -> QueryMut<'_, R, Q> {
        let requested = Q::mask(&self.registry);
        QueryMut::new(&self.registry, &self.archetypes, requested)
    }
}

impl<R: Registry> Default for World<R> {
    fn default() -> Self {
        World::new()
    }
}
