use crate::hive::HiveIndex;

/// An opaque 64-bit entity handle.
///
/// Bit layout, LSB to MSB: generation (16 bits), archetype ordinal
/// (16 bits), row index within the archetype's hive (32 bits). Consumers
/// should treat the value as opaque; [`to_bits`](Entity::to_bits) exists
/// for embedding handles in client data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Entity(u64);

impl Entity {
    /// A handle no world ever emits.
    pub const NULL: Entity = Entity(u64::MAX);

    /// Raw bit form of the handle.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`to_bits`](Self::to_bits) output.
    pub fn from_bits(bits: u64) -> Entity {
        Entity(bits)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::NULL
    }
}

#[derive(Copy, Clone)]
pub(crate) struct EntityParts {
    pub generation: u16,
    pub archetype: u16,
    pub row: HiveIndex,
}

impl EntityParts {
    pub(crate) fn pack(self) -> Entity {
        Entity(
            self.generation as u64
                | (self.archetype as u64) << 16
                | (self.row.to_bits() as u64) << 32,
        )
    }

    pub(crate) fn unpack(entity: Entity) -> EntityParts {
        EntityParts {
            generation: entity.0 as u16,
            archetype: (entity.0 >> 16) as u16,
            row: HiveIndex::from_bits((entity.0 >> 32) as u32),
        }
    }
}
