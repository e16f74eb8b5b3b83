//! An archetype-based container for entity component data.
//!
//! # Use Case
//! Suppose you need to store large amounts of small records, each carrying
//! some subset of a small vocabulary of plain-data fields, and traverse
//! them by field subset at high throughput. Boxing each record behind
//! dynamic dispatch scatters them across the heap and turns every
//! traversal into a chain of cache misses.
//!
//! Data-oriented storage avoids that: records with the same field set are
//! packed together and walked linearly.
//!
//! # The Architecture
//!
//! An *entity* is an identifier for one record. Each entity carries one
//! value per *component kind* it was inserted with. A unique set of kinds
//! is an *archetype*: all entities with that exact set live in one
//! [`Archetype`], as densely packed rows whose columns sit at fixed
//! offsets in ascending ordinal order.
//!
//! Rows live in a [`Hive`], a chunked pool that grows by appending chunks
//! and never relocates a slot, so the index inside an [`Entity`] handle
//! stays valid for the world's whole life.
//!
//! Component kinds get their ordinals from a registry: [`DynamicRegistry`]
//! assigns them on first mention at runtime, [`StaticRegistry`] pins them
//! to a compile-time list declared with [`kinds!`].
//!
//! # Examples
//!
//! Simple usage:
//! ```
//! use entity_hive::DynamicWorld;
//!
//! #[derive(Debug, Copy, Clone, PartialEq)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(Debug, Copy, Clone, PartialEq)]
//! struct Velocity {
//!     x: f32,
//!     y: f32,
//! }
//!
//! let mut world = DynamicWorld::new();
//!
//! let probe = world.insert((Position { x: 5.0, y: 5.0 }, Velocity { x: 1.0, y: 1.0 }));
//! world.insert((Position { x: 9.0, y: 9.0 },));
//!
//! // Integrate every entity that has both a position and a velocity;
//! // the position-only entity is skipped.
//! for (pos, vel) in world.query_mut::<(Position, Velocity)>() {
//!     pos.x += vel.x;
//!     pos.y += vel.y;
//! }
//!
//! let (pos,) = world.entity::<(Position,)>(probe);
//! assert_eq!(*pos, Position { x: 6.0, y: 6.0 });
//! ```
//!
//! A compile-time registry pins ordinals to a declared kind list, and a
//! kind outside the list is rejected at compile time:
//! ```
//! use entity_hive::{kinds, StaticWorld};
//!
//! #[derive(Copy, Clone)]
//! struct Health(u32);
//!
//! #[derive(Copy, Clone)]
//! struct Armor(u32);
//!
//! let mut world = StaticWorld::<kinds![Health, Armor]>::new();
//! let soldier = world.insert((Health(80), Armor(20)));
//!
//! let (health, armor) = world.entity::<(Health, Armor)>(soldier);
//! assert_eq!(health.0, 80);
//! assert_eq!(armor.0, 20);
//! ```


pub mod archetype;
pub mod bundle;
pub mod component;
pub mod entity;
pub mod hive;
pub mod mask;
pub mod query;
pub mod registry;
pub mod typelist;
pub mod world;

pub use archetype::Archetype;
pub use bundle::Bundle;
pub use component::Component;
pub use component::KindInfo;
pub use entity::Entity;
pub use hive::Hive;
pub use hive::HiveIndex;
pub use hive::CHUNK_CAPACITY;
pub use mask::Mask;
pub use query::ComponentTuple;
pub use query::Query;
pub use query::QueryMut;
pub use registry::DynamicRegistry;
pub use registry::Registry;
pub use registry::StaticRegistry;
pub use typelist::index_of;
pub use typelist::Cons;
pub use typelist::Contains;
pub use typelist::Here;
pub use typelist::IndexOf;
pub use typelist::KindList;
pub use typelist::Nil;
pub use typelist::There;
pub use world::DynamicWorld;
pub use world::StaticWorld;
pub use world::World;

pub(crate) type HashMap<K, V> = ahash::AHashMap<K, V>;
