//! Row hydration with lazily computed properties and collections.
//!
//! A repository turns every fetched [`Row`](crate::store::Row) into its entity
//! through a [`RowHydrator`] built by [`HydratorBuilder`]. Lazy values are
//! attached to the [`ResultRow`] as [`LazyProperty`] / [`LazyCollection`]
//! containers and only computed when the entity asks for them.

mod entity;
mod hydrator;
mod lazy;
mod result_row;

pub use entity::Entity;
pub use hydrator::{
    pass_through, CollectionInitializer, HydratorBuilder, Normalizer, PropertyInitializer,
    RowHydrator,
};
pub use lazy::{LazyCollection, LazyProperty, LoadFuture};
pub use result_row::{LazyValue, ResultRow, RowValues};
