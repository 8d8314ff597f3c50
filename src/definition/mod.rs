//! Table, key and column metadata describing how an entity is stored.
//!
//! A [`RepositoryDefinition`] is assembled once through
//! [`RepositoryDefinitionBuilder`] and is immutable afterwards.

mod builder;
mod key;
mod table;

pub use builder::{RepositoryDefinition, RepositoryDefinitionBuilder};
pub use key::{Key, KeyValue};
pub(crate) use key::unqualified;
pub use table::{DatabaseColumn, DatabaseSelectColumn, DatabaseTable};
