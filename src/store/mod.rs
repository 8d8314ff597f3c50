//! Backend-agnostic access to relational tables.
//!
//! Statements are built as data ([`Select`], [`Insert`], [`Update`],
//! [`Delete`]) and handed to an [`Executor`]. Repositories only ever see the
//! executor trait, so the same code runs against PostgreSQL or the in-memory
//! backend.
//!
//! # Usage
//!
//! ```ignore
//! use tablemap::store::{Condition, QueryExt, Select, TableRef};
//!
//! let rows = client
//!     .query(Select::new(TableRef::new("users")).filter(Condition::eq("id", 1)))
//!     .fetch_all()
//!     .await?;
//! ```

mod query;
mod row;
mod statement;
mod traits;

pub mod backends;
pub mod sql;

use std::sync::Arc;

pub use query::{Query, QueryExt};
pub use row::{Row, RowStream, Values};
pub use statement::{
    ColumnRef, Condition, Delete, Insert, Operator, Order, Projection, Select, Statement, TableRef,
    Update,
};
pub use traits::Executor;

/// Shared handle to whichever backend the application runs on.
pub type AppStore = Arc<dyn Executor>;
