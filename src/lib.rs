//! Tablemap - table-backed repositories
//!
//! Maps database tables to entity types: keyed lookups, criteria queries with
//! pagination, hydration with lazy properties, and writes that re-read what
//! they stored.

pub mod cli;
pub mod config;
pub mod context;
pub mod definition;
pub mod di;
pub mod error;
pub mod hydration;
pub mod repositories;
pub mod store;

// Re-export FromRef at crate root for di-macros generated code
pub use di::FromRef;
