//! Backend implementations of [`Executor`](crate::store::Executor).
//!
//! # Available Backends
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | PostgreSQL | [`postgres`] | Production |
//! | In-memory | [`memory`] | Tests and local tooling |
//!
//! # Implementing a Backend
//!
//! 1. Create a client struct (e.g., `PostgresClient`)
//! 2. Implement `Executor` for it, yielding RETURNING rows for write statements
//! 3. Report caller mistakes (unknown columns, bad SQL) as `AppError::Query`

pub mod memory;
pub mod postgres;
