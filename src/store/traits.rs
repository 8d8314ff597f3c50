//! Core trait for statement execution.
//!
//! Backends implement [`Executor`]; everything above it (query builder,
//! repositories) only sees this trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::store::row::RowStream;
use crate::store::statement::Statement;

/// Executes statements against a relational store.
///
/// SELECT yields the selected rows. INSERT, UPDATE and DELETE yield one row
/// per affected row, restricted to their RETURNING columns; a command without
/// RETURNING yields nothing.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executes a statement and returns a stream of result rows.
    ///
    /// # Arguments
    ///
    /// * `statement` - The statement to run
    async fn execute(&self, statement: &Statement) -> Result<RowStream<'_>, AppError>;
}

// Shared executors are executors too, so `Arc<dyn Executor>` can be used directly.
#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, statement: &Statement) -> Result<RowStream<'_>, AppError> {
        (**self).execute(statement).await
    }
}
