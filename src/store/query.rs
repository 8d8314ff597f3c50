//! Fluent execution of statements.

use futures::{StreamExt, TryStreamExt};

use crate::error::AppError;
use crate::store::row::{Row, RowStream};
use crate::store::statement::Statement;
use crate::store::traits::Executor;

/// A statement bound to the executor that will run it.
///
/// # Example
///
/// ```ignore
/// let rows = store
///     .query(Select::new(TableRef::new("users")).filter(Condition::eq("id", 1)))
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, E: Executor + ?Sized> {
    executor: &'a E,
    statement: Statement,
}

impl<'a, E: Executor + ?Sized> Query<'a, E> {
    /// Creates a new query.
    pub fn new(executor: &'a E, statement: impl Into<Statement>) -> Self {
        Self {
            executor,
            statement: statement.into(),
        }
    }

    /// Returns the statement this query will run.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Executes the statement and returns a stream of rows.
    pub async fn execute(self) -> Result<RowStream<'a>, AppError> {
        tracing::debug!(
            kind = self.statement.kind(),
            table = %self.statement.table().name,
            "executing statement"
        );
        self.executor.execute(&self.statement).await
    }

    /// Executes the statement and collects all rows into a vector.
    pub async fn fetch_all(self) -> Result<Vec<Row>, AppError> {
        self.execute().await?.try_collect().await
    }

    /// Executes the statement and returns the first row, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, AppError> {
        let mut stream = self.execute().await?;
        stream.next().await.transpose()
    }

    /// Executes the statement, discarding any rows it yields.
    pub async fn run(self) -> Result<(), AppError> {
        let mut stream = self.execute().await?;
        // Drain the stream to ensure the statement completes
        while let Some(result) = stream.next().await {
            result?;
        }
        Ok(())
    }
}

/// Extension trait providing a convenient `query()` method.
///
/// Automatically implemented for all [`Executor`] types, allowing
/// `store.query(select)` instead of `Query::new(&store, select)`.
pub trait QueryExt: Executor {
    /// Creates a new query for this executor.
    fn query(&self, statement: impl Into<Statement>) -> Query<'_, Self>
    where
        Self: Sized,
    {
        Query::new(self, statement)
    }
}

// Blanket implementation for all Executor types
impl<E: Executor> QueryExt for E {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::statement::{Condition, Insert, Select, TableRef};
    use serde_json::json;

    // Mock executor for testing
    struct MockExecutor {
        expected: Statement,
        rows: Vec<Row>,
    }

    #[async_trait::async_trait]
    impl Executor for MockExecutor {
        async fn execute(&self, statement: &Statement) -> Result<RowStream<'_>, AppError> {
            assert_eq!(statement, &self.expected);
            Ok(Box::pin(futures::stream::iter(
                self.rows.clone().into_iter().map(Ok),
            )))
        }
    }

    fn row(value: serde_json::Value) -> Row {
        Row::new(value.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_query_fetch_all() {
        let select = Select::new(TableRef::new("users")).filter(Condition::eq("id", 1));
        let executor = MockExecutor {
            expected: select.clone().into(),
            rows: vec![row(json!({"id": 1})), row(json!({"id": 2}))],
        };

        let rows = executor.query(select).fetch_all().await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_query_fetch_one() {
        let select = Select::new(TableRef::new("users"));
        let executor = MockExecutor {
            expected: select.clone().into(),
            rows: vec![row(json!({"id": 7}))],
        };

        let first = executor.query(select).fetch_one().await.unwrap().unwrap();
        assert_eq!(first.get::<i64>("id").unwrap(), 7);
    }

    #[tokio::test]
    async fn test_query_run() {
        let insert = Insert::new(TableRef::new("users"));
        let executor = MockExecutor {
            expected: insert.clone().into(),
            rows: Vec::new(),
        };

        let result = executor.query(insert).run().await;
        assert!(result.is_ok());
    }
}
