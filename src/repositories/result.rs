//! Hydrating result sets.

use std::fmt;

use crate::error::AppError;
use crate::hydration::RowHydrator;
use crate::store::Row;

/// Rows fetched by a repository, hydrated one at a time as they are read.
///
/// # Example
///
/// ```ignore
/// let result = repository.find_all([1, 2, 3]).await?;
/// println!("{} found", result.len());
/// for entity in result {
///     let entity = entity?;
/// }
/// ```
pub struct RepositoryResult<T> {
    rows: std::vec::IntoIter<Row>,
    count: usize,
    hydrator: RowHydrator<T>,
}

impl<T> RepositoryResult<T> {
    pub fn new(rows: Vec<Row>, hydrator: RowHydrator<T>) -> Self {
        Self {
            count: rows.len(),
            rows: rows.into_iter(),
            hydrator,
        }
    }

    /// Number of rows in the result, fetched or not.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Hydrates the next row, `None` once every row was fetched.
    pub fn fetch(&mut self) -> Option<Result<T, AppError>> {
        let row = self.rows.next()?;
        Some((self.hydrator)(row))
    }

    /// Hydrates all remaining rows, failing on the first error.
    pub fn into_vec(self) -> Result<Vec<T>, AppError> {
        self.collect()
    }
}

impl<T> Iterator for RepositoryResult<T> {
    type Item = Result<T, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<T> fmt::Debug for RepositoryResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryResult")
            .field("count", &self.count)
            .field("remaining", &self.rows.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydration::pass_through;
    use serde_json::json;
    use std::sync::Arc;

    fn rows(n: i64) -> Vec<Row> {
        (1..=n)
            .map(|id| Row::new(json!({ "id": id }).as_object().cloned().unwrap()))
            .collect()
    }

    #[test]
    fn test_count_is_stable_while_fetching() {
        let mut result = RepositoryResult::new(rows(3), pass_through());
        assert_eq!(result.len(), 3);
        let first = result.fetch().unwrap().unwrap();
        assert_eq!(first.get::<i64>("id").unwrap(), 1);
        assert_eq!(result.len(), 3);
        assert_eq!(result.into_vec().unwrap().len(), 2);
    }

    #[test]
    fn test_rows_hydrate_lazily() {
        let hydrator: RowHydrator<i64> = Arc::new(|row: Row| {
            let id: i64 = row.get("id")?;
            if id == 2 {
                return Err(AppError::Internal("bad row".into()));
            }
            Ok(id)
        });
        let mut result = RepositoryResult::new(rows(3), hydrator);
        assert_eq!(result.fetch().unwrap().unwrap(), 1);
        assert!(result.fetch().unwrap().is_err());
        assert_eq!(result.fetch().unwrap().unwrap(), 3);
        assert!(result.fetch().is_none());
    }

    #[test]
    fn test_empty_result() {
        let result = RepositoryResult::new(Vec::new(), pass_through());
        assert!(result.is_empty());
        assert!(result.into_vec().unwrap().is_empty());
    }
}
