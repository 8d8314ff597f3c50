//! Domain types built from rows.

use crate::definition::RepositoryDefinition;
use crate::error::AppError;
use crate::hydration::RowValues;
use crate::store::Row;

/// A type a repository can hydrate.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct SomeEntity {
///     id: i64,
///     foo: i64,
///     #[serde(skip)]
///     owner: LazyProperty<Row>,
/// }
///
/// impl Entity for SomeEntity {
///     fn hydrate(mut values: RowValues) -> Result<Self, AppError> {
///         let mut entity: Self = values.deserialize()?;
///         entity.owner = values.take_lazy("owner")?;
///         Ok(entity)
///     }
/// }
/// ```
pub trait Entity: Sized + Send + 'static {
    /// Builds the entity from a row's values, lazy ones included.
    fn hydrate(values: RowValues) -> Result<Self, AppError>;

    /// Definition used when a repository does not build its own.
    fn definition() -> Option<RepositoryDefinition> {
        None
    }
}

/// Rows hydrate to themselves; lazy values are dropped.
impl Entity for Row {
    fn hydrate(values: RowValues) -> Result<Self, AppError> {
        Ok(Row::new(values.into_plain()))
    }
}
