//! Create, update and delete on top of the read path.
//!
//! Write commands only RETURN primary key columns. Created and updated rows are
//! then read back through [`Repository::find_one`], so they hydrate exactly like
//! any other read. Deleted rows cannot be read back: `delete` hands out the raw
//! RETURNING row instead.

use std::ops::Deref;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::definition::{unqualified, Key, KeyValue};
use crate::error::AppError;
use crate::hydration::{pass_through, Entity};
use crate::repositories::criteria::{Criteria, Id};
use crate::repositories::read::Repository;
use crate::repositories::result::RepositoryResult;
use crate::store::{ColumnRef, Delete, Insert, Projection, QueryExt, Row, Update, Values};

/// A [`Repository`] that can also write.
///
/// # Example
///
/// ```ignore
/// let repository = WritableRepository::new(
///     Repository::<SomeEntity>::new(store).define(|builder| {
///         builder
///             .set_table_name("some_entity", Some("t"))?
///             .set_database_primary_key(["id"])?;
///         Ok(())
///     }),
/// );
///
/// let created = repository.create(json!({ "id_user": 1, "foo": 2 })).await?;
/// let updated = repository.update(created.id, json!({ "foo": 3 })).await?;
/// let removed = repository.delete(created.id, true).await?;
/// ```
pub struct WritableRepository<T> {
    repository: Repository<T>,
}

impl<T> Clone for WritableRepository<T> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<T> Deref for WritableRepository<T> {
    type Target = Repository<T>;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

impl<T: Entity> From<Repository<T>> for WritableRepository<T> {
    fn from(repository: Repository<T>) -> Self {
        Self::new(repository)
    }
}

impl<T: Entity> WritableRepository<T> {
    pub fn new(repository: Repository<T>) -> Self {
        Self { repository }
    }

    pub fn into_inner(self) -> Repository<T> {
        self.repository
    }

    /// Inserts `values` and returns the stored entity, defaults included.
    pub async fn create(&self, values: impl Into<JsonValue>) -> Result<T, AppError> {
        let insert = self.create_insert(into_values(values.into())?)?;
        let rows = self.store().query(insert).fetch_all().await?;
        let key = self.returned_key(RepositoryResult::new(rows, pass_through()), "INSERT")?;
        self.find_one(key).await
    }

    /// Creates a row from a serializable entity.
    ///
    /// Only declared columns are written; primary key columns holding `null`
    /// are left out so the database can generate them.
    pub async fn create_from<E: Serialize>(&self, entity: &E) -> Result<T, AppError> {
        let mut values = self.entity_values(entity)?;
        if let Some(key) = self.definition()?.primary_key() {
            for column in key.columns() {
                let column = unqualified(column);
                if values.get(column).is_some_and(JsonValue::is_null) {
                    values.remove(column);
                }
            }
        }
        self.create(values).await
    }

    /// Sets `values` on the row with primary key `id` and returns it re-read.
    ///
    /// Fails with [`AppError::EntityNotFound`] unless exactly one row changed.
    pub async fn update(&self, id: impl Into<Id>, values: impl Into<JsonValue>) -> Result<T, AppError> {
        let condition = self.expand_primary_key(id)?;
        let update = self.create_update(condition)?.sets(into_values(values.into())?);
        let rows = self.store().query(update).fetch_all().await?;
        let key = self.returned_key(RepositoryResult::new(rows, pass_through()), "UPDATE")?;
        self.find_one(key).await
    }

    /// Copies a serializable entity's columns onto the row with primary key `id`.
    ///
    /// Primary key columns of the entity are never written.
    pub async fn update_from<E: Serialize>(&self, id: impl Into<Id>, entity: &E) -> Result<T, AppError> {
        let mut values = self.entity_values(entity)?;
        for column in self.primary_key()?.columns() {
            values.remove(unqualified(column));
        }
        self.update(id, values).await
    }

    /// Deletes the row with primary key `id`.
    ///
    /// Returns the deleted primary key as a raw row, or `None` when nothing
    /// matched. With `raise_on_missing`, anything but exactly one deleted row
    /// is an error.
    pub async fn delete(&self, id: impl Into<Id>, raise_on_missing: bool) -> Result<Option<Row>, AppError> {
        let condition = self.expand_primary_key(id)?;
        let delete = self.create_delete(condition)?;
        let rows = self.store().query(delete).fetch_all().await?;
        let mut result = RepositoryResult::new(rows, pass_through());

        if raise_on_missing && result.len() != 1 {
            return Err(self.unexpected_count(result.len(), "DELETE")?);
        }
        result.fetch().transpose()
    }

    /// INSERT into the bare table, returning the primary key.
    pub fn create_insert(&self, values: Values) -> Result<Insert, AppError> {
        let table = self.table()?;
        let mut insert = Insert::new(table.to_bare_ref()).values(values);
        for column in self.returning(&table.name)? {
            insert = insert.returning(column);
        }
        Ok(insert)
    }

    /// UPDATE of the rows matching `criteria`, returning their primary keys.
    pub fn create_update(&self, criteria: impl Into<Criteria>) -> Result<Update, AppError> {
        let table = self.table()?;
        let mut update = Update::new(table.to_table_ref());
        if let Some(condition) = criteria.into().expand() {
            update = update.filter(condition);
        }
        for column in self.returning(table.alias_or_name())? {
            update = update.returning(column);
        }
        Ok(update)
    }

    /// DELETE of the rows matching `criteria`, returning their primary keys.
    pub fn create_delete(&self, criteria: impl Into<Criteria>) -> Result<Delete, AppError> {
        let table = self.table()?;
        let mut delete = Delete::new(table.to_table_ref());
        if let Some(condition) = criteria.into().expand() {
            delete = delete.filter(condition);
        }
        for column in self.returning(table.alias_or_name())? {
            delete = delete.returning(column);
        }
        Ok(delete)
    }

    fn primary_key(&self) -> Result<&Key, AppError> {
        let definition = self.definition()?;
        definition.primary_key().ok_or_else(|| {
            AppError::query(
                "RETURNING requires a primary key",
                definition.table().name.clone(),
            )
        })
    }

    /// Primary key columns for RETURNING, qualified with `qualifier`.
    ///
    /// Any qualifier a key column carries is replaced, since INSERT targets
    /// cannot be aliased.
    fn returning(&self, qualifier: &str) -> Result<Vec<Projection>, AppError> {
        Ok(self
            .primary_key()?
            .columns()
            .iter()
            .map(|column| Projection::column(ColumnRef::qualified(qualifier, unqualified(column))))
            .collect())
    }

    /// Key of the single row a write command returned.
    fn returned_key(&self, mut returned: RepositoryResult<Row>, command: &str) -> Result<KeyValue, AppError> {
        if returned.len() != 1 {
            return Err(self.unexpected_count(returned.len(), command)?);
        }
        match returned.fetch() {
            Some(row) => self.primary_key()?.extract_from(row?.values()),
            None => Err(AppError::not_found(self.entity_class_name()?)),
        }
    }

    fn unexpected_count(&self, count: usize, command: &str) -> Result<AppError, AppError> {
        let entity = self.entity_class_name()?;
        tracing::warn!(
            entity = %entity,
            command,
            count,
            "Write command affected an unexpected number of rows"
        );
        Ok(if count == 0 {
            AppError::not_found(entity)
        } else {
            AppError::ambiguous(entity, count)
        })
    }

    fn entity_values<E: Serialize>(&self, entity: &E) -> Result<Values, AppError> {
        let values = serde_json::to_value(entity)
            .map_err(|e| AppError::Internal(format!("Failed to serialize entity: {}", e)))?;
        let values = into_values(values)?;
        Ok(self.definition()?.reduce_values_to_columns(&values))
    }
}

fn into_values(values: JsonValue) -> Result<Values, AppError> {
    match values {
        JsonValue::Object(map) => Ok(map),
        other => Err(AppError::query(
            "write values must be a mapping of column names to values",
            other.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backends::memory::{MemoryClient, MemoryTable};
    use crate::store::AppStore;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> (MemoryClient, AppStore) {
        let client = MemoryClient::new();
        client
            .create_table(
                MemoryTable::new("users")
                    .serial("id")
                    .column("name")
                    .column_with_default("status", 1),
            )
            .unwrap();
        (client.clone(), Arc::new(client))
    }

    fn users(store: AppStore) -> WritableRepository<Row> {
        WritableRepository::new(Repository::new(store).define(|builder| {
            builder
                .set_table_name("users", Some("u"))?
                .set_database_primary_key(["id"])?;
            Ok(())
        }))
    }

    #[tokio::test]
    async fn test_create_reads_back_defaults() {
        let (_, store) = store();
        let repository = users(store);
        let row = repository.create(json!({"name": "ann"})).await.unwrap();
        assert_eq!(row.get::<i64>("id").unwrap(), 1);
        assert_eq!(row.get::<i64>("status").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_non_mapping() {
        let (_, store) = store();
        let err = users(store).create(json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, AppError::Query { .. }));
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let (_, store) = store();
        let err = users(store).update(7, json!({"name": "x"})).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_returns_raw_key() {
        let (client, store) = store();
        let repository = users(store);
        repository.create(json!({"name": "ann"})).await.unwrap();

        let deleted = repository.delete(1, true).await.unwrap().unwrap();
        assert_eq!(deleted.columns().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(client.row_count("users").unwrap(), 0);

        assert!(repository.delete(1, false).await.unwrap().is_none());
        assert!(repository.delete(1, true).await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_insert_returning_uses_bare_table() {
        let (_, store) = store();
        let insert = users(store).create_insert(Values::new()).unwrap();
        assert!(insert.table.alias.is_none());
        assert_eq!(
            insert.returning,
            vec![Projection::column(ColumnRef::qualified("users", "id"))]
        );
    }

    #[test]
    fn test_update_returning_uses_alias() {
        let (_, store) = store();
        let update = users(store).create_update(Criteria::None).unwrap();
        assert_eq!(
            update.returning,
            vec![Projection::column(ColumnRef::qualified("u", "id"))]
        );
    }

    #[derive(Serialize)]
    struct NewUser {
        id: Option<i64>,
        name: String,
        nickname: String,
    }

    #[tokio::test]
    async fn test_write_from_entity() {
        let (_, store) = store();
        let repository = WritableRepository::new(Repository::<Row>::new(store).define(|builder| {
            builder
                .set_table_name("users", Some("u"))?
                .set_database_primary_key(["id"])?
                .add_database_columns([
                    crate::definition::DatabaseColumn::same("id"),
                    crate::definition::DatabaseColumn::same("name"),
                ])?;
            Ok(())
        }));

        let user = NewUser {
            id: None,
            name: "ann".into(),
            nickname: "a".into(),
        };
        let row = repository.create_from(&user).await.unwrap();
        assert_eq!(row.get::<i64>("id").unwrap(), 1);
        assert!(row.get_raw("nickname").is_none());

        let other = repository.create(json!({"name": "bob"})).await.unwrap();
        let other_id: i64 = other.get("id").unwrap();

        let renamed = NewUser {
            id: Some(1),
            name: "anne".into(),
            nickname: "a".into(),
        };
        let row = repository.update_from(other_id, &renamed).await.unwrap();
        assert_eq!(row.get::<i64>("id").unwrap(), other_id);
        assert_eq!(row.get::<String>("name").unwrap(), "anne");
        assert_eq!(
            repository.find_one(1).await.unwrap().get::<String>("name").unwrap(),
            "ann"
        );
    }
}
