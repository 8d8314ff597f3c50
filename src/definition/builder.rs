//! Repository definitions and their builder.

use crate::definition::key::{unqualified, Key};
use crate::definition::table::{DatabaseColumn, DatabaseSelectColumn, DatabaseTable};
use crate::error::AppError;
use crate::store::Values;

/// Everything a repository needs to know about its entity's table.
///
/// Only [`RepositoryDefinitionBuilder::build`] creates one, and it cannot be
/// changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryDefinition {
    table: DatabaseTable,
    primary_key: Option<Key>,
    columns: Vec<DatabaseColumn>,
    select_columns: Vec<DatabaseSelectColumn>,
    entity_class_name: Option<String>,
}

impl RepositoryDefinition {
    pub fn builder() -> RepositoryDefinitionBuilder {
        RepositoryDefinitionBuilder::default()
    }

    pub fn table(&self) -> &DatabaseTable {
        &self.table
    }

    pub fn primary_key(&self) -> Option<&Key> {
        self.primary_key.as_ref()
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }

    /// Read/write columns, in declaration order.
    pub fn columns(&self) -> &[DatabaseColumn] {
        &self.columns
    }

    /// Read-only columns, in declaration order.
    pub fn select_columns(&self) -> &[DatabaseSelectColumn] {
        &self.select_columns
    }

    pub fn entity_class_name(&self) -> Option<&str> {
        self.entity_class_name.as_deref()
    }

    /// Keeps only values for declared read/write columns, keyed by column name.
    ///
    /// Each column is looked up by its column name first, then by its
    /// property name. Without declared columns the values pass through.
    pub fn reduce_values_to_columns(&self, values: &Values) -> Values {
        if self.columns.is_empty() {
            return values.clone();
        }

        let mut reduced = Values::new();
        for column in &self.columns {
            let name = unqualified(&column.column_name);
            let value = values
                .get(&column.column_name)
                .or_else(|| values.get(name))
                .or_else(|| values.get(&column.property_name));
            if let Some(value) = value {
                reduced.insert(name.to_string(), value.clone());
            }
        }
        reduced
    }
}

/// Collects the parts of a [`RepositoryDefinition`].
///
/// Set-once setters fail with [`AppError::Configuration`] when called twice.
///
/// # Example
///
/// ```ignore
/// let mut builder = RepositoryDefinition::builder();
/// builder
///     .set_table_name("some_entity", Some("t"))?
///     .set_database_primary_key(["id"])?
///     .add_database_columns([DatabaseColumn::same("id"), DatabaseColumn::same("foo")])?;
/// let definition = builder.build()?;
/// ```
#[derive(Debug, Default)]
pub struct RepositoryDefinitionBuilder {
    table: Option<DatabaseTable>,
    primary_key: Option<Key>,
    columns: Vec<DatabaseColumn>,
    select_columns: Vec<DatabaseSelectColumn>,
    entity_class_name: Option<String>,
    touched: bool,
}

impl RepositoryDefinitionBuilder {
    /// True until any setter has been called.
    pub fn is_empty(&self) -> bool {
        !self.touched
    }

    pub fn set_entity_class_name(&mut self, name: impl Into<String>) -> Result<&mut Self, AppError> {
        if let Some(existing) = &self.entity_class_name {
            return Err(AppError::Configuration(format!(
                "entity class name is already set to '{}'",
                existing
            )));
        }
        self.touched = true;
        self.entity_class_name = Some(name.into());
        Ok(self)
    }

    pub fn set_database_primary_key<I, S>(&mut self, columns: I) -> Result<&mut Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.primary_key.is_some() {
            return Err(AppError::Configuration("primary key is already set".into()));
        }
        let key = Key::new(columns)?;
        self.touched = true;
        self.primary_key = Some(key);
        Ok(self)
    }

    pub fn add_database_columns(
        &mut self,
        columns: impl IntoIterator<Item = DatabaseColumn>,
    ) -> Result<&mut Self, AppError> {
        self.touched = true;
        self.columns.extend(columns);
        Ok(self)
    }

    pub fn add_database_select_columns(
        &mut self,
        columns: impl IntoIterator<Item = DatabaseSelectColumn>,
    ) -> Result<&mut Self, AppError> {
        self.touched = true;
        self.select_columns.extend(columns);
        Ok(self)
    }

    pub fn set_table_name(
        &mut self,
        name: impl Into<String>,
        alias: Option<&str>,
    ) -> Result<&mut Self, AppError> {
        let mut table = DatabaseTable::new(name);
        table.alias = alias.map(str::to_string);
        self.set_table(table)
    }

    pub fn set_table(&mut self, table: DatabaseTable) -> Result<&mut Self, AppError> {
        if let Some(existing) = &self.table {
            return Err(AppError::Configuration(format!(
                "table is already set to '{}'",
                existing.name
            )));
        }
        if table.name.is_empty() {
            return Err(AppError::Configuration("table name cannot be empty".into()));
        }
        self.touched = true;
        self.table = Some(table);
        Ok(self)
    }

    /// Finishes the definition. A table name is required.
    pub fn build(self) -> Result<RepositoryDefinition, AppError> {
        let table = self.table.ok_or_else(|| {
            AppError::Configuration("repository definition has no table name".into())
        })?;

        Ok(RepositoryDefinition {
            table,
            primary_key: self.primary_key,
            columns: self.columns,
            select_columns: self.select_columns,
            entity_class_name: self.entity_class_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> RepositoryDefinition {
        let mut builder = RepositoryDefinition::builder();
        builder
            .set_table_name("some_entity", Some("t"))
            .unwrap()
            .set_database_primary_key(["id"])
            .unwrap()
            .add_database_columns([
                DatabaseColumn::same("id"),
                DatabaseColumn::new("id_user", "userId"),
            ])
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_builder_starts_empty() {
        let mut builder = RepositoryDefinition::builder();
        assert!(builder.is_empty());
        builder.add_database_columns(Vec::new()).unwrap();
        assert!(!builder.is_empty());
    }

    #[test]
    fn test_set_once_setters() {
        let mut builder = RepositoryDefinition::builder();
        builder.set_entity_class_name("SomeEntity").unwrap();
        assert!(matches!(
            builder.set_entity_class_name("Other"),
            Err(AppError::Configuration(_))
        ));

        builder.set_database_primary_key(["id"]).unwrap();
        assert!(builder.set_database_primary_key(["id"]).is_err());

        builder.set_table_name("a", None).unwrap();
        assert!(builder.set_table_name("b", None).is_err());
    }

    #[test]
    fn test_build_requires_table() {
        let mut builder = RepositoryDefinition::builder();
        builder.set_database_primary_key(["id"]).unwrap();
        assert!(matches!(builder.build(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_build_keeps_parts() {
        let definition = definition();
        assert_eq!(definition.table().alias_or_name(), "t");
        assert_eq!(definition.primary_key().unwrap().columns(), &["id"]);
        assert_eq!(definition.columns().len(), 2);
        assert!(definition.entity_class_name().is_none());
    }

    #[test]
    fn test_reduce_values_to_columns() {
        let definition = definition();
        let values = json!({"id": 1, "userId": 7, "unrelated": true});
        let reduced = definition.reduce_values_to_columns(values.as_object().unwrap());
        assert_eq!(serde_json::Value::Object(reduced), json!({"id": 1, "id_user": 7}));
    }
}
