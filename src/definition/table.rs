//! Table and column metadata.

use crate::store::{ColumnRef, TableRef};

/// The table backing a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTable {
    pub name: String,
    pub schema: Option<String>,
    pub alias: Option<String>,
}

impl DatabaseTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Name used to qualify columns in SELECT, UPDATE and DELETE.
    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Reference for SELECT, UPDATE and DELETE. The alias defaults to the name.
    pub fn to_table_ref(&self) -> TableRef {
        let mut table = TableRef::new(self.name.clone()).with_alias(self.alias_or_name());
        table.schema = self.schema.clone();
        table
    }

    /// Reference without alias, for INSERT.
    pub fn to_bare_ref(&self) -> TableRef {
        self.to_table_ref().bare()
    }
}

/// A read/write column mapped to an entity property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseColumn {
    pub column_name: String,
    pub property_name: String,
}

impl DatabaseColumn {
    pub fn new(column_name: impl Into<String>, property_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            property_name: property_name.into(),
        }
    }

    /// A column whose property has the same name.
    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), name)
    }

    /// The column qualified with `table`, unless it already names its own table.
    pub fn qualified(&self, table: &str) -> ColumnRef {
        qualify(&self.column_name, table)
    }
}

/// A read-only column appended to SELECT, e.g. a joined or computed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSelectColumn {
    pub column_name: String,
    pub property_name: String,
    pub table: Option<String>,
}

impl DatabaseSelectColumn {
    pub fn new(column_name: impl Into<String>, property_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            property_name: property_name.into(),
            table: None,
        }
    }

    /// Marks the column as owned by another (joined) table.
    pub fn from_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// The column qualified with its owning table, falling back to `default_table`.
    pub fn qualified(&self, default_table: &str) -> ColumnRef {
        qualify(&self.column_name, self.table.as_deref().unwrap_or(default_table))
    }
}

fn qualify(column: &str, table: &str) -> ColumnRef {
    if column.contains('.') {
        ColumnRef::parse(column)
    } else {
        ColumnRef::qualified(table, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_defaults_to_name() {
        let table = DatabaseTable::new("some_entity");
        assert_eq!(table.to_table_ref().alias.as_deref(), Some("some_entity"));
        assert_eq!(table.to_bare_ref().alias, None);

        let table = table.with_alias("t");
        assert_eq!(table.alias_or_name(), "t");
    }

    #[test]
    fn test_column_qualification() {
        let column = DatabaseColumn::new("id_user", "userId");
        assert_eq!(column.qualified("t"), ColumnRef::qualified("t", "id_user"));

        let joined = DatabaseColumn::same("u.name");
        assert_eq!(joined.qualified("t"), ColumnRef::qualified("u", "name"));

        let select = DatabaseSelectColumn::new("name", "userName").from_table("u");
        assert_eq!(select.qualified("t"), ColumnRef::qualified("u", "name"));
    }
}
