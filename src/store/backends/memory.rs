//! In-memory backend.
//!
//! Evaluates statements directly against tables held in process memory. It
//! follows PostgreSQL semantics closely enough for repository tests: column
//! defaults, serial keys, NULL never comparing equal to a value, RETURNING
//! lists and `count(*)`. Raw SQL conditions are rejected.
//!
//! # Example
//!
//! ```ignore
//! let client = MemoryClient::new();
//! client.create_table(
//!     MemoryTable::new("users")
//!         .serial("id")
//!         .column("name"),
//! )?;
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::store::row::{Row, RowStream, Values};
use crate::store::statement::{
    ColumnRef, Condition, Delete, Insert, Operator, Order, Projection, Select, Statement, TableRef,
    Update,
};
use crate::store::traits::Executor;

/// What a column holds when an INSERT omits it.
#[derive(Debug, Clone, PartialEq)]
enum ColumnDefault {
    Null,
    Serial,
    Value(JsonValue),
}

#[derive(Debug, Clone)]
struct MemoryColumn {
    name: String,
    default: ColumnDefault,
}

/// Table definition and contents for [`MemoryClient`].
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<MemoryColumn>,
    rows: Vec<Values>,
    sequence: i64,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            sequence: 0,
        }
    }

    /// Adds a nullable column without default.
    pub fn column(self, name: impl Into<String>) -> Self {
        self.push_column(name, ColumnDefault::Null)
    }

    /// Adds an auto-incrementing integer column.
    pub fn serial(self, name: impl Into<String>) -> Self {
        self.push_column(name, ColumnDefault::Serial)
    }

    /// Adds a column filled with `value` when an INSERT omits it.
    pub fn column_with_default(self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.push_column(name, ColumnDefault::Value(value.into()))
    }

    fn push_column(mut self, name: impl Into<String>, default: ColumnDefault) -> Self {
        self.columns.push(MemoryColumn {
            name: name.into(),
            default,
        });
        self
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    fn check_column(&self, name: &str) -> Result<(), AppError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(AppError::query(
                format!("column \"{}\" does not exist", name),
                self.name.clone(),
            ))
        }
    }

    fn build_row(&mut self, mut values: Values) -> Result<Values, AppError> {
        for name in values.keys() {
            self.check_column(name)?;
        }

        let mut row = Values::new();
        for column in &self.columns {
            let value = match (values.remove(&column.name), &column.default) {
                (Some(value), ColumnDefault::Serial) if !value.is_null() => {
                    if let Some(n) = value.as_i64() {
                        self.sequence = self.sequence.max(n);
                    }
                    value
                }
                (_, ColumnDefault::Serial) => {
                    self.sequence += 1;
                    JsonValue::from(self.sequence)
                }
                (Some(value), _) => value,
                (None, ColumnDefault::Value(default)) => default.clone(),
                (None, ColumnDefault::Null) => JsonValue::Null,
            };
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }
}

/// In-memory executor.
///
/// This type is cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryClient {
    tables: Arc<Mutex<HashMap<String, MemoryTable>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, MemoryTable>>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))
    }

    /// Registers a table, replacing any table with the same name.
    pub fn create_table(&self, table: MemoryTable) -> Result<(), AppError> {
        self.lock()?.insert(table.name.clone(), table);
        Ok(())
    }

    /// Number of rows currently stored in a table.
    pub fn row_count(&self, table: &str) -> Result<usize, AppError> {
        let tables = self.lock()?;
        Ok(lookup(&tables, table)?.rows.len())
    }

    fn run(&self, statement: &Statement) -> Result<Vec<Row>, AppError> {
        let mut tables = self.lock()?;
        match statement {
            Statement::Select(select) => run_select(&tables, select),
            Statement::Insert(insert) => run_insert(&mut tables, insert),
            Statement::Update(update) => run_update(&mut tables, update),
            Statement::Delete(delete) => run_delete(&mut tables, delete),
        }
    }
}

#[async_trait]
impl Executor for MemoryClient {
    async fn execute(&self, statement: &Statement) -> Result<RowStream<'_>, AppError> {
        let rows = self.run(statement)?;
        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }
}

fn lookup<'t>(tables: &'t HashMap<String, MemoryTable>, name: &str) -> Result<&'t MemoryTable, AppError> {
    tables.get(name).ok_or_else(|| {
        AppError::query(format!("relation \"{}\" does not exist", name), name)
    })
}

fn lookup_mut<'t>(
    tables: &'t mut HashMap<String, MemoryTable>,
    name: &str,
) -> Result<&'t mut MemoryTable, AppError> {
    tables.get_mut(name).ok_or_else(|| {
        AppError::query(format!("relation \"{}\" does not exist", name), name)
    })
}

/// Resolves column references against one table and its alias.
struct Scope<'t> {
    table: &'t MemoryTable,
    reference: &'t TableRef,
}

impl<'t> Scope<'t> {
    fn new(table: &'t MemoryTable, reference: &'t TableRef) -> Self {
        Self { table, reference }
    }

    fn check_qualifier(&self, qualifier: Option<&str>) -> Result<(), AppError> {
        match qualifier {
            Some(qualifier) if qualifier != self.reference.alias_or_name() => Err(AppError::query(
                format!("missing FROM-clause entry for table \"{}\"", qualifier),
                self.table.name.clone(),
            )),
            _ => Ok(()),
        }
    }

    fn resolve<'c>(&self, column: &'c ColumnRef) -> Result<&'c str, AppError> {
        self.check_qualifier(column.table.as_deref())?;
        self.table.check_column(&column.column)?;
        Ok(&column.column)
    }

    /// Validates a condition tree up front, so errors do not depend on
    /// whether the table holds any rows.
    fn check(&self, condition: &Condition) -> Result<(), AppError> {
        match condition {
            Condition::Compare { column, .. }
            | Condition::IsNull(column)
            | Condition::IsNotNull(column)
            | Condition::In { column, .. } => {
                self.resolve(column)?;
            }
            Condition::And(items) | Condition::Or(items) => {
                for item in items {
                    self.check(item)?;
                }
            }
            Condition::Not(inner) => self.check(inner)?,
            Condition::Raw { sql, .. } => return Err(raw_rejected(sql)),
        }
        Ok(())
    }

    fn check_projections(&self, projections: &[Projection]) -> Result<(), AppError> {
        for projection in projections {
            match projection {
                Projection::Column { column, .. } => {
                    self.resolve(column)?;
                }
                Projection::All(qualifier) => self.check_qualifier(qualifier.as_deref())?,
                Projection::Count | Projection::Literal(_) => {}
            }
        }
        Ok(())
    }

    fn value<'r>(&self, row: &'r Values, column: &ColumnRef) -> Result<&'r JsonValue, AppError> {
        let name = self.resolve(column)?;
        Ok(row.get(name).unwrap_or(&JsonValue::Null))
    }

    fn matches(&self, row: &Values, condition: &Condition) -> Result<bool, AppError> {
        Ok(match condition {
            // Rendered as IS NULL / IS NOT NULL
            Condition::Compare { column, op, value } if value.is_null() => {
                let actual = self.value(row, column)?;
                match op {
                    Operator::Eq => actual.is_null(),
                    Operator::NotEq => !actual.is_null(),
                    _ => false,
                }
            }
            Condition::Compare { column, op, value } => {
                let actual = self.value(row, column)?;
                compare(actual, value)
                    .map(|ordering| match op {
                        Operator::Eq => ordering == Ordering::Equal,
                        Operator::NotEq => ordering != Ordering::Equal,
                        Operator::Lt => ordering == Ordering::Less,
                        Operator::Lte => ordering != Ordering::Greater,
                        Operator::Gt => ordering == Ordering::Greater,
                        Operator::Gte => ordering != Ordering::Less,
                    })
                    .unwrap_or(false)
            }
            Condition::IsNull(column) => self.value(row, column)?.is_null(),
            Condition::IsNotNull(column) => !self.value(row, column)?.is_null(),
            Condition::In { column, values } => {
                let actual = self.value(row, column)?;
                values
                    .iter()
                    .any(|v| compare(actual, v) == Some(Ordering::Equal))
            }
            Condition::And(items) => {
                for item in items {
                    if !self.matches(row, item)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Or(items) => {
                for item in items {
                    if self.matches(row, item)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not(inner) => !self.matches(row, inner)?,
            Condition::Raw { sql, .. } => return Err(raw_rejected(sql)),
        })
    }

    fn filter(&self, condition: &Option<Condition>) -> Result<Vec<usize>, AppError> {
        if let Some(condition) = condition {
            self.check(condition)?;
        }
        let mut matched = Vec::new();
        for (idx, row) in self.table.rows.iter().enumerate() {
            let keep = match condition {
                Some(condition) => self.matches(row, condition)?,
                None => true,
            };
            if keep {
                matched.push(idx);
            }
        }
        Ok(matched)
    }

    fn project(&self, row: &Values, projections: &[Projection]) -> Result<Row, AppError> {
        if projections.is_empty() {
            return Ok(Row::new(row.clone()));
        }
        let mut out = Values::new();
        for projection in projections {
            match projection {
                Projection::Column { column, alias } => {
                    let value = self.value(row, column)?.clone();
                    let key = alias.clone().unwrap_or_else(|| column.column.clone());
                    out.insert(key, value);
                }
                Projection::All(_) => out.extend(row.clone()),
                Projection::Literal(value) => {
                    out.insert("?column?".to_string(), JsonValue::from(*value));
                }
                Projection::Count => {
                    return Err(AppError::query(
                        "count(*) cannot be mixed with row projections",
                        self.table.name.clone(),
                    ))
                }
            }
        }
        Ok(Row::new(out))
    }

    fn project_all(&self, indexes: &[usize], projections: &[Projection]) -> Result<Vec<Row>, AppError> {
        self.check_projections(projections)?;
        indexes
            .iter()
            .map(|&idx| self.project(&self.table.rows[idx], projections))
            .collect()
    }
}

fn raw_rejected(sql: &str) -> AppError {
    AppError::query(
        "raw SQL conditions are not supported by the memory backend",
        sql.to_string(),
    )
}

/// SQL-style comparison. `None` when either side is NULL or the types differ.
fn compare(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        (JsonValue::Array(_), JsonValue::Array(_)) | (JsonValue::Object(_), JsonValue::Object(_)) => {
            (left == right).then_some(Ordering::Equal)
        }
        _ => None,
    }
}

fn run_select(tables: &HashMap<String, MemoryTable>, select: &Select) -> Result<Vec<Row>, AppError> {
    let table = lookup(tables, &select.table.name)?;
    let scope = Scope::new(table, &select.table);
    scope.check_projections(&select.columns)?;
    let mut matched = scope.filter(&select.condition)?;

    if select.columns.iter().any(|p| matches!(p, Projection::Count)) {
        let mut row = Values::new();
        row.insert("count".to_string(), JsonValue::from(matched.len()));
        return Ok(vec![Row::new(row)]);
    }

    if !select.order_by.is_empty() {
        for (column, _) in &select.order_by {
            scope.resolve(column)?;
        }
        matched.sort_by(|&a, &b| {
            let (a, b) = (&table.rows[a], &table.rows[b]);
            for (column, order) in &select.order_by {
                let left = a.get(&column.column).unwrap_or(&JsonValue::Null);
                let right = b.get(&column.column).unwrap_or(&JsonValue::Null);
                // NULLs sort last in ascending order, like PostgreSQL
                let ordering = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
                };
                let ordering = match order {
                    Order::Asc => ordering,
                    Order::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    let window: Vec<usize> = matched
        .into_iter()
        .skip(select.offset as usize)
        .take(select.limit.map_or(usize::MAX, |l| l as usize))
        .collect();

    scope.project_all(&window, &select.columns)
}

fn run_insert(tables: &mut HashMap<String, MemoryTable>, insert: &Insert) -> Result<Vec<Row>, AppError> {
    let table = lookup_mut(tables, &insert.table.name)?;
    Scope::new(table, &insert.table).check_projections(&insert.returning)?;
    let row = table.build_row(insert.values.clone())?;
    table.rows.push(row);

    let table = &*table;
    let scope = Scope::new(table, &insert.table);
    if insert.returning.is_empty() {
        return Ok(Vec::new());
    }
    scope.project_all(&[table.rows.len() - 1], &insert.returning)
}

fn run_update(tables: &mut HashMap<String, MemoryTable>, update: &Update) -> Result<Vec<Row>, AppError> {
    if update.sets.is_empty() {
        return Err(AppError::query(
            "UPDATE requires at least one value to set",
            update.table.name.clone(),
        ));
    }

    let table = lookup_mut(tables, &update.table.name)?;
    for name in update.sets.keys() {
        table.check_column(name)?;
    }

    let scope = Scope::new(table, &update.table);
    scope.check_projections(&update.returning)?;
    let matched = scope.filter(&update.condition)?;
    for &idx in &matched {
        for (name, value) in &update.sets {
            table.rows[idx].insert(name.clone(), value.clone());
        }
    }

    if update.returning.is_empty() {
        return Ok(Vec::new());
    }
    Scope::new(table, &update.table).project_all(&matched, &update.returning)
}

fn run_delete(tables: &mut HashMap<String, MemoryTable>, delete: &Delete) -> Result<Vec<Row>, AppError> {
    let table = lookup_mut(tables, &delete.table.name)?;
    let matched = Scope::new(table, &delete.table).filter(&delete.condition)?;

    let returned = if delete.returning.is_empty() {
        Vec::new()
    } else {
        Scope::new(table, &delete.table).project_all(&matched, &delete.returning)?
    };

    let mut idx = 0;
    table.rows.retain(|_| {
        let keep = !matched.contains(&idx);
        idx += 1;
        keep
    });

    Ok(returned)
}
