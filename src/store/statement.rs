//! Statement builders for SELECT, INSERT, UPDATE and DELETE.
//!
//! Statements are plain data. Backends either render them to SQL
//! (see [`crate::store::sql`]) or evaluate them directly.

use serde_json::Value as JsonValue;

use crate::store::row::Values;

/// A table reference with optional schema and alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub schema: Option<String>,
    pub alias: Option<String>,
}

impl TableRef {
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

    /// Drops the alias, for commands whose syntax cannot alias their target.
    pub fn bare(&self) -> Self {
        Self {
            name: self.name.clone(),
            schema: self.schema.clone(),
            alias: None,
        }
    }

    /// The name columns must be qualified with to reference this table.
    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A possibly table-qualified column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Parses `table.column` or `column`, splitting on the last `.`.
    pub fn parse(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((table, column)) => Self::qualified(table, column),
            None => Self::new(name),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
        }
    }
}

/// A WHERE predicate tree.
///
/// An empty `And` always holds and an empty `Or` never does.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: ColumnRef,
        op: Operator,
        value: JsonValue,
    },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
    In {
        column: ColumnRef,
        values: Vec<JsonValue>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// Backend-specific SQL referencing `params` as `$1`..`$n`.
    Raw {
        sql: String,
        params: Vec<JsonValue>,
    },
}

impl Condition {
    pub fn compare(column: ColumnRef, op: Operator, value: impl Into<JsonValue>) -> Self {
        Self::Compare {
            column,
            op,
            value: value.into(),
        }
    }

    /// Equality on a column given as `column` or `table.column`.
    pub fn eq(column: &str, value: impl Into<JsonValue>) -> Self {
        Self::compare(ColumnRef::parse(column), Operator::Eq, value)
    }

    pub fn raw(sql: impl Into<String>, params: Vec<JsonValue>) -> Self {
        Self::Raw {
            sql: sql.into(),
            params,
        }
    }

    /// Conjunction of this condition with another, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::And(mut left), Condition::And(right)) => {
                left.extend(right);
                Condition::And(left)
            }
            (Condition::And(mut left), other) => {
                left.push(other);
                Condition::And(left)
            }
            (this, Condition::And(mut right)) => {
                right.insert(0, this);
                Condition::And(right)
            }
            (this, other) => Condition::And(vec![this, other]),
        }
    }

    /// Disjunction of this condition with another.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut left) => {
                left.push(other);
                Condition::Or(left)
            }
            this => Condition::Or(vec![this, other]),
        }
    }
}

/// A column list entry for SELECT or RETURNING.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    /// `table.*`, or `*` when no table is given.
    All(Option<String>),
    /// `count(*)`, exposed as the `count` column.
    Count,
    Literal(i64),
}

impl Projection {
    pub fn column(column: ColumnRef) -> Self {
        Self::Column {
            column,
            alias: None,
        }
    }

    pub fn aliased(column: ColumnRef, alias: impl Into<String>) -> Self {
        Self::Column {
            column,
            alias: Some(alias.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// SELECT builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: TableRef,
    pub columns: Vec<Projection>,
    pub condition: Option<Condition>,
    pub order_by: Vec<(ColumnRef, Order)>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Select {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
            condition: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    pub fn column(mut self, projection: Projection) -> Self {
        self.columns.push(projection);
        self
    }

    /// Adds a predicate, AND-ed with any existing one.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn order_by(mut self, column: ColumnRef, order: Order) -> Self {
        self.order_by.push((column, order));
        self
    }

    /// Sets LIMIT and OFFSET. A limit of zero means no limit.
    pub fn range(mut self, limit: u64, offset: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self.offset = offset;
        self
    }

    /// The same SELECT reduced to `count(*)` over all matching rows.
    pub fn to_count(&self) -> Self {
        Self {
            table: self.table.clone(),
            columns: vec![Projection::Count],
            condition: self.condition.clone(),
            order_by: Vec::new(),
            limit: None,
            offset: 0,
        }
    }
}

/// INSERT builder. The target is never aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableRef,
    pub values: Values,
    pub returning: Vec<Projection>,
}

impl Insert {
    pub fn new(table: TableRef) -> Self {
        Self {
            table: table.bare(),
            values: Values::new(),
            returning: Vec::new(),
        }
    }

    pub fn values(mut self, values: Values) -> Self {
        self.values.extend(values);
        self
    }

    pub fn returning(mut self, projection: Projection) -> Self {
        self.returning.push(projection);
        self
    }
}

/// UPDATE builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: TableRef,
    pub sets: Values,
    pub condition: Option<Condition>,
    pub returning: Vec<Projection>,
}

impl Update {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            sets: Values::new(),
            condition: None,
            returning: Vec::new(),
        }
    }

    pub fn sets(mut self, values: Values) -> Self {
        self.sets.extend(values);
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn returning(mut self, projection: Projection) -> Self {
        self.returning.push(projection);
        self
    }
}

/// DELETE builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: TableRef,
    pub condition: Option<Condition>,
    pub returning: Vec<Projection>,
}

impl Delete {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            condition: None,
            returning: Vec::new(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn returning(mut self, projection: Projection) -> Self {
        self.returning.push(projection);
        self
    }
}

/// Any statement an executor can run.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// Short name of the statement kind, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
        }
    }

    pub fn table(&self) -> &TableRef {
        match self {
            Statement::Select(s) => &s.table,
            Statement::Insert(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
        }
    }
}

impl From<Select> for Statement {
    fn from(select: Select) -> Self {
        Statement::Select(select)
    }
}

impl From<Insert> for Statement {
    fn from(insert: Insert) -> Self {
        Statement::Insert(insert)
    }
}

impl From<Update> for Statement {
    fn from(update: Update) -> Self {
        Statement::Update(update)
    }
}

impl From<Delete> for Statement {
    fn from(delete: Delete) -> Self {
        Statement::Delete(delete)
    }
}
