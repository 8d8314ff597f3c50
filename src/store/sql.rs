//! Renders statements to PostgreSQL text through `sea_query`.
//!
//! Values are never interpolated: every value becomes a `$n` parameter.
//! Identifiers are always double-quoted so reserved words (e.g. `user`)
//! work as table or column names.

use sea_query::{
    Alias, DeleteStatement, DynIden, Expr, ExprTrait, Func, InsertStatement, IntoIden,
    Order as SeaOrder, PostgresQueryBuilder, Query, QueryStatementWriter, ReturningClause,
    SelectStatement, SimpleExpr, UpdateStatement, Value as SeaValue,
};
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::store::statement::{
    ColumnRef, Condition, Delete, Insert, Operator, Order, Projection, Select, Statement, TableRef,
    Update,
};

/// Rendered SQL and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<JsonValue>,
}

/// Renders a statement to SQL with `$n` placeholders.
pub fn render(statement: &Statement) -> Result<RenderedSql, AppError> {
    let (sql, values) = match statement {
        Statement::Select(select) => build_select(select)?.build(PostgresQueryBuilder),
        Statement::Insert(insert) => build_insert(insert)?.build(PostgresQueryBuilder),
        Statement::Update(update) => build_update(update)?.build(PostgresQueryBuilder),
        Statement::Delete(delete) => build_delete(delete)?.build(PostgresQueryBuilder),
    };
    let params = values
        .0
        .into_iter()
        .map(|value| to_json(value, &sql))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RenderedSql { sql, params })
}

// ----------------------------------------------------------------------------
// Values
// ----------------------------------------------------------------------------

/// Wraps a JSON value so it survives the builder untouched.
fn param(value: JsonValue) -> SeaValue {
    SeaValue::Json(Some(Box::new(value)))
}

/// Recovers the JSON parameter, including LIMIT and OFFSET counts.
fn to_json(value: SeaValue, sql: &str) -> Result<JsonValue, AppError> {
    Ok(match value {
        SeaValue::Json(value) => value.map_or(JsonValue::Null, |v| *v),
        SeaValue::BigUnsigned(value) => value.map_or(JsonValue::Null, JsonValue::from),
        SeaValue::BigInt(value) => value.map_or(JsonValue::Null, JsonValue::from),
        SeaValue::Unsigned(value) => value.map_or(JsonValue::Null, JsonValue::from),
        SeaValue::Int(value) => value.map_or(JsonValue::Null, JsonValue::from),
        SeaValue::Bool(value) => value.map_or(JsonValue::Null, JsonValue::Bool),
        SeaValue::String(value) => value.map_or(JsonValue::Null, |v| JsonValue::String(*v)),
        other => {
            return Err(AppError::query(
                format!("unsupported parameter {:?}", other),
                sql.to_string(),
            ))
        }
    })
}

// ----------------------------------------------------------------------------
// Names
// ----------------------------------------------------------------------------

fn iden(name: &str) -> DynIden {
    Alias::new(name).into_iden()
}

fn table_ref(table: &TableRef) -> sea_query::TableRef {
    use sea_query::TableRef as T;

    match (&table.schema, &table.alias) {
        (Some(schema), Some(alias)) => {
            T::SchemaTableAlias(iden(schema), iden(&table.name), iden(alias))
        }
        (Some(schema), None) => T::SchemaTable(iden(schema), iden(&table.name)),
        (None, Some(alias)) => T::TableAlias(iden(&table.name), iden(alias)),
        (None, None) => T::Table(iden(&table.name)),
    }
}

/// Maps `column`, `table.column` and `schema.table.column`, with `*` for all.
fn column_ref(column: &ColumnRef) -> sea_query::ColumnRef {
    use sea_query::ColumnRef as C;

    let all = column.column == "*";
    let Some(qualifier) = column.table.as_deref() else {
        return if all {
            C::Asterisk
        } else {
            C::Column(iden(&column.column))
        };
    };
    match qualifier.rsplit_once('.') {
        Some((_, table)) if all => C::TableAsterisk(iden(table)),
        None if all => C::TableAsterisk(iden(qualifier)),
        Some((schema, table)) => {
            C::SchemaTableColumn(iden(schema), iden(table), iden(&column.column))
        }
        None => C::TableColumn(iden(qualifier), iden(&column.column)),
    }
}

fn projection_ref(projection: &Projection) -> Option<sea_query::ColumnRef> {
    match projection {
        Projection::Column { column, alias: None } => Some(column_ref(column)),
        Projection::All(Some(table)) => Some(sea_query::ColumnRef::TableAsterisk(iden(table))),
        Projection::All(None) => Some(sea_query::ColumnRef::Asterisk),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Conditions
// ----------------------------------------------------------------------------

fn condition(cond: &Condition) -> Result<SimpleExpr, AppError> {
    Ok(match cond {
        Condition::Compare { column, op, value } => {
            let column = Expr::col(column_ref(column));
            match (op, value.is_null()) {
                (Operator::Eq, true) => column.is_null(),
                (Operator::NotEq, true) => column.is_not_null(),
                (Operator::Eq, false) => column.eq(param(value.clone())),
                (Operator::NotEq, false) => column.ne(param(value.clone())),
                (Operator::Lt, _) => column.lt(param(value.clone())),
                (Operator::Lte, _) => column.lte(param(value.clone())),
                (Operator::Gt, _) => column.gt(param(value.clone())),
                (Operator::Gte, _) => column.gte(param(value.clone())),
            }
        }
        Condition::IsNull(column) => Expr::col(column_ref(column)).is_null(),
        Condition::IsNotNull(column) => Expr::col(column_ref(column)).is_not_null(),
        Condition::In { values, .. } if values.is_empty() => Expr::cust("FALSE"),
        Condition::In { column, values } => {
            Expr::col(column_ref(column)).is_in(values.iter().cloned().map(param))
        }
        Condition::And(items) => group(items, |a, b| a.and(b), "TRUE")?,
        Condition::Or(items) => group(items, |a, b| a.or(b), "FALSE")?,
        Condition::Not(inner) => condition(inner)?.not(),
        Condition::Raw { sql, params } => {
            check_placeholders(sql, params.len())?;
            Expr::cust_with_values(sql.as_str(), params.iter().cloned().map(param))
        }
    })
}

fn group(
    items: &[Condition],
    join: fn(SimpleExpr, SimpleExpr) -> SimpleExpr,
    empty: &str,
) -> Result<SimpleExpr, AppError> {
    let mut exprs = items.iter().map(condition);
    let Some(first) = exprs.next() else {
        return Ok(Expr::cust(empty.to_string()));
    };
    exprs.try_fold(first?, |acc, next| Ok(join(acc, next?)))
}

/// Checks that a raw expression references `$1..$n` within its own
/// parameters and uses each of them.
///
/// Quoted text is skipped and `$$` is a literal `$`. Anything else, such as
/// the jsonb `?` operator, passes through unchanged.
fn check_placeholders(sql: &str, count: usize) -> Result<(), AppError> {
    let mut used = vec![false; count];
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                for next in chars.by_ref() {
                    if next == c {
                        break;
                    }
                }
            }
            '$' if chars.peek() == Some(&'$') => {
                chars.next();
            }
            '$' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(d);
                    chars.next();
                }
                let slot = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|n| used.get_mut(n))
                    .ok_or_else(|| {
                        AppError::query(
                            format!("raw expression references ${} with {} parameters", digits, count),
                            sql.to_string(),
                        )
                    })?;
                *slot = true;
            }
            _ => {}
        }
    }
    if used.iter().any(|used| !used) {
        return Err(AppError::query(
            "raw expression has unused parameters",
            sql.to_string(),
        ));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

fn returning(projections: &[Projection], table: &TableRef) -> Result<ReturningClause, AppError> {
    let columns = projections
        .iter()
        .map(|projection| {
            projection_ref(projection).ok_or_else(|| {
                AppError::query(
                    format!("unsupported RETURNING entry {:?}", projection),
                    table.name.clone(),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Query::returning().columns(columns))
}

fn build_select(select: &Select) -> Result<SelectStatement, AppError> {
    let mut query = Query::select();
    query.from(table_ref(&select.table));

    if select.columns.is_empty() {
        query.column(sea_query::ColumnRef::Asterisk);
    }
    for projection in &select.columns {
        match projection {
            Projection::Column {
                column,
                alias: Some(alias),
            } => {
                query.expr_as(Expr::col(column_ref(column)), Alias::new(alias));
            }
            Projection::Count => {
                query.expr_as(
                    Func::count(Expr::col(sea_query::ColumnRef::Asterisk)),
                    Alias::new("count"),
                );
            }
            Projection::Literal(value) => {
                query.expr(Expr::cust(value.to_string()));
            }
            other => {
                if let Some(column) = projection_ref(other) {
                    query.column(column);
                }
            }
        }
    }

    if let Some(filter) = &select.condition {
        query.and_where(condition(filter)?);
    }
    for (column, order) in &select.order_by {
        let order = match order {
            Order::Asc => SeaOrder::Asc,
            Order::Desc => SeaOrder::Desc,
        };
        query.order_by(column_ref(column), order);
    }
    if let Some(limit) = select.limit {
        query.limit(limit);
    }
    if select.offset > 0 {
        query.offset(select.offset);
    }
    Ok(query)
}

fn build_insert(insert: &Insert) -> Result<InsertStatement, AppError> {
    let mut query = Query::insert();
    query.into_table(table_ref(&insert.table));

    if insert.values.is_empty() {
        query.or_default_values();
    } else {
        query.columns(insert.values.keys().map(|name| Alias::new(name)));
        query
            .values(
                insert
                    .values
                    .values()
                    .map(|value| SimpleExpr::Value(param(value.clone()))),
            )
            .map_err(|e| AppError::query(e.to_string(), insert.table.name.clone()))?;
    }
    if !insert.returning.is_empty() {
        query.returning(returning(&insert.returning, &insert.table)?);
    }
    Ok(query)
}

fn build_update(update: &Update) -> Result<UpdateStatement, AppError> {
    if update.sets.is_empty() {
        return Err(AppError::query(
            "UPDATE requires at least one value to set",
            update.table.name.clone(),
        ));
    }

    let mut query = Query::update();
    query.table(table_ref(&update.table));
    query.values(
        update
            .sets
            .iter()
            .map(|(name, value)| (Alias::new(name), SimpleExpr::Value(param(value.clone())))),
    );
    if let Some(filter) = &update.condition {
        query.and_where(condition(filter)?);
    }
    if !update.returning.is_empty() {
        query.returning(returning(&update.returning, &update.table)?);
    }
    Ok(query)
}

fn build_delete(delete: &Delete) -> Result<DeleteStatement, AppError> {
    let mut query = Query::delete();
    query.from_table(table_ref(&delete.table));
    if let Some(filter) = &delete.condition {
        query.and_where(condition(filter)?);
    }
    if !delete.returning.is_empty() {
        query.returning(returning(&delete.returning, &delete.table)?);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::row::Values;
    use serde_json::json;

    fn table() -> TableRef {
        TableRef::new("some_entity").with_alias("t")
    }

    #[test]
    fn test_render_select_with_condition_and_range() {
        let select = Select::new(table())
            .column(Projection::aliased(ColumnRef::qualified("t", "id"), "id"))
            .filter(Condition::eq("t.id", 1))
            .range(1, 0);

        let rendered = render(&select.into()).unwrap();
        assert_eq!(
            rendered.sql,
            r#"SELECT "t"."id" AS "id" FROM "some_entity" AS "t" WHERE "t"."id" = $1 LIMIT $2"#
        );
        assert_eq!(rendered.params, vec![json!(1), json!(1)]);
    }

    #[test]
    fn test_render_select_all_columns() {
        let select = Select::new(table()).column(Projection::All(Some("t".into())));
        let rendered = render(&select.into()).unwrap();
        assert_eq!(rendered.sql, r#"SELECT "t".* FROM "some_entity" AS "t""#);
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn test_render_or_of_ands() {
        let condition = Condition::Or(vec![
            Condition::And(vec![Condition::eq("foo", 2), Condition::eq("status", 1)]),
            Condition::And(vec![Condition::eq("foo", 23), Condition::eq("status", 0)]),
        ]);
        let select = Select::new(table()).filter(condition);
        let rendered = render(&select.into()).unwrap();
        assert!(rendered.sql.contains(r#""foo" = $1 AND "status" = $2"#));
        assert!(rendered.sql.contains(" OR "));
        assert_eq!(rendered.params, vec![json!(2), json!(1), json!(23), json!(0)]);
    }

    #[test]
    fn test_render_null_equality() {
        let select = Select::new(table())
            .filter(Condition::eq("bar", JsonValue::Null))
            .filter(Condition::compare(ColumnRef::new("foo"), Operator::NotEq, JsonValue::Null));
        let rendered = render(&select.into()).unwrap();
        assert!(rendered.sql.contains(r#""bar" IS NULL"#));
        assert!(rendered.sql.contains(r#""foo" IS NOT NULL"#));
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn test_render_empty_groups() {
        let select = Select::new(table()).filter(Condition::Or(Vec::new()));
        let rendered = render(&select.into()).unwrap();
        assert!(rendered.sql.ends_with("WHERE FALSE"));

        let select = Select::new(table()).filter(Condition::And(Vec::new()));
        let rendered = render(&select.into()).unwrap();
        assert!(rendered.sql.ends_with("WHERE TRUE"));
    }

    #[test]
    fn test_render_raw_numbers_after_earlier_params() {
        let select = Select::new(table())
            .filter(Condition::eq("bar", "x"))
            .filter(Condition::raw("id_user = $1 AND foo > $2", vec![json!(1), json!(3)]));
        let rendered = render(&select.into()).unwrap();
        assert!(rendered.sql.contains("id_user = $2 AND foo > $3"));
        assert_eq!(rendered.params, vec![json!("x"), json!(1), json!(3)]);
    }

    #[test]
    fn test_render_raw_keeps_jsonb_operator() {
        let select = Select::new(table())
            .filter(Condition::raw("payload ? 'k' AND id = $1", vec![json!(1)]));
        let rendered = render(&select.into()).unwrap();
        assert!(rendered.sql.contains("payload ? 'k' AND id = $1"));
        assert_eq!(rendered.params, vec![json!(1)]);
    }

    #[test]
    fn test_render_raw_placeholder_mismatch() {
        let missing = Select::new(table()).filter(Condition::raw("a = $1", Vec::new()));
        assert!(render(&missing.into()).is_err());

        let unused = Select::new(table()).filter(Condition::raw("a = 1", vec![json!(1)]));
        assert!(render(&unused.into()).is_err());

        let quoted = Select::new(table()).filter(Condition::raw("a = '$1'", Vec::new()));
        assert!(render(&quoted.into()).is_ok());
    }

    #[test]
    fn test_render_insert_returning() {
        let mut values = Values::new();
        values.insert("foo".into(), json!(113));
        values.insert("bar".into(), json!("created"));
        let insert = Insert::new(table())
            .values(values)
            .returning(Projection::column(ColumnRef::qualified("some_entity", "id")));

        let rendered = render(&insert.into()).unwrap();
        assert_eq!(
            rendered.sql,
            r#"INSERT INTO "some_entity" ("foo", "bar") VALUES ($1, $2) RETURNING "some_entity"."id""#
        );
        assert_eq!(rendered.params, vec![json!(113), json!("created")]);
    }

    #[test]
    fn test_render_update_and_delete() {
        let mut values = Values::new();
        values.insert("status".into(), json!(112));
        let update = Update::new(table())
            .sets(values)
            .filter(Condition::compare(
                ColumnRef::qualified("t", "id"),
                Operator::Eq,
                9,
            ))
            .returning(Projection::column(ColumnRef::qualified("t", "id")));
        let rendered = render(&update.into()).unwrap();
        assert_eq!(
            rendered.sql,
            r#"UPDATE "some_entity" AS "t" SET "status" = $1 WHERE "t"."id" = $2 RETURNING "t"."id""#
        );
        assert_eq!(rendered.params, vec![json!(112), json!(9)]);

        let delete = Delete::new(table()).filter(Condition::eq("t.id", 11));
        let rendered = render(&delete.into()).unwrap();
        assert_eq!(
            rendered.sql,
            r#"DELETE FROM "some_entity" AS "t" WHERE "t"."id" = $1"#
        );
    }

    #[test]
    fn test_render_count_keeps_filter() {
        let select = Select::new(table())
            .filter(Condition::eq("status", 1))
            .range(5, 10)
            .to_count();
        let rendered = render(&select.into()).unwrap();
        assert_eq!(
            rendered.sql,
            r#"SELECT COUNT(*) AS "count" FROM "some_entity" AS "t" WHERE "status" = $1"#
        );
    }

    #[test]
    fn test_render_update_without_values_fails() {
        let update = Update::new(table());
        assert!(render(&update.into()).is_err());
    }
}
