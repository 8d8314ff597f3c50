//! Normalizes caller filters and identity values into conditions.

use serde_json::Value as JsonValue;

use crate::definition::{Key, KeyValue};
use crate::error::AppError;
use crate::store::{ColumnRef, Condition, Operator, Values};

/// A caller-supplied filter.
///
/// Built from a [`Condition`], a column → value mapping (equality on every
/// pair, AND-ed) or nothing at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Criteria {
    #[default]
    None,
    Values(Vec<(String, JsonValue)>),
    Condition(Condition),
}

impl Criteria {
    /// Equality pair for [`Criteria::Values`].
    pub fn pair(column: impl Into<String>, value: impl Into<JsonValue>) -> (String, JsonValue) {
        (column.into(), value.into())
    }

    /// Reads criteria from JSON: `null` is no filter, an object is a mapping.
    ///
    /// Any other value is rejected, since it cannot name the columns to filter on.
    pub fn from_json(value: JsonValue) -> Result<Self, AppError> {
        match value {
            JsonValue::Null => Ok(Self::None),
            JsonValue::Object(map) => Ok(Self::from(map)),
            other => Err(AppError::query(
                "criteria must be a mapping of column names to values or a condition",
                other.to_string(),
            )),
        }
    }

    /// The WHERE predicate, or `None` when nothing filters.
    pub fn expand(self) -> Option<Condition> {
        match self {
            Self::None => None,
            Self::Values(pairs) if pairs.is_empty() => None,
            Self::Values(mut pairs) if pairs.len() == 1 => pairs
                .pop()
                .map(|(column, value)| Condition::eq(&column, value)),
            Self::Values(pairs) => Some(Condition::And(
                pairs
                    .into_iter()
                    .map(|(column, value)| Condition::eq(&column, value))
                    .collect(),
            )),
            Self::Condition(condition) => Some(condition),
        }
    }
}

impl From<Condition> for Criteria {
    fn from(condition: Condition) -> Self {
        Self::Condition(condition)
    }
}

impl From<Option<Condition>> for Criteria {
    fn from(condition: Option<Condition>) -> Self {
        condition.map_or(Self::None, Self::Condition)
    }
}

impl From<Values> for Criteria {
    fn from(values: Values) -> Self {
        Self::Values(values.into_iter().collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Criteria
where
    K: Into<String>,
    V: Into<JsonValue>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Self::Values(
            pairs
                .into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        )
    }
}

/// An identity value to look a row up by.
///
/// Scalars address single-column keys, arrays and tuples composite ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Id {
    Value(JsonValue),
    Key(KeyValue),
}

impl From<KeyValue> for Id {
    fn from(value: KeyValue) -> Self {
        Self::Key(value)
    }
}

impl From<&KeyValue> for Id {
    fn from(value: &KeyValue) -> Self {
        Self::Key(value.clone())
    }
}

impl From<JsonValue> for Id {
    fn from(value: JsonValue) -> Self {
        Self::Value(value)
    }
}

impl From<Vec<JsonValue>> for Id {
    fn from(values: Vec<JsonValue>) -> Self {
        Self::Value(JsonValue::Array(values))
    }
}

macro_rules! id_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Id {
                fn from(value: $ty) -> Self {
                    Self::Value(JsonValue::from(value))
                }
            }
        )*
    };
}

id_from_scalar!(i32, i64, u32, u64, &str, String);

impl<A: Into<JsonValue>, B: Into<JsonValue>> From<(A, B)> for Id {
    fn from((a, b): (A, B)) -> Self {
        Self::Value(JsonValue::Array(vec![a.into(), b.into()]))
    }
}

impl<A: Into<JsonValue>, B: Into<JsonValue>, C: Into<JsonValue>> From<(A, B, C)> for Id {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Value(JsonValue::Array(vec![a.into(), b.into(), c.into()]))
    }
}

/// One equality per key column, zipped with the expanded identity value.
///
/// Columns already containing a `.` keep their own qualifier; the others are
/// qualified with `table_alias`.
pub fn expand_key(key: &Key, id: impl Into<Id>, table_alias: &str) -> Result<Condition, AppError> {
    let value = match id.into() {
        Id::Value(value) => key.expand_with(&value)?,
        Id::Key(value) if value.len() == key.len() => value,
        Id::Key(value) => {
            return Err(AppError::query(
                format!(
                    "key ({}) expects {} value(s), got {}",
                    key.columns().join(", "),
                    key.len(),
                    value.len()
                ),
                value.to_json().to_string(),
            ))
        }
    };

    let conditions = key
        .columns()
        .iter()
        .zip(value.values())
        .map(|(column, value)| {
            let column = if column.contains('.') {
                ColumnRef::parse(column)
            } else {
                ColumnRef::qualified(table_alias, column.as_str())
            };
            Condition::compare(column, Operator::Eq, value.clone())
        })
        .collect();

    Ok(Condition::And(conditions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_criteria_adds_nothing() {
        assert_eq!(Criteria::from_json(JsonValue::Null).unwrap().expand(), None);
        assert_eq!(Criteria::default().expand(), None);
    }

    #[test]
    fn test_mapping_is_conjunction() {
        let criteria = Criteria::from_json(json!({"id_user": 1, "status": 0})).unwrap();
        assert_eq!(
            criteria.expand(),
            Some(Condition::And(vec![
                Condition::eq("id_user", 1),
                Condition::eq("status", 0)
            ]))
        );
    }

    #[test]
    fn test_single_pair_matches_explicit_condition() {
        let from_pairs = Criteria::from([("bar", "admin")]).expand();
        let explicit = Criteria::from(Condition::eq("bar", "admin")).expand();
        assert_eq!(from_pairs, explicit);
    }

    #[test]
    fn test_invalid_criteria_names_input() {
        let err = Criteria::from_json(json!(12)).unwrap_err();
        match err {
            AppError::Query { query, .. } => assert_eq!(query, "12"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_expand_key_qualifies_with_alias() {
        let key = Key::new(["foo", "x.status"]).unwrap();
        let condition = expand_key(&key, (2, 1), "t").unwrap();
        assert_eq!(
            condition,
            Condition::And(vec![
                Condition::compare(ColumnRef::qualified("t", "foo"), Operator::Eq, 2),
                Condition::compare(ColumnRef::qualified("x", "status"), Operator::Eq, 1),
            ])
        );
    }

    #[test]
    fn test_expand_key_accepts_key_value() {
        let key = Key::new(["id"]).unwrap();
        let value = key.expand_with(&json!(3)).unwrap();
        assert!(expand_key(&key, &value, "t").is_ok());

        let composite = Key::new(["foo", "status"]).unwrap();
        assert!(expand_key(&composite, value, "t").is_err());
    }

    #[test]
    fn test_nested_single_value_is_the_same_id() {
        let key = Key::new(["id"]).unwrap();
        assert_eq!(
            expand_key(&key, 2, "t").unwrap(),
            expand_key(&key, json!([2]), "t").unwrap()
        );
    }
}
