//! Identity column sets and their values.

use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::store::Values;

/// Ordered, non-empty set of columns identifying a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    columns: Vec<String>,
}

impl Key {
    /// Creates a key, rejecting empty and duplicate column lists.
    pub fn new<I, S>(columns: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(AppError::Configuration("a key needs at least one column".into()));
        }
        for (i, column) in columns.iter().enumerate() {
            if column.is_empty() {
                return Err(AppError::Configuration("key column names cannot be empty".into()));
            }
            if columns[..i].contains(column) {
                return Err(AppError::Configuration(format!(
                    "duplicate key column '{}'",
                    column
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false; present for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Aligns a caller-given identity value with this key's columns.
    ///
    /// A single-column key takes a scalar (or a one-element array); a
    /// composite key takes an array of exactly `len()` values.
    pub fn expand_with(&self, value: &JsonValue) -> Result<KeyValue, AppError> {
        let values = match value {
            JsonValue::Array(items) => items.clone(),
            JsonValue::Object(_) => {
                return Err(AppError::query(
                    "a mapping cannot be used as an identity value",
                    value.to_string(),
                ))
            }
            scalar => vec![scalar.clone()],
        };

        if values.len() != self.columns.len() {
            return Err(AppError::query(
                format!(
                    "key ({}) expects {} value(s), got {}",
                    self.columns.join(", "),
                    self.columns.len(),
                    values.len()
                ),
                value.to_string(),
            ));
        }
        Ok(KeyValue { values })
    }

    /// Reads this key's values out of a row mapping.
    ///
    /// Table qualifiers are ignored, so `t.id` reads the `id` entry.
    pub fn extract_from(&self, row: &Values) -> Result<KeyValue, AppError> {
        let values = self
            .columns
            .iter()
            .map(|column| {
                let name = unqualified(column);
                row.get(name).cloned().ok_or_else(|| {
                    AppError::query(
                        format!("row has no value for key column '{}'", name),
                        column.clone(),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KeyValue { values })
    }
}

/// Column name without its table qualifier.
pub(crate) fn unqualified(column: &str) -> &str {
    column.rsplit_once('.').map_or(column, |(_, name)| name)
}

/// Values aligned positionally with a [`Key`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    values: Vec<JsonValue>,
}

impl KeyValue {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<&JsonValue> {
        self.values.first()
    }

    pub fn values(&self) -> &[JsonValue] {
        &self.values
    }

    /// The bare identity value: the single value for one-column keys, an
    /// array otherwise.
    pub fn to_json(&self) -> JsonValue {
        match self.values.as_slice() {
            [single] => single.clone(),
            values => JsonValue::Array(values.to_vec()),
        }
    }

    pub fn into_json(self) -> JsonValue {
        let mut values = self.values;
        if values.len() == 1 {
            values.remove(0)
        } else {
            JsonValue::Array(values)
        }
    }
}

impl From<KeyValue> for JsonValue {
    fn from(key: KeyValue) -> Self {
        key.into_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_rejects_empty_and_duplicates() {
        assert!(Key::new(Vec::<String>::new()).is_err());
        assert!(Key::new(["id", "id"]).is_err());
        assert!(Key::new(["foo", "status"]).is_ok());
    }

    #[test]
    fn test_expand_scalar_and_single_element_array() {
        let key = Key::new(["id"]).unwrap();
        assert_eq!(key.expand_with(&json!(3)).unwrap().values(), &[json!(3)]);
        assert_eq!(key.expand_with(&json!([3])).unwrap().values(), &[json!(3)]);
    }

    #[test]
    fn test_expand_arity_mismatch() {
        let key = Key::new(["foo", "status"]).unwrap();
        assert!(key.expand_with(&json!(2)).is_err());
        assert!(key.expand_with(&json!([2, 1, 0])).is_err());
        assert_eq!(key.expand_with(&json!([2, 1])).unwrap().len(), 2);
    }

    #[test]
    fn test_extract_strips_qualifier() {
        let key = Key::new(["t.id"]).unwrap();
        let row = json!({"id": 5, "foo": 1}).as_object().cloned().unwrap();
        assert_eq!(key.extract_from(&row).unwrap().into_json(), json!(5));
    }

    #[test]
    fn test_extract_missing_column() {
        let key = Key::new(["foo", "status"]).unwrap();
        let row = json!({"foo": 1}).as_object().cloned().unwrap();
        assert!(matches!(
            key.extract_from(&row),
            Err(AppError::Query { .. })
        ));
    }

    #[test]
    fn test_key_value_json_shape() {
        let key = Key::new(["foo", "status"]).unwrap();
        let value = key.expand_with(&json!([2, 1])).unwrap();
        assert_eq!(value.to_json(), json!([2, 1]));
        assert_eq!(value.first(), Some(&json!(2)));
    }
}
