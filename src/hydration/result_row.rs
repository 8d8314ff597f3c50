//! The row being hydrated.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::definition::{Key, KeyValue};
use crate::error::AppError;
use crate::store::Values;

/// A type-erased lazy value attached to a row.
pub type LazyValue = Arc<dyn Any + Send + Sync>;

/// One fetched row plus the primary key it is identified by.
///
/// Normalizers and lazy initializers read and adjust it before the entity is
/// built from it. The primary key value is extracted at most once.
#[derive(Clone)]
pub struct ResultRow {
    primary_key: Arc<Key>,
    primary_key_value: OnceCell<KeyValue>,
    values: Values,
    lazy: HashMap<String, LazyValue>,
}

impl ResultRow {
    pub fn new(primary_key: Arc<Key>, values: Values) -> Self {
        Self {
            primary_key,
            primary_key_value: OnceCell::new(),
            values,
            lazy: HashMap::new(),
        }
    }

    /// Raw value for a column, `None` if absent.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Typed value for a column; absent and null both give `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                AppError::Internal(format!("failed to deserialize '{}': {}", key, e))
            }),
        }
    }

    /// Whether the key exists, null or not.
    pub fn exists(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.lazy.contains_key(key)
    }

    /// Whether the key exists and is not null.
    pub fn is_set(&self, key: &str) -> bool {
        self.lazy.contains_key(key) || self.values.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        let key = key.into();
        self.lazy.remove(&key);
        self.values.insert(key, value.into());
    }

    /// Attaches a lazy value under `key`, replacing any plain value.
    pub fn set_lazy(&mut self, key: impl Into<String>, value: LazyValue) {
        let key = key.into();
        self.values.remove(&key);
        self.lazy.insert(key, value);
    }

    /// A previously attached lazy value, if it has type `L`.
    pub fn lazy<L: Clone + 'static>(&self, key: &str) -> Option<L> {
        self.lazy.get(key)?.downcast_ref::<L>().cloned()
    }

    /// Replaces all plain values with the callback's result.
    pub fn apply<F>(&mut self, callback: F) -> Result<(), AppError>
    where
        F: FnOnce(Values) -> Result<Values, AppError>,
    {
        let values = std::mem::take(&mut self.values);
        self.values = callback(values)?;
        Ok(())
    }

    pub fn primary_key(&self) -> &Key {
        &self.primary_key
    }

    /// The row's primary key value, extracted on first call.
    pub fn extract_primary_key(&self) -> Result<&KeyValue, AppError> {
        self.primary_key_value
            .get_or_try_init(|| self.primary_key.extract_from(&self.values))
    }

    pub fn extract_key(&self, key: &Key) -> Result<KeyValue, AppError> {
        key.extract_from(&self.values)
    }

    /// Plain values, without lazy ones.
    pub fn to_map(&self) -> Values {
        self.values.clone()
    }

    /// Hands everything over to the entity hydrator.
    pub fn into_values(self) -> RowValues {
        RowValues {
            values: self.values,
            lazy: self.lazy,
        }
    }
}

impl fmt::Debug for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lazy: Vec<&str> = self.lazy.keys().map(String::as_str).collect();
        lazy.sort_unstable();
        f.debug_struct("ResultRow")
            .field("primary_key", &self.primary_key.columns())
            .field("values", &self.values)
            .field("lazy", &lazy)
            .finish()
    }
}

/// Plain and lazy values an entity is built from.
pub struct RowValues {
    values: Values,
    lazy: HashMap<String, LazyValue>,
}

impl RowValues {
    pub fn new(values: Values) -> Self {
        Self {
            values,
            lazy: HashMap::new(),
        }
    }

    /// Typed plain value. Fails if the column is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AppError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| AppError::Internal(format!("column not found: {}", key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| AppError::Internal(format!("failed to deserialize '{}': {}", key, e)))
    }

    /// Typed plain value; absent and null both give `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(_) => self.get(key).map(Some),
        }
    }

    /// Deserializes all plain values at once, e.g. into a `#[derive(Deserialize)]`
    /// struct whose lazy fields are `#[serde(skip)]`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(JsonValue::Object(self.values.clone()))
            .map_err(|e| AppError::Internal(format!("failed to hydrate entity: {}", e)))
    }

    /// Takes the lazy value registered under `key`.
    pub fn take_lazy<L: Clone + 'static>(&mut self, key: &str) -> Result<L, AppError> {
        let value = self.lazy.get(key).ok_or_else(|| {
            AppError::Configuration(format!("no lazy value registered for '{}'", key))
        })?;
        let typed = value.downcast_ref::<L>().cloned().ok_or_else(|| {
            AppError::Configuration(format!(
                "lazy value '{}' is not a {}",
                key,
                std::any::type_name::<L>()
            ))
        })?;
        self.lazy.remove(key);
        Ok(typed)
    }

    pub fn plain(&self) -> &Values {
        &self.values
    }

    pub fn into_plain(self) -> Values {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydration::LazyProperty;
    use serde_json::json;

    fn row(value: JsonValue) -> ResultRow {
        let key = Arc::new(Key::new(["id"]).unwrap());
        ResultRow::new(key, value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_exists_and_is_set() {
        let row = row(json!({"id": 1, "bar": null}));
        assert!(row.exists("bar"));
        assert!(!row.is_set("bar"));
        assert!(row.is_set("id"));
        assert!(!row.exists("baz"));
        assert_eq!(row.get("baz"), None);
    }

    #[test]
    fn test_primary_key_is_memoized() {
        let mut row = row(json!({"id": 1}));
        assert_eq!(row.extract_primary_key().unwrap().to_json(), json!(1));

        row.set("id", 2);
        assert_eq!(row.extract_primary_key().unwrap().to_json(), json!(1));
        let key = Key::new(["id"]).unwrap();
        assert_eq!(row.extract_key(&key).unwrap().to_json(), json!(2));
    }

    #[test]
    fn test_missing_primary_key() {
        let row = row(json!({"foo": 1}));
        assert!(row.extract_primary_key().is_err());
    }

    #[test]
    fn test_apply_replaces_values() {
        let mut row = row(json!({"id": 1, "foo": "a"}));
        row.apply(|mut values| {
            values.insert("foo".into(), json!("b"));
            Ok(values)
        })
        .unwrap();
        assert_eq!(row.get("foo"), Some(&json!("b")));
    }

    #[test]
    fn test_lazy_values_round_trip() {
        let mut row = row(json!({"id": 1, "owner": 3}));
        row.set_lazy("owner", Arc::new(LazyProperty::ready(3_i64)));
        assert!(row.is_set("owner"));
        assert!(row.get("owner").is_none());
        assert!(row.lazy::<LazyProperty<i64>>("owner").is_some());
        assert!(row.lazy::<LazyProperty<String>>("owner").is_none());

        let mut values = row.into_values();
        assert!(values.take_lazy::<LazyProperty<String>>("owner").is_err());
        let owner = values.take_lazy::<LazyProperty<i64>>("owner").unwrap();
        assert_eq!(owner.peek(), Some(&3));
        assert!(values.take_lazy::<LazyProperty<i64>>("owner").is_err());
    }

    #[test]
    fn test_row_values_deserialize() {
        #[derive(serde::Deserialize)]
        struct Entity {
            id: i64,
            foo: Option<String>,
        }

        let values = RowValues::new(json!({"id": 4, "foo": null}).as_object().cloned().unwrap());
        let entity: Entity = values.deserialize().unwrap();
        assert_eq!(entity.id, 4);
        assert_eq!(entity.foo, None);
        assert_eq!(values.get_opt::<String>("foo").unwrap(), None);
    }
}
