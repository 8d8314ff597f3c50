//! Builds the row → entity function for a repository.
//!
//! Per row the pipeline runs in a fixed order: normalizer, lazy collections,
//! lazy properties, then [`Entity::hydrate`]. Later steps can therefore read
//! what earlier steps attached to the [`ResultRow`].

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value as JsonValue;

use crate::definition::RepositoryDefinition;
use crate::error::AppError;
use crate::hydration::lazy::{LazyCollection, LazyProperty, LoadFuture};
use crate::hydration::result_row::{LazyValue, ResultRow};
use crate::hydration::Entity;
use crate::store::Row;

/// Adjusts a row in place before lazy values are computed.
pub type Normalizer = Arc<dyn Fn(&mut ResultRow) -> Result<(), AppError> + Send + Sync>;

/// Turns a fetched row into an entity.
pub type RowHydrator<T> = Arc<dyn Fn(Row) -> Result<T, AppError> + Send + Sync>;

type RowLoader<V> = Arc<dyn Fn(ResultRow) -> LoadFuture<V> + Send + Sync>;
type KeyLoader<V> = Arc<dyn Fn(JsonValue) -> LoadFuture<V> + Send + Sync>;
type ErasedInitializer = Arc<dyn Fn(&ResultRow) -> Result<LazyValue, AppError> + Send + Sync>;

/// How a lazy property gets its value.
pub enum PropertyInitializer<V> {
    /// Loads from a snapshot of the row on first access.
    Deferred(RowLoader<V>),
    /// Loads from the bare primary key value on first access: the single
    /// value for one-column keys, an array otherwise.
    ByKey(KeyLoader<V>),
    /// Builds the lazy container itself at hydration time.
    Container(Arc<dyn Fn(&ResultRow) -> Result<LazyProperty<V>, AppError> + Send + Sync>),
}

impl<V: Send + Sync + 'static> PropertyInitializer<V> {
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(ResultRow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, AppError>> + Send + 'static,
    {
        Self::Deferred(Arc::new(move |row| f(row).boxed()))
    }

    pub fn by_key<F, Fut>(f: F) -> Self
    where
        F: Fn(JsonValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, AppError>> + Send + 'static,
    {
        Self::ByKey(Arc::new(move |key| f(key).boxed()))
    }

    pub fn container<F>(f: F) -> Self
    where
        F: Fn(&ResultRow) -> Result<LazyProperty<V>, AppError> + Send + Sync + 'static,
    {
        Self::Container(Arc::new(f))
    }

    fn erase(self) -> ErasedInitializer {
        match self {
            Self::Deferred(load) => Arc::new(move |row: &ResultRow| -> Result<LazyValue, AppError> {
                let snapshot = row.clone();
                let load = load.clone();
                let property = LazyProperty::from_loader(Arc::new(move || load(snapshot.clone())));
                Ok(Arc::new(property) as LazyValue)
            }),
            Self::ByKey(load) => Arc::new(move |row: &ResultRow| -> Result<LazyValue, AppError> {
                let key = row.extract_primary_key()?.to_json();
                let load = load.clone();
                let property = LazyProperty::from_loader(Arc::new(move || load(key.clone())));
                Ok(Arc::new(property) as LazyValue)
            }),
            Self::Container(build) => {
                Arc::new(move |row: &ResultRow| -> Result<LazyValue, AppError> {
                    Ok(Arc::new(build(row)?))
                })
            }
        }
    }
}

/// How a lazy collection gets its items.
pub enum CollectionInitializer<V> {
    /// Loads from a snapshot of the row on first access.
    Deferred(RowLoader<Vec<V>>),
    /// Loads from the bare primary key value on first access.
    ByKey(KeyLoader<Vec<V>>),
    /// Builds the collection itself at hydration time.
    Loaded(Arc<dyn Fn(&ResultRow) -> Result<LazyCollection<V>, AppError> + Send + Sync>),
}

impl<V: Send + Sync + 'static> CollectionInitializer<V> {
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(ResultRow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, AppError>> + Send + 'static,
    {
        Self::Deferred(Arc::new(move |row| f(row).boxed()))
    }

    pub fn by_key<F, Fut>(f: F) -> Self
    where
        F: Fn(JsonValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, AppError>> + Send + 'static,
    {
        Self::ByKey(Arc::new(move |key| f(key).boxed()))
    }

    pub fn loaded<F>(f: F) -> Self
    where
        F: Fn(&ResultRow) -> Result<LazyCollection<V>, AppError> + Send + Sync + 'static,
    {
        Self::Loaded(Arc::new(f))
    }

    fn erase(self) -> ErasedInitializer {
        match self {
            Self::Deferred(load) => Arc::new(move |row: &ResultRow| -> Result<LazyValue, AppError> {
                let snapshot = row.clone();
                let load = load.clone();
                let collection =
                    LazyCollection::from_loader(Arc::new(move || load(snapshot.clone())));
                Ok(Arc::new(collection) as LazyValue)
            }),
            Self::ByKey(load) => Arc::new(move |row: &ResultRow| -> Result<LazyValue, AppError> {
                let key = row.extract_primary_key()?.to_json();
                let load = load.clone();
                let collection = LazyCollection::from_loader(Arc::new(move || load(key.clone())));
                Ok(Arc::new(collection) as LazyValue)
            }),
            Self::Loaded(build) => {
                Arc::new(move |row: &ResultRow| -> Result<LazyValue, AppError> {
                    Ok(Arc::new(build(row)?))
                })
            }
        }
    }
}

/// Registers the optional parts of a hydration pipeline.
///
/// The normalizer takes exactly one `&mut ResultRow`, so a wrong arity is
/// rejected by the compiler rather than at runtime.
pub struct HydratorBuilder<T> {
    normalizer: Option<Normalizer>,
    collections: Vec<(String, ErasedInitializer)>,
    properties: Vec<(String, ErasedInitializer)>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for HydratorBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            normalizer: self.normalizer.clone(),
            collections: self.collections.clone(),
            properties: self.properties.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> Default for HydratorBuilder<T> {
    fn default() -> Self {
        Self {
            normalizer: None,
            collections: Vec::new(),
            properties: Vec::new(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> HydratorBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the normalizer, replacing any previous one.
    pub fn normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(&mut ResultRow) -> Result<(), AppError> + Send + Sync + 'static,
    {
        self.normalizer = Some(Arc::new(normalizer));
        self
    }

    pub fn lazy_collection<V: Send + Sync + 'static>(
        mut self,
        property: impl Into<String>,
        initializer: CollectionInitializer<V>,
    ) -> Result<Self, AppError> {
        let property = self.check_property(property.into())?;
        self.collections.push((property, initializer.erase()));
        Ok(self)
    }

    pub fn lazy_property<V: Send + Sync + 'static>(
        mut self,
        property: impl Into<String>,
        initializer: PropertyInitializer<V>,
    ) -> Result<Self, AppError> {
        let property = self.check_property(property.into())?;
        self.properties.push((property, initializer.erase()));
        Ok(self)
    }

    pub fn has_lazy_values(&self) -> bool {
        !self.collections.is_empty() || !self.properties.is_empty()
    }

    fn check_property(&self, property: String) -> Result<String, AppError> {
        if property.is_empty() {
            return Err(AppError::Argument(
                "lazy initializer needs a property name".into(),
            ));
        }
        let taken = self
            .collections
            .iter()
            .chain(self.properties.iter())
            .any(|(name, _)| *name == property);
        if taken {
            return Err(AppError::Argument(format!(
                "property '{}' already has a lazy initializer",
                property
            )));
        }
        Ok(property)
    }

    /// Builds the hydrator for `definition`, which must declare a primary key.
    pub fn build(&self, definition: &RepositoryDefinition) -> Result<RowHydrator<T>, AppError> {
        let primary_key = definition.primary_key().cloned().ok_or_else(|| {
            AppError::Configuration("hydration requires a primary key".into())
        })?;
        let primary_key = Arc::new(primary_key);
        let pipeline = self.clone();

        Ok(Arc::new(move |row: Row| {
            let mut row = ResultRow::new(primary_key.clone(), row.into_inner());
            if let Some(normalizer) = &pipeline.normalizer {
                normalizer(&mut row)?;
            }
            for (property, initializer) in &pipeline.collections {
                let value = initializer(&row)?;
                row.set_lazy(property.clone(), value);
            }
            for (property, initializer) in &pipeline.properties {
                let value = initializer(&row)?;
                row.set_lazy(property.clone(), value);
            }
            T::hydrate(row.into_values())
        }))
    }
}

/// Hydrator returning rows untouched, used for RETURNING results.
pub fn pass_through() -> RowHydrator<Row> {
    Arc::new(|row: Row| Ok::<_, AppError>(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydration::RowValues;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn definition(key: &[&str]) -> RepositoryDefinition {
        let mut builder = RepositoryDefinition::builder();
        builder.set_table_name("some_entity", None).unwrap();
        if !key.is_empty() {
            builder.set_database_primary_key(key.iter().copied()).unwrap();
        }
        builder.build().unwrap()
    }

    fn row(value: JsonValue) -> Row {
        Row::new(value.as_object().cloned().unwrap_or_default())
    }

    struct Tagged {
        id: i64,
        tags: LazyCollection<String>,
        label: LazyProperty<String>,
    }

    impl Entity for Tagged {
        fn hydrate(mut values: RowValues) -> Result<Self, AppError> {
            Ok(Self {
                id: values.get("id")?,
                tags: values.take_lazy("tags")?,
                label: values.take_lazy("label")?,
            })
        }
    }

    #[test]
    fn test_build_requires_primary_key() {
        let result = HydratorBuilder::<Row>::new().build(&definition(&[]));
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let builder = HydratorBuilder::<Row>::new()
            .lazy_property("label", PropertyInitializer::by_key(|_| async { Ok(1) }))
            .unwrap();
        let err = builder
            .lazy_collection("label", CollectionInitializer::by_key(|_| async { Ok(vec![1]) }))
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Argument(_)));
    }

    #[test]
    fn test_normalizer_runs_first() {
        let hydrator = HydratorBuilder::<Row>::new()
            .normalizer(|row| {
                row.set("foo", "normalized");
                Ok(())
            })
            .build(&definition(&["id"]))
            .unwrap();

        let hydrated = hydrator(row(json!({"id": 1, "foo": "raw"}))).unwrap();
        assert_eq!(hydrated.get::<String>("foo").unwrap(), "normalized");
    }

    #[test]
    fn test_normalizer_error_aborts_row() {
        let hydrator = HydratorBuilder::<Row>::new()
            .normalizer(|_| Err(AppError::Internal("bad row".into())))
            .build(&definition(&["id"]))
            .unwrap();
        assert!(hydrator(row(json!({"id": 1}))).is_err());
    }

    #[tokio::test]
    async fn test_lazy_values_are_deferred() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let hydrator = HydratorBuilder::<Tagged>::new()
            .lazy_collection(
                "tags",
                CollectionInitializer::by_key(move |id| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(vec![format!("tag-{}", id)]) }
                }),
            )
            .unwrap()
            .lazy_property(
                "label",
                PropertyInitializer::deferred(|row: ResultRow| async move {
                    Ok(format!("{}", row.get("foo").cloned().unwrap_or_default()))
                }),
            )
            .unwrap()
            .build(&definition(&["id"]))
            .unwrap();

        let entity = hydrator(row(json!({"id": 7, "foo": "bar"}))).unwrap();
        assert_eq!(entity.id, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!entity.tags.is_loaded());

        assert_eq!(entity.tags.load().await.unwrap(), &["tag-7".to_string()]);
        assert_eq!(entity.label.get().await.unwrap(), "\"bar\"");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_by_key_composite_receives_array() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        let hydrator = HydratorBuilder::<Row>::new()
            .lazy_property(
                "other",
                PropertyInitializer::container(move |row: &ResultRow| {
                    *sink.lock().unwrap() = Some(row.extract_primary_key()?.to_json());
                    Ok(LazyProperty::ready(0))
                }),
            )
            .unwrap()
            .build(&definition(&["foo", "status"]))
            .unwrap();

        hydrator(row(json!({"foo": 2, "status": 1}))).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(json!([2, 1])));
    }

    #[test]
    fn test_by_key_missing_key_fails_fast() {
        let hydrator = HydratorBuilder::<Row>::new()
            .lazy_property("owner", PropertyInitializer::by_key(|_| async { Ok(1) }))
            .unwrap()
            .build(&definition(&["id"]))
            .unwrap();
        assert!(hydrator(row(json!({"foo": 1}))).is_err());
    }

    #[test]
    fn test_pass_through() {
        let hydrator = pass_through();
        let original = row(json!({"id": 3}));
        assert_eq!(hydrator(original.clone()).unwrap(), original);
    }
}
