//! Read-only repository over one table-backed entity type.

use std::any::type_name;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::definition::{DatabaseTable, Key, RepositoryDefinition, RepositoryDefinitionBuilder};
use crate::error::AppError;
use crate::hydration::{Entity, HydratorBuilder, RowHydrator};
use crate::repositories::criteria::{self, Criteria, Id};
use crate::repositories::query::RepositoryQuery;
use crate::repositories::result::RepositoryResult;
use crate::store::{AppStore, Condition, Projection, QueryExt, Row, Select, Values};

/// Default row limit of [`Repository::find_some`].
pub const DEFAULT_LIMIT: u64 = 100;

/// Default page size of [`RepositoryQuery::paginate`].
pub const DEFAULT_PAGE_SIZE: u64 = 100;

type Definer = Arc<dyn Fn(&mut RepositoryDefinitionBuilder) -> Result<(), AppError> + Send + Sync>;

/// Finds and hydrates entities of type `T`.
///
/// The definition is resolved on first use, from the first of:
/// 1. a preloaded definition ([`Repository::with_definition`]),
/// 2. the [`Repository::define`] closure, when it sets anything,
/// 3. [`Entity::definition`].
///
/// # Example
///
/// ```ignore
/// let repository = Repository::<SomeEntity>::new(store).define(|builder| {
///     builder
///         .set_table_name("some_entity", Some("t"))?
///         .set_database_primary_key(["id"])?;
///     Ok(())
/// });
///
/// let entity = repository.find_one(1).await?;
/// let admins = repository.find_some(criteria!{ "bar" => "admin" }, None).await?;
/// ```
pub struct Repository<T> {
    store: AppStore,
    definer: Option<Definer>,
    definition: OnceCell<Arc<RepositoryDefinition>>,
    hydration: HydratorBuilder<T>,
    hydrator: OnceCell<RowHydrator<T>>,
    default_limit: u64,
    page_size: u64,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            definer: self.definer.clone(),
            definition: self.definition.clone(),
            hydration: self.hydration.clone(),
            hydrator: self.hydrator.clone(),
            default_limit: self.default_limit,
            page_size: self.page_size,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: AppStore) -> Self {
        Self {
            store,
            definer: None,
            definition: OnceCell::new(),
            hydration: HydratorBuilder::new(),
            hydrator: OnceCell::new(),
            default_limit: DEFAULT_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Describes the table with a closure run against a fresh builder.
    pub fn define<F>(mut self, define: F) -> Self
    where
        F: Fn(&mut RepositoryDefinitionBuilder) -> Result<(), AppError> + Send + Sync + 'static,
    {
        self.definer = Some(Arc::new(define));
        self
    }

    /// Injects an already built definition.
    pub fn with_definition(self, definition: RepositoryDefinition) -> Result<Self, AppError> {
        self.definition.set(Arc::new(definition)).map_err(|_| {
            AppError::Configuration(format!(
                "repository for {} already has a definition",
                type_name::<T>()
            ))
        })?;
        Ok(self)
    }

    pub fn with_hydration(mut self, hydration: HydratorBuilder<T>) -> Self {
        self.hydration = hydration;
        self.hydrator = OnceCell::new();
        self
    }

    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub(crate) fn store(&self) -> &AppStore {
        &self.store
    }

    /// The definition, built on first access.
    pub fn definition(&self) -> Result<&RepositoryDefinition, AppError> {
        self.definition
            .get_or_try_init(|| self.load_definition().map(Arc::new))
            .map(|definition| definition.as_ref())
    }

    fn load_definition(&self) -> Result<RepositoryDefinition, AppError> {
        let mut builder = RepositoryDefinition::builder();
        if let Some(define) = &self.definer {
            define(&mut builder)?;
        }

        if !builder.is_empty() {
            let definition = builder.build()?;
            tracing::debug!(
                entity = type_name::<T>(),
                table = %definition.table().name,
                "Built repository definition"
            );
            return Ok(definition);
        }

        match T::definition() {
            Some(definition) => {
                tracing::debug!(
                    entity = type_name::<T>(),
                    table = %definition.table().name,
                    "Loaded repository definition from entity"
                );
                Ok(definition)
            }
            None => Err(AppError::Configuration(format!(
                "no repository definition for {}",
                type_name::<T>()
            ))),
        }
    }

    pub fn table(&self) -> Result<&DatabaseTable, AppError> {
        Ok(self.definition()?.table())
    }

    /// Name used in errors: the declared entity class, else the Rust type.
    pub fn entity_class_name(&self) -> Result<String, AppError> {
        let definition = self.definition()?;
        Ok(definition
            .entity_class_name()
            .unwrap_or_else(|| type_name::<T>())
            .to_string())
    }

    pub fn hydrator(&self) -> Result<RowHydrator<T>, AppError> {
        self.hydrator
            .get_or_try_init(|| self.hydration.build(self.definition()?))
            .cloned()
    }

    /// Hydrates an arbitrary mapping through the repository's pipeline.
    pub fn create_instance(&self, values: Values) -> Result<T, AppError> {
        let hydrator = self.hydrator()?;
        hydrator(Row::new(values))
    }

    /// SELECT over the table with the declared columns and `criteria` applied.
    ///
    /// Read/write columns win over select-only columns; with neither, every
    /// column of the table is selected.
    pub fn create_select(&self, criteria: impl Into<Criteria>) -> Result<Select, AppError> {
        let definition = self.definition()?;
        let table = definition.table();
        let alias = table.alias_or_name();

        let mut select = Select::new(table.to_table_ref());
        if !definition.columns().is_empty() {
            for column in definition.columns() {
                select = select.column(Projection::aliased(
                    column.qualified(alias),
                    column.property_name.clone(),
                ));
            }
        } else if !definition.select_columns().is_empty() {
            for column in definition.select_columns() {
                select = select.column(Projection::aliased(
                    column.qualified(alias),
                    column.property_name.clone(),
                ));
            }
        } else {
            select = select.column(Projection::All(Some(alias.to_string())));
        }

        if let Some(condition) = criteria.into().expand() {
            select = select.filter(condition);
        }
        Ok(select)
    }

    pub async fn exists(&self, criteria: impl Into<Criteria>) -> Result<bool, AppError> {
        let table = self.table()?;
        let mut select = Select::new(table.to_table_ref())
            .column(Projection::Literal(1))
            .range(1, 0);
        if let Some(condition) = criteria.into().expand() {
            select = select.filter(condition);
        }
        Ok(self.store.query(select).fetch_one().await?.is_some())
    }

    /// The entity with primary key `id`, failing with
    /// [`AppError::EntityNotFound`] when there is none.
    pub async fn find_one(&self, id: impl Into<Id>) -> Result<T, AppError> {
        match self.find_one_opt(id).await? {
            Some(entity) => Ok(entity),
            None => Err(AppError::not_found(self.entity_class_name()?)),
        }
    }

    pub async fn find_one_opt(&self, id: impl Into<Id>) -> Result<Option<T>, AppError> {
        let condition = self.expand_primary_key(id)?;
        let select = self.create_select(condition)?.range(1, 0);
        self.fetch_first(select).await
    }

    /// Every entity whose primary key is in `ids`, in one SELECT.
    ///
    /// Missing ids are absent from the result. An empty list matches nothing.
    pub async fn find_all<I>(
        &self,
        ids: impl IntoIterator<Item = I>,
    ) -> Result<RepositoryResult<T>, AppError>
    where
        I: Into<Id>,
    {
        let conditions = ids
            .into_iter()
            .map(|id| self.expand_primary_key(id))
            .collect::<Result<Vec<_>, _>>()?;
        let select = self.create_select(Condition::Or(conditions))?;
        self.fetch(select).await
    }

    pub async fn find_first(&self, criteria: impl Into<Criteria>) -> Result<Option<T>, AppError> {
        let select = self.create_select(criteria)?.range(1, 0);
        self.fetch_first(select).await
    }

    pub async fn find_first_or_fail(&self, criteria: impl Into<Criteria>) -> Result<T, AppError> {
        match self.find_first(criteria).await? {
            Some(entity) => Ok(entity),
            None => Err(AppError::not_found(self.entity_class_name()?)),
        }
    }

    /// Up to `limit` entities matching `criteria`; `None` uses the default limit.
    pub async fn find_some(
        &self,
        criteria: impl Into<Criteria>,
        limit: impl Into<Option<u64>>,
    ) -> Result<RepositoryResult<T>, AppError> {
        let limit = limit.into().unwrap_or(self.default_limit);
        let select = self.create_select(criteria)?.range(limit, 0);
        self.fetch(select).await
    }

    /// A pre-filtered query to refine, count or paginate.
    pub fn query(&self, criteria: impl Into<Criteria>) -> Result<RepositoryQuery<T>, AppError> {
        let select = self.create_select(criteria)?;
        Ok(RepositoryQuery::new(
            self.store.clone(),
            select,
            self.hydrator()?,
            self.page_size,
        ))
    }

    /// Equality on every column of `key`, qualified with the table alias.
    pub fn expand_key(&self, key: &Key, id: impl Into<Id>) -> Result<Condition, AppError> {
        let alias = self.table()?.alias_or_name();
        criteria::expand_key(key, id, alias)
    }

    pub fn expand_primary_key(&self, id: impl Into<Id>) -> Result<Condition, AppError> {
        let definition = self.definition()?;
        let key = definition.primary_key().ok_or_else(|| {
            AppError::query(
                "repository has no primary key defined",
                definition.table().name.clone(),
            )
        })?;
        criteria::expand_key(key, id, definition.table().alias_or_name())
    }

    async fn fetch(&self, select: Select) -> Result<RepositoryResult<T>, AppError> {
        let hydrator = self.hydrator()?;
        let rows = self.store.query(select).fetch_all().await?;
        Ok(RepositoryResult::new(rows, hydrator))
    }

    async fn fetch_first(&self, select: Select) -> Result<Option<T>, AppError> {
        let hydrator = self.hydrator()?;
        let row = self.store.query(select).fetch_one().await?;
        row.map(|row| hydrator(row)).transpose()
    }
}
