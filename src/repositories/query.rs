//! Composable repository queries and pagination.

use crate::error::AppError;
use crate::hydration::RowHydrator;
use crate::repositories::criteria::Criteria;
use crate::repositories::result::RepositoryResult;
use crate::store::{AppStore, ColumnRef, Condition, Order, QueryExt, Select};

/// A pre-filtered SELECT that can be refined before it runs.
///
/// # Example
///
/// ```ignore
/// let page = repository
///     .query(criteria!{ "bar" => "admin" })?
///     .order_by("id", Order::Asc)
///     .paginate()
///     .limit(3)
///     .page(2)
///     .fetch()
///     .await?;
/// ```
pub struct RepositoryQuery<T> {
    store: AppStore,
    select: Select,
    hydrator: RowHydrator<T>,
    page_size: u64,
}

impl<T> RepositoryQuery<T> {
    pub(crate) fn new(store: AppStore, select: Select, hydrator: RowHydrator<T>, page_size: u64) -> Self {
        Self {
            store,
            select,
            hydrator,
            page_size,
        }
    }

    /// The SELECT as built so far.
    pub fn select(&self) -> &Select {
        &self.select
    }

    /// Adds a predicate, AND-ed with the existing ones.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.select = self.select.filter(condition);
        self
    }

    pub fn filter_criteria(self, criteria: impl Into<Criteria>) -> Self {
        match criteria.into().expand() {
            Some(condition) => self.filter(condition),
            None => self,
        }
    }

    /// Orders by a column given as `column` or `table.column`.
    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.select = self.select.order_by(ColumnRef::parse(column), order);
        self
    }

    pub fn range(mut self, limit: u64, offset: u64) -> Self {
        self.select = self.select.range(limit, offset);
        self
    }

    /// Number of matching rows, ignoring any range.
    pub async fn count(&self) -> Result<u64, AppError> {
        let row = self.store.query(self.select.to_count()).fetch_one().await?;
        match row {
            Some(row) => row.get("count"),
            None => Ok(0),
        }
    }

    pub async fn execute(self) -> Result<RepositoryResult<T>, AppError> {
        let rows = self.store.query(self.select).fetch_all().await?;
        Ok(RepositoryResult::new(rows, self.hydrator))
    }

    /// Switches to page-by-page fetching, starting at page 1.
    pub fn paginate(self) -> Pager<T> {
        let limit = self.page_size.max(1);
        Pager {
            query: self,
            limit,
            page: 1,
        }
    }
}

/// Page selection over a [`RepositoryQuery`].
pub struct Pager<T> {
    query: RepositoryQuery<T>,
    limit: u64,
    page: u64,
}

impl<T> Pager<T> {
    /// Rows per page. Zero is treated as one.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// 1-based page number. Zero is treated as one.
    pub fn page(mut self, page: u64) -> Self {
        self.page = page.max(1);
        self
    }

    /// Counts all matching rows, then fetches the selected page.
    pub async fn fetch(self) -> Result<Page<T>, AppError> {
        let total_count = self.query.count().await?;
        let last_page = total_count.div_ceil(self.limit).max(1);
        // OFFSET is bound as a signed 64-bit integer
        let offset = (self.page - 1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64);

        let results = self.query.range(self.limit, offset).execute().await?;

        Ok(Page {
            current_page: self.page,
            last_page,
            limit: self.limit,
            total_count,
            has_next_page: self.page < last_page,
            has_previous_page: self.page > 1,
            results,
        })
    }
}

/// One page of results.
#[derive(Debug)]
pub struct Page<T> {
    pub current_page: u64,
    /// `ceil(total_count / limit)`, at least 1.
    pub last_page: u64,
    pub limit: u64,
    pub total_count: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub results: RepositoryResult<T>,
}
