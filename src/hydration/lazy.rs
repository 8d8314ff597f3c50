//! Values computed on first access.
//!
//! Both containers are cheap to clone; clones share the loaded value, so a
//! value is computed at most once however many copies exist.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::OnceCell;

use crate::error::AppError;

/// Future produced by a lazy loader.
pub type LoadFuture<V> = BoxFuture<'static, Result<V, AppError>>;

type Loader<V> = Arc<dyn Fn() -> LoadFuture<V> + Send + Sync>;

struct Inner<V> {
    cell: OnceCell<V>,
    loader: Option<Loader<V>>,
}

/// A single value loaded on demand.
///
/// # Example
///
/// ```ignore
/// let owner = LazyProperty::new(move || async move { users.find_one(id).await });
/// assert!(!owner.is_loaded());
/// let user = owner.get().await?;
/// ```
pub struct LazyProperty<V> {
    inner: Arc<Inner<V>>,
}

impl<V: Send + Sync + 'static> LazyProperty<V> {
    /// Creates a property loaded by `loader` on first [`get`](Self::get).
    ///
    /// A failed load is retried on the next access.
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, AppError>> + Send + 'static,
    {
        Self::from_loader(Arc::new(move || loader().boxed()))
    }

    pub(crate) fn from_loader(loader: Loader<V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cell: OnceCell::new(),
                loader: Some(loader),
            }),
        }
    }

    /// Creates an already loaded property.
    pub fn ready(value: V) -> Self {
        Self {
            inner: Arc::new(Inner {
                cell: OnceCell::new_with(Some(value)),
                loader: None,
            }),
        }
    }

    /// Returns the value, loading it first if needed.
    pub async fn get(&self) -> Result<&V, AppError> {
        self.inner
            .cell
            .get_or_try_init(|| async {
                match &self.inner.loader {
                    Some(loader) => loader().await,
                    None => Err(AppError::Configuration(
                        "lazy property was never bound to a loader".into(),
                    )),
                }
            })
            .await
    }
}

impl<V> LazyProperty<V> {
    /// Returns the value only if it was already loaded.
    pub fn peek(&self) -> Option<&V> {
        self.inner.cell.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.cell.initialized()
    }
}

/// An unbound property; [`get`](LazyProperty::get) fails until it is
/// replaced by a hydrated one. Lets entities derive `Default`.
impl<V> Default for LazyProperty<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                cell: OnceCell::new(),
                loader: None,
            }),
        }
    }
}

impl<V> Clone for LazyProperty<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for LazyProperty<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.cell.get() {
            Some(value) => f.debug_tuple("LazyProperty").field(value).finish(),
            None => f.write_str("LazyProperty(<unloaded>)"),
        }
    }
}

/// A collection loaded on demand.
pub struct LazyCollection<V> {
    items: LazyProperty<Vec<V>>,
}

impl<V: Send + Sync + 'static> LazyCollection<V> {
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<V>, AppError>> + Send + 'static,
    {
        Self {
            items: LazyProperty::new(loader),
        }
    }

    pub(crate) fn from_loader(loader: Loader<Vec<V>>) -> Self {
        Self {
            items: LazyProperty::from_loader(loader),
        }
    }

    pub fn ready(items: Vec<V>) -> Self {
        Self {
            items: LazyProperty::ready(items),
        }
    }

    /// Returns the items, loading them first if needed.
    pub async fn load(&self) -> Result<&[V], AppError> {
        self.items.get().await.map(Vec::as_slice)
    }

    pub async fn count(&self) -> Result<usize, AppError> {
        self.load().await.map(<[V]>::len)
    }
}

impl<V> LazyCollection<V> {
    /// Returns the items only if they were already loaded.
    pub fn peek(&self) -> Option<&[V]> {
        self.items.peek().map(Vec::as_slice)
    }

    pub fn is_loaded(&self) -> bool {
        self.items.is_loaded()
    }
}

impl<V> Default for LazyCollection<V> {
    fn default() -> Self {
        Self {
            items: LazyProperty::default(),
        }
    }
}

impl<V> Clone for LazyCollection<V> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for LazyCollection<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peek() {
            Some(items) => f.debug_tuple("LazyCollection").field(&items).finish(),
            None => f.write_str("LazyCollection(<unloaded>)"),
        }
    }
}
