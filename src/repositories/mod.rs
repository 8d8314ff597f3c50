//! Repositories over table-backed entities.
//!
//! [`Repository`] reads and hydrates, [`WritableRepository`] adds create,
//! update and delete. Both are usually obtained from a [`RepositoryFactory`]
//! resolved through the `FromContext` derive macro.

mod criteria;
mod factory;
mod macros;
mod query;
mod read;
mod result;
mod write;

pub use criteria::{expand_key, Criteria, Id};
pub use factory::RepositoryFactory;
pub use query::{Page, Pager, RepositoryQuery};
pub use read::{Repository, DEFAULT_LIMIT, DEFAULT_PAGE_SIZE};
pub use result::RepositoryResult;
pub use write::WritableRepository;
