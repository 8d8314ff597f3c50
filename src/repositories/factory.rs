//! Builds repositories with the store and configured defaults injected.

use std::sync::Arc;

use crate::config::Config;
use crate::context::Context;
use crate::di::FromContext;
use crate::hydration::Entity;
use crate::repositories::read::Repository;
use crate::repositories::write::WritableRepository;
use crate::store::AppStore;

/// Hands out repositories sharing one store.
///
/// # Example
///
/// ```ignore
/// let factory = RepositoryFactory::from_ref(&ctx);
/// let users = factory.repository::<User>();
/// ```
#[derive(FromContext, Clone)]
pub struct RepositoryFactory {
    store: AppStore,
    config: Arc<Config>,
}

impl RepositoryFactory {
    pub fn repository<T: Entity>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
            .with_default_limit(self.config.repository.default_limit)
            .with_page_size(self.config.repository.page_size)
    }

    pub fn writable<T: Entity>(&self) -> WritableRepository<T> {
        WritableRepository::new(self.repository())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use crate::definition::RepositoryDefinition;
    use crate::store::backends::memory::{MemoryClient, MemoryTable};
    use crate::store::Row;
    use crate::FromRef;
    use serde_json::json;

    #[tokio::test]
    async fn test_factory_applies_config() {
        let client = MemoryClient::new();
        client
            .create_table(MemoryTable::new("notes").serial("id").column("body"))
            .unwrap();
        let config = Config {
            repository: RepositoryConfig {
                default_limit: 2,
                page_size: 1,
            },
            ..Config::default()
        };
        let ctx = Context::new(client, config);
        let factory = RepositoryFactory::from_ref(&ctx);

        let mut builder = RepositoryDefinition::builder();
        builder
            .set_table_name("notes", None)
            .unwrap()
            .set_database_primary_key(["id"])
            .unwrap();
        let notes = factory
            .writable::<Row>()
            .into_inner()
            .with_definition(builder.build().unwrap())
            .unwrap();
        let notes = WritableRepository::new(notes);

        for body in ["a", "b", "c"] {
            notes.create(json!({ "body": body })).await.unwrap();
        }
        assert_eq!(notes.find_some(None, None).await.unwrap().len(), 2);

        let page = notes.query(None).unwrap().paginate().fetch().await.unwrap();
        assert_eq!(page.limit, 1);
        assert_eq!(page.last_page, 3);
    }
}
