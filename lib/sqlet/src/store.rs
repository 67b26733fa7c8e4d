use sqlet_engine::{
    CompiledQuery, Dialect, EntityEngine, EntityError, MetadataProvider, ResolveOptions,
    SqlEntity,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The user-facing entry point: one application root served through one
/// engine and one target dialect.
///
/// `Store` is cheap to share (`Arc` it, or keep one per application) and
/// safe for concurrent use; all state lives in the engine's concurrent
/// cache.
pub struct Store {
    engine: EntityEngine,
    dialect: Dialect,
}

impl Store {
    /// Opens `root` with default options and the generic `?` dialect.
    pub fn open(root: impl Into<PathBuf>, metadata: Arc<dyn MetadataProvider>) -> Self {
        StoreBuilder::new(root, metadata).build()
    }

    /// Starts a configured build of a [Store].
    pub fn builder(root: impl Into<PathBuf>, metadata: Arc<dyn MetadataProvider>) -> StoreBuilder {
        StoreBuilder::new(root, metadata)
    }

    pub fn root(&self) -> &Path {
        self.engine.root()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Resolves an entity by name, serving it from cache when fresh.
    pub fn entity(&self, name: &str) -> Result<Arc<SqlEntity>, EntityError> {
        self.engine.load(name)
    }

    /// Resolves an entity and compiles it for the store's dialect.
    pub fn query(&self, name: &str) -> Result<CompiledQuery, EntityError> {
        Ok(self.entity(name)?.to_query(self.dialect))
    }

    /// Drops one cached entity.
    pub fn invalidate(&self, name: &str) {
        self.engine.invalidate(name);
    }

    /// Drops the whole entity cache.
    pub fn clear(&self) {
        self.engine.clear();
    }
}

/// Configuration for a [Store].
pub struct StoreBuilder {
    root: PathBuf,
    metadata: Arc<dyn MetadataProvider>,
    options: ResolveOptions,
    dialect: Dialect,
}

impl StoreBuilder {
    fn new(root: impl Into<PathBuf>, metadata: Arc<dyn MetadataProvider>) -> Self {
        StoreBuilder {
            root: root.into(),
            metadata,
            options: ResolveOptions::default(),
            dialect: Dialect::default(),
        }
    }

    /// Report field owners by source alias instead of physical table name.
    pub fn aliases_to_table_names(mut self, enabled: bool) -> Self {
        self.options.aliases_to_table_names = enabled;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn build(self) -> Store {
        Store {
            engine: EntityEngine::with_options(self.root, self.metadata, self.options),
            dialect: self.dialect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use sqlet_engine::MemoryMetadata;
    use sqlet_model::{Field, FieldType};

    #[test]
    fn store_serves_compiled_queries() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("ping.sql")
            .write_str("select id from t where id = :id")
            .unwrap();

        let mut metadata = MemoryMetadata::new();
        let mut id = Field::named("id");
        id.data_type = FieldType::Long;
        metadata.insert_table("t", [id]);

        let store = Store::builder(root.path(), Arc::new(metadata))
            .dialect(Dialect::Postgres)
            .build();
        let query = store.query("ping").unwrap();
        assert_eq!(query.sql, "SELECT id FROM t WHERE id = $1");
        assert_eq!(query.parameters[0].name, "id");
        assert_eq!(query.fields.get("id").unwrap().data_type, FieldType::Long);
    }
}
