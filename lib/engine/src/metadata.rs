use crate::error::MetadataError;
use rustc_hash::FxHashMap;
use sqlet_model::{Field, NamedMap};

/// Live column metadata, as the connection layer exposes it.
///
/// The pipeline consumes this during field resolution: star expansion needs
/// full column sets, unqualified column lookup needs membership tests, and
/// resolved fields inherit type/nullability/key facts from here. Lookups may
/// block (they sit on a connection pool in production); the pipeline calls
/// them synchronously and propagates failures unchanged.
pub trait MetadataProvider: Send + Sync {
    /// Column descriptors for a physical table, keyed by column name.
    ///
    /// `Ok(None)` means the table is unknown — a normal answer, e.g. for
    /// free-form SQL against views the introspection cannot see. `Err` is
    /// reserved for transport failures.
    fn table_columns(&self, table: &str) -> Result<Option<NamedMap<Field>>, MetadataError>;
}

/// A [MetadataProvider] over a fixed in-memory table set.
///
/// Used by tests and the CLI; production wires the connection layer in
/// instead.
#[derive(Debug, Default)]
pub struct MemoryMetadata {
    tables: FxHashMap<String, NamedMap<Field>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        MemoryMetadata::default()
    }

    /// Registers a table. Column order is preserved; the table name is
    /// matched case-insensitively, like the real introspection does.
    pub fn insert_table(
        &mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = Field>,
    ) {
        let name = name.into();
        let mut map = NamedMap::new();
        for mut column in columns {
            if column.table_name.is_none() {
                column.table_name = Some(name.clone());
            }
            map.insert(column.name.clone(), column);
        }
        self.tables.insert(name.to_lowercase(), map);
    }
}

impl MetadataProvider for MemoryMetadata {
    fn table_columns(&self, table: &str) -> Result<Option<NamedMap<Field>>, MetadataError> {
        Ok(self.tables.get(&table.to_lowercase()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlet_model::FieldType;

    #[test]
    fn lookup_is_case_insensitive_and_ordered() {
        let mut metadata = MemoryMetadata::new();
        let mut id = Field::named("id");
        id.data_type = FieldType::Long;
        metadata.insert_table("Orders", [id, Field::named("total")]);

        let columns = metadata.table_columns("ORDERS").unwrap().unwrap();
        let names: Vec<_> = columns.keys().collect();
        assert_eq!(names, vec!["id", "total"]);
        assert_eq!(columns.get("id").unwrap().table_name.as_deref(), Some("Orders"));
        assert!(metadata.table_columns("missing").unwrap().is_none());
    }
}
