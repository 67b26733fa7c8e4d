use sqlet_model::{Field, NamedMap, Parameter};
use std::collections::BTreeSet;

/// The immutable assembled unit: one named, parameterized SQL statement with
/// its full metadata.
///
/// Built once per (name, source timestamp) by the engine, shared behind an
/// `Arc`, replaced — never mutated — when the source files change.
#[derive(Debug, Clone)]
pub struct SqlEntity {
    /// Application-root-relative name; the cache key.
    pub name: String,
    /// Datasource the entity binds to, when the side file names one.
    pub datasource: Option<String>,
    /// Statement text after inlining (deparsed), or the raw command text.
    pub sql: String,
    /// Verbatim side-file override; compiled instead of `sql` when present,
    /// subject to the same named-parameter rewrite.
    pub custom_sql: Option<String>,
    pub title: Option<String>,
    /// Statement does not produce a row set.
    pub command: bool,
    /// Statement is a stored-procedure call.
    pub procedure: bool,
    pub readonly: bool,
    /// Accessible without an authenticated principal.
    pub public_access: bool,
    pub page_size: Option<u32>,
    /// Parameters in first-occurrence order, case-insensitive.
    pub parameters: NamedMap<Parameter>,
    /// Output schema in projection order, case-insensitive.
    pub fields: NamedMap<Field>,
    /// Physical tables this entity's fields may generate writes against.
    pub writable: BTreeSet<String>,
    pub read_roles: BTreeSet<String>,
    pub write_roles: BTreeSet<String>,
}

impl SqlEntity {
    /// An empty shell for `name`; the loader fills it in.
    pub(crate) fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        SqlEntity {
            name: name.into(),
            datasource: None,
            sql: sql.into(),
            custom_sql: None,
            title: None,
            command: false,
            procedure: false,
            readonly: false,
            public_access: false,
            page_size: None,
            parameters: NamedMap::new(),
            fields: NamedMap::new(),
            writable: BTreeSet::new(),
            read_roles: BTreeSet::new(),
            write_roles: BTreeSet::new(),
        }
    }
}
