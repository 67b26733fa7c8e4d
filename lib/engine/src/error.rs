use sqlet_sql::ParseError;
use std::error::Error;
use std::io;

/// A database metadata lookup failed.
///
/// Wraps whatever the metadata collaborator reported (driver errors,
/// connection-pool failures). Never produced for a merely unknown table —
/// that is `Ok(None)` on the provider.
#[derive(Debug, thiserror::Error)]
#[error("metadata lookup for table '{table}' failed")]
pub struct MetadataError {
    pub table: String,
    #[source]
    pub source: Box<dyn Error + Send + Sync + 'static>,
}

impl MetadataError {
    pub fn new(
        table: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        MetadataError {
            table: table.into(),
            source: source.into(),
        }
    }
}

/// An entity failed to load or compile.
///
/// Every variant aborts the one in-flight load; nothing is retried
/// internally and a failed construction never reaches the cache.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EntityError {
    /// No `<name>.sql` file exists under the application root.
    #[error("entity '{0}' was not found")]
    NotFound(String),
    /// The entity path names a directory.
    #[error("entity path '{0}' is a directory")]
    IsDirectory(String),
    /// The `.sql` file exists but holds no statement text.
    #[error("entity '{0}' has an empty SQL text")]
    EmptyEntity(String),
    /// The statement text does not conform to the supported grammar.
    #[error("entity '{name}' failed to parse")]
    Parse {
        name: String,
        #[source]
        source: ParseError,
    },
    /// Inlining re-entered an entity that is still being loaded.
    #[error("cyclic reference through entity '{0}'")]
    CyclicReference(String),
    /// A `#`-referenced entity is not a `SELECT` and cannot be spliced.
    #[error("entity '{0}' cannot be inlined because it is not a SELECT")]
    NotInlinable(String),
    /// A relative reference escapes the application root or is malformed.
    #[error("invalid entity reference '{reference}' in '{entity}'")]
    InvalidReference { entity: String, reference: String },
    /// Database introspection failed during field resolution.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    /// Reading an entity source file failed for a non-missing-file reason.
    #[error("failed to read sources of entity '{name}'")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    /// The `.sql.json` side file is not valid JSON.
    #[error("invalid metadata side file for entity '{name}'")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
