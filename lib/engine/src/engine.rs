use crate::entity::SqlEntity;
use crate::error::EntityError;
use crate::inline::{inline_select, InlineContext};
use crate::metadata::MetadataProvider;
use crate::overrides::EntityOverrides;
use crate::resolve::{resolve_fields, ResolveOptions};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use sqlet_model::Parameter;
use sqlet_sql::{named_parameters, scan_named_parameters, Statement};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// The entity resolution pipeline with its cache.
///
/// One instance serves one application root. Loads run synchronously on the
/// caller's thread; the cache is a concurrent map, so loads for different
/// entities never contend. Two callers racing on the same stale entity will
/// both do the full compile and both write — the results are interchangeable
/// immutable values, so the duplicate work is accepted instead of holding a
/// per-key lock.
pub struct EntityEngine {
    root: PathBuf,
    metadata: Arc<dyn MetadataProvider>,
    options: ResolveOptions,
    cache: DashMap<String, CacheEntry>,
}

struct CacheEntry {
    entity: Arc<SqlEntity>,
    /// Newest modification time of the source files that built `entity`.
    /// The entry is stale once a backing file reports a strictly newer time.
    modified: SystemTime,
}

impl EntityEngine {
    pub fn new(root: impl Into<PathBuf>, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self::with_options(root, metadata, ResolveOptions::default())
    }

    pub fn with_options(
        root: impl Into<PathBuf>,
        metadata: Arc<dyn MetadataProvider>,
        options: ResolveOptions,
    ) -> Self {
        EntityEngine {
            root: root.into(),
            metadata,
            options,
            cache: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads (or re-loads, when stale) the entity named `name`.
    ///
    /// Each top-level call owns a fresh cycle-guard set: concurrent loads of
    /// entities that merely share sub-entities can never accuse each other
    /// of cycles.
    pub fn load(&self, name: &str) -> Result<Arc<SqlEntity>, EntityError> {
        let mut guards = FxHashSet::default();
        self.load_guarded(name, &mut guards)
    }

    /// Drops one cached entity; the next load rebuilds it.
    pub fn invalidate(&self, name: &str) {
        self.cache.remove(name);
    }

    /// Drops every cached entity.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Re-entrant load used by the inliner for sub-entities.
    ///
    /// The guard entry for `name` is held exactly while its subtree loads
    /// and released on every exit path, so a failed sub-entity never leaves
    /// the set poisoned for a later retry.
    pub(crate) fn load_guarded(
        &self,
        name: &str,
        guards: &mut FxHashSet<String>,
    ) -> Result<Arc<SqlEntity>, EntityError> {
        if !guards.insert(name.to_string()) {
            return Err(EntityError::CyclicReference(name.to_string()));
        }
        let result = self.load_inner(name, guards);
        guards.remove(name);
        result
    }

    fn load_inner(
        &self,
        name: &str,
        guards: &mut FxHashSet<String>,
    ) -> Result<Arc<SqlEntity>, EntityError> {
        let sql_path = self.root.join(format!("{name}.sql"));
        let json_path = self.root.join(format!("{name}.sql.json"));

        let sql_meta = fs::metadata(&sql_path).map_err(|source| read_error(name, source))?;
        if sql_meta.is_dir() {
            return Err(EntityError::IsDirectory(name.to_string()));
        }
        let mut modified = sql_meta
            .modified()
            .map_err(|source| io_error(name, source))?;
        if let Ok(json_modified) = fs::metadata(&json_path).and_then(|meta| meta.modified()) {
            modified = modified.max(json_modified);
        }

        if let Some(entry) = self.cache.get(name) {
            if entry.modified >= modified {
                tracing::trace!(entity = name, "entity cache hit");
                return Ok(Arc::clone(&entry.entity));
            }
        }
        tracing::debug!(entity = name, "compiling entity");

        let text = fs::read_to_string(&sql_path).map_err(|source| read_error(name, source))?;
        if text.trim().is_empty() {
            return Err(EntityError::EmptyEntity(name.to_string()));
        }

        let overrides = match fs::read_to_string(&json_path) {
            Ok(json_text) => {
                EntityOverrides::parse(&json_text).map_err(|source| EntityError::Json {
                    name: name.to_string(),
                    source,
                })?
            }
            Err(source) if source.kind() == io::ErrorKind::NotFound => EntityOverrides::default(),
            Err(source) => return Err(io_error(name, source)),
        };

        let mut entity = if overrides.command == Some(true) {
            // Declared commands bypass the parser entirely; the text may use
            // dialect syntax the grammar does not cover.
            let mut entity = SqlEntity::new(name, text.clone());
            entity.command = true;
            for occurrence in scan_named_parameters(&text) {
                if !entity.parameters.contains(&occurrence.name) {
                    entity
                        .parameters
                        .insert(occurrence.name.clone(), Parameter::unbound(occurrence.name));
                }
            }
            entity
        } else {
            let statement = sqlet_sql::parse(&text).map_err(|source| EntityError::Parse {
                name: name.to_string(),
                source,
            })?;
            match statement {
                Statement::Select(select) => {
                    let mut ctx = InlineContext {
                        engine: self,
                        entity: name,
                        base: parent_directory(name).to_string(),
                        binds: overrides.parameter_binds(),
                        guards,
                    };
                    let inlined = inline_select(select, &mut ctx)?;
                    let fields =
                        resolve_fields(&inlined.body, self.metadata.as_ref(), self.options)?;

                    let statement = Statement::Select(inlined);
                    let mut entity = SqlEntity::new(name, statement.to_string());
                    entity.fields = fields;
                    for parameter in named_parameters(&statement) {
                        entity
                            .parameters
                            .insert(parameter.clone(), Parameter::unbound(parameter));
                    }
                    entity
                }
                Statement::Command(command) => {
                    let statement = Statement::Command(command);
                    let mut entity = SqlEntity::new(name, statement.to_string());
                    entity.command = true;
                    for parameter in named_parameters(&statement) {
                        entity
                            .parameters
                            .insert(parameter.clone(), Parameter::unbound(parameter));
                    }
                    entity
                }
            }
        };

        overrides.apply_parameters(&mut entity);
        overrides.apply_fields(&mut entity);
        overrides.apply_scalars(&mut entity);

        let entity = Arc::new(entity);
        self.cache.insert(
            name.to_string(),
            CacheEntry {
                entity: Arc::clone(&entity),
                modified,
            },
        );
        Ok(entity)
    }
}

/// The directory part of an entity name ("" for root-level entities).
fn parent_directory(name: &str) -> &str {
    name.rsplit_once('/').map_or("", |(base, _)| base)
}

fn read_error(name: &str, source: io::Error) -> EntityError {
    if source.kind() == io::ErrorKind::NotFound {
        EntityError::NotFound(name.to_string())
    } else {
        io_error(name, source)
    }
}

fn io_error(name: &str, source: io::Error) -> EntityError {
    EntityError::Io {
        name: name.to_string(),
        source,
    }
}
