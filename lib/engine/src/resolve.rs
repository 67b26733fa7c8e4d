//! Column/field resolution: from a parsed, fully-inlined select to the
//! entity's typed output schema.
//!
//! Two asymmetric rules are load-bearing and deliberately preserved:
//! `*` expansion merges sources in order with the *last* source winning name
//! collisions, while unqualified column lookup picks the *first* source that
//! contains the column. Unresolvable references degrade to bare fields
//! instead of failing, so free-form SQL still yields a usable schema.

use crate::error::EntityError;
use crate::metadata::MetadataProvider;
use sqlet_model::{Field, NamedMap};
use sqlet_sql::{ColumnRef, Expr, FromSource, PlainSelect, SelectBody, SelectItem};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Report a field's `table_name` as the owning source's alias instead of
    /// the physical table name. Commit routing under same-table self-joins
    /// needs this.
    pub aliases_to_table_names: bool,
}

/// Resolves the output schema of a select body.
///
/// Union trees resolve through their leftmost arm, which fixes the result
/// shape in SQL.
pub(crate) fn resolve_fields(
    body: &SelectBody,
    metadata: &dyn MetadataProvider,
    options: ResolveOptions,
) -> Result<NamedMap<Field>, EntityError> {
    resolve_plain(body.leftmost(), metadata, options)
}

fn resolve_plain(
    plain: &PlainSelect,
    metadata: &dyn MetadataProvider,
    options: ResolveOptions,
) -> Result<NamedMap<Field>, EntityError> {
    let mut resolver = Resolver::new(plain, metadata, options);
    let mut fields = NamedMap::new();

    for item in &plain.items {
        match item {
            SelectItem::Wildcard => {
                for index in 0..resolver.sources.len() {
                    resolver.merge_source(index, &mut fields)?;
                }
            }
            SelectItem::TableWildcard(qualifier) => {
                // The parser's qualifier is matched back into the source map
                // by name, never by node identity.
                if let Some(index) = resolver.index_of(qualifier) {
                    resolver.merge_source(index, &mut fields)?;
                }
            }
            SelectItem::Expr { expr, alias } => {
                if let Expr::Column(column) = expr {
                    let field = resolver.resolve_column(column, alias.as_deref())?;
                    fields.insert(field.name.clone(), field);
                } else if let Some(alias) = alias {
                    fields.insert(alias.clone(), Field::named(alias.clone()));
                }
                // An unaliased free expression contributes no static field;
                // the driver names it at execution time.
            }
        }
    }

    Ok(fields)
}

struct Resolver<'a> {
    sources: Vec<&'a FromSource>,
    /// Lower-cased effective name per source, `None` for unaliased
    /// sub-selects (they are unaddressable but still expand under `*`).
    keys: Vec<Option<String>>,
    columns: Vec<Option<Option<NamedMap<Field>>>>,
    metadata: &'a dyn MetadataProvider,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    fn new(
        plain: &'a PlainSelect,
        metadata: &'a dyn MetadataProvider,
        options: ResolveOptions,
    ) -> Self {
        let mut sources = vec![&plain.from];
        sources.extend(plain.joins.iter().map(|join| &join.source));
        let keys = sources
            .iter()
            .map(|source| source.effective_name().map(str::to_lowercase))
            .collect();
        Resolver {
            columns: vec![None; sources.len()],
            sources,
            keys,
            metadata,
            options,
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.keys
            .iter()
            .position(|key| key.as_deref() == Some(wanted.as_str()))
    }

    /// The column set of one source, computed on first use.
    ///
    /// `Ok(None)` when the source is a table the metadata does not know.
    fn columns_of(&mut self, index: usize) -> Result<Option<&NamedMap<Field>>, EntityError> {
        if self.columns[index].is_none() {
            let source: &'a FromSource = self.sources[index];
            let computed = match source {
                FromSource::Table(table) => {
                    let columns = self.metadata.table_columns(&table.name)?;
                    columns.map(|columns| {
                        self.rename_owner(columns, table.alias.as_deref(), Some(&table.name))
                    })
                }
                FromSource::SubSelect { select, alias } => {
                    let inner =
                        resolve_plain(select.body.leftmost(), self.metadata, self.options)?;
                    Some(self.rename_owner(inner, alias.as_deref(), None))
                }
            };
            self.columns[index] = Some(computed);
        }
        Ok(self.columns[index].as_ref().and_then(Option::as_ref))
    }

    /// Applies the owner-naming rule to a freshly-computed column set.
    ///
    /// With `aliases_to_table_names` set and an aliased source, fields carry
    /// the alias; otherwise table sources carry the physical table name and
    /// sub-select fields keep whatever the inner resolution produced.
    fn rename_owner(
        &self,
        mut columns: NamedMap<Field>,
        alias: Option<&str>,
        physical: Option<&str>,
    ) -> NamedMap<Field> {
        let owner = if self.options.aliases_to_table_names {
            alias.or(physical)
        } else {
            physical
        };
        if let Some(owner) = owner {
            for field in columns.values_mut() {
                field.table_name = Some(owner.to_string());
            }
        }
        columns
    }

    fn merge_source(
        &mut self,
        index: usize,
        fields: &mut NamedMap<Field>,
    ) -> Result<(), EntityError> {
        let Some(columns) = self.columns_of(index)? else {
            return Ok(());
        };
        for (name, field) in columns.iter() {
            fields.insert(name.to_string(), field.clone());
        }
        Ok(())
    }

    fn resolve_column(
        &mut self,
        column: &ColumnRef,
        alias: Option<&str>,
    ) -> Result<Field, EntityError> {
        let origin = match &column.table {
            Some(qualifier) => match self.index_of(qualifier) {
                Some(index) => self.columns_of(index)?.and_then(|c| c.get(&column.name)),
                // Unknown qualifier: keep the permissive bare-field path.
                None => None,
            },
            None => {
                let mut found = None;
                for index in 0..self.sources.len() {
                    if let Some(columns) = self.columns_of(index)? {
                        if columns.contains(&column.name) {
                            found = Some(index);
                            break;
                        }
                    }
                }
                match found {
                    Some(index) => self.columns_of(index)?.and_then(|c| c.get(&column.name)),
                    None => None,
                }
            }
        };

        let Some(origin) = origin else {
            let mut field = Field::named(alias.unwrap_or(&column.name));
            if alias.is_some() {
                field.original_name = Some(column.name.clone());
            }
            return Ok(field);
        };

        let field = match alias {
            Some(alias) => origin.aliased(alias),
            None => {
                let mut field = origin.clone();
                field.name = column.name.clone();
                field
            }
        };
        Ok(field)
    }
}
