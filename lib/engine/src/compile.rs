use crate::entity::SqlEntity;
use sqlet_model::{Field, NamedMap, Parameter};
use sqlet_sql::scan_named_parameters;

/// Placeholder syntax of the executing database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    /// JDBC-style `?`.
    #[default]
    Generic,
    /// Numbered `$1`, `$2`, ...
    Postgres,
    /// Numbered `:1`, `:2`, ...
    Oracle,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Generic => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
            Dialect::Oracle => format!(":{index}"),
        }
    }
}

/// The executable form of an entity: positional SQL plus the parameters to
/// bind, in placeholder order.
///
/// Parameter order here follows textual occurrence, which can differ from
/// the entity's extraction-ordered parameter map when a name occurs more
/// than once — every occurrence binds again.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub parameters: Vec<Parameter>,
    pub fields: NamedMap<Field>,
    pub page_size: Option<u32>,
}

impl SqlEntity {
    /// Compiles the entity into its positional-parameter executable form.
    ///
    /// The custom SQL override, when present, is compiled instead of the
    /// structural text. Everything outside parameter occurrences is
    /// byte-preserved, and compiling the same entity twice yields identical
    /// output.
    pub fn to_query(&self, dialect: Dialect) -> CompiledQuery {
        let source = self.custom_sql.as_deref().unwrap_or(&self.sql);
        let mut sql = String::with_capacity(source.len());
        let mut parameters = Vec::new();
        let mut copied_to = 0;

        for occurrence in scan_named_parameters(source) {
            sql.push_str(&source[copied_to..occurrence.start]);
            sql.push_str(&dialect.placeholder(parameters.len() + 1));
            let parameter = self
                .parameters
                .get(&occurrence.name)
                .cloned()
                .unwrap_or_else(|| Parameter::unbound(occurrence.name.clone()));
            parameters.push(parameter);
            copied_to = occurrence.end;
        }
        sql.push_str(&source[copied_to..]);

        CompiledQuery {
            sql,
            parameters,
            fields: self.fields.clone(),
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlet_model::FieldType;

    fn entity_with(sql: &str) -> SqlEntity {
        SqlEntity::new("test/entity", sql)
    }

    #[test]
    fn repeated_parameters_bind_per_occurrence() {
        let mut entity =
            entity_with("select * from t where t.x > :p1 and t.y = :p2 or t.x < :p1");
        let mut p1 = Parameter::unbound("p1");
        p1.data_type = FieldType::Long;
        entity.parameters.insert("p1", p1);
        entity.parameters.insert("p2", Parameter::unbound("p2"));

        let query = entity.to_query(Dialect::Generic);
        assert_eq!(query.sql, "select * from t where t.x > ? and t.y = ? or t.x < ?");
        let names: Vec<_> = query.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p1", "p2", "p1"]);
        assert_eq!(query.parameters[2].data_type, FieldType::Long);
    }

    #[test]
    fn numbered_dialects_count_occurrences() {
        let entity = entity_with("select * from t where a = :x and b = :x");
        let query = entity.to_query(Dialect::Postgres);
        assert_eq!(query.sql, "select * from t where a = $1 and b = $2");
        let query = entity.to_query(Dialect::Oracle);
        assert_eq!(query.sql, "select * from t where a = :1 and b = :2");
    }

    #[test]
    fn custom_sql_wins_and_text_is_preserved() {
        let mut entity = entity_with("select a from t where a = :p");
        entity.custom_sql =
            Some("select /* :skip */ a from t -- :gone\nwhere a = :p and b = ':s'".to_string());
        let query = entity.to_query(Dialect::Generic);
        assert_eq!(
            query.sql,
            "select /* :skip */ a from t -- :gone\nwhere a = ? and b = ':s'"
        );
        assert_eq!(query.parameters.len(), 1);
    }

    #[test]
    fn compilation_is_idempotent() {
        let entity = entity_with("select a from t where a = :p or b = :q");
        let first = entity.to_query(Dialect::Postgres);
        let second = entity.to_query(Dialect::Postgres);
        assert_eq!(first.sql, second.sql);
    }
}
