use std::fmt;
use std::str::FromStr;

/// The generic type tag attached to a [Field] or
/// [Parameter](crate::Parameter).
///
/// These tags abstract over the concrete database column types. A driver
/// maps its own types onto this set; the resolver only copies them around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldType {
    #[default]
    String,
    Long,
    Double,
    Date,
    Boolean,
    Geometry,
    /// The type could not be inferred statically. Execution fills it in from
    /// the data actually returned by the driver.
    Unknown,
}

impl FieldType {
    /// The canonical lower-case name used in `.sql.json` side files.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Geometry => "geometry",
            FieldType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The name is not one of the recognized type tags.
#[derive(Debug, thiserror::Error)]
#[error("unknown field type '{0}'")]
pub struct FieldTypeParseError(pub String);

impl FromStr for FieldType {
    type Err = FieldTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "long" => Ok(FieldType::Long),
            "double" => Ok(FieldType::Double),
            "date" => Ok(FieldType::Date),
            "boolean" => Ok(FieldType::Boolean),
            "geometry" => Ok(FieldType::Geometry),
            "unknown" => Ok(FieldType::Unknown),
            _ => Err(FieldTypeParseError(s.to_string())),
        }
    }
}

/// A reference from a field to the key column of another entity or table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKey {
    /// The referenced entity name or physical table name.
    pub entity: String,
    /// The referenced column.
    pub column: String,
}

/// A described output column of an entity's result schema.
///
/// Fields are produced by the column resolver from the parsed statement and
/// the live table metadata, then adjusted by `.sql.json` overrides. They are
/// plain data; the engine treats them as immutable once the entity is built.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Output name, after alias substitution.
    pub name: String,
    /// The column name before aliasing, when the two differ.
    pub original_name: Option<String>,
    pub description: Option<String>,
    /// The owning source: the alias of the originating from-source or the
    /// physical table name, depending on engine options. Commit routing maps
    /// a field back to its writable table through this.
    pub table_name: Option<String>,
    pub data_type: FieldType,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl Field {
    /// A bare field carrying nothing but its name.
    ///
    /// This is what the resolver emits for opaque expressions and for column
    /// references it cannot trace back to a source.
    pub fn named(name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            original_name: None,
            description: None,
            table_name: None,
            data_type: FieldType::Unknown,
            nullable: true,
            primary_key: false,
            foreign_key: None,
        }
    }

    /// Clone this field under a new output name, remembering the original.
    pub fn aliased(&self, alias: impl Into<String>) -> Self {
        let mut field = self.clone();
        field.original_name = Some(self.name.clone());
        field.name = alias.into();
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_round_trips_through_names() {
        for ty in [
            FieldType::String,
            FieldType::Long,
            FieldType::Double,
            FieldType::Date,
            FieldType::Boolean,
            FieldType::Geometry,
            FieldType::Unknown,
        ] {
            assert_eq!(ty.as_str().parse::<FieldType>().unwrap(), ty);
        }
        assert_eq!("LONG".parse::<FieldType>().unwrap(), FieldType::Long);
        assert!("varchar2".parse::<FieldType>().is_err());
    }

    #[test]
    fn aliased_keeps_origin_metadata() {
        let mut field = Field::named("amount");
        field.data_type = FieldType::Double;
        field.primary_key = true;

        let aliased = field.aliased("total");
        assert_eq!(aliased.name, "total");
        assert_eq!(aliased.original_name.as_deref(), Some("amount"));
        assert_eq!(aliased.data_type, FieldType::Double);
        assert!(aliased.primary_key);
    }
}
