//! `.sql.json` side-file handling.
//!
//! Extraction is tolerant per field: a wrong-typed value falls back to the
//! structurally-inferred one instead of failing the whole document, so the
//! file is read into a [serde_json::Value] and picked apart with typed
//! accessors. Only JSON syntax errors are fatal.

use crate::entity::SqlEntity;
use rustc_hash::FxHashMap;
use serde_json::Value;
use sqlet_model::{Field, FieldType, ForeignKey, Parameter, ParameterMode};

#[derive(Debug, Default)]
pub(crate) struct FieldOverride {
    pub name: String,
    pub data_type: Option<FieldType>,
    pub description: Option<String>,
    pub nullable: Option<bool>,
    pub original_name: Option<String>,
    pub table_name: Option<String>,
    pub key: Option<bool>,
    pub reference: Option<ForeignKey>,
}

#[derive(Debug, Default)]
pub(crate) struct ParameterOverride {
    pub name: String,
    pub data_type: Option<FieldType>,
    pub description: Option<String>,
    pub value: Option<String>,
    pub out: Option<bool>,
    /// Sub-query alias → sub-parameter names bound to this parameter.
    pub binds: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Default)]
pub(crate) struct EntityOverrides {
    pub title: Option<String>,
    pub custom_sql: Option<String>,
    pub command: Option<bool>,
    pub procedure: Option<bool>,
    pub readonly: Option<bool>,
    pub public_access: Option<bool>,
    pub page_size: Option<u32>,
    pub datasource: Option<String>,
    pub parameters: Vec<ParameterOverride>,
    pub fields: Vec<FieldOverride>,
    pub writable: Vec<String>,
    pub read_roles: Vec<String>,
    pub write_roles: Vec<String>,
}

fn string_of(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn scalar_string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn field_type_of(value: &Value) -> Option<FieldType> {
    value.as_str().and_then(|name| name.parse().ok())
}

fn string_list_of(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(string_of).collect())
        .unwrap_or_default()
}

impl EntityOverrides {
    pub(crate) fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let document: Value = serde_json::from_str(text)?;
        let mut overrides = EntityOverrides::default();
        let Some(root) = document.as_object() else {
            return Ok(overrides);
        };

        overrides.title = root.get("title").and_then(string_of);
        overrides.custom_sql = root.get("sql").and_then(string_of);
        overrides.command = root.get("command").and_then(Value::as_bool);
        overrides.procedure = root.get("procedure").and_then(Value::as_bool);
        overrides.readonly = root.get("readonly").and_then(Value::as_bool);
        overrides.public_access = root.get("public").and_then(Value::as_bool);
        overrides.page_size = root
            .get("pageSize")
            .and_then(Value::as_u64)
            .and_then(|size| u32::try_from(size).ok());
        overrides.datasource = root.get("source").and_then(string_of);

        if let Some(parameters) = root.get("parameters").and_then(Value::as_object) {
            for (name, spec) in parameters {
                let mut parameter = ParameterOverride {
                    name: name.clone(),
                    ..ParameterOverride::default()
                };
                if let Some(spec) = spec.as_object() {
                    parameter.data_type = spec.get("type").and_then(field_type_of);
                    parameter.description = spec.get("description").and_then(string_of);
                    parameter.value = spec.get("value").and_then(scalar_string_of);
                    parameter.out = spec.get("out").and_then(Value::as_bool);
                    if let Some(binds) = spec.get("binds").and_then(Value::as_object) {
                        for (sub_query, names) in binds {
                            parameter
                                .binds
                                .push((sub_query.clone(), string_list_of(names)));
                        }
                    }
                }
                overrides.parameters.push(parameter);
            }
        }

        if let Some(fields) = root.get("fields").and_then(Value::as_object) {
            for (name, spec) in fields {
                let mut field = FieldOverride {
                    name: name.clone(),
                    ..FieldOverride::default()
                };
                if let Some(spec) = spec.as_object() {
                    field.data_type = spec.get("type").and_then(field_type_of);
                    field.description = spec.get("description").and_then(string_of);
                    field.nullable = spec.get("nullable").and_then(Value::as_bool);
                    field.original_name = spec.get("originalName").and_then(string_of);
                    field.table_name = spec.get("tableName").and_then(string_of);
                    field.key = spec.get("key").and_then(Value::as_bool);
                    field.reference = spec.get("reference").and_then(Value::as_object).and_then(
                        |reference| {
                            Some(ForeignKey {
                                entity: reference.get("entity").and_then(string_of)?,
                                column: reference.get("key").and_then(string_of)?,
                            })
                        },
                    );
                }
                overrides.fields.push(field);
            }
        }

        overrides.writable = root.get("writable").map(string_list_of).unwrap_or_default();
        if let Some(roles) = root.get("roles").and_then(Value::as_object) {
            overrides.read_roles = roles.get("read").map(string_list_of).unwrap_or_default();
            overrides.write_roles = roles.get("write").map(string_list_of).unwrap_or_default();
        }

        Ok(overrides)
    }

    /// The parameter-renaming map the inliner consumes:
    /// sub-query alias (lower-cased) → sub-parameter name (lower-cased) →
    /// outer parameter name.
    pub(crate) fn parameter_binds(&self) -> FxHashMap<String, FxHashMap<String, String>> {
        let mut binds: FxHashMap<String, FxHashMap<String, String>> = FxHashMap::default();
        for parameter in &self.parameters {
            for (sub_query, names) in &parameter.binds {
                let entry = binds.entry(sub_query.to_lowercase()).or_default();
                for name in names {
                    entry.insert(name.to_lowercase(), parameter.name.clone());
                }
            }
        }
        binds
    }

    /// Merges everything except parameters/fields that need structural
    /// context; those are applied by the loader right after resolution.
    pub(crate) fn apply_scalars(&self, entity: &mut SqlEntity) {
        if let Some(title) = &self.title {
            entity.title = Some(title.clone());
        }
        if let Some(custom_sql) = &self.custom_sql {
            entity.custom_sql = Some(custom_sql.clone());
        }
        if let Some(command) = self.command {
            entity.command = command;
        }
        if let Some(procedure) = self.procedure {
            entity.procedure = procedure;
        }
        if let Some(readonly) = self.readonly {
            entity.readonly = readonly;
        }
        if let Some(public_access) = self.public_access {
            entity.public_access = public_access;
        }
        if let Some(page_size) = self.page_size {
            entity.page_size = Some(page_size);
        }
        if let Some(datasource) = &self.datasource {
            entity.datasource = Some(datasource.clone());
        }
        entity.writable.extend(self.writable.iter().cloned());
        entity.read_roles.extend(self.read_roles.iter().cloned());
        entity.write_roles.extend(self.write_roles.iter().cloned());
    }

    /// Applies parameter overrides onto the extracted parameter map.
    ///
    /// Declared parameters missing from the statement are appended — custom
    /// SQL overrides may reference parameters the structural text does not.
    pub(crate) fn apply_parameters(&self, entity: &mut SqlEntity) {
        for spec in &self.parameters {
            if entity.parameters.get(&spec.name).is_none() {
                entity
                    .parameters
                    .insert(spec.name.clone(), Parameter::unbound(spec.name.clone()));
            }
            let Some(parameter) = entity.parameters.get_mut(&spec.name) else {
                continue;
            };
            if let Some(data_type) = spec.data_type {
                parameter.data_type = data_type;
            }
            if let Some(description) = &spec.description {
                parameter.description = Some(description.clone());
            }
            if let Some(value) = &spec.value {
                parameter.value = Some(value.clone());
            }
            if let Some(out) = spec.out {
                parameter.mode = if out {
                    ParameterMode::InOut
                } else {
                    ParameterMode::In
                };
            }
        }
    }

    /// Applies field overrides onto the resolved schema.
    ///
    /// JSON wins where it speaks; structural facts (keys, references) stay
    /// untouched where it does not. Unknown field names are appended as new
    /// fields — command entities have no structural schema at all.
    pub(crate) fn apply_fields(&self, entity: &mut SqlEntity) {
        for spec in &self.fields {
            if entity.fields.get(&spec.name).is_none() {
                entity
                    .fields
                    .insert(spec.name.clone(), Field::named(spec.name.clone()));
            }
            let Some(field) = entity.fields.get_mut(&spec.name) else {
                continue;
            };
            if let Some(data_type) = spec.data_type {
                field.data_type = data_type;
            }
            if let Some(description) = &spec.description {
                field.description = Some(description.clone());
            }
            if let Some(nullable) = spec.nullable {
                field.nullable = nullable;
            }
            if let Some(original_name) = &spec.original_name {
                field.original_name = Some(original_name.clone());
            }
            if let Some(table_name) = &spec.table_name {
                field.table_name = Some(table_name.clone());
            }
            if let Some(key) = spec.key {
                field.primary_key = key;
            }
            if let Some(reference) = &spec.reference {
                field.foreign_key = Some(reference.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_fall_back_individually() {
        let overrides = EntityOverrides::parse(
            r#"{
                "title": 42,
                "readonly": true,
                "pageSize": "lots",
                "fields": {"total": {"type": "double", "nullable": "maybe"}}
            }"#,
        )
        .unwrap();
        assert_eq!(overrides.title, None);
        assert_eq!(overrides.readonly, Some(true));
        assert_eq!(overrides.page_size, None);
        assert_eq!(overrides.fields[0].data_type, Some(FieldType::Double));
        assert_eq!(overrides.fields[0].nullable, None);
    }

    #[test]
    fn binds_invert_to_alias_keyed_maps() {
        let overrides = EntityOverrides::parse(
            r#"{"parameters": {"outer": {"binds": {"Sub": ["inner1", "Inner2"]}}}}"#,
        )
        .unwrap();
        let binds = overrides.parameter_binds();
        let sub = binds.get("sub").unwrap();
        assert_eq!(sub.get("inner1").map(String::as_str), Some("outer"));
        assert_eq!(sub.get("inner2").map(String::as_str), Some("outer"));
    }

    #[test]
    fn syntax_errors_are_fatal() {
        assert!(EntityOverrides::parse("{not json").is_err());
    }
}
