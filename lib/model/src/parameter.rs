use crate::FieldType;

/// Binding direction of a parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterMode {
    #[default]
    In,
    InOut,
}

/// A named placeholder in an entity's SQL text.
///
/// Multiple `:name` occurrences with the same (case-insensitive) name are
/// one logical parameter. Parameters that the side file does not describe
/// stay string-typed and unbound.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub data_type: FieldType,
    pub mode: ParameterMode,
    /// Default value bound at declaration time, if any.
    pub value: Option<String>,
    pub description: Option<String>,
}

impl Parameter {
    /// An undeclared parameter: string-typed, in-mode, unbound.
    pub fn unbound(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            data_type: FieldType::String,
            ..Parameter::default()
        }
    }
}
