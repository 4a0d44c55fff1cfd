use type_mapping::SqlValue;

/// Ensure a parameter name carries the `@` prefix
pub fn normalize_parameter_name(name: &str) -> String {
    if name.starts_with('@') {
        name.to_string()
    } else {
        format!("@{}", name)
    }
}

/// A named statement parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: SqlValue,
}

impl Parameter {
    pub fn new(name: &str, value: impl Into<SqlValue>) -> Self {
        Self {
            name: normalize_parameter_name(name),
            value: value.into(),
        }
    }

    /// Name including the `@` prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    fn matches(&self, name: &str) -> bool {
        self.name[1..].eq_ignore_ascii_case(name.trim_start_matches('@'))
    }
}

/// Statement text plus its parameters, in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    text: String,
    parameters: Vec<Parameter>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.add_parameter(name, value);
        self
    }

    /// Add a parameter; an existing parameter with the same name (ignoring
    /// case) has its value replaced in place
    pub fn add_parameter(&mut self, name: &str, value: impl Into<SqlValue>) {
        let parameter = Parameter::new(name, value);
        match self.parameters.iter_mut().find(|p| p.matches(name)) {
            Some(existing) => existing.value = parameter.value,
            None => self.parameters.push(parameter),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Value of the parameter named `name`, with or without the `@` prefix
    pub fn parameter(&self, name: &str) -> Option<&SqlValue> {
        self.parameters
            .iter()
            .find(|p| p.matches(name))
            .map(Parameter::value)
    }

    /// Statements with only whitespace are skipped by batch execution
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
