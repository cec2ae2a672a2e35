//! Statically built command descriptors.
//!
//! A [`CommandSchema`] describes one command: its options (typed, with an
//! optional default and help text) and its nested subcommands. Schemas are
//! assembled once with the builder methods and never mutated afterwards; the
//! parser produces a fresh [`BoundCommand`] for every input line.

use std::collections::BTreeMap;
use std::fmt;

use crate::registry::RegistrationError;

/// Element type of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Text,
}

impl ScalarKind {
    pub fn label(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Text => "string",
        }
    }

    /// Coerce a single token into a value of this kind.
    pub fn coerce(self, raw: &str) -> Option<OptionValue> {
        match self {
            ScalarKind::Bool => parse_bool(raw).map(OptionValue::Bool),
            ScalarKind::Int => raw.parse::<i64>().ok().map(OptionValue::Int),
            ScalarKind::Float => raw.parse::<f64>().ok().map(OptionValue::Float),
            ScalarKind::Text => Some(OptionValue::Text(raw.to_string())),
        }
    }
}

/// Type of an option: a single scalar or a comma separated list of scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Scalar(ScalarKind),
    List(ScalarKind),
}

impl OptionKind {
    pub fn is_flag(self) -> bool {
        self == OptionKind::Scalar(ScalarKind::Bool)
    }

    pub fn label(self) -> String {
        match self {
            OptionKind::Scalar(kind) => kind.label().to_string(),
            OptionKind::List(kind) => format!("[]{}", kind.label()),
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.label())
    }
}

/// A bound option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<OptionValue>),
}

impl OptionValue {
    /// Whether this value can be stored in an option of `kind`.
    pub fn fits(&self, kind: OptionKind) -> bool {
        match (self, kind) {
            (OptionValue::List(items), OptionKind::List(element)) => items
                .iter()
                .all(|item| item.fits(OptionKind::Scalar(element))),
            (OptionValue::Bool(_), OptionKind::Scalar(ScalarKind::Bool))
            | (OptionValue::Int(_), OptionKind::Scalar(ScalarKind::Int))
            | (OptionValue::Float(_), OptionKind::Scalar(ScalarKind::Float))
            | (OptionValue::Text(_), OptionKind::Scalar(ScalarKind::Text)) => true,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[OptionValue]> {
        match self {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{value}"),
            OptionValue::Int(value) => write!(f, "{value}"),
            OptionValue::Float(value) => write!(f, "{value}"),
            OptionValue::Text(value) => f.write_str(value),
            OptionValue::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl<V: Into<OptionValue>> From<Vec<V>> for OptionValue {
    fn from(values: Vec<V>) -> Self {
        OptionValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Literal boolean parsing: `1 t true 0 f false`, any case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

/// Describes a single named option of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    name: String,
    kind: OptionKind,
    default: Option<OptionValue>,
    help: String,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            help: String::new(),
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Scalar(ScalarKind::Bool))
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Scalar(ScalarKind::Int))
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Scalar(ScalarKind::Float))
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Scalar(ScalarKind::Text))
    }

    pub fn list(name: impl Into<String>, element: ScalarKind) -> Self {
        Self::new(name, OptionKind::List(element))
    }

    pub fn default_value(mut self, value: impl Into<OptionValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = text.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn default(&self) -> Option<&OptionValue> {
        self.default.as_ref()
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }
}

/// Descriptor of a command and its nested subcommands.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSchema {
    name: String,
    help: String,
    options: Vec<OptionSpec>,
    subcommands: Vec<CommandSchema>,
}

impl CommandSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            options: Vec::new(),
            subcommands: Vec::new(),
        }
    }

    /// Help text. The first line doubles as the summary in listings.
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = text.into();
        self
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn subcommand(mut self, schema: CommandSchema) -> Self {
        self.subcommands.push(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    pub fn summary(&self) -> &str {
        self.help.lines().next().unwrap_or_default()
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn subcommands(&self) -> &[CommandSchema] {
        &self.subcommands
    }

    pub fn find_subcommand(&self, token: &str) -> Option<&CommandSchema> {
        self.subcommands
            .iter()
            .find(|schema| schema.name.eq_ignore_ascii_case(token))
    }

    pub fn find_option(&self, token: &str) -> Option<&OptionSpec> {
        self.options
            .iter()
            .find(|option| option.name.eq_ignore_ascii_case(token))
    }

    /// Walk `path` below this schema. The first element must be this
    /// schema's own name.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<&CommandSchema> {
        let (first, rest) = path.split_first()?;
        if !self.name.eq_ignore_ascii_case(first.as_ref()) {
            return None;
        }
        rest.iter()
            .try_fold(self, |schema, segment| schema.find_subcommand(segment.as_ref()))
    }

    /// Options of this command that declare a default.
    pub fn defaults(&self) -> BTreeMap<String, OptionValue> {
        self.options
            .iter()
            .filter_map(|option| {
                option
                    .default
                    .as_ref()
                    .map(|value| (option.name.clone(), value.clone()))
            })
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<(), RegistrationError> {
        if !is_valid_name(&self.name) {
            return Err(RegistrationError::InvalidName(self.name.clone()));
        }

        let mut seen: Vec<String> = Vec::new();
        let names = self
            .options
            .iter()
            .map(|option| option.name.as_str())
            .chain(self.subcommands.iter().map(|schema| schema.name.as_str()));
        for name in names {
            let lowered = name.to_ascii_lowercase();
            if seen.contains(&lowered) {
                return Err(RegistrationError::DuplicateField {
                    command: self.name.clone(),
                    field: name.to_string(),
                });
            }
            seen.push(lowered);
        }

        for option in &self.options {
            if !is_valid_name(&option.name) {
                return Err(RegistrationError::InvalidName(option.name.clone()));
            }
            if let Some(default) = &option.default {
                if !default.fits(option.kind) {
                    return Err(RegistrationError::DefaultKindMismatch {
                        command: self.name.clone(),
                        option: option.name.clone(),
                        kind: option.kind.label(),
                    });
                }
            }
        }

        self.subcommands.iter().try_for_each(CommandSchema::validate)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c == '=')
}

/// A command resolved and bound from one line of input.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCommand {
    path: Vec<String>,
    values: BTreeMap<String, OptionValue>,
}

impl BoundCommand {
    pub fn new(path: Vec<String>, values: BTreeMap<String, OptionValue>) -> Self {
        Self { path, values }
    }

    /// Full resolved path, starting with the top-level command name.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Top-level command name.
    pub fn root(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }

    /// Name of the resolved (deepest) command.
    pub fn leaf(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Path segments below the top-level command.
    pub fn subcommands(&self) -> &[String] {
        self.path.get(1..).unwrap_or_default()
    }

    pub fn values(&self) -> &BTreeMap<String, OptionValue> {
        &self.values
    }

    pub fn get(&self, option: &str) -> Option<&OptionValue> {
        self.values.get(option)
    }

    /// Flag value. Unset flags read as `false`.
    pub fn flag(&self, option: &str) -> bool {
        self.get(option)
            .and_then(OptionValue::as_bool)
            .unwrap_or(false)
    }

    pub fn int(&self, option: &str) -> Option<i64> {
        self.get(option).and_then(OptionValue::as_int)
    }

    pub fn float(&self, option: &str) -> Option<f64> {
        self.get(option).and_then(OptionValue::as_float)
    }

    pub fn text(&self, option: &str) -> Option<&str> {
        self.get(option).and_then(OptionValue::as_text)
    }

    /// Text elements of a list option. Unset lists read as empty.
    pub fn texts(&self, option: &str) -> Vec<&str> {
        self.get(option)
            .and_then(OptionValue::as_list)
            .map(|items| items.iter().filter_map(OptionValue::as_text).collect())
            .unwrap_or_default()
    }

    pub fn ints(&self, option: &str) -> Vec<i64> {
        self.get(option)
            .and_then(OptionValue::as_list)
            .map(|items| items.iter().filter_map(OptionValue::as_int).collect())
            .unwrap_or_default()
    }

    /// Canonical command line: the path followed by every option whose
    /// value differs from the leaf's declared default. `true` flags are
    /// written bare.
    pub fn canonical_text(&self, leaf: &CommandSchema) -> String {
        let defaults = leaf.defaults();
        let mut parts: Vec<String> = self.path.clone();
        for (name, value) in &self.values {
            if defaults.get(name) == Some(value) {
                continue;
            }
            match value {
                OptionValue::Bool(true) => parts.push(name.clone()),
                other => parts.push(format!("{name}={other}")),
            }
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandSchema {
        CommandSchema::new("list")
            .help("Lists various things.\nMore detail.")
            .subcommand(CommandSchema::new("resources").help("Lists resources."))
            .option(OptionSpec::int("n").default_value(25))
    }

    #[test]
    fn summary_is_first_help_line() {
        assert_eq!(sample().summary(), "Lists various things.");
        assert_eq!(CommandSchema::new("bare").summary(), "");
    }

    #[test]
    fn resolve_walks_case_insensitively() {
        let schema = sample();
        let leaf = schema.resolve(&["list", "RESOURCES"]).expect("resolves");
        assert_eq!(leaf.name(), "resources");
        assert!(schema.resolve(&["list", "missing"]).is_none());
        assert!(schema.resolve(&["other"]).is_none());
    }

    #[test]
    fn validate_rejects_default_of_wrong_kind() {
        let schema = CommandSchema::new("query").option(OptionSpec::int("n").default_value("ten"));
        assert!(matches!(
            schema.validate(),
            Err(RegistrationError::DefaultKindMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_option_shadowing_subcommand() {
        let schema = CommandSchema::new("list")
            .subcommand(CommandSchema::new("all"))
            .option(OptionSpec::flag("ALL"));
        assert!(matches!(
            schema.validate(),
            Err(RegistrationError::DuplicateField { .. })
        ));
    }

    #[test]
    fn list_values_render_comma_joined() {
        let value = OptionValue::from(vec!["Position", "Velocity"]);
        assert_eq!(value.to_string(), "Position,Velocity");
        assert!(value.fits(OptionKind::List(ScalarKind::Text)));
        assert!(!value.fits(OptionKind::List(ScalarKind::Int)));
    }

    #[test]
    fn parse_bool_accepts_short_literals() {
        assert_eq!(parse_bool("T"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
