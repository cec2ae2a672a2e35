use std::collections::BTreeMap;

use thiserror::Error;

use crate::schema::CommandSchema;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("command '{0}' is already registered")]
    DuplicateName(String),
    #[error("invalid command or option name '{0}'")]
    InvalidName(String),
    #[error("command '{command}' declares '{field}' more than once")]
    DuplicateField { command: String, field: String },
    #[error("default of option '{option}' in command '{command}' is not a {kind}")]
    DefaultKindMismatch {
        command: String,
        option: String,
        kind: String,
    },
}

/// A registered command: its schema, the handler bound to it and whether it
/// shows up in help listings.
#[derive(Debug)]
pub struct RegistryEntry<H> {
    schema: CommandSchema,
    handler: H,
    visible: bool,
}

impl<H> RegistryEntry<H> {
    pub fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Top-level command table. Names are matched exactly.
#[derive(Debug)]
pub struct Registry<H = ()> {
    entries: BTreeMap<String, RegistryEntry<H>>,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<H> Registry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        schema: CommandSchema,
        handler: H,
        visible: bool,
    ) -> Result<(), RegistrationError> {
        if self.entries.contains_key(schema.name()) {
            return Err(RegistrationError::DuplicateName(schema.name().to_string()));
        }
        schema.validate()?;
        self.entries.insert(
            schema.name().to_string(),
            RegistryEntry {
                schema,
                handler,
                visible,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&RegistryEntry<H>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Schema at the end of a full command path.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<&CommandSchema> {
        let root = path.first()?;
        self.lookup(root.as_ref())?.schema.resolve(path)
    }

    /// Visible entries in name order.
    pub fn visible(&self) -> impl Iterator<Item = &RegistryEntry<H>> {
        self.entries.values().filter(|entry| entry.visible)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OptionSpec;

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = Registry::new();
        registry
            .register(CommandSchema::new("stats"), (), true)
            .expect("first registration");
        let err = registry
            .register(CommandSchema::new("stats").help("again"), (), true)
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateName("stats".into()));
        assert_eq!(registry.lookup("stats").unwrap().schema().help_text(), "");
    }

    #[test]
    fn hidden_entries_are_callable_but_not_listed() {
        let mut registry = Registry::new();
        registry
            .register(CommandSchema::new("stats-json"), (), false)
            .unwrap();
        registry.register(CommandSchema::new("stats"), (), true).unwrap();

        assert!(registry.lookup("stats-json").is_some());
        let listed: Vec<&str> = registry.visible().map(|e| e.schema().name()).collect();
        assert_eq!(listed, vec!["stats"]);
    }

    #[test]
    fn invalid_schema_is_not_inserted() {
        let mut registry = Registry::new();
        let schema = CommandSchema::new("query")
            .option(OptionSpec::int("n"))
            .option(OptionSpec::text("N"));
        assert!(registry.register(schema, (), true).is_err());
        assert!(registry.is_empty());
    }
}
