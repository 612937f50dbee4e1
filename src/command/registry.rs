//! Registry of command executors.
//!
//! Each command contributes a descriptor once at registration. Lookup is by primary
//! name or alias, case-insensitive, and tries a two-word sub-command path (`mail send`)
//! before a single word so parents and children can share a root.
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::context::CommandContext;
use super::descriptor::CommandDescriptor;
use super::outcome::{CommandError, CommandResult};

/// The single capability every command implements.
pub trait Command: Send + Sync {
    fn descriptor(&self) -> CommandDescriptor;

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command name '{name}' is already registered by '{existing}'")]
    DuplicateName { name: String, existing: String },

    #[error("command has an empty name")]
    EmptyName,
}

/// A command and its descriptor, as handed out by lookups.
#[derive(Clone)]
pub struct Registered {
    pub descriptor: Arc<CommandDescriptor>,
    pub command: Arc<dyn Command>,
}

/// Longest sub-command path supported by lookups.
const MAX_PATH_WORDS: usize = 2;

#[derive(Default)]
pub struct CommandRegistry {
    entries: Vec<Registered>,
    by_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command under its primary name and aliases. Fails without changing the
    /// registry if any name is taken.
    pub fn register<C: Command + 'static>(&mut self, command: C) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(command))
    }

    pub fn register_arc(&mut self, command: Arc<dyn Command>) -> Result<(), RegistryError> {
        let descriptor = command.descriptor();
        if descriptor.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let names: Vec<String> = descriptor
            .all_names()
            .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect();
        for name in &names {
            if let Some(&idx) = self.by_name.get(name) {
                return Err(RegistryError::DuplicateName {
                    name: name.clone(),
                    existing: self.entries[idx].descriptor.name.clone(),
                });
            }
        }
        let idx = self.entries.len();
        log::debug!("registered command /{} ({} names)", descriptor.name, names.len());
        self.entries.push(Registered {
            descriptor: Arc::new(descriptor),
            command,
        });
        for name in names {
            self.by_name.insert(name, idx);
        }
        Ok(())
    }

    /// Builder-style registration for static setups.
    pub fn with<C: Command + 'static>(mut self, command: C) -> Result<Self, RegistryError> {
        self.register(command)?;
        Ok(self)
    }

    /// Find the command for the leading `tokens`, returning it with the number of tokens
    /// that made up its name.
    pub fn resolve(&self, tokens: &[&str]) -> Option<(Registered, usize)> {
        let max = tokens.len().min(MAX_PATH_WORDS);
        (1..=max).rev().find_map(|words| {
            let key = tokens[..words]
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
            self.by_name
                .get(&key)
                .map(|&idx| (self.entries[idx].clone(), words))
        })
    }

    pub fn get(&self, name: &str) -> Option<Registered> {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        match self.resolve(&tokens) {
            Some((found, words)) if words == tokens.len() => Some(found),
            _ => None,
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.entries.iter().map(|e| e.descriptor.as_ref())
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

    struct Named(&'static str, &'static [&'static str]);

    impl Command for Named {
        fn descriptor(&self) -> CommandDescriptor {
            let mut b = CommandDescriptor::builder(self.0);
            for alias in self.1 {
                b = b.alias(alias);
            }
            b.build()
        }

        fn execute(&self, _ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
            Ok(CommandResult::Success)
        }
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        let registry = CommandRegistry::new()
            .with(Named("lightning", &["smite", "thor"]))
            .unwrap();
        let (found, words) = registry.resolve(&["SMITE", "bob"]).unwrap();
        assert_eq!(found.descriptor.name, "lightning");
        assert_eq!(words, 1);
        assert!(registry.resolve(&["zap"]).is_none());
    }

    #[test]
    fn sub_commands_win_over_parents() {
        let registry = CommandRegistry::new()
            .with(Named("mail", &[]))
            .unwrap()
            .with(Named("mail send", &[]))
            .unwrap();
        let (found, words) = registry.resolve(&["mail", "send", "bob", "hi"]).unwrap();
        assert_eq!(found.descriptor.name, "mail send");
        assert_eq!(words, 2);
        let (found, _) = registry.resolve(&["mail", "bogus"]).unwrap();
        assert_eq!(found.descriptor.name, "mail");
        assert!(registry.get("mail send").is_some());
    }

    #[test]
    fn duplicate_names_are_rejected_atomically() {
        let mut registry = CommandRegistry::new();
        registry.register(Named("home", &[])).unwrap();
        let err = registry.register(Named("sethome", &["home"])).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateName {
                name: "home".into(),
                existing: "home".into()
            }
        );
        assert!(registry.get("sethome").is_none());
        assert_eq!(registry.len(), 1);
    }
}
