//! Static command metadata: identity, permission layout and cross-cutting policy.
//!
//! A [`CommandDescriptor`] is built once per command with [`CommandDescriptor::builder`] and
//! never changes after registration. The dispatcher reads its flags generically; nothing
//! downstream inspects the concrete command type.

use std::fmt;
use std::time::Duration;

use super::args::ArgSpec;

/// Suggested privilege level for a permission node.
///
/// Levels use the same numeric scale as staff roles, so higher values are a superset of
/// lower ones. A caller holding the level node for `Mod` may run anything suggested for
/// `User` or `Mod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuggestedLevel {
    User = 1,
    Mod = 5,
    Admin = 10,
    /// Never granted implicitly through a level node.
    Owner = 100,
}

impl SuggestedLevel {
    pub const ALL: [SuggestedLevel; 4] = [
        SuggestedLevel::User,
        SuggestedLevel::Mod,
        SuggestedLevel::Admin,
        SuggestedLevel::Owner,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Node suffix used for the level grant (`<prefix>.<node_name>`), if the level has one.
    pub fn node_name(self) -> Option<&'static str> {
        match self {
            SuggestedLevel::User => Some("user"),
            SuggestedLevel::Mod => Some("mod"),
            SuggestedLevel::Admin => Some("admin"),
            SuggestedLevel::Owner => None,
        }
    }
}

impl fmt::Display for SuggestedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestedLevel::User => "User",
            SuggestedLevel::Mod => "Moderator",
            SuggestedLevel::Admin => "Admin",
            SuggestedLevel::Owner => "Owner",
        };
        f.write_str(name)
    }
}

/// Where the command body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the main context, for bodies that touch state unsafe to mutate off-thread.
    Inline,
    /// On the worker pool (default), so store loads never block the main context.
    #[default]
    Background,
}

/// Opt-outs from the ledger, plus module and caller requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyFlags {
    pub skip_warmup: bool,
    pub skip_cooldown: bool,
    pub skip_cost: bool,
    /// Console invocations are denied.
    pub player_only: bool,
}

/// A permission suffix a command declares so a backend can enumerate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPermission {
    pub suffix: String,
    pub description: String,
    pub level: SuggestedLevel,
}

/// Default timers and cost; `[commands.<name>]` in the config overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolicyDefaults {
    pub cooldown: Duration,
    pub warmup: Duration,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    /// Primary name. For sub-commands this is the full path, e.g. `mail send`.
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    /// Module the command belongs to; `None` means always enabled.
    pub module: Option<String>,
    pub permission_root: String,
    pub permission_alias: Option<String>,
    pub suggested_level: SuggestedLevel,
    pub flags: PolicyFlags,
    pub mode: ExecutionMode,
    pub sub_permissions: Vec<SubPermission>,
    pub args: Vec<ArgSpec>,
    pub defaults: PolicyDefaults,
}

impl CommandDescriptor {
    pub fn builder(name: &str) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    /// Every name this command answers to, primary first, lowercased.
    pub fn all_names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.to_ascii_lowercase())
            .chain(self.aliases.iter().map(|a| a.to_ascii_lowercase()))
    }

    /// Human readable usage line built from the argument specs.
    pub fn usage(&self) -> String {
        let mut out = format!("/{}", self.name);
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.usage());
        }
        out
    }

    pub fn sub_permission(&self, suffix: &str) -> Option<&SubPermission> {
        self.sub_permissions.iter().find(|s| s.suffix == suffix)
    }
}

/// Builder for [`CommandDescriptor`]; defaults match an unannotated command (admin level,
/// background execution, every policy applies).
pub struct DescriptorBuilder {
    inner: CommandDescriptor,
}

impl DescriptorBuilder {
    fn new(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        let root = name.split_whitespace().next().unwrap_or_default().to_string();
        Self {
            inner: CommandDescriptor {
                name,
                aliases: Vec::new(),
                description: String::new(),
                module: None,
                permission_root: root,
                permission_alias: None,
                suggested_level: SuggestedLevel::Admin,
                flags: PolicyFlags::default(),
                mode: ExecutionMode::Background,
                sub_permissions: Vec::new(),
                args: Vec::new(),
                defaults: PolicyDefaults::default(),
            },
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.inner.aliases.push(alias.to_ascii_lowercase());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.inner.description = description.to_string();
        self
    }

    pub fn module(mut self, module: &str) -> Self {
        self.inner.module = Some(module.to_ascii_lowercase());
        self
    }

    pub fn permission_root(mut self, root: &str) -> Self {
        self.inner.permission_root = root.to_ascii_lowercase();
        self
    }

    pub fn permission_alias(mut self, alias: &str) -> Self {
        self.inner.permission_alias = Some(alias.to_ascii_lowercase());
        self
    }

    pub fn level(mut self, level: SuggestedLevel) -> Self {
        self.inner.suggested_level = level;
        self
    }

    pub fn no_warmup(mut self) -> Self {
        self.inner.flags.skip_warmup = true;
        self
    }

    pub fn no_cooldown(mut self) -> Self {
        self.inner.flags.skip_cooldown = true;
        self
    }

    pub fn no_cost(mut self) -> Self {
        self.inner.flags.skip_cost = true;
        self
    }

    /// Shorthand for `no_warmup().no_cooldown().no_cost()`.
    pub fn no_modifiers(self) -> Self {
        self.no_warmup().no_cooldown().no_cost()
    }

    pub fn player_only(mut self) -> Self {
        self.inner.flags.player_only = true;
        self
    }

    pub fn inline(mut self) -> Self {
        self.inner.mode = ExecutionMode::Inline;
        self
    }

    pub fn sub_permission(mut self, suffix: &str, description: &str, level: SuggestedLevel) -> Self {
        self.inner.sub_permissions.push(SubPermission {
            suffix: suffix.to_ascii_lowercase(),
            description: description.to_string(),
            level,
        });
        self
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.inner.args.push(spec);
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.inner.defaults.cooldown = cooldown;
        self
    }

    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.inner.defaults.warmup = warmup;
        self
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.inner.defaults.cost = cost;
        self
    }

    pub fn build(self) -> CommandDescriptor {
        self.inner
    }
}
