//! Permission node layout and allow/deny resolution.
//!
//! Node layout for a command with root `home`, alias `set` under prefix `mcadmin`:
//!
//! ```text
//! mcadmin.home.set.base        run the command
//! mcadmin.home.set.<suffix>    declared sub-permission (others, unlimited, notify...)
//! mcadmin.home.set.exempt      skip warmup, cooldown and cost
//! mcadmin.admin / .mod / .user level grants
//! ```
//!
//! A caller is allowed when it holds the exact node, or a level node at or above the
//! suggested level of that node. Exemptions only count when held exactly.

use std::sync::Arc;

use super::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::host::{PermissionBackend, PermissionSuggestion};
use crate::types::{Caller, CallerId, PlayerId};

pub const EXEMPT_SUFFIX: &str = "exempt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

impl Access {
    pub fn is_allowed(self) -> bool {
        self == Access::Allowed
    }
}

/// Which ledger policies a caller is exempt from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Exemptions {
    pub warmup: bool,
    pub cooldown: bool,
    pub cost: bool,
}

impl Exemptions {
    pub fn all() -> Self {
        Self {
            warmup: true,
            cooldown: true,
            cost: true,
        }
    }
}

#[derive(Clone)]
pub struct PermissionResolver {
    prefix: String,
    backend: Arc<dyn PermissionBackend>,
}

impl PermissionResolver {
    pub fn new(prefix: &str, backend: Arc<dyn PermissionBackend>) -> Self {
        Self {
            prefix: prefix.trim_end_matches('.').to_ascii_lowercase(),
            backend,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn command_stem(&self, descriptor: &CommandDescriptor) -> String {
        match &descriptor.permission_alias {
            Some(alias) => format!("{}.{}.{}", self.prefix, descriptor.permission_root, alias),
            None => format!("{}.{}", self.prefix, descriptor.permission_root),
        }
    }

    pub fn base_node(&self, descriptor: &CommandDescriptor) -> String {
        format!("{}.base", self.command_stem(descriptor))
    }

    pub fn node(&self, descriptor: &CommandDescriptor, suffix: &str) -> String {
        format!("{}.{}", self.command_stem(descriptor), suffix.to_ascii_lowercase())
    }

    pub fn level_node(&self, level: SuggestedLevel) -> Option<String> {
        level.node_name().map(|n| format!("{}.{}", self.prefix, n))
    }

    fn holds_level(&self, player: PlayerId, required: SuggestedLevel) -> bool {
        SuggestedLevel::ALL
            .iter()
            .filter(|level| **level >= required)
            .filter_map(|level| self.level_node(*level))
            .any(|node| self.backend.has_permission(player, &node))
    }

    /// Pure check: may `caller` use `descriptor` (or the given sub-permission of it)?
    pub fn resolve(&self, caller: &Caller, descriptor: &CommandDescriptor, suffix: Option<&str>) -> Access {
        let player = match caller.id {
            CallerId::Console => return Access::Allowed,
            CallerId::Player(id) => id,
        };

        let (node, level) = match suffix {
            Some(suffix) => (
                self.node(descriptor, suffix),
                descriptor
                    .sub_permission(suffix)
                    .map(|s| s.level)
                    .unwrap_or(descriptor.suggested_level),
            ),
            None => (self.base_node(descriptor), descriptor.suggested_level),
        };

        if self.backend.has_permission(player, &node) || self.holds_level(player, level) {
            Access::Allowed
        } else {
            Access::Denied
        }
    }

    pub fn test_suffix(&self, caller: &Caller, descriptor: &CommandDescriptor, suffix: &str) -> bool {
        self.resolve(caller, descriptor, Some(suffix)).is_allowed()
    }

    /// Exemptions held by the caller. The console is exempt from everything.
    pub fn exemptions(&self, caller: &Caller, descriptor: &CommandDescriptor) -> Exemptions {
        let player = match caller.id {
            CallerId::Console => return Exemptions::all(),
            CallerId::Player(id) => id,
        };
        let exempt = self.node(descriptor, EXEMPT_SUFFIX);
        if self.backend.has_permission(player, &exempt) {
            return Exemptions::all();
        }
        Exemptions {
            warmup: self.backend.has_permission(player, &format!("{}.warmup", exempt)),
            cooldown: self.backend.has_permission(player, &format!("{}.cooldown", exempt)),
            cost: self.backend.has_permission(player, &format!("{}.cost", exempt)),
        }
    }

    pub fn has_node(&self, player: PlayerId, node: &str) -> bool {
        self.backend.has_permission(player, node)
    }

    pub fn option(&self, caller: &Caller, key: &str) -> Option<String> {
        caller.id.player().and_then(|id| self.backend.get_option(id, key))
    }

    /// Full node layout for the given commands: base, declared suffixes and exemptions.
    pub fn suggestions<'a>(&self, descriptors: impl IntoIterator<Item = &'a CommandDescriptor>) -> Vec<PermissionSuggestion> {
        let mut out = Vec::new();
        for d in descriptors {
            out.push(PermissionSuggestion {
                node: self.base_node(d),
                description: format!("Allows the use of /{}", d.name),
                level: d.suggested_level,
            });
            for sub in &d.sub_permissions {
                out.push(PermissionSuggestion {
                    node: self.node(d, &sub.suffix),
                    description: sub.description.clone(),
                    level: sub.level,
                });
            }
            if !(d.flags.skip_warmup && d.flags.skip_cooldown && d.flags.skip_cost) {
                out.push(PermissionSuggestion {
                    node: self.node(d, EXEMPT_SUFFIX),
                    description: format!("Exempts /{} from warmup, cooldown and cost", d.name),
                    level: SuggestedLevel::Admin,
                });
            }
        }
        out.sort_by(|a, b| a.node.cmp(&b.node));
        out.dedup_by(|a, b| a.node == b.node);
        out
    }

    /// Push the layout to the backend once, at startup.
    pub fn register_suggestions<'a>(&self, descriptors: impl IntoIterator<Item = &'a CommandDescriptor>) {
        let suggestions = self.suggestions(descriptors);
        log::debug!("registering {} permission suggestions", suggestions.len());
        self.backend.register_suggestions(&suggestions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    fn home_set() -> CommandDescriptor {
        CommandDescriptor::builder("sethome")
            .permission_root("home")
            .permission_alias("set")
            .level(SuggestedLevel::User)
            .sub_permission("unlimited", "Unlimited homes", SuggestedLevel::Admin)
            .build()
    }

    #[test]
    fn exact_node_allows() {
        let host = Arc::new(MemoryHost::new());
        let id = host.add_player("alice", true);
        let resolver = PermissionResolver::new("mcadmin", host.clone());
        let caller = Caller::player(id, "alice");
        let d = home_set();

        assert_eq!(resolver.base_node(&d), "mcadmin.home.set.base");
        assert_eq!(resolver.resolve(&caller, &d, None), Access::Denied);
        host.grant(id, "mcadmin.home.set.base");
        assert_eq!(resolver.resolve(&caller, &d, None), Access::Allowed);
        assert!(!resolver.test_suffix(&caller, &d, "unlimited"));
    }

    #[test]
    fn level_nodes_cover_lower_levels_only() {
        let host = Arc::new(MemoryHost::new());
        let id = host.add_player("mod", true);
        host.grant(id, "mcadmin.mod");
        let resolver = PermissionResolver::new("mcadmin", host.clone());
        let caller = Caller::player(id, "mod");
        let d = home_set();

        assert!(resolver.resolve(&caller, &d, None).is_allowed());
        // unlimited is suggested for admins, so a moderator grant does not reach it
        assert!(!resolver.test_suffix(&caller, &d, "unlimited"));
        host.grant(id, "mcadmin.admin");
        assert!(resolver.test_suffix(&caller, &d, "unlimited"));
    }

    #[test]
    fn exemptions_need_exact_nodes() {
        let host = Arc::new(MemoryHost::new());
        let id = host.add_player("admin", true);
        host.grant(id, "mcadmin.admin");
        let resolver = PermissionResolver::new("mcadmin", host.clone());
        let caller = Caller::player(id, "admin");
        let d = home_set();

        assert_eq!(resolver.exemptions(&caller, &d), Exemptions::default());
        host.grant(id, "mcadmin.home.set.exempt.cost");
        let ex = resolver.exemptions(&caller, &d);
        assert!(ex.cost && !ex.cooldown && !ex.warmup);
        host.grant(id, "mcadmin.home.set.exempt");
        assert_eq!(resolver.exemptions(&caller, &d), Exemptions::all());
        assert_eq!(resolver.exemptions(&Caller::console("CONSOLE"), &d), Exemptions::all());
    }

    #[test]
    fn suggestions_list_base_suffix_and_exempt() {
        let host = Arc::new(MemoryHost::new());
        let resolver = PermissionResolver::new("mcadmin", host.clone());
        let d = home_set();
        resolver.register_suggestions([&d]);
        let nodes: Vec<String> = host.suggestions().into_iter().map(|s| s.node).collect();
        assert_eq!(
            nodes,
            vec![
                "mcadmin.home.set.base",
                "mcadmin.home.set.exempt",
                "mcadmin.home.set.unlimited"
            ]
        );
    }
}
