//! Built-in admin commands.
//!
//! Each submodule groups the commands of one feature module. A module can be switched
//! off in `[modules]`; the dispatcher then denies its commands with `ModuleDisabled`.

pub mod ban;
pub mod fun;
pub mod home;
pub mod jail;
pub mod kick;
pub mod mail;
pub mod mute;
pub mod toggles;

use crate::command::{CommandRegistry, RegistryError};
use crate::types::Location;

/// Names of every built-in module, as used in `[modules.enabled]`.
pub const MODULES: &[&str] = &[
    home::MODULE,
    kick::MODULE,
    fun::MODULE,
    ban::MODULE,
    jail::MODULE,
    mail::MODULE,
    mute::MODULE,
    toggles::MODULE,
];

/// Register every built-in command.
pub fn register_builtin(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register(home::SetHome)?;
    registry.register(home::Home)?;
    registry.register(home::DeleteHome)?;
    registry.register(home::ListHomes)?;
    registry.register(kick::Kick)?;
    registry.register(fun::Lightning)?;
    registry.register(ban::Unban)?;
    registry.register(jail::SetJail)?;
    registry.register(jail::Jail)?;
    registry.register(jail::Unjail)?;
    registry.register(mail::MailSend)?;
    registry.register(mail::MailRead)?;
    registry.register(mail::MailClear)?;
    registry.register(mute::Mute)?;
    registry.register(mute::Unmute)?;
    registry.register(toggles::Fly)?;
    registry.register(toggles::God)?;
    registry.register(toggles::SocialSpy)?;
    Ok(())
}

pub fn builtin_registry() -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}

/// `world x, y, z` in block coordinates.
pub(crate) fn describe_location(location: &Location) -> String {
    format!(
        "{} {}, {}, {}",
        location.world,
        location.block_x(),
        location.block_y(),
        location.block_z()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_do_not_collide() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.len(), 18);
        assert_eq!(registry.get("smite").unwrap().descriptor.name, "lightning");
        assert_eq!(registry.get("pardon").unwrap().descriptor.name, "unban");
        assert_eq!(registry.get("homes").unwrap().descriptor.name, "listhomes");
        assert_eq!(registry.get("jails set").unwrap().descriptor.name, "jails set");
    }

    #[test]
    fn every_command_belongs_to_a_known_module() {
        let registry = builtin_registry().unwrap();
        for d in registry.descriptors() {
            let module = d.module.as_deref().unwrap_or_default();
            assert!(MODULES.contains(&module), "{} has module '{}'", d.name, module);
        }
    }
}
