//! `/sethome`, `/home`, `/delhome` and `/listhomes`.

use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult};
use crate::validation::validate_home_name;

use super::describe_location;

pub const MODULE: &str = "homes";

/// Name used when a home command is given no name.
pub const DEFAULT_HOME: &str = "home";

pub struct SetHome;

impl SetHome {
    /// Home quota for the caller: unlimited with the `unlimited` suffix, otherwise the
    /// `home-count` option (at least 1), falling back to `[homes] default_limit`.
    fn limit(ctx: &CommandContext) -> Option<usize> {
        if ctx.has_suffix("unlimited") {
            return None;
        }
        let configured = ctx.config().homes.default_limit as i64;
        let limit = ctx
            .option("home-count")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(configured)
            .max(1);
        Some(limit as usize)
    }
}

impl Command for SetHome {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("sethome")
            .alias("homeset")
            .description("Set a home at your current location")
            .module(MODULE)
            .permission_root("home")
            .permission_alias("set")
            .level(SuggestedLevel::User)
            .player_only()
            .sub_permission("unlimited", "Set any number of homes", SuggestedLevel::Admin)
            .arg(ArgSpec::word("name").optional())
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let player = ctx.require_player()?;
        let name = ctx.args().text("name").unwrap_or(DEFAULT_HOME).to_ascii_lowercase();

        if let Err(e) = validate_home_name(&name) {
            ctx.reply(e.to_string());
            return Ok(CommandResult::Empty);
        }

        if let Some(limit) = Self::limit(ctx) {
            if ctx.store().home_count(player)? >= limit {
                ctx.reply(format!("You cannot set more than {} home(s)", limit));
                return Ok(CommandResult::Empty);
            }
        }

        let Some((location, rotation)) = ctx.server().player_location(player) else {
            return Err(CommandError::Failed("your location is unavailable".to_string()));
        };
        if !ctx.store().set_home(player, &name, location, rotation)? {
            ctx.reply(format!("Could not set home '{}'; it may already exist", name));
            return Ok(CommandResult::Empty);
        }
        ctx.persist(player);
        ctx.reply(format!("Home '{}' set", name));
        Ok(CommandResult::Success)
    }
}

pub struct Home;

impl Command for Home {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("home")
            .description("Teleport to one of your homes")
            .module(MODULE)
            .level(SuggestedLevel::User)
            .player_only()
            .arg(ArgSpec::word("name").optional())
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let player = ctx.require_player()?;
        let name = ctx.args().text("name").unwrap_or(DEFAULT_HOME).to_ascii_lowercase();

        let Some(home) = ctx.store().get_home(player, &name)? else {
            ctx.reply(format!("You have no home named '{}'", name));
            return Ok(CommandResult::Empty);
        };

        let server = ctx.server_handle();
        let (location, rotation) = (home.location, home.rotation);
        if ctx.on_main(move || server.teleport(player, location, rotation))? {
            if home.name == DEFAULT_HOME {
                ctx.reply("Teleported home");
            } else {
                ctx.reply(format!("Teleported to home '{}'", home.name));
            }
            Ok(CommandResult::Success)
        } else {
            ctx.reply(format!("Could not teleport to home '{}'", home.name));
            Ok(CommandResult::Empty)
        }
    }
}

pub struct DeleteHome;

impl Command for DeleteHome {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("delhome")
            .alias("deletehome")
            .description("Delete one of your homes")
            .module(MODULE)
            .permission_root("home")
            .permission_alias("delete")
            .level(SuggestedLevel::User)
            .player_only()
            .no_modifiers()
            .arg(ArgSpec::word("name"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let player = ctx.require_player()?;
        let name = ctx.args().text("name").unwrap_or(DEFAULT_HOME).to_ascii_lowercase();
        if ctx.store().delete_home(player, &name)? {
            ctx.persist(player);
            ctx.reply(format!("Home '{}' deleted", name));
            Ok(CommandResult::Success)
        } else {
            ctx.reply(format!("You have no home named '{}'", name));
            Ok(CommandResult::Empty)
        }
    }
}

pub struct ListHomes;

impl Command for ListHomes {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("listhomes")
            .alias("homes")
            .description("List your homes, or another player's")
            .module(MODULE)
            .permission_root("home")
            .permission_alias("list")
            .level(SuggestedLevel::User)
            .no_modifiers()
            .sub_permission("others", "List other players' homes", SuggestedLevel::Mod)
            .arg(ArgSpec::user("player").optional().requiring("others"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let other = ctx.args().has("player");
        if !other && ctx.caller().is_console() {
            ctx.reply("Specify whose homes to list");
            return Ok(CommandResult::Empty);
        }
        let target = ctx.target_or_self("player")?;
        let homes = ctx.store().get_homes(target.id)?;

        if other {
            ctx.reply(format!("Homes of {}:", target.name));
        } else {
            ctx.reply("Your homes:");
        }
        if homes.is_empty() {
            ctx.reply("  (none)");
        }
        for (name, home) in &homes {
            ctx.reply(format!("  {} - {}", name, describe_location(&home.location)));
        }
        Ok(CommandResult::Success)
    }
}
