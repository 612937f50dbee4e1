//! Jail points and jailing players.
//!
//! Jail points live in the shared [`JailRegistry`](crate::storage::JailRegistry). Jailing an
//! online player teleports them immediately; an offline player is flagged with
//! `jail_on_next_login` and moved by [`jail_on_login`] when they next join.

use chrono::Utc;

use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult, Services};
use crate::logutil::audit;
use crate::storage::{JailData, LoginLocation, StoreError};
use crate::types::PlayerId;

pub const MODULE: &str = "jail";

/// `/jails set <name>`: create a jail point at the caller's location.
pub struct SetJail;

impl Command for SetJail {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("jails set")
            .description("Create a jail at your current location")
            .module(MODULE)
            .permission_root("jail")
            .permission_alias("set")
            .level(SuggestedLevel::Admin)
            .player_only()
            .no_modifiers()
            .arg(ArgSpec::word("name"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let player = ctx.require_player()?;
        let name = ctx.args().text("name").unwrap_or_default().to_ascii_lowercase();
        if ctx.jails().get(&name).is_some() {
            ctx.reply(format!("A jail named '{}' already exists", name));
            return Ok(CommandResult::Empty);
        }
        let Some((location, rotation)) = ctx.server().player_location(player) else {
            return Err(CommandError::Failed("your location is unavailable".to_string()));
        };
        if !ctx.jails().set(&name, location, rotation)? {
            ctx.reply(format!("'{}' is not a valid jail name", name));
            return Ok(CommandResult::Empty);
        }
        ctx.reply(format!("Jail '{}' set", name));
        Ok(CommandResult::Success)
    }
}

/// `/jail <user> <jail> [reason...]`
pub struct Jail;

impl Command for Jail {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("jail")
            .description("Send a player to jail")
            .module(MODULE)
            .level(SuggestedLevel::Mod)
            .no_modifiers()
            .arg(ArgSpec::user("player"))
            .arg(ArgSpec::word("jail"))
            .arg(ArgSpec::remaining("reason").optional())
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.args().player("player").cloned() else {
            return Err(CommandError::InvalidArguments("no player given".to_string()));
        };
        let jail_name = ctx.args().text("jail").unwrap_or_default().to_ascii_lowercase();
        let Some(point) = ctx.jails().get(&jail_name) else {
            return Err(CommandError::InvalidArguments(format!("no jail named '{}'", jail_name)));
        };
        if ctx.store().jail_data(target.id)?.is_some() {
            ctx.reply(format!("{} is already jailed", target.name));
            return Ok(CommandResult::Empty);
        }

        let mut data = JailData {
            jail: jail_name.clone(),
            previous_location: None,
            previous_rotation: None,
            reason: ctx.args().text("reason").map(str::to_string),
            jailed_by: Some(ctx.caller().name.clone()),
            jailed_at: Utc::now(),
        };

        let server = ctx.server_handle();
        let id = target.id;
        let moved = ctx.on_main(move || {
            let before = server.player_location(id)?;
            server
                .teleport(id, point.location, point.rotation)
                .then_some(before)
        })?;

        match moved {
            Some((location, rotation)) => {
                data.previous_location = Some(location);
                data.previous_rotation = Some(rotation);
                ctx.store().set_jail(id, Some(data))?;
                ctx.server().send_message(id, &format!("You have been jailed in '{}'", jail_name));
            }
            None => {
                if !ctx.store().set_jail_on_next_login(id, ctx.server(), true)? {
                    ctx.reply(format!("{} could not be moved to jail", target.name));
                    return Ok(CommandResult::Empty);
                }
                ctx.store().set_jail(id, Some(data))?;
                ctx.reply(format!("{} is offline and will be jailed on their next login", target.name));
            }
        }
        ctx.persist(id);
        audit(ctx.caller(), "jailed", &target.name, Some(&jail_name));
        ctx.reply(format!("Jailed {} in '{}'", target.name, jail_name));
        Ok(CommandResult::Success)
    }
}

/// `/unjail <user>`
pub struct Unjail;

impl Command for Unjail {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("unjail")
            .description("Release a player from jail")
            .module(MODULE)
            .permission_root("jail")
            .permission_alias("release")
            .level(SuggestedLevel::Mod)
            .no_modifiers()
            .arg(ArgSpec::user("player"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.args().player("player").cloned() else {
            return Err(CommandError::InvalidArguments("no player given".to_string()));
        };
        let id = target.id;
        let Some(data) = ctx.store().jail_data(id)? else {
            ctx.reply(format!("{} is not jailed", target.name));
            return Ok(CommandResult::Empty);
        };
        ctx.store().set_jail(id, None)?;
        ctx.store().set_jail_on_next_login(id, ctx.server(), false)?;

        if let Some(location) = data.previous_location {
            let rotation = data.previous_rotation.unwrap_or_default();
            let server = ctx.server_handle();
            let returned = ctx.on_main(move || server.teleport(id, location, rotation))?;
            if !returned {
                ctx.store()
                    .set_location_on_login(id, Some(LoginLocation { location, rotation }))?;
            }
        }
        if target.online {
            ctx.server().send_message(id, "You have been released from jail");
        }
        ctx.persist(id);
        audit(ctx.caller(), "unjailed", &target.name, None);
        ctx.reply(format!("Released {}", target.name));
        Ok(CommandResult::Success)
    }
}

/// Move a player flagged with `jail_on_next_login` into their jail. Runs on join, after
/// the flag has been consumed.
pub fn jail_on_login(services: &Services, player: PlayerId) -> Result<(), StoreError> {
    let Some(mut data) = services.store.jail_data(player)? else {
        return Ok(());
    };
    let Some(point) = services.jails.get(&data.jail) else {
        log::warn!("jail '{}' for {} no longer exists", data.jail, player);
        return Ok(());
    };
    let before = services.server.player_location(player);
    if !services.server.teleport(player, point.location, point.rotation) {
        log::warn!("could not move {} into jail '{}'", player, data.jail);
        return Ok(());
    }
    if data.previous_location.is_none() {
        if let Some((location, rotation)) = before {
            data.previous_location = Some(location);
            data.previous_rotation = Some(rotation);
            services.store.set_jail(player, Some(data.clone()))?;
        }
    }
    services
        .server
        .send_message(player, &format!("You have been jailed in '{}'", data.jail));
    Ok(())
}
