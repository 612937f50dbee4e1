use chrono::{Duration, Utc};

use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult};
use crate::logutil::audit;
use crate::storage::MuteData;

pub const MODULE: &str = "mute";

/// `/mute <user> [minutes] [reason...]`; no duration means until unmuted.
pub struct Mute;

impl Command for Mute {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("mute")
            .description("Stop a player from chatting and sending mail")
            .module(MODULE)
            .level(SuggestedLevel::Mod)
            .no_modifiers()
            .arg(ArgSpec::user("player"))
            .arg(ArgSpec::integer("minutes").optional())
            .arg(ArgSpec::remaining("reason").optional())
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.args().player("player").cloned() else {
            return Err(CommandError::InvalidArguments("no player given".to_string()));
        };
        let now = Utc::now();
        let expires = match ctx.args().integer("minutes") {
            Some(minutes) if minutes <= 0 => {
                return Err(CommandError::InvalidArguments("minutes must be positive".to_string()));
            }
            Some(minutes) => match Duration::try_minutes(minutes).and_then(|d| now.checked_add_signed(d)) {
                Some(expires) => Some(expires),
                None => {
                    return Err(CommandError::InvalidArguments(format!("{} minutes is too long", minutes)));
                }
            },
            None => None,
        };
        let reason = ctx.args().text("reason").map(str::to_string);

        ctx.store().set_mute(
            target.id,
            Some(MuteData {
                reason: reason.clone(),
                muted_by: Some(ctx.caller().name.clone()),
                muted_at: now,
                expires,
            }),
        )?;
        ctx.persist(target.id);

        let span = match ctx.args().integer("minutes") {
            Some(minutes) => format!("for {} minute(s)", minutes),
            None => "indefinitely".to_string(),
        };
        if target.online {
            let mut notice = format!("You have been muted {}", span);
            if let Some(reason) = &reason {
                notice.push_str(&format!(": {}", reason));
            }
            ctx.server().send_message(target.id, &notice);
        }
        audit(ctx.caller(), "muted", &target.name, reason.as_deref());
        ctx.reply(format!("Muted {} {}", target.name, span));
        Ok(CommandResult::Success)
    }
}

pub struct Unmute;

impl Command for Unmute {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("unmute")
            .description("Lift a player's mute")
            .module(MODULE)
            .permission_root("mute")
            .permission_alias("remove")
            .level(SuggestedLevel::Mod)
            .no_modifiers()
            .arg(ArgSpec::user("player"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.args().player("player").cloned() else {
            return Err(CommandError::InvalidArguments("no player given".to_string()));
        };
        if ctx.store().mute_data(target.id)?.is_none() {
            ctx.reply(format!("{} is not muted", target.name));
            return Ok(CommandResult::Empty);
        }
        ctx.store().set_mute(target.id, None)?;
        ctx.persist(target.id);
        if target.online {
            ctx.server().send_message(target.id, "You are no longer muted");
        }
        audit(ctx.caller(), "unmuted", &target.name, None);
        ctx.reply(format!("Unmuted {}", target.name));
        Ok(CommandResult::Success)
    }
}
