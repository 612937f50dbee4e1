//! `/lightning`: strike where the caller is looking, or at another player.

use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult};
use crate::types::CallerId;

pub const MODULE: &str = "fun";

/// Furthest block the caller's line of sight is traced to.
pub const MAX_TARGET_DISTANCE: u32 = 100;

pub struct Lightning;

impl Command for Lightning {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("lightning")
            .alias("smite")
            .alias("thor")
            .description("Strike lightning at a block or a player")
            .module(MODULE)
            .level(SuggestedLevel::Admin)
            .inline()
            .sub_permission("others", "Strike other players", SuggestedLevel::Admin)
            .arg(ArgSpec::player("player").optional().requiring("others"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let at = match ctx.args().player("player") {
            Some(target) => match ctx.server().player_location(target.id) {
                Some((location, _)) => location,
                None => {
                    ctx.reply(format!("Could not find where {} is", target.name));
                    return Ok(CommandResult::Empty);
                }
            },
            None => {
                let CallerId::Player(player) = ctx.caller().id else {
                    ctx.reply("Specify a player to strike");
                    return Ok(CommandResult::Empty);
                };
                match ctx.server().target_block(player, MAX_TARGET_DISTANCE) {
                    Some(block) => block,
                    None => match ctx.server().player_location(player) {
                        Some((location, _)) => location.offset(0.0, 3.0, 0.0),
                        None => return Err(CommandError::Failed("your location is unavailable".to_string())),
                    },
                }
            }
        };

        if !ctx.server().strike_lightning(at) {
            ctx.reply("The lightning bolt fizzled");
            return Ok(CommandResult::Empty);
        }
        Ok(CommandResult::Success)
    }
}
