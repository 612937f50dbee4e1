use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult};
use crate::logutil::audit;

pub const MODULE: &str = "kick";

const DEFAULT_REASON: &str = "Kicked by an operator";

pub struct Kick;

impl Command for Kick {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("kick")
            .description("Disconnect a player from the server")
            .module(MODULE)
            .level(SuggestedLevel::Mod)
            .no_modifiers()
            .inline()
            .sub_permission("notify", "Be told when a player is kicked", SuggestedLevel::Mod)
            .arg(ArgSpec::player("player"))
            .arg(ArgSpec::remaining("reason").optional())
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.args().player("player").cloned() else {
            return Err(CommandError::InvalidArguments("no player given".to_string()));
        };
        let reason = ctx.args().text("reason").unwrap_or(DEFAULT_REASON).to_string();

        if !ctx.server().kick(target.id, &reason) {
            ctx.reply(format!("{} could not be kicked", target.name));
            return Ok(CommandResult::Empty);
        }

        let node = ctx.permissions().node(ctx.descriptor(), "notify");
        let notice = format!("{} was kicked by {}: {}", target.name, ctx.caller().name, reason);
        ctx.server().broadcast_permission(&node, &notice);
        audit(ctx.caller(), "kicked", &target.name, Some(&reason));
        ctx.reply(format!("Kicked {}", target.name));
        Ok(CommandResult::Success)
    }
}
