use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult};
use crate::logutil::audit;

pub const MODULE: &str = "ban";

pub struct Unban;

impl Command for Unban {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("unban")
            .alias("pardon")
            .description("Lift a player's ban")
            .module(MODULE)
            .level(SuggestedLevel::Mod)
            .no_modifiers()
            .sub_permission("notify", "Be told when a ban is lifted", SuggestedLevel::Mod)
            .arg(ArgSpec::user("player"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.args().player("player").cloned() else {
            return Err(CommandError::InvalidArguments("no player given".to_string()));
        };
        if ctx.server().ban_for(target.id).is_none() {
            ctx.reply(format!("{} is not banned", target.name));
            return Ok(CommandResult::Empty);
        }

        let server = ctx.server_handle();
        let id = target.id;
        if !ctx.on_main(move || server.remove_ban(id))? {
            ctx.reply(format!("The ban on {} could not be lifted", target.name));
            return Ok(CommandResult::Empty);
        }

        let node = ctx.permissions().node(ctx.descriptor(), "notify");
        let notice = format!("{} was unbanned by {}", target.name, ctx.caller().name);
        ctx.server().broadcast_permission(&node, &notice);
        audit(ctx.caller(), "unbanned", &target.name, None);
        ctx.reply(format!("Unbanned {}", target.name));
        Ok(CommandResult::Success)
    }
}
