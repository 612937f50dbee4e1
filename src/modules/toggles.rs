//! `/fly`, `/god` and `/socialspy`.
//!
//! These run inline on the main context. Reads go through the store's reconciling
//! getters, so the live server value wins while the target is online.

use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult, Services};
use crate::host::GameServer;
use crate::storage::{PlayerStore, StoreError};
use crate::types::{Caller, PlayerId};

pub const MODULE: &str = "toggles";

type Getter = fn(&PlayerStore, PlayerId, &dyn GameServer) -> Result<bool, StoreError>;
type Setter = fn(&PlayerStore, PlayerId, &dyn GameServer, bool) -> Result<bool, StoreError>;

fn toggle_descriptor(name: &str, description: &str, others: &str) -> CommandDescriptor {
    CommandDescriptor::builder(name)
        .description(description)
        .module(MODULE)
        .level(SuggestedLevel::Admin)
        .inline()
        .sub_permission("others", others, SuggestedLevel::Admin)
        .arg(ArgSpec::player("player").optional().requiring("others"))
        .arg(ArgSpec::boolean("state").optional())
        .build()
}

fn run_toggle(ctx: &mut CommandContext, label: &str, get: Getter, set: Setter) -> Result<CommandResult, CommandError> {
    let target = ctx.target_or_self("player")?;
    let current = get(ctx.store(), target.id, ctx.server())?;
    let wanted = ctx.args().boolean("state").unwrap_or(!current);
    let state = if wanted { "enabled" } else { "disabled" };

    if !set(ctx.store(), target.id, ctx.server(), wanted)? {
        ctx.reply(format!("Could not change {} for {}", label, target.name));
        return Ok(CommandResult::Empty);
    }
    ctx.persist(target.id);

    if ctx.caller().id.player() == Some(target.id) {
        ctx.reply(format!("{} {}", capitalize(label), state));
    } else {
        ctx.reply(format!("{} {} for {}", capitalize(label), state, target.name));
        if target.online {
            ctx.server()
                .send_message(target.id, &format!("{} {} by {}", capitalize(label), state, ctx.caller().name));
        }
    }
    Ok(CommandResult::Success)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct Fly;

impl Command for Fly {
    fn descriptor(&self) -> CommandDescriptor {
        toggle_descriptor("fly", "Toggle flight", "Toggle flight for other players")
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        run_toggle(ctx, "flight", PlayerStore::fly, PlayerStore::set_fly)
    }
}

pub struct God;

impl Command for God {
    fn descriptor(&self) -> CommandDescriptor {
        toggle_descriptor("god", "Toggle invulnerability", "Toggle invulnerability for other players")
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        run_toggle(ctx, "invulnerability", PlayerStore::invulnerable, PlayerStore::set_invulnerable)
    }
}

pub struct SocialSpy;

impl Command for SocialSpy {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("socialspy")
            .description("See private messages between other players")
            .module(MODULE)
            .level(SuggestedLevel::Admin)
            .player_only()
            .inline()
            .no_modifiers()
            .arg(ArgSpec::boolean("state").optional())
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let player = ctx.require_player()?;
        let permitted = ctx
            .permissions()
            .resolve(ctx.caller(), ctx.descriptor(), None)
            .is_allowed();
        let current = ctx.store().social_spy(player, ctx.server(), permitted)?;
        let wanted = ctx.args().boolean("state").unwrap_or(!current);

        if !ctx.store().set_social_spy(player, wanted, permitted)? {
            ctx.reply("You may not use social spy");
            return Ok(CommandResult::Empty);
        }
        ctx.persist(player);
        ctx.reply(if wanted { "Social spy enabled" } else { "Social spy disabled" });
        Ok(CommandResult::Success)
    }
}

/// Effective social spy state for `player`, for whatever relays private messages. The
/// stored flag only counts while the player still holds the permission.
pub fn social_spy_active(services: &Services, player: PlayerId) -> Result<bool, StoreError> {
    let caller = Caller::player(player, "");
    let permitted = services
        .permissions
        .resolve(&caller, &SocialSpy.descriptor(), None)
        .is_allowed();
    services
        .store
        .social_spy(player, services.server.as_ref(), permitted)
}
