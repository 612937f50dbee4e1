//! Offline-capable player mail.

use chrono::Utc;

use crate::command::args::ArgSpec;
use crate::command::descriptor::{CommandDescriptor, SuggestedLevel};
use crate::command::{Command, CommandContext, CommandError, CommandResult};
use crate::storage::MailEntry;
use crate::validation::{clean_message, MAIL_MAX_LEN};

pub const MODULE: &str = "mail";

pub struct MailSend;

impl Command for MailSend {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("mail send")
            .description("Leave a message for a player")
            .module(MODULE)
            .permission_alias("send")
            .level(SuggestedLevel::User)
            .arg(ArgSpec::user("player"))
            .arg(ArgSpec::remaining("message"))
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.args().player("player").cloned() else {
            return Err(CommandError::InvalidArguments("no player given".to_string()));
        };
        let raw = ctx.args().text("message").unwrap_or_default();
        let Some(message) = clean_message(raw, MAIL_MAX_LEN) else {
            return Err(CommandError::InvalidArguments(format!(
                "mail must be 1 to {} printable characters",
                MAIL_MAX_LEN
            )));
        };

        let sender = ctx.caller().id.player();
        if let Some(sender) = sender {
            if let Some(mute) = ctx.store().mute_data(sender)? {
                let until = mute
                    .expires
                    .map(|e| format!(" until {}", e.format("%Y-%m-%d %H:%M UTC")))
                    .unwrap_or_default();
                ctx.reply(format!("You are muted{} and cannot send mail", until));
                return Ok(CommandResult::Empty);
            }
        }

        ctx.store().add_mail(
            target.id,
            MailEntry {
                sender,
                sender_name: ctx.caller().name.clone(),
                message,
                sent_at: Utc::now(),
            },
        )?;
        ctx.persist(target.id);
        if target.online {
            ctx.server().send_message(
                target.id,
                &format!("You have new mail from {}. Use /mail read", ctx.caller().name),
            );
        }
        ctx.reply(format!("Mail sent to {}", target.name));
        Ok(CommandResult::Success)
    }
}

pub struct MailRead;

impl Command for MailRead {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("mail read")
            .description("Read your mail")
            .module(MODULE)
            .permission_alias("read")
            .level(SuggestedLevel::User)
            .player_only()
            .no_modifiers()
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let player = ctx.require_player()?;
        let mail = ctx.store().get_mail(player)?;
        if mail.is_empty() {
            ctx.reply("You have no mail");
            return Ok(CommandResult::Success);
        }
        ctx.reply(format!("You have {} message(s):", mail.len()));
        for entry in mail {
            ctx.reply(format!(
                "[{}] {}: {}",
                entry.sent_at.format("%Y-%m-%d %H:%M"),
                entry.sender_name,
                entry.message
            ));
        }
        Ok(CommandResult::Success)
    }
}

pub struct MailClear;

impl Command for MailClear {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("mail clear")
            .description("Delete all of your mail")
            .module(MODULE)
            .permission_alias("clear")
            .level(SuggestedLevel::User)
            .player_only()
            .no_modifiers()
            .build()
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        let player = ctx.require_player()?;
        let removed = ctx.store().clear_mail(player)?;
        if removed > 0 {
            ctx.persist(player);
        }
        ctx.reply(format!("Deleted {} message(s)", removed));
        Ok(CommandResult::Success)
    }
}
