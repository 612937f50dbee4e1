//! Cooldown, warmup and cost behaviour through the full dispatcher.

mod common;

use std::time::Duration;

use common::{harness, harness_with};
use mcadmin::command::descriptor::SuggestedLevel;
use mcadmin::command::{
    CancelTrigger, Command, CommandContext, CommandDescriptor, CommandError, CommandResult, DenyReason, ErrorCode,
    FailureCause, Outcome,
};
use mcadmin::modules::builtin_registry;
use mcadmin::config::{CommandOverride, Config};
use mcadmin::host::GameServer;
use mcadmin::types::Rotation;

fn with_override(name: &str, o: CommandOverride) -> Config {
    let mut config = Config::default();
    config.commands.insert(name.to_string(), o);
    config
}

#[tokio::test(start_paused = true)]
async fn smite_cooldown_blocks_until_it_expires() {
    let h = harness(with_override(
        "lightning",
        CommandOverride {
            cooldown_seconds: Some(30),
            ..Default::default()
        },
    ));
    let (_, caller) = h.player("zeus", &["mcadmin.admin"]);

    assert!(h.dispatcher.dispatch(&caller, "/smite").await.is_success());
    assert_eq!(h.host.strikes().len(), 1);

    match h.dispatcher.dispatch(&caller, "/smite").await {
        Outcome::Denied(DenyReason::OnCooldown { remaining }) => {
            assert!(remaining > Duration::from_secs(29) && remaining <= Duration::from_secs(30));
        }
        other => panic!("expected cooldown, got {:?}", other),
    }
    assert_eq!(h.host.strikes().len(), 1, "body must not run while cooling down");

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(h.dispatcher.dispatch(&caller, "/thor").await.is_success());
    assert_eq!(h.host.strikes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_invocation_starts_no_cooldown() {
    let h = harness(with_override(
        "home",
        CommandOverride {
            cooldown_seconds: Some(60),
            ..Default::default()
        },
    ));
    let (_, caller) = h.player("alice", &["mcadmin.user"]);

    let outcome = h.dispatcher.dispatch(&caller, "/home").await;
    assert_eq!(outcome.code(), ErrorCode::Empty);
    assert!(h
        .dispatcher
        .cooldown_remaining(caller.id.player().unwrap(), "home")
        .is_none());
}

#[tokio::test]
async fn cost_is_refunded_when_the_body_fails() {
    let h = harness(with_override(
        "home",
        CommandOverride {
            cost: Some(2.0),
            ..Default::default()
        },
    ));
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    h.host.set_balance(id, 5.0);

    let outcome = h.dispatcher.dispatch(&caller, "/home nowhere").await;
    assert_eq!(outcome.code(), ErrorCode::Empty);
    assert_eq!(h.host.balance(id), 5.0);

    assert!(h.dispatcher.dispatch(&caller, "/sethome").await.is_success());
    assert!(h.dispatcher.dispatch(&caller, "/home").await.is_success());
    assert_eq!(h.host.balance(id), 3.0);
}

/// Background command that takes a while and achieves nothing.
struct Dig;

impl Command for Dig {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::builder("dig")
            .description("Dig for treasure")
            .level(SuggestedLevel::User)
            .build()
    }

    fn execute(&self, _ctx: &mut CommandContext) -> Result<CommandResult, CommandError> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(CommandResult::Empty)
    }
}

#[tokio::test]
async fn overlapping_costly_invocations_cannot_share_a_refund() {
    let mut registry = builtin_registry().unwrap();
    registry.register(Dig).unwrap();
    let h = harness_with(
        with_override(
            "dig",
            CommandOverride {
                cost: Some(10.0),
                ..Default::default()
            },
        ),
        registry,
    );
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    h.host.set_balance(id, 100.0);

    let (first, second) = tokio::join!(
        h.dispatcher.dispatch(&caller, "/dig"),
        h.dispatcher.dispatch(&caller, "/dig")
    );
    let mut codes = [first.code(), second.code()];
    codes.sort_by_key(|c| c.as_str());
    assert_eq!(codes, [ErrorCode::AlreadyPending, ErrorCode::Empty]);
    assert_eq!(h.host.balance(id), 100.0);

    // once the first run is over the command is admitted again
    assert_eq!(h.dispatcher.dispatch(&caller, "/dig").await.code(), ErrorCode::Empty);
    assert_eq!(h.host.balance(id), 100.0);
}

#[tokio::test]
async fn insufficient_funds_denies_before_running() {
    let h = harness(with_override(
        "lightning",
        CommandOverride {
            cost: Some(10.0),
            ..Default::default()
        },
    ));
    let (id, caller) = h.player("zeus", &["mcadmin.admin"]);
    h.host.set_balance(id, 3.0);

    let outcome = h.dispatcher.dispatch(&caller, "/lightning").await;
    assert_eq!(outcome, Outcome::Denied(DenyReason::InsufficientFunds { cost: 10.0 }));
    assert!(h.host.strikes().is_empty());
    assert_eq!(h.host.balance(id), 3.0);
}

#[tokio::test]
async fn exempt_node_skips_cost() {
    let h = harness(with_override(
        "lightning",
        CommandOverride {
            cost: Some(10.0),
            cooldown_seconds: Some(30),
            ..Default::default()
        },
    ));
    let (id, caller) = h.player("zeus", &["mcadmin.admin", "mcadmin.lightning.exempt"]);

    assert!(h.dispatcher.dispatch(&caller, "/smite").await.is_success());
    assert!(h.dispatcher.dispatch(&caller, "/smite").await.is_success());
    assert_eq!(h.host.balance(id), 0.0);
}

fn warmup_config(seconds: u64) -> Config {
    with_override(
        "home",
        CommandOverride {
            warmup_seconds: Some(seconds),
            ..Default::default()
        },
    )
}

#[tokio::test(start_paused = true)]
async fn warmup_runs_the_body_when_it_fires() {
    let mut h = harness(warmup_config(3));
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    let home = h.at(100.0, 70.0, -20.0);
    h.host.move_player(id, home, Rotation::default());
    assert!(h.dispatcher.dispatch(&caller, "/sethome").await.is_success());
    h.host.move_player(id, h.at(0.0, 64.0, 0.0), Rotation::default());

    let outcome = h.dispatcher.dispatch(&caller, "/home").await;
    assert_eq!(outcome, Outcome::WarmupStarted { warmup: Duration::from_secs(3) });

    let done = h.deferred.recv().await.expect("deferred outcome");
    assert_eq!(done.command, "home");
    assert!(done.outcome.is_success(), "{:?}", done.outcome);
    assert_eq!(h.host.player_location(id).map(|(at, _)| at), Some(home));
}

#[tokio::test(start_paused = true)]
async fn second_invocation_during_warmup_is_already_pending() {
    let h = harness(warmup_config(5));
    let (_, caller) = h.player("alice", &["mcadmin.user"]);
    h.dispatcher.dispatch(&caller, "/sethome").await;

    assert_eq!(h.dispatcher.dispatch(&caller, "/home").await.code(), ErrorCode::WarmupStarted);
    assert_eq!(
        h.dispatcher.dispatch(&caller, "/home").await,
        Outcome::Denied(DenyReason::AlreadyPending)
    );
    assert_eq!(h.dispatcher.ledger_stats().pending_warmups, 1);
}

#[tokio::test(start_paused = true)]
async fn moving_cancels_a_warmup() {
    let mut h = harness(warmup_config(5));
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    h.dispatcher.dispatch(&caller, "/sethome").await;
    h.dispatcher.dispatch(&caller, "/home").await;

    assert_eq!(h.dispatcher.on_player_moved(id), 1);
    let done = h.deferred.recv().await.expect("deferred outcome");
    assert_eq!(
        done.outcome,
        Outcome::Failure {
            cause: FailureCause::WarmupCancelled(CancelTrigger::Moved),
            report: Default::default(),
        }
    );
    assert_eq!(h.dispatcher.ledger_stats().pending_warmups, 0);
    // a fresh attempt is admitted again
    assert_eq!(h.dispatcher.dispatch(&caller, "/home").await.code(), ErrorCode::WarmupStarted);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_warmup_before_anything_is_charged() {
    let mut config = warmup_config(5);
    if let Some(o) = config.commands.get_mut("home") {
        o.cost = Some(4.0);
    }
    let mut h = harness(config);
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    h.host.set_balance(id, 4.0);
    h.dispatcher.dispatch(&caller, "/sethome").await;
    h.dispatcher.dispatch(&caller, "/home").await;

    h.dispatcher.on_disconnect(id).unwrap();
    let done = h.deferred.recv().await.expect("deferred outcome");
    assert_eq!(done.outcome.code(), ErrorCode::WarmupCancelled);
    assert_eq!(h.host.balance(id), 4.0);
}

#[tokio::test(start_paused = true)]
async fn other_command_cancels_when_configured() {
    let mut config = warmup_config(5);
    config.warmup.cancel_on_command = true;
    let mut h = harness(config);
    let (_, caller) = h.player("alice", &["mcadmin.user"]);
    h.dispatcher.dispatch(&caller, "/sethome").await;
    h.dispatcher.dispatch(&caller, "/home").await;

    assert!(h.dispatcher.dispatch(&caller, "/homes").await.is_success());
    let done = h.deferred.recv().await.expect("deferred outcome");
    assert_eq!(
        done.outcome,
        Outcome::Failure {
            cause: FailureCause::WarmupCancelled(CancelTrigger::OtherCommand),
            report: Default::default(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn exempt_command_still_cancels_other_warmups() {
    let mut config = warmup_config(5);
    config.warmup.cancel_on_command = true;
    config.commands.insert(
        "mail send".to_string(),
        CommandOverride {
            cooldown_seconds: Some(60),
            ..Default::default()
        },
    );
    let mut h = harness(config);
    let (id, caller) = h.player("alice", &["mcadmin.user", "mcadmin.mail.send.exempt"]);
    h.player("bob", &[]);
    h.dispatcher.dispatch(&caller, "/sethome").await;
    h.dispatcher.dispatch(&caller, "/home").await;

    assert!(h.dispatcher.dispatch(&caller, "/mail send bob on my way").await.is_success());
    assert!(h.dispatcher.cooldown_remaining(id, "mail send").is_none());
    let done = h.deferred.recv().await.expect("deferred outcome");
    assert_eq!(done.outcome.code(), ErrorCode::WarmupCancelled);
}

#[tokio::test(start_paused = true)]
async fn moving_is_ignored_when_cancel_on_move_is_off() {
    let mut config = warmup_config(2);
    config.warmup.cancel_on_move = false;
    let mut h = harness(config);
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    h.dispatcher.dispatch(&caller, "/sethome").await;
    h.dispatcher.dispatch(&caller, "/home").await;

    assert_eq!(h.dispatcher.on_player_moved(id), 0);
    let done = h.deferred.recv().await.expect("deferred outcome");
    assert!(done.outcome.is_success());
}
