//! Admission checks that run before any command body.

mod common;

use common::harness;
use mcadmin::command::{DenyReason, ErrorCode, Outcome};
use mcadmin::config::Config;
use mcadmin::host::GameServer;

#[tokio::test]
async fn kick_without_permission_leaves_target_online() {
    let h = harness(Config::default());
    let (_, caller) = h.player("alice", &["mcadmin.user"]);
    let (target, _) = h.player("bob", &[]);

    let outcome = h.dispatcher.dispatch(&caller, "/kick bob go away").await;

    assert_eq!(outcome, Outcome::Denied(DenyReason::NoPermission));
    assert!(h.host.is_online(target));
    assert!(h.host.kicked().is_empty());
}

#[tokio::test]
async fn kick_with_mod_level_notifies_holders() {
    let h = harness(Config::default());
    let (_, caller) = h.player("mod", &["mcadmin.mod"]);
    let (watcher, _) = h.player("watcher", &["mcadmin.kick.notify"]);
    let (target, _) = h.player("bob", &[]);

    let outcome = h.dispatcher.dispatch(&caller, "/kick bob spamming chat").await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert!(!h.host.is_online(target));
    assert_eq!(h.host.kicked(), vec![(target, "spamming chat".to_string())]);
    let messages = h.host.messages();
    assert!(messages
        .iter()
        .any(|(to, m)| *to == Some(watcher) && m.contains("bob was kicked by mod")));
}

#[tokio::test]
async fn unknown_command_is_denied() {
    let h = harness(Config::default());
    let outcome = h.dispatcher.dispatch(&h.console(), "/teleportall").await;
    assert_eq!(outcome, Outcome::Denied(DenyReason::UnknownCommand("teleportall".into())));
    assert_eq!(outcome.message_key(), "command.denied.unknown_command");
}

#[tokio::test]
async fn disabled_module_denies_its_commands() {
    let mut config = Config::default();
    config.modules.enabled.insert("fun".into(), false);
    let h = harness(config);
    let (_, caller) = h.player("alice", &["mcadmin.admin"]);

    let outcome = h.dispatcher.dispatch(&caller, "/smite").await;
    assert_eq!(outcome, Outcome::Denied(DenyReason::ModuleDisabled("fun".into())));
    assert!(h.host.strikes().is_empty());

    // other modules are untouched
    let outcome = h.dispatcher.dispatch(&caller, "/listhomes").await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn console_is_refused_player_only_commands() {
    let h = harness(Config::default());
    let outcome = h.dispatcher.dispatch(&h.console(), "/sethome base").await;
    assert_eq!(outcome, Outcome::Denied(DenyReason::PlayerOnly));
}

#[tokio::test]
async fn bad_arguments_report_usage() {
    let h = harness(Config::default());
    let (_, caller) = h.player("mod", &["mcadmin.mod"]);

    let outcome = h.dispatcher.dispatch(&caller, "/kick nobody").await;
    match outcome {
        Outcome::Denied(DenyReason::InvalidArguments { message, usage }) => {
            assert!(message.contains("nobody"));
            assert_eq!(usage, "/kick <player> [reason...]");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn argument_suffix_is_checked_only_when_supplied() {
    let h = harness(Config::default());
    let (_, caller) = h.player("alice", &["mcadmin.home.list.base"]);
    h.player("bob", &[]);

    let own = h.dispatcher.dispatch(&caller, "/homes").await;
    assert!(own.is_success());

    let other = h.dispatcher.dispatch(&caller, "/homes bob").await;
    assert_eq!(other.code(), ErrorCode::NoPermission);

    h.host.grant(caller.id.player().unwrap(), "mcadmin.home.list.others");
    let other = h.dispatcher.dispatch(&caller, "/homes bob").await;
    assert!(other.is_success());
    assert_eq!(other.messages()[0], "Homes of bob:");
}

#[tokio::test]
async fn console_passes_permission_checks() {
    let h = harness(Config::default());
    let (target, _) = h.player("bob", &[]);
    let outcome = h.dispatcher.dispatch(&h.console(), "kick bob").await;
    assert!(outcome.is_success());
    assert!(!h.host.is_online(target));
}

#[tokio::test]
async fn permission_layout_is_published_to_the_backend() {
    let h = harness(Config::default());
    let nodes: Vec<String> = h.host.suggestions().into_iter().map(|s| s.node).collect();
    for expected in [
        "mcadmin.home.set.base",
        "mcadmin.home.set.unlimited",
        "mcadmin.home.list.others",
        "mcadmin.kick.notify",
        "mcadmin.lightning.others",
        "mcadmin.mail.send.base",
    ] {
        assert!(nodes.iter().any(|n| n == expected), "missing {}", expected);
    }
}
