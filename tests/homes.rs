mod common;

use common::harness;
use mcadmin::command::ErrorCode;
use mcadmin::config::Config;
use mcadmin::host::GameServer;
use mcadmin::types::Rotation;

#[tokio::test]
async fn existing_home_is_not_overwritten() {
    let h = harness(Config::default());
    let (id, caller) = h.player("alice", &["mcadmin.home.set.base", "mcadmin.home.set.unlimited"]);
    let l1 = h.at(10.0, 64.0, 10.0);
    let l2 = h.at(-50.0, 80.0, 3.0);

    h.host.move_player(id, l1, Rotation::default());
    assert!(h.dispatcher.dispatch(&caller, "/sethome base").await.is_success());

    h.host.move_player(id, l2, Rotation::default());
    let outcome = h.dispatcher.dispatch(&caller, "/sethome base").await;
    assert_eq!(outcome.code(), ErrorCode::Empty);

    let home = h.dispatcher.store().get_home(id, "base").unwrap().unwrap();
    assert_eq!(home.location, l1);
}

#[tokio::test]
async fn invalid_names_are_rejected_before_the_quota() {
    let h = harness(Config::default());
    let (id, caller) = h.player("alice", &["mcadmin.user"]);

    for bad in ["x", "7seas", "far_away", "abcdefghijklmnopq"] {
        let outcome = h.dispatcher.dispatch(&caller, &format!("/sethome {}", bad)).await;
        assert_eq!(outcome.code(), ErrorCode::Empty, "{} should be rejected", bad);
    }
    assert_eq!(h.dispatcher.store().home_count(id).unwrap(), 0);
}

#[tokio::test]
async fn quota_comes_from_option_then_config() {
    let mut config = Config::default();
    config.homes.default_limit = 2;
    let h = harness(config);
    let (id, caller) = h.player("alice", &["mcadmin.user"]);

    assert!(h.dispatcher.dispatch(&caller, "/sethome").await.is_success());
    assert!(h.dispatcher.dispatch(&caller, "/sethome mine").await.is_success());
    let third = h.dispatcher.dispatch(&caller, "/sethome farm").await;
    assert_eq!(third.code(), ErrorCode::Empty);
    assert_eq!(third.messages(), ["You cannot set more than 2 home(s)"]);

    h.host.set_option(id, "home-count", "3");
    assert!(h.dispatcher.dispatch(&caller, "/sethome farm").await.is_success());

    h.host.set_option(id, "home-count", "0");
    let clamped = h.dispatcher.dispatch(&caller, "/sethome lake").await;
    assert_eq!(clamped.messages(), ["You cannot set more than 1 home(s)"]);
}

#[tokio::test]
async fn home_teleports_and_delhome_removes() {
    let h = harness(Config::default());
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    let base = h.at(5.0, 70.0, 5.0);
    h.host.move_player(id, base, Rotation::new(0.0, 90.0));
    h.dispatcher.dispatch(&caller, "/sethome").await;
    h.host.move_player(id, h.at(900.0, 64.0, 900.0), Rotation::default());

    let outcome = h.dispatcher.dispatch(&caller, "/home").await;
    assert_eq!(outcome.messages(), ["Teleported home"]);
    assert_eq!(h.host.player_location(id), Some((base, Rotation::new(0.0, 90.0))));

    assert!(h.dispatcher.dispatch(&caller, "/delhome home").await.is_success());
    assert_eq!(h.dispatcher.dispatch(&caller, "/home").await.code(), ErrorCode::Empty);
    assert_eq!(h.dispatcher.dispatch(&caller, "/deletehome home").await.code(), ErrorCode::Empty);
}

#[tokio::test]
async fn teleport_into_missing_world_fails_softly() {
    let h = harness(Config::default());
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    let nether = h.host.add_world();
    h.host.move_player(id, mcadmin::types::Location::new(nether, 0.0, 40.0, 0.0), Rotation::default());
    h.dispatcher.dispatch(&caller, "/sethome").await;
    h.host.move_player(id, h.at(0.0, 64.0, 0.0), Rotation::default());
    h.host.remove_world(nether);

    let outcome = h.dispatcher.dispatch(&caller, "/home").await;
    assert_eq!(outcome.code(), ErrorCode::Empty);
}

#[tokio::test]
async fn listing_is_sorted_and_works_for_offline_players() {
    let h = harness(Config::default());
    let (id, caller) = h.player("alice", &["mcadmin.user"]);
    h.host.set_option(id, "home-count", "5");
    for name in ["zeta", "alpha", "mid"] {
        h.dispatcher.dispatch(&caller, &format!("/sethome {}", name)).await;
    }
    h.host.set_online(id, false);

    let outcome = h.dispatcher.dispatch(&h.console(), "/listhomes alice").await;
    let lines = outcome.messages();
    assert_eq!(lines[0], "Homes of alice:");
    let names: Vec<&str> = lines[1..]
        .iter()
        .map(|l| l.trim().split(' ').next().unwrap_or_default())
        .collect();
    assert_eq!(names, ["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn console_needs_a_target_to_list() {
    let h = harness(Config::default());
    let outcome = h.dispatcher.dispatch(&h.console(), "/homes").await;
    assert_eq!(outcome.code(), ErrorCode::Empty);
}
