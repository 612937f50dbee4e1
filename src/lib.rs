//! # mcadmin - command pipeline and player state for game server administration
//!
//! mcadmin is the core of a server administration toolkit: a declarative command pipeline
//! that applies permission checks, cooldowns, warmups and costs uniformly to every
//! command, and a per-player document store for homes, jail and mute state, mail,
//! movement toggles and login bookkeeping.
//!
//! ## Features
//!
//! - **Declarative commands**: each command describes its names, permission nodes, policy
//!   flags and arguments once; the dispatcher enforces everything generically.
//! - **Cooldown, warmup and cost**: per player and command, with refunds on failure and
//!   warmups cancelled by movement, damage, other commands or disconnect.
//! - **Main context**: commands that touch live game state run on a single serialized
//!   executor; everything else runs on the blocking pool.
//! - **Player store**: one JSON document per player, cached in memory and written with
//!   locked atomic replaces.
//! - **Reference modules**: homes, kick, lightning, unban, jail, mail, mute and toggles.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mcadmin::command::CommandDispatcher;
//! use mcadmin::host::memory::MemoryHost;
//! use mcadmin::modules::builtin_registry;
//! use mcadmin::storage::PlayerStore;
//! use mcadmin::types::Caller;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = Arc::new(MemoryHost::new());
//!     let store = Arc::new(PlayerStore::open("./data")?);
//!     let dispatcher = CommandDispatcher::builder(builtin_registry()?, store, host.clone(), host.clone())
//!         .economy(host.clone())
//!         .build()?;
//!
//!     let outcome = dispatcher.dispatch(&Caller::console("Console"), "/listhomes alice").await;
//!     println!("{}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`command`] - descriptors, permissions, the ledger and the dispatcher
//! - [`storage`] - the per-player document store and jail registry
//! - [`modules`] - built-in admin commands
//! - [`host`] - traits for the game server, permission and economy backends
//! - [`config`] - configuration loading and validation
//! - [`types`] - identifiers, locations and callers
//! - [`validation`] - input validation helpers
//! - [`metrics`] - in-process dispatch counters
//! - [`logutil`] - log escaping and the security audit trail

pub mod command;
pub mod config;
pub mod host;
pub mod logutil;
pub mod metrics;
pub mod modules;
pub mod storage;
pub mod types;
pub mod validation;
