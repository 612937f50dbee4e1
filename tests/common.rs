//! Test utilities & fixtures.
//! Builds a dispatcher with every built-in command over an in-memory host and a
//! throwaway data directory.

use std::sync::Arc;

use mcadmin::command::{CommandDispatcher, CommandRegistry, DeferredOutcome};
use mcadmin::config::Config;
use mcadmin::host::memory::MemoryHost;
use mcadmin::modules::builtin_registry;
use mcadmin::storage::{JailRegistry, PlayerStoreBuilder};
use mcadmin::types::{Caller, Location, PlayerId};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub struct Harness {
    pub host: Arc<MemoryHost>,
    pub dispatcher: CommandDispatcher,
    pub jails: Arc<JailRegistry>,
    pub deferred: mpsc::UnboundedReceiver<DeferredOutcome>,
    pub dir: TempDir,
}

/// Must be called from inside a tokio runtime.
pub fn harness(config: Config) -> Harness {
    harness_with(config, builtin_registry().expect("registry"))
}

/// Like [`harness`], over a caller-supplied registry.
#[allow(dead_code)]
pub fn harness_with(config: Config, registry: CommandRegistry) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(PlayerStoreBuilder::new(dir.path()).open().expect("store"));
    let host = Arc::new(MemoryHost::new());
    let jails = Arc::new(JailRegistry::in_memory());
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = CommandDispatcher::builder(registry, store, host.clone(), host.clone())
        .config(config)
        .economy(host.clone())
        .jails(jails.clone())
        .deferred(tx)
        .build()
        .expect("dispatcher");
    Harness {
        host,
        dispatcher,
        jails,
        deferred: rx,
        dir,
    }
}

#[allow(dead_code)]
impl Harness {
    /// An online player holding exactly `nodes`.
    pub fn player(&self, name: &str, nodes: &[&str]) -> (PlayerId, Caller) {
        let id = self.host.add_player(name, true);
        for node in nodes {
            self.host.grant(id, node);
        }
        (id, Caller::player(id, name))
    }

    pub fn at(&self, x: f64, y: f64, z: f64) -> Location {
        Location::new(self.host.default_world(), x, y, z)
    }

    pub fn console(&self) -> Caller {
        Caller::console("Console")
    }
}
