//! Per-invocation execution context handed to command bodies.

use std::sync::Arc;

use super::args::ParsedArgs;
use super::descriptor::CommandDescriptor;
use super::main_context::{ExecutionSite, MainContext};
use super::outcome::{CommandError, Report, Warning};
use super::permission::PermissionResolver;
use crate::config::Config;
use crate::host::{GameServer, PlayerRef};
use crate::metrics;
use crate::storage::{JailRegistry, PlayerStore};
use crate::types::{Caller, CallerId, PlayerId};

/// Long-lived collaborators shared by every invocation.
pub struct Services {
    pub store: Arc<PlayerStore>,
    pub jails: Arc<JailRegistry>,
    pub server: Arc<dyn GameServer>,
    pub permissions: PermissionResolver,
    pub main: MainContext,
}

pub struct CommandContext {
    caller: Caller,
    args: ParsedArgs,
    descriptor: Arc<CommandDescriptor>,
    site: ExecutionSite,
    services: Arc<Services>,
    config: Arc<Config>,
    report: Report,
}

impl CommandContext {
    pub fn new(
        caller: Caller,
        args: ParsedArgs,
        descriptor: Arc<CommandDescriptor>,
        services: Arc<Services>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            caller,
            args,
            descriptor,
            site: ExecutionSite::current(),
            services,
            config,
            report: Report::default(),
        }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn args(&self) -> &ParsedArgs {
        &self.args
    }

    pub fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    pub fn site(&self) -> ExecutionSite {
        self.site
    }

    pub fn store(&self) -> &PlayerStore {
        &self.services.store
    }

    pub fn jails(&self) -> &JailRegistry {
        &self.services.jails
    }

    pub fn server(&self) -> &dyn GameServer {
        self.services.server.as_ref()
    }

    pub fn server_handle(&self) -> Arc<dyn GameServer> {
        self.services.server.clone()
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.services.permissions
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reply(&mut self, message: impl Into<String>) {
        self.report.messages.push(message.into());
    }

    /// Does the caller hold `<command node>.<suffix>` (or a covering level node)?
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.services
            .permissions
            .test_suffix(&self.caller, &self.descriptor, suffix)
    }

    pub fn option(&self, key: &str) -> Option<String> {
        self.services.permissions.option(&self.caller, key)
    }

    pub fn require_player(&self) -> Result<PlayerId, CommandError> {
        match self.caller.id {
            CallerId::Player(id) => Ok(id),
            CallerId::Console => Err(CommandError::Failed("this command needs a player".to_string())),
        }
    }

    /// The player named by argument `key`, or the caller when the argument was omitted.
    pub fn target_or_self(&self, key: &str) -> Result<PlayerRef, CommandError> {
        if let Some(target) = self.args.player(key) {
            return Ok(target.clone());
        }
        match self.caller.id {
            CallerId::Player(id) => Ok(PlayerRef {
                id,
                name: self.caller.name.clone(),
                online: self.server().is_online(id),
            }),
            CallerId::Console => Err(CommandError::Failed(format!("specify <{}> when running from the console", key))),
        }
    }

    /// Flush a player's document. A failure is recorded as a warning on the outcome; the
    /// in-memory change stands.
    pub fn persist(&mut self, player: PlayerId) {
        if let Err(e) = self.services.store.save(player) {
            metrics::inc_persistence_failures();
            self.report.warnings.push(Warning::PersistenceFailed(e.to_string()));
        }
    }

    /// Run `f` on the main context and wait for it. Runs `f` directly when already there.
    pub fn on_main<T, F>(&self, f: F) -> Result<T, CommandError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if MainContext::is_current() {
            return Ok(f());
        }
        self.services
            .main
            .submit(f)
            .map_err(|e| CommandError::Failed(e.to_string()))?
            .blocking_recv()
            .map_err(|_| CommandError::Panicked("main context job did not complete".to_string()))
    }

    pub fn into_report(self) -> Report {
        self.report
    }
}
