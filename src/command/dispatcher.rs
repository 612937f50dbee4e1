//! Command dispatch pipeline.
//!
//! ```text
//! raw line
//!   -> resolve name / alias / sub-command      Denied(UnknownCommand)
//!   -> module enabled?                         Denied(ModuleDisabled)
//!   -> parse declared arguments                Denied(InvalidArguments)
//!   -> permission (base node, arg suffixes)    Denied(NoPermission | PlayerOnly)
//!   -> ledger admission                        Denied(OnCooldown | AlreadyPending) or WarmupStarted
//!   -> charge cost                             Denied(InsufficientFunds)
//!   -> execute (main context or worker pool)
//!   -> success: start cooldown / failure: refund
//! ```
//!
//! Outcomes of warmed-up invocations are not returned from [`CommandDispatcher::dispatch`];
//! they are delivered on the deferred channel given to the builder (and always logged
//! and counted).

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::args::{parse_args, ParsedArgs};
use super::context::{CommandContext, Services};
use super::descriptor::{CommandDescriptor, ExecutionMode};
use super::ledger::{Admission, CancelTrigger, CommandLedger, LedgerStats, PolicyPlan};
use super::main_context::MainContext;
use super::outcome::{CommandError, CommandResult, DenyReason, FailureCause, Outcome, Report};
use super::permission::{Exemptions, PermissionResolver};
use super::registry::{CommandRegistry, Registered};
use crate::config::Config;
use crate::host::{EconomyBackend, GameServer, PermissionBackend};
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::{JailRegistry, LoginActions, PlayerStore, StoreError};
use crate::types::{Caller, CallerId, PlayerId};

/// Final outcome of an invocation that went through a warmup.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredOutcome {
    pub caller: Caller,
    pub command: String,
    pub outcome: Outcome,
}

struct Shared {
    registry: CommandRegistry,
    services: Arc<Services>,
    ledger: CommandLedger,
    config: RwLock<Arc<Config>>,
    deferred: Option<mpsc::UnboundedSender<DeferredOutcome>>,
}

#[derive(Clone)]
pub struct CommandDispatcher {
    shared: Arc<Shared>,
}

pub struct DispatcherBuilder {
    config: Config,
    registry: CommandRegistry,
    store: Arc<PlayerStore>,
    server: Arc<dyn GameServer>,
    permissions: Arc<dyn PermissionBackend>,
    economy: Option<Arc<dyn EconomyBackend>>,
    jails: Option<Arc<JailRegistry>>,
    main: Option<MainContext>,
    deferred: Option<mpsc::UnboundedSender<DeferredOutcome>>,
}

impl DispatcherBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn economy(mut self, economy: Arc<dyn EconomyBackend>) -> Self {
        self.economy = Some(economy);
        self
    }

    pub fn jails(mut self, jails: Arc<JailRegistry>) -> Self {
        self.jails = Some(jails);
        self
    }

    pub fn main_context(mut self, main: MainContext) -> Self {
        self.main = Some(main);
        self
    }

    pub fn deferred(mut self, tx: mpsc::UnboundedSender<DeferredOutcome>) -> Self {
        self.deferred = Some(tx);
        self
    }

    /// Finish setup: start the main context if none was given, open the jail registry
    /// next to the player data, and publish the permission layout.
    /// Must run inside a tokio runtime.
    pub fn build(self) -> Result<CommandDispatcher, StoreError> {
        let jails = match self.jails {
            Some(jails) => jails,
            None => Arc::new(JailRegistry::open(self.store.root())?),
        };
        let permissions = PermissionResolver::new(&self.config.server.permission_prefix, self.permissions);
        permissions.register_suggestions(self.registry.descriptors());
        let services = Arc::new(Services {
            store: self.store,
            jails,
            server: self.server,
            permissions,
            main: self.main.unwrap_or_else(MainContext::start),
        });
        log::info!("dispatcher ready with {} commands", self.registry.len());
        Ok(CommandDispatcher {
            shared: Arc::new(Shared {
                registry: self.registry,
                services,
                ledger: CommandLedger::new(self.economy),
                config: RwLock::new(Arc::new(self.config)),
                deferred: self.deferred,
            }),
        })
    }
}

fn deny(reason: DenyReason) -> Outcome {
    Outcome::Denied(reason)
}

impl CommandDispatcher {
    pub fn builder(
        registry: CommandRegistry,
        store: Arc<PlayerStore>,
        server: Arc<dyn GameServer>,
        permissions: Arc<dyn PermissionBackend>,
    ) -> DispatcherBuilder {
        DispatcherBuilder {
            config: Config::default(),
            registry,
            store,
            server,
            permissions,
            economy: None,
            jails: None,
            main: None,
            deferred: None,
        }
    }

    pub fn config(&self) -> Arc<Config> {
        self.shared
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a new configuration. Invocations already running keep their snapshot.
    pub fn reload_config(&self, config: Config) {
        *self.shared.config.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(config);
        log::info!("configuration reloaded");
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.shared.registry
    }

    pub fn store(&self) -> &Arc<PlayerStore> {
        &self.shared.services.store
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.shared.services.permissions
    }

    pub fn ledger_stats(&self) -> LedgerStats {
        self.shared.ledger.stats()
    }

    pub fn cooldown_remaining(&self, player: PlayerId, command: &str) -> Option<Duration> {
        self.shared.ledger.cooldown_remaining(player, &command.to_ascii_lowercase())
    }

    /// Run one raw invocation (`"/kick bob spamming"`) for `caller`.
    pub async fn dispatch(&self, caller: &Caller, raw: &str) -> Outcome {
        let trimmed = raw.trim();
        let line = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let Some((entry, consumed)) = self.shared.registry.resolve(&tokens) else {
            let name = tokens.first().map(|t| t.to_ascii_lowercase()).unwrap_or_default();
            metrics::record_dispatch(None);
            let outcome = deny(DenyReason::UnknownCommand(name));
            self.finish(caller, None, &outcome);
            return outcome;
        };
        let name = entry.descriptor.name.clone();
        metrics::record_dispatch(Some(&name));

        let outcome = self.run_pipeline(caller, entry, &tokens[consumed..]).await;
        self.finish(caller, Some(&name), &outcome);
        outcome
    }

    fn finish(&self, caller: &Caller, command: Option<&str>, outcome: &Outcome) {
        metrics::record_outcome(command, outcome);
        match outcome {
            Outcome::Denied(reason) => log::debug!(
                "{} denied /{}: {}",
                escape_log(&caller.name),
                command.unwrap_or("?"),
                reason
            ),
            Outcome::Failure { cause, .. } => log::warn!(
                "{} /{} failed: {}",
                escape_log(&caller.name),
                command.unwrap_or("?"),
                cause
            ),
            _ => {}
        }
        if let Some(report) = outcome.report() {
            for warning in &report.warnings {
                log::warn!("/{}: {:?}", command.unwrap_or("?"), warning);
            }
        }
    }

    async fn run_pipeline(&self, caller: &Caller, entry: Registered, arg_tokens: &[&str]) -> Outcome {
        let d = entry.descriptor.clone();
        let config = self.config();
        let services = &self.shared.services;

        if let Some(module) = &d.module {
            if !config.modules.is_enabled(module) {
                return deny(DenyReason::ModuleDisabled(module.clone()));
            }
        }

        let args = match parse_args(&d.args, arg_tokens, services.server.as_ref()) {
            Ok(args) => args,
            Err(e) => {
                return deny(DenyReason::InvalidArguments {
                    message: e.to_string(),
                    usage: d.usage(),
                })
            }
        };

        if d.flags.player_only && caller.is_console() {
            return deny(DenyReason::PlayerOnly);
        }
        if !services.permissions.resolve(caller, &d, None).is_allowed() {
            return deny(DenyReason::NoPermission);
        }
        for spec in &d.args {
            if let Some(suffix) = &spec.requires_suffix {
                if args.has(&spec.key) && !services.permissions.test_suffix(caller, &d, suffix) {
                    return deny(DenyReason::NoPermission);
                }
            }
        }

        let CallerId::Player(player) = caller.id else {
            // The console bypasses the ledger entirely.
            return self.execute(caller.clone(), entry, args, config).await;
        };

        let exemptions = services.permissions.exemptions(caller, &d);
        let plan = policy_plan(&d, &config, exemptions);

        if config.warmup.cancel_on_command {
            let cancelled = self.shared.ledger.cancel_others(player, &d.name, CancelTrigger::OtherCommand);
            if cancelled > 0 {
                log::debug!("{} cancelled {} warmup(s) by running /{}", player, cancelled, d.name);
            }
        }
        match self.shared.ledger.admit(player, &d.name, &plan) {
            Err(reason) => deny(reason),
            Ok(Admission::Proceed) => self.run_admitted(caller.clone(), player, entry, args, plan, config).await,
            Ok(Admission::Warmup { ticket, cancelled }) => {
                self.spawn_warmup(caller.clone(), player, entry, args, plan, config, ticket, cancelled);
                Outcome::WarmupStarted { warmup: plan.warmup }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_warmup(
        &self,
        caller: Caller,
        player: PlayerId,
        entry: Registered,
        args: ParsedArgs,
        plan: PolicyPlan,
        config: Arc<Config>,
        ticket: u64,
        mut cancelled: oneshot::Receiver<CancelTrigger>,
    ) {
        let this = self.clone();
        let name = entry.descriptor.name.clone();
        log::debug!("{} started {}s warmup for /{}", player, plan.warmup.as_secs(), name);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = tokio::time::sleep(plan.warmup) => {
                    if this.shared.ledger.finish_warmup(player, &name, ticket, &plan) {
                        this.run_admitted(caller.clone(), player, entry, args, plan, config).await
                    } else {
                        let trigger = cancelled.try_recv().unwrap_or(CancelTrigger::Manual);
                        warmup_cancelled(trigger)
                    }
                }
                trigger = &mut cancelled => warmup_cancelled(trigger.unwrap_or(CancelTrigger::Manual)),
            };
            this.finish(&caller, Some(&name), &outcome);
            if let Some(tx) = &this.shared.deferred {
                let _ = tx.send(DeferredOutcome {
                    caller,
                    command: name,
                    outcome,
                });
            }
        });
    }

    async fn run_admitted(
        &self,
        caller: Caller,
        player: PlayerId,
        entry: Registered,
        args: ParsedArgs,
        plan: PolicyPlan,
        config: Arc<Config>,
    ) -> Outcome {
        let ledger = &self.shared.ledger;
        let name = entry.descriptor.name.clone();
        if !ledger.charge(player, &name, plan.cost) {
            ledger.complete(player, &name, false, plan.cooldown);
            return deny(DenyReason::InsufficientFunds { cost: plan.cost });
        }
        let outcome = self.execute(caller, entry, args, config).await;
        let success = outcome.is_success();
        if !success {
            let refunded = ledger.refund(player, &name);
            if refunded > 0.0 {
                log::debug!("refunded {:.2} to {} after failed /{}", refunded, player, name);
            }
        }
        ledger.complete(player, &name, success, plan.cooldown);
        outcome
    }

    async fn execute(&self, caller: Caller, entry: Registered, args: ParsedArgs, config: Arc<Config>) -> Outcome {
        let services = self.shared.services.clone();
        let mode = entry.descriptor.mode;
        let usage = entry.descriptor.usage();
        let job = move || {
            let mut ctx = CommandContext::new(caller, args, entry.descriptor.clone(), services, config);
            let result = entry.command.execute(&mut ctx);
            (result, ctx.into_report())
        };

        let joined: Result<(Result<CommandResult, CommandError>, Report), CommandError> = match mode {
            ExecutionMode::Inline if MainContext::is_current() => Ok(job()),
            ExecutionMode::Inline => match self.shared.services.main.submit(job) {
                Ok(rx) => rx
                    .await
                    .map_err(|_| CommandError::Panicked("command panicked on the main context".to_string())),
                Err(e) => Err(CommandError::Failed(e.to_string())),
            },
            ExecutionMode::Background => tokio::task::spawn_blocking(job)
                .await
                .map_err(|e| CommandError::Panicked(e.to_string())),
        };

        match joined {
            Ok((Ok(CommandResult::Success), report)) => Outcome::Success(report),
            Ok((Ok(CommandResult::Empty), report)) => Outcome::Failure {
                cause: FailureCause::Empty,
                report,
            },
            Ok((Err(CommandError::InvalidArguments(message)), _)) => {
                Outcome::Denied(DenyReason::InvalidArguments { message, usage })
            }
            Ok((Err(e), report)) => Outcome::Failure {
                cause: FailureCause::ExecutionFailed(e.to_string()),
                report,
            },
            Err(e) => Outcome::Failure {
                cause: FailureCause::ExecutionFailed(e.to_string()),
                report: Report::default(),
            },
        }
    }

    /// Cancel one pending warmup by hand.
    pub fn cancel_warmup(&self, player: PlayerId, command: &str) -> bool {
        self.shared
            .ledger
            .cancel(player, &command.to_ascii_lowercase(), CancelTrigger::Manual)
    }

    pub fn on_player_moved(&self, player: PlayerId) -> usize {
        if !self.config().warmup.cancel_on_move {
            return 0;
        }
        self.shared.ledger.cancel_all(player, CancelTrigger::Moved)
    }

    pub fn on_player_damaged(&self, player: PlayerId) -> usize {
        if !self.config().warmup.cancel_on_damage {
            return 0;
        }
        self.shared.ledger.cancel_all(player, CancelTrigger::Damaged)
    }

    /// Player joined: stamp the login and carry out pending login actions (teleport to the
    /// stored login location, jail if flagged while offline). Call from the host's join
    /// event, which already runs on the main thread.
    pub fn on_join(&self, player: PlayerId) -> Result<LoginActions, StoreError> {
        let services = &self.shared.services;
        let actions = services.store.on_login(player, services.server.as_ref())?;
        if let Some(target) = &actions.teleport {
            if !services.server.teleport(player, target.location, target.rotation) {
                log::warn!("could not move {} to their login location", player);
            }
        }
        if actions.jail {
            crate::modules::jail::jail_on_login(services, player)?;
        }
        if actions.unread_mail > 0 {
            services
                .server
                .send_message(player, &format!("You have {} mail message(s). Use /mail read", actions.unread_mail));
        }
        Ok(actions)
    }

    /// Player left: cancel warmups, stamp the logout and optionally save.
    pub fn on_disconnect(&self, player: PlayerId) -> Result<(), StoreError> {
        let cancelled = self.shared.ledger.cancel_all(player, CancelTrigger::Disconnect);
        if cancelled > 0 {
            log::debug!("cancelled {} warmup(s) for disconnecting {}", cancelled, player);
        }
        let services = &self.shared.services;
        let autosave = self.config().storage.autosave_on_logout;
        services.store.on_logout(player, services.server.as_ref(), autosave)?;
        self.shared.ledger.prune();
        Ok(())
    }

    /// Stop the main context after draining it and flush every dirty document.
    pub async fn shutdown(&self) -> Result<usize, StoreError> {
        self.shared.services.main.shutdown().await;
        let store = self.shared.services.store.clone();
        tokio::task::spawn_blocking(move || store.save_all())
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?
    }
}

fn warmup_cancelled(trigger: CancelTrigger) -> Outcome {
    Outcome::Failure {
        cause: FailureCause::WarmupCancelled(trigger),
        report: Report::default(),
    }
}

/// Effective warmup, cooldown and cost: descriptor defaults, overridden by
/// `[commands.<name>]`, then zeroed by descriptor skip flags and caller exemptions.
fn policy_plan(d: &CommandDescriptor, config: &Config, exemptions: Exemptions) -> PolicyPlan {
    let overrides = config.command(&d.name).copied().unwrap_or_default();
    let mut plan = PolicyPlan {
        warmup: overrides.warmup().unwrap_or(d.defaults.warmup),
        cooldown: overrides.cooldown().unwrap_or(d.defaults.cooldown),
        cost: overrides.cost.unwrap_or(d.defaults.cost),
    };
    if d.flags.skip_warmup || exemptions.warmup {
        plan.warmup = Duration::ZERO;
    }
    if d.flags.skip_cooldown || exemptions.cooldown {
        plan.cooldown = Duration::ZERO;
    }
    if d.flags.skip_cost || exemptions.cost {
        plan.cost = 0.0;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandOverride;

    #[test]
    fn plan_applies_overrides_then_flags_and_exemptions() {
        let d = CommandDescriptor::builder("lightning")
            .cooldown(Duration::from_secs(10))
            .warmup(Duration::from_secs(3))
            .cost(1.0)
            .no_warmup()
            .build();
        let mut config = Config::default();
        config.commands.insert(
            "lightning".into(),
            CommandOverride {
                cooldown_seconds: Some(30),
                warmup_seconds: Some(5),
                cost: Some(4.0),
            },
        );

        let plan = policy_plan(&d, &config, Exemptions::default());
        assert_eq!(plan.cooldown, Duration::from_secs(30));
        assert_eq!(plan.warmup, Duration::ZERO);
        assert_eq!(plan.cost, 4.0);

        let plan = policy_plan(
            &d,
            &config,
            Exemptions {
                cost: true,
                ..Exemptions::default()
            },
        );
        assert_eq!(plan.cost, 0.0);
        assert_eq!(plan.cooldown, Duration::from_secs(30));
        assert_eq!(policy_plan(&d, &config, Exemptions::all()), PolicyPlan::default());
    }
}
