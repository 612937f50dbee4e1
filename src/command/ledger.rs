//! Per-caller cooldown, warmup and cost bookkeeping.
//!
//! Each (caller, command) pair has two independent state machines:
//!
//! ```text
//! Idle -> Warmup(pending) -> Idle        (fires or is cancelled)
//! Idle -> OnCooldown      -> Idle        (expires)
//! ```
//!
//! Callers live in an arena keyed by player id, each behind its own lock, so one
//! player's bookkeeping never contends with another's. Time comes from `tokio::time`,
//! which lets tests drive cooldowns with a paused clock.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::outcome::DenyReason;
use crate::host::EconomyBackend;
use crate::types::PlayerId;

/// Why a pending warmup was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelTrigger {
    Disconnect,
    Moved,
    Damaged,
    /// The player ran another command while waiting.
    OtherCommand,
    /// Cancelled by an administrator or by shutdown.
    Manual,
}

impl fmt::Display for CancelTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelTrigger::Disconnect => "disconnected",
            CancelTrigger::Moved => "moved",
            CancelTrigger::Damaged => "took damage",
            CancelTrigger::OtherCommand => "ran another command",
            CancelTrigger::Manual => "cancelled",
        };
        f.write_str(s)
    }
}

/// Effective timers and cost for one invocation, after descriptor flags, config overrides
/// and caller exemptions have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolicyPlan {
    pub warmup: Duration,
    pub cooldown: Duration,
    pub cost: f64,
}

impl PolicyPlan {
    /// Whether a run must hold the entry exclusively: a cooldown is only started after the
    /// body finishes, and a charge is refunded from the entry's single slot.
    pub fn guards_execution(&self) -> bool {
        !self.cooldown.is_zero() || self.cost > 0.0
    }
}

#[derive(Debug)]
struct PendingWarmup {
    ticket: u64,
    cancel: oneshot::Sender<CancelTrigger>,
}

#[derive(Debug, Default)]
struct LedgerEntry {
    cooldown_expires_at: Option<Instant>,
    warmup: Option<PendingWarmup>,
    /// Set while a body with a cooldown or cost runs, so a concurrent invocation can
    /// neither slip past the cooldown check nor share the refund slot.
    executing: bool,
    /// Last amount withdrawn, kept for a refund.
    last_cost: f64,
}

impl LedgerEntry {
    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_expires_at
            .filter(|expires| *expires > now)
            .map(|expires| expires - now)
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.warmup.is_none() && !self.executing && self.cooldown_remaining(now).is_none()
    }
}

#[derive(Debug, Default)]
struct CallerLedger {
    entries: HashMap<String, LedgerEntry>,
}

/// Result of a successful admission.
#[derive(Debug)]
pub enum Admission {
    /// Run the body now.
    Proceed,
    /// A warmup was registered; wait on `cancelled` racing a timer of the plan's warmup.
    Warmup {
        ticket: u64,
        cancelled: oneshot::Receiver<CancelTrigger>,
    },
}

/// Snapshot for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub tracked_callers: usize,
    pub pending_warmups: usize,
    pub active_cooldowns: usize,
}

pub struct CommandLedger {
    callers: Mutex<HashMap<PlayerId, Arc<Mutex<CallerLedger>>>>,
    economy: Option<Arc<dyn EconomyBackend>>,
    next_ticket: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl CommandLedger {
    pub fn new(economy: Option<Arc<dyn EconomyBackend>>) -> Self {
        Self {
            callers: Mutex::new(HashMap::new()),
            economy,
            next_ticket: AtomicU64::new(1),
        }
    }

    fn caller(&self, player: PlayerId) -> Arc<Mutex<CallerLedger>> {
        lock(&self.callers).entry(player).or_default().clone()
    }

    fn existing(&self, player: PlayerId) -> Option<Arc<Mutex<CallerLedger>>> {
        lock(&self.callers).get(&player).cloned()
    }

    /// Admission check. Denies with `AlreadyPending` while a warmup or guarded execution
    /// is outstanding, `OnCooldown` before the cooldown expires; otherwise registers a
    /// warmup or marks the execution as started.
    pub fn admit(&self, player: PlayerId, command: &str, plan: &PolicyPlan) -> Result<Admission, DenyReason> {
        let caller = self.caller(player);
        let mut ledger = lock(&caller);
        let entry = ledger.entries.entry(command.to_string()).or_default();
        let now = Instant::now();

        if entry.warmup.is_some() || entry.executing {
            return Err(DenyReason::AlreadyPending);
        }
        if let Some(remaining) = entry.cooldown_remaining(now) {
            return Err(DenyReason::OnCooldown { remaining });
        }
        entry.cooldown_expires_at = None;

        if !plan.warmup.is_zero() {
            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            entry.warmup = Some(PendingWarmup { ticket, cancel: tx });
            return Ok(Admission::Warmup {
                ticket,
                cancelled: rx,
            });
        }

        entry.executing = plan.guards_execution();
        Ok(Admission::Proceed)
    }

    /// Called when the warmup timer fires. Returns false when the warmup was cancelled
    /// (or replaced) in the meantime, in which case nothing must run.
    pub fn finish_warmup(&self, player: PlayerId, command: &str, ticket: u64, plan: &PolicyPlan) -> bool {
        let Some(caller) = self.existing(player) else {
            return false;
        };
        let mut ledger = lock(&caller);
        let Some(entry) = ledger.entries.get_mut(command) else {
            return false;
        };
        match &entry.warmup {
            Some(pending) if pending.ticket == ticket => {
                entry.warmup = None;
                entry.executing = plan.guards_execution();
                true
            }
            _ => false,
        }
    }

    /// Cancel a pending warmup. Idempotent: cancelling nothing returns false.
    pub fn cancel(&self, player: PlayerId, command: &str, trigger: CancelTrigger) -> bool {
        let Some(caller) = self.existing(player) else {
            return false;
        };
        let pending = {
            let mut ledger = lock(&caller);
            ledger
                .entries
                .get_mut(command)
                .and_then(|entry| entry.warmup.take())
        };
        match pending {
            Some(pending) => {
                let _ = pending.cancel.send(trigger);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending warmup of a caller, returning how many were cancelled.
    pub fn cancel_all(&self, player: PlayerId, trigger: CancelTrigger) -> usize {
        let Some(caller) = self.existing(player) else {
            return 0;
        };
        let pending: Vec<PendingWarmup> = {
            let mut ledger = lock(&caller);
            ledger
                .entries
                .values_mut()
                .filter_map(|entry| entry.warmup.take())
                .collect()
        };
        let count = pending.len();
        for p in pending {
            let _ = p.cancel.send(trigger);
        }
        count
    }

    /// Cancel pending warmups of every command except `keep`.
    pub fn cancel_others(&self, player: PlayerId, keep: &str, trigger: CancelTrigger) -> usize {
        let Some(caller) = self.existing(player) else {
            return 0;
        };
        let pending: Vec<PendingWarmup> = {
            let mut ledger = lock(&caller);
            ledger
                .entries
                .iter_mut()
                .filter(|(name, _)| name.as_str() != keep)
                .filter_map(|(_, entry)| entry.warmup.take())
                .collect()
        };
        let count = pending.len();
        for p in pending {
            let _ = p.cancel.send(trigger);
        }
        count
    }

    /// Withdraw `cost` before the body runs. Returns false on insufficient balance, with
    /// nothing withdrawn. Without an economy backend costs are ignored.
    pub fn charge(&self, player: PlayerId, command: &str, cost: f64) -> bool {
        if cost <= 0.0 {
            return true;
        }
        let Some(economy) = &self.economy else {
            log::debug!("no economy backend installed; ignoring cost {} for {}", cost, command);
            return true;
        };
        if !economy.withdraw(player, cost) {
            return false;
        }
        let caller = self.caller(player);
        lock(&caller)
            .entries
            .entry(command.to_string())
            .or_default()
            .last_cost = cost;
        true
    }

    /// Give back whatever the last `charge` took for this command.
    pub fn refund(&self, player: PlayerId, command: &str) -> f64 {
        let Some(caller) = self.existing(player) else {
            return 0.0;
        };
        let amount = {
            let mut ledger = lock(&caller);
            match ledger.entries.get_mut(command) {
                Some(entry) => std::mem::take(&mut entry.last_cost),
                None => 0.0,
            }
        };
        if amount > 0.0 {
            if let Some(economy) = &self.economy {
                economy.deposit(player, amount);
            }
        }
        amount
    }

    /// Record the end of an execution. Starts the cooldown only on success.
    pub fn complete(&self, player: PlayerId, command: &str, success: bool, cooldown: Duration) {
        let caller = self.caller(player);
        let mut ledger = lock(&caller);
        let entry = ledger.entries.entry(command.to_string()).or_default();
        entry.executing = false;
        if success {
            entry.last_cost = 0.0;
            if !cooldown.is_zero() {
                entry.cooldown_expires_at = Some(Instant::now() + cooldown);
            }
        }
    }

    pub fn cooldown_remaining(&self, player: PlayerId, command: &str) -> Option<Duration> {
        let caller = self.existing(player)?;
        let ledger = lock(&caller);
        ledger
            .entries
            .get(command)
            .and_then(|entry| entry.cooldown_remaining(Instant::now()))
    }

    pub fn has_pending_warmup(&self, player: PlayerId, command: &str) -> bool {
        self.existing(player)
            .map(|caller| {
                lock(&caller)
                    .entries
                    .get(command)
                    .map(|entry| entry.warmup.is_some())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    pub fn clear_cooldown(&self, player: PlayerId, command: &str) {
        if let Some(caller) = self.existing(player) {
            if let Some(entry) = lock(&caller).entries.get_mut(command) {
                entry.cooldown_expires_at = None;
            }
        }
    }

    /// Drop idle entries (no warmup, no execution, expired cooldown) and empty callers.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut callers = lock(&self.callers);
        callers.retain(|_, caller| {
            let mut ledger = lock(caller);
            ledger.entries.retain(|_, entry| !entry.is_idle(now));
            !ledger.entries.is_empty()
        });
    }

    pub fn stats(&self) -> LedgerStats {
        let now = Instant::now();
        let callers = lock(&self.callers);
        let mut stats = LedgerStats {
            tracked_callers: callers.len(),
            ..LedgerStats::default()
        };
        for caller in callers.values() {
            let ledger = lock(caller);
            for entry in ledger.entries.values() {
                if entry.warmup.is_some() {
                    stats.pending_warmups += 1;
                }
                if entry.cooldown_remaining(now).is_some() {
                    stats.active_cooldowns += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    fn plan(warmup: u64, cooldown: u64) -> PolicyPlan {
        PolicyPlan {
            warmup: Duration::from_secs(warmup),
            cooldown: Duration::from_secs(cooldown),
            cost: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_starts_only_on_success() {
        let ledger = CommandLedger::new(None);
        let p = PlayerId::new_v4();
        let plan = plan(0, 30);

        assert!(matches!(ledger.admit(p, "smite", &plan), Ok(Admission::Proceed)));
        ledger.complete(p, "smite", false, plan.cooldown);
        assert!(ledger.cooldown_remaining(p, "smite").is_none());

        assert!(matches!(ledger.admit(p, "smite", &plan), Ok(Admission::Proceed)));
        ledger.complete(p, "smite", true, plan.cooldown);
        match ledger.admit(p, "smite", &plan) {
            Err(DenyReason::OnCooldown { remaining }) => assert_eq!(remaining, Duration::from_secs(30)),
            other => panic!("expected cooldown, got {:?}", other),
        }

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(ledger.admit(p, "smite", &plan), Ok(Admission::Proceed)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_execution_is_already_pending() {
        let ledger = CommandLedger::new(None);
        let p = PlayerId::new_v4();
        let plan = plan(0, 10);
        assert!(ledger.admit(p, "heal", &plan).is_ok());
        assert_eq!(ledger.admit(p, "heal", &plan).unwrap_err(), DenyReason::AlreadyPending);
        // other commands are independent
        assert!(ledger.admit(p, "feed", &plan).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cost_alone_guards_execution() {
        let ledger = CommandLedger::new(None);
        let p = PlayerId::new_v4();
        let plan = PolicyPlan {
            cost: 5.0,
            ..PolicyPlan::default()
        };
        assert!(ledger.admit(p, "heal", &plan).is_ok());
        assert_eq!(ledger.admit(p, "heal", &plan).unwrap_err(), DenyReason::AlreadyPending);
        ledger.complete(p, "heal", false, plan.cooldown);
        assert!(ledger.admit(p, "heal", &plan).is_ok());

        // free commands without a cooldown may overlap
        assert!(ledger.admit(p, "list", &PolicyPlan::default()).is_ok());
        assert!(ledger.admit(p, "list", &PolicyPlan::default()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn one_warmup_per_command_and_cancel_is_idempotent() {
        let ledger = CommandLedger::new(None);
        let p = PlayerId::new_v4();
        let plan = plan(5, 0);

        let Ok(Admission::Warmup { ticket, cancelled }) = ledger.admit(p, "home", &plan) else {
            panic!("expected warmup");
        };
        assert_eq!(ledger.admit(p, "home", &plan).unwrap_err(), DenyReason::AlreadyPending);
        assert!(ledger.has_pending_warmup(p, "home"));

        assert!(ledger.cancel(p, "home", CancelTrigger::Moved));
        assert!(!ledger.cancel(p, "home", CancelTrigger::Moved));
        assert_eq!(cancelled.await.unwrap(), CancelTrigger::Moved);
        assert!(!ledger.finish_warmup(p, "home", ticket, &plan));
    }

    #[tokio::test(start_paused = true)]
    async fn finished_warmup_cannot_be_cancelled() {
        let ledger = CommandLedger::new(None);
        let p = PlayerId::new_v4();
        let plan = plan(5, 0);
        let Ok(Admission::Warmup { ticket, .. }) = ledger.admit(p, "spawn", &plan) else {
            panic!("expected warmup");
        };
        assert!(ledger.finish_warmup(p, "spawn", ticket, &plan));
        assert!(!ledger.cancel(p, "spawn", CancelTrigger::Disconnect));
        assert_eq!(ledger.cancel_all(p, CancelTrigger::Disconnect), 0);
    }

    #[test]
    fn charge_and_refund_net_to_zero() {
        let host = Arc::new(MemoryHost::new());
        let p = host.add_player("alice", true);
        host.set_balance(p, 100.0);
        let ledger = CommandLedger::new(Some(host.clone()));

        assert!(ledger.charge(p, "smite", 25.0));
        assert_eq!(host.balance(p), 75.0);
        assert_eq!(ledger.refund(p, "smite"), 25.0);
        assert_eq!(host.balance(p), 100.0);
        // second refund has nothing left to give
        assert_eq!(ledger.refund(p, "smite"), 0.0);

        assert!(!ledger.charge(p, "smite", 500.0));
        assert_eq!(host.balance(p), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_keeps_active_entries() {
        let ledger = CommandLedger::new(None);
        let a = PlayerId::new_v4();
        let b = PlayerId::new_v4();
        let plan = plan(0, 10);
        ledger.admit(a, "x", &plan).unwrap();
        ledger.complete(a, "x", true, plan.cooldown);
        ledger.admit(b, "x", &PolicyPlan::default()).unwrap();
        ledger.complete(b, "x", true, Duration::ZERO);

        ledger.prune();
        let stats = ledger.stats();
        assert_eq!(stats.tracked_callers, 1);
        assert_eq!(stats.active_cooldowns, 1);
    }
}
