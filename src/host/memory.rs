//! In-memory host used by the admin console and the tests.
//!
//! Permission checks are exact-match, with `*` granting everything. Worlds, players,
//! balances and bans live behind `RwLock`s, and every observable side effect (kicks,
//! lightning strikes, sent messages) is recorded so callers can inspect it afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::{BanEntry, EconomyBackend, GameServer, PermissionBackend, PermissionSuggestion, PlayerRef};
use crate::types::{Location, PlayerId, Rotation, WorldId};

#[derive(Debug, Clone)]
struct LivePlayer {
    name: String,
    online: bool,
    location: Location,
    rotation: Rotation,
    can_fly: bool,
    invulnerable: bool,
    /// When false, writes to fly/invulnerability are rejected as if by the engine.
    accepts_state_changes: bool,
    target_block: Option<Location>,
}

#[derive(Debug, Default)]
struct HostState {
    worlds: HashSet<WorldId>,
    spawn: Option<Location>,
    players: HashMap<PlayerId, LivePlayer>,
    grants: HashMap<PlayerId, HashSet<String>>,
    options: HashMap<PlayerId, HashMap<String, String>>,
    balances: HashMap<PlayerId, f64>,
    bans: HashMap<PlayerId, BanEntry>,
    suggestions: Vec<PermissionSuggestion>,
    kicked: Vec<(PlayerId, String)>,
    strikes: Vec<Location>,
    messages: Vec<(Option<PlayerId>, String)>,
}

/// Thread-safe in-memory implementation of every host trait.
pub struct MemoryHost {
    state: RwLock<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// A host with a single default world whose spawn is at (0, 64, 0).
    pub fn new() -> Self {
        let world = WorldId(Uuid::new_v4());
        let mut state = HostState::default();
        state.worlds.insert(world);
        state.spawn = Some(Location::new(world, 0.0, 64.0, 0.0));
        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HostState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn default_world(&self) -> WorldId {
        self.default_spawn().world
    }

    pub fn add_world(&self) -> WorldId {
        let world = WorldId(Uuid::new_v4());
        self.write().worlds.insert(world);
        world
    }

    pub fn remove_world(&self, world: WorldId) {
        self.write().worlds.remove(&world);
    }

    /// Register a player standing at the default spawn.
    pub fn add_player(&self, name: &str, online: bool) -> PlayerId {
        let id = PlayerId::new_v4();
        let spawn = self.default_spawn();
        self.write().players.insert(
            id,
            LivePlayer {
                name: name.to_string(),
                online,
                location: spawn,
                rotation: Rotation::default(),
                can_fly: false,
                invulnerable: false,
                accepts_state_changes: true,
                target_block: None,
            },
        );
        id
    }

    pub fn set_online(&self, player: PlayerId, online: bool) {
        if let Some(p) = self.write().players.get_mut(&player) {
            p.online = online;
        }
    }

    pub fn move_player(&self, player: PlayerId, location: Location, rotation: Rotation) {
        if let Some(p) = self.write().players.get_mut(&player) {
            p.location = location;
            p.rotation = rotation;
        }
    }

    pub fn set_target_block(&self, player: PlayerId, target: Option<Location>) {
        if let Some(p) = self.write().players.get_mut(&player) {
            p.target_block = target;
        }
    }

    /// Change live flags out of band, the way another plugin or an operator would.
    pub fn force_live_flags(&self, player: PlayerId, can_fly: bool, invulnerable: bool) {
        if let Some(p) = self.write().players.get_mut(&player) {
            p.can_fly = can_fly;
            p.invulnerable = invulnerable;
        }
    }

    pub fn reject_state_changes(&self, player: PlayerId, reject: bool) {
        if let Some(p) = self.write().players.get_mut(&player) {
            p.accepts_state_changes = !reject;
        }
    }

    pub fn grant(&self, player: PlayerId, node: &str) {
        self.write()
            .grants
            .entry(player)
            .or_default()
            .insert(node.to_string());
    }

    pub fn revoke(&self, player: PlayerId, node: &str) {
        if let Some(nodes) = self.write().grants.get_mut(&player) {
            nodes.remove(node);
        }
    }

    pub fn set_option(&self, player: PlayerId, key: &str, value: &str) {
        self.write()
            .options
            .entry(player)
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn set_balance(&self, player: PlayerId, amount: f64) {
        self.write().balances.insert(player, amount);
    }

    pub fn balance(&self, player: PlayerId) -> f64 {
        self.read().balances.get(&player).copied().unwrap_or(0.0)
    }

    pub fn ban(&self, player: PlayerId, entry: BanEntry) {
        self.write().bans.insert(player, entry);
    }

    pub fn kicked(&self) -> Vec<(PlayerId, String)> {
        self.read().kicked.clone()
    }

    pub fn strikes(&self) -> Vec<Location> {
        self.read().strikes.clone()
    }

    /// Messages sent so far; `None` as recipient means the console.
    pub fn messages(&self) -> Vec<(Option<PlayerId>, String)> {
        self.read().messages.clone()
    }

    pub fn suggestions(&self) -> Vec<PermissionSuggestion> {
        self.read().suggestions.clone()
    }

    fn holds(state: &HostState, player: PlayerId, node: &str) -> bool {
        state
            .grants
            .get(&player)
            .map(|nodes| nodes.contains("*") || nodes.contains(node))
            .unwrap_or(false)
    }

    fn find(&self, name: &str, online_only: bool) -> Option<PlayerRef> {
        let state = self.read();
        state
            .players
            .iter()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name) && (!online_only || p.online))
            .map(|(id, p)| PlayerRef {
                id: *id,
                name: p.name.clone(),
                online: p.online,
            })
    }

    fn with_online<T>(&self, player: PlayerId, f: impl FnOnce(&LivePlayer) -> T) -> Option<T> {
        let state = self.read();
        state.players.get(&player).filter(|p| p.online).map(f)
    }
}

impl PermissionBackend for MemoryHost {
    fn has_permission(&self, player: PlayerId, node: &str) -> bool {
        Self::holds(&self.read(), player, node)
    }

    fn get_option(&self, player: PlayerId, key: &str) -> Option<String> {
        self.read()
            .options
            .get(&player)
            .and_then(|opts| opts.get(key).cloned())
    }

    fn register_suggestions(&self, suggestions: &[PermissionSuggestion]) {
        self.write().suggestions = suggestions.to_vec();
    }
}

impl EconomyBackend for MemoryHost {
    fn withdraw(&self, player: PlayerId, amount: f64) -> bool {
        let mut state = self.write();
        let balance = state.balances.entry(player).or_insert(0.0);
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        true
    }

    fn deposit(&self, player: PlayerId, amount: f64) {
        *self.write().balances.entry(player).or_insert(0.0) += amount;
    }
}

impl GameServer for MemoryHost {
    fn find_online(&self, name: &str) -> Option<PlayerRef> {
        self.find(name, true)
    }

    fn find_user(&self, name: &str) -> Option<PlayerRef> {
        self.find(name, false)
    }

    fn is_online(&self, player: PlayerId) -> bool {
        self.with_online(player, |_| ()).is_some()
    }

    fn player_location(&self, player: PlayerId) -> Option<(Location, Rotation)> {
        self.with_online(player, |p| (p.location, p.rotation))
    }

    fn teleport(&self, player: PlayerId, location: Location, rotation: Rotation) -> bool {
        let mut state = self.write();
        if !state.worlds.contains(&location.world) {
            return false;
        }
        match state.players.get_mut(&player) {
            Some(p) if p.online => {
                p.location = location;
                p.rotation = rotation;
                true
            }
            _ => false,
        }
    }

    fn world_exists(&self, location: &Location) -> bool {
        self.read().worlds.contains(&location.world)
    }

    fn default_spawn(&self) -> Location {
        let state = self.read();
        state
            .spawn
            .unwrap_or_else(|| Location::new(WorldId(Uuid::nil()), 0.0, 64.0, 0.0))
    }

    fn can_fly(&self, player: PlayerId) -> Option<bool> {
        self.with_online(player, |p| p.can_fly)
    }

    fn set_can_fly(&self, player: PlayerId, fly: bool) -> bool {
        match self.write().players.get_mut(&player) {
            Some(p) if p.online && p.accepts_state_changes => {
                p.can_fly = fly;
                true
            }
            _ => false,
        }
    }

    fn is_invulnerable(&self, player: PlayerId) -> Option<bool> {
        self.with_online(player, |p| p.invulnerable)
    }

    fn set_invulnerable(&self, player: PlayerId, invulnerable: bool) -> bool {
        match self.write().players.get_mut(&player) {
            Some(p) if p.online && p.accepts_state_changes => {
                p.invulnerable = invulnerable;
                true
            }
            _ => false,
        }
    }

    fn kick(&self, player: PlayerId, reason: &str) -> bool {
        let mut guard = self.write();
        let state = &mut *guard;
        match state.players.get_mut(&player) {
            Some(p) if p.online => {
                p.online = false;
                state.kicked.push((player, reason.to_string()));
                true
            }
            _ => false,
        }
    }

    fn target_block(&self, player: PlayerId, _max_distance: u32) -> Option<Location> {
        self.with_online(player, |p| p.target_block).flatten()
    }

    fn strike_lightning(&self, at: Location) -> bool {
        let mut state = self.write();
        if !state.worlds.contains(&at.world) {
            return false;
        }
        state.strikes.push(at);
        true
    }

    fn ban_for(&self, player: PlayerId) -> Option<BanEntry> {
        self.read().bans.get(&player).cloned()
    }

    fn remove_ban(&self, player: PlayerId) -> bool {
        self.write().bans.remove(&player).is_some()
    }

    fn send_message(&self, player: PlayerId, message: &str) {
        self.write()
            .messages
            .push((Some(player), message.to_string()));
    }

    fn broadcast_permission(&self, node: &str, message: &str) {
        let mut guard = self.write();
        let state = &mut *guard;
        let recipients: Vec<PlayerId> = state
            .players
            .iter()
            .filter(|(id, p)| p.online && Self::holds(state, **id, node))
            .map(|(id, _)| *id)
            .collect();
        for id in recipients {
            state.messages.push((Some(id), message.to_string()));
        }
        state.messages.push((None, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraw_refuses_overdraft() {
        let host = MemoryHost::new();
        let id = host.add_player("alice", true);
        host.set_balance(id, 5.0);
        assert!(!host.withdraw(id, 6.0));
        assert_eq!(host.balance(id), 5.0);
        assert!(host.withdraw(id, 5.0));
        assert_eq!(host.balance(id), 0.0);
    }

    #[test]
    fn live_flags_only_visible_when_online() {
        let host = MemoryHost::new();
        let id = host.add_player("bob", false);
        assert_eq!(host.can_fly(id), None);
        assert!(!host.set_can_fly(id, true));
        host.set_online(id, true);
        assert!(host.set_can_fly(id, true));
        assert_eq!(host.can_fly(id), Some(true));
    }

    #[test]
    fn wildcard_grant_matches_everything() {
        let host = MemoryHost::new();
        let id = host.add_player("op", true);
        assert!(!host.has_permission(id, "mcadmin.kick.base"));
        host.grant(id, "*");
        assert!(host.has_permission(id, "mcadmin.kick.base"));
    }
}
