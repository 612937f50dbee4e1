//! Collaborator interfaces for everything outside the command core.
//!
//! The dispatcher and the player store never talk to the game directly. They go through
//! the traits in this module, which the embedding server implements:
//!
//! - [`PermissionBackend`] - permission node checks and per-player options
//! - [`EconomyBackend`] - balance withdrawal and refund for command costs
//! - [`GameServer`] - live player state, worlds, teleports and moderation hooks
//!
//! [`memory::MemoryHost`] implements all three in memory. The console binary and the test
//! suite run against it.

pub mod memory;

use chrono::{DateTime, Utc};

use crate::command::descriptor::SuggestedLevel;
use crate::types::{Location, PlayerId, Rotation};

/// A permission node suggested for registration with the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSuggestion {
    pub node: String,
    pub description: String,
    pub level: SuggestedLevel,
}

pub trait PermissionBackend: Send + Sync {
    fn has_permission(&self, player: PlayerId, node: &str) -> bool;

    /// Free-form option attached to a player (e.g. `home-count`).
    fn get_option(&self, player: PlayerId, key: &str) -> Option<String>;

    /// Called once at startup with the full node layout of every registered command.
    fn register_suggestions(&self, _suggestions: &[PermissionSuggestion]) {}
}

pub trait EconomyBackend: Send + Sync {
    /// Remove `amount` from the balance. Returns false (and changes nothing) when the
    /// balance is insufficient.
    fn withdraw(&self, player: PlayerId, amount: f64) -> bool;

    fn deposit(&self, player: PlayerId, amount: f64);
}

/// A player known to the server, online or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    pub id: PlayerId,
    pub name: String,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub reason: String,
    pub source: String,
    pub expires: Option<DateTime<Utc>>,
}

/// Live game state. Every call is expected to be cheap; mutating calls return false when the
/// engine rejects the change.
pub trait GameServer: Send + Sync {
    /// Look up a connected player by name (case-insensitive).
    fn find_online(&self, name: &str) -> Option<PlayerRef>;

    /// Look up any player that has ever joined, online or offline.
    fn find_user(&self, name: &str) -> Option<PlayerRef>;

    fn is_online(&self, player: PlayerId) -> bool;

    fn player_location(&self, player: PlayerId) -> Option<(Location, Rotation)>;

    /// Teleport to a safe spot at or near `location`.
    fn teleport(&self, player: PlayerId, location: Location, rotation: Rotation) -> bool;

    fn world_exists(&self, location: &Location) -> bool;

    fn default_spawn(&self) -> Location;

    /// `None` when the player is offline or the value is unavailable.
    fn can_fly(&self, player: PlayerId) -> Option<bool>;

    fn set_can_fly(&self, player: PlayerId, fly: bool) -> bool;

    fn is_invulnerable(&self, player: PlayerId) -> Option<bool>;

    fn set_invulnerable(&self, player: PlayerId, invulnerable: bool) -> bool;

    fn kick(&self, player: PlayerId, reason: &str) -> bool;

    /// First solid block along the player's line of sight, up to `max_distance` blocks.
    fn target_block(&self, player: PlayerId, max_distance: u32) -> Option<Location>;

    fn strike_lightning(&self, at: Location) -> bool;

    fn ban_for(&self, player: PlayerId) -> Option<BanEntry>;

    fn remove_ban(&self, player: PlayerId) -> bool;

    fn send_message(&self, player: PlayerId, message: &str);

    /// Send to every online player holding `node`, plus the console.
    fn broadcast_permission(&self, node: &str, message: &str);
}
