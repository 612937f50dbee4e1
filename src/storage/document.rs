//! The persisted per-player record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Location, NamedLocation, PlayerId, Rotation};

pub const PLAYER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailData {
    pub jail: String,
    /// Where the player stood when jailed, used when they are released.
    pub previous_location: Option<Location>,
    #[serde(default)]
    pub previous_rotation: Option<Rotation>,
    pub reason: Option<String>,
    pub jailed_by: Option<String>,
    pub jailed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuteData {
    pub reason: Option<String>,
    pub muted_by: Option<String>,
    pub muted_at: DateTime<Utc>,
    /// `None` means permanent.
    pub expires: Option<DateTime<Utc>>,
}

impl MuteData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailEntry {
    /// `None` for mail sent from the console.
    pub sender: Option<PlayerId>,
    pub sender_name: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginLocation {
    pub location: Location,
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDocument {
    pub schema_version: u32,
    pub id: PlayerId,
    pub first_seen: DateTime<Utc>,
    /// Keyed by lowercased home name.
    #[serde(default)]
    pub homes: BTreeMap<String, NamedLocation>,
    #[serde(default)]
    pub jail: Option<JailData>,
    #[serde(default)]
    pub jail_on_next_login: bool,
    #[serde(default)]
    pub mute: Option<MuteData>,
    #[serde(default)]
    pub mail: Vec<MailEntry>,
    #[serde(default)]
    pub social_spy: bool,
    #[serde(default)]
    pub invulnerable: bool,
    #[serde(default)]
    pub fly: bool,
    /// Starts at `first_seen`; older files without it are backfilled on load.
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_logout: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location_on_login: Option<LoginLocation>,
}

impl PlayerDocument {
    pub fn new(id: PlayerId) -> Self {
        let now = Utc::now();
        Self {
            schema_version: PLAYER_SCHEMA_VERSION,
            id,
            first_seen: now,
            homes: BTreeMap::new(),
            jail: None,
            jail_on_next_login: false,
            mute: None,
            mail: Vec::new(),
            social_spy: false,
            invulnerable: false,
            fly: false,
            last_login: Some(now),
            last_logout: Some(now),
            location_on_login: None,
        }
    }

    /// Fill timestamps missing from older files with the first-seen time.
    pub(crate) fn backfill_timestamps(&mut self) {
        self.last_login.get_or_insert(self.first_seen);
        self.last_logout.get_or_insert(self.first_seen);
    }

    pub fn is_jailed(&self) -> bool {
        self.jail.is_some()
    }
}
