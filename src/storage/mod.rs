//! Per-player state store.
//!
//! One JSON document per player under `<root>/players/<uuid>.json`. Documents are loaded
//! on first access and cached; every later access sees the same in-memory instance.
//! Mutations only touch memory. [`PlayerStore::save`] (or logout with autosave enabled)
//! flushes a document with an atomic locked write, so a failed save leaves the previous
//! file intact and the in-memory edit in place for a later retry.
//!
//! Locking: the cache map is an `RwLock` held only for lookups and inserts. Each document
//! has its own `Mutex`, plus a write gate that serializes saves of that document so an
//! older snapshot can never overwrite a newer one.
//!
//! Fly, invulnerability and social spy are *online-authoritative*: while the player is
//! connected the live game state wins and is written back into the document; offline the
//! stored value is the answer.

pub mod atomic;
pub mod document;
pub mod errors;
pub mod jails;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use serde::Deserialize;

pub use document::{JailData, LoginLocation, MailEntry, MuteData, PlayerDocument, PLAYER_SCHEMA_VERSION};
pub use errors::StoreError;
pub use jails::JailRegistry;

use crate::host::GameServer;
use crate::types::{Location, NamedLocation, PlayerId, Rotation};
use crate::validation::validate_home_name;

const PLAYERS_DIR: &str = "players";

struct PlayerEntry {
    doc: Mutex<PlayerDocument>,
    write_gate: Mutex<()>,
    dirty: AtomicBool,
}

impl PlayerEntry {
    fn new(doc: PlayerDocument, dirty: bool) -> Self {
        Self {
            doc: Mutex::new(doc),
            write_gate: Mutex::new(()),
            dirty: AtomicBool::new(dirty),
        }
    }

    fn doc(&self) -> MutexGuard<'_, PlayerDocument> {
        self.doc.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// What the embedding server should do right after a player joins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoginActions {
    /// Pending login location, already resolved against missing worlds.
    pub teleport: Option<LoginLocation>,
    /// The player was flagged to be jailed on this login.
    pub jail: bool,
    pub unread_mail: usize,
    pub mute: Option<MuteData>,
}

/// Reads only the version, so a future schema is reported as a mismatch rather than a
/// confusing field error.
#[derive(Deserialize)]
struct SchemaHeader {
    schema_version: u32,
}

pub struct PlayerStoreBuilder {
    root: PathBuf,
}

impl PlayerStoreBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open(self) -> Result<PlayerStore, StoreError> {
        PlayerStore::open(self.root)
    }
}

pub struct PlayerStore {
    root: PathBuf,
    players_dir: PathBuf,
    cache: RwLock<HashMap<PlayerId, Arc<PlayerEntry>>>,
}

impl PlayerStore {
    /// Open (or create) the store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let players_dir = root.join(PLAYERS_DIR);
        fs::create_dir_all(&players_dir)?;
        log::debug!("player store opened at {}", root.display());
        Ok(Self {
            root,
            players_dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: PlayerId) -> PathBuf {
        self.players_dir.join(format!("{}.json", id))
    }

    fn load_from_disk(&self, id: PlayerId) -> Result<Option<PlayerDocument>, StoreError> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // A lock taken on a missing destination leaves an empty file behind.
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        let header: SchemaHeader = serde_json::from_slice(&bytes)?;
        if header.schema_version != PLAYER_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "player",
                expected: PLAYER_SCHEMA_VERSION,
                found: header.schema_version,
            });
        }
        let mut doc: PlayerDocument = serde_json::from_slice(&bytes)?;
        if doc.id != id {
            return Err(StoreError::InvalidId(format!(
                "{} contains document for {}",
                path.display(),
                doc.id
            )));
        }
        doc.backfill_timestamps();
        Ok(Some(doc))
    }

    fn entry(&self, id: PlayerId) -> Result<Arc<PlayerEntry>, StoreError> {
        if let Some(entry) = self.cache.read().unwrap_or_else(|e| e.into_inner()).get(&id) {
            return Ok(entry.clone());
        }
        // Load outside the map lock; a racing loader may win, in which case its instance is kept.
        let loaded = match self.load_from_disk(id)? {
            Some(doc) => PlayerEntry::new(doc, false),
            None => PlayerEntry::new(PlayerDocument::new(id), true),
        };
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(cache.entry(id).or_insert_with(|| Arc::new(loaded)).clone())
    }

    fn cached(&self, id: PlayerId) -> Option<Arc<PlayerEntry>> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    fn read<R>(&self, id: PlayerId, f: impl FnOnce(&PlayerDocument) -> R) -> Result<R, StoreError> {
        let entry = self.entry(id)?;
        let doc = entry.doc();
        Ok(f(&*doc))
    }

    /// Mutate a document in memory and mark it dirty. The closure runs under the
    /// document's lock.
    pub fn update<R>(&self, id: PlayerId, f: impl FnOnce(&mut PlayerDocument) -> R) -> Result<R, StoreError> {
        let entry = self.entry(id)?;
        let mut doc = entry.doc();
        let out = f(&mut *doc);
        entry.dirty.store(true, Ordering::Release);
        Ok(out)
    }

    /// Snapshot of a player's document, loading it (or creating defaults) if needed.
    pub fn get(&self, id: PlayerId) -> Result<PlayerDocument, StoreError> {
        self.read(id, |doc| doc.clone())
    }

    /// True when the player has a document on disk.
    pub fn exists(&self, id: PlayerId) -> bool {
        self.path_for(id).is_file()
    }

    pub fn is_cached(&self, id: PlayerId) -> bool {
        self.cached(id).is_some()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Flush the in-memory document to disk. A document that was never loaded is left alone.
    pub fn save(&self, id: PlayerId) -> Result<(), StoreError> {
        let Some(entry) = self.cached(id) else {
            return Ok(());
        };
        self.save_entry(id, &entry)
    }

    fn save_entry(&self, id: PlayerId, entry: &PlayerEntry) -> Result<(), StoreError> {
        let _gate = entry.write_gate.lock().unwrap_or_else(|e| e.into_inner());
        let bytes = {
            let doc = entry.doc();
            entry.dirty.store(false, Ordering::Release);
            serde_json::to_vec_pretty(&*doc)
        };
        let result = bytes
            .map_err(StoreError::from)
            .and_then(|bytes| atomic::write_file_locked(&self.path_for(id), &bytes).map_err(StoreError::from));
        if let Err(e) = &result {
            entry.dirty.store(true, Ordering::Release);
            log::warn!("failed to save player {}: {}", id, e);
        }
        result
    }

    /// Save every dirty cached document. Keeps going past failures and reports the first.
    pub fn save_all(&self) -> Result<usize, StoreError> {
        let entries: Vec<(PlayerId, Arc<PlayerEntry>)> = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();
        let mut saved = 0;
        let mut first_error = None;
        for (id, entry) in entries {
            if !entry.dirty.load(Ordering::Acquire) {
                continue;
            }
            match self.save_entry(id, &entry) {
                Ok(()) => saved += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    /// Save if dirty, then drop the document from the cache.
    pub fn unload(&self, id: PlayerId) -> Result<(), StoreError> {
        if let Some(entry) = self.cached(id) {
            if entry.dirty.load(Ordering::Acquire) {
                self.save_entry(id, &entry)?;
            }
            self.cache.write().unwrap_or_else(|e| e.into_inner()).remove(&id);
        }
        Ok(())
    }

    /// Ids of every document on disk.
    pub fn stored_ids(&self) -> Result<Vec<PlayerId>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.players_dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".json") {
                match stem.parse::<PlayerId>() {
                    Ok(id) => ids.push(id),
                    Err(_) => log::warn!("ignoring stray file in players dir: {}", stem),
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    // ----- homes -----

    /// Add a home. Returns false, changing nothing, when the name fails validation or is
    /// already taken (case-insensitively).
    pub fn set_home(&self, id: PlayerId, name: &str, location: Location, rotation: Rotation) -> Result<bool, StoreError> {
        if validate_home_name(name).is_err() {
            return Ok(false);
        }
        let key = name.to_ascii_lowercase();
        let entry = self.entry(id)?;
        let mut doc = entry.doc();
        if doc.homes.contains_key(&key) {
            return Ok(false);
        }
        doc.homes.insert(
            key.clone(),
            NamedLocation {
                name: key,
                location,
                rotation,
            },
        );
        entry.dirty.store(true, Ordering::Release);
        Ok(true)
    }

    pub fn delete_home(&self, id: PlayerId, name: &str) -> Result<bool, StoreError> {
        let key = name.to_ascii_lowercase();
        let entry = self.entry(id)?;
        let mut doc = entry.doc();
        let removed = doc.homes.remove(&key).is_some();
        if removed {
            entry.dirty.store(true, Ordering::Release);
        }
        Ok(removed)
    }

    pub fn get_home(&self, id: PlayerId, name: &str) -> Result<Option<NamedLocation>, StoreError> {
        let key = name.to_ascii_lowercase();
        self.read(id, |doc| doc.homes.get(&key).cloned())
    }

    /// Copy of every home, keyed by lowercased name.
    pub fn get_homes(&self, id: PlayerId) -> Result<BTreeMap<String, NamedLocation>, StoreError> {
        self.read(id, |doc| doc.homes.clone())
    }

    pub fn home_count(&self, id: PlayerId) -> Result<usize, StoreError> {
        self.read(id, |doc| doc.homes.len())
    }

    // ----- online-authoritative toggles -----

    fn reconcile(&self, id: PlayerId, live: Option<bool>, field: fn(&mut PlayerDocument) -> &mut bool) -> Result<bool, StoreError> {
        let entry = self.entry(id)?;
        let mut doc = entry.doc();
        let slot = field(&mut *doc);
        match live {
            Some(live) => {
                if *slot != live {
                    *slot = live;
                    entry.dirty.store(true, Ordering::Release);
                }
                Ok(live)
            }
            None => Ok(*slot),
        }
    }

    /// Whether the player may fly: the live value while online, the stored one otherwise.
    pub fn fly(&self, id: PlayerId, server: &dyn GameServer) -> Result<bool, StoreError> {
        self.reconcile(id, server.can_fly(id), fly_slot)
    }

    /// Apply to the live player first (when online); a rejected live change leaves the
    /// stored value untouched and returns false.
    pub fn set_fly(&self, id: PlayerId, server: &dyn GameServer, fly: bool) -> Result<bool, StoreError> {
        if server.is_online(id) && !server.set_can_fly(id, fly) {
            return Ok(false);
        }
        self.update(id, |doc| doc.fly = fly)?;
        Ok(true)
    }

    pub fn invulnerable(&self, id: PlayerId, server: &dyn GameServer) -> Result<bool, StoreError> {
        self.reconcile(id, server.is_invulnerable(id), invulnerable_slot)
    }

    pub fn set_invulnerable(&self, id: PlayerId, server: &dyn GameServer, invulnerable: bool) -> Result<bool, StoreError> {
        if server.is_online(id) && !server.set_invulnerable(id, invulnerable) {
            return Ok(false);
        }
        self.update(id, |doc| doc.invulnerable = invulnerable)?;
        Ok(true)
    }

    /// Effective social spy state. While online the stored flag only counts if the player
    /// still holds the permission; the stored flag itself is never cleared by a read.
    pub fn social_spy(&self, id: PlayerId, server: &dyn GameServer, permitted: bool) -> Result<bool, StoreError> {
        let stored = self.read(id, |doc| doc.social_spy)?;
        if server.is_online(id) {
            Ok(stored && permitted)
        } else {
            Ok(stored)
        }
    }

    /// Enabling requires the permission; disabling always succeeds.
    pub fn set_social_spy(&self, id: PlayerId, enabled: bool, permitted: bool) -> Result<bool, StoreError> {
        if enabled && !permitted {
            return Ok(false);
        }
        self.update(id, |doc| doc.social_spy = enabled)?;
        Ok(true)
    }

    // ----- jail -----

    pub fn jail_data(&self, id: PlayerId) -> Result<Option<JailData>, StoreError> {
        self.read(id, |doc| doc.jail.clone())
    }

    pub fn set_jail(&self, id: PlayerId, jail: Option<JailData>) -> Result<(), StoreError> {
        self.update(id, |doc| doc.jail = jail)
    }

    pub fn jail_on_next_login(&self, id: PlayerId) -> Result<bool, StoreError> {
        self.read(id, |doc| doc.jail_on_next_login)
    }

    /// Setting the flag is only honored while the player is offline; clearing always works.
    pub fn set_jail_on_next_login(&self, id: PlayerId, server: &dyn GameServer, jail: bool) -> Result<bool, StoreError> {
        if jail && server.is_online(id) {
            return Ok(false);
        }
        self.update(id, |doc| doc.jail_on_next_login = jail)?;
        Ok(true)
    }

    // ----- mute -----

    /// Current mute, clearing it first if it has expired.
    pub fn mute_data(&self, id: PlayerId) -> Result<Option<MuteData>, StoreError> {
        let entry = self.entry(id)?;
        let mut doc = entry.doc();
        if doc.mute.as_ref().is_some_and(|m| m.is_expired(Utc::now())) {
            doc.mute = None;
            entry.dirty.store(true, Ordering::Release);
        }
        Ok(doc.mute.clone())
    }

    pub fn set_mute(&self, id: PlayerId, mute: Option<MuteData>) -> Result<(), StoreError> {
        self.update(id, |doc| doc.mute = mute)
    }

    // ----- mail -----

    pub fn add_mail(&self, id: PlayerId, mail: MailEntry) -> Result<(), StoreError> {
        self.update(id, |doc| doc.mail.push(mail))
    }

    /// Copy of the mailbox, oldest first.
    pub fn get_mail(&self, id: PlayerId) -> Result<Vec<MailEntry>, StoreError> {
        self.read(id, |doc| doc.mail.clone())
    }

    pub fn clear_mail(&self, id: PlayerId) -> Result<usize, StoreError> {
        self.update(id, |doc| std::mem::take(&mut doc.mail).len())
    }

    // ----- login / logout -----

    pub fn last_login(&self, id: PlayerId) -> Result<Option<chrono::DateTime<Utc>>, StoreError> {
        self.read(id, |doc| doc.last_login)
    }

    pub fn last_logout(&self, id: PlayerId) -> Result<Option<chrono::DateTime<Utc>>, StoreError> {
        self.read(id, |doc| doc.last_logout)
    }

    pub fn set_location_on_login(&self, id: PlayerId, location: Option<LoginLocation>) -> Result<(), StoreError> {
        self.update(id, |doc| doc.location_on_login = location)
    }

    /// Pending login location. When its world no longer exists the default spawn is
    /// returned instead.
    pub fn location_on_login(&self, id: PlayerId, server: &dyn GameServer) -> Result<Option<LoginLocation>, StoreError> {
        let stored = self.read(id, |doc| doc.location_on_login.clone())?;
        Ok(stored.map(|l| resolve_login_location(l, server)))
    }

    /// Stamp the login time and consume one-shot login state (pending location and
    /// jail-on-next-login).
    pub fn on_login(&self, id: PlayerId, server: &dyn GameServer) -> Result<LoginActions, StoreError> {
        let mut actions = self.update(id, |doc| {
            doc.last_login = Some(Utc::now());
            LoginActions {
                teleport: doc.location_on_login.take(),
                jail: std::mem::take(&mut doc.jail_on_next_login),
                unread_mail: doc.mail.len(),
                mute: None,
            }
        })?;
        actions.teleport = actions.teleport.map(|l| resolve_login_location(l, server));
        actions.mute = self.mute_data(id)?;
        Ok(actions)
    }

    /// Stamp the logout time and capture the live toggles while they are still readable.
    pub fn on_logout(&self, id: PlayerId, server: &dyn GameServer, save: bool) -> Result<(), StoreError> {
        let fly = server.can_fly(id);
        let invulnerable = server.is_invulnerable(id);
        self.update(id, |doc| {
            doc.last_logout = Some(Utc::now());
            if let Some(fly) = fly {
                doc.fly = fly;
            }
            if let Some(invulnerable) = invulnerable {
                doc.invulnerable = invulnerable;
            }
        })?;
        if save {
            self.save(id)?;
        }
        Ok(())
    }
}

fn fly_slot(doc: &mut PlayerDocument) -> &mut bool {
    &mut doc.fly
}

fn invulnerable_slot(doc: &mut PlayerDocument) -> &mut bool {
    &mut doc.invulnerable
}

fn resolve_login_location(stored: LoginLocation, server: &dyn GameServer) -> LoginLocation {
    if server.world_exists(&stored.location) {
        stored
    } else {
        log::info!("login location world {} is gone; using default spawn", stored.location.world);
        LoginLocation {
            location: server.default_spawn(),
            rotation: Rotation::default(),
        }
    }
}
