//! Named jail points, persisted as a single JSON map in `<root>/jails.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::atomic::write_file_locked;
use super::StoreError;
use crate::types::{Location, NamedLocation, Rotation};
use crate::validation::validate_home_name;

const JAILS_FILE: &str = "jails.json";

pub struct JailRegistry {
    path: Option<PathBuf>,
    jails: RwLock<BTreeMap<String, NamedLocation>>,
}

impl JailRegistry {
    /// Load `jails.json` under `root`, starting empty when it does not exist yet.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let path = root.join(JAILS_FILE);
        let jails = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            jails: RwLock::new(jails),
        })
    }

    /// A registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            jails: RwLock::new(BTreeMap::new()),
        }
    }

    fn persist(&self, jails: &BTreeMap<String, NamedLocation>) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            let bytes = serde_json::to_vec_pretty(jails)?;
            write_file_locked(path, &bytes)?;
        }
        Ok(())
    }

    /// Create or move a jail point. Returns false for names that fail validation.
    pub fn set(&self, name: &str, location: Location, rotation: Rotation) -> Result<bool, StoreError> {
        if validate_home_name(name).is_err() {
            return Ok(false);
        }
        let key = name.to_ascii_lowercase();
        let mut jails = self.jails.write().unwrap_or_else(|e| e.into_inner());
        let previous = jails.insert(
            key.clone(),
            NamedLocation {
                name: key.clone(),
                location,
                rotation,
            },
        );
        if let Err(e) = self.persist(&jails) {
            // Keep memory and disk in agreement.
            match previous {
                Some(previous) => jails.insert(key, previous),
                None => jails.remove(&key),
            };
            return Err(e);
        }
        Ok(true)
    }

    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let key = name.to_ascii_lowercase();
        let mut jails = self.jails.write().unwrap_or_else(|e| e.into_inner());
        let Some(previous) = jails.remove(&key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&jails) {
            jails.insert(key, previous);
            return Err(e);
        }
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<NamedLocation> {
        self.jails
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.jails
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}
