//! Shared identity and position types used by the dispatcher, the player store and the
//! collaborator traits in [`crate::host`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable unique identifier of a player (the game's profile UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new_v4() -> Self {
        PlayerId(Uuid::new_v4())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PlayerId(Uuid::parse_str(s.trim())?))
    }
}

impl From<Uuid> for PlayerId {
    fn from(value: Uuid) -> Self {
        PlayerId(value)
    }
}

/// Identifier of a loaded or unloaded world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub Uuid);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position inside a specific world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// Same world, shifted by the given offsets.
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            world: self.world,
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub fn block_x(&self) -> i64 {
        self.x.floor() as i64
    }

    pub fn block_y(&self) -> i64 {
        self.y.floor() as i64
    }

    pub fn block_z(&self) -> i64 {
        self.z.floor() as i64
    }
}

/// Facing of an entity (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    #[serde(default)]
    pub roll: f64,
}

impl Rotation {
    pub fn new(pitch: f64, yaw: f64) -> Self {
        Self {
            pitch,
            yaw,
            roll: 0.0,
        }
    }
}

/// A location with a name and facing, as used for homes and jail points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedLocation {
    pub name: String,
    pub location: Location,
    pub rotation: Rotation,
}

/// Who issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerId {
    /// Server console (or any other non-player source). Holds every permission.
    Console,
    Player(PlayerId),
}

impl CallerId {
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            CallerId::Player(id) => Some(*id),
            CallerId::Console => None,
        }
    }
}

/// Caller identity handed to the dispatcher for each invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: CallerId,
    pub name: String,
}

impl Caller {
    pub fn console(name: impl Into<String>) -> Self {
        Self {
            id: CallerId::Console,
            name: name.into(),
        }
    }

    pub fn player(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id: CallerId::Player(id),
            name: name.into(),
        }
    }

    pub fn is_console(&self) -> bool {
        matches!(self.id, CallerId::Console)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_parses_and_displays() {
        let raw = "5b0c7a4e-9d8f-4a43-bb4d-0f5a6c1f2e3d";
        let id: PlayerId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!("not-a-uuid".parse::<PlayerId>().is_err());
    }

    #[test]
    fn block_coordinates_floor_negative_values() {
        let loc = Location::new(WorldId(Uuid::nil()), -0.5, 64.9, 10.0);
        assert_eq!(loc.block_x(), -1);
        assert_eq!(loc.block_y(), 64);
        assert_eq!(loc.block_z(), 10);
        assert_eq!(loc.offset(0.0, 3.0, 0.0).y, 67.9);
    }
}
