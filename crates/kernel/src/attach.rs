//! Heavier state a chunk owns outright: vehicles whose origin cell lies in
//! the chunk, constructions in progress, an optional computer terminal, and
//! at most one base camp. Their behavior lives in other subsystems; this
//! core stores the values and destroys them with the chunk.

use gridfall_common::TilePos;
use serde::{Deserialize, Serialize};

use crate::items::Item;

/// A vehicle owned by the chunk its origin cell lies in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub name: String,
    /// Origin cell, chunk-local.
    pub pos: TilePos,
    /// Facing in degrees clockwise from north.
    pub facing_deg: i32,
}

impl Vehicle {
    pub fn new(name: impl Into<String>, pos: TilePos) -> Self {
        Self {
            name: name.into(),
            pos,
            facing_deg: 0,
        }
    }

    /// Reconcile the vehicle's chunk-relative placement with a chunk
    /// rotation of `turns` clockwise quarter turns.
    pub fn rotate(&mut self, turns: i32) {
        self.pos = self.pos.rotated(turns);
        self.facing_deg = (self.facing_deg + 90 * turns.rem_euclid(4)).rem_euclid(360);
    }
}

/// A construction in progress at some site in the chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialCon {
    /// Name of the construction recipe being worked on.
    pub construction: String,
    /// Accumulated progress, in recipe-defined units.
    pub counter: u32,
    /// Components already sunk into the build.
    pub components: Vec<Item>,
}

impl PartialCon {
    pub fn new(construction: impl Into<String>) -> Self {
        Self {
            construction: construction.into(),
            counter: 0,
            components: Vec::new(),
        }
    }
}

/// A computer terminal. A chunk hosts at most one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computer {
    pub name: String,
    pub security: i32,
}

impl Computer {
    pub fn new(name: impl Into<String>, security: i32) -> Self {
        Self {
            name: name.into(),
            security,
        }
    }
}

/// A faction outpost. Every chunk carries exactly one `Basecamp` value;
/// the default empty state means "no camp here" rather than an `Option`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Basecamp {
    pub name: String,
}

impl Basecamp {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Whether a camp has actually been established here.
    pub fn is_defined(&self) -> bool {
        !self.name.is_empty()
    }
}

/// A pending creature spawn, consumed by the spawning system when the chunk
/// goes live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Creature type to spawn.
    pub kind: String,
    pub count: i32,
    pub pos: TilePos,
    /// Owning faction, if any.
    pub faction: Option<i32>,
    /// Mission this spawn belongs to, if any.
    pub mission: Option<i32>,
    pub friendly: bool,
    /// Display-name override.
    pub name: Option<String>,
}

impl SpawnPoint {
    pub fn new(kind: impl Into<String>, count: i32, pos: TilePos) -> Self {
        Self {
            kind: kind.into(),
            count,
            pos,
            faction: None,
            mission: None,
            friendly: false,
            name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_rotation_wraps_facing() {
        let mut v = Vehicle::new("cart", TilePos::new(0, 0));
        v.facing_deg = 270;
        v.rotate(2);
        assert_eq!(v.facing_deg, 90);
        assert_eq!(v.pos, TilePos::new(0, 0).rotated(2));
    }

    #[test]
    fn vehicle_four_turns_is_identity() {
        let mut v = Vehicle::new("cart", TilePos::new(3, 5));
        let before = v.clone();
        v.rotate(4);
        assert_eq!(v, before);
    }

    #[test]
    fn default_camp_is_undefined() {
        assert!(!Basecamp::default().is_defined());
        assert!(Basecamp::named("the mill").is_defined());
    }
}
