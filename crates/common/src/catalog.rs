use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{FurnitureId, TerrainId, TrapId};

/// Terrain definition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainDef {
    pub name: String,
    pub move_cost: i32,
}

impl TerrainDef {
    pub fn new(name: impl Into<String>, move_cost: i32) -> Self {
        Self {
            name: name.into(),
            move_cost,
        }
    }
}

/// Furniture definition record.
///
/// `signable` furniture can display stored signage text; `sign_text` is an
/// optional template the stored text substitutes into at a `%s` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FurnitureDef {
    pub name: String,
    pub move_cost: i32,
    pub signable: bool,
    pub sign_text: Option<String>,
}

impl FurnitureDef {
    pub fn new(name: impl Into<String>, move_cost: i32) -> Self {
        Self {
            name: name.into(),
            move_cost,
            signable: false,
            sign_text: None,
        }
    }

    pub fn signable(name: impl Into<String>, sign_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            move_cost: 2,
            signable: true,
            sign_text: Some(sign_text.into()),
        }
    }
}

/// Trap definition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrapDef {
    pub name: String,
    pub visible: bool,
}

impl TrapDef {
    pub fn new(name: impl Into<String>, visible: bool) -> Self {
        Self {
            name: name.into(),
            visible,
        }
    }
}

/// Dense id registry: definitions are stored in registration order and
/// addressed by a u16 index, with a name index for the persistence codec.
///
/// Index 0 is always the null definition registered at construction, so a
/// default-initialized id resolves to something meaningful.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    defs: Vec<T>,
    by_name: HashMap<String, u16>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            defs: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    /// Register a definition under `name` and return its dense id.
    /// Re-registering a name replaces the definition but keeps the id.
    pub fn register(&mut self, name: &str, def: T) -> u16 {
        if let Some(&id) = self.by_name.get(name) {
            self.defs[id as usize] = def;
            return id;
        }
        let id = self.defs.len() as u16;
        self.defs.push(def);
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Resolve an id to its definition. Unknown ids resolve to `None`;
    /// setters never validate, so this is where invalid ids surface.
    pub fn get(&self, id: u16) -> Option<&T> {
        self.defs.get(id as usize)
    }

    /// Look up an id by registered name.
    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// The id catalogs this core consumes: terrain, furniture, and traps.
///
/// Owned by the surrounding game's data layer; storage code only ever reads
/// it, through the tile view's resolve accessors and the snapshot codec.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub terrain: Registry<TerrainDef>,
    pub furniture: Registry<FurnitureDef>,
    pub traps: Registry<TrapDef>,
}

impl Catalog {
    /// An empty catalog with the three null definitions at index 0.
    pub fn new() -> Self {
        let mut cat = Self::default();
        cat.terrain.register("null", TerrainDef::new("null", 0));
        cat.furniture.register("null", FurnitureDef::new("null", 0));
        cat.traps.register("null", TrapDef::new("null", false));
        cat
    }

    pub fn terrain_def(&self, id: TerrainId) -> Option<&TerrainDef> {
        self.terrain.get(id.0)
    }

    pub fn furniture_def(&self, id: FurnitureId) -> Option<&FurnitureDef> {
        self.furniture.get(id.0)
    }

    pub fn trap_def(&self, id: TrapId) -> Option<&TrapDef> {
        self.traps.get(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let mut cat = Catalog::new();
        let id = cat.terrain.register("dirt", TerrainDef::new("dirt", 2));
        assert_eq!(cat.terrain.lookup("dirt"), Some(id));
        assert_eq!(cat.terrain_def(TerrainId(id)).unwrap().name, "dirt");
    }

    #[test]
    fn null_definitions_occupy_index_zero() {
        let cat = Catalog::new();
        assert_eq!(cat.terrain.lookup("null"), Some(0));
        assert_eq!(cat.furniture.lookup("null"), Some(0));
        assert_eq!(cat.traps.lookup("null"), Some(0));
        assert!(cat.terrain_def(TerrainId::default()).is_some());
    }

    #[test]
    fn unknown_id_resolves_to_none() {
        let cat = Catalog::new();
        assert!(cat.terrain_def(TerrainId(999)).is_none());
    }

    #[test]
    fn reregistering_keeps_id() {
        let mut reg = Registry::default();
        let a = reg.register("sign", FurnitureDef::signable("sign", "a sign reads: %s"));
        let b = reg.register("sign", FurnitureDef::new("sign", 1));
        assert_eq!(a, b);
        assert!(!reg.get(a).unwrap().signable);
    }
}
