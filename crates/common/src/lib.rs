//! Shared types for the gridfall tile-storage core: local tile coordinates,
//! identifier newtypes, simulated time, and the terrain/furniture/trap
//! catalogs that resolve identifiers to their definitions.
//!
//! # Invariants
//! - Identifier values are never range-checked at assignment; they resolve
//!   (or fail to resolve) at catalog lookup time.
//! - `TilePos` coordinates are pre-validated by whoever constructs them;
//!   storage code indexes with them directly.

pub mod catalog;
pub mod types;

pub use catalog::{Catalog, FurnitureDef, Registry, TerrainDef, TrapDef};
pub use types::{
    CHUNK_EDGE, FieldKind, FurnitureId, SimDuration, SimTime, TerrainId, TilePos, TrapId,
};
