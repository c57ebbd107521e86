//! Columnar chunk snapshots.
//!
//! A snapshot is the complete, round-trippable image of one chunk:
//! run-length-encoded feature columns (terrain/furniture/trap names
//! resolved through the catalog, radiation raw), sparse item and field
//! sections, and all chunk-scoped metadata. Uniform chunks collapse to a
//! skip marker with empty columns.
//!
//! # Invariants
//! - Cells are ordered x-major (all of column x before x + 1); run lengths
//!   must tile the grid exactly or the load fails.
//! - Malformed input is a fatal load error, never silently defaulted.
//! - Restoring rebuilds through the chunk's public mutators, so derived
//!   state (lum counters, the field counter, the active-item index) is
//!   recomputed rather than trusted from disk.

use glam::IVec3;
use gridfall_common::{
    CHUNK_EDGE, Catalog, FieldKind, FurnitureId, SimDuration, SimTime, TerrainId, TilePos, TrapId,
};
use gridfall_kernel::{
    Basecamp, Chunk, Computer, Cosmetic, Item, PartialCon, SpawnPoint, TileViewMut, Vehicle,
};
use serde::{Deserialize, Serialize};

/// Errors from snapshot capture and restore.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("unknown {kind} id {id} at capture")]
    UnknownId { kind: &'static str, id: u16 },
    #[error("unknown {kind} name {name:?} in snapshot")]
    UnknownName { kind: &'static str, name: String },
    #[error("{column} runs cover {got} cells, expected {expected}")]
    BadRunLength {
        column: &'static str,
        got: u64,
        expected: u64,
    },
    #[error("tile ({x}, {y}) out of bounds for chunk edge {edge}")]
    OutOfBounds { x: u8, y: u8, edge: usize },
    #[error("uniform snapshot carries per-tile data")]
    UniformConflict,
}

/// One-time structural upgrade for legacy saves: combined rubble-type and
/// powered-machine terrains split into a base terrain plus furniture.
/// Target names must resolve in the caller's catalog or the load fails.
const LEGACY_SPLITS: &[(&str, &str, &str)] = &[
    ("rubble", "dirt", "rubble"),
    ("wreckage", "dirt", "wreckage"),
    ("ash", "dirt", "ash"),
    ("generator_on", "floor", "generator"),
];

const CELLS: u64 = (CHUNK_EDGE * CHUNK_EDGE) as u64;

/// A run of identical values in x-major cell order.
pub type Run<T> = (T, u32);

/// Complete serialized image of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    /// Skip marker: true means no per-tile mutation ever ran and the
    /// per-tile sections below are empty.
    pub uniform: bool,
    pub terrain: Vec<Run<String>>,
    pub furniture: Vec<Run<String>>,
    pub traps: Vec<Run<String>>,
    pub radiation: Vec<Run<i32>>,
    /// Non-empty tile stacks, bottom-to-top item order.
    pub items: Vec<(TilePos, Vec<Item>)>,
    /// Tiles with at least one field entry.
    pub fields: Vec<(TilePos, Vec<(u16, i32, SimDuration)>)>,
    pub cosmetics: Vec<Cosmetic>,
    pub spawns: Vec<SpawnPoint>,
    pub vehicles: Vec<Vehicle>,
    /// Construction sites, sorted by (z, x, y) for deterministic output.
    pub constructions: Vec<(IVec3, PartialCon)>,
    pub computer: Option<Computer>,
    pub camp: Basecamp,
    pub temperature: i32,
    pub last_touched: SimTime,
}

impl ChunkSnapshot {
    /// Capture a complete snapshot of `chunk`, resolving ids to names
    /// through `catalog`. An id the catalog cannot resolve is fatal: it
    /// would not survive the trip back.
    pub fn capture(chunk: &Chunk, catalog: &Catalog) -> Result<Self, SnapshotError> {
        let uniform = chunk.is_uniform();
        let (terrain, furniture, traps, radiation, items, fields) = if uniform {
            (
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            )
        } else {
            let mut items = Vec::new();
            let mut fields = Vec::new();
            for p in cells() {
                let stack = chunk.items(p);
                if !stack.is_empty() {
                    items.push((p, stack.iter().map(|(_, item)| item.clone()).collect()));
                }
                let field = chunk.field(p);
                if !field.is_empty() {
                    fields.push((
                        p,
                        field
                            .iter()
                            .map(|e| (e.kind.0, e.intensity, e.age))
                            .collect(),
                    ));
                }
            }
            (
                rle_encode(cells().map(|p| -> Result<String, SnapshotError> {
                    let id = chunk.terrain(p);
                    catalog
                        .terrain_def(id)
                        .map(|def| def.name.clone())
                        .ok_or(SnapshotError::UnknownId {
                            kind: "terrain",
                            id: id.0,
                        })
                }))?,
                rle_encode(cells().map(|p| -> Result<String, SnapshotError> {
                    let id = chunk.furniture(p);
                    catalog
                        .furniture_def(id)
                        .map(|def| def.name.clone())
                        .ok_or(SnapshotError::UnknownId {
                            kind: "furniture",
                            id: id.0,
                        })
                }))?,
                rle_encode(cells().map(|p| -> Result<String, SnapshotError> {
                    let id = chunk.trap(p);
                    catalog
                        .trap_def(id)
                        .map(|def| def.name.clone())
                        .ok_or(SnapshotError::UnknownId {
                            kind: "trap",
                            id: id.0,
                        })
                }))?,
                rle_encode(cells().map(|p| Ok(chunk.radiation(p))))?,
                items,
                fields,
            )
        };

        let mut constructions: Vec<(IVec3, PartialCon)> = chunk
            .constructions()
            .map(|(site, con)| (*site, con.clone()))
            .collect();
        constructions.sort_by_key(|(site, _)| (site.z, site.x, site.y));

        Ok(Self {
            uniform,
            terrain,
            furniture,
            traps,
            radiation,
            items,
            fields,
            cosmetics: chunk.cosmetics().to_vec(),
            spawns: chunk.spawns().to_vec(),
            vehicles: chunk.vehicles().to_vec(),
            constructions,
            computer: chunk.computer().cloned(),
            camp: chunk.camp().clone(),
            temperature: chunk.temperature(),
            last_touched: chunk.last_touched(),
        })
    }

    /// Rebuild an in-memory chunk from this snapshot.
    ///
    /// With `legacy` set, the one-time rubble/power fix-up rewrites
    /// combined legacy terrains into base terrain plus furniture while the
    /// terrain column is applied; afterwards the state is what the current
    /// capture routine would have produced (store-after-load is a fixed
    /// point).
    pub fn restore(&self, catalog: &Catalog, legacy: bool) -> Result<Chunk, SnapshotError> {
        let mut chunk = Chunk::new();

        // Chunk-scoped metadata never touches the uniform flag.
        chunk.set_temperature(self.temperature);
        chunk.set_last_touched(self.last_touched);
        chunk.set_camp(self.camp.clone());
        if let Some(computer) = &self.computer {
            chunk.install_computer(computer.clone());
        }
        for cosmetic in &self.cosmetics {
            check_bounds(cosmetic.pos)?;
            chunk.insert_cosmetic(cosmetic.pos, cosmetic.kind, cosmetic.text.clone());
        }
        for spawn in &self.spawns {
            check_bounds(spawn.pos)?;
            chunk.add_spawn(spawn.clone());
        }
        for vehicle in &self.vehicles {
            check_bounds(vehicle.pos)?;
            chunk.add_vehicle(vehicle.clone());
        }
        for (site, con) in &self.constructions {
            chunk.start_construction(*site, con.clone());
        }

        if self.uniform {
            if !(self.terrain.is_empty()
                && self.furniture.is_empty()
                && self.traps.is_empty()
                && self.radiation.is_empty()
                && self.items.is_empty()
                && self.fields.is_empty())
            {
                return Err(SnapshotError::UniformConflict);
            }
            return Ok(chunk);
        }

        // Furniture before terrain: the legacy terrain fix-up may place
        // furniture of its own, which must win over the (null) furniture
        // a legacy save recorded at those cells.
        apply_runs(&self.furniture, "furniture", |p, name| {
            let id = lookup_furniture(catalog, name)?;
            chunk.set_furniture(p, id);
            Ok(())
        })?;
        let mut legacy_fixups = 0u32;
        apply_runs(&self.terrain, "terrain", |p, name| {
            let split = legacy
                .then(|| LEGACY_SPLITS.iter().find(|(old, _, _)| *old == name.as_str()))
                .flatten();
            match split {
                Some((_, base, furn)) => {
                    chunk.set_terrain(p, lookup_terrain(catalog, base)?);
                    chunk.set_furniture(p, lookup_furniture(catalog, furn)?);
                    legacy_fixups += 1;
                }
                None => chunk.set_terrain(p, lookup_terrain(catalog, name)?),
            }
            Ok(())
        })?;
        if legacy_fixups > 0 {
            tracing::warn!(cells = legacy_fixups, "applied legacy rubble/power fix-up");
        }
        apply_runs(&self.traps, "trap", |p, name| {
            let id = catalog
                .traps
                .lookup(name)
                .ok_or_else(|| SnapshotError::UnknownName {
                    kind: "trap",
                    name: name.to_owned(),
                })?;
            chunk.set_trap(p, TrapId(id));
            Ok(())
        })?;
        apply_runs(&self.radiation, "radiation", |p, &rad| {
            chunk.set_radiation(p, rad);
            Ok(())
        })?;

        for (pos, stack) in &self.items {
            check_bounds(*pos)?;
            for item in stack {
                chunk.add_item(*pos, item.clone());
            }
        }
        for (pos, entries) in &self.fields {
            check_bounds(*pos)?;
            let mut view = TileViewMut::new(&mut chunk, *pos);
            for &(kind, intensity, age) in entries {
                view.add_field(FieldKind(kind), intensity, age);
            }
        }

        Ok(chunk)
    }
}

fn cells() -> impl Iterator<Item = TilePos> {
    (0..CHUNK_EDGE * CHUNK_EDGE).map(TilePos::from_linear)
}

fn check_bounds(p: TilePos) -> Result<(), SnapshotError> {
    if (p.x as usize) < CHUNK_EDGE && (p.y as usize) < CHUNK_EDGE {
        Ok(())
    } else {
        Err(SnapshotError::OutOfBounds {
            x: p.x,
            y: p.y,
            edge: CHUNK_EDGE,
        })
    }
}

fn lookup_terrain(catalog: &Catalog, name: &str) -> Result<TerrainId, SnapshotError> {
    catalog
        .terrain
        .lookup(name)
        .map(TerrainId)
        .ok_or_else(|| SnapshotError::UnknownName {
            kind: "terrain",
            name: name.to_owned(),
        })
}

fn lookup_furniture(catalog: &Catalog, name: &str) -> Result<FurnitureId, SnapshotError> {
    catalog
        .furniture
        .lookup(name)
        .map(FurnitureId)
        .ok_or_else(|| SnapshotError::UnknownName {
            kind: "furniture",
            name: name.to_owned(),
        })
}

/// Collapse a cell-ordered sequence into (value, run length) pairs.
fn rle_encode<T: PartialEq>(
    values: impl Iterator<Item = Result<T, SnapshotError>>,
) -> Result<Vec<Run<T>>, SnapshotError> {
    let mut runs: Vec<Run<T>> = Vec::new();
    for value in values {
        let value = value?;
        match runs.last_mut() {
            Some((last, len)) if *last == value => *len += 1,
            _ => runs.push((value, 1)),
        }
    }
    Ok(runs)
}

/// Walk runs across the grid in cell order, failing loudly when the runs
/// do not tile the grid exactly.
fn apply_runs<T>(
    runs: &[Run<T>],
    column: &'static str,
    mut apply: impl FnMut(TilePos, &T) -> Result<(), SnapshotError>,
) -> Result<(), SnapshotError> {
    let mut idx: u64 = 0;
    for (value, len) in runs {
        for _ in 0..*len {
            if idx >= CELLS {
                return Err(SnapshotError::BadRunLength {
                    column,
                    got: idx + 1,
                    expected: CELLS,
                });
            }
            apply(TilePos::from_linear(idx as usize), value)?;
            idx += 1;
        }
    }
    if idx != CELLS {
        return Err(SnapshotError::BadRunLength {
            column,
            got: idx,
            expected: CELLS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridfall_common::{FurnitureDef, TerrainDef, TrapDef};

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.terrain.register("dirt", TerrainDef::new("dirt", 2));
        catalog.terrain.register("floor", TerrainDef::new("floor", 2));
        catalog.terrain.register("wall", TerrainDef::new("wall", 0));
        catalog
            .furniture
            .register("crate", FurnitureDef::new("crate", 4));
        catalog
            .furniture
            .register("sign", FurnitureDef::signable("sign", "a sign reads: %s"));
        catalog
            .traps
            .register("pit", TrapDef::new("pit", true));
        catalog
    }

    fn legacy_catalog() -> Catalog {
        let mut catalog = test_catalog();
        // Legacy combined terrains plus the split targets.
        catalog.terrain.register("rubble", TerrainDef::new("rubble", 4));
        catalog
            .terrain
            .register("generator_on", TerrainDef::new("generator_on", 0));
        catalog
            .furniture
            .register("rubble", FurnitureDef::new("rubble", 6));
        catalog
            .furniture
            .register("generator", FurnitureDef::new("generator", 0));
        catalog
    }

    fn populated_chunk(catalog: &Catalog) -> Chunk {
        let mut chunk = Chunk::new();
        let dirt = TerrainId(catalog.terrain.lookup("dirt").unwrap());
        let wall = TerrainId(catalog.terrain.lookup("wall").unwrap());
        let crate_f = FurnitureId(catalog.furniture.lookup("crate").unwrap());
        let pit = TrapId(catalog.traps.lookup("pit").unwrap());

        for x in 0..CHUNK_EDGE as u8 {
            for y in 0..CHUNK_EDGE as u8 {
                chunk.set_terrain(TilePos::new(x, y), dirt);
            }
        }
        chunk.set_terrain(TilePos::new(0, 3), wall);
        chunk.set_furniture(TilePos::new(2, 2), crate_f);
        chunk.set_trap(TilePos::new(4, 4), pit);
        chunk.set_radiation(TilePos::new(1, 1), 15);
        chunk.add_item(TilePos::new(2, 2), Item::emissive("lamp"));
        chunk.add_item(
            TilePos::new(2, 2),
            Item {
                active: true,
                charges: 40,
                ..Item::new("beacon")
            },
        );
        {
            let mut view = TileViewMut::new(&mut chunk, TilePos::new(6, 6));
            view.add_field(FieldKind(2), 2, SimDuration(30));
        }
        chunk.set_graffiti(TilePos::new(5, 5), "was here");
        chunk.set_signage(TilePos::new(7, 7), "keep out");
        chunk.add_spawn(SpawnPoint::new("wolf", 3, TilePos::new(9, 0)));
        chunk.add_vehicle(Vehicle::new("cart", TilePos::new(3, 8)));
        chunk.start_construction(IVec3::new(10, 2, 0), PartialCon::new("palisade"));
        chunk.install_computer(Computer::new("gate control", 2));
        chunk.set_camp(Basecamp::named("the mill"));
        chunk.set_temperature(-12);
        chunk.set_last_touched(SimTime(9000));
        chunk
    }

    #[test]
    fn roundtrip_preserves_everything() {
        let catalog = test_catalog();
        let chunk = populated_chunk(&catalog);
        let snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        assert!(!snap.uniform);
        let restored = snap.restore(&catalog, false).unwrap();
        assert_eq!(restored, chunk);
    }

    #[test]
    fn uniform_chunk_collapses_to_marker() {
        let catalog = test_catalog();
        let mut chunk = Chunk::new();
        chunk.set_temperature(5);
        chunk.set_camp(Basecamp::named("claim"));
        let snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        assert!(snap.uniform);
        assert!(snap.terrain.is_empty());
        let restored = snap.restore(&catalog, false).unwrap();
        assert!(restored.is_uniform());
        assert_eq!(restored, chunk);
    }

    #[test]
    fn capture_fails_on_unresolvable_id() {
        let catalog = test_catalog();
        let mut chunk = Chunk::new();
        chunk.set_terrain(TilePos::new(0, 0), TerrainId(999));
        match ChunkSnapshot::capture(&chunk, &catalog) {
            Err(SnapshotError::UnknownId { kind: "terrain", id: 999 }) => {}
            other => panic!("expected UnknownId, got {other:?}"),
        }
    }

    #[test]
    fn restore_fails_on_unknown_name() {
        let catalog = test_catalog();
        let chunk = populated_chunk(&catalog);
        let mut snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        snap.terrain[0].0 = "no_such_terrain".to_owned();
        assert!(matches!(
            snap.restore(&catalog, false),
            Err(SnapshotError::UnknownName { kind: "terrain", .. })
        ));
    }

    #[test]
    fn restore_fails_on_short_and_long_runs() {
        let catalog = test_catalog();
        let chunk = populated_chunk(&catalog);
        let mut snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        snap.radiation.pop();
        assert!(matches!(
            snap.restore(&catalog, false),
            Err(SnapshotError::BadRunLength { column: "radiation", .. })
        ));

        let mut snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        snap.traps.push(("pit".to_owned(), 1));
        assert!(matches!(
            snap.restore(&catalog, false),
            Err(SnapshotError::BadRunLength { column: "trap", .. })
        ));
    }

    #[test]
    fn restore_fails_on_out_of_bounds_sparse_entry() {
        let catalog = test_catalog();
        let chunk = populated_chunk(&catalog);
        let mut snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        snap.items.push((TilePos::new(12, 0), vec![Item::new("rock")]));
        assert!(matches!(
            snap.restore(&catalog, false),
            Err(SnapshotError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn uniform_marker_with_tile_data_is_rejected() {
        let catalog = test_catalog();
        let chunk = populated_chunk(&catalog);
        let mut snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        snap.uniform = true;
        assert!(matches!(
            snap.restore(&catalog, false),
            Err(SnapshotError::UniformConflict)
        ));
    }

    #[test]
    fn legacy_flag_splits_rubble_terrain() {
        let catalog = legacy_catalog();
        // A "legacy save": rubble recorded as terrain, no furniture.
        let mut old = Chunk::new();
        let floor = TerrainId(catalog.terrain.lookup("floor").unwrap());
        for x in 0..CHUNK_EDGE as u8 {
            for y in 0..CHUNK_EDGE as u8 {
                old.set_terrain(TilePos::new(x, y), floor);
            }
        }
        let rubble_ter = TerrainId(catalog.terrain.lookup("rubble").unwrap());
        let gen_ter = TerrainId(catalog.terrain.lookup("generator_on").unwrap());
        old.set_terrain(TilePos::new(3, 3), rubble_ter);
        old.set_terrain(TilePos::new(8, 1), gen_ter);
        let snap = ChunkSnapshot::capture(&old, &catalog).unwrap();

        let upgraded = snap.restore(&catalog, true).unwrap();
        let dirt = TerrainId(catalog.terrain.lookup("dirt").unwrap());
        let rubble_furn = FurnitureId(catalog.furniture.lookup("rubble").unwrap());
        assert_eq!(upgraded.terrain(TilePos::new(3, 3)), dirt);
        assert_eq!(upgraded.furniture(TilePos::new(3, 3)), rubble_furn);
        assert_eq!(upgraded.terrain(TilePos::new(8, 1)), floor);
        assert_eq!(
            upgraded.furniture(TilePos::new(8, 1)),
            FurnitureId(catalog.furniture.lookup("generator").unwrap())
        );
        // Untouched cells pass through.
        assert_eq!(upgraded.terrain(TilePos::new(0, 0)), floor);
    }

    #[test]
    fn store_after_legacy_load_is_a_fixed_point() {
        let catalog = legacy_catalog();
        let mut old = Chunk::new();
        let floor = TerrainId(catalog.terrain.lookup("floor").unwrap());
        for x in 0..CHUNK_EDGE as u8 {
            for y in 0..CHUNK_EDGE as u8 {
                old.set_terrain(TilePos::new(x, y), floor);
            }
        }
        old.set_terrain(
            TilePos::new(5, 9),
            TerrainId(catalog.terrain.lookup("rubble").unwrap()),
        );
        let legacy_snap = ChunkSnapshot::capture(&old, &catalog).unwrap();

        let upgraded = legacy_snap.restore(&catalog, true).unwrap();
        let modern_snap = ChunkSnapshot::capture(&upgraded, &catalog).unwrap();
        let again = modern_snap.restore(&catalog, false).unwrap();
        assert_eq!(again, upgraded);
        assert_eq!(
            ChunkSnapshot::capture(&again, &catalog).unwrap(),
            modern_snap
        );
    }

    #[test]
    fn without_legacy_flag_rubble_terrain_survives_as_is() {
        let catalog = legacy_catalog();
        let mut chunk = Chunk::new();
        let rubble = TerrainId(catalog.terrain.lookup("rubble").unwrap());
        chunk.set_terrain(TilePos::new(3, 3), rubble);
        let snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        let restored = snap.restore(&catalog, false).unwrap();
        assert_eq!(restored.terrain(TilePos::new(3, 3)), rubble);
        assert_eq!(restored.furniture(TilePos::new(3, 3)), FurnitureId::default());
    }

    #[test]
    fn restore_recomputes_lum_and_field_count() {
        let catalog = test_catalog();
        let chunk = populated_chunk(&catalog);
        let snap = ChunkSnapshot::capture(&chunk, &catalog).unwrap();
        let restored = snap.restore(&catalog, false).unwrap();
        assert_eq!(restored.lum(TilePos::new(2, 2)), 1);
        assert_eq!(restored.field_count(), 1);
        assert_eq!(restored.active_items().len(), 1);
    }
}
