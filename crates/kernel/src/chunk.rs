//! The chunk: one struct-of-arrays tile grid plus everything chunk-scoped:
//! the one-way uniformity flag, textual cosmetics, pending spawns, owned
//! vehicles/constructions/computer/camp, the active-item index, and the
//! aggregate field counter.
//!
//! # Invariants
//! - `uniform` starts true and flips to false on the first per-tile
//!   mutation; it is never recomputed back to true. While true, every grid
//!   cell is in its constructed default state.
//! - The lum column counts emissive items per tile exactly while the count
//!   stays under 255 and saturates at 255 above that; removal rescans only
//!   when the counter is pinned at 0 or the ceiling.
//! - Rotation moves every coordinate-keyed structure in lockstep with the
//!   grid: cosmetics, spawns, construction sites, active items, vehicles.

use std::collections::HashMap;

use glam::IVec3;
use gridfall_common::{CHUNK_EDGE, Catalog, FurnitureId, SimTime, TerrainId, TilePos, TrapId};
use serde::{Deserialize, Serialize};

use crate::active::ActiveItemIndex;
use crate::attach::{Basecamp, Computer, PartialCon, SpawnPoint, Vehicle};
use crate::field::Field;
use crate::grid::TileGrid;
use crate::items::{Item, ItemKey, ItemStack};

/// Category tag on a cosmetic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CosmeticKind {
    /// Free-form text scrawled on a tile.
    Graffiti,
    /// Text that becomes visible signage once signable furniture stands on
    /// the tile.
    Signage,
}

/// A coordinate-tagged text annotation. Chunks carry few of these, so
/// lookups scan the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cosmetic {
    pub pos: TilePos,
    pub kind: CosmeticKind,
    pub text: String,
}

/// A fixed-size square of world tiles with its own storage and metadata;
/// the unit of loading and saving.
///
/// Single-owner mutation model: no interior locking, exactly one logical
/// owner mutates a chunk at a time. The chunk exclusively owns its grid,
/// vehicles, constructions, computer, and camp; dropping the chunk drops
/// them all.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    grid: TileGrid<CHUNK_EDGE>,
    uniform: bool,
    cosmetics: Vec<Cosmetic>,
    active_items: ActiveItemIndex,
    field_count: u32,
    last_touched: SimTime,
    spawns: Vec<SpawnPoint>,
    vehicles: Vec<Vehicle>,
    constructions: HashMap<IVec3, PartialCon>,
    computer: Option<Computer>,
    camp: Basecamp,
    temperature: i32,
}

impl Chunk {
    /// A fresh, uniform chunk: every cell at its default, no metadata.
    pub fn new() -> Self {
        Self {
            grid: TileGrid::new(),
            uniform: true,
            cosmetics: Vec::new(),
            active_items: ActiveItemIndex::new(),
            field_count: 0,
            last_touched: SimTime::GENESIS,
            spawns: Vec::new(),
            vehicles: Vec::new(),
            constructions: HashMap::new(),
            computer: None,
            camp: Basecamp::default(),
            temperature: 0,
        }
    }

    /// Whether no per-tile mutation has ever run. A cheap necessary
    /// condition for "this chunk can be regenerated instead of saved";
    /// never flips back to true.
    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    // ---- per-tile features ------------------------------------------------

    pub fn terrain(&self, p: TilePos) -> TerrainId {
        self.grid.terrain(p)
    }

    pub fn set_terrain(&mut self, p: TilePos, id: TerrainId) {
        self.uniform = false;
        self.grid.set_terrain(p, id);
    }

    pub fn furniture(&self, p: TilePos) -> FurnitureId {
        self.grid.furniture(p)
    }

    pub fn set_furniture(&mut self, p: TilePos, id: FurnitureId) {
        self.uniform = false;
        self.grid.set_furniture(p, id);
    }

    pub fn trap(&self, p: TilePos) -> TrapId {
        self.grid.trap(p)
    }

    pub fn set_trap(&mut self, p: TilePos, id: TrapId) {
        self.uniform = false;
        self.grid.set_trap(p, id);
    }

    pub fn radiation(&self, p: TilePos) -> i32 {
        self.grid.radiation(p)
    }

    pub fn set_radiation(&mut self, p: TilePos, rad: i32) {
        self.uniform = false;
        self.grid.set_radiation(p, rad);
    }

    // ---- light accounting -------------------------------------------------

    /// Count of light-emitting items on the tile, saturating at 255.
    pub fn lum(&self, p: TilePos) -> u8 {
        self.grid.lum(p)
    }

    /// Account for an item about to sit on the tile.
    pub fn update_lum_add(&mut self, p: TilePos, item: &Item) {
        self.uniform = false;
        if item.is_emissive() && self.grid.lum(p) < u8::MAX {
            self.grid.set_lum(p, self.grid.lum(p) + 1);
        }
    }

    /// Account for an item about to leave the tile. Must run while the
    /// item is still present in the tile's stack.
    ///
    /// Fast path: a counter strictly between 0 and 255 is exact, so it
    /// just decrements. A counter pinned at the ceiling may undercount, so
    /// the stack is rescanned; if the true emitter count fits the counter
    /// again it is set to (count - 1), otherwise it stays at the ceiling,
    /// a deliberate lossy trade for the single-byte-per-tile footprint.
    pub fn update_lum_rem(&mut self, p: TilePos, item: &Item) {
        self.uniform = false;
        if !item.is_emissive() {
            return;
        }
        let lum = self.grid.lum(p);
        if lum > 0 && lum < u8::MAX {
            self.grid.set_lum(p, lum - 1);
            return;
        }
        tracing::trace!(x = p.x, y = p.y, lum, "lum counter pinned, rescanning stack");
        let count = self
            .grid
            .items(p)
            .iter()
            .filter(|(_, it)| it.is_emissive())
            .count();
        if count > 0 && count <= 256 {
            self.grid.set_lum(p, (count - 1) as u8);
        }
    }

    // ---- items ------------------------------------------------------------

    pub fn items(&self, p: TilePos) -> &ItemStack {
        self.grid.items(p)
    }

    pub fn item_count(&self, p: TilePos) -> usize {
        self.grid.items(p).len()
    }

    /// Drop an item onto the tile, updating light accounting and the
    /// active-item index.
    pub fn add_item(&mut self, p: TilePos, item: Item) -> ItemKey {
        self.update_lum_add(p, &item);
        let active = item.is_active();
        let key = self.grid.items_mut(p).insert(item);
        if active {
            self.active_items.insert(p, key);
        }
        key
    }

    /// Take an item off the tile by handle, updating light accounting and
    /// the active-item index. Returns `None` for a dead handle.
    pub fn remove_item(&mut self, p: TilePos, key: ItemKey) -> Option<Item> {
        let probe = self.grid.items(p).get(key)?.clone();
        self.update_lum_rem(p, &probe);
        self.active_items.remove(p, key);
        self.grid.items_mut(p).remove(key)
    }

    pub fn active_items(&self) -> &ActiveItemIndex {
        &self.active_items
    }

    // ---- fields -----------------------------------------------------------

    pub fn field(&self, p: TilePos) -> &Field {
        self.grid.field(p)
    }

    /// Mutable field access for the field engine. Counts as a per-tile
    /// mutation. The engine owns the removal path and reconciles
    /// [`Chunk::field_count`] itself; this core only counts insertions made
    /// through the tile view.
    pub fn field_mut(&mut self, p: TilePos) -> &mut Field {
        self.uniform = false;
        self.grid.field_mut(p)
    }

    /// Total distinct (tile, field-kind) insertions recorded, for fast
    /// "does this chunk have active fields" checks.
    pub fn field_count(&self) -> u32 {
        self.field_count
    }

    pub(crate) fn bump_field_count(&mut self) {
        self.field_count += 1;
    }

    // ---- cosmetics, graffiti, signage -------------------------------------

    /// Append a cosmetic record unconditionally; duplicates are allowed.
    pub fn insert_cosmetic(&mut self, pos: TilePos, kind: CosmeticKind, text: impl Into<String>) {
        self.cosmetics.push(Cosmetic {
            pos,
            kind,
            text: text.into(),
        });
    }

    /// First cosmetic text of `kind` at `pos`, if any.
    pub fn cosmetic_at(&self, pos: TilePos, kind: CosmeticKind) -> Option<&str> {
        self.cosmetics
            .iter()
            .find(|c| c.pos == pos && c.kind == kind)
            .map(|c| c.text.as_str())
    }

    /// Remove every cosmetic of `kind` at `pos`.
    pub fn delete_cosmetic(&mut self, pos: TilePos, kind: CosmeticKind) {
        self.cosmetics.retain(|c| !(c.pos == pos && c.kind == kind));
    }

    pub fn cosmetics(&self) -> &[Cosmetic] {
        &self.cosmetics
    }

    pub fn has_graffiti(&self, p: TilePos) -> bool {
        self.cosmetic_at(p, CosmeticKind::Graffiti).is_some()
    }

    pub fn graffiti(&self, p: TilePos) -> Option<&str> {
        self.cosmetic_at(p, CosmeticKind::Graffiti)
    }

    /// Write graffiti on the tile, replacing any existing text there.
    pub fn set_graffiti(&mut self, p: TilePos, text: impl Into<String>) {
        let text = text.into();
        match self
            .cosmetics
            .iter_mut()
            .find(|c| c.pos == p && c.kind == CosmeticKind::Graffiti)
        {
            Some(c) => c.text = text,
            None => self.insert_cosmetic(p, CosmeticKind::Graffiti, text),
        }
    }

    pub fn delete_graffiti(&mut self, p: TilePos) {
        self.delete_cosmetic(p, CosmeticKind::Graffiti);
    }

    /// Signage is the meeting of two conditions: signable furniture on the
    /// tile and stored signage text. Either may arrive first.
    pub fn has_signage(&self, p: TilePos, catalog: &Catalog) -> bool {
        let signable = catalog
            .furniture_def(self.furniture(p))
            .is_some_and(|def| def.signable);
        signable && self.cosmetic_at(p, CosmeticKind::Signage).is_some()
    }

    /// The composed signage text: the furniture's sign template with the
    /// stored text substituted at `%s`, or the stored text alone when the
    /// furniture has no template. `None` while either half is missing.
    pub fn signage(&self, p: TilePos, catalog: &Catalog) -> Option<String> {
        let def = catalog.furniture_def(self.furniture(p))?;
        if !def.signable {
            return None;
        }
        let text = self.cosmetic_at(p, CosmeticKind::Signage)?;
        Some(match &def.sign_text {
            Some(template) if template.contains("%s") => template.replace("%s", text),
            _ => text.to_owned(),
        })
    }

    /// Store signage text regardless of what furniture currently stands on
    /// the tile; it stays dormant until signable furniture arrives.
    pub fn set_signage(&mut self, p: TilePos, text: impl Into<String>) {
        let text = text.into();
        match self
            .cosmetics
            .iter_mut()
            .find(|c| c.pos == p && c.kind == CosmeticKind::Signage)
        {
            Some(c) => c.text = text,
            None => self.insert_cosmetic(p, CosmeticKind::Signage, text),
        }
    }

    /// Usable anytime, like [`Chunk::set_signage`].
    pub fn delete_signage(&mut self, p: TilePos) {
        self.delete_cosmetic(p, CosmeticKind::Signage);
    }

    // ---- spawns -----------------------------------------------------------

    pub fn add_spawn(&mut self, spawn: SpawnPoint) {
        self.spawns.push(spawn);
    }

    pub fn spawns(&self) -> &[SpawnPoint] {
        &self.spawns
    }

    /// Drain the pending spawns for the spawning system to realize.
    pub fn take_spawns(&mut self) -> Vec<SpawnPoint> {
        std::mem::take(&mut self.spawns)
    }

    // ---- vehicles ---------------------------------------------------------

    pub fn add_vehicle(&mut self, vehicle: Vehicle) {
        self.vehicles.push(vehicle);
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicles_mut(&mut self) -> &mut [Vehicle] {
        &mut self.vehicles
    }

    /// Whether `vehicle` is one of the vehicles this chunk owns, by
    /// reference identity, not value equality: two equal-looking carts are
    /// still two carts.
    pub fn contains_vehicle(&self, vehicle: &Vehicle) -> bool {
        self.vehicles.iter().any(|v| std::ptr::eq(v, vehicle))
    }

    /// Remove and return the vehicle at `index`, if it exists.
    pub fn remove_vehicle(&mut self, index: usize) -> Option<Vehicle> {
        (index < self.vehicles.len()).then(|| self.vehicles.remove(index))
    }

    // ---- constructions ----------------------------------------------------

    /// Record a construction in progress at `site`, replacing any previous
    /// record there.
    pub fn start_construction(&mut self, site: IVec3, con: PartialCon) {
        self.constructions.insert(site, con);
    }

    pub fn construction_at(&self, site: IVec3) -> Option<&PartialCon> {
        self.constructions.get(&site)
    }

    pub fn construction_at_mut(&mut self, site: IVec3) -> Option<&mut PartialCon> {
        self.constructions.get_mut(&site)
    }

    /// Remove the record at `site` on completion or cancellation.
    pub fn finish_construction(&mut self, site: IVec3) -> Option<PartialCon> {
        self.constructions.remove(&site)
    }

    pub fn constructions(&self) -> impl Iterator<Item = (&IVec3, &PartialCon)> {
        self.constructions.iter()
    }

    pub fn construction_count(&self) -> usize {
        self.constructions.len()
    }

    // ---- computer, camp ---------------------------------------------------

    pub fn computer(&self) -> Option<&Computer> {
        self.computer.as_ref()
    }

    pub fn computer_mut(&mut self) -> Option<&mut Computer> {
        self.computer.as_mut()
    }

    /// Install the chunk's single computer terminal, replacing any
    /// previous one.
    pub fn install_computer(&mut self, computer: Computer) {
        self.computer = Some(computer);
    }

    pub fn remove_computer(&mut self) -> Option<Computer> {
        self.computer.take()
    }

    pub fn camp(&self) -> &Basecamp {
        &self.camp
    }

    pub fn camp_mut(&mut self) -> &mut Basecamp {
        &mut self.camp
    }

    pub fn set_camp(&mut self, camp: Basecamp) {
        self.camp = camp;
    }

    /// Reset the camp to its empty state.
    pub fn clear_camp(&mut self) {
        self.camp = Basecamp::default();
    }

    // ---- chunk-wide metadata ----------------------------------------------

    pub fn temperature(&self) -> i32 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: i32) {
        self.temperature = temperature;
    }

    pub fn last_touched(&self) -> SimTime {
        self.last_touched
    }

    pub fn set_last_touched(&mut self, when: SimTime) {
        self.last_touched = when;
    }

    // ---- rotation ---------------------------------------------------------

    /// Rotate the chunk by `turns` clockwise quarter turns: the tile grid,
    /// and every coordinate-keyed side structure with it. Leaving any of
    /// them behind would silently tear content away from its coordinates,
    /// so they all remap here or nowhere.
    pub fn rotate(&mut self, turns: i32) {
        let t = turns.rem_euclid(4);
        if t == 0 {
            return;
        }
        self.grid.rotate(t);
        for cosmetic in &mut self.cosmetics {
            cosmetic.pos = cosmetic.pos.rotated(t);
        }
        for spawn in &mut self.spawns {
            spawn.pos = spawn.pos.rotated(t);
        }
        for vehicle in &mut self.vehicles {
            vehicle.rotate(t);
        }
        self.active_items.rotate(t);
        let constructions = std::mem::take(&mut self.constructions);
        self.constructions = constructions
            .into_iter()
            .map(|(site, con)| (rotated_site(site, t), con))
            .collect();
    }

    // ---- raw grid access for the swap primitive ---------------------------

    /// Exchange the full per-cell bundle between two coordinates.
    pub fn swap_tiles(&mut self, p1: TilePos, p2: TilePos) {
        if p1 == p2 {
            return;
        }
        self.uniform = false;
        self.grid.swap_tiles(p1, p2);
    }

    /// Exchange one cell's bundle with a detached single-cell grid.
    pub fn swap_tile_with(&mut self, p: TilePos, other: &mut TileGrid<1>) {
        self.uniform = false;
        self.grid.swap_with(p, other);
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

/// Construction sites are keyed by a 3D position whose x/y live in chunk
/// space; rotation remaps them with the same quarter-turn mapping as tiles
/// and leaves the level untouched.
fn rotated_site(site: IVec3, turns: i32) -> IVec3 {
    let n = CHUNK_EDGE as i32;
    let mut s = site;
    for _ in 0..turns.rem_euclid(4) {
        s = IVec3::new(n - 1 - s.y, s.x, s.z);
    }
    s
}
