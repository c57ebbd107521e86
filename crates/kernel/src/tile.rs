//! Transient per-tile views. A view binds a chunk reference to one local
//! coordinate so callers that already resolved bounds once (the grid
//! manager translating a world coordinate into chunk + local form) can
//! touch every feature of that tile without repeating the resolution.
//!
//! Views own nothing and are never stored: they are built for a call and
//! dropped. The borrow checker enforces that they cannot outlive, or
//! overlap mutation of, the chunk they point into.

use gridfall_common::{
    Catalog, FieldKind, FurnitureDef, FurnitureId, SimDuration, TerrainDef, TerrainId, TilePos,
    TrapDef, TrapId,
};

use crate::chunk::Chunk;
use crate::field::{Field, FieldEntry};
use crate::items::{Item, ItemKey};

/// Read-only view of one tile. Construction performs no bounds check: the
/// coordinate is already known to be in-bounds for this chunk.
#[derive(Clone, Copy, Debug)]
pub struct TileView<'a> {
    chunk: &'a Chunk,
    pos: TilePos,
}

impl<'a> TileView<'a> {
    pub fn new(chunk: &'a Chunk, pos: TilePos) -> Self {
        Self { chunk, pos }
    }

    pub fn pos(&self) -> TilePos {
        self.pos
    }

    pub fn terrain(&self) -> TerrainId {
        self.chunk.terrain(self.pos)
    }

    pub fn furniture(&self) -> FurnitureId {
        self.chunk.furniture(self.pos)
    }

    pub fn trap(&self) -> TrapId {
        self.chunk.trap(self.pos)
    }

    pub fn radiation(&self) -> i32 {
        self.chunk.radiation(self.pos)
    }

    pub fn lum(&self) -> u8 {
        self.chunk.lum(self.pos)
    }

    /// Resolve the tile's terrain to its catalog record.
    pub fn terrain_info<'c>(&self, catalog: &'c Catalog) -> Option<&'c TerrainDef> {
        catalog.terrain_def(self.terrain())
    }

    pub fn furniture_info<'c>(&self, catalog: &'c Catalog) -> Option<&'c FurnitureDef> {
        catalog.furniture_def(self.furniture())
    }

    pub fn trap_info<'c>(&self, catalog: &'c Catalog) -> Option<&'c TrapDef> {
        catalog.trap_def(self.trap())
    }

    pub fn field(&self) -> &'a Field {
        self.chunk.field(self.pos)
    }

    pub fn find_field(&self, kind: FieldKind) -> Option<&'a FieldEntry> {
        self.chunk.field(self.pos).find(kind)
    }

    pub fn has_graffiti(&self) -> bool {
        self.chunk.has_graffiti(self.pos)
    }

    pub fn graffiti(&self) -> Option<&'a str> {
        self.chunk.graffiti(self.pos)
    }

    pub fn has_signage(&self, catalog: &Catalog) -> bool {
        self.chunk.has_signage(self.pos, catalog)
    }

    pub fn signage(&self, catalog: &Catalog) -> Option<String> {
        self.chunk.signage(self.pos, catalog)
    }

    pub fn item_count(&self) -> usize {
        self.chunk.item_count(self.pos)
    }

    /// The most recently inserted item on the tile.
    ///
    /// # Panics
    /// The tile's stack must be non-empty; callers check `item_count`
    /// first.
    pub fn uppermost_item(&self) -> &'a Item {
        self.chunk
            .items(self.pos)
            .top()
            .expect("uppermost_item on a tile with no items")
    }
}

/// Views are equal when they name the same tile of the same chunk value in
/// memory.
impl PartialEq for TileView<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.chunk, other.chunk) && self.pos == other.pos
    }
}

/// Mutating view of one tile. Same contract as [`TileView`], plus the
/// write half of the per-tile surface.
pub struct TileViewMut<'a> {
    chunk: &'a mut Chunk,
    pos: TilePos,
}

impl<'a> TileViewMut<'a> {
    pub fn new(chunk: &'a mut Chunk, pos: TilePos) -> Self {
        Self { chunk, pos }
    }

    pub fn pos(&self) -> TilePos {
        self.pos
    }

    pub fn terrain(&self) -> TerrainId {
        self.chunk.terrain(self.pos)
    }

    pub fn set_terrain(&mut self, id: TerrainId) {
        self.chunk.set_terrain(self.pos, id);
    }

    pub fn furniture(&self) -> FurnitureId {
        self.chunk.furniture(self.pos)
    }

    pub fn set_furniture(&mut self, id: FurnitureId) {
        self.chunk.set_furniture(self.pos, id);
    }

    pub fn trap(&self) -> TrapId {
        self.chunk.trap(self.pos)
    }

    pub fn set_trap(&mut self, id: TrapId) {
        self.chunk.set_trap(self.pos, id);
    }

    pub fn radiation(&self) -> i32 {
        self.chunk.radiation(self.pos)
    }

    pub fn set_radiation(&mut self, rad: i32) {
        self.chunk.set_radiation(self.pos, rad);
    }

    pub fn lum(&self) -> u8 {
        self.chunk.lum(self.pos)
    }

    pub fn field(&self) -> &Field {
        self.chunk.field(self.pos)
    }

    pub fn find_field(&self, kind: FieldKind) -> Option<&FieldEntry> {
        self.chunk.field(self.pos).find(kind)
    }

    /// Add a field to the tile, counting the insertion at the chunk level
    /// when the kind is new. This is the path that keeps the chunk's
    /// field counter in step with the grid.
    pub fn add_field(&mut self, kind: FieldKind, intensity: i32, age: SimDuration) -> bool {
        let added = self.chunk.field_mut(self.pos).add(kind, intensity, age);
        if added {
            self.chunk.bump_field_count();
        }
        added
    }

    pub fn item_count(&self) -> usize {
        self.chunk.item_count(self.pos)
    }

    pub fn add_item(&mut self, item: Item) -> ItemKey {
        self.chunk.add_item(self.pos, item)
    }

    pub fn remove_item(&mut self, key: ItemKey) -> Option<Item> {
        self.chunk.remove_item(self.pos, key)
    }

    /// See [`TileView::uppermost_item`].
    ///
    /// # Panics
    /// The tile's stack must be non-empty.
    pub fn uppermost_item(&self) -> &Item {
        self.chunk
            .items(self.pos)
            .top()
            .expect("uppermost_item on a tile with no items")
    }
}
