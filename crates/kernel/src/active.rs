use gridfall_common::TilePos;

use crate::items::ItemKey;

/// Location of one active item inside the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveItemRef {
    pub pos: TilePos,
    pub key: ItemKey,
}

/// Index of items that want per-turn processing, so the simulation loop can
/// visit them without sweeping every tile's stack.
///
/// Maintained by [`Chunk::add_item`]/[`Chunk::remove_item`]; chunks carry
/// few active items, so a flat vector with linear removal is enough.
///
/// [`Chunk::add_item`]: crate::chunk::Chunk::add_item
/// [`Chunk::remove_item`]: crate::chunk::Chunk::remove_item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveItemIndex {
    entries: Vec<ActiveItemRef>,
}

impl ActiveItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active item. Re-registering the same (pos, key) is a
    /// no-op.
    pub fn insert(&mut self, pos: TilePos, key: ItemKey) {
        if !self.contains(pos, key) {
            self.entries.push(ActiveItemRef { pos, key });
        }
    }

    pub fn remove(&mut self, pos: TilePos, key: ItemKey) {
        self.entries.retain(|e| !(e.pos == pos && e.key == key));
    }

    pub fn contains(&self, pos: TilePos, key: ItemKey) -> bool {
        self.entries.iter().any(|e| e.pos == pos && e.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveItemRef> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remap every entry's position for a chunk rotation. Item keys stay
    /// valid because stacks move between cells wholesale.
    pub fn rotate(&mut self, turns: i32) {
        for entry in &mut self.entries {
            entry.pos = entry.pos.rotated(turns);
        }
    }
}
