use serde::{Deserialize, Serialize};

/// Edge length of a square chunk, in tiles. Chunks are always
/// `CHUNK_EDGE` x `CHUNK_EDGE`; the value is even, which the in-place
/// rotation in the kernel relies on.
pub const CHUNK_EDGE: usize = 12;

/// A local coordinate inside a chunk, in `0..CHUNK_EDGE` on both axes.
///
/// Positions are produced by callers that have already translated a world
/// coordinate into (chunk, local) form; storage code trusts them and does
/// no bounds checking of its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TilePos {
    pub x: u8,
    pub y: u8,
}

impl TilePos {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Linear index in x-major cell order (all of column x before x+1).
    pub const fn linear(self) -> usize {
        self.x as usize * CHUNK_EDGE + self.y as usize
    }

    /// Inverse of [`TilePos::linear`].
    pub const fn from_linear(idx: usize) -> Self {
        Self {
            x: (idx / CHUNK_EDGE) as u8,
            y: (idx % CHUNK_EDGE) as u8,
        }
    }

    /// This position after rotating the chunk by `turns` clockwise
    /// quarter turns. Every coordinate-keyed structure in a chunk uses the
    /// same mapping, so rotation moves them in lockstep with the tile grid.
    pub fn rotated(self, turns: i32) -> Self {
        let n = CHUNK_EDGE as u8;
        let mut p = self;
        for _ in 0..turns.rem_euclid(4) {
            p = Self {
                x: n - 1 - p.y,
                y: p.x,
            };
        }
        p
    }
}

/// Terrain identifier. Id 0 is the null terrain a fresh chunk is filled with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TerrainId(pub u16);

/// Furniture identifier. Id 0 means no furniture.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FurnitureId(pub u16);

/// Trap identifier. Id 0 means no trap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TrapId(pub u16);

/// Field kind identifier (smoke, fire, gas...). Owned by the field engine;
/// this core stores and counts entries per kind without interpreting them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FieldKind(pub u16);

/// A point in simulated time, counted in turns since the start of the
/// simulated era.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimTime(pub u64);

impl SimTime {
    /// The fixed epoch every chunk's `last_touched` starts at.
    pub const GENESIS: Self = Self(0);
}

/// A span of simulated time, in turns. Field entries age in these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimDuration(pub u64);
