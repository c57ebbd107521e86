//! Chunk storage core: struct-of-arrays tile grid, the chunk that owns it,
//! and transient per-tile views.
//!
//! # Invariants
//! - One logical owner mutates a chunk at a time; there is no internal
//!   locking and no async surface.
//! - A chunk exclusively owns its grid, vehicles, constructions, computer,
//!   and camp; dropping the chunk drops them all.
//! - Coordinates are pre-validated by callers; storage indexes directly.

pub mod active;
pub mod attach;
pub mod chunk;
pub mod field;
pub mod grid;
pub mod items;
pub mod tile;

pub use active::{ActiveItemIndex, ActiveItemRef};
pub use attach::{Basecamp, Computer, PartialCon, SpawnPoint, Vehicle};
pub use chunk::{Chunk, Cosmetic, CosmeticKind};
pub use field::{Field, FieldEntry, MAX_FIELD_INTENSITY};
pub use grid::TileGrid;
pub use items::{Item, ItemKey, ItemStack};
pub use tile::{TileView, TileViewMut};
