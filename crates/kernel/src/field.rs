use gridfall_common::{FieldKind, SimDuration};
use serde::{Deserialize, Serialize};

/// Highest intensity a field entry can reach.
pub const MAX_FIELD_INTENSITY: i32 = 3;

/// One field layered on a tile: a kind plus its intensity and age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub kind: FieldKind,
    pub intensity: i32,
    pub age: SimDuration,
}

/// The fields present on one tile, at most one entry per kind.
///
/// Tiles rarely carry more than a couple of overlapping fields, so entries
/// sit in a small vector and lookups scan it. Diffusion and decay belong to
/// the field engine; this container only stores entries and reports whether
/// an add introduced a new kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    entries: Vec<FieldEntry>,
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, kind: FieldKind) -> Option<&FieldEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn find_mut(&mut self, kind: FieldKind) -> Option<&mut FieldEntry> {
        self.entries.iter_mut().find(|e| e.kind == kind)
    }

    /// Add a field of `kind`. Returns true only when the kind was not
    /// already present; an existing entry has its intensity raised (capped
    /// at [`MAX_FIELD_INTENSITY`]) and keeps its age.
    pub fn add(&mut self, kind: FieldKind, intensity: i32, age: SimDuration) -> bool {
        if let Some(entry) = self.find_mut(kind) {
            entry.intensity = (entry.intensity + intensity).min(MAX_FIELD_INTENSITY);
            return false;
        }
        self.entries.push(FieldEntry {
            kind,
            intensity: intensity.min(MAX_FIELD_INTENSITY),
            age,
        });
        true
    }

    /// Remove the entry of `kind`, if present.
    pub fn remove(&mut self, kind: FieldKind) -> Option<FieldEntry> {
        let idx = self.entries.iter().position(|e| e.kind == kind)?;
        Some(self.entries.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
