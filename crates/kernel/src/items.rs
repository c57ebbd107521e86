use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable handle to one item in a tile's stack. Keys survive unrelated
    /// insertions and removals in the same stack.
    pub struct ItemKey;
}

/// An item as this core stores it.
///
/// The full item model (containers, charges logic, damage) belongs to the
/// item subsystem; storage only needs to hold the value, ask whether it
/// emits light, and whether it wants per-turn processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub kind: String,
    pub emissive: bool,
    pub active: bool,
    pub charges: u32,
}

impl Item {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            emissive: false,
            active: false,
            charges: 0,
        }
    }

    /// An item that emits light while it sits on the ground.
    pub fn emissive(kind: impl Into<String>) -> Self {
        Self {
            emissive: true,
            ..Self::new(kind)
        }
    }

    pub fn is_emissive(&self) -> bool {
        self.emissive
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Per-tile item collection.
///
/// Items live in a slot map so handles stay valid across unrelated
/// mutations; a parallel key vector preserves insertion order, which makes
/// the most-recently-inserted ("topmost") item an O(1) read.
#[derive(Debug, Clone, Default)]
pub struct ItemStack {
    items: SlotMap<ItemKey, Item>,
    order: Vec<ItemKey>,
}

impl ItemStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item on top of the stack and return its handle.
    pub fn insert(&mut self, item: Item) -> ItemKey {
        let key = self.items.insert(item);
        self.order.push(key);
        key
    }

    /// Remove an item by handle. Returns the item if the handle was live.
    pub fn remove(&mut self, key: ItemKey) -> Option<Item> {
        let item = self.items.remove(key)?;
        self.order.retain(|&k| k != key);
        Some(item)
    }

    pub fn get(&self, key: ItemKey) -> Option<&Item> {
        self.items.get(key)
    }

    pub fn get_mut(&mut self, key: ItemKey) -> Option<&mut Item> {
        self.items.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The most recently inserted item still present, without scanning.
    pub fn top(&self) -> Option<&Item> {
        self.order.last().map(|&k| &self.items[k])
    }

    pub fn top_key(&self) -> Option<ItemKey> {
        self.order.last().copied()
    }

    /// Iterate items bottom to top in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemKey, &Item)> {
        self.order.iter().map(|&k| (k, &self.items[k]))
    }
}

/// Stacks compare by item values in stack order; the slot keys themselves
/// are incidental and differ across e.g. a persistence round trip.
impl PartialEq for ItemStack {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .map(|(_, item)| item)
                .eq(other.iter().map(|(_, item)| item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_len() {
        let mut stack = ItemStack::new();
        let a = stack.insert(Item::new("rock"));
        let b = stack.insert(Item::new("stick"));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.remove(a).unwrap().kind, "rock");
        assert_eq!(stack.len(), 1);
        assert!(stack.get(b).is_some());
        assert!(stack.remove(a).is_none());
    }

    #[test]
    fn top_is_most_recent_survivor() {
        let mut stack = ItemStack::new();
        stack.insert(Item::new("rock"));
        let b = stack.insert(Item::new("stick"));
        let c = stack.insert(Item::new("rag"));
        assert_eq!(stack.top().unwrap().kind, "rag");
        stack.remove(c);
        assert_eq!(stack.top().unwrap().kind, "stick");
        stack.remove(b);
        assert_eq!(stack.top().unwrap().kind, "rock");
    }

    #[test]
    fn keys_survive_sibling_mutation() {
        let mut stack = ItemStack::new();
        let a = stack.insert(Item::new("rock"));
        let b = stack.insert(Item::new("stick"));
        stack.remove(a);
        stack.insert(Item::new("rag"));
        assert_eq!(stack.get(b).unwrap().kind, "stick");
    }

    #[test]
    fn equality_ignores_keys() {
        let mut a = ItemStack::new();
        let mut b = ItemStack::new();
        // Different key histories, same surviving items in the same order.
        let k = a.insert(Item::new("junk"));
        a.remove(k);
        a.insert(Item::new("rock"));
        a.insert(Item::new("stick"));
        b.insert(Item::new("rock"));
        b.insert(Item::new("stick"));
        assert_eq!(a, b);
        b.insert(Item::new("rag"));
        assert_ne!(a, b);
    }
}
