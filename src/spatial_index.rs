//! Screen-space index over marker bounding boxes.
//!
//! Backed by an R*-tree of rectangles so that rectangle/rectangle intersection is
//! answered directly. Entries are keyed by the slot of their view state within the
//! current overlap pass.

use mapoverlay_types::ScreenRect;
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Rectangle stored in the R*-tree, tagged with the owning slot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub slot: usize,
}

impl IndexedRect {
    fn new(rect: &ScreenRect, slot: usize) -> Self {
        Self {
            min_x: rect.min_x(),
            min_y: rect.min_y(),
            max_x: rect.max_x(),
            max_y: rect.max_y(),
            slot,
        }
    }
}

impl RTreeObject for IndexedRect {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Index record binding an annotation to the rectangles registered for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub slot: usize,
    pub handles: SmallVec<[IndexedRect; 1]>,
}

/// Mutable 2D index with insert, remove and intersection queries.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexedRect>,
    // Registered rectangles per slot, for removal by slot
    entries: FxHashMap<usize, Entry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rect` for `slot`, replacing any previous entry of that slot.
    ///
    /// Returns the new entry, or `None` when the rectangle is rejected.
    pub fn insert(&mut self, id: &str, slot: usize, rect: ScreenRect) -> Option<&Entry> {
        self.remove(slot);

        if !rect.is_finite() || rect.width < 0.0 || rect.height < 0.0 {
            log::warn!("Rejecting bounding box for '{}' with invalid coordinates", id);
            return None;
        }

        let indexed = IndexedRect::new(&rect, slot);
        self.tree.insert(indexed.clone());

        let mut handles = SmallVec::new();
        handles.push(indexed);
        self.entries.insert(
            slot,
            Entry {
                id: id.to_string(),
                slot,
                handles,
            },
        );
        self.entries.get(&slot)
    }

    /// Remove every rectangle registered for `slot`.
    pub fn remove(&mut self, slot: usize) -> Option<Entry> {
        let entry = self.entries.remove(&slot)?;
        for handle in &entry.handles {
            self.tree.remove(handle);
        }
        Some(entry)
    }

    /// Slots whose rectangle intersects `rect`, touching edges included.
    ///
    /// Results are sorted ascending and contain each slot once.
    pub fn query(&self, rect: &ScreenRect) -> SmallVec<[usize; 8]> {
        if !rect.is_finite() {
            log::warn!("Rejecting bounding box query with non-finite coordinates");
            return SmallVec::new();
        }

        let envelope = AABB::from_corners([rect.min_x(), rect.min_y()], [rect.max_x(), rect.max_y()]);
        let mut slots: SmallVec<[usize; 8]> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|indexed| indexed.slot)
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    pub fn entry(&self, slot: usize) -> Option<&Entry> {
        self.entries.get(&slot)
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.entries.contains_key(&slot)
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_query() {
        let mut index = SpatialIndex::new();
        index.insert("a", 0, ScreenRect::new(0.0, 0.0, 10.0, 10.0));
        index.insert("b", 1, ScreenRect::new(5.0, 5.0, 10.0, 10.0));
        index.insert("c", 2, ScreenRect::new(100.0, 100.0, 10.0, 10.0));

        let hits = index.query(&ScreenRect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(hits.as_slice(), &[0, 1]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.entry(2).map(|e| e.id.as_str()), Some("c"));
    }

    #[test]
    fn test_touching_edges_are_reported() {
        let mut index = SpatialIndex::new();
        index.insert("a", 0, ScreenRect::new(10.0, 0.0, 10.0, 10.0));
        let hits = index.query(&ScreenRect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(hits.as_slice(), &[0]);
    }

    #[test]
    fn test_reinsert_replaces_entry() {
        let mut index = SpatialIndex::new();
        index.insert("a", 0, ScreenRect::new(0.0, 0.0, 10.0, 10.0));
        index.insert("a", 0, ScreenRect::new(50.0, 50.0, 10.0, 10.0));

        assert_eq!(index.len(), 1);
        assert!(index.query(&ScreenRect::new(0.0, 0.0, 5.0, 5.0)).is_empty());
        assert_eq!(
            index.query(&ScreenRect::new(55.0, 55.0, 1.0, 1.0)).as_slice(),
            &[0]
        );
    }

    #[test]
    fn test_remove_leaves_no_stale_handles() {
        let mut index = SpatialIndex::new();
        index.insert("a", 0, ScreenRect::new(0.0, 0.0, 10.0, 10.0));
        let removed = index.remove(0).unwrap();
        assert_eq!(removed.handles.len(), 1);
        assert!(index.remove(0).is_none());
        assert!(index.query(&ScreenRect::new(0.0, 0.0, 10.0, 10.0)).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut index = SpatialIndex::new();
        assert!(index
            .insert("a", 0, ScreenRect::new(f64::NAN, 0.0, 10.0, 10.0))
            .is_none());
        assert!(index.is_empty());
        assert!(index
            .query(&ScreenRect::new(0.0, f64::INFINITY, 1.0, 1.0))
            .is_empty());
    }

    #[test]
    fn test_clear() {
        let mut index = SpatialIndex::new();
        for slot in 0..20 {
            index.insert("x", slot, ScreenRect::new(slot as f64, 0.0, 5.0, 5.0));
        }
        index.clear();
        assert!(index.is_empty());
        assert!(index.query(&ScreenRect::new(0.0, 0.0, 100.0, 100.0)).is_empty());
    }
}
