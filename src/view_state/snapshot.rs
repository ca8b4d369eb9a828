//! Immutable, shareable copies of a view state's applied values.

use super::state::{FacetState, MarkerState};
use mapoverlay_types::{Anchor, GeoPoint, ScreenRect};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// What was last pushed to the surface for one annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub id: String,
    pub marker_state: MarkerState,
    pub position: Option<GeoPoint>,
    pub anchor: Anchor,
    /// Screen box of the marker under the projection of the frame that published it.
    pub bounds: Option<ScreenRect>,
    pub info_window_shown: bool,
    pub info_window_text: Option<String>,
    pub polygon_state: FacetState,
    pub polygon_rings: usize,
    pub floor_plan_state: FacetState,
    pub floor_plan_rings: usize,
    pub model_2d_state: FacetState,
    pub force_render: bool,
    pub poi_area: f64,
    pub last_seen: Duration,
    /// Set once the view state has released its native objects for good.
    pub destroyed: bool,
}

impl ViewSnapshot {
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            marker_state: MarkerState::Undefined,
            position: None,
            anchor: Anchor::CENTER,
            bounds: None,
            info_window_shown: false,
            info_window_text: None,
            polygon_state: FacetState::Undefined,
            polygon_rings: 0,
            floor_plan_state: FacetState::Undefined,
            floor_plan_rings: 0,
            model_2d_state: FacetState::Undefined,
            force_render: false,
            poi_area: 0.0,
            last_seen: Duration::ZERO,
            destroyed: false,
        }
    }

    pub fn is_marker_visible(&self) -> bool {
        self.marker_state.is_visible()
    }
}

/// Read handle to the latest published [`ViewSnapshot`] of one view state.
///
/// Loading never blocks on the renderer; it only clones an `Arc`.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    slot: Arc<RwLock<Arc<ViewSnapshot>>>,
}

impl SnapshotReader {
    pub(crate) fn new(initial: ViewSnapshot) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub fn load(&self) -> Arc<ViewSnapshot> {
        Arc::clone(&self.slot.read())
    }

    pub(crate) fn publish(&self, snapshot: ViewSnapshot) {
        *self.slot.write() = Arc::new(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_publish_replaces_snapshot() {
        let reader = SnapshotReader::new(ViewSnapshot::empty("a"));
        let before = reader.load();

        let mut next = ViewSnapshot::empty("a");
        next.marker_state = MarkerState::VisibleIcon;
        reader.publish(next);

        assert_eq!(before.marker_state, MarkerState::Undefined);
        assert!(reader.load().is_marker_visible());
    }

    #[test]
    fn test_reader_shared_across_threads() {
        let reader = SnapshotReader::new(ViewSnapshot::empty("a"));
        let other = reader.clone();

        let handle = thread::spawn(move || {
            for _ in 0..100 {
                assert_eq!(other.load().id, "a");
            }
        });
        for area in 0..100 {
            let mut snapshot = ViewSnapshot::empty("a");
            snapshot.poi_area = area as f64;
            reader.publish(snapshot);
        }
        handle.join().unwrap();
        assert_eq!(reader.load().poi_area, 99.0);
    }
}
