//! Pending change operations of a view state.
//!
//! A view state keeps at most one [`Delta`] per [`OpKind`]. Recomputing an attribute
//! overwrites its slot, so applying the set is idempotent no matter how often the
//! desired state was recomputed in between.

use crate::surface::MarkerImage;
use mapoverlay_types::{Anchor, Color, GeoBounds, GeoPoint, ImageData, Path};

/// Operation kinds, declared in the order they are applied to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    MarkerAnchor,
    MarkerIcon,
    MarkerVisibility,
    MarkerPosition,
    MarkerClickable,
    InfoWindow,
    PolygonStrokeWidth,
    PolygonFillColor,
    PolygonStrokeColor,
    PolygonVisibility,
    PolygonGeometry,
    PolygonClickable,
    FloorPlanStrokeWidth,
    FloorPlanStrokeColor,
    FloorPlanFillColor,
    FloorPlanVisibility,
    FloorPlanGeometry,
    Model2DImage,
    Model2DBearing,
    Model2DVisibility,
    Model2DPosition,
    Model2DClickable,
}

impl OpKind {
    pub const COUNT: usize = 22;

    /// Every kind in apply order.
    pub const ALL: [OpKind; OpKind::COUNT] = [
        OpKind::MarkerAnchor,
        OpKind::MarkerIcon,
        OpKind::MarkerVisibility,
        OpKind::MarkerPosition,
        OpKind::MarkerClickable,
        OpKind::InfoWindow,
        OpKind::PolygonStrokeWidth,
        OpKind::PolygonFillColor,
        OpKind::PolygonStrokeColor,
        OpKind::PolygonVisibility,
        OpKind::PolygonGeometry,
        OpKind::PolygonClickable,
        OpKind::FloorPlanStrokeWidth,
        OpKind::FloorPlanStrokeColor,
        OpKind::FloorPlanFillColor,
        OpKind::FloorPlanVisibility,
        OpKind::FloorPlanGeometry,
        OpKind::Model2DImage,
        OpKind::Model2DBearing,
        OpKind::Model2DVisibility,
        OpKind::Model2DPosition,
        OpKind::Model2DClickable,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Which polygon-like facet an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonLayer {
    Polygon,
    FloorPlan,
}

/// Styling and geometry changes shared by polygons and floor plans.
#[derive(Debug, Clone, PartialEq)]
pub enum PolygonDelta {
    StrokeWidth(f64),
    FillColor(Color),
    StrokeColor(Color),
    Visibility(bool),
    Geometry(Vec<Path>),
}

/// Ground image of a 2D model, ready to hand to the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayImage {
    pub image: ImageData,
    pub bounds: Option<GeoBounds>,
    /// Largest edge the surface should display the image at, in pixels.
    pub max_dimension: f64,
}

/// Ground and info-window anchors of a marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerAnchors {
    pub ground: Anchor,
    pub info_window: Anchor,
}

impl Default for MarkerAnchors {
    fn default() -> Self {
        Self {
            ground: Anchor::CENTER,
            info_window: Anchor::new(0.5, 0.0),
        }
    }
}

/// A single pending change, carrying the value to push.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    MarkerAnchor(MarkerAnchors),
    MarkerIcon(Option<MarkerImage>),
    MarkerVisibility(bool),
    MarkerPosition(GeoPoint),
    MarkerClickable(bool),
    InfoWindow(bool),
    Polygon(PolygonLayer, PolygonDelta),
    PolygonClickable(bool),
    Model2DImage(Option<OverlayImage>),
    Model2DBearing(f64),
    Model2DVisibility(bool),
    Model2DPosition(GeoPoint),
    Model2DClickable(bool),
}

impl Delta {
    pub fn kind(&self) -> OpKind {
        match self {
            Delta::MarkerAnchor(_) => OpKind::MarkerAnchor,
            Delta::MarkerIcon(_) => OpKind::MarkerIcon,
            Delta::MarkerVisibility(_) => OpKind::MarkerVisibility,
            Delta::MarkerPosition(_) => OpKind::MarkerPosition,
            Delta::MarkerClickable(_) => OpKind::MarkerClickable,
            Delta::InfoWindow(_) => OpKind::InfoWindow,
            Delta::Polygon(PolygonLayer::Polygon, op) => match op {
                PolygonDelta::StrokeWidth(_) => OpKind::PolygonStrokeWidth,
                PolygonDelta::FillColor(_) => OpKind::PolygonFillColor,
                PolygonDelta::StrokeColor(_) => OpKind::PolygonStrokeColor,
                PolygonDelta::Visibility(_) => OpKind::PolygonVisibility,
                PolygonDelta::Geometry(_) => OpKind::PolygonGeometry,
            },
            Delta::Polygon(PolygonLayer::FloorPlan, op) => match op {
                PolygonDelta::StrokeWidth(_) => OpKind::FloorPlanStrokeWidth,
                PolygonDelta::FillColor(_) => OpKind::FloorPlanFillColor,
                PolygonDelta::StrokeColor(_) => OpKind::FloorPlanStrokeColor,
                PolygonDelta::Visibility(_) => OpKind::FloorPlanVisibility,
                PolygonDelta::Geometry(_) => OpKind::FloorPlanGeometry,
            },
            Delta::PolygonClickable(_) => OpKind::PolygonClickable,
            Delta::Model2DImage(_) => OpKind::Model2DImage,
            Delta::Model2DBearing(_) => OpKind::Model2DBearing,
            Delta::Model2DVisibility(_) => OpKind::Model2DVisibility,
            Delta::Model2DPosition(_) => OpKind::Model2DPosition,
            Delta::Model2DClickable(_) => OpKind::Model2DClickable,
        }
    }
}

/// Fixed-size set of pending deltas, one slot per [`OpKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSet {
    slots: [Option<Delta>; OpKind::COUNT],
}

impl Default for DeltaSet {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl DeltaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `delta`, replacing whatever was pending for its kind.
    pub fn put(&mut self, delta: Delta) {
        let slot = delta.kind().index();
        self.slots[slot] = Some(delta);
    }

    pub fn remove(&mut self, kind: OpKind) -> Option<Delta> {
        self.slots[kind.index()].take()
    }

    pub fn get(&self, kind: OpKind) -> Option<&Delta> {
        self.slots[kind.index()].as_ref()
    }

    pub fn contains(&self, kind: OpKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Pending kinds in apply order.
    pub fn kinds(&self) -> Vec<OpKind> {
        OpKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.contains(*kind))
            .collect()
    }

    /// Take every pending delta in apply order, leaving the set empty.
    pub fn drain(&mut self) -> impl Iterator<Item = Delta> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
