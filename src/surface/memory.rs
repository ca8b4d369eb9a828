//! In-memory rendering surface for headless use and tests.

use super::{
    Handle, MarkerImage, Primitive, PrimitiveKind, Projection, PropertyKind, RenderSurface,
    VisibleRegion, VisualProperty,
};
use mapoverlay_types::{Anchor, Color, GeoBounds, GeoPoint, ImageData, Path, ScreenPoint};
use geo::Point;
use rustc_hash::FxHashMap;

/// Affine projection: `screen = (coordinate - origin) * scale`.
///
/// Screen y grows with latitude, which keeps test fixtures readable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearProjection {
    origin: GeoPoint,
    scale: f64,
    zoom: f64,
    viewport_width: f64,
    viewport_height: f64,
}

impl LinearProjection {
    pub fn new(origin: GeoPoint, scale: f64, zoom: f64) -> Self {
        Self {
            origin,
            scale,
            zoom,
            viewport_width: 1024.0,
            viewport_height: 768.0,
        }
    }

    /// Maps `(x, y)` degrees straight to `(x, y)` pixels.
    pub fn identity() -> Self {
        Self::new(Point::new(0.0, 0.0), 1.0, 21.0)
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    fn coordinate_for(&self, point: ScreenPoint) -> GeoPoint {
        Point::new(
            self.origin.x() + point.x / self.scale,
            self.origin.y() + point.y / self.scale,
        )
    }
}

impl Default for LinearProjection {
    fn default() -> Self {
        Self::identity()
    }
}

impl Projection for LinearProjection {
    fn point_for(&self, coordinate: GeoPoint) -> ScreenPoint {
        ScreenPoint::new(
            (coordinate.x() - self.origin.x()) * self.scale,
            (coordinate.y() - self.origin.y()) * self.scale,
        )
    }

    fn visible_region(&self) -> VisibleRegion {
        let (w, h) = (self.viewport_width, self.viewport_height);
        VisibleRegion {
            near_left: self.coordinate_for(ScreenPoint::new(0.0, 0.0)),
            near_right: self.coordinate_for(ScreenPoint::new(w, 0.0)),
            far_left: self.coordinate_for(ScreenPoint::new(0.0, h)),
            far_right: self.coordinate_for(ScreenPoint::new(w, h)),
        }
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }
}

/// Last known visual state of one primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveRecord {
    pub kind: PrimitiveKind,
    pub owner: String,
    pub path: Option<Path>,
    pub visible: bool,
    pub marker_image: Option<MarkerImage>,
    pub overlay_image: Option<ImageData>,
    pub overlay_bounds: Option<GeoBounds>,
    pub max_dimension: Option<f64>,
    pub position: Option<GeoPoint>,
    pub anchor: Option<Anchor>,
    pub info_window_anchor: Option<Anchor>,
    pub fill_color: Option<Color>,
    pub stroke_color: Option<Color>,
    pub stroke_width: Option<f64>,
    pub z_index: Option<i32>,
    pub clickable: bool,
    pub bearing: Option<f64>,
}

impl PrimitiveRecord {
    fn new(primitive: Primitive<'_>, owner: &str) -> Self {
        let path = match primitive {
            Primitive::Polygon(path) => Some(path.clone()),
            _ => None,
        };
        Self {
            kind: primitive.kind(),
            owner: owner.to_string(),
            path,
            visible: false,
            marker_image: None,
            overlay_image: None,
            overlay_bounds: None,
            max_dimension: None,
            position: None,
            anchor: None,
            info_window_anchor: None,
            fill_color: None,
            stroke_color: None,
            stroke_width: None,
            z_index: None,
            clickable: false,
            bearing: None,
        }
    }

    fn set(&mut self, property: VisualProperty<'_>) {
        match property {
            VisualProperty::Visible(visible) => self.visible = visible,
            VisualProperty::MarkerImage(image) => self.marker_image = image.cloned(),
            VisualProperty::OverlayImage {
                image,
                bounds,
                max_dimension,
            } => {
                self.overlay_image = image.cloned();
                self.overlay_bounds = bounds;
                self.max_dimension = Some(max_dimension);
            }
            VisualProperty::Position(position) => self.position = Some(position),
            VisualProperty::Anchor(anchor) => self.anchor = Some(anchor),
            VisualProperty::InfoWindowAnchor(anchor) => self.info_window_anchor = Some(anchor),
            VisualProperty::FillColor(color) => self.fill_color = Some(color),
            VisualProperty::StrokeColor(color) => self.stroke_color = Some(color),
            VisualProperty::StrokeWidth(width) => self.stroke_width = Some(width),
            VisualProperty::ZIndex(z) => self.z_index = Some(z),
            VisualProperty::Clickable(clickable) => self.clickable = clickable,
            VisualProperty::Bearing(bearing) => self.bearing = Some(bearing),
        }
    }
}

/// One call made against a [`MemorySurface`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Create { handle: Handle, owner: String },
    Apply { handle: Handle, property: PropertyKind },
    Release { handle: Handle },
    Select { handle: Option<Handle> },
}

/// Call counters for a [`MemorySurface`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub created: usize,
    pub released: usize,
    pub properties_applied: usize,
    /// Log entries discarded because the log reached its capacity.
    pub log_dropped: usize,
}

/// Default number of [`SurfaceOp`] entries a [`MemorySurface`] keeps.
pub const DEFAULT_LOG_CAPACITY: usize = 4096;

/// Surface that records primitives in a map instead of drawing them.
///
/// The call log is bounded: once it holds `log_capacity` entries the oldest half is
/// discarded (counted in [`SurfaceStats::log_dropped`]). Callers that need every
/// entry drain it with [`MemorySurface::take_log`] between frames.
#[derive(Debug)]
pub struct MemorySurface {
    projection: Option<LinearProjection>,
    primitives: FxHashMap<Handle, PrimitiveRecord>,
    selected: Option<Handle>,
    next_id: u64,
    log: Vec<SurfaceOp>,
    log_capacity: usize,
    stats: SurfaceStats,
}

impl MemorySurface {
    /// Create a surface with an identity projection.
    pub fn new() -> Self {
        Self::with_projection(LinearProjection::identity())
    }

    pub fn with_projection(projection: LinearProjection) -> Self {
        Self {
            projection: Some(projection),
            primitives: FxHashMap::default(),
            selected: None,
            next_id: 1,
            log: Vec::new(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            stats: SurfaceStats::default(),
        }
    }

    /// Bound the call log; zero disables logging.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self.log.truncate(capacity);
        self
    }

    /// Replace the projection; `None` simulates a camera that is not ready.
    pub fn set_projection(&mut self, projection: Option<LinearProjection>) {
        self.projection = projection;
    }

    pub fn get(&self, handle: Handle) -> Option<&PrimitiveRecord> {
        self.primitives.get(&handle)
    }

    pub fn primitives(&self) -> impl Iterator<Item = (Handle, &PrimitiveRecord)> {
        self.primitives.iter().map(|(h, r)| (*h, r))
    }

    /// Primitives owned by one annotation, sorted by handle id.
    pub fn owned_by(&self, owner: &str) -> Vec<(Handle, &PrimitiveRecord)> {
        let mut owned: Vec<_> = self
            .primitives()
            .filter(|(_, record)| record.owner == owner)
            .collect();
        owned.sort_by_key(|(handle, _)| handle.id);
        owned
    }

    /// The visible marker primitive owned by `owner`, if any.
    pub fn visible_marker(&self, owner: &str) -> Option<&PrimitiveRecord> {
        self.primitives.values().find(|record| {
            record.kind == PrimitiveKind::Marker && record.visible && record.owner == owner
        })
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn log(&self) -> &[SurfaceOp] {
        &self.log
    }

    /// Drain the call log, leaving primitives untouched.
    pub fn take_log(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.log)
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats.clone()
    }

    fn record(&mut self, op: SurfaceOp) {
        if self.log_capacity == 0 {
            self.stats.log_dropped += 1;
            return;
        }
        if self.log.len() >= self.log_capacity {
            let excess = self.log.len() - self.log_capacity / 2;
            self.log.drain(..excess);
            self.stats.log_dropped += excess;
        }
        self.log.push(op);
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for MemorySurface {
    type Projection = LinearProjection;

    fn projection(&self) -> Option<LinearProjection> {
        self.projection
    }

    fn create(&mut self, primitive: Primitive<'_>, owner: &str) -> Handle {
        let handle = Handle::new(primitive.kind(), self.next_id);
        self.next_id += 1;
        self.primitives
            .insert(handle, PrimitiveRecord::new(primitive, owner));
        self.stats.created += 1;
        self.record(SurfaceOp::Create {
            handle,
            owner: owner.to_string(),
        });
        handle
    }

    fn apply(&mut self, handle: Handle, property: VisualProperty<'_>) {
        let Some(record) = self.primitives.get_mut(&handle) else {
            log::warn!("Property {:?} applied to unknown primitive {:?}", property.kind(), handle);
            return;
        };
        record.set(property);
        self.stats.properties_applied += 1;
        self.record(SurfaceOp::Apply {
            handle,
            property: property.kind(),
        });
    }

    fn release(&mut self, handle: Handle) {
        if self.primitives.remove(&handle).is_some() {
            self.stats.released += 1;
            if self.selected == Some(handle) {
                self.selected = None;
            }
            self.record(SurfaceOp::Release { handle });
        }
    }

    fn select_for_info_window(&mut self, handle: Option<Handle>) {
        self.selected = handle.filter(|h| self.primitives.contains_key(h));
        let handle = self.selected;
        self.record(SurfaceOp::Select { handle });
    }

    fn selected(&self) -> Option<Handle> {
        self.selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    #[test]
    fn test_create_apply_release() {
        let mut surface = MemorySurface::new();
        let handle = surface.create(Primitive::Marker, "a");
        assert_eq!(handle.kind, PrimitiveKind::Marker);
        assert!(!surface.get(handle).unwrap().visible);

        surface.apply(handle, VisualProperty::Visible(true));
        surface.apply(handle, VisualProperty::ZIndex(7));
        let record = surface.get(handle).unwrap();
        assert!(record.visible);
        assert_eq!(record.z_index, Some(7));
        assert_eq!(surface.visible_marker("a").map(|r| r.owner.as_str()), Some("a"));

        surface.release(handle);
        surface.release(handle);
        assert!(surface.is_empty());

        let stats = surface.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.properties_applied, 2);
    }

    #[test]
    fn test_polygon_keeps_path() {
        let mut surface = MemorySurface::new();
        let ring: Path = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let handle = surface.create(Primitive::Polygon(&ring), "room");
        assert_eq!(surface.get(handle).unwrap().path.as_ref(), Some(&ring));
        assert_eq!(surface.owned_by("room").len(), 1);
        assert!(surface.owned_by("other").is_empty());
    }

    #[test]
    fn test_selection_cleared_on_release() {
        let mut surface = MemorySurface::new();
        let handle = surface.create(Primitive::Marker, "a");
        surface.select_for_info_window(Some(handle));
        assert_eq!(surface.selected(), Some(handle));

        surface.release(handle);
        assert_eq!(surface.selected(), None);

        surface.select_for_info_window(Some(handle));
        assert_eq!(surface.selected(), None);
    }

    #[test]
    fn test_log_records_call_order() {
        let mut surface = MemorySurface::new();
        let handle = surface.create(Primitive::GroundOverlay, "m");
        surface.apply(handle, VisualProperty::Bearing(45.0));
        let log = surface.take_log();
        assert_eq!(log.len(), 2);
        assert!(matches!(log[0], SurfaceOp::Create { .. }));
        assert_eq!(
            log[1],
            SurfaceOp::Apply {
                handle,
                property: PropertyKind::Bearing
            }
        );
        assert!(surface.log().is_empty());
    }

    #[test]
    fn test_log_is_bounded() {
        let mut surface = MemorySurface::new().with_log_capacity(4);
        let handle = surface.create(Primitive::Marker, "a");
        for _ in 0..9 {
            surface.apply(handle, VisualProperty::Visible(true));
            assert!(surface.log().len() <= 4);
        }
        surface.release(handle);

        let log = surface.log();
        assert_eq!(log.last(), Some(&SurfaceOp::Release { handle }));
        assert!(!log.iter().any(|op| matches!(op, SurfaceOp::Create { .. })));
        let stats = surface.stats();
        assert_eq!(stats.log_dropped + log.len(), 11);
        assert_eq!(stats.properties_applied, 9);
    }

    #[test]
    fn test_zero_log_capacity_records_nothing() {
        let mut surface = MemorySurface::new().with_log_capacity(0);
        let handle = surface.create(Primitive::Marker, "a");
        surface.select_for_info_window(Some(handle));
        assert!(surface.log().is_empty());
        assert_eq!(surface.stats().log_dropped, 2);
        assert_eq!(surface.selected(), Some(handle));
    }

    #[test]
    fn test_linear_projection() {
        let projection = LinearProjection::new(Point::new(10.0, 50.0), 100.0, 18.0);
        let point = projection.point_for(Point::new(10.5, 50.25));
        assert_eq!(point, ScreenPoint::new(50.0, 25.0));
        assert_eq!(projection.zoom(), 18.0);

        let region = LinearProjection::identity()
            .with_viewport(200.0, 100.0)
            .visible_region();
        assert_eq!(region.near_left, Point::new(0.0, 0.0));
        assert_eq!(region.far_right, Point::new(200.0, 100.0));
    }

    #[test]
    fn test_missing_projection() {
        let mut surface = MemorySurface::new();
        assert!(surface.projection().is_some());
        surface.set_projection(None);
        assert!(surface.projection().is_none());
    }
}
