//! Per-annotation render state.
//!
//! A [`ViewState`] owns the native primitives of one annotation. Each frame the
//! renderer feeds it the annotation's model through [`ViewState::compute_delta`], which
//! records the desired value of every visual attribute next to the value last pushed
//! to the surface and queues one [`Delta`] per attribute that differs.
//! [`ViewState::apply_delta`] then pushes the queued changes in a fixed order.

mod bundle;
mod delta;
mod snapshot;
mod state;

pub use bundle::IconLabelBundle;
pub use delta::{
    Delta, DeltaSet, MarkerAnchors, OpKind, OverlayImage, PolygonDelta, PolygonLayer,
};
pub use snapshot::{SnapshotReader, ViewSnapshot};
pub use state::{FacetState, MarkerState, Tracked};

use crate::config::{Config, ZIndexBands};
use crate::surface::{Handle, MarkerImage, Primitive, Projection, RenderSurface, VisualProperty};
use geo::{Destination, Haversine};
use mapoverlay_types::{
    AnnotationModel, Color, GeoBounds, GeoPoint, IconPlacement, LabelAnchor, MarkerSpec,
    Model2DSpec, Path, ScreenRect,
};
use std::time::Duration;

/// The part of [`Config`] a view state works with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub label_spacing: f64,
    pub floor_plans_enabled: bool,
    pub models_2d_enabled: bool,
    pub z_index: ZIndexBands,
}

impl From<&Config> for ViewSettings {
    fn from(config: &Config) -> Self {
        Self {
            label_spacing: config.label_spacing,
            floor_plans_enabled: config.floor_plans_enabled,
            models_2d_enabled: config.models_2d_enabled,
            z_index: config.z_index,
        }
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Display scale of 2D model images at a camera zoom level.
pub fn model_2d_scale(zoom: f64) -> f64 {
    match zoom.floor() as i64 {
        z if z >= 21 => 1.0,
        20 => 0.9,
        19 => 0.6,
        18 => 0.4,
        17 => 0.2,
        _ => 0.1,
    }
}

/// Ground bounds of an image `width` by `height` metres with its south-west corner
/// at `south_west`.
pub fn overlay_bounds(south_west: GeoPoint, width: f64, height: f64) -> GeoBounds {
    let south_east = Haversine.destination(south_west, 90.0, width);
    let north_east = Haversine.destination(south_east, 0.0, height);
    GeoBounds::new(south_west, north_east)
}

fn stage<T: Clone + PartialEq>(
    deltas: &mut DeltaSet,
    kind: OpKind,
    field: &mut Tracked<T>,
    value: T,
    delta: impl FnOnce(&T) -> Delta,
) {
    if field.set(value) {
        deltas.put(delta(field.get()));
    } else {
        deltas.remove(kind);
    }
}

fn unique_rings(rings: &[Path]) -> Vec<Path> {
    let mut unique: Vec<Path> = Vec::with_capacity(rings.len());
    for ring in rings {
        if ring.0.is_empty() || unique.contains(ring) {
            continue;
        }
        unique.push(ring.clone());
    }
    unique
}

struct PolygonStyle<'a> {
    rings: &'a [Path],
    fill_color: Option<Color>,
    stroke_color: Option<Color>,
    stroke_width: Option<f64>,
}

// Op kinds of one polygon layer: stroke width, fill, stroke, visibility, geometry
struct LayerKinds {
    stroke_width: OpKind,
    fill_color: OpKind,
    stroke_color: OpKind,
    visibility: OpKind,
    geometry: OpKind,
}

impl PolygonLayer {
    fn kinds(self) -> LayerKinds {
        match self {
            PolygonLayer::Polygon => LayerKinds {
                stroke_width: OpKind::PolygonStrokeWidth,
                fill_color: OpKind::PolygonFillColor,
                stroke_color: OpKind::PolygonStrokeColor,
                visibility: OpKind::PolygonVisibility,
                geometry: OpKind::PolygonGeometry,
            },
            PolygonLayer::FloorPlan => LayerKinds {
                stroke_width: OpKind::FloorPlanStrokeWidth,
                fill_color: OpKind::FloorPlanFillColor,
                stroke_color: OpKind::FloorPlanStrokeColor,
                visibility: OpKind::FloorPlanVisibility,
                geometry: OpKind::FloorPlanGeometry,
            },
        }
    }
}

#[derive(Debug)]
struct PolygonFacet {
    layer: PolygonLayer,
    state: Tracked<FacetState>,
    stroke_width: Tracked<Option<f64>>,
    fill_color: Tracked<Option<Color>>,
    stroke_color: Tracked<Option<Color>>,
    rings: Tracked<Vec<Path>>,
    primitives: Vec<(Path, Handle)>,
}

impl PolygonFacet {
    fn new(layer: PolygonLayer) -> Self {
        Self {
            layer,
            state: Tracked::default(),
            stroke_width: Tracked::default(),
            fill_color: Tracked::default(),
            stroke_color: Tracked::default(),
            rings: Tracked::default(),
            primitives: Vec::new(),
        }
    }

    fn compute(&mut self, deltas: &mut DeltaSet, style: Option<PolygonStyle<'_>>) {
        let layer = self.layer;
        let kinds = layer.kinds();

        stage(
            deltas,
            kinds.visibility,
            &mut self.state,
            FacetState::from_visible(style.is_some()),
            |state| Delta::Polygon(layer, PolygonDelta::Visibility(state.is_visible())),
        );

        let Some(style) = style else {
            return;
        };

        if let Some(width) = style.stroke_width {
            stage(deltas, kinds.stroke_width, &mut self.stroke_width, Some(width), |_| {
                Delta::Polygon(layer, PolygonDelta::StrokeWidth(width))
            });
        }
        if let Some(color) = style.fill_color {
            stage(deltas, kinds.fill_color, &mut self.fill_color, Some(color), |_| {
                Delta::Polygon(layer, PolygonDelta::FillColor(color))
            });
        }
        if let Some(color) = style.stroke_color {
            stage(deltas, kinds.stroke_color, &mut self.stroke_color, Some(color), |_| {
                Delta::Polygon(layer, PolygonDelta::StrokeColor(color))
            });
        }
        stage(
            deltas,
            kinds.geometry,
            &mut self.rings,
            unique_rings(style.rings),
            |rings| Delta::Polygon(layer, PolygonDelta::Geometry(rings.clone())),
        );
    }

    fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.primitives.iter().map(|(_, handle)| *handle)
    }

    fn apply<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        owner: &str,
        op: &PolygonDelta,
        z_index: Option<i32>,
        clickable: Option<bool>,
    ) -> bool {
        match op {
            PolygonDelta::StrokeWidth(width) => {
                for handle in self.handles() {
                    surface.apply(handle, VisualProperty::StrokeWidth(*width));
                }
                self.stroke_width.commit();
            }
            PolygonDelta::FillColor(color) => {
                for handle in self.handles() {
                    surface.apply(handle, VisualProperty::FillColor(*color));
                }
                self.fill_color.commit();
            }
            PolygonDelta::StrokeColor(color) => {
                for handle in self.handles() {
                    surface.apply(handle, VisualProperty::StrokeColor(*color));
                }
                self.stroke_color.commit();
            }
            PolygonDelta::Visibility(visible) => {
                for handle in self.handles() {
                    surface.apply(handle, VisualProperty::Visible(*visible));
                }
                self.state.commit();
            }
            PolygonDelta::Geometry(rings) => {
                let Some(z_index) = z_index else {
                    log::debug!(
                        "Skipping {:?} geometry of '{}': z-index is not finite",
                        self.layer,
                        owner
                    );
                    return false;
                };

                let mut previous = std::mem::take(&mut self.primitives);
                let mut current = Vec::with_capacity(rings.len());
                for ring in rings {
                    if let Some(at) = previous.iter().position(|(path, _)| path == ring) {
                        current.push(previous.swap_remove(at));
                        continue;
                    }

                    let handle = surface.create(Primitive::Polygon(ring), owner);
                    let fill = self.fill_color.get().unwrap_or(Color::TRANSPARENT);
                    let stroke = self.stroke_color.get().unwrap_or(Color::TRANSPARENT);
                    let width = self.stroke_width.get().unwrap_or(0.0);
                    surface.apply(handle, VisualProperty::FillColor(fill));
                    surface.apply(handle, VisualProperty::StrokeColor(stroke));
                    surface.apply(handle, VisualProperty::StrokeWidth(width));
                    surface.apply(handle, VisualProperty::ZIndex(z_index));
                    if let Some(clickable) = clickable {
                        surface.apply(handle, VisualProperty::Clickable(clickable));
                    }
                    if self.state.get().is_visible() {
                        surface.apply(handle, VisualProperty::Visible(true));
                    }
                    current.push((ring.clone(), handle));
                }
                for (_, handle) in previous {
                    surface.release(handle);
                }
                self.primitives = current;
                self.rings.commit();
            }
        }
        true
    }

    fn release_all<S: RenderSurface>(&mut self, surface: &mut S) {
        for (_, handle) in self.primitives.drain(..) {
            surface.release(handle);
        }
        self.state.force(FacetState::Invisible);
        self.rings.force(Vec::new());
    }
}

#[derive(Debug, Default)]
struct Model2DFacet {
    state: Tracked<FacetState>,
    image: Tracked<Option<OverlayImage>>,
    bearing: Tracked<Option<f64>>,
    position: Tracked<Option<GeoPoint>>,
    clickable: Tracked<bool>,
    overlay: Option<Handle>,
}

/// Render state of one annotation.
#[derive(Debug)]
pub struct ViewState {
    id: String,
    settings: ViewSettings,
    last_seen: Duration,
    info_window_text: Option<String>,
    // Area of the annotation's geometry, used for ranking and z-order
    poi_area: f64,
    force_render: bool,

    bundle: Option<IconLabelBundle>,
    icon_placement: Option<IconPlacement>,
    label_anchor: Option<LabelAnchor>,
    marker_state: Tracked<MarkerState>,
    marker_image: Tracked<Option<MarkerImage>>,
    anchors: Tracked<MarkerAnchors>,
    position: Tracked<Option<GeoPoint>>,
    marker_clickable: Tracked<bool>,
    info_window: Tracked<bool>,
    marker: Option<Handle>,

    polygon: PolygonFacet,
    polygon_clickable: Tracked<bool>,
    floor_plan: PolygonFacet,
    model_2d: Model2DFacet,

    deltas: DeltaSet,
    reader: SnapshotReader,
    destroyed: bool,
}

impl ViewState {
    pub fn new(id: impl Into<String>, settings: ViewSettings) -> Self {
        let id = id.into();
        let reader = SnapshotReader::new(ViewSnapshot::empty(&id));
        Self {
            id,
            settings,
            last_seen: Duration::ZERO,
            info_window_text: None,
            poi_area: 0.0,
            force_render: false,
            bundle: None,
            icon_placement: None,
            label_anchor: None,
            marker_state: Tracked::default(),
            marker_image: Tracked::default(),
            anchors: Tracked::default(),
            position: Tracked::default(),
            marker_clickable: Tracked::default(),
            info_window: Tracked::default(),
            marker: None,
            polygon: PolygonFacet::new(PolygonLayer::Polygon),
            polygon_clickable: Tracked::default(),
            floor_plan: PolygonFacet::new(PolygonLayer::FloorPlan),
            model_2d: Model2DFacet::default(),
            deltas: DeltaSet::new(),
            reader,
            destroyed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn last_seen(&self) -> Duration {
        self.last_seen
    }

    pub fn poi_area(&self) -> f64 {
        self.poi_area
    }

    /// Whether overlap resolution must leave this view state alone.
    pub fn is_forced(&self) -> bool {
        self.force_render
    }

    pub fn marker_state(&self) -> MarkerState {
        *self.marker_state.get()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        *self.position.get()
    }

    pub fn info_window_text(&self) -> Option<&str> {
        self.info_window_text.as_deref()
    }

    pub fn pending(&self) -> &DeltaSet {
        &self.deltas
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    /// Enable or disable floor plans. Disabling queues their removal.
    pub fn set_floor_plans_enabled(&mut self, enabled: bool) {
        self.settings.floor_plans_enabled = enabled;
        if !enabled {
            self.floor_plan.compute(&mut self.deltas, None);
        }
    }

    /// Enable or disable 2D models. Disabling queues their removal.
    pub fn set_models_2d_enabled(&mut self, enabled: bool) {
        self.settings.models_2d_enabled = enabled;
        if !enabled {
            self.hide_model_2d(false);
        }
    }

    /// Recompute desired state from `model` and queue the differences.
    pub fn compute_delta(&mut self, model: &AnnotationModel, now: Duration, zoom: f64) {
        self.last_seen = now;
        self.info_window_text = model
            .marker
            .as_ref()
            .and_then(|marker| marker.info_window_text.clone());

        self.compute_marker(model.marker.as_ref());
        self.stage_info_window(model.show_info_window);

        let polygon = model
            .polygon
            .as_ref()
            .filter(|polygon| !polygon.rings.is_empty() && polygon.area.is_some());
        self.polygon.compute(
            &mut self.deltas,
            polygon.map(|polygon| PolygonStyle {
                rings: &polygon.rings,
                fill_color: polygon.fill_color,
                stroke_color: polygon.stroke_color,
                stroke_width: polygon.stroke_width,
            }),
        );
        if let Some(polygon) = polygon {
            stage(
                &mut self.deltas,
                OpKind::PolygonClickable,
                &mut self.polygon_clickable,
                polygon.clickable,
                |clickable| Delta::PolygonClickable(*clickable),
            );
        }

        let floor_plans_enabled = self.settings.floor_plans_enabled;
        let floor_plan = model
            .floor_plan
            .as_ref()
            .filter(|floor_plan| floor_plans_enabled && !floor_plan.rings.is_empty());
        self.floor_plan.compute(
            &mut self.deltas,
            floor_plan.map(|floor_plan| PolygonStyle {
                rings: &floor_plan.rings,
                fill_color: floor_plan.fill_color,
                stroke_color: floor_plan.stroke_color,
                stroke_width: floor_plan.stroke_width,
            }),
        );

        self.compute_model_2d(model.model_2d.as_ref(), zoom);
    }

    fn compute_marker(&mut self, marker: Option<&MarkerSpec>) {
        let state = marker.map_or(MarkerState::Invisible, MarkerState::for_marker);

        // Collision rank and z-order inputs follow the model even while nothing is drawn
        if let Some(marker) = marker {
            self.force_render = marker.is_forced();
            if let Some(area) = marker.geometry_area {
                self.poi_area = area;
            }
        }

        if let Some(marker) = marker.filter(|_| state.is_visible()) {
            self.bundle = IconLabelBundle::from_marker(marker, self.settings.label_spacing);
            self.icon_placement = marker.icon_placement;
            self.label_anchor = marker.label_anchor;

            stage(
                &mut self.deltas,
                OpKind::MarkerClickable,
                &mut self.marker_clickable,
                marker.clickable,
                |clickable| Delta::MarkerClickable(*clickable),
            );
            if let Some(position) = marker.position {
                stage(
                    &mut self.deltas,
                    OpKind::MarkerPosition,
                    &mut self.position,
                    Some(position),
                    |_| Delta::MarkerPosition(position),
                );
            }
        }

        self.set_marker_state(state);
    }

    fn compute_model_2d(&mut self, spec: Option<&Model2DSpec>, zoom: f64) {
        let enabled = self.settings.models_2d_enabled;
        let spec = spec.filter(|model| enabled && model.image.is_some());
        let Some(spec) = spec else {
            self.hide_model_2d(false);
            return;
        };

        let facet = &mut self.model_2d;
        let deltas = &mut self.deltas;
        stage(
            deltas,
            OpKind::Model2DVisibility,
            &mut facet.state,
            FacetState::Visible,
            |_| Delta::Model2DVisibility(true),
        );

        if let Some(image) = &spec.image {
            let overlay = OverlayImage {
                image: image.clone(),
                bounds: spec
                    .position
                    .map(|south_west| overlay_bounds(south_west, spec.width_meters, spec.height_meters)),
                max_dimension: image.width.max(image.height) * model_2d_scale(zoom),
            };
            stage(
                deltas,
                OpKind::Model2DImage,
                &mut facet.image,
                Some(overlay),
                |overlay| Delta::Model2DImage(overlay.clone()),
            );
        }
        if let Some(position) = spec.position {
            stage(
                deltas,
                OpKind::Model2DPosition,
                &mut facet.position,
                Some(position),
                |_| Delta::Model2DPosition(position),
            );
        }
        if let Some(bearing) = spec.bearing {
            stage(
                deltas,
                OpKind::Model2DBearing,
                &mut facet.bearing,
                Some(bearing),
                |_| Delta::Model2DBearing(bearing),
            );
        }
        stage(
            deltas,
            OpKind::Model2DClickable,
            &mut facet.clickable,
            spec.clickable,
            |clickable| Delta::Model2DClickable(*clickable),
        );
    }

    fn hide_model_2d(&mut self, drop_image: bool) {
        stage(
            &mut self.deltas,
            OpKind::Model2DVisibility,
            &mut self.model_2d.state,
            FacetState::Invisible,
            |_| Delta::Model2DVisibility(false),
        );
        if drop_image {
            stage(
                &mut self.deltas,
                OpKind::Model2DImage,
                &mut self.model_2d.image,
                None,
                |_| Delta::Model2DImage(None),
            );
        }
    }

    fn stage_info_window(&mut self, show: bool) {
        stage(
            &mut self.deltas,
            OpKind::InfoWindow,
            &mut self.info_window,
            show,
            |show| Delta::InfoWindow(*show),
        );
    }

    /// Change the marker state and re-derive the displayed image and anchors.
    pub fn set_marker_state(&mut self, state: MarkerState) {
        stage(
            &mut self.deltas,
            OpKind::MarkerVisibility,
            &mut self.marker_state,
            state,
            |state| Delta::MarkerVisibility(state.is_visible()),
        );

        let image = self.bundle.as_ref().and_then(|bundle| bundle.image_for(state));
        stage(
            &mut self.deltas,
            OpKind::MarkerIcon,
            &mut self.marker_image,
            image,
            |image| Delta::MarkerIcon(image.clone()),
        );

        let anchors = self.bundle.as_ref().map_or_else(MarkerAnchors::default, |bundle| {
            bundle.anchors(state, self.icon_placement, self.label_anchor)
        });
        stage(
            &mut self.deltas,
            OpKind::MarkerAnchor,
            &mut self.anchors,
            anchors,
            |anchors| Delta::MarkerAnchor(*anchors),
        );
    }

    /// Screen box of the marker under `projection`.
    ///
    /// `None` unless the marker is visible with a position and an image.
    pub fn bounds<P: Projection>(&self, projection: &P) -> Option<ScreenRect> {
        if !self.marker_state.get().is_visible() {
            return None;
        }
        let position = (*self.position.get())?;
        let size = self.marker_image.get().as_ref()?.size;

        let point = projection.point_for(position);
        if !point.is_finite() {
            return None;
        }

        let anchor = self.anchors.get().ground;
        let rect = ScreenRect::new(
            point.x - size.width * anchor.x,
            point.y - size.height * anchor.y,
            size.width,
            size.height,
        )
        .floored();
        rect.is_finite().then_some(rect)
    }

    /// Push every pending delta to `surface`, in apply order.
    ///
    /// Returns the number of deltas applied. Skipped deltas stay unapplied and are
    /// queued again by the next [`compute_delta`](Self::compute_delta).
    pub fn apply_delta<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        let mut deltas = std::mem::take(&mut self.deltas);
        if self.destroyed {
            return 0;
        }

        let mut applied = 0;
        for delta in deltas.drain() {
            if self.apply_one(surface, &delta) {
                applied += 1;
            }
        }
        applied
    }

    fn marker_handle<S: RenderSurface>(&mut self, surface: &mut S) -> Handle {
        if let Some(handle) = self.marker {
            return handle;
        }
        let handle = surface.create(Primitive::Marker, &self.id);
        surface.apply(handle, VisualProperty::ZIndex(self.settings.z_index.marker));
        self.marker = Some(handle);
        handle
    }

    fn overlay_handle<S: RenderSurface>(&mut self, surface: &mut S) -> Handle {
        if let Some(handle) = self.model_2d.overlay {
            return handle;
        }
        let handle = surface.create(Primitive::GroundOverlay, &self.id);
        self.model_2d.overlay = Some(handle);
        handle
    }

    fn apply_one<S: RenderSurface>(&mut self, surface: &mut S, delta: &Delta) -> bool {
        match delta {
            Delta::MarkerAnchor(anchors) => {
                let handle = self.marker_handle(surface);
                surface.apply(handle, VisualProperty::Anchor(anchors.ground));
                surface.apply(handle, VisualProperty::InfoWindowAnchor(anchors.info_window));
                self.anchors.commit();
            }
            Delta::MarkerIcon(image) => {
                match (image, self.marker) {
                    (Some(image), _) => {
                        let handle = self.marker_handle(surface);
                        surface.apply(handle, VisualProperty::MarkerImage(Some(image)));
                    }
                    (None, Some(handle)) => surface.apply(handle, VisualProperty::MarkerImage(None)),
                    (None, None) => {}
                }
                self.marker_image.commit();
            }
            Delta::MarkerVisibility(visible) => {
                if *visible {
                    let handle = self.marker_handle(surface);
                    surface.apply(handle, VisualProperty::Visible(true));
                } else if let Some(handle) = self.marker {
                    surface.apply(handle, VisualProperty::Visible(false));
                }
                self.marker_state.commit();
            }
            Delta::MarkerPosition(position) => {
                let handle = self.marker_handle(surface);
                surface.apply(handle, VisualProperty::Position(*position));
                self.position.commit();
            }
            Delta::MarkerClickable(clickable) => {
                if *clickable {
                    let handle = self.marker_handle(surface);
                    surface.apply(handle, VisualProperty::Clickable(true));
                } else if let Some(handle) = self.marker {
                    surface.apply(handle, VisualProperty::Clickable(false));
                }
                self.marker_clickable.commit();
            }
            Delta::InfoWindow(show) => {
                if *show {
                    let handle = self.marker_handle(surface);
                    if surface.selected() != Some(handle) {
                        // Anchors as of apply time; the overlap pass may have reduced the marker
                        let anchor = self.anchors.get().info_window;
                        surface.select_for_info_window(Some(handle));
                        surface.apply(handle, VisualProperty::InfoWindowAnchor(anchor));
                    }
                } else if let Some(handle) = self.marker {
                    if surface.selected() == Some(handle) {
                        surface.select_for_info_window(None);
                    }
                }
                self.info_window.commit();
            }
            Delta::Polygon(layer, op) => {
                let bands = self.settings.z_index;
                let (facet, band, clickable) = match layer {
                    PolygonLayer::Polygon => (
                        &mut self.polygon,
                        bands.polygons,
                        Some(*self.polygon_clickable.get()),
                    ),
                    PolygonLayer::FloorPlan => (&mut self.floor_plan, bands.floor_plans, None),
                };
                return facet.apply(surface, &self.id, op, band.fold(self.poi_area), clickable);
            }
            Delta::PolygonClickable(clickable) => {
                for handle in self.polygon.handles() {
                    surface.apply(handle, VisualProperty::Clickable(*clickable));
                }
                self.polygon_clickable.commit();
            }
            Delta::Model2DImage(overlay) => {
                match overlay {
                    Some(overlay) => {
                        let Some(z_index) = self.settings.z_index.models_2d.fold(self.poi_area) else {
                            log::debug!("Skipping 2D model of '{}': z-index is not finite", self.id);
                            return false;
                        };
                        let handle = self.overlay_handle(surface);
                        surface.apply(
                            handle,
                            VisualProperty::OverlayImage {
                                image: Some(&overlay.image),
                                bounds: overlay.bounds,
                                max_dimension: overlay.max_dimension,
                            },
                        );
                        surface.apply(handle, VisualProperty::ZIndex(z_index));
                    }
                    None => {
                        if let Some(handle) = self.model_2d.overlay {
                            surface.apply(
                                handle,
                                VisualProperty::OverlayImage {
                                    image: None,
                                    bounds: None,
                                    max_dimension: 0.0,
                                },
                            );
                        }
                    }
                }
                self.model_2d.image.commit();
            }
            Delta::Model2DBearing(bearing) => {
                let handle = self.overlay_handle(surface);
                surface.apply(handle, VisualProperty::Bearing(*bearing));
                self.model_2d.bearing.commit();
            }
            Delta::Model2DVisibility(visible) => {
                if *visible {
                    let handle = self.overlay_handle(surface);
                    surface.apply(handle, VisualProperty::Visible(true));
                } else if let Some(handle) = self.model_2d.overlay {
                    surface.apply(handle, VisualProperty::Visible(false));
                }
                self.model_2d.state.commit();
            }
            Delta::Model2DPosition(position) => {
                let handle = self.overlay_handle(surface);
                surface.apply(handle, VisualProperty::Position(*position));
                self.model_2d.position.commit();
            }
            Delta::Model2DClickable(clickable) => {
                if *clickable {
                    let handle = self.overlay_handle(surface);
                    surface.apply(handle, VisualProperty::Clickable(true));
                } else if let Some(handle) = self.model_2d.overlay {
                    surface.apply(handle, VisualProperty::Clickable(false));
                }
                self.model_2d.clickable.commit();
            }
        }
        true
    }

    /// Hide a cached view state that is absent from the current frame.
    ///
    /// Drops image data and drives every facet invisible right away. Identity,
    /// position and area are kept so the view state can come back cheaply.
    pub fn mark_no_longer_in_view<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        self.bundle = None;
        self.set_marker_state(MarkerState::Invisible);
        self.stage_info_window(false);
        self.polygon.compute(&mut self.deltas, None);
        self.floor_plan.compute(&mut self.deltas, None);
        self.hide_model_2d(true);
        self.apply_delta(surface)
    }

    /// Release every native object. Safe to call more than once.
    pub fn destroy<S: RenderSurface>(&mut self, surface: &mut S) {
        if let Some(handle) = self.marker.take() {
            if surface.selected() == Some(handle) {
                surface.select_for_info_window(None);
            }
            surface.release(handle);
        }
        self.polygon.release_all(surface);
        self.floor_plan.release_all(surface);
        if let Some(handle) = self.model_2d.overlay.take() {
            surface.release(handle);
        }
        self.deltas.clear();

        if !self.destroyed {
            self.destroyed = true;
            self.marker_state.force(MarkerState::Invisible);
            self.info_window.force(false);
            self.model_2d.state.force(FacetState::Invisible);
            self.reader.publish(self.snapshot(None));
        }
    }

    /// Applied state as an immutable snapshot.
    pub fn snapshot(&self, bounds: Option<ScreenRect>) -> ViewSnapshot {
        ViewSnapshot {
            id: self.id.clone(),
            marker_state: *self.marker_state.applied(),
            position: *self.position.applied(),
            anchor: self.anchors.applied().ground,
            bounds,
            info_window_shown: *self.info_window.applied(),
            info_window_text: self.info_window_text.clone(),
            polygon_state: *self.polygon.state.applied(),
            polygon_rings: self.polygon.primitives.len(),
            floor_plan_state: *self.floor_plan.state.applied(),
            floor_plan_rings: self.floor_plan.primitives.len(),
            model_2d_state: *self.model_2d.state.applied(),
            force_render: self.force_render,
            poi_area: self.poi_area,
            last_seen: self.last_seen,
            destroyed: self.destroyed,
        }
    }

    /// Publish the applied state to every [`SnapshotReader`] of this view state.
    pub fn publish<P: Projection>(&self, projection: &P) {
        self.reader.publish(self.snapshot(self.bounds(projection)));
    }
}
