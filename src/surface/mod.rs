//! Rendering surface and projection abstractions
//!
//! The renderer never draws anything itself. It creates primitives on a
//! [`RenderSurface`] and pushes individual visual properties to them, and it asks a
//! [`Projection`] where geographic coordinates land on screen.

use mapoverlay_types::model::LabelPosition;
use mapoverlay_types::{
    Anchor, Color, GeoBounds, GeoPoint, ImageData, Path, ScreenPoint, ScreenSize,
};

mod memory;

pub use memory::{
    DEFAULT_LOG_CAPACITY, LinearProjection, MemorySurface, PrimitiveRecord, SurfaceOp, SurfaceStats,
};

/// Kind of native primitive behind a [`Handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Marker,
    Polygon,
    GroundOverlay,
}

/// Opaque reference to a native primitive owned by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub kind: PrimitiveKind,
    pub id: u64,
}

impl Handle {
    pub const fn new(kind: PrimitiveKind, id: u64) -> Self {
        Self { kind, id }
    }
}

/// What to create on the surface.
#[derive(Debug, Clone, Copy)]
pub enum Primitive<'a> {
    Marker,
    Polygon(&'a Path),
    GroundOverlay,
}

impl Primitive<'_> {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Marker => PrimitiveKind::Marker,
            Primitive::Polygon(_) => PrimitiveKind::Polygon,
            Primitive::GroundOverlay => PrimitiveKind::GroundOverlay,
        }
    }
}

/// Description of the image a marker should display.
///
/// The surface composes icon and label into one bitmap; `size` is the size of the
/// composed result and is what collision detection uses.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerImage {
    pub icon: Option<ImageData>,
    pub label: Option<ImageData>,
    pub layout: LabelPosition,
    pub size: ScreenSize,
}

/// A single visual property pushed to a primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisualProperty<'a> {
    Visible(bool),
    MarkerImage(Option<&'a MarkerImage>),
    OverlayImage {
        image: Option<&'a ImageData>,
        bounds: Option<GeoBounds>,
        max_dimension: f64,
    },
    Position(GeoPoint),
    Anchor(Anchor),
    InfoWindowAnchor(Anchor),
    FillColor(Color),
    StrokeColor(Color),
    StrokeWidth(f64),
    ZIndex(i32),
    Clickable(bool),
    Bearing(f64),
}

/// Discriminant of [`VisualProperty`], handy for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Visible,
    MarkerImage,
    OverlayImage,
    Position,
    Anchor,
    InfoWindowAnchor,
    FillColor,
    StrokeColor,
    StrokeWidth,
    ZIndex,
    Clickable,
    Bearing,
}

impl VisualProperty<'_> {
    pub fn kind(&self) -> PropertyKind {
        match self {
            VisualProperty::Visible(_) => PropertyKind::Visible,
            VisualProperty::MarkerImage(_) => PropertyKind::MarkerImage,
            VisualProperty::OverlayImage { .. } => PropertyKind::OverlayImage,
            VisualProperty::Position(_) => PropertyKind::Position,
            VisualProperty::Anchor(_) => PropertyKind::Anchor,
            VisualProperty::InfoWindowAnchor(_) => PropertyKind::InfoWindowAnchor,
            VisualProperty::FillColor(_) => PropertyKind::FillColor,
            VisualProperty::StrokeColor(_) => PropertyKind::StrokeColor,
            VisualProperty::StrokeWidth(_) => PropertyKind::StrokeWidth,
            VisualProperty::ZIndex(_) => PropertyKind::ZIndex,
            VisualProperty::Clickable(_) => PropertyKind::Clickable,
            VisualProperty::Bearing(_) => PropertyKind::Bearing,
        }
    }
}

/// The four geographic corners of the visible viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRegion {
    pub near_left: GeoPoint,
    pub near_right: GeoPoint,
    pub far_left: GeoPoint,
    pub far_right: GeoPoint,
}

/// Snapshot of the camera's mapping between geographic and screen coordinates.
pub trait Projection {
    /// Screen position of a geographic coordinate.
    fn point_for(&self, coordinate: GeoPoint) -> ScreenPoint;

    fn visible_region(&self) -> VisibleRegion;

    /// Camera zoom level at the time the snapshot was taken.
    fn zoom(&self) -> f64;
}

/// Trait for rendering surface implementations
///
/// Newly created primitives are detached (invisible) until they receive
/// `VisualProperty::Visible(true)`. Every method is only ever called from the
/// renderer's exclusive section, so implementations need no internal locking.
pub trait RenderSurface {
    type Projection: Projection;

    /// Current projection, or `None` while the camera is not ready.
    fn projection(&self) -> Option<Self::Projection>;

    /// Create a primitive owned by the annotation `owner`.
    fn create(&mut self, primitive: Primitive<'_>, owner: &str) -> Handle;

    /// Push one visual property to a primitive.
    fn apply(&mut self, handle: Handle, property: VisualProperty<'_>);

    /// Detach and free a primitive. Unknown handles are ignored.
    fn release(&mut self, handle: Handle);

    /// Open the info window of a marker, or close the open one with `None`.
    fn select_for_info_window(&mut self, handle: Option<Handle>);

    /// Marker whose info window is currently open.
    fn selected(&self) -> Option<Handle>;
}
