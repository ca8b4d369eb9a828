//! Per-frame annotation models.
//!
//! An [`AnnotationModel`] describes what one annotation should look like in the
//! current frame. Every facet is optional; a missing facet simply means "nothing to
//! draw" for that part of the annotation.

use crate::geometry::{GeoPoint, Path};
use crate::image::ImageData;
use crate::style::Color;
use serde::{Deserialize, Serialize};

/// Where the icon sits relative to the marker's geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconPlacement {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

/// Which side of the label is attached to the icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelAnchor {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

/// Where the label is drawn relative to the icon in a composed marker image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelPosition {
    Top,
    Bottom,
    Left,
    #[default]
    Right,
}

impl LabelPosition {
    /// Resolve the label position from an optional label anchor.
    ///
    /// A label anchored by its left edge sits to the right of the icon, one anchored by
    /// its top edge sits below it, and so on. Without an anchor the label goes right.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapoverlay_types::model::{LabelAnchor, LabelPosition};
    ///
    /// assert_eq!(LabelPosition::from_anchor(Some(LabelAnchor::Top)), LabelPosition::Bottom);
    /// assert_eq!(LabelPosition::from_anchor(None), LabelPosition::Right);
    /// ```
    pub fn from_anchor(anchor: Option<LabelAnchor>) -> Self {
        match anchor {
            None | Some(LabelAnchor::Left) => LabelPosition::Right,
            Some(LabelAnchor::Top) => LabelPosition::Bottom,
            Some(LabelAnchor::Bottom) => LabelPosition::Top,
            Some(LabelAnchor::Right) | Some(LabelAnchor::Center) => LabelPosition::Left,
        }
    }

    /// Whether icon and label are stacked vertically.
    pub fn is_vertical(&self) -> bool {
        matches!(self, LabelPosition::Top | LabelPosition::Bottom)
    }
}

/// A rasterized label together with the text it was rendered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelImage {
    pub text: String,
    pub image: ImageData,
}

impl LabelImage {
    pub fn new(text: impl Into<String>, image: ImageData) -> Self {
        Self {
            text: text.into(),
            image,
        }
    }
}

/// Marker facet: an icon and/or label pinned to a geographic point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSpec {
    pub position: Option<GeoPoint>,
    pub icon: Option<ImageData>,
    pub label: Option<LabelImage>,
    pub icon_placement: Option<IconPlacement>,
    pub label_anchor: Option<LabelAnchor>,
    pub clickable: bool,
    /// Non-collidable markers are exempt from overlap resolution.
    pub collidable: bool,
    /// Selected or highlighted markers that must stay visible.
    pub force_render: bool,
    /// Area of the underlying geometry, used to rank collisions and order overlays.
    pub geometry_area: Option<f64>,
    pub info_window_text: Option<String>,
}

impl Default for MarkerSpec {
    fn default() -> Self {
        Self {
            position: None,
            icon: None,
            label: None,
            icon_placement: None,
            label_anchor: None,
            clickable: false,
            collidable: true,
            force_render: false,
            geometry_area: None,
            info_window_text: None,
        }
    }
}

impl MarkerSpec {
    pub fn at(position: GeoPoint) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn with_icon(mut self, icon: ImageData) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_label(mut self, label: LabelImage) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.geometry_area = Some(area);
        self
    }

    pub fn with_placement(
        mut self,
        icon_placement: Option<IconPlacement>,
        label_anchor: Option<LabelAnchor>,
    ) -> Self {
        self.icon_placement = icon_placement;
        self.label_anchor = label_anchor;
        self
    }

    pub fn clickable(mut self, clickable: bool) -> Self {
        self.clickable = clickable;
        self
    }

    pub fn force_render(mut self, force: bool) -> Self {
        self.force_render = force;
        self
    }

    pub fn collidable(mut self, collidable: bool) -> Self {
        self.collidable = collidable;
        self
    }

    /// Whether overlap resolution must leave this marker alone.
    pub fn is_forced(&self) -> bool {
        self.force_render || !self.collidable
    }
}

/// Polygon facet: filled outline of the annotation's geometry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonSpec {
    pub rings: Vec<Path>,
    pub fill_color: Option<Color>,
    pub stroke_color: Option<Color>,
    pub stroke_width: Option<f64>,
    pub clickable: bool,
    pub area: Option<f64>,
}

/// Floor-plan facet: wall outlines drawn beneath regular polygons.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorPlanSpec {
    pub rings: Vec<Path>,
    pub fill_color: Option<Color>,
    pub stroke_color: Option<Color>,
    pub stroke_width: Option<f64>,
}

/// 2D model facet: an image laid flat on the ground.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Model2DSpec {
    pub image: Option<ImageData>,
    pub width_meters: f64,
    pub height_meters: f64,
    /// South-west corner of the ground image.
    pub position: Option<GeoPoint>,
    pub bearing: Option<f64>,
    pub clickable: bool,
}

/// Desired state of one annotation for the current frame.
///
/// # Examples
///
/// ```
/// use mapoverlay_types::{AnnotationModel, ImageData, MarkerSpec};
/// use geo::Point;
///
/// let model = AnnotationModel::new("room-101")
///     .with_marker(MarkerSpec::at(Point::new(12.5, 55.6)).with_icon(ImageData::blank(24.0, 24.0)));
/// assert!(model.marker.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationModel {
    pub id: String,
    pub marker: Option<MarkerSpec>,
    pub polygon: Option<PolygonSpec>,
    pub floor_plan: Option<FloorPlanSpec>,
    pub model_2d: Option<Model2DSpec>,
    pub show_info_window: bool,
}

impl AnnotationModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_marker(mut self, marker: MarkerSpec) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_polygon(mut self, polygon: PolygonSpec) -> Self {
        self.polygon = Some(polygon);
        self
    }

    pub fn with_floor_plan(mut self, floor_plan: FloorPlanSpec) -> Self {
        self.floor_plan = Some(floor_plan);
        self
    }

    pub fn with_model_2d(mut self, model: Model2DSpec) -> Self {
        self.model_2d = Some(model);
        self
    }

    pub fn with_info_window(mut self, show: bool) -> Self {
        self.show_info_window = show;
        self
    }
}
