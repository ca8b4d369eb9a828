//! # mapoverlay-types
//!
//! Core data types shared by the `mapoverlay` renderer and its embedders.
//!
//! - **Screen geometry**: `ScreenPoint`, `ScreenSize`, `ScreenRect`, `Anchor`
//! - **Geographic aliases**: `GeoPoint`, `Path`, `GeoBounds`
//! - **Style**: `Color`, `ImageData`
//! - **Model**: `AnnotationModel` and its marker, polygon, floor-plan and 2D-model specs
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use mapoverlay_types::geometry::ScreenRect;
//!
//! let a = ScreenRect::new(0.0, 0.0, 100.0, 20.0);
//! let b = ScreenRect::new(70.0, 0.0, 100.0, 20.0);
//! assert!(a.intersects_by_at_least(&b, 0.15));
//! assert!(!a.intersects_by_at_least(&b, 0.5));
//! ```

pub mod geometry;
pub mod image;
pub mod model;
pub mod style;

pub use geometry::{Anchor, GeoBounds, GeoPoint, Path, ScreenPoint, ScreenRect, ScreenSize};
pub use image::ImageData;
pub use model::{
    AnnotationModel, FloorPlanSpec, IconPlacement, LabelAnchor, LabelImage, LabelPosition,
    MarkerSpec, Model2DSpec, PolygonSpec,
};
pub use style::Color;
