//! Collision-aware, incremental rendering of map annotations onto an abstract surface.
//!
//! Each frame the embedder hands a [`Renderer`] the annotations that should be on
//! screen. The renderer keeps one view state per annotation, pushes only the visual
//! properties that changed, hides markers that overlap others and releases the native
//! objects of annotations that stayed out of view for too long.
//!
//! ```rust
//! use mapoverlay::prelude::*;
//! use mapoverlay::types::{AnnotationModel, ImageData, MarkerSpec};
//! use tokio_util::sync::CancellationToken;
//!
//! let renderer = Renderer::builder(MemorySurface::new())
//!     .config(Config::default().with_retention(Duration::from_secs(30)))
//!     .build()?;
//!
//! let icon = ImageData::blank(20.0, 20.0);
//! let models = vec![
//!     AnnotationModel::new("a").with_marker(MarkerSpec::at(Point::new(0.0, 0.0)).with_icon(icon.clone())),
//!     AnnotationModel::new("b").with_marker(MarkerSpec::at(Point::new(5.0, 0.0)).with_icon(icon)),
//! ];
//!
//! let report = renderer.try_set_view_models(
//!     &models,
//!     CollisionPolicy::RemoveIconAndLabel,
//!     false,
//!     &CancellationToken::new(),
//! )?;
//! assert_eq!(report.pass.hidden, 1);
//! assert!(!renderer.snapshot("b").unwrap().is_marker_visible());
//! # Ok::<(), mapoverlay::OverlayError>(())
//! ```

pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod overlap;
pub mod renderer;
pub mod spatial_index;
pub mod surface;
pub mod view_state;

pub use builder::RendererBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CollisionPolicy, Config, ZBand, ZIndexBands};
pub use error::{FrameStage, OverlayError, Result};
pub use overlap::{OverlapEngine, PassReport, PassState, decide_collision};
pub use renderer::{FrameReport, Renderer};
pub use spatial_index::{Entry, SpatialIndex};
pub use surface::{
    Handle, LinearProjection, MemorySurface, Primitive, PrimitiveKind, Projection,
    RenderSurface, VisualProperty,
};
pub use view_state::{MarkerState, SnapshotReader, ViewSettings, ViewSnapshot, ViewState};

/// Geometry, style and model types shared with embedders.
pub use mapoverlay_types as types;

pub use geo::Point;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{OverlayError, Renderer, RendererBuilder, Result};

    pub use crate::{CollisionPolicy, Config, FrameReport};

    pub use crate::{Clock, ManualClock, SystemClock};

    pub use crate::{LinearProjection, MemorySurface, Projection, RenderSurface};

    pub use crate::{MarkerState, ViewSnapshot};

    pub use geo::Point;

    pub use std::time::Duration;
}
