//! Renderer builder for flexible configuration
//!
//! This module provides a builder pattern for creating renderers with a custom
//! configuration or time source.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{OverlayError, Result};
use crate::renderer::Renderer;
use crate::surface::RenderSurface;
use std::sync::Arc;

/// Builder for a [`Renderer`] drawing onto `S`.
#[derive(Debug)]
pub struct RendererBuilder<S> {
    surface: S,
    config: Config,
    clock: Option<Arc<dyn Clock>>,
}

impl<S: RenderSurface> RendererBuilder<S> {
    /// Create a new builder with the default configuration.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            config: Config::default(),
            clock: None,
        }
    }

    /// Set the renderer configuration (retention, ceiling, thresholds, etc.).
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Time source used for retention. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build the renderer. Fails when the configuration does not validate.
    pub fn build(self) -> Result<Renderer<S>> {
        self.config.validate().map_err(OverlayError::InvalidConfig)?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));

        log::debug!(
            "Building renderer: retention {:?}, at most {} view states",
            self.config.retention(),
            self.config.max_view_states
        );
        Ok(Renderer::from_parts(self.surface, self.config, clock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CollisionPolicy;
    use crate::surface::MemorySurface;
    use geo::Point;
    use mapoverlay_types::{AnnotationModel, ImageData, MarkerSpec};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_builder_default() {
        let builder = RendererBuilder::new(MemorySurface::new());
        assert!(builder.clock.is_none());
        assert_eq!(builder.config, Config::default());
    }

    #[test]
    fn test_builder_with_config() {
        let config = Config::default()
            .with_retention(Duration::from_secs(30))
            .with_max_view_states(10);

        let renderer = RendererBuilder::new(MemorySurface::new())
            .config(config.clone())
            .build()
            .unwrap();
        assert_eq!(renderer.config(), config);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = Config {
            intersection_threshold: 1.5,
            ..Config::default()
        };
        let result = RendererBuilder::new(MemorySurface::new()).config(config).build();
        assert!(matches!(result, Err(OverlayError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_clock() {
        let clock = ManualClock::new();
        let renderer = RendererBuilder::new(MemorySurface::new())
            .clock(clock.clone())
            .build()
            .unwrap();

        let model = AnnotationModel::new("a")
            .with_marker(MarkerSpec::at(Point::new(0.0, 0.0)).with_icon(ImageData::blank(8.0, 8.0)));
        clock.advance(Duration::from_secs(42));
        renderer
            .try_set_view_models(
                &[model],
                CollisionPolicy::AllowOverlap,
                false,
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(
            renderer.snapshot("a").unwrap().last_seen,
            Duration::from_secs(42)
        );
    }
}
