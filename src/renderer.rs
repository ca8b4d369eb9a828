//! Frame coordinator.
//!
//! A [`Renderer`] turns a frame's worth of [`AnnotationModel`]s into surface mutations:
//! it purges view states that dropped out of view, updates or creates the rest,
//! resolves marker overlaps and applies the resulting deltas. All mutable state sits
//! behind a single mutex; published snapshots can be read without touching it.

use crate::builder::RendererBuilder;
use crate::clock::Clock;
use crate::config::{CollisionPolicy, Config};
use crate::error::{FrameStage, OverlayError, Result};
use crate::overlap::{OverlapEngine, PassReport};
use crate::surface::{Projection, RenderSurface};
use crate::view_state::{SnapshotReader, ViewSettings, ViewSnapshot, ViewState};
use mapoverlay_types::AnnotationModel;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// View states created for identifiers seen for the first time.
    pub created: usize,
    /// Existing view states recomputed from their model.
    pub updated: usize,
    /// View states destroyed by the purge.
    pub purged: usize,
    /// Cached view states newly hidden because they left the frame.
    pub released: usize,
    pub in_view: usize,
    pub deltas_applied: usize,
    pub pass: PassReport,
}

fn checkpoint(cancel: &CancellationToken, stage: FrameStage) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(OverlayError::Cancelled(stage));
    }
    Ok(())
}

pub(crate) struct RendererInner<S: RenderSurface> {
    surface: S,
    views: FxHashMap<String, ViewState>,
    engine: OverlapEngine,
    config: Config,
}

impl<S: RenderSurface> RendererInner<S> {
    pub(crate) fn new(surface: S, config: Config) -> Self {
        Self {
            surface,
            views: FxHashMap::default(),
            engine: OverlapEngine::new(config.intersection_threshold),
            config,
        }
    }

    fn frame(
        &mut self,
        models: &[AnnotationModel],
        policy: CollisionPolicy,
        force_clear: bool,
        cancel: &CancellationToken,
        now: Duration,
        board: &RwLock<FxHashMap<String, SnapshotReader>>,
    ) -> Result<FrameReport> {
        let mut report = FrameReport::default();

        checkpoint(cancel, FrameStage::AcquireProjection)?;
        let projection = self
            .surface
            .projection()
            .ok_or(OverlayError::ProjectionUnavailable)?;

        checkpoint(cancel, FrameStage::Purge)?;
        self.purge(models, force_clear, now, &projection, board, &mut report);

        // Later models win over earlier ones with the same identifier
        let mut latest: FxHashMap<&str, usize> = FxHashMap::default();
        for (position, model) in models.iter().enumerate() {
            latest.insert(model.id.as_str(), position);
        }

        let zoom = projection.zoom();
        let settings = ViewSettings::from(&self.config);
        for (position, model) in models.iter().enumerate() {
            checkpoint(cancel, FrameStage::ComputeDeltas)?;
            if latest.get(model.id.as_str()) != Some(&position) {
                continue;
            }

            match self.views.get_mut(&model.id) {
                Some(view) => {
                    view.compute_delta(model, now, zoom);
                    report.updated += 1;
                }
                None => {
                    let mut view = ViewState::new(model.id.clone(), settings);
                    view.compute_delta(model, now, zoom);
                    board.write().insert(model.id.clone(), view.reader());
                    self.views.insert(model.id.clone(), view);
                    report.created += 1;
                }
            }
        }

        checkpoint(cancel, FrameStage::CollectInView)?;
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut in_view: Vec<ViewState> = models
            .iter()
            .filter(|model| seen.insert(model.id.as_str()))
            .filter_map(|model| self.views.remove(&model.id))
            .collect();
        report.in_view = in_view.len();

        let result = self
            .engine
            .run(&mut in_view, policy, &projection, cancel)
            .and_then(|pass| {
                report.pass = pass;
                Self::apply(&mut self.surface, &mut in_view, &projection, cancel)
            });

        for view in in_view {
            self.views.insert(view.id().to_string(), view);
        }
        report.deltas_applied = result?;

        log::debug!(
            "Frame: {} created, {} updated, {} purged, {} released, {} in view, {} deltas",
            report.created,
            report.updated,
            report.purged,
            report.released,
            report.in_view,
            report.deltas_applied
        );
        Ok(report)
    }

    fn purge(
        &mut self,
        models: &[AnnotationModel],
        force_clear: bool,
        now: Duration,
        projection: &S::Projection,
        board: &RwLock<FxHashMap<String, SnapshotReader>>,
        report: &mut FrameReport,
    ) {
        let wanted: FxHashSet<&str> = models.iter().map(|model| model.id.as_str()).collect();
        let mut absent: Vec<(Duration, String)> = self
            .views
            .values()
            .filter(|view| !wanted.contains(view.id()))
            .map(|view| (view.last_seen(), view.id().to_string()))
            .collect();
        absent.sort();

        let retention = self.config.retention();
        let ceiling = self.config.max_view_states;
        for (last_seen, id) in absent {
            let expired = now.saturating_sub(last_seen) > retention;
            if expired || self.views.len() > ceiling || force_clear {
                if let Some(mut view) = self.views.remove(&id) {
                    view.destroy(&mut self.surface);
                    board.write().remove(&id);
                    report.purged += 1;
                }
            } else if let Some(view) = self.views.get_mut(&id) {
                if view.mark_no_longer_in_view(&mut self.surface) > 0 {
                    report.released += 1;
                }
                view.publish(projection);
            }
        }

        if report.purged > 0 {
            log::debug!("Purged {} view states, {} live", report.purged, self.views.len());
        }
    }

    fn apply(
        surface: &mut S,
        views: &mut [ViewState],
        projection: &S::Projection,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut applied = 0;
        for view in views.iter_mut() {
            checkpoint(cancel, FrameStage::ApplyDeltas)?;
            applied += view.apply_delta(surface);
            view.publish(projection);
        }
        Ok(applied)
    }

    fn clear(&mut self) -> usize {
        let count = self.views.len();
        for (_, mut view) in self.views.drain() {
            view.destroy(&mut self.surface);
        }
        count
    }
}

/// Collision-aware renderer of map annotations onto a [`RenderSurface`].
///
/// # Examples
///
/// ```
/// use mapoverlay::{CollisionPolicy, MemorySurface, Renderer};
/// use mapoverlay::types::{AnnotationModel, ImageData, MarkerSpec};
/// use geo::Point;
/// use tokio_util::sync::CancellationToken;
///
/// let renderer = Renderer::new(MemorySurface::new());
/// let models = vec![
///     AnnotationModel::new("cafe")
///         .with_marker(MarkerSpec::at(Point::new(10.0, 10.0)).with_icon(ImageData::blank(16.0, 16.0))),
/// ];
///
/// let report = renderer
///     .try_set_view_models(&models, CollisionPolicy::RemoveIconFirst, false, &CancellationToken::new())
///     .unwrap();
/// assert_eq!(report.created, 1);
/// assert!(renderer.snapshot("cafe").unwrap().is_marker_visible());
/// ```
pub struct Renderer<S: RenderSurface> {
    inner: Mutex<RendererInner<S>>,
    board: RwLock<FxHashMap<String, SnapshotReader>>,
    clock: Arc<dyn Clock>,
}

impl<S: RenderSurface> Renderer<S> {
    /// Renderer with the default configuration and the system clock.
    pub fn new(surface: S) -> Self {
        Self::from_parts(surface, Config::default(), Arc::new(crate::clock::SystemClock::new()))
    }

    pub fn builder(surface: S) -> RendererBuilder<S> {
        RendererBuilder::new(surface)
    }

    pub(crate) fn from_parts(surface: S, config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(RendererInner::new(surface, config)),
            board: RwLock::new(FxHashMap::default()),
            clock,
        }
    }

    /// Render one frame.
    ///
    /// `models` are the annotations that should be visible. With `force_clear`, every
    /// view state absent from `models` is destroyed regardless of its age.
    pub fn try_set_view_models(
        &self,
        models: &[AnnotationModel],
        policy: CollisionPolicy,
        force_clear: bool,
        cancel: &CancellationToken,
    ) -> Result<FrameReport> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        inner.frame(models, policy, force_clear, cancel, now, &self.board)
    }

    /// Like [`try_set_view_models`](Self::try_set_view_models), but logs failures
    /// instead of returning them.
    pub fn set_view_models(
        &self,
        models: &[AnnotationModel],
        policy: CollisionPolicy,
        force_clear: bool,
        cancel: &CancellationToken,
    ) -> Option<FrameReport> {
        match self.try_set_view_models(models, policy, force_clear, cancel) {
            Ok(report) => Some(report),
            Err(e) if e.is_silent() => {
                log::debug!("Frame skipped: {}", e);
                None
            }
            Err(e) => {
                log::warn!("Frame failed: {}", e);
                None
            }
        }
    }

    /// Destroy every view state. Returns how many were destroyed.
    pub fn clear(&self) -> usize {
        // Board cleared under the inner guard so no frame can publish in between
        let mut inner = self.inner.lock();
        let count = inner.clear();
        self.board.write().clear();
        count
    }

    /// Latest published snapshot of one annotation.
    pub fn snapshot(&self, id: &str) -> Option<Arc<ViewSnapshot>> {
        self.board.read().get(id).map(SnapshotReader::load)
    }

    pub fn snapshot_reader(&self, id: &str) -> Option<SnapshotReader> {
        self.board.read().get(id).cloned()
    }

    /// Number of live view states.
    pub fn view_count(&self) -> usize {
        self.inner.lock().views.len()
    }

    pub fn config(&self) -> Config {
        self.inner.lock().config.clone()
    }

    pub fn set_floor_plans_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.config.floor_plans_enabled = enabled;
        for view in inner.views.values_mut() {
            view.set_floor_plans_enabled(enabled);
        }
    }

    pub fn set_models_2d_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.config.models_2d_enabled = enabled;
        for view in inner.views.values_mut() {
            view.set_models_2d_enabled(enabled);
        }
    }

    /// Inspect the surface from inside the exclusive section.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.lock().surface)
    }

    pub fn with_surface_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.lock().surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::surface::MemorySurface;
    use crate::view_state::MarkerState;
    use geo::Point;
    use mapoverlay_types::{ImageData, MarkerSpec};

    fn marker(id: &str, x: f64) -> AnnotationModel {
        AnnotationModel::new(id).with_marker(
            MarkerSpec::at(Point::new(x, 0.0))
                .with_icon(ImageData::blank(10.0, 10.0))
                .with_area(1.0),
        )
    }

    fn renderer(clock: &ManualClock) -> Renderer<MemorySurface> {
        Renderer::builder(MemorySurface::new())
            .clock(clock.clone())
            .build()
            .unwrap()
    }

    fn frame(renderer: &Renderer<MemorySurface>, models: &[AnnotationModel]) -> FrameReport {
        renderer
            .try_set_view_models(
                models,
                CollisionPolicy::RemoveIconAndLabel,
                false,
                &CancellationToken::new(),
            )
            .unwrap()
    }

    #[test]
    fn test_frame_creates_and_updates() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);

        let report = frame(&renderer, &[marker("a", 0.0), marker("b", 100.0)]);
        assert_eq!(report.created, 2);
        assert_eq!(report.in_view, 2);
        assert!(report.deltas_applied > 0);
        assert_eq!(renderer.view_count(), 2);

        let report = frame(&renderer, &[marker("a", 0.0), marker("b", 100.0)]);
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 2);
        assert_eq!(report.deltas_applied, 0);
    }

    #[test]
    fn test_duplicate_ids_later_model_wins() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);

        let report = frame(&renderer, &[marker("a", 0.0), marker("a", 50.0)]);
        assert_eq!(report.created, 1);
        assert_eq!(report.in_view, 1);
        assert_eq!(
            renderer.snapshot("a").unwrap().position,
            Some(Point::new(50.0, 0.0))
        );
    }

    #[test]
    fn test_absent_view_is_hidden_then_purged() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);
        frame(&renderer, &[marker("a", 0.0)]);

        clock.advance(Duration::from_secs(5));
        let report = frame(&renderer, &[]);
        assert_eq!(report.released, 1);
        assert_eq!(report.purged, 0);
        assert!(!renderer.snapshot("a").unwrap().is_marker_visible());
        assert!(renderer.with_surface(|s| s.visible_marker("a").is_none()));

        clock.advance(Duration::from_secs(6));
        let report = frame(&renderer, &[]);
        assert_eq!(report.purged, 1);
        assert!(renderer.snapshot("a").is_none());
        assert!(renderer.with_surface(|s| s.is_empty()));
    }

    #[test]
    fn test_force_clear_destroys_absent_views() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);
        frame(&renderer, &[marker("a", 0.0), marker("b", 100.0)]);

        let report = renderer
            .try_set_view_models(
                &[marker("b", 100.0)],
                CollisionPolicy::RemoveIconAndLabel,
                true,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(report.purged, 1);
        assert_eq!(renderer.view_count(), 1);
    }

    #[test]
    fn test_overlap_pass_runs_in_frame() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);
        let report = frame(&renderer, &[marker("B", 3.0), marker("A", 0.0)]);

        assert_eq!(report.pass.hidden, 1);
        assert_eq!(renderer.snapshot("A").unwrap().marker_state, MarkerState::VisibleIcon);
        assert_eq!(renderer.snapshot("B").unwrap().marker_state, MarkerState::Invisible);
        assert!(renderer.with_surface(|s| s.visible_marker("B").is_none()));
    }

    #[test]
    fn test_missing_projection_skips_frame() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);
        renderer.with_surface_mut(|s| s.set_projection(None));

        let err = renderer
            .try_set_view_models(
                &[marker("a", 0.0)],
                CollisionPolicy::AllowOverlap,
                false,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, OverlayError::ProjectionUnavailable));
        assert!(err.is_silent());
        assert!(renderer
            .set_view_models(&[marker("a", 0.0)], CollisionPolicy::AllowOverlap, false, &CancellationToken::new())
            .is_none());
        assert_eq!(renderer.view_count(), 0);
    }

    #[test]
    fn test_clear() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);
        frame(&renderer, &[marker("a", 0.0), marker("b", 100.0)]);
        assert_eq!(renderer.clear(), 2);
        assert_eq!(renderer.view_count(), 0);
        assert!(renderer.with_surface(|s| s.is_empty()));
    }

    #[test]
    fn test_clear_racing_frames_keeps_board_consistent() {
        let clock = ManualClock::new();
        let renderer = renderer(&clock);
        let models: Vec<_> = (0..8).map(|i| marker(&format!("m{i}"), i as f64 * 50.0)).collect();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    frame(&renderer, &models);
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    renderer.clear();
                }
            });
        });

        // Every live view has a published reader and nothing else does
        let live = renderer.view_count();
        let published = models
            .iter()
            .filter(|model| renderer.snapshot(&model.id).is_some())
            .count();
        assert_eq!(live, published);

        frame(&renderer, &models);
        assert_eq!(renderer.view_count(), models.len());
        assert!(models.iter().all(|model| renderer.snapshot(&model.id).is_some()));
    }

    #[test]
    fn test_renderer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Renderer<MemorySurface>>();
    }
}
