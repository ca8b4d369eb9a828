//! Overlap resolution between marker bounding boxes.
//!
//! One pass indexes the screen boxes of every in-view marker, then walks the view
//! states from smallest to largest area and resolves each colliding pair once,
//! according to a [`CollisionPolicy`].

use crate::config::CollisionPolicy;
use crate::error::{FrameStage, OverlayError, Result};
use crate::spatial_index::SpatialIndex;
use crate::surface::Projection;
use crate::view_state::{MarkerState, ViewState};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a single overlap pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    #[default]
    Idle,
    Indexed,
    Resolving,
    Done,
}

/// Counters of one overlap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pairs_examined: usize,
    pub collisions: usize,
    pub hidden: usize,
    pub reduced: usize,
}

/// What resolving one colliding pair changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    LoserReduced,
    WinnerReduced,
    LoserHidden,
}

fn easting(view: &ViewState) -> f64 {
    view.position().map_or(f64::NEG_INFINITY, |position| position.x())
}

/// Total order on collision participants; `Less` means `a` wins.
fn collision_order(a: &ViewState, b: &ViewState) -> Ordering {
    match (a.is_forced(), b.is_forced()) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    a.poi_area()
        .total_cmp(&b.poi_area())
        .then_with(|| a.id().cmp(b.id()))
        .then_with(|| easting(b).total_cmp(&easting(a)))
}

/// Decide which of two colliding view states keeps its marker.
///
/// A force-rendered marker beats one that is not, then the smaller area wins, then the
/// lexicographically smaller identifier, then the more easterly position. Returns
/// `(winner, loser)`; swapping the arguments swaps nothing in the result.
pub fn decide_collision<'a>(a: &'a ViewState, b: &'a ViewState) -> (&'a ViewState, &'a ViewState) {
    if collision_order(a, b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    }
}

/// Runs overlap passes over in-view view states.
#[derive(Debug)]
pub struct OverlapEngine {
    index: SpatialIndex,
    resolved: FxHashSet<(usize, usize)>,
    threshold: f64,
    state: PassState,
}

impl OverlapEngine {
    /// `threshold` is the fraction of either box that must overlap to count as a collision.
    pub fn new(threshold: f64) -> Self {
        Self {
            index: SpatialIndex::new(),
            resolved: FxHashSet::default(),
            threshold,
            state: PassState::Idle,
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Resolve collisions among `views` by changing their marker states.
    ///
    /// Views are walked in area order and each unordered pair is decided at most once.
    /// Participants are not retired after a collision: a marker that won against one
    /// neighbour is still tested against markers visited later, so it can hide (or lose
    /// to) several of them in the same pass.
    pub fn run<P: Projection>(
        &mut self,
        views: &mut [ViewState],
        policy: CollisionPolicy,
        projection: &P,
        cancel: &CancellationToken,
    ) -> Result<PassReport> {
        self.index.clear();
        self.resolved.clear();
        self.state = PassState::Idle;

        let mut report = PassReport::default();
        if policy == CollisionPolicy::AllowOverlap {
            self.state = PassState::Done;
            return Ok(report);
        }

        let mut order: Vec<usize> = (0..views.len()).collect();
        order.sort_by(|&a, &b| {
            views[a]
                .poi_area()
                .total_cmp(&views[b].poi_area())
                .then_with(|| views[a].id().cmp(views[b].id()))
        });
        let mut rank = vec![0usize; views.len()];
        for (position, &slot) in order.iter().enumerate() {
            rank[slot] = position;
        }

        for &slot in &order {
            if let Some(rect) = views[slot].bounds(projection) {
                self.index.insert(views[slot].id(), slot, rect);
            }
        }
        self.state = PassState::Indexed;
        log::trace!("Indexed {} of {} view states", self.index.len(), views.len());

        self.state = PassState::Resolving;
        for &slot in &order {
            if cancel.is_cancelled() {
                self.state = PassState::Idle;
                return Err(OverlayError::Cancelled(FrameStage::ResolveOverlaps));
            }

            let Some(rect) = views[slot].bounds(projection) else {
                continue;
            };
            let mut hits = self.index.query(&rect);
            hits.sort_by_key(|&hit| rank[hit]);

            for hit in hits {
                if hit == slot || views[hit].id() == views[slot].id() {
                    continue;
                }
                if !self.resolved.insert((slot.min(hit), slot.max(hit))) {
                    continue;
                }
                if !views[slot].marker_state().is_visible() {
                    break;
                }
                if !views[hit].marker_state().is_visible() {
                    continue;
                }

                report.pairs_examined += 1;
                let (winner, loser) = match collision_order(&views[slot], &views[hit]) {
                    Ordering::Greater => (hit, slot),
                    _ => (slot, hit),
                };
                if !self.collides(views, winner, loser, projection) {
                    continue;
                }

                report.collisions += 1;
                match self.resolve(views, winner, loser, policy, projection) {
                    Outcome::LoserHidden => report.hidden += 1,
                    Outcome::LoserReduced | Outcome::WinnerReduced => report.reduced += 1,
                    Outcome::Unchanged => {}
                }
            }
        }

        self.state = PassState::Done;
        log::debug!(
            "Overlap pass: {} pairs, {} collisions, {} hidden, {} reduced",
            report.pairs_examined,
            report.collisions,
            report.hidden,
            report.reduced
        );
        Ok(report)
    }

    fn collides<P: Projection>(
        &self,
        views: &[ViewState],
        a: usize,
        b: usize,
        projection: &P,
    ) -> bool {
        match (views[a].bounds(projection), views[b].bounds(projection)) {
            (Some(first), Some(second)) => first.intersects_by_at_least(&second, self.threshold),
            _ => false,
        }
    }

    fn resolve<P: Projection>(
        &mut self,
        views: &mut [ViewState],
        winner: usize,
        loser: usize,
        policy: CollisionPolicy,
        projection: &P,
    ) -> Outcome {
        self.index.remove(winner);
        self.index.remove(loser);

        let outcome = match policy {
            CollisionPolicy::AllowOverlap => Outcome::Unchanged,
            CollisionPolicy::RemoveIconAndLabel => {
                if views[loser].is_forced() {
                    Outcome::Unchanged
                } else {
                    views[loser].set_marker_state(MarkerState::Invisible);
                    Outcome::LoserHidden
                }
            }
            CollisionPolicy::RemoveIconFirst => {
                self.reduce_first(views, winner, loser, MarkerState::VisibleLabel, projection)
            }
            CollisionPolicy::RemoveLabelFirst => {
                self.reduce_first(views, winner, loser, MarkerState::VisibleIcon, projection)
            }
        };

        for slot in [winner, loser] {
            if let Some(rect) = views[slot].bounds(projection) {
                self.index.insert(views[slot].id(), slot, rect);
            }
        }
        log::trace!(
            "'{}' beat '{}': {:?}",
            views[winner].id(),
            views[loser].id(),
            outcome
        );
        outcome
    }

    fn reduce_first<P: Projection>(
        &self,
        views: &mut [ViewState],
        winner: usize,
        loser: usize,
        reduced: MarkerState,
        projection: &P,
    ) -> Outcome {
        let reducible =
            |view: &ViewState| !view.is_forced() && view.marker_state() == MarkerState::VisibleIconLabel;

        if reducible(&views[loser]) {
            let original = views[loser].marker_state();
            views[loser].set_marker_state(reduced);
            if !self.collides(views, winner, loser, projection) {
                return Outcome::LoserReduced;
            }
            views[loser].set_marker_state(original);
        }

        let mut outcome = Outcome::Unchanged;
        if reducible(&views[winner]) {
            views[winner].set_marker_state(reduced);
            if !self.collides(views, winner, loser, projection) {
                return Outcome::WinnerReduced;
            }
            outcome = Outcome::WinnerReduced;
        }

        if !views[loser].is_forced() {
            views[loser].set_marker_state(MarkerState::Invisible);
            outcome = Outcome::LoserHidden;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::LinearProjection;
    use crate::view_state::ViewSettings;
    use geo::Point;
    use mapoverlay_types::{AnnotationModel, ImageData, LabelImage, MarkerSpec};
    use std::time::Duration;

    fn icon_view(id: &str, x: f64, area: f64) -> ViewState {
        view_from(
            id,
            MarkerSpec::at(Point::new(x, 0.0))
                .with_icon(ImageData::blank(10.0, 10.0))
                .with_area(area),
        )
    }

    fn view_from(id: &str, marker: MarkerSpec) -> ViewState {
        let mut view = ViewState::new(id, ViewSettings::default());
        view.compute_delta(
            &AnnotationModel::new(id).with_marker(marker),
            Duration::ZERO,
            21.0,
        );
        view
    }

    fn run(views: &mut [ViewState], policy: CollisionPolicy) -> PassReport {
        let mut engine = OverlapEngine::new(0.15);
        let report = engine
            .run(
                views,
                policy,
                &LinearProjection::identity(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(engine.state(), PassState::Done);
        report
    }

    #[test]
    fn test_decide_collision_is_antisymmetric() {
        let views = [
            icon_view("a", 0.0, 10.0),
            icon_view("b", 0.0, 10.0),
            icon_view("c", 5.0, 5.0),
            icon_view("a", 3.0, 10.0),
            view_from("f", MarkerSpec::at(Point::new(0.0, 0.0)).with_area(1e6).force_render(true)),
        ];
        for a in &views {
            for b in &views {
                let (w1, l1) = decide_collision(a, b);
                let (w2, l2) = decide_collision(b, a);
                assert!(std::ptr::eq(w1, l2) && std::ptr::eq(l1, w2) || std::ptr::eq(a, b));
                let (w3, _) = decide_collision(a, b);
                assert!(std::ptr::eq(w1, w3));
            }
        }
    }

    #[test]
    fn test_decide_collision_rules() {
        let small = icon_view("z", 0.0, 1.0);
        let large = icon_view("a", 0.0, 2.0);
        assert_eq!(decide_collision(&large, &small).0.id(), "z");

        let a = icon_view("a", 0.0, 2.0);
        let b = icon_view("b", 0.0, 2.0);
        assert_eq!(decide_collision(&b, &a).0.id(), "a");

        let west = icon_view("same", -3.0, 2.0);
        let east = icon_view("same", 4.0, 2.0);
        assert_eq!(decide_collision(&west, &east).0.position(), Some(Point::new(4.0, 0.0)));
    }

    #[test]
    fn test_thirty_percent_overlap_hides_b() {
        // 10x10 boxes shifted by 7 px overlap 30%
        let mut views = vec![icon_view("B", 7.0, 5.0), icon_view("A", 0.0, 5.0)];
        let report = run(&mut views, CollisionPolicy::RemoveIconAndLabel);

        assert_eq!(views[1].marker_state(), MarkerState::VisibleIcon);
        assert_eq!(views[0].marker_state(), MarkerState::Invisible);
        assert_eq!(report.collisions, 1);
        assert_eq!(report.hidden, 1);
    }

    #[test]
    fn test_winner_keeps_resolving_later_pairs() {
        // B and C each overlap A by 30% but not each other; A is forced and visited last
        let forced = view_from(
            "A",
            MarkerSpec::at(Point::new(0.0, 0.0))
                .with_icon(ImageData::blank(10.0, 10.0))
                .with_area(100.0)
                .force_render(true),
        );
        let mut views = vec![forced, icon_view("B", 7.0, 1.0), icon_view("C", -7.0, 2.0)];
        let report = run(&mut views, CollisionPolicy::RemoveIconAndLabel);

        assert_eq!(views[0].marker_state(), MarkerState::VisibleIcon);
        assert_eq!(views[1].marker_state(), MarkerState::Invisible);
        assert_eq!(views[2].marker_state(), MarkerState::Invisible);
        assert_eq!(report.pairs_examined, 2);
        assert_eq!(report.collisions, 2);
        assert_eq!(report.hidden, 2);
    }

    #[test]
    fn test_small_overlap_is_tolerated() {
        // 1 px of 10 overlaps
        let mut views = vec![icon_view("A", 0.0, 5.0), icon_view("B", 9.0, 5.0)];
        let report = run(&mut views, CollisionPolicy::RemoveIconAndLabel);
        assert_eq!(report.pairs_examined, 1);
        assert_eq!(report.collisions, 0);
        assert!(views.iter().all(|v| v.marker_state().is_visible()));
    }

    #[test]
    fn test_forced_beats_smaller_area() {
        let forced = view_from(
            "forced",
            MarkerSpec::at(Point::new(0.0, 0.0))
                .with_icon(ImageData::blank(10.0, 10.0))
                .with_area(1_000.0)
                .force_render(true),
        );
        let small = icon_view("small", 2.0, 1.0);
        assert_eq!(decide_collision(&small, &forced).0.id(), "forced");

        let mut views = vec![small, forced];
        run(&mut views, CollisionPolicy::RemoveIconAndLabel);
        assert_eq!(views[1].marker_state(), MarkerState::VisibleIcon);
        assert_eq!(views[0].marker_state(), MarkerState::Invisible);
    }

    #[test]
    fn test_forced_never_hidden() {
        for policy in [
            CollisionPolicy::RemoveIconFirst,
            CollisionPolicy::RemoveLabelFirst,
            CollisionPolicy::RemoveIconAndLabel,
        ] {
            let forced = |id: &str| {
                view_from(
                    id,
                    MarkerSpec::at(Point::new(0.0, 0.0))
                        .with_icon(ImageData::blank(10.0, 10.0))
                        .with_label(LabelImage::new(id, ImageData::blank(30.0, 10.0)))
                        .collidable(false),
                )
            };
            let mut views = vec![forced("x"), forced("y")];
            run(&mut views, policy);
            for view in &views {
                assert_eq!(view.marker_state(), MarkerState::VisibleIconLabel, "{policy}");
            }
        }
    }

    #[test]
    fn test_no_self_collision() {
        let mut views = vec![icon_view("a", 0.0, 5.0), icon_view("a", 1.0, 5.0)];
        let report = run(&mut views, CollisionPolicy::RemoveIconAndLabel);
        assert_eq!(report.pairs_examined, 0);
        assert!(views.iter().all(|v| v.marker_state().is_visible()));
    }

    #[test]
    fn test_remove_icon_first_reduces_loser() {
        let labelled = |id: &str, y: f64, area: f64| {
            let mut view = ViewState::new(id, ViewSettings::default());
            view.compute_delta(
                &AnnotationModel::new(id).with_marker(
                    MarkerSpec::at(Point::new(0.0, y))
                        .with_icon(ImageData::blank(20.0, 20.0))
                        .with_label(LabelImage::new(id, ImageData::blank(60.0, 4.0)))
                        .with_area(area),
                ),
                Duration::ZERO,
                21.0,
            );
            view
        };
        // composed boxes are 83x20 and overlap by 8 rows; b's label alone starts where a ends
        let mut views = vec![labelled("a", 0.0, 1.0), labelled("b", 12.0, 2.0)];
        let report = run(&mut views, CollisionPolicy::RemoveIconFirst);

        assert_eq!(views[0].marker_state(), MarkerState::VisibleIconLabel);
        assert_eq!(views[1].marker_state(), MarkerState::VisibleLabel);
        assert_eq!(report.reduced, 1);
        assert_eq!(report.hidden, 0);
    }

    #[test]
    fn test_remove_label_first_falls_back_to_hiding() {
        let stacked = |id: &str, area: f64| {
            view_from(
                id,
                MarkerSpec::at(Point::new(0.0, 0.0))
                    .with_icon(ImageData::blank(20.0, 20.0))
                    .with_label(LabelImage::new(id, ImageData::blank(20.0, 20.0)))
                    .with_area(area),
            )
        };
        let mut views = vec![stacked("a", 1.0), stacked("b", 2.0)];
        let report = run(&mut views, CollisionPolicy::RemoveLabelFirst);

        // same position: neither reduction helps, the winner keeps its reduction
        assert_eq!(views[0].marker_state(), MarkerState::VisibleIcon);
        assert_eq!(views[1].marker_state(), MarkerState::Invisible);
        assert_eq!(report.hidden, 1);
    }

    #[test]
    fn test_chain_resolves_every_pair() {
        let mut views = vec![
            icon_view("a", 0.0, 1.0),
            icon_view("b", 5.0, 2.0),
            icon_view("c", 10.0, 3.0),
        ];
        run(&mut views, CollisionPolicy::RemoveIconAndLabel);
        // b loses to a; c no longer collides with a hidden b
        assert!(views[0].marker_state().is_visible());
        assert!(!views[1].marker_state().is_visible());
        assert!(views[2].marker_state().is_visible());
    }

    #[test]
    fn test_allow_overlap_skips_pass() {
        let mut views = vec![icon_view("a", 0.0, 1.0), icon_view("b", 0.0, 2.0)];
        let report = run(&mut views, CollisionPolicy::AllowOverlap);
        assert_eq!(report, PassReport::default());
        assert!(views.iter().all(|v| v.marker_state().is_visible()));
    }

    #[test]
    fn test_cancelled_pass() {
        let mut views = vec![icon_view("a", 0.0, 1.0), icon_view("b", 0.0, 2.0)];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut engine = OverlapEngine::new(0.15);
        let err = engine
            .run(
                &mut views,
                CollisionPolicy::RemoveIconAndLabel,
                &LinearProjection::identity(),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, OverlayError::Cancelled(FrameStage::ResolveOverlaps)));
        assert_eq!(engine.state(), PassState::Idle);
        assert!(views.iter().all(|v| v.marker_state().is_visible()));
    }
}
