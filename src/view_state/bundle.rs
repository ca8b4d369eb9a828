//! Icon and label layout for a single marker.

use super::delta::MarkerAnchors;
use super::state::MarkerState;
use crate::surface::MarkerImage;
use mapoverlay_types::{Anchor, IconPlacement, ImageData, LabelAnchor, LabelPosition, MarkerSpec, ScreenSize};

/// Icon and label images of a marker and how they are composed.
#[derive(Debug, Clone, PartialEq)]
pub struct IconLabelBundle {
    icon: Option<ImageData>,
    label: Option<ImageData>,
    layout: LabelPosition,
    spacing: f64,
}

impl IconLabelBundle {
    pub fn new(
        icon: Option<ImageData>,
        label: Option<ImageData>,
        layout: LabelPosition,
        spacing: f64,
    ) -> Self {
        Self {
            icon,
            label,
            layout,
            spacing,
        }
    }

    /// Bundle for a marker spec, or `None` when it has neither icon nor label.
    pub fn from_marker(marker: &MarkerSpec, spacing: f64) -> Option<Self> {
        if marker.icon.is_none() && marker.label.is_none() {
            return None;
        }
        Some(Self::new(
            marker.icon.clone(),
            marker.label.as_ref().map(|label| label.image.clone()),
            LabelPosition::from_anchor(marker.label_anchor),
            spacing,
        ))
    }

    pub fn layout(&self) -> LabelPosition {
        self.layout
    }

    pub fn icon_size(&self) -> ScreenSize {
        self.icon.as_ref().map_or(ScreenSize::ZERO, ImageData::size)
    }

    pub fn label_size(&self) -> ScreenSize {
        self.label.as_ref().map_or(ScreenSize::ZERO, ImageData::size)
    }

    /// Size of icon and label drawn together.
    ///
    /// With only one of the two images the composed image is that image.
    pub fn composed_size(&self) -> ScreenSize {
        let (icon, label) = (self.icon_size(), self.label_size());
        match (&self.icon, &self.label) {
            (Some(_), Some(_)) if self.layout.is_vertical() => ScreenSize::new(
                icon.width.max(label.width),
                icon.height + label.height + self.spacing,
            ),
            (Some(_), Some(_)) => ScreenSize::new(
                icon.width + label.width + self.spacing,
                icon.height.max(label.height),
            ),
            (Some(_), None) => icon,
            (None, Some(_)) => label,
            (None, None) => ScreenSize::ZERO,
        }
    }

    /// Image the marker shows in `state`, or `None` when nothing is displayed.
    pub fn image_for(&self, state: MarkerState) -> Option<MarkerImage> {
        let (icon, label, size) = match state {
            MarkerState::VisibleIconLabel => {
                (self.icon.clone(), self.label.clone(), self.composed_size())
            }
            MarkerState::VisibleIcon => (Some(self.icon.clone()?), None, self.icon_size()),
            MarkerState::VisibleLabel => (None, Some(self.label.clone()?), self.label_size()),
            MarkerState::Invisible | MarkerState::Undefined => return None,
        };
        Some(MarkerImage {
            icon,
            label,
            layout: self.layout,
            size,
        })
    }

    /// Ground and info-window anchors for `state`.
    pub fn anchors(
        &self,
        state: MarkerState,
        icon_placement: Option<IconPlacement>,
        label_anchor: Option<LabelAnchor>,
    ) -> MarkerAnchors {
        let top_center = Anchor::new(0.5, 0.0);

        if state.is_icon_visible() && state.is_label_visible() {
            let ax = fraction(self.icon_size().width * 0.5, self.composed_size().width);
            let ground = match (icon_placement, label_anchor) {
                (Some(IconPlacement::Bottom), Some(LabelAnchor::Top)) => {
                    let (label, icon) = (self.label_size().height, self.icon_size().height);
                    Anchor::new(0.5, fraction(label.min(icon), label.max(icon)))
                }
                (Some(IconPlacement::Bottom), Some(_)) => Anchor::new(ax, 1.0),
                (Some(IconPlacement::Top), Some(_)) => Anchor::new(ax, 0.0),
                (Some(IconPlacement::Left), Some(_)) => Anchor::new(0.0, 0.5),
                (Some(IconPlacement::Right), Some(_)) => Anchor::new(2.0 * ax, 0.5),
                _ => Anchor::new(ax, 0.5),
            };
            return MarkerAnchors {
                ground,
                info_window: Anchor::new(ax, 0.0),
            };
        }

        if state.is_icon_visible() {
            let ground = match icon_placement {
                Some(IconPlacement::Bottom) => Anchor::new(0.5, 1.0),
                Some(IconPlacement::Top) => Anchor::new(0.5, 0.0),
                Some(IconPlacement::Left) => Anchor::new(0.0, 0.5),
                Some(IconPlacement::Right) => Anchor::new(1.0, 0.5),
                Some(IconPlacement::Center) | None => Anchor::CENTER,
            };
            return MarkerAnchors {
                ground,
                info_window: top_center,
            };
        }

        MarkerAnchors {
            ground: Anchor::CENTER,
            info_window: top_center,
        }
    }
}

// Unit fraction `part / whole`, 0.5 when undefined.
fn fraction(part: f64, whole: f64) -> f64 {
    let value = part / whole;
    if value.is_finite() { value } else { 0.5 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(layout: LabelPosition) -> IconLabelBundle {
        IconLabelBundle::new(
            Some(ImageData::blank(20.0, 20.0)),
            Some(ImageData::blank(57.0, 10.0)),
            layout,
            3.0,
        )
    }

    #[test]
    fn test_composed_size_side_by_side() {
        let size = bundle(LabelPosition::Right).composed_size();
        assert_eq!(size, ScreenSize::new(80.0, 20.0));
    }

    #[test]
    fn test_composed_size_stacked() {
        let size = bundle(LabelPosition::Bottom).composed_size();
        assert_eq!(size, ScreenSize::new(57.0, 33.0));
    }

    #[test]
    fn test_single_image_is_its_own_composition() {
        let icon_only =
            IconLabelBundle::new(Some(ImageData::blank(24.0, 30.0)), None, LabelPosition::Right, 3.0);
        assert_eq!(icon_only.composed_size(), ScreenSize::new(24.0, 30.0));
        assert!(icon_only.image_for(MarkerState::VisibleLabel).is_none());
        assert_eq!(
            icon_only.image_for(MarkerState::VisibleIcon).map(|i| i.size),
            Some(ScreenSize::new(24.0, 30.0))
        );
    }

    #[test]
    fn test_image_for_state() {
        let bundle = bundle(LabelPosition::Right);
        let both = bundle.image_for(MarkerState::VisibleIconLabel).unwrap();
        assert!(both.icon.is_some() && both.label.is_some());
        assert_eq!(both.size, ScreenSize::new(80.0, 20.0));

        let label = bundle.image_for(MarkerState::VisibleLabel).unwrap();
        assert!(label.icon.is_none());
        assert_eq!(label.size, ScreenSize::new(57.0, 10.0));

        assert!(bundle.image_for(MarkerState::Invisible).is_none());
        assert!(bundle.image_for(MarkerState::Undefined).is_none());
    }

    #[test]
    fn test_icon_label_anchors() {
        let bundle = bundle(LabelPosition::Right);
        // icon centre sits at 10 px of an 80 px wide image
        let default = bundle.anchors(MarkerState::VisibleIconLabel, None, None);
        assert_eq!(default.ground, Anchor::new(0.125, 0.5));
        assert_eq!(default.info_window, Anchor::new(0.125, 0.0));

        let right = bundle.anchors(
            MarkerState::VisibleIconLabel,
            Some(IconPlacement::Right),
            Some(LabelAnchor::Left),
        );
        assert_eq!(right.ground, Anchor::new(0.25, 0.5));

        let bottom_top = bundle.anchors(
            MarkerState::VisibleIconLabel,
            Some(IconPlacement::Bottom),
            Some(LabelAnchor::Top),
        );
        assert_eq!(bottom_top.ground, Anchor::new(0.5, 0.5));

        let placement_only =
            bundle.anchors(MarkerState::VisibleIconLabel, Some(IconPlacement::Top), None);
        assert_eq!(placement_only.ground, Anchor::new(0.125, 0.5));
    }

    #[test]
    fn test_icon_only_anchors() {
        let bundle = bundle(LabelPosition::Right);
        let bottom = bundle.anchors(MarkerState::VisibleIcon, Some(IconPlacement::Bottom), None);
        assert_eq!(bottom.ground, Anchor::new(0.5, 1.0));
        assert_eq!(bottom.info_window, Anchor::new(0.5, 0.0));

        let left = bundle.anchors(MarkerState::VisibleIcon, Some(IconPlacement::Left), None);
        assert_eq!(left.ground, Anchor::new(0.0, 0.5));
        let right = bundle.anchors(MarkerState::VisibleIcon, Some(IconPlacement::Right), None);
        assert_eq!(right.ground, Anchor::new(1.0, 0.5));
    }

    #[test]
    fn test_label_only_and_hidden_anchors_are_centered() {
        let bundle = bundle(LabelPosition::Right);
        for state in [MarkerState::VisibleLabel, MarkerState::Invisible] {
            let anchors = bundle.anchors(state, Some(IconPlacement::Bottom), Some(LabelAnchor::Top));
            assert_eq!(anchors.ground, Anchor::CENTER);
        }
    }

    #[test]
    fn test_degenerate_sizes_fall_back_to_center() {
        let bundle = IconLabelBundle::new(
            Some(ImageData::blank(0.0, 0.0)),
            Some(ImageData::blank(0.0, 0.0)),
            LabelPosition::Right,
            0.0,
        );
        let anchors = bundle.anchors(MarkerState::VisibleIconLabel, None, None);
        assert!(anchors.ground.is_finite());
        assert_eq!(anchors.ground, Anchor::new(0.5, 0.5));
    }
}
