//! Facet states and the desired/applied value pair.

use mapoverlay_types::MarkerSpec;

/// Visibility state of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MarkerState {
    /// No model has been seen yet.
    #[default]
    Undefined,
    Invisible,
    VisibleIcon,
    VisibleLabel,
    VisibleIconLabel,
}

impl MarkerState {
    /// Derive the state from which images a marker carries.
    pub fn for_marker(marker: &MarkerSpec) -> Self {
        match (marker.icon.is_some(), marker.label.is_some()) {
            (true, true) => MarkerState::VisibleIconLabel,
            (true, false) => MarkerState::VisibleIcon,
            (false, true) => MarkerState::VisibleLabel,
            (false, false) => MarkerState::Invisible,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(
            self,
            MarkerState::VisibleIcon | MarkerState::VisibleLabel | MarkerState::VisibleIconLabel
        )
    }

    pub fn is_icon_visible(&self) -> bool {
        matches!(self, MarkerState::VisibleIcon | MarkerState::VisibleIconLabel)
    }

    pub fn is_label_visible(&self) -> bool {
        matches!(self, MarkerState::VisibleLabel | MarkerState::VisibleIconLabel)
    }
}

/// Visibility state of a polygon, floor plan or 2D model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FacetState {
    #[default]
    Undefined,
    Invisible,
    Visible,
}

impl FacetState {
    pub fn from_visible(visible: bool) -> Self {
        if visible {
            FacetState::Visible
        } else {
            FacetState::Invisible
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, FacetState::Visible)
    }
}

/// A desired value together with the value last pushed to the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    current: T,
    applied: T,
}

impl<T: Clone + PartialEq> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: value.clone(),
            applied: value,
        }
    }

    /// Desired value.
    pub fn get(&self) -> &T {
        &self.current
    }

    pub fn applied(&self) -> &T {
        &self.applied
    }

    /// Set the desired value. Returns `true` when it differs from the applied one.
    pub fn set(&mut self, value: T) -> bool {
        self.current = value;
        self.is_dirty()
    }

    pub fn is_dirty(&self) -> bool {
        self.current != self.applied
    }

    pub fn commit(&mut self) {
        self.applied = self.current.clone();
    }

    /// Set and commit in one step, for values applied outside the delta flow.
    pub fn force(&mut self, value: T) {
        self.current = value.clone();
        self.applied = value;
    }
}

impl<T: Clone + PartialEq + Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
