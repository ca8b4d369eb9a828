use serde::{Deserialize, Serialize};

/// A geographic point, x = longitude and y = latitude.
pub type GeoPoint = geo::Point<f64>;

/// A closed ring of geographic coordinates.
pub type Path = geo::LineString<f64>;

/// A point in screen space, in pixels, with the origin at the top-left of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A size in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl ScreenSize {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A size is empty when either side is zero, negative or not a number.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Anchor point of an image, expressed in unit fractions of its width and height.
///
/// `(0.0, 0.0)` is the top-left corner and `(1.0, 1.0)` the bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub const CENTER: Self = Self::new(0.5, 0.5);

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

/// An axis-aligned rectangle in screen space.
///
/// # Examples
///
/// ```
/// use mapoverlay_types::geometry::ScreenRect;
///
/// let rect = ScreenRect::new(10.0, 20.0, 30.0, 40.0);
/// assert_eq!(rect.max_x(), 40.0);
/// assert_eq!(rect.area(), 1200.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two opposite corners, in any order.
    pub fn from_corners(a: ScreenPoint, b: ScreenPoint) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self::new(min_x, min_y, a.x.max(b.x) - min_x, a.y.max(b.y) - min_y)
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> ScreenSize {
        ScreenSize::new(self.width, self.height)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Round the origin and the size down to whole pixels.
    pub fn floored(&self) -> Self {
        Self::new(
            self.x.floor(),
            self.y.floor(),
            self.width.floor(),
            self.height.floor(),
        )
    }

    /// The overlapping region of two rectangles, if it has a positive area.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    pub fn intersection(&self, other: &ScreenRect) -> Option<ScreenRect> {
        let min_x = self.min_x().max(other.min_x());
        let min_y = self.min_y().max(other.min_y());
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());

        if max_x > min_x && max_y > min_y {
            Some(ScreenRect::new(min_x, min_y, max_x - min_x, max_y - min_y))
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &ScreenRect) -> bool {
        self.intersection(other).is_some()
    }

    /// Check whether two rectangles overlap by at least `threshold` of either one's area.
    ///
    /// `threshold` must lie in `0.0..=1.0`; values outside that range never match.
    /// A threshold of `0.0` reduces to a plain positive-area intersection test.
    /// Degenerate rectangles (zero or negative area) never match.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapoverlay_types::geometry::ScreenRect;
    ///
    /// let a = ScreenRect::new(0.0, 0.0, 10.0, 10.0);
    /// let b = ScreenRect::new(8.0, 0.0, 10.0, 10.0);
    ///
    /// // 20% of each box overlaps
    /// assert!(a.intersects_by_at_least(&b, 0.2));
    /// assert!(!a.intersects_by_at_least(&b, 0.25));
    /// ```
    pub fn intersects_by_at_least(&self, other: &ScreenRect, threshold: f64) -> bool {
        if !(0.0..=1.0).contains(&threshold) {
            return false;
        }

        let self_area = self.area();
        let other_area = other.area();
        if !(self_area > 0.0 && other_area > 0.0) {
            return false;
        }

        let Some(intersection) = self.intersection(other) else {
            return false;
        };

        let overlap = intersection.area();
        overlap / self_area >= threshold || overlap / other_area >= threshold
    }
}

/// Geographic bounds given by their south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl GeoBounds {
    pub fn new(south_west: GeoPoint, north_east: GeoPoint) -> Self {
        Self {
            south_west,
            north_east,
        }
    }
}
