//! Renderer configuration and collision policies.
//!
//! All configuration types are serializable so they can be loaded from JSON (or TOML
//! with the `toml` feature) alongside the rest of an application's settings.

use crate::error::OverlayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How overlapping markers are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Markers may overlap freely; the overlap pass is skipped.
    AllowOverlap,
    /// Drop icons before labels, then hide the losing marker.
    #[default]
    RemoveIconFirst,
    /// Drop labels before icons, then hide the losing marker.
    RemoveLabelFirst,
    /// Hide the losing marker outright.
    RemoveIconAndLabel,
}

impl CollisionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollisionPolicy::AllowOverlap => "allow_overlap",
            CollisionPolicy::RemoveIconFirst => "remove_icon_first",
            CollisionPolicy::RemoveLabelFirst => "remove_label_first",
            CollisionPolicy::RemoveIconAndLabel => "remove_icon_and_label",
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollisionPolicy {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow_overlap" => Ok(CollisionPolicy::AllowOverlap),
            "remove_icon_first" => Ok(CollisionPolicy::RemoveIconFirst),
            "remove_label_first" => Ok(CollisionPolicy::RemoveLabelFirst),
            "remove_icon_and_label" => Ok(CollisionPolicy::RemoveIconAndLabel),
            other => Err(OverlayError::UnknownPolicy(other.to_string())),
        }
    }
}

/// A half-open z-index range `[start, end)` reserved for one overlay category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZBand {
    pub start: i32,
    pub end: i32,
}

impl ZBand {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Fold an area value into this band.
    ///
    /// Equal areas always map to the same z-index and larger areas (within one fold)
    /// map to lower z-indices, so small features draw above large ones. Returns `None`
    /// when the result is not finite.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapoverlay::ZBand;
    ///
    /// let band = ZBand::new(1_000, 2_000);
    /// assert_eq!(band.fold(100.0), Some(1_900));
    /// assert_eq!(band.fold(f64::NAN), None);
    /// ```
    pub fn fold(&self, area: f64) -> Option<i32> {
        let span = f64::from(self.end) - f64::from(self.start);
        if !(span > 0.0) || !area.is_finite() {
            return None;
        }

        let z = (f64::from(self.end) - area).abs() % span + f64::from(self.start);
        if !z.is_finite() {
            return None;
        }
        Some(z as i32)
    }

    pub fn contains(&self, z: i32) -> bool {
        (self.start..self.end).contains(&z)
    }
}

/// Z-index layout for every overlay category.
///
/// Bands must not overlap and must be ordered markers < polygons < floor plans < 2D models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZIndexBands {
    #[serde(default = "ZIndexBands::default_marker")]
    pub marker: i32,
    #[serde(default = "ZIndexBands::default_polygons")]
    pub polygons: ZBand,
    #[serde(default = "ZIndexBands::default_floor_plans")]
    pub floor_plans: ZBand,
    #[serde(default = "ZIndexBands::default_models_2d")]
    pub models_2d: ZBand,
}

impl ZIndexBands {
    const fn default_marker() -> i32 {
        100
    }

    const fn default_polygons() -> ZBand {
        ZBand::new(1_000, 100_000)
    }

    const fn default_floor_plans() -> ZBand {
        ZBand::new(100_000, 200_000)
    }

    const fn default_models_2d() -> ZBand {
        ZBand::new(200_000, 300_000)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, band) in [
            ("polygons", self.polygons),
            ("floor_plans", self.floor_plans),
            ("models_2d", self.models_2d),
        ] {
            if band.end <= band.start {
                return Err(format!("Z-index band `{name}` must have end > start"));
            }
        }

        if self.marker >= self.polygons.start
            || self.polygons.end > self.floor_plans.start
            || self.floor_plans.end > self.models_2d.start
        {
            return Err(
                "Z-index bands must be ordered marker < polygons < floor_plans < models_2d"
                    .to_string(),
            );
        }

        Ok(())
    }
}

impl Default for ZIndexBands {
    fn default() -> Self {
        Self {
            marker: Self::default_marker(),
            polygons: Self::default_polygons(),
            floor_plans: Self::default_floor_plans(),
            models_2d: Self::default_models_2d(),
        }
    }
}

/// Renderer configuration
///
/// # Example
///
/// ```rust
/// use mapoverlay::Config;
/// use std::time::Duration;
///
/// let config = Config::default();
/// assert_eq!(config.retention(), Duration::from_secs(10));
///
/// let json = r#"{
///     "max_view_states": 500,
///     "intersection_threshold": 0.25,
///     "floor_plans_enabled": true
/// }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.max_view_states, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seconds an annotation stays cached after leaving the visible set
    #[serde(default = "Config::default_retention_seconds")]
    pub retention_seconds: f64,

    /// Ceiling on live view states; absent ones are purged early above it
    #[serde(default = "Config::default_max_view_states")]
    pub max_view_states: usize,

    /// Minimum overlap, as a fraction of either box's area, that counts as a collision
    #[serde(default = "Config::default_intersection_threshold")]
    pub intersection_threshold: f64,

    /// Pixel gap between icon and label in a composed marker image
    #[serde(default = "Config::default_label_spacing")]
    pub label_spacing: f64,

    #[serde(default)]
    pub floor_plans_enabled: bool,

    #[serde(default)]
    pub models_2d_enabled: bool,

    #[serde(default)]
    pub z_index: ZIndexBands,
}

impl Config {
    const fn default_retention_seconds() -> f64 {
        10.0
    }

    const fn default_max_view_states() -> usize {
        250
    }

    const fn default_intersection_threshold() -> f64 {
        0.15
    }

    const fn default_label_spacing() -> f64 {
        3.0
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_seconds = retention.as_secs_f64();
        self
    }

    pub fn with_max_view_states(mut self, max: usize) -> Self {
        assert!(max > 0, "View state ceiling must be greater than zero");
        self.max_view_states = max;
        self
    }

    pub fn with_intersection_threshold(mut self, threshold: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "Intersection threshold must be between 0.0 and 1.0"
        );
        self.intersection_threshold = threshold;
        self
    }

    pub fn with_label_spacing(mut self, spacing: f64) -> Self {
        self.label_spacing = spacing;
        self
    }

    pub fn with_floor_plans(mut self, enabled: bool) -> Self {
        self.floor_plans_enabled = enabled;
        self
    }

    pub fn with_models_2d(mut self, enabled: bool) -> Self {
        self.models_2d_enabled = enabled;
        self
    }

    pub fn with_z_index(mut self, bands: ZIndexBands) -> Self {
        self.z_index = bands;
        self
    }

    /// Retention window as a `Duration`; invalid values collapse to zero.
    pub fn retention(&self) -> Duration {
        if self.retention_seconds.is_finite() && self.retention_seconds > 0.0 {
            Duration::from_secs_f64(self.retention_seconds)
        } else {
            Duration::ZERO
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !self.retention_seconds.is_finite() || self.retention_seconds < 0.0 {
            return Err("Retention must be a finite, non-negative number of seconds".to_string());
        }

        if self.max_view_states == 0 {
            return Err("View state ceiling must be greater than zero".to_string());
        }

        if !(0.0..=1.0).contains(&self.intersection_threshold) {
            return Err("Intersection threshold must be between 0.0 and 1.0".to_string());
        }

        if !self.label_spacing.is_finite() || self.label_spacing < 0.0 {
            return Err("Label spacing must be a finite, non-negative pixel count".to_string());
        }

        self.z_index.validate()
    }

    /// Parse and validate. Malformed input is `OverlayError::Json`, out-of-range values
    /// are `OverlayError::InvalidConfig`.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate().map_err(OverlayError::InvalidConfig)?;
        Ok(config)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate().map_err(OverlayError::InvalidConfig)?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention_seconds: Self::default_retention_seconds(),
            max_view_states: Self::default_max_view_states(),
            intersection_threshold: Self::default_intersection_threshold(),
            label_spacing: Self::default_label_spacing(),
            floor_plans_enabled: false,
            models_2d_enabled: false,
            z_index: ZIndexBands::default(),
        }
    }
}
