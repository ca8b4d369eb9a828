//! Error types for mapoverlay.

use std::fmt;
use thiserror::Error;

/// Pipeline stages of a single frame, used to report where a frame stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    AcquireProjection,
    Purge,
    ComputeDeltas,
    CollectInView,
    ResolveOverlaps,
    ApplyDeltas,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameStage::AcquireProjection => "acquire projection",
            FrameStage::Purge => "purge",
            FrameStage::ComputeDeltas => "compute deltas",
            FrameStage::CollectInView => "collect in-view states",
            FrameStage::ResolveOverlaps => "resolve overlaps",
            FrameStage::ApplyDeltas => "apply deltas",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("frame cancelled during {0}")]
    Cancelled(FrameStage),
    #[error("projection not available")]
    ProjectionUnavailable,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown collision policy: {0}")]
    UnknownPolicy(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl OverlayError {
    /// Errors that only mean "skip this frame"; callers are expected to drop them.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            OverlayError::Cancelled(_) | OverlayError::ProjectionUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;
