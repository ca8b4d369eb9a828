use crate::geometry::ScreenSize;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A rasterized image handed to the rendering surface.
///
/// The pixel payload is opaque to the renderer; only the pixel size takes part in
/// layout and collision detection. Cloning is cheap because the payload is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub width: f64,
    pub height: f64,
    pub pixels: Bytes,
}

impl ImageData {
    pub fn new(width: f64, height: f64, pixels: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// An image with the given size and no pixel data.
    pub fn blank(width: f64, height: f64) -> Self {
        Self::new(width, height, Bytes::new())
    }

    pub fn size(&self) -> ScreenSize {
        ScreenSize::new(self.width, self.height)
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}
