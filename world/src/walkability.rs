//! Obstacle mask and the walkability oracle derived from it.

use immune_defence_core::{Walkability, WorldPoint};
use thiserror::Error;

/// Alpha value marking a traversable mask pixel.
pub const TRANSPARENT: u8 = 0;

/// Errors raised while constructing an obstacle mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MaskError {
    /// The mask has a zero dimension.
    #[error("obstacle mask must have a non-zero size")]
    Empty,
    /// The alpha buffer does not cover `width * height` pixels.
    #[error("expected {expected} alpha samples, found {found}")]
    SizeMismatch {
        /// Number of samples implied by the dimensions.
        expected: usize,
        /// Number of samples supplied.
        found: usize,
    },
}

/// Alpha channel of the obstacle bitmap, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObstacleMask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl ObstacleMask {
    /// Wraps an alpha buffer of `width * height` samples.
    pub fn from_alpha(width: u32, height: u32, alpha: Vec<u8>) -> Result<Self, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::Empty);
        }

        let expected = width as usize * height as usize;
        if alpha.len() != expected {
            return Err(MaskError::SizeMismatch {
                expected,
                found: alpha.len(),
            });
        }

        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// Creates a mask where every pixel is traversable.
    pub fn open(width: u32, height: u32) -> Result<Self, MaskError> {
        Self::from_alpha(width, height, vec![TRANSPARENT; width as usize * height as usize])
    }

    /// Marks the pixels of the half-open rectangle `[x0, x1) x [y0, y1)` as blocked.
    pub fn block_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) {
        for row in y0.min(self.height)..y1.min(self.height) {
            for column in x0.min(self.width)..x1.min(self.width) {
                let index = self.index(column, row);
                self.alpha[index] = u8::MAX;
            }
        }
    }

    /// Width of the mask in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the mask in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Alpha sample at the provided pixel, if it lies inside the mask.
    #[must_use]
    pub fn alpha(&self, column: u32, row: u32) -> Option<u8> {
        if column < self.width && row < self.height {
            self.alpha.get(self.index(column, row)).copied()
        } else {
            None
        }
    }

    fn index(&self, column: u32, row: u32) -> usize {
        row as usize * self.width as usize + column as usize
    }
}

/// Walkability oracle answering queries in arena coordinates.
///
/// Arena coordinates are scaled onto the mask so the bitmap always covers the
/// whole field. Queries left of the field are clamped to `x = 0`, queries
/// anywhere else outside the bitmap are blocked, and a missing mask accepts
/// every point.
#[derive(Clone, Debug)]
pub struct WalkabilityMap {
    mask: Option<ObstacleMask>,
    scale_x: f32,
    scale_y: f32,
}

impl WalkabilityMap {
    /// Creates an oracle over `mask` for a field of the provided size.
    #[must_use]
    pub fn new(mask: Option<ObstacleMask>, field_width: f32, field_height: f32) -> Self {
        let (scale_x, scale_y) = match &mask {
            Some(mask) if field_width > 0.0 && field_height > 0.0 => (
                mask.width() as f32 / field_width,
                mask.height() as f32 / field_height,
            ),
            _ => (1.0, 1.0),
        };

        Self {
            mask,
            scale_x,
            scale_y,
        }
    }

    /// Oracle that accepts every point.
    #[must_use]
    pub fn fail_open() -> Self {
        Self {
            mask: None,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Reports whether a mask backs the oracle.
    #[must_use]
    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }
}

impl Walkability for WalkabilityMap {
    fn is_walkable(&self, point: WorldPoint) -> bool {
        let Some(mask) = &self.mask else {
            return true;
        };

        let x = point.x().max(0.0) * self.scale_x;
        let y = point.y() * self.scale_y;
        if !x.is_finite() || !y.is_finite() || y < 0.0 {
            return false;
        }

        let column = x.floor();
        let row = y.floor();
        if column >= mask.width() as f32 || row >= mask.height() as f32 {
            return false;
        }

        mask.alpha(column as u32, row as u32) == Some(TRANSPARENT)
    }
}
