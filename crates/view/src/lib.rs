//! Camera snapshots exchanged between the frontend and the read manager.

mod coverage;

pub use coverage::{CoverageConfig, CoverageError, covering_tiles, tile_zoom_for_scale};

use model::WorldRect;
use thiserror::Error;

/// Surface rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(origin_x: u32, origin_y: u32, width: u32, height: u32) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn center(&self) -> (f64, f64) {
        (
            f64::from(self.origin_x) + f64::from(self.width) / 2.0,
            f64::from(self.origin_y) + f64::from(self.height) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScreenError {
    #[error("screen scale must be finite and greater than zero")]
    InvalidScale,
    #[error("screen viewport is empty")]
    EmptyViewport,
    #[error("screen value is not finite")]
    NonFiniteValue,
}

/// Camera state: which world point sits at the viewport center and how many
/// world units one pixel spans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBase {
    center_x: f64,
    center_y: f64,
    scale: f64,
    viewport: Viewport,
}

impl ScreenBase {
    pub fn new(
        center_x: f64,
        center_y: f64,
        scale: f64,
        viewport: Viewport,
    ) -> Result<Self, ScreenError> {
        let screen = Self {
            center_x,
            center_y,
            scale,
            viewport,
        };
        screen.validate()?;
        Ok(screen)
    }

    /// Fits the whole world into `viewport`.
    pub fn whole_world(viewport: Viewport) -> Result<Self, ScreenError> {
        if viewport.is_empty() {
            return Err(ScreenError::EmptyViewport);
        }
        let fit_pixels = viewport.width.min(viewport.height);
        Self::new(0.5, 0.5, 1.0 / f64::from(fit_pixels), viewport)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_y)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        if !self.center_x.is_finite() || !self.center_y.is_finite() {
            return Err(ScreenError::NonFiniteValue);
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ScreenError::InvalidScale);
        }
        if self.viewport.is_empty() {
            return Err(ScreenError::EmptyViewport);
        }
        Ok(())
    }

    /// World rectangle visible through the viewport.
    pub fn clip_rect(&self) -> WorldRect {
        let half_width = f64::from(self.viewport.width) * self.scale / 2.0;
        let half_height = f64::from(self.viewport.height) * self.scale / 2.0;
        WorldRect::from_center(self.center_x, self.center_y, half_width, half_height)
    }

    pub fn pixel_to_world(&self, pixel_x: f64, pixel_y: f64) -> Result<(f64, f64), ScreenError> {
        if !pixel_x.is_finite() || !pixel_y.is_finite() {
            return Err(ScreenError::NonFiniteValue);
        }
        let (viewport_center_x, viewport_center_y) = self.viewport.center();
        let world_x = checked_add(
            self.center_x,
            checked_mul(pixel_x - viewport_center_x, self.scale)?,
        )?;
        let world_y = checked_add(
            self.center_y,
            checked_mul(pixel_y - viewport_center_y, self.scale)?,
        )?;
        Ok((world_x, world_y))
    }

    /// Returns the screen after a surface resize. The world point at the
    /// viewport center and the scale are kept.
    pub fn with_viewport(&self, viewport: Viewport) -> Result<Self, ScreenError> {
        Self::new(self.center_x, self.center_y, self.scale, viewport)
    }

    pub fn pan_by_pixels(&self, delta_x: f64, delta_y: f64) -> Result<Self, ScreenError> {
        let center_x = checked_add(self.center_x, checked_mul(delta_x, self.scale)?)?;
        let center_y = checked_add(self.center_y, checked_mul(delta_y, self.scale)?)?;
        Self::new(center_x, center_y, self.scale, self.viewport)
    }

    /// Zooms by `zoom_factor` keeping the world point under the given pixel
    /// fixed. Factors above one zoom in.
    pub fn zoom_about_pixel(
        &self,
        zoom_factor: f64,
        pixel_x: f64,
        pixel_y: f64,
    ) -> Result<Self, ScreenError> {
        if !zoom_factor.is_finite() || zoom_factor <= 0.0 {
            return Err(ScreenError::InvalidScale);
        }
        let (anchor_x, anchor_y) = self.pixel_to_world(pixel_x, pixel_y)?;
        let scale = self.scale / zoom_factor;
        let center_x = checked_add(anchor_x, (self.center_x - anchor_x) / zoom_factor)?;
        let center_y = checked_add(anchor_y, (self.center_y - anchor_y) / zoom_factor)?;
        Self::new(center_x, center_y, scale, self.viewport)
    }
}

fn checked_add(current: f64, delta: f64) -> Result<f64, ScreenError> {
    if !delta.is_finite() {
        return Err(ScreenError::NonFiniteValue);
    }
    let next = current + delta;
    if !next.is_finite() {
        return Err(ScreenError::NonFiniteValue);
    }
    Ok(next)
}

fn checked_mul(left: f64, right: f64) -> Result<f64, ScreenError> {
    if !left.is_finite() || !right.is_finite() {
        return Err(ScreenError::NonFiniteValue);
    }
    let next = left * right;
    if !next.is_finite() {
        return Err(ScreenError::NonFiniteValue);
    }
    Ok(next)
}
