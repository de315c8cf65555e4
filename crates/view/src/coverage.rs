use model::{ActiveTileSet, MAX_ZOOM, TileKey, WorldRect};
use thiserror::Error;

use crate::{ScreenBase, ScreenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageConfig {
    /// Edge length a tile should roughly occupy on screen.
    pub tile_size_px: u32,
    pub max_zoom: u8,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            tile_size_px: 256,
            max_zoom: MAX_ZOOM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoverageError {
    #[error("cannot cover screen: {0}")]
    Screen(#[from] ScreenError),
    #[error("coverage tile size must be greater than zero")]
    ZeroTileSize,
    #[error("coverage max zoom {0} exceeds supported zoom {max}", max = MAX_ZOOM)]
    MaxZoomOutOfRange(u8),
}

impl CoverageConfig {
    pub fn validate(&self) -> Result<(), CoverageError> {
        if self.tile_size_px == 0 {
            return Err(CoverageError::ZeroTileSize);
        }
        if self.max_zoom > MAX_ZOOM {
            return Err(CoverageError::MaxZoomOutOfRange(self.max_zoom));
        }
        Ok(())
    }
}

/// Zoom level whose tiles come closest to `tile_size_px` on screen.
pub fn tile_zoom_for_scale(scale: f64, config: &CoverageConfig) -> Result<u8, CoverageError> {
    config.validate()?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ScreenError::InvalidScale.into());
    }
    let tiles_per_side = 1.0 / (scale * f64::from(config.tile_size_px));
    let zoom = tiles_per_side.log2().round();
    if zoom <= 0.0 {
        return Ok(0);
    }
    Ok(zoom.min(f64::from(config.max_zoom)) as u8)
}

/// Every tile at the screen's zoom level that intersects its clip rect.
pub fn covering_tiles(
    screen: &ScreenBase,
    config: &CoverageConfig,
) -> Result<ActiveTileSet, CoverageError> {
    screen.validate()?;
    let zoom = tile_zoom_for_scale(screen.scale(), config)?;
    let clip = screen.clip_rect();
    if !clip.is_finite() {
        return Err(ScreenError::NonFiniteValue.into());
    }
    let Some(visible) = clip.intersection(&WorldRect::WORLD) else {
        return Ok(ActiveTileSet::empty());
    };

    let Some(side) = TileKey::tiles_per_side(zoom) else {
        return Err(CoverageError::MaxZoomOutOfRange(zoom));
    };
    let last = side - 1;
    let to_tile = |world: f64| world * side as f64;
    let min_x = (to_tile(visible.min_x).floor() as i64).clamp(0, last);
    let min_y = (to_tile(visible.min_y).floor() as i64).clamp(0, last);
    let max_x = ((to_tile(visible.max_x).ceil() as i64) - 1).clamp(0, last);
    let max_y = ((to_tile(visible.max_y).ceil() as i64) - 1).clamp(0, last);

    let mut tiles = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let key = TileKey::new(x as i32, y as i32, zoom);
            if key.world_rect().is_some_and(|rect| rect.intersects(&clip)) {
                tiles.push(key);
            }
        }
    }
    Ok(tiles.into_iter().collect())
}
