//! Tile identity shared by the read manager and the frontend.
//!
//! The map world is the normalized square `[0, 1) x [0, 1)`. At zoom `z` it is
//! split into a `2^z x 2^z` grid and a [`TileKey`] names one cell of that grid.

mod tile_set;

pub use tile_set::{ActiveTileSet, TileSetDiff};

pub const MAX_ZOOM: u8 = 20;

/// One map tile: grid position plus zoom level.
///
/// Ordering is lexicographic over `(x, y, zoom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    x: i32,
    y: i32,
    zoom: u8,
}

impl TileKey {
    pub const fn new(x: i32, y: i32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    pub const fn x(&self) -> i32 {
        self.x
    }

    pub const fn y(&self) -> i32 {
        self.y
    }

    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Number of tiles along one side of the world at `zoom`, or `None` above
    /// [`MAX_ZOOM`].
    pub const fn tiles_per_side(zoom: u8) -> Option<i64> {
        if zoom > MAX_ZOOM {
            return None;
        }
        Some(1i64 << zoom)
    }

    pub fn is_valid(&self) -> bool {
        let Some(side) = Self::tiles_per_side(self.zoom) else {
            return false;
        };
        (0..side).contains(&i64::from(self.x)) && (0..side).contains(&i64::from(self.y))
    }

    /// Extent of the tile in normalized world space. Invalid keys have none.
    pub fn world_rect(&self) -> Option<WorldRect> {
        if !self.is_valid() {
            return None;
        }
        let side = Self::tiles_per_side(self.zoom)?;
        let extent = 1.0 / side as f64;
        let min_x = f64::from(self.x) * extent;
        let min_y = f64::from(self.y) * extent;
        Some(WorldRect {
            min_x,
            min_y,
            max_x: min_x + extent,
            max_y: min_y + extent,
        })
    }
}

/// Build counter for tile keys.
///
/// The read manager draws a fresh generation for every build it dispatches,
/// and every tile-keyed message carries the generation of the build it
/// belongs to. Later builds of a key always carry larger generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TileGeneration(pub u64);

impl TileGeneration {
    pub const INITIAL: Self = TileGeneration(0);

    pub fn next(self) -> Self {
        TileGeneration(
            self.0
                .checked_add(1)
                .expect("tile generation counter overflow"),
        )
    }
}

/// Axis-aligned rectangle in normalized world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl WorldRect {
    pub const WORLD: WorldRect = WorldRect {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 1.0,
        max_y: 1.0,
    };

    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    pub fn from_center(center_x: f64, center_y: f64, half_width: f64, half_height: f64) -> Self {
        Self::new(
            center_x - half_width,
            center_y - half_height,
            center_x + half_width,
            center_y + half_height,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Shared edges do not count as an intersection.
    pub fn intersects(&self, other: &WorldRect) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    pub fn intersection(&self, other: &WorldRect) -> Option<WorldRect> {
        if !self.intersects(other) {
            return None;
        }
        Some(WorldRect {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }
}
