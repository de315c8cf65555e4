use std::collections::BTreeSet;
use std::collections::btree_set;
use std::sync::Arc;

use crate::TileKey;

/// Immutable snapshot of the tiles relevant to one screen.
///
/// Cloning shares the snapshot. There is no way to mutate a set once built:
/// every viewport change produces a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveTileSet {
    tiles: Arc<BTreeSet<TileKey>>,
}

impl ActiveTileSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains(key)
    }

    pub fn iter(&self) -> btree_set::Iter<'_, TileKey> {
        self.tiles.iter()
    }

    pub fn as_set(&self) -> &BTreeSet<TileKey> {
        &self.tiles
    }

    /// True when both handles point at the same snapshot.
    pub fn same_snapshot(&self, other: &ActiveTileSet) -> bool {
        Arc::ptr_eq(&self.tiles, &other.tiles)
    }

    pub fn holder_count(&self) -> usize {
        Arc::strong_count(&self.tiles)
    }
}

impl FromIterator<TileKey> for ActiveTileSet {
    fn from_iter<I: IntoIterator<Item = TileKey>>(iter: I) -> Self {
        Self {
            tiles: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl From<BTreeSet<TileKey>> for ActiveTileSet {
    fn from(tiles: BTreeSet<TileKey>) -> Self {
        Self {
            tiles: Arc::new(tiles),
        }
    }
}

impl<'a> IntoIterator for &'a ActiveTileSet {
    type Item = &'a TileKey;
    type IntoIter = btree_set::Iter<'a, TileKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Difference between two consecutive active tile sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSetDiff {
    /// In the previous set only.
    pub evicted: Vec<TileKey>,
    /// In the next set only.
    pub to_build: Vec<TileKey>,
    /// In both sets.
    pub retained: Vec<TileKey>,
}

impl TileSetDiff {
    pub fn between(previous: &ActiveTileSet, next: &ActiveTileSet) -> Self {
        if previous.same_snapshot(next) {
            return Self {
                retained: next.iter().copied().collect(),
                ..Self::default()
            };
        }
        Self {
            evicted: previous
                .as_set()
                .difference(next.as_set())
                .copied()
                .collect(),
            to_build: next
                .as_set()
                .difference(previous.as_set())
                .copied()
                .collect(),
            retained: previous
                .as_set()
                .intersection(next.as_set())
                .copied()
                .collect(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.evicted.is_empty() && self.to_build.is_empty()
    }
}
