use std::collections::HashMap;

use model::{ActiveTileSet, TileGeneration, TileKey};
use protocol::TileBuildId;
use render_protocol::{MasterPointer, RenderState};
use slotmap::SlotMap;
use smallvec::SmallVec;

slotmap::new_key_type! {
    pub struct BucketHandle;
}

/// A bucket owned by the frontend together with what it was built for.
#[derive(Debug)]
pub struct BoundBucket<B> {
    pub build: TileBuildId,
    pub state: RenderState,
    pub bucket: MasterPointer<B>,
}

#[derive(Debug)]
pub struct TileReleaseBatch<B> {
    pub key: TileKey,
    pub buckets: Vec<BoundBucket<B>>,
}

impl<B> TileReleaseBatch<B> {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }
}

type TileBuckets = SmallVec<[BucketHandle; 4]>;

/// Buckets retained on the GPU thread, indexed by tile.
///
/// Every bucket lives in exactly one slot. Releasing hands the owning pointer
/// back to the caller, which decides when the GPU copy goes away.
#[derive(Debug)]
pub struct TileResourceStore<B> {
    buckets: SlotMap<BucketHandle, BoundBucket<B>>,
    by_tile: HashMap<TileKey, TileBuckets>,
}

impl<B> Default for TileResourceStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> TileResourceStore<B> {
    pub fn new() -> Self {
        Self {
            buckets: SlotMap::with_key(),
            by_tile: HashMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        build: TileBuildId,
        state: RenderState,
        bucket: MasterPointer<B>,
    ) -> BucketHandle {
        let handle = self.buckets.insert(BoundBucket {
            build,
            state,
            bucket,
        });
        self.by_tile.entry(build.key).or_default().push(handle);
        handle
    }

    pub fn get(&self, handle: BucketHandle) -> Option<&BoundBucket<B>> {
        self.buckets.get(handle)
    }

    pub fn get_mut(&mut self, handle: BucketHandle) -> Option<&mut BoundBucket<B>> {
        self.buckets.get_mut(handle)
    }

    pub fn buckets_for(&self, key: &TileKey) -> impl Iterator<Item = &BoundBucket<B>> + '_ {
        self.by_tile
            .get(key)
            .into_iter()
            .flat_map(|handles| handles.iter())
            .filter_map(|handle| self.buckets.get(*handle))
    }

    pub fn contains_tile(&self, key: &TileKey) -> bool {
        self.by_tile.contains_key(key)
    }

    pub fn retained_keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.by_tile.keys().copied()
    }

    pub fn tile_count(&self) -> usize {
        self.by_tile.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_drained(&self) -> bool {
        self.buckets.is_empty() && self.by_tile.is_empty()
    }

    pub fn evict_tile(&mut self, key: &TileKey) -> TileReleaseBatch<B> {
        let handles = self.by_tile.remove(key).unwrap_or_default();
        let buckets = handles
            .into_iter()
            .map(|handle| {
                self.buckets
                    .remove(handle)
                    .expect("tile index points at a released bucket")
            })
            .collect();
        TileReleaseBatch { key: *key, buckets }
    }

    /// Releases buckets of `key` built before `generation`.
    pub fn evict_older_than(
        &mut self,
        key: &TileKey,
        generation: TileGeneration,
    ) -> TileReleaseBatch<B> {
        let mut released = Vec::new();
        if let Some(handles) = self.by_tile.get_mut(key) {
            let buckets = &mut self.buckets;
            handles.retain(|handle| {
                let is_stale = buckets
                    .get(*handle)
                    .is_some_and(|bound| bound.build.generation < generation);
                if is_stale {
                    if let Some(bound) = buckets.remove(*handle) {
                        released.push(bound);
                    }
                }
                !is_stale
            });
            if handles.is_empty() {
                self.by_tile.remove(key);
            }
        }
        TileReleaseBatch {
            key: *key,
            buckets: released,
        }
    }

    /// Releases every tile that is not part of `active`.
    pub fn evict_outside(&mut self, active: &ActiveTileSet) -> Vec<TileReleaseBatch<B>> {
        let outside: Vec<TileKey> = self
            .by_tile
            .keys()
            .filter(|key| !active.contains(key))
            .copied()
            .collect();
        outside.iter().map(|key| self.evict_tile(key)).collect()
    }

    pub fn force_release_all(&mut self) -> Vec<TileReleaseBatch<B>> {
        let keys: Vec<TileKey> = self.by_tile.keys().copied().collect();
        let batches = keys.iter().map(|key| self.evict_tile(key)).collect();
        debug_assert!(self.buckets.is_empty(), "bucket without tile index entry");
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_protocol::{DepthLayer, ProgramId};

    fn state() -> RenderState {
        RenderState::new(ProgramId(0), DepthLayer::Geometry)
    }

    fn build(x: i32, generation: u64) -> TileBuildId {
        TileBuildId::new(TileKey::new(x, 0, 4), TileGeneration(generation))
    }

    #[test]
    fn evict_older_than_keeps_current_generation() {
        let mut store = TileResourceStore::new();
        store.insert(build(0, 1), state(), MasterPointer::new("old-a"));
        store.insert(build(0, 1), state(), MasterPointer::new("old-b"));
        let current = store.insert(build(0, 2), state(), MasterPointer::new("new"));

        let released = store.evict_older_than(&TileKey::new(0, 0, 4), TileGeneration(2));

        assert_eq!(released.len(), 2);
        assert_eq!(store.bucket_count(), 1);
        assert_eq!(*store.get(current).expect("current bucket").bucket, "new");
    }

    #[test]
    fn evicting_last_generation_drops_tile_index() {
        let mut store = TileResourceStore::new();
        store.insert(build(0, 1), state(), MasterPointer::new(1u32));
        let released = store.evict_older_than(&TileKey::new(0, 0, 4), TileGeneration(9));
        assert_eq!(released.len(), 1);
        assert!(!store.contains_tile(&TileKey::new(0, 0, 4)));
        assert!(store.is_drained());
    }

    #[test]
    fn evict_outside_releases_only_inactive_tiles() {
        let mut store = TileResourceStore::new();
        store.insert(build(0, 1), state(), MasterPointer::new(0u8));
        store.insert(build(1, 1), state(), MasterPointer::new(1u8));
        store.insert(build(1, 1), state(), MasterPointer::new(2u8));
        let active: ActiveTileSet = [TileKey::new(0, 0, 4)].into_iter().collect();

        let batches = store.evict_outside(&active);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].key, TileKey::new(1, 0, 4));
        assert_eq!(batches[0].len(), 2);
        assert_eq!(store.retained_keys().collect::<Vec<_>>(), vec![TileKey::new(0, 0, 4)]);
    }

    #[test]
    fn force_release_all_is_idempotent() {
        let mut store = TileResourceStore::new();
        store.insert(build(0, 1), state(), MasterPointer::new(0u8));
        store.insert(build(2, 3), state(), MasterPointer::new(1u8));

        let first = store.force_release_all();
        let second = store.force_release_all();

        assert_eq!(first.iter().map(TileReleaseBatch::len).sum::<usize>(), 2);
        assert!(second.is_empty());
        assert!(store.is_drained());
    }

    #[test]
    fn buckets_for_unknown_tile_is_empty() {
        let mut store = TileResourceStore::<u8>::new();
        assert_eq!(store.buckets_for(&TileKey::new(9, 9, 9)).count(), 0);
        assert!(store.evict_outside(&ActiveTileSet::empty()).is_empty());
    }
}
