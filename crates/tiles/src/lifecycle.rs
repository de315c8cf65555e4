use std::collections::HashMap;

use model::{TileGeneration, TileKey};
use protocol::TileBuildId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileReadState {
    /// A build is running. Flushes for it may still arrive.
    Pending,
    /// The latest build ended. Its buckets are the tile's representation.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStartOutcome {
    /// First build seen for the key.
    Fresh,
    /// The build was already announced by an earlier flush.
    AlreadyCurrent,
    /// A new build after the previous one finished.
    Restarted { previous: TileGeneration },
    /// A new build while the previous one was still pending.
    Superseded { previous: TileGeneration },
    /// Start of a build older than the one already tracked.
    Stale { current: TileGeneration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushVerdict {
    Current,
    Stale { current: TileGeneration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEndOutcome {
    /// The current build finished. Older buckets of the key can go.
    Completed,
    /// End of a build that was superseded.
    Stale { current: TileGeneration },
    /// End for a key that is no longer tracked.
    Untracked,
}

#[derive(Debug, Clone, Copy)]
struct TileEntry {
    generation: TileGeneration,
    state: TileReadState,
}

/// Per-key build generations as seen by the frontend.
///
/// The current generation of a key is the highest one observed in any
/// tile-keyed message, so decisions do not depend on messages from different
/// workers arriving in order.
#[derive(Debug, Default)]
pub struct TileLifecycle {
    tiles: HashMap<TileKey, TileEntry>,
}

impl TileLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_read_started(&mut self, build: TileBuildId) -> ReadStartOutcome {
        let Some(entry) = self.tiles.get_mut(&build.key) else {
            self.tiles.insert(
                build.key,
                TileEntry {
                    generation: build.generation,
                    state: TileReadState::Pending,
                },
            );
            return ReadStartOutcome::Fresh;
        };

        if build.generation < entry.generation {
            return ReadStartOutcome::Stale {
                current: entry.generation,
            };
        }
        if build.generation == entry.generation {
            assert!(
                entry.state == TileReadState::Pending,
                "tile {:?} generation {} started after it already ended",
                build.key,
                build.generation.0
            );
            return ReadStartOutcome::AlreadyCurrent;
        }

        let previous = entry.generation;
        let previous_state = entry.state;
        entry.generation = build.generation;
        entry.state = TileReadState::Pending;
        match previous_state {
            TileReadState::Pending => ReadStartOutcome::Superseded { previous },
            TileReadState::Idle => ReadStartOutcome::Restarted { previous },
        }
    }

    pub fn classify_flush(&mut self, build: TileBuildId) -> FlushVerdict {
        let entry = self.tiles.entry(build.key).or_insert(TileEntry {
            generation: build.generation,
            state: TileReadState::Pending,
        });

        if build.generation < entry.generation {
            return FlushVerdict::Stale {
                current: entry.generation,
            };
        }
        if build.generation > entry.generation {
            entry.generation = build.generation;
            entry.state = TileReadState::Pending;
            return FlushVerdict::Current;
        }
        assert!(
            entry.state == TileReadState::Pending,
            "flush for tile {:?} generation {} arrived after its read ended",
            build.key,
            build.generation.0
        );
        FlushVerdict::Current
    }

    pub fn on_read_ended(&mut self, build: TileBuildId) -> ReadEndOutcome {
        let Some(entry) = self.tiles.get_mut(&build.key) else {
            return ReadEndOutcome::Untracked;
        };

        if build.generation < entry.generation {
            return ReadEndOutcome::Stale {
                current: entry.generation,
            };
        }
        if build.generation == entry.generation {
            assert!(
                entry.state == TileReadState::Pending,
                "tile {:?} generation {} ended twice",
                build.key,
                build.generation.0
            );
        }
        entry.generation = build.generation;
        entry.state = TileReadState::Idle;
        ReadEndOutcome::Completed
    }

    /// Stops tracking `key`, typically after it left the active tile set.
    pub fn forget(&mut self, key: &TileKey) -> Option<TileGeneration> {
        self.tiles.remove(key).map(|entry| entry.generation)
    }

    pub fn current_generation(&self, key: &TileKey) -> Option<TileGeneration> {
        self.tiles.get(key).map(|entry| entry.generation)
    }

    pub fn state(&self, key: &TileKey) -> Option<TileReadState> {
        self.tiles.get(key).map(|entry| entry.state)
    }

    pub fn is_pending(&self, key: &TileKey) -> bool {
        self.state(key) == Some(TileReadState::Pending)
    }

    pub fn pending_keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.tiles
            .iter()
            .filter(|(_, entry)| entry.state == TileReadState::Pending)
            .map(|(key, _)| *key)
    }

    pub fn tracked_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}
