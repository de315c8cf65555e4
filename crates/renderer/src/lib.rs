//! Renderer crate root.
//!
//! The frontend runs on the GPU thread. It consumes backend messages, owns
//! every bucket it accepted, and forwards binding decisions to a
//! [`GpuSubmitter`].
//!
//! Internal architecture overview:
//! - `renderer_messages`: per-kind handling of incoming messages and the
//!   generation policy for flushed buckets.
//! - `renderer_commands`: camera commands toward the backend, coalesced while
//!   the command ring is full.

use std::collections::VecDeque;
use std::time::Duration;

use engine::{BackendCommandProducer, ChannelError, FrontendChannels, FrontendMessageReceiver};
use model::{ActiveTileSet, TileKey};
use protocol::Message;
use render_protocol::{MasterPointer, RenderBucket, RenderState};
use thiserror::Error;
use tiles::{TileLifecycle, TileReleaseBatch, TileResourceStore};
use view::{ScreenBase, Viewport};

mod renderer_commands;
mod renderer_messages;

/// GPU-side effects of the frontend. Implementations own the actual GPU
/// objects; the frontend only decides when they are created and destroyed.
pub trait GpuSubmitter<B = RenderBucket> {
    /// Called once per accepted bucket, before the frontend retains it.
    fn bind_bucket(&mut self, key: TileKey, state: &RenderState, bucket: &mut B);

    /// The bucket no longer represents `key`. Dropping `bucket` frees it.
    fn release_bucket(&mut self, key: TileKey, state: &RenderState, bucket: MasterPointer<B>);

    fn update_visibility(&mut self, screen: &ScreenBase, tiles: &ActiveTileSet);

    /// The latest build of `key` finished; its buckets are complete.
    fn tile_idle(&mut self, _key: TileKey) {}

    fn resize(&mut self, _viewport: Viewport) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendConfig {
    /// Upper bound of messages handled by one [`FrontendRenderer::process_pending`].
    pub message_budget: usize,
    /// How long `process_pending` may wait for the first message.
    pub wait_timeout: Duration,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            message_budget: 256,
            wait_timeout: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrontendError {
    #[error("backend disconnected")]
    Disconnected,
}

impl From<ChannelError> for FrontendError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Disconnected => FrontendError::Disconnected,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontendStats {
    pub bound_buckets: u64,
    pub rejected_buckets: u64,
    pub released_buckets: u64,
    pub superseded_builds: u64,
}

pub struct FrontendRenderer<S, B = RenderBucket>
where
    S: GpuSubmitter<B>,
{
    config: FrontendConfig,
    message_receiver: FrontendMessageReceiver<B>,
    command_producer: BackendCommandProducer<B>,
    deferred_commands: VecDeque<Message<B>>,
    submitter: S,
    lifecycle: TileLifecycle,
    store: TileResourceStore<B>,
    active: ActiveTileSet,
    screen: Option<ScreenBase>,
    viewport: Option<Viewport>,
    batch: Vec<Message<B>>,
    stats: FrontendStats,
}

impl<S, B> FrontendRenderer<S, B>
where
    S: GpuSubmitter<B>,
{
    pub fn new(config: FrontendConfig, channels: FrontendChannels<B>, submitter: S) -> Self {
        assert!(
            config.message_budget > 0,
            "frontend message budget must be greater than zero"
        );
        let FrontendChannels {
            message_receiver,
            command_producer,
        } = channels;
        Self {
            config,
            message_receiver,
            command_producer,
            deferred_commands: VecDeque::new(),
            submitter,
            lifecycle: TileLifecycle::new(),
            store: TileResourceStore::new(),
            active: ActiveTileSet::empty(),
            screen: None,
            viewport: None,
            batch: Vec::with_capacity(config.message_budget),
            stats: FrontendStats::default(),
        }
    }

    /// Sends deferred commands, then handles up to `message_budget` messages.
    /// Returns the number of handled messages.
    pub fn process_pending(&mut self) -> Result<usize, FrontendError> {
        self.flush_commands()?;

        let mut batch = std::mem::take(&mut self.batch);
        let drained = self.message_receiver.drain_batch_with_wait(
            &mut batch,
            self.config.message_budget,
            self.config.wait_timeout,
        );
        for message in batch.drain(..) {
            self.accept_message(message);
        }
        self.batch = batch;
        Ok(drained?)
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn submitter_mut(&mut self) -> &mut S {
        &mut self.submitter
    }

    pub fn active_tiles(&self) -> &ActiveTileSet {
        &self.active
    }

    pub fn screen(&self) -> Option<&ScreenBase> {
        self.screen.as_ref()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn lifecycle(&self) -> &TileLifecycle {
        &self.lifecycle
    }

    pub fn store(&self) -> &TileResourceStore<B> {
        &self.store
    }

    pub fn stats(&self) -> FrontendStats {
        self.stats
    }

    /// Releases every retained bucket. The frontend stays usable.
    pub fn release_all(&mut self) {
        for batch in self.store.force_release_all() {
            self.release(batch);
        }
        self.lifecycle.clear();
    }

    fn release(&mut self, batch: TileReleaseBatch<B>) {
        let key = batch.key;
        for bound in batch.buckets {
            self.stats.released_buckets += 1;
            self.submitter
                .release_bucket(key, &bound.state, bound.bucket);
        }
    }
}

impl<S, B> Drop for FrontendRenderer<S, B>
where
    S: GpuSubmitter<B>,
{
    fn drop(&mut self) {
        self.release_all();
    }
}
