use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use engine::{ChannelError, FrontendMessageSender};
use model::{TileGeneration, TileKey};
use protocol::{FlushRenderBucketMessage, TileBuildId};
use render_protocol::{RenderState, TransferPointer};
use thiserror::Error;
use view::ScreenBase;

#[derive(Debug, Error)]
pub enum TileBuildError {
    #[error("tile build cancelled")]
    Cancelled,
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("tile source failed: {0}")]
    Source(String),
}

/// Shared cancel flag for one dispatched build.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBuildRequest {
    pub build: TileBuildId,
    pub screen: ScreenBase,
}

impl TileBuildRequest {
    pub fn key(&self) -> TileKey {
        self.build.key
    }

    pub fn generation(&self) -> TileGeneration {
        self.build.generation
    }
}

/// Produces the buckets of one tile. Runs on worker threads.
pub trait TileBuilder<B>: Send + Sync + 'static {
    /// Emits zero or more buckets through `output`. Errors from `output`
    /// should be propagated with `?` so cancelled builds stop early.
    fn build(
        &self,
        request: &TileBuildRequest,
        output: &mut BuildOutput<'_, B>,
    ) -> Result<(), TileBuildError>;
}

/// Flush sink handed to a [`TileBuilder`] for one build.
pub struct BuildOutput<'a, B> {
    sender: &'a FrontendMessageSender<B>,
    build: TileBuildId,
    cancel: &'a CancelToken,
    flushed: usize,
}

impl<'a, B> BuildOutput<'a, B> {
    pub(crate) fn new(
        sender: &'a FrontendMessageSender<B>,
        build: TileBuildId,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            sender,
            build,
            cancel,
            flushed: 0,
        }
    }

    pub fn build(&self) -> TileBuildId {
        self.build
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn flushed(&self) -> usize {
        self.flushed
    }

    /// Hands `bucket` to the frontend. A cancelled build drops the bucket here
    /// and reports [`TileBuildError::Cancelled`].
    pub fn flush(&mut self, state: RenderState, bucket: B) -> Result<(), TileBuildError> {
        if self.cancel.is_cancelled() {
            return Err(TileBuildError::Cancelled);
        }
        self.sender.send(FlushRenderBucketMessage::new(
            self.build.key,
            self.build.generation,
            state,
            TransferPointer::transfer(bucket),
        ))?;
        self.flushed += 1;
        Ok(())
    }
}
