use model::TileSetDiff;
use protocol::{
    FlushRenderBucketMessage, Message, ResizeMessage, TileReadEndMessage, TileReadStartMessage,
    UpdateModelViewMessage, UpdateReadManagerMessage,
};
use tiles::{FlushVerdict, ReadEndOutcome, ReadStartOutcome};

use crate::{FrontendRenderer, GpuSubmitter};

impl<S, B> FrontendRenderer<S, B>
where
    S: GpuSubmitter<B>,
{
    /// Handles one message from the backend. Messages without a frontend
    /// handler are dropped.
    pub fn accept_message(&mut self, message: Message<B>) {
        log::trace!("frontend: {:?}", message.kind());
        match message {
            Message::TileReadStarted(started) => self.on_read_started(started),
            Message::FlushTile(flush) => self.on_flush(flush),
            Message::TileReadEnded(ended) => self.on_read_ended(ended),
            Message::UpdateReadManager(update) => self.on_update_read_manager(update),
            Message::UpdateModelView(update) => self.on_update_model_view(update),
            Message::Resize(resize) => self.on_resize(resize),
            Message::InvalidateReadManagerRect(_) => {
                log::debug!("frontend: no handler for {:?}", message.kind());
            }
        }
    }

    fn on_read_started(&mut self, started: TileReadStartMessage) {
        let build = started.build();
        if !self.active.contains(&build.key) {
            log::trace!("frontend: start of inactive {:?}", build.key);
            return;
        }
        match self.lifecycle.on_read_started(build) {
            ReadStartOutcome::Superseded { previous } => {
                self.stats.superseded_builds += 1;
                log::debug!(
                    "frontend: {:?} generation {} supersedes {}",
                    build.key,
                    build.generation.0,
                    previous.0
                );
            }
            ReadStartOutcome::Stale { current } => {
                log::trace!(
                    "frontend: late start of {:?} generation {}, current {}",
                    build.key,
                    build.generation.0,
                    current.0
                );
            }
            ReadStartOutcome::Fresh
            | ReadStartOutcome::AlreadyCurrent
            | ReadStartOutcome::Restarted { .. } => {}
        }
    }

    fn on_flush(&mut self, flush: FlushRenderBucketMessage<B>) {
        let build = flush.build();
        if !self.active.contains(&build.key) {
            self.stats.rejected_buckets += 1;
            log::debug!(
                "frontend: dropping bucket of inactive {:?} generation {}",
                build.key,
                build.generation.0
            );
            return;
        }
        if let FlushVerdict::Stale { current } = self.lifecycle.classify_flush(build) {
            self.stats.rejected_buckets += 1;
            log::debug!(
                "frontend: dropping stale bucket of {:?} generation {}, current {}",
                build.key,
                build.generation.0,
                current.0
            );
            return;
        }

        let (build, state, mut bucket) = flush.into_parts();
        self.submitter.bind_bucket(build.key, &state, &mut bucket);
        self.store.insert(build, state, bucket);
        self.stats.bound_buckets += 1;
    }

    fn on_read_ended(&mut self, ended: TileReadEndMessage) {
        let build = ended.build();
        if !self.active.contains(&build.key) {
            log::trace!("frontend: end of inactive {:?}", build.key);
            return;
        }
        match self.lifecycle.on_read_ended(build) {
            ReadEndOutcome::Completed => {
                let superseded = self.store.evict_older_than(&build.key, build.generation);
                self.release(superseded);
                self.submitter.tile_idle(build.key);
            }
            ReadEndOutcome::Stale { current } => {
                log::trace!(
                    "frontend: ignoring end of {:?} generation {}, current {}",
                    build.key,
                    build.generation.0,
                    current.0
                );
            }
            ReadEndOutcome::Untracked => {
                log::trace!("frontend: end of untracked {:?}", build.key);
            }
        }
    }

    /// Replaces the active set wholesale. Tiles that left it lose their
    /// buckets and their generation history.
    fn on_update_read_manager(&mut self, update: UpdateReadManagerMessage) {
        let diff = TileSetDiff::between(&self.active, update.tiles());
        for key in &diff.evicted {
            self.lifecycle.forget(key);
        }
        for batch in self.store.evict_outside(update.tiles()) {
            self.release(batch);
        }
        log::debug!(
            "frontend: active set {} tiles, {} evicted, {} new",
            update.tiles().len(),
            diff.evicted.len(),
            diff.to_build.len()
        );

        self.active = update.tiles().clone();
        self.screen = Some(*update.screen());
        self.submitter.update_visibility(update.screen(), &self.active);
    }

    fn on_update_model_view(&mut self, update: UpdateModelViewMessage) {
        self.screen = Some(*update.screen());
        self.submitter.update_visibility(update.screen(), &self.active);
    }

    fn on_resize(&mut self, resize: ResizeMessage) {
        self.viewport = Some(*resize.viewport());
        self.submitter.resize(*resize.viewport());
    }
}
