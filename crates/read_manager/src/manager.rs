use std::collections::HashMap;
use std::sync::Arc;

use engine::{ChannelError, FrontendMessageSender};
use model::{ActiveTileSet, TileGeneration, TileKey, TileSetDiff, WorldRect};
use protocol::{Message, TileBuildId, UpdateReadManagerMessage};
use thiserror::Error;
use view::{CoverageConfig, CoverageError, ScreenBase, ScreenError, Viewport, covering_tiles};

use crate::builder::{CancelToken, TileBuildRequest, TileBuilder};
use crate::worker::{ReadJob, ReadWorkerPool};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadManagerConfig {
    pub worker_count: usize,
    pub job_capacity: usize,
    pub coverage: CoverageConfig,
}

impl Default for ReadManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            job_capacity: 256,
            coverage: CoverageConfig::default(),
        }
    }
}

impl ReadManagerConfig {
    pub fn validate(&self) -> Result<(), ReadManagerConfigError> {
        if self.worker_count == 0 {
            return Err(ReadManagerConfigError::WorkerCountZero);
        }
        if self.job_capacity == 0 {
            return Err(ReadManagerConfigError::JobCapacityZero);
        }
        self.coverage.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadManagerConfigError {
    #[error("read worker count must be greater than zero")]
    WorkerCountZero,
    #[error("read job capacity must be greater than zero")]
    JobCapacityZero,
    #[error("invalid coverage config: {0}")]
    Coverage(#[from] CoverageError),
}

#[derive(Debug, Error)]
pub enum ReadManagerError {
    #[error("invalid read manager config: {0}")]
    Config(#[from] ReadManagerConfigError),
    #[error(transparent)]
    Coverage(#[from] CoverageError),
    #[error(transparent)]
    Screen(#[from] ScreenError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Backend owner of the active tile set.
///
/// Every change of the set is announced to the frontend before any build for
/// it is dispatched, so a worker's messages for a key are always preceded by
/// the update that made the key active.
pub struct ReadManager<B> {
    config: ReadManagerConfig,
    message_sender: FrontendMessageSender<B>,
    workers: ReadWorkerPool,
    screen: Option<ScreenBase>,
    active: ActiveTileSet,
    in_flight: HashMap<TileKey, CancelToken>,
    last_generation: TileGeneration,
}

impl<B: Send + 'static> ReadManager<B> {
    pub fn new<T: TileBuilder<B>>(
        config: ReadManagerConfig,
        builder: Arc<T>,
        message_sender: FrontendMessageSender<B>,
    ) -> Result<Self, ReadManagerError> {
        config.validate()?;
        let workers = ReadWorkerPool::start(
            config.worker_count,
            config.job_capacity,
            builder,
            message_sender.clone(),
        );
        Ok(Self {
            config,
            message_sender,
            workers,
            screen: None,
            active: ActiveTileSet::empty(),
            in_flight: HashMap::new(),
            last_generation: TileGeneration::INITIAL,
        })
    }
}

impl<B> ReadManager<B> {
    pub fn config(&self) -> &ReadManagerConfig {
        &self.config
    }

    pub fn screen(&self) -> Option<&ScreenBase> {
        self.screen.as_ref()
    }

    pub fn active_tiles(&self) -> &ActiveTileSet {
        &self.active
    }

    pub fn last_generation(&self) -> TileGeneration {
        self.last_generation
    }

    /// Applies one command from the frontend.
    ///
    /// Panics on tile-keyed messages: those only travel toward the frontend.
    pub fn handle_message(&mut self, message: Message<B>) -> Result<(), ReadManagerError> {
        match message {
            Message::Resize(resize) => self.resize(*resize.viewport()),
            Message::UpdateModelView(update) => self.update_model_view(*update.screen()),
            Message::InvalidateReadManagerRect(invalidate) => {
                self.invalidate_rect(*invalidate.rect())
            }
            Message::TileReadStarted(_) | Message::TileReadEnded(_) | Message::FlushTile(_) => {
                panic!(
                    "read manager received tile-keyed message {:?}",
                    message.kind()
                )
            }
            Message::UpdateReadManager(_) => {
                log::debug!("read manager: no handler for {:?}", message.kind());
                Ok(())
            }
        }
    }

    /// Recomputes the active set for `screen`, announces it, then cancels
    /// builds for keys that left and dispatches builds for keys that joined.
    pub fn update_model_view(&mut self, screen: ScreenBase) -> Result<(), ReadManagerError> {
        let next = covering_tiles(&screen, &self.config.coverage)?;
        let diff = TileSetDiff::between(&self.active, &next);
        self.screen = Some(screen);
        self.active = next.clone();
        self.message_sender
            .send(UpdateReadManagerMessage::new(screen, next))?;

        for key in &diff.evicted {
            if let Some(cancel) = self.in_flight.remove(key) {
                cancel.cancel();
            }
        }
        for key in &diff.to_build {
            self.dispatch(*key, screen)?;
        }
        log::debug!(
            "read manager: {} tiles active, {} evicted, {} dispatched",
            self.active.len(),
            diff.evicted.len(),
            diff.to_build.len()
        );
        Ok(())
    }

    /// Keeps the camera center and scale, replacing the viewport. Before the
    /// first camera update the whole world is fitted into `viewport`.
    pub fn resize(&mut self, viewport: Viewport) -> Result<(), ReadManagerError> {
        let screen = match &self.screen {
            Some(screen) => screen.with_viewport(viewport)?,
            None => ScreenBase::whole_world(viewport)?,
        };
        self.update_model_view(screen)
    }

    /// Starts a fresh build for every active tile intersecting `rect`,
    /// superseding any build still running for it.
    pub fn invalidate_rect(&mut self, rect: WorldRect) -> Result<(), ReadManagerError> {
        let Some(screen) = self.screen else {
            log::debug!("read manager: invalidate before first camera update");
            return Ok(());
        };
        let stale: Vec<TileKey> = self
            .active
            .iter()
            .filter(|key| key.world_rect().is_some_and(|tile| tile.intersects(&rect)))
            .copied()
            .collect();
        for key in &stale {
            if let Some(cancel) = self.in_flight.remove(key) {
                cancel.cancel();
            }
            self.dispatch(*key, screen)?;
        }
        log::debug!("read manager: invalidated {} tiles", stale.len());
        Ok(())
    }

    /// Cancels every outstanding build and joins the workers.
    pub fn stop(&mut self) {
        for (_, cancel) in self.in_flight.drain() {
            cancel.cancel();
        }
        self.workers.shutdown();
    }

    fn dispatch(&mut self, key: TileKey, screen: ScreenBase) -> Result<(), ReadManagerError> {
        self.last_generation = self.last_generation.next();
        let cancel = CancelToken::new();
        self.in_flight.insert(key, cancel.clone());
        self.workers.submit(ReadJob {
            request: TileBuildRequest {
                build: TileBuildId::new(key, self.last_generation),
                screen,
            },
            cancel,
        })?;
        Ok(())
    }
}

impl<B> Drop for ReadManager<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildOutput, TileBuildError};
    use engine::{ChannelConfig, FrontendChannels, create_thread_channels};
    use protocol::MessageKind;
    use render_protocol::{DepthLayer, ProgramId, RenderState};
    use std::time::Duration;

    struct OneBucket;

    impl TileBuilder<u64> for OneBucket {
        fn build(
            &self,
            request: &TileBuildRequest,
            output: &mut BuildOutput<'_, u64>,
        ) -> Result<(), TileBuildError> {
            output.flush(
                RenderState::new(ProgramId(7), DepthLayer::Geometry),
                request.generation().0,
            )
        }
    }

    fn manager() -> (FrontendChannels<u64>, ReadManager<u64>) {
        let (frontend, backend) = create_thread_channels::<u64>(ChannelConfig::default());
        let manager = ReadManager::new(
            ReadManagerConfig {
                worker_count: 1,
                ..ReadManagerConfig::default()
            },
            Arc::new(OneBucket),
            backend.message_sender,
        )
        .expect("start read manager");
        (frontend, manager)
    }

    fn collect(frontend: &FrontendChannels<u64>, manager: &mut ReadManager<u64>) -> Vec<Message<u64>> {
        manager.workers.shutdown();
        let mut output = Vec::new();
        while let Ok(Some(message)) = frontend
            .message_receiver
            .recv_timeout(Duration::from_millis(20))
        {
            output.push(message);
        }
        output
    }

    fn screen() -> ScreenBase {
        ScreenBase::whole_world(Viewport::new(0, 0, 800, 600)).expect("screen")
    }

    #[test]
    fn update_is_announced_before_any_tile_message() {
        let (frontend, mut manager) = manager();
        manager.update_model_view(screen()).expect("update");
        assert_eq!(manager.active_tiles().len(), 4);

        let messages = collect(&frontend, &mut manager);
        assert_eq!(messages[0].kind(), MessageKind::UpdateReadManager);
        let ended = messages
            .iter()
            .filter(|message| message.kind() == MessageKind::TileReadEnded)
            .count();
        assert_eq!(ended, 4);
    }

    #[test]
    fn generations_are_unique_across_keys() {
        let (frontend, mut manager) = manager();
        manager.update_model_view(screen()).expect("update");
        let messages = collect(&frontend, &mut manager);

        let mut generations: Vec<u64> = messages
            .iter()
            .filter(|message| message.kind() == MessageKind::TileReadStarted)
            .filter_map(|message| message.build())
            .map(|build| build.generation.0)
            .collect();
        generations.sort_unstable();
        assert_eq!(generations, vec![1, 2, 3, 4]);
        assert_eq!(manager.last_generation(), TileGeneration(4));
    }

    #[test]
    fn unchanged_view_dispatches_nothing_new() {
        let (frontend, mut manager) = manager();
        manager.update_model_view(screen()).expect("first");
        manager.update_model_view(screen()).expect("second");
        let messages = collect(&frontend, &mut manager);

        let updates = messages
            .iter()
            .filter(|message| message.kind() == MessageKind::UpdateReadManager)
            .count();
        let starts = messages
            .iter()
            .filter(|message| message.kind() == MessageKind::TileReadStarted)
            .count();
        assert_eq!(updates, 2);
        assert_eq!(starts, 4);
    }

    #[test]
    fn invalidate_rebuilds_only_intersecting_tiles() {
        let (frontend, mut manager) = manager();
        manager.update_model_view(screen()).expect("update");
        manager
            .invalidate_rect(WorldRect::new(0.1, 0.1, 0.2, 0.2))
            .expect("invalidate");
        let messages = collect(&frontend, &mut manager);

        let rebuilt: Vec<TileBuildId> = messages
            .iter()
            .filter(|message| message.kind() == MessageKind::TileReadStarted)
            .filter_map(|message| message.build())
            .filter(|build| build.generation == TileGeneration(5))
            .collect();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].key, TileKey::new(0, 0, 1));
    }

    #[test]
    fn resize_before_camera_fits_whole_world() {
        let (_frontend, mut manager) = manager();
        manager
            .handle_message(protocol::ResizeMessage::new(Viewport::new(0, 0, 800, 600)).into())
            .expect("resize");
        assert_eq!(manager.screen(), Some(&screen()));
        assert_eq!(manager.active_tiles().len(), 4);
    }

    #[test]
    fn invalid_screen_is_rejected_without_touching_state() {
        let (_frontend, mut manager) = manager();
        let result = manager.resize(Viewport::new(0, 0, 0, 0));
        assert!(matches!(result, Err(ReadManagerError::Screen(_))));
        assert!(manager.active_tiles().is_empty());
        assert_eq!(manager.last_generation(), TileGeneration::INITIAL);
    }

    #[test]
    #[should_panic(expected = "read manager received tile-keyed message")]
    fn tile_keyed_command_panics() {
        let (_frontend, mut manager) = manager();
        let _ = manager.handle_message(
            protocol::TileReadStartMessage::new(TileKey::new(0, 0, 0), TileGeneration(1)).into(),
        );
    }
}
