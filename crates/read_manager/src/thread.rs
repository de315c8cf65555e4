use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use engine::{BackendChannels, BackendCommandConsumer, ChannelError};

use crate::builder::TileBuilder;
use crate::manager::{ReadManager, ReadManagerConfig, ReadManagerError};

const COMMAND_BATCH: usize = 64;
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// The backend thread: owns the [`ReadManager`] and applies frontend
/// commands until stopped or until the frontend goes away.
pub struct ReadManagerThread {
    stop_requested: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl ReadManagerThread {
    /// Starts the workers and the backend thread. A rejected config is
    /// reported here, before any thread is spawned.
    pub fn start<B, T>(
        config: ReadManagerConfig,
        builder: Arc<T>,
        channels: BackendChannels<B>,
    ) -> Result<Self, ReadManagerError>
    where
        B: Send + 'static,
        T: TileBuilder<B>,
    {
        let BackendChannels {
            message_sender,
            command_consumer,
        } = channels;
        let manager = ReadManager::new(config, builder, message_sender)?;
        let stop_requested = Arc::new(AtomicBool::new(false));
        let loop_stop_requested = Arc::clone(&stop_requested);
        let join_handle = std::thread::Builder::new()
            .name("read_manager".to_owned())
            .spawn(move || backend_loop(manager, command_consumer, loop_stop_requested))
            .expect("spawn read manager thread");

        Ok(Self {
            stop_requested,
            join_handle: Some(join_handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::Release);
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                log::error!("read manager: thread panicked");
            }
        }
    }
}

impl Drop for ReadManagerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn backend_loop<B>(
    mut manager: ReadManager<B>,
    mut commands: BackendCommandConsumer<B>,
    stop_requested: Arc<AtomicBool>,
) {
    let mut batch = Vec::with_capacity(COMMAND_BATCH);
    'running: while !stop_requested.load(Ordering::Acquire) {
        match commands.drain_batch_with_wait(&mut batch, COMMAND_BATCH, IDLE_WAIT) {
            Ok(_) => {}
            Err(ChannelError::Disconnected) => {
                log::debug!("read manager: command producer gone");
                break;
            }
        }
        for command in batch.drain(..) {
            match manager.handle_message(command) {
                Ok(()) => {}
                Err(ReadManagerError::Channel(err)) => {
                    log::error!("read manager: {err}, stopping");
                    break 'running;
                }
                Err(err) => log::warn!("read manager: command rejected: {err}"),
            }
        }
    }
    manager.stop();
    log::debug!("read manager: backend loop exiting");
}
