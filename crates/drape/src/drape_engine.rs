/// Drape Engine module.
///
/// Wires the frontend (owned by the GPU thread) to the backend read manager
/// thread and its workers.
use std::sync::Arc;

use engine::{ChannelConfig, create_thread_channels};
use model::WorldRect;
use read_manager::{ReadManagerConfig, ReadManagerError, ReadManagerThread, TileBuilder};
use render_protocol::RenderBucket;
use renderer::{FrontendConfig, FrontendError, FrontendRenderer, GpuSubmitter};
use view::{ScreenBase, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrapeConfig {
    pub channels: ChannelConfig,
    pub read_manager: ReadManagerConfig,
    pub frontend: FrontendConfig,
}

/// Frontend plus the backend thread feeding it.
pub struct DrapeEngine<S, B = RenderBucket>
where
    S: GpuSubmitter<B>,
{
    // Dropped before `backend` so senders blocked on a full channel observe
    // the disconnect and the backend can be joined.
    frontend: FrontendRenderer<S, B>,
    backend: ReadManagerThread,
}

impl<S, B> DrapeEngine<S, B>
where
    S: GpuSubmitter<B>,
    B: Send + 'static,
{
    pub fn new<T: TileBuilder<B>>(
        config: DrapeConfig,
        builder: Arc<T>,
        submitter: S,
    ) -> Result<Self, ReadManagerError> {
        let (frontend_channels, backend_channels) = create_thread_channels(config.channels);
        let backend = ReadManagerThread::start(config.read_manager, builder, backend_channels)?;
        let frontend = FrontendRenderer::new(config.frontend, frontend_channels, submitter);
        log::debug!(
            "drape: started with {} read workers",
            config.read_manager.worker_count
        );
        Ok(Self { frontend, backend })
    }
}

impl<S, B> DrapeEngine<S, B>
where
    S: GpuSubmitter<B>,
{
    pub fn frontend(&self) -> &FrontendRenderer<S, B> {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut FrontendRenderer<S, B> {
        &mut self.frontend
    }

    pub fn submitter(&self) -> &S {
        self.frontend.submitter()
    }

    pub fn is_backend_running(&self) -> bool {
        self.backend.is_running()
    }

    /// One frontend tick. Call once per frame on the GPU thread.
    pub fn process_pending(&mut self) -> Result<usize, FrontendError> {
        self.frontend.process_pending()
    }

    pub fn update_model_view(&mut self, screen: ScreenBase) -> Result<(), FrontendError> {
        self.frontend.update_model_view(screen)
    }

    pub fn resize(&mut self, viewport: Viewport) -> Result<(), FrontendError> {
        self.frontend.resize(viewport)
    }

    pub fn invalidate_rect(&mut self, rect: WorldRect) -> Result<(), FrontendError> {
        self.frontend.invalidate_rect(rect)
    }
}
