//! Tile map drape: a frontend on the GPU thread fed by a read manager and its
//! workers through typed messages.
//!
//! Start a [`DrapeEngine`] with a [`TileBuilder`] producing buckets and a
//! [`GpuSubmitter`] consuming them, then call
//! [`DrapeEngine::process_pending`] once per frame.

mod drape_engine;
mod threaded_tests;

pub use drape_engine::{DrapeConfig, DrapeEngine};

pub use engine::ChannelConfig;
pub use model::{ActiveTileSet, TileGeneration, TileKey, WorldRect};
pub use protocol::{Message, MessageKind};
pub use read_manager::{
    BuildOutput, ReadManagerConfig, ReadManagerConfigError, ReadManagerError, TileBuildError,
    TileBuildRequest, TileBuilder,
};
pub use render_protocol::{MasterPointer, RenderBucket, RenderState, TransferPointer};
pub use renderer::{FrontendConfig, FrontendError, FrontendStats, GpuSubmitter};
pub use view::{CoverageConfig, ScreenBase, Viewport};
