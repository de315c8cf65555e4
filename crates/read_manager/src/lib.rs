//! Backend side of the tile protocol: decides which tiles are active, hands
//! builds to worker threads and streams their output to the frontend.

mod builder;
mod manager;
mod thread;
mod worker;

pub use builder::{BuildOutput, CancelToken, TileBuildError, TileBuildRequest, TileBuilder};
pub use manager::{ReadManager, ReadManagerConfig, ReadManagerConfigError, ReadManagerError};
pub use thread::ReadManagerThread;
pub use worker::ReadWorkerPool;
