//! Frontend-side tile bookkeeping: which build of each tile is current, and
//! which buckets the GPU thread currently owns for it.

mod lifecycle;
mod store;

pub use lifecycle::{FlushVerdict, ReadEndOutcome, ReadStartOutcome, TileLifecycle, TileReadState};
pub use store::{BoundBucket, BucketHandle, TileReleaseBatch, TileResourceStore};
