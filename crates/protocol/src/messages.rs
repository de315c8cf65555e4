use model::{ActiveTileSet, TileGeneration, TileKey, WorldRect};
use render_protocol::{MasterPointer, RenderBucket, RenderState, TransferPointer};
use view::{ScreenBase, Viewport};

/// Identifies one build of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileBuildId {
    pub key: TileKey,
    pub generation: TileGeneration,
}

impl TileBuildId {
    pub const fn new(key: TileKey, generation: TileGeneration) -> Self {
        Self { key, generation }
    }
}

/// A worker started building a tile. Nothing is attached yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileReadStartMessage {
    build: TileBuildId,
}

impl TileReadStartMessage {
    pub const fn new(key: TileKey, generation: TileGeneration) -> Self {
        Self {
            build: TileBuildId::new(key, generation),
        }
    }

    pub const fn key(&self) -> TileKey {
        self.build.key
    }

    pub const fn build(&self) -> TileBuildId {
        self.build
    }
}

/// No further flushes will follow for this build, whether it succeeded or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileReadEndMessage {
    build: TileBuildId,
}

impl TileReadEndMessage {
    pub const fn new(key: TileKey, generation: TileGeneration) -> Self {
        Self {
            build: TileBuildId::new(key, generation),
        }
    }

    pub const fn key(&self) -> TileKey {
        self.build.key
    }

    pub const fn build(&self) -> TileBuildId {
        self.build
    }
}

/// One finished bucket of a tile build.
///
/// Dropping the message while the bucket is still attached destroys the
/// bucket on the dropping thread.
#[derive(Debug)]
pub struct FlushRenderBucketMessage<B = RenderBucket> {
    build: TileBuildId,
    state: RenderState,
    bucket: TransferPointer<B>,
}

impl<B> FlushRenderBucketMessage<B> {
    pub fn new(
        key: TileKey,
        generation: TileGeneration,
        state: RenderState,
        bucket: TransferPointer<B>,
    ) -> Self {
        Self {
            build: TileBuildId::new(key, generation),
            state,
            bucket,
        }
    }

    pub fn key(&self) -> TileKey {
        self.build.key
    }

    pub fn build(&self) -> TileBuildId {
        self.build
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn has_bucket(&self) -> bool {
        self.bucket.is_holding()
    }

    /// Takes ownership of the bucket. May be called once per message.
    pub fn accept_bucket(&mut self) -> MasterPointer<B> {
        match self.bucket.take() {
            Some(bucket) => bucket,
            None => panic!(
                "render bucket already accepted for tile {:?} generation {}",
                self.build.key, self.build.generation.0
            ),
        }
    }

    pub fn into_parts(self) -> (TileBuildId, RenderState, MasterPointer<B>) {
        let Self {
            build,
            state,
            bucket,
        } = self;
        if !bucket.is_holding() {
            panic!(
                "render bucket already accepted for tile {:?} generation {}",
                build.key, build.generation.0
            );
        }
        (build, state, bucket.accept())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeMessage {
    viewport: Viewport,
}

impl ResizeMessage {
    pub const fn new(viewport: Viewport) -> Self {
        Self { viewport }
    }

    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateModelViewMessage {
    screen: ScreenBase,
}

impl UpdateModelViewMessage {
    pub const fn new(screen: ScreenBase) -> Self {
        Self { screen }
    }

    pub const fn screen(&self) -> &ScreenBase {
        &self.screen
    }
}

/// Model-view update plus the complete tile set derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReadManagerMessage {
    model_view: UpdateModelViewMessage,
    tiles: ActiveTileSet,
}

impl UpdateReadManagerMessage {
    pub fn new(screen: ScreenBase, tiles: ActiveTileSet) -> Self {
        Self {
            model_view: UpdateModelViewMessage::new(screen),
            tiles,
        }
    }

    pub fn screen(&self) -> &ScreenBase {
        self.model_view.screen()
    }

    pub fn tiles(&self) -> &ActiveTileSet {
        &self.tiles
    }

    pub fn as_model_view(&self) -> &UpdateModelViewMessage {
        &self.model_view
    }
}

/// Tiles of the active set intersecting `rect` must be read again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidateReadManagerRectMessage {
    rect: WorldRect,
}

impl InvalidateReadManagerRectMessage {
    pub const fn new(rect: WorldRect) -> Self {
        Self { rect }
    }

    pub const fn rect(&self) -> &WorldRect {
        &self.rect
    }
}
