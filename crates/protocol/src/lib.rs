//! Messages exchanged between the read manager, its workers and the frontend.
//!
//! Each message kind is its own payload struct and the [`Message`] variant
//! fixes the tag, so a message can only ever be decoded as what it was built
//! as.

mod messages;

pub use messages::{
    FlushRenderBucketMessage, InvalidateReadManagerRectMessage, ResizeMessage, TileBuildId,
    TileReadEndMessage, TileReadStartMessage, UpdateModelViewMessage, UpdateReadManagerMessage,
};

use model::TileKey;
use render_protocol::RenderBucket;
use static_assertions::{assert_impl_all, assert_not_impl_any};
use view::{ScreenBase, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    TileReadStarted,
    TileReadEnded,
    FlushTile,
    Resize,
    UpdateModelView,
    UpdateReadManager,
    InvalidateReadManagerRect,
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::TileReadStarted,
        MessageKind::TileReadEnded,
        MessageKind::FlushTile,
        MessageKind::Resize,
        MessageKind::UpdateModelView,
        MessageKind::UpdateReadManager,
        MessageKind::InvalidateReadManagerRect,
    ];

    pub const fn capability(self) -> MessageCapability {
        match self {
            MessageKind::TileReadStarted | MessageKind::TileReadEnded | MessageKind::FlushTile => {
                MessageCapability::TileKeyed
            }
            MessageKind::Resize | MessageKind::UpdateModelView | MessageKind::UpdateReadManager => {
                MessageCapability::ViewportKeyed
            }
            MessageKind::InvalidateReadManagerRect => MessageCapability::Untyped,
        }
    }
}

/// What a consumer can key a message by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCapability {
    TileKeyed,
    ViewportKeyed,
    Untyped,
}

#[derive(Debug)]
pub enum Message<B = RenderBucket> {
    TileReadStarted(TileReadStartMessage),
    TileReadEnded(TileReadEndMessage),
    FlushTile(FlushRenderBucketMessage<B>),
    Resize(ResizeMessage),
    UpdateModelView(UpdateModelViewMessage),
    UpdateReadManager(UpdateReadManagerMessage),
    InvalidateReadManagerRect(InvalidateReadManagerRectMessage),
}

impl<B> Message<B> {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::TileReadStarted(_) => MessageKind::TileReadStarted,
            Message::TileReadEnded(_) => MessageKind::TileReadEnded,
            Message::FlushTile(_) => MessageKind::FlushTile,
            Message::Resize(_) => MessageKind::Resize,
            Message::UpdateModelView(_) => MessageKind::UpdateModelView,
            Message::UpdateReadManager(_) => MessageKind::UpdateReadManager,
            Message::InvalidateReadManagerRect(_) => MessageKind::InvalidateReadManagerRect,
        }
    }

    pub fn capability(&self) -> MessageCapability {
        self.kind().capability()
    }

    pub fn build(&self) -> Option<TileBuildId> {
        match self {
            Message::TileReadStarted(message) => Some(message.build()),
            Message::TileReadEnded(message) => Some(message.build()),
            Message::FlushTile(message) => Some(message.build()),
            _ => None,
        }
    }

    pub fn tile_key(&self) -> Option<TileKey> {
        self.build().map(|build| build.key)
    }

    pub fn screen(&self) -> Option<&ScreenBase> {
        match self {
            Message::UpdateModelView(message) => Some(message.screen()),
            Message::UpdateReadManager(message) => Some(message.screen()),
            _ => None,
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        match self {
            Message::Resize(message) => Some(*message.viewport()),
            _ => self.screen().map(ScreenBase::viewport),
        }
    }
}

impl<B> From<TileReadStartMessage> for Message<B> {
    fn from(message: TileReadStartMessage) -> Self {
        Message::TileReadStarted(message)
    }
}

impl<B> From<TileReadEndMessage> for Message<B> {
    fn from(message: TileReadEndMessage) -> Self {
        Message::TileReadEnded(message)
    }
}

impl<B> From<FlushRenderBucketMessage<B>> for Message<B> {
    fn from(message: FlushRenderBucketMessage<B>) -> Self {
        Message::FlushTile(message)
    }
}

impl<B> From<ResizeMessage> for Message<B> {
    fn from(message: ResizeMessage) -> Self {
        Message::Resize(message)
    }
}

impl<B> From<UpdateModelViewMessage> for Message<B> {
    fn from(message: UpdateModelViewMessage) -> Self {
        Message::UpdateModelView(message)
    }
}

impl<B> From<UpdateReadManagerMessage> for Message<B> {
    fn from(message: UpdateReadManagerMessage) -> Self {
        Message::UpdateReadManager(message)
    }
}

impl<B> From<InvalidateReadManagerRectMessage> for Message<B> {
    fn from(message: InvalidateReadManagerRectMessage) -> Self {
        Message::InvalidateReadManagerRect(message)
    }
}

assert_impl_all!(Message<RenderBucket>: Send);
assert_not_impl_any!(Message<RenderBucket>: Clone);
